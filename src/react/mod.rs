//! ReAct execution loop.
//!
//! The loop is an explicit state machine driven one transition at a time:
//!
//! ```text
//! AwaitingModel ──model reply──▶ Parsing ──action──▶ ExecutingAction ──▶ AwaitingModel
//!       │                           │
//!       │ turn budget spent         │ final answer / plain text
//!       ▼                           ▼
//!     Done                        Done
//! ```
//!
//! Model failures, model timeouts and cancellation end in `Failed`. Everything that goes
//! wrong below the loop (parse failures, unknown functions, bad arguments, function errors)
//! is written into the conversation as a function message and the loop continues.

mod history;

pub use history::{ExecutionHistory, ExecutionRecord, OutcomeKind};

use crate::conversation::Conversation;
use crate::executor::FunctionExecutor;
use crate::model::ModelProvider;
use crate::parser::{parse_react_step, ActionInput, ReactAction};
use crate::prompt::react_prompt;
use crate::registry::FunctionRegistry;
use crate::types::{FunctionCall, FunctionCallResult};
use crate::utils::truncate;
use crate::Error;
use serde_json::Map;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Answer text reported when the turn budget runs out.
pub const MAX_TURNS_MESSAGE: &str =
    "No final answer was reached after the maximum number of turns.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingModel,
    Parsing,
    ExecutingAction,
    Done,
    Failed,
}

/// Terminal outcome of a loop run.
#[derive(Debug)]
pub enum LoopOutcome {
    /// The model gave a `Final Answer:`.
    Answer(String),
    /// The model replied with neither an action nor a final answer; its text is the answer.
    LowConfidenceAnswer(String),
    MaxTurnsExceeded,
    Failed(Error),
    Cancelled,
}

impl LoopOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            LoopOutcome::Answer(_) => OutcomeKind::Answer,
            LoopOutcome::LowConfidenceAnswer(_) => OutcomeKind::LowConfidenceAnswer,
            LoopOutcome::MaxTurnsExceeded => OutcomeKind::MaxTurnsExceeded,
            LoopOutcome::Failed(_) => OutcomeKind::Failed,
            LoopOutcome::Cancelled => OutcomeKind::Cancelled,
        }
    }

    pub fn answer(&self) -> Option<&str> {
        match self {
            LoopOutcome::Answer(a) | LoopOutcome::LowConfidenceAnswer(a) => Some(a),
            _ => None,
        }
    }

    /// Answer, error text or marker, as recorded in the execution history.
    pub fn summary(&self) -> String {
        match self {
            LoopOutcome::Answer(a) | LoopOutcome::LowConfidenceAnswer(a) => a.clone(),
            LoopOutcome::MaxTurnsExceeded => MAX_TURNS_MESSAGE.to_string(),
            LoopOutcome::Failed(e) => e.to_string(),
            LoopOutcome::Cancelled => Error::Cancelled.to_string(),
        }
    }
}

/// Result of one loop run.
#[derive(Debug)]
pub struct ReactReport {
    pub outcome: LoopOutcome,
    /// Model calls made.
    pub turns_taken: usize,
    pub final_state: LoopState,
    /// Snapshot of the conversation after the run.
    pub conversation: Conversation,
}

impl ReactReport {
    pub fn record(&self, query: &str) -> ExecutionRecord {
        ExecutionRecord::new(query, self.outcome.summary(), self.outcome.kind(), self.turns_taken)
    }
}

/// Per-run machine state.
struct Machine {
    state: LoopState,
    turns: usize,
    max_turns: usize,
    reply: String,
    action: Option<ReactAction>,
    outcome: Option<LoopOutcome>,
}

impl Machine {
    fn finish(&mut self, state: LoopState, outcome: LoopOutcome) {
        self.state = state;
        self.outcome = Some(outcome);
    }
}

/// Drives the ReAct loop over a shared registry and model.
#[derive(Clone)]
pub struct ReactAgent {
    registry: Arc<RwLock<FunctionRegistry>>,
    model: Arc<dyn ModelProvider>,
    executor: FunctionExecutor,
    model_timeout: Duration,
    stop: Vec<String>,
}

impl ReactAgent {
    pub fn new(
        registry: Arc<RwLock<FunctionRegistry>>,
        model: Arc<dyn ModelProvider>,
        executor: FunctionExecutor,
    ) -> Self {
        Self {
            registry,
            model,
            executor,
            model_timeout: Duration::from_secs(120),
            stop: vec![crate::config::OBSERVATION_STOP.to_string()],
        }
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn with_stop_sequences(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    /// Append `query` to `conversation` and run the loop until it terminates.
    ///
    /// `max_turns` bounds the number of model calls. Cancellation is observed between
    /// transitions and while waiting for the model.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        query: &str,
        max_turns: usize,
        cancel: &CancellationToken,
    ) -> ReactReport {
        conversation.add_user(query);
        let mut machine = Machine {
            state: LoopState::AwaitingModel,
            turns: 0,
            max_turns,
            reply: String::new(),
            action: None,
            outcome: None,
        };

        while !matches!(machine.state, LoopState::Done | LoopState::Failed) {
            if cancel.is_cancelled() {
                machine.finish(LoopState::Failed, LoopOutcome::Cancelled);
                break;
            }
            debug!(state = ?machine.state, turn = machine.turns, "react transition");
            self.step(&mut machine, conversation, cancel).await;
        }

        let outcome = machine.outcome.take().unwrap_or(LoopOutcome::MaxTurnsExceeded);
        info!(
            outcome = ?outcome.kind(),
            turns = machine.turns,
            messages = conversation.len(),
            "react loop finished"
        );
        ReactReport {
            outcome,
            turns_taken: machine.turns,
            final_state: machine.state,
            conversation: conversation.clone(),
        }
    }

    async fn step(
        &self,
        m: &mut Machine,
        conversation: &mut Conversation,
        cancel: &CancellationToken,
    ) {
        match m.state {
            LoopState::AwaitingModel => {
                if m.turns >= m.max_turns {
                    m.finish(LoopState::Done, LoopOutcome::MaxTurnsExceeded);
                    return;
                }
                let prompt = {
                    let registry = self.registry.read().await;
                    react_prompt(&registry.catalog(), conversation)
                };
                m.turns += 1;
                let generation = tokio::time::timeout(
                    self.model_timeout,
                    self.model.generate(&prompt, &self.stop),
                );
                let reply = tokio::select! {
                    _ = cancel.cancelled() => {
                        m.finish(LoopState::Failed, LoopOutcome::Cancelled);
                        return;
                    }
                    reply = generation => reply,
                };
                match reply {
                    Ok(Ok(text)) => {
                        debug!(turn = m.turns, reply = %truncate(&text, 120), "model replied");
                        m.reply = text;
                        m.state = LoopState::Parsing;
                    }
                    Ok(Err(e)) => {
                        warn!(turn = m.turns, error = %e, "model invocation failed");
                        m.finish(LoopState::Failed, LoopOutcome::Failed(e));
                    }
                    Err(_) => {
                        let e = Error::Timeout {
                            operation: "model generation".to_string(),
                            timeout_ms: self.model_timeout.as_millis() as u64,
                        };
                        warn!(turn = m.turns, error = %e, "model timed out");
                        m.finish(LoopState::Failed, LoopOutcome::Failed(e));
                    }
                }
            }
            LoopState::Parsing => {
                let step = parse_react_step(&m.reply);
                if let Some(answer) = step.final_answer {
                    conversation.add_assistant(answer.clone(), None);
                    m.finish(LoopState::Done, LoopOutcome::Answer(answer));
                } else if let Some(action) = step.action {
                    m.action = Some(action);
                    m.state = LoopState::ExecutingAction;
                } else {
                    let text = m.reply.trim().to_string();
                    conversation.add_assistant(text.clone(), None);
                    m.finish(LoopState::Done, LoopOutcome::LowConfidenceAnswer(text));
                }
            }
            LoopState::ExecutingAction => {
                let Some(action) = m.action.take() else {
                    m.state = LoopState::AwaitingModel;
                    return;
                };
                let result = match action.input {
                    ActionInput::Parsed(params) => {
                        let call = FunctionCall::new(action.name, params);
                        conversation.add_assistant(m.reply.trim(), Some(call.clone()));
                        let def = self.registry.read().await.lookup(&call.name);
                        self.executor.execute_resolved(def, &call).await
                    }
                    ActionInput::Invalid { raw, reason } => {
                        warn!(function = %action.name, %reason, "unparseable action input");
                        let call = FunctionCall::new(action.name.clone(), Map::new());
                        conversation.add_assistant(m.reply.trim(), Some(call));
                        FunctionCallResult::failure(
                            action.name,
                            Map::new(),
                            format!("could not parse action input `{}`: {}", raw, reason),
                        )
                    }
                };
                conversation.add_function_result(result);
                m.state = LoopState::AwaitingModel;
            }
            LoopState::Done | LoopState::Failed => {}
        }
    }
}
