//! ReAct loop example
//!
//! Registers a weather function and runs one query through the ReAct loop.
//!
//! With `FN_RUNTIME_BASE_URL` set (and optionally `FN_RUNTIME_MODEL`,
//! `FN_RUNTIME_API_KEY`), the query goes to an OpenAI-compatible completion endpoint.
//! Otherwise a scripted model plays both turns.
//!
//! Usage:
//!   RUST_LOG=ai_fn_runtime=debug cargo run --example weather_react

use ai_fn_runtime::{
    sync_fn, CallArgs, FunctionDefinition, HttpModelProvider, ModelProvider, ParameterSchema,
    Runtime, ScriptedModel,
};
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let model: Arc<dyn ModelProvider> = if std::env::var("FN_RUNTIME_BASE_URL").is_ok() {
        Arc::new(HttpModelProvider::from_env()?)
    } else {
        eprintln!("FN_RUNTIME_BASE_URL not set, using a scripted model.");
        Arc::new(ScriptedModel::new([
            " I need the current weather in Paris.\nAction: I should use the tool `get_weather` with input `{\"location\": \"Paris\", \"unit\": \"celsius\"}`",
            " The tool says it is 18 degrees and cloudy.\nFinal Answer: It is 18°C and cloudy in Paris right now.",
        ]))
    };

    let runtime = Runtime::builder().model(model).max_turns(4).build()?;

    runtime
        .register_function(
            FunctionDefinition::new(
                "get_weather",
                "Get the current weather for a location",
                ParameterSchema::object()
                    .with_property(
                        "location",
                        ParameterSchema::string().with_description("City name"),
                        true,
                    )
                    .with_property(
                        "unit",
                        ParameterSchema::string()
                            .with_allowed_values(vec![json!("celsius"), json!("fahrenheit")]),
                        false,
                    ),
            )
            .with_implementation(sync_fn(|args: &CallArgs| {
                let location = args.require_str("location")?;
                let unit = args.str("unit").unwrap_or("celsius");
                let temperature = if unit == "fahrenheit" { 64 } else { 18 };
                Ok(json!({
                    "location": location,
                    "temperature": temperature,
                    "unit": unit,
                    "conditions": "cloudy",
                }))
            })),
        )
        .await?;

    let report = runtime
        .execute("demo", "What's the weather like in Paris today?")
        .await;

    println!("Outcome: {:?} after {} turn(s)", report.outcome.kind(), report.turns_taken);
    println!("Answer: {}", report.outcome.summary());
    println!("\nTranscript:");
    for msg in report.conversation.messages() {
        println!("[{}] {}", msg.role.as_str(), msg.text());
    }

    Ok(())
}
