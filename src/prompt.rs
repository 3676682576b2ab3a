//! Prompt construction for the ReAct loop and for single-shot function calling.

use crate::conversation::Conversation;
use crate::parser::CallEncoding;
use crate::types::{FunctionDefinition, Role};
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;

const REACT_INSTRUCTIONS: &str = "Use the following format:

Thought: I need to think about what to do
Action: I should use the tool `tool_name` with input `{\"param1\": \"value1\", \"param2\": \"value2\"}`
Observation: The result of the tool
... (repeat Thought/Action/Observation as needed)
Final Answer: The final response to the user's query

Begin!
";

const JSON_SETUP: &str = "You have access to functions. If you decide to invoke any of the function(s),
you MUST put it in the format of
{\"name\": function name, \"parameters\": dictionary of argument name and its value}

You SHOULD NOT include any other text in the response if you call a function
";

const CALL_EXPRESSION_SETUP: &str = "You have access to functions. If you decide to invoke any of the function(s),
you MUST put it in the format of
[func_name1(params_name1=params_value1, params_name2=params_value2...), func_name2(params)]

You SHOULD NOT include any other text in the response if you call a function
";

/// One catalog line per tool: ``* `name(p: type, ...)`: description``.
pub fn tool_lines(catalog: &[Arc<FunctionDefinition>]) -> String {
    let mut out = String::new();
    for def in catalog {
        let params: Vec<String> = def
            .parameters
            .properties
            .iter()
            .flatten()
            .map(|(name, schema)| format!("{}: {}", name, schema.kind))
            .collect();
        let _ = writeln!(out, "* `{}({})`: {}", def.name, params.join(", "), def.description);
    }
    out
}

/// Full ReAct prompt: system prompt, tool catalog, format instructions and the transcript,
/// ending with an open `Thought:` for the model to continue.
pub fn react_prompt(catalog: &[Arc<FunctionDefinition>], conversation: &Conversation) -> String {
    let mut prompt = String::new();
    if let Some(system) = conversation.system_prompt() {
        prompt.push_str(system);
        prompt.push_str("\n\n");
    }
    prompt.push_str("You are an AI assistant that helps users by using tools.\n");
    prompt.push_str("You have access to the following tools:\n\n");
    prompt.push_str(&tool_lines(catalog));
    prompt.push('\n');
    prompt.push_str(REACT_INSTRUCTIONS);

    for msg in conversation.messages() {
        match msg.role {
            Role::User => {
                let _ = write!(prompt, "\nUser query: {}", msg.text());
            }
            Role::Assistant if msg.function_call.is_some() => {
                let text = msg.text().trim();
                let text = text.strip_prefix("Thought:").unwrap_or(text).trim();
                let _ = write!(prompt, "\nThought: {}", text);
            }
            // Assistant turns without a call hold a previous answer.
            Role::Assistant => {
                let text = msg.text().trim();
                let text = text.strip_prefix("Final Answer:").unwrap_or(text).trim();
                let _ = write!(prompt, "\nFinal Answer: {}", text);
            }
            Role::Function => {
                let observation = match &msg.function_result {
                    Some(result) => result.observation(),
                    None => msg.text().to_string(),
                };
                let _ = write!(prompt, "\nObservation: {}", observation);
            }
        }
    }
    prompt.push_str("\nThought:");
    prompt
}

/// Single-shot prompt asking for one call in the given encoding.
pub fn function_calling_prompt(catalog: &[Value], encoding: CallEncoding, query: &str) -> String {
    let setup = match encoding {
        CallEncoding::Json => JSON_SETUP,
        CallEncoding::CallExpression => CALL_EXPRESSION_SETUP,
    };
    let defs = serde_json::to_string_pretty(catalog).unwrap_or_else(|_| "[]".to_string());
    format!("{}\n{}\n{}", setup, defs, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FunctionCall, FunctionCallResult, ParameterSchema};
    use serde_json::{json, Map};

    fn weather() -> Arc<FunctionDefinition> {
        Arc::new(FunctionDefinition::new(
            "get_weather",
            "Get the weather",
            ParameterSchema::object()
                .with_property("location", ParameterSchema::string(), true)
                .with_property("days", ParameterSchema::integer(), false),
        ))
    }

    #[test]
    fn test_tool_lines() {
        assert_eq!(
            tool_lines(&[weather()]),
            "* `get_weather(location: string, days: integer)`: Get the weather\n"
        );
    }

    #[test]
    fn test_react_prompt_transcript() {
        let mut conv = Conversation::new(Some("Be brief.".into()));
        conv.add_user("Weather in Paris?");
        conv.add_assistant(
            "I should check.\nAction: get_weather\nAction Input: {\"location\": \"Paris\"}",
            Some(FunctionCall::new("get_weather", Map::new())),
        );
        conv.add_function_result(FunctionCallResult::success("get_weather", Map::new(), json!("sunny")));

        let prompt = react_prompt(&[weather()], &conv);
        assert!(prompt.starts_with("Be brief.\n\nYou are an AI assistant"));
        assert!(prompt.contains("Begin!\n\nUser query: Weather in Paris?\nThought: I should check."));
        assert!(prompt.ends_with("\nObservation: sunny\nThought:"));
    }

    #[test]
    fn test_previous_answer_rendered_as_final_answer() {
        let mut conv = Conversation::new(None);
        conv.add_user("Capital of France?");
        conv.add_assistant("Paris", None);
        conv.add_user("And of Italy?");

        let prompt = react_prompt(&[weather()], &conv);
        assert!(prompt.contains(
            "User query: Capital of France?\nFinal Answer: Paris\nUser query: And of Italy?\nThought:"
        ));
    }

    #[test]
    fn test_function_calling_prompt_formats() {
        let catalog = vec![weather().to_value()];
        let json_prompt = function_calling_prompt(&catalog, CallEncoding::Json, "Weather?");
        assert!(json_prompt.contains("{\"name\": function name"));
        assert!(json_prompt.ends_with("\nWeather?"));
        let call_prompt = function_calling_prompt(&catalog, CallEncoding::CallExpression, "Weather?");
        assert!(call_prompt.contains("[func_name1(params_name1=params_value1"));
        assert!(call_prompt.contains("\"get_weather\""));
    }
}
