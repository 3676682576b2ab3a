//! ReAct step parsing: `Thought:` / `Action:` / `Action Input:` / `Final Answer:`.

use super::call_expr::{coerce_literal, parse_assignments, split_top_level};
use super::ResponseParser;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static OBSERVATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*Observation:").expect("observation pattern"));
static THOUGHT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)Thought:\s*(.*?)\s*(?:\n\s*Action:|\n\s*Final Answer:|$)")
        .expect("thought pattern")
});
static FIRST_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:Action:|Final Answer:)").expect("marker pattern")
});
static FINAL_ANSWER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Final Answer:\s*(.*)$").expect("final answer pattern"));
static LONG_ACTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Action:\s*I should use the tool\s*`([^`]+)`\s*with input\s*`(.*)`")
        .expect("long action pattern")
});
static ACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*Action:[ \t]*(.+?)[ \t]*$").expect("action pattern"));
static ACTION_INPUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Action Input:\s*(.*)$").expect("action input pattern"));
static KEY_COLON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^["']?([A-Za-z_][A-Za-z0-9_]*)["']?\s*:\s*(.*)$"#).expect("key pattern")
});

/// Arguments of a ReAct action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionInput {
    Parsed(Map<String, Value>),
    /// The input could not be read as arguments; the action must not be invoked.
    Invalid { raw: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReactAction {
    pub name: String,
    pub input: ActionInput,
}

/// One model turn split into its ReAct parts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReactStep {
    pub thought: Option<String>,
    pub action: Option<ReactAction>,
    pub final_answer: Option<String>,
}

/// Split a model turn into thought, action and final answer.
///
/// Anything after a model-written `Observation:` line is ignored. A bare call is only
/// looked for when the text has neither an `Action:` line nor a final answer.
pub fn parse_react_step(text: &str) -> ReactStep {
    let text = match OBSERVATION.find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    };

    let thought = match THOUGHT.captures(text).and_then(|c| c.get(1)) {
        Some(m) => Some(m.as_str().trim().to_string()),
        // The prompt ends with "Thought:", so the reply often starts with the thought itself.
        None => {
            let head = match FIRST_MARKER.find(text) {
                Some(m) => &text[..m.start()],
                None => text,
            };
            Some(head.trim().to_string())
        }
    }
    .filter(|t| !t.is_empty());

    let final_answer = FINAL_ANSWER
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string());

    let action = parse_action(text, final_answer.is_none());

    ReactStep {
        thought,
        action,
        final_answer,
    }
}

fn parse_action(text: &str, allow_bare_call: bool) -> Option<ReactAction> {
    if let Some(caps) = LONG_ACTION.captures(text) {
        let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let raw = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        return Some(ReactAction {
            name: name.to_string(),
            input: parse_action_input(raw),
        });
    }

    if let Some(caps) = ACTION.captures(text) {
        let declared = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let declared = declared.trim().trim_matches('`').trim();

        // `Action: get_weather(location="Paris")`
        if declared.contains('(') {
            if let Ok(parsed) = ResponseParser::default().parse(declared) {
                return Some(ReactAction {
                    name: parsed.call.name,
                    input: ActionInput::Parsed(parsed.call.parameters),
                });
            }
        }

        let after = caps.get(0).map(|m| m.end()).unwrap_or(text.len());
        let input = match ACTION_INPUT.captures(&text[after..]).and_then(|c| c.get(1)) {
            Some(m) => parse_action_input(m.as_str()),
            None => ActionInput::Parsed(Map::new()),
        };
        return Some(ReactAction {
            name: declared.to_string(),
            input,
        });
    }

    if allow_bare_call {
        if let Ok(parsed) = ResponseParser::default().parse(text) {
            return Some(ReactAction {
                name: parsed.call.name,
                input: ActionInput::Parsed(parsed.call.parameters),
            });
        }
    }
    None
}

fn strip_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        s = rest.strip_suffix("```").unwrap_or(rest).trim();
    }
    s.trim_matches('`').trim()
}

/// Read action input as a JSON object, then `k=v` pairs, then `k: v` pairs.
pub fn parse_action_input(raw: &str) -> ActionInput {
    let text = strip_fences(raw);
    if text.is_empty() {
        return ActionInput::Parsed(Map::new());
    }

    let mut reasons = Vec::new();
    if text.starts_with('{') {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => return ActionInput::Parsed(map),
            Ok(_) => reasons.push("JSON input is not an object".to_string()),
            Err(e) => reasons.push(format!("invalid JSON: {}", e)),
        }
    }

    match parse_assignments(text) {
        Ok(map) if !map.is_empty() => return ActionInput::Parsed(map),
        Ok(_) => {}
        Err(reason) => reasons.push(reason),
    }

    let body = text
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .unwrap_or(text);
    let mut map = Map::new();
    let mut all_pairs = true;
    for piece in split_top_level(body, &[',', '\n']) {
        match KEY_COLON.captures(&piece) {
            Some(caps) => {
                let key = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                let value = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
                map.insert(key.to_string(), coerce_literal(value));
            }
            None => {
                all_pairs = false;
                break;
            }
        }
    }
    if all_pairs && !map.is_empty() {
        return ActionInput::Parsed(map);
    }
    reasons.push("not a list of key: value pairs".to_string());

    ActionInput::Invalid {
        raw: raw.trim().to_string(),
        reason: reasons.join("; "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parsed(input: &ActionInput) -> &Map<String, Value> {
        match input {
            ActionInput::Parsed(map) => map,
            ActionInput::Invalid { reason, .. } => panic!("unexpected invalid input: {}", reason),
        }
    }

    #[test]
    fn test_action_and_input_lines() {
        let step = parse_react_step(
            "I need the weather.\nAction: get_weather\nAction Input: {\"location\": \"Paris\"}",
        );
        assert_eq!(step.thought.as_deref(), Some("I need the weather."));
        let action = step.action.unwrap();
        assert_eq!(action.name, "get_weather");
        assert_eq!(parsed(&action.input).get("location"), Some(&json!("Paris")));
        assert!(step.final_answer.is_none());
    }

    #[test]
    fn test_long_form_action() {
        let step = parse_react_step(
            "Thought: look it up\nAction: I should use the tool `search` with input `{\"q\": \"rust\"}`",
        );
        assert_eq!(step.thought.as_deref(), Some("look it up"));
        let action = step.action.unwrap();
        assert_eq!(action.name, "search");
        assert_eq!(parsed(&action.input).get("q"), Some(&json!("rust")));
    }

    #[test]
    fn test_final_answer() {
        let step = parse_react_step("I know this.\nFinal Answer: 42");
        assert_eq!(step.final_answer.as_deref(), Some("42"));
        assert!(step.action.is_none());
    }

    #[test]
    fn test_hallucinated_observation_ignored() {
        let step = parse_react_step(
            "Action: get_time\nAction Input: {}\nObservation: 12:00\nFinal Answer: noon",
        );
        assert!(step.final_answer.is_none());
        assert_eq!(step.action.unwrap().name, "get_time");
    }

    #[test]
    fn test_action_name_stays_on_its_line() {
        let step = parse_react_step("Thought: hmm\nAction:\nAction Input: {\"q\": 1}");
        assert!(step.action.is_none());

        let step = parse_react_step("Action: get_time  \r\nAction Input: {}");
        let action = step.action.unwrap();
        assert_eq!(action.name, "get_time");
        assert!(parsed(&action.input).is_empty());
    }

    #[test]
    fn test_bare_call_fallback() {
        let step = parse_react_step("Let me check get_weather(location='Oslo')");
        let action = step.action.unwrap();
        assert_eq!(action.name, "get_weather");
        assert_eq!(parsed(&action.input).get("location"), Some(&json!("Oslo")));
    }

    #[test]
    fn test_action_input_forms() {
        assert_eq!(
            parsed(&parse_action_input("location=\"Paris\", days=2")).get("days"),
            Some(&json!(2))
        );
        assert_eq!(
            parsed(&parse_action_input("location: Paris, unit: celsius")).get("unit"),
            Some(&json!("celsius"))
        );
        assert!(parsed(&parse_action_input("  ")).is_empty());
        assert!(matches!(
            parse_action_input("{\"location\": "),
            ActionInput::Invalid { .. }
        ));
        assert!(matches!(
            parse_action_input("just some words"),
            ActionInput::Invalid { .. }
        ));
    }
}
