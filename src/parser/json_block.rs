//! JSON-block encoding: `{"name": ..., "parameters": {...}}` embedded in prose.

use crate::types::FunctionCall;
use serde_json::Value;
use std::ops::Range;

/// Byte ranges of every top-level balanced `{...}` span, in order.
///
/// Braces inside string literals are ignored. An unterminated span yields nothing.
pub(crate) fn balanced_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(start..i + 1);
                }
            }
            _ => {}
        }
    }
    spans
}

/// Validate one candidate span as a function call.
pub(crate) fn parse_span(candidate: &str) -> Result<FunctionCall, String> {
    let value: Value =
        serde_json::from_str(candidate).map_err(|e| format!("invalid JSON: {}", e))?;
    let obj = value
        .as_object()
        .ok_or_else(|| "JSON value is not an object".to_string())?;

    let name = match obj.get("name") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::String(_)) => return Err("\"name\" is empty".to_string()),
        Some(_) => return Err("\"name\" is not a string".to_string()),
        None => return Err("missing \"name\"".to_string()),
    };

    let params = obj.get("parameters").or_else(|| obj.get("arguments"));
    match params {
        Some(Value::Object(map)) => Ok(FunctionCall::new(name, map.clone())),
        Some(_) => Err("\"parameters\" is not a mapping".to_string()),
        None => Err("missing \"parameters\"".to_string()),
    }
}

/// First valid call among the balanced spans, or the reasons every span failed.
pub(crate) fn extract(text: &str) -> Result<(FunctionCall, Range<usize>), Vec<String>> {
    let spans = balanced_spans(text);
    if spans.is_empty() {
        return Err(vec!["json: no balanced JSON object found".to_string()]);
    }
    let mut reasons = Vec::new();
    for span in spans {
        match parse_span(&text[span.clone()]) {
            Ok(call) => return Ok((call, span)),
            Err(reason) => reasons.push(format!("json: {}", reason)),
        }
    }
    Err(reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_braces_in_strings_ignored() {
        let text = r#"Sure: {"name": "echo", "parameters": {"text": "a } b { c"}} done"#;
        let (call, span) = extract(text).unwrap();
        assert_eq!(call.name, "echo");
        assert_eq!(call.parameters.get("text"), Some(&json!("a } b { c")));
        assert!(text[span].ends_with("}}"));
    }

    #[test]
    fn test_unbalanced_rejected() {
        let err = extract(r#"{"name": "f", "parameters": {"x": 1}"#).unwrap_err();
        assert_eq!(err, vec!["json: no balanced JSON object found".to_string()]);
    }

    #[test]
    fn test_skips_invalid_span_then_accepts_next() {
        let text = r#"Plan {step one} then {"name": "f", "arguments": {}}"#;
        let (call, _) = extract(text).unwrap();
        assert_eq!(call.name, "f");
        assert!(call.parameters.is_empty());
    }

    #[test]
    fn test_partial_object_fails() {
        let err = extract(r#"{"name": "f"}"#).unwrap_err();
        assert!(err[0].contains("missing \"parameters\""));
        let err = extract(r#"{"parameters": {}}"#).unwrap_err();
        assert!(err[0].contains("missing \"name\""));
    }
}
