//! Response parser: extracts at most one function call from free-form model text.
//!
//! Two encodings are recognized, tried in a fixed order:
//!
//! | Encoding | Shape |
//! |----------|-------|
//! | [`CallEncoding::Json`] | `{"name": "f", "parameters": {...}}` (or `arguments`) |
//! | [`CallEncoding::CallExpression`] | `f(key=value, ...)`, optionally inside `[...]` |
//!
//! The first syntactically valid call wins. Failure is a value ([`ParseFailure`]), never a panic.

mod call_expr;
mod json_block;
mod react;

pub use react::{parse_action_input, parse_react_step, ActionInput, ReactAction, ReactStep};

use crate::types::FunctionCall;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Wire encoding of a function call in model text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallEncoding {
    Json,
    CallExpression,
}

impl CallEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallEncoding::Json => "json",
            CallEncoding::CallExpression => "call_expression",
        }
    }
}

impl std::fmt::Display for CallEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CallEncoding {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(CallEncoding::Json),
            "call_expression" | "python" | "call" => Ok(CallEncoding::CallExpression),
            other => Err(crate::Error::configuration_with_context(
                format!("unknown call encoding '{}'", other),
                crate::ErrorContext::new().with_details("expected 'json' or 'call_expression'"),
            )),
        }
    }
}

/// A call found in model text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCall {
    pub call: FunctionCall,
    pub encoding: CallEncoding,
    /// Byte range of the call within the parsed text.
    pub span: Range<usize>,
}

/// Why no call could be extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    pub raw: String,
    pub attempted: Vec<CallEncoding>,
    pub reasons: Vec<String>,
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no function call found: {}", self.reasons.join("; "))
    }
}

/// Parser over a fixed, ordered set of encodings.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    encodings: Vec<CallEncoding>,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self {
            encodings: vec![CallEncoding::Json, CallEncoding::CallExpression],
        }
    }
}

impl ResponseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict parsing to a single encoding.
    pub fn only(encoding: CallEncoding) -> Self {
        Self {
            encodings: vec![encoding],
        }
    }

    pub fn encodings(&self) -> &[CallEncoding] {
        &self.encodings
    }

    pub fn parse(&self, text: &str) -> Result<ParsedCall, ParseFailure> {
        let mut reasons = Vec::new();
        for &encoding in &self.encodings {
            let attempt = match encoding {
                CallEncoding::Json => json_block::extract(text),
                CallEncoding::CallExpression => call_expr::extract(text),
            };
            match attempt {
                Ok((call, span)) => {
                    tracing::debug!(function = %call.name, encoding = %encoding, "parsed function call");
                    return Ok(ParsedCall {
                        call,
                        encoding,
                        span,
                    });
                }
                Err(mut r) => reasons.append(&mut r),
            }
        }
        Err(ParseFailure {
            raw: text.to_string(),
            attempted: self.encodings.clone(),
            reasons,
        })
    }
}

/// Parse with every encoding in default priority.
pub fn parse_call(text: &str) -> Result<ParsedCall, ParseFailure> {
    ResponseParser::default().parse(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_wins_over_call_expression() {
        let text = r#"f(a=1) or {"name": "g", "parameters": {"b": 2}}"#;
        let parsed = parse_call(text).unwrap();
        assert_eq!(parsed.encoding, CallEncoding::Json);
        assert_eq!(parsed.call.name, "g");
    }

    #[test]
    fn test_falls_back_to_call_expression() {
        let parsed = parse_call("I'll run [get_weather(location='Paris', days=3)]").unwrap();
        assert_eq!(parsed.encoding, CallEncoding::CallExpression);
        assert_eq!(parsed.call.parameters.get("days"), Some(&json!(3)));
    }

    #[test]
    fn test_failure_lists_attempts() {
        let failure = parse_call("Just some prose.").unwrap_err();
        assert_eq!(failure.raw, "Just some prose.");
        assert_eq!(
            failure.attempted,
            vec![CallEncoding::Json, CallEncoding::CallExpression]
        );
        assert_eq!(failure.reasons.len(), 2);
    }

    #[test]
    fn test_only_restricts_encodings() {
        let failure = ResponseParser::only(CallEncoding::Json)
            .parse("get_weather(location='Paris')")
            .unwrap_err();
        assert_eq!(failure.attempted, vec![CallEncoding::Json]);
    }

    #[test]
    fn test_encoding_from_str() {
        assert_eq!("python".parse::<CallEncoding>().unwrap(), CallEncoding::CallExpression);
        assert_eq!("JSON".parse::<CallEncoding>().unwrap(), CallEncoding::Json);
        assert!("xml".parse::<CallEncoding>().is_err());
    }
}
