//! Call-expression encoding: `name(key=value, ...)`, optionally wrapped in `[...]`.

use crate::types::FunctionCall;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::ops::Range;

static CALL_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z_][A-Za-z0-9_.\-]*)\s*\(").expect("call head pattern")
});
static IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"));
static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").expect("integer pattern"));
static FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+\.\d*|\.\d+|\d+)([eE][+-]?\d+)?$").expect("float pattern")
});

/// Index just past the bracket that closes the one at `open`, honoring quotes and nesting.
fn matching_close(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (offset, c) in text[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset + c.len_utf8());
                }
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on commas that are not nested in brackets or quotes.
pub(crate) fn split_top_level(text: &str, separators: &[char]) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in text.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(c);
            }
            c if depth == 0 && separators.contains(&c) => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn unquote(token: &str) -> Option<String> {
    let mut chars = token.chars();
    let first = chars.next()?;
    if (first != '"' && first != '\'') || token.len() < 2 || !token.ends_with(first) {
        return None;
    }
    let inner = &token[1..token.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut escaped = false;
    for c in inner.chars() {
        if escaped {
            out.push(match c {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Coerce a literal token to a JSON value. Ambiguous tokens stay strings.
pub(crate) fn coerce_literal(token: &str) -> Value {
    let token = token.trim();
    if let Some(s) = unquote(token) {
        return Value::String(s);
    }
    match token {
        "true" | "True" => return Value::Bool(true),
        "false" | "False" => return Value::Bool(false),
        "null" | "None" => return Value::Null,
        _ => {}
    }
    if INTEGER.is_match(token) {
        if let Ok(i) = token.parse::<i64>() {
            return Value::Number(i.into());
        }
    }
    if FLOAT.is_match(token) {
        if let Some(n) = token.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    if token.starts_with('[') && token.ends_with(']') {
        let inner = &token[1..token.len() - 1];
        return Value::Array(
            split_top_level(inner, &[','])
                .iter()
                .map(|item| coerce_literal(item))
                .collect(),
        );
    }
    if token.starts_with('{') && token.ends_with('}') {
        if let Ok(value) = serde_json::from_str::<Value>(token) {
            return value;
        }
    }
    Value::String(token.to_string())
}

/// Parse `key=value` pairs. Every piece must be an assignment to an identifier.
pub(crate) fn parse_assignments(body: &str) -> Result<Map<String, Value>, String> {
    let mut args = Map::new();
    for piece in split_top_level(body, &[',']) {
        let (key, value) = piece
            .split_once('=')
            .ok_or_else(|| format!("argument '{}' is not of the form key=value", piece))?;
        let key = key.trim();
        if !IDENT.is_match(key) {
            return Err(format!("'{}' is not a valid argument name", key));
        }
        args.insert(key.to_string(), coerce_literal(value));
    }
    Ok(args)
}

/// First `name(k=v, ...)` in the text that parses completely.
pub(crate) fn extract(text: &str) -> Result<(FunctionCall, Range<usize>), Vec<String>> {
    let mut reasons = Vec::new();
    for caps in CALL_HEAD.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let open = whole.end() - 1;
        let Some(close) = matching_close(text, open) else {
            reasons.push(format!("call: unclosed argument list for '{}'", name.as_str()));
            continue;
        };
        match parse_assignments(&text[open + 1..close - 1]) {
            Ok(args) => {
                return Ok((FunctionCall::new(name.as_str(), args), name.start()..close));
            }
            Err(reason) => reasons.push(format!("call: {}: {}", name.as_str(), reason)),
        }
    }
    if reasons.is_empty() {
        reasons.push("call: no call expression found".to_string());
    }
    Err(reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_literals() {
        assert_eq!(coerce_literal("'Paris'"), json!("Paris"));
        assert_eq!(coerce_literal("\"a, b\""), json!("a, b"));
        assert_eq!(coerce_literal("42"), json!(42));
        assert_eq!(coerce_literal("-3.5"), json!(-3.5));
        assert_eq!(coerce_literal("True"), json!(true));
        assert_eq!(coerce_literal("None"), Value::Null);
        assert_eq!(coerce_literal("[1, 'x', [2]]"), json!([1, "x", [2]]));
        assert_eq!(coerce_literal("celsius"), json!("celsius"));
        assert_eq!(coerce_literal("1.2.3"), json!("1.2.3"));
    }

    #[test]
    fn test_nested_commas_not_split() {
        let parts = split_top_level("a=[1, 2], b='x, y', c=f(1, 2)", &[',']);
        assert_eq!(parts, vec!["a=[1, 2]", "b='x, y'", "c=f(1, 2)"]);
    }

    #[test]
    fn test_prose_parentheses_skipped() {
        let text = "The weather (in general) is nice; call get_weather(location=\"Paris\")";
        let (call, _) = extract(text).unwrap();
        assert_eq!(call.name, "get_weather");
        assert_eq!(call.parameters.get("location"), Some(&json!("Paris")));
    }

    #[test]
    fn test_bracketed_list_takes_first() {
        let (call, _) = extract("[first(a=1), second(b=2)]").unwrap();
        assert_eq!(call.name, "first");
    }

    #[test]
    fn test_empty_argument_list() {
        let (call, _) = extract("list_files()").unwrap();
        assert_eq!(call.name, "list_files");
        assert!(call.parameters.is_empty());
    }
}
