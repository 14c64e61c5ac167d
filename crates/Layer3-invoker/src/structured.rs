//! Structured (JSON) responses
//!
//! 응답 텍스트에서 JSON 본문을 꺼낸다. 우선순위:
//! 1. ```` ```json ```` 펜스
//! 2. ```` ``` ```` 펜스
//! 3. 텍스트 전체

use serde::de::DeserializeOwned;

/// Slice of `text` that should hold the JSON document
pub fn extract_json(text: &str) -> &str {
    if let Some(body) = fenced(text, "```json") {
        return body;
    }
    if let Some(body) = fenced(text, "```") {
        return body;
    }
    text.trim()
}

/// Extract and deserialize
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(extract_json(text))
}

fn fenced<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let rest = &text[start..];
    let body = match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    };
    Some(body.trim())
}
