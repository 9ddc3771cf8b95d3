// SPDX-License-Identifier: MIT

//! Text helpers for model output

use once_cell::sync::Lazy;
use regex::Regex;

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid think-block regex"));

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").expect("valid fence regex"));

/// Remove `<think>...</think>` reasoning blocks and trim the rest.
///
/// An unterminated `<think>` drops everything after it.
pub fn strip_think_tags(text: &str) -> String {
    let cleaned = THINK_BLOCK.replace_all(text, "");
    let cleaned = match cleaned.find("<think>") {
        Some(pos) => &cleaned[..pos],
        None => &cleaned[..],
    };
    cleaned.trim().to_string()
}

/// Pull the first JSON object out of a model answer.
///
/// Handles bare objects, fenced ```json blocks, and objects surrounded
/// by prose.
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let text = strip_think_tags(text);

    if let Ok(value @ serde_json::Value::Object(_)) = serde_json::from_str(&text) {
        return Some(value);
    }

    if let Some(caps) = CODE_FENCE.captures(&text) {
        if let Ok(value @ serde_json::Value::Object(_)) = serde_json::from_str(&caps[1]) {
            return Some(value);
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&text[start..=end]) {
        Ok(value @ serde_json::Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// First `max_chars` characters, for log lines
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}

/// Lowercase ASCII slug built from the first `max_words` words
pub fn slugify(text: &str, max_words: usize) -> String {
    let slug = text
        .split_whitespace()
        .take(max_words)
        .map(|w| {
            w.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_think_tags() {
        let raw = "<think>\nThe user wants a summary.\n</think>\n\nTokyo in July is hot.";
        assert_eq!(strip_think_tags(raw), "Tokyo in July is hot.");
    }

    #[test]
    fn test_strip_multiple_and_unterminated() {
        assert_eq!(strip_think_tags("a<think>x</think>b<think>y</think>c"), "abc");
        assert_eq!(strip_think_tags("answer <think>never closed"), "answer");
    }

    #[test]
    fn test_extract_json_bare() {
        let v = extract_json_object(r#"{"city": "Tokyo"}"#).unwrap();
        assert_eq!(v, json!({"city": "Tokyo"}));
    }

    #[test]
    fn test_extract_json_fenced_with_think() {
        let raw = "<think>hmm</think>\n```json\n{\"city\": \"Paris\", \"currency\": \"eur\"}\n```";
        let v = extract_json_object(raw).unwrap();
        assert_eq!(v["city"], "Paris");
        assert_eq!(v["currency"], "eur");
    }

    #[test]
    fn test_extract_json_in_prose() {
        let raw = "Sure! Here it is: {\"topic\": \"travel\"} Hope that helps.";
        assert_eq!(extract_json_object(raw).unwrap()["topic"], "travel");
    }

    #[test]
    fn test_extract_json_none() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("[1, 2, 3]").is_none());
        assert!(extract_json_object("} backwards {").is_none());
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Tokyo in July: hot & humid!", 3), "tokyo-in-july");
        assert_eq!(slugify("   ", 3), "untitled");
        assert_eq!(slugify("¿¿ !!", 2), "untitled");
    }
}
