use std::sync::LazyLock;

use regex::Regex;

use crate::error::ScribeError;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

static REASONING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<think>(.*?)</think>(.*)").expect("valid reasoning regex")
});

/// An enrichment reply split into the model's reasoning and the letter itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub thinking: String,
    pub cover_letter: String,
}

/// Remove every `<...>` tag, leaving the text between them untouched.
pub fn strip_html_tags(input: &str) -> String {
    TAG.replace_all(input, "").into_owned()
}

/// Split a reply of the form `<think>...</think> letter` into its two parts.
pub fn split_reasoning(reply: &str) -> Result<Enrichment, ScribeError> {
    let caps = REASONING
        .captures(reply)
        .ok_or(ScribeError::MissingReasoning)?;
    Ok(Enrichment {
        thinking: caps[1].trim().to_string(),
        cover_letter: caps[2].trim().to_string(),
    })
}
