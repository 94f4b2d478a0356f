//! Draft generation and clean-up of the model's answer.

use std::sync::LazyLock;

use regex::Regex;

use super::prompt::{PromptContext, build_prompt};
use super::style::{Bucket, METRICS, resolve_metric};
use super::system_prompt::REFUSAL_SENTENCE;
use crate::ai::{AiError, GenerationOptions, TextGenerator};

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error("language model returned an empty draft")]
    EmptyCompletion,
    #[error("language model declined the request: {0}")]
    Refused(String),
}

static PROFILE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<profile>.*?</profile>").expect("valid profile block regex")
});

static PROMPT_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"</?(?:profile|dynamic_context|current_subject|recipients?|current_thread_content|email|user_name|message|output_instructions)(?:\s[^>]*)?/?>",
    )
    .expect("valid prompt tag regex")
});

static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank line regex"));

/// Generate an email body for `ctx` and strip anything that is not body text.
pub async fn generate_email_body<G: TextGenerator>(
    generator: &G,
    ctx: &PromptContext,
    options: &GenerationOptions,
) -> Result<String, ComposeError> {
    let prompt = build_prompt(ctx);

    if let Some(style) = &ctx.style {
        let (high, low): (Vec<_>, Vec<_>) = METRICS
            .iter()
            .map(|spec| (spec.key, resolve_metric(style, spec.key)))
            .filter(|(_, bucket)| *bucket != Bucket::Medium)
            .partition(|(_, bucket)| *bucket == Bucket::High);
        tracing::debug!(
            "Style profile: high={:?} low={:?}",
            high.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            low.iter().map(|(k, _)| k).collect::<Vec<_>>()
        );
    }

    let raw = generator
        .generate(&prompt.system_prompt, &prompt.user_prompt, options)
        .await?;

    let body = clean_body(&raw);
    if body.is_empty() {
        return Err(ComposeError::EmptyCompletion);
    }
    if body == REFUSAL_SENTENCE {
        return Err(ComposeError::Refused(body));
    }
    Ok(body)
}

/// Remove prompt markup, fences, a subject line or profile JSON from a draft.
pub fn clean_body(raw: &str) -> String {
    let without_profile = PROFILE_BLOCK_RE.replace_all(raw, "");
    let without_tags = PROMPT_TAG_RE.replace_all(&without_profile, "");

    let mut lines: Vec<&str> = without_tags
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect();

    // Leading junk: blank lines, a subject line, a bare JSON object
    while let Some(first) = lines.first() {
        let trimmed = first.trim();
        let is_subject = trimmed
            .get(..8)
            .is_some_and(|head| head.eq_ignore_ascii_case("subject:"));
        let is_json = trimmed.starts_with('{')
            && trimmed.ends_with('}')
            && serde_json::from_str::<serde_json::Value>(trimmed).is_ok_and(|v| v.is_object());
        if trimmed.is_empty() || is_subject || is_json {
            lines.remove(0);
        } else {
            break;
        }
    }

    let joined = lines
        .iter()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUN_RE.replace_all(&joined, "\n\n").trim().to_string()
}
