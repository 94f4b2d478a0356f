//! Model-backed fallback for phrases the normalizer leaves untouched.

use crate::ai::{GenerationOptions, SEARCH_QUERY_SYSTEM, TextGenerator};

/// Asks a language model to write the provider query.
pub struct QuerySynthesizer<'a, G> {
    generator: &'a G,
    max_tokens: u32,
}

impl<'a, G: TextGenerator> QuerySynthesizer<'a, G> {
    pub fn new(generator: &'a G, max_tokens: u32) -> Self {
        Self {
            generator,
            max_tokens,
        }
    }

    /// Translate `phrase`, falling back to the phrase itself on any failure.
    pub async fn synthesize(&self, phrase: &str) -> String {
        let options = GenerationOptions::new(self.max_tokens, 0.0);
        match self
            .generator
            .generate(SEARCH_QUERY_SYSTEM, phrase, &options)
            .await
        {
            Ok(answer) => match sanitize_query(&answer) {
                Some(query) => {
                    tracing::debug!("Synthesized query for '{}': '{}'", phrase, query);
                    query
                }
                None => {
                    tracing::warn!("Model returned no usable query for '{}'", phrase);
                    phrase.to_string()
                }
            },
            Err(e) => {
                tracing::warn!("Query synthesis failed for '{}': {}", phrase, e);
                phrase.to_string()
            }
        }
    }
}

/// Reduce a model answer to one bare query line.
fn sanitize_query(answer: &str) -> Option<String> {
    let line = answer
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("```"))?;

    let line = strip_label(line);
    let line = line.trim_matches(|c| c == '`' || c == '"' || c == '\'').trim();

    (!line.is_empty()).then(|| line.to_string())
}

fn strip_label(line: &str) -> &str {
    for label in ["query:", "search query:", "gmail query:"] {
        if let Some(head) = line.get(..label.len())
            && head.eq_ignore_ascii_case(label)
        {
            return line[label.len()..].trim_start();
        }
    }
    line
}
