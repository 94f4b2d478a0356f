//! Search phrase to provider query translation
//!
//! A deterministic cascade of phrase detectors handles the common temporal
//! and status phrases ("last week", "older than 3 weeks", "march 2024",
//! "starred"). Anything it does not recognize can be handed to a language
//! model, and failing that goes to the provider as free text.

mod dates;
mod detectors;
mod normalizer;
mod synthesizer;

use serde::Serialize;

use normalizer::Rule;
pub use normalizer::{QueryNormalizer, normalize};
pub use synthesizer::QuerySynthesizer;

use crate::ai::TextGenerator;

/// Where a resolved query came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "rule")]
pub enum QuerySource {
    Rule(Rule),
    Synthesized,
    Passthrough,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedQuery {
    pub text: String,
    pub source: QuerySource,
}

/// Resolve a phrase: detectors first, then the model when one is given.
pub async fn resolve_query<G: TextGenerator>(
    normalizer: &QueryNormalizer,
    synthesizer: Option<&QuerySynthesizer<'_, G>>,
    phrase: &str,
) -> ResolvedQuery {
    let normalized = normalizer.normalize(phrase);
    if let Some(rule) = normalized.rule {
        return ResolvedQuery {
            text: normalized.text,
            source: QuerySource::Rule(rule),
        };
    }

    match synthesizer {
        Some(synthesizer) if !normalized.text.is_empty() => {
            let text = synthesizer.synthesize(&normalized.text).await;
            let source = if text == normalized.text {
                QuerySource::Passthrough
            } else {
                QuerySource::Synthesized
            };
            ResolvedQuery { text, source }
        }
        _ => ResolvedQuery {
            text: normalized.text,
            source: QuerySource::Passthrough,
        },
    }
}
