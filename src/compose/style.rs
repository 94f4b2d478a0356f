//! Writing style matrix and metric bucketing.
//!
//! The matrix is a snapshot of numeric metrics computed from the user's sent
//! mail by another service. This module only reads it: every catalogued
//! metric resolves to a [`Bucket`], and anything missing or unknown is
//! treated as the neutral middle bucket.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use MetricGroup::*;

/// Where a metric value sits within its natural range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Bottom quartile
    Low,
    /// Middle half, and the default for missing values
    Medium,
    /// Top quartile
    High,
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Bucket::Low => "low",
            Bucket::Medium => "medium",
            Bucket::High => "high",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricGroup {
    GreetingAndSignOff,
    Length,
    Vocabulary,
    Punctuation,
    Tone,
    Readability,
    Persona,
    Rhetoric,
}

impl MetricGroup {
    pub const ALL: [MetricGroup; 8] = [
        MetricGroup::GreetingAndSignOff,
        MetricGroup::Length,
        MetricGroup::Vocabulary,
        MetricGroup::Punctuation,
        MetricGroup::Tone,
        MetricGroup::Readability,
        MetricGroup::Persona,
        MetricGroup::Rhetoric,
    ];

    pub fn title(self) -> &'static str {
        match self {
            MetricGroup::GreetingAndSignOff => "Greeting and sign-off",
            MetricGroup::Length => "Sentence and paragraph length",
            MetricGroup::Vocabulary => "Vocabulary",
            MetricGroup::Punctuation => "Punctuation and symbols",
            MetricGroup::Tone => "Tone and formality",
            MetricGroup::Readability => "Readability",
            MetricGroup::Persona => "Pronouns and persona",
            MetricGroup::Rhetoric => "Rhetorical devices",
        }
    }
}

/// One catalogued metric: its natural range and how each bucket should read.
#[derive(Debug, Clone, Copy)]
pub struct MetricSpec {
    pub key: &'static str,
    pub group: MetricGroup,
    pub min: f64,
    pub max: f64,
    pub low: &'static str,
    pub medium: &'static str,
    pub high: &'static str,
}

impl MetricSpec {
    pub fn bucket(&self, value: f64) -> Bucket {
        if !value.is_finite() || self.max <= self.min {
            return Bucket::Medium;
        }
        let position = (value - self.min) / (self.max - self.min);
        if position < 0.25 {
            Bucket::Low
        } else if position > 0.75 {
            Bucket::High
        } else {
            Bucket::Medium
        }
    }

    /// Value that stands in for a missing metric.
    pub fn neutral(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn behavior(&self, bucket: Bucket) -> &'static str {
        match bucket {
            Bucket::Low => self.low,
            Bucket::Medium => self.medium,
            Bucket::High => self.high,
        }
    }
}

const fn metric(
    key: &'static str,
    group: MetricGroup,
    min: f64,
    max: f64,
    behaviors: [&'static str; 3],
) -> MetricSpec {
    MetricSpec {
        key,
        group,
        min,
        max,
        low: behaviors[0],
        medium: behaviors[1],
        high: behaviors[2],
    }
}

pub const METRICS: &[MetricSpec] = &[
    metric("greetingPresent", GreetingAndSignOff, 0.0, 1.0, [
        "a bare greeting, just the recipient's first name and a comma",
        "a short greeting such as \"Hi Sam,\"",
        "a full greeting such as \"Hello Sam,\" on its own line",
    ]),
    metric("greetingNameRate", GreetingAndSignOff, 0.0, 1.0, [
        "greeting without the recipient's name",
        "name the recipient when there is a single one",
        "always name the recipient in the greeting",
    ]),
    metric("signOffPresent", GreetingAndSignOff, 0.0, 1.0, [
        "no sign-off line",
        "short sign-off on longer emails only",
        "always exactly one sign-off line followed by the user's name",
    ]),
    metric("averageSentenceLength", Length, 5.0, 35.0, [
        "short sentences, under 12 words",
        "sentences of 12 to 20 words",
        "long sentences, over 20 words",
    ]),
    metric("averageWordLength", Length, 3.5, 6.5, [
        "plain short words",
        "everyday vocabulary",
        "longer, more technical words",
    ]),
    metric("averageLinesPerParagraph", Length, 1.0, 8.0, [
        "one or two line paragraphs",
        "three to four line paragraphs",
        "dense paragraphs of five lines or more",
    ]),
    metric("paragraphCount", Length, 1.0, 8.0, [
        "a single paragraph",
        "two or three paragraphs",
        "four or more paragraphs",
    ]),
    metric("averageWordCount", Length, 20.0, 400.0, [
        "under 60 words in total",
        "60 to 200 words in total",
        "over 200 words when the request needs it",
    ]),
    metric("typeTokenRatio", Vocabulary, 0.3, 0.9, [
        "repeat the same key words freely",
        "moderate word variety",
        "vary word choice, avoid repeating terms",
    ]),
    metric("hapaxRate", Vocabulary, 0.2, 0.8, [
        "stick to common words",
        "occasional uncommon word",
        "frequent distinctive, uncommon words",
    ]),
    metric("lexicalDensity", Vocabulary, 0.3, 0.7, [
        "conversational, many function words",
        "balanced content and function words",
        "information-dense, noun-heavy phrasing",
    ]),
    metric("jargonRate", Vocabulary, 0.0, 0.1, [
        "no jargon or acronyms",
        "domain terms where they are the natural word",
        "domain jargon and acronyms used freely",
    ]),
    metric("contractionRate", Vocabulary, 0.0, 0.1, [
        "no contractions (do not, I am)",
        "occasional contractions",
        "contractions wherever natural (don't, I'm)",
    ]),
    metric("exclamationRate", Punctuation, 0.0, 0.5, [
        "no exclamation marks",
        "at most one exclamation mark",
        "exclamation marks for warmth and emphasis",
    ]),
    metric("questionRate", Punctuation, 0.0, 0.5, [
        "statements only unless the request asks something",
        "a question where a reply is needed",
        "several direct questions",
    ]),
    metric("emojiRate", Punctuation, 0.0, 0.1, [
        "no emoji",
        "at most one emoji, only in a casual thread",
        "emoji in most paragraphs",
    ]),
    metric("ellipsisRate", Punctuation, 0.0, 0.2, [
        "no ellipses",
        "rare ellipsis",
        "ellipses for trailing thoughts",
    ]),
    metric("parentheticalRate", Punctuation, 0.0, 0.3, [
        "no parenthetical asides",
        "occasional parenthetical aside",
        "frequent parenthetical asides",
    ]),
    metric("dashRate", Punctuation, 0.0, 0.3, [
        "no dashes; use commas and periods",
        "occasional dash",
        "dashes to join and interrupt clauses",
    ]),
    metric("bulletListRate", Punctuation, 0.0, 1.0, [
        "prose only, no lists",
        "a list only for three or more parallel items",
        "bullet lists whenever there are several points",
    ]),
    metric("markupRate", Punctuation, 0.0, 0.2, [
        "no bold or italic markers",
        "emphasis markers on at most one phrase",
        "emphasis markers on key phrases",
    ]),
    metric("hyperlinkRate", Punctuation, 0.0, 0.5, [
        "no links unless given in the request",
        "links given in the request, inline",
        "links on their own lines with a short label",
    ]),
    metric("formalityScore", Tone, 0.0, 1.0, [
        "casual register; greeting like \"Hey\" or \"Hi\", sign-off like \"Cheers\"",
        "neutral business register; greeting like \"Hi\" or \"Hello\", sign-off like \"Best\"",
        "formal register; greeting like \"Dear\", sign-off like \"Kind regards\"",
    ]),
    metric("sentimentPolarity", Tone, -1.0, 1.0, [
        "matter-of-fact, reserved tone",
        "even, polite tone",
        "warm, upbeat tone",
    ]),
    metric("subjectivity", Tone, 0.0, 1.0, [
        "objective statements",
        "some personal opinion",
        "openly personal opinions and feelings",
    ]),
    metric("hedgeRate", Tone, 0.0, 0.2, [
        "direct claims without hedging",
        "light hedging (I think, probably)",
        "frequent hedging and softeners",
    ]),
    metric("certaintyRate", Tone, 0.0, 0.2, [
        "tentative phrasing",
        "confident but measured",
        "assertive phrasing (definitely, clearly)",
    ]),
    metric("politenessRate", Tone, 0.0, 0.2, [
        "no courtesy phrases beyond the greeting",
        "a please or thank you where natural",
        "generous courtesy phrases",
    ]),
    metric("humorRate", Tone, 0.0, 0.1, [
        "no humor",
        "light humor only if the thread is casual",
        "playful remarks",
    ]),
    metric("empathyRate", Tone, 0.0, 0.1, [
        "no empathy phrases",
        "acknowledge feelings when the thread calls for it",
        "explicit empathy phrases (I understand, I hope you're well)",
    ]),
    metric("fleschReadingEase", Readability, 0.0, 100.0, [
        "complex, academic readability",
        "standard readability for a general adult reader",
        "very easy readability, simple syntax",
    ]),
    metric("gunningFogIndex", Readability, 6.0, 20.0, [
        "fog index under 9",
        "fog index 9 to 16",
        "fog index over 16",
    ]),
    metric("passiveVoiceRate", Readability, 0.0, 0.4, [
        "active voice throughout",
        "mostly active voice",
        "passive constructions are common",
    ]),
    metric("subordinateClauseRate", Readability, 0.0, 0.6, [
        "simple sentences, few subordinate clauses",
        "some subordinate clauses",
        "many subordinate clauses",
    ]),
    metric("firstPersonSingularRate", Persona, 0.0, 0.1, [
        "rarely say I or me",
        "use I where natural",
        "speak mostly as I",
    ]),
    metric("firstPersonPluralRate", Persona, 0.0, 0.05, [
        "rarely say we",
        "use we for shared work",
        "speak mostly as we",
    ]),
    metric("secondPersonRate", Persona, 0.0, 0.08, [
        "rarely address the reader as you",
        "address the reader as you where natural",
        "address the reader directly and often",
    ]),
    metric("rhetoricalQuestionRate", Rhetoric, 0.0, 0.2, [
        "no rhetorical questions",
        "rare rhetorical question",
        "rhetorical questions to make points",
    ]),
    metric("imperativeRate", Rhetoric, 0.0, 0.4, [
        "requests phrased as questions or statements",
        "some direct instructions",
        "direct imperatives (Send me, Let's)",
    ]),
    metric("analogyRate", Rhetoric, 0.0, 0.05, [
        "no analogies",
        "occasional comparison",
        "analogies and metaphors",
    ]),
    metric("callToActionRate", Rhetoric, 0.0, 1.0, [
        "no explicit call to action",
        "a call to action when something is needed from the reader",
        "close with a clear call to action",
    ]),
];

/// Look up a catalogued metric by key.
pub fn metric_spec(key: &str) -> Option<&'static MetricSpec> {
    METRICS.iter().find(|m| m.key == key)
}

/// Numeric style profile keyed by metric name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WritingStyleMatrix(BTreeMap<String, f64>);

impl WritingStyleMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object snapshot. Non-numeric entries are skipped.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(json).context("Style profile is not valid JSON")?;
        let object = value
            .as_object()
            .context("Style profile must be a JSON object")?;

        let mut matrix = Self::new();
        for (key, value) in object {
            match value.as_f64() {
                Some(number) => matrix.insert(key, number),
                None => tracing::debug!("Skipping non-numeric style metric '{}'", key),
            }
        }
        Ok(matrix)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read style profile: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse style profile: {}", path.display()))
    }

    pub fn insert(&mut self, key: &str, value: f64) {
        self.0.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied().filter(|v| v.is_finite())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compact JSON of the catalogued metrics with finite values, keys sorted.
    ///
    /// Unknown keys never leave the matrix, so nothing outside the catalog's
    /// identifiers and plain numbers reaches a prompt.
    pub fn to_compact_json(&self) -> serde_json::Result<String> {
        let known: BTreeMap<&str, f64> = self
            .0
            .iter()
            .filter(|(key, value)| metric_spec(key).is_some() && value.is_finite())
            .map(|(key, value)| (key.as_str(), *value))
            .collect();
        serde_json::to_string(&known)
    }

    /// Every catalogued metric with its value (if present) and bucket.
    pub fn report(&self) -> Vec<(&'static MetricSpec, Option<f64>, Bucket)> {
        METRICS
            .iter()
            .map(|spec| {
                let value = self.get(spec.key);
                (spec, value, resolve_metric(self, spec.key))
            })
            .collect()
    }
}

/// Bucket for one metric; missing, unknown and non-finite values are medium.
pub fn resolve_metric(matrix: &WritingStyleMatrix, key: &str) -> Bucket {
    match (metric_spec(key), matrix.get(key)) {
        (Some(spec), Some(value)) => spec.bucket(value),
        _ => Bucket::Medium,
    }
}
