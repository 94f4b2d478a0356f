//! Natural-language search phrase to provider search operators.

use std::fmt;
use std::ops::Range;

use chrono::{Local, NaiveDate};
use serde::Serialize;

use super::detectors::{self, Detection};

/// The detector that produced a normalized query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Starred,
    ShortDate,
    BareYear,
    MonthOfLastYear,
    MonthYear,
    IsoDate,
    RelativeDuration,
    CannedPhrase,
}

type Detector = fn(&str, NaiveDate) -> Option<Detection>;

/// Operators the cascade emits. A phrase carrying any of them has already
/// been normalized and is left alone.
const EMITTED_OPERATORS: [&str; 5] = [
    "after:",
    "before:",
    "newer_than:",
    "older_than:",
    "is:starred",
];

impl Rule {
    /// Detectors in precedence order. The first one that fires wins.
    pub const CASCADE: [Rule; 8] = [
        Rule::Starred,
        Rule::ShortDate,
        Rule::BareYear,
        Rule::MonthOfLastYear,
        Rule::MonthYear,
        Rule::IsoDate,
        Rule::RelativeDuration,
        Rule::CannedPhrase,
    ];

    fn detector(self) -> Detector {
        match self {
            Rule::Starred => detectors::starred,
            Rule::ShortDate => detectors::short_date,
            Rule::BareYear => detectors::bare_year,
            Rule::MonthOfLastYear => detectors::month_of_last_year,
            Rule::MonthYear => detectors::month_year,
            Rule::IsoDate => detectors::iso_date,
            Rule::RelativeDuration => detectors::relative_duration,
            Rule::CannedPhrase => detectors::canned_phrase,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rule::Starred => "starred",
            Rule::ShortDate => "short-date",
            Rule::BareYear => "bare-year",
            Rule::MonthOfLastYear => "month-of-last-year",
            Rule::MonthYear => "month-year",
            Rule::IsoDate => "iso-date",
            Rule::RelativeDuration => "relative-duration",
            Rule::CannedPhrase => "canned-phrase",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A query ready to hand to the provider's search endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedQuery {
    pub text: String,
    /// `None` when no detector matched and the phrase passed through as-is
    pub rule: Option<Rule>,
}

impl NormalizedQuery {
    fn passthrough(text: &str) -> Self {
        Self {
            text: text.to_string(),
            rule: None,
        }
    }

    /// Whether a detector recognized the phrase.
    pub fn is_resolved(&self) -> bool {
        self.rule.is_some()
    }
}

impl fmt::Display for NormalizedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Rewrites temporal and status phrases into search operators.
///
/// Holds the reference date so "last year" style phrases are reproducible.
#[derive(Debug, Clone, Copy)]
pub struct QueryNormalizer {
    today: NaiveDate,
}

impl QueryNormalizer {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Normalizer anchored at the local calendar date.
    pub fn for_today() -> Self {
        Self::new(Local::now().date_naive())
    }

    pub fn normalize(&self, phrase: &str) -> NormalizedQuery {
        let text = phrase.trim();
        if text.is_empty() {
            return NormalizedQuery::passthrough("");
        }
        if carries_emitted_operator(text) {
            tracing::debug!("Search phrase '{}' is already normalized", text);
            return NormalizedQuery::passthrough(text);
        }

        for rule in Rule::CASCADE {
            if let Some(detection) = (rule.detector())(text, self.today) {
                let normalized = assemble(text, &detection);
                tracing::debug!("Search phrase '{}' -> '{}' ({})", text, normalized, rule);
                return NormalizedQuery {
                    text: normalized,
                    rule: Some(rule),
                };
            }
        }

        tracing::debug!("Search phrase '{}' passed through unchanged", text);
        NormalizedQuery::passthrough(text)
    }
}

/// Normalize against today's local date.
pub fn normalize(phrase: &str) -> NormalizedQuery {
    QueryNormalizer::for_today().normalize(phrase)
}

fn carries_emitted_operator(text: &str) -> bool {
    text.split_whitespace().any(|word| {
        let word = word.to_ascii_lowercase();
        EMITTED_OPERATORS.iter().any(|op| word.starts_with(op))
    })
}

/// Sender prefix, then operator tokens, then whatever free text is left.
fn assemble(text: &str, detection: &Detection) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(sender) = &detection.sender {
        parts.push(format!("from:{}", sender));
    }
    parts.extend(detection.tokens.iter().cloned());

    if !detection.exclusive {
        let remainder = remainder(text, &detection.consumed);
        if !remainder.is_empty() {
            parts.push(remainder);
        }
    }

    parts.join(" ")
}

/// Text outside the consumed spans, with whitespace collapsed.
fn remainder(text: &str, consumed: &[Range<usize>]) -> String {
    let mut spans: Vec<Range<usize>> = consumed.to_vec();
    spans.sort_by_key(|r| r.start);

    let mut kept = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        if span.start > cursor {
            kept.push_str(&text[cursor..span.start]);
            kept.push(' ');
        }
        cursor = cursor.max(span.end);
    }
    if cursor < text.len() {
        kept.push_str(&text[cursor..]);
    }

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}
