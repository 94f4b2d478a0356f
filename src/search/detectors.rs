//! Individual phrase detectors for the query normalization cascade.
//!
//! Each detector looks at the whole phrase and either declines or returns a
//! [`Detection`]: the operator tokens it produced plus the byte spans of the
//! phrase it consumed. The cascade in `normalizer.rs` decides precedence and
//! stitches the remainder back together.

use std::ops::Range;
use std::sync::LazyLock;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use chrono::{Datelike, NaiveDate};
use regex::Regex;

use super::dates::{
    MONTH_PATTERN, expand_year, explicit_date_tokens, format_date, month_from_name,
    month_range_tokens, previous_year, year_bounds,
};
use crate::constants::{BARE_YEAR_MAX, BARE_YEAR_MIN, RECENCY_BIAS_TOKEN};

/// What a detector recognized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detection {
    /// Provider operator tokens, in emission order
    pub tokens: Vec<String>,
    /// Sender to keep as a `from:` prefix
    pub sender: Option<String>,
    /// Byte spans of the input this detection accounts for
    pub consumed: Vec<Range<usize>>,
    /// Drop every unconsumed term instead of keeping it as free text
    pub exclusive: bool,
}

impl Detection {
    fn new(tokens: Vec<String>, consumed: Vec<Range<usize>>) -> Self {
        Self {
            tokens,
            consumed,
            ..Default::default()
        }
    }
}

const CONNECTIVES: &str = "before|after|since|until|on|between|and|from";

static SHORT_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:(?:{CONNECTIVES})\s+)?(\d{{1,2}})/(\d{{1,2}})/(\d{{2}}(?:\d{{2}})?)\b"
    ))
    .expect("valid short date regex")
});

static BARE_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:(?:from|in|during)\s+)?(\d{4})\b").expect("valid bare year regex")
});

static MONTH_OF_LAST_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:(?:in|during|from)\s+)?({MONTH_PATTERN})\s+of\s+last\s+year\b"
    ))
    .expect("valid month-of-last-year regex")
});

static MONTH_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:(?:in|during|from|of)\s+)?({MONTH_PATTERN}),?\s+(\d{{4}})\b"
    ))
    .expect("valid month-year regex")
});

static ISO_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:(?:{CONNECTIVES})\s+)?(\d{{4}})[-/](\d{{1,2}})[-/](\d{{1,2}})\b"
    ))
    .expect("valid iso date regex")
});

static RELATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(older|newer)\s+than\s+(\d+)\s*(days?|weeks?|months?|years?)\b")
        .expect("valid relative duration regex")
});

static SENDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bfrom\s+([^\s,;]+)").expect("valid sender regex"));

/// Canned phrases in priority order. Index matches `canned_tokens`.
const CANNED_PHRASES: [&str; 8] = [
    "last week",
    "last month",
    "last year",
    "yesterday",
    "today",
    "this week",
    "this month",
    "this year",
];

static CANNED_MATCHER: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasickBuilder::new()
        .ascii_case_insensitive(true)
        .build(CANNED_PHRASES)
        .expect("valid canned phrase automaton")
});

/// Prepositions swallowed together with a canned phrase ("from last week").
const PHRASE_PREPOSITIONS: [&str; 7] = ["from", "since", "in", "during", "of", "for", "over"];

/// True when `pos` falls inside an existing `operator:value` token.
///
/// Keeps every detector from re-interpreting its own output, so the
/// cascade is idempotent on normalized queries.
pub fn inside_operator(text: &str, pos: usize) -> bool {
    let token_start = text[..pos]
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    text[token_start..pos].contains(':')
}

fn char_before(text: &str, pos: usize) -> Option<char> {
    text[..pos].chars().next_back()
}

fn char_after(text: &str, pos: usize) -> Option<char> {
    text[pos..].chars().next()
}

/// Last whitespace-separated word ending before `pos`, with its start offset.
fn word_before(text: &str, pos: usize) -> Option<(usize, &str)> {
    let head = text[..pos].trim_end();
    let start = head
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let word = &head[start..];
    (!word.is_empty()).then_some((start, word))
}

pub fn starred(text: &str, _today: NaiveDate) -> Option<Detection> {
    // "star" also covers "starred"; anything else in the phrase is dropped
    if !text.to_lowercase().contains("star") {
        return None;
    }
    Some(Detection {
        tokens: vec!["is:starred".to_string()],
        consumed: vec![0..text.len()],
        exclusive: true,
        ..Default::default()
    })
}

/// Collect valid calendar dates from a `(year|month|day)` capture regex.
fn collect_dates(
    re: &Regex,
    text: &str,
    build: impl Fn(&regex::Captures<'_>) -> Option<NaiveDate>,
) -> (Vec<NaiveDate>, Vec<Range<usize>>) {
    let mut dates = Vec::new();
    let mut consumed = Vec::new();

    for caps in re.captures_iter(text) {
        let (Some(whole), Some(first)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if inside_operator(text, first.start()) {
            continue;
        }
        match build(&caps) {
            Some(date) => {
                dates.push(date);
                consumed.push(whole.range());
            }
            None => tracing::debug!("Skipping invalid date '{}'", whole.as_str()),
        }
    }

    (dates, consumed)
}

fn capture_u32(caps: &regex::Captures<'_>, index: usize) -> Option<u32> {
    caps.get(index)?.as_str().parse().ok()
}

pub fn short_date(text: &str, _today: NaiveDate) -> Option<Detection> {
    let (dates, consumed) = collect_dates(&SHORT_DATE_RE, text, |caps| {
        let month = capture_u32(caps, 1)?;
        let day = capture_u32(caps, 2)?;
        let year = expand_year(caps.get(3)?.as_str())?;
        NaiveDate::from_ymd_opt(year, month, day)
    });
    if dates.is_empty() {
        return None;
    }

    let mut tokens = explicit_date_tokens(&dates, &text.to_lowercase());
    tokens.push(RECENCY_BIAS_TOKEN.to_string());
    Some(Detection::new(tokens, consumed))
}

pub fn bare_year(text: &str, _today: NaiveDate) -> Option<Detection> {
    for caps in BARE_YEAR_RE.captures_iter(text) {
        let (Some(whole), Some(year_match)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let (start, end) = (year_match.start(), year_match.end());

        // Part of a date, a phone number or an operator value
        if matches!(char_before(text, start), Some('/' | '-' | ':'))
            || matches!(char_after(text, end), Some('/' | '-'))
            || inside_operator(text, start)
        {
            continue;
        }
        // "may 2023" belongs to the month-year detector
        if whole.start() == start
            && word_before(text, start).is_some_and(|(_, w)| month_from_name(w).is_some())
        {
            continue;
        }

        let Ok(year) = year_match.as_str().parse::<i32>() else {
            continue;
        };
        if !(BARE_YEAR_MIN..=BARE_YEAR_MAX).contains(&year) {
            continue;
        }
        let Some((first, next)) = year_bounds(year) else {
            continue;
        };

        let tokens = vec![
            format!("after:{}", format_date(first)),
            format!("before:{}", format_date(next)),
            RECENCY_BIAS_TOKEN.to_string(),
        ];
        return Some(Detection::new(tokens, vec![whole.range()]));
    }
    None
}

pub fn month_of_last_year(text: &str, today: NaiveDate) -> Option<Detection> {
    MONTH_OF_LAST_YEAR_RE.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        let month_match = caps.get(1)?;
        if inside_operator(text, month_match.start()) {
            return None;
        }
        let month = month_from_name(month_match.as_str())?;
        let tokens = month_range_tokens(previous_year(today), month)?;
        Some(Detection::new(tokens, vec![whole.range()]))
    })
}

pub fn month_year(text: &str, _today: NaiveDate) -> Option<Detection> {
    MONTH_YEAR_RE.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        let month_match = caps.get(1)?;
        if inside_operator(text, month_match.start())
            || matches!(char_after(text, whole.end()), Some('/' | '-'))
        {
            return None;
        }
        let month = month_from_name(month_match.as_str())?;
        let year: i32 = caps.get(2)?.as_str().parse().ok()?;
        let tokens = month_range_tokens(year, month)?;
        Some(Detection::new(tokens, vec![whole.range()]))
    })
}

pub fn iso_date(text: &str, _today: NaiveDate) -> Option<Detection> {
    let (dates, consumed) = collect_dates(&ISO_DATE_RE, text, |caps| {
        let year: i32 = caps.get(1)?.as_str().parse().ok()?;
        let month = capture_u32(caps, 2)?;
        let day = capture_u32(caps, 3)?;
        NaiveDate::from_ymd_opt(year, month, day)
    });
    if dates.is_empty() {
        return None;
    }
    let tokens = explicit_date_tokens(&dates, &text.to_lowercase());
    Some(Detection::new(tokens, consumed))
}

pub fn relative_duration(text: &str, _today: NaiveDate) -> Option<Detection> {
    let mut tokens = Vec::new();
    let mut consumed = Vec::new();

    for caps in RELATIVE_RE.captures_iter(text) {
        let (Some(whole), Some(direction), Some(amount), Some(unit)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
        else {
            continue;
        };
        if inside_operator(text, whole.start()) {
            continue;
        }
        let Some(suffix) = unit.as_str().chars().next().map(|c| c.to_ascii_lowercase()) else {
            continue;
        };
        let operator = if direction.as_str().eq_ignore_ascii_case("older") {
            "older_than"
        } else {
            "newer_than"
        };
        tokens.push(format!("{}:{}{}", operator, amount.as_str(), suffix));
        consumed.push(whole.range());
    }

    (!tokens.is_empty()).then(|| Detection::new(tokens, consumed))
}

fn canned_tokens(index: usize, today: NaiveDate) -> Option<Vec<String>> {
    let year = today.year();
    let tokens = match index {
        0 | 5 => vec!["newer_than:7d".to_string()],
        1 | 6 => vec!["newer_than:30d".to_string()],
        2 => {
            let (first, next) = year_bounds(year - 1)?;
            vec![
                format!("after:{}", format_date(first)),
                format!("before:{}", format_date(next)),
            ]
        }
        3 => vec!["newer_than:2d".to_string(), "older_than:1d".to_string()],
        4 => vec!["newer_than:1d".to_string()],
        7 => vec![format!("after:{}", format_date(year_bounds(year)?.0))],
        _ => return None,
    };
    Some(tokens)
}

pub fn canned_phrase(text: &str, today: NaiveDate) -> Option<Detection> {
    let is_word_edge = |c: Option<char>| c.is_none_or(|c| !c.is_alphanumeric());

    // Table order decides between several phrases, then position
    let found = CANNED_MATCHER
        .find_overlapping_iter(text)
        .filter(|m| is_word_edge(char_before(text, m.start())))
        .filter(|m| is_word_edge(char_after(text, m.end())))
        .filter(|m| !inside_operator(text, m.start()))
        .min_by_key(|m| (m.pattern().as_usize(), m.start()))?;

    let tokens = canned_tokens(found.pattern().as_usize(), today)?;

    let mut span_start = found.start();
    if let Some((start, word)) = word_before(text, found.start())
        && PHRASE_PREPOSITIONS.contains(&word.to_lowercase().as_str())
    {
        span_start = start;
    }

    let mut detection = Detection::new(tokens, vec![span_start..found.end()]);

    // "from bob last week": keep the sender, unless "from" just introduces the phrase
    if let Some(caps) = SENDER_RE.captures_iter(text).find(|caps| {
        caps.get(1).is_some_and(|who| {
            who.start() != found.start() && !(span_start..found.end()).contains(&who.start())
        })
    }) && let (Some(whole), Some(who)) = (caps.get(0), caps.get(1))
    {
        detection.sender = Some(who.as_str().to_string());
        detection.consumed.push(whole.range());
    }

    Some(detection)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    #[test]
    fn test_inside_operator() {
        let text = "after:2023/04/05 report";
        assert!(inside_operator(text, 6));
        assert!(!inside_operator(text, 17));
        assert!(!inside_operator("2023/04/05", 0));
    }

    #[test]
    fn test_starred_is_exclusive() {
        let d = starred("Starred emails from bob", today()).unwrap();
        assert_eq!(d.tokens, vec!["is:starred"]);
        assert!(d.exclusive);
        assert!(starred("invoices", today()).is_none());
    }

    #[test]
    fn test_short_date_skips_impossible_dates() {
        assert!(short_date("13/45/23", today()).is_none());
        let d = short_date("02/30/23 or 03/01/23", today()).unwrap();
        assert_eq!(
            d.tokens,
            vec!["after:2023/03/01", "before:2023/03/01", "newer_than:1y"]
        );
        assert_eq!(d.consumed.len(), 1);
    }

    #[test]
    fn test_short_date_consumes_connective() {
        let text = "report before 04/05/23";
        let d = short_date(text, today()).unwrap();
        assert_eq!(d.tokens, vec!["before:2023/04/05", "newer_than:1y"]);
        assert_eq!(&text[d.consumed[0].clone()], "before 04/05/23");
    }

    #[test]
    fn test_bare_year_ignores_dates_and_month_years() {
        assert!(bare_year("2023-05-01", today()).is_none());
        assert!(bare_year("2023/05/01", today()).is_none());
        assert!(bare_year("may 2023", today()).is_none());
        assert!(bare_year("call 555-1234", today()).is_none());
        assert!(bare_year("room 3000", today()).is_none());

        let text = "taxes during 2019";
        let d = bare_year(text, today()).unwrap();
        assert_eq!(&text[d.consumed[0].clone()], "during 2019");
    }

    #[test]
    fn test_month_detectors() {
        let d = month_of_last_year("receipts from february of last year", today()).unwrap();
        assert_eq!(d.tokens, vec!["after:2024/02/01", "before:2024/02/29"]);

        let d = month_year("Sept, 2021 offsite", today()).unwrap();
        assert_eq!(d.tokens, vec!["after:2021/09/01", "before:2021/09/30"]);
    }

    #[test]
    fn test_relative_duration_collects_every_clause() {
        let d = relative_duration("older than 2 months newer than 1 year", today()).unwrap();
        assert_eq!(d.tokens, vec!["older_than:2m", "newer_than:1y"]);
        assert!(relative_duration("older_than:2m", today()).is_none());
    }

    #[test]
    fn test_canned_phrase_priority_follows_table() {
        // "this week" appears first but "yesterday" ranks higher in the table
        let d = canned_phrase("this week or yesterday", today()).unwrap();
        assert_eq!(d.tokens, vec!["newer_than:2d", "older_than:1d"]);
    }

    #[test]
    fn test_canned_phrase_requires_word_edges() {
        assert!(canned_phrase("todays agenda", today()).is_none());
        assert!(canned_phrase("TODAY", today()).is_some());
    }

    #[test]
    fn test_canned_phrase_sender() {
        let d = canned_phrase("emails from bob last week", today()).unwrap();
        assert_eq!(d.sender.as_deref(), Some("bob"));

        let d = canned_phrase("emails from last week", today()).unwrap();
        assert_eq!(d.sender, None);
    }
}
