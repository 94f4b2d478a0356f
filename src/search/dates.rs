//! Calendar helpers for turning matched date phrases into provider tokens.

use chrono::{Datelike, NaiveDate};

use crate::constants::TWO_DIGIT_YEAR_PIVOT;

/// Alternation matching English month names and their common abbreviations.
/// Used inside `\b(...)\b` groups by the month detectors.
pub const MONTH_PATTERN: &str = "jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sept?(?:ember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

/// Format a date the way the provider's `after:`/`before:` operators expect.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y/%m/%d").to_string()
}

/// Expand a two-digit year using the pivot rule. Four-digit input passes through.
pub fn expand_year(digits: &str) -> Option<i32> {
    let value: i32 = digits.parse().ok()?;
    if digits.len() == 4 {
        return Some(value);
    }
    if digits.len() != 2 {
        return None;
    }
    if (value as u32) < TWO_DIGIT_YEAR_PIVOT {
        Some(2000 + value)
    } else {
        Some(1900 + value)
    }
}

/// Month number (1-12) for an English month name or abbreviation.
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let month = match lower.as_str() {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

/// First and last calendar day of a month.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next_first.pred_opt()?))
}

/// January 1st of `year` and of the following year.
pub fn year_bounds(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?,
    ))
}

/// `after:`/`before:` tokens for a month range.
pub fn month_range_tokens(year: i32, month: u32) -> Option<Vec<String>> {
    let (first, last) = month_bounds(year, month)?;
    Some(vec![
        format!("after:{}", format_date(first)),
        format!("before:{}", format_date(last)),
    ])
}

/// Turn one or more explicit dates into range tokens.
///
/// A single date becomes `before:` or `after:` when the phrase says so, and
/// a same-day `after:`/`before:` pair otherwise. Several dates always span
/// from the earliest to the latest.
pub fn explicit_date_tokens(dates: &[NaiveDate], lower_text: &str) -> Vec<String> {
    let (Some(earliest), Some(latest)) = (dates.iter().min(), dates.iter().max()) else {
        return Vec::new();
    };

    if dates.len() == 1 {
        let date = format_date(*earliest);
        if has_word(lower_text, "before") {
            return vec![format!("before:{}", date)];
        }
        if has_word(lower_text, "after") {
            return vec![format!("after:{}", date)];
        }
        return vec![format!("after:{}", date), format!("before:{}", date)];
    }

    vec![
        format!("after:{}", format_date(*earliest)),
        format!("before:{}", format_date(*latest)),
    ]
}

/// Whole-word containment on already-lowercased text.
pub fn has_word(lower_text: &str, word: &str) -> bool {
    lower_text
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| w == word)
}

/// Year used for "last year" phrases.
pub fn previous_year(today: NaiveDate) -> i32 {
    today.year() - 1
}
