//! Application-wide constants for tuning and configuration
//!
//! Centralizes magic numbers to make them discoverable and configurable.

/// Two-digit years below this value map to 20YY, the rest to 19YY.
pub const TWO_DIGIT_YEAR_PIVOT: u32 = 50;

/// Recency bias appended to date queries that are not month-scoped.
pub const RECENCY_BIAS_TOKEN: &str = "newer_than:1y";

/// Earliest and latest year accepted as a bare year ("in 1987").
pub const BARE_YEAR_MIN: i32 = 1900;
pub const BARE_YEAR_MAX: i32 = 2099;

/// Default number of threads requested from the mail provider.
pub const DEFAULT_MAX_RESULTS: u32 = 20;

/// Number of thread detail requests in flight during a search.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;

/// Token budget for a generated email body.
pub const COMPOSE_MAX_TOKENS: u32 = 1000;

/// Sampling temperature for email generation.
pub const COMPOSE_TEMPERATURE: f32 = 0.7;

/// Token budget for a synthesized search query. Queries are one line.
pub const SEARCH_MAX_TOKENS: u32 = 100;

/// HTTP timeout for LLM and Gmail requests in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 60;

/// Width used when rendering HTML message parts as plain text.
pub const HTML_RENDER_WIDTH: usize = 100;

// === Retry ===

/// Maximum number of retries for a failed LLM call.
pub const AI_MAX_RETRIES: u32 = 3;

/// First backoff delay for LLM retries in milliseconds.
pub const AI_RETRY_INITIAL_MS: u64 = 500;

/// Backoff cap for LLM retries in seconds.
pub const AI_RETRY_MAX_SECS: u64 = 10;
