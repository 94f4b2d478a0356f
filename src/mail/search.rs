//! Natural-language mailbox search

use futures::stream::{self, StreamExt};

use super::driver::{DriverError, MailDriver};
use super::types::{Folder, ThreadSummary};
use crate::ai::TextGenerator;
use crate::config::SearchConfig;
use crate::search::{QueryNormalizer, QuerySynthesizer, ResolvedQuery, resolve_query};

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub folder: Folder,
    pub max_results: u32,
    /// Thread fetches in flight at once
    pub concurrency: usize,
}

impl SearchOptions {
    pub fn from_config(config: &SearchConfig) -> Result<Self, String> {
        Ok(Self {
            folder: config.folder.parse()?,
            max_results: config.max_results,
            concurrency: config.fetch_concurrency,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SearchResults {
    pub query: ResolvedQuery,
    /// In the provider's order
    pub threads: Vec<ThreadSummary>,
    pub next_page_token: Option<String>,
}

/// Resolve `phrase` to a provider query, list matching threads and fetch a
/// summary of each.
///
/// Threads are fetched with at most `options.concurrency` requests in flight
/// and returned in listing order. A thread that fails to load is logged and
/// left out; a failed listing fails the search.
pub async fn search_threads<D, G>(
    driver: &D,
    normalizer: &QueryNormalizer,
    synthesizer: Option<&QuerySynthesizer<'_, G>>,
    phrase: &str,
    options: &SearchOptions,
) -> Result<SearchResults, DriverError>
where
    D: MailDriver,
    G: TextGenerator,
{
    let query = resolve_query(normalizer, synthesizer, phrase).await;
    tracing::info!(
        "Searching {} for '{}' ({:?})",
        options.folder,
        query.text,
        query.source
    );

    let list = driver
        .list(options.folder, &query.text, options.max_results)
        .await?;

    let fetched: Vec<_> = stream::iter(list.threads)
        .map(|thread| async move {
            let detail = driver.get(&thread.id).await;
            (thread, detail)
        })
        .buffered(options.concurrency.max(1))
        .collect()
        .await;

    let threads = fetched
        .into_iter()
        .filter_map(|(thread, detail)| match detail {
            Ok(detail) => Some(ThreadSummary::from_detail(&detail, &thread.snippet)),
            Err(e) => {
                tracing::warn!("Skipping thread {}: {}", thread.id, e);
                None
            }
        })
        .collect();

    Ok(SearchResults {
        query,
        threads,
        next_page_token: list.next_page_token,
    })
}
