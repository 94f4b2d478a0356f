//! Provider-neutral mailbox access

use std::future::Future;

use reqwest::StatusCode;

use super::types::{Folder, OutgoingMessage, ThreadDetail, ThreadList};
use crate::retry::Retryable;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("failed to reach mail provider: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail provider error ({status}): {body}")]
    Api { status: StatusCode, body: String },
    #[error("failed to build outgoing message: {0}")]
    Build(#[from] std::io::Error),
}

impl Retryable for DriverError {
    fn is_retryable(&self) -> bool {
        match self {
            DriverError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            DriverError::Api { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            DriverError::Build(_) => false,
        }
    }
}

/// A mailbox backend. Only listing, reading and sending are needed here.
pub trait MailDriver: Send + Sync {
    /// Threads in `folder` matching the provider search `query`, newest first.
    fn list(
        &self,
        folder: Folder,
        query: &str,
        max_results: u32,
    ) -> impl Future<Output = Result<ThreadList, DriverError>> + Send;

    /// A full thread with decoded message bodies, oldest message first.
    fn get(&self, thread_id: &str) -> impl Future<Output = Result<ThreadDetail, DriverError>> + Send;

    /// Send a message and return the provider's message id.
    fn send(
        &self,
        message: &OutgoingMessage,
    ) -> impl Future<Output = Result<String, DriverError>> + Send;
}
