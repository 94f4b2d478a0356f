//! Language model access for query synthesis and email drafting
//!
//! Everything that talks to a model goes through [`TextGenerator`]: a system
//! prompt and a user prompt in, completion text out. [`OpenRouterClient`] is
//! the production implementation.

mod client;
mod prompts;

use std::future::Future;

pub use client::{AiError, OpenRouterClient};
pub use prompts::SEARCH_QUERY_SYSTEM;

/// Sampling parameters for one completion.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
}

impl GenerationOptions {
    pub fn new(max_tokens: u32, temperature: f32) -> Self {
        Self {
            max_tokens,
            temperature,
            frequency_penalty: None,
            presence_penalty: None,
        }
    }

    pub fn with_penalties(mut self, frequency: Option<f32>, presence: Option<f32>) -> Self {
        self.frequency_penalty = frequency;
        self.presence_penalty = presence;
        self
    }
}

/// A backend that turns a prompt pair into text.
pub trait TextGenerator: Send + Sync {
    fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &GenerationOptions,
    ) -> impl Future<Output = Result<String, AiError>> + Send;
}
