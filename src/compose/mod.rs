//! Style-conditioned email drafting
//!
//! A request-scoped [`PromptContext`] (thread, recipients, instruction and an
//! optional [`WritingStyleMatrix`]) becomes a fixed system prompt plus an
//! XML-tagged user prompt; the model's answer is cleaned down to body text.

mod generate;
mod prompt;
mod style;
mod system_prompt;

pub use generate::{ComposeError, generate_email_body};
pub use prompt::{PromptContext, ThreadMessage, build_prompt};
pub use style::{Bucket, WritingStyleMatrix};
