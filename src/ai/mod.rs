//! Completion provider integration
//!
//! `CompletionService` is the seam between the relay core and the hosted
//! chat-completion API. The OpenAI client talks to the real provider; the
//! mock records requests and replays scripted outcomes for tests.

pub mod mock;
pub mod openai;

pub use mock::MockCompletionClient;
pub use openai::{ChatCompletionRequest, ChatCompletionResponse, OpenAiCompletionClient};

use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Issue exactly one completion call for `request`.
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse>;
}
