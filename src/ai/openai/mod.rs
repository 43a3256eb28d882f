pub mod client;
pub mod types;

pub use client::OpenAiCompletionClient;
pub use types::{ChatCompletionRequest, ChatCompletionResponse};
