use super::{ChatCompletionRequest, ChatCompletionResponse, CompletionService};
use crate::ai::openai::types::{AssistantMessage, ChatChoice};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Scripted outcome for one mocked completion call.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Reply {
        content: Option<String>,
        finish_reason: String,
    },
    Fail(String),
}

pub struct MockCompletionClient {
    outcomes: Arc<Mutex<Vec<MockOutcome>>>,
    requests: Arc<Mutex<Vec<String>>>,
    call_count: Arc<Mutex<usize>>,
}

impl MockCompletionClient {
    pub fn new() -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_reply(self, reply: String) -> Self {
        self.outcomes.lock().unwrap().push(MockOutcome::Reply {
            content: Some(reply),
            finish_reason: "stop".to_string(),
        });
        self
    }

    /// Choice whose message has null content.
    pub fn with_missing_content(self) -> Self {
        self.with_missing_content_because("stop")
    }

    pub fn with_missing_content_because(self, finish_reason: &str) -> Self {
        self.outcomes.lock().unwrap().push(MockOutcome::Reply {
            content: None,
            finish_reason: finish_reason.to_string(),
        });
        self
    }

    pub fn with_error(self, message: String) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .push(MockOutcome::Fail(message));
        self
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Serialized request bodies, in call order.
    pub fn recorded_requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockCompletionClient {
    fn default() -> Self {
        Self::new()
    }
}

fn response_with(content: Option<String>, finish_reason: &str) -> ChatCompletionResponse {
    ChatCompletionResponse {
        choices: vec![ChatChoice {
            message: AssistantMessage { content },
            finish_reason: Some(finish_reason.to_string()),
        }],
    }
}

#[async_trait]
impl CompletionService for MockCompletionClient {
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        let mut count = self.call_count.lock().unwrap();
        *count += 1;

        self.requests
            .lock()
            .unwrap()
            .push(serde_json::to_string(request)?);

        let outcomes = self.outcomes.lock().unwrap();
        if outcomes.is_empty() {
            return Ok(response_with(Some("Mock tutor reply".to_string()), "stop"));
        }

        match &outcomes[(*count - 1) % outcomes.len()] {
            MockOutcome::Reply {
                content,
                finish_reason,
            } => Ok(response_with(content.clone(), finish_reason)),
            MockOutcome::Fail(message) => Err(Error::Upstream(message.clone())),
        }
    }
}
