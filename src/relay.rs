//! Transport-neutral completion relay.
//!
//! Validates one inbound ask-bot request, forwards the caller's turns to the
//! completion provider with fixed sampling parameters, and shapes the outcome
//! as a [`CompletionResult`]. Hosting adapters (`server`, `function`) only
//! translate their transport into a call to [`Relay::handle`].

use crate::ai::{ChatCompletionRequest, ChatCompletionResponse, CompletionService};
use crate::models::{CompletionResult, InboundTurn};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

pub const MODEL: &str = "gpt-4o";
pub const MAX_TOKENS: u32 = 300;
pub const TEMPERATURE: f64 = 0.7;

pub const NO_MESSAGES: &str = "No messages provided";
const PREVIEW_CHARS: usize = 120;

/// Status and body produced for one relay invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayResponse {
    pub status: u16,
    pub body: CompletionResult,
}

impl RelayResponse {
    pub fn reply(text: String) -> Self {
        Self {
            status: 200,
            body: CompletionResult::Reply(text),
        }
    }

    pub fn from_error(err: &Error) -> Self {
        Self {
            status: err.status_code(),
            body: CompletionResult::Error(err.to_string()),
        }
    }

    pub fn body_json(&self) -> String {
        serde_json::to_string(&self.body)
            .unwrap_or_else(|_| r#"{"error":"Failed to encode response"}"#.to_string())
    }
}

/// Stateless relay shared by every hosting adapter.
#[derive(Clone)]
pub struct Relay {
    service: Arc<dyn CompletionService>,
}

impl Relay {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service }
    }

    /// Handle one request: `method` is the inbound HTTP verb, `raw_body` the
    /// undecoded request body.
    pub async fn handle(&self, method: &str, raw_body: &[u8]) -> RelayResponse {
        let span = tracing::info_span!("ask_bot", request_id = %Uuid::new_v4());
        self.dispatch(method, raw_body).instrument(span).await
    }

    async fn dispatch(&self, method: &str, raw_body: &[u8]) -> RelayResponse {
        let messages = match validate(method, raw_body) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(status = e.status_code(), "Rejected ask-bot request: {}", e);
                return RelayResponse::from_error(&e);
            }
        };

        let count = messages.len();
        let preview = messages
            .last()
            .map(|inbound| inbound.turn.preview(PREVIEW_CHARS))
            .unwrap_or_default();

        let request = build_request(messages);
        let response = self.service.complete(&request).await;
        let finish_reason = response
            .as_ref()
            .ok()
            .and_then(|response| response.first_finish_reason())
            .unwrap_or("-")
            .to_string();
        let outcome = response.and_then(|response| extract_reply(&response));

        match outcome {
            Ok(reply) => {
                info!(
                    messages = count,
                    reply_chars = reply.chars().count(),
                    "Relayed completion; last preview: {}",
                    preview
                );
                RelayResponse::reply(reply)
            }
            Err(e) => {
                error!(
                    messages = count,
                    finish_reason = %finish_reason,
                    "Completion failed: {} (last preview: {})", e, preview
                );
                RelayResponse::from_error(&e)
            }
        }
    }
}

/// Check the verb and decode the `messages` sequence.
pub fn validate(method: &str, raw_body: &[u8]) -> Result<Vec<InboundTurn>> {
    if !method.eq_ignore_ascii_case("POST") {
        return Err(Error::method_not_allowed());
    }
    parse_messages(raw_body)
}

/// Decode `{ "messages": [...] }`; an empty body reads as `{}`.
///
/// Each turn is validated as a `ChatTurn` but keeps its original JSON for
/// forwarding.
pub fn parse_messages(raw_body: &[u8]) -> Result<Vec<InboundTurn>> {
    let mut body: serde_json::Value = if raw_body.iter().all(u8::is_ascii_whitespace) {
        serde_json::Value::Object(Default::default())
    } else {
        serde_json::from_slice(raw_body)
            .map_err(|e| Error::bad_request(format!("Invalid JSON body: {}", e)))?
    };

    let raw_messages = match body
        .as_object_mut()
        .and_then(|fields| fields.remove("messages"))
    {
        Some(serde_json::Value::Array(items)) if !items.is_empty() => items,
        _ => return Err(Error::bad_request(NO_MESSAGES)),
    };

    raw_messages
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            InboundTurn::from_value(item)
                .map_err(|e| Error::bad_request(format!("Invalid message at index {}: {}", index, e)))
        })
        .collect()
}

/// Upstream request for `messages`, forwarded as-is with the fixed parameters.
pub fn build_request(messages: Vec<InboundTurn>) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: MODEL.to_string(),
        messages,
        max_tokens: MAX_TOKENS,
        temperature: TEMPERATURE,
    }
}

/// First choice's text; blank or absent content is an error.
pub fn extract_reply(response: &ChatCompletionResponse) -> Result<String> {
    match response.first_text() {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(Error::ContentMissing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockCompletionClient;
    use crate::error::CONTENT_MISSING_MESSAGE;
    use crate::models::{Role, TurnContent};
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::sync::Mutex;

    fn relay_with(mock: MockCompletionClient) -> (Relay, Arc<MockCompletionClient>) {
        let mock = Arc::new(mock);
        (Relay::new(mock.clone()), mock)
    }

    fn body(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_fixed_parameters() {
        assert_eq!(MODEL, "gpt-4o");
        assert_eq!(MAX_TOKENS, 300);
        assert_eq!(TEMPERATURE, 0.7);

        let request = build_request(vec![InboundTurn::text(Role::User, "hi")]);
        assert_eq!(request.model, MODEL);
        assert_eq!(request.max_tokens, MAX_TOKENS);
        assert_eq!(request.temperature, TEMPERATURE);
    }

    #[tokio::test]
    async fn test_missing_or_empty_messages_rejected_without_upstream_call() {
        let (relay, mock) = relay_with(MockCompletionClient::new());

        let bodies: Vec<Vec<u8>> = vec![
            Vec::new(),
            body(serde_json::json!({})),
            body(serde_json::json!({ "messages": [] })),
            body(serde_json::json!({ "messages": "hello" })),
            body(serde_json::json!({ "messages": null })),
            body(serde_json::json!([{ "role": "user", "content": "hi" }])),
        ];

        for raw in bodies {
            let response = relay.handle("POST", &raw).await;
            assert_eq!(response.status, 400);
            assert_eq!(
                response.body,
                CompletionResult::Error(NO_MESSAGES.to_string())
            );
        }
        assert_eq!(mock.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_non_post_rejected_without_upstream_call() {
        let (relay, mock) = relay_with(MockCompletionClient::new());
        let raw = body(serde_json::json!({ "messages": [{ "role": "user", "content": "hi" }] }));

        for method in ["GET", "PUT", "DELETE", "PATCH", "OPTIONS"] {
            let response = relay.handle(method, &raw).await;
            assert_eq!(response.status, 405);
            assert_eq!(
                response.body,
                CompletionResult::Error("Method not allowed".to_string())
            );
        }
        assert_eq!(mock.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_json_and_turns_are_bad_requests() {
        let (relay, mock) = relay_with(MockCompletionClient::new());

        let response = relay.handle("POST", b"{not json").await;
        assert_eq!(response.status, 400);

        let response = relay
            .handle(
                "POST",
                &body(serde_json::json!({ "messages": [
                    { "role": "user", "content": "ok" },
                    { "role": "wizard", "content": "nope" }
                ] })),
            )
            .await;
        assert_eq!(response.status, 400);
        match response.body {
            CompletionResult::Error(message) => assert!(message.contains("index 1")),
            other => panic!("unexpected body: {:?}", other),
        }
        assert_eq!(mock.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_successful_reply() {
        let (relay, mock) = relay_with(MockCompletionClient::new().with_reply("4".to_string()));

        let response = relay
            .handle(
                "POST",
                &body(serde_json::json!({ "messages": [{ "role": "user", "content": "2+2?" }] })),
            )
            .await;

        assert_eq!(response, RelayResponse::reply("4".to_string()));
        assert_eq!(response.body_json(), r#"{"reply":"4"}"#);
        assert_eq!(mock.get_call_count(), 1);
    }

    #[tokio::test]
    async fn test_lowercase_post_is_accepted() {
        let (relay, _mock) = relay_with(MockCompletionClient::new().with_reply("ok".to_string()));
        let response = relay
            .handle(
                "post",
                &body(serde_json::json!({ "messages": [{ "role": "user", "content": "hi" }] })),
            )
            .await;
        assert_eq!(response.status, 200);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_upstream_error_is_500_and_logged() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (relay, mock) =
            relay_with(MockCompletionClient::new().with_error("timeout".to_string()));

        let response = relay
            .handle(
                "POST",
                &body(serde_json::json!({ "messages": [{ "role": "user", "content": "2+2?" }] })),
            )
            .await;

        assert_eq!(response.status, 500);
        assert_eq!(response.body, CompletionResult::Error("timeout".to_string()));
        assert_eq!(mock.get_call_count(), 1);

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Completion failed: timeout"));
        assert!(output.contains("2+2?"));
    }

    #[tokio::test]
    async fn test_empty_or_missing_content_is_500() {
        let (relay, _mock) = relay_with(
            MockCompletionClient::new()
                .with_reply(String::new())
                .with_missing_content()
                .with_reply("   ".to_string()),
        );
        let raw = body(serde_json::json!({ "messages": [{ "role": "user", "content": "hi" }] }));

        for _ in 0..3 {
            let response = relay.handle("POST", &raw).await;
            assert_eq!(response.status, 500);
            assert_eq!(
                response.body,
                CompletionResult::Error(CONTENT_MISSING_MESSAGE.to_string())
            );
        }
    }

    #[tokio::test]
    async fn test_identical_calls_build_identical_upstream_bodies() {
        let (relay, mock) = relay_with(MockCompletionClient::new());
        let raw = body(serde_json::json!({ "messages": [
            { "role": "system", "content": "You are a patient tutor." },
            { "role": "user", "content": "Explain fractions" }
        ] }));

        relay.handle("POST", &raw).await;
        relay.handle("POST", &raw).await;

        let recorded = mock.recorded_requests();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0], recorded[1]);

        let sent: serde_json::Value = serde_json::from_str(&recorded[0]).unwrap();
        assert_eq!(sent["model"], MODEL);
        assert_eq!(sent["max_tokens"], MAX_TOKENS);
        assert_eq!(sent["temperature"], TEMPERATURE);
    }

    #[tokio::test]
    async fn test_forwarded_messages_preserve_order_and_content() {
        let (relay, mock) = relay_with(MockCompletionClient::new());
        let messages = serde_json::json!([
            { "role": "system", "content": "Tutor for Sam, age 10, topic: fractions" },
            { "role": "user", "content": "What is 1/2 + 1/4?" },
            { "role": "assistant", "content": "Let's find a common denominator." },
            { "role": "user", "content": [
                { "type": "text", "text": "Here is my worksheet" },
                { "type": "image_url", "image_url": { "url": "data:image/png;base64,iVBORw0KGgo=" } }
            ] },
            { "role": "system", "content": "Keep answers short." }
        ]);

        relay
            .handle("POST", &body(serde_json::json!({ "messages": messages })))
            .await;

        let sent: serde_json::Value =
            serde_json::from_str(&mock.recorded_requests()[0]).unwrap();
        assert_eq!(sent["messages"], messages);
    }

    #[tokio::test]
    async fn test_unmodelled_fields_are_forwarded_verbatim() {
        let (relay, mock) = relay_with(MockCompletionClient::new());
        let messages = serde_json::json!([
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": "hi", "cache_control": { "type": "ephemeral" } },
                    { "type": "image_url", "image_url": { "url": "https://example.com/a.png", "detail": "low", "hint": 3 } }
                ],
                "extra": 1
            }
        ]);

        let response = relay
            .handle("POST", &body(serde_json::json!({ "messages": messages })))
            .await;
        assert_eq!(response.status, 200);

        let sent: serde_json::Value =
            serde_json::from_str(&mock.recorded_requests()[0]).unwrap();
        assert_eq!(sent["messages"], messages);
    }

    #[tokio::test]
    async fn test_missing_content_logs_finish_reason() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (relay, _mock) =
            relay_with(MockCompletionClient::new().with_missing_content_because("length"));

        let response = relay
            .handle(
                "POST",
                &body(serde_json::json!({ "messages": [{ "role": "user", "content": "essay please" }] })),
            )
            .await;
        assert_eq!(response.status, 500);

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("finish_reason=length"));
    }

    #[test]
    fn test_parse_messages_keeps_turn_types() {
        let turns = parse_messages(
            br#"{"messages":[{"role":"assistant","content":"hello","name":"tutor"}]}"#,
        )
        .unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].turn.role, Role::Assistant);
        assert_eq!(turns[0].turn.content, TurnContent::Text("hello".to_string()));
        assert_eq!(turns[0].turn.name.as_deref(), Some("tutor"));
    }
}
