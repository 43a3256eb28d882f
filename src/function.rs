//! Serverless-function adapter.
//!
//! Accepts the event shape used by Netlify/Vercel-style function hosts
//! (`httpMethod`, `body`, `isBase64Encoded`) and produces the matching
//! `{statusCode, headers, body}` response, where `body` is a JSON string.

use crate::relay::{Relay, RelayResponse};
use crate::Error;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionEvent {
    pub http_method: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl From<RelayResponse> for FunctionResponse {
    fn from(response: RelayResponse) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status_code: response.status,
            headers,
            body: response.body_json(),
        }
    }
}

pub async fn handle_event(relay: &Relay, event: FunctionEvent) -> FunctionResponse {
    let body = match decode_body(&event) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!("Rejected function event: {}", e);
            return RelayResponse::from_error(&e).into();
        }
    };

    relay.handle(&event.http_method, &body).await.into()
}

fn decode_body(event: &FunctionEvent) -> crate::Result<Vec<u8>> {
    let raw = event.body.as_deref().unwrap_or_default();
    if event.is_base64_encoded {
        base64::engine::general_purpose::STANDARD
            .decode(raw)
            .map_err(|e| Error::bad_request(format!("Invalid base64 body: {}", e)))
    } else {
        Ok(raw.as_bytes().to_vec())
    }
}
