//! Long-running HTTP server exposing the relay at `/api/ask-bot`.

use crate::models::{CompletionResult, Config};
use crate::relay::{Relay, RelayResponse};
use crate::Result;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub const ASK_BOT_PATH: &str = "/api/ask-bot";

impl IntoResponse for RelayResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body)).into_response()
    }
}

// Every verb reaches the relay so that 405 carries the JSON error body.
async fn ask_bot(
    State(relay): State<Relay>,
    method: Method,
    body: std::result::Result<Bytes, BytesRejection>,
) -> RelayResponse {
    match body {
        Ok(body) => relay.handle(method.as_str(), &body).await,
        Err(rejection) => {
            let message = rejection.body_text();
            tracing::warn!(status = %rejection.status(), "Rejected ask-bot body: {}", message);
            RelayResponse {
                status: rejection.status().as_u16(),
                body: CompletionResult::Error(message),
            }
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// CORS layer from a comma separated origin list; empty or `*` allows any origin.
pub fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let trimmed = allowed_origins.trim();
    let allow_origin = if trimmed.is_empty() || trimmed == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = trimmed
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();

        if origins.is_empty() {
            AllowOrigin::any()
        } else {
            AllowOrigin::list(origins)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}

pub fn router(relay: Relay, cors_allowed_origins: &str, max_body_bytes: usize) -> Router {
    Router::new()
        .route(ASK_BOT_PATH, any(ask_bot))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors_layer(cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(relay)
}

/// Bind `config.bind_addr` and serve until Ctrl-C.
pub async fn serve(config: &Config, relay: Relay) -> Result<()> {
    let app = router(relay, &config.cors_allowed_origins, config.max_body_bytes);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Relay listening on http://{}{}", listener.local_addr()?, ASK_BOT_PATH);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Relay shutting down");
        })
        .await?;

    Ok(())
}
