//! Application wiring: configuration, provider client, and hosting adapters.

use crate::ai::{CompletionService, OpenAiCompletionClient};
use crate::function::{self, FunctionEvent, FunctionResponse};
use crate::models::Config;
use crate::relay::{self, Relay};
use crate::{server, Result};
use std::sync::Arc;
use tracing::info;

pub struct App {
    config: Config,
    relay: Relay,
}

impl App {
    /// Build an app around an explicit completion service.
    ///
    /// Used by tests and harnesses that inject mocks.
    pub fn with_service(config: Config, service: Arc<dyn CompletionService>) -> Self {
        Self {
            config,
            relay: Relay::new(service),
        }
    }

    /// Construct an app from environment configuration (`Config::from_env`).
    pub fn new() -> Result<Self> {
        Self::from_config(Config::from_env()?)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let client = OpenAiCompletionClient::new(
            config.openai_api_key.clone(),
            config.upstream_timeout,
        )?
        .with_base_url(config.openai_base_url.clone());

        info!(
            "Completion provider: {} (model: {}, max_tokens: {}, temperature: {})",
            config.openai_base_url,
            relay::MODEL,
            relay::MAX_TOKENS,
            relay::TEMPERATURE
        );

        Ok(Self::with_service(config, Arc::new(client)))
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    pub async fn serve(self) -> Result<()> {
        server::serve(&self.config, self.relay).await
    }

    pub async fn invoke(&self, event: FunctionEvent) -> FunctionResponse {
        function::handle_event(&self.relay, event).await
    }
}
