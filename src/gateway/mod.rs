//! LLM gateway: the `generateText` boundary and an OpenRouter-backed client.

pub mod error;
pub mod openrouter;
pub mod types;
pub mod usage;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use openrouter::{ChatProvider, OpenRouterAdapter};
use usage::{ProviderCallRecord, UsageSink as UsageSinkTrait};

pub use error::{ErrorContext, ProviderError};
pub use types::*;
pub use usage::{NoopUsageSink, TracingUsageSink, UsageSink};

/// The host's text-generation primitive.
///
/// The only network-calling collaborator of a run. Callers impose their own
/// timeout around it.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate_text(
        &self,
        space_id: &str,
        prompt: &str,
        personality_id: &str,
    ) -> Result<LlmReply, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Transparent retries for transient provider failures (429, 5xx, connect).
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_base_delay: Duration::from_secs(1),
            temperature: 0.7,
            max_tokens: None,
        }
    }
}

/// [`LlmClient`] backed by a chat provider, routing personalities to models.
pub struct ProviderGateway<P: ChatProvider, U: UsageSinkTrait> {
    provider: P,
    usage_sink: Arc<U>,
    routing: ModelRouting,
    config: GatewayConfig,
}

impl<U: UsageSinkTrait> ProviderGateway<OpenRouterAdapter, U> {
    pub fn from_env(usage_sink: Arc<U>) -> Result<Self, ProviderError> {
        let provider = OpenRouterAdapter::from_env()?;
        Ok(Self::with_config(
            provider,
            usage_sink,
            ModelRouting::from_env(),
            GatewayConfig::default(),
        ))
    }
}

impl<P: ChatProvider, U: UsageSinkTrait> ProviderGateway<P, U> {
    pub fn with_config(
        provider: P,
        usage_sink: Arc<U>,
        routing: ModelRouting,
        config: GatewayConfig,
    ) -> Self {
        Self {
            provider,
            usage_sink,
            routing,
            config,
        }
    }

    pub fn routing(&self) -> &ModelRouting {
        &self.routing
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..=self.config.max_retries {
            match self.provider.chat(&req).await {
                Ok(resp) => {
                    self.record_usage(&req, &resp, None).await;
                    return Ok(resp);
                }
                Err(err) => {
                    self.record_usage(&req, &ChatResponse::empty(), Some(err.code()))
                        .await;

                    if !err.is_retryable() || attempt == self.config.max_retries {
                        return Err(err);
                    }

                    let delay = backoff_delay(self.config.retry_base_delay, attempt);
                    tracing::debug!(
                        model = %req.model,
                        attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "transient provider error; retrying"
                    );
                    last_error = Some(err);
                    sleep(delay).await;
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ProviderError::provider("openrouter", "unknown error", false)))
    }

    async fn record_usage(&self, req: &ChatRequest, resp: &ChatResponse, error: Option<&str>) {
        let record = ProviderCallRecord::new(&req.model, req.attribution.caller)
            .attributed(&req.attribution.space_id, &req.attribution.personality_id)
            .tokens(resp.input_tokens, resp.output_tokens)
            .latency(resp.latency.as_millis() as u64);
        let record = match error {
            Some(code) => record.error(code),
            None => record,
        };
        self.usage_sink.record(record).await;
    }
}

#[async_trait::async_trait]
impl<P: ChatProvider, U: UsageSinkTrait> LlmClient for ProviderGateway<P, U> {
    async fn generate_text(
        &self,
        space_id: &str,
        prompt: &str,
        personality_id: &str,
    ) -> Result<LlmReply, ProviderError> {
        let attribution = Attribution::new("gateway::generate_text")
            .with_space(space_id)
            .with_personality(personality_id);
        let mut req = ChatRequest::new(
            self.routing.model_for(personality_id),
            vec![Message::user(prompt)],
            attribution,
        )
        .temperature(self.config.temperature);
        if let Some(max) = self.config.max_tokens {
            req = req.max_tokens(max);
        }

        let resp = self.chat(req).await?;
        Ok(LlmReply::new(resp.content))
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let multiplier = 2u64.pow(attempt.min(5));
    base * multiplier as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(400));
        assert_eq!(backoff_delay(base, 9), Duration::from_millis(3200));
    }
}
