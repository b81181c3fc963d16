//! Model gateway: send a prompt plus images to a vision model, get text back.
//!
//! The processor depends only on [`ModelGateway`]; authentication, region,
//! model choice and transport live behind it. [`LlmGateway`] is the
//! production implementation over an `edgequake-llm` provider; tests plug in
//! scripted gateways instead.
//!
//! ## Message Layout
//!
//! One user message carrying every image followed by the prompt text. No
//! system message: the prompts are self-contained instructions.

use crate::config::ScanConfig;
use crate::error::GatewayError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Synchronous request/reply contract with the hosted model.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Send `prompt` with `images` and return the model's raw text reply.
    async fn invoke(&self, prompt: &str, images: &[ImageData]) -> Result<String, GatewayError>;
}

/// [`ModelGateway`] backed by an `edgequake-llm` provider.
pub struct LlmGateway {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    timeout_secs: u64,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl LlmGateway {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ScanConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            timeout_secs: config.api_timeout_secs,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    async fn invoke_once(&self, messages: &[ChatMessage]) -> Result<String, GatewayError> {
        let start = Instant::now();
        let call = self.provider.chat(messages, Some(&self.options));
        let response = timeout(Duration::from_secs(self.timeout_secs), call)
            .await
            .map_err(|_| GatewayError::Timeout {
                secs: self.timeout_secs,
            })?
            .map_err(|e| GatewayError::Api(e.to_string()))?;

        debug!(
            "Model reply: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        if response.content.trim().is_empty() {
            return Err(GatewayError::EmptyResponse);
        }
        Ok(response.content)
    }
}

#[async_trait]
impl ModelGateway for LlmGateway {
    async fn invoke(&self, prompt: &str, images: &[ImageData]) -> Result<String, GatewayError> {
        let messages = vec![ChatMessage::user_with_images(prompt, images.to_vec())];

        let mut attempt = 0;
        loop {
            match self.invoke_once(&messages).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                    warn!(
                        "Model call failed ({}); retry {}/{} after {}ms",
                        e, attempt, self.max_retries, backoff
                    );
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Build `CompletionOptions` from the scan config.
fn build_options(config: &ScanConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
