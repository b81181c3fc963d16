//! Configuration types for insurance card scanning.
//!
//! Every knob lives in [`ScanConfig`], built via its [`ScanConfigBuilder`].
//! The config is passed by reference into each scan; nothing here is global,
//! so two concurrent scans with different models never interfere.

use crate::error::CardScanError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Model used when a provider is named but no model is given.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Configuration for a card scan.
///
/// Built via [`ScanConfig::builder()`] or using [`ScanConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_cardscan::ScanConfig;
///
/// let config = ScanConfig::builder()
///     .dpi(200)
///     .model("gpt-4.1")
///     .api_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ScanConfig {
    /// LLM model identifier, e.g. "gpt-4.1", "claude-sonnet-4-20250514".
    /// If None, uses [`DEFAULT_MODEL`] or the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Card fields are transcribed, not composed; zero keeps repeated scans
    /// of the same card stable.
    pub temperature: f32,

    /// Maximum tokens the model may generate per stage. Default: 4096.
    pub max_tokens: usize,

    /// Retries inside the gateway on a failed model call. Default: 0.
    ///
    /// The processor itself never retries; a failed call degrades the stage.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Rendering DPI for PDF cards. Range: 72–600. Default: 300.
    ///
    /// Cards are small; 300 DPI keeps the fine print (RxBIN, RxPCN, phone
    /// numbers) legible while a card-sized page stays around 1000 px wide.
    pub dpi: u32,

    /// Longest edge of a rasterised PDF page in pixels. Default: 3000.
    ///
    /// Guards against a "card" PDF that is really a full letter-size page.
    pub max_rendered_pixels: u32,

    /// Validation prompt override. If None, uses
    /// [`crate::prompts::VALIDATION_PROMPT`].
    pub validation_prompt: Option<String>,

    /// Extraction prompt override. If None, uses
    /// [`crate::prompts::EXTRACTION_PROMPT`].
    pub extraction_prompt: Option<String>,

    /// Receives stage events while a scan runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            download_timeout_secs: 60,
            dpi: 300,
            max_rendered_pixels: 3000,
            validation_prompt: None,
            extraction_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("validation_prompt", &self.validation_prompt.is_some())
            .field("extraction_prompt", &self.extraction_prompt.is_some())
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ScanProgressCallback>"),
            )
            .finish()
    }
}

impl ScanConfig {
    /// Create a new builder for `ScanConfig`.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ScanConfig`].
#[derive(Debug)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn validation_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.validation_prompt = Some(prompt.into());
        self
    }

    pub fn extraction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.extraction_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScanConfig, CardScanError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(CardScanError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(CardScanError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        for (name, prompt) in [
            ("validation", &c.validation_prompt),
            ("extraction", &c.extraction_prompt),
        ] {
            if prompt.as_deref().is_some_and(|p| p.trim().is_empty()) {
                return Err(CardScanError::InvalidConfig(format!(
                    "{name} prompt override is empty"
                )));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ScanConfig::default();
        assert_eq!(c.temperature, 0.0);
        assert_eq!(c.max_tokens, 4096);
        assert_eq!(c.max_retries, 0);
        assert_eq!(c.dpi, 300);
        assert!(c.provider.is_none());
    }

    #[test]
    fn builder_clamps() {
        let c = ScanConfig::builder()
            .dpi(10)
            .temperature(5.0)
            .max_rendered_pixels(1)
            .build()
            .unwrap();
        assert_eq!(c.dpi, 72);
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.max_rendered_pixels, 100);
    }

    #[test]
    fn build_rejects_zero_tokens() {
        let err = ScanConfig::builder().max_tokens(0).build().unwrap_err();
        assert!(matches!(err, CardScanError::InvalidConfig(_)));
    }

    #[test]
    fn build_rejects_blank_prompt_override() {
        let err = ScanConfig::builder()
            .extraction_prompt("   ")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("extraction prompt"));
    }

    #[test]
    fn debug_hides_provider_and_prompts() {
        let c = ScanConfig::builder()
            .validation_prompt("secret wording")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret wording"));
        assert!(dbg.contains("validation_prompt: true"));
    }
}
