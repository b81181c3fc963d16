//! Top-level scan entry points.
//!
//! [`scan`] is the one-call API: resolve the front (and optional back) of a
//! card from paths or URLs, encode the images, pick a provider, and run the
//! validate → extract workflow. The lower-level functions let callers bring
//! their own decoded images or their own [`ModelGateway`].

use crate::config::{ScanConfig, DEFAULT_MODEL};
use crate::error::CardScanError;
use crate::output::ProcessingOutcome;
use crate::pipeline::gateway::{LlmGateway, ModelGateway};
use crate::pipeline::{encode, input};
use crate::processor::CardProcessor;
use edgequake_llm::{LLMProvider, ProviderFactory};
use image::DynamicImage;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Scan a card given as one or more files or URLs (front first).
///
/// PDF inputs contribute one image per page. The first resulting image is
/// the one validated.
///
/// # Errors
/// Returns `Err(CardScanError)` only for fatal errors: unreadable or
/// unsupported inputs, no images, or no usable provider. Model and parse
/// failures are reported inside the returned [`ProcessingOutcome`].
pub async fn scan<S: AsRef<str>>(
    inputs: &[S],
    config: &ScanConfig,
    skip_validation: bool,
) -> Result<ProcessingOutcome, CardScanError> {
    let start = Instant::now();
    let images = load_inputs(inputs, config).await?;
    info!(
        "Loaded {} image(s) from {} input(s) in {}ms",
        images.len(),
        inputs.len(),
        start.elapsed().as_millis()
    );
    scan_images(&images, config, skip_validation).await
}

/// Scan already-decoded card images using the configured provider.
pub async fn scan_images(
    images: &[DynamicImage],
    config: &ScanConfig,
    skip_validation: bool,
) -> Result<ProcessingOutcome, CardScanError> {
    if images.is_empty() {
        return Err(CardScanError::NoImages);
    }
    let provider = resolve_provider(config)?;
    let gateway: Arc<dyn ModelGateway> = Arc::new(LlmGateway::new(provider, config));
    scan_images_with(gateway, images, config, skip_validation).await
}

/// Scan decoded images through a caller-supplied gateway.
pub async fn scan_images_with(
    gateway: Arc<dyn ModelGateway>,
    images: &[DynamicImage],
    config: &ScanConfig,
    skip_validation: bool,
) -> Result<ProcessingOutcome, CardScanError> {
    let encoded = encode::encode_all(images)?;
    CardProcessor::from_config(gateway, config)
        .process_card(&encoded, skip_validation)
        .await
}

/// Synchronous wrapper around [`scan`].
///
/// Creates a temporary tokio runtime internally.
pub fn scan_sync<S: AsRef<str>>(
    inputs: &[S],
    config: &ScanConfig,
    skip_validation: bool,
) -> Result<ProcessingOutcome, CardScanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CardScanError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(scan(inputs, config, skip_validation))
}

/// Scan a card and write the outcome as pretty JSON to `output_path`.
///
/// The file is written atomically (temp file in the same directory, then
/// rename), so a crash never leaves half a JSON document behind. The
/// outcome is written whether or not extraction succeeded.
pub async fn scan_to_file<S: AsRef<str>>(
    inputs: &[S],
    output_path: impl AsRef<Path>,
    config: &ScanConfig,
    skip_validation: bool,
) -> Result<ProcessingOutcome, CardScanError> {
    let outcome = scan(inputs, config, skip_validation).await?;
    write_json_atomic(output_path.as_ref(), &outcome)?;
    Ok(outcome)
}

/// Serialise `value` as pretty JSON and atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), CardScanError> {
    let write_err = |source: std::io::Error| CardScanError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CardScanError::Internal(format!("Failed to serialise outcome: {e}")))?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(json.as_bytes()).map_err(write_err)?;
    tmp.write_all(b"\n").map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    debug!("Wrote outcome to {}", path.display());
    Ok(())
}

/// Which provider and model a scan would use.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub provider: String,
    pub model: String,
}

/// Resolve the provider without calling the model.
///
/// A cheap connection check: confirms credentials are present for some
/// provider and reports which one [`scan`] would use.
pub fn check_provider(config: &ScanConfig) -> Result<ProviderInfo, CardScanError> {
    let provider = resolve_provider(config)?;
    Ok(ProviderInfo {
        provider: provider.name().to_string(),
        model: provider.model().to_string(),
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn load_inputs<S: AsRef<str>>(
    inputs: &[S],
    config: &ScanConfig,
) -> Result<Vec<DynamicImage>, CardScanError> {
    let mut images = Vec::new();
    for input_str in inputs {
        let loaded = input::load_card_images(input_str.as_ref(), config).await?;
        debug!("{} → {} image(s)", input_str.as_ref(), loaded.len());
        images.extend(loaded);
    }
    if images.is_empty() {
        return Err(CardScanError::NoImages);
    }
    Ok(images)
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, CardScanError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        CardScanError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`).
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_provider(config: &ScanConfig) -> Result<Arc<dyn LLMProvider>, CardScanError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| CardScanError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
