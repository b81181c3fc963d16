//! # edgequake-cardscan
//!
//! Validate and extract health-insurance cards using Vision Language Models.
//!
//! ## Why this crate?
//!
//! Insurance cards vary wildly in layout: every payer puts the member ID,
//! group number and pharmacy routing codes somewhere different, often in
//! fine print next to logos. Template-based OCR breaks on the next payer.
//! Instead this crate sends the card images to a VLM twice: once to ask
//! "is this an insurance card at all?", and once to transcribe the fields
//! into a fixed JSON record.
//!
//! ## Pipeline Overview
//!
//! ```text
//! front [+ back]   (PNG / JPEG / PDF, path or URL)
//!  │
//!  ├─ 1. Input     resolve local file or download from URL, sniff format
//!  ├─ 2. Render    PDF pages → images via pdfium (spawn_blocking)
//!  ├─ 3. Encode    PNG → base64 ImageData
//!  ├─ 4. Validate  front image → {is_insurance_card, confidence, reason}
//!  ├─ 5. Gate      stop unless the model said "insurance card"
//!  ├─ 6. Extract   all images → named fields + additional_info
//!  └─ 7. Output    ProcessingOutcome (JSON or Markdown)
//! ```
//!
//! Model failures never abort a scan: a failed stage is downgraded into its
//! result object and the caller always gets a [`ProcessingOutcome`]. Only
//! input and configuration problems surface as [`CardScanError`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_cardscan::{scan, ScanConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ScanConfig::default();
//!     let outcome = scan(&["front.jpg", "back.jpg"], &config, false).await?;
//!     if let Some(card) = outcome.extraction.as_ref().filter(|_| outcome.success) {
//!         println!("member id: {:?}", card.member_id);
//!     } else {
//!         eprintln!("scan failed: {:?}", outcome.error);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Bring your own model
//!
//! [`CardProcessor`] talks to the model only through the [`ModelGateway`]
//! trait. [`LlmGateway`] adapts any `edgequake_llm` provider; tests and
//! offline tools can plug in their own implementation and drive
//! [`scan_images_with`] directly.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `cardscan` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-cardscan = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod format;
pub mod output;
pub mod pipeline;
pub mod processor;
pub mod progress;
pub mod prompts;
pub mod scan;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ScanConfig, ScanConfigBuilder, DEFAULT_MODEL};
pub use error::{CardScanError, GatewayError, ParseError, StageError};
pub use format::{format_extraction, format_outcome};
pub use output::{
    Confidence, ExtractionResult, InfoValue, OutcomeStatus, ProcessingOutcome, ValidationResult,
    NOT_AN_INSURANCE_CARD,
};
pub use pipeline::gateway::{LlmGateway, ModelGateway};
pub use pipeline::parse::{parse_json_response, parse_response};
pub use processor::CardProcessor;
pub use progress::{NoopProgressCallback, ProgressCallback, ScanProgressCallback, Stage};
pub use scan::{
    check_provider, resolve_provider, scan, scan_images, scan_images_with, scan_sync,
    scan_to_file, ProviderInfo,
};
