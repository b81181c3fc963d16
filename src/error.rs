//! Error types for the edgequake-cardscan library.
//!
//! Two tiers mirror the two ways a scan can go wrong:
//!
//! * [`CardScanError`]: **Fatal**: the scan cannot start at all (missing
//!   file, undecodable image, no images, provider not configured). Returned
//!   as `Err(CardScanError)` from the top-level `scan*` functions.
//!
//! * [`StageError`]: **Non-fatal**: one stage (validate or extract) failed
//!   because the model gateway errored or its reply could not be parsed.
//!   The card processor downgrades these into the stage's result object, so
//!   callers always receive a [`crate::output::ProcessingOutcome`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-cardscan library.
///
/// Stage-level failures use [`StageError`] and end up inside
/// [`crate::output::ProcessingOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum CardScanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Card file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file is neither a PDF nor a PNG/JPEG image.
    #[error("Unsupported file format for '{path}' (expected PDF, PNG or JPEG)\nFirst bytes: {magic:?}")]
    UnsupportedFormat { path: PathBuf, magic: [u8; 4] },

    /// The file looked like an image but could not be decoded.
    #[error("Failed to decode image '{path}': {detail}")]
    ImageDecodeFailed { path: PathBuf, detail: String },

    /// No images were supplied to the processor.
    ///
    /// Checked before any gateway call: extraction without an image is an
    /// input defect, not a runtime failure.
    #[error("No card images supplied; at least the front of the card is required")]
    NoImages,

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password; card scans are expected unencrypted.
    #[error("PDF '{path}' is encrypted; export the card as an unencrypted PDF or image.")]
    PasswordRequired { path: PathBuf },

    /// PDF contained no pages to rasterise.
    #[error("PDF '{path}' has no pages")]
    EmptyPdf { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF cards need the pdfium shared library at runtime. Either:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium, or\n\
  • Place libpdfium next to the executable, or\n\
  • Convert the card to PNG/JPEG first.\n"
    )]
    PdfiumBindingFailed(String),

    /// PNG encoding for the transport payload failed.
    #[error("Failed to encode image {index} for upload: {detail}")]
    EncodeFailed { index: usize, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The remote model call failed.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Provider returned an error (network, auth, quota, malformed reply).
    #[error("Model API call failed: {0}")]
    Api(String),

    /// The call did not finish within the configured timeout.
    #[error("Model API call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The call succeeded but the reply carried no text.
    #[error("No content in model response")]
    EmptyResponse,
}

/// Longest slice of the offending text shown by [`ParseError`]'s `Display`.
const PARSE_PREVIEW_CHARS: usize = 200;

/// The model's reply could not be coerced into the expected JSON.
///
/// `text` is the full original reply, kept for diagnostics.
#[derive(Debug, Clone, Error)]
#[error("Could not parse JSON from response: {}", preview(.text))]
pub struct ParseError {
    pub text: String,
    /// Set when JSON was found but did not match the expected record shape.
    pub detail: Option<String>,
}

impl ParseError {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PARSE_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head:?}\u{2026}")
    } else {
        format!("{head:?}")
    }
}

/// A non-fatal failure of one processing stage.
#[derive(Debug, Clone, Error)]
pub enum StageError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Extraction was asked to run without any image.
    #[error("No card images supplied")]
    NoImages,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_images_display() {
        let msg = CardScanError::NoImages.to_string();
        assert!(msg.contains("No card images"), "got: {msg}");
    }

    #[test]
    fn parse_error_keeps_full_text_but_truncates_display() {
        let long = "x".repeat(1000);
        let e = ParseError::new(long.clone());
        assert_eq!(e.text.len(), 1000);
        let msg = e.to_string();
        assert!(msg.len() < 400, "display should be bounded, got {} bytes", msg.len());
        assert!(msg.ends_with('\u{2026}'));
    }

    #[test]
    fn parse_error_short_text_not_truncated() {
        let e = ParseError::new("no json here");
        assert!(e.to_string().contains("no json here"));
        assert!(!e.to_string().ends_with('\u{2026}'));
    }

    #[test]
    fn stage_error_is_transparent() {
        let e: StageError = GatewayError::Timeout { secs: 30 }.into();
        assert_eq!(e.to_string(), "Model API call timed out after 30s");

        let e: StageError = GatewayError::Api("403 Forbidden".into()).into();
        assert!(e.to_string().contains("403 Forbidden"));
    }

    #[test]
    fn unsupported_format_display() {
        let e = CardScanError::UnsupportedFormat {
            path: PathBuf::from("card.gif"),
            magic: *b"GIF8",
        };
        let msg = e.to_string();
        assert!(msg.contains("card.gif"));
        assert!(msg.contains("PDF, PNG or JPEG"));
    }
}
