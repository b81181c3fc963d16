//! Input resolution: turn a user-supplied path or URL into card images.
//!
//! A card side arrives as a PNG/JPEG photo or as a PDF scan. The format is
//! sniffed from magic bytes (extension only as a fallback) so a phone
//! photo saved as `card.pdf` still loads. PDFs contribute one image per page.

use crate::config::ScanConfig;
use crate::error::CardScanError;
use crate::pipeline::render;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File formats accepted for a card side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardFormat {
    Pdf,
    Png,
    Jpeg,
}

/// Raw bytes of one card side plus where they came from.
#[derive(Debug)]
pub struct CardSource {
    /// Local path, or the URL for downloaded inputs.
    pub origin: PathBuf,
    pub bytes: Vec<u8>,
    pub format: CardFormat,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Identify the format from magic bytes, falling back to the extension.
pub fn sniff_format(bytes: &[u8], path: &Path) -> Option<CardFormat> {
    if bytes.starts_with(b"%PDF") {
        return Some(CardFormat::Pdf);
    }
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some(CardFormat::Png);
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(CardFormat::Jpeg);
    }
    // Unknown header: let the image decoder have a go (and report a decode
    // error) when the extension claims an image.
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => Some(CardFormat::Png),
        Some("jpg" | "jpeg") => Some(CardFormat::Jpeg),
        _ => None,
    }
}

/// Read a local file or download a URL into a [`CardSource`].
pub async fn read_source(input: &str, timeout_secs: u64) -> Result<CardSource, CardScanError> {
    let (origin, bytes) = if is_url(input) {
        (PathBuf::from(input), download_url(input, timeout_secs).await?)
    } else {
        let path = PathBuf::from(input);
        let bytes = read_local(&path).await?;
        (path, bytes)
    };

    let format = sniff_format(&bytes, &origin).ok_or_else(|| {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        CardScanError::UnsupportedFormat {
            path: origin.clone(),
            magic,
        }
    })?;

    debug!("Resolved {} as {:?} ({} bytes)", origin.display(), format, bytes.len());
    Ok(CardSource {
        origin,
        bytes,
        format,
    })
}

/// Decode a [`CardSource`] into images (one per PDF page, or one photo).
pub async fn decode_source(
    source: CardSource,
    config: &ScanConfig,
) -> Result<Vec<DynamicImage>, CardScanError> {
    match source.format {
        CardFormat::Pdf => render::render_pdf(source.origin, source.bytes, config).await,
        CardFormat::Png | CardFormat::Jpeg => {
            let img = image::load_from_memory(&source.bytes).map_err(|e| {
                CardScanError::ImageDecodeFailed {
                    path: source.origin.clone(),
                    detail: e.to_string(),
                }
            })?;
            debug!(
                "Decoded {} → {}x{} px",
                source.origin.display(),
                img.width(),
                img.height()
            );
            Ok(vec![img])
        }
    }
}

/// Resolve one input (path or URL) all the way to images.
pub async fn load_card_images(
    input: &str,
    config: &ScanConfig,
) -> Result<Vec<DynamicImage>, CardScanError> {
    let source = read_source(input, config.download_timeout_secs).await?;
    decode_source(source, config).await
}

async fn read_local(path: &Path) -> Result<Vec<u8>, CardScanError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(CardScanError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(CardScanError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, CardScanError> {
    info!("Downloading card from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| CardScanError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            CardScanError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            CardScanError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(CardScanError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| CardScanError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    Ok(bytes.to_vec())
}
