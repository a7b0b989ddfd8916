//! Local text extraction: PDF text layer, OCR for images, plain text as-is.
//!
//! OCR shells out to the `tesseract` binary; it must be on `PATH`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use log::{debug, info};
use thiserror::Error;
use tokio::process::Command;

const PDF_MAGIC: &[u8] = b"%PDF";
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp", "gif"];
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "csv"];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a PDF file: {}", .0.display())]
    NotPdf(PathBuf),

    #[error("Failed to extract text from PDF: {0}")]
    Pdf(String),

    #[error("tesseract is not installed or not on PATH")]
    OcrUnavailable,

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("No text could be extracted from {}", .0.display())]
    Empty(PathBuf),
}

/// Progress of an OCR run, reported as `progress` in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrProgress {
    pub status: &'static str,
    pub progress: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Image,
    Text,
}

impl SourceKind {
    pub fn detect(path: &Path) -> Result<Self, ExtractError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if extension == "pdf" {
            Ok(SourceKind::Pdf)
        } else if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Ok(SourceKind::Image)
        } else if TEXT_EXTENSIONS.contains(&extension.as_str()) {
            Ok(SourceKind::Text)
        } else {
            Err(ExtractError::UnsupportedFormat(path.display().to_string()))
        }
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>, ExtractError> {
    tokio::fs::read(path).await.map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Text layer of a PDF. Scanned PDFs without one come back as
/// [`ExtractError::Empty`].
pub async fn extract_text_from_pdf(path: &Path) -> Result<String, ExtractError> {
    let bytes = read_file(path).await?;
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(ExtractError::NotPdf(path.to_path_buf()));
    }

    let text = parse_on_blocking_pool(bytes, pdf_extract::extract_text_from_mem).await?;
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(ExtractError::Empty(path.to_path_buf()));
    }
    debug!("Extracted {} chars from {}", text.len(), path.display());
    Ok(text)
}

/// Runs `parse` off the async workers. pdf-extract panics on some fonts and
/// encodings; the release profile unwinds, so such a panic comes back here as
/// a join error and becomes [`ExtractError::Pdf`].
async fn parse_on_blocking_pool<F, E>(bytes: Vec<u8>, parse: F) -> Result<String, ExtractError>
where
    F: FnOnce(&[u8]) -> Result<String, E> + Send + 'static,
    E: std::fmt::Display,
{
    tokio::task::spawn_blocking(move || parse(&bytes).map_err(|e| e.to_string()))
        .await
        .map_err(|e| ExtractError::Pdf(format!("extractor crashed: {e}")))?
        .map_err(ExtractError::Pdf)
}

pub async fn tesseract_available() -> bool {
    Command::new("tesseract")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

/// OCR of an image with tesseract, `lang` being a tesseract language code
/// such as `eng` or `eng+ara`.
pub async fn perform_ocr<F>(path: &Path, lang: &str, on_progress: F) -> Result<String, ExtractError>
where
    F: Fn(OcrProgress),
{
    on_progress(OcrProgress {
        status: "loading tesseract",
        progress: 0.0,
    });
    if !tesseract_available().await {
        return Err(ExtractError::OcrUnavailable);
    }

    on_progress(OcrProgress {
        status: "recognizing text",
        progress: 0.1,
    });
    info!("Running OCR on {} ({})", path.display(), lang);
    let output = Command::new("tesseract")
        .arg(path)
        .arg("stdout")
        .arg("-l")
        .arg(lang)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| ExtractError::Ocr(format!("failed to run tesseract: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractError::Ocr(stderr.trim().to_string()));
    }

    on_progress(OcrProgress {
        status: "done",
        progress: 1.0,
    });
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() {
        return Err(ExtractError::Empty(path.to_path_buf()));
    }
    Ok(text)
}

/// Picks the extraction method from the file extension.
pub async fn extract_text<F>(path: &Path, lang: &str, on_progress: F) -> Result<String, ExtractError>
where
    F: Fn(OcrProgress),
{
    match SourceKind::detect(path)? {
        SourceKind::Pdf => extract_text_from_pdf(path).await,
        SourceKind::Image => perform_ocr(path, lang, on_progress).await,
        SourceKind::Text => {
            let bytes = read_file(path).await?;
            let text = String::from_utf8_lossy(&bytes).trim().to_string();
            if text.is_empty() {
                return Err(ExtractError::Empty(path.to_path_buf()));
            }
            Ok(text)
        }
    }
}
