//! Error types for the pdf-layout-translate library.
//!
//! Three error types reflect the three failure scopes of a translation job:
//!
//! * [`TranslateError`] — **Fatal**: the job cannot produce a document
//!   (unreadable input, unwritable output, missing script font, bad config).
//!   Returned as `Err(TranslateError)` from the top-level `translate*`
//!   functions. [`TranslateError::kind`] groups variants into read / write /
//!   asset / config / internal failures.
//!
//! * [`BatchError`] — **Non-fatal**: one call to the translation service
//!   failed. The batch keeps its source text (identity fallback) and every
//!   other batch is unaffected.
//!
//! * [`FragmentError`] — **Non-fatal**: one fragment could not be drawn. It is
//!   skipped; the page and the document still render.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`TranslateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input document unreachable, unopenable, or corrupt.
    Read,
    /// Output sink could not be opened or finalised.
    Write,
    /// Script font (or pdfium library) provisioning failed.
    AssetFetch,
    /// Invalid configuration or unconfigured translation service.
    Config,
    /// Anything else.
    Internal,
}

/// All fatal errors returned by the pdf-layout-translate library.
#[derive(Debug, Error)]
pub enum TranslateError {
    // ── Read errors ───────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// A page could not be loaded from an otherwise valid document.
    #[error("Failed to decode page {page}: {detail}")]
    PageDecodeFailed { page: usize, detail: String },

    // ── Write errors ──────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The output document could not be created or serialised.
    #[error("Failed to finalise output document: {detail}")]
    FinalizeFailed { detail: String },

    // ── Asset errors ──────────────────────────────────────────────────────
    /// A script font required by the target language could not be provisioned.
    #[error("Failed to provision font asset '{asset}': {reason}")]
    AssetFetchFailed { asset: String, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured translation service cannot be constructed.
    #[error("Translation service '{service}' is not configured.\n{hint}")]
    ProviderNotConfigured { service: String, hint: String },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
If the auto-download failed, you can:\n\
  • Check your internet connection and try again.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TranslateError {
    pub fn kind(&self) -> ErrorKind {
        use TranslateError::*;
        match self {
            FileNotFound { .. }
            | PermissionDenied { .. }
            | InvalidInput { .. }
            | DownloadFailed { .. }
            | DownloadTimeout { .. }
            | NotAPdf { .. }
            | CorruptPdf { .. }
            | PasswordRequired { .. }
            | WrongPassword { .. }
            | PageDecodeFailed { .. } => ErrorKind::Read,
            OutputWriteFailed { .. } | FinalizeFailed { .. } => ErrorKind::Write,
            AssetFetchFailed { .. } => ErrorKind::AssetFetch,
            InvalidConfig(_) | ProviderNotConfigured { .. } => ErrorKind::Config,
            PdfiumBindingFailed(_) | Internal(_) => ErrorKind::Internal,
        }
    }
}

/// A non-fatal failure of one translation batch.
///
/// The batch falls back to its source text; see
/// [`crate::pipeline::batch::translate_fragments`].
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum BatchError {
    /// Transport or service-side failure (network, HTTP status, provider error).
    #[error("translation call failed: {0}")]
    CallFailed(String),

    /// The call exceeded the per-call timeout.
    #[error("translation call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The response did not have the expected shape.
    #[error("malformed translation response: {0}")]
    MalformedResponse(String),

    /// The response had the wrong number of items.
    #[error("expected {expected} translations, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// A non-fatal failure to place one fragment on the output page.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum FragmentError {
    /// `x`, `y` or font size is NaN or infinite.
    #[error("fragment {index} on page {page}: non-finite position or size")]
    NonFinitePosition { index: usize, page: usize },

    /// Nothing to draw after translation.
    #[error("fragment {index} on page {page}: empty text")]
    EmptyText { index: usize, page: usize },

    /// The fragment names a page the document does not have.
    #[error("fragment {index}: page {page} is outside the document")]
    PageOutOfRange { index: usize, page: usize },

    /// The document writer rejected the run.
    #[error("fragment {index} on page {page}: draw failed: {detail}")]
    DrawFailed {
        index: usize,
        page: usize,
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            TranslateError::CorruptPdf {
                path: "a.pdf".into(),
                detail: "xref".into()
            }
            .kind(),
            ErrorKind::Read
        );
        assert_eq!(
            TranslateError::FinalizeFailed {
                detail: "x".into()
            }
            .kind(),
            ErrorKind::Write
        );
        assert_eq!(
            TranslateError::AssetFetchFailed {
                asset: "font".into(),
                reason: "404".into()
            }
            .kind(),
            ErrorKind::AssetFetch
        );
        assert_eq!(
            TranslateError::InvalidConfig("x".into()).kind(),
            ErrorKind::Config
        );
    }

    #[test]
    fn length_mismatch_display() {
        let e = BatchError::LengthMismatch {
            expected: 20,
            actual: 19,
        };
        let msg = e.to_string();
        assert!(msg.contains("20") && msg.contains("19"), "got: {msg}");
    }

    #[test]
    fn timeout_display() {
        assert!(BatchError::Timeout { secs: 30 }.to_string().contains("30s"));
    }

    #[test]
    fn fragment_error_display() {
        let e = FragmentError::DrawFailed {
            index: 4,
            page: 2,
            detail: "font".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("fragment 4") && msg.contains("page 2"));
    }
}
