//! Output types for translation jobs.

use crate::error::{BatchError, FragmentError};
use crate::model::{PageDimensions, TextFragment};
use serde::{Deserialize, Serialize};

/// Complete result of a translation job.
#[derive(Debug, Clone)]
pub struct TranslationOutput {
    /// The rendered output PDF.
    pub pdf_bytes: Vec<u8>,
    /// Fragments after translation, in extraction order. `original_text`
    /// holds the source string for every fragment that was translated.
    pub fragments: Vec<TextFragment>,
    /// Geometry of the source document (and therefore of the output).
    pub dimensions: PageDimensions,
    /// Job statistics.
    pub stats: TranslationStats,
}

/// Counters and timings for one translation job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationStats {
    pub total_pages: usize,
    pub total_fragments: usize,
    /// Non-blank fragments sent to the translator.
    pub translatable_fragments: usize,
    pub total_lines: usize,
    pub total_batches: usize,
    pub failed_batches: usize,
    /// Fragments whose translation came back blank and kept their source text.
    #[serde(default)]
    pub blank_translations: usize,
    /// Fragments drawn on the output document.
    pub drawn_fragments: usize,
    /// Fragments skipped at render time (blank, non-finite, draw failure).
    pub skipped_fragments: usize,
    /// Every batch that fell back to its source text, as `(batch, error)`.
    /// Batches are 1-indexed.
    pub batch_errors: Vec<(usize, BatchError)>,
    /// Every fragment the writer could not place.
    pub fragment_errors: Vec<FragmentError>,
    pub total_duration_ms: u64,
    pub extract_duration_ms: u64,
    pub translate_duration_ms: u64,
    pub render_duration_ms: u64,
}

impl TranslationStats {
    /// `true` when every batch came back translated.
    pub fn fully_translated(&self) -> bool {
        self.failed_batches == 0
    }
}

/// Result of [`crate::inspect`]: geometry without translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInspection {
    pub dimensions: PageDimensions,
    pub fragments: Vec<TextFragment>,
}
