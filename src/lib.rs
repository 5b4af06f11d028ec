//! # pdf-layout-translate
//!
//! Translate the text of a PDF while keeping every run where it was.
//!
//! ## Why this crate?
//!
//! Extract-translate-retypeset tools lose the page: columns collapse, headings
//! drift, forms stop lining up. This crate instead reads every positioned text
//! run, sends the text through a translation service in paced batches, and
//! redraws each translated run at its original coordinates on a page of the
//! original size. Scripts that need a dedicated font (Devanagari by default)
//! get one downloaded and cached on first use.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Read       positioned fragments + page sizes via pdfium (spawn_blocking)
//!  ├─ 3. Translate  paced, retried batches (Bhashini or any edgequake-llm provider)
//!  ├─ 4. Layout     group into lines, choose fonts, widen boxes for the script
//!  └─ 5. Write      redraw every run on a same-size page; atomic file output
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_layout_translate::{translate_to_file, TranslationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Bhashini key from BHASHINI_API_KEY; Marathi → Hindi by default.
//!     let config = TranslationConfig::default();
//!     let stats = translate_to_file("document.pdf", "document.hi.pdf", &config).await?;
//!     eprintln!(
//!         "{} runs drawn, {}/{} batches fell back to source text",
//!         stats.drawn_fragments, stats.failed_batches, stats.total_batches
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdftranslate` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-layout-translate = { version = "0.3", default-features = false }
//! ```
//!
//! ## Failure model
//!
//! A job fails only when it cannot produce a document at all. A batch the
//! service cannot translate keeps its source text and a fragment the writer
//! cannot place is skipped; both are counted in [`TranslationStats`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod translate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ScriptFonts, TranslationConfig, TranslationConfigBuilder, TranslationService};
pub use error::{BatchError, ErrorKind, FragmentError, TranslateError};
pub use model::{FontWeight, Line, PageDimensions, PageSize, TextFragment, TextRun};
pub use output::{DocumentInspection, TranslationOutput, TranslationStats};
pub use pipeline::layout::{DrawCommand, FontFamily};
pub use pipeline::lines::{document_text, lines_to_text};
pub use pipeline::translator::Translator;
pub use pipeline::writer::DocumentWriter;
pub use progress::{NoopProgressCallback, ProgressCallback, TranslationProgressCallback};
pub use translate::{
    inspect, translate_bytes, translate_document, translate_layout, translate_sync,
    translate_to_file,
};
