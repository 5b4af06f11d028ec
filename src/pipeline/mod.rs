//! Pipeline stages for layout-preserving translation.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ reader ──▶ batch ──▶ layout ──▶ writer
//! (URL/path) (pdfium)  (service)  (plan)    (pdfium)
//!                        │          │
//!                     pacing      lines
//!                   translator
//!                   postprocess
//! ```
//!
//! 1. [`input`]  — canonicalise the user-supplied path or URL to a local file
//! 2. [`reader`] — recover positioned fragments and page sizes; pdfium work
//!    runs in `spawn_blocking`
//! 3. [`batch`]  — translate non-blank fragments in paced, retried batches
//!    through a [`translator::Translator`]
//! 4. [`layout`] — group into [`lines`], choose fonts, size text boxes
//! 5. [`writer`] — draw the plan into a new document
//!
//! Stages depend only on earlier ones and on [`crate::model`].

pub mod batch;
pub mod input;
pub mod layout;
pub mod lines;
pub mod pacing;
pub mod postprocess;
pub mod reader;
pub mod translator;
pub mod writer;
