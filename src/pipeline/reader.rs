//! PDF geometry reader: text runs → positioned [`TextFragment`]s.
//!
//! The conversion from raw runs is pure and lives in [`fragment_from_run`]
//! and [`read_fragments`]; the only pdfium-specific part is
//! [`PdfiumContentReader`], which exposes a loaded document through the
//! [`ContentReader`] trait. pdfium is not async-safe, so the async entry
//! points run inside `spawn_blocking`.

use crate::error::TranslateError;
use crate::model::{
    FontWeight, PageDimensions, PageSize, TextFragment, TextRun, FALLBACK_FONT_SIZE,
    FALLBACK_HEIGHT_FACTOR, FALLBACK_WIDTH,
};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Page-level access to a PDF content model.
///
/// Pages are 1-indexed.
pub trait ContentReader {
    fn page_count(&self) -> usize;

    fn page_size(&self, page: usize) -> Result<PageSize, TranslateError>;

    /// Text runs of `page` in content-stream order.
    fn text_runs(&self, page: usize) -> Result<Vec<TextRun>, TranslateError>;
}

// ── Pure conversion ──────────────────────────────────────────────────────

/// Font size from a `[scaleX, skewY, skewX, scaleY, posX, posY]` transform.
///
/// Takes the larger axis magnitude so skewed and rotated runs still get a
/// usable size; degenerate transforms yield [`FALLBACK_FONT_SIZE`].
pub fn font_size_from_transform(t: &[f32]) -> f32 {
    if t.len() < 4 {
        return FALLBACK_FONT_SIZE;
    }
    let (sx, sy) = (t[0].hypot(t[2]), t[3].hypot(t[1]));
    if !sx.is_finite() || !sy.is_finite() {
        return FALLBACK_FONT_SIZE;
    }
    let size = sx.max(sy);
    if size >= 1.0 {
        size
    } else {
        FALLBACK_FONT_SIZE
    }
}

/// Convert one run into a fragment, or `None` when the run has no usable
/// transform.
pub fn fragment_from_run(
    run: &TextRun,
    index: usize,
    page: usize,
    page_height: f32,
) -> Option<TextFragment> {
    if run.transform.len() < 6 {
        return None;
    }
    let font_size = font_size_from_transform(&run.transform);
    let measured = |v: Option<f32>| v.filter(|v| v.is_finite() && *v > 0.0);
    let font_name = run
        .font_name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    Some(TextFragment {
        index,
        text: run.text.clone(),
        page,
        x: run.transform[4],
        y: page_height - run.transform[5],
        font_size,
        width: measured(run.width).unwrap_or(FALLBACK_WIDTH),
        height: measured(run.height).unwrap_or(font_size * FALLBACK_HEIGHT_FACTOR),
        font_weight: FontWeight::from_font_name(&font_name),
        font_name,
        original_text: None,
    })
}

/// Read every page's runs into one document-ordered fragment sequence.
///
/// Fragment indices are assigned consecutively across pages. Malformed runs
/// are skipped; page-level failures are fatal.
pub fn read_fragments(reader: &dyn ContentReader) -> Result<Vec<TextFragment>, TranslateError> {
    let mut fragments = Vec::new();
    for page in 1..=reader.page_count() {
        let height = reader.page_size(page)?.height;
        let runs = reader.text_runs(page)?;
        let before = fragments.len();
        for run in &runs {
            match fragment_from_run(run, fragments.len(), page, height) {
                Some(f) => fragments.push(f),
                None => warn!(
                    "Page {}: skipping text run with malformed transform ({} values)",
                    page,
                    run.transform.len()
                ),
            }
        }
        debug!("Page {}: {} fragments", page, fragments.len() - before);
    }
    Ok(fragments)
}

/// Read per-page sizes. A document without pages is rejected.
pub fn read_dimensions(
    reader: &dyn ContentReader,
    path: &Path,
) -> Result<PageDimensions, TranslateError> {
    let sizes = (1..=reader.page_count())
        .map(|p| reader.page_size(p))
        .collect::<Result<Vec<_>, _>>()?;
    PageDimensions::from_pages(sizes).ok_or_else(|| TranslateError::CorruptPdf {
        path: path.to_path_buf(),
        detail: "document has no pages".into(),
    })
}

// ── pdfium adapter ───────────────────────────────────────────────────────

/// [`ContentReader`] over a document loaded by pdfium.
pub struct PdfiumContentReader<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumContentReader<'a> {
    pub fn open(
        pdfium: &'a Pdfium,
        path: &Path,
        password: Option<&'a str>,
    ) -> Result<Self, TranslateError> {
        let document = pdfium
            .load_pdf_from_file(path, password)
            .map_err(|e| map_load_error(e, path, password.is_some()))?;
        Ok(Self { document })
    }

    fn page(&self, page: usize) -> Result<PdfPage<'a>, TranslateError> {
        self.document
            .pages()
            .get((page - 1) as PdfPageIndex)
            .map_err(|e| TranslateError::PageDecodeFailed {
                page,
                detail: e.to_string(),
            })
    }
}

impl ContentReader for PdfiumContentReader<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_size(&self, page: usize) -> Result<PageSize, TranslateError> {
        let p = self.page(page)?;
        Ok(PageSize {
            width: p.width().value,
            height: p.height().value,
        })
    }

    fn text_runs(&self, page: usize) -> Result<Vec<TextRun>, TranslateError> {
        let p = self.page(page)?;
        let mut runs = Vec::new();
        for object in p.objects().iter() {
            let Some(text_object) = object.as_text_object() else {
                continue;
            };
            // A run without a readable matrix is kept with an empty transform
            // so the pure conversion can skip and report it.
            let transform = match object.matrix() {
                Ok(m) => {
                    let fs = text_object.unscaled_font_size().value;
                    vec![m.a() * fs, m.b() * fs, m.c() * fs, m.d() * fs, m.e(), m.f()]
                }
                Err(e) => {
                    debug!("Page {}: unreadable text matrix: {}", page, e);
                    Vec::new()
                }
            };
            runs.push(TextRun {
                text: text_object.text(),
                transform,
                width: object.width().ok().map(|w| w.value),
                height: object.height().ok().map(|h| h.value),
                font_name: Some(text_object.font().name()),
            });
        }
        Ok(runs)
    }
}

fn map_load_error(e: PdfiumError, path: &Path, has_password: bool) -> TranslateError {
    match e {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            if has_password {
                TranslateError::WrongPassword {
                    path: path.to_path_buf(),
                }
            } else {
                TranslateError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            }
        }
        other => TranslateError::CorruptPdf {
            path: path.to_path_buf(),
            detail: other.to_string(),
        },
    }
}

fn bind() -> Result<Pdfium, TranslateError> {
    asset_cache::bind_pdfium(None).map_err(|e| TranslateError::PdfiumBindingFailed(e.to_string()))
}

/// Extract all fragments of the PDF at `path`.
pub async fn extract_fragments(
    path: &Path,
    password: Option<&str>,
) -> Result<Vec<TextFragment>, TranslateError> {
    let path: PathBuf = path.to_path_buf();
    let password = password.map(str::to_string);

    let fragments = tokio::task::spawn_blocking(move || {
        let pdfium = bind()?;
        let reader = PdfiumContentReader::open(&pdfium, &path, password.as_deref())?;
        read_fragments(&reader)
    })
    .await
    .map_err(|e| TranslateError::Internal(format!("Extract task panicked: {}", e)))??;

    info!("Extracted {} text fragments", fragments.len());
    Ok(fragments)
}

/// Read the page dimensions of the PDF at `path`.
pub async fn extract_dimensions(
    path: &Path,
    password: Option<&str>,
) -> Result<PageDimensions, TranslateError> {
    let path: PathBuf = path.to_path_buf();
    let password = password.map(str::to_string);

    tokio::task::spawn_blocking(move || {
        let pdfium = bind()?;
        let reader = PdfiumContentReader::open(&pdfium, &path, password.as_deref())?;
        read_dimensions(&reader, &path)
    })
    .await
    .map_err(|e| TranslateError::Internal(format!("Dimensions task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeReader {
        pages: Vec<(PageSize, Vec<TextRun>)>,
    }

    impl ContentReader for FakeReader {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_size(&self, page: usize) -> Result<PageSize, TranslateError> {
            Ok(self.pages[page - 1].0)
        }

        fn text_runs(&self, page: usize) -> Result<Vec<TextRun>, TranslateError> {
            Ok(self.pages[page - 1].1.clone())
        }
    }

    fn run(text: &str, transform: Vec<f32>) -> TextRun {
        TextRun {
            text: text.into(),
            transform,
            width: Some(40.0),
            height: None,
            font_name: Some("Helvetica-Bold".into()),
        }
    }

    const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    #[test]
    fn font_size_uses_larger_axis() {
        assert_eq!(font_size_from_transform(&[12.0, 0.0, 0.0, 12.0, 0.0, 0.0]), 12.0);
        assert_eq!(font_size_from_transform(&[3.0, 0.0, 4.0, 2.0, 0.0, 0.0]), 5.0);
        // 90° rotation keeps the size.
        assert_eq!(font_size_from_transform(&[0.0, 10.0, -10.0, 0.0, 0.0, 0.0]), 10.0);
    }

    #[test]
    fn degenerate_transform_falls_back_to_12() {
        assert_eq!(font_size_from_transform(&[0.0, 0.0, 0.0, 0.0, 5.0, 5.0]), 12.0);
        assert_eq!(font_size_from_transform(&[f32::NAN, 0.0, 0.0, 1.0, 5.0, 5.0]), 12.0);
        assert_eq!(font_size_from_transform(&[14.0, 0.0, 0.0, f32::NAN, 5.0, 5.0]), 12.0);
        assert_eq!(font_size_from_transform(&[f32::INFINITY, 0.0, 0.0, 10.0, 5.0, 5.0]), 12.0);
        assert_eq!(font_size_from_transform(&[0.5, 0.0, 0.0, 0.5, 5.0, 5.0]), 12.0);
        assert_eq!(font_size_from_transform(&[1.0]), 12.0);
    }

    #[test]
    fn y_is_flipped_to_top_left_origin() {
        let f = fragment_from_run(&run("a", vec![12.0, 0.0, 0.0, 12.0, 72.0, 700.0]), 0, 1, 792.0)
            .unwrap();
        assert_eq!(f.x, 72.0);
        assert_eq!(f.y, 92.0);
        assert_eq!(f.width, 40.0);
        assert!((f.height - 14.4).abs() < 1e-4);
        assert_eq!(f.font_weight, FontWeight::Bold);
    }

    #[test]
    fn short_transform_is_skipped() {
        assert!(fragment_from_run(&run("a", vec![12.0, 0.0, 0.0]), 0, 1, 792.0).is_none());
    }

    #[test]
    fn read_fragments_orders_pages_and_skips_malformed_runs() {
        let reader = FakeReader {
            pages: vec![
                (
                    LETTER,
                    vec![
                        run("one", vec![12.0, 0.0, 0.0, 12.0, 10.0, 700.0]),
                        run("bad", vec![]),
                        run("two", vec![12.0, 0.0, 0.0, 12.0, 50.0, 700.0]),
                    ],
                ),
                (LETTER, vec![run("three", vec![0.0, 0.0, 0.0, 0.0, 10.0, 600.0])]),
            ],
        };
        let fragments = read_fragments(&reader).unwrap();
        let texts: Vec<_> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, ["one", "two", "three"]);
        assert_eq!(fragments.iter().map(|f| f.index).collect::<Vec<_>>(), [0, 1, 2]);
        assert_eq!(fragments[2].page, 2);
        assert_eq!(fragments[2].font_size, 12.0);
    }

    #[test]
    fn read_dimensions_rejects_empty_document() {
        let reader = FakeReader { pages: vec![] };
        let err = read_dimensions(&reader, Path::new("x.pdf")).unwrap_err();
        assert!(matches!(err, TranslateError::CorruptPdf { .. }));
    }

    #[test]
    fn read_dimensions_keeps_per_page_sizes() {
        let a4 = PageSize {
            width: 595.0,
            height: 842.0,
        };
        let reader = FakeReader {
            pages: vec![(LETTER, vec![]), (a4, vec![])],
        };
        let dims = read_dimensions(&reader, Path::new("x.pdf")).unwrap();
        assert_eq!(dims.num_pages, 2);
        assert_eq!(dims.width, 612.0);
        assert_eq!(dims.size_of(2), a4);
    }
}
