//! End-to-end integration tests for pdf-layout-translate.
//!
//! These tests build small PDFs with pdfium, then read, translate and render
//! them through the real pdfium path. A stub translator stands in for the
//! network service. They are gated behind the `E2E_ENABLED` environment
//! variable because they need the pdfium shared library (downloaded into the
//! asset cache on first use).
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! Script-font tests additionally download Noto Sans Devanagari and need
//! `E2E_NETWORK=1`.

use async_trait::async_trait;
use pdf_layout_translate::{
    document_text, inspect, translate_bytes, translate_document, translate_to_file, BatchError,
    PageSize, TranslateError, TranslationConfig, Translator,
};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
    (network) => {{
        e2e_skip_unless_ready!();
        if std::env::var("E2E_NETWORK").is_err() {
            println!("SKIP — set E2E_NETWORK=1 to run tests that download fonts");
            return;
        }
    }};
}

/// Maps a handful of English words to Hindi; anything else is echoed.
struct Glossary;

#[async_trait]
impl Translator for Glossary {
    fn name(&self) -> &str {
        "glossary"
    }
    async fn translate_batch(
        &self,
        texts: &[String],
        _source: &str,
        target: &str,
    ) -> Result<Vec<String>, BatchError> {
        Ok(texts
            .iter()
            .map(|t| match (target, t.as_str()) {
                ("hi", "Hello") => "नमस्ते".to_string(),
                ("hi", "World") => "विश्व".to_string(),
                ("en", s) => s.to_uppercase(),
                (_, s) => s.to_string(),
            })
            .collect())
    }
}

struct SamplePage<'a> {
    size: PdfPagePaperSize,
    /// `(text, x, y)` with `y` in PDF device space (bottom-left origin).
    runs: &'a [(&'a str, f32, f32)],
}

/// Build a PDF with one Helvetica run per entry and write it to `path`.
///
/// Binding may download pdfium through a blocking HTTP client, so the whole
/// body runs under `block_in_place`; callers need the multi-thread runtime.
fn write_sample_pdf(path: &Path, pages: &[SamplePage<'_>]) {
    tokio::task::block_in_place(|| build_sample_pdf(path, pages));
}

fn build_sample_pdf(path: &Path, pages: &[SamplePage<'_>]) {
    let pdfium = asset_cache::bind_pdfium(None).expect("pdfium should bind");
    let mut document = pdfium.create_new_pdf().expect("create document");
    let font = document.fonts_mut().helvetica();

    for sample in pages {
        let mut page = document
            .pages_mut()
            .create_page_at_end(sample.size)
            .expect("create page");
        for &(text, x, y) in sample.runs {
            page.objects_mut()
                .create_text_object(PdfPoints::new(x), PdfPoints::new(y), text, font, PdfPoints::new(12.0))
                .expect("add text");
        }
    }

    let bytes = document.save_to_bytes().expect("save");
    std::fs::write(path, bytes).expect("write sample");
}

fn paper(width: f32, height: f32) -> PdfPagePaperSize {
    PdfPagePaperSize::Custom(PdfPoints::new(width), PdfPoints::new(height))
}

fn sample_path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

fn config(target: &str) -> TranslationConfig {
    TranslationConfig::builder()
        .languages("en", target)
        .translator(Arc::new(Glossary))
        .inter_batch_delay_ms(0)
        .build()
        .unwrap()
}

// ── Inspect ──────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_inspect_reads_positions_and_sizes() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let path = sample_path(&dir, "hello.pdf");
    write_sample_pdf(
        &path,
        &[SamplePage {
            size: paper(595.0, 842.0),
            runs: &[("Hello", 72.0, 720.0), ("World", 130.0, 720.0)],
        }],
    );

    let inspection = inspect(path.to_string_lossy(), &TranslationConfig::default())
        .await
        .expect("inspect() should succeed");

    assert_eq!(inspection.dimensions.num_pages, 1);
    assert!((inspection.dimensions.width - 595.0).abs() < 1.0);
    let texts: Vec<_> = inspection.fragments.iter().map(|f| f.text.trim()).collect();
    assert_eq!(texts, ["Hello", "World"]);
    assert!((inspection.fragments[0].x - 72.0).abs() < 1.0);
    assert!((inspection.fragments[0].font_size - 12.0).abs() < 0.5);
    println!("{:#?}", inspection.fragments);
}

#[tokio::test]
async fn test_inspect_nonexistent() {
    // Runs without E2E_ENABLED: the input check happens before pdfium.
    let err = inspect("/definitely/not/here.pdf", &TranslationConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TranslateError::FileNotFound { .. }));
}

// ── Translate ────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_translate_latin_round_trip() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let input = sample_path(&dir, "hello.pdf");
    let output = sample_path(&dir, "hello.en.pdf");
    write_sample_pdf(
        &input,
        &[SamplePage {
            size: paper(595.0, 842.0),
            runs: &[("Hello", 72.0, 720.0), ("World", 130.0, 720.0)],
        }],
    );

    let stats = translate_to_file(input.to_string_lossy(), &output, &config("en"))
        .await
        .expect("translation should succeed");
    assert_eq!(stats.drawn_fragments, 2);
    assert!(stats.fully_translated());

    let before = inspect(input.to_string_lossy(), &TranslationConfig::default())
        .await
        .unwrap();
    let after = inspect(output.to_string_lossy(), &TranslationConfig::default())
        .await
        .unwrap();

    assert_eq!(after.dimensions, before.dimensions);
    assert_eq!(document_text(&after.fragments, 5.0), "HELLO WORLD");
    for (a, b) in after.fragments.iter().zip(&before.fragments) {
        assert!((a.x - b.x).abs() < 1.0, "x moved: {} → {}", b.x, a.x);
        assert!((a.y - b.y).abs() < 1.0, "y moved: {} → {}", b.y, a.y);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_mixed_page_sizes_survive() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let input = sample_path(&dir, "mixed.pdf");
    write_sample_pdf(
        &input,
        &[
            SamplePage {
                size: paper(595.0, 842.0),
                runs: &[("first", 72.0, 720.0)],
            },
            SamplePage {
                size: paper(842.0, 595.0),
                runs: &[("second", 72.0, 500.0)],
            },
        ],
    );

    let out = translate_document(input.to_string_lossy(), &config("en"))
        .await
        .expect("translation should succeed");
    let sizes: Vec<PageSize> = out.dimensions.pages.clone();
    assert_eq!(sizes.len(), 2);
    assert!(sizes[1].width > sizes[1].height);

    let rendered = translate_bytes(&out.pdf_bytes, &config("en")).await.unwrap();
    assert_eq!(rendered.dimensions.pages, sizes);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_page_renders_blank_document() {
    e2e_skip_unless_ready!();
    let dir = tempfile::tempdir().unwrap();
    let input = sample_path(&dir, "blank.pdf");
    write_sample_pdf(
        &input,
        &[SamplePage {
            size: paper(595.0, 842.0),
            runs: &[],
        }],
    );

    let out = translate_document(input.to_string_lossy(), &config("en"))
        .await
        .expect("blank document should still translate");
    assert_eq!(out.stats.total_batches, 0);
    assert!(out.pdf_bytes.starts_with(b"%PDF"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_translate_devanagari() {
    e2e_skip_unless_ready!(network);
    let dir = tempfile::tempdir().unwrap();
    let input = sample_path(&dir, "hello.pdf");
    write_sample_pdf(
        &input,
        &[SamplePage {
            size: paper(595.0, 842.0),
            runs: &[("Hello", 72.0, 720.0), ("World", 130.0, 720.0)],
        }],
    );

    let cfg = TranslationConfig::builder()
        .languages("en", "hi")
        .translator(Arc::new(Glossary))
        .asset_dir(dir.path().join("fonts"))
        .build()
        .unwrap();
    let out = translate_document(input.to_string_lossy(), &cfg)
        .await
        .expect("translation should succeed");

    assert_eq!(out.stats.drawn_fragments, 2);
    assert_eq!(out.fragments[0].text, "नमस्ते");
    assert!(dir.path().join("fonts").read_dir().unwrap().count() >= 2);
}
