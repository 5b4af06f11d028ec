//! Job-level entry points.
//!
//! [`translate_document`] runs the whole pipeline for one input and returns
//! the output bytes; [`translate_to_file`] adds an atomic write on top.
//! [`translate_layout`] starts from already-extracted fragments and accepts
//! any [`DocumentWriter`], for callers with their own extraction or output
//! sink.

use crate::config::TranslationConfig;
use crate::error::TranslateError;
use crate::model::{PageDimensions, TextFragment};
use crate::output::{DocumentInspection, TranslationOutput, TranslationStats};
use crate::pipeline::batch::{translate_fragments, BatchOutcome};
use crate::pipeline::layout::{plan_layout, render_plan, FontFamily, LayoutPlan, RenderReport};
use crate::pipeline::translator::resolve_translator;
use crate::pipeline::writer::{DocumentWriter, PdfiumWriter};
use crate::pipeline::{input, reader};
use asset_cache::{AssetStore, FontPaths};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Translate a PDF file or URL and return the translated document.
///
/// # Errors
/// Returns `Err(TranslateError)` only for fatal errors: unreadable input,
/// unconfigured service, missing script fonts, or a failure to finalise the
/// output. Failed batches and undrawable fragments are reported in
/// `output.stats` instead.
pub async fn translate_document(
    input_str: impl AsRef<str>,
    config: &TranslationConfig,
) -> Result<TranslationOutput, TranslateError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!(
        "Starting translation: {} ({} → {})",
        input_str, config.source_language, config.target_language
    );

    // ── Step 1: Resolve input and translator ─────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();
    let translator = resolve_translator(config).await?;

    // ── Step 2: Provision script fonts ───────────────────────────────────
    let fonts = ensure_script_fonts(config).await?;

    // ── Step 3: Extract fragments ∥ page dimensions ──────────────────────
    let extract_start = Instant::now();
    let password = config.password.as_deref();
    let (fragments, dimensions) = tokio::try_join!(
        reader::extract_fragments(&pdf_path, password),
        reader::extract_dimensions(&pdf_path, password),
    )?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    info!(
        "Read {} fragments on {} pages in {}ms",
        fragments.len(),
        dimensions.num_pages,
        extract_duration_ms
    );
    if !dimensions.is_uniform() {
        info!("Document has mixed page sizes; each page keeps its own size");
    }

    // ── Step 4: Translate ────────────────────────────────────────────────
    let translate_start = Instant::now();
    let outcome = translate_fragments(fragments, &translator, config).await;
    let translate_duration_ms = translate_start.elapsed().as_millis() as u64;

    // ── Step 5: Plan and render ──────────────────────────────────────────
    let render_start = Instant::now();
    let plan = plan_layout(&outcome.fragments, &dimensions, config);
    let report = render_with_pdfium(plan.clone(), fonts).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    let mut stats = build_stats(&outcome, &plan, &report, &dimensions);
    stats.extract_duration_ms = extract_duration_ms;
    stats.translate_duration_ms = translate_duration_ms;
    stats.render_duration_ms = render_duration_ms;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Translation complete: {}/{} batches translated, {} runs drawn, {}ms total",
        stats.total_batches - stats.failed_batches,
        stats.total_batches,
        stats.drawn_fragments,
        stats.total_duration_ms
    );

    Ok(TranslationOutput {
        pdf_bytes: report.pdf_bytes,
        fragments: outcome.fragments,
        dimensions,
        stats,
    })
}

/// Translate and write the result to `output_path`.
///
/// The document is written to a temporary sibling file and renamed into
/// place, so `output_path` never holds a partial document. The temporary
/// file is removed if the write fails.
pub async fn translate_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &TranslationConfig,
) -> Result<TranslationStats, TranslateError> {
    let output = translate_document(input_str, config).await?;
    let path = output_path.as_ref();
    write_atomically(path, &output.pdf_bytes).await?;
    info!("Wrote {} bytes to {}", output.pdf_bytes.len(), path.display());
    Ok(output.stats)
}

/// Translate an in-memory PDF.
///
/// The bytes are spooled to a managed temp file that is removed on return.
pub async fn translate_bytes(
    bytes: &[u8],
    config: &TranslationConfig,
) -> Result<TranslationOutput, TranslateError> {
    input::check_magic(bytes, Path::new("<memory>"))?;
    let mut tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| TranslateError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| TranslateError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_string_lossy().to_string();
    translate_document(&path, config).await
}

/// Blocking wrapper around [`translate_document`].
///
/// Creates a temporary tokio runtime internally.
pub fn translate_sync(
    input_str: impl AsRef<str>,
    config: &TranslationConfig,
) -> Result<TranslationOutput, TranslateError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| TranslateError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(translate_document(input_str, config))
}

/// Translate already-extracted fragments and draw them into `writer`.
///
/// Runs the translate, plan and render stages only; no input is read, no
/// fonts are provisioned, and `writer` must already know how to draw the
/// family the target language selects.
pub async fn translate_layout<W: DocumentWriter + ?Sized>(
    fragments: Vec<TextFragment>,
    dimensions: &PageDimensions,
    config: &TranslationConfig,
    writer: &mut W,
) -> Result<TranslationOutput, TranslateError> {
    let total_start = Instant::now();
    let translator = resolve_translator(config).await?;

    let translate_start = Instant::now();
    let outcome = translate_fragments(fragments, &translator, config).await;
    let translate_duration_ms = translate_start.elapsed().as_millis() as u64;

    let render_start = Instant::now();
    let plan = plan_layout(&outcome.fragments, dimensions, config);
    let report = render_plan(&plan, writer)?;

    let mut stats = build_stats(&outcome, &plan, &report, dimensions);
    stats.translate_duration_ms = translate_duration_ms;
    stats.render_duration_ms = render_start.elapsed().as_millis() as u64;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    Ok(TranslationOutput {
        pdf_bytes: report.pdf_bytes,
        fragments: outcome.fragments,
        dimensions: dimensions.clone(),
        stats,
    })
}

/// Read fragments and page sizes without translating.
///
/// Needs neither a translation service nor script fonts.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &TranslationConfig,
) -> Result<DocumentInspection, TranslateError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let path = resolved.path();
    let password = config.password.as_deref();
    let (fragments, dimensions) = tokio::try_join!(
        reader::extract_fragments(path, password),
        reader::extract_dimensions(path, password),
    )?;
    Ok(DocumentInspection {
        dimensions,
        fragments,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Make sure the target-script fonts are on local disk.
///
/// Latin targets use built-in fonts and need nothing.
async fn ensure_script_fonts(
    config: &TranslationConfig,
) -> Result<Option<FontPaths>, TranslateError> {
    if crate::pipeline::layout::choose_family(config) == FontFamily::Latin {
        return Ok(None);
    }

    let store = match &config.asset_dir {
        Some(dir) => AssetStore::new(dir),
        None => AssetStore::fonts(),
    }
    .with_timeout(Duration::from_secs(config.download_timeout_secs));
    let pair = config.script_fonts.font_pair();
    let family = config.script_fonts.family.clone();

    let paths = tokio::task::spawn_blocking(move || store.ensure_fonts(&pair))
        .await
        .map_err(|e| TranslateError::Internal(format!("Font task panicked: {}", e)))?
        .map_err(|e| TranslateError::AssetFetchFailed {
            asset: family,
            reason: e.to_string(),
        })?;
    info!("Script fonts ready: {}", paths.regular.display());
    Ok(Some(paths))
}

async fn render_with_pdfium(
    plan: LayoutPlan,
    fonts: Option<FontPaths>,
) -> Result<RenderReport, TranslateError> {
    tokio::task::spawn_blocking(move || {
        let pdfium = asset_cache::bind_pdfium(None)
            .map_err(|e| TranslateError::PdfiumBindingFailed(e.to_string()))?;
        let mut writer = PdfiumWriter::new(&pdfium, fonts.as_ref())?;
        render_plan(&plan, &mut writer)
    })
    .await
    .map_err(|e| TranslateError::Internal(format!("Render task panicked: {}", e)))?
}

fn build_stats(
    outcome: &BatchOutcome,
    plan: &LayoutPlan,
    report: &RenderReport,
    dimensions: &PageDimensions,
) -> TranslationStats {
    let mut fragment_errors = plan.skipped.clone();
    fragment_errors.extend(report.failed.iter().cloned());
    if !outcome.failures.is_empty() {
        warn!(
            "{} of {} batches kept their source text",
            outcome.failures.len(),
            outcome.total_batches
        );
    }

    TranslationStats {
        total_pages: dimensions.num_pages,
        total_fragments: outcome.fragments.len(),
        translatable_fragments: outcome.translatable,
        total_lines: plan.total_lines,
        total_batches: outcome.total_batches,
        failed_batches: outcome.failures.len(),
        blank_translations: outcome.blank_replies.len(),
        drawn_fragments: report.drawn,
        skipped_fragments: fragment_errors.len(),
        batch_errors: outcome.failures.clone(),
        fragment_errors,
        ..Default::default()
    }
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), TranslateError> {
    let write_err = |e: std::io::Error| TranslateError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    if let Err(e) = tokio::fs::write(&tmp_path, bytes).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    Ok(())
}
