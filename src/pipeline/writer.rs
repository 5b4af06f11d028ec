//! Output document sink.
//!
//! [`DocumentWriter`] is the seam between layout planning and a concrete PDF
//! library. [`PdfiumWriter`] builds the output with pdfium; it is not
//! `Send`, so the orchestrator drives it from inside `spawn_blocking`.

use crate::error::{FragmentError, TranslateError};
use crate::model::{FontWeight, PageSize};
use crate::pipeline::layout::{DrawCommand, FontFamily};
use asset_cache::FontPaths;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, warn};

/// Receives pages and positioned runs, then produces the document bytes.
pub trait DocumentWriter {
    /// Start a new page. Runs drawn afterwards land on it.
    fn begin_page(&mut self, page: usize, size: PageSize) -> Result<(), TranslateError>;

    /// Draw one single-line run. Errors are per run and never fatal.
    fn draw_text(&mut self, cmd: &DrawCommand) -> Result<(), FragmentError>;

    /// Finalise the document.
    fn finish(&mut self) -> Result<Vec<u8>, TranslateError>;
}

struct FontSet {
    latin_regular: PdfFontToken,
    latin_bold: PdfFontToken,
    script: Option<(PdfFontToken, PdfFontToken)>,
}

/// [`DocumentWriter`] backed by a new pdfium document.
pub struct PdfiumWriter<'a> {
    // Declared before `document`: the page must be dropped (which writes its
    // content stream) before the document is saved or closed.
    current: Option<(PdfPage<'a>, PageSize)>,
    document: PdfDocument<'a>,
    fonts: FontSet,
}

impl<'a> PdfiumWriter<'a> {
    /// Create an empty document. `script_fonts` must be given when any run
    /// will use [`FontFamily::Script`].
    pub fn new(pdfium: &'a Pdfium, script_fonts: Option<&FontPaths>) -> Result<Self, TranslateError> {
        let mut document = pdfium
            .create_new_pdf()
            .map_err(|e| TranslateError::FinalizeFailed {
                detail: format!("create document: {e}"),
            })?;

        let latin_regular = document.fonts_mut().helvetica();
        let latin_bold = document.fonts_mut().helvetica_bold();
        let script = match script_fonts {
            Some(paths) => Some((
                load_font(&mut document, &paths.regular)?,
                load_font(&mut document, &paths.bold)?,
            )),
            None => None,
        };

        Ok(Self {
            current: None,
            document,
            fonts: FontSet {
                latin_regular,
                latin_bold,
                script,
            },
        })
    }

    fn font_for(&self, family: FontFamily, weight: FontWeight) -> Option<PdfFontToken> {
        let (regular, bold) = match family {
            FontFamily::Latin => (self.fonts.latin_regular, self.fonts.latin_bold),
            FontFamily::Script => self.fonts.script?,
        };
        Some(match weight {
            FontWeight::Bold => bold,
            FontWeight::Normal => regular,
        })
    }

    fn place(&mut self, cmd: &DrawCommand) -> Result<(), String> {
        let font = self
            .font_for(cmd.font.family, cmd.font.weight)
            .ok_or("script font not loaded")?;
        let (page, size) = self.current.as_mut().ok_or("no page started")?;

        let mut object =
            PdfPageTextObject::new(&self.document, &cmd.text, font, PdfPoints::new(cmd.font_size))
                .map_err(|e| e.to_string())?;

        // Squeeze runs that overflow their box; the box never wraps.
        if let Ok(measured) = object.width() {
            if cmd.box_width > 0.0 && measured.value > cmd.box_width {
                object
                    .scale(cmd.box_width / measured.value, 1.0)
                    .map_err(|e| e.to_string())?;
            }
        }
        object
            .translate(PdfPoints::new(cmd.x), PdfPoints::new(size.height - cmd.y))
            .map_err(|e| e.to_string())?;

        page.objects_mut()
            .add_text_object(object)
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}

fn load_font(document: &mut PdfDocument<'_>, path: &Path) -> Result<PdfFontToken, TranslateError> {
    let bytes = std::fs::read(path).map_err(|e| TranslateError::AssetFetchFailed {
        asset: path.display().to_string(),
        reason: e.to_string(),
    })?;
    document
        .fonts_mut()
        .load_true_type_from_bytes(&bytes, false)
        .map_err(|e| TranslateError::AssetFetchFailed {
            asset: path.display().to_string(),
            reason: format!("not a usable TrueType font: {e}"),
        })
}

impl DocumentWriter for PdfiumWriter<'_> {
    fn begin_page(&mut self, page: usize, size: PageSize) -> Result<(), TranslateError> {
        // Dropping the previous page commits its content.
        self.current = None;
        let created = self
            .document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::Custom(
                PdfPoints::new(size.width),
                PdfPoints::new(size.height),
            ))
            .map_err(|e| TranslateError::FinalizeFailed {
                detail: format!("create page {page}: {e}"),
            })?;
        debug!("Started page {} ({} × {} pt)", page, size.width, size.height);
        self.current = Some((created, size));
        Ok(())
    }

    fn draw_text(&mut self, cmd: &DrawCommand) -> Result<(), FragmentError> {
        self.place(cmd).map_err(|detail| FragmentError::DrawFailed {
            index: cmd.index,
            page: cmd.page,
            detail,
        })
    }

    fn finish(&mut self) -> Result<Vec<u8>, TranslateError> {
        self.current = None;
        if self.document.pages().len() == 0 {
            warn!("Finalising a document without pages");
        }
        self.document
            .save_to_bytes()
            .map_err(|e| TranslateError::FinalizeFailed {
                detail: e.to_string(),
            })
    }
}
