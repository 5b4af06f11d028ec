//! Layout planning: translated fragments → per-page draw commands.
//!
//! Planning is pure. It decides the font, the text box and the drawing
//! order of every fragment and records which fragments cannot be drawn;
//! [`render_plan`] then replays the plan into any [`DocumentWriter`].

use crate::config::TranslationConfig;
use crate::error::{FragmentError, TranslateError};
use crate::model::{FontWeight, PageDimensions, PageSize, TextFragment};
use crate::pipeline::lines::group_pages;
use crate::pipeline::writer::DocumentWriter;
use serde::Serialize;
use tracing::{debug, warn};

/// Which of the two font families a run is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FontFamily {
    /// Built-in Latin family, used when the target is the default language.
    Latin,
    /// Provisioned target-script family.
    Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FontChoice {
    pub family: FontFamily,
    pub weight: FontWeight,
}

/// One positioned, single-line run of text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawCommand {
    pub index: usize,
    pub page: usize,
    pub text: String,
    pub x: f32,
    /// Baseline `y`, top-left origin.
    pub y: f32,
    pub font_size: f32,
    /// Declared box width; text never wraps inside it.
    pub box_width: f32,
    pub font: FontChoice,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagePlan {
    pub page: usize,
    pub size: PageSize,
    pub commands: Vec<DrawCommand>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayoutPlan {
    pub pages: Vec<PagePlan>,
    pub total_lines: usize,
    /// Fragments rejected during planning.
    pub skipped: Vec<FragmentError>,
}

impl LayoutPlan {
    pub fn command_count(&self) -> usize {
        self.pages.iter().map(|p| p.commands.len()).sum()
    }
}

/// Font family for the whole job; depends on the target language only.
pub fn choose_family(config: &TranslationConfig) -> FontFamily {
    if config.is_latin_target() {
        FontFamily::Latin
    } else {
        FontFamily::Script
    }
}

fn reject(fragment: &TextFragment, num_pages: usize) -> Option<FragmentError> {
    let (index, page) = (fragment.index, fragment.page);
    if page == 0 || page > num_pages {
        Some(FragmentError::PageOutOfRange { index, page })
    } else if !fragment.has_finite_geometry() {
        Some(FragmentError::NonFinitePosition { index, page })
    } else if fragment.is_blank() {
        Some(FragmentError::EmptyText { index, page })
    } else {
        None
    }
}

/// Plan every page of the output document.
///
/// One page per source page, sized from that page's own dimensions.
/// Fragments are visited line by line (top to bottom, left to right);
/// with `snap_to_line` each run is drawn at its line's anchor instead of
/// its own `y`.
pub fn plan_layout(
    fragments: &[TextFragment],
    dims: &PageDimensions,
    config: &TranslationConfig,
) -> LayoutPlan {
    let family = choose_family(config);
    let expansion = config.expansion_factor();
    let num_pages = dims.num_pages.max(1);

    let mut plan = LayoutPlan::default();
    let mut drawable = Vec::with_capacity(fragments.len());
    for f in fragments {
        match reject(f, num_pages) {
            Some(e) => {
                warn!("Skipping {}", e);
                plan.skipped.push(e);
            }
            None => drawable.push(f.clone()),
        }
    }

    let mut by_page = group_pages(&drawable, config.y_tolerance);
    for page in 1..=num_pages {
        let lines = by_page.remove(&page).unwrap_or_default();
        plan.total_lines += lines.len();
        let commands: Vec<DrawCommand> = lines
            .iter()
            .flat_map(|line| {
                line.elements.iter().map(move |f| DrawCommand {
                    index: f.index,
                    page,
                    text: f.text.clone(),
                    x: f.x,
                    y: if config.snap_to_line { line.y } else { f.y },
                    font_size: f.font_size,
                    box_width: f.width * expansion,
                    font: FontChoice {
                        family,
                        weight: f.font_weight,
                    },
                })
            })
            .collect();
        debug!("Page {}: {} lines, {} runs", page, lines.len(), commands.len());
        plan.pages.push(PagePlan {
            page,
            size: dims.size_of(page),
            commands,
        });
    }
    plan
}

/// What happened while replaying a plan into a writer.
#[derive(Debug, Clone, Default)]
pub struct RenderReport {
    pub pdf_bytes: Vec<u8>,
    pub drawn: usize,
    /// Runs the writer rejected.
    pub failed: Vec<FragmentError>,
}

/// Replay `plan` into `writer` and finalise the document.
///
/// A run the writer rejects is logged and skipped. Only page creation and
/// finalisation failures are fatal.
pub fn render_plan<W: DocumentWriter + ?Sized>(
    plan: &LayoutPlan,
    writer: &mut W,
) -> Result<RenderReport, TranslateError> {
    let mut report = RenderReport::default();
    for page in &plan.pages {
        writer.begin_page(page.page, page.size)?;
        for cmd in &page.commands {
            match writer.draw_text(cmd) {
                Ok(()) => report.drawn += 1,
                Err(e) => {
                    warn!("Skipping {}", e);
                    report.failed.push(e);
                }
            }
        }
    }
    report.pdf_bytes = writer.finish()?;
    Ok(report)
}
