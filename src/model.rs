//! Geometry data model shared by every pipeline stage.
//!
//! All coordinates are PDF points in a **top-left-origin** page space: the
//! reader flips device-space `y` exactly once (`page_height - y`) and every
//! downstream stage works in that space. The pdfium writer flips back when it
//! places a run on the output page.

use serde::{Deserialize, Serialize};

/// Font size used when a run's transform yields no usable size.
pub const FALLBACK_FONT_SIZE: f32 = 12.0;

/// Fragment width used when the reader cannot measure a run.
pub const FALLBACK_WIDTH: f32 = 100.0;

/// Fragment height as a multiple of font size when unmeasured.
pub const FALLBACK_HEIGHT_FACTOR: f32 = 1.2;

/// Rendering hint inferred from the source font name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Bold,
    #[default]
    Normal,
}

impl FontWeight {
    /// `Bold` iff the font name contains "bold" (case-insensitive).
    pub fn from_font_name(name: &str) -> Self {
        if name.to_lowercase().contains("bold") {
            FontWeight::Bold
        } else {
            FontWeight::Normal
        }
    }
}

/// One positioned run of text recovered from a document page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    /// Position in the document-wide extraction order. Translation results
    /// are mapped back through this index.
    pub index: usize,
    pub text: String,
    /// 1-indexed page number.
    pub page: usize,
    pub x: f32,
    /// Baseline `y`, measured from the top of the page.
    pub y: f32,
    pub font_size: f32,
    pub width: f32,
    pub height: f32,
    pub font_name: String,
    pub font_weight: FontWeight,
    /// Pre-translation text; set only by the batch translator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
}

impl TextFragment {
    /// Build a fragment with fallback metrics; mostly useful for callers
    /// that already have geometry from somewhere other than the reader.
    pub fn new(index: usize, page: usize, text: impl Into<String>, x: f32, y: f32, font_size: f32) -> Self {
        Self {
            index,
            text: text.into(),
            page,
            x,
            y,
            font_size,
            width: FALLBACK_WIDTH,
            height: font_size * FALLBACK_HEIGHT_FACTOR,
            font_name: "unknown".to_string(),
            font_weight: FontWeight::Normal,
            original_text: None,
        }
    }

    /// Empty and whitespace-only fragments are never translated or drawn.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn has_finite_geometry(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.font_size.is_finite()
    }
}

/// Raw text-run record as exposed by a PDF content reader.
///
/// `transform` follows the `[scaleX, skewY, skewX, scaleY, posX, posY]`
/// layout with `posY` in bottom-left-origin device space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub transform: Vec<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub font_name: Option<String>,
}

/// Size of one page in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Document dimensions.
///
/// `width`/`height` come from the first page; `pages` holds every page's own
/// size so mixed-size documents keep their geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDimensions {
    pub width: f32,
    pub height: f32,
    pub num_pages: usize,
    #[serde(default)]
    pub pages: Vec<PageSize>,
}

impl PageDimensions {
    /// `num_pages` pages of identical size.
    pub fn uniform(width: f32, height: f32, num_pages: usize) -> Self {
        Self {
            width,
            height,
            num_pages,
            pages: vec![PageSize { width, height }; num_pages],
        }
    }

    /// Build from per-page sizes; `None` when `pages` is empty.
    pub fn from_pages(pages: Vec<PageSize>) -> Option<Self> {
        let first = *pages.first()?;
        Some(Self {
            width: first.width,
            height: first.height,
            num_pages: pages.len(),
            pages,
        })
    }

    /// Size of the 1-indexed `page`, falling back to the first-page size.
    pub fn size_of(&self, page: usize) -> PageSize {
        page.checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .copied()
            .unwrap_or(PageSize {
                width: self.width,
                height: self.height,
            })
    }

    /// `true` when every page has the first page's size.
    pub fn is_uniform(&self) -> bool {
        self.pages
            .iter()
            .all(|p| p.width == self.width && p.height == self.height)
    }
}

/// A vertically clustered, horizontally ordered group of fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// `y` of the fragment that opened the line.
    pub y: f32,
    pub elements: Vec<TextFragment>,
    /// Tallest element height.
    pub height: f32,
}

impl Line {
    pub fn text(&self) -> String {
        self.elements
            .iter()
            .map(|f| f.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_from_name() {
        assert_eq!(FontWeight::from_font_name("Arial-BoldMT"), FontWeight::Bold);
        assert_eq!(FontWeight::from_font_name("g_d0_f1"), FontWeight::Normal);
        assert_eq!(FontWeight::from_font_name("SEMIBOLD"), FontWeight::Bold);
    }

    #[test]
    fn blank_fragments() {
        assert!(TextFragment::new(0, 1, "  \t", 0.0, 0.0, 12.0).is_blank());
        assert!(TextFragment::new(0, 1, "", 0.0, 0.0, 12.0).is_blank());
        assert!(!TextFragment::new(0, 1, " a ", 0.0, 0.0, 12.0).is_blank());
    }

    #[test]
    fn size_of_falls_back_to_first_page() {
        let dims = PageDimensions::from_pages(vec![
            PageSize { width: 612.0, height: 792.0 },
            PageSize { width: 842.0, height: 595.0 },
        ])
        .unwrap();
        assert_eq!(dims.num_pages, 2);
        assert_eq!(dims.size_of(2).width, 842.0);
        assert_eq!(dims.size_of(7).width, 612.0);
        assert_eq!(dims.size_of(0).height, 792.0);
        assert!(!dims.is_uniform());
        assert!(PageDimensions::uniform(10.0, 20.0, 3).is_uniform());
    }

    #[test]
    fn fragment_serialises_weight_lowercase() {
        let mut f = TextFragment::new(3, 1, "x", 1.0, 2.0, 12.0);
        f.font_weight = FontWeight::Bold;
        let json = serde_json::to_string(&f).unwrap();
        assert!(json.contains("\"font_weight\":\"bold\""), "{json}");
        assert!(!json.contains("original_text"));
    }
}
