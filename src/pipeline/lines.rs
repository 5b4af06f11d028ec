//! Line grouping and reading-order text assembly.

use crate::model::{Line, TextFragment};
use std::collections::BTreeMap;

/// Default vertical tolerance for line membership, in points.
pub const DEFAULT_Y_TOLERANCE: f32 = 5.0;

/// Cluster fragments into lines by vertical proximity.
///
/// Single greedy pass: each fragment joins the *first* existing line whose
/// anchor is within `y_tolerance`, otherwise it opens a new line anchored at
/// its own `y`. Lines are then sorted by anchor and each line by `x`; both
/// sorts are stable, so ties keep input order.
///
/// Grouping only reorders; every input fragment appears exactly once.
pub fn group_into_lines(fragments: &[TextFragment], y_tolerance: f32) -> Vec<Line> {
    let mut lines: Vec<Line> = Vec::new();

    for fragment in fragments {
        match lines
            .iter_mut()
            .find(|line| (line.y - fragment.y).abs() <= y_tolerance)
        {
            Some(line) => {
                line.height = line.height.max(fragment.height);
                line.elements.push(fragment.clone());
            }
            None => lines.push(Line {
                y: fragment.y,
                height: fragment.height,
                elements: vec![fragment.clone()],
            }),
        }
    }

    lines.sort_by(|a, b| a.y.total_cmp(&b.y));
    for line in &mut lines {
        line.elements.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
    lines
}

/// Group each page separately, keyed by 1-indexed page number.
pub fn group_pages(fragments: &[TextFragment], y_tolerance: f32) -> BTreeMap<usize, Vec<Line>> {
    let mut by_page: BTreeMap<usize, Vec<TextFragment>> = BTreeMap::new();
    for f in fragments {
        by_page.entry(f.page).or_default().push(f.clone());
    }
    by_page
        .into_iter()
        .map(|(page, frags)| (page, group_into_lines(&frags, y_tolerance)))
        .collect()
}

/// One line of text per [`Line`], joined by `\n`. Blank lines are dropped.
pub fn lines_to_text(lines: &[Line]) -> String {
    lines
        .iter()
        .map(Line::text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reading-order plain text of a whole document; pages separated by a
/// form feed.
pub fn document_text(fragments: &[TextFragment], y_tolerance: f32) -> String {
    group_pages(fragments, y_tolerance)
        .values()
        .map(|lines| lines_to_text(lines))
        .collect::<Vec<_>>()
        .join("\n\u{000C}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frag(index: usize, text: &str, x: f32, y: f32) -> TextFragment {
        TextFragment::new(index, 1, text, x, y, 12.0)
    }

    #[test]
    fn empty_input_yields_no_lines() {
        assert!(group_into_lines(&[], 5.0).is_empty());
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let lines = group_into_lines(&[frag(0, "a", 0.0, 100.0), frag(1, "b", 10.0, 105.0)], 5.0);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn first_match_wins_over_closer_line() {
        // 104 is 3 from the anchor at 107 but still joins the line at 100,
        // which was opened first.
        let input = [
            frag(0, "a", 0.0, 100.0),
            frag(1, "b", 0.0, 107.0),
            frag(2, "c", 5.0, 104.0),
        ];
        let lines = group_into_lines(&input, 5.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "a c");
        assert_eq!(lines[1].text(), "b");
    }

    #[test]
    fn lines_sorted_top_to_bottom_then_left_to_right() {
        let input = [
            frag(0, "lower", 0.0, 300.0),
            frag(1, "right", 200.0, 100.0),
            frag(2, "left", 20.0, 101.0),
        ];
        let lines = group_into_lines(&input, 5.0);
        assert_eq!(lines[0].y, 100.0);
        assert_eq!(lines[0].text(), "left right");
        assert_eq!(lines[1].text(), "lower");
    }

    #[test]
    fn line_height_is_tallest_element() {
        let mut tall = frag(1, "b", 10.0, 101.0);
        tall.height = 30.0;
        let lines = group_into_lines(&[frag(0, "a", 0.0, 100.0), tall], 5.0);
        assert_eq!(lines[0].height, 30.0);
    }

    #[test]
    fn document_text_separates_pages() {
        let mut p2 = frag(2, "page two", 0.0, 50.0);
        p2.page = 2;
        let input = [frag(0, "World", 60.0, 20.0), frag(1, "Hello", 10.0, 20.0), p2];
        assert_eq!(document_text(&input, 5.0), "Hello World\n\u{000C}\npage two");
    }
}
