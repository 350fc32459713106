//! ContextExtractor: gathers nearby caption text for a figure/formula block (spec.md §4.4).

use crate::classifier::ClassifiedBlock;
use crate::layout::BBox;

const ZONE_MARGIN: f64 = 50.0;
const ZONE_DEPTH: f64 = 100.0;
const MAX_ZONE_CHARS: usize = 500;

fn caption_below_zone(bbox: BBox) -> BBox {
    let (x0, _y0, x1, y1) = bbox;
    (x0 - ZONE_MARGIN, y1, x1 + ZONE_MARGIN, y1 + ZONE_DEPTH)
}

fn label_above_zone(bbox: BBox) -> BBox {
    let (x0, y0, x1, _y1) = bbox;
    (x0 - ZONE_MARGIN, y0 - ZONE_DEPTH, x1 + ZONE_MARGIN, y0)
}

fn rect_contains(zone: BBox, point_bbox: BBox) -> bool {
    let (zx0, zy0, zx1, zy1) = zone;
    let (bx0, by0, bx1, by1) = point_bbox;
    // Overlap test: the candidate block's bbox intersects the zone rectangle at all.
    bx0 < zx1 && bx1 > zx0 && by0 < zy1 && by1 > zy0
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Concatenates caption-below then label-above zone text for a figure/formula block,
/// each truncated to 500 chars; empty if neither zone has text.
pub fn extract_context(target: &ClassifiedBlock, page_blocks: &[ClassifiedBlock]) -> String {
    let below = caption_below_zone(target.bbox);
    let above = label_above_zone(target.bbox);

    let below_text: String = page_blocks
        .iter()
        .filter(|b| std::ptr::eq(*b, target) == false && rect_contains(below, b.bbox) && !b.text.is_empty())
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let above_text: String = page_blocks
        .iter()
        .filter(|b| std::ptr::eq(*b, target) == false && rect_contains(above, b.bbox) && !b.text.is_empty())
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let mut out = truncate_chars(&below_text, MAX_ZONE_CHARS);
    let above_truncated = truncate_chars(&above_text, MAX_ZONE_CHARS);
    if !above_truncated.is_empty() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&above_truncated);
    }
    out
}
