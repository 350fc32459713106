//! Classifier: assigns each layout block a structural role (spec.md §4.3).
//!
//! The median font size that drives the heading thresholds is computed once, across
//! every qualifying text block in the whole document — not per page — so that a short
//! page consisting entirely of headings doesn't skew its own thresholds.

use crate::layout::{BBox, ImageBlock, TextBlock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    H1,
    H2,
    H3,
    P,
    Formula,
    Figure,
    Link,
}

impl Role {
    pub fn as_struct_type_name(&self) -> &'static str {
        match self {
            Role::H1 => "H1",
            Role::H2 => "H2",
            Role::H3 => "H3",
            Role::P => "P",
            Role::Formula => "Formula",
            Role::Figure => "Figure",
            Role::Link => "Link",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedBlock {
    pub page_index: usize,
    pub block_index: usize,
    pub bbox: BBox,
    pub role: Role,
    pub text: String,
    pub font_size_max: f64,
    pub is_bold: bool,
    /// The underlying XObject name, for `Figure` blocks produced from an image block.
    /// `None` for text-derived blocks, which have no backing XObject to re-fetch.
    pub xobject_name: Option<String>,
}

/// One page's worth of [`crate::layout::analyse_page`] output.
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    pub text_blocks: Vec<TextBlock>,
    pub image_blocks: Vec<ImageBlock>,
}

const MATH_CHARS: &[char] = &[
    '∑', '∫', '√', '≤', '≥', '≠', '±', '×', '÷', '∞', '⎡', '⎣', '⎤', '⎦', '∂', '∇', '∈', '∉',
    '⊂', '⊆', '∪', '∩', '→', '↔', '⇒', '⇔', 'π', 'Δ', 'α', 'β', 'γ', 'θ', 'λ', 'μ', 'σ', 'Σ', 'Π',
];

fn is_pua(c: char) -> bool {
    let cp = c as u32;
    (0xE000..=0xF8FF).contains(&cp) || (0xF0000..=0xFFFFD).contains(&cp)
}

fn contains_math_character(text: &str) -> bool {
    text.chars().any(|c| MATH_CHARS.contains(&c) || is_pua(c))
}

fn alphabetic_fraction(text: &str) -> f64 {
    let non_whitespace: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if non_whitespace.is_empty() {
        return 0.0;
    }
    let alpha = non_whitespace.iter().filter(|c| c.is_alphabetic()).count();
    alpha as f64 / non_whitespace.len() as f64
}

fn starts_bracketed_numeric(text: &str) -> bool {
    let mut chars = text.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };
    if !matches!(first, '[' | '(' | '⎡') {
        return false;
    }
    matches!(chars.next(), Some(c) if c.is_ascii_digit() || c == ',' || c == '.' || c.is_whitespace())
}

fn is_pure_numeric_operator_string(text: &str) -> bool {
    text.len() < 50
        && !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || "., \t\n\r-+*/=<>".contains(c))
}

fn is_bare_short_numeric(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && trimmed.len() <= 3 && trimmed.chars().all(|c| c.is_ascii_digit())
}

fn is_formula(text: &str) -> bool {
    let math_and_sparse = contains_math_character(text)
        && (alphabetic_fraction(text) < 0.6 || text.chars().count() < 30);
    math_and_sparse || starts_bracketed_numeric(text) || is_pure_numeric_operator_string(text)
}

struct Thresholds {
    median: f64,
    h1: f64,
    h2: f64,
    h3: f64,
}

fn compute_thresholds(pages: &[PageLayout]) -> Thresholds {
    let mut sizes: Vec<f64> = pages
        .iter()
        .flat_map(|p| p.text_blocks.iter())
        .filter(|b| b.text.chars().count() > 2)
        .map(|b| b.font_size_max)
        .collect();
    sizes.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median = if sizes.is_empty() {
        0.0
    } else if sizes.len() % 2 == 1 {
        sizes[sizes.len() / 2]
    } else {
        let mid = sizes.len() / 2;
        (sizes[mid - 1] + sizes[mid]) / 2.0
    };
    Thresholds {
        median,
        h1: median * 1.5,
        h2: median * 1.25,
        h3: median * 1.1,
    }
}

fn classify_text_block(block: &TextBlock, t: &Thresholds) -> Option<Role> {
    let trimmed = block.text.trim();
    if trimmed.is_empty() || is_bare_short_numeric(trimmed) {
        return None;
    }

    if is_formula(&block.text) {
        return Some(Role::Formula);
    }

    let len = block.text.chars().count();
    if len < 200 {
        if block.font_size_max >= t.h1 {
            return Some(Role::H1);
        }
        if block.font_size_max >= t.h2 {
            return Some(Role::H2);
        }
        if block.font_size_max >= t.h3 {
            return Some(Role::H3);
        }
    }
    if block.is_bold && len < 100 && block.font_size_max >= t.median {
        return Some(Role::H3);
    }
    Some(Role::P)
}

enum MergeItem<'a> {
    Text(&'a TextBlock),
    Image(&'a ImageBlock),
}

fn merge_bbox(item: &MergeItem) -> BBox {
    match item {
        MergeItem::Text(b) => b.bbox,
        MergeItem::Image(b) => b.bbox,
    }
}

/// Interleaves a page's text and image blocks into a single top-to-bottom, left-to-right
/// reading order. `LayoutAnalyser` hands back two independently-ordered sequences; this
/// reconstructs one page-wide order from their bounding boxes.
fn merge_reading_order<'a>(page: &'a PageLayout) -> Vec<MergeItem<'a>> {
    let mut items: Vec<MergeItem<'a>> = Vec::new();
    items.extend(page.text_blocks.iter().map(MergeItem::Text));
    items.extend(page.image_blocks.iter().map(MergeItem::Image));
    items.sort_by(|a, b| {
        let (a_box, b_box) = (merge_bbox(a), merge_bbox(b));
        b_box.3.partial_cmp(&a_box.3).unwrap().then(a_box.0.partial_cmp(&b_box.0).unwrap())
    });
    items
}

/// Classifies every block across the whole document, returning one ordered
/// `ClassifiedBlock` list per page with a dense `block_index` in `0..K`.
pub fn classify_document(pages: &[PageLayout]) -> Vec<Vec<ClassifiedBlock>> {
    let thresholds = compute_thresholds(pages);

    pages
        .iter()
        .enumerate()
        .map(|(page_index, page)| {
            let mut out = Vec::new();
            for item in merge_reading_order(page) {
                match item {
                    MergeItem::Text(block) => {
                        if let Some(role) = classify_text_block(block, &thresholds) {
                            out.push(ClassifiedBlock {
                                page_index,
                                block_index: 0, // assigned below once discards are known
                                bbox: block.bbox,
                                role,
                                text: block.text.clone(),
                                font_size_max: block.font_size_max,
                                is_bold: block.is_bold,
                                xobject_name: None,
                            });
                        }
                    }
                    MergeItem::Image(block) => {
                        out.push(ClassifiedBlock {
                            page_index,
                            block_index: 0,
                            bbox: block.bbox,
                            role: Role::Figure,
                            text: String::new(),
                            font_size_max: 0.0,
                            is_bold: false,
                            xobject_name: Some(block.xobject_name.clone()),
                        });
                    }
                }
            }
            for (i, block) in out.iter_mut().enumerate() {
                block.block_index = i;
            }
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_block(text: &str, font_size: f64, is_bold: bool) -> TextBlock {
        TextBlock {
            block_index: 0,
            text: text.to_string(),
            font_size_max: font_size,
            is_bold,
            bbox: (0.0, 0.0, 100.0, font_size),
        }
    }

    #[test]
    fn heading_over_body_seed_scenario() {
        // Body text dominates the document-wide median (spec.md seed scenario: a single
        // 24pt heading over 11pt body), so three body blocks keep the median at 11.
        let page = PageLayout {
            text_blocks: vec![
                TextBlock { bbox: (0.0, 700.0, 200.0, 724.0), ..text_block("Introduction", 24.0, false) },
                TextBlock { bbox: (0.0, 600.0, 200.0, 612.0), ..text_block("Body copy that is long enough to not look like a heading at all.", 11.0, false) },
                TextBlock { bbox: (0.0, 580.0, 200.0, 592.0), ..text_block("More body copy continuing the same paragraph onto a new block.", 11.0, false) },
                TextBlock { bbox: (0.0, 560.0, 200.0, 572.0), ..text_block("Further body copy padding out the document-wide median sample.", 11.0, false) },
            ],
            image_blocks: Vec::new(),
        };
        let classified = classify_document(&[page]);
        assert_eq!(classified[0].len(), 4);
        assert_eq!(classified[0][0].role, Role::H1);
        assert_eq!(classified[0][0].text, "Introduction");
        assert_eq!(classified[0][1].role, Role::P);
        assert_eq!(classified[0][0].block_index, 0);
        assert_eq!(classified[0][1].block_index, 1);
    }

    #[test]
    fn bracketed_numeric_matrix_is_formula() {
        let page = PageLayout {
            text_blocks: vec![
                text_block("[16000 23; 33000 47; 21000 35]", 11.0, false),
                text_block("Surrounding paragraph text describing the matrix above in detail.", 11.0, false),
            ],
            image_blocks: Vec::new(),
        };
        let classified = classify_document(&[page]);
        assert_eq!(classified[0][0].role, Role::Formula);
    }

    #[test]
    fn pua_glyph_with_low_alpha_fraction_is_formula() {
        let pua = char::from_u32(0xE010).unwrap();
        let text = format!("{pua} = 3.14");
        let page = PageLayout { text_blocks: vec![text_block(&text, 12.0, false)], image_blocks: Vec::new() };
        let classified = classify_document(&[page]);
        assert_eq!(classified[0][0].role, Role::Formula);
    }

    #[test]
    fn bare_page_number_is_discarded() {
        let page = PageLayout { text_blocks: vec![text_block("12", 11.0, false)], image_blocks: Vec::new() };
        let classified = classify_document(&[page]);
        assert!(classified[0].is_empty());
    }

    #[test]
    fn bold_short_block_at_median_size_is_h3() {
        let page = PageLayout {
            text_blocks: vec![
                text_block("Regular paragraph body text of typical document length here.", 11.0, false),
                text_block("Bold Label", 11.0, true),
            ],
            image_blocks: Vec::new(),
        };
        let classified = classify_document(&[page]);
        let bold = classified[0].iter().find(|b| b.text == "Bold Label").unwrap();
        assert_eq!(bold.role, Role::H3);
    }

    #[test]
    fn image_block_becomes_figure() {
        let page = PageLayout {
            text_blocks: Vec::new(),
            image_blocks: vec![ImageBlock { block_index: 0, bbox: (0.0, 0.0, 50.0, 50.0), xobject_name: "Im0".into() }],
        };
        let classified = classify_document(&[page]);
        assert_eq!(classified[0].len(), 1);
        assert_eq!(classified[0][0].role, Role::Figure);
        assert_eq!(classified[0][0].text, "");
    }

    #[test]
    fn classification_is_deterministic_across_runs() {
        let page = PageLayout {
            text_blocks: vec![text_block("Introduction", 24.0, false), text_block("Body text of a normal paragraph length for this test.", 11.0, false)],
            image_blocks: Vec::new(),
        };
        let first = classify_document(std::slice::from_ref(&page));
        let second = classify_document(std::slice::from_ref(&page));
        assert_eq!(first, second);
    }
}
