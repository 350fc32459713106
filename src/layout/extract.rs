//! Derives a page's raw [`PageExtraction`] from its parsed content-stream operators.
//!
//! `LayoutAnalyser` (spec.md §4.2) is specified as consuming spans "already extracted by
//! an upstream text-extraction pass (tracked against the page's content stream)" — this
//! module is that upstream pass for a content stream CosLayer has already parsed into
//! [`Op`]s, since there is no external text-extraction collaborator in scope here.
//!
//! Text position is approximated from the text matrix translation and a fixed
//! average-glyph-width heuristic (`font_size * 0.5` per character) rather than real font
//! metrics — good enough to bucket blocks into reading order and feed the classifier's
//! font-size thresholds, not a typesetting-accurate layout engine.

use std::collections::HashMap;

use crate::cos::content::Op;
use crate::layout::{BBox, PageExtraction, RawTextBlock, TextSpan};
use crate::objects::Object;

/// Per-font style bits resolved from the page's `/Resources /Font` dictionary, keyed by
/// the resource name used in `Tf` operators (e.g. `F1`). Bit 4 (`0x10`) mirrors the bold
/// flag bit of a font descriptor's `/Flags` (spec.md §4.2).
pub type FontTable = HashMap<String, u32>;

const AVG_CHAR_WIDTH_FACTOR: f64 = 0.5;

#[derive(Clone, Copy)]
struct Matrix {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    fn multiply(self, other: Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply_unit_square(self) -> BBox {
        let corners = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)];
        let mut x0 = f64::MAX;
        let mut y0 = f64::MAX;
        let mut x1 = f64::MIN;
        let mut y1 = f64::MIN;
        for (x, y) in corners {
            let px = self.a * x + self.c * y + self.e;
            let py = self.b * x + self.d * y + self.f;
            x0 = x0.min(px);
            y0 = y0.min(py);
            x1 = x1.max(px);
            y1 = y1.max(py);
        }
        (x0, y0, x1, y1)
    }
}

fn operand_f64(op: &Op, index: usize) -> f64 {
    op.operands.get(index).and_then(Object::as_f64).unwrap_or(0.0)
}

fn tj_text(op: &Op) -> String {
    match op.operands.first() {
        Some(Object::String(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|o| match o {
                Object::String(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

struct RunningBlock {
    spans: Vec<TextSpan>,
    bbox: Option<BBox>,
}

fn grow_bbox(existing: Option<BBox>, added: BBox) -> BBox {
    match existing {
        None => added,
        Some((x0, y0, x1, y1)) => {
            (x0.min(added.0), y0.min(added.1), x1.max(added.2), y1.max(added.3))
        }
    }
}

/// Walks a page's parsed operator list, reconstructing text blocks (one per `BT…ET`
/// region) and image blocks (one per `Do` invoking an image XObject), in encounter order.
pub fn extract_page(ops: &[Op], fonts: &FontTable) -> PageExtraction {
    let mut text_blocks = Vec::new();
    let mut images = Vec::new();

    let mut ctm_stack: Vec<Matrix> = vec![Matrix::IDENTITY];
    let mut text_matrix = Matrix::IDENTITY;
    let mut in_text = false;
    let mut font_size = 0.0_f64;
    let mut style_flags = 0_u32;
    let mut current: Option<RunningBlock> = None;

    for op in ops {
        match op.operator.as_str() {
            "q" => ctm_stack.push(*ctm_stack.last().unwrap()),
            "Q" => {
                if ctm_stack.len() > 1 {
                    ctm_stack.pop();
                }
            }
            "cm" => {
                let m = Matrix {
                    a: operand_f64(op, 0),
                    b: operand_f64(op, 1),
                    c: operand_f64(op, 2),
                    d: operand_f64(op, 3),
                    e: operand_f64(op, 4),
                    f: operand_f64(op, 5),
                };
                let top = ctm_stack.last_mut().unwrap();
                *top = m.multiply(*top);
            }
            "BT" => {
                in_text = true;
                text_matrix = Matrix::IDENTITY;
                current = Some(RunningBlock { spans: Vec::new(), bbox: None });
            }
            "ET" => {
                in_text = false;
                if let Some(block) = current.take() {
                    if !block.spans.is_empty() {
                        text_blocks.push(RawTextBlock {
                            bbox: block.bbox.unwrap_or((0.0, 0.0, 0.0, 0.0)),
                            spans: block.spans,
                        });
                    }
                }
            }
            "Tf" => {
                if let Some(Object::Name(name)) = op.operands.first() {
                    style_flags = fonts.get(name.as_str()).copied().unwrap_or(0);
                }
                font_size = operand_f64(op, 1);
            }
            "Tm" => {
                text_matrix = Matrix {
                    a: operand_f64(op, 0),
                    b: operand_f64(op, 1),
                    c: operand_f64(op, 2),
                    d: operand_f64(op, 3),
                    e: operand_f64(op, 4),
                    f: operand_f64(op, 5),
                };
            }
            "Td" | "TD" => {
                let translate = Matrix {
                    a: 1.0,
                    b: 0.0,
                    c: 0.0,
                    d: 1.0,
                    e: operand_f64(op, 0),
                    f: operand_f64(op, 1),
                };
                text_matrix = translate.multiply(text_matrix);
            }
            "T*" => {
                let translate = Matrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: -font_size };
                text_matrix = translate.multiply(text_matrix);
            }
            "Tj" | "'" | "\"" | "TJ" if in_text => {
                let text = tj_text(op);
                if text.is_empty() {
                    continue;
                }
                let width = text.chars().count() as f64 * font_size * AVG_CHAR_WIDTH_FACTOR;
                let combined = text_matrix.multiply(*ctm_stack.last().unwrap());
                let (x0, y0) = (combined.e, combined.f);
                let bbox = (x0, y0, x0 + width.max(1.0), y0 + font_size.max(1.0));
                if let Some(block) = current.as_mut() {
                    block.spans.push(TextSpan { text, font_size, style_flags });
                    block.bbox = Some(grow_bbox(block.bbox, bbox));
                }
                let advance = Matrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: width, f: 0.0 };
                text_matrix = advance.multiply(text_matrix);
            }
            "Do" => {
                if let Some(Object::Name(name)) = op.operands.first() {
                    let bbox = ctm_stack.last().unwrap().apply_unit_square();
                    images.push((bbox, name.as_str().to_string()));
                }
            }
            _ => {}
        }
    }

    PageExtraction { text_blocks, images }
}
