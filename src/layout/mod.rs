//! LayoutAnalyser: enumerates the text and image blocks on a page in their natural
//! reading order (spec.md §4.2). This crate does not itself rasterise or run text
//! extraction — it consumes spans already extracted by an upstream text-extraction pass
//! (tracked against the page's content stream) and groups them into blocks.

pub mod extract;

pub use extract::{extract_page, FontTable};

/// One span of text sharing a single font size and style, as produced by whatever text
/// extractor walked the page's `Tj`/`TJ` operators.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    pub font_size: f64,
    /// Bit 4 (`0x10`) of the font descriptor's `/Flags`, mirroring spec.md's "OR of span
    /// style flags (bit 4 = bold)".
    pub style_flags: u32,
}

impl TextSpan {
    pub fn is_bold(&self) -> bool {
        self.style_flags & 0x10 != 0
    }
}

pub type BBox = (f64, f64, f64, f64);

/// A block of one or more spans grouped by the upstream extractor's block segmentation
/// (typically a paragraph or heading line).
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub block_index: usize,
    pub text: String,
    pub font_size_max: f64,
    pub is_bold: bool,
    pub bbox: BBox,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlock {
    pub block_index: usize,
    pub bbox: BBox,
    /// Identifier of the underlying XObject, so later stages can fetch its bytes.
    pub xobject_name: String,
}

/// One raw text block as handed to the analyser: its bbox plus its ordered spans.
#[derive(Debug, Clone, Default)]
pub struct RawTextBlock {
    pub bbox: BBox,
    pub spans: Vec<TextSpan>,
}

/// Raw per-page input the analyser groups into blocks, in the extractor's natural
/// encounter order.
#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    pub text_blocks: Vec<RawTextBlock>,
    pub images: Vec<(BBox, String)>,
}

/// Groups a page's raw extraction into [`TextBlock`]s and [`ImageBlock`]s in their
/// natural emission order. Returns empty vectors for a page with no extractable text,
/// per spec.md §4.2's failure mode (not an error).
pub fn analyse_page(extraction: &PageExtraction) -> (Vec<TextBlock>, Vec<ImageBlock>) {
    let mut text_blocks = Vec::with_capacity(extraction.text_blocks.len());
    for (index, block) in extraction.text_blocks.iter().enumerate() {
        if block.spans.is_empty() {
            continue;
        }
        let text = block
            .spans
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let font_size_max = block.spans.iter().fold(0.0_f64, |acc, s| acc.max(s.font_size));
        let is_bold = block.spans.iter().any(TextSpan::is_bold);
        text_blocks.push(TextBlock {
            block_index: index,
            text,
            font_size_max,
            is_bold,
            bbox: block.bbox,
        });
    }

    let image_blocks = extraction
        .images
        .iter()
        .enumerate()
        .map(|(index, (bbox, name))| ImageBlock {
            block_index: index,
            bbox: *bbox,
            xobject_name: name.clone(),
        })
        .collect();

    (text_blocks, image_blocks)
}
