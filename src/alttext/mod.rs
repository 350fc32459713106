//! AltTextOrchestrator: turns a classified `Figure`/`Formula` block into the alt text
//! attached to its eventual structure element (spec.md §4.5).
//!
//! Per-block description calls are independent, so the orchestrator fans them out
//! concurrently with `tokio::join`-style buffering rather than awaiting one at a time.

use std::sync::Arc;

use crate::classifier::{ClassifiedBlock, Role};
use crate::context::extract_context;
use crate::describer::{Describer, DescriberKind, Ocr};

/// Minimum OCR confidence before its transcript is worth folding into the describer's context.
const OCR_CONFIDENCE_GATE: f64 = 0.5;
const OCR_CONTEXT_MAX_CHARS: usize = 500;

const FIGURE_FALLBACK: &str = "[alt text unavailable]";
const FORMULA_RAW_TEXT_CHARS: usize = 100;

const MIN_ALT_CHARS: usize = 10;
const MAX_ALT_CHARS: usize = 500;
const BAD_START_PHRASES: &[&str] =
    &["image of", "picture of", "photo of", "figure showing"];
const PLACEHOLDER_SUBSTRINGS: &[&str] = &["placeholder", "todo", "insert", "add description"];

#[derive(Debug, Clone)]
pub struct AltTextResult {
    pub page_index: usize,
    pub block_index: usize,
    pub alt_text: String,
    /// Set when the describer failed and the fixed fallback string was substituted,
    /// so the caller can surface it as a non-fatal finding rather than silently ship it.
    pub used_fallback: bool,
    /// Local quality warnings (spec.md §4.5): never block emission, only surfaced for
    /// human review — PDF/UA only requires the `Alt` attribute to be present.
    pub warnings: Vec<String>,
}

fn fallback_for(role: Role, raw_text: &str) -> String {
    match role {
        Role::Formula => {
            let truncated: String = raw_text.chars().take(FORMULA_RAW_TEXT_CHARS).collect();
            format!("Mathematical formula: {truncated}")
        }
        _ => FIGURE_FALLBACK.to_string(),
    }
}

/// Local, non-fatal validation of a resolved alt-text string (spec.md §4.5): rejects are
/// reported as warnings, never as errors — the element keeps whatever text it has.
pub fn validate_alt_text(alt_text: &str) -> Vec<String> {
    let mut warnings = Vec::new();
    let lower = alt_text.to_lowercase();
    let len = alt_text.chars().count();

    if len < MIN_ALT_CHARS {
        warnings.push("alt text is shorter than 10 characters".to_string());
    }
    if len > MAX_ALT_CHARS {
        warnings.push("alt text is longer than 500 characters".to_string());
    }
    if BAD_START_PHRASES.iter().any(|p| lower.starts_with(p)) {
        warnings.push("alt text starts with a redundant phrase (\"image of\"/\"picture of\"/…)".to_string());
    }
    if PLACEHOLDER_SUBSTRINGS.iter().any(|p| lower.contains(p)) {
        warnings.push("alt text looks like placeholder text".to_string());
    }
    warnings
}

fn describer_kind_for(role: Role) -> DescriberKind {
    match role {
        Role::Formula => DescriberKind::Formula,
        _ => DescriberKind::Figure,
    }
}

/// Produces alt text for a single figure/formula block. `image_bytes` is the already
/// cropped/rendered raster for the block's bbox; `page_blocks` is every classified
/// block on the same page, used to gather caption/label context (spec.md §4.4).
pub async fn describe_block(
    describer: &dyn Describer,
    ocr: &dyn Ocr,
    block: &ClassifiedBlock,
    page_blocks: &[ClassifiedBlock],
    image_bytes: &[u8],
) -> AltTextResult {
    let mut context = extract_context(block, page_blocks);
    let kind = describer_kind_for(block.role);

    if let Ok((ocr_text, confidence)) = ocr.ocr(image_bytes).await {
        let len = ocr_text.chars().count();
        if confidence > OCR_CONFIDENCE_GATE && len > 0 && len <= OCR_CONTEXT_MAX_CHARS {
            context = format!("{context}\nOCR text: {ocr_text}");
        }
    }

    let description = describer.describe(image_bytes, &context, kind).await;

    let (alt_text, used_fallback) = match description {
        Ok(text) => (text, false),
        Err(_) => (fallback_for(block.role, &block.text), true),
    };

    let warnings = if used_fallback { Vec::new() } else { validate_alt_text(&alt_text) };

    AltTextResult {
        page_index: block.page_index,
        block_index: block.block_index,
        alt_text,
        used_fallback,
        warnings,
    }
}

/// Fans a whole document's figure/formula blocks out to the describer concurrently.
/// `render` crops the page's raster to a block's bbox; it runs on the calling thread
/// since the actual rasterisation dependency is supplied by the embedding pipeline.
pub async fn describe_document<F>(
    describer: Arc<dyn Describer>,
    ocr: Arc<dyn Ocr>,
    pages: &[Vec<ClassifiedBlock>],
    render: F,
) -> Vec<AltTextResult>
where
    F: Fn(usize, usize) -> Vec<u8>,
{
    let mut tasks = Vec::new();
    for page in pages {
        for block in page {
            if !matches!(block.role, Role::Figure | Role::Formula) {
                continue;
            }
            let describer = Arc::clone(&describer);
            let ocr = Arc::clone(&ocr);
            let block = block.clone();
            let page_blocks = page.clone();
            let image_bytes = render(block.page_index, block.block_index);
            tasks.push(tokio::spawn(async move {
                describe_block(describer.as_ref(), ocr.as_ref(), &block, &page_blocks, &image_bytes).await
            }));
        }
    }

    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        if let Ok(result) = task.await {
            results.push(result);
        }
    }
    results
}
