//! spec.md §8 property 1 (MCID completeness) and property 2 (BDC/EMC balance), exercised
//! end-to-end through `pipeline::make_accessible` rather than against the rewriter or
//! structure builder in isolation.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use pdfua_tagger::cos::content::{parse_content_stream, Op};
use pdfua_tagger::cos::Document;
use pdfua_tagger::describer::{NullDescriber, NullOcr};
use pdfua_tagger::objects::{Dictionary, Object};
use pdfua_tagger::pipeline::make_accessible;
use pdfua_tagger::render::NullRasterizer;
use pdfua_tagger::Config;

fn doc_with_page(content: Vec<u8>) -> Document {
    let mut doc = Document::empty();
    let mut page = Dictionary::new();
    let stream_id = doc.make_stream(Dictionary::new(), content);
    page.set("Contents", Object::Reference(stream_id));
    doc.add_page(page);
    doc
}

fn mcids_in_content(ops: &[Op]) -> Vec<u32> {
    let mut ids = Vec::new();
    for op in ops {
        if op.is_begin_marked_content() {
            if let Some(Object::Dictionary(d)) = op.operands.get(1) {
                if let Some(mcid) = d.get("MCID").and_then(Object::as_int) {
                    ids.push(mcid as u32);
                }
            }
        }
    }
    ids
}

fn assert_balanced(ops: &[Op]) {
    let mut depth: i32 = 0;
    for op in ops {
        if op.is_begin_marked_content() {
            depth += 1;
        } else if op.is_end_marked_content() {
            depth -= 1;
            assert!(depth >= 0, "EMC without matching BDC");
        }
    }
    assert_eq!(depth, 0, "unbalanced BDC/EMC after rewrite");
}

async fn tag_document(mut doc: Document) -> Document {
    let config = Config::default();
    make_accessible(
        &mut doc,
        &config,
        Arc::new(NullDescriber),
        Arc::new(NullOcr),
        &NullRasterizer,
        "academic paper",
        Some("report"),
        Utc::now(),
    )
    .await
    .unwrap();
    doc
}

#[tokio::test]
async fn multi_block_page_gets_dense_zero_based_mcids() {
    let content = concat!(
        "BT /F1 24 Tf 1 0 0 1 0 700 Tm (Introduction) Tj ET ",
        "BT /F1 11 Tf 1 0 0 1 0 650 Tm (Body text that is long enough to read as a paragraph, not a heading.) Tj ET ",
        "q 50 0 0 50 10 20 cm /Im0 Do Q"
    )
    .as_bytes()
    .to_vec();
    let doc = tag_document(doc_with_page(content)).await;

    let bytes = doc.page_content_bytes(0).unwrap();
    let ops = parse_content_stream(&bytes).unwrap();
    assert_balanced(&ops);

    let mut mcids = mcids_in_content(&ops);
    mcids.sort_unstable();
    let expected: Vec<u32> = (0..mcids.len() as u32).collect();
    assert_eq!(mcids, expected, "MCIDs must be dense 0..K on the page");

    let mut seen = HashSet::new();
    for id in &mcids {
        assert!(seen.insert(*id), "duplicate MCID {id} on page");
    }
}

#[tokio::test]
async fn preexisting_figure_wrapper_is_dissolved_into_per_block_mcids() {
    // A prior, inadequate tagging pass wrapped the whole page in one /Figure BDC/EMC.
    let content = concat!(
        "/Figure << /MCID 0 >> BDC ",
        "BT /F1 24 Tf 1 0 0 1 0 700 Tm (Introduction) Tj ET ",
        "BT /F1 11 Tf 1 0 0 1 0 650 Tm (Body text long enough to count as a paragraph here.) Tj ET ",
        "EMC"
    )
    .as_bytes()
    .to_vec();
    let doc = tag_document(doc_with_page(content)).await;

    let bytes = doc.page_content_bytes(0).unwrap();
    let ops = parse_content_stream(&bytes).unwrap();
    assert_balanced(&ops);

    // The dissolved wrapper must not survive as a single /Figure MCID covering everything.
    let figure_bdcs = ops
        .iter()
        .filter(|op| op.is_begin_marked_content() && op.mc_tag() == Some("Figure"))
        .count();
    assert_eq!(figure_bdcs, 0, "no text block should keep the stale /Figure role");

    let mut mcids = mcids_in_content(&ops);
    mcids.sort_unstable();
    assert_eq!(mcids, vec![0, 1]);
}

#[tokio::test]
async fn zero_content_page_produces_no_mcids_and_stays_balanced() {
    let doc = tag_document(doc_with_page(Vec::new())).await;
    let bytes = doc.page_content_bytes(0).unwrap();
    let ops = parse_content_stream(&bytes).unwrap();
    assert_balanced(&ops);
    assert!(mcids_in_content(&ops).is_empty());
    assert!(pdfua_tagger::pipeline::is_tagged_pdf(&doc));
}

#[tokio::test]
async fn parent_tree_entry_matches_content_stream_mcid_set() {
    let content = concat!(
        "BT /F1 24 Tf 1 0 0 1 0 700 Tm (Title Heading Here) Tj ET ",
        "BT /F1 11 Tf 1 0 0 1 0 650 Tm (A body paragraph long enough to not look like a heading at all.) Tj ET "
    )
    .as_bytes()
    .to_vec();
    let doc = tag_document(doc_with_page(content)).await;

    let bytes = doc.page_content_bytes(0).unwrap();
    let ops = parse_content_stream(&bytes).unwrap();
    let content_mcids: HashSet<u32> = mcids_in_content(&ops).into_iter().collect();

    let struct_parents = doc
        .page_dict(0)
        .and_then(|p| p.get("StructParents"))
        .and_then(Object::as_int)
        .expect("StructParents must be set after tagging");

    let catalog = doc.catalog().unwrap();
    let struct_tree_root = doc
        .resolve(catalog.get("StructTreeRoot").unwrap())
        .as_dict()
        .unwrap();
    let parent_tree = doc
        .resolve(struct_tree_root.get("ParentTree").unwrap())
        .as_dict()
        .unwrap();
    let nums = doc
        .resolve(parent_tree.get("Nums").unwrap())
        .as_array()
        .unwrap();

    // Nums is a flat [key, array, key, array, ...] list; find the entry for this page.
    let mut found = None;
    let mut i = 0;
    while i < nums.len() {
        if nums[i].as_int() == Some(struct_parents) {
            found = Some(doc.resolve(&nums[i + 1]).as_array().unwrap().len());
            break;
        }
        i += 2;
    }
    let array_len = found.expect("page's StructParents key must appear in ParentTree.Nums");
    assert_eq!(array_len, content_mcids.len());
}
