//! Bridges the in-memory [`StructTree`]/[`ParentTree`] built by [`super::builder`] into
//! real `cos::Document` objects: `/StructTreeRoot`, one `/StructElem` per tree node, the
//! catalog's `/ParentTree`, and each leaf's `/Pg`+`/MCID` marked-content reference
//! (spec.md §4.7). `CatalogWriter` runs after this and only has to point `Root` at what
//! this pass already wrote.

use std::collections::HashMap;

use crate::cos::Document;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, ObjectId};
use crate::structure::parent_tree::ParentTree;
use crate::structure::tagged::StructTree;

/// Writes `tree` and `parent_tree` into `doc`'s object graph and points `Root.StructTreeRoot`
/// at the result. Returns the new `/StructTreeRoot` object id. A tree with no elements (no
/// root was ever set) is a no-op — nothing to attach.
pub fn write_struct_tree(doc: &mut Document, tree: &StructTree, parent_tree: &ParentTree) -> Result<Option<ObjectId>> {
    if tree.is_empty() {
        return Ok(None);
    }

    let n = tree.len();
    let mut ids: Vec<ObjectId> = Vec::with_capacity(n);
    for _ in 0..n {
        ids.push(doc.make_indirect(Object::Dictionary(Dictionary::new())));
    }

    let mut parent_of: Vec<Option<usize>> = vec![None; n];
    for (i, elem) in tree.iter().enumerate() {
        for &child in &elem.children {
            parent_of[child] = Some(i);
        }
    }

    let struct_tree_root_id = doc.make_indirect(Object::Dictionary(Dictionary::new()));

    for (idx, elem) in tree.iter().enumerate() {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::name("StructElem"));
        dict.set("S", Object::name(elem.structure_type.as_pdf_name()));

        let parent_ref = match parent_of[idx] {
            Some(p) => Object::Reference(ids[p]),
            None => Object::Reference(struct_tree_root_id),
        };
        dict.set("P", parent_ref);

        if let Some(alt) = &elem.attributes.alt {
            dict.set("Alt", Object::string(alt));
        }
        if let Some(lang) = &elem.attributes.lang {
            dict.set("Lang", Object::string(lang));
        }
        if let Some(actual_text) = &elem.attributes.actual_text {
            dict.set("ActualText", Object::string(actual_text));
        }

        if !elem.children.is_empty() {
            let kids: Vec<Object> = elem.children.iter().map(|&c| Object::Reference(ids[c])).collect();
            dict.set("K", Object::Array(kids));
        } else if let Some(mcr) = elem.mcids.first() {
            let page_id = doc.page_id(mcr.page_index).ok_or_else(|| {
                PdfError::StructuralConsistencyError(format!(
                    "struct element {idx} references page {} which the document does not have",
                    mcr.page_index
                ))
            })?;
            dict.set("Pg", Object::Reference(page_id));

            let mut mcr_dict = Dictionary::new();
            mcr_dict.set("Type", Object::name("MCR"));
            mcr_dict.set("Pg", Object::Reference(page_id));
            mcr_dict.set("MCID", Object::Integer(mcr.mcid as i64));
            dict.set("K", Object::Dictionary(mcr_dict));

            if let Some(bbox) = elem.attributes.bbox {
                let mut attr = Dictionary::new();
                attr.set("O", Object::name("Layout"));
                attr.set("BBox", Object::Array(bbox.iter().map(|&v| Object::Real(v)).collect()));
                dict.set("A", Object::Dictionary(attr));
            }
        }

        *doc.get_mut(ids[idx]).expect("id was just reserved above") = Object::Dictionary(dict);
    }

    let mut root_dict = Dictionary::new();
    root_dict.set("Type", Object::name("StructTreeRoot"));
    if let Some(root_idx) = tree.root_index() {
        root_dict.set("K", Object::Reference(ids[root_idx]));
    }

    let nums: Vec<Object> = parent_tree
        .nums()
        .iter()
        .flat_map(|(key, arr)| {
            let array_obj = Object::Array(arr.iter().map(|&elem_idx| Object::Reference(ids[elem_idx])).collect());
            vec![Object::Integer(*key as i64), array_obj]
        })
        .collect();
    let mut parent_tree_dict = Dictionary::new();
    parent_tree_dict.set("Nums", Object::Array(nums));
    let parent_tree_id = doc.make_indirect(Object::Dictionary(parent_tree_dict));

    root_dict.set("ParentTree", Object::Reference(parent_tree_id));
    root_dict.set("ParentTreeNextKey", Object::Integer(doc.page_count() as i64));

    *doc
        .get_mut(struct_tree_root_id)
        .expect("id was just reserved above") = Object::Dictionary(root_dict);

    if let Some(catalog) = doc.catalog_mut() {
        catalog.set("StructTreeRoot", Object::Reference(struct_tree_root_id));
    }

    Ok(Some(struct_tree_root_id))
}

/// Stamps each page's `/StructParents` key onto its page dictionary. The builder takes
/// page index as the canonical `StructParents` value (spec.md §4.7), so this is a direct
/// loop rather than a remapping.
pub fn assign_struct_parents(doc: &mut Document, struct_parents: &[u32]) {
    for (page_index, &key) in struct_parents.iter().enumerate() {
        if let Some(page_dict) = doc.page_dict_mut(page_index) {
            page_dict.set("StructParents", Object::Integer(key as i64));
        }
    }
}

/// Reads a `Pg`/`MCID` owning struct element index straight back out of a just-written
/// `/StructTreeRoot`, by re-walking the `ParentTree.Nums` array. Used by tests and by
/// `quick_check` to confirm the catalog actually carries what the builder produced,
/// without needing to keep the original `StructTree`/`ParentTree` around.
pub fn struct_tree_root_present(doc: &Document) -> bool {
    doc.catalog()
        .map(|c| c.contains_key("StructTreeRoot"))
        .unwrap_or(false)
}

/// Counts how many `/StructElem` objects in `doc` carry an `/Alt` entry, keyed by
/// structure type name (`Figure`, `Formula`, …) — used by `quick_check`'s alt-text
/// coverage check without re-parsing the whole tree.
pub fn alt_text_coverage(doc: &Document) -> HashMap<String, (usize, usize)> {
    let mut coverage: HashMap<String, (usize, usize)> = HashMap::new();
    for (_, object) in doc.objects_by_type("StructElem") {
        let Some(dict) = object.as_dict() else { continue };
        let Some(s_type) = dict.get("S").and_then(Object::as_name) else { continue };
        if s_type != "Figure" && s_type != "Formula" {
            continue;
        }
        let entry = coverage.entry(s_type.to_string()).or_insert((0, 0));
        entry.1 += 1;
        if dict.contains_key("Alt") {
            entry.0 += 1;
        }
    }
    coverage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifiedBlock, Role};
    use crate::structure::builder::{build_structure_tree, AltTextMap};

    fn block(page_index: usize, block_index: usize, role: Role) -> ClassifiedBlock {
        ClassifiedBlock {
            page_index,
            block_index,
            bbox: (0.0, 0.0, 100.0, 20.0),
            role,
            text: "Heading text".into(),
            font_size_max: 24.0,
            is_bold: false,
            xobject_name: None,
        }
    }

    fn document_with_pages(count: usize) -> Document {
        let mut doc = Document::empty();
        for _ in 0..count {
            doc.add_page(Dictionary::new());
        }
        doc
    }

    #[test]
    fn writes_struct_tree_root_into_catalog() {
        let mut doc = document_with_pages(1);
        let pages = vec![vec![block(0, 0, Role::H1), block(0, 1, Role::P)]];
        let (tree, parent_tree) = build_structure_tree(&pages, &[0], &AltTextMap::new()).unwrap();

        let root_id = write_struct_tree(&mut doc, &tree, &parent_tree).unwrap().unwrap();
        assert!(struct_tree_root_present(&doc));
        assert_eq!(doc.catalog().unwrap().get("StructTreeRoot").and_then(Object::as_reference), Some(root_id));
    }

    #[test]
    fn struct_elem_k_is_mcr_dict_for_leaves() {
        let mut doc = document_with_pages(1);
        let pages = vec![vec![block(0, 0, Role::Figure)]];
        let mut alt = AltTextMap::new();
        alt.insert((0, 0), "A chart.".to_string());
        let (tree, parent_tree) = build_structure_tree(&pages, &[0], &alt).unwrap();
        write_struct_tree(&mut doc, &tree, &parent_tree).unwrap();

        let leaf_id = ids_of_type(&doc, "Figure").into_iter().next().unwrap();
        let dict = doc.get(leaf_id).and_then(Object::as_dict).unwrap();
        assert_eq!(dict.get("Alt").and_then(Object::as_string_bytes), Some(&b"A chart."[..]));
        let k = dict.get("K").and_then(Object::as_dict).unwrap();
        assert_eq!(k.get("MCID").and_then(Object::as_int), Some(0));
        assert_eq!(k.get("Type").and_then(Object::as_name), Some("MCR"));
    }

    #[test]
    fn struct_parents_written_onto_page_dicts() {
        let mut doc = document_with_pages(2);
        assign_struct_parents(&mut doc, &[0, 1]);
        assert_eq!(doc.page_dict(0).unwrap().get("StructParents").and_then(Object::as_int), Some(0));
        assert_eq!(doc.page_dict(1).unwrap().get("StructParents").and_then(Object::as_int), Some(1));
    }

    #[test]
    fn empty_tree_writes_nothing() {
        let mut doc = document_with_pages(1);
        let tree = StructTree::new();
        let parent_tree = ParentTree::build(&tree, 1).unwrap();
        let result = write_struct_tree(&mut doc, &tree, &parent_tree).unwrap();
        assert!(result.is_none());
        assert!(!struct_tree_root_present(&doc));
    }

    #[test]
    fn alt_text_coverage_counts_figures_with_and_without_alt() {
        let mut doc = document_with_pages(1);
        let pages = vec![vec![block(0, 0, Role::Figure), block(0, 1, Role::Figure)]];
        let mut alt = AltTextMap::new();
        alt.insert((0, 0), "Has alt.".to_string());
        let (tree, parent_tree) = build_structure_tree(&pages, &[0], &alt).unwrap();
        write_struct_tree(&mut doc, &tree, &parent_tree).unwrap();

        let coverage = alt_text_coverage(&doc);
        let (with_alt, total) = coverage.get("Figure").copied().unwrap();
        assert_eq!(with_alt, 1);
        assert_eq!(total, 2);
    }

    fn ids_of_type(doc: &Document, struct_type: &str) -> Vec<ObjectId> {
        doc.objects_by_type("StructElem")
            .filter(|(_, obj)| {
                obj.as_dict().and_then(|d| d.get("S")).and_then(Object::as_name) == Some(struct_type)
            })
            .map(|(id, _)| id)
            .collect()
    }
}
