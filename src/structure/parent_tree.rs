//! The `ParentTree`: the catalog-level index mapping each page's MCID space back into
//! structure-tree nodes (spec.md §3, §4.7).

use super::tagged::StructTree;

/// `ParentTree[key]` is the list of struct-tree element indices for the page whose
/// `StructParents` equals `key`, ordered by MCID. Built in one pass over a [`StructTree`]
/// so the cross-invariant (every MCID has exactly one owning leaf) is checked by
/// construction rather than trusted.
#[derive(Debug, Clone, Default)]
pub struct ParentTree {
    entries: Vec<(u32, Vec<usize>)>,
}

impl ParentTree {
    /// Builds the tree from every leaf's marked-content references. `page_count` seeds
    /// one (possibly empty) entry per page so pages with no marked content still get a
    /// `StructParents` key with an empty array rather than a missing entry.
    pub fn build(tree: &StructTree, page_count: usize) -> Result<Self, String> {
        const UNSET: usize = usize::MAX;
        let mut entries: Vec<(u32, Vec<usize>)> =
            (0..page_count).map(|i| (i as u32, Vec::new())).collect();

        for (elem_index, elem) in tree.iter().enumerate() {
            for mcr in &elem.mcids {
                let page = mcr.page_index;
                if page >= entries.len() {
                    return Err(format!(
                        "structure element {elem_index} references page {page}, but the \
                         document only has {page_count} pages"
                    ));
                }
                let arr = &mut entries[page].1;
                let mcid = mcr.mcid as usize;
                if mcid >= arr.len() {
                    arr.resize(mcid + 1, UNSET);
                }
                if arr[mcid] != UNSET {
                    return Err(format!(
                        "page {page} has two structure elements claiming MCID {mcid}"
                    ));
                }
                arr[mcid] = elem_index;
            }
        }

        for (page, arr) in &entries {
            if let Some(gap) = arr.iter().position(|&i| i == UNSET) {
                return Err(format!(
                    "page {page} has no structure element for MCID {gap} — the tree and \
                     content stream have gone out of sync"
                ));
            }
        }

        Ok(Self { entries })
    }

    /// The flat `[key0, array0, key1, array1, …]` sequence the spec requires for
    /// `ParentTree.Nums`, as (key, element-index-array) pairs; the caller turns element
    /// indices into indirect object references when serialising.
    pub fn nums(&self) -> &[(u32, Vec<usize>)] {
        &self.entries
    }

    /// The struct-element index owning a given page's MCID, if any.
    pub fn lookup(&self, struct_parents_key: u32, mcid: u32) -> Option<usize> {
        self.entries
            .iter()
            .find(|(key, _)| *key == struct_parents_key)
            .and_then(|(_, arr)| arr.get(mcid as usize))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::tagged::{StandardStructureType, StructureElement};

    #[test]
    fn builds_dense_arrays_in_mcid_order() {
        let mut tree = StructTree::new();
        let doc = tree.set_root(StructureElement::new(StandardStructureType::Document));
        let mut p0 = StructureElement::new(StandardStructureType::P);
        p0.add_mcid(0, 1);
        let mut h0 = StructureElement::new(StandardStructureType::H1);
        h0.add_mcid(0, 0);
        tree.add_child(doc, h0).unwrap();
        tree.add_child(doc, p0).unwrap();

        let pt = ParentTree::build(&tree, 1).unwrap();
        let (key, arr) = &pt.nums()[0];
        assert_eq!(*key, 0);
        assert_eq!(arr.len(), 2);
        // arr[0] must be the H1 element (mcid 0), arr[1] the P element (mcid 1).
        assert_eq!(tree.get(arr[0]).unwrap().structure_type.as_pdf_name(), "H1");
        assert_eq!(tree.get(arr[1]).unwrap().structure_type.as_pdf_name(), "P");
    }

    #[test]
    fn empty_page_gets_empty_array() {
        let tree = StructTree::new();
        let pt = ParentTree::build(&tree, 2).unwrap();
        assert_eq!(pt.nums().len(), 2);
        assert!(pt.nums()[0].1.is_empty());
        assert!(pt.nums()[1].1.is_empty());
    }

    #[test]
    fn duplicate_mcid_is_rejected() {
        let mut tree = StructTree::new();
        let doc = tree.set_root(StructureElement::new(StandardStructureType::Document));
        let mut a = StructureElement::new(StandardStructureType::P);
        a.add_mcid(0, 0);
        let mut b = StructureElement::new(StandardStructureType::P);
        b.add_mcid(0, 0);
        tree.add_child(doc, a).unwrap();
        tree.add_child(doc, b).unwrap();

        assert!(ParentTree::build(&tree, 1).is_err());
    }

    #[test]
    fn gap_in_mcid_sequence_is_rejected() {
        let mut tree = StructTree::new();
        let doc = tree.set_root(StructureElement::new(StandardStructureType::Document));
        let mut a = StructureElement::new(StandardStructureType::P);
        a.add_mcid(0, 5);
        tree.add_child(doc, a).unwrap();

        assert!(ParentTree::build(&tree, 1).is_err());
    }

    #[test]
    fn lookup_resolves_owning_element() {
        let mut tree = StructTree::new();
        let doc = tree.set_root(StructureElement::new(StandardStructureType::Document));
        let mut a = StructureElement::new(StandardStructureType::Figure);
        a.add_mcid(2, 0);
        let idx = tree.add_child(doc, a).unwrap();

        let pt = ParentTree::build(&tree, 3).unwrap();
        assert_eq!(pt.lookup(2, 0), Some(idx));
        assert_eq!(pt.lookup(2, 1), None);
    }
}
