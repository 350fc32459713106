//! The logical-structure layer: the tagged structure tree, marked-content references,
//! and the ParentTree index, per ISO 32000-1 §14.7 and ISO 14289-1 (PDF/UA-1).

pub mod builder;
pub mod marked_content;
mod parent_tree;
mod serialize;
mod tagged;

pub use builder::{build_structure_tree, AltTextMap};
pub use marked_content::MarkedContent;
pub use parent_tree::ParentTree;
pub use serialize::{alt_text_coverage, assign_struct_parents, struct_tree_root_present, write_struct_tree};
pub use tagged::{
    MarkedContentReference, RoleMap, StandardStructureType, StructTree, StructureAttributes,
    StructureElement, StructureType,
};
