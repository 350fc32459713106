//! Automated PDF/UA-1 (ISO 14289-1) accessibility remediator.
//!
//! Takes an arbitrary PDF and produces a tagged, validated copy: a synthesised structure
//! tree rooted at `StructTreeRoot`, marked-content (BDC/EMC) associations carrying the
//! ParentTree's cross-reference invariant, alt text for figures and formulas, XMP
//! metadata, enriched link annotations, and viewer-preference hints. See [`pipeline`] for
//! the orchestration that ties every layer below together.

pub mod alttext;
pub mod catalog;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod context;
pub mod cos;
pub mod describer;
pub mod error;
pub mod layout;
pub mod objects;
pub mod pipeline;
pub mod render;
pub mod rewriter;
pub mod scoring;
pub mod structure;
pub mod validator;
pub mod xmp;

pub use config::Config;
pub use cos::Document;
pub use error::{PdfError, Result};
