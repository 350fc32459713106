//! ContentStreamRewriter: dissolves a prior, inadequate `/Figure` BDC/EMC wrapper and
//! replaces it with one `BDC`/`EMC` pair per classified block, MCID assigned in emission
//! order (spec.md §4.6).

use crate::classifier::{ClassifiedBlock, Role};
use crate::cos::content::Op;
use crate::objects::{Dictionary, Object};

fn mcid_dict(mcid: usize) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("MCID", Object::Integer(mcid as i64));
    dict
}

fn begin_op(role: Role, mcid: usize) -> Op {
    Op::new(
        "BDC",
        vec![Object::name(role.as_struct_type_name()), Object::Dictionary(mcid_dict(mcid))],
    )
}

fn end_op() -> Op {
    Op::new("EMC", Vec::new())
}

fn is_figure_bdc(op: &Op) -> bool {
    op.is_begin_marked_content() && op.mc_tag() == Some("Figure")
}

/// Rewrites one page's operator list. `blocks` must be that page's `ClassifiedBlock`s in
/// emission order, so `block_index` doubles as the new MCID.
pub fn rewrite_page(ops: &[Op], blocks: &[ClassifiedBlock]) -> Vec<Op> {
    if blocks.is_empty() {
        return ops.to_vec();
    }

    let begins: Vec<Op> = blocks.iter().map(|b| begin_op(b.role, b.block_index)).collect();
    let ends: Vec<Op> = blocks.iter().map(|_| end_op()).collect();

    let mut saw_figure_wrapper = false;
    let mut out = Vec::with_capacity(ops.len() + begins.len() + ends.len());
    let mut in_figure_block = false;

    for op in ops {
        if !in_figure_block && is_figure_bdc(op) {
            in_figure_block = true;
            saw_figure_wrapper = true;
            out.extend(begins.iter().cloned());
            continue;
        }
        if in_figure_block && op.is_end_marked_content() {
            in_figure_block = false;
            out.extend(ends.iter().cloned());
            continue;
        }
        out.push(op.clone());
    }

    if !saw_figure_wrapper {
        let mut wrapped = Vec::with_capacity(ops.len() + begins.len() + ends.len());
        wrapped.extend(begins);
        wrapped.extend(ops.iter().cloned());
        wrapped.extend(ends);
        return wrapped;
    }

    out
}
