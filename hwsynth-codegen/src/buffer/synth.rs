//! Builds the DAG buffer from a Span DAG (spec §4.3): one node per used
//! `OperationSpan`, each carrying the backing register and mux next-state
//! logic the "Per-cycle transitions" table specifies, plus the per-operand
//! `write_to`/`write_val` signals a found parent forwards to its children.
//! Grounded in `original_source/src/lowering/pdli_to_matcher_unit.py`'s
//! `build_filler_node`/`create_filler`.

use log::debug;

use crate::expr::{cell_descriptor, BitExpr, OpAccessor};
use crate::ir::subject::EncodingContext;
use crate::span::dag::{OperationSpanId, SpanTree};

use super::node::{CellVariant, DagBufferCtx, DagBufferNode, DagBufferNodeId};

pub fn build_dag_buffer(tree: &SpanTree, enc: &EncodingContext) -> DagBufferCtx {
    let mut ctx = DagBufferCtx::new();
    let mut counter = 0u32;
    // The root cell is found the instant its register comes out of reset
    // (spec §4.3 "Root cell"): no parent ever writes to it, so `write_to`
    // is hardcoded false and its reset/default value is `found(input_op)`
    // rather than `unknown`.
    let root = build_cell(
        tree,
        enc,
        &mut ctx,
        tree.root(),
        sum_create(enc, CellVariant::Found, BitExpr::InputOp),
        BitExpr::Const(0, 1),
        sum_create(enc, CellVariant::Found, BitExpr::InputOp),
        &mut counter,
    );
    ctx.root = Some(root);
    debug!("stage C.1: DAG buffer has {} cell(s)", ctx.nodes.len());
    ctx
}

fn sum_create(enc: &EncodingContext, variant: CellVariant, payload: BitExpr) -> BitExpr {
    BitExpr::SumCreate {
        descriptor: cell_descriptor(enc),
        variant: variant.tag() as usize,
        payload: Box::new(payload),
    }
}

fn sum_is(enc: &EncodingContext, value: &BitExpr, variant: CellVariant) -> BitExpr {
    BitExpr::SumIs {
        descriptor: cell_descriptor(enc),
        variant: variant.tag() as usize,
        value: Box::new(value.clone()),
    }
}

fn sum_get_as(enc: &EncodingContext, value: &BitExpr, variant: CellVariant) -> BitExpr {
    BitExpr::SumGetAs {
        descriptor: cell_descriptor(enc),
        variant: variant.tag() as usize,
        value: Box::new(value.clone()),
    }
}

/// Allocate `span`'s cell (and recursively, its used operand children),
/// wiring `default_value` as its register's reset value and `write_to`/
/// `write_val` as the override its parent offers it this cycle.
///
/// Mirrors `build_filler_node`: a five-way priority mux picks the next
/// register value — parent write wins, then "just became found", then
/// "already found" (freeze), then "stream ended" (become `never`), then
/// "located, not yet arrived" (decrement) — falling through to holding the
/// current state if none apply.
#[allow(clippy::too_many_arguments)]
fn build_cell(
    tree: &SpanTree,
    enc: &EncodingContext,
    ctx: &mut DagBufferCtx,
    span: OperationSpanId,
    default_value: BitExpr,
    write_to: BitExpr,
    write_val: BitExpr,
    counter: &mut u32,
) -> DagBufferNodeId {
    if let Some(existing) = ctx.node_for(span) {
        return existing;
    }
    let is_root = span == tree.root();

    // Reserve the node id first: the register's `next` expression refers
    // to the cell's own current state (`CellState(id)`).
    let id = ctx.nodes.push(DagBufferNode {
        span: Some(span),
        is_root,
        operand_children: Default::default(),
        register: BitExpr::Const(0, 1),
    });
    ctx.span_to_node.set(span, Some(id));
    let current = BitExpr::CellState(id);

    let is_never = sum_is(enc, &current, CellVariant::Never);
    let is_located_at = sum_is(enc, &current, CellVariant::LocatedAt);
    let is_found = sum_is(enc, &current, CellVariant::Found);
    let located_at_val = sum_get_as(enc, &current, CellVariant::LocatedAt);
    let is_located_at_zero = BitExpr::and([
        is_located_at.clone(),
        BitExpr::Eq(
            Box::new(located_at_val.clone()),
            Box::new(BitExpr::Const(0, enc.operand_offset_width)),
        ),
    ]);

    let decremented = sum_create(
        enc,
        CellVariant::LocatedAt,
        BitExpr::Sub(Box::new(located_at_val), Box::new(BitExpr::Const(1, enc.operand_offset_width))),
    );
    let constant_never = sum_create(enc, CellVariant::Never, BitExpr::Const(0, 1));
    let found_input = sum_create(enc, CellVariant::Found, BitExpr::InputOp);

    let decrement_mux = BitExpr::Mux {
        cond: Box::new(is_located_at),
        on_true: Box::new(decremented),
        on_false: Box::new(current.clone()),
    };
    let stream_end_mux = BitExpr::Mux {
        cond: Box::new(BitExpr::StreamCompleted),
        on_true: Box::new(constant_never.clone()),
        on_false: Box::new(decrement_mux),
    };
    let freeze_mux = BitExpr::Mux {
        cond: Box::new(is_found),
        on_true: Box::new(current.clone()),
        on_false: Box::new(stream_end_mux),
    };
    let become_found_mux = BitExpr::Mux {
        cond: Box::new(is_located_at_zero.clone()),
        on_true: Box::new(found_input),
        on_false: Box::new(freeze_mux),
    };
    let next = BitExpr::Mux {
        cond: Box::new(write_to.clone()),
        on_true: Box::new(write_val),
        on_false: Box::new(become_found_mux),
    };

    ctx.nodes[id].register = BitExpr::Reg {
        name: format!("dag_buffer_{counter}"),
        clock_enable: Box::new(BitExpr::Not(Box::new(BitExpr::IsStreamPaused))),
        reset: Box::new(BitExpr::NewSequence),
        reset_value: Box::new(default_value),
        next: Box::new(next),
    };
    *counter += 1;

    // `should_write_to`: this cell just became `never` or just became
    // `found` (crossed `located_at(0)` this cycle) — either way, its
    // operand children must accept whatever it offers them now.
    let should_write_to = BitExpr::or([is_never, is_located_at_zero.clone()]);

    let operands: Vec<u32> = tree.operations[span]
        .operands
        .keys()
        .copied()
        .filter(|index| {
            let operand_span = tree.operations[span].operands[index];
            tree.operations[tree.operands[operand_span].defining_op].used
        })
        .collect();

    let mut children = std::collections::BTreeMap::new();
    for index in operands {
        let operand_span = tree.operations[span].operands[&index];
        let defining_op = tree.operands[operand_span].defining_op;

        let has_operand = BitExpr::OpAccess(OpAccessor::HasOperand(index), Box::new(BitExpr::InputOp));
        let offset = BitExpr::OpAccess(OpAccessor::GetOperandOffset(index), Box::new(BitExpr::InputOp));
        let wrapped_offset = sum_create(enc, CellVariant::LocatedAt, offset);
        let child_write_val = BitExpr::Mux {
            cond: Box::new(has_operand.clone()),
            on_true: Box::new(wrapped_offset.clone()),
            on_false: Box::new(constant_never.clone()),
        };

        // Root's immediate children can't wait for a `located_at(0)`
        // write — root is found from the moment it comes out of reset, it
        // never visits `located_at` at all — so their reset/default value
        // is pre-resolved against the raw stream head directly, the same
        // expression `should_write_to`'s payload would compute later.
        let child_default = if is_root {
            child_write_val.clone()
        } else {
            sum_create(enc, CellVariant::Unknown, BitExpr::Const(0, 1))
        };

        let child = build_cell(
            tree,
            enc,
            ctx,
            defining_op,
            child_default,
            should_write_to.clone(),
            child_write_val,
            counter,
        );
        children.insert(index, child);
    }
    ctx.nodes[id].operand_children = children;

    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::pattern::Region;
    use crate::ir::subject::EncodingContext;
    use crate::span::compute_span_dag;

    fn enc() -> EncodingContext {
        EncodingContext::new(2, 4, 2)
    }

    /// `or(x, and(y, z))`: root used, operand 1's defining op used, its
    /// own operands unused — two DAG buffer cells (spec §8 scenario 4).
    #[test]
    fn nested_defining_op_produces_two_cells() {
        let mut region = Region::new();
        let entry = region.entry();
        let root = region.set_root_argument();

        let operand0 = crate::ir::pattern::ValueDef::GetOperand { op: root, index: 0 };
        let operand0_val = region.push_op(entry, operand0);
        let operand1 = crate::ir::pattern::ValueDef::GetOperand { op: root, index: 1 };
        let operand1_val = region.push_op(entry, operand1);
        let and_op = crate::ir::pattern::ValueDef::GetDefiningOp { value: operand1_val };
        let and_val = region.push_op(entry, and_op);

        let record = region.push_block();
        let fail = region.push_block();
        let id = region.new_op_id();
        region.block_mut(entry).terminator = Some(crate::ir::pattern::Terminator::IsNotNull {
            id,
            value: and_val,
            true_dest: record,
            false_dest: fail,
        });
        region.block_mut(record).terminator =
            Some(crate::ir::pattern::Terminator::RecordMatch { id });
        region.block_mut(fail).terminator = Some(crate::ir::pattern::Terminator::Finalize { id });

        let _ = operand0_val;
        let (root_span, tree, _ctx) = compute_span_dag(&region).unwrap();
        let enc = enc();
        let dag = build_dag_buffer(&tree, &enc);

        assert_eq!(dag.nodes.len(), 2);
        let root_node = dag.node_for(root_span).unwrap();
        assert_eq!(dag.nodes[root_node].operand_children.len(), 1);
        assert!(dag.nodes[root_node].operand_children.contains_key(&1));
        assert!(dag.nodes[root_node].is_root);
        assert!(matches!(dag.nodes[root_node].register, BitExpr::Reg { .. }));

        let child = dag.nodes[root_node].operand_children[&1];
        assert!(!dag.nodes[child].is_root);
        assert!(matches!(dag.nodes[child].register, BitExpr::Reg { .. }));
    }
}
