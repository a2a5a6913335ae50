//! Guard construction (spec §4.4): combinational predicates over
//! DagBufferNode states, one pair (`true`/`false`) per conditional
//! terminator.

use crate::buffer::{CellVariant, DagBufferCtx, DagBufferNodeId};
use crate::error::{Result, SynthesisError};
use crate::expr::{bits_to_represent, cell_descriptor, BitExpr, OpAccessor};
use crate::ir::pattern::{PatternOpId, PatternValue};
use crate::ir::subject::EncodingContext;
use crate::span::dag::{OperationSpanId, SpanCtx, SpanRef, SpanTree};

pub fn cell_is_found(enc: &EncodingContext, node: DagBufferNodeId) -> BitExpr {
    BitExpr::SumIs {
        descriptor: cell_descriptor(enc),
        variant: CellVariant::Found.tag() as usize,
        value: Box::new(BitExpr::CellState(node)),
    }
}

pub fn cell_is_never(enc: &EncodingContext, node: DagBufferNodeId) -> BitExpr {
    BitExpr::SumIs {
        descriptor: cell_descriptor(enc),
        variant: CellVariant::Never.tag() as usize,
        value: Box::new(BitExpr::CellState(node)),
    }
}

pub fn found_op(enc: &EncodingContext, node: DagBufferNodeId) -> BitExpr {
    BitExpr::SumGetAs {
        descriptor: cell_descriptor(enc),
        variant: CellVariant::Found.tag() as usize,
        value: Box::new(BitExpr::CellState(node)),
    }
}

/// What a pattern-IR value denotes, for guard purposes: a position owned
/// by some used `OperationSpan`.
enum Locus {
    /// The value denotes the operation itself (e.g. the root, or a
    /// `get_defining_op` result): the substructure trivially exists once
    /// the cell is found.
    Operation(OperationSpanId),
    /// The value denotes operand `index` of `owner`: the substructure is
    /// `has_operand(index)` on the found op.
    Operand(OperationSpanId, u32),
    /// The value denotes result `index` of `owner`: the substructure is
    /// `has_result()` on the found op (the data model allows only index 0,
    /// spec §3.2/§9 "at most one result").
    Result(OperationSpanId, u32),
}

fn locate(tree: &SpanTree, ctx: &SpanCtx, value: PatternValue, op: PatternOpId) -> Result<Locus> {
    match ctx.get(value) {
        Some(SpanRef::Operation(id)) => Ok(Locus::Operation(id)),
        Some(SpanRef::Operand(id)) => {
            let operand = &tree.operands[id];
            Ok(Locus::Operand(operand.operand_of, operand.operand_index))
        }
        Some(SpanRef::Result(id)) => {
            let result = &tree.results[id];
            Ok(Locus::Result(result.result_of, result.result_index))
        }
        _ => Err(SynthesisError::UnsupportedPatternFeature(op)),
    }
}

fn owner_node(dag: &DagBufferCtx, span: OperationSpanId, op: PatternOpId) -> Result<DagBufferNodeId> {
    dag.node_for(span)
        .ok_or(SynthesisError::UnsupportedPatternFeature(op))
}

/// `is_not_null(v)` guards (spec §4.4).
pub fn is_not_null_guards(
    enc: &EncodingContext,
    tree: &SpanTree,
    ctx: &SpanCtx,
    dag: &DagBufferCtx,
    value: PatternValue,
    op: PatternOpId,
) -> Result<(BitExpr, BitExpr)> {
    let locus = locate(tree, ctx, value, op)?;
    let (node, substructure) = match locus {
        Locus::Operation(span) => (owner_node(dag, span, op)?, BitExpr::Const(1, 1)),
        Locus::Operand(span, index) => {
            let node = owner_node(dag, span, op)?;
            (
                node,
                BitExpr::OpAccess(OpAccessor::HasOperand(index), Box::new(found_op(enc, node))),
            )
        }
        Locus::Result(span, _index) => {
            let node = owner_node(dag, span, op)?;
            (
                node,
                BitExpr::OpAccess(OpAccessor::HasResult, Box::new(found_op(enc, node))),
            )
        }
    };
    let found = cell_is_found(enc, node);
    let never = cell_is_never(enc, node);
    let true_guard = BitExpr::and([found.clone(), substructure.clone()]);
    let false_guard = BitExpr::or([never, BitExpr::and([found, BitExpr::Not(Box::new(substructure))])]);
    Ok((true_guard, false_guard))
}

/// Guard for one case of a `switch_*` terminator: *"parent cell is `found`
/// AND the unwrapped op's predicate for this case holds"* (spec §4.4).
pub fn switch_case_guard(
    enc: &EncodingContext,
    tree: &SpanTree,
    ctx: &SpanCtx,
    dag: &DagBufferCtx,
    subject: PatternValue,
    op: PatternOpId,
    predicate: impl FnOnce(BitExpr) -> BitExpr,
) -> Result<BitExpr> {
    let locus = locate(tree, ctx, subject, op)?;
    let span = match locus {
        Locus::Operation(span) | Locus::Operand(span, _) | Locus::Result(span, _) => span,
    };
    let node = owner_node(dag, span, op)?;
    Ok(BitExpr::and([
        cell_is_found(enc, node),
        predicate(found_op(enc, node)),
    ]))
}

/// Guard for a `switch_*`'s `default_dest`: *"cell is `found` OR `never`"*
/// (spec §4.4) — fires whenever no earlier case guard already claimed the
/// cycle.
pub fn switch_default_guard(
    enc: &EncodingContext,
    tree: &SpanTree,
    ctx: &SpanCtx,
    dag: &DagBufferCtx,
    subject: PatternValue,
    op: PatternOpId,
) -> Result<BitExpr> {
    let locus = locate(tree, ctx, subject, op)?;
    let span = match locus {
        Locus::Operation(span) | Locus::Operand(span, _) | Locus::Result(span, _) => span,
    };
    let node = owner_node(dag, span, op)?;
    Ok(BitExpr::or([cell_is_found(enc, node), cell_is_never(enc, node)]))
}

fn predicate_guards(
    enc: &EncodingContext,
    tree: &SpanTree,
    ctx: &SpanCtx,
    dag: &DagBufferCtx,
    value: PatternValue,
    op: PatternOpId,
    predicate: impl FnOnce(BitExpr) -> BitExpr,
) -> Result<(BitExpr, BitExpr)> {
    let locus = locate(tree, ctx, value, op)?;
    let span = match locus {
        Locus::Operation(span) | Locus::Operand(span, _) | Locus::Result(span, _) => span,
    };
    let node = owner_node(dag, span, op)?;
    let found = cell_is_found(enc, node);
    let never = cell_is_never(enc, node);
    let pred = predicate(found_op(enc, node));
    let true_guard = BitExpr::and([found.clone(), pred.clone()]);
    let false_guard = BitExpr::or([never, BitExpr::and([found, BitExpr::Not(Box::new(pred))])]);
    Ok((true_guard, false_guard))
}

/// `check_operand_count(value, count, compare_at_least)` guards (spec §4.4).
#[allow(clippy::too_many_arguments)]
pub fn check_operand_count_guards(
    enc: &EncodingContext,
    tree: &SpanTree,
    ctx: &SpanCtx,
    dag: &DagBufferCtx,
    value: PatternValue,
    op: PatternOpId,
    count: u32,
    compare_at_least: bool,
) -> Result<(BitExpr, BitExpr)> {
    if count == 0 && compare_at_least {
        return Ok((BitExpr::Const(1, 1), BitExpr::Const(0, 1)));
    }
    predicate_guards(enc, tree, ctx, dag, value, op, |found| {
        if compare_at_least {
            BitExpr::OpAccess(OpAccessor::HasOperand(count - 1), Box::new(found))
        } else {
            BitExpr::OpAccess(OpAccessor::OperandAmountIs(count), Box::new(found))
        }
    })
}

/// `check_result_count(value, count, compare_at_least)` guards. Only counts
/// 0 and 1 are reachable (spec §4.4/§9: the data model permits at most one
/// result); anything else folds to constant false regardless of cell state.
#[allow(clippy::too_many_arguments)]
pub fn check_result_count_guards(
    enc: &EncodingContext,
    tree: &SpanTree,
    ctx: &SpanCtx,
    dag: &DagBufferCtx,
    value: PatternValue,
    op: PatternOpId,
    count: u32,
    compare_at_least: bool,
) -> Result<(BitExpr, BitExpr)> {
    match (count, compare_at_least) {
        (0, true) => Ok((BitExpr::Const(1, 1), BitExpr::Const(0, 1))),
        (0, false) => predicate_guards(enc, tree, ctx, dag, value, op, |found| {
            BitExpr::Not(Box::new(BitExpr::OpAccess(OpAccessor::HasResult, Box::new(found))))
        }),
        (1, _) => predicate_guards(enc, tree, ctx, dag, value, op, |found| {
            BitExpr::OpAccess(OpAccessor::HasResult, Box::new(found))
        }),
        _ => Ok((BitExpr::Const(0, 1), BitExpr::Const(1, 1))),
    }
}

/// Guard for one case of a `switch_type`/`switch_types` terminator, which
/// (unlike `switch_operation_name`/`switch_operand_count`/
/// `switch_result_count`) dispatches on a *type*-denoted value rather than
/// an operation-denoted one: the owning cell is the parent operand/result's
/// owner, not the subject itself.
pub fn switch_type_case_guard(
    enc: &EncodingContext,
    tree: &SpanTree,
    ctx: &SpanCtx,
    dag: &DagBufferCtx,
    value: PatternValue,
    op: PatternOpId,
    tys: &[crate::ir::subject::TypeId],
) -> Result<BitExpr> {
    let (node, checks) = match ctx.get(value) {
        Some(SpanRef::OperandType(id)) => {
            let operand = &tree.operands[id];
            let node = owner_node(dag, operand.operand_of, op)?;
            let idx = operand.operand_index;
            (
                node,
                vec![BitExpr::OpAccess(
                    OpAccessor::OperandTypeIs(idx, tys[0]),
                    Box::new(found_op(enc, node)),
                )],
            )
        }
        Some(SpanRef::ResultType(id)) => {
            let node = owner_node(dag, tree.results[id].result_of, op)?;
            (node, vec![BitExpr::OpAccess(OpAccessor::ResultTypeIs(tys[0]), Box::new(found_op(enc, node)))])
        }
        Some(SpanRef::OperandTypeRange(span)) => {
            let node = owner_node(dag, span, op)?;
            let checks = tys
                .iter()
                .enumerate()
                .map(|(i, ty)| {
                    BitExpr::OpAccess(OpAccessor::OperandTypeIs(i as u32, *ty), Box::new(found_op(enc, node)))
                })
                .collect();
            (node, checks)
        }
        Some(SpanRef::ResultTypeRange(span)) => {
            let node = owner_node(dag, span, op)?;
            let checks = tys
                .iter()
                .map(|ty| BitExpr::OpAccess(OpAccessor::ResultTypeIs(*ty), Box::new(found_op(enc, node))))
                .collect();
            (node, checks)
        }
        _ => return Err(SynthesisError::UnsupportedPatternFeature(op)),
    };
    Ok(BitExpr::and([cell_is_found(enc, node), BitExpr::and(checks)]))
}

pub fn switch_type_default_guard(
    enc: &EncodingContext,
    tree: &SpanTree,
    ctx: &SpanCtx,
    dag: &DagBufferCtx,
    value: PatternValue,
    op: PatternOpId,
) -> Result<BitExpr> {
    let node = match ctx.get(value) {
        Some(SpanRef::OperandType(id)) => owner_node(dag, tree.operands[id].operand_of, op)?,
        Some(SpanRef::ResultType(id)) => owner_node(dag, tree.results[id].result_of, op)?,
        Some(SpanRef::OperandTypeRange(span)) | Some(SpanRef::ResultTypeRange(span)) => {
            owner_node(dag, span, op)?
        }
        _ => return Err(SynthesisError::UnsupportedPatternFeature(op)),
    };
    Ok(BitExpr::or([cell_is_found(enc, node), cell_is_never(enc, node)]))
}

/// What a side of an `are_equal` denotes: an operand or result position,
/// with the owning operation and the index under it (spec §4.4: "values
/// derived from operand-chains rooted in the pattern").
enum Leaf {
    Operand(u32),
    Result,
}

fn resolve_leaf(
    tree: &SpanTree,
    ctx: &SpanCtx,
    value: PatternValue,
    op: PatternOpId,
) -> Result<(OperationSpanId, Leaf)> {
    match ctx.get(value) {
        Some(SpanRef::Operand(id)) => {
            let operand = &tree.operands[id];
            Ok((operand.operand_of, Leaf::Operand(operand.operand_index)))
        }
        Some(SpanRef::Result(id)) => Ok((tree.results[id].result_of, Leaf::Result)),
        _ => Err(SynthesisError::UnsupportedPatternFeature(op)),
    }
}

/// The chain of `operand_of` edges from the root down to (and including)
/// `span`. Linear in the span tree's size — the same known simplification
/// as [`SpanTree::parent_of`](crate::span::dag::SpanTree).
fn parent_of_operation(tree: &SpanTree, span: OperationSpanId) -> Option<(OperationSpanId, u32)> {
    if span == tree.root() {
        return None;
    }
    tree.operands
        .iter()
        .find(|(_, o)| o.defining_op == span)
        .map(|(_, o)| (o.operand_of, o.operand_index))
}

fn node_chain(tree: &SpanTree, span: OperationSpanId) -> Vec<OperationSpanId> {
    let mut chain = vec![span];
    let mut current = span;
    while let Some((parent, _)) = parent_of_operation(tree, current) {
        chain.push(parent);
        current = parent;
    }
    chain.reverse();
    chain
}

/// Edges from `ancestor` down to (but not including) `descendant`, each
/// tuple `(cell, index)` naming the node whose found-op supplies the
/// offset and the operand index read from it.
fn edges_between(
    tree: &SpanTree,
    ancestor: OperationSpanId,
    descendant: OperationSpanId,
) -> Vec<(OperationSpanId, u32)> {
    let mut edges = Vec::new();
    let mut current = descendant;
    while current != ancestor {
        let (parent, index) = parent_of_operation(tree, current)
            .expect("descendant must be reachable from ancestor in the span tree");
        edges.push((parent, index));
        current = parent;
    }
    edges.reverse();
    edges
}

/// Every cell whose found-op must be read to compute `value`'s path sum,
/// paired with the operand index read there (`None` for the final edge of
/// a result-denoted side, which contributes a constant 0 — results sit at
/// their producing operation's own stream position).
fn tail(
    tree: &SpanTree,
    ctx: &SpanCtx,
    lca: OperationSpanId,
    value: PatternValue,
    op: PatternOpId,
) -> Result<Vec<(OperationSpanId, Option<u32>)>> {
    let (owner, leaf) = resolve_leaf(tree, ctx, value, op)?;
    let mut edges: Vec<(OperationSpanId, Option<u32>)> = edges_between(tree, lca, owner)
        .into_iter()
        .map(|(cell, index)| (cell, Some(index)))
        .collect();
    match leaf {
        Leaf::Operand(index) => edges.push((owner, Some(index))),
        Leaf::Result => edges.push((owner, None)),
    }
    Ok(edges)
}

fn sum_expr(
    enc: &EncodingContext,
    dag: &DagBufferCtx,
    path: &[(OperationSpanId, Option<u32>)],
    width: u32,
    op: PatternOpId,
) -> Result<BitExpr> {
    let mut acc = BitExpr::Const(0, width);
    for (span, index) in path {
        let node = owner_node(dag, *span, op)?;
        let term = match index {
            Some(i) => BitExpr::OpAccess(OpAccessor::GetOperandOffset(*i), Box::new(found_op(enc, node))),
            None => BitExpr::Const(0, width),
        };
        acc = BitExpr::Add(Box::new(acc), Box::new(term));
    }
    Ok(acc)
}

fn blockers_found(enc: &EncodingContext, dag: &DagBufferCtx, path: &[(OperationSpanId, Option<u32>)], op: PatternOpId) -> Result<BitExpr> {
    let mut terms = Vec::with_capacity(path.len());
    for (span, _) in path {
        terms.push(cell_is_found(enc, owner_node(dag, *span, op)?));
    }
    Ok(BitExpr::and(terms))
}

fn blockers_never(enc: &EncodingContext, dag: &DagBufferCtx, path: &[(OperationSpanId, Option<u32>)], op: PatternOpId) -> Result<BitExpr> {
    let mut terms = Vec::with_capacity(path.len());
    for (span, _) in path {
        terms.push(cell_is_never(enc, owner_node(dag, *span, op)?));
    }
    Ok(BitExpr::or(terms))
}

/// `are_equal(lhs, rhs)` guards (spec §4.4, §9): locate the lowest common
/// ancestor of the two denoted positions in the Span DAG, sum each side's
/// own path of operand offsets independently (the corrected version of the
/// source's path-sum bug — see the open-question note in `DESIGN.md`), and
/// compare.
pub fn are_equal_guards(
    enc: &EncodingContext,
    tree: &SpanTree,
    ctx: &SpanCtx,
    dag: &DagBufferCtx,
    lhs: PatternValue,
    rhs: PatternValue,
    op: PatternOpId,
) -> Result<(BitExpr, BitExpr)> {
    let (owner_lhs, _) = resolve_leaf(tree, ctx, lhs, op)?;
    let (owner_rhs, _) = resolve_leaf(tree, ctx, rhs, op)?;
    let chain_lhs = node_chain(tree, owner_lhs);
    let chain_rhs = node_chain(tree, owner_rhs);
    let common = chain_lhs
        .iter()
        .zip(chain_rhs.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let lca = chain_lhs[common - 1];

    let path_lhs = tail(tree, ctx, lca, lhs, op)?;
    let path_rhs = tail(tree, ctx, lca, rhs, op)?;

    let max_len = path_lhs.len().max(path_rhs.len()).max(1);
    let width = enc.operand_offset_width + bits_to_represent(max_len as u64);

    let sum_lhs = sum_expr(enc, dag, &path_lhs, width, op)?;
    let sum_rhs = sum_expr(enc, dag, &path_rhs, width, op)?;

    let found_lhs = blockers_found(enc, dag, &path_lhs, op)?;
    let found_rhs = blockers_found(enc, dag, &path_rhs, op)?;
    let never_lhs = blockers_never(enc, dag, &path_lhs, op)?;
    let never_rhs = blockers_never(enc, dag, &path_rhs, op)?;

    let true_guard = BitExpr::and([
        found_lhs.clone(),
        found_rhs.clone(),
        BitExpr::Eq(Box::new(sum_lhs), Box::new(sum_rhs)),
    ]);
    let false_guard = BitExpr::or([BitExpr::and([found_lhs, found_rhs]), never_lhs, never_rhs]);
    Ok((true_guard, false_guard))
}
