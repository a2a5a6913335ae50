//! Stage B: span analysis (spec §4.2). Walks the interpreter's value-use
//! graph rooted at the matched operation and builds the Span DAG.

use log::{debug, trace};

use crate::error::{Result, SynthesisError};
use crate::ir::pattern::{PatternOpId, PatternValue, Region, Terminator, Use, ValueDef};

use super::dag::{OperandSpanId, OperationSpanId, SpanCtx, SpanRef, SpanTree};

/// Given an already-normalized interpreter region, compute its Span DAG.
///
/// Fails with [`SynthesisError::UnsupportedPatternFeature`] if the region's
/// control-flow graph has a cycle, or if the walk reaches an interpreter
/// feature outside the supported subset (spec §3.2 invariants, §4.2).
pub fn compute_span_dag(region: &Region) -> Result<(OperationSpanId, SpanTree, SpanCtx)> {
    if region.has_cycles() {
        let culprit = region
            .block(region.entry())
            .terminator
            .as_ref()
            .map(Terminator::id)
            .unwrap_or_else(PatternOpId::placeholder);
        return Err(SynthesisError::UnsupportedPatternFeature(culprit));
    }

    let mut tree = SpanTree::new();
    let mut ctx = SpanCtx::new();

    let entry = region.entry();
    let root_value = region
        .block(entry)
        .argument
        .expect("entry block must have the root matched operation as its argument");

    let root = tree.alloc_operation();
    tree.root = Some(root);
    bind_operation_value(&mut tree, &mut ctx, root, root_value);

    walk_operation(region, &mut tree, &mut ctx, root_value, root)?;

    debug!(
        "stage B: span DAG has {} operation span(s), {} operand span(s), {} result span(s)",
        tree.operations.len(),
        tree.operands.len(),
        tree.results.len()
    );

    Ok((root, tree, ctx))
}

fn bind_operation_value(
    tree: &mut SpanTree,
    ctx: &mut SpanCtx,
    span: OperationSpanId,
    value: PatternValue,
) {
    tree.operations[span].pdl_values.push(value);
    ctx.bind(value, SpanRef::Operation(span));
}

fn operand_span(
    region: &Region,
    tree: &mut SpanTree,
    ctx: &mut SpanCtx,
    op_span: OperationSpanId,
    operand: Option<PatternValue>,
    index: u32,
) -> Result<OperandSpanId> {
    let span = tree.operand_of(op_span, index);
    if let Some(v) = operand {
        tree.operands[span].pdl_values.push(v);
        ctx.bind(v, SpanRef::Operand(span));
    }
    let _ = region;
    Ok(span)
}

/// Walk the uses of `value`, known to denote the operation `op_span`.
/// Returns whether `op_span` is used (directly or transitively).
fn walk_operation(
    region: &Region,
    tree: &mut SpanTree,
    ctx: &mut SpanCtx,
    value: PatternValue,
    op_span: OperationSpanId,
) -> Result<bool> {
    let mut used = false;
    for use_ in region.uses_of(value) {
        match use_ {
            Use::Terminator(Terminator::AreEqual { .. })
            | Use::Terminator(Terminator::CheckOperandCount { .. })
            | Use::Terminator(Terminator::SwitchOperationName { .. })
            | Use::Terminator(Terminator::SwitchOperandCount { .. })
            | Use::Terminator(Terminator::CheckResultCount { .. })
            | Use::Terminator(Terminator::SwitchResultCount { .. })
            | Use::Terminator(Terminator::IsNotNull { .. })
            | Use::Terminator(Terminator::RecordMatch { .. }) => {
                used = true;
            }
            Use::Value(op) => match op.def {
                ValueDef::GetOperand { index, .. } => {
                    let span = operand_span(region, tree, ctx, op_span, Some(op.result), index)?;
                    used |= walk_operand(region, tree, ctx, op.result, span)?;
                }
                ValueDef::GetOperands { index: Some(idx), .. } => {
                    let span = operand_span(region, tree, ctx, op_span, Some(op.result), idx)?;
                    used |= walk_operand(region, tree, ctx, op.result, span)?;
                }
                ValueDef::GetOperands { index: None, .. } => {
                    tree.operations[op_span]
                        .operand_ranges
                        .push(op.result);
                    ctx.bind(op.result, SpanRef::OperandRange(op_span));
                    used |= walk_operand_range(region, tree, ctx, op.result, op_span)?;
                }
                ValueDef::GetResult { index, .. } => {
                    let span = result_span(tree, ctx, op_span, Some(op.result), index);
                    used |= walk_result(region, tree, ctx, op.result, span)?;
                }
                ValueDef::GetResults { index: Some(idx), .. } => {
                    let span = result_span(tree, ctx, op_span, Some(op.result), idx);
                    used |= walk_result(region, tree, ctx, op.result, span)?;
                }
                ValueDef::GetResults { index: None, .. } => {
                    tree.operations[op_span].result_ranges.push(op.result);
                    ctx.bind(op.result, SpanRef::ResultRange(op_span));
                    used |= walk_result_range(region, tree, ctx, op.result, op_span)?;
                }
                _ => return Err(unsupported(&op.id)),
            },
            Use::Terminator(term) => return Err(unsupported(&term.id())),
        }
    }
    if used {
        tree.mark_used(op_span);
    }
    Ok(used)
}

fn result_span(
    tree: &mut SpanTree,
    ctx: &mut SpanCtx,
    op_span: OperationSpanId,
    result: Option<PatternValue>,
    index: u32,
) -> super::dag::ResultSpanId {
    let span = tree.result_of(op_span, index);
    if let Some(v) = result {
        tree.results[span].pdl_values.push(v);
        ctx.bind(v, SpanRef::Result(span));
    }
    span
}

fn walk_operand(
    region: &Region,
    tree: &mut SpanTree,
    ctx: &mut SpanCtx,
    value: PatternValue,
    span: OperandSpanId,
) -> Result<bool> {
    let mut used = false;
    for use_ in region.uses_of(value) {
        match use_ {
            Use::Terminator(Terminator::AreEqual { .. })
            | Use::Terminator(Terminator::IsNotNull { .. })
            | Use::Terminator(Terminator::RecordMatch { .. }) => used = true,
            Use::Value(op) => match op.def {
                ValueDef::GetDefiningOp { .. } => {
                    let defining_op = tree.operands[span].defining_op;
                    bind_operation_value(tree, ctx, defining_op, op.result);
                    used |= walk_operation(region, tree, ctx, op.result, defining_op)?;
                }
                ValueDef::GetValueType { .. } => {
                    tree.operands[span].pdl_types.push(op.result);
                    ctx.bind(op.result, SpanRef::OperandType(span));
                    used |= walk_type(region, ctx, op.result)?;
                }
                _ => return Err(unsupported(&op.id)),
            },
            Use::Terminator(term) => return Err(unsupported(&term.id())),
        }
    }
    Ok(used)
}

fn walk_result(
    region: &Region,
    tree: &mut SpanTree,
    ctx: &mut SpanCtx,
    value: PatternValue,
    span: super::dag::ResultSpanId,
) -> Result<bool> {
    let mut used = false;
    for use_ in region.uses_of(value) {
        match use_ {
            Use::Terminator(Terminator::AreEqual { .. })
            | Use::Terminator(Terminator::IsNotNull { .. })
            | Use::Terminator(Terminator::RecordMatch { .. }) => used = true,
            Use::Value(op) => match op.def {
                ValueDef::GetDefiningOp { .. } => {
                    let result_of = tree.results[span].result_of;
                    bind_operation_value(tree, ctx, result_of, op.result);
                    used |= walk_operation(region, tree, ctx, op.result, result_of)?;
                }
                ValueDef::GetValueType { .. } => {
                    tree.results[span].pdl_types.push(op.result);
                    ctx.bind(op.result, SpanRef::ResultType(span));
                    used |= walk_type(region, ctx, op.result)?;
                }
                _ => return Err(unsupported(&op.id)),
            },
            Use::Terminator(term) => return Err(unsupported(&term.id())),
        }
    }
    Ok(used)
}

fn walk_operand_range(
    region: &Region,
    tree: &mut SpanTree,
    ctx: &mut SpanCtx,
    value: PatternValue,
    op_span: OperationSpanId,
) -> Result<bool> {
    let mut used = false;
    for use_ in region.uses_of(value) {
        match use_ {
            Use::Terminator(Terminator::AreEqual { .. })
            | Use::Terminator(Terminator::IsNotNull { .. }) => used = true,
            Use::Value(op) => match op.def {
                ValueDef::Extract { index, .. } => {
                    if index != 0 {
                        return Err(unsupported(&op.id));
                    }
                    let span = operand_span(region, tree, ctx, op_span, Some(op.result), index)?;
                    used |= walk_operand(region, tree, ctx, op.result, span)?;
                }
                ValueDef::GetDefiningOp { .. } => {
                    // An un-indexed extraction followed directly by
                    // `get_defining_op`: equivalent to indexing at 0.
                    let span = operand_span(region, tree, ctx, op_span, None, 0)?;
                    let defining_op = tree.operands[span].defining_op;
                    bind_operation_value(tree, ctx, defining_op, op.result);
                    used |= walk_operation(region, tree, ctx, op.result, defining_op)?;
                }
                ValueDef::GetValueType { .. } => {
                    tree.operations[op_span]
                        .operand_type_ranges
                        .push(op.result);
                    ctx.bind(op.result, SpanRef::OperandTypeRange(op_span));
                    used |= walk_type_range(region, ctx, op.result)?;
                }
                _ => return Err(unsupported(&op.id)),
            },
            Use::Terminator(term) => return Err(unsupported(&term.id())),
        }
    }
    Ok(used)
}

fn walk_result_range(
    region: &Region,
    tree: &mut SpanTree,
    ctx: &mut SpanCtx,
    value: PatternValue,
    op_span: OperationSpanId,
) -> Result<bool> {
    let mut used = false;
    for use_ in region.uses_of(value) {
        match use_ {
            Use::Terminator(Terminator::AreEqual { .. })
            | Use::Terminator(Terminator::IsNotNull { .. }) => used = true,
            Use::Value(op) => match op.def {
                ValueDef::Extract { index, .. } => {
                    if index != 0 {
                        return Err(unsupported(&op.id));
                    }
                    let span = result_span(tree, ctx, op_span, Some(op.result), index);
                    used |= walk_result(region, tree, ctx, op.result, span)?;
                }
                ValueDef::GetDefiningOp { .. } => {
                    bind_operation_value(tree, ctx, op_span, op.result);
                    used |= walk_operation(region, tree, ctx, op.result, op_span)?;
                }
                ValueDef::GetValueType { .. } => {
                    tree.operations[op_span]
                        .result_type_ranges
                        .push(op.result);
                    ctx.bind(op.result, SpanRef::ResultTypeRange(op_span));
                    used |= walk_type_range(region, ctx, op.result)?;
                }
                _ => return Err(unsupported(&op.id)),
            },
            Use::Terminator(term) => return Err(unsupported(&term.id())),
        }
    }
    Ok(used)
}

fn walk_type_range(region: &Region, ctx: &SpanCtx, value: PatternValue) -> Result<bool> {
    let mut used = false;
    for use_ in region.uses_of(value) {
        match use_ {
            Use::Terminator(Terminator::AreEqual { .. })
            | Use::Terminator(Terminator::IsNotNull { .. })
            | Use::Terminator(Terminator::SwitchTypes { .. }) => used = true,
            Use::Value(op) => match op.def {
                ValueDef::Extract { index, .. } => {
                    if index != 0 {
                        return Err(unsupported(&op.id));
                    }
                    used |= walk_type(region, ctx, op.result)?;
                }
                _ => return Err(unsupported(&op.id)),
            },
            Use::Terminator(term) => return Err(unsupported(&term.id())),
        }
    }
    Ok(used)
}

fn walk_type(region: &Region, ctx: &SpanCtx, value: PatternValue) -> Result<bool> {
    let mut used = false;
    for use_ in region.uses_of(value) {
        match use_ {
            Use::Terminator(Terminator::AreEqual { .. })
            | Use::Terminator(Terminator::IsNotNull { .. })
            | Use::Terminator(Terminator::SwitchType { .. }) => used = true,
            Use::Value(op) => return Err(unsupported(&op.id)),
            Use::Terminator(term) => return Err(unsupported(&term.id())),
        }
    }
    let _ = ctx;
    trace!("stage B: type value {value} used = {used}");
    Ok(used)
}

fn unsupported(op: &PatternOpId) -> SynthesisError {
    SynthesisError::UnsupportedPatternFeature(*op)
}
