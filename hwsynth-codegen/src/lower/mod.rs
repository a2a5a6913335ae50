//! Stage D: bit-level lowering (spec §4.5).

pub mod hw_op;
pub mod sum;

pub use hw_op::lower_op_accesses;
pub use sum::lower_sums;

use crate::error::Result;
use crate::expr::BitExpr;
use crate::ir::subject::{EncodingContext, OperationContext};

/// Run both lowering passes over one expression: tagged-union lowering
/// (D.1) first, then operation-value lowering (D.2). Order does not affect
/// correctness here (the two passes rewrite disjoint node kinds and each
/// recurses through the other's), but matches the declaration order of
/// spec §4.5.
pub fn lower_expr(expr: &BitExpr, op_ctx: &OperationContext, enc: &EncodingContext) -> Result<BitExpr> {
    let sums_lowered = lower_sums(expr);
    lower_op_accesses(&sums_lowered, op_ctx, enc)
}
