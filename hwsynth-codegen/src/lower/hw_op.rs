//! Stage D.2: operation-value lowering (spec §4.5.2). Replaces every
//! `OpAccess` node by a disjunction over the static opcode catalog, or a
//! direct bit-field extraction.

use crate::error::{Result, SynthesisError};
use crate::expr::{BitExpr, OpAccessor};
use crate::ir::subject::{EncodingContext, OperationContext, OperationEntry};

pub fn lower_op_accesses(
    expr: &BitExpr,
    op_ctx: &OperationContext,
    enc: &EncodingContext,
) -> Result<BitExpr> {
    Ok(match expr {
        BitExpr::Const(..)
        | BitExpr::CellState(_)
        | BitExpr::InputOp
        | BitExpr::IsStreamPaused
        | BitExpr::NewSequence
        | BitExpr::StreamCompleted | BitExpr::FsmStatus => expr.clone(),
        BitExpr::OpAccess(acc, value) => {
            let value = lower_op_accesses(value, op_ctx, enc)?;
            lower_one(acc, value, op_ctx, enc)?
        }
        BitExpr::SumCreate { descriptor, variant, payload } => BitExpr::SumCreate {
            descriptor: descriptor.clone(),
            variant: *variant,
            payload: Box::new(lower_op_accesses(payload, op_ctx, enc)?),
        },
        BitExpr::SumIs { descriptor, variant, value } => BitExpr::SumIs {
            descriptor: descriptor.clone(),
            variant: *variant,
            value: Box::new(lower_op_accesses(value, op_ctx, enc)?),
        },
        BitExpr::SumGetAs { descriptor, variant, value } => BitExpr::SumGetAs {
            descriptor: descriptor.clone(),
            variant: *variant,
            value: Box::new(lower_op_accesses(value, op_ctx, enc)?),
        },
        BitExpr::Eq(a, b) => BitExpr::Eq(
            Box::new(lower_op_accesses(a, op_ctx, enc)?),
            Box::new(lower_op_accesses(b, op_ctx, enc)?),
        ),
        BitExpr::Add(a, b) => BitExpr::Add(
            Box::new(lower_op_accesses(a, op_ctx, enc)?),
            Box::new(lower_op_accesses(b, op_ctx, enc)?),
        ),
        BitExpr::Sub(a, b) => BitExpr::Sub(
            Box::new(lower_op_accesses(a, op_ctx, enc)?),
            Box::new(lower_op_accesses(b, op_ctx, enc)?),
        ),
        BitExpr::Concat(parts) => {
            BitExpr::Concat(lower_all(parts, op_ctx, enc)?)
        }
        BitExpr::Extract { value, lo, width } => BitExpr::Extract {
            value: Box::new(lower_op_accesses(value, op_ctx, enc)?),
            lo: *lo,
            width: *width,
        },
        BitExpr::Or(parts) => BitExpr::Or(lower_all(parts, op_ctx, enc)?),
        BitExpr::And(parts) => BitExpr::And(lower_all(parts, op_ctx, enc)?),
        BitExpr::Not(inner) => BitExpr::Not(Box::new(lower_op_accesses(inner, op_ctx, enc)?)),
        BitExpr::Mux { cond, on_true, on_false } => BitExpr::Mux {
            cond: Box::new(lower_op_accesses(cond, op_ctx, enc)?),
            on_true: Box::new(lower_op_accesses(on_true, op_ctx, enc)?),
            on_false: Box::new(lower_op_accesses(on_false, op_ctx, enc)?),
        },
        BitExpr::Reg { name, clock_enable, reset, reset_value, next } => BitExpr::Reg {
            name: name.clone(),
            clock_enable: Box::new(lower_op_accesses(clock_enable, op_ctx, enc)?),
            reset: Box::new(lower_op_accesses(reset, op_ctx, enc)?),
            reset_value: Box::new(lower_op_accesses(reset_value, op_ctx, enc)?),
            next: Box::new(lower_op_accesses(next, op_ctx, enc)?),
        },
    })
}

fn lower_all(parts: &[BitExpr], op_ctx: &OperationContext, enc: &EncodingContext) -> Result<Vec<BitExpr>> {
    parts.iter().map(|p| lower_op_accesses(p, op_ctx, enc)).collect()
}

fn fits(entry: &OperationEntry, enc: &EncodingContext) -> bool {
    (entry.opcode as u64) < (1u64 << enc.opcode_width)
}

fn opcode_slice(value: BitExpr, enc: &EncodingContext) -> BitExpr {
    BitExpr::Extract { value: Box::new(value), lo: 0, width: enc.opcode_width }
}

fn lower_one(
    acc: &OpAccessor,
    value: BitExpr,
    op_ctx: &OperationContext,
    enc: &EncodingContext,
) -> Result<BitExpr> {
    Ok(match acc {
        OpAccessor::GetOpcode => opcode_slice(value, enc),
        OpAccessor::GetOperandOffset(i) => BitExpr::Extract {
            value: Box::new(value),
            lo: enc.operand_offset_bit(*i),
            width: enc.operand_offset_width,
        },
        OpAccessor::HasOperand(i) => {
            let opcode = opcode_slice(value, enc);
            opcode_disjunction(op_ctx, enc, opcode, |e| e.operand_count() as u32 > *i)
        }
        OpAccessor::OperandAmountIs(n) => {
            let opcode = opcode_slice(value, enc);
            opcode_disjunction(op_ctx, enc, opcode, |e| e.operand_count() as u32 == *n)
        }
        OpAccessor::OperandTypeIs(i, ty) => {
            let opcode = opcode_slice(value, enc);
            opcode_disjunction(op_ctx, enc, opcode, |e| e.operand_types.get(*i as usize) == Some(ty))
        }
        OpAccessor::HasResult => {
            let opcode = opcode_slice(value, enc);
            opcode_disjunction(op_ctx, enc, opcode, |e| e.has_result())
        }
        OpAccessor::ResultTypeIs(ty) => {
            let opcode = opcode_slice(value, enc);
            opcode_disjunction(op_ctx, enc, opcode, |e| e.result_type == Some(*ty))
        }
        OpAccessor::IsOperation(name) => {
            let entry = op_ctx
                .by_name(name)
                .ok_or_else(|| SynthesisError::OperationNotFoundInContext(name.clone()))?;
            let opcode = opcode_slice(value, enc);
            BitExpr::Eq(Box::new(opcode), Box::new(BitExpr::Const(entry.opcode as u64, enc.opcode_width)))
        }
    })
}

fn opcode_disjunction(
    op_ctx: &OperationContext,
    enc: &EncodingContext,
    opcode: BitExpr,
    predicate: impl Fn(&OperationEntry) -> bool,
) -> BitExpr {
    let terms: Vec<BitExpr> = op_ctx
        .iter()
        .filter(|e| fits(e, enc) && predicate(e))
        .map(|e| BitExpr::Eq(Box::new(opcode.clone()), Box::new(BitExpr::Const(e.opcode as u64, enc.opcode_width))))
        .collect();
    if terms.is_empty() {
        BitExpr::Const(0, 1)
    } else {
        BitExpr::or(terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::subject::TypeCatalog;

    fn catalog() -> (OperationContext, EncodingContext) {
        let mut types = TypeCatalog::new();
        let i32_ty = types.intern("i32");
        let mut ctx = OperationContext::new(types);
        ctx.register(OperationEntry { name: "const".into(), opcode: 0, operand_types: vec![], result_type: Some(i32_ty) });
        ctx.register(OperationEntry { name: "add".into(), opcode: 1, operand_types: vec![i32_ty, i32_ty], result_type: Some(i32_ty) });
        let enc = EncodingContext::new(2, 4, 2);
        (ctx, enc)
    }

    #[test]
    fn is_operation_lowers_to_opcode_equality() {
        let (ctx, enc) = catalog();
        let expr = BitExpr::OpAccess(OpAccessor::IsOperation("add".into()), Box::new(BitExpr::InputOp));
        let lowered = lower_op_accesses(&expr, &ctx, &enc).unwrap();
        assert_eq!(
            lowered,
            BitExpr::Eq(
                Box::new(BitExpr::Extract { value: Box::new(BitExpr::InputOp), lo: 0, width: 2 }),
                Box::new(BitExpr::Const(1, 2)),
            )
        );
    }

    #[test]
    fn unknown_operation_name_is_an_error() {
        let (ctx, enc) = catalog();
        let expr = BitExpr::OpAccess(OpAccessor::IsOperation("sub".into()), Box::new(BitExpr::InputOp));
        let err = lower_op_accesses(&expr, &ctx, &enc).unwrap_err();
        assert_eq!(err, SynthesisError::OperationNotFoundInContext("sub".into()));
    }

    #[test]
    fn has_operand_ors_over_matching_opcodes() {
        let (ctx, enc) = catalog();
        let expr = BitExpr::OpAccess(OpAccessor::HasOperand(0), Box::new(BitExpr::InputOp));
        let lowered = lower_op_accesses(&expr, &ctx, &enc).unwrap();
        // only "add" (opcode 1) has an operand 0
        assert_eq!(
            lowered,
            BitExpr::Eq(
                Box::new(BitExpr::Extract { value: Box::new(BitExpr::InputOp), lo: 0, width: 2 }),
                Box::new(BitExpr::Const(1, 2)),
            )
        );
    }
}
