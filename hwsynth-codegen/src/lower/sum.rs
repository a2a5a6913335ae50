//! Stage D.1: tagged-union lowering (spec §4.5.1). Generic over any
//! [`SumTypeDescriptor`] — used for both the DAG-buffer cell's four-variant
//! state and the FSM's three-variant status.

use crate::expr::BitExpr;

/// Lower every `SumCreate`/`SumIs`/`SumGetAs` node in `expr` whose
/// descriptor has all-integer variants; recurse into (but leave alone) the
/// rest (spec P3: "a no-op on unions whose variants are not all
/// integer-typed").
pub fn lower_sums(expr: &BitExpr) -> BitExpr {
    match expr {
        BitExpr::Const(..)
        | BitExpr::CellState(_)
        | BitExpr::InputOp
        | BitExpr::IsStreamPaused
        | BitExpr::NewSequence
        | BitExpr::StreamCompleted | BitExpr::FsmStatus => expr.clone(),
        BitExpr::SumCreate { descriptor, variant, payload } => {
            let payload = lower_sums(payload);
            if !descriptor.all_integer() {
                return BitExpr::SumCreate {
                    descriptor: descriptor.clone(),
                    variant: *variant,
                    payload: Box::new(payload),
                };
            }
            let variant_width = descriptor.variant_width();
            if variant_width == 0 {
                // Single variant: Create is the identity on its payload.
                return payload;
            }
            let data_width = descriptor.variants[*variant].payload_width.unwrap_or(0);
            let full_width = descriptor.max_payload_width();
            let tag = BitExpr::Const(*variant as u64, variant_width);
            let padded = pad(payload, data_width, full_width);
            // variant id in the LSBs, payload above it (spec §4.5.1).
            BitExpr::Concat(vec![tag, padded])
        }
        BitExpr::SumIs { descriptor, variant, value } => {
            let value = lower_sums(value);
            if !descriptor.all_integer() {
                return BitExpr::SumIs {
                    descriptor: descriptor.clone(),
                    variant: *variant,
                    value: Box::new(value),
                };
            }
            let variant_width = descriptor.variant_width();
            if variant_width == 0 {
                return BitExpr::Const(1, 1);
            }
            BitExpr::Eq(
                Box::new(BitExpr::Extract { value: Box::new(value), lo: 0, width: variant_width }),
                Box::new(BitExpr::Const(*variant as u64, variant_width)),
            )
        }
        BitExpr::SumGetAs { descriptor, variant, value } => {
            let value = lower_sums(value);
            if !descriptor.all_integer() {
                return BitExpr::SumGetAs {
                    descriptor: descriptor.clone(),
                    variant: *variant,
                    value: Box::new(value),
                };
            }
            let variant_width = descriptor.variant_width();
            let width = descriptor.variants[*variant].payload_width.unwrap_or(0);
            BitExpr::Extract { value: Box::new(value), lo: variant_width, width }
        }
        BitExpr::OpAccess(acc, value) => BitExpr::OpAccess(acc.clone(), Box::new(lower_sums(value))),
        BitExpr::Eq(a, b) => BitExpr::Eq(Box::new(lower_sums(a)), Box::new(lower_sums(b))),
        BitExpr::Add(a, b) => BitExpr::Add(Box::new(lower_sums(a)), Box::new(lower_sums(b))),
        BitExpr::Sub(a, b) => BitExpr::Sub(Box::new(lower_sums(a)), Box::new(lower_sums(b))),
        BitExpr::Concat(parts) => BitExpr::Concat(parts.iter().map(lower_sums).collect()),
        BitExpr::Extract { value, lo, width } => {
            BitExpr::Extract { value: Box::new(lower_sums(value)), lo: *lo, width: *width }
        }
        BitExpr::Or(parts) => BitExpr::Or(parts.iter().map(lower_sums).collect()),
        BitExpr::And(parts) => BitExpr::And(parts.iter().map(lower_sums).collect()),
        BitExpr::Not(inner) => BitExpr::Not(Box::new(lower_sums(inner))),
        BitExpr::Mux { cond, on_true, on_false } => BitExpr::Mux {
            cond: Box::new(lower_sums(cond)),
            on_true: Box::new(lower_sums(on_true)),
            on_false: Box::new(lower_sums(on_false)),
        },
        BitExpr::Reg { name, clock_enable, reset, reset_value, next } => BitExpr::Reg {
            name: name.clone(),
            clock_enable: Box::new(lower_sums(clock_enable)),
            reset: Box::new(lower_sums(reset)),
            reset_value: Box::new(lower_sums(reset_value)),
            next: Box::new(lower_sums(next)),
        },
    }
}

fn pad(payload: BitExpr, width: u32, full_width: u32) -> BitExpr {
    if full_width > width {
        BitExpr::Concat(vec![payload, BitExpr::Const(0, full_width - width)])
    } else {
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::DagBufferNodeId;
    use crate::expr::{SumTypeDescriptor, SumVariant};
    use hwsynth_entity::EntityRef;

    fn integer_union() -> SumTypeDescriptor {
        SumTypeDescriptor {
            name: "u",
            variants: vec![
                SumVariant { name: "a", payload_width: Some(0) },
                SumVariant { name: "b", payload_width: Some(4) },
            ],
        }
    }

    fn non_integer_union() -> SumTypeDescriptor {
        SumTypeDescriptor {
            name: "u",
            variants: vec![
                SumVariant { name: "a", payload_width: Some(0) },
                SumVariant { name: "b", payload_width: None },
            ],
        }
    }

    #[test]
    fn all_integer_union_lowers_to_extract_and_eq() {
        let node = DagBufferNodeId::new(0);
        let expr = BitExpr::SumIs {
            descriptor: integer_union(),
            variant: 1,
            value: Box::new(BitExpr::CellState(node)),
        };
        let lowered = lower_sums(&expr);
        assert!(matches!(lowered, BitExpr::Eq(..)));
        assert!(!lowered_contains_sum(&lowered));
    }

    /// P3: lowering is a no-op on unions whose variants are not all
    /// integer-typed.
    #[test]
    fn non_integer_union_is_left_intact() {
        let node = DagBufferNodeId::new(0);
        let expr = BitExpr::SumIs {
            descriptor: non_integer_union(),
            variant: 1,
            value: Box::new(BitExpr::CellState(node)),
        };
        let lowered = lower_sums(&expr);
        assert_eq!(lowered, expr);
    }

    fn lowered_contains_sum(expr: &BitExpr) -> bool {
        matches!(
            expr,
            BitExpr::SumCreate { .. } | BitExpr::SumIs { .. } | BitExpr::SumGetAs { .. }
        )
    }
}
