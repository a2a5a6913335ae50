//! The combinational expression tree shared by guard construction (stage
//! C.2) and bit-level lowering (stage D). Tagged-union operations
//! (`SumCreate`/`SumIs`/`SumGetAs`) and operation-value accessors are kept
//! as distinct node kinds until their respective lowering pass erases them
//! (spec §4.5) — everything below that point is `Const`/`Extract`/`Concat`/
//! `Eq`/`Add`/`Or`/`And`/`Not`, the primitives a real backend would emit as
//! gates.

use crate::buffer::DagBufferNodeId;
use crate::ir::subject::{EncodingContext, TypeId};

/// One variant of a tagged union: its declaration index is its numeric tag
/// (spec §6: "exact numeric assignment follows the variant-declaration
/// order"). `payload_width = None` means the payload is not (yet) an
/// integer type, which blocks stage D.1 from lowering the whole union
/// (spec §4.5.1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SumVariant {
    pub name: &'static str,
    pub payload_width: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SumTypeDescriptor {
    pub name: &'static str,
    pub variants: Vec<SumVariant>,
}

impl SumTypeDescriptor {
    pub fn all_integer(&self) -> bool {
        self.variants.iter().all(|v| v.payload_width.is_some())
    }

    /// `ceil(log2(variant_count))`, 0 for a single variant (nothing to tag).
    pub fn variant_width(&self) -> u32 {
        if self.variants.len() <= 1 {
            0
        } else {
            bits_to_represent(self.variants.len().saturating_sub(1) as u64)
        }
    }

    pub fn max_payload_width(&self) -> u32 {
        self.variants
            .iter()
            .filter_map(|v| v.payload_width)
            .max()
            .unwrap_or(0)
    }

    /// Total width once lowered (spec §4.5.1).
    pub fn lowered_width(&self) -> u32 {
        self.variant_width() + self.max_payload_width()
    }
}

pub fn bits_to_represent(max_value: u64) -> u32 {
    if max_value == 0 {
        1
    } else {
        64 - max_value.leading_zeros()
    }
}

/// The DAG-buffer cell's four-variant sum type (spec §3.4/§4.3), in the
/// same declaration order as [`crate::buffer::CellVariant`] so the lowered
/// numeric tag matches it exactly (spec §6).
pub fn cell_descriptor(enc: &EncodingContext) -> SumTypeDescriptor {
    SumTypeDescriptor {
        name: "cell_state",
        variants: vec![
            SumVariant { name: "unknown", payload_width: Some(0) },
            SumVariant {
                name: "located_at",
                payload_width: Some(enc.operand_offset_width),
            },
            SumVariant {
                name: "found",
                payload_width: Some(enc.operation_width()),
            },
            SumVariant { name: "never", payload_width: Some(0) },
        ],
    }
}

/// The FSM's three-variant status sum type (spec §3.5/§6).
pub fn status_descriptor() -> SumTypeDescriptor {
    SumTypeDescriptor {
        name: "status",
        variants: vec![
            SumVariant { name: "unknown", payload_width: Some(0) },
            SumVariant { name: "success", payload_width: Some(0) },
            SumVariant { name: "failure", payload_width: Some(0) },
        ],
    }
}

/// Accessors over an `Operation`-typed value (spec §4.5.2). Each lowers to
/// a disjunction of opcode-equality tests against the static catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpAccessor {
    GetOpcode,
    GetOperandOffset(u32),
    HasOperand(u32),
    OperandAmountIs(u32),
    OperandTypeIs(u32, TypeId),
    HasResult,
    ResultTypeIs(TypeId),
    IsOperation(String),
}

/// A combinational expression. Before stage D runs, `SumIs`/`SumGetAs`/
/// `SumCreate` and `OpAccessor` may appear anywhere; after stage D they are
/// gone (P3/P4), leaving only the primitive node kinds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BitExpr {
    Const(u64, u32),
    /// The raw state of a DAG-buffer cell, as a `CellVariant` sum-typed
    /// value (symbolic until stage D.1 lowers it to bits).
    CellState(DagBufferNodeId),
    /// The wire carrying the operation currently at the head of the
    /// stream, as an `Operation`-typed value (symbolic until stage D.2).
    InputOp,
    SumCreate {
        descriptor: SumTypeDescriptor,
        variant: usize,
        payload: Box<BitExpr>,
    },
    SumIs {
        descriptor: SumTypeDescriptor,
        variant: usize,
        value: Box<BitExpr>,
    },
    SumGetAs {
        descriptor: SumTypeDescriptor,
        variant: usize,
        value: Box<BitExpr>,
    },
    OpAccess(OpAccessor, Box<BitExpr>),
    Eq(Box<BitExpr>, Box<BitExpr>),
    Add(Box<BitExpr>, Box<BitExpr>),
    /// Least-significant-first concatenation: `parts[0]` occupies the low
    /// bits.
    Concat(Vec<BitExpr>),
    Extract {
        value: Box<BitExpr>,
        lo: u32,
        width: u32,
    },
    Or(Vec<BitExpr>),
    And(Vec<BitExpr>),
    Not(Box<BitExpr>),
    Sub(Box<BitExpr>, Box<BitExpr>),
    /// Combinational select, `cond ? on_true : on_false` (`dialects/comb.py`
    /// `CombMux`).
    Mux {
        cond: Box<BitExpr>,
        on_true: Box<BitExpr>,
        on_false: Box<BitExpr>,
    },
    /// A clock-enabled register with synchronous reset (`dialects/seq.py`
    /// `SeqCompregCe`): on `reset`, loads `reset_value`; otherwise, while
    /// `clock_enable` holds, latches `next`.
    Reg {
        name: String,
        clock_enable: Box<BitExpr>,
        reset: Box<BitExpr>,
        reset_value: Box<BitExpr>,
        next: Box<BitExpr>,
    },
    /// The module's `is_stream_paused` input wire.
    IsStreamPaused,
    /// The module's `new_sequence` input wire.
    NewSequence,
    /// The module's `stream_completed` input wire.
    StreamCompleted,
    /// The instantiated matcher FSM's status output (spec §6: `match_result`
    /// is wired straight through to it, unchanged).
    FsmStatus,
}

impl BitExpr {
    pub fn or(exprs: impl IntoIterator<Item = BitExpr>) -> BitExpr {
        let parts: Vec<_> = exprs.into_iter().collect();
        match parts.len() {
            0 => BitExpr::Const(0, 1),
            1 => parts.into_iter().next().unwrap(),
            _ => BitExpr::Or(parts),
        }
    }

    pub fn and(exprs: impl IntoIterator<Item = BitExpr>) -> BitExpr {
        let parts: Vec<_> = exprs.into_iter().collect();
        match parts.len() {
            0 => BitExpr::Const(1, 1),
            1 => parts.into_iter().next().unwrap(),
            _ => BitExpr::And(parts),
        }
    }

    /// Does this subtree still contain a not-yet-lowered sum or operation
    /// accessor? Used by tests asserting P3/P4 after stage D.
    pub fn contains_high_level_node(&self) -> bool {
        match self {
            BitExpr::SumCreate { .. } | BitExpr::SumIs { .. } | BitExpr::SumGetAs { .. } => true,
            BitExpr::OpAccess(..) => true,
            BitExpr::CellState(_)
            | BitExpr::InputOp
            | BitExpr::Const(..)
            | BitExpr::IsStreamPaused
            | BitExpr::NewSequence
            | BitExpr::StreamCompleted | BitExpr::FsmStatus => false,
            BitExpr::Eq(a, b) | BitExpr::Add(a, b) | BitExpr::Sub(a, b) => {
                a.contains_high_level_node() || b.contains_high_level_node()
            }
            BitExpr::Extract { value, .. } => value.contains_high_level_node(),
            BitExpr::Concat(parts) | BitExpr::Or(parts) | BitExpr::And(parts) => {
                parts.iter().any(BitExpr::contains_high_level_node)
            }
            BitExpr::Not(inner) => inner.contains_high_level_node(),
            BitExpr::Mux { cond, on_true, on_false } => {
                cond.contains_high_level_node()
                    || on_true.contains_high_level_node()
                    || on_false.contains_high_level_node()
            }
            BitExpr::Reg { clock_enable, reset, reset_value, next, .. } => {
                clock_enable.contains_high_level_node()
                    || reset.contains_high_level_node()
                    || reset_value.contains_high_level_node()
                    || next.contains_high_level_node()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_state() -> SumTypeDescriptor {
        SumTypeDescriptor {
            name: "cell_state",
            variants: vec![
                SumVariant { name: "unknown", payload_width: Some(0) },
                SumVariant { name: "located_at", payload_width: Some(8) },
                SumVariant { name: "found", payload_width: Some(20) },
                SumVariant { name: "never", payload_width: Some(0) },
            ],
        }
    }

    #[test]
    fn variant_width_covers_four_variants() {
        assert_eq!(four_state().variant_width(), 2);
    }

    #[test]
    fn lowered_width_adds_payload_and_tag() {
        assert_eq!(four_state().lowered_width(), 2 + 20);
    }

    #[test]
    fn single_variant_has_zero_tag_width() {
        let d = SumTypeDescriptor {
            name: "unit",
            variants: vec![SumVariant { name: "only", payload_width: Some(4) }],
        };
        assert_eq!(d.variant_width(), 0);
    }
}
