//! DAG-buffer node structure (spec §3.4, §4.3).

use std::collections::BTreeMap;

use hwsynth_entity::{entity_impl, PrimaryMap, SecondaryMap};

use crate::expr::BitExpr;
use crate::span::dag::OperationSpanId;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DagBufferNodeId(u32);
entity_impl!(DagBufferNodeId, "cell");

/// The four states a cell's register can hold (spec §4.3 table). This is
/// also the variant order of the lowered tagged union (spec §6: exact
/// numeric assignment follows variant-declaration order).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CellVariant {
    Unknown,
    LocatedAt,
    Found,
    Never,
}

impl CellVariant {
    pub const ALL: [CellVariant; 4] = [
        CellVariant::Unknown,
        CellVariant::LocatedAt,
        CellVariant::Found,
        CellVariant::Never,
    ];

    pub fn tag(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            CellVariant::Unknown => "unknown",
            CellVariant::LocatedAt => "located_at",
            CellVariant::Found => "found",
            CellVariant::Never => "never",
        }
    }
}

/// One register cell of the DAG buffer: a position in the operation stream
/// that the synthesized circuit will try to resolve.
#[derive(Clone, Debug)]
pub struct DagBufferNode {
    pub span: Option<OperationSpanId>,
    /// The root cell defaults to `found(input_op)`; every other cell
    /// defaults to `unknown` (spec §4.3 "Root cell"/"Child cells").
    pub is_root: bool,
    /// Child cells, keyed by the operand index whose defining operation
    /// they watch. Only operands whose `defining_op` span is itself used
    /// get an entry (spec §3.4 invariant).
    pub operand_children: BTreeMap<u32, DagBufferNodeId>,
    /// This cell's backing synchronous register (spec §3.4/§4.3): a
    /// [`BitExpr::Reg`] whose `next` expression is the five-way priority
    /// mux (parent write / become-found / freeze / stream-end / decrement)
    /// of the "Per-cycle transitions" table.
    pub register: BitExpr,
}

/// The synthesized DAG buffer: one node per used `OperationSpan`,
/// isomorphic to the used subset of the Span DAG (spec §3.4 invariant).
#[derive(Clone, Debug, Default)]
pub struct DagBufferCtx {
    pub nodes: PrimaryMap<DagBufferNodeId, DagBufferNode>,
    pub span_to_node: SecondaryMap<OperationSpanId, Option<DagBufferNodeId>>,
    pub root: Option<DagBufferNodeId>,
}

impl DagBufferCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> DagBufferNodeId {
        self.root.expect("dag buffer root not set")
    }

    pub fn node_for(&self, span: OperationSpanId) -> Option<DagBufferNodeId> {
        *self.span_to_node.get(span)
    }
}
