//! The Span DAG data types (spec §3.3): `OperationSpan`, `OperandSpan` and
//! `ResultSpan`, arena-allocated and referenced by entity key so the tree
//! has no back-pointers to manage (spec §9 design note on cyclic graphs).

use std::collections::BTreeMap;

use hwsynth_entity::{entity_impl, PrimaryMap};
use rustc_hash::FxHashMap;

use crate::ir::pattern::PatternValue;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationSpanId(u32);
entity_impl!(OperationSpanId, "opspan");

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperandSpanId(u32);
entity_impl!(OperandSpanId, "andspan");

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultSpanId(u32);
entity_impl!(ResultSpanId, "resspan");

/// A position where some operation will be observed.
#[derive(Clone, Debug, Default)]
pub struct OperationSpan {
    pub used: bool,
    pub pdl_values: Vec<PatternValue>,
    pub operand_ranges: Vec<PatternValue>,
    pub operand_type_ranges: Vec<PatternValue>,
    pub result_ranges: Vec<PatternValue>,
    pub result_type_ranges: Vec<PatternValue>,
    pub operands: BTreeMap<u32, OperandSpanId>,
    pub results: BTreeMap<u32, ResultSpanId>,
}

/// One operand of a parent [`OperationSpan`], indexed.
#[derive(Clone, Debug)]
pub struct OperandSpan {
    pub operand_of: OperationSpanId,
    pub operand_index: u32,
    pub pdl_values: Vec<PatternValue>,
    pub pdl_types: Vec<PatternValue>,
    /// The operation defining this operand. Always allocated (mirroring
    /// the source's eager `OperandSpan.__init__`), but may end up unused
    /// if nothing ever inspects it.
    pub defining_op: OperationSpanId,
}

/// One result of a parent [`OperationSpan`], indexed.
#[derive(Clone, Debug)]
pub struct ResultSpan {
    pub result_of: OperationSpanId,
    pub result_index: u32,
    pub pdl_values: Vec<PatternValue>,
    pub pdl_types: Vec<PatternValue>,
}

/// What kind of subject-IR data a [`PatternValue`] denotes in the span
/// tree — the entry stored for it in [`SpanCtx`]. Spec invariant I3: every
/// classified value has exactly one such entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SpanRef {
    Operation(OperationSpanId),
    Operand(OperandSpanId),
    OperandType(OperandSpanId),
    Result(ResultSpanId),
    ResultType(ResultSpanId),
    OperandRange(OperationSpanId),
    OperandTypeRange(OperationSpanId),
    ResultRange(OperationSpanId),
    ResultTypeRange(OperationSpanId),
}

/// The arena holding every span allocated while walking one pattern.
#[derive(Clone, Debug, Default)]
pub struct SpanTree {
    pub operations: PrimaryMap<OperationSpanId, OperationSpan>,
    pub operands: PrimaryMap<OperandSpanId, OperandSpan>,
    pub results: PrimaryMap<ResultSpanId, ResultSpan>,
    pub root: Option<OperationSpanId>,
}

impl SpanTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> OperationSpanId {
        self.root.expect("span tree root not set")
    }

    pub fn alloc_operation(&mut self) -> OperationSpanId {
        self.operations.push(OperationSpan::default())
    }

    /// Allocate (or fetch) the `OperandSpan` at `index` under `parent`,
    /// creating its (initially unused) `defining_op` child eagerly.
    pub fn operand_of(&mut self, parent: OperationSpanId, index: u32) -> OperandSpanId {
        if let Some(&id) = self.operations[parent].operands.get(&index) {
            return id;
        }
        let defining_op = self.alloc_operation();
        let id = self.operands.push(OperandSpan {
            operand_of: parent,
            operand_index: index,
            pdl_values: Vec::new(),
            pdl_types: Vec::new(),
            defining_op,
        });
        self.operations[parent].operands.insert(index, id);
        id
    }

    pub fn result_of(&mut self, parent: OperationSpanId, index: u32) -> ResultSpanId {
        if let Some(&id) = self.operations[parent].results.get(&index) {
            return id;
        }
        let id = self.results.push(ResultSpan {
            result_of: parent,
            result_index: index,
            pdl_values: Vec::new(),
            pdl_types: Vec::new(),
        });
        self.operations[parent].results.insert(index, id);
        id
    }

    /// Mark `span` used, and propagate `used = true` to every ancestor
    /// (spec §3.3, §4.2 step 3 / invariant I2).
    pub fn mark_used(&mut self, span: OperationSpanId) {
        let mut current = span;
        loop {
            if self.operations[current].used {
                return;
            }
            self.operations[current].used = true;
            // Find the parent, if any: the OperandSpan or ResultSpan that
            // owns `current`. The root has none.
            match self.parent_of(current) {
                Some(parent) => current = parent,
                None => return,
            }
        }
    }

    fn parent_of(&self, span: OperationSpanId) -> Option<OperationSpanId> {
        if Some(span) == self.root {
            return None;
        }
        self.operands
            .iter()
            .find(|(_, o)| o.defining_op == span)
            .map(|(_, o)| o.operand_of)
    }
}

/// Maps every pattern-IR value stage B classifies to the span (or range
/// view) it denotes (spec §4.2: "the `ctx` side-table").
#[derive(Clone, Debug, Default)]
pub struct SpanCtx {
    refs: FxHashMap<PatternValue, SpanRef>,
}

impl SpanCtx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `value` denotes `span`. Panics on a second, conflicting
    /// classification of the same value: invariant I3 requires exactly one.
    pub fn bind(&mut self, value: PatternValue, span: SpanRef) {
        if let Some(existing) = self.refs.get(&value) {
            assert_eq!(
                *existing, span,
                "pattern value {value} classified twice with different spans"
            );
            return;
        }
        self.refs.insert(value, span);
    }

    pub fn get(&self, value: PatternValue) -> Option<SpanRef> {
        self.refs.get(&value).copied()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}
