//! The pattern IR (interpreter form, spec §3.2): a flat control-flow graph
//! of blocks, each ending in a conditional terminator, whose bodies are
//! value-producing operations over an operation/value/type use-DAG rooted
//! at the matched operation.
//!
//! This is deliberately not a general region/op/attribute framework (spec
//! §1 places that out of scope as an external collaborator) — just the
//! closed set of node kinds stages A–D actually dispatch on, tagged by a
//! stable integer (`PatternBlock`/`PatternValue`/`PatternOpId`), per the
//! "dynamic dispatch on IR operation kinds" design note (spec §9).

use hwsynth_entity::{entity_impl, PrimaryMap};
use rustc_hash::FxHashMap;

use crate::ir::subject::TypeId;

/// A block in the interpreter control-flow graph.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternBlock(u32);
entity_impl!(PatternBlock, "block");

/// An SSA value inside the interpreter region: either a block argument (the
/// root matched operation is block 0's first argument) or the result of a
/// [`ValueDef`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternValue(u32);
entity_impl!(PatternValue, "val");

/// Identifies one value-producing operation or terminator, attached to
/// [`SynthesisError::UnsupportedPatternFeature`](crate::error::SynthesisError)
/// so the caller can point at the offending IR.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternOpId(u32);
entity_impl!(PatternOpId, "op");

/// The kind of subject-IR data a [`PatternValue`] denotes. Stage B classifies
/// every value it walks into exactly one of these (invariant I3).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Operation,
    Operand,
    OperandType,
    Result,
    ResultType,
    OperandRange,
    OperandTypeRange,
    ResultRange,
    ResultTypeRange,
}

/// A value-producing operation inside a block (spec §3.2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueDef {
    /// `get_operand(op, index) -> value`.
    GetOperand { op: PatternValue, index: u32 },
    /// `get_result(op, index) -> value`.
    GetResult { op: PatternValue, index: u32 },
    /// `get_operands(op, index?) -> value | range`. `index = None` yields
    /// the full operand range; `Some(i)` yields operand `i`'s value
    /// directly (used when the pattern indexes into a single-value
    /// result rather than a range).
    GetOperands {
        op: PatternValue,
        index: Option<u32>,
    },
    /// `get_results(op, index?) -> value | range`.
    GetResults {
        op: PatternValue,
        index: Option<u32>,
    },
    /// `get_defining_op(value) -> op`.
    GetDefiningOp { value: PatternValue },
    /// `get_value_type(value) -> type`.
    GetValueType { value: PatternValue },
    /// `extract(range, index) -> value`. Only `index == 0` on a range
    /// derived without an index is supported (spec §3.2 invariant iv).
    Extract { range: PatternValue, index: u32 },
}

/// One statement in a block: a produced value and the op that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternOp {
    pub id: PatternOpId,
    pub result: PatternValue,
    pub def: ValueDef,
}

/// A conditional terminator (spec §3.2/§4.1). Stage A normalizes
/// `Check*` variants (other than operand/result count) into the
/// corresponding single-case `Switch*`; everything downstream only
/// dispatches on `Switch*`, `CheckOperandCount`, `CheckResultCount`,
/// `AreEqual`, `RecordMatch`, `Branch` and `Finalize`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Terminator {
    IsNotNull {
        id: PatternOpId,
        value: PatternValue,
        true_dest: PatternBlock,
        false_dest: PatternBlock,
    },
    CheckOperationName {
        id: PatternOpId,
        value: PatternValue,
        name: String,
        true_dest: PatternBlock,
        false_dest: PatternBlock,
    },
    CheckType {
        id: PatternOpId,
        value: PatternValue,
        ty: TypeId,
        true_dest: PatternBlock,
        false_dest: PatternBlock,
    },
    CheckTypes {
        id: PatternOpId,
        value: PatternValue,
        tys: Vec<TypeId>,
        true_dest: PatternBlock,
        false_dest: PatternBlock,
    },
    CheckAttribute {
        id: PatternOpId,
        value: PatternValue,
        true_dest: PatternBlock,
        false_dest: PatternBlock,
    },
    SwitchOperationName {
        id: PatternOpId,
        value: PatternValue,
        cases: Vec<(String, PatternBlock)>,
        default_dest: PatternBlock,
    },
    SwitchType {
        id: PatternOpId,
        value: PatternValue,
        cases: Vec<(TypeId, PatternBlock)>,
        default_dest: PatternBlock,
    },
    SwitchTypes {
        id: PatternOpId,
        value: PatternValue,
        cases: Vec<(Vec<TypeId>, PatternBlock)>,
        default_dest: PatternBlock,
    },
    SwitchAttribute {
        id: PatternOpId,
        value: PatternValue,
        default_dest: PatternBlock,
    },
    SwitchOperandCount {
        id: PatternOpId,
        value: PatternValue,
        cases: Vec<(u32, PatternBlock)>,
        default_dest: PatternBlock,
    },
    SwitchResultCount {
        id: PatternOpId,
        value: PatternValue,
        cases: Vec<(u32, PatternBlock)>,
        default_dest: PatternBlock,
    },
    /// `check_operand_count(value, count, compare_at_least) -> (true, false)`.
    /// Kept distinct from `SwitchOperandCount` because its comparator is
    /// richer than equality (spec §4.1, §4.4).
    CheckOperandCount {
        id: PatternOpId,
        value: PatternValue,
        count: u32,
        compare_at_least: bool,
        true_dest: PatternBlock,
        false_dest: PatternBlock,
    },
    CheckResultCount {
        id: PatternOpId,
        value: PatternValue,
        count: u32,
        compare_at_least: bool,
        true_dest: PatternBlock,
        false_dest: PatternBlock,
    },
    AreEqual {
        id: PatternOpId,
        lhs: PatternValue,
        rhs: PatternValue,
        true_dest: PatternBlock,
        false_dest: PatternBlock,
    },
    RecordMatch {
        id: PatternOpId,
    },
    Branch {
        dest: PatternBlock,
    },
    Finalize {
        id: PatternOpId,
    },
}

impl Terminator {
    /// The successor blocks this terminator can transfer control to, in
    /// declaration order. Used by cycle detection and by stage C, which
    /// needs a stable order to emit guarded transitions in (spec §4.4:
    /// "guards are evaluated in declaration order").
    pub fn successors(&self) -> Vec<PatternBlock> {
        use Terminator::*;
        match self {
            IsNotNull {
                true_dest,
                false_dest,
                ..
            }
            | CheckOperationName {
                true_dest,
                false_dest,
                ..
            }
            | CheckType {
                true_dest,
                false_dest,
                ..
            }
            | CheckTypes {
                true_dest,
                false_dest,
                ..
            }
            | CheckAttribute {
                true_dest,
                false_dest,
                ..
            }
            | CheckOperandCount {
                true_dest,
                false_dest,
                ..
            }
            | CheckResultCount {
                true_dest,
                false_dest,
                ..
            }
            | AreEqual {
                true_dest,
                false_dest,
                ..
            } => vec![*true_dest, *false_dest],
            SwitchOperationName {
                cases,
                default_dest,
                ..
            } => cases
                .iter()
                .map(|(_, b)| *b)
                .chain(core::iter::once(*default_dest))
                .collect(),
            SwitchType {
                cases,
                default_dest,
                ..
            } => cases
                .iter()
                .map(|(_, b)| *b)
                .chain(core::iter::once(*default_dest))
                .collect(),
            SwitchTypes {
                cases,
                default_dest,
                ..
            } => cases
                .iter()
                .map(|(_, b)| *b)
                .chain(core::iter::once(*default_dest))
                .collect(),
            SwitchAttribute { default_dest, .. } => vec![*default_dest],
            SwitchOperandCount {
                cases,
                default_dest,
                ..
            } => cases
                .iter()
                .map(|(_, b)| *b)
                .chain(core::iter::once(*default_dest))
                .collect(),
            SwitchResultCount {
                cases,
                default_dest,
                ..
            } => cases
                .iter()
                .map(|(_, b)| *b)
                .chain(core::iter::once(*default_dest))
                .collect(),
            RecordMatch { .. } | Finalize { .. } => vec![],
            Branch { dest } => vec![*dest],
        }
    }

    pub fn id(&self) -> PatternOpId {
        use Terminator::*;
        match self {
            IsNotNull { id, .. }
            | CheckOperationName { id, .. }
            | CheckType { id, .. }
            | CheckTypes { id, .. }
            | CheckAttribute { id, .. }
            | SwitchOperationName { id, .. }
            | SwitchType { id, .. }
            | SwitchTypes { id, .. }
            | SwitchAttribute { id, .. }
            | SwitchOperandCount { id, .. }
            | SwitchResultCount { id, .. }
            | CheckOperandCount { id, .. }
            | CheckResultCount { id, .. }
            | AreEqual { id, .. }
            | RecordMatch { id, .. }
            | Finalize { id, .. } => *id,
            Branch { .. } => PatternOpId::new_synthetic(),
        }
    }
}

impl PatternOpId {
    /// `Branch` has no id of its own in the source interpreter (it is never
    /// a user-visible op, only introduced as control-flow glue); this
    /// stands in when one is needed for error reporting.
    fn new_synthetic() -> Self {
        PatternOpId(u32::MAX)
    }

    /// A stand-in id for errors (e.g. a detected CFG cycle) that aren't
    /// anchored to one specific operation.
    pub fn placeholder() -> Self {
        Self::new_synthetic()
    }
}

/// One block of the interpreter region: its argument (only block 0 has
/// one — the root matched operation), its straight-line body, and its
/// terminator.
#[derive(Clone, Debug, Default)]
pub struct BlockData {
    pub argument: Option<PatternValue>,
    pub ops: Vec<PatternOp>,
    pub terminator: Option<Terminator>,
}

/// The interpreter region: a flat, already-topologically-ordered list of
/// blocks (spec §3.2 invariant ii), entry block first.
#[derive(Clone, Debug, Default)]
pub struct Region {
    blocks: PrimaryMap<PatternBlock, BlockData>,
    next_value: u32,
    next_op: u32,
}

impl Region {
    pub fn new() -> Self {
        let mut region = Self::default();
        region.push_block();
        region
    }

    pub fn entry(&self) -> PatternBlock {
        PatternBlock::new_at(0)
    }

    pub fn push_block(&mut self) -> PatternBlock {
        self.blocks.push(BlockData::default())
    }

    pub fn block(&self, block: PatternBlock) -> &BlockData {
        &self.blocks[block]
    }

    pub fn block_mut(&mut self, block: PatternBlock) -> &mut BlockData {
        &mut self.blocks[block]
    }

    pub fn blocks(&self) -> impl Iterator<Item = PatternBlock> + '_ {
        self.blocks.keys()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn new_value(&mut self) -> PatternValue {
        let v = PatternValue::new_at(self.next_value);
        self.next_value += 1;
        v
    }

    pub fn new_op_id(&mut self) -> PatternOpId {
        let id = PatternOpId::new_at(self.next_op);
        self.next_op += 1;
        id
    }

    /// Set block 0's single argument (the root matched operation) and
    /// return the value allocated for it.
    pub fn set_root_argument(&mut self) -> PatternValue {
        let entry = self.entry();
        let value = self.new_value();
        self.block_mut(entry).argument = Some(value);
        value
    }

    pub fn push_op(&mut self, block: PatternBlock, def: ValueDef) -> PatternValue {
        let id = self.new_op_id();
        let result = self.new_value();
        self.block_mut(block).ops.push(PatternOp { id, result, def });
        result
    }

    /// The defining [`ValueDef`] of `value`, if it was produced by one
    /// (`None` for block arguments).
    pub fn def_of(&self, value: PatternValue) -> Option<&PatternOp> {
        self.blocks
            .values()
            .flat_map(|b| b.ops.iter())
            .find(|op| op.result == value)
    }

    /// DFS over block successors, detecting back-edges (spec §4.2 step 1 /
    /// §3.2 invariant i). An empty region has no cycles.
    pub fn has_cycles(&self) -> bool {
        if self.blocks.is_empty() {
            return false;
        }
        #[derive(Copy, Clone, PartialEq, Eq)]
        enum Mark {
            OnStack,
            Done,
        }
        let mut marks: FxHashMap<PatternBlock, Mark> = FxHashMap::default();

        fn walk(
            region: &Region,
            block: PatternBlock,
            marks: &mut FxHashMap<PatternBlock, Mark>,
        ) -> bool {
            match marks.get(&block) {
                Some(Mark::OnStack) => return true,
                Some(Mark::Done) => return false,
                None => {}
            }
            marks.insert(block, Mark::OnStack);
            let has_cycle = match &region.block(block).terminator {
                Some(term) => term
                    .successors()
                    .into_iter()
                    .any(|succ| walk(region, succ, marks)),
                None => false,
            };
            marks.insert(block, Mark::Done);
            has_cycle
        }

        walk(self, self.entry(), &mut marks)
    }

    /// Every use of `value`: terminators and value-defs elsewhere in the
    /// region that take it as an operand. Walked in block-then-op order so
    /// traversal is deterministic (the interpreter CFG is a DAG of uses,
    /// not a def-use linked list — spec §9 design note).
    pub fn uses_of(&self, value: PatternValue) -> Vec<Use> {
        let mut uses = Vec::new();
        for block in self.blocks() {
            let data = self.block(block);
            for op in &data.ops {
                if value_def_uses(&op.def, value) {
                    uses.push(Use::Value(op.clone()));
                }
            }
            if let Some(term) = &data.terminator {
                if terminator_uses(term, value) {
                    uses.push(Use::Terminator(term.clone()));
                }
            }
        }
        uses
    }
}

trait NewAt: Sized {
    fn new_at(index: u32) -> Self;
}
impl NewAt for PatternBlock {
    fn new_at(index: u32) -> Self {
        PatternBlock(index)
    }
}
impl NewAt for PatternValue {
    fn new_at(index: u32) -> Self {
        PatternValue(index)
    }
}
impl NewAt for PatternOpId {
    fn new_at(index: u32) -> Self {
        PatternOpId(index)
    }
}

fn value_def_uses(def: &ValueDef, value: PatternValue) -> bool {
    match def {
        ValueDef::GetOperand { op, .. } | ValueDef::GetResult { op, .. } => *op == value,
        ValueDef::GetOperands { op, .. } | ValueDef::GetResults { op, .. } => *op == value,
        ValueDef::GetDefiningOp { value: v } | ValueDef::GetValueType { value: v } => *v == value,
        ValueDef::Extract { range, .. } => *range == value,
    }
}

fn terminator_uses(term: &Terminator, value: PatternValue) -> bool {
    use Terminator::*;
    match term {
        IsNotNull { value: v, .. }
        | CheckOperationName { value: v, .. }
        | CheckType { value: v, .. }
        | CheckTypes { value: v, .. }
        | CheckAttribute { value: v, .. }
        | SwitchOperationName { value: v, .. }
        | SwitchType { value: v, .. }
        | SwitchTypes { value: v, .. }
        | SwitchAttribute { value: v, .. }
        | SwitchOperandCount { value: v, .. }
        | SwitchResultCount { value: v, .. }
        | CheckOperandCount { value: v, .. }
        | CheckResultCount { value: v, .. } => *v == value,
        AreEqual { lhs, rhs, .. } => *lhs == value || *rhs == value,
        RecordMatch { .. } | Branch { .. } | Finalize { .. } => false,
    }
}

/// One use of a [`PatternValue`]: either by another value-def (identified
/// by the defining op's id and the value it produces) or by a terminator.
#[derive(Clone, Debug)]
pub enum Use {
    Value(PatternOp),
    Terminator(Terminator),
}
