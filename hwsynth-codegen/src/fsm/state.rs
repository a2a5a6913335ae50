//! FSM output/data types (spec §3.5, §6).

use hwsynth_entity::{entity_impl, PrimaryMap};

use crate::expr::BitExpr;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FsmStateId(u32);
entity_impl!(FsmStateId, "state");

/// A state's combinational output (spec §3.5: "never regresses once
/// `success` or `failure`").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StatusKind {
    Unknown,
    Success,
    Failure,
}

impl StatusKind {
    pub fn is_terminal(self) -> bool {
        !matches!(self, StatusKind::Unknown)
    }
}

/// One guarded transition, evaluated in declaration order (spec §4.4
/// "Guard compilation"): the first whose guard is `1` is taken.
#[derive(Clone, Debug)]
pub struct Transition {
    pub guard: BitExpr,
    pub dest: FsmStateId,
}

#[derive(Clone, Debug)]
pub struct FsmState {
    pub name: String,
    pub output: StatusKind,
    pub transitions: Vec<Transition>,
}

/// One synthesized matcher FSM: one state per interpreter block plus the
/// sink `STATE_FAILURE` (spec §4.4).
#[derive(Clone, Debug)]
pub struct FsmMachine {
    pub sym_name: String,
    pub states: PrimaryMap<FsmStateId, FsmState>,
    pub entry: FsmStateId,
    pub failure: FsmStateId,
}

impl FsmMachine {
    pub fn state(&self, id: FsmStateId) -> &FsmState {
        &self.states[id]
    }
}
