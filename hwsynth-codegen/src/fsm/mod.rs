//! Stage C.2: matcher FSM synthesis (spec §3.5, §4.4).

pub mod guard;
pub mod state;
pub mod synth;

pub use state::{FsmMachine, FsmState, FsmStateId, StatusKind, Transition};
pub use synth::build_fsm;
