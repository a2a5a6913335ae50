//! Synthesizes hardware pattern-matching units from pdl_interp-style
//! declarative rewrite patterns (see `SPEC_FULL.md` at the workspace root).
//!
//! The pipeline runs in four stages: normalize the interpreter-form pattern
//! into single-case switches (stage A, [`normalize`]), derive the Span DAG
//! it touches (stage B, [`span`]), synthesize the DAG buffer and matcher FSM
//! (stage C, [`buffer`] and [`fsm`]), then lower every tagged-union and
//! operation-value expression to bit primitives (stage D, [`lower`]).
//! [`context::generate_matcher_unit`] is the single entry point tying all
//! four stages together.

pub mod buffer;
pub mod context;
pub mod error;
pub mod expr;
pub mod fsm;
pub mod hw;
pub mod ir;
pub mod lower;
pub mod normalize;
pub mod span;

pub use context::generate_matcher_unit;
pub use error::{Result, SynthesisError};
pub use hw::{HwModule, PortList};
