//! Opaque index types and arena-backed maps.
//!
//! Every analysis in `hwsynth-codegen` is built on arenas keyed by a small
//! `Copy` index type rather than on `Rc`/`RefCell` graphs: `OperationSpan`s,
//! `DagBufferNode`s and FSM states are all allocated in a `PrimaryMap` and
//! referred to by their `EntityRef` key. This avoids reference cycles
//! entirely (the span tree, the DAG buffer and the FSM are all structurally
//! trees or DAGs over these integer keys) and keeps the structures `Copy`
//! where useful.

mod keys;
mod map;
mod packed_option;
mod secondary;

pub use keys::EntityRef;
pub use map::PrimaryMap;
pub use packed_option::{PackedOption, ReservedValue};
pub use secondary::SecondaryMap;
