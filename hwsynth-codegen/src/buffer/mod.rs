//! Stage C.1: DAG-buffer (filler) synthesis (spec §4.3) — one register cell
//! per used `OperationSpan`, wired so a parent's "found" event forwards
//! operand locations to its children.

pub mod node;
pub mod synth;

pub use node::{CellVariant, DagBufferCtx, DagBufferNode, DagBufferNodeId};
pub use synth::build_dag_buffer;
