//! Stage B: the Span DAG (spec §3.3, §4.2) — the shape the hardware must
//! buffer, computed once per pattern and consumed read-only afterward.

pub mod build;
pub mod dag;

pub use build::compute_span_dag;
pub use dag::{OperandSpan, OperationSpan, ResultSpan, SpanCtx, SpanTree};
