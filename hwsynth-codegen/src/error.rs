//! The two error kinds the whole core can raise (spec §7). Nothing else is
//! recoverable: a verifier violation on IR we produced ourselves, or a
//! numeric attribute out of range, is a programmer error and panics.

use core::fmt;

use crate::ir::pattern::PatternOpId;

/// Synthesis failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    /// The pattern uses an interpreter feature outside the supported subset:
    /// a cycle in the control-flow graph, an unindexed range extraction, a
    /// non-zero index on a range derived without an index, or an
    /// unrecognized terminator. Raised by stage A or stage B.
    UnsupportedPatternFeature(PatternOpId),
    /// A surface operation name appears in the pattern but is absent from
    /// the supplied `OperationContext`. Raised by stage D.
    OperationNotFoundInContext(String),
}

impl fmt::Display for SynthesisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthesisError::UnsupportedPatternFeature(op) => {
                write!(f, "unsupported pattern feature at {op}")
            }
            SynthesisError::OperationNotFoundInContext(name) => {
                write!(f, "operation `{name}` not found in operation context")
            }
        }
    }
}

impl std::error::Error for SynthesisError {}

pub type Result<T> = core::result::Result<T, SynthesisError>;
