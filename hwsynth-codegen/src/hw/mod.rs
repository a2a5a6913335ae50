//! Output types (spec §6): the generated `HwModule` and its `FsmMachine`.

use crate::buffer::{DagBufferCtx, DagBufferNodeId};
use crate::expr::{status_descriptor, BitExpr};
use crate::fsm::FsmMachine;
use crate::ir::subject::EncodingContext;

/// The module's port list, in the exact order spec §6 mandates: 5 inputs
/// (`clock`, `input_op`, `is_stream_paused`, `new_sequence`,
/// `stream_completed`), 2 outputs (`output_op`, `match_result`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PortList {
    pub clock: u32,
    pub input_op: u32,
    pub is_stream_paused: u32,
    pub new_sequence: u32,
    pub stream_completed: u32,
    pub output_op: u32,
    pub match_result: u32,
}

impl PortList {
    pub fn new(enc: &EncodingContext) -> Self {
        let op_width = enc.operation_width();
        Self {
            clock: 1,
            input_op: op_width,
            is_stream_paused: 1,
            new_sequence: 1,
            stream_completed: 1,
            output_op: op_width,
            match_result: status_descriptor().lowered_width(),
        }
    }

    pub fn inputs(&self) -> Vec<(&'static str, u32)> {
        vec![
            ("clock", self.clock),
            ("input_op", self.input_op),
            ("is_stream_paused", self.is_stream_paused),
            ("new_sequence", self.new_sequence),
            ("stream_completed", self.stream_completed),
        ]
    }

    pub fn outputs(&self) -> Vec<(&'static str, u32)> {
        vec![("output_op", self.output_op), ("match_result", self.match_result)]
    }
}

/// The instantiation of the synthesized FSM inside the module body (spec
/// §6), mirroring `FsmHwInstance.new` in `pdli_to_matcher_unit.py`: every
/// DAG-buffer cell's state feeds the instance as one input, in node order.
#[derive(Clone, Debug)]
pub struct FsmInstance {
    pub inst_name: String,
    pub fsm_sym_name: String,
    pub cell_inputs: Vec<DagBufferNodeId>,
}

/// The synthesized hardware unit: a DAG buffer, an FSM instance wired to
/// its states, and the module's stream interface (spec §6).
#[derive(Clone, Debug)]
pub struct HwModule {
    pub sym_name: String,
    pub ports: PortList,
    pub dag_buffer: DagBufferCtx,
    pub fsm: FsmMachine,
    pub fsm_instance: FsmInstance,
    /// Drives `output_op`: a registered copy of `input_op`, enabled
    /// whenever the stream is not paused (`insert_module_output`'s
    /// `output_register`). Unlike the DAG-buffer cells' registers, this
    /// one never resets — its `reset` input is hardcoded constant 0.
    pub output_register: BitExpr,
    /// Drives `match_result`: the instantiated FSM's status output,
    /// unchanged (`insert_module_output`'s `fsm_output` yield).
    pub match_result: BitExpr,
}
