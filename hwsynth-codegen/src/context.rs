//! The single public entry point (spec §6): runs stages A→B→C→D in order
//! and hands back the two top-level IR units.

use log::info;

use crate::buffer::{build_dag_buffer, DagBufferCtx};
use crate::error::Result;
use crate::expr::BitExpr;
use crate::fsm::{build_fsm, FsmMachine};
use crate::hw::{FsmInstance, HwModule, PortList};
use crate::ir::pattern::Region;
use crate::ir::subject::{EncodingContext, OperationContext};
use crate::lower::lower_expr;
use crate::normalize::switchify;
use crate::span::compute_span_dag;

/// Synthesize a hardware pattern-matching unit from an interpreter-form
/// pattern region (spec §6: `generate_matcher_unit`).
pub fn generate_matcher_unit(
    region: &Region,
    enc_ctx: &EncodingContext,
    op_ctx: &OperationContext,
    name: &str,
) -> Result<(HwModule, FsmMachine)> {
    let mut region = region.clone();
    switchify(&mut region);

    let (_root_span, tree, ctx) = compute_span_dag(&region)?;
    let dag_buffer = build_dag_buffer(&tree, enc_ctx);
    let fsm = build_fsm(&region, &tree, &ctx, &dag_buffer, enc_ctx, name)?;
    let fsm = lower_fsm(fsm, op_ctx, enc_ctx)?;
    let dag_buffer = lower_dag_buffer(dag_buffer, op_ctx, enc_ctx)?;

    info!(
        "generated matcher unit `{name}`: {} DAG-buffer cell(s), {} FSM state(s)",
        dag_buffer.nodes.len(),
        fsm.states.len()
    );

    let fsm_instance = FsmInstance {
        inst_name: format!("{}_inst", fsm.sym_name),
        fsm_sym_name: fsm.sym_name.clone(),
        cell_inputs: dag_buffer.nodes.keys().collect(),
    };
    // `insert_module_output`: a registered copy of `input_op`, enabled
    // whenever the stream is running; `reset` is hardcoded false, so
    // `reset_value` is never actually observed.
    let output_register = lower_expr(
        &BitExpr::Reg {
            name: format!("output_{name}"),
            clock_enable: Box::new(BitExpr::Not(Box::new(BitExpr::IsStreamPaused))),
            reset: Box::new(BitExpr::Const(0, 1)),
            reset_value: Box::new(BitExpr::InputOp),
            next: Box::new(BitExpr::InputOp),
        },
        op_ctx,
        enc_ctx,
    )?;

    let module = HwModule {
        sym_name: name.to_owned(),
        ports: PortList::new(enc_ctx),
        dag_buffer,
        fsm: fsm.clone(),
        fsm_instance,
        output_register,
        match_result: BitExpr::FsmStatus,
    };
    Ok((module, fsm))
}

fn lower_fsm(mut fsm: FsmMachine, op_ctx: &OperationContext, enc: &EncodingContext) -> Result<FsmMachine> {
    for state in fsm.states.values_mut() {
        for transition in state.transitions.iter_mut() {
            transition.guard = lower_expr(&transition.guard, op_ctx, enc)?;
        }
    }
    Ok(fsm)
}

fn lower_dag_buffer(
    mut dag_buffer: DagBufferCtx,
    op_ctx: &OperationContext,
    enc: &EncodingContext,
) -> Result<DagBufferCtx> {
    for node in dag_buffer.nodes.values_mut() {
        node.register = lower_expr(&node.register, op_ctx, enc)?;
    }
    Ok(dag_buffer)
}
