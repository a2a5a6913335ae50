//! Stage C.2: FSM synthesis (spec §4.4) — one state per interpreter block
//! plus the sink `STATE_FAILURE`, translated per the per-block table.

use hwsynth_entity::{PrimaryMap, SecondaryMap};
use log::debug;

use crate::buffer::DagBufferCtx;
use crate::error::{Result, SynthesisError};
use crate::ir::pattern::{PatternBlock, Region, Terminator};
use crate::ir::subject::EncodingContext;
use crate::span::dag::{SpanCtx, SpanTree};

use super::guard::{
    are_equal_guards, check_operand_count_guards, check_result_count_guards, is_not_null_guards,
    switch_case_guard, switch_default_guard, switch_type_case_guard, switch_type_default_guard,
};
use super::state::{FsmMachine, FsmState, FsmStateId, StatusKind, Transition};
use crate::expr::OpAccessor;

pub fn build_fsm(
    region: &Region,
    tree: &SpanTree,
    ctx: &SpanCtx,
    dag: &DagBufferCtx,
    enc: &EncodingContext,
    name: &str,
) -> Result<FsmMachine> {
    let mut states: PrimaryMap<FsmStateId, FsmState> = PrimaryMap::new();
    let mut block_to_state: SecondaryMap<PatternBlock, Option<FsmStateId>> = SecondaryMap::new();

    for block in region.blocks() {
        let id = states.push(FsmState {
            name: format!("{name}_fsm_{block}"),
            output: StatusKind::Unknown,
            transitions: Vec::new(),
        });
        block_to_state.set(block, Some(id));
    }
    let failure = states.push(FsmState {
        name: format!("{name}_fsm_STATEFAILURE"),
        output: StatusKind::Failure,
        transitions: Vec::new(),
    });

    let dest_of = |block: PatternBlock| -> FsmStateId {
        block_to_state.get(block).expect("every block has an FSM state")
    };

    for block in region.blocks() {
        let state_id = dest_of(block);
        let term = region
            .block(block)
            .terminator
            .as_ref()
            .expect("every block must have a terminator (spec §3.2)");
        let (output, transitions) = translate(term, tree, ctx, dag, enc, &dest_of)?;
        states[state_id].output = output;
        states[state_id].transitions = transitions;
    }

    debug!(
        "stage C.2: FSM `{name}_fsm` has {} state(s) (including STATE_FAILURE)",
        states.len()
    );

    Ok(FsmMachine {
        sym_name: format!("{name}_fsm"),
        entry: dest_of(region.entry()),
        states,
        failure,
    })
}

fn translate(
    term: &Terminator,
    tree: &SpanTree,
    ctx: &SpanCtx,
    dag: &DagBufferCtx,
    enc: &EncodingContext,
    dest_of: &impl Fn(PatternBlock) -> FsmStateId,
) -> Result<(StatusKind, Vec<Transition>)> {
    use Terminator::*;
    match term {
        Finalize { .. } => Ok((StatusKind::Failure, Vec::new())),
        RecordMatch { .. } => Ok((StatusKind::Success, Vec::new())),
        IsNotNull { id, value, true_dest, false_dest } => {
            let (t, f) = is_not_null_guards(enc, tree, ctx, dag, *value, *id)?;
            Ok((
                StatusKind::Unknown,
                vec![
                    Transition { guard: t, dest: dest_of(*true_dest) },
                    Transition { guard: f, dest: dest_of(*false_dest) },
                ],
            ))
        }
        SwitchOperationName { id, value, cases, default_dest } => {
            let mut transitions = Vec::with_capacity(cases.len() + 1);
            for (opname, dest) in cases {
                let opname = opname.clone();
                let guard = switch_case_guard(enc, tree, ctx, dag, *value, *id, |found| {
                    crate::expr::BitExpr::OpAccess(OpAccessor::IsOperation(opname), Box::new(found))
                })?;
                transitions.push(Transition { guard, dest: dest_of(*dest) });
            }
            let default_guard = switch_default_guard(enc, tree, ctx, dag, *value, *id)?;
            transitions.push(Transition { guard: default_guard, dest: dest_of(*default_dest) });
            Ok((StatusKind::Unknown, transitions))
        }
        SwitchOperandCount { id, value, cases, default_dest } => {
            let mut transitions = Vec::with_capacity(cases.len() + 1);
            for (count, dest) in cases {
                let (t, _) = check_operand_count_guards(enc, tree, ctx, dag, *value, *id, *count, false)?;
                transitions.push(Transition { guard: t, dest: dest_of(*dest) });
            }
            let default_guard = switch_default_guard(enc, tree, ctx, dag, *value, *id)?;
            transitions.push(Transition { guard: default_guard, dest: dest_of(*default_dest) });
            Ok((StatusKind::Unknown, transitions))
        }
        SwitchResultCount { id, value, cases, default_dest } => {
            let mut transitions = Vec::with_capacity(cases.len() + 1);
            for (count, dest) in cases {
                let (t, _) = check_result_count_guards(enc, tree, ctx, dag, *value, *id, *count, false)?;
                transitions.push(Transition { guard: t, dest: dest_of(*dest) });
            }
            let default_guard = switch_default_guard(enc, tree, ctx, dag, *value, *id)?;
            transitions.push(Transition { guard: default_guard, dest: dest_of(*default_dest) });
            Ok((StatusKind::Unknown, transitions))
        }
        SwitchType { id, value, cases, default_dest } => {
            let mut transitions = Vec::with_capacity(cases.len() + 1);
            for (ty, dest) in cases {
                let guard = switch_type_case_guard(enc, tree, ctx, dag, *value, *id, &[*ty])?;
                transitions.push(Transition { guard, dest: dest_of(*dest) });
            }
            let default_guard = switch_type_default_guard(enc, tree, ctx, dag, *value, *id)?;
            transitions.push(Transition { guard: default_guard, dest: dest_of(*default_dest) });
            Ok((StatusKind::Unknown, transitions))
        }
        SwitchTypes { id, value, cases, default_dest } => {
            let mut transitions = Vec::with_capacity(cases.len() + 1);
            for (tys, dest) in cases {
                let guard = switch_type_case_guard(enc, tree, ctx, dag, *value, *id, tys)?;
                transitions.push(Transition { guard, dest: dest_of(*dest) });
            }
            let default_guard = switch_type_default_guard(enc, tree, ctx, dag, *value, *id)?;
            transitions.push(Transition { guard: default_guard, dest: dest_of(*default_dest) });
            Ok((StatusKind::Unknown, transitions))
        }
        CheckOperandCount { id, value, count, compare_at_least, true_dest, false_dest } => {
            let (t, f) = check_operand_count_guards(enc, tree, ctx, dag, *value, *id, *count, *compare_at_least)?;
            Ok((
                StatusKind::Unknown,
                vec![
                    Transition { guard: t, dest: dest_of(*true_dest) },
                    Transition { guard: f, dest: dest_of(*false_dest) },
                ],
            ))
        }
        CheckResultCount { id, value, count, compare_at_least, true_dest, false_dest } => {
            let (t, f) = check_result_count_guards(enc, tree, ctx, dag, *value, *id, *count, *compare_at_least)?;
            Ok((
                StatusKind::Unknown,
                vec![
                    Transition { guard: t, dest: dest_of(*true_dest) },
                    Transition { guard: f, dest: dest_of(*false_dest) },
                ],
            ))
        }
        AreEqual { id, lhs, rhs, true_dest, false_dest } => {
            let (t, f) = are_equal_guards(enc, tree, ctx, dag, *lhs, *rhs, *id)?;
            Ok((
                StatusKind::Unknown,
                vec![
                    Transition { guard: t, dest: dest_of(*true_dest) },
                    Transition { guard: f, dest: dest_of(*false_dest) },
                ],
            ))
        }
        Branch { dest } => Ok((
            StatusKind::Unknown,
            vec![Transition { guard: crate::expr::BitExpr::Const(1, 1), dest: dest_of(*dest) }],
        )),
        CheckOperationName { id, .. }
        | CheckType { id, .. }
        | CheckTypes { id, .. }
        | CheckAttribute { id, .. }
        | SwitchAttribute { id, .. } => Err(SynthesisError::UnsupportedPatternFeature(*id)),
    }
}
