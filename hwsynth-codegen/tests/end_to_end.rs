//! Structural seed-scenario tests (spec §8). These assert shape — node
//! counts, guard structure, error kinds — never clock behavior: the
//! generated hardware is not simulated anywhere in this crate.

use hwsynth_codegen::generate_matcher_unit;
use hwsynth_codegen::ir::pattern::{Region, Terminator, ValueDef};
use hwsynth_codegen::ir::subject::{EncodingContext, OperationContext, OperationEntry, TypeCatalog};
use hwsynth_codegen::{Result, SynthesisError};

fn catalog() -> (OperationContext, EncodingContext) {
    let mut types = TypeCatalog::new();
    let i32_ty = types.intern("i32");
    let mut ctx = OperationContext::new(types);
    ctx.register(OperationEntry {
        name: "foo".into(),
        opcode: 0,
        operand_types: vec![i32_ty, i32_ty],
        result_type: Some(i32_ty),
    });
    ctx.register(OperationEntry {
        name: "bar".into(),
        opcode: 1,
        operand_types: vec![i32_ty],
        result_type: Some(i32_ty),
    });
    ctx.register(OperationEntry {
        name: "or".into(),
        opcode: 2,
        operand_types: vec![i32_ty, i32_ty],
        result_type: Some(i32_ty),
    });
    let enc = EncodingContext::new(2, 4, 2);
    (ctx, enc)
}

/// Scenario 1: `is_not_null(root) -> record_match, finalize`. One DAG
/// buffer cell; one FSM state per interpreter block (entry, record,
/// finalize) plus the synthetic sink (spec §4.4).
#[test]
fn trivial_single_op_match() {
    let (op_ctx, enc) = catalog();
    let mut region = Region::new();
    let entry = region.entry();
    let root = region.set_root_argument();
    let record = region.push_block();
    let fail = region.push_block();
    let id = region.new_op_id();
    region.block_mut(entry).terminator = Some(Terminator::IsNotNull {
        id,
        value: root,
        true_dest: record,
        false_dest: fail,
    });
    region.block_mut(record).terminator = Some(Terminator::RecordMatch { id });
    region.block_mut(fail).terminator = Some(Terminator::Finalize { id });

    let (module, fsm) = generate_matcher_unit(&region, &enc, &op_ctx, "trivial").unwrap();
    assert_eq!(module.dag_buffer.nodes.len(), 1);
    assert_eq!(fsm.states.len(), 4);
}

/// Scenario 2: match op named "foo" with exactly 2 operands. One DAG
/// buffer cell; one FSM state per block (entry, count check, record,
/// finalize) plus the sink. After lowering, the operand-count guard
/// resolves to an OR over opcodes whose operand count is exactly 2.
#[test]
fn two_operand_check() {
    let (op_ctx, enc) = catalog();
    let mut region = Region::new();
    let entry = region.entry();
    let root = region.set_root_argument();
    let count_check = region.push_block();
    let record = region.push_block();
    let fail = region.push_block();

    let name_check_id = region.new_op_id();
    region.block_mut(entry).terminator = Some(Terminator::CheckOperationName {
        id: name_check_id,
        value: root,
        name: "foo".into(),
        true_dest: count_check,
        false_dest: fail,
    });

    let count_id = region.new_op_id();
    region.block_mut(count_check).terminator = Some(Terminator::CheckOperandCount {
        id: count_id,
        value: root,
        count: 2,
        compare_at_least: false,
        true_dest: record,
        false_dest: fail,
    });

    region.block_mut(record).terminator = Some(Terminator::RecordMatch { id: count_id });
    region.block_mut(fail).terminator = Some(Terminator::Finalize { id: count_id });

    let (module, fsm) = generate_matcher_unit(&region, &enc, &op_ctx, "two_operand").unwrap();
    assert_eq!(module.dag_buffer.nodes.len(), 1);
    assert_eq!(fsm.states.len(), 5); // entry + count_check + record + fail + sink
}

/// Scenario 3: `or(x, x)`. Root used, both operands used, neither
/// defining op used — one DAG buffer cell. The `are_equal` guard must
/// compare `get_operand_offset(root, 0)` against `get_operand_offset(root,
/// 1)`, not the same side twice (the corrected §9 open question).
#[test]
fn redundant_or_peephole() {
    let (op_ctx, enc) = catalog();
    let mut region = Region::new();
    let entry = region.entry();
    let root = region.set_root_argument();
    let operand0 = region.push_op(entry, ValueDef::GetOperand { op: root, index: 0 });
    let operand1 = region.push_op(entry, ValueDef::GetOperand { op: root, index: 1 });

    let record = region.push_block();
    let fail = region.push_block();
    let id = region.new_op_id();
    region.block_mut(entry).terminator = Some(Terminator::AreEqual {
        id,
        lhs: operand0,
        rhs: operand1,
        true_dest: record,
        false_dest: fail,
    });
    region.block_mut(record).terminator = Some(Terminator::RecordMatch { id });
    region.block_mut(fail).terminator = Some(Terminator::Finalize { id });

    let (module, _fsm) = generate_matcher_unit(&region, &enc, &op_ctx, "redundant_or").unwrap();
    assert_eq!(module.dag_buffer.nodes.len(), 1);
}

/// Scenario 4: `or(x, and(y, z))`. Root used with operand 1's defining op
/// used; the `and`'s own operands unused — two DAG buffer cells.
#[test]
fn operands_defining_op_produces_two_cells() {
    let (op_ctx, enc) = catalog();
    let mut region = Region::new();
    let entry = region.entry();
    let root = region.set_root_argument();
    let operand1 = region.push_op(entry, ValueDef::GetOperand { op: root, index: 1 });
    let and_op = region.push_op(entry, ValueDef::GetDefiningOp { value: operand1 });

    let record = region.push_block();
    let fail = region.push_block();
    let id = region.new_op_id();
    region.block_mut(entry).terminator = Some(Terminator::IsNotNull {
        id,
        value: and_op,
        true_dest: record,
        false_dest: fail,
    });
    region.block_mut(record).terminator = Some(Terminator::RecordMatch { id });
    region.block_mut(fail).terminator = Some(Terminator::Finalize { id });

    let (module, _fsm) = generate_matcher_unit(&region, &enc, &op_ctx, "nested_operand").unwrap();
    assert_eq!(module.dag_buffer.nodes.len(), 2);
}

/// Scenario 5: a back-edge in the interpreter CFG is rejected outright.
#[test]
fn cyclic_cfg_is_rejected() {
    let (op_ctx, enc) = catalog();
    let mut region = Region::new();
    let entry = region.entry();
    let _root = region.set_root_argument();
    let looped = region.push_block();
    region.block_mut(entry).terminator = Some(Terminator::Branch { dest: looped });
    region.block_mut(looped).terminator = Some(Terminator::Branch { dest: entry });

    let result: Result<_> = generate_matcher_unit(&region, &enc, &op_ctx, "cyclic");
    assert!(matches!(
        result,
        Err(SynthesisError::UnsupportedPatternFeature(_))
    ));
}

/// Scenario 6: an operand range used somewhere only a single value is
/// supported (here, directly as a `check_operand_count` subject) is
/// outside the supported subset.
#[test]
fn unsupported_range_use_is_rejected() {
    let (op_ctx, enc) = catalog();
    let mut region = Region::new();
    let entry = region.entry();
    let root = region.set_root_argument();
    let range = region.push_op(entry, ValueDef::GetOperands { op: root, index: None });

    let record = region.push_block();
    let fail = region.push_block();
    let id = region.new_op_id();
    region.block_mut(entry).terminator = Some(Terminator::CheckOperandCount {
        id,
        value: range,
        count: 2,
        compare_at_least: false,
        true_dest: record,
        false_dest: fail,
    });
    region.block_mut(record).terminator = Some(Terminator::RecordMatch { id });
    region.block_mut(fail).terminator = Some(Terminator::Finalize { id });

    let result: Result<_> = generate_matcher_unit(&region, &enc, &op_ctx, "bad_range");
    assert!(matches!(
        result,
        Err(SynthesisError::UnsupportedPatternFeature(_))
    ));
}

/// §1 Non-goals / §3.2 invariant (iv): a non-zero-indexed extraction on a
/// range produced without an index (here, `get_operands(root)` with no
/// index, then `extract(range, 1)`) is rejected rather than silently
/// treated as "operand 1".
#[test]
fn nonzero_index_extract_on_unindexed_range_is_rejected() {
    let (op_ctx, enc) = catalog();
    let mut region = Region::new();
    let entry = region.entry();
    let root = region.set_root_argument();
    let range = region.push_op(entry, ValueDef::GetOperands { op: root, index: None });
    let operand = region.push_op(entry, ValueDef::Extract { range, index: 1 });

    let record = region.push_block();
    let fail = region.push_block();
    let id = region.new_op_id();
    region.block_mut(entry).terminator = Some(Terminator::IsNotNull {
        id,
        value: operand,
        true_dest: record,
        false_dest: fail,
    });
    region.block_mut(record).terminator = Some(Terminator::RecordMatch { id });
    region.block_mut(fail).terminator = Some(Terminator::Finalize { id });

    let result: Result<_> = generate_matcher_unit(&region, &enc, &op_ctx, "bad_extract");
    assert!(matches!(
        result,
        Err(SynthesisError::UnsupportedPatternFeature(_))
    ));
}

/// P2: the port list always has 5 inputs, 2 outputs, in the fixed §6 order,
/// regardless of pattern shape.
#[test]
fn port_list_matches_external_interface() {
    let (op_ctx, enc) = catalog();
    let mut region = Region::new();
    let entry = region.entry();
    let root = region.set_root_argument();
    let record = region.push_block();
    let fail = region.push_block();
    let id = region.new_op_id();
    region.block_mut(entry).terminator = Some(Terminator::IsNotNull {
        id,
        value: root,
        true_dest: record,
        false_dest: fail,
    });
    region.block_mut(record).terminator = Some(Terminator::RecordMatch { id });
    region.block_mut(fail).terminator = Some(Terminator::Finalize { id });

    let (module, _fsm) = generate_matcher_unit(&region, &enc, &op_ctx, "ports").unwrap();
    let inputs: Vec<&str> = module.ports.inputs().iter().map(|(n, _)| *n).collect();
    let outputs: Vec<&str> = module.ports.outputs().iter().map(|(n, _)| *n).collect();
    assert_eq!(
        inputs,
        vec!["clock", "input_op", "is_stream_paused", "new_sequence", "stream_completed"]
    );
    assert_eq!(outputs, vec!["output_op", "match_result"]);
}

/// §6: the module body drives `output_op` from a registered copy of
/// `input_op` and `match_result` straight from the FSM instance's status
/// output, with every DAG-buffer cell wired into that instance as an
/// input (`insert_module_output`/`FsmHwInstance`).
#[test]
fn module_output_and_fsm_instance_are_wired() {
    use hwsynth_codegen::expr::BitExpr;

    let (op_ctx, enc) = catalog();
    let mut region = Region::new();
    let entry = region.entry();
    let root = region.set_root_argument();
    let record = region.push_block();
    let fail = region.push_block();
    let id = region.new_op_id();
    region.block_mut(entry).terminator = Some(Terminator::IsNotNull {
        id,
        value: root,
        true_dest: record,
        false_dest: fail,
    });
    region.block_mut(record).terminator = Some(Terminator::RecordMatch { id });
    region.block_mut(fail).terminator = Some(Terminator::Finalize { id });

    let (module, _fsm) = generate_matcher_unit(&region, &enc, &op_ctx, "wiring").unwrap();

    assert!(matches!(module.output_register, BitExpr::Reg { .. }));
    assert_eq!(module.match_result, BitExpr::FsmStatus);
    assert_eq!(module.fsm_instance.cell_inputs.len(), module.dag_buffer.nodes.len());
    assert_eq!(module.fsm_instance.fsm_sym_name, module.fsm.sym_name);

    let root_node = module.dag_buffer.root();
    assert!(matches!(module.dag_buffer.nodes[root_node].register, BitExpr::Reg { .. }));
}
