//! Stage A: the interpreter normalizer (spec §4.1).
//!
//! Replaces each binary `check_operation_name`/`check_type`/`check_types`
//! terminator with the equivalent single-case `switch_*`, so every later
//! stage dispatches on one shape instead of two.
//! `check_operand_count`/`check_result_count` are left alone: their
//! comparator (equal-or-at-least) is richer than a switch case can express.
//! `check_attribute` is also left alone: attributes are outside the §3.1
//! data model, so there is no `switch_*` form downstream stages would
//! accept for it — rewriting it would just be a detour to the same
//! rejection.
//!
//! The rewrite is semantics-preserving bit-for-bit and idempotent (spec
//! property P1): a terminator that is already a `switch_*` is untouched, so
//! running this pass twice is the same as running it once.

use log::trace;

use crate::ir::pattern::{Region, Terminator};

/// Rewrite every `check_*` terminator (other than the count checks) in
/// `region` into its single-case `switch_*` form, in place.
pub fn switchify(region: &mut Region) {
    let blocks: Vec<_> = region.blocks().collect();
    for block in blocks {
        let Some(term) = region.block(block).terminator.clone() else {
            continue;
        };
        if let Some(rewritten) = switchify_terminator(&term) {
            trace!("stage A: normalized terminator in {block}");
            region.block_mut(block).terminator = Some(rewritten);
        }
    }
}

fn switchify_terminator(term: &Terminator) -> Option<Terminator> {
    match term {
        Terminator::CheckOperationName {
            id,
            value,
            name,
            true_dest,
            false_dest,
        } => Some(Terminator::SwitchOperationName {
            id: *id,
            value: *value,
            cases: vec![(name.clone(), *true_dest)],
            default_dest: *false_dest,
        }),
        Terminator::CheckType {
            id,
            value,
            ty,
            true_dest,
            false_dest,
        } => Some(Terminator::SwitchType {
            id: *id,
            value: *value,
            cases: vec![(*ty, *true_dest)],
            default_dest: *false_dest,
        }),
        Terminator::CheckTypes {
            id,
            value,
            tys,
            true_dest,
            false_dest,
        } => Some(Terminator::SwitchTypes {
            id: *id,
            value: *value,
            cases: vec![(tys.clone(), *true_dest)],
            default_dest: *false_dest,
        }),
        // `check_attribute` is left alone: attributes sit outside the
        // §3.1 data model this crate synthesizes against, so normalizing
        // it would only round-trip it into a `switch_attribute` that
        // stage B/C.2 reject just the same (span/build.rs, fsm/synth.rs).
        // Already normalized, or not one of the three rewritten shapes.
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::pattern::{PatternBlock, PatternValue};
    use hwsynth_entity::EntityRef;

    fn check_type_region() -> Region {
        let mut region = Region::new();
        let entry = region.entry();
        let root = region.set_root_argument();
        let true_b = region.push_block();
        let false_b = region.push_block();
        let id = region.new_op_id();
        region.block_mut(entry).terminator = Some(Terminator::CheckType {
            id,
            value: root,
            ty: crate::ir::subject::TypeId::new(7),
            true_dest: true_b,
            false_dest: false_b,
        });
        region.block_mut(true_b).terminator = Some(Terminator::RecordMatch { id });
        region.block_mut(false_b).terminator = Some(Terminator::Finalize { id });
        region
    }

    #[test]
    fn check_type_becomes_single_case_switch() {
        let mut region = check_type_region();
        switchify(&mut region);
        match region.block(region.entry()).terminator.clone().unwrap() {
            Terminator::SwitchType {
                cases, default_dest, ..
            } => {
                assert_eq!(cases.len(), 1);
                assert_eq!(default_dest, PatternBlock::new(2));
            }
            other => panic!("expected SwitchType, got {other:?}"),
        }
    }

    #[test]
    fn switchify_is_idempotent() {
        let mut region = check_type_region();
        switchify(&mut region);
        let once = region.block(region.entry()).terminator.clone();
        switchify(&mut region);
        let twice = region.block(region.entry()).terminator.clone();
        assert_eq!(once, twice);
    }

    #[test]
    fn count_checks_are_left_alone() {
        let mut region = Region::new();
        let entry = region.entry();
        let root = region.set_root_argument();
        let t = region.push_block();
        let f = region.push_block();
        let id = region.new_op_id();
        region.block_mut(entry).terminator = Some(Terminator::CheckOperandCount {
            id,
            value: root,
            count: 2,
            compare_at_least: false,
            true_dest: t,
            false_dest: f,
        });
        switchify(&mut region);
        assert!(matches!(
            region.block(entry).terminator,
            Some(Terminator::CheckOperandCount { .. })
        ));
        let _: PatternValue = root;
    }

    #[test]
    fn check_attribute_is_left_alone() {
        let mut region = Region::new();
        let entry = region.entry();
        let root = region.set_root_argument();
        let t = region.push_block();
        let f = region.push_block();
        let id = region.new_op_id();
        region.block_mut(entry).terminator = Some(Terminator::CheckAttribute {
            id,
            value: root,
            true_dest: t,
            false_dest: f,
        });
        switchify(&mut region);
        assert!(matches!(
            region.block(entry).terminator,
            Some(Terminator::CheckAttribute { .. })
        ));
    }
}
