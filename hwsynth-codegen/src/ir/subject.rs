//! The subject IR catalog (spec §3.1): the finite, densely-numbered opcode
//! table and the wire-encoding widths derived from it. Both are supplied by
//! the caller at synthesis time; neither is inferred.

use hwsynth_entity::{entity_impl, PrimaryMap};
use rustc_hash::FxHashMap;

/// An interned subject-IR type tag (e.g. `i32`, `ptr`). Types are opaque to
/// this crate: the only operations performed on them are equality and
/// lookup by name.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);
entity_impl!(TypeId, "ty");

/// Interns type names into dense [`TypeId`]s.
#[derive(Default, Clone, Debug)]
pub struct TypeCatalog {
    names: PrimaryMap<TypeId, String>,
    by_name: FxHashMap<String, TypeId>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> TypeId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = self.names.push(name.to_owned());
        self.by_name.insert(name.to_owned(), id);
        id
    }

    pub fn name(&self, id: TypeId) -> &str {
        &self.names[id]
    }
}

/// One opcode's shape: how many operands it takes, their types, and the
/// type of its single optional result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationEntry {
    pub name: String,
    pub opcode: u32,
    pub operand_types: Vec<TypeId>,
    pub result_type: Option<TypeId>,
}

impl OperationEntry {
    pub fn operand_count(&self) -> usize {
        self.operand_types.len()
    }

    pub fn has_result(&self) -> bool {
        self.result_type.is_some()
    }
}

/// The static opcode catalog supplied at synthesis time: a dense mapping
/// from opcode name to its shape. Opcodes are assigned densely from 0 by
/// the caller (spec §3.1); this type does not assign them itself, only
/// validates and indexes what it is given.
#[derive(Clone, Debug, Default)]
pub struct OperationContext {
    pub types: TypeCatalog,
    entries: Vec<OperationEntry>,
    by_name: FxHashMap<String, usize>,
}

impl OperationContext {
    pub fn new(types: TypeCatalog) -> Self {
        Self {
            types,
            entries: Vec::new(),
            by_name: FxHashMap::default(),
        }
    }

    /// Register one opcode. Panics if `entry.opcode` is not the next dense
    /// index or if the name is already registered: both are programmer
    /// errors in catalog construction, not recoverable `SynthesisError`s.
    pub fn register(&mut self, entry: OperationEntry) {
        assert_eq!(
            entry.opcode as usize,
            self.entries.len(),
            "opcodes must be registered densely from 0"
        );
        assert!(
            !self.by_name.contains_key(&entry.name),
            "duplicate opcode name `{}`",
            entry.name
        );
        self.by_name.insert(entry.name.clone(), self.entries.len());
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn by_name(&self, name: &str) -> Option<&OperationEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    pub fn by_opcode(&self, opcode: u32) -> Option<&OperationEntry> {
        self.entries.get(opcode as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationEntry> {
        self.entries.iter()
    }

    /// The number of bits needed to hold any opcode in this catalog: opcodes
    /// exceeding this width cannot occur in a valid stream and are filtered
    /// from lowered disjunctions (spec §4.5.2).
    pub fn opcode_width(&self) -> u32 {
        bits_to_represent(self.entries.len().saturating_sub(1) as u64)
    }
}

fn bits_to_represent(max_value: u64) -> u32 {
    if max_value == 0 {
        1
    } else {
        64 - max_value.leading_zeros()
    }
}

/// The three widths that fix the wire encoding of a stream operation
/// (spec §3.1): `opcode_width + max_operand_amount * operand_offset_width`
/// bits total, laid out LSB-first as
/// `[opcode | offset[0] | offset[1] | … | offset[max_operand_amount-1]]`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EncodingContext {
    pub opcode_width: u32,
    pub operand_offset_width: u32,
    pub max_operand_amount: u32,
}

impl EncodingContext {
    /// Validate widths at construction, the way the teacher validates ISA
    /// builder configuration eagerly rather than at first use.
    pub fn new(opcode_width: u32, operand_offset_width: u32, max_operand_amount: u32) -> Self {
        assert!(opcode_width > 0, "opcode_width must be positive");
        assert!(
            operand_offset_width > 0,
            "operand_offset_width must be positive"
        );
        assert!(max_operand_amount > 0, "max_operand_amount must be positive");
        Self {
            opcode_width,
            operand_offset_width,
            max_operand_amount,
        }
    }

    /// Total width of one encoded stream operation.
    pub fn operation_width(&self) -> u32 {
        self.opcode_width + self.max_operand_amount * self.operand_offset_width
    }

    /// Bit offset of the encoded `offset[i]` field within one operation,
    /// counting from the LSB.
    pub fn operand_offset_bit(&self, i: u32) -> u32 {
        assert!(i < self.max_operand_amount);
        self.opcode_width + i * self.operand_offset_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_catalog() -> OperationContext {
        let mut types = TypeCatalog::new();
        let i32_ty = types.intern("i32");
        let mut ctx = OperationContext::new(types);
        ctx.register(OperationEntry {
            name: "const".into(),
            opcode: 0,
            operand_types: vec![],
            result_type: Some(i32_ty),
        });
        ctx.register(OperationEntry {
            name: "add".into(),
            opcode: 1,
            operand_types: vec![i32_ty, i32_ty],
            result_type: Some(i32_ty),
        });
        ctx.register(OperationEntry {
            name: "or".into(),
            opcode: 2,
            operand_types: vec![i32_ty, i32_ty],
            result_type: Some(i32_ty),
        });
        ctx
    }

    #[test]
    fn opcode_width_fits_dense_catalog() {
        let ctx = small_catalog();
        assert_eq!(ctx.opcode_width(), 2); // 3 opcodes -> needs 2 bits
    }

    #[test]
    fn encoding_context_layout() {
        let enc = EncodingContext::new(2, 4, 2);
        assert_eq!(enc.operation_width(), 2 + 2 * 4);
        assert_eq!(enc.operand_offset_bit(0), 2);
        assert_eq!(enc.operand_offset_bit(1), 6);
    }

    #[test]
    #[should_panic]
    fn duplicate_opcode_name_panics() {
        let mut ctx = small_catalog();
        ctx.register(OperationEntry {
            name: "add".into(),
            opcode: 3,
            operand_types: vec![],
            result_type: None,
        });
    }
}
