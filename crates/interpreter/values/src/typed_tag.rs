use std::cell::RefCell;
use std::rc::Rc;

use nbtschema_algebra::NbtElement;

use crate::value::Value;

/// The schema a `TypedTag` currently contributes, shared (not cloned) across every alias of the
/// same Java reference. A `putInt` recorded through one copy of a compound reference must be
/// visible through every other local/stack slot holding "the same" reference, exactly as real
/// object identity would behave — plain value cloning can't give us that, so the cell is kept
/// behind `Rc<RefCell<_>>` and only ever deep-cloned at a call boundary (`Memoizer::call`'s
/// seeding always builds a fresh cell for a callee rather than reusing the caller's).
pub type NbtCell = Rc<RefCell<NbtElement>>;

/// An NBT-typed value living in a frame cell. `nbt` is the schema this cell currently
/// contributes (mutated in place as writes against it are recorded); `optional_until` is a
/// program-counter threshold below which newly recorded writes through this tag are forced to
/// be optional, used to propagate "this value came from inside a branch" across calls (see
/// 4.5's branch-instruction handling).
#[derive(Debug, Clone, PartialEq)]
pub struct TypedTag {
    pub nbt: NbtCell,
    pub optional_until: u32,
}

impl TypedTag {
    pub fn new(nbt: NbtElement) -> Self {
        Self { nbt: Rc::new(RefCell::new(nbt)), optional_until: 0 }
    }

    pub fn is_optional_at(&self, pc: u32) -> bool {
        pc < self.optional_until
    }

    pub fn raise_optional_until(&mut self, target_pc: u32) {
        self.optional_until = self.optional_until.max(target_pc);
    }

    /// Wraps a cell that is about to participate in a recorded NBT write. Cells already typed
    /// keep their accumulated schema and `optional_until` (the clone shares the same `Rc` cell,
    /// not a fresh one); anything else starts fresh with `default_shape` (typically
    /// `NbtElement::Compound(NbtCompound::new())` for a known compound receiver, `NbtElement::Any`
    /// otherwise).
    pub fn ensure(value: &Value, default_shape: NbtElement) -> Self {
        match value.as_typed() {
            Some(tag) => tag.clone(),
            None => TypedTag::new(default_shape),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_reuses_an_existing_typed_tag() {
        let mut tag = TypedTag::new(NbtElement::Int);
        tag.raise_optional_until(5);
        let value = Value::Typed(tag.clone());
        assert_eq!(TypedTag::ensure(&value, NbtElement::Any), tag);
    }

    #[test]
    fn ensure_shares_the_cell_rather_than_deep_cloning() {
        let tag = TypedTag::new(NbtElement::Compound(nbtschema_algebra::NbtCompound::new()));
        let value = Value::Typed(tag.clone());
        let ensured = TypedTag::ensure(&value, NbtElement::Any);
        *ensured.nbt.borrow_mut() = NbtElement::Int;
        assert_eq!(*tag.nbt.borrow(), NbtElement::Int);
    }

    #[test]
    fn ensure_starts_fresh_for_untyped_values() {
        let tag = TypedTag::ensure(&Value::Unknown, NbtElement::Any);
        assert_eq!(*tag.nbt.borrow(), NbtElement::Any);
        assert_eq!(tag.optional_until, 0);
    }
}
