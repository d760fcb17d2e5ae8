use indexmap::IndexMap;

use crate::element::{encompass, MergeStrategy, NbtElement};
use crate::error::SchemaError;
use crate::method_call::CompoundNameSeed;

/// One entry of a [`NbtCompound`]: the schema of the value, plus whether every observed write
/// of this key was conditional.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundEntry {
    pub value:    NbtElement,
    pub optional: bool,
}

impl CompoundEntry {
    pub fn new(value: NbtElement, optional: bool) -> Self {
        Self { value, optional }
    }
}

/// A structured compound: an ordered map of fields with known types, optionally extended with
/// an unknown-keys channel and a list of sub-compounds still waiting to be flattened into it.
///
/// Entry order is preserved (backed by an [`IndexMap`]) so that output JSON is deterministic
/// across runs, matching the insertion order the interpreter observed writes in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NbtCompound {
    entries:      IndexMap<String, CompoundEntry>,
    /// Seed used to derive this compound's name once the naming pass runs. `None` for
    /// compounds synthesized outside of a method call (e.g. the return value of a native
    /// facade method).
    name:         Option<CompoundNameSeed>,
    unknown_keys: Option<Box<NbtElement>>,
    flattened:    Vec<NbtElement>,
}

impl NbtCompound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(name: CompoundNameSeed) -> Self {
        Self {
            name: Some(name),
            ..Self::default()
        }
    }

    pub fn entries(&self) -> &IndexMap<String, CompoundEntry> {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut IndexMap<String, CompoundEntry> {
        &mut self.entries
    }

    pub fn name(&self) -> Option<&CompoundNameSeed> {
        self.name.as_ref()
    }

    /// Sets this compound's name seed if it doesn't already have one ("inherit first
    /// non-null name" from 4.1's compound-merge rule).
    pub fn set_name_if_absent(&mut self, name: CompoundNameSeed) {
        if self.name.is_none() {
            self.name = Some(name);
        }
    }

    pub fn unknown_keys(&self) -> Option<&NbtElement> {
        self.unknown_keys.as_deref()
    }

    /// Overwrites the unknown-keys channel outright, used by the naming pass (4.7) once it has
    /// already recursively named whatever the channel held. Unlike `admit_unknown_key`, this
    /// does not `encompass` against the previous value.
    pub fn set_unknown_keys(&mut self, value: Option<NbtElement>) {
        self.unknown_keys = value.map(Box::new);
    }

    pub fn flattened(&self) -> &[NbtElement] {
        &self.flattened
    }

    pub fn flattened_mut(&mut self) -> &mut Vec<NbtElement> {
        &mut self.flattened
    }

    /// Records a write of `key: value`, merging with any existing entry for `key` using
    /// `SameDataSet` semantics (two writes to the same key in one observed trace XOR their
    /// optionality, per 4.1).
    pub fn put(&mut self, key: impl Into<String>, value: NbtElement, optional: bool) -> Result<(), SchemaError> {
        let key = key.into();
        let incoming = CompoundEntry::new(value, optional);

        match self.entries.get(&key) {
            Some(existing) => {
                let merged_value = crate::element::merge(
                    existing.value.clone(),
                    incoming.value,
                    MergeStrategy::SameDataSet,
                )?;
                let merged_optional = existing.optional ^ incoming.optional;
                self.entries.insert(key, CompoundEntry::new(merged_value, merged_optional));
            }
            None => {
                self.entries.insert(key, incoming);
            }
        }
        Ok(())
    }

    /// Widens the unknown-keys channel to also admit `value`, via `encompass` (used when a
    /// key is only known up to a set from a `StringFromArray` or is fully dynamic).
    pub fn admit_unknown_key(&mut self, value: NbtElement) {
        self.unknown_keys = Some(Box::new(match self.unknown_keys.take() {
            Some(existing) => encompass(*existing, value),
            None           => value,
        }));
    }

    pub fn push_flattened(&mut self, member: NbtElement) {
        debug_assert!(
            matches!(member, NbtElement::Compound(_) | NbtElement::Boxed(_)),
            "flattened members must be Compound or Boxed",
        );
        self.flattened.push(member);
    }

    /// Structural equality used by the naming pass's deduplication: two compounds with the
    /// same fields, unknown-keys channel and flattened members are the same shape, regardless
    /// of which method call originally produced either of them.
    pub fn structurally_eq(&self, other: &Self) -> bool {
        self.entries == other.entries
            && self.unknown_keys == other.unknown_keys
            && self.flattened == other.flattened
    }
}
