use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;

use crate::compound::NbtCompound;

/// A lightweight, stringy stand-in for a `MethodCall` (method pointer + erased argument
/// schemas + branch-scope override flag), used only to seed a human-readable name for an
/// anonymous compound.
///
/// The interpreter owns the real `MethodCall` (it carries live value-domain argument
/// descriptors that this crate has no business depending on); it hands us this seed instead,
/// which is all the naming pass needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompoundNameSeed {
    pub class: String,
    pub method: String,
    /// A short digest of the erased argument schemas and the override-optional flag, stable
    /// across runs but otherwise opaque; only used to disambiguate two calls to the same
    /// method with different statically-known argument shapes.
    pub arg_digest: String,
}

impl CompoundNameSeed {
    pub fn new(class: impl Into<String>, method: impl Into<String>, arg_digest: impl Into<String>) -> Self {
        Self {
            class:      class.into(),
            method:     method.into(),
            arg_digest: arg_digest.into(),
        }
    }

    /// Derives the base name used as a starting point by the naming pass, e.g.
    /// `net/minecraft/entity/Entity.writeNbt` -> `Entity_writeNbt`.
    fn base_name(&self) -> String {
        let short_class = self.class.rsplit('/').next().unwrap_or(&self.class);
        format!("{short_class}_{}", self.method)
    }

    /// The name actually used both for `Boxed` back-references baked in at analysis time and
    /// for the naming pass's registration key. Unlike `base_name`, this is a pure function of
    /// the full call identity (class, method, and `arg_digest`): two calls to the same method
    /// with different erased argument shapes never collide on one name, so a `Boxed(name)`
    /// fixed early (before the compound it refers to has even finished being analyzed) is
    /// guaranteed to match the name the same identity is later registered under, regardless of
    /// what else happens to share its plain `base_name` along the way.
    pub fn disambiguated_name(&self) -> String {
        let base = self.base_name();
        if self.arg_digest.is_empty() {
            return base;
        }
        let mut hasher = DefaultHasher::new();
        self.arg_digest.hash(&mut hasher);
        format!("{base}_{:x}", hasher.finish() & 0xffff)
    }
}

impl fmt::Display for CompoundNameSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}({})", self.class, self.method, self.arg_digest)
    }
}

/// The growing registry of named compounds produced by the naming pass (4.7).
///
/// Structural deduplication means two methods that write out-compatible shapes end up sharing
/// one registry entry; `register` is the only way to add to it, and always returns the name
/// that should be used at the call site (a fresh one, or a pre-existing structural match).
#[derive(Debug, Clone, Default)]
pub struct NamingRegistry {
    /// Insertion-ordered so final output is deterministic regardless of traversal order.
    by_name: IndexMap<String, NbtCompound>,
}

impl NamingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Registers `compound` under a name derived from `base_name`, reusing an existing entry
    /// if one is already structurally equal, and returns the name to use at the call site.
    pub fn register(&mut self, base_name: String, compound: NbtCompound) -> String {
        if let Some((existing_name, _)) = self.by_name.iter().find(|(_, existing)| existing.structurally_eq(&compound)) {
            return existing_name.clone();
        }

        let mut name = base_name.clone();
        let mut suffix = 1_u32;
        while self.by_name.contains_key(&name) {
            suffix += 1;
            name = format!("{base_name}{suffix}");
        }

        self.by_name.insert(name.clone(), compound);
        name
    }

    pub fn get(&self, name: &str) -> Option<&NbtCompound> {
        self.by_name.get(name)
    }

    /// Iterates the registry in insertion order, the order the output's `compoundTypes`
    /// array must ultimately be sorted from before being re-sorted by name (6.2).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NbtCompound)> {
        self.by_name.iter().map(|(name, compound)| (name.as_str(), compound))
    }

    pub fn into_sorted_vec(self) -> Vec<(String, NbtCompound)> {
        let mut entries: Vec<_> = self.by_name.into_iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        entries
    }
}
