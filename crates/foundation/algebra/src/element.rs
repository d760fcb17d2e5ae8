use crate::compound::NbtCompound;
use crate::error::SchemaError;

/// The schema sum type: a tagged union describing the static shape of some position in an NBT
/// tree. See 3.1 for the full variant table; this is the textbook tagged-union approach,
/// matched exhaustively everywhere rather than dispatched through a visitor.
#[derive(Debug, Clone, PartialEq)]
pub enum NbtElement {
    /// Unknown/bottom. Merges absorb into the other side; `encompass` against anything else
    /// also yields the other side.
    Any,

    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    ByteArray,
    IntArray,
    LongArray,

    /// Serializes as `IntArray`, but is worth keeping distinct for downstream codegen.
    Uuid,
    /// Serializes as `Byte`.
    Boolean,

    /// A homogeneous list; `inner` merges across every observed `add`.
    List(Box<NbtElement>),

    /// A disjoint union produced by value-level branching (e.g. an `Either::map` over two
    /// lambdas of differing return shape).
    Either(Box<NbtElement>, Box<NbtElement>),

    /// A compound whose keys are not statically known; every admitted value shares
    /// `value_type`.
    AnyCompound(Box<NbtElement>),

    /// A structured compound. See [`NbtCompound`].
    Compound(NbtCompound),

    /// A back-reference to an enclosing compound by its (eventual) registered name, inserted
    /// to break a cycle the memoizer detected.
    Boxed(String),

    /// A pinned back-reference to the root entity polymorphic type; used only for the
    /// entity-as-passenger recursion (4.6).
    NestedEntity,

    /// The rewritten form emitted by the naming pass: a reference to a named compound
    /// definition in the registry.
    Named(String),
}

impl NbtElement {
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// A short, stable tag used in diagnostics and as part of the JSON `"type"` discriminant.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Any           => "Any",
            Self::Byte          => "Byte",
            Self::Short         => "Short",
            Self::Int           => "Int",
            Self::Long          => "Long",
            Self::Float         => "Float",
            Self::Double        => "Double",
            Self::String        => "String",
            Self::ByteArray     => "ByteArray",
            Self::IntArray      => "IntArray",
            Self::LongArray     => "LongArray",
            Self::Uuid          => "Uuid",
            Self::Boolean       => "Boolean",
            Self::List(_)       => "List",
            Self::Either(..)    => "Either",
            Self::AnyCompound(_) => "AnyCompound",
            Self::Compound(_)   => "Compound",
            Self::Boxed(_)      => "Boxed",
            Self::NestedEntity  => "NestedEntity",
            Self::Named(_)      => "Compound",
        }
    }

    fn is_same_primitive_shape(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::Byte, Self::Byte)
                | (Self::Short, Self::Short)
                | (Self::Int, Self::Int)
                | (Self::Long, Self::Long)
                | (Self::Float, Self::Float)
                | (Self::Double, Self::Double)
                | (Self::String, Self::String)
                | (Self::ByteArray, Self::ByteArray)
                | (Self::IntArray, Self::IntArray)
                | (Self::LongArray, Self::LongArray)
                | (Self::Uuid, Self::Uuid)
                | (Self::Boolean, Self::Boolean)
                | (Self::NestedEntity, Self::NestedEntity)
        )
    }
}

/// Which dataset two schemas being merged are considered to come from, which decides how
/// optionality combines (4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Two writes observed within one linear execution trace (e.g. both arms of one branch,
    /// or a caller's live tag against a delta applied at one pc). Optionality XORs: two
    /// optional writes to the same key in the same trace means the key is, logically, always
    /// written.
    SameDataSet,
    /// Results drawn from genuinely distinct datasets (e.g. two `return` statements, which
    /// represent mutually exclusive executions). Optionality ORs.
    DifferentDataSet,
}

/// Folds two schemas describing the same tree position into one, per the rules in 4.1.
///
/// `Any` merged with anything yields the other side; two structurally compatible shapes merge
/// recursively; anything else is an [`SchemaError::IncompatibleMerge`].
pub fn merge(a: NbtElement, b: NbtElement, strategy: MergeStrategy) -> Result<NbtElement, SchemaError> {
    use NbtElement::*;

    match (a, b) {
        (Any, other) | (other, Any) => Ok(other),

        (List(l1), List(l2)) => Ok(List(Box::new(merge(*l1, *l2, strategy)?))),

        (Either(a1, b1), Either(a2, b2)) => Ok(Either(
            Box::new(merge(*a1, *a2, strategy)?),
            Box::new(merge(*b1, *b2, strategy)?),
        )),
        (Either(a, b), x) | (x, Either(a, b)) => {
            if *a == x {
                Ok(Either(a, b))
            } else if *b == x {
                Ok(Either(a, b))
            } else {
                Err(SchemaError::incompatible_merge(&*a, &x))
            }
        }

        (AnyCompound(_), Compound(c)) | (Compound(c), AnyCompound(_)) => Ok(Compound(c)),
        (AnyCompound(v1), AnyCompound(v2)) => Ok(AnyCompound(Box::new(encompass(*v1, *v2)))),

        (Compound(c1), Compound(c2)) => Ok(Compound(merge_compounds(c1, c2, strategy)?)),

        (Boxed(n1), Boxed(n2)) => {
            if n1 == n2 {
                Ok(Boxed(n1))
            } else {
                Err(SchemaError::IncompatibleMerge { left: n1, right: n2 })
            }
        }

        (Named(n1), Named(n2)) => {
            if n1 == n2 {
                Ok(Named(n1))
            } else {
                Err(SchemaError::IncompatibleMerge { left: n1, right: n2 })
            }
        }

        (left, right) => {
            if left.is_same_primitive_shape(&right) {
                Ok(left)
            } else {
                Err(SchemaError::incompatible_merge(&left, &right))
            }
        }
    }
}

fn merge_compounds(mut c1: NbtCompound, c2: NbtCompound, strategy: MergeStrategy) -> Result<NbtCompound, SchemaError> {
    for (key, entry) in c2.entries().clone() {
        match c1.entries().get(&key) {
            Some(existing) => {
                let merged_value = merge(existing.value.clone(), entry.value, strategy)?;
                let merged_optional = match strategy {
                    MergeStrategy::SameDataSet      => existing.optional ^ entry.optional,
                    MergeStrategy::DifferentDataSet => existing.optional || entry.optional,
                };
                c1.entries_mut().insert(key, crate::compound::CompoundEntry::new(merged_value, merged_optional));
            }
            None => {
                c1.entries_mut().insert(key, entry);
            }
        }
    }

    if let Some(other_unknown) = c2.unknown_keys() {
        c1.admit_unknown_key(other_unknown.clone());
    }

    for member in c2.flattened() {
        c1.push_flattened(member.clone());
    }

    if let Some(name) = c2.name() {
        c1.set_name_if_absent(name.clone());
    }

    Ok(c1)
}

/// Computes the least upper bound of two schemas, used when a compound's unknown-keys channel
/// must admit another type (4.1). Unlike `merge`, `encompass` never fails: incompatible shapes
/// simply collapse to `Any`, and compounds collapse (lossily, by design) into `AnyCompound`.
pub fn encompass(a: NbtElement, b: NbtElement) -> NbtElement {
    use NbtElement::*;

    match (a, b) {
        (Any, other) | (other, Any) => other,

        (List(l1), List(l2)) => List(Box::new(encompass(*l1, *l2))),

        (AnyCompound(v1), AnyCompound(v2)) => AnyCompound(Box::new(encompass(*v1, *v2))),
        (AnyCompound(v), Compound(c)) | (Compound(c), AnyCompound(v)) => {
            let folded = fold_encompass_entries(&c, *v);
            AnyCompound(Box::new(folded))
        }
        (Compound(c1), Compound(c2)) => {
            let mut value = Any;
            for (_, entry) in c1.entries() {
                value = encompass(value, entry.value.clone());
            }
            for (_, entry) in c2.entries() {
                value = encompass(value, entry.value.clone());
            }
            if let Some(u) = c1.unknown_keys() {
                value = encompass(value, u.clone());
            }
            if let Some(u) = c2.unknown_keys() {
                value = encompass(value, u.clone());
            }
            AnyCompound(Box::new(value))
        }

        (Boxed(n1), Boxed(n2)) if n1 == n2 => Boxed(n1),
        (Named(n1), Named(n2)) if n1 == n2 => Named(n1),

        (left, right) => {
            if left.is_same_primitive_shape(&right) {
                left
            } else {
                Any
            }
        }
    }
}

fn fold_encompass_entries(compound: &NbtCompound, seed: NbtElement) -> NbtElement {
    let mut value = seed;
    for (_, entry) in compound.entries() {
        value = encompass(value, entry.value.clone());
    }
    if let Some(u) = compound.unknown_keys() {
        value = encompass(value, u.clone());
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compound::CompoundEntry;

    #[test]
    fn any_merges_absorb() {
        assert_eq!(merge(NbtElement::Any, NbtElement::Int, MergeStrategy::SameDataSet).unwrap(), NbtElement::Int);
        assert_eq!(merge(NbtElement::Int, NbtElement::Any, MergeStrategy::SameDataSet).unwrap(), NbtElement::Int);
    }

    #[test]
    fn same_data_set_xor_cancels_optionality() {
        let mut c1 = NbtCompound::new();
        c1.put("k", NbtElement::Int, true).unwrap();
        let mut c2 = NbtCompound::new();
        c2.put("k", NbtElement::Int, true).unwrap();

        let merged = merge(NbtElement::Compound(c1), NbtElement::Compound(c2), MergeStrategy::SameDataSet).unwrap();
        let NbtElement::Compound(merged) = merged else { panic!("expected compound") };
        assert_eq!(merged.entries().get("k"), Some(&CompoundEntry::new(NbtElement::Int, false)));
    }

    #[test]
    fn different_data_set_ors_optionality() {
        let mut c1 = NbtCompound::new();
        c1.put("k", NbtElement::Int, true).unwrap();
        let c2 = NbtCompound::new();

        let merged = merge(NbtElement::Compound(c1), NbtElement::Compound(c2), MergeStrategy::DifferentDataSet).unwrap();
        let NbtElement::Compound(merged) = merged else { panic!("expected compound") };
        assert_eq!(merged.entries().get("k"), Some(&CompoundEntry::new(NbtElement::Int, true)));
    }

    #[test]
    fn incompatible_primitives_fail() {
        assert!(merge(NbtElement::Byte, NbtElement::Int, MergeStrategy::SameDataSet).is_err());
    }

    #[test]
    fn anycompound_loses_to_compound() {
        let c = NbtCompound::new();
        let merged = merge(
            NbtElement::AnyCompound(Box::new(NbtElement::Int)),
            NbtElement::Compound(c.clone()),
            MergeStrategy::SameDataSet,
        ).unwrap();
        assert_eq!(merged, NbtElement::Compound(c));
    }

    #[test]
    fn encompass_is_idempotent() {
        let a = NbtElement::List(Box::new(NbtElement::Int));
        assert_eq!(encompass(a.clone(), a.clone()), a);
    }

    #[test]
    fn encompass_different_primitives_yields_any() {
        assert_eq!(encompass(NbtElement::Byte, NbtElement::Int), NbtElement::Any);
    }

    #[test]
    fn encompass_compounds_collapses_to_anycompound() {
        let mut c1 = NbtCompound::new();
        c1.put("a", NbtElement::Int, false).unwrap();
        let mut c2 = NbtCompound::new();
        c2.put("b", NbtElement::Int, false).unwrap();

        let result = encompass(NbtElement::Compound(c1), NbtElement::Compound(c2));
        assert_eq!(result, NbtElement::AnyCompound(Box::new(NbtElement::Int)));
    }
}
