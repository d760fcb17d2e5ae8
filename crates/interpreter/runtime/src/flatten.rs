use nbtschema_algebra::{merge, CompoundEntry, MergeStrategy, NbtCompound, NbtElement};

use crate::error::InterpreterError;
use crate::memoizer::Memoizer;

/// The `flatten` post-processing pass (4.7): recursively descends into every child compound,
/// then rewrites the current compound's `flattened` list. A flattened member that is itself a
/// `Compound` whose name seed matches a recursion the memoizer detected (`boxedTypes`) is kept
/// as-is — inlining it would erase the very cycle break the memoizer synthesized a `Boxed` for
/// elsewhere in the tree. Anything else gets merged into the current compound's own fields and
/// dropped. `Boxed` entries are never touched.
pub fn flatten(element: NbtElement, memoizer: &Memoizer) -> Result<NbtElement, InterpreterError> {
    match element {
        NbtElement::Compound(compound) => Ok(NbtElement::Compound(flatten_compound(compound, memoizer)?)),
        NbtElement::List(inner) => Ok(NbtElement::List(Box::new(flatten(*inner, memoizer)?))),
        NbtElement::Either(left, right) => Ok(NbtElement::Either(
            Box::new(flatten(*left, memoizer)?),
            Box::new(flatten(*right, memoizer)?),
        )),
        NbtElement::AnyCompound(value_type) => Ok(NbtElement::AnyCompound(Box::new(flatten(*value_type, memoizer)?))),
        other => Ok(other),
    }
}

fn flatten_compound(mut compound: NbtCompound, memoizer: &Memoizer) -> Result<NbtCompound, InterpreterError> {
    let entries: Vec<(String, CompoundEntry)> = compound.entries().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    for (key, entry) in entries {
        let flattened_value = flatten(entry.value, memoizer)?;
        compound.entries_mut().insert(key, CompoundEntry::new(flattened_value, entry.optional));
    }

    if let Some(unknown) = compound.unknown_keys().cloned() {
        compound.set_unknown_keys(Some(flatten(unknown, memoizer)?));
    }

    let members = std::mem::take(compound.flattened_mut());
    for member in members {
        match member {
            NbtElement::Compound(sub) => {
                let sub = flatten_compound(sub, memoizer)?;
                let is_recursion_critical = sub.name().is_some_and(|seed| memoizer.is_boxed_name(&seed.disambiguated_name()));
                if is_recursion_critical {
                    compound.push_flattened(NbtElement::Compound(sub));
                } else {
                    let merged = merge(NbtElement::Compound(compound), NbtElement::Compound(sub), MergeStrategy::SameDataSet)
                        .map_err(InterpreterError::PostProcessing)?;
                    let NbtElement::Compound(merged) = merged else {
                        unreachable!("merging two Compounds always yields a Compound")
                    };
                    compound = merged;
                }
            }
            boxed @ NbtElement::Boxed(_) => compound.push_flattened(boxed),
            other => compound.push_flattened(other),
        }
    }

    Ok(compound)
}

#[cfg(test)]
mod tests {
    use nbtschema_classfile::InMemoryClassSource;

    use super::*;
    use crate::class_loader::ClassLoader;

    fn build_memoizer() -> Memoizer {
        Memoizer::new(ClassLoader::new(Box::new(InMemoryClassSource::new())))
    }

    #[test]
    fn non_recursive_flattened_member_merges_into_parent() {
        let memoizer = build_memoizer();

        let mut outer = NbtCompound::new();
        outer.put("a", NbtElement::Int, false).unwrap();
        let mut inner = NbtCompound::new();
        inner.put("b", NbtElement::String, false).unwrap();
        outer.push_flattened(NbtElement::Compound(inner));

        let result = flatten(NbtElement::Compound(outer), &memoizer).unwrap();
        let NbtElement::Compound(result) = result else { panic!("expected compound") };
        assert_eq!(result.entries().get("a"), Some(&CompoundEntry::new(NbtElement::Int, false)));
        assert_eq!(result.entries().get("b"), Some(&CompoundEntry::new(NbtElement::String, false)));
        assert!(result.flattened().is_empty());
    }

    #[test]
    fn boxed_flattened_member_is_kept_untouched() {
        let memoizer = build_memoizer();
        let mut outer = NbtCompound::new();
        outer.push_flattened(NbtElement::Boxed("Self_save".into()));

        let result = flatten(NbtElement::Compound(outer), &memoizer).unwrap();
        let NbtElement::Compound(result) = result else { panic!("expected compound") };
        assert_eq!(result.flattened(), &[NbtElement::Boxed("Self_save".into())]);
    }
}
