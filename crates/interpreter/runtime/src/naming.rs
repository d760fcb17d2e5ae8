use nbtschema_algebra::{CompoundEntry, NamingRegistry, NbtCompound, NbtElement};

/// The `nameCompounds` post-processing pass (4.7). Runs after `flatten`, so every compound it
/// sees already has its mergeable sub-compounds folded in; what's left in `flattened` is either
/// empty or exclusively recursion-critical members.
///
/// Descends depth-first so a compound's own fields, unknown-keys channel, and flattened members
/// are already rewritten to `Named`/`AnyCompound`/etc. by the time this compound itself is
/// collapsed or registered — which is exactly what makes the registry's structural-equality
/// dedup (`NamingRegistry::register`) meaningful across two unrelated call sites that happen to
/// produce the same shape.
pub fn name_compounds(element: NbtElement, registry: &mut NamingRegistry) -> NbtElement {
    match element {
        NbtElement::Compound(compound) => name_compound(compound, registry),
        NbtElement::List(inner) => NbtElement::List(Box::new(name_compounds(*inner, registry))),
        NbtElement::Either(left, right) => {
            NbtElement::Either(Box::new(name_compounds(*left, registry)), Box::new(name_compounds(*right, registry)))
        }
        NbtElement::AnyCompound(value_type) => NbtElement::AnyCompound(Box::new(name_compounds(*value_type, registry))),
        other => other,
    }
}

fn name_compound(mut compound: NbtCompound, registry: &mut NamingRegistry) -> NbtElement {
    let entries: Vec<(String, CompoundEntry)> = compound.entries().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    for (key, entry) in entries {
        let named_value = name_compounds(entry.value, registry);
        compound.entries_mut().insert(key, CompoundEntry::new(named_value, entry.optional));
    }

    if let Some(unknown) = compound.unknown_keys().cloned() {
        compound.set_unknown_keys(Some(name_compounds(unknown, registry)));
    }

    let named_flattened: Vec<NbtElement> = compound
        .flattened()
        .iter()
        .cloned()
        .map(|member| match member {
            NbtElement::Compound(sub) => name_compound(sub, registry),
            other => other,
        })
        .collect();
    *compound.flattened_mut() = named_flattened;

    if compound.entries().is_empty() && compound.unknown_keys().is_none() {
        if let [only] = compound.flattened() {
            return only.clone();
        }
    }
    if compound.entries().is_empty() && compound.flattened().is_empty() {
        let value_type = compound.unknown_keys().cloned().unwrap_or(NbtElement::Any);
        return NbtElement::AnyCompound(Box::new(value_type));
    }

    let base_name =
        compound.name().map(|seed| seed.disambiguated_name()).unwrap_or_else(|| format!("Compound{}", registry.len()));
    let name = registry.register(base_name, compound);
    NbtElement::Named(name)
}

#[cfg(test)]
mod tests {
    use nbtschema_algebra::CompoundNameSeed;

    use super::*;

    #[test]
    fn empty_unnamed_compound_collapses_to_anycompound_any() {
        let compound = NbtCompound::new();
        let mut registry = NamingRegistry::new();
        let result = name_compound(compound, &mut registry);
        assert_eq!(result, NbtElement::AnyCompound(Box::new(NbtElement::Any)));
        assert!(registry.is_empty());
    }

    #[test]
    fn single_flattened_member_with_no_own_fields_is_replaced_by_it() {
        let mut compound = NbtCompound::new();
        let mut inner = NbtCompound::with_name(CompoundNameSeed::new("a/B", "save", ""));
        inner.put("x", NbtElement::Int, false).unwrap();
        compound.push_flattened(NbtElement::Compound(inner));

        let mut registry = NamingRegistry::new();
        let result = name_compound(compound, &mut registry);
        assert_eq!(result, NbtElement::Named("B_save".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn structurally_identical_compounds_share_one_registry_entry() {
        let mut a = NbtCompound::with_name(CompoundNameSeed::new("a/A", "save", ""));
        a.put("x", NbtElement::Int, false).unwrap();
        let mut b = NbtCompound::with_name(CompoundNameSeed::new("a/B", "save", ""));
        b.put("x", NbtElement::Int, false).unwrap();

        let mut registry = NamingRegistry::new();
        let named_a = name_compound(a, &mut registry);
        let named_b = name_compound(b, &mut registry);
        assert_eq!(named_a, named_b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_shapes_sharing_a_base_name_get_disambiguated() {
        let mut a = NbtCompound::with_name(CompoundNameSeed::new("a/A", "save", ""));
        a.put("x", NbtElement::Int, false).unwrap();
        let mut b = NbtCompound::with_name(CompoundNameSeed::new("a/A", "save", ""));
        b.put("y", NbtElement::String, false).unwrap();

        let mut registry = NamingRegistry::new();
        let named_a = name_compound(a, &mut registry);
        let named_b = name_compound(b, &mut registry);
        assert_ne!(named_a, named_b);
        assert_eq!(registry.len(), 2);
    }
}
