//! Small JVM method-descriptor helpers the runner and memoizer both need: splitting a
//! descriptor's parameter list into individual type strings, and reading its return type.
//! `nbtschema_classfile::attributes` has a similar walk for seeding locals; this one returns
//! the raw descriptor substrings instead of `VerificationType`, which is what call-site
//! argument classification (4.6) needs.

/// Splits a method descriptor's parameter section into individual type descriptors, e.g.
/// `"(ILjava/lang/String;[I)V"` -> `["I", "Ljava/lang/String;", "[I"]`.
pub fn param_descriptors(descriptor: &str) -> Vec<String> {
    let params = descriptor.strip_prefix('(').and_then(|rest| rest.split(')').next()).unwrap_or("");
    let mut out = Vec::new();
    let mut chars = params.chars().peekable();
    while let Some(c) = chars.next() {
        let mut token = String::new();
        token.push(c);
        match c {
            'L' => {
                for inner in chars.by_ref() {
                    token.push(inner);
                    if inner == ';' {
                        break;
                    }
                }
            }
            '[' => {
                while chars.peek() == Some(&'[') {
                    chars.next();
                    token.push('[');
                }
                match chars.next() {
                    Some('L') => {
                        token.push('L');
                        for inner in chars.by_ref() {
                            token.push(inner);
                            if inner == ';' {
                                break;
                            }
                        }
                    }
                    Some(primitive) => token.push(primitive),
                    None => {}
                }
            }
            _ => {}
        }
        out.push(token);
    }
    out
}

pub fn return_descriptor(descriptor: &str) -> &str {
    descriptor.split(')').nth(1).unwrap_or("V")
}

pub fn is_void_return(descriptor: &str) -> bool {
    return_descriptor(descriptor) == "V"
}

/// Real JVM local-variable slot index of each logical argument (receiver, if any, then each
/// declared parameter in order), accounting for `long`/`double` parameters occupying two slots.
/// Mirrors `nbtschema_classfile::attributes::initial_locals_from_descriptor`'s walk, but returns
/// slot positions rather than verification types — what placing seeded `Value`s into a fresh
/// frame needs.
pub fn arg_slot_indices(is_instance: bool, param_types: &[String]) -> Vec<u16> {
    let mut slots = Vec::with_capacity(param_types.len() + usize::from(is_instance));
    let mut next: u16 = 0;
    if is_instance {
        slots.push(next);
        next += 1;
    }
    for param in param_types {
        slots.push(next);
        next += nbtschema_values::for_locals_or_stack(param).slots() as u16;
    }
    slots
}

/// The internal class name a reference-typed descriptor names, or `None` for primitives and
/// arrays (arrays are never an NBT reference type in this domain).
pub fn class_name(descriptor_token: &str) -> Option<&str> {
    descriptor_token.strip_prefix('L').and_then(|rest| rest.strip_suffix(';'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_mixed_parameter_list() {
        let params = param_descriptors("(ILjava/lang/String;[I[Ljava/lang/Object;)V");
        assert_eq!(params, vec!["I", "Ljava/lang/String;", "[I", "[Ljava/lang/Object;"]);
    }

    #[test]
    fn extracts_class_name_from_object_descriptor() {
        assert_eq!(class_name("Ljava/lang/String;"), Some("java/lang/String"));
        assert_eq!(class_name("I"), None);
    }

    #[test]
    fn slot_indices_account_for_wide_params() {
        let params = param_descriptors("(JLjava/lang/String;D)V");
        assert_eq!(arg_slot_indices(true, &params), vec![0, 1, 3, 4]);
        assert_eq!(arg_slot_indices(false, &params), vec![0, 2, 3]);
    }

    #[test]
    fn reads_return_type() {
        assert_eq!(return_descriptor("(I)Lnet/minecraft/nbt/NbtCompound;"), "Lnet/minecraft/nbt/NbtCompound;");
        assert!(is_void_return("(I)V"));
    }
}
