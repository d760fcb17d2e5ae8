//! The interpreter proper: the `MethodCall` memoizer and recursion detector, the per-invocation
//! `MethodRunner` (frame, stack-map resync, opcode visitor), and the two post-processing passes
//! that turn a raw written-compound tree into the final named schema (4.3, 4.4, 4.7).
//!
//! [`analyze_from`] is the single entry point a driver needs: given a [`ClassLoader`] and an
//! entry-point [`MethodPointer`], it seeds a call, walks it to completion, and runs `flatten`
//! then `nameCompounds` over whatever NBT schema the call contributed to its arguments.

mod call_result;
mod class_loader;
mod descriptor;
mod error;
mod flatten;
mod frame;
mod memoizer;
mod method_call;
mod naming;
mod runner;
mod well_known;

pub use self::call_result::CallResult;
pub use self::class_loader::ClassLoader;
pub use self::error::InterpreterError;
pub use self::memoizer::Memoizer;
pub use self::method_call::{ErasedArg, MethodCall};
pub use self::well_known::{ENTITY_CLASS, NBT_COMPOUND_CLASS, NBT_LIST_CLASS};

use nbtschema_algebra::{NamingRegistry, NbtElement};
use nbtschema_classfile::MethodPointer;
use nbtschema_values::Value;

/// The outcome of [`analyze_from`]: the entry point's own schema contribution (already rewritten
/// to `Named`/`AnyCompound`/etc. by the naming pass) plus the registry of every named compound
/// reached while naming it. `registry` is what a driver serializes as `compoundTypes` (6).
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub root: NbtElement,
    pub registry: NamingRegistry,
}

/// Analyzes one serialization entry point end to end (2, "Control flow"): seeds a top-level call
/// through the memoizer with one `Value::Unknown` per logical argument (receiver included, for
/// an instance method), lets the memoizer's default-shape seeding turn the declared NBT-typed
/// parameter into a fresh tagged compound, then runs `flatten` and `nameCompounds` over whatever
/// schema that call recorded against its arguments.
///
/// A method with no NBT-typed parameter at all (the entry point was misconfigured, or the class
/// couldn't be resolved) still runs successfully; its contributed schema is simply
/// `NbtElement::Any`, which the naming pass collapses to an empty `AnyCompound`.
///
/// Uses a fresh [`NamingRegistry`] scoped to this one entry point. A driver analyzing many
/// entry points against the same class archive should call [`analyze_into`] instead, sharing a
/// single registry across all of them, so that structurally identical compounds reached from
/// different entry points (a common superclass's save method, for instance) dedupe into one
/// `compoundTypes` entry rather than one per entry point.
pub fn analyze_from(loader: ClassLoader, entry: MethodPointer) -> Result<AnalysisResult, InterpreterError> {
    let mut registry = NamingRegistry::new();
    let root = analyze_into(loader, entry, &mut registry)?;
    Ok(AnalysisResult { root, registry })
}

/// As [`analyze_from`], but names the result into a caller-supplied registry instead of a fresh
/// one, returning only the entry point's own (already-named) schema contribution. The registry
/// accumulates every compound reached while naming it, alongside whatever earlier calls already
/// registered.
pub fn analyze_into(loader: ClassLoader, entry: MethodPointer, registry: &mut NamingRegistry) -> Result<NbtElement, InterpreterError> {
    let memoizer = Memoizer::new(loader);

    let arg_count = entry_arg_count(&memoizer, &entry)?;
    let args = vec![Value::Unknown; arg_count];
    let result = memoizer.call(entry, &args, false, false)?;

    let written = result.args_nbt.into_iter().find_map(|delta| delta).unwrap_or(NbtElement::Any);
    let flattened = flatten::flatten(written, &memoizer)?;

    Ok(naming::name_compounds(flattened, registry))
}

/// The number of logical call-site arguments `analyze_from` must seed: the receiver, if `entry`
/// is an instance method, plus one per declared parameter. A missing class or method falls back
/// to treating `entry` as an instance call (the common case for the save methods this tool
/// targets); the memoizer's own `ClassNotFound` handling takes over from there regardless.
fn entry_arg_count(memoizer: &Memoizer, entry: &MethodPointer) -> Result<usize, InterpreterError> {
    let param_count = descriptor::param_descriptors(&entry.signature).len();
    let is_static = memoizer
        .class_loader()
        .load(&entry.class)?
        .and_then(|class_file| class_file.find_method(&entry.name, &entry.signature).map(|m| m.is_static()))
        .unwrap_or(false);
    Ok(param_count + usize::from(!is_static))
}

#[cfg(test)]
mod tests {
    use nbtschema_classfile::InMemoryClassSource;

    use super::*;

    /// Builds a minimal single-method class file: `class Test { public void m(NbtCompound c) {
    /// c.putInt("a", 1); return; } }`, targeting the well-known compound class directly so the
    /// runner's `INVOKEVIRTUAL` special-casing fires without needing a second class on the path.
    fn class_with_put_int() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0xCAFE_BABE_u32.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&61u16.to_be_bytes());

        // #1 Utf8 "Test", #2 Class #1, #3 Utf8 "java/lang/Object", #4 Class #3,
        // #5 Utf8 "m", #6 Utf8 "(Lnet/minecraft/nbt/NbtCompound;)V", #7 Utf8 "Code",
        // #8 Utf8 "net/minecraft/nbt/NbtCompound", #9 Class #8,
        // #10 Utf8 "putInt", #11 Utf8 "(Ljava/lang/String;I)Lnet/minecraft/nbt/NbtElement;",
        // #12 NameAndType #10 #11, #13 Methodref #9 #12,
        // #14 Utf8 "a", #15 String #14.
        bytes.extend_from_slice(&16u16.to_be_bytes());
        push_utf8(&mut bytes, "Test");
        push_class(&mut bytes, 1);
        push_utf8(&mut bytes, "java/lang/Object");
        push_class(&mut bytes, 3);
        push_utf8(&mut bytes, "m");
        push_utf8(&mut bytes, "(Lnet/minecraft/nbt/NbtCompound;)V");
        push_utf8(&mut bytes, "Code");
        push_utf8(&mut bytes, "net/minecraft/nbt/NbtCompound");
        push_class(&mut bytes, 8);
        push_utf8(&mut bytes, "putInt");
        push_utf8(&mut bytes, "(Ljava/lang/String;I)Lnet/minecraft/nbt/NbtElement;");
        push_name_and_type(&mut bytes, 10, 11);
        push_methodref(&mut bytes, 9, 12);
        push_utf8(&mut bytes, "a");
        push_string(&mut bytes, 14);

        bytes.extend_from_slice(&0x0021u16.to_be_bytes());
        bytes.extend_from_slice(&2u16.to_be_bytes());
        bytes.extend_from_slice(&4u16.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes()); // interfaces
        bytes.extend_from_slice(&0u16.to_be_bytes()); // fields
        bytes.extend_from_slice(&1u16.to_be_bytes()); // methods
        bytes.extend_from_slice(&0x0001u16.to_be_bytes()); // public, not static (receiver at slot 0)
        bytes.extend_from_slice(&5u16.to_be_bytes());
        bytes.extend_from_slice(&6u16.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes()); // attributes_count
        bytes.extend_from_slice(&7u16.to_be_bytes()); // "Code"

        // aload_1 (push the NbtCompound param), ldc #15 ("a"), iconst_1, invokevirtual #13, pop, return
        let code: Vec<u8> = vec![0x2B, 0x12, 15, 0x04, 0xB6, 0x00, 13, 0x57, 0xB1];

        let code_attr_len_pos = bytes.len();
        bytes.extend_from_slice(&0u32.to_be_bytes());
        let code_body_start = bytes.len();
        bytes.extend_from_slice(&3u16.to_be_bytes()); // max_stack
        bytes.extend_from_slice(&2u16.to_be_bytes()); // max_locals
        bytes.extend_from_slice(&(code.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&code);
        bytes.extend_from_slice(&0u16.to_be_bytes()); // exception_table_length
        bytes.extend_from_slice(&0u16.to_be_bytes()); // attributes_count
        let code_attr_len = (bytes.len() - code_body_start) as u32;
        bytes[code_attr_len_pos..code_attr_len_pos + 4].copy_from_slice(&code_attr_len.to_be_bytes());

        bytes.extend_from_slice(&0u16.to_be_bytes()); // class attributes_count
        bytes
    }

    fn push_utf8(bytes: &mut Vec<u8>, s: &str) {
        bytes.push(1);
        bytes.extend_from_slice(&(s.len() as u16).to_be_bytes());
        bytes.extend_from_slice(s.as_bytes());
    }

    fn push_class(bytes: &mut Vec<u8>, name_index: u16) {
        bytes.push(7);
        bytes.extend_from_slice(&name_index.to_be_bytes());
    }

    fn push_name_and_type(bytes: &mut Vec<u8>, name_index: u16, descriptor_index: u16) {
        bytes.push(12);
        bytes.extend_from_slice(&name_index.to_be_bytes());
        bytes.extend_from_slice(&descriptor_index.to_be_bytes());
    }

    fn push_methodref(bytes: &mut Vec<u8>, class_index: u16, name_and_type_index: u16) {
        bytes.push(10);
        bytes.extend_from_slice(&class_index.to_be_bytes());
        bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
    }

    fn push_string(bytes: &mut Vec<u8>, utf8_index: u16) {
        bytes.push(8);
        bytes.extend_from_slice(&utf8_index.to_be_bytes());
    }

    #[test]
    fn analyze_from_records_a_direct_put_int() {
        let mut source = InMemoryClassSource::new();
        source.insert("Test", class_with_put_int());
        let loader = ClassLoader::new(Box::new(source));
        let entry = MethodPointer::new("Test", "m", "(Lnet/minecraft/nbt/NbtCompound;)V");

        let result = analyze_from(loader, entry).unwrap();
        let NbtElement::Named(name) = &result.root else { panic!("expected a named compound, got {:?}", result.root) };
        let registered = result.registry.get(name).unwrap();
        assert_eq!(registered.entries().get("a").map(|e| &e.value), Some(&NbtElement::Int));
        assert!(!registered.entries().get("a").unwrap().optional);
    }

    #[test]
    fn analyze_from_on_entry_with_no_nbt_parameter_yields_empty_anycompound() {
        let mut source = InMemoryClassSource::new();
        source.insert("Test", class_with_put_int());
        let loader = ClassLoader::new(Box::new(source));
        // Deliberately the wrong descriptor, so the memoizer finds no matching method at all.
        let entry = MethodPointer::new("Test", "m", "()V");

        let result = analyze_from(loader, entry).unwrap();
        assert_eq!(result.root, NbtElement::AnyCompound(Box::new(NbtElement::Any)));
        assert!(result.registry.is_empty());
    }
}
