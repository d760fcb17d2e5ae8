//! Orchestrates [`nbtschema_runtime::analyze_into`] over a whole entity list (4.9): reads the
//! input JSON, resolves one entry-point [`MethodPointer`] per entity via a method name and
//! descriptor supplied by the caller (the "naming convention" of 4.9, e.g. `writeNbt` and
//! `(Lnet/minecraft/nbt/NbtCompound;)V`), and serializes the accumulated result to the JSON
//! document of section 6.
//!
//! A fresh [`ClassLoader`] is built per entity rather than shared across the whole run: each
//! entity's analysis is an independent top-level call with its own recursion and statics state,
//! and `ClassLoader` caches are cheap to rebuild against a `ClassSource` that is itself
//! stateless (a directory of `.class` files). What *is* shared across entities is the
//! [`NamingRegistry`], so two entities whose save methods bottom out in the same inherited
//! superclass method dedupe to a single `compoundTypes` entry instead of one per entity.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use nbtschema_algebra::{NamingRegistry, NbtElement};
use nbtschema_classfile::{ClassSource, MethodPointer};
use nbtschema_runtime::{ClassLoader, InterpreterError};

/// One entity of the input entity list: a stable id, the JVM internal name of its class, and
/// whether it's gated behind an experimental feature flag.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityRecord {
    pub id: String,
    pub class: String,
    #[serde(default)]
    pub experimental: bool,
}

/// The driver's input (6): the entity list plus a class-to-parent map used to populate each
/// distinct class's `parent` field in the output `types` array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityListDocument {
    pub entities: Vec<EntityRecord>,
    #[serde(default)]
    pub parents: IndexMap<String, Option<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputEntity {
    pub id: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(skip_serializing_if = "is_false")]
    pub experimental: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputType {
    pub name: String,
    pub parent: Option<String>,
    pub nbt: NbtElement,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputCompoundEntry {
    pub value: NbtElement,
    pub optional: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputCompoundType {
    pub name: String,
    pub entries: IndexMap<String, OutputCompoundEntry>,
    #[serde(rename = "unknownKeys")]
    pub unknown_keys: Option<NbtElement>,
    pub flattened: Vec<NbtElement>,
}

/// The aggregate output document (6), ready to serialize with `serde_json`.
#[derive(Debug, Clone, Serialize)]
pub struct OutputDocument {
    pub entities: Vec<OutputEntity>,
    pub types: Vec<OutputType>,
    #[serde(rename = "compoundTypes")]
    pub compound_types: Vec<OutputCompoundType>,
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("analyzing {pointer}: {source}")]
    Interpreter {
        pointer: MethodPointer,
        #[source]
        source: InterpreterError,
    },
}

/// Runs the whole entity list through the interpreter and builds the output document.
///
/// `class_source` is called once per entity to build that entity's `ClassLoader`; pass
/// `|| Box::new(DirectoryClassSource::new(&root))` for the real CLI and an
/// `InMemoryClassSource`-backed closure in tests. An entity whose class has no resolvable bytes
/// at all is logged as a warning and skipped entirely, per 4.9 and section 7; any other
/// interpreter error aborts the whole run.
pub fn run(
    entity_list: &EntityListDocument,
    entry_method: &str,
    entry_descriptor: &str,
    mut class_source: impl FnMut() -> Box<dyn ClassSource>,
) -> Result<OutputDocument, DriverError> {
    let mut registry = NamingRegistry::new();
    let mut entities = Vec::with_capacity(entity_list.entities.len());
    // Keyed so that entities sharing a class only analyze it once.
    let mut types: BTreeMap<String, OutputType> = BTreeMap::new();

    for entity in &entity_list.entities {
        let loader = ClassLoader::new(class_source());
        let pointer = MethodPointer::new(entity.class.clone(), entry_method, entry_descriptor);

        match loader.load(&entity.class) {
            Ok(None) => {
                log::warn!("entity {} (class {}): class not found, skipping", entity.id, entity.class);
                continue;
            }
            Ok(Some(_)) => {}
            Err(err) => return Err(DriverError::Interpreter { pointer, source: err }),
        }

        entities.push(OutputEntity { id: entity.id.clone(), ty: entity.class.clone(), experimental: entity.experimental });

        if !types.contains_key(&entity.class) {
            let root = nbtschema_runtime::analyze_into(loader, pointer.clone(), &mut registry)
                .map_err(|source| DriverError::Interpreter { pointer, source })?;
            let parent = entity_list.parents.get(&entity.class).cloned().flatten();
            types.insert(entity.class.clone(), OutputType { name: entity.class.clone(), parent, nbt: root });
        }
    }

    entities.sort_by(|a, b| a.id.cmp(&b.id));

    let mut types: Vec<OutputType> = types.into_values().collect();
    types.sort_by(|a, b| a.name.cmp(&b.name));

    let compound_types = registry
        .into_sorted_vec()
        .into_iter()
        .map(|(name, compound)| OutputCompoundType {
            name,
            entries: compound
                .entries()
                .iter()
                .map(|(key, entry)| (key.clone(), OutputCompoundEntry { value: entry.value.clone(), optional: entry.optional }))
                .collect(),
            unknown_keys: compound.unknown_keys().cloned(),
            flattened: compound.flattened().to_vec(),
        })
        .collect();

    Ok(OutputDocument { entities, types, compound_types })
}

#[cfg(test)]
mod tests {
    use nbtschema_classfile::InMemoryClassSource;

    use super::*;

    /// `class Test { void m(NbtCompound c) { c.putInt("a", 1); return; } }`, the same fixture
    /// shape as `nbtschema-runtime`'s own integration test.
    fn class_with_put_int() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0xCAFE_BABE_u32.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&61u16.to_be_bytes());

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
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&0x0001u16.to_be_bytes());
        bytes.extend_from_slice(&5u16.to_be_bytes());
        bytes.extend_from_slice(&6u16.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&7u16.to_be_bytes());

        let code: Vec<u8> = vec![0x2B, 0x12, 15, 0x04, 0xB6, 0x00, 13, 0x57, 0xB1];

        let code_attr_len_pos = bytes.len();
        bytes.extend_from_slice(&0u32.to_be_bytes());
        let code_body_start = bytes.len();
        bytes.extend_from_slice(&3u16.to_be_bytes());
        bytes.extend_from_slice(&2u16.to_be_bytes());
        bytes.extend_from_slice(&(code.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&code);
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        let code_attr_len = (bytes.len() - code_body_start) as u32;
        bytes[code_attr_len_pos..code_attr_len_pos + 4].copy_from_slice(&code_attr_len.to_be_bytes());

        bytes.extend_from_slice(&0u16.to_be_bytes());
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

    fn source_with_test_class() -> InMemoryClassSource {
        let mut source = InMemoryClassSource::new();
        source.insert("Test", class_with_put_int());
        source
    }

    #[test]
    fn single_entity_produces_one_type_and_one_compound() {
        let entity_list = EntityListDocument {
            entities: vec![EntityRecord { id: "minecraft:test".into(), class: "Test".into(), experimental: false }],
            parents: IndexMap::new(),
        };

        let doc = run(&entity_list, "m", "(Lnet/minecraft/nbt/NbtCompound;)V", || Box::new(source_with_test_class())).unwrap();

        assert_eq!(doc.entities.len(), 1);
        assert_eq!(doc.entities[0].id, "minecraft:test");
        assert_eq!(doc.types.len(), 1);
        assert_eq!(doc.types[0].name, "Test");
        assert!(doc.types[0].parent.is_none());
        assert_eq!(doc.compound_types.len(), 1);
        assert_eq!(doc.compound_types[0].entries.get("a").map(|e| &e.value), Some(&NbtElement::Int));
    }

    #[test]
    fn two_entities_sharing_a_class_dedupe_to_one_compound_type() {
        let entity_list = EntityListDocument {
            entities: vec![
                EntityRecord { id: "minecraft:b".into(), class: "Test".into(), experimental: false },
                EntityRecord { id: "minecraft:a".into(), class: "Test".into(), experimental: true },
            ],
            parents: IndexMap::new(),
        };

        let doc = run(&entity_list, "m", "(Lnet/minecraft/nbt/NbtCompound;)V", || Box::new(source_with_test_class())).unwrap();

        // entities sorted ascending by id
        assert_eq!(doc.entities.len(), 2);
        assert_eq!(doc.entities[0].id, "minecraft:a");
        assert_eq!(doc.entities[1].id, "minecraft:b");
        assert!(doc.entities[0].experimental);
        assert!(!doc.entities[1].experimental);

        // the shared class is only analyzed (and named) once
        assert_eq!(doc.types.len(), 1);
        assert_eq!(doc.compound_types.len(), 1);
    }

    #[test]
    fn entity_with_missing_class_is_skipped_not_fatal() {
        let entity_list = EntityListDocument {
            entities: vec![EntityRecord { id: "minecraft:ghost".into(), class: "DoesNotExist".into(), experimental: false }],
            parents: IndexMap::new(),
        };

        let doc = run(&entity_list, "m", "(Lnet/minecraft/nbt/NbtCompound;)V", || Box::new(InMemoryClassSource::new())).unwrap();

        assert!(doc.entities.is_empty());
        assert!(doc.types.is_empty());
        assert!(doc.compound_types.is_empty());
    }

    #[test]
    fn output_document_round_trips_through_json() {
        let entity_list = EntityListDocument {
            entities: vec![EntityRecord { id: "minecraft:test".into(), class: "Test".into(), experimental: false }],
            parents: IndexMap::from_iter([("Test".to_owned(), Some("Entity".to_owned()))]),
        };

        let doc = run(&entity_list, "m", "(Lnet/minecraft/nbt/NbtCompound;)V", || Box::new(source_with_test_class())).unwrap();
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["types"][0]["parent"], "Entity");
        assert_eq!(json["compoundTypes"][0]["entries"]["a"]["value"]["type"], "Int");
        assert_eq!(json["compoundTypes"][0]["entries"]["a"]["optional"], false);
    }
}
