//! Target-framework class/method identities the runner special-cases directly rather than
//! resolving structurally (4.5/4.6). Everything else goes through generic `invoke`.

/// The NBT library's compound type. Historical mapping namespaces have renamed this class more
/// than once; this is the name current at the version this crate targets.
pub const NBT_COMPOUND_CLASS: &str = "net/minecraft/nbt/NbtCompound";
pub const NBT_LIST_CLASS: &str = "net/minecraft/nbt/NbtList";
pub const NBT_ELEMENT_CLASS: &str = "net/minecraft/nbt/NbtElement";

pub const OPTIONAL_CLASS: &str = "java/util/Optional";
pub const OPTIONAL_IF_PRESENT: &str = "ifPresent";

/// A primitive-keyed map (`Int2ObjectMap` and friends) whose `forEach` takes a lambda the same
/// way `Optional::ifPresent` does; both are treated identically by the runner.
pub const PRIMITIVE_MAP_FOR_EACH: &str = "forEach";

pub const EITHER_CLASS: &str = "com/mojang/datafixers/util/Either";
pub const EITHER_MAP: &str = "map";

/// The root of the entity class hierarchy, and the two pinned methods the generic `invoke` path
/// is forbidden from resolving on its own (4.6).
pub const ENTITY_CLASS: &str = "net/minecraft/entity/Entity";
pub const SAVE_AS_PASSENGER: &str = "saveAsPassenger";
pub const SAVE_WITHOUT_ID: &str = "saveWithoutId";

/// The historical sign block entity, whose text-row setter loops over four fixed rows in a
/// shape this interpreter can't trace through; 4.5 calls this out as a deliberate kludge.
pub const SIGN_BLOCK_ENTITY_CLASS: &str = "net/minecraft/block/entity/SignBlockEntity";
pub const SIGN_TEXT_ROW_SETTER: &str = "setTextOnRow";
pub const SIGN_TEXT_KEYS: [&str; 4] = ["Text1", "Text2", "Text3", "Text4"];

/// Compound-mutating method names that record a known primitive leaf kind, keyed by method
/// name. `put` itself isn't listed here: its kind comes from the value being put, not its name.
pub fn compound_put_leaf(method_name: &str) -> Option<nbtschema_algebra::NbtElement> {
    use nbtschema_algebra::NbtElement;
    match method_name {
        "putByte" => Some(NbtElement::Byte),
        "putShort" => Some(NbtElement::Short),
        "putInt" => Some(NbtElement::Int),
        "putLong" => Some(NbtElement::Long),
        "putFloat" => Some(NbtElement::Float),
        "putDouble" => Some(NbtElement::Double),
        "putString" => Some(NbtElement::String),
        "putByteArray" => Some(NbtElement::ByteArray),
        "putIntArray" => Some(NbtElement::IntArray),
        "putLongArray" => Some(NbtElement::LongArray),
        "putUuid" | "putUUID" => Some(NbtElement::Uuid),
        "putBoolean" => Some(NbtElement::Boolean),
        _ => None,
    }
}

pub const COMPOUND_PUT: &str = "put";

/// The fresh schema a reference of `class` seeds a `TypedTag` with the first time the runner
/// sees it (via `GETFIELD`, `NEW`, or an argument seed) — `None` for anything that isn't one of
/// the three NBT reference types.
pub fn default_nbt_shape(class: &str) -> Option<nbtschema_algebra::NbtElement> {
    use nbtschema_algebra::{NbtCompound, NbtElement};
    match class {
        c if c == NBT_COMPOUND_CLASS => Some(NbtElement::Compound(NbtCompound::new())),
        c if c == NBT_LIST_CLASS => Some(NbtElement::List(Box::new(NbtElement::Any))),
        c if c == NBT_ELEMENT_CLASS => Some(NbtElement::Any),
        _ => None,
    }
}

/// List-append method names: all of these merge the pushed value's kind into `list.inner`.
/// Several are historical aliases carried for cross-version compatibility rather than anything
/// a single class file would ever emit more than one of.
pub const LIST_ADD_METHODS: &[&str] = &["add", "addTag", "addFirst", "addLast", "set", "setTag"];
pub const LIST_ADD_ALL: &str = "addAll";

/// `getX` accessor prefixes on the list type: each pushes a synthetic typed value of the
/// inferred element kind rather than recording a write.
pub const LIST_GET_PREFIXES: &[&str] = &["get", "peek"];
