//! The schema algebra: a small sum-type lattice describing the shape of an NBT payload,
//! independent of any bytecode or interpreter concern.
//!
//! [`NbtElement`] is the tagged union at the center of this crate; [`NbtCompound`] is its
//! keyed-map variant, carrying entries, an optional unknown-keys channel, and a list of
//! sub-compounds to be flattened into it by a later pass. [`merge`](element::merge) and
//! [`encompass`](element::encompass) are the two binary operations a caller folds schemas
//! with; see their docs for the lattice rules.

mod element;
mod compound;
mod method_call;
mod error;
mod json;

pub use self::element::{NbtElement, encompass, merge, MergeStrategy};
pub use self::compound::{NbtCompound, CompoundEntry};
pub use self::method_call::{CompoundNameSeed, NamingRegistry};
pub use self::error::SchemaError;
