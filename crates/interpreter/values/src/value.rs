use std::cell::RefCell;
use std::rc::Rc;

use crate::lambda::LambdaValue;
use crate::typed_tag::TypedTag;

/// Backing storage for a `String[]`'s concretely-known slots, shared by reference the way a
/// real array reference is: `dup`-ing a stack slot and writing through one copy must be visible
/// through the other, which a plain owned `Vec` can't express.
pub type StringSlots = Rc<RefCell<Vec<Option<String>>>>;

/// A single frame cell's bytecode value, as tracked by the symbolic interpreter. Most cells
/// carry no useful enrichment and stay `Unknown`; the enriched variants exist only to support
/// the specific tracing behaviors 4.5 depends on (literal strings through array writes, lambda
/// call-throughs, NBT schema accumulation).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A plain descriptor this interpreter attaches no special meaning to — most primitives and
    /// references fall here.
    Unknown,
    StringWithValue(String),
    IntWithValue(i32),
    /// A `String[]` where some slots are concretely known; `None` marks a slot whose value is
    /// unknown or was written with a non-literal.
    StringArrayWithValues(StringSlots),
    /// A `String` read from a `StringArrayWithValues` at a non-constant index: one-of the
    /// array's known slots.
    StringFromArray(StringSlots),
    Lambda(LambdaValue),
    Typed(TypedTag),
}

impl Value {
    pub fn int(v: i32) -> Self {
        Value::IntWithValue(v)
    }

    pub fn string(v: impl Into<String>) -> Self {
        Value::StringWithValue(v.into())
    }

    pub fn new_string_array(len: usize) -> Self {
        Value::StringArrayWithValues(Rc::new(RefCell::new(vec![None; len])))
    }

    pub fn as_typed(&self) -> Option<&TypedTag> {
        match self {
            Value::Typed(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn as_typed_mut(&mut self) -> Option<&mut TypedTag> {
        match self {
            Value::Typed(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn as_known_int(&self) -> Option<i32> {
        match self {
            Value::IntWithValue(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_known_string(&self) -> Option<&str> {
        match self {
            Value::StringWithValue(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_string_array_slots(&self) -> Option<&StringSlots> {
        match self {
            Value::StringArrayWithValues(slots) => Some(slots),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_known_int_matches_only_int_with_value() {
        assert_eq!(Value::int(3).as_known_int(), Some(3));
        assert_eq!(Value::Unknown.as_known_int(), None);
    }
}
