use nbtschema_algebra::CompoundNameSeed;
use nbtschema_classfile::MethodPointer;
use nbtschema_values::Value;

/// An erased argument shape: enough of a value's identity to distinguish two call sites that
/// should be analyzed separately (a literal string vs. an unknown one; an `int`-tracked array
/// size vs. not), with all attached NBT schema content collapsed to a single `Nbt` marker. Two
/// calls with the same pointer and erased args are the same `MethodCall`, regardless of what
/// schema either call happened to accumulate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErasedArg {
    Plain,
    String(String),
    Int(i32),
    StringArray(Vec<Option<String>>),
    Nbt,
}

pub fn erase(value: &Value) -> ErasedArg {
    match value {
        Value::Unknown => ErasedArg::Plain,
        Value::StringWithValue(s) => ErasedArg::String(s.clone()),
        Value::IntWithValue(v) => ErasedArg::Int(*v),
        Value::StringArrayWithValues(slots) | Value::StringFromArray(slots) => ErasedArg::StringArray(slots.borrow().clone()),
        Value::Lambda(_) => ErasedArg::Plain,
        Value::Typed(_) => ErasedArg::Nbt,
    }
}

/// `MethodPointer` plus erased argument schemas plus the branch-scope override flag: the
/// memoizer's cache key and call-stack identity, per 3.3.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodCall {
    pub pointer: MethodPointer,
    pub erased_args: Vec<ErasedArg>,
    pub override_optional: bool,
}

impl MethodCall {
    pub fn new(pointer: MethodPointer, args: &[Value], override_optional: bool) -> Self {
        Self { pointer, erased_args: args.iter().map(erase).collect(), override_optional }
    }

    /// A short, stable digest of the erased argument shapes, used only to disambiguate the
    /// naming seed when two calls share a method pointer but not an argument shape.
    fn arg_digest(&self) -> String {
        if self.erased_args.is_empty() && !self.override_optional {
            return String::new();
        }
        let mut digest = String::new();
        for arg in &self.erased_args {
            match arg {
                ErasedArg::Plain => digest.push('_'),
                ErasedArg::String(s) => digest.push_str(&format!("s:{s}")),
                ErasedArg::Int(v) => digest.push_str(&format!("i:{v}")),
                ErasedArg::StringArray(_) => digest.push('a'),
                ErasedArg::Nbt => digest.push('n'),
            }
            digest.push(',');
        }
        if self.override_optional {
            digest.push_str("ovr");
        }
        digest
    }

    pub fn name_seed(&self) -> CompoundNameSeed {
        CompoundNameSeed::new(self.pointer.class.clone(), self.pointer.name.clone(), self.arg_digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_accumulated_nbt_schema() {
        let pointer = MethodPointer::new("a/B", "m", "(Ljava/lang/Object;)V");
        let plain = MethodCall::new(pointer.clone(), &[Value::Unknown], false);
        let also_plain = MethodCall::new(pointer, &[Value::Unknown], false);
        assert_eq!(plain, also_plain);
    }

    #[test]
    fn distinct_literal_string_args_produce_distinct_calls() {
        let pointer = MethodPointer::new("a/B", "m", "(Ljava/lang/String;)V");
        let a = MethodCall::new(pointer.clone(), &[Value::string("x")], false);
        let b = MethodCall::new(pointer, &[Value::string("y")], false);
        assert_ne!(a, b);
    }
}
