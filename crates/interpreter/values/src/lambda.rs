use nbtschema_classfile::MethodPointer;

use crate::value::Value;

/// A functional-interface instance produced by `invokedynamic` against the standard lambda
/// metafactory. Remembers enough to be called through the memoizer later: which interface
/// method it realizes (`functional_method`, the call site's declared type — e.g.
/// `Consumer.accept`), the synthetic static method that actually holds the lambda body
/// (`backing_method`), and the values bound into it (captured arguments from the enclosing
/// frame, followed by placeholder values for the lambda's own declared parameters).
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaValue {
    pub functional_method: MethodPointer,
    pub backing_method: MethodPointer,
    pub bound_args: Vec<Value>,
}

impl LambdaValue {
    pub fn new(functional_method: MethodPointer, backing_method: MethodPointer, bound_args: Vec<Value>) -> Self {
        Self { functional_method, backing_method, bound_args }
    }
}
