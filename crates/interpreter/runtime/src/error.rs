use nbtschema_classfile::MethodPointer;
use thiserror::Error;

/// Fatal interpretation errors. `ClassNotFound` deliberately isn't a variant here: it's handled
/// as `Ok(None)` by the class loader and a pass-through `CallResult` by the memoizer, per 4.3
/// and 7 — a missing class is not a failure of the interpreter.
#[derive(Error, Debug)]
pub enum InterpreterError {
    #[error("malformed stack map frame in {method} at pc {pc}")]
    MalformedFrame { method: MethodPointer, pc: u32 },

    #[error("virtual dispatch for {method} found no unique target in {receiver_class}")]
    VirtualResolutionFailure { method: MethodPointer, receiver_class: String },

    #[error("unsafe reentry into a pinned recursion point via {method}")]
    UnsafeReentry { method: MethodPointer },

    #[error("incompatible merge while analyzing {method} at pc {pc}: {source}")]
    IncompatibleMerge {
        method: MethodPointer,
        pc: u32,
        #[source]
        source: nbtschema_algebra::SchemaError,
    },

    #[error("invariant broken while analyzing {method} at pc {pc}: {message}")]
    InvariantBroken { method: MethodPointer, pc: u32, message: String },

    #[error("class file error while reading {class}: {source}")]
    ClassFile {
        class: String,
        #[source]
        source: nbtschema_classfile::ClassFileError,
    },

    #[error("schema merge failed during post-processing: {0}")]
    PostProcessing(#[source] nbtschema_algebra::SchemaError),
}
