//! The symbolic value domain the Method Runner's frame cells hold: plain placeholders for
//! values this interpreter attaches no meaning to, plus the handful of enriched variants needed
//! to trace literal strings, lambda call-throughs, and accumulating NBT schema through bytecode.

mod lambda;
mod typed_tag;
mod value;
mod width;

pub use self::lambda::LambdaValue;
pub use self::typed_tag::TypedTag;
pub use self::value::Value;
pub use self::width::{for_locals_or_stack, FrameWidth};
