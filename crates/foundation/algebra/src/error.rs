use thiserror::Error;

/// Errors raised by the schema algebra itself. Both variants are fatal per the design's error
/// model (7) — the caller is expected to identify the offending class/method/pc and abort.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("cannot merge incompatible schemas: {left} vs {right}")]
    IncompatibleMerge {
        left:  String,
        right: String,
    },

    #[error("schema invariant broken: {0}")]
    InvariantBroken(String),
}

impl SchemaError {
    pub fn incompatible_merge(left: impl std::fmt::Debug, right: impl std::fmt::Debug) -> Self {
        Self::IncompatibleMerge {
            left:  format!("{left:?}"),
            right: format!("{right:?}"),
        }
    }

    pub fn invariant_broken(message: impl Into<String>) -> Self {
        Self::InvariantBroken(message.into())
    }
}
