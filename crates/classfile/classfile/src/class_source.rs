use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Resolves an internal class name (`a/b/C` form) to the raw bytes of its class file. The
/// `ClassNotFound` case is represented by `Ok(None)` rather than an error variant: per 4.9 and
/// §5, a missing class is not fatal, and the caller (the class loader, one layer up in
/// `nbtschema-runtime`) decides what non-fatal handling looks like.
pub trait ClassSource {
    fn load(&self, internal_name: &str) -> std::io::Result<Option<Vec<u8>>>;
}

/// A `ClassSource` backed by a directory of `.class` files laid out by internal name, i.e.
/// `a/b/C` resolves to `<root>/a/b/C.class`. This is the source the driver builds over a class
/// archive's extracted contents.
pub struct DirectoryClassSource {
    root: PathBuf,
}

impl DirectoryClassSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ClassSource for DirectoryClassSource {
    fn load(&self, internal_name: &str) -> std::io::Result<Option<Vec<u8>>> {
        let path: PathBuf = Path::new(&self.root).join(format!("{internal_name}.class"));
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// A `ClassSource` backed by an in-memory map, used in tests and for callers that have already
/// extracted a class archive into memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryClassSource {
    classes: HashMap<String, Vec<u8>>,
}

impl InMemoryClassSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, internal_name: impl Into<String>, bytes: Vec<u8>) {
        self.classes.insert(internal_name.into(), bytes);
    }
}

impl ClassSource for InMemoryClassSource {
    fn load(&self, internal_name: &str) -> std::io::Result<Option<Vec<u8>>> {
        Ok(self.classes.get(internal_name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_source_returns_none_for_missing_class() {
        let source = InMemoryClassSource::new();
        assert_eq!(source.load("a/b/C").unwrap(), None);
    }

    #[test]
    fn in_memory_source_round_trips_inserted_bytes() {
        let mut source = InMemoryClassSource::new();
        source.insert("a/b/C", vec![0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(source.load("a/b/C").unwrap(), Some(vec![0xCA, 0xFE, 0xBA, 0xBE]));
    }
}
