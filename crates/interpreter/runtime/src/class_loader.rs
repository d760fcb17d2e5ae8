use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use nbtschema_classfile::{ClassFile, ClassSource};

use crate::error::InterpreterError;

/// Resolves and caches `ClassFile`s over a `ClassSource`. Each class is parsed once and
/// retained for the lifetime of the loader (5. Resources). A class with no bytes is represented
/// as `Ok(None)`, the non-fatal `ClassNotFound` case; bytes that fail to parse are a distinct,
/// fatal failure (the class *is* present but malformed).
pub struct ClassLoader {
    source: Box<dyn ClassSource>,
    cache: RefCell<HashMap<String, Rc<ClassFile>>>,
}

impl ClassLoader {
    pub fn new(source: Box<dyn ClassSource>) -> Self {
        Self { source, cache: RefCell::new(HashMap::new()) }
    }

    pub fn load(&self, internal_name: &str) -> Result<Option<Rc<ClassFile>>, InterpreterError> {
        if let Some(cached) = self.cache.borrow().get(internal_name) {
            return Ok(Some(Rc::clone(cached)));
        }

        let bytes = match self.source.load(internal_name) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(None),
            Err(io_err) => {
                log::warn!("I/O error loading class {internal_name}: {io_err}");
                return Ok(None);
            }
        };

        let class_file = ClassFile::parse(&bytes).map_err(|source| InterpreterError::ClassFile {
            class: internal_name.to_owned(),
            source,
        })?;

        let class_file = Rc::new(class_file);
        self.cache.borrow_mut().insert(internal_name.to_owned(), Rc::clone(&class_file));
        Ok(Some(class_file))
    }
}
