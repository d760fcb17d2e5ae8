use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt as _};

use crate::error::ClassFileError;

/// A cursor over a class file's bytes. The JVM class file format is always big-endian,
/// unlike the target NBT format's configurable endianness, so there's no equivalent of this
/// codebase's `IoOptions` to thread through here.
pub struct ClassReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ClassReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { cursor: Cursor::new(bytes) }
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn read_u8(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.cursor.read_u8()?)
    }

    pub fn read_i8(&mut self) -> Result<i8, ClassFileError> {
        Ok(self.cursor.read_i8()?)
    }

    pub fn read_u16(&mut self) -> Result<u16, ClassFileError> {
        Ok(self.cursor.read_u16::<BigEndian>()?)
    }

    pub fn read_i16(&mut self) -> Result<i16, ClassFileError> {
        Ok(self.cursor.read_i16::<BigEndian>()?)
    }

    pub fn read_u32(&mut self) -> Result<u32, ClassFileError> {
        Ok(self.cursor.read_u32::<BigEndian>()?)
    }

    pub fn read_i32(&mut self) -> Result<i32, ClassFileError> {
        Ok(self.cursor.read_i32::<BigEndian>()?)
    }

    pub fn read_i64(&mut self) -> Result<i64, ClassFileError> {
        Ok(self.cursor.read_i64::<BigEndian>()?)
    }

    pub fn read_f32(&mut self) -> Result<f32, ClassFileError> {
        Ok(self.cursor.read_f32::<BigEndian>()?)
    }

    pub fn read_f64(&mut self) -> Result<f64, ClassFileError> {
        Ok(self.cursor.read_f64::<BigEndian>()?)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, ClassFileError> {
        let mut buf = vec![0_u8; len];
        self.cursor.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn skip(&mut self, len: u32) -> Result<(), ClassFileError> {
        self.read_bytes(len as usize)?;
        Ok(())
    }

    pub fn read_modified_utf8(&mut self) -> Result<String, ClassFileError> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        // Class file Utf8 constants use a "modified UTF-8" that agrees with plain UTF-8 for
        // every codepoint this crate's interpreter actually needs to read (class/method/field
        // names and descriptors, string literals used as NBT keys). Surrogate-pair and embedded
        // NUL edge cases are out of scope, matching the spec's non-goal of full generality.
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
