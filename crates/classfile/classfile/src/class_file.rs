use crate::attributes::{initial_locals_from_descriptor, parse_attributes, BootstrapMethod, CodeAttribute};
use crate::constant_pool::ConstantPool;
use crate::error::ClassFileError;
use crate::instruction::{self, Instruction};
use crate::reader::ClassReader;

const CLASS_MAGIC: u32 = 0xCAFE_BABE;

const ACC_STATIC: u16 = 0x0008;
const ACC_INTERFACE: u16 = 0x0200;
const ACC_ABSTRACT: u16 = 0x0400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    pub access_flags: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub code: Option<CodeAttribute>,
}

impl MethodInfo {
    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & ACC_ABSTRACT != 0
    }

    /// Decodes this method's `Code` bytes into an address-ordered instruction list. Recomputed
    /// on every call rather than cached on `MethodInfo`; the `ClassLoader`'s own cache (owned by
    /// `nbtschema-runtime`) is what amortizes repeated analysis of the same class.
    pub fn decoded_instructions(&self) -> Result<Vec<(u32, Instruction)>, ClassFileError> {
        match &self.code {
            Some(code) => instruction::decode(&code.code),
            None => Ok(Vec::new()),
        }
    }
}

/// A minimal structural model of a JVM class file: just rich enough to drive the interpreter.
/// Attributes other than `Code`, `StackMapTable`, and `BootstrapMethods` are parsed past and
/// discarded, so this is not a general-purpose disassembler.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub bootstrap_methods: Vec<BootstrapMethod>,
    pub constant_pool: ConstantPool,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self, ClassFileError> {
        let mut reader = ClassReader::new(bytes);

        let magic = reader.read_u32()?;
        if magic != CLASS_MAGIC {
            return Err(ClassFileError::BadMagic(magic));
        }
        let _minor_version = reader.read_u16()?;
        let _major_version = reader.read_u16()?;

        let constant_pool = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u16()?;
        let this_class_index = reader.read_u16()?;
        let this_class = constant_pool.class_name(this_class_index)?.to_owned();
        let super_class_index = reader.read_u16()?;
        let super_class = if super_class_index == 0 {
            None
        } else {
            Some(constant_pool.class_name(super_class_index)?.to_owned())
        };

        let interfaces_count = reader.read_u16()?;
        let mut interfaces = Vec::with_capacity(interfaces_count as usize);
        for _ in 0..interfaces_count {
            let index = reader.read_u16()?;
            interfaces.push(constant_pool.class_name(index)?.to_owned());
        }

        let fields_count = reader.read_u16()?;
        let mut fields = Vec::with_capacity(fields_count as usize);
        for _ in 0..fields_count {
            let access_flags = reader.read_u16()?;
            let _name_index = reader.read_u16()?;
            let _descriptor_index = reader.read_u16()?;
            // No NBT-typed field is ever read through a field's own attributes in this domain;
            // field attributes (ConstantValue, Signature, ...) are uniformly irrelevant here.
            parse_attributes(&mut reader, &constant_pool, &[])?;
            fields.push(FieldInfo { access_flags });
        }

        let methods_count = reader.read_u16()?;
        let mut methods = Vec::with_capacity(methods_count as usize);
        for _ in 0..methods_count {
            let access_flags = reader.read_u16()?;
            let name_index = reader.read_u16()?;
            let descriptor_index = reader.read_u16()?;
            let name = constant_pool.utf8(name_index)?.to_owned();
            let descriptor = constant_pool.utf8(descriptor_index)?.to_owned();

            let is_static = access_flags & ACC_STATIC != 0;
            let is_constructor = name == "<init>";
            let initial_locals = initial_locals_from_descriptor(&descriptor, &this_class, is_static, is_constructor);

            let parsed = parse_attributes(&mut reader, &constant_pool, &initial_locals)?;
            methods.push(MethodInfo { access_flags, name, descriptor, code: parsed.code });
        }

        let class_attributes = parse_attributes(&mut reader, &constant_pool, &[])?;
        let bootstrap_methods = class_attributes.bootstrap_methods.unwrap_or_default();

        Ok(Self { access_flags, this_class, super_class, interfaces, fields, methods, bootstrap_methods, constant_pool })
    }

    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.name == name && m.descriptor == descriptor)
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags & ACC_INTERFACE != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags & ACC_ABSTRACT != 0
    }
}
