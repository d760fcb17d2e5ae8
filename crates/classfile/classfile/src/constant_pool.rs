use bijective_enum_map::injective_enum_map;

use crate::error::ClassFileError;
use crate::reader::ClassReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantPoolTag {
    Utf8,
    Integer,
    Float,
    Long,
    Double,
    Class,
    String,
    Fieldref,
    Methodref,
    InterfaceMethodref,
    NameAndType,
    MethodHandle,
    MethodType,
    InvokeDynamic,
}

injective_enum_map! {
    ConstantPoolTag, u8,
    Utf8                <=> 1,
    Integer             <=> 3,
    Float               <=> 4,
    Long                <=> 5,
    Double              <=> 6,
    Class               <=> 7,
    String              <=> 8,
    Fieldref            <=> 9,
    Methodref           <=> 10,
    InterfaceMethodref  <=> 11,
    NameAndType         <=> 12,
    MethodHandle        <=> 15,
    MethodType          <=> 16,
    InvokeDynamic       <=> 18,
}

/// A reference into the constant pool by name-and-type, resolved eagerly at parse time into
/// plain strings so the interpreter never has to chase pool indices at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub class_name: String,
    pub name:       String,
    pub descriptor: String,
}

/// One entry of the constant pool. `Long` and `Double` each occupy their declared slot plus a
/// following unusable padding slot, per the class file format's historical quirk; we surface
/// that padding as `Padding` rather than silently shifting every later index.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantPoolEntry {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    String { string_index: u16 },
    Fieldref(MemberRefIndices),
    Methodref(MemberRefIndices),
    InterfaceMethodref(MemberRefIndices),
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { reference_kind: u8, reference_index: u16 },
    MethodType { descriptor_index: u16 },
    InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    /// The unusable slot following a `Long` or `Double` entry.
    Padding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRefIndices {
    pub class_index:        u16,
    pub name_and_type_index: u16,
}

/// The class file's constant pool, indexed exactly as the format describes it: 1-based, with
/// index 0 always invalid and never populated.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<Option<ConstantPoolEntry>>,
}

impl ConstantPool {
    pub(crate) fn parse(reader: &mut ClassReader<'_>) -> Result<Self, ClassFileError> {
        let count = reader.read_u16()?;
        let mut entries: Vec<Option<ConstantPoolEntry>> = vec![None; count as usize];

        let mut index = 1_usize;
        while index < count as usize {
            let tag_byte = reader.read_u8()?;
            let tag = ConstantPoolTag::try_from(tag_byte)
                .map_err(|()| ClassFileError::UnknownConstantPoolTag(tag_byte))?;

            let entry = match tag {
                ConstantPoolTag::Utf8 => ConstantPoolEntry::Utf8(reader.read_modified_utf8()?),
                ConstantPoolTag::Integer => ConstantPoolEntry::Integer(reader.read_i32()?),
                ConstantPoolTag::Float => ConstantPoolEntry::Float(reader.read_f32()?),
                ConstantPoolTag::Long => ConstantPoolEntry::Long(reader.read_i64()?),
                ConstantPoolTag::Double => ConstantPoolEntry::Double(reader.read_f64()?),
                ConstantPoolTag::Class => ConstantPoolEntry::Class { name_index: reader.read_u16()? },
                ConstantPoolTag::String => ConstantPoolEntry::String { string_index: reader.read_u16()? },
                ConstantPoolTag::Fieldref => ConstantPoolEntry::Fieldref(MemberRefIndices {
                    class_index:         reader.read_u16()?,
                    name_and_type_index: reader.read_u16()?,
                }),
                ConstantPoolTag::Methodref => ConstantPoolEntry::Methodref(MemberRefIndices {
                    class_index:         reader.read_u16()?,
                    name_and_type_index: reader.read_u16()?,
                }),
                ConstantPoolTag::InterfaceMethodref => ConstantPoolEntry::InterfaceMethodref(MemberRefIndices {
                    class_index:         reader.read_u16()?,
                    name_and_type_index: reader.read_u16()?,
                }),
                ConstantPoolTag::NameAndType => ConstantPoolEntry::NameAndType {
                    name_index:       reader.read_u16()?,
                    descriptor_index: reader.read_u16()?,
                },
                ConstantPoolTag::MethodHandle => ConstantPoolEntry::MethodHandle {
                    reference_kind:  reader.read_u8()?,
                    reference_index: reader.read_u16()?,
                },
                ConstantPoolTag::MethodType => ConstantPoolEntry::MethodType {
                    descriptor_index: reader.read_u16()?,
                },
                ConstantPoolTag::InvokeDynamic => ConstantPoolEntry::InvokeDynamic {
                    bootstrap_method_attr_index: reader.read_u16()?,
                    name_and_type_index:         reader.read_u16()?,
                },
            };

            let wide = matches!(entry, ConstantPoolEntry::Long(_) | ConstantPoolEntry::Double(_));
            entries[index] = Some(entry);
            index += 1;
            if wide {
                entries[index] = Some(ConstantPoolEntry::Padding);
                index += 1;
            }
        }

        Ok(Self { entries })
    }

    pub fn get(&self, index: u16) -> Result<&ConstantPoolEntry, ClassFileError> {
        self.entries
            .get(index as usize)
            .and_then(Option::as_ref)
            .ok_or(ClassFileError::ConstantPoolIndexOutOfRange(index))
    }

    pub fn utf8(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            ConstantPoolEntry::Utf8(s) => Ok(s.as_str()),
            _ => Err(ClassFileError::ConstantPoolTypeMismatch(index, "Utf8")),
        }
    }

    pub fn class_name(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            ConstantPoolEntry::Class { name_index } => self.utf8(*name_index),
            _ => Err(ClassFileError::ConstantPoolTypeMismatch(index, "Class")),
        }
    }

    pub fn string_value(&self, index: u16) -> Result<&str, ClassFileError> {
        match self.get(index)? {
            ConstantPoolEntry::String { string_index } => self.utf8(*string_index),
            _ => Err(ClassFileError::ConstantPoolTypeMismatch(index, "String")),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), ClassFileError> {
        match self.get(index)? {
            ConstantPoolEntry::NameAndType { name_index, descriptor_index } => {
                Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?))
            }
            _ => Err(ClassFileError::ConstantPoolTypeMismatch(index, "NameAndType")),
        }
    }

    fn member_ref(&self, refs: &MemberRefIndices) -> Result<MemberRef, ClassFileError> {
        let class_name = self.class_name(refs.class_index)?.to_owned();
        let (name, descriptor) = self.name_and_type(refs.name_and_type_index)?;
        Ok(MemberRef { class_name, name: name.to_owned(), descriptor: descriptor.to_owned() })
    }

    pub fn fieldref(&self, index: u16) -> Result<MemberRef, ClassFileError> {
        match self.get(index)? {
            ConstantPoolEntry::Fieldref(refs) => self.member_ref(refs),
            _ => Err(ClassFileError::ConstantPoolTypeMismatch(index, "Fieldref")),
        }
    }

    pub fn methodref(&self, index: u16) -> Result<MemberRef, ClassFileError> {
        match self.get(index)? {
            ConstantPoolEntry::Methodref(refs) | ConstantPoolEntry::InterfaceMethodref(refs) => self.member_ref(refs),
            _ => Err(ClassFileError::ConstantPoolTypeMismatch(index, "Methodref")),
        }
    }

    /// Resolves a `CONSTANT_InvokeDynamic_info` entry to its bootstrap method table index and
    /// the name/descriptor of the functional-interface method the call site targets.
    pub fn invoke_dynamic(&self, index: u16) -> Result<(u16, &str, &str), ClassFileError> {
        match self.get(index)? {
            ConstantPoolEntry::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index } => {
                let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
                Ok((*bootstrap_method_attr_index, name, descriptor))
            }
            _ => Err(ClassFileError::ConstantPoolTypeMismatch(index, "InvokeDynamic")),
        }
    }
}
