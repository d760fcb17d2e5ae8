//! A minimal structural model of the JVM class file format: just rich enough to back a
//! bytecode interpreter, not a general-purpose disassembler. Parses the constant pool, class
//! structure, and the `Code`/`StackMapTable`/`BootstrapMethods` attributes; every other
//! attribute is skipped by length.

mod attributes;
mod class_file;
mod class_source;
mod constant_pool;
mod error;
mod instruction;
mod method_pointer;
mod opcode;
mod reader;

pub use self::attributes::{BootstrapMethod, CodeAttribute, ExceptionTableEntry, StackMapFrame, VerificationType};
pub use self::class_file::{ClassFile, FieldInfo, MethodInfo};
pub use self::class_source::{ClassSource, DirectoryClassSource, InMemoryClassSource};
pub use self::constant_pool::{ConstantPool, ConstantPoolEntry, ConstantPoolTag, MemberRef, MemberRefIndices};
pub use self::error::ClassFileError;
pub use self::instruction::{decode, Instruction, OperandBytes};
pub use self::method_pointer::MethodPointer;
pub use self::opcode::Opcode;
pub use self::reader::ClassReader;

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds the bytes of a trivial class file: `public class Empty extends Object` with no
    /// fields or methods, one constant pool entry for each of `Empty` and `java/lang/Object`.
    fn empty_class_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0xCAFE_BABE_u32.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes()); // minor
        bytes.extend_from_slice(&61u16.to_be_bytes()); // major

        // Constant pool: #1 Utf8 "Empty", #2 Class #1, #3 Utf8 "java/lang/Object", #4 Class #3.
        bytes.extend_from_slice(&5u16.to_be_bytes()); // count = entries + 1
        push_utf8(&mut bytes, "Empty");
        push_class(&mut bytes, 1);
        push_utf8(&mut bytes, "java/lang/Object");
        push_class(&mut bytes, 3);

        bytes.extend_from_slice(&0x0021u16.to_be_bytes()); // access_flags: public super
        bytes.extend_from_slice(&2u16.to_be_bytes()); // this_class
        bytes.extend_from_slice(&4u16.to_be_bytes()); // super_class
        bytes.extend_from_slice(&0u16.to_be_bytes()); // interfaces_count
        bytes.extend_from_slice(&0u16.to_be_bytes()); // fields_count
        bytes.extend_from_slice(&0u16.to_be_bytes()); // methods_count
        bytes.extend_from_slice(&0u16.to_be_bytes()); // attributes_count
        bytes
    }

    fn push_utf8(bytes: &mut Vec<u8>, s: &str) {
        bytes.push(1); // CONSTANT_Utf8
        bytes.extend_from_slice(&(s.len() as u16).to_be_bytes());
        bytes.extend_from_slice(s.as_bytes());
    }

    fn push_class(bytes: &mut Vec<u8>, name_index: u16) {
        bytes.push(7); // CONSTANT_Class
        bytes.extend_from_slice(&name_index.to_be_bytes());
    }

    #[test]
    fn parses_minimal_class_file() {
        let class = ClassFile::parse(&empty_class_bytes()).unwrap();
        assert_eq!(class.this_class, "Empty");
        assert_eq!(class.super_class.as_deref(), Some("java/lang/Object"));
        assert!(class.methods.is_empty());
        assert!(class.fields.is_empty());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = empty_class_bytes();
        bytes[0] = 0x00;
        let err = ClassFile::parse(&bytes).unwrap_err();
        assert!(matches!(err, ClassFileError::BadMagic(_)));
    }

    #[test]
    fn decodes_simple_bytecode() {
        // iconst_0, istore_1, iload_1, ireturn
        let code = vec![0x03, 0x3C, 0x1B, 0xAC];
        let decoded = decode(&code).unwrap();
        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded[0], (0, Instruction::ConstInt(0)));
        assert_eq!(decoded[3], (3, Instruction::Return(Opcode::Ireturn)));
    }

    #[test]
    fn decodes_branch_targets_as_absolute_pc() {
        // goto +3 (from pc 0) then nop nop nop
        let code = vec![0xA7, 0x00, 0x03, 0x00, 0x00, 0x00];
        let decoded = decode(&code).unwrap();
        assert_eq!(decoded[0], (0, Instruction::Goto(3)));
    }
}
