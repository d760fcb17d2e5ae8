use thiserror::Error;

/// Errors raised while parsing a class file. All of these are fatal once a class's bytes have
/// been handed to us — an unreadable class that *is* present is a different failure mode than
/// a class that's simply absent (`ClassNotFound`, which lives one layer up, in the class
/// loader, and is non-fatal).
#[derive(Error, Debug)]
pub enum ClassFileError {
    #[error("unexpected end of class file data")]
    UnexpectedEof(#[from] std::io::Error),

    #[error("bad magic number: expected 0xCAFEBABE, found {0:#010X}")]
    BadMagic(u32),

    #[error("constant pool index {0} out of range")]
    ConstantPoolIndexOutOfRange(u16),

    #[error("constant pool index {0} does not refer to a {1}")]
    ConstantPoolTypeMismatch(u16, &'static str),

    #[error("unknown constant pool tag {0}")]
    UnknownConstantPoolTag(u8),

    #[error("unknown opcode {0:#04X} at offset {1}")]
    UnknownOpcode(u8, u32),

    #[error("invalid stack map frame type byte {0} at offset {1}")]
    MalformedFrame(u8, u32),

    #[error("bootstrap method attribute referenced bootstrap index {0} but only {1} are present")]
    BootstrapIndexOutOfRange(u16, usize),
}
