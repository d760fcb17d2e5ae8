use crate::error::ClassFileError;
use crate::opcode::Opcode;
use crate::reader::ClassReader;

/// The raw operand bytes of an opcode the decoder doesn't special-case. The runner consults
/// [`Opcode::fixed_stack_effect`] for these; a handful of variable-effect opcodes (the invoke
/// family, `multianewarray`) always get their own `Instruction` variant instead, so `Other`
/// never needs to carry one of those.
pub type OperandBytes = Vec<u8>;

/// A decoded bytecode instruction, addressed separately by its `pc` in the method's
/// `Vec<(pc, Instruction)>`. Only the opcode families the interpreter actually inspects get a
/// dedicated variant; everything else decodes to `Other` with its operand bytes intact so the
/// runner can still skip over it and apply a generic stack effect.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    ConstNull,
    ConstInt(i32),
    ConstLong(i64),
    ConstFloat(f32),
    ConstDouble(f64),
    /// `ldc`/`ldc_w`/`ldc2_w` of a constant pool entry that isn't a plain numeric literal
    /// (string, class, method handle/type) — resolved lazily against the constant pool by the
    /// runner, which is why the raw index is kept rather than eagerly resolved here.
    LoadConstant(u16),

    Load { var_index: u16, opcode: Opcode },
    Store { var_index: u16, opcode: Opcode },
    Iinc { var_index: u16, delta: i16 },

    ArrayLoad(Opcode),
    ArrayStore(Opcode),
    NewArray(u8),
    ANewArray(u16),
    MultiANewArray { class_index: u16, dimensions: u8 },
    ArrayLength,

    GetField(u16),
    PutField(u16),
    GetStatic(u16),
    PutStatic(u16),

    New(u16),
    CheckCast(u16),
    InstanceOf(u16),

    Goto(i32),
    Jsr(i32),
    Ret(u16),
    IfZero { opcode: Opcode, target: i32 },
    IfIcmp { opcode: Opcode, target: i32 },
    IfAcmp { opcode: Opcode, target: i32 },
    IfNullity { opcode: Opcode, target: i32 },
    TableSwitch { default: i32, low: i32, high: i32, targets: Vec<i32> },
    LookupSwitch { default: i32, pairs: Vec<(i32, i32)> },

    InvokeVirtual(u16),
    InvokeSpecial(u16),
    InvokeStatic(u16),
    InvokeInterface { method_index: u16, arg_count: u8 },
    /// The constant pool index of the `CONSTANT_InvokeDynamic_info` entry; resolved lazily
    /// against `ConstantPool::get`/`ClassFile::bootstrap_methods` by the runner, same rationale
    /// as `LoadConstant`.
    InvokeDynamic(u16),

    Return(Opcode),
    Athrow,

    Other(Opcode, OperandBytes),
}

fn pad_to_4(reader: &mut ClassReader<'_>, instruction_start: u32) -> Result<(), ClassFileError> {
    let consumed_from_start = reader.position() as u32 - instruction_start;
    let padding = (4 - (consumed_from_start % 4)) % 4;
    reader.skip(padding)
}

/// Decodes a method's `Code` bytes into an address-ordered list of `(pc, Instruction)`, where
/// `pc` is the byte offset of the opcode within `code` (matching the `StackMapTable` and
/// exception table's addressing).
pub fn decode(code: &[u8]) -> Result<Vec<(u32, Instruction)>, ClassFileError> {
    let mut reader = ClassReader::new(code);
    let mut out = Vec::new();

    while (reader.position() as usize) < code.len() {
        let pc = reader.position() as u32;
        let opcode_byte = reader.read_u8()?;
        let opcode = Opcode::try_from(opcode_byte).map_err(|()| ClassFileError::UnknownOpcode(opcode_byte, pc))?;

        let instruction = match opcode {
            Opcode::AconstNull => Instruction::ConstNull,
            Opcode::IconstM1 => Instruction::ConstInt(-1),
            Opcode::Iconst0 => Instruction::ConstInt(0),
            Opcode::Iconst1 => Instruction::ConstInt(1),
            Opcode::Iconst2 => Instruction::ConstInt(2),
            Opcode::Iconst3 => Instruction::ConstInt(3),
            Opcode::Iconst4 => Instruction::ConstInt(4),
            Opcode::Iconst5 => Instruction::ConstInt(5),
            Opcode::Lconst0 => Instruction::ConstLong(0),
            Opcode::Lconst1 => Instruction::ConstLong(1),
            Opcode::Fconst0 => Instruction::ConstFloat(0.0),
            Opcode::Fconst1 => Instruction::ConstFloat(1.0),
            Opcode::Fconst2 => Instruction::ConstFloat(2.0),
            Opcode::Dconst0 => Instruction::ConstDouble(0.0),
            Opcode::Dconst1 => Instruction::ConstDouble(1.0),
            Opcode::Bipush => Instruction::ConstInt(reader.read_i8()? as i32),
            Opcode::Sipush => Instruction::ConstInt(reader.read_i16()? as i32),
            Opcode::Ldc => Instruction::LoadConstant(reader.read_u8()? as u16),
            Opcode::LdcW | Opcode::Ldc2W => Instruction::LoadConstant(reader.read_u16()?),

            Opcode::Iload | Opcode::Lload | Opcode::Fload | Opcode::Dload | Opcode::Aload => {
                Instruction::Load { var_index: reader.read_u8()? as u16, opcode }
            }
            Opcode::Iload0 | Opcode::Iload1 | Opcode::Iload2 | Opcode::Iload3
            | Opcode::Lload0 | Opcode::Lload1 | Opcode::Lload2 | Opcode::Lload3
            | Opcode::Fload0 | Opcode::Fload1 | Opcode::Fload2 | Opcode::Fload3
            | Opcode::Dload0 | Opcode::Dload1 | Opcode::Dload2 | Opcode::Dload3
            | Opcode::Aload0 | Opcode::Aload1 | Opcode::Aload2 | Opcode::Aload3 => {
                Instruction::Load { var_index: implicit_local_index(opcode), opcode }
            }
            Opcode::Istore | Opcode::Lstore | Opcode::Fstore | Opcode::Dstore | Opcode::Astore => {
                Instruction::Store { var_index: reader.read_u8()? as u16, opcode }
            }
            Opcode::Istore0 | Opcode::Istore1 | Opcode::Istore2 | Opcode::Istore3
            | Opcode::Lstore0 | Opcode::Lstore1 | Opcode::Lstore2 | Opcode::Lstore3
            | Opcode::Fstore0 | Opcode::Fstore1 | Opcode::Fstore2 | Opcode::Fstore3
            | Opcode::Dstore0 | Opcode::Dstore1 | Opcode::Dstore2 | Opcode::Dstore3
            | Opcode::Astore0 | Opcode::Astore1 | Opcode::Astore2 | Opcode::Astore3 => {
                Instruction::Store { var_index: implicit_local_index(opcode), opcode }
            }
            Opcode::Iinc => Instruction::Iinc { var_index: reader.read_u8()? as u16, delta: reader.read_i8()? as i16 },

            Opcode::Iaload | Opcode::Laload | Opcode::Faload | Opcode::Daload
            | Opcode::Aaload | Opcode::Baload | Opcode::Caload | Opcode::Saload => Instruction::ArrayLoad(opcode),
            Opcode::Iastore | Opcode::Lastore | Opcode::Fastore | Opcode::Dastore
            | Opcode::Aastore | Opcode::Bastore | Opcode::Castore | Opcode::Sastore => Instruction::ArrayStore(opcode),
            Opcode::Newarray => Instruction::NewArray(reader.read_u8()?),
            Opcode::Anewarray => Instruction::ANewArray(reader.read_u16()?),
            Opcode::Multianewarray => Instruction::MultiANewArray {
                class_index: reader.read_u16()?,
                dimensions: reader.read_u8()?,
            },
            Opcode::Arraylength => Instruction::ArrayLength,

            Opcode::Getfield => Instruction::GetField(reader.read_u16()?),
            Opcode::Putfield => Instruction::PutField(reader.read_u16()?),
            Opcode::Getstatic => Instruction::GetStatic(reader.read_u16()?),
            Opcode::Putstatic => Instruction::PutStatic(reader.read_u16()?),

            Opcode::New => Instruction::New(reader.read_u16()?),
            Opcode::Checkcast => Instruction::CheckCast(reader.read_u16()?),
            Opcode::Instanceof => Instruction::InstanceOf(reader.read_u16()?),

            Opcode::Goto => Instruction::Goto(pc as i32 + reader.read_i16()? as i32),
            Opcode::GotoW => Instruction::Goto(pc as i32 + reader.read_i32()?),
            Opcode::Jsr => Instruction::Jsr(pc as i32 + reader.read_i16()? as i32),
            Opcode::JsrW => Instruction::Jsr(pc as i32 + reader.read_i32()?),
            Opcode::Ret => Instruction::Ret(reader.read_u8()? as u16),

            Opcode::Ifeq | Opcode::Ifne | Opcode::Iflt | Opcode::Ifge | Opcode::Ifgt | Opcode::Ifle => {
                Instruction::IfZero { opcode, target: pc as i32 + reader.read_i16()? as i32 }
            }
            Opcode::Ifnull | Opcode::Ifnonnull => {
                Instruction::IfNullity { opcode, target: pc as i32 + reader.read_i16()? as i32 }
            }
            Opcode::IfIcmpeq | Opcode::IfIcmpne | Opcode::IfIcmplt
            | Opcode::IfIcmpge | Opcode::IfIcmpgt | Opcode::IfIcmple => {
                Instruction::IfIcmp { opcode, target: pc as i32 + reader.read_i16()? as i32 }
            }
            Opcode::IfAcmpeq | Opcode::IfAcmpne => {
                Instruction::IfAcmp { opcode, target: pc as i32 + reader.read_i16()? as i32 }
            }

            Opcode::Tableswitch => {
                pad_to_4(&mut reader, pc)?;
                let default = pc as i32 + reader.read_i32()?;
                let low = reader.read_i32()?;
                let high = reader.read_i32()?;
                let count = (high - low + 1).max(0) as usize;
                let mut targets = Vec::with_capacity(count);
                for _ in 0..count {
                    targets.push(pc as i32 + reader.read_i32()?);
                }
                Instruction::TableSwitch { default, low, high, targets }
            }
            Opcode::Lookupswitch => {
                pad_to_4(&mut reader, pc)?;
                let default = pc as i32 + reader.read_i32()?;
                let npairs = reader.read_i32()?.max(0) as usize;
                let mut pairs = Vec::with_capacity(npairs);
                for _ in 0..npairs {
                    let match_value = reader.read_i32()?;
                    let target = pc as i32 + reader.read_i32()?;
                    pairs.push((match_value, target));
                }
                Instruction::LookupSwitch { default, pairs }
            }

            Opcode::Invokevirtual => Instruction::InvokeVirtual(reader.read_u16()?),
            Opcode::Invokespecial => Instruction::InvokeSpecial(reader.read_u16()?),
            Opcode::Invokestatic => Instruction::InvokeStatic(reader.read_u16()?),
            Opcode::Invokeinterface => {
                let method_index = reader.read_u16()?;
                let arg_count = reader.read_u8()?;
                reader.skip(1)?; // trailing zero byte, reserved by the format
                Instruction::InvokeInterface { method_index, arg_count }
            }
            Opcode::Invokedynamic => {
                let index = reader.read_u16()?;
                reader.skip(2)?; // trailing zero bytes, reserved by the format
                Instruction::InvokeDynamic(index)
            }

            Opcode::Ireturn | Opcode::Lreturn | Opcode::Freturn
            | Opcode::Dreturn | Opcode::Areturn | Opcode::Return => Instruction::Return(opcode),
            Opcode::Athrow => Instruction::Athrow,

            Opcode::Wide => decode_wide(&mut reader)?,

            other => {
                let operand_len = fixed_operand_len(other);
                Instruction::Other(other, reader.read_bytes(operand_len)?)
            }
        };

        out.push((pc, instruction));
    }

    Ok(out)
}

fn implicit_local_index(opcode: Opcode) -> u16 {
    use Opcode::*;
    match opcode {
        Iload0 | Lload0 | Fload0 | Dload0 | Aload0
        | Istore0 | Lstore0 | Fstore0 | Dstore0 | Astore0 => 0,
        Iload1 | Lload1 | Fload1 | Dload1 | Aload1
        | Istore1 | Lstore1 | Fstore1 | Dstore1 | Astore1 => 1,
        Iload2 | Lload2 | Fload2 | Dload2 | Aload2
        | Istore2 | Lstore2 | Fstore2 | Dstore2 | Astore2 => 2,
        Iload3 | Lload3 | Fload3 | Dload3 | Aload3
        | Istore3 | Lstore3 | Fstore3 | Dstore3 | Astore3 => 3,
        _ => unreachable!("implicit_local_index called with a non-_n load/store opcode"),
    }
}

/// `wide` prefixes the next opcode, widening its local-variable index (and, for `iinc`, its
/// delta) from one byte to two. Only the forms that take a local index are legal after `wide`.
fn decode_wide(reader: &mut ClassReader<'_>) -> Result<Instruction, ClassFileError> {
    let inner_byte = reader.read_u8()?;
    let inner = Opcode::try_from(inner_byte).map_err(|()| ClassFileError::UnknownOpcode(inner_byte, reader.position() as u32))?;
    match inner {
        Opcode::Iinc => {
            let var_index = reader.read_u16()?;
            let delta = reader.read_i16()?;
            Ok(Instruction::Iinc { var_index, delta })
        }
        Opcode::Iload | Opcode::Lload | Opcode::Fload | Opcode::Dload | Opcode::Aload => {
            Ok(Instruction::Load { var_index: reader.read_u16()?, opcode: inner })
        }
        Opcode::Istore | Opcode::Lstore | Opcode::Fstore | Opcode::Dstore | Opcode::Astore => {
            Ok(Instruction::Store { var_index: reader.read_u16()?, opcode: inner })
        }
        Opcode::Ret => Ok(Instruction::Ret(reader.read_u16()?)),
        _ => Ok(Instruction::Other(inner, Vec::new())),
    }
}

/// Byte length of the operand bytes that follow a generically-handled opcode (i.e. one that
/// falls through to `Instruction::Other`). All of these are fixed regardless of constant pool
/// contents; the variable-length forms (`tableswitch`, `lookupswitch`, the invokes) are decoded
/// directly above and never reach here.
fn fixed_operand_len(opcode: Opcode) -> usize {
    use Opcode::*;
    match opcode {
        Nop | AconstNull
        | IconstM1 | Iconst0 | Iconst1 | Iconst2 | Iconst3 | Iconst4 | Iconst5
        | Lconst0 | Lconst1 | Fconst0 | Fconst1 | Fconst2 | Dconst0 | Dconst1
        | Iload0 | Iload1 | Iload2 | Iload3
        | Lload0 | Lload1 | Lload2 | Lload3
        | Fload0 | Fload1 | Fload2 | Fload3
        | Dload0 | Dload1 | Dload2 | Dload3
        | Aload0 | Aload1 | Aload2 | Aload3
        | Istore0 | Istore1 | Istore2 | Istore3
        | Lstore0 | Lstore1 | Lstore2 | Lstore3
        | Fstore0 | Fstore1 | Fstore2 | Fstore3
        | Dstore0 | Dstore1 | Dstore2 | Dstore3
        | Astore0 | Astore1 | Astore2 | Astore3
        | Iaload | Laload | Faload | Daload | Aaload | Baload | Caload | Saload
        | Iastore | Lastore | Fastore | Dastore | Aastore | Bastore | Castore | Sastore
        | Pop | Pop2 | Dup | DupX1 | DupX2 | Dup2 | Dup2X1 | Dup2X2 | Swap
        | Iadd | Ladd | Fadd | Dadd | Isub | Lsub | Fsub | Dsub
        | Imul | Lmul | Fmul | Dmul | Idiv | Ldiv | Fdiv | Ddiv
        | Irem | Lrem | Frem | Drem | Ineg | Lneg | Fneg | Dneg
        | Ishl | Lshl | Ishr | Lshr | Iushr | Lushr
        | Iand | Land | Ior | Lor | Ixor | Lxor
        | I2l | I2f | I2d | L2i | L2f | L2d | F2i | F2l | F2d | D2i | D2l | D2f | I2b | I2c | I2s
        | Lcmp | Fcmpl | Fcmpg | Dcmpl | Dcmpg
        | Arraylength | Athrow | Monitorenter | Monitorexit
        | Ireturn | Lreturn | Freturn | Dreturn | Areturn | Return => 0,
        Iload | Lload | Fload | Dload | Aload
        | Istore | Lstore | Fstore | Dstore | Astore
        | Newarray | Bipush | Ldc | Ret => 1,
        Sipush | Iinc
        | Getstatic | Putstatic | Getfield | Putfield
        | Invokevirtual | Invokespecial | Invokestatic
        | New | Anewarray | Checkcast | Instanceof
        | LdcW | Ldc2W
        | Ifeq | Ifne | Iflt | Ifge | Ifgt | Ifle
        | IfIcmpeq | IfIcmpne | IfIcmplt | IfIcmpge | IfIcmpgt | IfIcmple
        | IfAcmpeq | IfAcmpne | Goto | Jsr | Ifnull | Ifnonnull => 2,
        Multianewarray => 3,
        GotoW | JsrW => 4,
        Wide | Tableswitch | Lookupswitch | Invokeinterface | Invokedynamic => {
            unreachable!("opcode {opcode:?} is decoded explicitly and never reaches fixed_operand_len")
        }
    }
}
