use crate::constant_pool::ConstantPool;
use crate::error::ClassFileError;
use crate::reader::ClassReader;

/// A verification type as it appears in a `StackMapTable` frame, or as synthesized for a
/// method's initial frame from its descriptor. Deliberately a named type rather than a raw
/// constant-pool index, matching 4.4's description of the declared stack map in terms of
/// "plain descriptors".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    Object(String),
    /// `new` was executed at this bytecode offset but the constructor hasn't run yet.
    Uninitialized(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapFrame {
    pub offset: u32,
    pub locals: Vec<VerificationType>,
    pub stack: Vec<VerificationType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: Option<u16>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    /// Declared stack-map-table entries, already converted from the class file's differential
    /// encoding into absolute-pc, absolute-frame form per 4.4/4.8.
    pub stack_map_table: Vec<StackMapFrame>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapMethod {
    pub method_ref: u16,
    pub arguments: Vec<u16>,
}

fn read_verification_type(
    reader: &mut ClassReader<'_>,
    constant_pool: &ConstantPool,
) -> Result<VerificationType, ClassFileError> {
    let tag = reader.read_u8()?;
    Ok(match tag {
        0 => VerificationType::Top,
        1 => VerificationType::Integer,
        2 => VerificationType::Float,
        3 => VerificationType::Double,
        4 => VerificationType::Long,
        5 => VerificationType::Null,
        6 => VerificationType::UninitializedThis,
        7 => {
            let class_index = reader.read_u16()?;
            VerificationType::Object(constant_pool.class_name(class_index)?.to_owned())
        }
        8 => VerificationType::Uninitialized(reader.read_u16()?),
        other => return Err(ClassFileError::MalformedFrame(other, reader.position() as u32)),
    })
}

/// Decodes the `StackMapTable` attribute body (already past its `number_of_entries` field is
/// NOT assumed; this reads it too) into absolute-offset, absolute-frame form, threading a
/// running `(locals, stack)` pair through the differential encoding as the spec describes.
fn parse_stack_map_table(
    reader: &mut ClassReader<'_>,
    constant_pool: &ConstantPool,
    initial_locals: &[VerificationType],
) -> Result<Vec<StackMapFrame>, ClassFileError> {
    let entry_count = reader.read_u16()?;
    let mut frames = Vec::with_capacity(entry_count as usize);

    let mut locals: Vec<VerificationType> = initial_locals.to_vec();
    let mut offset: u32 = 0;
    let mut first = true;

    for _ in 0..entry_count {
        let frame_type = reader.read_u8()?;
        let (delta, stack) = match frame_type {
            0..=63 => (frame_type as u32, Vec::new()),
            64..=127 => {
                let item = read_verification_type(reader, constant_pool)?;
                (frame_type as u32 - 64, vec![item])
            }
            247 => {
                let delta = reader.read_u16()? as u32;
                let item = read_verification_type(reader, constant_pool)?;
                (delta, vec![item])
            }
            248..=250 => {
                let delta = reader.read_u16()? as u32;
                let chop = 251 - frame_type as usize;
                let new_len = locals.len().saturating_sub(chop);
                locals.truncate(new_len);
                (delta, Vec::new())
            }
            251 => (reader.read_u16()? as u32, Vec::new()),
            252..=254 => {
                let delta = reader.read_u16()? as u32;
                let append_count = frame_type as usize - 251;
                for _ in 0..append_count {
                    locals.push(read_verification_type(reader, constant_pool)?);
                }
                (delta, Vec::new())
            }
            255 => {
                let delta = reader.read_u16()? as u32;
                let local_count = reader.read_u16()?;
                let mut new_locals = Vec::with_capacity(local_count as usize);
                for _ in 0..local_count {
                    new_locals.push(read_verification_type(reader, constant_pool)?);
                }
                locals = new_locals;
                let stack_count = reader.read_u16()?;
                let mut stack = Vec::with_capacity(stack_count as usize);
                for _ in 0..stack_count {
                    stack.push(read_verification_type(reader, constant_pool)?);
                }
                (delta, stack)
            }
            other => return Err(ClassFileError::MalformedFrame(other, reader.position() as u32)),
        };

        // The offset_delta of the first frame is relative to -1, not the previous frame, per
        // the format's definition; every subsequent frame's delta is relative to the previous
        // frame's offset.
        offset = if first { delta } else { offset + delta + 1 };
        first = false;

        frames.push(StackMapFrame { offset, locals: locals.clone(), stack });
    }

    Ok(frames)
}

/// Parses a `Code` attribute body (the bytes following its `attribute_length` field), including
/// its nested `StackMapTable` sub-attribute if present. Other nested attributes
/// (`LineNumberTable`, `LocalVariableTable`, and the like) are skipped.
pub(crate) fn parse_code(
    reader: &mut ClassReader<'_>,
    constant_pool: &ConstantPool,
    initial_locals: &[VerificationType],
) -> Result<CodeAttribute, ClassFileError> {
    let max_stack = reader.read_u16()?;
    let max_locals = reader.read_u16()?;
    let code_length = reader.read_u32()?;
    let code = reader.read_bytes(code_length as usize)?;

    let exception_table_length = reader.read_u16()?;
    let mut exception_table = Vec::with_capacity(exception_table_length as usize);
    for _ in 0..exception_table_length {
        exception_table.push(ExceptionTableEntry {
            start_pc: reader.read_u16()?,
            end_pc: reader.read_u16()?,
            handler_pc: reader.read_u16()?,
            catch_type: match reader.read_u16()? {
                0 => None,
                index => Some(index),
            },
        });
    }

    let mut stack_map_table = Vec::new();
    let attribute_count = reader.read_u16()?;
    for _ in 0..attribute_count {
        let name_index = reader.read_u16()?;
        let length = reader.read_u32()?;
        let name = constant_pool.utf8(name_index)?;
        if name == "StackMapTable" {
            stack_map_table = parse_stack_map_table(reader, constant_pool, initial_locals)?;
        } else {
            reader.skip(length)?;
        }
    }

    Ok(CodeAttribute { max_stack, max_locals, code, exception_table, stack_map_table })
}

fn parse_bootstrap_methods(reader: &mut ClassReader<'_>) -> Result<Vec<BootstrapMethod>, ClassFileError> {
    let count = reader.read_u16()?;
    let mut methods = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let method_ref = reader.read_u16()?;
        let arg_count = reader.read_u16()?;
        let mut arguments = Vec::with_capacity(arg_count as usize);
        for _ in 0..arg_count {
            arguments.push(reader.read_u16()?);
        }
        methods.push(BootstrapMethod { method_ref, arguments });
    }
    Ok(methods)
}

/// Derives the initial locals of a method's frame from its descriptor and whether it is an
/// instance method, per JVM verification rules: `this` (if instance) occupies slot 0, then each
/// parameter occupies one slot (two for `long`/`double`).
pub(crate) fn initial_locals_from_descriptor(descriptor: &str, this_class: &str, is_static: bool, is_constructor: bool) -> Vec<VerificationType> {
    let mut locals = Vec::new();
    if !is_static {
        locals.push(if is_constructor {
            VerificationType::UninitializedThis
        } else {
            VerificationType::Object(this_class.to_owned())
        });
    }

    let params = descriptor
        .strip_prefix('(')
        .and_then(|rest| rest.split(')').next())
        .unwrap_or("");

    let mut chars = params.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            'B' | 'C' | 'I' | 'S' | 'Z' => locals.push(VerificationType::Integer),
            'F' => locals.push(VerificationType::Float),
            'J' => locals.push(VerificationType::Long),
            'D' => locals.push(VerificationType::Double),
            'L' => {
                let mut name = String::new();
                for inner in chars.by_ref() {
                    if inner == ';' {
                        break;
                    }
                    name.push(inner);
                }
                locals.push(VerificationType::Object(name));
            }
            '[' => {
                while chars.peek() == Some(&'[') {
                    chars.next();
                }
                match chars.next() {
                    Some('L') => {
                        let mut name = String::from("[");
                        for inner in chars.by_ref() {
                            name.push(inner);
                            if inner == ';' {
                                break;
                            }
                        }
                        locals.push(VerificationType::Object(name));
                    }
                    Some(primitive) => locals.push(VerificationType::Object(format!("[{primitive}"))),
                    None => {}
                }
            }
            _ => {}
        }
    }

    locals
}

/// Walks a class's, field's, or method's `attributes_count`-prefixed attribute list, parsing
/// `Code` (for methods) and `BootstrapMethods` (for the class itself) and skipping everything
/// else by length. Returns whichever of the two this call site cares about; callers that want
/// both call this twice against independent attribute lists (methods never carry
/// `BootstrapMethods` and the class itself never carries `Code`).
pub(crate) struct ParsedAttributes {
    pub code: Option<CodeAttribute>,
    pub bootstrap_methods: Option<Vec<BootstrapMethod>>,
}

pub(crate) fn parse_attributes(
    reader: &mut ClassReader<'_>,
    constant_pool: &ConstantPool,
    initial_locals: &[VerificationType],
) -> Result<ParsedAttributes, ClassFileError> {
    let count = reader.read_u16()?;
    let mut code = None;
    let mut bootstrap_methods = None;

    for _ in 0..count {
        let name_index = reader.read_u16()?;
        let length = reader.read_u32()?;
        let name = constant_pool.utf8(name_index)?.to_owned();
        match name.as_str() {
            "Code" => code = Some(parse_code(reader, constant_pool, initial_locals)?),
            "BootstrapMethods" => bootstrap_methods = Some(parse_bootstrap_methods(reader)?),
            _ => reader.skip(length)?,
        }
    }

    Ok(ParsedAttributes { code, bootstrap_methods })
}
