use bijective_enum_map::injective_enum_map;

/// The standard JVM opcode set (JVM SE specification §6.5), excluding the two reserved
/// debugger opcodes (`breakpoint`, `impdep1`/`impdep2`) that never appear in compiled class
/// files. Most of these are dispatched through the generic stack-effect table in
/// [`crate::instruction::generic_stack_effect`]; only the handful the interpreter special-cases
/// (constant loads, field/array/local access, branches, invokes, returns) get their own
/// `Instruction` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types, reason = "mirrors JVM opcode mnemonics directly")]
pub enum Opcode {
    Nop, AconstNull,
    IconstM1, Iconst0, Iconst1, Iconst2, Iconst3, Iconst4, Iconst5,
    Lconst0, Lconst1,
    Fconst0, Fconst1, Fconst2,
    Dconst0, Dconst1,
    Bipush, Sipush,
    Ldc, LdcW, Ldc2W,
    Iload, Lload, Fload, Dload, Aload,
    Iload0, Iload1, Iload2, Iload3,
    Lload0, Lload1, Lload2, Lload3,
    Fload0, Fload1, Fload2, Fload3,
    Dload0, Dload1, Dload2, Dload3,
    Aload0, Aload1, Aload2, Aload3,
    Iaload, Laload, Faload, Daload, Aaload, Baload, Caload, Saload,
    Istore, Lstore, Fstore, Dstore, Astore,
    Istore0, Istore1, Istore2, Istore3,
    Lstore0, Lstore1, Lstore2, Lstore3,
    Fstore0, Fstore1, Fstore2, Fstore3,
    Dstore0, Dstore1, Dstore2, Dstore3,
    Astore0, Astore1, Astore2, Astore3,
    Iastore, Lastore, Fastore, Dastore, Aastore, Bastore, Castore, Sastore,
    Pop, Pop2,
    Dup, DupX1, DupX2, Dup2, Dup2X1, Dup2X2, Swap,
    Iadd, Ladd, Fadd, Dadd,
    Isub, Lsub, Fsub, Dsub,
    Imul, Lmul, Fmul, Dmul,
    Idiv, Ldiv, Fdiv, Ddiv,
    Irem, Lrem, Frem, Drem,
    Ineg, Lneg, Fneg, Dneg,
    Ishl, Lshl, Ishr, Lshr, Iushr, Lushr,
    Iand, Land, Ior, Lor, Ixor, Lxor,
    Iinc,
    I2l, I2f, I2d, L2i, L2f, L2d, F2i, F2l, F2d, D2i, D2l, D2f, I2b, I2c, I2s,
    Lcmp, Fcmpl, Fcmpg, Dcmpl, Dcmpg,
    Ifeq, Ifne, Iflt, Ifge, Ifgt, Ifle,
    IfIcmpeq, IfIcmpne, IfIcmplt, IfIcmpge, IfIcmpgt, IfIcmple,
    IfAcmpeq, IfAcmpne,
    Goto, Jsr, Ret,
    Tableswitch, Lookupswitch,
    Ireturn, Lreturn, Freturn, Dreturn, Areturn, Return,
    Getstatic, Putstatic, Getfield, Putfield,
    Invokevirtual, Invokespecial, Invokestatic, Invokeinterface, Invokedynamic,
    New, Newarray, Anewarray, Arraylength, Athrow, Checkcast, Instanceof,
    Monitorenter, Monitorexit,
    Wide, Multianewarray, Ifnull, Ifnonnull, GotoW, JsrW,
}

injective_enum_map! {
    Opcode, u8,
    Nop <=> 0, AconstNull <=> 1,
    IconstM1 <=> 2, Iconst0 <=> 3, Iconst1 <=> 4, Iconst2 <=> 5, Iconst3 <=> 6, Iconst4 <=> 7, Iconst5 <=> 8,
    Lconst0 <=> 9, Lconst1 <=> 10,
    Fconst0 <=> 11, Fconst1 <=> 12, Fconst2 <=> 13,
    Dconst0 <=> 14, Dconst1 <=> 15,
    Bipush <=> 16, Sipush <=> 17,
    Ldc <=> 18, LdcW <=> 19, Ldc2W <=> 20,
    Iload <=> 21, Lload <=> 22, Fload <=> 23, Dload <=> 24, Aload <=> 25,
    Iload0 <=> 26, Iload1 <=> 27, Iload2 <=> 28, Iload3 <=> 29,
    Lload0 <=> 30, Lload1 <=> 31, Lload2 <=> 32, Lload3 <=> 33,
    Fload0 <=> 34, Fload1 <=> 35, Fload2 <=> 36, Fload3 <=> 37,
    Dload0 <=> 38, Dload1 <=> 39, Dload2 <=> 40, Dload3 <=> 41,
    Aload0 <=> 42, Aload1 <=> 43, Aload2 <=> 44, Aload3 <=> 45,
    Iaload <=> 46, Laload <=> 47, Faload <=> 48, Daload <=> 49, Aaload <=> 50, Baload <=> 51, Caload <=> 52, Saload <=> 53,
    Istore <=> 54, Lstore <=> 55, Fstore <=> 56, Dstore <=> 57, Astore <=> 58,
    Istore0 <=> 59, Istore1 <=> 60, Istore2 <=> 61, Istore3 <=> 62,
    Lstore0 <=> 63, Lstore1 <=> 64, Lstore2 <=> 65, Lstore3 <=> 66,
    Fstore0 <=> 67, Fstore1 <=> 68, Fstore2 <=> 69, Fstore3 <=> 70,
    Dstore0 <=> 71, Dstore1 <=> 72, Dstore2 <=> 73, Dstore3 <=> 74,
    Astore0 <=> 75, Astore1 <=> 76, Astore2 <=> 77, Astore3 <=> 78,
    Iastore <=> 79, Lastore <=> 80, Fastore <=> 81, Dastore <=> 82, Aastore <=> 83, Bastore <=> 84, Castore <=> 85, Sastore <=> 86,
    Pop <=> 87, Pop2 <=> 88,
    Dup <=> 89, DupX1 <=> 90, DupX2 <=> 91, Dup2 <=> 92, Dup2X1 <=> 93, Dup2X2 <=> 94, Swap <=> 95,
    Iadd <=> 96, Ladd <=> 97, Fadd <=> 98, Dadd <=> 99,
    Isub <=> 100, Lsub <=> 101, Fsub <=> 102, Dsub <=> 103,
    Imul <=> 104, Lmul <=> 105, Fmul <=> 106, Dmul <=> 107,
    Idiv <=> 108, Ldiv <=> 109, Fdiv <=> 110, Ddiv <=> 111,
    Irem <=> 112, Lrem <=> 113, Frem <=> 114, Drem <=> 115,
    Ineg <=> 116, Lneg <=> 117, Fneg <=> 118, Dneg <=> 119,
    Ishl <=> 120, Lshl <=> 121, Ishr <=> 122, Lshr <=> 123, Iushr <=> 124, Lushr <=> 125,
    Iand <=> 126, Land <=> 127, Ior <=> 128, Lor <=> 129, Ixor <=> 130, Lxor <=> 131,
    Iinc <=> 132,
    I2l <=> 133, I2f <=> 134, I2d <=> 135, L2i <=> 136, L2f <=> 137, L2d <=> 138,
    F2i <=> 139, F2l <=> 140, F2d <=> 141, D2i <=> 142, D2l <=> 143, D2f <=> 144,
    I2b <=> 145, I2c <=> 146, I2s <=> 147,
    Lcmp <=> 148, Fcmpl <=> 149, Fcmpg <=> 150, Dcmpl <=> 151, Dcmpg <=> 152,
    Ifeq <=> 153, Ifne <=> 154, Iflt <=> 155, Ifge <=> 156, Ifgt <=> 157, Ifle <=> 158,
    IfIcmpeq <=> 159, IfIcmpne <=> 160, IfIcmplt <=> 161, IfIcmpge <=> 162, IfIcmpgt <=> 163, IfIcmple <=> 164,
    IfAcmpeq <=> 165, IfAcmpne <=> 166,
    Goto <=> 167, Jsr <=> 168, Ret <=> 169,
    Tableswitch <=> 170, Lookupswitch <=> 171,
    Ireturn <=> 172, Lreturn <=> 173, Freturn <=> 174, Dreturn <=> 175, Areturn <=> 176, Return <=> 177,
    Getstatic <=> 178, Putstatic <=> 179, Getfield <=> 180, Putfield <=> 181,
    Invokevirtual <=> 182, Invokespecial <=> 183, Invokestatic <=> 184, Invokeinterface <=> 185, Invokedynamic <=> 186,
    New <=> 187, Newarray <=> 188, Anewarray <=> 189, Arraylength <=> 190, Athrow <=> 191, Checkcast <=> 192, Instanceof <=> 193,
    Monitorenter <=> 194, Monitorexit <=> 195,
    Wide <=> 196, Multianewarray <=> 197, Ifnull <=> 198, Ifnonnull <=> 199, GotoW <=> 200, JsrW <=> 201,
}

impl Opcode {
    /// `(pops, pushes)` in stack-slot units, for opcodes with a fixed, value-independent
    /// effect. Opcodes whose effect depends on an operand (`invoke*`, `multianewarray`, the
    /// `*2` forms which may pop one or two slots depending on category) are handled directly
    /// by the decoder/runner instead and return `None` here.
    pub fn fixed_stack_effect(self) -> Option<(u8, u8)> {
        use Opcode::*;
        match self {
            Nop => Some((0, 0)),
            AconstNull | IconstM1 | Iconst0 | Iconst1 | Iconst2 | Iconst3 | Iconst4 | Iconst5
                | Fconst0 | Fconst1 | Fconst2 | Bipush | Sipush
                | Iload | Fload | Aload
                | Iload0 | Iload1 | Iload2 | Iload3
                | Fload0 | Fload1 | Fload2 | Fload3
                | Aload0 | Aload1 | Aload2 | Aload3 => Some((0, 1)),
            Lconst0 | Lconst1 | Dconst0 | Dconst1
                | Lload | Dload
                | Lload0 | Lload1 | Lload2 | Lload3
                | Dload0 | Dload1 | Dload2 | Dload3 => Some((0, 2)),
            Iaload | Faload | Aaload | Baload | Caload | Saload => Some((2, 1)),
            Laload | Daload => Some((2, 2)),
            Istore | Fstore | Astore
                | Istore0 | Istore1 | Istore2 | Istore3
                | Fstore0 | Fstore1 | Fstore2 | Fstore3
                | Astore0 | Astore1 | Astore2 | Astore3 => Some((1, 0)),
            Lstore | Dstore
                | Lstore0 | Lstore1 | Lstore2 | Lstore3
                | Dstore0 | Dstore1 | Dstore2 | Dstore3 => Some((2, 0)),
            Iastore | Fastore | Aastore | Bastore | Castore | Sastore => Some((3, 0)),
            Lastore | Dastore => Some((4, 0)),
            Pop => Some((1, 0)),
            Pop2 => Some((2, 0)),
            Dup => Some((1, 2)),
            DupX1 => Some((2, 3)),
            DupX2 => Some((3, 4)),
            Dup2 => Some((2, 4)),
            Dup2X1 => Some((3, 5)),
            Dup2X2 => Some((4, 6)),
            Swap => Some((2, 2)),
            Iadd | Fadd | Isub | Fsub | Imul | Fmul | Idiv | Fdiv | Irem | Frem
                | Ishl | Ishr | Iushr | Iand | Ior | Ixor
                | Fcmpl | Fcmpg => Some((2, 1)),
            Ladd | Dadd | Lsub | Dsub | Lmul | Dmul | Ldiv | Ddiv | Lrem | Drem
                | Land | Lor | Lxor => Some((4, 2)),
            Lshl | Lshr | Lushr => Some((3, 2)),
            Ineg | Fneg => Some((1, 1)),
            Lneg | Dneg => Some((2, 2)),
            Lcmp | Dcmpl | Dcmpg => Some((4, 1)),
            Iinc => Some((0, 0)),
            I2l | I2d => Some((1, 2)),
            I2f | I2b | I2c | I2s => Some((1, 1)),
            L2i | L2f => Some((2, 1)),
            L2d => Some((2, 2)),
            F2i | F2l | F2d => Some((1, if matches!(self, F2l | F2d) { 2 } else { 1 })),
            D2i | D2f => Some((2, 1)),
            D2l => Some((2, 2)),
            Ifeq | Ifne | Iflt | Ifge | Ifgt | Ifle | Ifnull | Ifnonnull => Some((1, 0)),
            IfIcmpeq | IfIcmpne | IfIcmplt | IfIcmpge | IfIcmpgt | IfIcmple | IfAcmpeq | IfAcmpne => Some((2, 0)),
            Goto | GotoW | Jsr | JsrW | Ret => Some((0, 0)),
            Ireturn | Freturn | Areturn => Some((1, 0)),
            Lreturn | Dreturn => Some((2, 0)),
            Return => Some((0, 0)),
            Getstatic => None,
            Putstatic => None,
            Getfield => Some((1, 1)),
            Putfield => Some((2, 0)),
            New => Some((0, 1)),
            Newarray | Anewarray => Some((1, 1)),
            Arraylength => Some((1, 1)),
            Athrow => Some((1, 0)),
            Checkcast | Instanceof => Some((1, 1)),
            Monitorenter | Monitorexit => Some((1, 0)),
            Ldc | LdcW => Some((0, 1)),
            Ldc2W => Some((0, 2)),
            Wide | Multianewarray | Tableswitch | Lookupswitch
                | Invokevirtual | Invokespecial | Invokestatic | Invokeinterface | Invokedynamic => None,
        }
    }
}
