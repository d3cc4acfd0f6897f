//! The closed set of JVM opcodes and their static metadata.

use std::fmt::{self, Display};

use fnv::FnvHashMap;
use once_cell::sync::Lazy;

use crate::{constant_pool::ConstantValue, error::MalformedCode, type_kind::TypeKind};

/// The byte that prefixes the wide forms of local variable instructions.
pub const WIDE: u8 = 0xc4;

/// The instruction family an opcode belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Load,
    Store,
    Increment,
    Branch,
    LookupSwitch,
    TableSwitch,
    Return,
    ThrowException,
    FieldAccess,
    Invoke,
    InvokeDynamic,
    NewObject,
    NewPrimitiveArray,
    NewReferenceArray,
    NewMultiArray,
    TypeCheck,
    ArrayLoad,
    ArrayStore,
    Stack,
    Convert,
    Operator,
    Constant,
    Monitor,
    Nop,
    DiscontinuedJsr,
    DiscontinuedRet,
}

/// The encoded length of an opcode together with its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpcodeSize {
    Fixed(u8),
    /// Switches; the length depends on alignment padding and the case count.
    Variable,
}

bitflags::bitflags! {
    /// Control-flow and encoding properties of an opcode.
    pub struct OpcodeFlags: u8 {
        /// Carries at least one branch offset operand.
        const BRANCH = 0x01;
        /// Never falls through to the next instruction.
        const UNCONDITIONAL = 0x02;
        /// Encoded behind the `wide` prefix.
        const WIDE = 0x04;
        /// Has no fixed encoded length.
        const VARIABLE_SIZE = 0x08;
    }
}

/// Macro for defining the opcode enum.
/// Generates the byte code, mnemonic, kind and size tables.
macro_rules! def_opcode {
    (
        $(
            $(#[$inner:meta])*
            ($code:expr) = $name:ident($mnemonic:literal, $kind:ident, $size:expr)
        ),* $(,)?
    ) => {
        /// A JVM opcode.
        ///
        /// Wide-prefixed local variable forms are distinct opcodes, so an
        /// opcode alone determines the encoded shape of its instruction.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Opcode {
            $(
                $(#[$inner])*
                $name
            ),*
        }

        impl Opcode {
            /// Every opcode, in declaration order.
            pub const ALL: &'static [Opcode] = &[$(Opcode::$name),*];

            /// The numeric code; wide forms are `0xc4xx`.
            pub const fn bytecode(self) -> u16 {
                match self {
                    $(Self::$name => $code),*
                }
            }

            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $(Self::$name => $mnemonic),*
                }
            }

            pub const fn kind(self) -> Kind {
                match self {
                    $(Self::$name => Kind::$kind),*
                }
            }

            pub const fn size(self) -> OpcodeSize {
                match self {
                    $(Self::$name => if $size == 0 { OpcodeSize::Variable } else { OpcodeSize::Fixed($size) }),*
                }
            }
        }
    };
}

def_opcode! {
    /// Do nothing
    (0x00) = Nop("nop", Nop, 1),
    /// Push `null`
    (0x01) = AconstNull("aconst_null", Constant, 1),
    /// Push `int` constant -1
    (0x02) = IconstM1("iconst_m1", Constant, 1),
    (0x03) = Iconst0("iconst_0", Constant, 1),
    (0x04) = Iconst1("iconst_1", Constant, 1),
    (0x05) = Iconst2("iconst_2", Constant, 1),
    (0x06) = Iconst3("iconst_3", Constant, 1),
    (0x07) = Iconst4("iconst_4", Constant, 1),
    (0x08) = Iconst5("iconst_5", Constant, 1),
    /// Push `long` constant
    (0x09) = Lconst0("lconst_0", Constant, 1),
    (0x0a) = Lconst1("lconst_1", Constant, 1),
    /// Push `float` constant
    (0x0b) = Fconst0("fconst_0", Constant, 1),
    (0x0c) = Fconst1("fconst_1", Constant, 1),
    (0x0d) = Fconst2("fconst_2", Constant, 1),
    /// Push `double` constant
    (0x0e) = Dconst0("dconst_0", Constant, 1),
    (0x0f) = Dconst1("dconst_1", Constant, 1),
    /// Push sign-extended `byte`
    (0x10) = Bipush("bipush", Constant, 2),
    /// Push sign-extended `short`
    (0x11) = Sipush("sipush", Constant, 3),
    /// Push item from run-time constant pool
    (0x12) = Ldc("ldc", Constant, 2),
    /// Push item from run-time constant pool (wide index)
    (0x13) = LdcW("ldc_w", Constant, 3),
    /// Push `long` or `double` from run-time constant pool
    (0x14) = Ldc2W("ldc2_w", Constant, 3),
    /// Load `int` from local variable
    (0x15) = Iload("iload", Load, 2),
    (0x16) = Lload("lload", Load, 2),
    (0x17) = Fload("fload", Load, 2),
    (0x18) = Dload("dload", Load, 2),
    (0x19) = Aload("aload", Load, 2),
    (0x1a) = Iload0("iload_0", Load, 1),
    (0x1b) = Iload1("iload_1", Load, 1),
    (0x1c) = Iload2("iload_2", Load, 1),
    (0x1d) = Iload3("iload_3", Load, 1),
    (0x1e) = Lload0("lload_0", Load, 1),
    (0x1f) = Lload1("lload_1", Load, 1),
    (0x20) = Lload2("lload_2", Load, 1),
    (0x21) = Lload3("lload_3", Load, 1),
    (0x22) = Fload0("fload_0", Load, 1),
    (0x23) = Fload1("fload_1", Load, 1),
    (0x24) = Fload2("fload_2", Load, 1),
    (0x25) = Fload3("fload_3", Load, 1),
    (0x26) = Dload0("dload_0", Load, 1),
    (0x27) = Dload1("dload_1", Load, 1),
    (0x28) = Dload2("dload_2", Load, 1),
    (0x29) = Dload3("dload_3", Load, 1),
    (0x2a) = Aload0("aload_0", Load, 1),
    (0x2b) = Aload1("aload_1", Load, 1),
    (0x2c) = Aload2("aload_2", Load, 1),
    (0x2d) = Aload3("aload_3", Load, 1),
    /// Load `int` from array
    (0x2e) = Iaload("iaload", ArrayLoad, 1),
    (0x2f) = Laload("laload", ArrayLoad, 1),
    (0x30) = Faload("faload", ArrayLoad, 1),
    (0x31) = Daload("daload", ArrayLoad, 1),
    (0x32) = Aaload("aaload", ArrayLoad, 1),
    /// Load `byte` or `boolean` from array
    (0x33) = Baload("baload", ArrayLoad, 1),
    (0x34) = Caload("caload", ArrayLoad, 1),
    (0x35) = Saload("saload", ArrayLoad, 1),
    /// Store `int` into local variable
    (0x36) = Istore("istore", Store, 2),
    (0x37) = Lstore("lstore", Store, 2),
    (0x38) = Fstore("fstore", Store, 2),
    (0x39) = Dstore("dstore", Store, 2),
    (0x3a) = Astore("astore", Store, 2),
    (0x3b) = Istore0("istore_0", Store, 1),
    (0x3c) = Istore1("istore_1", Store, 1),
    (0x3d) = Istore2("istore_2", Store, 1),
    (0x3e) = Istore3("istore_3", Store, 1),
    (0x3f) = Lstore0("lstore_0", Store, 1),
    (0x40) = Lstore1("lstore_1", Store, 1),
    (0x41) = Lstore2("lstore_2", Store, 1),
    (0x42) = Lstore3("lstore_3", Store, 1),
    (0x43) = Fstore0("fstore_0", Store, 1),
    (0x44) = Fstore1("fstore_1", Store, 1),
    (0x45) = Fstore2("fstore_2", Store, 1),
    (0x46) = Fstore3("fstore_3", Store, 1),
    (0x47) = Dstore0("dstore_0", Store, 1),
    (0x48) = Dstore1("dstore_1", Store, 1),
    (0x49) = Dstore2("dstore_2", Store, 1),
    (0x4a) = Dstore3("dstore_3", Store, 1),
    (0x4b) = Astore0("astore_0", Store, 1),
    (0x4c) = Astore1("astore_1", Store, 1),
    (0x4d) = Astore2("astore_2", Store, 1),
    (0x4e) = Astore3("astore_3", Store, 1),
    /// Store into `int` array
    (0x4f) = Iastore("iastore", ArrayStore, 1),
    (0x50) = Lastore("lastore", ArrayStore, 1),
    (0x51) = Fastore("fastore", ArrayStore, 1),
    (0x52) = Dastore("dastore", ArrayStore, 1),
    (0x53) = Aastore("aastore", ArrayStore, 1),
    /// Store into `byte` or `boolean` array
    (0x54) = Bastore("bastore", ArrayStore, 1),
    (0x55) = Castore("castore", ArrayStore, 1),
    (0x56) = Sastore("sastore", ArrayStore, 1),
    /// Pop the top operand stack value
    (0x57) = Pop("pop", Stack, 1),
    (0x58) = Pop2("pop2", Stack, 1),
    /// Duplicate the top operand stack value
    (0x59) = Dup("dup", Stack, 1),
    (0x5a) = DupX1("dup_x1", Stack, 1),
    (0x5b) = DupX2("dup_x2", Stack, 1),
    (0x5c) = Dup2("dup2", Stack, 1),
    (0x5d) = Dup2X1("dup2_x1", Stack, 1),
    (0x5e) = Dup2X2("dup2_x2", Stack, 1),
    /// Swap the top two operand stack values
    (0x5f) = Swap("swap", Stack, 1),
    (0x60) = Iadd("iadd", Operator, 1),
    (0x61) = Ladd("ladd", Operator, 1),
    (0x62) = Fadd("fadd", Operator, 1),
    (0x63) = Dadd("dadd", Operator, 1),
    (0x64) = Isub("isub", Operator, 1),
    (0x65) = Lsub("lsub", Operator, 1),
    (0x66) = Fsub("fsub", Operator, 1),
    (0x67) = Dsub("dsub", Operator, 1),
    (0x68) = Imul("imul", Operator, 1),
    (0x69) = Lmul("lmul", Operator, 1),
    (0x6a) = Fmul("fmul", Operator, 1),
    (0x6b) = Dmul("dmul", Operator, 1),
    (0x6c) = Idiv("idiv", Operator, 1),
    (0x6d) = Ldiv("ldiv", Operator, 1),
    (0x6e) = Fdiv("fdiv", Operator, 1),
    (0x6f) = Ddiv("ddiv", Operator, 1),
    (0x70) = Irem("irem", Operator, 1),
    (0x71) = Lrem("lrem", Operator, 1),
    (0x72) = Frem("frem", Operator, 1),
    (0x73) = Drem("drem", Operator, 1),
    (0x74) = Ineg("ineg", Operator, 1),
    (0x75) = Lneg("lneg", Operator, 1),
    (0x76) = Fneg("fneg", Operator, 1),
    (0x77) = Dneg("dneg", Operator, 1),
    (0x78) = Ishl("ishl", Operator, 1),
    (0x79) = Lshl("lshl", Operator, 1),
    (0x7a) = Ishr("ishr", Operator, 1),
    (0x7b) = Lshr("lshr", Operator, 1),
    (0x7c) = Iushr("iushr", Operator, 1),
    (0x7d) = Lushr("lushr", Operator, 1),
    (0x7e) = Iand("iand", Operator, 1),
    (0x7f) = Land("land", Operator, 1),
    (0x80) = Ior("ior", Operator, 1),
    (0x81) = Lor("lor", Operator, 1),
    (0x82) = Ixor("ixor", Operator, 1),
    (0x83) = Lxor("lxor", Operator, 1),
    /// Increment local variable by constant
    (0x84) = Iinc("iinc", Increment, 3),
    (0x85) = I2l("i2l", Convert, 1),
    (0x86) = I2f("i2f", Convert, 1),
    (0x87) = I2d("i2d", Convert, 1),
    (0x88) = L2i("l2i", Convert, 1),
    (0x89) = L2f("l2f", Convert, 1),
    (0x8a) = L2d("l2d", Convert, 1),
    (0x8b) = F2i("f2i", Convert, 1),
    (0x8c) = F2l("f2l", Convert, 1),
    (0x8d) = F2d("f2d", Convert, 1),
    (0x8e) = D2i("d2i", Convert, 1),
    (0x8f) = D2l("d2l", Convert, 1),
    (0x90) = D2f("d2f", Convert, 1),
    (0x91) = I2b("i2b", Convert, 1),
    (0x92) = I2c("i2c", Convert, 1),
    (0x93) = I2s("i2s", Convert, 1),
    /// Compare `long`
    (0x94) = Lcmp("lcmp", Operator, 1),
    (0x95) = Fcmpl("fcmpl", Operator, 1),
    (0x96) = Fcmpg("fcmpg", Operator, 1),
    (0x97) = Dcmpl("dcmpl", Operator, 1),
    (0x98) = Dcmpg("dcmpg", Operator, 1),
    /// Branch if `int` comparison with zero succeeds
    (0x99) = Ifeq("ifeq", Branch, 3),
    (0x9a) = Ifne("ifne", Branch, 3),
    (0x9b) = Iflt("iflt", Branch, 3),
    (0x9c) = Ifge("ifge", Branch, 3),
    (0x9d) = Ifgt("ifgt", Branch, 3),
    (0x9e) = Ifle("ifle", Branch, 3),
    /// Branch if `int` comparison succeeds
    (0x9f) = IfIcmpeq("if_icmpeq", Branch, 3),
    (0xa0) = IfIcmpne("if_icmpne", Branch, 3),
    (0xa1) = IfIcmplt("if_icmplt", Branch, 3),
    (0xa2) = IfIcmpge("if_icmpge", Branch, 3),
    (0xa3) = IfIcmpgt("if_icmpgt", Branch, 3),
    (0xa4) = IfIcmple("if_icmple", Branch, 3),
    /// Branch if `reference` comparison succeeds
    (0xa5) = IfAcmpeq("if_acmpeq", Branch, 3),
    (0xa6) = IfAcmpne("if_acmpne", Branch, 3),
    /// Branch always
    (0xa7) = Goto("goto", Branch, 3),
    /// Jump subroutine
    (0xa8) = Jsr("jsr", DiscontinuedJsr, 3),
    /// Return from subroutine
    (0xa9) = Ret("ret", DiscontinuedRet, 2),
    /// Access jump table by index and jump
    (0xaa) = Tableswitch("tableswitch", TableSwitch, 0),
    /// Access jump table by key match and jump
    (0xab) = Lookupswitch("lookupswitch", LookupSwitch, 0),
    (0xac) = Ireturn("ireturn", Return, 1),
    (0xad) = Lreturn("lreturn", Return, 1),
    (0xae) = Freturn("freturn", Return, 1),
    (0xaf) = Dreturn("dreturn", Return, 1),
    (0xb0) = Areturn("areturn", Return, 1),
    /// Return `void` from method
    (0xb1) = Return("return", Return, 1),
    (0xb2) = Getstatic("getstatic", FieldAccess, 3),
    (0xb3) = Putstatic("putstatic", FieldAccess, 3),
    (0xb4) = Getfield("getfield", FieldAccess, 3),
    (0xb5) = Putfield("putfield", FieldAccess, 3),
    (0xb6) = Invokevirtual("invokevirtual", Invoke, 3),
    (0xb7) = Invokespecial("invokespecial", Invoke, 3),
    (0xb8) = Invokestatic("invokestatic", Invoke, 3),
    /// Invoke interface method; carries an argument count and a zero byte
    (0xb9) = Invokeinterface("invokeinterface", Invoke, 5),
    /// Invoke a dynamically-computed call site; carries two zero bytes
    (0xba) = Invokedynamic("invokedynamic", InvokeDynamic, 5),
    /// Create new object
    (0xbb) = New("new", NewObject, 3),
    /// Create new array of primitive type
    (0xbc) = Newarray("newarray", NewPrimitiveArray, 2),
    /// Create new array of `reference`
    (0xbd) = Anewarray("anewarray", NewReferenceArray, 3),
    /// Get length of array
    (0xbe) = Arraylength("arraylength", Operator, 1),
    /// Throw exception or error
    (0xbf) = Athrow("athrow", ThrowException, 1),
    /// Check whether object is of given type
    (0xc0) = Checkcast("checkcast", TypeCheck, 3),
    /// Determine if object is of given type
    (0xc1) = Instanceof("instanceof", TypeCheck, 3),
    (0xc2) = Monitorenter("monitorenter", Monitor, 1),
    (0xc3) = Monitorexit("monitorexit", Monitor, 1),
    /// Create new multidimensional array
    (0xc5) = Multianewarray("multianewarray", NewMultiArray, 4),
    (0xc6) = Ifnull("ifnull", Branch, 3),
    (0xc7) = Ifnonnull("ifnonnull", Branch, 3),
    /// Branch always (wide index)
    (0xc8) = GotoW("goto_w", Branch, 5),
    /// Jump subroutine (wide index)
    (0xc9) = JsrW("jsr_w", DiscontinuedJsr, 5),
    /// `wide iload`
    (0xc415) = IloadW("iload_w", Load, 4),
    (0xc416) = LloadW("lload_w", Load, 4),
    (0xc417) = FloadW("fload_w", Load, 4),
    (0xc418) = DloadW("dload_w", Load, 4),
    (0xc419) = AloadW("aload_w", Load, 4),
    (0xc436) = IstoreW("istore_w", Store, 4),
    (0xc437) = LstoreW("lstore_w", Store, 4),
    (0xc438) = FstoreW("fstore_w", Store, 4),
    (0xc439) = DstoreW("dstore_w", Store, 4),
    (0xc43a) = AstoreW("astore_w", Store, 4),
    /// `wide iinc`, with a 16-bit slot and a 16-bit constant
    (0xc484) = IincW("iinc_w", Increment, 6),
    (0xc4a9) = RetW("ret_w", DiscontinuedRet, 4),
}

static BY_BYTE: Lazy<[Option<Opcode>; 256]> = Lazy::new(|| {
    let mut table = [None; 256];
    for op in Opcode::ALL.iter().filter(|op| !op.is_wide()) {
        table[op.bytecode() as usize] = Some(*op);
    }
    table
});

static BY_WIDE_BYTE: Lazy<[Option<Opcode>; 256]> = Lazy::new(|| {
    let mut table = [None; 256];
    for op in Opcode::ALL.iter().filter(|op| op.is_wide()) {
        table[(op.bytecode() & 0xff) as usize] = Some(*op);
    }
    table
});

static BY_MNEMONIC: Lazy<FnvHashMap<&'static str, Opcode>> =
    Lazy::new(|| Opcode::ALL.iter().map(|op| (op.mnemonic(), *op)).collect());

impl Opcode {
    /// Resolve an opcode byte. The `wide` prefix is not an opcode on its own.
    pub fn lookup(byte: u8) -> Result<Opcode, MalformedCode> {
        BY_BYTE[byte as usize].ok_or(MalformedCode::UnknownOpcode(byte))
    }

    /// Resolve the byte following a `wide` prefix.
    pub fn lookup_wide(byte: u8) -> Result<Opcode, MalformedCode> {
        BY_WIDE_BYTE[byte as usize].ok_or(MalformedCode::UnknownWideOpcode(byte))
    }

    pub fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
        BY_MNEMONIC.get(mnemonic).copied()
    }

    pub const fn is_wide(self) -> bool {
        self.bytecode() > 0xff
    }

    /// The encoded size when it does not depend on position or operands.
    pub const fn fixed_size(self) -> Option<usize> {
        match self.size() {
            OpcodeSize::Fixed(n) => Some(n as usize),
            OpcodeSize::Variable => None,
        }
    }

    pub fn flags(self) -> OpcodeFlags {
        let mut flags = OpcodeFlags::empty();
        match self.kind() {
            Kind::Branch | Kind::DiscontinuedJsr => flags |= OpcodeFlags::BRANCH,
            Kind::TableSwitch | Kind::LookupSwitch => {
                flags |= OpcodeFlags::BRANCH | OpcodeFlags::UNCONDITIONAL | OpcodeFlags::VARIABLE_SIZE
            }
            Kind::Return | Kind::ThrowException | Kind::DiscontinuedRet => {
                flags |= OpcodeFlags::UNCONDITIONAL
            }
            _ => (),
        }
        if matches!(self, Opcode::Goto | Opcode::GotoW) {
            flags |= OpcodeFlags::UNCONDITIONAL;
        }
        if self.is_wide() {
            flags |= OpcodeFlags::WIDE;
        }
        flags
    }

    /// The value category the opcode operates on, where it names one.
    ///
    /// Array opcodes report their element category; `baload`/`bastore` report `byte`.
    pub fn primary_type_kind(self) -> Option<TypeKind> {
        use Opcode::*;
        let kind = match self {
            Iload | Iload0 | Iload1 | Iload2 | Iload3 | IloadW | Istore | Istore0 | Istore1
            | Istore2 | Istore3 | IstoreW | Iaload | Iastore | Ireturn | Iadd | Isub | Imul
            | Idiv | Irem | Ineg | Ishl | Ishr | Iushr | Iand | Ior | Ixor | Arraylength | Ifeq
            | Ifne | Iflt | Ifge | Ifgt | Ifle | IfIcmpeq | IfIcmpne | IfIcmplt | IfIcmpge
            | IfIcmpgt | IfIcmple | Iinc | IincW | IconstM1 | Iconst0 | Iconst1 | Iconst2
            | Iconst3 | Iconst4 | Iconst5 | Bipush | Sipush => TypeKind::Int,
            Lload | Lload0 | Lload1 | Lload2 | Lload3 | LloadW | Lstore | Lstore0 | Lstore1
            | Lstore2 | Lstore3 | LstoreW | Laload | Lastore | Lreturn | Ladd | Lsub | Lmul
            | Ldiv | Lrem | Lneg | Lshl | Lshr | Lushr | Land | Lor | Lxor | Lcmp | Lconst0
            | Lconst1 => TypeKind::Long,
            Fload | Fload0 | Fload1 | Fload2 | Fload3 | FloadW | Fstore | Fstore0 | Fstore1
            | Fstore2 | Fstore3 | FstoreW | Faload | Fastore | Freturn | Fadd | Fsub | Fmul
            | Fdiv | Frem | Fneg | Fcmpl | Fcmpg | Fconst0 | Fconst1 | Fconst2 => TypeKind::Float,
            Dload | Dload0 | Dload1 | Dload2 | Dload3 | DloadW | Dstore | Dstore0 | Dstore1
            | Dstore2 | Dstore3 | DstoreW | Daload | Dastore | Dreturn | Dadd | Dsub | Dmul
            | Ddiv | Drem | Dneg | Dcmpl | Dcmpg | Dconst0 | Dconst1 => TypeKind::Double,
            Aload | Aload0 | Aload1 | Aload2 | Aload3 | AloadW | Astore | Astore0 | Astore1
            | Astore2 | Astore3 | AstoreW | Aaload | Aastore | Areturn | AconstNull | IfAcmpeq
            | IfAcmpne | Ifnull | Ifnonnull => TypeKind::Reference,
            Baload | Bastore => TypeKind::Byte,
            Caload | Castore => TypeKind::Char,
            Saload | Sastore => TypeKind::Short,
            Return => TypeKind::Void,
            _ => return None,
        };
        Some(kind)
    }

    /// The local variable slot baked into forms such as `iload_2`.
    pub fn implicit_slot(self) -> Option<u16> {
        use Opcode::*;
        match self {
            Iload0 | Lload0 | Fload0 | Dload0 | Aload0 | Istore0 | Lstore0 | Fstore0
            | Dstore0 | Astore0 => Some(0),
            Iload1 | Lload1 | Fload1 | Dload1 | Aload1 | Istore1 | Lstore1 | Fstore1
            | Dstore1 | Astore1 => Some(1),
            Iload2 | Lload2 | Fload2 | Dload2 | Aload2 | Istore2 | Lstore2 | Fstore2
            | Dstore2 | Astore2 => Some(2),
            Iload3 | Lload3 | Fload3 | Dload3 | Aload3 | Istore3 | Lstore3 | Fstore3
            | Dstore3 | Astore3 => Some(3),
            _ => None,
        }
    }

    /// The value pushed by operand-free constant opcodes such as `iconst_m1`.
    pub fn intrinsic_value(self) -> Option<ConstantValue> {
        use Opcode::*;
        let value = match self {
            AconstNull => ConstantValue::Null,
            IconstM1 => ConstantValue::Integer(-1),
            Iconst0 => ConstantValue::Integer(0),
            Iconst1 => ConstantValue::Integer(1),
            Iconst2 => ConstantValue::Integer(2),
            Iconst3 => ConstantValue::Integer(3),
            Iconst4 => ConstantValue::Integer(4),
            Iconst5 => ConstantValue::Integer(5),
            Lconst0 => ConstantValue::Long(0),
            Lconst1 => ConstantValue::Long(1),
            Fconst0 => ConstantValue::Float(0.0f32.to_bits()),
            Fconst1 => ConstantValue::Float(1.0f32.to_bits()),
            Fconst2 => ConstantValue::Float(2.0f32.to_bits()),
            Dconst0 => ConstantValue::Double(0.0f64.to_bits()),
            Dconst1 => ConstantValue::Double(1.0f64.to_bits()),
            _ => return None,
        };
        Some(value)
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

static_assertions::assert_eq_size!(Opcode, u8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_opcode_round_trips_through_lookup() {
        for op in Opcode::ALL.iter().copied() {
            let found = if op.is_wide() {
                Opcode::lookup_wide((op.bytecode() & 0xff) as u8)
            } else {
                Opcode::lookup(op.bytecode() as u8)
            };
            assert_eq!(found, Ok(op));
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(op));
        }
    }

    #[test]
    fn opcode_count() {
        assert_eq!(Opcode::ALL.len(), 201 + 12);
    }

    #[test]
    fn undefined_bytes_are_rejected() {
        for byte in [WIDE, 0xca, 0xfe, 0xff] {
            assert_eq!(Opcode::lookup(byte), Err(MalformedCode::UnknownOpcode(byte)));
        }
        assert_eq!(
            Opcode::lookup_wide(0x10),
            Err(MalformedCode::UnknownWideOpcode(0x10))
        );
    }

    #[test]
    fn sizes() {
        assert_eq!(Opcode::Bastore.size(), OpcodeSize::Fixed(1));
        assert_eq!(Opcode::Invokeinterface.size(), OpcodeSize::Fixed(5));
        assert_eq!(Opcode::IincW.size(), OpcodeSize::Fixed(6));
        assert_eq!(Opcode::Tableswitch.size(), OpcodeSize::Variable);
        assert_eq!(Opcode::Lookupswitch.fixed_size(), None);
    }

    #[test]
    fn kinds_and_flags() {
        assert_eq!(Opcode::Bastore.kind(), Kind::ArrayStore);
        assert_eq!(Opcode::Baload.kind(), Kind::ArrayLoad);
        assert_eq!(Opcode::Arraylength.kind(), Kind::Operator);
        assert!(Opcode::Goto.flags().contains(OpcodeFlags::BRANCH | OpcodeFlags::UNCONDITIONAL));
        assert!(!Opcode::Ifeq.flags().contains(OpcodeFlags::UNCONDITIONAL));
        assert!(Opcode::AloadW.flags().contains(OpcodeFlags::WIDE));
        assert!(Opcode::Athrow.flags().contains(OpcodeFlags::UNCONDITIONAL));
    }

    #[test]
    fn metadata() {
        assert_eq!(Opcode::Bastore.primary_type_kind(), Some(TypeKind::Byte));
        assert_eq!(Opcode::Astore3.implicit_slot(), Some(3));
        assert_eq!(Opcode::Astore.implicit_slot(), None);
        assert_eq!(Opcode::IconstM1.intrinsic_value(), Some(ConstantValue::Integer(-1)));
        assert_eq!(Opcode::Bipush.intrinsic_value(), None);
    }
}
