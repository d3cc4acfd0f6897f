use thiserror::Error;

use crate::{
    code::Label,
    opcode::{Kind, Opcode},
    type_kind::TypeKind,
};

/// An error which can occur while decoding, constructing or encoding code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeError {
    /// Returned when an opcode is handed to the constructor of a different instruction family.
    #[error("opcode {opcode} is of kind {actual:?}, expected {expected:?}", actual = .opcode.kind())]
    KindMismatch { opcode: Opcode, expected: Kind },

    /// Returned when an operand cannot be encoded by the requested opcode.
    #[error("illegal operand for {opcode}: {reason}")]
    IllegalOperand { opcode: Opcode, reason: &'static str },

    /// Returned when a type kind has no instruction of the requested shape.
    #[error("illegal type kind {kind:?}: {reason}")]
    IllegalTypeKind { kind: TypeKind, reason: &'static str },

    /// Returned when the code array is structurally invalid.
    #[error("malformed code at offset {offset}: {kind}")]
    Malformed { offset: usize, kind: MalformedCode },

    /// Returned by `finish` when a referenced label was never placed.
    #[error("label {0} is referenced but never placed")]
    UnresolvedLabel(Label),

    /// Returned when a label is placed a second time.
    #[error("label {0} is already placed")]
    LabelAlreadyPlaced(Label),

    /// Returned by `finish` when a range ends before it starts, or an exception range is empty.
    #[error("label range {start}..{end} is empty or inverted")]
    BadLabelRange { start: Label, end: Label },

    /// Returned when a branch offset does not fit its operand.
    #[error("branch at bci {bci} cannot reach offset {offset}")]
    BranchOffsetOverflow { bci: usize, offset: i64 },

    /// Returned when the constant pool collaborator rejects a lookup.
    #[error(transparent)]
    ConstantPool(#[from] ConstantPoolError),
}

impl CodeError {
    pub(crate) fn malformed(offset: usize, kind: MalformedCode) -> Self {
        Self::Malformed { offset, kind }
    }
}

/// The structural violations the decode path detects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedCode {
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),

    #[error("opcode 0x{0:02x} cannot follow `wide`")]
    UnknownWideOpcode(u8),

    #[error("instruction runs past the end of the code array")]
    Truncated,

    #[error("branch target {0} is not the start of an instruction")]
    BadBranchTarget(i64),

    #[error("tableswitch low {low} is greater than high {high}")]
    TableSwitchLowGtHigh { low: i32, high: i32 },

    #[error("lookupswitch has a negative pair count {0}")]
    LookupSwitchNegativePairs(i32),

    #[error("lookupswitch keys are not sorted")]
    LookupSwitchBadSort,

    #[error("unknown newarray type code {0}")]
    UnknownArrayType(u8),

    #[error("multianewarray with zero dimensions")]
    ZeroDimensions,

    #[error("reserved operand bytes are not zero")]
    NonZeroReserved,

    #[error("code array is empty")]
    EmptyCode,

    #[error("code array of {0} bytes exceeds 65535")]
    CodeTooLarge(usize),

    #[error("table entry refers to pc {0} outside the code array")]
    BadTablePc(usize),
}

/// An error raised by the constant pool when resolving an index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstantPoolError {
    #[error("constant pool index {0} out of range")]
    IndexOutOfRange(u16),

    #[error("constant pool entry {index} is not a {expected} entry")]
    WrongEntryKind { index: u16, expected: &'static str },

    #[error("unknown constant pool tag {0}")]
    UnknownTag(u8),

    #[error("unknown method handle reference kind {0}")]
    UnknownReferenceKind(u8),

    #[error("invalid UTF-8 in constant pool entry")]
    InvalidUtf8,

    #[error("string of {0} encoded bytes does not fit a Utf8 entry")]
    Utf8TooLong(usize),

    #[error("constant pool entry {index} has a malformed descriptor")]
    InvalidDescriptor { index: u16 },

    #[error("constant pool is full")]
    Overflow,
}

pub type Result<T> = std::result::Result<T, CodeError>;
