use crate::{constant_pool::ClassEntry, instruction::Instruction};

use super::Label;

/// One entry of a code element sequence.
///
/// Only [`Instruction`](CodeElement::Instruction) occupies bytes in the code
/// array; every other element is a marker positioned by labels or by where it
/// appears in the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CodeElement {
    Instruction(Instruction),
    /// Marks the position of the next instruction.
    Label(Label),
    /// The next instruction starts source line `line`.
    LineNumber { line: u16 },
    LocalVariable {
        slot: u16,
        name: String,
        descriptor: String,
        start: Label,
        end: Label,
    },
    /// A local variable's generic signature.
    LocalVariableType {
        slot: u16,
        name: String,
        signature: String,
        start: Label,
        end: Label,
    },
    /// Instructions in `try_start..try_end` are handled at `handler`.
    /// A `catch_type` of `None` catches everything.
    ExceptionCatch {
        try_start: Label,
        try_end: Label,
        handler: Label,
        catch_type: Option<ClassEntry>,
    },
}

impl CodeElement {
    pub fn as_instruction(&self) -> Option<&Instruction> {
        match self {
            CodeElement::Instruction(i) => Some(i),
            _ => None,
        }
    }
}

impl From<Instruction> for CodeElement {
    fn from(i: Instruction) -> Self {
        CodeElement::Instruction(i)
    }
}

impl From<Label> for CodeElement {
    fn from(l: Label) -> Self {
        CodeElement::Label(l)
    }
}
