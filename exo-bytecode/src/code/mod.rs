//! Code element sequences: decoding a `Code` attribute into elements and
//! building a new code array from them.

pub mod attribute;
mod builder;
mod element;
mod label;
mod model;
mod options;

pub use self::attribute::{
    CodeAttribute, ExceptionTableEntry, LineNumberTableEntry, LocalVariableTableEntry,
};
pub use self::builder::{BuiltCode, CodeBuilder};
pub use self::element::CodeElement;
pub use self::label::Label;
pub(crate) use self::label::{LabelAllocator, LabelTable};
pub use self::model::{CodeElements, CodeModel};
pub use self::options::{CodeOptions, DeadLabels, DebugElements, LineNumbers};
