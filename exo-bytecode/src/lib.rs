//! Typed JVM instructions.
//!
//! Decodes the code array of a `Code` attribute into a sequence of strongly
//! typed, immutable instruction values and encodes such sequences back into
//! bytes, validating what an instruction value needs to be encodable.

/// Macro for a fieldless enum read from and written to a fixed-width code.
macro_rules! numerical_enum {
    (
        $(#[$inner:meta])*
        $name:ident: $vartype:ty {
            $(
                $vident:ident = $val:literal
            ),* $(,)?
        } => $err:expr
    ) => {
        $(#[$inner])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $(
                $vident
            ),*
        }

        impl $name {
            pub const fn code(self) -> $vartype {
                match self {
                    $(Self::$vident => $val),*
                }
            }
        }

        impl $crate::stream::CodeItem for $name {
            fn read_from_stream(s: &mut $crate::stream::CodeStream<'_>) -> $crate::error::Result<Self> {
                match <$vartype as $crate::stream::CodeItem>::read_from_stream(s)? {
                    $(
                        $val => Ok(Self::$vident),
                    )*
                    v => Err(($err)(&*s, v)),
                }
            }

            fn write_to_stream(&self, w: &mut $crate::stream::CodeWriter) {
                <$vartype as $crate::stream::CodeItem>::write_to_stream(&self.code(), w)
            }
        }
    };
}

pub mod code;
pub mod constant_pool;
pub mod descriptor;
pub mod error;
pub mod instruction;
pub mod opcode;
pub mod stream;
pub mod type_kind;

pub use code::{
    BuiltCode, CodeAttribute, CodeBuilder, CodeElement, CodeElements, CodeModel, CodeOptions,
    Label,
};
pub use constant_pool::{ConstantPool, ConstantResolver};
pub use error::{CodeError, Result};
pub use instruction::{Instruction, TypedInstruction};
pub use opcode::{Kind, Opcode};
pub use type_kind::TypeKind;
