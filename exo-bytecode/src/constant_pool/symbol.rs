//! Resolved constant pool symbols, as carried by instructions.

use std::fmt::{self, Display};

use crate::{descriptor, type_kind::TypeKind};

use super::RefKind;

/// A resolved `CONSTANT_Class` entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassEntry {
    pub(crate) index: u16,
    pub(crate) name: String,
}

impl ClassEntry {
    /// The pool index the entry was resolved from.
    pub fn index(&self) -> u16 {
        self.index
    }

    /// The binary name in internal form, or an array descriptor.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for ClassEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.index, self.name)
    }
}

/// Which kind of member reference an entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    Method,
    InterfaceMethod,
}

/// A resolved `Fieldref`, `Methodref` or `InterfaceMethodref` entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub(crate) index: u16,
    pub(crate) kind: MemberKind,
    pub(crate) owner: ClassEntry,
    pub(crate) name: String,
    pub(crate) descriptor: String,
}

impl MemberRef {
    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn owner(&self) -> &ClassEntry {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }
}

impl Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {}.{}:{}",
            self.index, self.owner.name, self.name, self.descriptor
        )
    }
}

/// A resolved `InvokeDynamic` entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvokeDynamicEntry {
    pub(crate) index: u16,
    pub(crate) bootstrap_method: u16,
    pub(crate) name: String,
    pub(crate) descriptor: String,
}

impl InvokeDynamicEntry {
    pub fn index(&self) -> u16 {
        self.index
    }

    /// Index into the class's bootstrap method table.
    pub fn bootstrap_method(&self) -> u16 {
        self.bootstrap_method
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The call site's method descriptor.
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }
}

/// A value an instruction pushes, whether it comes from the opcode itself,
/// an immediate operand or the constant pool.
///
/// Floating point values are held as raw IEEE 754 bits so equality and
/// hashing are total.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstantValue {
    Null,
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    String(String),
    /// A class literal, by internal name.
    Class(String),
    /// A method type, by descriptor.
    MethodType(String),
    MethodHandle {
        kind: RefKind,
        reference: MemberRef,
    },
    Dynamic {
        bootstrap_method: u16,
        name: String,
        descriptor: String,
    },
}

impl ConstantValue {
    pub fn float(value: f32) -> Self {
        Self::Float(value.to_bits())
    }

    pub fn double(value: f64) -> Self {
        Self::Double(value.to_bits())
    }

    /// Whether the value needs `ldc2_w`.
    pub fn is_wide(&self) -> bool {
        match self {
            Self::Long(_) | Self::Double(_) => true,
            Self::Dynamic { descriptor, .. } => matches!(descriptor.as_str(), "J" | "D"),
            _ => false,
        }
    }

    /// The category of the value on the operand stack.
    pub fn type_kind(&self) -> TypeKind {
        match self {
            Self::Integer(_) => TypeKind::Int,
            Self::Float(_) => TypeKind::Float,
            Self::Long(_) => TypeKind::Long,
            Self::Double(_) => TypeKind::Double,
            Self::Dynamic { descriptor, .. } => descriptor::field_type_kind(descriptor)
                .map(TypeKind::as_loadable)
                .unwrap_or(TypeKind::Reference),
            _ => TypeKind::Reference,
        }
    }
}

/// A loadable constant resolved from the pool, tagged with its index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadableConstant {
    pub(crate) index: u16,
    pub(crate) value: ConstantValue,
}

impl LoadableConstant {
    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn value(&self) -> &ConstantValue {
        &self.value
    }
}
