use crate::{
    error::{self, CodeError},
    opcode::{Kind, Opcode},
    type_kind::TypeKind,
};

use super::{check_kind, TypedInstruction};

/// Load an element from an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayLoadInstruction {
    opcode: Opcode,
}

impl ArrayLoadInstruction {
    pub(crate) fn new_unchecked(opcode: Opcode) -> Self {
        Self { opcode }
    }

    pub fn of(opcode: Opcode) -> error::Result<Self> {
        check_kind(opcode, Kind::ArrayLoad)?;
        Ok(Self::new_unchecked(opcode))
    }

    /// The load for an element kind; `boolean` arrays use `baload`.
    pub fn of_kind(kind: TypeKind) -> error::Result<Self> {
        kind.array_load_opcode()
            .map(Self::new_unchecked)
            .ok_or(CodeError::IllegalTypeKind {
                kind,
                reason: "no array load instruction for this kind",
            })
    }

    /// The element kind. Never `Boolean`: `baload` reports `Byte`.
    pub fn type_kind(&self) -> TypeKind {
        TypeKind::for_array_load_opcode(self.opcode)
    }
}

impl TypedInstruction for ArrayLoadInstruction {
    const KIND: Kind = Kind::ArrayLoad;

    fn opcode(&self) -> Opcode {
        self.opcode
    }
}

/// Store a value into an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayStoreInstruction {
    opcode: Opcode,
}

impl ArrayStoreInstruction {
    pub(crate) fn new_unchecked(opcode: Opcode) -> Self {
        Self { opcode }
    }

    pub fn of(opcode: Opcode) -> error::Result<Self> {
        check_kind(opcode, Kind::ArrayStore)?;
        Ok(Self::new_unchecked(opcode))
    }

    /// The store for an element kind; `boolean` arrays use `bastore`.
    pub fn of_kind(kind: TypeKind) -> error::Result<Self> {
        kind.array_store_opcode()
            .map(Self::new_unchecked)
            .ok_or(CodeError::IllegalTypeKind {
                kind,
                reason: "no array store instruction for this kind",
            })
    }

    /// The element kind. Never `Boolean`: `bastore` reports `Byte`.
    pub fn type_kind(&self) -> TypeKind {
        TypeKind::for_array_store_opcode(self.opcode)
    }
}

impl TypedInstruction for ArrayStoreInstruction {
    const KIND: Kind = Kind::ArrayStore;

    fn opcode(&self) -> Opcode {
        self.opcode
    }
}
