use crate::{
    constant_pool::{ConstantResolver, MemberKind, MemberRef},
    descriptor,
    error::{self, ConstantPoolError},
    opcode::{Kind, Opcode},
    stream::{CodeStream, CodeWriter},
    type_kind::TypeKind,
};

use super::{check_kind, illegal_operand, write_opcode, TypedInstruction};

/// `getstatic`, `putstatic`, `getfield` and `putfield`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldInstruction {
    opcode: Opcode,
    field: MemberRef,
    type_kind: TypeKind,
}

impl FieldInstruction {
    pub(crate) fn new_unchecked(opcode: Opcode, field: MemberRef, type_kind: TypeKind) -> Self {
        Self {
            opcode,
            field,
            type_kind,
        }
    }

    pub fn of(opcode: Opcode, field: MemberRef) -> error::Result<Self> {
        check_kind(opcode, Kind::FieldAccess)?;
        if field.kind() != MemberKind::Field {
            return Err(illegal_operand(opcode, "operand is not a field reference"));
        }
        let type_kind = descriptor::field_type_kind(field.descriptor())
            .ok_or_else(|| illegal_operand(opcode, "malformed field descriptor"))?;
        Ok(Self::new_unchecked(opcode, field, type_kind))
    }

    pub fn field(&self) -> &MemberRef {
        &self.field
    }

    pub fn is_static(&self) -> bool {
        matches!(self.opcode, Opcode::Getstatic | Opcode::Putstatic)
    }

    pub fn is_put(&self) -> bool {
        matches!(self.opcode, Opcode::Putstatic | Opcode::Putfield)
    }

    /// The kind of the field's declared type.
    pub fn type_kind(&self) -> TypeKind {
        self.type_kind
    }

    pub(crate) fn read<R>(opcode: Opcode, s: &mut CodeStream<'_>, cp: &R) -> error::Result<Self>
    where
        R: ConstantResolver + ?Sized,
    {
        let index = s.read_u2()?;
        let field = cp.member_ref(index)?;
        if field.kind() != MemberKind::Field {
            return Err(ConstantPoolError::WrongEntryKind {
                index,
                expected: "Fieldref",
            }
            .into());
        }
        let type_kind = descriptor::field_type_kind(field.descriptor())
            .ok_or(ConstantPoolError::InvalidDescriptor { index })?;
        Ok(Self::new_unchecked(opcode, field, type_kind))
    }

    pub(crate) fn write(&self, w: &mut CodeWriter) {
        write_opcode(w, self.opcode);
        w.write_u2(self.field.index());
    }
}

impl TypedInstruction for FieldInstruction {
    const KIND: Kind = Kind::FieldAccess;

    fn opcode(&self) -> Opcode {
        self.opcode
    }
}
