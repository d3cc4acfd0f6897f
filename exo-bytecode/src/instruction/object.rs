use crate::{
    constant_pool::{ClassEntry, ConstantResolver},
    descriptor::FieldType,
    error::{self, CodeError, MalformedCode},
    opcode::{Kind, Opcode},
    stream::{CodeItem, CodeStream, CodeWriter},
    type_kind::{ArrayTypeCode, TypeKind},
};

use super::{check_kind, illegal_operand, write_opcode, TypedInstruction};

/// `new`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NewObjectInstruction {
    class_entry: ClassEntry,
}

impl NewObjectInstruction {
    pub(crate) fn new_unchecked(class_entry: ClassEntry) -> Self {
        Self { class_entry }
    }

    pub fn of(class_entry: ClassEntry) -> error::Result<Self> {
        if class_entry.name().starts_with('[') {
            return Err(illegal_operand(Opcode::New, "cannot instantiate an array type"));
        }
        Ok(Self::new_unchecked(class_entry))
    }

    pub fn class_entry(&self) -> &ClassEntry {
        &self.class_entry
    }

    pub(crate) fn read<R>(s: &mut CodeStream<'_>, cp: &R) -> error::Result<Self>
    where
        R: ConstantResolver + ?Sized,
    {
        Ok(Self::new_unchecked(cp.class_entry(s.read_u2()?)?))
    }

    pub(crate) fn write(&self, w: &mut CodeWriter) {
        write_opcode(w, Opcode::New);
        w.write_u2(self.class_entry.index());
    }
}

impl TypedInstruction for NewObjectInstruction {
    const KIND: Kind = Kind::NewObject;

    fn opcode(&self) -> Opcode {
        Opcode::New
    }
}

/// `newarray`, for arrays of a primitive type.
///
/// Unlike array loads and stores, `boolean` keeps its own type code here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NewPrimitiveArrayInstruction {
    code: ArrayTypeCode,
}

impl NewPrimitiveArrayInstruction {
    pub(crate) fn new_unchecked(code: ArrayTypeCode) -> Self {
        Self { code }
    }

    pub fn of(kind: TypeKind) -> error::Result<Self> {
        kind.array_type_code()
            .map(Self::new_unchecked)
            .ok_or(CodeError::IllegalTypeKind {
                kind,
                reason: "newarray only creates arrays of primitives",
            })
    }

    pub fn type_kind(&self) -> TypeKind {
        self.code.into()
    }

    pub(crate) fn read(s: &mut CodeStream<'_>) -> error::Result<Self> {
        Ok(Self::new_unchecked(ArrayTypeCode::read_from_stream(s)?))
    }

    pub(crate) fn write(&self, w: &mut CodeWriter) {
        write_opcode(w, Opcode::Newarray);
        self.code.write_to_stream(w);
    }
}

impl TypedInstruction for NewPrimitiveArrayInstruction {
    const KIND: Kind = Kind::NewPrimitiveArray;

    fn opcode(&self) -> Opcode {
        Opcode::Newarray
    }
}

/// `anewarray`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NewReferenceArrayInstruction {
    component_type: ClassEntry,
}

impl NewReferenceArrayInstruction {
    pub(crate) fn new_unchecked(component_type: ClassEntry) -> Self {
        Self { component_type }
    }

    pub fn of(component_type: ClassEntry) -> error::Result<Self> {
        Ok(Self::new_unchecked(component_type))
    }

    pub fn component_type(&self) -> &ClassEntry {
        &self.component_type
    }

    pub(crate) fn read<R>(s: &mut CodeStream<'_>, cp: &R) -> error::Result<Self>
    where
        R: ConstantResolver + ?Sized,
    {
        Ok(Self::new_unchecked(cp.class_entry(s.read_u2()?)?))
    }

    pub(crate) fn write(&self, w: &mut CodeWriter) {
        write_opcode(w, Opcode::Anewarray);
        w.write_u2(self.component_type.index());
    }
}

impl TypedInstruction for NewReferenceArrayInstruction {
    const KIND: Kind = Kind::NewReferenceArray;

    fn opcode(&self) -> Opcode {
        Opcode::Anewarray
    }
}

/// `multianewarray`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NewMultiArrayInstruction {
    array_type: ClassEntry,
    dimensions: u8,
}

impl NewMultiArrayInstruction {
    pub(crate) fn new_unchecked(array_type: ClassEntry, dimensions: u8) -> Self {
        Self {
            array_type,
            dimensions,
        }
    }

    /// `dimensions` must be at least one and at most the array type's rank.
    pub fn of(array_type: ClassEntry, dimensions: u8) -> error::Result<Self> {
        let op = Opcode::Multianewarray;
        if dimensions == 0 {
            return Err(illegal_operand(op, "dimensions must be at least one"));
        }
        let rank = FieldType::parse(array_type.name())
            .map(|t| t.dimensions())
            .ok_or_else(|| illegal_operand(op, "class entry is not an array descriptor"))?;
        if dimensions as usize > rank {
            return Err(illegal_operand(op, "more dimensions than the array type has"));
        }
        Ok(Self::new_unchecked(array_type, dimensions))
    }

    pub fn array_type(&self) -> &ClassEntry {
        &self.array_type
    }

    pub fn dimensions(&self) -> u8 {
        self.dimensions
    }

    pub(crate) fn read<R>(s: &mut CodeStream<'_>, cp: &R) -> error::Result<Self>
    where
        R: ConstantResolver + ?Sized,
    {
        let index = s.read_u2()?;
        let dimensions = s.read_u1()?;
        if dimensions == 0 {
            return Err(CodeError::malformed(s.marked(), MalformedCode::ZeroDimensions));
        }
        Ok(Self::new_unchecked(cp.class_entry(index)?, dimensions))
    }

    pub(crate) fn write(&self, w: &mut CodeWriter) {
        write_opcode(w, Opcode::Multianewarray);
        w.write_u2(self.array_type.index());
        w.write_u1(self.dimensions);
    }
}

impl TypedInstruction for NewMultiArrayInstruction {
    const KIND: Kind = Kind::NewMultiArray;

    fn opcode(&self) -> Opcode {
        Opcode::Multianewarray
    }
}

/// `checkcast` and `instanceof`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeCheckInstruction {
    opcode: Opcode,
    class_entry: ClassEntry,
}

impl TypeCheckInstruction {
    pub(crate) fn new_unchecked(opcode: Opcode, class_entry: ClassEntry) -> Self {
        Self {
            opcode,
            class_entry,
        }
    }

    pub fn of(opcode: Opcode, class_entry: ClassEntry) -> error::Result<Self> {
        check_kind(opcode, Kind::TypeCheck)?;
        Ok(Self::new_unchecked(opcode, class_entry))
    }

    pub fn class_entry(&self) -> &ClassEntry {
        &self.class_entry
    }

    pub(crate) fn read<R>(opcode: Opcode, s: &mut CodeStream<'_>, cp: &R) -> error::Result<Self>
    where
        R: ConstantResolver + ?Sized,
    {
        Ok(Self::new_unchecked(opcode, cp.class_entry(s.read_u2()?)?))
    }

    pub(crate) fn write(&self, w: &mut CodeWriter) {
        write_opcode(w, self.opcode);
        w.write_u2(self.class_entry.index());
    }
}

impl TypedInstruction for TypeCheckInstruction {
    const KIND: Kind = Kind::TypeCheck;

    fn opcode(&self) -> Opcode {
        self.opcode
    }
}
