use crate::{
    constant_pool::{ConstantResolver, InvokeDynamicEntry, MemberKind, MemberRef},
    descriptor::MethodDescriptor,
    error::{self, CodeError, ConstantPoolError, MalformedCode},
    opcode::{Kind, Opcode},
    stream::{CodeStream, CodeWriter},
    type_kind::TypeKind,
};

use super::{check_kind, illegal_operand, write_opcode, TypedInstruction};

/// `invokevirtual`, `invokespecial`, `invokestatic` and `invokeinterface`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvokeInstruction {
    opcode: Opcode,
    method: MemberRef,
    count: u8,
    return_kind: TypeKind,
}

impl InvokeInstruction {
    pub(crate) fn new_unchecked(
        opcode: Opcode,
        method: MemberRef,
        count: u8,
        return_kind: TypeKind,
    ) -> Self {
        Self {
            opcode,
            method,
            count,
            return_kind,
        }
    }

    /// For `invokeinterface` the count operand is derived from the descriptor.
    pub fn of(opcode: Opcode, method: MemberRef) -> error::Result<Self> {
        check_kind(opcode, Kind::Invoke)?;
        let allowed = match opcode {
            Opcode::Invokevirtual => method.kind() == MemberKind::Method,
            Opcode::Invokeinterface => method.kind() == MemberKind::InterfaceMethod,
            _ => method.kind() != MemberKind::Field,
        };
        if !allowed {
            return Err(illegal_operand(opcode, "member reference of the wrong kind"));
        }
        let descriptor = MethodDescriptor::parse(method.descriptor())
            .ok_or_else(|| illegal_operand(opcode, "malformed method descriptor"))?;
        let count = u8::try_from(argument_slots(opcode, &descriptor))
            .map_err(|_| illegal_operand(opcode, "too many argument slots"))?;
        Ok(Self::new_unchecked(opcode, method, count, descriptor.return_kind()))
    }

    pub fn method(&self) -> &MemberRef {
        &self.method
    }

    pub fn is_interface(&self) -> bool {
        self.method.kind() == MemberKind::InterfaceMethod
    }

    /// Operand stack slots taken by the arguments, including the receiver.
    ///
    /// For `invokeinterface` this is the encoded count operand.
    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn return_kind(&self) -> TypeKind {
        self.return_kind
    }

    pub(crate) fn read<R>(opcode: Opcode, s: &mut CodeStream<'_>, cp: &R) -> error::Result<Self>
    where
        R: ConstantResolver + ?Sized,
    {
        let index = s.read_u2()?;
        let encoded_count = if opcode == Opcode::Invokeinterface {
            let count = s.read_u1()?;
            if s.read_u1()? != 0 {
                return Err(CodeError::malformed(s.marked(), MalformedCode::NonZeroReserved));
            }
            Some(count)
        } else {
            None
        };
        let method = cp.member_ref(index)?;
        if method.kind() == MemberKind::Field {
            return Err(ConstantPoolError::WrongEntryKind {
                index,
                expected: "method reference",
            }
            .into());
        }
        let descriptor = MethodDescriptor::parse(method.descriptor())
            .ok_or(ConstantPoolError::InvalidDescriptor { index })?;
        let count = encoded_count
            .unwrap_or_else(|| argument_slots(opcode, &descriptor).min(u8::MAX as u16) as u8);
        Ok(Self::new_unchecked(opcode, method, count, descriptor.return_kind()))
    }

    pub(crate) fn write(&self, w: &mut CodeWriter) {
        write_opcode(w, self.opcode);
        w.write_u2(self.method.index());
        if self.opcode == Opcode::Invokeinterface {
            w.write_u1(self.count);
            w.write_u1(0);
        }
    }
}

fn argument_slots(opcode: Opcode, descriptor: &MethodDescriptor) -> u16 {
    let receiver = if opcode == Opcode::Invokestatic { 0 } else { 1 };
    descriptor.parameter_slots() + receiver
}

impl TypedInstruction for InvokeInstruction {
    const KIND: Kind = Kind::Invoke;

    fn opcode(&self) -> Opcode {
        self.opcode
    }
}

/// `invokedynamic`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvokeDynamicInstruction {
    entry: InvokeDynamicEntry,
    return_kind: TypeKind,
}

impl InvokeDynamicInstruction {
    pub(crate) fn new_unchecked(entry: InvokeDynamicEntry, return_kind: TypeKind) -> Self {
        Self { entry, return_kind }
    }

    pub fn of(entry: InvokeDynamicEntry) -> error::Result<Self> {
        let descriptor = MethodDescriptor::parse(entry.descriptor())
            .ok_or_else(|| illegal_operand(Opcode::Invokedynamic, "malformed method descriptor"))?;
        Ok(Self::new_unchecked(entry, descriptor.return_kind()))
    }

    pub fn entry(&self) -> &InvokeDynamicEntry {
        &self.entry
    }

    pub fn return_kind(&self) -> TypeKind {
        self.return_kind
    }

    pub(crate) fn read<R>(s: &mut CodeStream<'_>, cp: &R) -> error::Result<Self>
    where
        R: ConstantResolver + ?Sized,
    {
        let index = s.read_u2()?;
        if s.read_u2()? != 0 {
            return Err(CodeError::malformed(s.marked(), MalformedCode::NonZeroReserved));
        }
        let entry = cp.invoke_dynamic(index)?;
        let descriptor = MethodDescriptor::parse(entry.descriptor())
            .ok_or(ConstantPoolError::InvalidDescriptor { index })?;
        Ok(Self::new_unchecked(entry, descriptor.return_kind()))
    }

    pub(crate) fn write(&self, w: &mut CodeWriter) {
        write_opcode(w, Opcode::Invokedynamic);
        w.write_u2(self.entry.index());
        w.write_u2(0);
    }
}

impl TypedInstruction for InvokeDynamicInstruction {
    const KIND: Kind = Kind::InvokeDynamic;

    fn opcode(&self) -> Opcode {
        Opcode::Invokedynamic
    }
}
