use crate::{
    error::{self, CodeError},
    opcode::{Kind, Opcode},
    stream::{CodeStream, CodeWriter},
    type_kind::TypeKind,
};

use super::{check_kind, illegal_operand, write_opcode, TypedInstruction};

/// Check `slot` is encodable by a local variable opcode.
fn check_slot(opcode: Opcode, slot: u16) -> error::Result<()> {
    match opcode.implicit_slot() {
        Some(implicit) if implicit != slot => {
            Err(illegal_operand(opcode, "slot differs from the opcode's implicit slot"))
        }
        None if !opcode.is_wide() && slot > u8::MAX as u16 => {
            Err(illegal_operand(opcode, "slot does not fit in one byte"))
        }
        _ => Ok(()),
    }
}

fn read_slot(opcode: Opcode, s: &mut CodeStream<'_>) -> error::Result<u16> {
    match opcode.implicit_slot() {
        Some(slot) => Ok(slot),
        None if opcode.is_wide() => s.read_u2(),
        None => Ok(s.read_u1()? as u16),
    }
}

fn write_slot(opcode: Opcode, slot: u16, w: &mut CodeWriter) {
    write_opcode(w, opcode);
    if opcode.implicit_slot().is_none() {
        if opcode.is_wide() {
            w.write_u2(slot);
        } else {
            w.write_u1(slot as u8);
        }
    }
}

/// The shortest local variable opcode of a family for a slot.
///
/// `forms` is `[explicit, _0, _1, _2, _3, wide]`.
fn select(forms: [Opcode; 6], slot: u16) -> Opcode {
    match slot {
        0..=3 => forms[1 + slot as usize],
        4..=0xff => forms[0],
        _ => forms[5],
    }
}

fn load_forms(kind: TypeKind) -> error::Result<[Opcode; 6]> {
    use Opcode::*;
    Ok(match kind.as_loadable() {
        TypeKind::Int => [Iload, Iload0, Iload1, Iload2, Iload3, IloadW],
        TypeKind::Long => [Lload, Lload0, Lload1, Lload2, Lload3, LloadW],
        TypeKind::Float => [Fload, Fload0, Fload1, Fload2, Fload3, FloadW],
        TypeKind::Double => [Dload, Dload0, Dload1, Dload2, Dload3, DloadW],
        TypeKind::Reference => [Aload, Aload0, Aload1, Aload2, Aload3, AloadW],
        kind => {
            return Err(CodeError::IllegalTypeKind {
                kind,
                reason: "no local variable instruction for this kind",
            })
        }
    })
}

fn store_forms(kind: TypeKind) -> error::Result<[Opcode; 6]> {
    use Opcode::*;
    Ok(match kind.as_loadable() {
        TypeKind::Int => [Istore, Istore0, Istore1, Istore2, Istore3, IstoreW],
        TypeKind::Long => [Lstore, Lstore0, Lstore1, Lstore2, Lstore3, LstoreW],
        TypeKind::Float => [Fstore, Fstore0, Fstore1, Fstore2, Fstore3, FstoreW],
        TypeKind::Double => [Dstore, Dstore0, Dstore1, Dstore2, Dstore3, DstoreW],
        TypeKind::Reference => [Astore, Astore0, Astore1, Astore2, Astore3, AstoreW],
        kind => {
            return Err(CodeError::IllegalTypeKind {
                kind,
                reason: "no local variable instruction for this kind",
            })
        }
    })
}

/// Load a local variable onto the operand stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadInstruction {
    opcode: Opcode,
    slot: u16,
}

impl LoadInstruction {
    pub(crate) fn new_unchecked(opcode: Opcode, slot: u16) -> Self {
        Self { opcode, slot }
    }

    pub fn of(opcode: Opcode, slot: u16) -> error::Result<Self> {
        check_kind(opcode, Kind::Load)?;
        check_slot(opcode, slot)?;
        Ok(Self::new_unchecked(opcode, slot))
    }

    /// The shortest encoding loading `kind` from `slot`. Sub-`int` kinds load as `int`.
    pub fn of_kind(kind: TypeKind, slot: u16) -> error::Result<Self> {
        Ok(Self::new_unchecked(select(load_forms(kind)?, slot), slot))
    }

    pub fn type_kind(&self) -> TypeKind {
        self.opcode.primary_type_kind().unwrap_or(TypeKind::Int)
    }

    pub fn slot(&self) -> u16 {
        self.slot
    }

    pub(crate) fn read(opcode: Opcode, s: &mut CodeStream<'_>) -> error::Result<Self> {
        Ok(Self::new_unchecked(opcode, read_slot(opcode, s)?))
    }

    pub(crate) fn write(&self, w: &mut CodeWriter) {
        write_slot(self.opcode, self.slot, w)
    }
}

impl TypedInstruction for LoadInstruction {
    const KIND: Kind = Kind::Load;

    fn opcode(&self) -> Opcode {
        self.opcode
    }
}

/// Store the top of the operand stack into a local variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreInstruction {
    opcode: Opcode,
    slot: u16,
}

impl StoreInstruction {
    pub(crate) fn new_unchecked(opcode: Opcode, slot: u16) -> Self {
        Self { opcode, slot }
    }

    pub fn of(opcode: Opcode, slot: u16) -> error::Result<Self> {
        check_kind(opcode, Kind::Store)?;
        check_slot(opcode, slot)?;
        Ok(Self::new_unchecked(opcode, slot))
    }

    /// The shortest encoding storing `kind` into `slot`.
    pub fn of_kind(kind: TypeKind, slot: u16) -> error::Result<Self> {
        Ok(Self::new_unchecked(select(store_forms(kind)?, slot), slot))
    }

    pub fn type_kind(&self) -> TypeKind {
        self.opcode.primary_type_kind().unwrap_or(TypeKind::Int)
    }

    pub fn slot(&self) -> u16 {
        self.slot
    }

    pub(crate) fn read(opcode: Opcode, s: &mut CodeStream<'_>) -> error::Result<Self> {
        Ok(Self::new_unchecked(opcode, read_slot(opcode, s)?))
    }

    pub(crate) fn write(&self, w: &mut CodeWriter) {
        write_slot(self.opcode, self.slot, w)
    }
}

impl TypedInstruction for StoreInstruction {
    const KIND: Kind = Kind::Store;

    fn opcode(&self) -> Opcode {
        self.opcode
    }
}

/// `iinc` and its wide form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IncrementInstruction {
    opcode: Opcode,
    slot: u16,
    constant: i16,
}

impl IncrementInstruction {
    pub(crate) fn new_unchecked(opcode: Opcode, slot: u16, constant: i16) -> Self {
        Self {
            opcode,
            slot,
            constant,
        }
    }

    pub fn of(opcode: Opcode, slot: u16, constant: i16) -> error::Result<Self> {
        check_kind(opcode, Kind::Increment)?;
        if !opcode.is_wide() {
            if slot > u8::MAX as u16 {
                return Err(illegal_operand(opcode, "slot does not fit in one byte"));
            }
            if i8::try_from(constant).is_err() {
                return Err(illegal_operand(opcode, "constant does not fit in one byte"));
            }
        }
        Ok(Self::new_unchecked(opcode, slot, constant))
    }

    /// `iinc` when both operands fit a byte, `iinc_w` otherwise.
    pub fn of_operands(slot: u16, constant: i16) -> Self {
        let narrow = slot <= u8::MAX as u16 && i8::try_from(constant).is_ok();
        let opcode = if narrow { Opcode::Iinc } else { Opcode::IincW };
        Self::new_unchecked(opcode, slot, constant)
    }

    pub fn slot(&self) -> u16 {
        self.slot
    }

    pub fn constant(&self) -> i16 {
        self.constant
    }

    pub(crate) fn read(opcode: Opcode, s: &mut CodeStream<'_>) -> error::Result<Self> {
        let (slot, constant) = if opcode.is_wide() {
            (s.read_u2()?, s.read_i2()?)
        } else {
            (s.read_u1()? as u16, s.read_i1()? as i16)
        };
        Ok(Self::new_unchecked(opcode, slot, constant))
    }

    pub(crate) fn write(&self, w: &mut CodeWriter) {
        write_opcode(w, self.opcode);
        if self.opcode.is_wide() {
            w.write_u2(self.slot);
            w.write_i2(self.constant);
        } else {
            w.write_u1(self.slot as u8);
            w.write_u1(self.constant as i8 as u8);
        }
    }
}

impl TypedInstruction for IncrementInstruction {
    const KIND: Kind = Kind::Increment;

    fn opcode(&self) -> Opcode {
        self.opcode
    }
}

/// `ret` and its wide form, returning from a subroutine through a local variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiscontinuedRetInstruction {
    opcode: Opcode,
    slot: u16,
}

impl DiscontinuedRetInstruction {
    pub(crate) fn new_unchecked(opcode: Opcode, slot: u16) -> Self {
        Self { opcode, slot }
    }

    pub fn of(opcode: Opcode, slot: u16) -> error::Result<Self> {
        check_kind(opcode, Kind::DiscontinuedRet)?;
        check_slot(opcode, slot)?;
        Ok(Self::new_unchecked(opcode, slot))
    }

    pub fn slot(&self) -> u16 {
        self.slot
    }

    pub(crate) fn read(opcode: Opcode, s: &mut CodeStream<'_>) -> error::Result<Self> {
        Ok(Self::new_unchecked(opcode, read_slot(opcode, s)?))
    }

    pub(crate) fn write(&self, w: &mut CodeWriter) {
        write_slot(self.opcode, self.slot, w)
    }
}

impl TypedInstruction for DiscontinuedRetInstruction {
    const KIND: Kind = Kind::DiscontinuedRet;

    fn opcode(&self) -> Opcode {
        self.opcode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortest_forms_are_selected() {
        assert_eq!(LoadInstruction::of_kind(TypeKind::Int, 2).unwrap().opcode(), Opcode::Iload2);
        assert_eq!(LoadInstruction::of_kind(TypeKind::Boolean, 4).unwrap().opcode(), Opcode::Iload);
        assert_eq!(LoadInstruction::of_kind(TypeKind::Double, 256).unwrap().opcode(), Opcode::DloadW);
        assert_eq!(StoreInstruction::of_kind(TypeKind::Reference, 0).unwrap().opcode(), Opcode::Astore0);
        assert_eq!(
            StoreInstruction::of_kind(TypeKind::Void, 0),
            Err(CodeError::IllegalTypeKind {
                kind: TypeKind::Void,
                reason: "no local variable instruction for this kind"
            })
        );
    }

    #[test]
    fn slots_must_be_encodable() {
        assert!(LoadInstruction::of(Opcode::Iload, 255).is_ok());
        assert!(matches!(
            LoadInstruction::of(Opcode::Iload, 256),
            Err(CodeError::IllegalOperand { opcode: Opcode::Iload, .. })
        ));
        assert!(LoadInstruction::of(Opcode::IloadW, 256).is_ok());
        assert!(LoadInstruction::of(Opcode::Iload1, 0).is_err());
        assert_eq!(
            StoreInstruction::of(Opcode::Iload, 1),
            Err(CodeError::KindMismatch {
                opcode: Opcode::Iload,
                expected: Kind::Store
            })
        );
    }

    #[test]
    fn increments() {
        assert_eq!(IncrementInstruction::of_operands(1, 5).opcode(), Opcode::Iinc);
        assert_eq!(IncrementInstruction::of_operands(1, 500).opcode(), Opcode::IincW);
        assert!(IncrementInstruction::of(Opcode::Iinc, 1, 200).is_err());

        let i = IncrementInstruction::of(Opcode::Iinc, 3, -1).unwrap();
        let mut w = CodeWriter::new();
        i.write(&mut w);
        assert_eq!(w.as_bytes(), &[0x84, 3, 0xff]);
        let mut s = CodeStream::new(&w.as_bytes()[1..]);
        assert_eq!(IncrementInstruction::read(Opcode::Iinc, &mut s), Ok(i));
    }

    #[test]
    fn wide_forms_carry_the_prefix() {
        let i = LoadInstruction::of(Opcode::AloadW, 0x1234).unwrap();
        let mut w = CodeWriter::new();
        i.write(&mut w);
        assert_eq!(w.as_bytes(), &[0xc4, 0x19, 0x12, 0x34]);
        assert_eq!(i.size_in_bytes(0), 4);
        assert_eq!(i.type_kind(), TypeKind::Reference);
    }
}
