use crate::{
    code::{Label, LabelTable},
    error::{self, CodeError, MalformedCode},
    opcode::{Kind, Opcode, OpcodeFlags},
    stream::{CodeStream, CodeWriter},
};

use super::{check_kind, write_opcode, TypedInstruction};

/// The label of `bci + offset`, rejecting targets outside the 16-bit bci range.
pub(crate) fn target_label(bci: usize, offset: i64, at: usize) -> error::Result<Label> {
    let target = bci as i64 + offset;
    u16::try_from(target)
        .map(Label::at_bci)
        .map_err(|_| CodeError::malformed(at, MalformedCode::BadBranchTarget(target)))
}

fn read_target(opcode: Opcode, s: &mut CodeStream<'_>, bci: usize) -> error::Result<Label> {
    let offset = if matches!(opcode, Opcode::GotoW | Opcode::JsrW) {
        s.read_i4()? as i64
    } else {
        s.read_i2()? as i64
    };
    target_label(bci, offset, bci)
}

/// A conditional or unconditional jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BranchInstruction {
    opcode: Opcode,
    target: Label,
}

impl BranchInstruction {
    pub(crate) fn new_unchecked(opcode: Opcode, target: Label) -> Self {
        Self { opcode, target }
    }

    pub fn of(opcode: Opcode, target: Label) -> error::Result<Self> {
        check_kind(opcode, Kind::Branch)?;
        Ok(Self::new_unchecked(opcode, target))
    }

    pub fn target(&self) -> Label {
        self.target
    }

    /// `goto` and `goto_w` never fall through.
    pub fn is_unconditional(&self) -> bool {
        self.opcode.flags().contains(OpcodeFlags::UNCONDITIONAL)
    }

    pub(crate) fn read(opcode: Opcode, s: &mut CodeStream<'_>, bci: usize) -> error::Result<Self> {
        Ok(Self::new_unchecked(opcode, read_target(opcode, s, bci)?))
    }

    pub(crate) fn write(
        &self,
        w: &mut CodeWriter,
        bci: usize,
        labels: &mut LabelTable,
    ) -> error::Result<()> {
        write_opcode(w, self.opcode);
        labels.write_offset(w, bci, self.target, self.opcode == Opcode::GotoW)
    }
}

impl TypedInstruction for BranchInstruction {
    const KIND: Kind = Kind::Branch;

    fn opcode(&self) -> Opcode {
        self.opcode
    }
}

/// `jsr` and `jsr_w`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiscontinuedJsrInstruction {
    opcode: Opcode,
    target: Label,
}

impl DiscontinuedJsrInstruction {
    pub(crate) fn new_unchecked(opcode: Opcode, target: Label) -> Self {
        Self { opcode, target }
    }

    pub fn of(opcode: Opcode, target: Label) -> error::Result<Self> {
        check_kind(opcode, Kind::DiscontinuedJsr)?;
        Ok(Self::new_unchecked(opcode, target))
    }

    pub fn target(&self) -> Label {
        self.target
    }

    pub(crate) fn read(opcode: Opcode, s: &mut CodeStream<'_>, bci: usize) -> error::Result<Self> {
        Ok(Self::new_unchecked(opcode, read_target(opcode, s, bci)?))
    }

    pub(crate) fn write(
        &self,
        w: &mut CodeWriter,
        bci: usize,
        labels: &mut LabelTable,
    ) -> error::Result<()> {
        write_opcode(w, self.opcode);
        labels.write_offset(w, bci, self.target, self.opcode == Opcode::JsrW)
    }
}

impl TypedInstruction for DiscontinuedJsrInstruction {
    const KIND: Kind = Kind::DiscontinuedJsr;

    fn opcode(&self) -> Opcode {
        self.opcode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_become_labels() {
        let mut s = CodeStream::at(&[0, 0, 0, 0x99, 0xff, 0xfd], 4);
        let b = BranchInstruction::read(Opcode::Ifeq, &mut s, 3).unwrap();
        assert_eq!(b.target(), Label::at_bci(0));
        assert!(!b.is_unconditional());
    }

    #[test]
    fn negative_targets_are_malformed() {
        let mut s = CodeStream::at(&[0xa7, 0xff, 0xf0], 1);
        assert_eq!(
            BranchInstruction::read(Opcode::Goto, &mut s, 0),
            Err(CodeError::malformed(0, MalformedCode::BadBranchTarget(-16)))
        );
    }

    #[test]
    fn wide_branches_use_four_byte_offsets() {
        let mut labels = LabelTable::default();
        let target = Label::at_bci(0);
        labels.bind(target, 0).unwrap();
        let mut w = CodeWriter::new();
        w.write_u1(0);
        BranchInstruction::of(Opcode::GotoW, target)
            .unwrap()
            .write(&mut w, 1, &mut labels)
            .unwrap();
        assert_eq!(w.as_bytes(), &[0, 0xc8, 0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn jsr_is_its_own_family() {
        let target = Label::at_bci(0);
        assert!(BranchInstruction::of(Opcode::Jsr, target).is_err());
        assert!(DiscontinuedJsrInstruction::of(Opcode::JsrW, target).is_ok());
        assert!(BranchInstruction::of(Opcode::Goto, target).unwrap().is_unconditional());
    }
}
