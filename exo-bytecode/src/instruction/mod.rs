//! Instruction values, one family per [`Kind`].
//!
//! Every family has two ways in: a crate-private `new_unchecked` used by the
//! decoder, which already dispatched on the opcode's kind, and a public `of`
//! that checks the opcode belongs to the family and the operands can be
//! encoded. A constructed value therefore always re-encodes.

use crate::{
    code::LabelTable,
    constant_pool::ConstantResolver,
    error::{self, CodeError},
    opcode::{Kind, Opcode, WIDE},
    stream::{CodeStream, CodeWriter},
};

pub use self::array::{ArrayLoadInstruction, ArrayStoreInstruction};
pub use self::branch::{BranchInstruction, DiscontinuedJsrInstruction};
pub use self::constant::ConstantInstruction;
pub use self::field::FieldInstruction;
pub use self::invoke::{InvokeDynamicInstruction, InvokeInstruction};
pub use self::load_store::{
    DiscontinuedRetInstruction, IncrementInstruction, LoadInstruction, StoreInstruction,
};
pub use self::object::{
    NewMultiArrayInstruction, NewObjectInstruction, NewPrimitiveArrayInstruction,
    NewReferenceArrayInstruction, TypeCheckInstruction,
};
pub use self::simple::{
    ConvertInstruction, MonitorInstruction, NopInstruction, OperatorInstruction,
    ReturnInstruction, StackInstruction, ThrowInstruction,
};
pub use self::switch::{LookupSwitchInstruction, SwitchCase, TableSwitchInstruction};

mod array;
mod branch;
mod constant;
mod field;
mod invoke;
mod load_store;
mod object;
mod simple;
mod switch;

/// The contract shared by every instruction family.
pub trait TypedInstruction {
    /// The kind every opcode of this family has.
    const KIND: Kind;

    fn opcode(&self) -> Opcode;

    /// Encoded length in bytes when the instruction starts at `bci`.
    ///
    /// Only the switch families depend on `bci`, through their alignment
    /// padding; they override this.
    fn size_in_bytes(&self, bci: usize) -> usize {
        let _ = bci;
        self.opcode().fixed_size().unwrap_or(1)
    }
}

/// Fails with [`CodeError::KindMismatch`] unless `opcode` is of kind `expected`.
pub(crate) fn check_kind(opcode: Opcode, expected: Kind) -> error::Result<()> {
    if opcode.kind() != expected {
        return Err(CodeError::KindMismatch { opcode, expected });
    }
    Ok(())
}

pub(crate) fn illegal_operand(opcode: Opcode, reason: &'static str) -> CodeError {
    CodeError::IllegalOperand { opcode, reason }
}

/// Write the opcode byte, preceded by the `wide` prefix for wide forms.
pub(crate) fn write_opcode(w: &mut CodeWriter, opcode: Opcode) {
    if opcode.is_wide() {
        w.write_u1(WIDE);
    }
    w.write_u1(opcode.bytecode() as u8);
}

/// Read an opcode, resolving the `wide` prefix. Errors are reported at the mark.
pub(crate) fn read_opcode(s: &mut CodeStream<'_>) -> error::Result<Opcode> {
    let byte = s.read_u1()?;
    let opcode = if byte == WIDE {
        Opcode::lookup_wide(s.read_u1()?)
    } else {
        Opcode::lookup(byte)
    };
    opcode.map_err(|kind| CodeError::malformed(s.marked(), kind))
}

macro_rules! instructions {
    ($($kind:ident($ty:ident)),* $(,)?) => {
        /// A decoded or to-be-encoded instruction.
        ///
        /// Equality and hashing consider the opcode and the family's operands,
        /// never the position in a code array.
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum Instruction {
            $($kind($ty)),*
        }

        impl Instruction {
            pub fn opcode(&self) -> Opcode {
                match self {
                    $(Self::$kind(i) => i.opcode()),*
                }
            }

            pub fn size_in_bytes(&self, bci: usize) -> usize {
                match self {
                    $(Self::$kind(i) => i.size_in_bytes(bci)),*
                }
            }
        }

        $(
            impl From<$ty> for Instruction {
                fn from(i: $ty) -> Self {
                    Self::$kind(i)
                }
            }

            static_assertions::const_assert!(matches!(<$ty as TypedInstruction>::KIND, Kind::$kind));
        )*
    };
}

instructions! {
    Load(LoadInstruction),
    Store(StoreInstruction),
    Increment(IncrementInstruction),
    Branch(BranchInstruction),
    LookupSwitch(LookupSwitchInstruction),
    TableSwitch(TableSwitchInstruction),
    Return(ReturnInstruction),
    ThrowException(ThrowInstruction),
    FieldAccess(FieldInstruction),
    Invoke(InvokeInstruction),
    InvokeDynamic(InvokeDynamicInstruction),
    NewObject(NewObjectInstruction),
    NewPrimitiveArray(NewPrimitiveArrayInstruction),
    NewReferenceArray(NewReferenceArrayInstruction),
    NewMultiArray(NewMultiArrayInstruction),
    TypeCheck(TypeCheckInstruction),
    ArrayLoad(ArrayLoadInstruction),
    ArrayStore(ArrayStoreInstruction),
    Stack(StackInstruction),
    Convert(ConvertInstruction),
    Operator(OperatorInstruction),
    Constant(ConstantInstruction),
    Monitor(MonitorInstruction),
    Nop(NopInstruction),
    DiscontinuedJsr(DiscontinuedJsrInstruction),
    DiscontinuedRet(DiscontinuedRetInstruction),
}

static_assertions::assert_impl_all!(Instruction: Send, Sync);

impl Instruction {
    pub fn kind(&self) -> Kind {
        self.opcode().kind()
    }

    /// Decode the instruction starting at the stream position.
    ///
    /// Branch offsets become labels keyed by their target bci; the caller is
    /// responsible for checking those targets land on instruction boundaries.
    pub(crate) fn read<R>(s: &mut CodeStream<'_>, cp: &R) -> error::Result<Instruction>
    where
        R: ConstantResolver + ?Sized,
    {
        let bci = s.position();
        s.mark();
        let opcode = read_opcode(s)?;
        let instruction = match opcode.kind() {
            Kind::Load => LoadInstruction::read(opcode, s)?.into(),
            Kind::Store => StoreInstruction::read(opcode, s)?.into(),
            Kind::Increment => IncrementInstruction::read(opcode, s)?.into(),
            Kind::Branch => BranchInstruction::read(opcode, s, bci)?.into(),
            Kind::LookupSwitch => LookupSwitchInstruction::read(s, bci)?.into(),
            Kind::TableSwitch => TableSwitchInstruction::read(s, bci)?.into(),
            Kind::Return => ReturnInstruction::new_unchecked(opcode).into(),
            Kind::ThrowException => ThrowInstruction::new().into(),
            Kind::FieldAccess => FieldInstruction::read(opcode, s, cp)?.into(),
            Kind::Invoke => InvokeInstruction::read(opcode, s, cp)?.into(),
            Kind::InvokeDynamic => InvokeDynamicInstruction::read(s, cp)?.into(),
            Kind::NewObject => NewObjectInstruction::read(s, cp)?.into(),
            Kind::NewPrimitiveArray => NewPrimitiveArrayInstruction::read(s)?.into(),
            Kind::NewReferenceArray => NewReferenceArrayInstruction::read(s, cp)?.into(),
            Kind::NewMultiArray => NewMultiArrayInstruction::read(s, cp)?.into(),
            Kind::TypeCheck => TypeCheckInstruction::read(opcode, s, cp)?.into(),
            Kind::ArrayLoad => ArrayLoadInstruction::new_unchecked(opcode).into(),
            Kind::ArrayStore => ArrayStoreInstruction::new_unchecked(opcode).into(),
            Kind::Stack => StackInstruction::new_unchecked(opcode).into(),
            Kind::Convert => ConvertInstruction::new_unchecked(opcode).into(),
            Kind::Operator => OperatorInstruction::new_unchecked(opcode).into(),
            Kind::Constant => ConstantInstruction::read(opcode, s, cp)?.into(),
            Kind::Monitor => MonitorInstruction::new_unchecked(opcode).into(),
            Kind::Nop => NopInstruction::new().into(),
            Kind::DiscontinuedJsr => DiscontinuedJsrInstruction::read(opcode, s, bci)?.into(),
            Kind::DiscontinuedRet => DiscontinuedRetInstruction::read(opcode, s)?.into(),
        };
        Ok(instruction)
    }

    /// Encode at the writer position, registering branch offsets with `labels`.
    pub(crate) fn write(&self, w: &mut CodeWriter, labels: &mut LabelTable) -> error::Result<()> {
        let bci = w.position();
        match self {
            Self::Branch(i) => i.write(w, bci, labels)?,
            Self::DiscontinuedJsr(i) => i.write(w, bci, labels)?,
            Self::LookupSwitch(i) => i.write(w, bci, labels)?,
            Self::TableSwitch(i) => i.write(w, bci, labels)?,
            Self::Load(i) => i.write(w),
            Self::Store(i) => i.write(w),
            Self::Increment(i) => i.write(w),
            Self::DiscontinuedRet(i) => i.write(w),
            Self::FieldAccess(i) => i.write(w),
            Self::Invoke(i) => i.write(w),
            Self::InvokeDynamic(i) => i.write(w),
            Self::NewObject(i) => i.write(w),
            Self::NewPrimitiveArray(i) => i.write(w),
            Self::NewReferenceArray(i) => i.write(w),
            Self::NewMultiArray(i) => i.write(w),
            Self::TypeCheck(i) => i.write(w),
            Self::Constant(i) => i.write(w),
            Self::Return(_)
            | Self::ThrowException(_)
            | Self::ArrayLoad(_)
            | Self::ArrayStore(_)
            | Self::Stack(_)
            | Self::Convert(_)
            | Self::Operator(_)
            | Self::Monitor(_)
            | Self::Nop(_) => write_opcode(w, self.opcode()),
        }
        debug_assert_eq!(w.position() - bci, self.size_in_bytes(bci));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        code::Label,
        constant_pool::ConstantPool,
        type_kind::TypeKind,
    };

    #[test]
    fn every_opcode_is_rejected_by_every_other_family() {
        let mut cp = ConstantPool::new();
        let class = cp.add_class("java/lang/String").unwrap();
        let class = cp.class_entry(class).unwrap();
        let field = cp.add_field_ref("A", "f", "J").unwrap();
        let field = cp.member_ref(field).unwrap();
        let method = cp.add_method_ref("A", "m", "(I)V").unwrap();
        let method = cp.member_ref(method).unwrap();
        let imethod = cp.add_interface_method_ref("B", "m", "()V").unwrap();
        let imethod = cp.member_ref(imethod).unwrap();
        let int = cp.add_integer(1_000_000).unwrap();
        let int = cp.loadable_constant(int).unwrap();
        let long = cp.add_long(1 << 40).unwrap();
        let long = cp.loadable_constant(long).unwrap();
        let target = Label::at_bci(0);
        let any_slot = |f: &dyn Fn(u16) -> bool| [0u16, 1, 2, 3, 300].into_iter().any(f);

        for op in Opcode::ALL.iter().copied() {
            let results = [
                (Kind::ArrayStore, ArrayStoreInstruction::of(op).is_ok()),
                (Kind::ArrayLoad, ArrayLoadInstruction::of(op).is_ok()),
                (Kind::Stack, StackInstruction::of(op).is_ok()),
                (Kind::Convert, ConvertInstruction::of(op).is_ok()),
                (Kind::Operator, OperatorInstruction::of(op).is_ok()),
                (Kind::Monitor, MonitorInstruction::of(op).is_ok()),
                (Kind::Return, ReturnInstruction::of(op).is_ok()),
                (Kind::Nop, NopInstruction::of(op).is_ok()),
                (Kind::ThrowException, ThrowInstruction::of(op).is_ok()),
                (Kind::Branch, BranchInstruction::of(op, target).is_ok()),
                (Kind::DiscontinuedJsr, DiscontinuedJsrInstruction::of(op, target).is_ok()),
                (Kind::Load, any_slot(&|slot| LoadInstruction::of(op, slot).is_ok())),
                (Kind::Store, any_slot(&|slot| StoreInstruction::of(op, slot).is_ok())),
                (
                    Kind::DiscontinuedRet,
                    any_slot(&|slot| DiscontinuedRetInstruction::of(op, slot).is_ok()),
                ),
                (Kind::Increment, IncrementInstruction::of(op, 1, 1).is_ok()),
                (Kind::FieldAccess, FieldInstruction::of(op, field.clone()).is_ok()),
                (
                    Kind::Invoke,
                    InvokeInstruction::of(op, method.clone()).is_ok()
                        || InvokeInstruction::of(op, imethod.clone()).is_ok(),
                ),
                (Kind::TypeCheck, TypeCheckInstruction::of(op, class.clone()).is_ok()),
                (
                    Kind::Constant,
                    ConstantInstruction::of_intrinsic(op).is_ok()
                        || ConstantInstruction::of_argument(op, 1).is_ok()
                        || ConstantInstruction::of_load(op, int.clone()).is_ok()
                        || ConstantInstruction::of_load(op, long.clone()).is_ok(),
                ),
            ];
            for (kind, ok) in results {
                assert_eq!(ok, op.kind() == kind, "{} as {:?}", op, kind);
            }
            if op.kind() != Kind::ArrayStore {
                assert_eq!(
                    ArrayStoreInstruction::of(op),
                    Err(CodeError::KindMismatch {
                        opcode: op,
                        expected: Kind::ArrayStore
                    })
                );
            }
            if op.kind() != Kind::Invoke {
                assert_eq!(
                    InvokeInstruction::of(op, method.clone()),
                    Err(CodeError::KindMismatch {
                        opcode: op,
                        expected: Kind::Invoke
                    })
                );
            }
        }
    }

    #[test]
    fn sizes_match_encoding() {
        let mut labels = LabelTable::default();
        labels.bind(Label::at_bci(0), 0).unwrap();
        let instructions: Vec<Instruction> = vec![
            LoadInstruction::of_kind(TypeKind::Long, 300).unwrap().into(),
            ArrayStoreInstruction::of_kind(TypeKind::Boolean).unwrap().into(),
            BranchInstruction::of(Opcode::GotoW, Label::at_bci(0)).unwrap().into(),
            TableSwitchInstruction::of(0, 1, Label::at_bci(0), vec![]).unwrap().into(),
        ];
        for bci in 0..4 {
            for i in &instructions {
                let mut w = CodeWriter::new();
                w.write_bytes(&vec![0; bci]);
                i.write(&mut w, &mut labels).unwrap();
                assert_eq!(w.position() - bci, i.size_in_bytes(bci), "{:?}", i);
            }
        }
    }
}
