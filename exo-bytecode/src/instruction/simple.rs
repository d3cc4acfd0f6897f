use crate::{
    error::{self, CodeError},
    opcode::{Kind, Opcode},
    type_kind::TypeKind,
};

use super::{check_kind, TypedInstruction};

/// Defines a family whose instructions are a lone opcode with no operands.
macro_rules! opcode_only {
    ($(#[$attr:meta])* $name:ident => $kind:ident) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name {
            opcode: Opcode,
        }

        impl $name {
            pub(crate) fn new_unchecked(opcode: Opcode) -> Self {
                Self { opcode }
            }

            pub fn of(opcode: Opcode) -> error::Result<Self> {
                check_kind(opcode, Kind::$kind)?;
                Ok(Self::new_unchecked(opcode))
            }
        }

        impl TypedInstruction for $name {
            const KIND: Kind = Kind::$kind;

            fn opcode(&self) -> Opcode {
                self.opcode
            }
        }
    };
}

opcode_only! {
    /// `ireturn` through `return`.
    ReturnInstruction => Return
}

opcode_only! {
    /// `monitorenter` and `monitorexit`.
    MonitorInstruction => Monitor
}

opcode_only! {
    /// Operand stack manipulation: `pop`, `dup` and friends, `swap`.
    StackInstruction => Stack
}

opcode_only! {
    /// Primitive conversions such as `i2l`.
    ConvertInstruction => Convert
}

opcode_only! {
    /// Arithmetic, bitwise, comparison and `arraylength`.
    OperatorInstruction => Operator
}

impl ReturnInstruction {
    /// The return opcode for a value of `kind`; sub-`int` kinds return with `ireturn`.
    pub fn of_kind(kind: TypeKind) -> error::Result<Self> {
        let opcode = match kind.as_loadable() {
            TypeKind::Int => Opcode::Ireturn,
            TypeKind::Long => Opcode::Lreturn,
            TypeKind::Float => Opcode::Freturn,
            TypeKind::Double => Opcode::Dreturn,
            TypeKind::Reference => Opcode::Areturn,
            TypeKind::Void => Opcode::Return,
            kind => {
                return Err(CodeError::IllegalTypeKind {
                    kind,
                    reason: "no return instruction for this kind",
                })
            }
        };
        Ok(Self::new_unchecked(opcode))
    }

    pub fn type_kind(&self) -> TypeKind {
        self.opcode.primary_type_kind().unwrap_or(TypeKind::Void)
    }
}

impl MonitorInstruction {
    pub fn is_enter(&self) -> bool {
        self.opcode == Opcode::Monitorenter
    }
}

impl ConvertInstruction {
    pub fn from_type(&self) -> TypeKind {
        self.types().0
    }

    pub fn to_type(&self) -> TypeKind {
        self.types().1
    }

    fn types(&self) -> (TypeKind, TypeKind) {
        use TypeKind::*;
        match self.opcode {
            Opcode::I2l => (Int, Long),
            Opcode::I2f => (Int, Float),
            Opcode::I2d => (Int, Double),
            Opcode::L2i => (Long, Int),
            Opcode::L2f => (Long, Float),
            Opcode::L2d => (Long, Double),
            Opcode::F2i => (Float, Int),
            Opcode::F2l => (Float, Long),
            Opcode::F2d => (Float, Double),
            Opcode::D2i => (Double, Int),
            Opcode::D2l => (Double, Long),
            Opcode::D2f => (Double, Float),
            Opcode::I2b => (Int, Byte),
            Opcode::I2c => (Int, Char),
            Opcode::I2s => (Int, Short),
            _ => unreachable!("{} is not a conversion", self.opcode),
        }
    }
}

impl OperatorInstruction {
    /// The kind of the operands; `arraylength` reports its `int` result.
    pub fn type_kind(&self) -> TypeKind {
        self.opcode.primary_type_kind().unwrap_or(TypeKind::Int)
    }
}

/// `athrow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ThrowInstruction;

impl ThrowInstruction {
    pub fn new() -> Self {
        Self
    }

    pub fn of(opcode: Opcode) -> error::Result<Self> {
        check_kind(opcode, Kind::ThrowException)?;
        Ok(Self)
    }
}

impl TypedInstruction for ThrowInstruction {
    const KIND: Kind = Kind::ThrowException;

    fn opcode(&self) -> Opcode {
        Opcode::Athrow
    }
}

/// `nop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NopInstruction;

impl NopInstruction {
    pub fn new() -> Self {
        Self
    }

    pub fn of(opcode: Opcode) -> error::Result<Self> {
        check_kind(opcode, Kind::Nop)?;
        Ok(Self)
    }
}

impl TypedInstruction for NopInstruction {
    const KIND: Kind = Kind::Nop;

    fn opcode(&self) -> Opcode {
        Opcode::Nop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_kinds() {
        assert_eq!(ReturnInstruction::of_kind(TypeKind::Boolean).unwrap().opcode(), Opcode::Ireturn);
        assert_eq!(ReturnInstruction::of_kind(TypeKind::Void).unwrap().opcode(), Opcode::Return);
        assert_eq!(ReturnInstruction::of(Opcode::Areturn).unwrap().type_kind(), TypeKind::Reference);
        assert!(ReturnInstruction::of(Opcode::Athrow).is_err());
    }

    #[test]
    fn every_conversion_has_types() {
        for op in Opcode::ALL.iter().copied().filter(|op| op.kind() == Kind::Convert) {
            let c = ConvertInstruction::of(op).unwrap();
            assert_ne!(c.from_type(), c.to_type(), "{}", op);
            assert_eq!(c.from_type(), c.from_type().as_loadable());
        }
        let c = ConvertInstruction::of(Opcode::I2c).unwrap();
        assert_eq!((c.from_type(), c.to_type()), (TypeKind::Int, TypeKind::Char));
    }

    #[test]
    fn operator_kinds() {
        assert_eq!(OperatorInstruction::of(Opcode::Lcmp).unwrap().type_kind(), TypeKind::Long);
        assert_eq!(OperatorInstruction::of(Opcode::Dneg).unwrap().type_kind(), TypeKind::Double);
        assert!(OperatorInstruction::of(Opcode::I2l).is_err());
        assert!(MonitorInstruction::of(Opcode::Monitorenter).unwrap().is_enter());
        assert!(ThrowInstruction::of(Opcode::Athrow).is_ok());
        assert!(NopInstruction::of(Opcode::Pop).is_err());
    }
}
