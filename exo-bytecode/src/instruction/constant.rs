use crate::{
    constant_pool::{ConstantPool, ConstantPoolEntry, ConstantResolver, ConstantValue, LoadableConstant},
    error::{self, ConstantPoolError},
    opcode::{Kind, Opcode},
    stream::{CodeStream, CodeWriter},
    type_kind::TypeKind,
};

use super::{check_kind, illegal_operand, write_opcode, TypedInstruction};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Operand {
    /// Implied by the opcode, as in `iconst_2`.
    Intrinsic,
    /// An immediate `bipush` or `sipush` operand.
    Argument(i32),
    /// A constant pool entry loaded by `ldc`, `ldc_w` or `ldc2_w`.
    Load(LoadableConstant),
}

/// Push a constant onto the operand stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstantInstruction {
    opcode: Opcode,
    operand: Operand,
}

impl ConstantInstruction {
    pub(crate) fn new_unchecked_intrinsic(opcode: Opcode) -> Self {
        Self {
            opcode,
            operand: Operand::Intrinsic,
        }
    }

    pub(crate) fn new_unchecked_argument(opcode: Opcode, value: i32) -> Self {
        Self {
            opcode,
            operand: Operand::Argument(value),
        }
    }

    pub(crate) fn new_unchecked_load(opcode: Opcode, constant: LoadableConstant) -> Self {
        Self {
            opcode,
            operand: Operand::Load(constant),
        }
    }

    /// `aconst_null`, `iconst_m1` through `dconst_1`.
    pub fn of_intrinsic(opcode: Opcode) -> error::Result<Self> {
        check_kind(opcode, Kind::Constant)?;
        if opcode.intrinsic_value().is_none() {
            return Err(illegal_operand(opcode, "opcode takes an operand"));
        }
        Ok(Self::new_unchecked_intrinsic(opcode))
    }

    /// `bipush` or `sipush` with an immediate value.
    pub fn of_argument(opcode: Opcode, value: i32) -> error::Result<Self> {
        check_kind(opcode, Kind::Constant)?;
        let fits = match opcode {
            Opcode::Bipush => i8::try_from(value).is_ok(),
            Opcode::Sipush => i16::try_from(value).is_ok(),
            _ => return Err(illegal_operand(opcode, "opcode takes no immediate value")),
        };
        if !fits {
            return Err(illegal_operand(opcode, "value does not fit the immediate operand"));
        }
        Ok(Self::new_unchecked_argument(opcode, value))
    }

    /// `ldc`, `ldc_w` or `ldc2_w` with a pool constant of the matching category.
    pub fn of_load(opcode: Opcode, constant: LoadableConstant) -> error::Result<Self> {
        check_kind(opcode, Kind::Constant)?;
        let wide = constant.value().is_wide();
        match opcode {
            Opcode::Ldc | Opcode::LdcW if wide => {
                return Err(illegal_operand(opcode, "long and double constants need ldc2_w"))
            }
            Opcode::Ldc2W if !wide => {
                return Err(illegal_operand(opcode, "ldc2_w only loads long and double constants"))
            }
            Opcode::Ldc if constant.index() > u8::MAX as u16 => {
                return Err(illegal_operand(opcode, "pool index does not fit in one byte"))
            }
            Opcode::Ldc | Opcode::LdcW | Opcode::Ldc2W => (),
            _ => return Err(illegal_operand(opcode, "opcode does not load from the pool")),
        }
        Ok(Self::new_unchecked_load(opcode, constant))
    }

    /// The shortest instruction pushing `value`, adding it to `pool` when
    /// no intrinsic or immediate form exists.
    pub fn of_value(value: ConstantValue, pool: &mut ConstantPool) -> error::Result<Self> {
        if let Some(op) = Opcode::ALL
            .iter()
            .copied()
            .find(|op| op.intrinsic_value().as_ref() == Some(&value))
        {
            return Ok(Self::new_unchecked_intrinsic(op));
        }
        if let ConstantValue::Integer(v) = value {
            if i8::try_from(v).is_ok() {
                return Ok(Self::new_unchecked_argument(Opcode::Bipush, v));
            }
            if i16::try_from(v).is_ok() {
                return Ok(Self::new_unchecked_argument(Opcode::Sipush, v));
            }
        }
        let index = match &value {
            ConstantValue::Null => unreachable!("aconst_null is intrinsic"),
            ConstantValue::Integer(v) => pool.add_integer(*v)?,
            ConstantValue::Float(bits) => pool.add(ConstantPoolEntry::Float { bits: *bits })?,
            ConstantValue::Long(v) => pool.add_long(*v)?,
            ConstantValue::Double(bits) => pool.add(ConstantPoolEntry::Double { bits: *bits })?,
            ConstantValue::String(s) => pool.add_string(s)?,
            ConstantValue::Class(name) => pool.add_class(name)?,
            ConstantValue::MethodType(descriptor) => pool.add_method_type(descriptor)?,
            ConstantValue::MethodHandle { kind, reference } => {
                pool.add_method_handle(*kind, reference.index())?
            }
            ConstantValue::Dynamic {
                bootstrap_method,
                name,
                descriptor,
            } => {
                let name_and_type_index = pool.add_name_and_type(name, descriptor)?;
                pool.add(ConstantPoolEntry::Dynamic {
                    bootstrap_method_attr_index: *bootstrap_method,
                    name_and_type_index,
                })?
            }
        };
        let opcode = if value.is_wide() {
            Opcode::Ldc2W
        } else if index <= u8::MAX as u16 {
            Opcode::Ldc
        } else {
            Opcode::LdcW
        };
        Ok(Self::new_unchecked_load(opcode, LoadableConstant { index, value }))
    }

    /// The value pushed, whichever form the instruction takes.
    pub fn constant_value(&self) -> ConstantValue {
        match &self.operand {
            Operand::Intrinsic => self.opcode.intrinsic_value().unwrap_or(ConstantValue::Null),
            Operand::Argument(v) => ConstantValue::Integer(*v),
            Operand::Load(c) => c.value().clone(),
        }
    }

    pub fn type_kind(&self) -> TypeKind {
        match &self.operand {
            Operand::Load(c) => c.value().type_kind(),
            _ => self.constant_value().type_kind(),
        }
    }

    pub fn is_intrinsic(&self) -> bool {
        matches!(self.operand, Operand::Intrinsic)
    }

    /// The immediate operand of `bipush` and `sipush`.
    pub fn argument(&self) -> Option<i32> {
        match self.operand {
            Operand::Argument(v) => Some(v),
            _ => None,
        }
    }

    /// The pool entry an `ldc` form loads.
    pub fn pool_constant(&self) -> Option<&LoadableConstant> {
        match &self.operand {
            Operand::Load(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn read<R>(opcode: Opcode, s: &mut CodeStream<'_>, cp: &R) -> error::Result<Self>
    where
        R: ConstantResolver + ?Sized,
    {
        let instruction = match opcode {
            Opcode::Bipush => Self::new_unchecked_argument(opcode, s.read_i1()? as i32),
            Opcode::Sipush => Self::new_unchecked_argument(opcode, s.read_i2()? as i32),
            Opcode::Ldc | Opcode::LdcW | Opcode::Ldc2W => {
                let index = if opcode == Opcode::Ldc {
                    s.read_u1()? as u16
                } else {
                    s.read_u2()?
                };
                let constant = cp.loadable_constant(index)?;
                let wide = opcode == Opcode::Ldc2W;
                if constant.value().is_wide() != wide {
                    return Err(ConstantPoolError::WrongEntryKind {
                        index,
                        expected: if wide {
                            "long or double constant"
                        } else {
                            "single-slot constant"
                        },
                    }
                    .into());
                }
                Self::new_unchecked_load(opcode, constant)
            }
            _ => Self::new_unchecked_intrinsic(opcode),
        };
        Ok(instruction)
    }

    pub(crate) fn write(&self, w: &mut CodeWriter) {
        write_opcode(w, self.opcode);
        match &self.operand {
            Operand::Intrinsic => (),
            Operand::Argument(v) => {
                if self.opcode == Opcode::Bipush {
                    w.write_u1(*v as i8 as u8);
                } else {
                    w.write_i2(*v as i16);
                }
            }
            Operand::Load(c) => {
                if self.opcode == Opcode::Ldc {
                    w.write_u1(c.index() as u8);
                } else {
                    w.write_u2(c.index());
                }
            }
        }
    }
}

impl TypedInstruction for ConstantInstruction {
    const KIND: Kind = Kind::Constant;

    fn opcode(&self) -> Opcode {
        self.opcode
    }
}
