use crate::{
    error::{CodeError, MalformedCode},
    opcode::Opcode,
    stream::CodeStream,
};

/// The value categories an operand, local variable or array element may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeKind {
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Reference,
    /// Only meaningful as a return type.
    Void,
}

numerical_enum! {
    /// Types used in the `newarray` opcode.
    ArrayTypeCode: u8 {
        Boolean = 4,
        Char = 5,
        Float = 6,
        Double = 7,
        Byte = 8,
        Short = 9,
        Int = 10,
        Long = 11
    } => |s: &CodeStream<'_>, v| CodeError::malformed(s.marked(), MalformedCode::UnknownArrayType(v))
}

impl From<ArrayTypeCode> for TypeKind {
    fn from(code: ArrayTypeCode) -> Self {
        match code {
            ArrayTypeCode::Boolean => TypeKind::Boolean,
            ArrayTypeCode::Char => TypeKind::Char,
            ArrayTypeCode::Float => TypeKind::Float,
            ArrayTypeCode::Double => TypeKind::Double,
            ArrayTypeCode::Byte => TypeKind::Byte,
            ArrayTypeCode::Short => TypeKind::Short,
            ArrayTypeCode::Int => TypeKind::Int,
            ArrayTypeCode::Long => TypeKind::Long,
        }
    }
}

impl TypeKind {
    /// Number of local variable or operand stack slots a value occupies.
    pub const fn slot_size(self) -> u16 {
        match self {
            TypeKind::Void => 0,
            TypeKind::Long | TypeKind::Double => 2,
            _ => 1,
        }
    }

    /// The descriptor character; references use `L`.
    pub const fn descriptor_char(self) -> char {
        match self {
            TypeKind::Byte => 'B',
            TypeKind::Short => 'S',
            TypeKind::Char => 'C',
            TypeKind::Int => 'I',
            TypeKind::Long => 'J',
            TypeKind::Float => 'F',
            TypeKind::Double => 'D',
            TypeKind::Boolean => 'Z',
            TypeKind::Reference => 'L',
            TypeKind::Void => 'V',
        }
    }

    /// The kind a field or method descriptor character denotes. Arrays are references.
    pub fn from_descriptor_char(c: char) -> Option<TypeKind> {
        Some(match c {
            'B' => TypeKind::Byte,
            'S' => TypeKind::Short,
            'C' => TypeKind::Char,
            'I' => TypeKind::Int,
            'J' => TypeKind::Long,
            'F' => TypeKind::Float,
            'D' => TypeKind::Double,
            'Z' => TypeKind::Boolean,
            'L' | '[' => TypeKind::Reference,
            'V' => TypeKind::Void,
            _ => return None,
        })
    }

    /// The kind used on the operand stack and in local variables.
    /// Sub-`int` kinds widen to `int`.
    pub const fn as_loadable(self) -> TypeKind {
        match self {
            TypeKind::Byte | TypeKind::Short | TypeKind::Char | TypeKind::Boolean => TypeKind::Int,
            other => other,
        }
    }

    pub const fn is_primitive(self) -> bool {
        !matches!(self, TypeKind::Reference | TypeKind::Void)
    }

    pub fn array_type_code(self) -> Option<ArrayTypeCode> {
        Some(match self {
            TypeKind::Boolean => ArrayTypeCode::Boolean,
            TypeKind::Char => ArrayTypeCode::Char,
            TypeKind::Float => ArrayTypeCode::Float,
            TypeKind::Double => ArrayTypeCode::Double,
            TypeKind::Byte => ArrayTypeCode::Byte,
            TypeKind::Short => ArrayTypeCode::Short,
            TypeKind::Int => ArrayTypeCode::Int,
            TypeKind::Long => ArrayTypeCode::Long,
            TypeKind::Reference | TypeKind::Void => return None,
        })
    }

    pub fn from_newarray_code(code: u8) -> Option<TypeKind> {
        let kind = match code {
            4 => ArrayTypeCode::Boolean,
            5 => ArrayTypeCode::Char,
            6 => ArrayTypeCode::Float,
            7 => ArrayTypeCode::Double,
            8 => ArrayTypeCode::Byte,
            9 => ArrayTypeCode::Short,
            10 => ArrayTypeCode::Int,
            11 => ArrayTypeCode::Long,
            _ => return None,
        };
        Some(kind.into())
    }

    /// Element kind of an array store opcode.
    ///
    /// `bastore` serves both `byte[]` and `boolean[]`, so it maps to `Byte`;
    /// this is the one place that collapse happens for stores.
    ///
    /// # Panics
    ///
    /// If `op` is not of kind [`ArrayStore`](crate::opcode::Kind::ArrayStore).
    pub fn for_array_store_opcode(op: Opcode) -> TypeKind {
        match op {
            Opcode::Iastore => TypeKind::Int,
            Opcode::Lastore => TypeKind::Long,
            Opcode::Fastore => TypeKind::Float,
            Opcode::Dastore => TypeKind::Double,
            Opcode::Aastore => TypeKind::Reference,
            Opcode::Bastore => TypeKind::Byte,
            Opcode::Castore => TypeKind::Char,
            Opcode::Sastore => TypeKind::Short,
            other => unreachable!("{} is not an array store opcode", other),
        }
    }

    /// Element kind of an array load opcode. `baload` maps to `Byte`.
    ///
    /// # Panics
    ///
    /// If `op` is not of kind [`ArrayLoad`](crate::opcode::Kind::ArrayLoad).
    pub fn for_array_load_opcode(op: Opcode) -> TypeKind {
        match op {
            Opcode::Iaload => TypeKind::Int,
            Opcode::Laload => TypeKind::Long,
            Opcode::Faload => TypeKind::Float,
            Opcode::Daload => TypeKind::Double,
            Opcode::Aaload => TypeKind::Reference,
            Opcode::Baload => TypeKind::Byte,
            Opcode::Caload => TypeKind::Char,
            Opcode::Saload => TypeKind::Short,
            other => unreachable!("{} is not an array load opcode", other),
        }
    }

    /// The array store opcode for an element kind. `boolean` uses `bastore`.
    pub fn array_store_opcode(self) -> Option<Opcode> {
        Some(match self {
            TypeKind::Int => Opcode::Iastore,
            TypeKind::Long => Opcode::Lastore,
            TypeKind::Float => Opcode::Fastore,
            TypeKind::Double => Opcode::Dastore,
            TypeKind::Reference => Opcode::Aastore,
            TypeKind::Byte | TypeKind::Boolean => Opcode::Bastore,
            TypeKind::Char => Opcode::Castore,
            TypeKind::Short => Opcode::Sastore,
            TypeKind::Void => return None,
        })
    }

    /// The array load opcode for an element kind. `boolean` uses `baload`.
    pub fn array_load_opcode(self) -> Option<Opcode> {
        Some(match self {
            TypeKind::Int => Opcode::Iaload,
            TypeKind::Long => Opcode::Laload,
            TypeKind::Float => Opcode::Faload,
            TypeKind::Double => Opcode::Daload,
            TypeKind::Reference => Opcode::Aaload,
            TypeKind::Byte | TypeKind::Boolean => Opcode::Baload,
            TypeKind::Char => Opcode::Caload,
            TypeKind::Short => Opcode::Saload,
            TypeKind::Void => return None,
        })
    }
}
