use crate::{
    error::{self, CodeError, ConstantPoolError},
    stream::{CodeItem, CodeStream, CodeWriter},
};

/// The tag values for each type of constant pool entry.
#[allow(non_upper_case_globals)]
pub(crate) mod tags {
    pub const CONSTANT_Utf8: u8 = 1;
    pub const CONSTANT_Integer: u8 = 3;
    pub const CONSTANT_Float: u8 = 4;
    pub const CONSTANT_Long: u8 = 5;
    pub const CONSTANT_Double: u8 = 6;
    pub const CONSTANT_Class: u8 = 7;
    pub const CONSTANT_String: u8 = 8;
    pub const CONSTANT_Fieldref: u8 = 9;
    pub const CONSTANT_Methodref: u8 = 10;
    pub const CONSTANT_InterfaceMethodref: u8 = 11;
    pub const CONSTANT_NameAndType: u8 = 12;
    pub const CONSTANT_MethodHandle: u8 = 15;
    pub const CONSTANT_MethodType: u8 = 16;
    pub const CONSTANT_Dynamic: u8 = 17;
    pub const CONSTANT_InvokeDynamic: u8 = 18;
    pub const CONSTANT_Module: u8 = 19;
    pub const CONSTANT_Package: u8 = 20;
}

numerical_enum! {
    /// The possible reference kind values for method handles.
    RefKind: u8 {
        GetField = 1,
        GetStatic = 2,
        PutField = 3,
        PutStatic = 4,
        InvokeVirtual = 5,
        InvokeStatic = 6,
        InvokeSpecial = 7,
        NewInvokeSpecial = 8,
        InvokeInterface = 9,
    } => |_: &CodeStream<'_>, v| CodeError::from(ConstantPoolError::UnknownReferenceKind(v))
}

/// A constant pool entry.
///
/// Deserialization does not perform any index verification; indexes are
/// checked when an entry is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstantPoolEntry {
    /// Constant string values, decoded from the modified UTF-8 form.
    Utf8 { data: String },
    Integer { bytes: i32 },
    /// IEEE 754 single format bits.
    Float { bits: u32 },
    Long { bytes: i64 },
    /// IEEE 754 double format bits.
    Double { bits: u64 },
    /// A class or an interface; `name_index` refers to a `Utf8` entry.
    Class { name_index: u16 },
    String { string_index: u16 },
    Fieldref {
        class_index: u16,
        name_and_type_index: u16,
    },
    Methodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    /// A field or method without the class or interface type it belongs to.
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: RefKind,
        reference_index: u16,
    },
    MethodType { descriptor_index: u16 },
    /// A dynamically-computed constant.
    Dynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    /// A dynamically-computed call site used by `invokedynamic`.
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    Module { name_index: u16 },
    Package { name_index: u16 },
}

impl ConstantPoolEntry {
    /// Whether the entry takes up two constant pool slots.
    pub fn is_wide(&self) -> bool {
        matches!(self, Self::Long { .. } | Self::Double { .. })
    }

    /// Name of the entry kind, as used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Utf8 { .. } => "Utf8",
            Self::Integer { .. } => "Integer",
            Self::Float { .. } => "Float",
            Self::Long { .. } => "Long",
            Self::Double { .. } => "Double",
            Self::Class { .. } => "Class",
            Self::String { .. } => "String",
            Self::Fieldref { .. } => "Fieldref",
            Self::Methodref { .. } => "Methodref",
            Self::InterfaceMethodref { .. } => "InterfaceMethodref",
            Self::NameAndType { .. } => "NameAndType",
            Self::MethodHandle { .. } => "MethodHandle",
            Self::MethodType { .. } => "MethodType",
            Self::Dynamic { .. } => "Dynamic",
            Self::InvokeDynamic { .. } => "InvokeDynamic",
            Self::Module { .. } => "Module",
            Self::Package { .. } => "Package",
        }
    }
}

impl CodeItem for ConstantPoolEntry {
    fn read_from_stream(s: &mut CodeStream<'_>) -> error::Result<Self> {
        s.mark();
        match s.read_u1()? {
            tags::CONSTANT_Utf8 => {
                let length = s.read_u2()?;
                let bytes = s.read_dynamic(length as usize)?;
                Ok(Self::Utf8 {
                    data: decode_modified_utf8(bytes)?,
                })
            }
            tags::CONSTANT_Integer => Ok(Self::Integer { bytes: s.read_i4()? }),
            tags::CONSTANT_Float => Ok(Self::Float { bits: s.read_u4()? }),
            tags::CONSTANT_Long => Ok(Self::Long {
                bytes: i64::from_be_bytes(s.read::<8>()?),
            }),
            tags::CONSTANT_Double => Ok(Self::Double {
                bits: u64::from_be_bytes(s.read::<8>()?),
            }),
            tags::CONSTANT_Class => Ok(Self::Class {
                name_index: s.read_u2()?,
            }),
            tags::CONSTANT_String => Ok(Self::String {
                string_index: s.read_u2()?,
            }),
            tags::CONSTANT_Fieldref => Ok(Self::Fieldref {
                class_index: s.read_u2()?,
                name_and_type_index: s.read_u2()?,
            }),
            tags::CONSTANT_Methodref => Ok(Self::Methodref {
                class_index: s.read_u2()?,
                name_and_type_index: s.read_u2()?,
            }),
            tags::CONSTANT_InterfaceMethodref => Ok(Self::InterfaceMethodref {
                class_index: s.read_u2()?,
                name_and_type_index: s.read_u2()?,
            }),
            tags::CONSTANT_NameAndType => Ok(Self::NameAndType {
                name_index: s.read_u2()?,
                descriptor_index: s.read_u2()?,
            }),
            tags::CONSTANT_MethodHandle => Ok(Self::MethodHandle {
                reference_kind: RefKind::read_from_stream(s)?,
                reference_index: s.read_u2()?,
            }),
            tags::CONSTANT_MethodType => Ok(Self::MethodType {
                descriptor_index: s.read_u2()?,
            }),
            tags::CONSTANT_Dynamic => Ok(Self::Dynamic {
                bootstrap_method_attr_index: s.read_u2()?,
                name_and_type_index: s.read_u2()?,
            }),
            tags::CONSTANT_InvokeDynamic => Ok(Self::InvokeDynamic {
                bootstrap_method_attr_index: s.read_u2()?,
                name_and_type_index: s.read_u2()?,
            }),
            tags::CONSTANT_Module => Ok(Self::Module {
                name_index: s.read_u2()?,
            }),
            tags::CONSTANT_Package => Ok(Self::Package {
                name_index: s.read_u2()?,
            }),
            v => Err(ConstantPoolError::UnknownTag(v).into()),
        }
    }

    fn write_to_stream(&self, w: &mut CodeWriter) {
        match self {
            Self::Utf8 { data } => {
                let bytes = encode_modified_utf8(data);
                w.write_u1(tags::CONSTANT_Utf8);
                w.write_u2(bytes.len() as u16);
                w.write_bytes(&bytes);
            }
            Self::Integer { bytes } => {
                w.write_u1(tags::CONSTANT_Integer);
                w.write_i4(*bytes);
            }
            Self::Float { bits } => {
                w.write_u1(tags::CONSTANT_Float);
                w.write_u4(*bits);
            }
            Self::Long { bytes } => {
                w.write_u1(tags::CONSTANT_Long);
                w.write_bytes(&bytes.to_be_bytes());
            }
            Self::Double { bits } => {
                w.write_u1(tags::CONSTANT_Double);
                w.write_bytes(&bits.to_be_bytes());
            }
            Self::Class { name_index } => {
                w.write_u1(tags::CONSTANT_Class);
                w.write_u2(*name_index);
            }
            Self::String { string_index } => {
                w.write_u1(tags::CONSTANT_String);
                w.write_u2(*string_index);
            }
            Self::Fieldref {
                class_index,
                name_and_type_index,
            } => {
                w.write_u1(tags::CONSTANT_Fieldref);
                w.write_u2(*class_index);
                w.write_u2(*name_and_type_index);
            }
            Self::Methodref {
                class_index,
                name_and_type_index,
            } => {
                w.write_u1(tags::CONSTANT_Methodref);
                w.write_u2(*class_index);
                w.write_u2(*name_and_type_index);
            }
            Self::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => {
                w.write_u1(tags::CONSTANT_InterfaceMethodref);
                w.write_u2(*class_index);
                w.write_u2(*name_and_type_index);
            }
            Self::NameAndType {
                name_index,
                descriptor_index,
            } => {
                w.write_u1(tags::CONSTANT_NameAndType);
                w.write_u2(*name_index);
                w.write_u2(*descriptor_index);
            }
            Self::MethodHandle {
                reference_kind,
                reference_index,
            } => {
                w.write_u1(tags::CONSTANT_MethodHandle);
                reference_kind.write_to_stream(w);
                w.write_u2(*reference_index);
            }
            Self::MethodType { descriptor_index } => {
                w.write_u1(tags::CONSTANT_MethodType);
                w.write_u2(*descriptor_index);
            }
            Self::Dynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => {
                w.write_u1(tags::CONSTANT_Dynamic);
                w.write_u2(*bootstrap_method_attr_index);
                w.write_u2(*name_and_type_index);
            }
            Self::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => {
                w.write_u1(tags::CONSTANT_InvokeDynamic);
                w.write_u2(*bootstrap_method_attr_index);
                w.write_u2(*name_and_type_index);
            }
            Self::Module { name_index } => {
                w.write_u1(tags::CONSTANT_Module);
                w.write_u2(*name_index);
            }
            Self::Package { name_index } => {
                w.write_u1(tags::CONSTANT_Package);
                w.write_u2(*name_index);
            }
        }
    }
}

/// Creates a string from the class file format's modified UTF-8 encoding.
///
/// `NUL` is encoded as two bytes and supplementary characters as a pair of
/// three-byte surrogates, so the bytes are decoded into UTF-16 code units first.
/// Unpaired surrogates have no `String` form and are rejected as `InvalidUtf8`.
pub(crate) fn decode_modified_utf8(b: &[u8]) -> Result<String, ConstantPoolError> {
    let mut units = Vec::with_capacity(b.len());
    let mut index = 0;
    let continuation = |index: usize| match b.get(index) {
        Some(byte) if byte & 0xc0 == 0x80 => Ok((byte & 0x3f) as u16),
        _ => Err(ConstantPoolError::InvalidUtf8),
    };
    while index < b.len() {
        let byte = b[index];
        match byte {
            0x01..=0x7f => {
                units.push(byte as u16);
                index += 1;
            }
            0xc0..=0xdf => {
                units.push(((byte & 0x1f) as u16) << 6 | continuation(index + 1)?);
                index += 2;
            }
            0xe0..=0xef => {
                units.push(
                    ((byte & 0x0f) as u16) << 12
                        | continuation(index + 1)? << 6
                        | continuation(index + 2)?,
                );
                index += 3;
            }
            _ => return Err(ConstantPoolError::InvalidUtf8),
        }
    }
    String::from_utf16(&units).map_err(|_| ConstantPoolError::InvalidUtf8)
}

/// Length of `s` in the class file format's modified UTF-8 encoding.
pub(crate) fn modified_utf8_len(s: &str) -> usize {
    s.encode_utf16()
        .map(|unit| match unit {
            0x0001..=0x007f => 1,
            0x0000 | 0x0080..=0x07ff => 2,
            _ => 3,
        })
        .sum()
}

/// Encodes a string into the class file format's modified UTF-8 encoding.
pub(crate) fn encode_modified_utf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007f => out.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                out.push(0xc0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    out
}
