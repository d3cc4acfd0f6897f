//! Field and method descriptors, parsed as far as instructions need them.

use std::str::Chars;

use crate::type_kind::TypeKind;

/// Field type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldType {
    /// A primitive; never `Reference` or `Void`.
    Base(TypeKind),
    /// An object type by internal class name.
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    /// Parse a complete field descriptor such as `[Ljava/lang/String;`.
    pub fn parse(descriptor: &str) -> Option<FieldType> {
        let mut chars = descriptor.chars();
        let ty = Self::parse_from(&mut chars)?;
        chars.next().is_none().then(|| ty)
    }

    fn parse_from(chars: &mut Chars<'_>) -> Option<FieldType> {
        match chars.next()? {
            'L' => {
                let rest = chars.as_str();
                let end = rest.find(';')?;
                let name = &rest[..end];
                if name.is_empty() {
                    return None;
                }
                *chars = rest[end + 1..].chars();
                Some(FieldType::Object(name.to_owned()))
            }
            '[' => Some(FieldType::Array(Box::new(Self::parse_from(chars)?))),
            'V' => None,
            c => TypeKind::from_descriptor_char(c).map(FieldType::Base),
        }
    }

    pub fn type_kind(&self) -> TypeKind {
        match self {
            FieldType::Base(kind) => *kind,
            FieldType::Object(_) | FieldType::Array(_) => TypeKind::Reference,
        }
    }

    /// Number of array dimensions; zero for non-array types.
    pub fn dimensions(&self) -> usize {
        match self {
            FieldType::Array(component) => 1 + component.dimensions(),
            _ => 0,
        }
    }
}

/// A method descriptor: parameter types and a return type, `None` meaning `void`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    pub return_type: Option<FieldType>,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Option<MethodDescriptor> {
        let mut chars = descriptor.strip_prefix('(')?.chars();
        let mut parameters = vec![];
        loop {
            let rest = chars.as_str();
            if let Some(after) = rest.strip_prefix(')') {
                chars = after.chars();
                break;
            }
            parameters.push(FieldType::parse_from(&mut chars)?);
        }
        let return_type = match chars.as_str() {
            "V" => None,
            rest => Some(FieldType::parse(rest)?),
        };
        Some(MethodDescriptor {
            parameters,
            return_type,
        })
    }

    /// Local variable slots taken by the parameters, excluding `this`.
    pub fn parameter_slots(&self) -> u16 {
        self.parameters
            .iter()
            .map(|p| p.type_kind().slot_size())
            .sum()
    }

    pub fn return_kind(&self) -> TypeKind {
        self.return_type
            .as_ref()
            .map_or(TypeKind::Void, FieldType::type_kind)
    }
}

/// The kind of a field descriptor, if it parses.
pub fn field_type_kind(descriptor: &str) -> Option<TypeKind> {
    FieldType::parse(descriptor).map(|t| t.type_kind())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_descriptors() {
        assert_eq!(FieldType::parse("I"), Some(FieldType::Base(TypeKind::Int)));
        assert_eq!(
            FieldType::parse("[[Ljava/lang/String;"),
            Some(FieldType::Array(Box::new(FieldType::Array(Box::new(
                FieldType::Object("java/lang/String".to_owned())
            )))))
        );
        assert_eq!(FieldType::parse("[[I").map(|t| t.dimensions()), Some(2));
        assert_eq!(field_type_kind("Z"), Some(TypeKind::Boolean));
        for bad in ["", "V", "L;", "Ljava/lang/Object", "II", "[", "Q"] {
            assert_eq!(FieldType::parse(bad), None, "{}", bad);
        }
    }

    #[test]
    fn method_descriptors() {
        let d = MethodDescriptor::parse("(IJ[DLjava/lang/Object;)V").unwrap();
        assert_eq!(d.parameters.len(), 4);
        assert_eq!(d.parameter_slots(), 1 + 2 + 1 + 1);
        assert_eq!(d.return_kind(), TypeKind::Void);

        let d = MethodDescriptor::parse("()D").unwrap();
        assert_eq!(d.parameter_slots(), 0);
        assert_eq!(d.return_kind(), TypeKind::Double);

        for bad in ["V", "()", "(V)V", "(I", "()VV", "I)V"] {
            assert_eq!(MethodDescriptor::parse(bad), None, "{}", bad);
        }
    }
}
