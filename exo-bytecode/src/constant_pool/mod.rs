//! The constant pool instructions refer to by index.

use fnv::FnvHashMap;

use crate::{
    error::{self, ConstantPoolError},
    stream::{CodeItem, CodeStream, CodeWriter},
};

use self::entry::modified_utf8_len;
pub use self::entry::{ConstantPoolEntry, RefKind};
pub use self::symbol::{
    ClassEntry, ConstantValue, InvokeDynamicEntry, LoadableConstant, MemberKind, MemberRef,
};

mod entry;
mod symbol;

/// Resolves constant pool indexes into entries and symbols.
///
/// Only [`entry`](ConstantResolver::entry) needs implementing; the typed
/// resolutions follow the entry graph through it. Failures are surfaced as is.
pub trait ConstantResolver {
    /// The entry at a 1-based index.
    fn entry(&self, index: u16) -> Result<&ConstantPoolEntry, ConstantPoolError>;

    fn utf8(&self, index: u16) -> Result<&str, ConstantPoolError> {
        match self.entry(index)? {
            ConstantPoolEntry::Utf8 { data } => Ok(data),
            _ => Err(wrong_kind(index, "Utf8")),
        }
    }

    fn class_entry(&self, index: u16) -> Result<ClassEntry, ConstantPoolError> {
        match self.entry(index)? {
            ConstantPoolEntry::Class { name_index } => Ok(ClassEntry {
                index,
                name: self.utf8(*name_index)?.to_owned(),
            }),
            _ => Err(wrong_kind(index, "Class")),
        }
    }

    /// The name and descriptor of a `NameAndType` entry.
    fn name_and_type(&self, index: u16) -> Result<(&str, &str), ConstantPoolError> {
        match self.entry(index)? {
            ConstantPoolEntry::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            _ => Err(wrong_kind(index, "NameAndType")),
        }
    }

    fn member_ref(&self, index: u16) -> Result<MemberRef, ConstantPoolError> {
        let (kind, class_index, name_and_type_index) = match self.entry(index)? {
            ConstantPoolEntry::Fieldref {
                class_index,
                name_and_type_index,
            } => (MemberKind::Field, class_index, name_and_type_index),
            ConstantPoolEntry::Methodref {
                class_index,
                name_and_type_index,
            } => (MemberKind::Method, class_index, name_and_type_index),
            ConstantPoolEntry::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => (MemberKind::InterfaceMethod, class_index, name_and_type_index),
            _ => return Err(wrong_kind(index, "member reference")),
        };
        let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
        Ok(MemberRef {
            index,
            kind,
            owner: self.class_entry(*class_index)?,
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
        })
    }

    /// A constant `ldc`, `ldc_w` or `ldc2_w` may load.
    fn loadable_constant(&self, index: u16) -> Result<LoadableConstant, ConstantPoolError> {
        let value = match self.entry(index)? {
            ConstantPoolEntry::Integer { bytes } => ConstantValue::Integer(*bytes),
            ConstantPoolEntry::Float { bits } => ConstantValue::Float(*bits),
            ConstantPoolEntry::Long { bytes } => ConstantValue::Long(*bytes),
            ConstantPoolEntry::Double { bits } => ConstantValue::Double(*bits),
            ConstantPoolEntry::String { string_index } => {
                ConstantValue::String(self.utf8(*string_index)?.to_owned())
            }
            ConstantPoolEntry::Class { name_index } => {
                ConstantValue::Class(self.utf8(*name_index)?.to_owned())
            }
            ConstantPoolEntry::MethodType { descriptor_index } => {
                ConstantValue::MethodType(self.utf8(*descriptor_index)?.to_owned())
            }
            ConstantPoolEntry::MethodHandle {
                reference_kind,
                reference_index,
            } => ConstantValue::MethodHandle {
                kind: *reference_kind,
                reference: self.member_ref(*reference_index)?,
            },
            ConstantPoolEntry::Dynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => {
                let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
                ConstantValue::Dynamic {
                    bootstrap_method: *bootstrap_method_attr_index,
                    name: name.to_owned(),
                    descriptor: descriptor.to_owned(),
                }
            }
            _ => return Err(wrong_kind(index, "loadable constant")),
        };
        Ok(LoadableConstant { index, value })
    }

    fn invoke_dynamic(&self, index: u16) -> Result<InvokeDynamicEntry, ConstantPoolError> {
        match self.entry(index)? {
            ConstantPoolEntry::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => {
                let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
                Ok(InvokeDynamicEntry {
                    index,
                    bootstrap_method: *bootstrap_method_attr_index,
                    name: name.to_owned(),
                    descriptor: descriptor.to_owned(),
                })
            }
            _ => Err(wrong_kind(index, "InvokeDynamic")),
        }
    }
}

fn wrong_kind(index: u16, expected: &'static str) -> ConstantPoolError {
    ConstantPoolError::WrongEntryKind { index, expected }
}

/// The constant pool. Contains all constant pool entries.
///
/// Slots are 1-based; the slot after a `Long` or `Double` entry is unusable.
/// Identical entries are shared when added through the `add_*` helpers.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Option<ConstantPoolEntry>>,
    lookup: FnvHashMap<ConstantPoolEntry, u16>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots in use, including the unusable halves of wide entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get a constant from the pool. Entries are based on 1.
    pub fn get_constant(&self, index: u16) -> Result<&ConstantPoolEntry, ConstantPoolError> {
        (index as usize)
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .and_then(Option::as_ref)
            .ok_or(ConstantPoolError::IndexOutOfRange(index))
    }

    /// Get a UTF-8 constant from the pool.
    pub fn get_utf8_constant(&self, index: u16) -> Result<&str, ConstantPoolError> {
        self.utf8(index)
    }

    /// Every usable entry with its index.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &ConstantPoolEntry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (i as u16 + 1, e)))
    }

    /// Add an entry, reusing an identical one when present.
    pub fn add(&mut self, entry: ConstantPoolEntry) -> Result<u16, ConstantPoolError> {
        if let Some(index) = self.lookup.get(&entry) {
            return Ok(*index);
        }
        let index = self.push(entry.clone())?;
        self.lookup.insert(entry, index);
        Ok(index)
    }

    fn push(&mut self, entry: ConstantPoolEntry) -> Result<u16, ConstantPoolError> {
        if let ConstantPoolEntry::Utf8 { data } = &entry {
            let len = modified_utf8_len(data);
            if len > u16::MAX as usize {
                return Err(ConstantPoolError::Utf8TooLong(len));
            }
        }
        let width = if entry.is_wide() { 2 } else { 1 };
        if self.entries.len() + width > u16::MAX as usize - 1 {
            return Err(ConstantPoolError::Overflow);
        }
        self.entries.push(Some(entry));
        let index = self.entries.len() as u16;
        if width == 2 {
            self.entries.push(None);
        }
        Ok(index)
    }

    pub fn add_utf8(&mut self, data: &str) -> Result<u16, ConstantPoolError> {
        self.add(ConstantPoolEntry::Utf8 {
            data: data.to_owned(),
        })
    }

    pub fn add_class(&mut self, name: &str) -> Result<u16, ConstantPoolError> {
        let name_index = self.add_utf8(name)?;
        self.add(ConstantPoolEntry::Class { name_index })
    }

    pub fn add_name_and_type(
        &mut self,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, ConstantPoolError> {
        let name_index = self.add_utf8(name)?;
        let descriptor_index = self.add_utf8(descriptor)?;
        self.add(ConstantPoolEntry::NameAndType {
            name_index,
            descriptor_index,
        })
    }

    pub fn add_field_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, ConstantPoolError> {
        let class_index = self.add_class(owner)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.add(ConstantPoolEntry::Fieldref {
            class_index,
            name_and_type_index,
        })
    }

    pub fn add_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, ConstantPoolError> {
        let class_index = self.add_class(owner)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.add(ConstantPoolEntry::Methodref {
            class_index,
            name_and_type_index,
        })
    }

    pub fn add_interface_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, ConstantPoolError> {
        let class_index = self.add_class(owner)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.add(ConstantPoolEntry::InterfaceMethodref {
            class_index,
            name_and_type_index,
        })
    }

    pub fn add_string(&mut self, value: &str) -> Result<u16, ConstantPoolError> {
        let string_index = self.add_utf8(value)?;
        self.add(ConstantPoolEntry::String { string_index })
    }

    pub fn add_integer(&mut self, value: i32) -> Result<u16, ConstantPoolError> {
        self.add(ConstantPoolEntry::Integer { bytes: value })
    }

    pub fn add_float(&mut self, value: f32) -> Result<u16, ConstantPoolError> {
        self.add(ConstantPoolEntry::Float {
            bits: value.to_bits(),
        })
    }

    pub fn add_long(&mut self, value: i64) -> Result<u16, ConstantPoolError> {
        self.add(ConstantPoolEntry::Long { bytes: value })
    }

    pub fn add_double(&mut self, value: f64) -> Result<u16, ConstantPoolError> {
        self.add(ConstantPoolEntry::Double {
            bits: value.to_bits(),
        })
    }

    pub fn add_method_type(&mut self, descriptor: &str) -> Result<u16, ConstantPoolError> {
        let descriptor_index = self.add_utf8(descriptor)?;
        self.add(ConstantPoolEntry::MethodType { descriptor_index })
    }

    /// Add a method handle to an already added member reference.
    pub fn add_method_handle(
        &mut self,
        reference_kind: RefKind,
        reference_index: u16,
    ) -> Result<u16, ConstantPoolError> {
        self.add(ConstantPoolEntry::MethodHandle {
            reference_kind,
            reference_index,
        })
    }

    pub fn add_invoke_dynamic(
        &mut self,
        bootstrap_method: u16,
        name: &str,
        descriptor: &str,
    ) -> Result<u16, ConstantPoolError> {
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.add(ConstantPoolEntry::InvokeDynamic {
            bootstrap_method_attr_index: bootstrap_method,
            name_and_type_index,
        })
    }
}

impl ConstantResolver for ConstantPool {
    fn entry(&self, index: u16) -> Result<&ConstantPoolEntry, ConstantPoolError> {
        self.get_constant(index)
    }
}

impl CodeItem for ConstantPool {
    fn read_from_stream(s: &mut CodeStream<'_>) -> error::Result<Self> {
        let count = s.read_u2()?;
        let mut pool = ConstantPool::new();
        while pool.entries.len() + 1 < count as usize {
            let entry = ConstantPoolEntry::read_from_stream(s)?;
            let index = pool.push(entry.clone())?;
            pool.lookup.entry(entry).or_insert(index);
        }
        Ok(pool)
    }

    fn write_to_stream(&self, w: &mut CodeWriter) {
        w.write_u2(self.entries.len() as u16 + 1);
        for entry in self.entries.iter().flatten() {
            entry.write_to_stream(w);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_reuses_entries() {
        let mut cp = ConstantPool::new();
        let a = cp.add_method_ref("java/lang/Object", "<init>", "()V").unwrap();
        let b = cp.add_method_ref("java/lang/Object", "<init>", "()V").unwrap();
        assert_eq!(a, b);
        let class = cp.add_class("java/lang/Object").unwrap();
        assert_eq!(cp.class_entry(class).unwrap().name(), "java/lang/Object");
        let m = cp.member_ref(a).unwrap();
        assert_eq!(m.kind(), MemberKind::Method);
        assert_eq!(m.owner().index(), class);
        assert_eq!(m.descriptor(), "()V");
    }

    #[test]
    fn wide_entries_take_two_slots() {
        let mut cp = ConstantPool::new();
        let l = cp.add_long(7).unwrap();
        let i = cp.add_integer(7).unwrap();
        assert_eq!((l, i), (1, 3));
        assert_eq!(cp.get_constant(2), Err(ConstantPoolError::IndexOutOfRange(2)));
        assert_eq!(cp.get_constant(0), Err(ConstantPoolError::IndexOutOfRange(0)));
        assert_eq!(
            cp.loadable_constant(l).unwrap().value(),
            &ConstantValue::Long(7)
        );
    }

    #[test]
    fn wrong_entry_kinds_are_reported() {
        let mut cp = ConstantPool::new();
        let utf8 = cp.add_utf8("x").unwrap();
        assert_eq!(
            cp.class_entry(utf8),
            Err(ConstantPoolError::WrongEntryKind {
                index: utf8,
                expected: "Class"
            })
        );
        assert!(matches!(
            cp.loadable_constant(utf8),
            Err(ConstantPoolError::WrongEntryKind { .. })
        ));
    }

    #[test]
    fn read_back_written_pool() {
        let mut cp = ConstantPool::new();
        cp.add_double(1.5).unwrap();
        cp.add_string("hello").unwrap();
        let field = cp.add_field_ref("A", "b", "I").unwrap();
        let mut w = CodeWriter::new();
        cp.write_to_stream(&mut w);

        let read = ConstantPool::read_from_stream(&mut CodeStream::new(w.as_bytes())).unwrap();
        assert_eq!(read.len(), cp.len());
        assert_eq!(read.member_ref(field), cp.member_ref(field));
        assert_eq!(
            read.loadable_constant(1).unwrap().value(),
            &ConstantValue::double(1.5)
        );
    }

    #[test]
    fn method_handles_and_dynamic_call_sites() {
        let mut cp = ConstantPool::new();
        let target = cp.add_method_ref("A", "m", "()V").unwrap();
        let handle = cp.add_method_handle(RefKind::InvokeStatic, target).unwrap();
        let indy = cp.add_invoke_dynamic(0, "run", "()Ljava/lang/Runnable;").unwrap();
        match cp.loadable_constant(handle).unwrap().value() {
            ConstantValue::MethodHandle { kind, reference } => {
                assert_eq!(*kind, RefKind::InvokeStatic);
                assert_eq!(reference.name(), "m");
            }
            other => panic!("unexpected {:?}", other),
        }
        let entry = cp.invoke_dynamic(indy).unwrap();
        assert_eq!(entry.name(), "run");
        assert_eq!(entry.bootstrap_method(), 0);
    }

    #[test]
    fn oversized_strings_are_refused() {
        let mut cp = ConstantPool::new();
        assert_eq!(
            cp.add_utf8(&"a".repeat(70_000)),
            Err(ConstantPoolError::Utf8TooLong(70_000))
        );
        assert_eq!(
            cp.add_class(&"\0".repeat(40_000)),
            Err(ConstantPoolError::Utf8TooLong(80_000))
        );
        assert_eq!(cp.len(), 0);
        assert!(cp.add_utf8(&"a".repeat(65_535)).is_ok());
    }
}
