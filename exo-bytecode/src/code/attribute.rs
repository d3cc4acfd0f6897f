use crate::{
    constant_pool::{ConstantPool, ConstantResolver},
    error::{self, CodeError, MalformedCode},
    stream::{CodeItem, CodeStream, CodeWriter},
};

/// Names of the nested attributes a `Code` attribute body may carry.
#[allow(non_upper_case_globals)]
pub mod attrtype {
    pub const LineNumberTable: &str = "LineNumberTable";
    pub const LocalVariableTable: &str = "LocalVariableTable";
    pub const LocalVariableTypeTable: &str = "LocalVariableTypeTable";
}

/// Largest code array the `Code` attribute allows.
pub const MAX_CODE_LENGTH: usize = 0xffff;

/// An entry in the `exception_table` of a `Code` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExceptionTableEntry {
    /// Inclusive.
    pub start_pc: u16,
    /// Exclusive; may equal the code length.
    pub end_pc: u16,
    pub handler_pc: u16,
    /// Pool index of the caught class, or zero to catch everything.
    pub catch_type: u16,
}

impl CodeItem for ExceptionTableEntry {
    fn read_from_stream(s: &mut CodeStream<'_>) -> error::Result<Self> {
        Ok(Self {
            start_pc: s.read_u2()?,
            end_pc: s.read_u2()?,
            handler_pc: s.read_u2()?,
            catch_type: s.read_u2()?,
        })
    }

    fn write_to_stream(&self, w: &mut CodeWriter) {
        w.write_u2(self.start_pc);
        w.write_u2(self.end_pc);
        w.write_u2(self.handler_pc);
        w.write_u2(self.catch_type);
    }
}

/// An entry in the `line_number_table` of a `LineNumberTable` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineNumberTableEntry {
    pub start_pc: u16,
    pub line_number: u16,
}

impl CodeItem for LineNumberTableEntry {
    fn read_from_stream(s: &mut CodeStream<'_>) -> error::Result<Self> {
        Ok(Self {
            start_pc: s.read_u2()?,
            line_number: s.read_u2()?,
        })
    }

    fn write_to_stream(&self, w: &mut CodeWriter) {
        w.write_u2(self.start_pc);
        w.write_u2(self.line_number);
    }
}

/// An entry of a `LocalVariableTable` or `LocalVariableTypeTable` attribute.
///
/// In a `LocalVariableTypeTable`, `descriptor_index` refers to a field signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalVariableTableEntry {
    pub start_pc: u16,
    /// The variable is live in `start_pc..start_pc + length`.
    pub length: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    /// Local variable slot.
    pub index: u16,
}

impl LocalVariableTableEntry {
    pub fn end_pc(&self) -> usize {
        self.start_pc as usize + self.length as usize
    }
}

impl CodeItem for LocalVariableTableEntry {
    fn read_from_stream(s: &mut CodeStream<'_>) -> error::Result<Self> {
        Ok(Self {
            start_pc: s.read_u2()?,
            length: s.read_u2()?,
            name_index: s.read_u2()?,
            descriptor_index: s.read_u2()?,
            index: s.read_u2()?,
        })
    }

    fn write_to_stream(&self, w: &mut CodeWriter) {
        w.write_u2(self.start_pc);
        w.write_u2(self.length);
        w.write_u2(self.name_index);
        w.write_u2(self.descriptor_index);
        w.write_u2(self.index);
    }
}

/// The body of a `Code` attribute, after its name and length.
///
/// Nested attributes other than the line number and local variable tables are
/// skipped when reading and never written. Tables split over several nested
/// attributes are merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub line_numbers: Vec<LineNumberTableEntry>,
    pub local_variables: Vec<LocalVariableTableEntry>,
    pub local_variable_types: Vec<LocalVariableTableEntry>,
}

impl CodeAttribute {
    /// Read an attribute body, resolving nested attribute names through `cp`.
    pub fn read_from_stream<R>(s: &mut CodeStream<'_>, cp: &R) -> error::Result<Self>
    where
        R: ConstantResolver + ?Sized,
    {
        let max_stack = s.read_u2()?;
        let max_locals = s.read_u2()?;
        let code_length = s.read_u4()? as usize;
        if code_length == 0 {
            return Err(CodeError::malformed(s.position(), MalformedCode::EmptyCode));
        }
        if code_length > MAX_CODE_LENGTH {
            return Err(CodeError::malformed(
                s.position(),
                MalformedCode::CodeTooLarge(code_length),
            ));
        }
        let code = s.read_dynamic(code_length)?.to_vec();
        let exception_table_length = s.read_u2()?;
        let exception_table = s.read_sequence(exception_table_length as usize)?;

        let mut attribute = Self {
            max_stack,
            max_locals,
            code,
            exception_table,
            ..Default::default()
        };

        let attributes_count = s.read_u2()?;
        for _ in 0..attributes_count {
            let name_index = s.read_u2()?;
            let length = s.read_u4()? as usize;
            let body = s.read_dynamic(length)?;
            let mut body = CodeStream::new(body);
            match cp.utf8(name_index)? {
                attrtype::LineNumberTable => {
                    let count = body.read_u2()?;
                    attribute
                        .line_numbers
                        .extend(body.read_sequence::<LineNumberTableEntry>(count as usize)?);
                }
                attrtype::LocalVariableTable => {
                    let count = body.read_u2()?;
                    attribute
                        .local_variables
                        .extend(body.read_sequence::<LocalVariableTableEntry>(count as usize)?);
                }
                attrtype::LocalVariableTypeTable => {
                    let count = body.read_u2()?;
                    attribute
                        .local_variable_types
                        .extend(body.read_sequence::<LocalVariableTableEntry>(count as usize)?);
                }
                _ => {}
            }
        }
        attribute.check_tables()?;
        Ok(attribute)
    }

    /// Write the attribute body, adding nested attribute names to `cp`.
    pub fn write_to_stream(&self, w: &mut CodeWriter, cp: &mut ConstantPool) -> error::Result<()> {
        if self.code.is_empty() {
            return Err(CodeError::malformed(0, MalformedCode::EmptyCode));
        }
        if self.code.len() > MAX_CODE_LENGTH {
            return Err(CodeError::malformed(
                0,
                MalformedCode::CodeTooLarge(self.code.len()),
            ));
        }
        w.write_u2(self.max_stack);
        w.write_u2(self.max_locals);
        w.write_u4(self.code.len() as u32);
        w.write_bytes(&self.code);
        w.write_u2(self.exception_table.len() as u16);
        w.write_sequence(&self.exception_table);

        let mut nested = Vec::new();
        if !self.line_numbers.is_empty() {
            nested.push((attrtype::LineNumberTable, table(&self.line_numbers)));
        }
        if !self.local_variables.is_empty() {
            nested.push((attrtype::LocalVariableTable, table(&self.local_variables)));
        }
        if !self.local_variable_types.is_empty() {
            nested.push((
                attrtype::LocalVariableTypeTable,
                table(&self.local_variable_types),
            ));
        }
        w.write_u2(nested.len() as u16);
        for (name, body) in nested {
            w.write_u2(cp.add_utf8(name)?);
            w.write_u4(body.len() as u32);
            w.write_bytes(&body);
        }
        Ok(())
    }

    /// Every table pc must lie inside the code array; exclusive ends may equal its length.
    fn check_tables(&self) -> error::Result<()> {
        let len = self.code.len();
        let bad = |pc: usize| CodeError::malformed(pc, MalformedCode::BadTablePc(pc));
        for e in &self.exception_table {
            if e.start_pc as usize >= len || e.start_pc >= e.end_pc {
                return Err(bad(e.start_pc as usize));
            }
            if e.end_pc as usize > len {
                return Err(bad(e.end_pc as usize));
            }
            if e.handler_pc as usize >= len {
                return Err(bad(e.handler_pc as usize));
            }
        }
        if let Some(e) = self.line_numbers.iter().find(|e| e.start_pc as usize >= len) {
            return Err(bad(e.start_pc as usize));
        }
        for e in self.local_variables.iter().chain(&self.local_variable_types) {
            if e.start_pc as usize >= len {
                return Err(bad(e.start_pc as usize));
            }
            if e.end_pc() > len {
                return Err(bad(e.end_pc()));
            }
        }
        Ok(())
    }
}

/// A count-prefixed table body.
fn table<T: CodeItem>(entries: &[T]) -> Vec<u8> {
    let mut w = CodeWriter::new();
    w.write_u2(entries.len() as u16);
    w.write_sequence(entries);
    w.into_bytes()
}
