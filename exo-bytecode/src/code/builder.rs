use tracing::debug;

use crate::{
    constant_pool::{ClassEntry, ConstantPool, ConstantValue},
    error::{self, CodeError, MalformedCode},
    instruction::{
        ArrayLoadInstruction, ArrayStoreInstruction, BranchInstruction, ConstantInstruction,
        IncrementInstruction, Instruction, LoadInstruction, LookupSwitchInstruction,
        ReturnInstruction, StoreInstruction, SwitchCase, TableSwitchInstruction,
    },
    opcode::Opcode,
    stream::CodeWriter,
    type_kind::TypeKind,
};

use super::{
    attribute::MAX_CODE_LENGTH, CodeAttribute, CodeElement, CodeOptions, DeadLabels,
    ExceptionTableEntry, Label, LabelAllocator, LabelTable, LineNumberTableEntry,
    LocalVariableTableEntry,
};

/// A local variable marker waiting for its labels to be placed.
#[derive(Debug)]
struct PendingLocal {
    slot: u16,
    name_index: u16,
    type_index: u16,
    start: Label,
    end: Label,
}

#[derive(Debug)]
struct PendingCatch {
    try_start: Label,
    try_end: Label,
    handler: Label,
    catch_type: u16,
}

/// The output of a finished [`CodeBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltCode {
    pub code: Vec<u8>,
    pub line_numbers: Vec<LineNumberTableEntry>,
    pub local_variables: Vec<LocalVariableTableEntry>,
    pub local_variable_types: Vec<LocalVariableTableEntry>,
    pub exception_table: Vec<ExceptionTableEntry>,
}

impl BuiltCode {
    /// Wrap the built code in a `Code` attribute with the given bounds.
    pub fn into_attribute(self, max_stack: u16, max_locals: u16) -> CodeAttribute {
        CodeAttribute {
            max_stack,
            max_locals,
            code: self.code,
            exception_table: self.exception_table,
            line_numbers: self.line_numbers,
            local_variables: self.local_variables,
            local_variable_types: self.local_variable_types,
        }
    }
}

/// Assembles a code array from [`CodeElement`]s.
///
/// Instructions are encoded as they arrive. Branches to labels that are not
/// placed yet reserve their offset bytes and are patched by
/// [`finish`](CodeBuilder::finish). Names, descriptors and constants are added
/// to the borrowed pool.
#[derive(Debug)]
pub struct CodeBuilder<'a> {
    pool: &'a mut ConstantPool,
    options: CodeOptions,
    writer: CodeWriter,
    labels: LabelTable,
    allocator: LabelAllocator,
    line_numbers: Vec<(usize, u16)>,
    local_variables: Vec<PendingLocal>,
    local_variable_types: Vec<PendingLocal>,
    catches: Vec<PendingCatch>,
}

impl<'a> CodeBuilder<'a> {
    pub fn new(pool: &'a mut ConstantPool) -> Self {
        Self::with_options(pool, CodeOptions::default())
    }

    pub fn with_options(pool: &'a mut ConstantPool, options: CodeOptions) -> Self {
        Self {
            pool,
            options,
            writer: CodeWriter::new(),
            labels: LabelTable::default(),
            allocator: LabelAllocator::default(),
            line_numbers: Vec::new(),
            local_variables: Vec::new(),
            local_variable_types: Vec::new(),
            catches: Vec::new(),
        }
    }

    pub fn pool(&mut self) -> &mut ConstantPool {
        &mut *self.pool
    }

    /// The bci the next instruction will be encoded at.
    pub fn position(&self) -> usize {
        self.writer.position()
    }

    pub fn new_label(&mut self) -> Label {
        self.allocator.next()
    }

    /// Place `label` at the current position.
    pub fn label(&mut self, label: Label) -> error::Result<&mut Self> {
        self.with(CodeElement::Label(label))
    }

    /// Append one element.
    pub fn with(&mut self, element: CodeElement) -> error::Result<&mut Self> {
        let bci = self.writer.position();
        match element {
            CodeElement::Instruction(i) => {
                if let Err(e) = i.write(&mut self.writer, &mut self.labels) {
                    self.writer.truncate(bci);
                    return Err(e);
                }
            }
            CodeElement::Label(l) => self.labels.bind(l, bci)?,
            CodeElement::LineNumber { line } => {
                if self.options.pass_lines() {
                    self.line_numbers.push((bci, line));
                }
            }
            CodeElement::LocalVariable {
                slot,
                name,
                descriptor,
                start,
                end,
            } => {
                if self.options.pass_debug() {
                    let local = self.pending_local(slot, &name, &descriptor, start, end)?;
                    self.local_variables.push(local);
                }
            }
            CodeElement::LocalVariableType {
                slot,
                name,
                signature,
                start,
                end,
            } => {
                if self.options.pass_debug() {
                    let local = self.pending_local(slot, &name, &signature, start, end)?;
                    self.local_variable_types.push(local);
                }
            }
            CodeElement::ExceptionCatch {
                try_start,
                try_end,
                handler,
                catch_type,
            } => self.catches.push(PendingCatch {
                try_start,
                try_end,
                handler,
                catch_type: catch_type.as_ref().map_or(0, ClassEntry::index),
            }),
        }
        Ok(self)
    }

    fn pending_local(
        &mut self,
        slot: u16,
        name: &str,
        type_: &str,
        start: Label,
        end: Label,
    ) -> error::Result<PendingLocal> {
        Ok(PendingLocal {
            slot,
            name_index: self.pool.add_utf8(name)?,
            type_index: self.pool.add_utf8(type_)?,
            start,
            end,
        })
    }

    pub fn instruction(&mut self, i: impl Into<Instruction>) -> error::Result<&mut Self> {
        self.with(CodeElement::Instruction(i.into()))
    }

    pub fn branch(&mut self, opcode: Opcode, target: Label) -> error::Result<&mut Self> {
        self.instruction(BranchInstruction::of(opcode, target)?)
    }

    pub fn goto_(&mut self, target: Label) -> error::Result<&mut Self> {
        self.branch(Opcode::Goto, target)
    }

    pub fn load(&mut self, kind: TypeKind, slot: u16) -> error::Result<&mut Self> {
        self.instruction(LoadInstruction::of_kind(kind, slot)?)
    }

    pub fn store(&mut self, kind: TypeKind, slot: u16) -> error::Result<&mut Self> {
        self.instruction(StoreInstruction::of_kind(kind, slot)?)
    }

    pub fn iinc(&mut self, slot: u16, constant: i16) -> error::Result<&mut Self> {
        self.instruction(IncrementInstruction::of_operands(slot, constant))
    }

    pub fn array_load(&mut self, kind: TypeKind) -> error::Result<&mut Self> {
        self.instruction(ArrayLoadInstruction::of_kind(kind)?)
    }

    pub fn array_store(&mut self, kind: TypeKind) -> error::Result<&mut Self> {
        self.instruction(ArrayStoreInstruction::of_kind(kind)?)
    }

    /// Push `value` with the shortest instruction that can.
    pub fn constant(&mut self, value: ConstantValue) -> error::Result<&mut Self> {
        let i = ConstantInstruction::of_value(value, &mut *self.pool)?;
        self.instruction(i)
    }

    pub fn return_(&mut self, kind: TypeKind) -> error::Result<&mut Self> {
        self.instruction(ReturnInstruction::of_kind(kind)?)
    }

    pub fn table_switch(
        &mut self,
        low: i32,
        high: i32,
        default_target: Label,
        cases: Vec<SwitchCase>,
    ) -> error::Result<&mut Self> {
        self.instruction(TableSwitchInstruction::of(low, high, default_target, cases)?)
    }

    pub fn lookup_switch(
        &mut self,
        default_target: Label,
        cases: Vec<SwitchCase>,
    ) -> error::Result<&mut Self> {
        self.instruction(LookupSwitchInstruction::of(default_target, cases)?)
    }

    pub fn line_number(&mut self, line: u16) -> error::Result<&mut Self> {
        self.with(CodeElement::LineNumber { line })
    }

    pub fn local_variable(
        &mut self,
        slot: u16,
        name: &str,
        descriptor: &str,
        start: Label,
        end: Label,
    ) -> error::Result<&mut Self> {
        self.with(CodeElement::LocalVariable {
            slot,
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
            start,
            end,
        })
    }

    pub fn exception_catch(
        &mut self,
        try_start: Label,
        try_end: Label,
        handler: Label,
        catch_type: Option<ClassEntry>,
    ) -> error::Result<&mut Self> {
        self.with(CodeElement::ExceptionCatch {
            try_start,
            try_end,
            handler,
            catch_type,
        })
    }

    /// Patch every forward branch and lay out the auxiliary tables.
    pub fn finish(mut self) -> error::Result<BuiltCode> {
        let patched = self.labels.resolve(&mut self.writer)?;
        let code_length = self.writer.position();
        if code_length == 0 {
            return Err(CodeError::malformed(0, MalformedCode::EmptyCode));
        }
        if code_length > MAX_CODE_LENGTH {
            return Err(CodeError::malformed(0, MalformedCode::CodeTooLarge(code_length)));
        }

        let mut exception_table = Vec::with_capacity(self.catches.len());
        for c in &self.catches {
            if let Some([start_pc, end_pc, handler_pc]) =
                self.positions([c.try_start, c.try_end, c.handler])?
            {
                if start_pc >= end_pc {
                    return Err(CodeError::BadLabelRange {
                        start: c.try_start,
                        end: c.try_end,
                    });
                }
                inside_code(handler_pc, code_length)?;
                exception_table.push(ExceptionTableEntry {
                    start_pc,
                    end_pc,
                    handler_pc,
                    catch_type: c.catch_type,
                });
            }
        }
        let local_variables = self.local_table(&self.local_variables, code_length)?;
        let local_variable_types = self.local_table(&self.local_variable_types, code_length)?;
        let line_numbers = self
            .line_numbers
            .iter()
            .filter(|(bci, _)| *bci < code_length)
            .map(|&(bci, line_number)| LineNumberTableEntry {
                start_pc: bci as u16,
                line_number,
            })
            .collect();

        debug!(
            code_length,
            patched,
            labels = self.labels.bound_count(),
            "finished code"
        );
        Ok(BuiltCode {
            code: self.writer.into_bytes(),
            line_numbers,
            local_variables,
            local_variable_types,
            exception_table,
        })
    }

    fn local_table(
        &self,
        locals: &[PendingLocal],
        code_length: usize,
    ) -> error::Result<Vec<LocalVariableTableEntry>> {
        let mut table = Vec::with_capacity(locals.len());
        for v in locals {
            if let Some([start_pc, end_pc]) = self.positions([v.start, v.end])? {
                if start_pc > end_pc {
                    return Err(CodeError::BadLabelRange {
                        start: v.start,
                        end: v.end,
                    });
                }
                inside_code(start_pc, code_length)?;
                table.push(LocalVariableTableEntry {
                    start_pc,
                    length: end_pc - start_pc,
                    name_index: v.name_index,
                    descriptor_index: v.type_index,
                    index: v.slot,
                });
            }
        }
        Ok(table)
    }

    /// Positions of `labels`, or `None` if one is unplaced and dead labels are dropped.
    ///
    /// Only called once the code length is known to fit a `u16`.
    fn positions<const N: usize>(&self, labels: [Label; N]) -> error::Result<Option<[u16; N]>> {
        let mut positions = [0; N];
        for (position, label) in positions.iter_mut().zip(labels) {
            match self.labels.position(label) {
                Some(bci) => *position = bci as u16,
                None if self.options.dead_labels == DeadLabels::Drop => return Ok(None),
                None => return Err(CodeError::UnresolvedLabel(label)),
            }
        }
        Ok(Some(positions))
    }
}

/// Table pcs other than exclusive ends must name a byte of the code array.
fn inside_code(pc: u16, code_length: usize) -> error::Result<()> {
    if pc as usize >= code_length {
        return Err(CodeError::malformed(pc as usize, MalformedCode::BadTablePc(pc as usize)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{code::CodeModel, constant_pool::ConstantResolver};

    #[test]
    fn forward_branch_is_patched() {
        let mut cp = ConstantPool::new();
        let mut b = CodeBuilder::new(&mut cp);
        let end = b.new_label();
        b.goto_(end).unwrap().label(end).unwrap().return_(TypeKind::Void).unwrap();
        let built = b.finish().unwrap();
        assert_eq!(built.code, vec![0xa7, 0x00, 0x03, 0xb1]);
    }

    #[test]
    fn backward_branch_is_written_immediately() {
        let mut cp = ConstantPool::new();
        let mut b = CodeBuilder::new(&mut cp);
        let top = b.new_label();
        b.label(top).unwrap().instruction(crate::instruction::NopInstruction::new()).unwrap();
        b.branch(Opcode::Ifeq, top).unwrap();
        assert_eq!(b.finish().unwrap().code, vec![0x00, 0x99, 0xff, 0xff]);
    }

    #[test]
    fn unplaced_branch_target_fails_at_finish() {
        let mut cp = ConstantPool::new();
        let mut b = CodeBuilder::new(&mut cp);
        let nowhere = b.new_label();
        b.goto_(nowhere).unwrap();
        assert_eq!(b.finish(), Err(CodeError::UnresolvedLabel(nowhere)));
    }

    #[test]
    fn placing_a_label_twice_fails_immediately() {
        let mut cp = ConstantPool::new();
        let mut b = CodeBuilder::new(&mut cp);
        let l = b.new_label();
        b.label(l).unwrap();
        assert!(matches!(b.label(l), Err(CodeError::LabelAlreadyPlaced(x)) if x == l));
    }

    #[test]
    fn dead_debug_labels() {
        let mut cp = ConstantPool::new();
        let mut b = CodeBuilder::new(&mut cp);
        let (start, never) = (b.new_label(), b.new_label());
        b.label(start).unwrap();
        b.local_variable(0, "x", "I", start, never).unwrap();
        b.return_(TypeKind::Void).unwrap();
        assert_eq!(b.finish(), Err(CodeError::UnresolvedLabel(never)));

        let options = CodeOptions {
            dead_labels: DeadLabels::Drop,
            ..Default::default()
        };
        let mut b = CodeBuilder::with_options(&mut cp, options);
        let (start, never) = (b.new_label(), b.new_label());
        b.label(start).unwrap();
        b.local_variable(0, "x", "I", start, never).unwrap();
        b.return_(TypeKind::Void).unwrap();
        assert!(b.finish().unwrap().local_variables.is_empty());
    }

    #[test]
    fn switch_padding_follows_position() {
        let mut cp = ConstantPool::new();
        let mut b = CodeBuilder::new(&mut cp);
        let default = b.new_label();
        b.constant(ConstantValue::Integer(0)).unwrap();
        b.lookup_switch(default, vec![SwitchCase::of(1, default)]).unwrap();
        b.label(default).unwrap().return_(TypeKind::Void).unwrap();
        let built = b.finish().unwrap();
        // iconst_0 at 0, lookupswitch at 1 with two padding bytes, return at 20
        assert_eq!(built.code.len(), 21);
        assert_eq!(&built.code[1..4], &[0xab, 0, 0]);
        assert_eq!(&built.code[4..8], &19i32.to_be_bytes());
    }

    #[test]
    fn tables_decode_back() {
        let mut cp = ConstantPool::new();
        let class = cp.add_class("java/lang/Exception").unwrap();
        let class = cp.class_entry(class).unwrap();
        let mut b = CodeBuilder::new(&mut cp);
        let (start, end, handler) = (b.new_label(), b.new_label(), b.new_label());
        b.exception_catch(start, end, handler, Some(class.clone())).unwrap();
        b.label(start).unwrap().line_number(3).unwrap();
        b.constant(ConstantValue::Integer(1)).unwrap();
        b.store(TypeKind::Int, 1).unwrap();
        b.label(end).unwrap();
        b.local_variable(1, "i", "I", end, handler).unwrap();
        b.return_(TypeKind::Void).unwrap();
        b.label(handler).unwrap().instruction(crate::instruction::ThrowInstruction::new()).unwrap();
        let built = b.finish().unwrap();

        assert_eq!(
            built.exception_table,
            vec![ExceptionTableEntry {
                start_pc: 0,
                end_pc: 2,
                handler_pc: 3,
                catch_type: class.index(),
            }]
        );
        assert_eq!(built.local_variables[0].length, 1);
        let attribute = built.into_attribute(1, 2);
        let elements = CodeModel::new(&attribute, &cp).decode().unwrap();
        assert!(elements.contains(&CodeElement::ExceptionCatch {
            try_start: Label::at_bci(0),
            try_end: Label::at_bci(2),
            handler: Label::at_bci(3),
            catch_type: Some(class),
        }));
        assert!(elements.contains(&CodeElement::LineNumber { line: 3 }));
    }

    #[test]
    fn failed_instruction_leaves_no_bytes() {
        let mut cp = ConstantPool::new();
        let mut b = CodeBuilder::new(&mut cp);
        let top = b.new_label();
        b.label(top).unwrap();
        for _ in 0..40_000 {
            b.instruction(crate::instruction::NopInstruction::new()).unwrap();
        }
        assert_eq!(
            b.goto_(top).err(),
            Some(CodeError::BranchOffsetOverflow {
                bci: 40_000,
                offset: -40_000
            })
        );
        assert_eq!(b.position(), 40_000);
        b.return_(TypeKind::Void).unwrap();
        let attribute = b.finish().unwrap().into_attribute(0, 0);
        assert_eq!(attribute.code.len(), 40_001);
        assert!(CodeModel::new(&attribute, &cp).decode().is_ok());
    }

    #[test]
    fn empty_or_inverted_ranges_fail_at_finish() {
        let mut cp = ConstantPool::new();
        let mut b = CodeBuilder::new(&mut cp);
        let (start, handler) = (b.new_label(), b.new_label());
        b.exception_catch(start, start, handler, None).unwrap();
        b.label(start).unwrap().return_(TypeKind::Void).unwrap();
        b.label(handler).unwrap().return_(TypeKind::Void).unwrap();
        assert_eq!(
            b.finish(),
            Err(CodeError::BadLabelRange {
                start,
                end: start
            })
        );

        let mut b = CodeBuilder::new(&mut cp);
        let (start, end) = (b.new_label(), b.new_label());
        b.label(end).unwrap().return_(TypeKind::Void).unwrap();
        b.label(start).unwrap().return_(TypeKind::Void).unwrap();
        b.local_variable(0, "x", "I", start, end).unwrap();
        assert_eq!(b.finish(), Err(CodeError::BadLabelRange { start, end }));
    }

    #[test]
    fn handler_at_end_of_code_is_rejected() {
        let mut cp = ConstantPool::new();
        let mut b = CodeBuilder::new(&mut cp);
        let (start, end) = (b.new_label(), b.new_label());
        b.exception_catch(start, end, end, None).unwrap();
        b.label(start).unwrap().return_(TypeKind::Void).unwrap();
        b.label(end).unwrap();
        assert_eq!(
            b.finish(),
            Err(CodeError::malformed(1, MalformedCode::BadTablePc(1)))
        );
    }

    #[test]
    fn built_tables_pass_the_reader() {
        let mut cp = ConstantPool::new();
        let mut b = CodeBuilder::new(&mut cp);
        let (start, end, handler) = (b.new_label(), b.new_label(), b.new_label());
        b.exception_catch(start, end, handler, None).unwrap();
        b.label(start).unwrap().constant(ConstantValue::Integer(0)).unwrap();
        b.label(end).unwrap().return_(TypeKind::Int).unwrap();
        b.label(handler).unwrap();
        b.local_variable(1, "e", "Ljava/lang/Throwable;", handler, handler).unwrap();
        b.instruction(crate::instruction::ThrowInstruction::new()).unwrap();
        let attribute = b.finish().unwrap().into_attribute(1, 2);

        let mut w = CodeWriter::new();
        attribute.write_to_stream(&mut w, &mut cp).unwrap();
        let bytes = w.into_bytes();
        let read = CodeAttribute::read_from_stream(&mut crate::stream::CodeStream::new(&bytes), &cp);
        assert_eq!(read, Ok(attribute));
    }
}
