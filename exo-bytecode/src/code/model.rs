use std::collections::VecDeque;

use fnv::{FnvHashMap, FnvHashSet};
use tracing::{debug, trace};

use crate::{
    constant_pool::ConstantResolver,
    error::{self, CodeError, MalformedCode},
    instruction::{
        read_opcode, BranchInstruction, DiscontinuedJsrInstruction, Instruction,
        LookupSwitchInstruction, TableSwitchInstruction,
    },
    opcode::Kind,
    stream::CodeStream,
};

use super::{CodeAttribute, CodeElement, CodeOptions, Label};

/// A read-only view of a `Code` attribute as a sequence of [`CodeElement`]s.
#[derive(Debug, Clone)]
pub struct CodeModel<'a, R: ?Sized> {
    attribute: &'a CodeAttribute,
    cp: &'a R,
    options: CodeOptions,
}

impl<'a, R> CodeModel<'a, R>
where
    R: ConstantResolver + ?Sized,
{
    pub fn new(attribute: &'a CodeAttribute, cp: &'a R) -> Self {
        Self::with_options(attribute, cp, CodeOptions::default())
    }

    pub fn with_options(attribute: &'a CodeAttribute, cp: &'a R, options: CodeOptions) -> Self {
        Self {
            attribute,
            cp,
            options,
        }
    }

    pub fn max_stack(&self) -> u16 {
        self.attribute.max_stack
    }

    pub fn max_locals(&self) -> u16 {
        self.attribute.max_locals
    }

    /// Start a new traversal. Each call scans the code array afresh.
    pub fn elements(&self) -> CodeElements<'a, R> {
        CodeElements::new(self.attribute, self.cp, self.options)
    }

    /// Decode the whole sequence, or fail with the first error.
    pub fn decode(&self) -> error::Result<Vec<CodeElement>> {
        self.elements().collect()
    }
}

/// Instruction boundaries and label positions found by scanning the code
/// array once before any element is produced.
#[derive(Debug, Default)]
struct Prescan {
    starts: FnvHashSet<usize>,
    /// Branch and switch targets, with the bci of the instruction jumping there.
    jumps: Vec<(usize, Label)>,
}

impl Prescan {
    fn run(code: &[u8]) -> error::Result<Self> {
        let mut scan = Prescan::default();
        let mut s = CodeStream::new(code);
        while !s.ended() {
            let bci = s.position();
            scan.starts.insert(bci);
            s.mark();
            let opcode = read_opcode(&mut s)?;
            match opcode.kind() {
                Kind::Branch => {
                    let target = BranchInstruction::read(opcode, &mut s, bci)?.target();
                    scan.jumps.push((bci, target));
                }
                Kind::DiscontinuedJsr => {
                    let target = DiscontinuedJsrInstruction::read(opcode, &mut s, bci)?.target();
                    scan.jumps.push((bci, target));
                }
                Kind::TableSwitch => {
                    let i = TableSwitchInstruction::read(&mut s, bci)?;
                    scan.jumps.push((bci, i.default_target()));
                    scan.jumps.extend(i.cases().iter().map(|c| (bci, c.target())));
                }
                Kind::LookupSwitch => {
                    let i = LookupSwitchInstruction::read(&mut s, bci)?;
                    scan.jumps.push((bci, i.default_target()));
                    scan.jumps.extend(i.cases().iter().map(|c| (bci, c.target())));
                }
                _ => {
                    s.seek(bci);
                    s.skip(opcode.fixed_size().unwrap_or(1))?;
                }
            }
        }
        for &(bci, target) in &scan.jumps {
            let lands = target
                .decoded_bci()
                .map_or(false, |t| scan.starts.contains(&(t as usize)));
            if !lands {
                let t = target.decoded_bci().map_or(-1, i64::from);
                return Err(CodeError::malformed(bci, MalformedCode::BadBranchTarget(t)));
            }
        }
        Ok(scan)
    }

    /// A table pc must start an instruction; with `end` it may also be the code length.
    fn check_pc(&self, pc: usize, code_length: usize, end: bool) -> error::Result<Label> {
        let valid = self.starts.contains(&pc) || (end && pc == code_length);
        match u16::try_from(pc) {
            Ok(pc) if valid => Ok(Label::at_bci(pc)),
            _ => Err(CodeError::malformed(pc, MalformedCode::BadTablePc(pc))),
        }
    }
}

/// Record that something refers to `label`.
fn mark(labels: &mut FnvHashSet<usize>, label: Label) -> Label {
    if let Some(bci) = label.decoded_bci() {
        labels.insert(bci as usize);
    }
    label
}

/// A single-pass traversal over a code array.
///
/// Exception handlers come first, then local variable markers, then for
/// every instruction its label (if anything refers to it), its line numbers
/// and the instruction itself. A label at the end of the code follows the
/// last instruction. Decoding stops at the first error.
pub struct CodeElements<'a, R: ?Sized> {
    stream: CodeStream<'a>,
    cp: &'a R,
    labels: FnvHashSet<usize>,
    lines: FnvHashMap<usize, Vec<u16>>,
    pending: VecDeque<CodeElement>,
    error: Option<CodeError>,
    done: bool,
}

impl<'a, R> CodeElements<'a, R>
where
    R: ConstantResolver + ?Sized,
{
    fn new(attribute: &'a CodeAttribute, cp: &'a R, options: CodeOptions) -> Self {
        let mut elements = Self {
            stream: CodeStream::new(&attribute.code),
            cp,
            labels: FnvHashSet::default(),
            lines: FnvHashMap::default(),
            pending: VecDeque::new(),
            error: None,
            done: false,
        };
        if let Err(e) = elements.prepare(attribute, options) {
            elements.error = Some(e);
        }
        elements
    }

    fn prepare(&mut self, attribute: &CodeAttribute, options: CodeOptions) -> error::Result<()> {
        let code_length = attribute.code.len();
        let scan = Prescan::run(&attribute.code)?;
        debug!(
            code_length,
            branch_targets = scan.jumps.len(),
            "scanned code array"
        );
        for &(_, target) in &scan.jumps {
            mark(&mut self.labels, target);
        }

        for e in &attribute.exception_table {
            let try_start = scan.check_pc(e.start_pc as usize, code_length, false)?;
            let try_end = scan.check_pc(e.end_pc as usize, code_length, true)?;
            let handler = scan.check_pc(e.handler_pc as usize, code_length, false)?;
            let catch_type = match e.catch_type {
                0 => None,
                index => Some(self.cp.class_entry(index)?),
            };
            self.pending.push_back(CodeElement::ExceptionCatch {
                try_start: mark(&mut self.labels, try_start),
                try_end: mark(&mut self.labels, try_end),
                handler: mark(&mut self.labels, handler),
                catch_type,
            });
        }

        if options.pass_debug() {
            for v in &attribute.local_variables {
                let start = scan.check_pc(v.start_pc as usize, code_length, false)?;
                let end = scan.check_pc(v.end_pc(), code_length, true)?;
                self.pending.push_back(CodeElement::LocalVariable {
                    slot: v.index,
                    name: self.cp.utf8(v.name_index)?.to_owned(),
                    descriptor: self.cp.utf8(v.descriptor_index)?.to_owned(),
                    start: mark(&mut self.labels, start),
                    end: mark(&mut self.labels, end),
                });
            }
            for v in &attribute.local_variable_types {
                let start = scan.check_pc(v.start_pc as usize, code_length, false)?;
                let end = scan.check_pc(v.end_pc(), code_length, true)?;
                self.pending.push_back(CodeElement::LocalVariableType {
                    slot: v.index,
                    name: self.cp.utf8(v.name_index)?.to_owned(),
                    signature: self.cp.utf8(v.descriptor_index)?.to_owned(),
                    start: mark(&mut self.labels, start),
                    end: mark(&mut self.labels, end),
                });
            }
        }

        if options.pass_lines() {
            for l in &attribute.line_numbers {
                let pc = l.start_pc as usize;
                scan.check_pc(pc, code_length, false)?;
                self.lines.entry(pc).or_default().push(l.line_number);
            }
        }
        Ok(())
    }

    /// Queue the elements at the stream position, decoding one instruction.
    fn advance(&mut self) -> error::Result<()> {
        let bci = self.stream.position();
        if self.labels.contains(&bci) {
            // labels only hold bcis that came from a u16
            self.pending
                .push_back(CodeElement::Label(Label::at_bci(bci as u16)));
        }
        if self.stream.ended() {
            self.done = true;
            return Ok(());
        }
        if let Some(lines) = self.lines.remove(&bci) {
            self.pending
                .extend(lines.into_iter().map(|line| CodeElement::LineNumber { line }));
        }
        let instruction = Instruction::read(&mut self.stream, self.cp)?;
        trace!(bci, opcode = %instruction.opcode(), "decoded instruction");
        self.pending.push_back(CodeElement::Instruction(instruction));
        Ok(())
    }
}

impl<'a, R> Iterator for CodeElements<'a, R>
where
    R: ConstantResolver + ?Sized,
{
    type Item = error::Result<CodeElement>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(e) = self.error.take() {
                self.done = true;
                self.pending.clear();
                return Some(Err(e));
            }
            if let Some(element) = self.pending.pop_front() {
                return Some(Ok(element));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.advance() {
                self.error = Some(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        code::{attribute::ExceptionTableEntry, DebugElements, LineNumberTableEntry},
        constant_pool::ConstantPool,
        instruction::{BranchInstruction, NopInstruction, ReturnInstruction},
        opcode::Opcode,
    };

    fn attribute(code: Vec<u8>) -> CodeAttribute {
        CodeAttribute {
            code,
            ..Default::default()
        }
    }

    #[test]
    fn branch_label_and_return() {
        let cp = ConstantPool::new();
        let attribute = attribute(vec![0xa7, 0x00, 0x03, 0xb1]);
        let elements = CodeModel::new(&attribute, &cp).decode().unwrap();
        let target = Label::at_bci(3);
        assert_eq!(
            elements,
            vec![
                CodeElement::Instruction(BranchInstruction::of(Opcode::Goto, target).unwrap().into()),
                CodeElement::Label(target),
                CodeElement::Instruction(ReturnInstruction::of(Opcode::Return).unwrap().into()),
            ]
        );
    }

    #[test]
    fn unknown_opcode_reports_its_offset() {
        let cp = ConstantPool::new();
        let attribute = attribute(vec![0x00, 0x00, 0xcb, 0xb1]);
        let mut elements = CodeModel::new(&attribute, &cp).elements();
        assert_eq!(
            elements.next(),
            Some(Err(CodeError::malformed(2, MalformedCode::UnknownOpcode(0xcb))))
        );
        assert_eq!(elements.next(), None);
    }

    #[test]
    fn branch_into_an_instruction_is_rejected() {
        let cp = ConstantPool::new();
        // goto +2 lands inside the goto itself
        let attribute = attribute(vec![0x00, 0xa7, 0x00, 0x02, 0xb1]);
        assert_eq!(
            CodeModel::new(&attribute, &cp).decode(),
            Err(CodeError::malformed(1, MalformedCode::BadBranchTarget(3)))
        );
    }

    #[test]
    fn truncated_instruction() {
        let cp = ConstantPool::new();
        let attribute = attribute(vec![0x00, 0x11, 0x01]);
        assert_eq!(
            CodeModel::new(&attribute, &cp).decode(),
            Err(CodeError::malformed(1, MalformedCode::Truncated))
        );
    }

    #[test]
    fn markers_are_interleaved() {
        let mut cp = ConstantPool::new();
        let name = cp.add_utf8("x").unwrap();
        let descriptor = cp.add_utf8("I").unwrap();
        let mut attribute = attribute(vec![0x00, 0x00, 0xb1]);
        attribute.exception_table.push(ExceptionTableEntry {
            start_pc: 0,
            end_pc: 1,
            handler_pc: 2,
            catch_type: 0,
        });
        attribute.line_numbers.push(LineNumberTableEntry {
            start_pc: 1,
            line_number: 10,
        });
        attribute.local_variables.push(crate::code::LocalVariableTableEntry {
            start_pc: 0,
            length: 3,
            name_index: name,
            descriptor_index: descriptor,
            index: 0,
        });
        let nop = || CodeElement::Instruction(NopInstruction::new().into());
        let l = Label::at_bci;
        let elements = CodeModel::new(&attribute, &cp).decode().unwrap();
        assert_eq!(
            elements,
            vec![
                CodeElement::ExceptionCatch {
                    try_start: l(0),
                    try_end: l(1),
                    handler: l(2),
                    catch_type: None,
                },
                CodeElement::LocalVariable {
                    slot: 0,
                    name: "x".to_owned(),
                    descriptor: "I".to_owned(),
                    start: l(0),
                    end: l(3),
                },
                CodeElement::Label(l(0)),
                nop(),
                CodeElement::Label(l(1)),
                CodeElement::LineNumber { line: 10 },
                nop(),
                CodeElement::Label(l(2)),
                CodeElement::Instruction(ReturnInstruction::of(Opcode::Return).unwrap().into()),
                CodeElement::Label(l(3)),
            ]
        );

        let options = CodeOptions {
            debug_elements: DebugElements::Drop,
            ..Default::default()
        };
        let elements = CodeModel::with_options(&attribute, &cp, options).decode().unwrap();
        assert!(!elements.iter().any(|e| matches!(e, CodeElement::LocalVariable { .. })));
        assert!(!elements.contains(&CodeElement::Label(l(3))));
    }

    #[test]
    fn traversals_are_repeatable() {
        let cp = ConstantPool::new();
        let attribute = attribute(vec![0x00, 0xb1]);
        let model = CodeModel::new(&attribute, &cp);
        assert_eq!(model.elements().count(), 2);
        assert_eq!(model.decode(), model.decode());
    }
}
