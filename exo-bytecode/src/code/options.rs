/// Whether local variable and local variable type markers are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DebugElements {
    #[default]
    Pass,
    Drop,
}

/// Whether line number markers are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineNumbers {
    #[default]
    Pass,
    Drop,
}

/// What [`CodeBuilder::finish`](super::CodeBuilder::finish) does with a debug
/// element or exception handler whose labels were never placed.
///
/// Branch targets are not affected: an unplaced branch target always fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeadLabels {
    #[default]
    Fail,
    Drop,
}

/// Options shared by [`CodeModel`](super::CodeModel) and
/// [`CodeBuilder`](super::CodeBuilder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CodeOptions {
    pub debug_elements: DebugElements,
    pub line_numbers: LineNumbers,
    pub dead_labels: DeadLabels,
}

impl CodeOptions {
    pub(crate) fn pass_debug(&self) -> bool {
        self.debug_elements == DebugElements::Pass
    }

    pub(crate) fn pass_lines(&self) -> bool {
        self.line_numbers == LineNumbers::Pass
    }
}
