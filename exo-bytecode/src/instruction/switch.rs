use crate::{
    code::{Label, LabelTable},
    error::{self, CodeError, MalformedCode},
    opcode::{Kind, Opcode},
    stream::{CodeStream, CodeWriter},
};

use super::{branch::target_label, illegal_operand, write_opcode, TypedInstruction};

/// More jump table entries than this cannot fit in a code array.
const MAX_CASES: i64 = 0xffff / 4;

/// Padding after the opcode so the operands start 4-byte aligned.
fn padding(bci: usize) -> usize {
    3 - (bci % 4)
}

fn read_padding(s: &mut CodeStream<'_>, bci: usize) -> error::Result<()> {
    s.skip(padding(bci))
}

fn write_padding(w: &mut CodeWriter, bci: usize) {
    for _ in 0..padding(bci) {
        w.write_u1(0);
    }
}

/// One `value -> target` entry of a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwitchCase {
    value: i32,
    target: Label,
}

impl SwitchCase {
    pub fn of(value: i32, target: Label) -> Self {
        Self { value, target }
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn target(&self) -> Label {
        self.target
    }
}

/// `tableswitch`. Holds one case for every value in `low..=high`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableSwitchInstruction {
    low: i32,
    high: i32,
    default_target: Label,
    cases: Vec<SwitchCase>,
}

impl TableSwitchInstruction {
    pub(crate) fn new_unchecked(
        low: i32,
        high: i32,
        default_target: Label,
        cases: Vec<SwitchCase>,
    ) -> Self {
        Self {
            low,
            high,
            default_target,
            cases,
        }
    }

    /// Values in `low..=high` without a case jump to `default_target`.
    pub fn of(
        low: i32,
        high: i32,
        default_target: Label,
        cases: Vec<SwitchCase>,
    ) -> error::Result<Self> {
        let op = Opcode::Tableswitch;
        if low > high {
            return Err(illegal_operand(op, "low is greater than high"));
        }
        let count = high as i64 - low as i64 + 1;
        if count > MAX_CASES {
            return Err(illegal_operand(op, "too many cases"));
        }
        let mut table: Vec<Option<Label>> = vec![None; count as usize];
        for case in &cases {
            if case.value < low || case.value > high {
                return Err(illegal_operand(op, "case value outside low..=high"));
            }
            let slot = &mut table[(case.value as i64 - low as i64) as usize];
            if slot.replace(case.target).is_some() {
                return Err(illegal_operand(op, "duplicate case value"));
            }
        }
        let cases = table
            .into_iter()
            .zip(low..=high)
            .map(|(target, value)| SwitchCase::of(value, target.unwrap_or(default_target)))
            .collect();
        Ok(Self::new_unchecked(low, high, default_target, cases))
    }

    pub fn low(&self) -> i32 {
        self.low
    }

    pub fn high(&self) -> i32 {
        self.high
    }

    pub fn default_target(&self) -> Label {
        self.default_target
    }

    pub fn cases(&self) -> &[SwitchCase] {
        &self.cases
    }

    pub(crate) fn read(s: &mut CodeStream<'_>, bci: usize) -> error::Result<Self> {
        read_padding(s, bci)?;
        let default_target = target_label(bci, s.read_i4()? as i64, bci)?;
        let low = s.read_i4()?;
        let high = s.read_i4()?;
        if low > high {
            return Err(CodeError::malformed(
                bci,
                MalformedCode::TableSwitchLowGtHigh { low, high },
            ));
        }
        let mut cases = Vec::new();
        for value in low..=high {
            let target = target_label(bci, s.read_i4()? as i64, bci)?;
            cases.push(SwitchCase::of(value, target));
        }
        Ok(Self::new_unchecked(low, high, default_target, cases))
    }

    pub(crate) fn write(
        &self,
        w: &mut CodeWriter,
        bci: usize,
        labels: &mut LabelTable,
    ) -> error::Result<()> {
        write_opcode(w, Opcode::Tableswitch);
        write_padding(w, bci);
        labels.write_offset(w, bci, self.default_target, true)?;
        w.write_i4(self.low);
        w.write_i4(self.high);
        for case in &self.cases {
            labels.write_offset(w, bci, case.target, true)?;
        }
        Ok(())
    }
}

impl TypedInstruction for TableSwitchInstruction {
    const KIND: Kind = Kind::TableSwitch;

    fn opcode(&self) -> Opcode {
        Opcode::Tableswitch
    }

    fn size_in_bytes(&self, bci: usize) -> usize {
        1 + padding(bci) + 12 + 4 * self.cases.len()
    }
}

/// `lookupswitch`. Cases are sorted by value with no duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupSwitchInstruction {
    default_target: Label,
    cases: Vec<SwitchCase>,
}

impl LookupSwitchInstruction {
    pub(crate) fn new_unchecked(default_target: Label, cases: Vec<SwitchCase>) -> Self {
        Self {
            default_target,
            cases,
        }
    }

    /// Cases may be given in any order.
    pub fn of(default_target: Label, mut cases: Vec<SwitchCase>) -> error::Result<Self> {
        let op = Opcode::Lookupswitch;
        if cases.len() as i64 > MAX_CASES / 2 {
            return Err(illegal_operand(op, "too many cases"));
        }
        cases.sort_by_key(SwitchCase::value);
        if cases.windows(2).any(|pair| pair[0].value == pair[1].value) {
            return Err(illegal_operand(op, "duplicate case value"));
        }
        Ok(Self::new_unchecked(default_target, cases))
    }

    pub fn default_target(&self) -> Label {
        self.default_target
    }

    pub fn cases(&self) -> &[SwitchCase] {
        &self.cases
    }

    pub(crate) fn read(s: &mut CodeStream<'_>, bci: usize) -> error::Result<Self> {
        read_padding(s, bci)?;
        let default_target = target_label(bci, s.read_i4()? as i64, bci)?;
        let pairs = s.read_i4()?;
        if pairs < 0 {
            return Err(CodeError::malformed(
                bci,
                MalformedCode::LookupSwitchNegativePairs(pairs),
            ));
        }
        let mut cases: Vec<SwitchCase> = Vec::new();
        for _ in 0..pairs {
            let value = s.read_i4()?;
            let target = target_label(bci, s.read_i4()? as i64, bci)?;
            if cases.last().map_or(false, |last| last.value >= value) {
                return Err(CodeError::malformed(bci, MalformedCode::LookupSwitchBadSort));
            }
            cases.push(SwitchCase::of(value, target));
        }
        Ok(Self::new_unchecked(default_target, cases))
    }

    pub(crate) fn write(
        &self,
        w: &mut CodeWriter,
        bci: usize,
        labels: &mut LabelTable,
    ) -> error::Result<()> {
        write_opcode(w, Opcode::Lookupswitch);
        write_padding(w, bci);
        labels.write_offset(w, bci, self.default_target, true)?;
        w.write_i4(self.cases.len() as i32);
        for case in &self.cases {
            w.write_i4(case.value);
            labels.write_offset(w, bci, case.target, true)?;
        }
        Ok(())
    }
}

impl TypedInstruction for LookupSwitchInstruction {
    const KIND: Kind = Kind::LookupSwitch;

    fn opcode(&self) -> Opcode {
        Opcode::Lookupswitch
    }

    fn size_in_bytes(&self, bci: usize) -> usize {
        1 + padding(bci) + 8 + 8 * self.cases.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l(bci: u16) -> Label {
        Label::at_bci(bci)
    }

    #[test]
    fn padding_aligns_operands() {
        assert_eq!(padding(0), 3);
        assert_eq!(padding(1), 2);
        assert_eq!(padding(3), 0);
        assert_eq!(padding(4), 3);
    }

    #[test]
    fn table_switch_fills_gaps_with_default() {
        let t = TableSwitchInstruction::of(1, 3, l(9), vec![SwitchCase::of(2, l(5))]).unwrap();
        let targets: Vec<_> = t.cases().iter().map(|c| (c.value(), c.target())).collect();
        assert_eq!(targets, vec![(1, l(9)), (2, l(5)), (3, l(9))]);
        assert_eq!(t.size_in_bytes(0), 1 + 3 + 12 + 12);
    }

    #[test]
    fn table_switch_rejects_bad_bounds() {
        assert!(TableSwitchInstruction::of(2, 1, l(0), vec![]).is_err());
        assert!(TableSwitchInstruction::of(0, 1, l(0), vec![SwitchCase::of(5, l(0))]).is_err());
        assert!(TableSwitchInstruction::of(i32::MIN, i32::MAX, l(0), vec![]).is_err());
    }

    #[test]
    fn lookup_switch_sorts_cases() {
        let s = LookupSwitchInstruction::of(
            l(0),
            vec![SwitchCase::of(10, l(1)), SwitchCase::of(-3, l(2))],
        )
        .unwrap();
        assert_eq!(s.cases()[0].value(), -3);
        assert!(LookupSwitchInstruction::of(
            l(0),
            vec![SwitchCase::of(1, l(1)), SwitchCase::of(1, l(2))]
        )
        .is_err());
    }

    #[test]
    fn malformed_switches() {
        // tableswitch at bci 0: padding, default 0, low 5, high 4
        let bytes = [0xaa, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 5, 0, 0, 0, 4];
        let mut s = CodeStream::at(&bytes, 1);
        assert_eq!(
            TableSwitchInstruction::read(&mut s, 0),
            Err(CodeError::malformed(
                0,
                MalformedCode::TableSwitchLowGtHigh { low: 5, high: 4 }
            ))
        );

        let bytes = [
            0xab, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 7, 0, 0, 0, 0, 0, 0, 0, 3, 0, 0, 0,
            0,
        ];
        let mut s = CodeStream::at(&bytes, 1);
        assert_eq!(
            LookupSwitchInstruction::read(&mut s, 0),
            Err(CodeError::malformed(0, MalformedCode::LookupSwitchBadSort))
        );

        let bytes = [0xab, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff, 0xff, 0xff];
        let mut s = CodeStream::at(&bytes, 1);
        assert_eq!(
            LookupSwitchInstruction::read(&mut s, 0),
            Err(CodeError::malformed(
                0,
                MalformedCode::LookupSwitchNegativePairs(-1)
            ))
        );
    }
}
