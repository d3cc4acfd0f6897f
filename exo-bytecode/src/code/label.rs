use std::fmt::{self, Display};

use fnv::FnvHashMap;
use tracing::trace;

use crate::{
    error::{self, CodeError},
    stream::CodeWriter,
};

/// First id handed out by [`LabelAllocator`]; ids below it are bytecode indexes.
const MINTED_BASE: u32 = 0x1_0000;

/// An abstract position in a code element sequence.
///
/// Labels bound while decoding are keyed by the bci they mark, so the same
/// target always yields the same label. Labels minted by a builder live above
/// every possible bci and never collide with decoded ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u32);

impl Label {
    pub(crate) const fn at_bci(bci: u16) -> Label {
        Label(bci as u32)
    }

    /// The bci a decoded label marks, or `None` for builder labels.
    pub fn decoded_bci(self) -> Option<u16> {
        (self.0 < MINTED_BASE).then(|| self.0 as u16)
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decoded_bci() {
            Some(bci) => write!(f, "L{}", bci),
            None => write!(f, "label#{}", self.0 - MINTED_BASE),
        }
    }
}

/// Mints fresh labels for a builder session.
#[derive(Debug, Clone, Default)]
pub(crate) struct LabelAllocator {
    next: u32,
}

impl LabelAllocator {
    pub fn next(&mut self) -> Label {
        let label = Label(MINTED_BASE.saturating_add(self.next));
        self.next += 1;
        label
    }
}

/// A branch offset slot waiting for its target to be placed.
#[derive(Debug, Clone, Copy)]
struct Patch {
    target: Label,
    /// bci of the instruction the offset is relative to.
    bci: usize,
    /// Where the offset bytes live.
    at: usize,
    wide: bool,
}

/// Label positions and pending branch patches of one builder session.
#[derive(Debug, Clone, Default)]
pub(crate) struct LabelTable {
    bound: FnvHashMap<Label, usize>,
    pending: Vec<Patch>,
}

impl LabelTable {
    /// Place `label` at `bci`. A label may be placed once.
    pub fn bind(&mut self, label: Label, bci: usize) -> error::Result<()> {
        if self.bound.contains_key(&label) {
            return Err(CodeError::LabelAlreadyPlaced(label));
        }
        self.bound.insert(label, bci);
        Ok(())
    }

    pub fn position(&self, label: Label) -> Option<usize> {
        self.bound.get(&label).copied()
    }

    pub fn bound_count(&self) -> usize {
        self.bound.len()
    }

    /// Write the offset from the instruction at `bci` to `target`, as four
    /// bytes if `wide` and two otherwise. Unplaced targets get a zeroed slot
    /// filled in by [`resolve`](LabelTable::resolve).
    pub fn write_offset(
        &mut self,
        w: &mut CodeWriter,
        bci: usize,
        target: Label,
        wide: bool,
    ) -> error::Result<()> {
        let at = w.position();
        match self.position(target) {
            Some(position) => {
                let offset = branch_offset(bci, position, wide)?;
                if wide {
                    w.write_i4(offset);
                } else {
                    w.write_i2(offset as i16);
                }
            }
            None => {
                if wide {
                    w.write_u4(0);
                } else {
                    w.write_u2(0);
                }
                self.pending.push(Patch {
                    target,
                    bci,
                    at,
                    wide,
                });
            }
        }
        Ok(())
    }

    /// Fill in every pending offset. Returns how many were patched.
    pub fn resolve(&mut self, w: &mut CodeWriter) -> error::Result<usize> {
        let pending = std::mem::take(&mut self.pending);
        for patch in &pending {
            let position = self
                .position(patch.target)
                .ok_or(CodeError::UnresolvedLabel(patch.target))?;
            let offset = branch_offset(patch.bci, position, patch.wide)?;
            trace!(bci = patch.bci, target = position, "patched branch offset");
            if patch.wide {
                w.patch_u4(patch.at, offset as u32);
            } else {
                w.patch_u2(patch.at, offset as i16 as u16);
            }
        }
        Ok(pending.len())
    }
}

fn branch_offset(bci: usize, target: usize, wide: bool) -> error::Result<i32> {
    let offset = target as i64 - bci as i64;
    let fits = if wide {
        i32::try_from(offset).is_ok()
    } else {
        i16::try_from(offset).is_ok()
    };
    if !fits {
        return Err(CodeError::BranchOffsetOverflow { bci, offset });
    }
    Ok(offset as i32)
}
