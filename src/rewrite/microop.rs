//! Micro-operation representation for scheduled regions.
//!
//! After slots are assigned, each region is a list of micro-operations
//! over virtual registers. The cleanup passes in the parent module only
//! need a small vocabulary: moves, conditional selects, multiplexed
//! cases, 1-bit conjunctions, and placeholder definitions.
//!
//! Register numbers are written at most once per block; the rewrites
//! rely on that to locate the unique definition of an operand.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Virtual register number.
pub type Reg = u32;

/// A value operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// Read of a virtual register.
    Reg(Reg),
    /// Immediate value.
    Imm(i64),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "r{r}"),
            Operand::Imm(i) => write!(f, "#{i}"),
        }
    }
}

/// A 1-bit condition: a register read with an optional inversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guard {
    /// The condition register.
    pub reg: Reg,
    /// Whether the condition is negated.
    pub inverted: bool,
}

impl Guard {
    /// A plain (non-inverted) guard on `reg`.
    pub fn new(reg: Reg) -> Self {
        Self {
            reg,
            inverted: false,
        }
    }

    /// The same condition, negated.
    pub fn inverse(self) -> Self {
        Self {
            reg: self.reg,
            inverted: !self.inverted,
        }
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inverted {
            write!(f, "!r{}", self.reg)
        } else {
            write!(f, "r{}", self.reg)
        }
    }
}

/// Operation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MicroOpKind {
    /// `dst ← src`.
    Move { dst: Reg, src: Operand },
    /// `dst ← cond ? on_true : on_false`.
    Select {
        dst: Reg,
        cond: Guard,
        on_true: Operand,
        on_false: Operand,
    },
    /// Multiplexed assignment: `dst` takes the value of the arm whose
    /// guard holds. Arm guards are expected to be mutually exclusive.
    Case { dst: Reg, arms: Vec<(Guard, Operand)> },
    /// 1-bit conjunction: `dst ← a ∧ b`.
    And { dst: Reg, a: Guard, b: Guard },
    /// Placeholder definition carrying no meaningful value.
    ImplicitDef { dst: Reg },
}

/// One micro-operation, optionally predicated on a guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicroOp {
    /// What the operation does.
    pub kind: MicroOpKind,
    /// Execution guard; `None` means always execute.
    pub predicate: Option<Guard>,
}

impl MicroOp {
    /// An unpredicated operation.
    pub fn new(kind: MicroOpKind) -> Self {
        Self {
            kind,
            predicate: None,
        }
    }

    /// A predicated operation.
    pub fn predicated(kind: MicroOpKind, guard: Guard) -> Self {
        Self {
            kind,
            predicate: Some(guard),
        }
    }

    /// The register this operation defines.
    pub fn dst(&self) -> Reg {
        match &self.kind {
            MicroOpKind::Move { dst, .. }
            | MicroOpKind::Select { dst, .. }
            | MicroOpKind::Case { dst, .. }
            | MicroOpKind::And { dst, .. }
            | MicroOpKind::ImplicitDef { dst } => *dst,
        }
    }

    /// Visits every value operand.
    pub fn for_each_operand(&self, mut f: impl FnMut(&Operand)) {
        match &self.kind {
            MicroOpKind::Move { src, .. } => f(src),
            MicroOpKind::Select {
                on_true, on_false, ..
            } => {
                f(on_true);
                f(on_false);
            }
            MicroOpKind::Case { arms, .. } => {
                for (_, value) in arms {
                    f(value);
                }
            }
            MicroOpKind::And { .. } | MicroOpKind::ImplicitDef { .. } => {}
        }
    }

    /// Visits every value operand mutably.
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut Operand)) {
        match &mut self.kind {
            MicroOpKind::Move { src, .. } => f(src),
            MicroOpKind::Select {
                on_true, on_false, ..
            } => {
                f(on_true);
                f(on_false);
            }
            MicroOpKind::Case { arms, .. } => {
                for (_, value) in arms {
                    f(value);
                }
            }
            MicroOpKind::And { .. } | MicroOpKind::ImplicitDef { .. } => {}
        }
    }

    /// Visits every register read from a guard position, including the
    /// predicate.
    pub fn for_each_guard_reg(&self, mut f: impl FnMut(Reg)) {
        if let Some(p) = &self.predicate {
            f(p.reg);
        }
        match &self.kind {
            MicroOpKind::Select { cond, .. } => f(cond.reg),
            MicroOpKind::Case { arms, .. } => {
                for (guard, _) in arms {
                    f(guard.reg);
                }
            }
            MicroOpKind::And { a, b, .. } => {
                f(a.reg);
                f(b.reg);
            }
            MicroOpKind::Move { .. } | MicroOpKind::ImplicitDef { .. } => {}
        }
    }
}

impl fmt::Display for MicroOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &self.kind {
            MicroOpKind::Move { .. } => "move",
            MicroOpKind::Select { .. } => "select",
            MicroOpKind::Case { .. } => "case",
            MicroOpKind::And { .. } => "and",
            MicroOpKind::ImplicitDef { .. } => "impdef",
        };
        write!(f, "{name}")?;
        if let Some(p) = &self.predicate {
            write!(f, " pred:[{p}]")?;
        }
        match &self.kind {
            MicroOpKind::Move { dst, src } => write!(f, " r{dst}, {src}"),
            MicroOpKind::Select {
                dst,
                cond,
                on_true,
                on_false,
            } => write!(f, " r{dst}, {cond}, {on_true}, {on_false}"),
            MicroOpKind::Case { dst, arms } => {
                write!(f, " r{dst}")?;
                for (guard, value) in arms {
                    write!(f, ", {guard}:{value}")?;
                }
                Ok(())
            }
            MicroOpKind::And { dst, a, b } => write!(f, " r{dst}, {a}, {b}"),
            MicroOpKind::ImplicitDef { dst } => write!(f, " r{dst}"),
        }
    }
}

/// A region's micro-operations after scheduling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MicroBlock {
    ops: Vec<MicroOp>,
    next_reg: Reg,
}

impl MicroBlock {
    /// Creates an empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an operation.
    pub fn push(&mut self, op: MicroOp) {
        self.note_regs(&op);
        self.ops.push(op);
    }

    /// The operations in program order.
    #[inline]
    pub fn ops(&self) -> &[MicroOp] {
        &self.ops
    }

    /// Number of operations.
    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the block holds no operations.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// A register number unused anywhere in the block so far.
    pub fn fresh_reg(&mut self) -> Reg {
        let reg = self.next_reg;
        self.next_reg += 1;
        reg
    }

    /// Index of the operation defining `reg`, if any.
    pub fn def_index(&self, reg: Reg) -> Option<usize> {
        self.ops.iter().position(|op| op.dst() == reg)
    }

    /// Whether any operation reads `reg`, from an operand or a guard
    /// position.
    pub fn reg_is_read(&self, reg: Reg) -> bool {
        self.ops.iter().any(|op| {
            let mut read = false;
            op.for_each_operand(|o| {
                if *o == Operand::Reg(reg) {
                    read = true;
                }
            });
            op.for_each_guard_reg(|r| {
                if r == reg {
                    read = true;
                }
            });
            read
        })
    }

    pub(crate) fn ops_mut(&mut self) -> &mut [MicroOp] {
        &mut self.ops
    }

    pub(crate) fn remove(&mut self, index: usize) -> MicroOp {
        self.ops.remove(index)
    }

    /// Replaces the operation at `index` with `prelude` followed by
    /// `replacement`.
    pub(crate) fn splice(&mut self, index: usize, prelude: Vec<MicroOp>, replacement: MicroOp) {
        for op in &prelude {
            self.note_regs(op);
        }
        self.note_regs(&replacement);
        let mut seq = prelude;
        seq.push(replacement);
        self.ops.splice(index..=index, seq);
    }

    fn note_regs(&mut self, op: &MicroOp) {
        let mut high = op.dst();
        op.for_each_operand(|o| {
            if let Operand::Reg(r) = o {
                high = high.max(*r);
            }
        });
        op.for_each_guard_reg(|r| high = high.max(r));
        self.next_reg = self.next_reg.max(high + 1);
    }
}

impl fmt::Display for MicroBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in &self.ops {
            writeln!(f, "{op}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_reg_avoids_used_numbers() {
        let mut block = MicroBlock::new();
        block.push(MicroOp::new(MicroOpKind::Move {
            dst: 4,
            src: Operand::Reg(7),
        }));
        assert_eq!(block.fresh_reg(), 8);
        assert_eq!(block.fresh_reg(), 9);
    }

    #[test]
    fn test_def_index_and_reads() {
        let mut block = MicroBlock::new();
        block.push(MicroOp::new(MicroOpKind::Move {
            dst: 0,
            src: Operand::Imm(1),
        }));
        block.push(MicroOp::new(MicroOpKind::Select {
            dst: 1,
            cond: Guard::new(2),
            on_true: Operand::Reg(0),
            on_false: Operand::Imm(0),
        }));

        assert_eq!(block.def_index(0), Some(0));
        assert_eq!(block.def_index(9), None);
        assert!(block.reg_is_read(0));
        assert!(block.reg_is_read(2)); // guard position
        assert!(!block.reg_is_read(1));
    }

    #[test]
    fn test_display_formats() {
        let mv = MicroOp::new(MicroOpKind::Move {
            dst: 3,
            src: Operand::Imm(-2),
        });
        assert_eq!(mv.to_string(), "move r3, #-2");

        let sel = MicroOp::predicated(
            MicroOpKind::Select {
                dst: 5,
                cond: Guard::new(1).inverse(),
                on_true: Operand::Reg(2),
                on_false: Operand::Imm(0),
            },
            Guard::new(9),
        );
        assert_eq!(sel.to_string(), "select pred:[r9] r5, !r1, r2, #0");

        let case = MicroOp::new(MicroOpKind::Case {
            dst: 6,
            arms: vec![
                (Guard::new(1), Operand::Reg(2)),
                (Guard::new(1).inverse(), Operand::Imm(4)),
            ],
        });
        assert_eq!(case.to_string(), "case r6, r1:r2, !r1:#4");
    }

    #[test]
    fn test_guard_inversion_round_trips() {
        let g = Guard::new(3);
        assert_eq!(g.inverse().inverse(), g);
        assert_ne!(g.inverse(), g);
    }
}
