//! Post-scheduling micro-operation cleanups.
//!
//! Once slots are committed, each region's micro-operations go through
//! three peepholes that shrink the op list before emission:
//!
//! - [`fold_constant_moves`]: propagate `move dst, #imm` into operand
//!   uses and drop the dead definitions.
//! - [`strip_implicit_defs`]: replace reads of placeholder definitions
//!   with a distinguishable immediate and drop the placeholders.
//! - [`merge_selects`]: rebuild nested conditional selects as one
//!   multiplexed case statement, improving parallelism in the emitted
//!   control logic.
//!
//! [`simplify`] runs all three in order.
//!
//! # Reference
//! Muchnick (1997), "Advanced Compiler Design and Implementation",
//! Ch. 18: Peephole Optimization

mod microop;

pub use microop::{Guard, MicroBlock, MicroOp, MicroOpKind, Operand, Reg};

use tracing::debug;

/// Counters for one cleanup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Constant moves folded away.
    pub folded_moves: usize,
    /// Placeholder definitions removed.
    pub stripped_defs: usize,
    /// Select chains rebuilt as case statements.
    pub merged_selects: usize,
}

/// Runs every cleanup over `block` and reports what changed.
pub fn simplify(block: &mut MicroBlock) -> RewriteStats {
    let stripped_defs = strip_implicit_defs(block);
    let merged_selects = merge_selects(block);
    let folded_moves = fold_constant_moves(block);
    let stats = RewriteStats {
        folded_moves,
        stripped_defs,
        merged_selects,
    };
    debug!(?stats, ops = block.len(), "micro-op cleanup finished");
    stats
}

/// Propagates unpredicated `move dst, #imm` definitions into operand
/// uses, worklist-driven: a user that becomes a constant move itself is
/// folded in turn. A definition disappears once nothing reads its
/// register; reads from guard positions keep it alive, since a guard
/// cannot take an immediate.
///
/// Returns the number of definitions removed.
pub fn fold_constant_moves(block: &mut MicroBlock) -> usize {
    let mut worklist: Vec<Reg> = block
        .ops()
        .iter()
        .filter(|op| op.predicate.is_none())
        .filter_map(|op| match op.kind {
            MicroOpKind::Move {
                dst,
                src: Operand::Imm(_),
            } => Some(dst),
            _ => None,
        })
        .collect();

    let mut folded = 0usize;
    while let Some(reg) = worklist.pop() {
        let Some(def_idx) = block.def_index(reg) else {
            continue;
        };
        let MicroOpKind::Move {
            src: Operand::Imm(value),
            ..
        } = block.ops()[def_idx].kind
        else {
            continue;
        };

        let mut newly_constant: Vec<Reg> = Vec::new();
        for (i, op) in block.ops_mut().iter_mut().enumerate() {
            if i == def_idx {
                continue;
            }
            let mut touched = false;
            op.for_each_operand_mut(|operand| {
                if *operand == Operand::Reg(reg) {
                    *operand = Operand::Imm(value);
                    touched = true;
                }
            });
            if touched && op.predicate.is_none() {
                if let MicroOpKind::Move {
                    dst,
                    src: Operand::Imm(_),
                } = op.kind
                {
                    newly_constant.push(dst);
                }
            }
        }
        worklist.extend(newly_constant);

        if !block.reg_is_read(reg) {
            block.remove(def_idx);
            folded += 1;
        }
    }
    folded
}

/// Replaces operand reads of placeholder definitions with a
/// distinguishable immediate (the defining register number) and removes
/// the placeholders that end up unread.
///
/// Returns the number of definitions removed.
pub fn strip_implicit_defs(block: &mut MicroBlock) -> usize {
    let targets: Vec<Reg> = block
        .ops()
        .iter()
        .filter_map(|op| match op.kind {
            MicroOpKind::ImplicitDef { dst } => Some(dst),
            _ => None,
        })
        .collect();

    let mut stripped = 0usize;
    for reg in targets {
        for op in block.ops_mut().iter_mut() {
            op.for_each_operand_mut(|operand| {
                if *operand == Operand::Reg(reg) {
                    *operand = Operand::Imm(i64::from(reg));
                }
            });
        }
        if !block.reg_is_read(reg) {
            if let Some(def_idx) = block.def_index(reg) {
                block.remove(def_idx);
                stripped += 1;
            }
        }
    }
    stripped
}

/// Rebuilds a select whose true/false operand comes from another
/// unpredicated select as one multiplexed case statement. Arm guards
/// are the conjunction of the inner condition (or its inverse) with the
/// outer condition for that side; the conjunctions are emitted as
/// [`MicroOpKind::And`] ops ahead of the case.
///
/// A *predicated* inner select is never merged: folding it in would
/// require conjoining its guard with the arm condition, and no verified
/// rule for that combination exists. Its result is referenced like any
/// other operand instead.
///
/// Returns the number of selects rebuilt.
pub fn merge_selects(block: &mut MicroBlock) -> usize {
    let mut merged = 0usize;
    let mut i = 0usize;
    while i < block.len() {
        let op = &block.ops()[i];
        let MicroOpKind::Select {
            dst,
            cond,
            on_true,
            on_false,
        } = op.kind
        else {
            i += 1;
            continue;
        };
        let predicate = op.predicate;

        let true_inner = inner_select(block, on_true);
        let false_inner = inner_select(block, on_false);
        if true_inner.is_none() && false_inner.is_none() {
            i += 1;
            continue;
        }

        let mut prelude: Vec<MicroOp> = Vec::new();
        let mut arms: Vec<(Guard, Operand)> = Vec::new();

        match true_inner {
            Some(inner) => conjoin_arms(block, &mut prelude, &mut arms, inner, cond),
            None => arms.push((cond, on_true)),
        }
        let not_cond = cond.inverse();
        match false_inner {
            Some(inner) => conjoin_arms(block, &mut prelude, &mut arms, inner, not_cond),
            None => arms.push((not_cond, on_false)),
        }

        let advance = prelude.len() + 1;
        block.splice(
            i,
            prelude,
            MicroOp {
                kind: MicroOpKind::Case { dst, arms },
                predicate,
            },
        );
        merged += 1;
        i += advance;
    }
    merged
}

/// The `(cond, on_true, on_false)` of the unpredicated select defining
/// `operand`, if there is one.
fn inner_select(block: &MicroBlock, operand: Operand) -> Option<(Guard, Operand, Operand)> {
    let Operand::Reg(reg) = operand else {
        return None;
    };
    let def = &block.ops()[block.def_index(reg)?];
    if def.predicate.is_some() {
        return None;
    }
    match def.kind {
        MicroOpKind::Select {
            cond,
            on_true,
            on_false,
            ..
        } => Some((cond, on_true, on_false)),
        _ => None,
    }
}

/// Adds the two arms of an inner select, each guarded by the
/// conjunction of its own condition with the enclosing condition.
fn conjoin_arms(
    block: &mut MicroBlock,
    prelude: &mut Vec<MicroOp>,
    arms: &mut Vec<(Guard, Operand)>,
    inner: (Guard, Operand, Operand),
    outer: Guard,
) {
    let (inner_cond, on_true, on_false) = inner;
    let true_guard = conjoin(block, prelude, inner_cond, outer);
    arms.push((true_guard, on_true));
    let false_guard = conjoin(block, prelude, inner_cond.inverse(), outer);
    arms.push((false_guard, on_false));
}

fn conjoin(block: &mut MicroBlock, prelude: &mut Vec<MicroOp>, a: Guard, b: Guard) -> Guard {
    let dst = block.fresh_reg();
    prelude.push(MicroOp::new(MicroOpKind::And { dst, a, b }));
    Guard::new(dst)
}
