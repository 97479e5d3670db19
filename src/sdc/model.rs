//! SDC model assembly.
//!
//! Maps each control unit to one integer decision variable (its start
//! slot relative to the region entry) and each dependency edge between
//! control units to one `start(dst) − start(src) ≥ separation` row, then
//! builds one of two linear objectives over the variables. Datapath
//! units never receive a variable and never appear in a row; an internal
//! request for one is a builder bug and panics.
//!
//! Row emission order follows edge insertion order. It does not affect
//! the optimal assignment, only solver row numbering.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io;
use std::path::Path;

use good_lp::{variable, variables, Expression, ProblemVariables, Variable};
use tracing::trace;

use crate::models::{SchedGraph, SchedUnit, UnitId};
use crate::timeframe::TimeFrames;

use super::solver::PresolveOptions;

/// Optimization goal. The two goals are mutually exclusive per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Objective {
    /// Minimise the sum of start slots: every operation is pulled toward
    /// its smallest feasible slot (as-soon-as-possible).
    #[default]
    EarliestCompletion,
    /// Maximise `Σ (val_uses − val_deps) · start` over value
    /// dependencies: units with many consumers and few producers drift
    /// late within their window, freeing early slots for high-fan-in
    /// chains.
    SlackDistribution,
}

impl Objective {
    pub(crate) fn is_maximisation(self) -> bool {
        matches!(self, Objective::SlackDistribution)
    }

    /// Objective coefficient of one unit.
    pub(crate) fn weight(self, unit: &SchedUnit) -> f64 {
        match self {
            Objective::EarliestCompletion => 1.0,
            Objective::SlackDistribution => {
                f64::from(unit.val_uses()) - f64::from(unit.val_deps())
            }
        }
    }
}

/// One precedence row: `start(dst) − start(src) ≥ rhs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Row {
    pub src: UnitId,
    pub dst: UnitId,
    pub rhs: u32,
}

/// The assembled model for one region.
///
/// Holds the call-local unit → variable-handle table; readback after the
/// solve goes through these opaque handles, never through manual
/// row/column arithmetic.
pub(crate) struct SdcModel {
    pub vars: ProblemVariables,
    pub step: Vec<Option<Variable>>,
    pub rows: Vec<Row>,
    pub dropped_rows: usize,
    pub objective: Expression,
    pub maximise: bool,
}

impl SdcModel {
    /// Builds variables, rows, and the objective for `graph`.
    ///
    /// Feasibility-window bounds are applied when the `implied_bounds`
    /// reduction is on, and always for [`Objective::SlackDistribution`],
    /// which is only bounded within the windows.
    pub(crate) fn build(
        graph: &SchedGraph,
        frames: &TimeFrames,
        objective: Objective,
        presolve: PresolveOptions,
    ) -> Self {
        let mut vars = variables!();
        let mut step: Vec<Option<Variable>> = vec![None; graph.len()];

        let window_bounds =
            presolve.implied_bounds || objective == Objective::SlackDistribution;

        for unit in graph.control_units() {
            let mut def = variable()
                .integer()
                .min(0.0)
                .name(format!("sv{}start", unit.id().0));
            if window_bounds {
                let frame = frames
                    .of(unit.id())
                    .expect("control unit without a feasibility window");
                def = def.min(f64::from(frame.earliest)).max(f64::from(frame.latest));
            }
            step[unit.id().0] = Some(vars.add(def));
        }

        let (rows, dropped_rows) = collect_rows(graph, presolve.row_dominance);

        let expr = graph.control_units().fold(Expression::from(0.0), |acc, u| {
            acc + objective.weight(u) * step_var(&step, u.id())
        });

        Self {
            vars,
            step,
            rows,
            dropped_rows,
            objective: expr,
            maximise: objective.is_maximisation(),
        }
    }

    /// Emits row-by-row model detail at trace level.
    pub(crate) fn log_rows(&self) {
        for (i, row) in self.rows.iter().enumerate() {
            trace!(
                row = i,
                src = row.src.0,
                dst = row.dst.0,
                rhs = row.rhs,
                "sv{}start - sv{}start >= {}",
                row.dst.0,
                row.src.0,
                row.rhs
            );
        }
    }
}

/// Decision-variable handle of `unit`.
///
/// # Panics
/// Panics if `unit` never received a variable. Only control units are
/// modeled, so a miss means the builder tried to constrain a datapath
/// unit or an unvisited one.
pub(crate) fn step_var(step: &[Option<Variable>], unit: UnitId) -> Variable {
    step[unit.0].unwrap_or_else(|| {
        panic!(
            "no decision variable for unit {}; datapath units never enter the model",
            unit.0
        )
    })
}

/// Collects one row per edge between control units, in insertion order.
///
/// With `dominance` on, parallel rows on the same (src, dst) pair
/// collapse to the largest right-hand side; the dominated rows are
/// redundant and their removal cannot change the optimum.
fn collect_rows(graph: &SchedGraph, dominance: bool) -> (Vec<Row>, usize) {
    let mut rows: Vec<Row> = Vec::new();
    let mut seen: HashMap<(usize, usize), usize> = HashMap::new();
    let mut dropped = 0usize;

    for edge in graph.edges() {
        if !graph.unit(edge.src).is_control() || !graph.unit(edge.dst).is_control() {
            continue;
        }
        let row = Row {
            src: edge.src,
            dst: edge.dst,
            rhs: edge.min_separation(),
        };
        if dominance {
            match seen.entry((edge.src.0, edge.dst.0)) {
                std::collections::hash_map::Entry::Occupied(occupied) => {
                    let kept = &mut rows[*occupied.get()];
                    kept.rhs = kept.rhs.max(row.rhs);
                    dropped += 1;
                }
                std::collections::hash_map::Entry::Vacant(vacant) => {
                    vacant.insert(rows.len());
                    rows.push(row);
                }
            }
        } else {
            rows.push(row);
        }
    }

    (rows, dropped)
}

/// Writes the assembled model to `path` in LP format.
///
/// Diagnostic only; the dump has no effect on the scheduling outcome.
pub(crate) fn write_model(
    path: &Path,
    graph: &SchedGraph,
    model: &SdcModel,
    objective: Objective,
) -> io::Result<()> {
    let mut text = String::new();
    let names: Vec<(UnitId, f64)> = graph
        .control_units()
        .map(|u| (u.id(), objective.weight(u)))
        .collect();

    let _ = writeln!(
        text,
        "/* {} variables, {} rows */",
        names.len(),
        model.rows.len()
    );

    let sense = if model.maximise { "max" } else { "min" };
    let _ = write!(text, "{sense}:");
    for (id, weight) in &names {
        if *weight == 0.0 {
            continue;
        }
        let _ = write!(text, " {weight:+} sv{}start", id.0);
    }
    let _ = writeln!(text, ";");

    for (i, row) in model.rows.iter().enumerate() {
        let _ = writeln!(
            text,
            "r{i}: +sv{}start -sv{}start >= {};",
            row.dst.0, row.src.0, row.rhs
        );
    }

    let _ = write!(text, "int");
    for (id, _) in &names {
        let _ = write!(text, " sv{}start", id.0);
    }
    let _ = writeln!(text, ";");

    std::fs::write(path, text)
}
