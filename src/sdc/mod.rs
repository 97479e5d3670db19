//! SDC scheduling core.
//!
//! [`SdcScheduler`] drives one region through the full pipeline:
//! validate the graph, serialize exclusive resources into precedence
//! edges, compute feasibility windows, assemble the
//! difference-constraint model, solve it, classify the outcome, and
//! commit the solved slots. On any failure the graph's slots are left
//! untouched and the caller decides whether to relax and retry.
//!
//! All per-region state (the unit → variable table, the row list) is
//! local to the `schedule()` call and dropped on return, success or
//! failure, so one scheduler value can serve many regions and distinct
//! regions can be scheduled concurrently with independent scheduler
//! values.
//!
//! # Example
//!
//! ```
//! use sdc_sched::models::{DepKind, ResourceId, SchedGraph, UnitKind};
//! use sdc_sched::sdc::SdcScheduler;
//!
//! let mut graph = SchedGraph::new(0);
//! let a = graph.add_unit(UnitKind::Control, ResourceId::Trivial);
//! let b = graph.add_unit(UnitKind::Control, ResourceId::Trivial);
//! graph.add_edge(a, b, 2, DepKind::Data);
//!
//! SdcScheduler::new().schedule(&mut graph).unwrap();
//! assert_eq!(graph.unit(a).slot(), Some(0));
//! assert_eq!(graph.unit(b).slot(), Some(2));
//! ```
//!
//! # Reference
//! Cong & Zhang (2006), "An Efficient and Versatile Scheduling Algorithm
//! Based on SDC Formulation"

mod metrics;
mod model;
mod solver;

pub use metrics::ScheduleMetrics;
pub use model::Objective;
pub use solver::{
    PresolveOptions, ScheduleError, ScheduleReport, ScheduleStatus, SolverConfig, Verbosity,
};

use std::time::{Duration, Instant};

use good_lp::{constraint, default_solver, Solution, SolverModel};
use tracing::{debug, info};

use crate::models::{SchedGraph, UnitId};
use crate::timeframe::{serialize_exclusive_resources, TimeFrames};
use crate::validation::validate_graph;

use model::{step_var, SdcModel};

/// Precedence-constraint scheduler for one region at a time.
///
/// Holds configuration only; see the module docs for the state
/// discipline.
#[derive(Debug, Clone, Default)]
pub struct SdcScheduler {
    objective: Objective,
    config: SolverConfig,
}

impl SdcScheduler {
    /// Creates a scheduler with the default objective
    /// ([`Objective::EarliestCompletion`]) and configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the optimization goal for subsequent attempts.
    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    /// Sets the solver session configuration.
    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Schedules `graph`, writing absolute start slots into its control
    /// units on success.
    ///
    /// On `Err` no slot is written; consumers must check the result
    /// before reading slots. [`ScheduleError::is_recoverable`] tells the
    /// caller whether relaxing constraints and retrying makes sense.
    pub fn schedule(&self, graph: &mut SchedGraph) -> Result<ScheduleReport, ScheduleError> {
        validate_graph(graph).map_err(ScheduleError::InvalidGraph)?;

        let serialized_edges = serialize_exclusive_resources(graph);
        let frames = TimeFrames::compute(graph).map_err(|cycle| ScheduleError::Infeasible {
            reason: cycle.to_string(),
        })?;

        let unit_ids: Vec<UnitId> = graph.control_units().map(|u| u.id()).collect();
        if unit_ids.is_empty() {
            debug!("region has no control units; nothing to schedule");
            return Ok(ScheduleReport {
                status: ScheduleStatus::Optimal,
                variables: 0,
                rows: 0,
                dropped_rows: 0,
                serialized_edges,
                objective_value: 0.0,
                elapsed: Duration::ZERO,
            });
        }

        let built = SdcModel::build(graph, &frames, self.objective, self.config.presolve);
        if let Some(path) = &self.config.dump_model {
            model::write_model(path, graph, &built, self.objective)
                .map_err(|e| ScheduleError::Solver(format!("model dump failed: {e}")))?;
        }

        if self.config.verbosity != Verbosity::Critical {
            info!(
                variables = unit_ids.len(),
                rows = built.rows.len(),
                dropped_rows = built.dropped_rows,
                serialized_edges,
                horizon = frames.horizon(),
                "assembled difference-constraint model"
            );
        }
        if self.config.verbosity == Verbosity::Full {
            built.log_rows();
        }

        let SdcModel {
            vars,
            step,
            rows,
            dropped_rows,
            objective,
            maximise,
        } = built;

        // One solver session per attempt; it ends when this call returns.
        let unsolved = if maximise {
            vars.maximise(objective)
        } else {
            vars.minimise(objective)
        };
        let mut session = unsolved.using(default_solver);
        for row in &rows {
            let src = step_var(&step, row.src);
            let dst = step_var(&step, row.dst);
            session = session.with(constraint!(dst - src >= f64::from(row.rhs)));
        }

        let started = Instant::now();
        let outcome = session.solve();
        let elapsed = started.elapsed();

        if let Some(limit) = self.config.timeout {
            if elapsed > limit {
                return Err(ScheduleError::Timeout { limit });
            }
        }

        let solution = outcome.map_err(solver::classify_failure)?;

        // The bundled backend proves optimality whenever it returns a
        // solution; backends that report feasible-but-unproven results
        // classify as Degraded instead.
        let status = ScheduleStatus::Optimal;
        solver::log_status(status);

        let entry = graph.entry_slot();
        let mut objective_value = 0.0;
        for id in &unit_ids {
            let rel = solution.value(step_var(&step, *id)).round().max(0.0) as u32;
            objective_value += self.objective.weight(graph.unit(*id)) * f64::from(rel);
            graph.commit_slot(*id, entry + rel);
        }

        if self.config.verbosity != Verbosity::Critical {
            info!(
                units = unit_ids.len(),
                objective_value,
                elapsed_us = elapsed.as_micros() as u64,
                "schedule committed"
            );
        }

        Ok(ScheduleReport {
            status,
            variables: unit_ids.len(),
            rows: rows.len(),
            dropped_rows,
            serialized_edges,
            objective_value,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DepKind, ResourceId, SchedGraph, UnitKind};

    #[test]
    fn test_single_latency_edge() {
        // A → B with latency 2 lands at slots 0 and 2.
        let mut g = SchedGraph::new(0);
        let a = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        let b = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        g.add_edge(a, b, 2, DepKind::Data);

        let report = SdcScheduler::new().schedule(&mut g).unwrap();
        assert_eq!(report.status, ScheduleStatus::Optimal);
        assert_eq!(report.variables, 2);
        assert_eq!(report.rows, 1);
        assert_eq!(g.unit(a).slot(), Some(0));
        assert_eq!(g.unit(b).slot(), Some(2));
    }

    #[test]
    fn test_shared_resource_serializes() {
        // B and C both depend on A and share one exclusive resource:
        // one of them must wait a full cycle.
        let mut g = SchedGraph::new(0);
        let a = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        let b = g.add_unit(UnitKind::Control, ResourceId::Exclusive(0));
        let c = g.add_unit(UnitKind::Control, ResourceId::Exclusive(0));
        g.add_edge(a, b, 1, DepKind::Data);
        g.add_edge(a, c, 1, DepKind::Data);

        let report = SdcScheduler::new().schedule(&mut g).unwrap();
        assert_eq!(report.serialized_edges, 1);
        assert_eq!(g.unit(a).slot(), Some(0));
        assert_eq!(g.unit(b).slot(), Some(1));
        let c_slot = g.unit(c).slot().unwrap();
        assert!(c_slot >= 2);
        assert!(c_slot > g.unit(b).slot().unwrap());
    }

    #[test]
    fn test_positive_cycle_reports_infeasible() {
        let mut g = SchedGraph::new(0);
        let a = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        let b = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        g.add_edge(a, b, 3, DepKind::Data);
        g.add_edge(b, a, 2, DepKind::Data);

        let err = SdcScheduler::new().schedule(&mut g).unwrap_err();
        assert!(matches!(err, ScheduleError::Infeasible { .. }));
        assert!(err.is_recoverable());
        // Failure atomicity: no slot was written.
        assert_eq!(g.unit(a).slot(), None);
        assert_eq!(g.unit(b).slot(), None);
    }

    #[test]
    fn test_zero_latency_edge_co_schedules() {
        let mut g = SchedGraph::new(0);
        let a = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        let b = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        g.add_edge(a, b, 0, DepKind::Data);

        SdcScheduler::new().schedule(&mut g).unwrap();
        assert_eq!(g.unit(a).slot(), g.unit(b).slot());
        assert_eq!(g.unit(a).slot(), Some(0));
    }

    #[test]
    fn test_entry_slot_offsets_absolute_slots() {
        let mut g = SchedGraph::new(5);
        let a = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        let b = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        g.add_edge(a, b, 2, DepKind::Data);

        SdcScheduler::new().schedule(&mut g).unwrap();
        assert_eq!(g.unit(a).slot(), Some(5));
        assert_eq!(g.unit(b).slot(), Some(7));
    }

    #[test]
    fn test_source_units_start_at_entry() {
        let mut g = SchedGraph::new(3);
        let a = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        let b = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        let c = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        g.add_edge(a, c, 1, DepKind::Data);
        g.add_edge(b, c, 4, DepKind::Control);

        SdcScheduler::new().schedule(&mut g).unwrap();
        for unit in [a, b] {
            assert!(g.unit(unit).slot().unwrap() >= g.entry_slot());
        }
        assert_eq!(g.unit(c).slot(), Some(7));
    }

    #[test]
    fn test_precedence_invariant_holds() {
        let mut g = SchedGraph::new(0);
        let a = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        let b = g.add_unit(UnitKind::Control, ResourceId::Exclusive(1));
        let c = g.add_unit(UnitKind::Control, ResourceId::Exclusive(1));
        let d = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        let e = g.add_unit(UnitKind::Control, ResourceId::Exclusive(1));
        g.add_edge(a, b, 1, DepKind::Data);
        g.add_edge(a, c, 2, DepKind::Data);
        g.add_edge(b, d, 3, DepKind::Data);
        g.add_edge(c, d, 1, DepKind::Control);
        g.add_edge(a, e, 1, DepKind::Data);
        g.add_edge(a, b, 2, DepKind::Control);

        SdcScheduler::new().schedule(&mut g).unwrap();
        for edge in g.edges() {
            let src = g.unit(edge.src).slot().unwrap();
            let dst = g.unit(edge.dst).slot().unwrap();
            assert!(
                dst - src >= edge.min_separation(),
                "edge {:?} violated: {src} → {dst}",
                edge
            );
        }
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let build = || {
            let mut g = SchedGraph::new(0);
            let a = g.add_unit(UnitKind::Control, ResourceId::Exclusive(0));
            let b = g.add_unit(UnitKind::Control, ResourceId::Exclusive(0));
            let c = g.add_unit(UnitKind::Control, ResourceId::Exclusive(0));
            let d = g.add_unit(UnitKind::Control, ResourceId::Trivial);
            g.add_edge(d, a, 1, DepKind::Data);
            g.add_edge(d, b, 1, DepKind::Data);
            g.add_edge(d, c, 1, DepKind::Data);
            SdcScheduler::new().schedule(&mut g).unwrap();
            g.units().map(|u| u.slot()).collect::<Vec<_>>()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_slack_objective_pushes_consumers_late() {
        let build = |objective| {
            let mut g = SchedGraph::new(0);
            let a = g.add_unit(UnitKind::Control, ResourceId::Trivial);
            let b = g.add_unit(UnitKind::Control, ResourceId::Trivial);
            let c = g.add_unit(UnitKind::Control, ResourceId::Trivial);
            g.add_edge(a, c, 2, DepKind::Data);
            g.add_edge(b, c, 1, DepKind::Data);
            SdcScheduler::new()
                .with_objective(objective)
                .schedule(&mut g)
                .unwrap();
            (g.unit(b).slot().unwrap(), g.unit(c).slot().unwrap())
        };

        // Earliest completion leaves b at the entry; slack distribution
        // moves it into its window, next to its consumer.
        assert_eq!(build(Objective::EarliestCompletion), (0, 2));
        assert_eq!(build(Objective::SlackDistribution), (1, 2));
    }

    #[test]
    fn test_datapath_units_are_ignored() {
        let mut g = SchedGraph::new(0);
        let a = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        let w = g.add_unit(UnitKind::Datapath, ResourceId::Trivial);
        let b = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        g.add_edge(a, w, 1, DepKind::Data);
        g.add_edge(w, b, 1, DepKind::Data);
        g.add_edge(a, b, 1, DepKind::Data);

        let report = SdcScheduler::new().schedule(&mut g).unwrap();
        assert_eq!(report.variables, 2);
        assert_eq!(report.rows, 1);
        assert_eq!(g.unit(w).slot(), None);
        assert_eq!(g.unit(b).slot(), Some(1));
    }

    #[test]
    fn test_empty_region_schedules_trivially() {
        let mut g = SchedGraph::new(4);
        g.add_unit(UnitKind::Datapath, ResourceId::Trivial);

        let report = SdcScheduler::new().schedule(&mut g).unwrap();
        assert_eq!(report.variables, 0);
        assert_eq!(report.rows, 0);
        assert_eq!(report.status, ScheduleStatus::Optimal);
    }

    #[test]
    fn test_stale_slots_fail_validation() {
        let mut g = SchedGraph::new(0);
        let a = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        let b = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        g.add_edge(a, b, 1, DepKind::Data);

        SdcScheduler::new().schedule(&mut g).unwrap();
        let err = SdcScheduler::new().schedule(&mut g).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidGraph(_)));

        // Clearing the schedule makes the graph usable again.
        g.clear_schedule();
        assert!(SdcScheduler::new().schedule(&mut g).is_ok());
    }

    #[test]
    fn test_zero_budget_times_out() {
        let mut g = SchedGraph::new(0);
        let a = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        let b = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        g.add_edge(a, b, 1, DepKind::Data);

        let scheduler =
            SdcScheduler::new().with_config(SolverConfig::new().with_timeout(Duration::ZERO));
        let err = scheduler.schedule(&mut g).unwrap_err();
        assert!(matches!(err, ScheduleError::Timeout { .. }));
        assert!(!err.is_recoverable());
        // No partial commit on malfunction.
        assert_eq!(g.unit(a).slot(), None);
        assert_eq!(g.unit(b).slot(), None);
    }

    #[test]
    fn test_presolve_off_matches_presolve_on() {
        let run = |presolve| {
            let mut g = SchedGraph::new(0);
            let a = g.add_unit(UnitKind::Control, ResourceId::Trivial);
            let b = g.add_unit(UnitKind::Control, ResourceId::Exclusive(2));
            let c = g.add_unit(UnitKind::Control, ResourceId::Exclusive(2));
            g.add_edge(a, b, 1, DepKind::Data);
            g.add_edge(a, b, 2, DepKind::Data);
            g.add_edge(a, c, 1, DepKind::Data);
            SdcScheduler::new()
                .with_config(SolverConfig::new().with_presolve(presolve))
                .schedule(&mut g)
                .unwrap();
            g.units().map(|u| u.slot()).collect::<Vec<_>>()
        };

        assert_eq!(run(PresolveOptions::default()), run(PresolveOptions::none()));
    }
}
