//! Solver session configuration and outcome classification.
//!
//! The solver boundary is pass-through: presolve reductions, verbosity,
//! the wall-clock budget, and the optional model dump never alter what
//! the optimal assignment is. Solver outcomes fall into exactly three
//! buckets:
//!
//! - **Infeasible** — recoverable at the caller's discretion (relax
//!   constraints, split the region, retry); nothing is mutated.
//! - **Committed** — optimal, or valid but not provably optimal
//!   ([`ScheduleStatus::Degraded`], surfaced with a warning).
//! - **Malfunction** — unbounded model, backend failure, or exhausted
//!   wall-clock budget; unrecoverable for this attempt.

use std::path::PathBuf;
use std::time::Duration;

use good_lp::ResolutionError;
use thiserror::Error;
use tracing::{debug, warn};

use crate::validation::ValidationError;

/// Structural reductions applied while assembling the model.
///
/// Independent toggles, all enabled by default. None changes the optimal
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresolveOptions {
    /// Tighten every decision variable to its feasibility window.
    pub implied_bounds: bool,
    /// Between parallel rows on the same unit pair, keep only the
    /// largest right-hand side.
    pub row_dominance: bool,
}

impl Default for PresolveOptions {
    fn default() -> Self {
        Self {
            implied_bounds: true,
            row_dominance: true,
        }
    }
}

impl PresolveOptions {
    /// Disables every reduction.
    pub fn none() -> Self {
        Self {
            implied_bounds: false,
            row_dominance: false,
        }
    }
}

/// How much model detail flows into the diagnostic log.
///
/// Diagnostic only; never affects the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Warnings and errors only.
    #[default]
    Critical,
    /// Per-attempt summaries.
    Normal,
    /// Row-by-row model detail.
    Full,
}

/// Pass-through settings for one solver session.
#[derive(Debug, Clone, Default)]
pub struct SolverConfig {
    /// Structural reductions (see [`PresolveOptions`]).
    pub presolve: PresolveOptions,
    /// Diagnostic detail level.
    pub verbosity: Verbosity,
    /// Wall-clock budget for the solve call. Exceeding it fails the
    /// attempt, even if the backend produced a result.
    pub timeout: Option<Duration>,
    /// Write the assembled model to this file before solving.
    pub dump_model: Option<PathBuf>,
}

impl SolverConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the presolve toggles.
    pub fn with_presolve(mut self, presolve: PresolveOptions) -> Self {
        self.presolve = presolve;
        self
    }

    /// Sets the diagnostic detail level.
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Sets the wall-clock budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Requests a human-readable model dump before solving.
    pub fn with_model_dump(mut self, path: impl Into<PathBuf>) -> Self {
        self.dump_model = Some(path.into());
        self
    }
}

/// Quality of a committed schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleStatus {
    /// The assignment is provably optimal for the selected objective.
    Optimal,
    /// The assignment is valid but not provably optimal. Reported by
    /// backends that return feasible-but-unproven results; the bundled
    /// backend proves optimality whenever it returns a solution.
    Degraded,
}

/// Summary of a successful scheduling attempt.
#[derive(Debug, Clone)]
pub struct ScheduleReport {
    /// Outcome quality.
    pub status: ScheduleStatus,
    /// Number of decision variables (control units).
    pub variables: usize,
    /// Number of precedence rows handed to the solver.
    pub rows: usize,
    /// Rows removed by the row-dominance reduction.
    pub dropped_rows: usize,
    /// Resource-order edges injected during preparation.
    pub serialized_edges: usize,
    /// Objective value of the committed assignment.
    pub objective_value: f64,
    /// Wall-clock time spent inside the solver.
    pub elapsed: Duration,
}

/// Why a scheduling attempt produced no schedule.
///
/// On every variant the graph is untouched: units keep the unscheduled
/// sentinel and no per-region scheduler state survives the call.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The graph violates the upstream input contract.
    #[error("scheduling graph failed validation with {} defect(s)", .0.len())]
    InvalidGraph(Vec<ValidationError>),

    /// No slot assignment satisfies every precedence constraint.
    #[error("no feasible schedule: {reason}")]
    Infeasible {
        /// What made the region infeasible.
        reason: String,
    },

    /// The solve call ran past the configured wall-clock budget.
    #[error("solver exceeded the wall-clock budget of {limit:?}")]
    Timeout {
        /// The configured budget.
        limit: Duration,
    },

    /// The backend failed: unbounded model, numeric trouble, or an
    /// internal error.
    #[error("solver malfunction: {0}")]
    Solver(String),
}

impl ScheduleError {
    /// Whether the caller may relax constraints and retry this region.
    ///
    /// Timeouts and backend malfunctions abort the surrounding
    /// compilation instead.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ScheduleError::Infeasible { .. } | ScheduleError::InvalidGraph(_)
        )
    }
}

/// Maps a backend failure into the three-way classification.
pub(crate) fn classify_failure(err: ResolutionError) -> ScheduleError {
    match err {
        ResolutionError::Infeasible => ScheduleError::Infeasible {
            reason: "the constraint system admits no assignment".into(),
        },
        ResolutionError::Unbounded => {
            ScheduleError::Solver("objective is unbounded over the feasible region".into())
        }
        other => ScheduleError::Solver(other.to_string()),
    }
}

/// Surfaces the committed status through the diagnostic log.
pub(crate) fn log_status(status: ScheduleStatus) {
    match status {
        ScheduleStatus::Optimal => debug!("schedule is optimal"),
        ScheduleStatus::Degraded => {
            warn!("schedule committed but may not be minimal")
        }
    }
}
