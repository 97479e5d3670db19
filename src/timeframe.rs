//! Feasibility windows and resource serialization.
//!
//! Two preparation steps run before any constraint is built:
//!
//! 1. [`serialize_exclusive_resources`] injects synthetic ordering edges
//!    between control units that share an exclusive resource and are not
//!    already ordered by some path, so resource conflicts become
//!    precedence constraints. The constraint model itself only encodes
//!    precedence; skipping this step would silently admit
//!    resource-infeasible schedules.
//! 2. [`TimeFrames::compute`] derives the `[earliest, latest]` slot
//!    window of every control unit by forward/backward longest-path
//!    relaxation. A relaxation that fails to converge identifies a
//!    positive-latency cycle, which makes the region infeasible before a
//!    solver session is ever opened. The windows also serve as implied
//!    variable bounds during model construction.
//!
//! # Reference
//! Cong & Zhang (2006), "An Efficient and Versatile Scheduling Algorithm
//! Based on SDC Formulation"

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::models::{DepKind, ResourceId, SchedGraph, UnitId};

/// The `[earliest, latest]` slot window of a control unit, relative to
/// the region entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFrame {
    /// Earliest feasible start slot (ASAP).
    pub earliest: u32,
    /// Latest start slot that still admits a critical-path-length
    /// schedule (ALAP).
    pub latest: u32,
}

impl TimeFrame {
    /// Scheduling freedom within the window.
    #[inline]
    pub fn slack(&self) -> u32 {
        self.latest - self.earliest
    }
}

/// The region admits no slot assignment: some dependency cycle has a
/// positive latency sum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("positive-latency dependency cycle through unit {unit}")]
pub struct PositiveCycle {
    /// A unit on the offending cycle.
    pub unit: usize,
}

/// Feasibility windows for every control unit of one region.
#[derive(Debug, Clone)]
pub struct TimeFrames {
    frames: Vec<Option<TimeFrame>>,
    horizon: u32,
}

impl TimeFrames {
    /// Computes windows by longest-path relaxation over effective edge
    /// latencies.
    ///
    /// Only edges between two control units propagate; datapath units
    /// get no window. Relaxation is bounded by the control-unit count:
    /// exceeding the bound proves a positive-latency cycle.
    pub fn compute(graph: &SchedGraph) -> Result<Self, PositiveCycle> {
        let n = graph.len();
        let passes = graph.control_units().count();

        let mut earliest: Vec<u32> = vec![0; n];
        let mut pass = 0usize;
        let mut changed = true;
        while changed {
            changed = false;
            let mut witness = 0usize;
            for edge in graph.edges() {
                if !graph.unit(edge.src).is_control() || !graph.unit(edge.dst).is_control() {
                    continue;
                }
                let reach = earliest[edge.src.0].saturating_add(edge.min_separation());
                if reach > earliest[edge.dst.0] {
                    earliest[edge.dst.0] = reach;
                    witness = edge.dst.0;
                    changed = true;
                }
            }
            pass += 1;
            if changed && pass > passes {
                return Err(PositiveCycle { unit: witness });
            }
        }

        let horizon = graph
            .control_units()
            .map(|u| earliest[u.id().0])
            .max()
            .unwrap_or(0);

        let mut latest: Vec<u32> = vec![horizon; n];
        changed = true;
        while changed {
            changed = false;
            for edge in graph.edges() {
                if !graph.unit(edge.src).is_control() || !graph.unit(edge.dst).is_control() {
                    continue;
                }
                let bound = latest[edge.dst.0].saturating_sub(edge.min_separation());
                if bound < latest[edge.src.0] {
                    latest[edge.src.0] = bound;
                    changed = true;
                }
            }
        }

        let frames = graph
            .units()
            .map(|u| {
                u.is_control().then(|| TimeFrame {
                    earliest: earliest[u.id().0],
                    latest: latest[u.id().0],
                })
            })
            .collect();

        Ok(Self { frames, horizon })
    }

    /// The window of `unit`, or `None` for datapath units.
    #[inline]
    pub fn of(&self, unit: UnitId) -> Option<TimeFrame> {
        self.frames[unit.0]
    }

    /// Length of the critical path through the region, in slots.
    #[inline]
    pub fn horizon(&self) -> u32 {
        self.horizon
    }
}

/// Injects resource-order edges between control units that share an
/// exclusive resource and are not yet ordered by any path.
///
/// Pairs are visited in unit-index order, so the injected edges are
/// deterministic for a given graph. Returns the number of edges added.
///
/// Must run before constraint building and before
/// [`TimeFrames::compute`], so the windows bound the full constraint
/// system.
pub fn serialize_exclusive_resources(graph: &mut SchedGraph) -> usize {
    let mut groups: BTreeMap<u32, Vec<UnitId>> = BTreeMap::new();
    for unit in graph.control_units() {
        if let ResourceId::Exclusive(res) = unit.resource() {
            groups.entry(res).or_default().push(unit.id());
        }
    }

    let mut added = 0usize;
    for (res, members) in &groups {
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                let (a, b) = (members[i], members[j]);
                if graph.has_path(a, b) || graph.has_path(b, a) {
                    continue;
                }
                graph.add_edge(a, b, 0, DepKind::ResourceOrder);
                added += 1;
            }
        }
        debug!(
            resource = *res,
            members = members.len(),
            "serialized exclusive resource"
        );
    }
    added
}
