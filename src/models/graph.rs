//! Scheduling graph model.
//!
//! One graph per region (basic block). The graph owns its units and
//! edges, records the region's entry slot, and is destructively mutated
//! (slots written) exactly once per successful scheduling attempt.
//!
//! Construction happens upstream of the scheduler: the graph builder
//! creates units with finalized resource ids and edges with finalized
//! non-negative latencies, then hands the graph over for scheduling.

use serde::{Deserialize, Serialize};

use super::{DepEdge, DepKind, EdgeId, ResourceId, SchedUnit, UnitId, UnitKind};

/// A region's dependency graph plus its entry slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedGraph {
    units: Vec<SchedUnit>,
    edges: Vec<DepEdge>,
    entry_slot: u32,
}

impl SchedGraph {
    /// Creates an empty graph whose schedule begins at `entry_slot`.
    pub fn new(entry_slot: u32) -> Self {
        Self {
            units: Vec::new(),
            edges: Vec::new(),
            entry_slot,
        }
    }

    /// Absolute cycle number at which this region begins.
    #[inline]
    pub fn entry_slot(&self) -> u32 {
        self.entry_slot
    }

    /// Number of units.
    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the graph has no units.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Appends a unit and returns its stable index.
    pub fn add_unit(&mut self, kind: UnitKind, resource: ResourceId) -> UnitId {
        let id = UnitId(self.units.len());
        self.units.push(SchedUnit::new(id, kind, resource));
        id
    }

    /// Marks `unit` as predicated on `pred`.
    ///
    /// # Panics
    /// Panics if either index is out of range.
    pub fn set_predicate(&mut self, unit: UnitId, pred: UnitId) {
        assert!(pred.0 < self.units.len(), "predicate out of range");
        self.units[unit.0].set_predicate(pred);
    }

    /// Appends a dependency edge and links it into both endpoints.
    ///
    /// Parallel edges between the same pair are allowed; each later
    /// becomes an independent constraint.
    ///
    /// # Panics
    /// Panics if either endpoint is out of range.
    pub fn add_edge(&mut self, src: UnitId, dst: UnitId, latency: u32, kind: DepKind) -> EdgeId {
        assert!(
            src.0 < self.units.len() && dst.0 < self.units.len(),
            "edge endpoint out of range"
        );
        let id = EdgeId(self.edges.len());
        let edge = DepEdge {
            src,
            dst,
            latency,
            kind,
        };
        self.edges.push(edge);
        let is_value = edge.is_value();
        self.units[src.0].push_succ(id, is_value);
        self.units[dst.0].push_pred(id, is_value);
        id
    }

    /// The unit at `id`.
    #[inline]
    pub fn unit(&self, id: UnitId) -> &SchedUnit {
        &self.units[id.0]
    }

    /// The edge at `id`.
    #[inline]
    pub fn edge(&self, id: EdgeId) -> &DepEdge {
        &self.edges[id.0]
    }

    /// All units in insertion order.
    pub fn units(&self) -> impl Iterator<Item = &SchedUnit> {
        self.units.iter()
    }

    /// Control units in insertion order.
    pub fn control_units(&self) -> impl Iterator<Item = &SchedUnit> {
        self.units.iter().filter(|u| u.is_control())
    }

    /// All edges in insertion order.
    #[inline]
    pub fn edges(&self) -> &[DepEdge] {
        &self.edges
    }

    /// Incoming edges of `unit`.
    pub fn deps_in(&self, unit: UnitId) -> impl Iterator<Item = &DepEdge> {
        self.units[unit.0].preds().iter().map(|e| &self.edges[e.0])
    }

    /// Outgoing edges of `unit`.
    pub fn deps_out(&self, unit: UnitId) -> impl Iterator<Item = &DepEdge> {
        self.units[unit.0].succs().iter().map(|e| &self.edges[e.0])
    }

    /// Whether `to` is reachable from `from` along dependency edges.
    pub fn has_path(&self, from: UnitId, to: UnitId) -> bool {
        if from == to {
            return true;
        }
        let mut seen = vec![false; self.units.len()];
        let mut stack = vec![from];
        seen[from.0] = true;
        while let Some(u) = stack.pop() {
            for eid in self.units[u.0].succs() {
                let next = self.edges[eid.0].dst;
                if next == to {
                    return true;
                }
                if !seen[next.0] {
                    seen[next.0] = true;
                    stack.push(next);
                }
            }
        }
        false
    }

    /// Writes the final absolute slot of `unit`.
    pub(crate) fn commit_slot(&mut self, unit: UnitId, slot: u32) {
        self.units[unit.0].schedule_to(slot);
    }

    /// Drops every assigned slot, returning units to the unscheduled
    /// sentinel.
    pub fn clear_schedule(&mut self) {
        for u in &mut self.units {
            u.clear_slot();
        }
    }
}
