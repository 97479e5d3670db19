//! Dependency edge model.
//!
//! Edges carry the precedence relation of the region: the destination
//! unit may not start earlier than the source unit's start plus the edge
//! latency. Parallel edges between the same pair of units are permitted
//! and each contributes its own constraint.

use serde::{Deserialize, Serialize};

use super::UnitId;

/// Stable index of an edge within its [`SchedGraph`](super::SchedGraph).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EdgeId(pub usize);

/// Where a dependency edge comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepKind {
    /// Value dependency: the destination consumes a result of the source.
    Data,
    /// Control dependency: ordering required by control flow.
    Control,
    /// Synthetic ordering between units sharing an exclusive resource.
    ResourceOrder,
}

/// A precedence constraint between two units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepEdge {
    /// Source unit (must start first).
    pub src: UnitId,
    /// Destination unit.
    pub dst: UnitId,
    /// Minimum number of cycles between the two start slots.
    pub latency: u32,
    /// Origin of the dependency.
    pub kind: DepKind,
}

impl DepEdge {
    /// Whether this edge is a value dependency.
    #[inline]
    pub fn is_value(&self) -> bool {
        self.kind == DepKind::Data
    }

    /// Effective start-slot separation this edge requires.
    ///
    /// A single-issue resource admits one operation per cycle, so
    /// resource-order edges are strict even when they carry no latency.
    /// Window propagation and constraint rows must both use this value.
    #[inline]
    pub fn min_separation(&self) -> u32 {
        match self.kind {
            DepKind::ResourceOrder => self.latency.max(1),
            _ => self.latency,
        }
    }
}
