//! Scheduling unit model.
//!
//! A scheduling unit is the smallest entity participating in cycle
//! assignment: one atomic hardware micro-operation. Control units occupy
//! an explicit control step and receive a start slot; datapath units are
//! combinational, ride along with their control users, and are ignored by
//! the scheduler.
//!
//! # Reference
//! Cong & Zhang (2006), "An Efficient and Versatile Scheduling Algorithm
//! Based on SDC Formulation"

use serde::{Deserialize, Serialize};

use super::EdgeId;

/// Stable index of a unit within its [`SchedGraph`](super::SchedGraph).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct UnitId(pub usize);

/// Unit classification.
///
/// Only control units take part in slot assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitKind {
    /// Occupies an explicit control step.
    Control,
    /// Combinational; scheduled implicitly alongside its control users.
    Datapath,
}

/// The functional unit an operation executes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceId {
    /// Shareable or combinational resource; never serialized.
    Trivial,
    /// A bound, single-issue functional-unit instance. At most one
    /// operation may occupy it per cycle.
    Exclusive(u32),
}

impl ResourceId {
    /// Whether operations on this resource must be serialized.
    #[inline]
    pub fn is_exclusive(&self) -> bool {
        matches!(self, ResourceId::Exclusive(_))
    }
}

/// An atomic operation awaiting cycle assignment.
///
/// Created through [`SchedGraph::add_unit`](super::SchedGraph::add_unit);
/// the graph owns its units and maintains their edge lists and value
/// dependency counts.
///
/// The start slot is `None` until a scheduling attempt succeeds. Reading
/// it after a failed attempt yields the sentinel, which is a usage error
/// on the consumer's side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedUnit {
    id: UnitId,
    kind: UnitKind,
    resource: ResourceId,
    predicate: Option<UnitId>,
    slot: Option<u32>,
    preds: Vec<EdgeId>,
    succs: Vec<EdgeId>,
    val_deps: u32,
    val_uses: u32,
}

impl SchedUnit {
    pub(crate) fn new(id: UnitId, kind: UnitKind, resource: ResourceId) -> Self {
        Self {
            id,
            kind,
            resource,
            predicate: None,
            slot: None,
            preds: Vec::new(),
            succs: Vec::new(),
            val_deps: 0,
            val_uses: 0,
        }
    }

    /// Stable index of this unit.
    #[inline]
    pub fn id(&self) -> UnitId {
        self.id
    }

    /// Unit classification.
    #[inline]
    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Whether this unit occupies an explicit control step.
    #[inline]
    pub fn is_control(&self) -> bool {
        self.kind == UnitKind::Control
    }

    /// The functional unit this operation executes on.
    #[inline]
    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    /// Guarding unit, if this operation is predicated.
    #[inline]
    pub fn predicate(&self) -> Option<UnitId> {
        self.predicate
    }

    /// Absolute start slot, or `None` while unscheduled.
    #[inline]
    pub fn slot(&self) -> Option<u32> {
        self.slot
    }

    /// Whether a scheduling attempt has assigned this unit a slot.
    #[inline]
    pub fn is_scheduled(&self) -> bool {
        self.slot.is_some()
    }

    /// Incoming dependency edges.
    #[inline]
    pub fn preds(&self) -> &[EdgeId] {
        &self.preds
    }

    /// Outgoing dependency edges.
    #[inline]
    pub fn succs(&self) -> &[EdgeId] {
        &self.succs
    }

    /// Number of incoming value (data) dependencies.
    #[inline]
    pub fn val_deps(&self) -> u32 {
        self.val_deps
    }

    /// Number of outgoing value (data) dependencies.
    #[inline]
    pub fn val_uses(&self) -> u32 {
        self.val_uses
    }

    pub(crate) fn set_predicate(&mut self, pred: UnitId) {
        self.predicate = Some(pred);
    }

    pub(crate) fn schedule_to(&mut self, slot: u32) {
        self.slot = Some(slot);
    }

    pub(crate) fn clear_slot(&mut self) {
        self.slot = None;
    }

    pub(crate) fn push_pred(&mut self, edge: EdgeId, is_value: bool) {
        self.preds.push(edge);
        if is_value {
            self.val_deps += 1;
        }
    }

    pub(crate) fn push_succ(&mut self, edge: EdgeId, is_value: bool) {
        self.succs.push(edge);
        if is_value {
            self.val_uses += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_starts_unscheduled() {
        let u = SchedUnit::new(UnitId(0), UnitKind::Control, ResourceId::Trivial);
        assert!(!u.is_scheduled());
        assert_eq!(u.slot(), None);
        assert_eq!(u.val_deps(), 0);
        assert_eq!(u.val_uses(), 0);
    }

    #[test]
    fn test_unit_slot_lifecycle() {
        let mut u = SchedUnit::new(UnitId(3), UnitKind::Control, ResourceId::Exclusive(1));
        u.schedule_to(7);
        assert_eq!(u.slot(), Some(7));
        u.clear_slot();
        assert!(!u.is_scheduled());
    }

    #[test]
    fn test_resource_exclusivity() {
        assert!(ResourceId::Exclusive(0).is_exclusive());
        assert!(!ResourceId::Trivial.is_exclusive());
    }
}
