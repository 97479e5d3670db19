//! Schedule quality metrics.
//!
//! Computes standard indicators from an accepted schedule: region span,
//! displacement past the earliest feasible slot, and exclusive-resource
//! occupancy. Useful for comparing objectives and for regression checks
//! on scheduler changes.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Span | Latest committed start slot minus entry slot |
//! | Displacement | Committed slot minus earliest feasible slot |
//! | Occupancy | Busy slots of an exclusive resource / (span + 1) |

use std::collections::{HashMap, HashSet};

use crate::models::{ResourceId, SchedGraph};
use crate::timeframe::TimeFrames;

/// Quality indicators of one scheduled region.
///
/// All slot values are relative to the region entry.
#[derive(Debug, Clone)]
pub struct ScheduleMetrics {
    /// Latest committed start slot, relative to entry.
    pub span: u32,
    /// Number of control units carrying a slot.
    pub scheduled_units: usize,
    /// Sum of displacements past each unit's earliest slot.
    pub total_displacement: u32,
    /// Largest single displacement.
    pub max_displacement: u32,
    /// Busy-slot fraction per exclusive resource.
    pub occupancy_by_resource: HashMap<u32, f64>,
    /// Mean occupancy across exclusive resources.
    pub avg_occupancy: f64,
}

impl ScheduleMetrics {
    /// Computes metrics from a scheduled graph and its feasibility
    /// windows.
    ///
    /// Units without a slot (datapath, or a failed attempt) are skipped.
    pub fn calculate(graph: &SchedGraph, frames: &TimeFrames) -> Self {
        let entry = graph.entry_slot();
        let mut span = 0u32;
        let mut scheduled_units = 0usize;
        let mut total_displacement = 0u32;
        let mut max_displacement = 0u32;
        let mut busy: HashMap<u32, HashSet<u32>> = HashMap::new();

        for unit in graph.control_units() {
            let Some(slot) = unit.slot() else { continue };
            scheduled_units += 1;
            let rel = slot.saturating_sub(entry);
            span = span.max(rel);

            if let Some(frame) = frames.of(unit.id()) {
                let displacement = rel.saturating_sub(frame.earliest);
                total_displacement += displacement;
                max_displacement = max_displacement.max(displacement);
            }

            if let ResourceId::Exclusive(res) = unit.resource() {
                busy.entry(res).or_default().insert(rel);
            }
        }

        let slots = f64::from(span) + 1.0;
        let occupancy_by_resource: HashMap<u32, f64> = busy
            .into_iter()
            .map(|(res, used)| (res, used.len() as f64 / slots))
            .collect();
        let avg_occupancy = if occupancy_by_resource.is_empty() {
            0.0
        } else {
            occupancy_by_resource.values().sum::<f64>() / occupancy_by_resource.len() as f64
        };

        Self {
            span,
            scheduled_units,
            total_displacement,
            max_displacement,
            occupancy_by_resource,
            avg_occupancy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DepKind, ResourceId, SchedGraph, UnitKind};
    use crate::sdc::SdcScheduler;
    use crate::timeframe::TimeFrames;

    #[test]
    fn test_metrics_on_scheduled_chain() {
        let mut g = SchedGraph::new(0);
        let a = g.add_unit(UnitKind::Control, ResourceId::Exclusive(0));
        let b = g.add_unit(UnitKind::Control, ResourceId::Exclusive(0));
        g.add_edge(a, b, 2, DepKind::Data);

        SdcScheduler::new().schedule(&mut g).unwrap();
        let frames = TimeFrames::compute(&g).unwrap();
        let metrics = ScheduleMetrics::calculate(&g, &frames);

        assert_eq!(metrics.span, 2);
        assert_eq!(metrics.scheduled_units, 2);
        assert_eq!(metrics.total_displacement, 0);
        // Resource 0 is busy in two of three slots.
        let occ = metrics.occupancy_by_resource[&0];
        assert!((occ - 2.0 / 3.0).abs() < 1e-10);
        assert!((metrics.avg_occupancy - occ).abs() < 1e-10);
    }

    #[test]
    fn test_metrics_skip_unscheduled() {
        let mut g = SchedGraph::new(0);
        g.add_unit(UnitKind::Control, ResourceId::Trivial);
        g.add_unit(UnitKind::Datapath, ResourceId::Trivial);

        let frames = TimeFrames::compute(&g).unwrap();
        let metrics = ScheduleMetrics::calculate(&g, &frames);
        assert_eq!(metrics.scheduled_units, 0);
        assert_eq!(metrics.span, 0);
        assert!(metrics.occupancy_by_resource.is_empty());
        assert_eq!(metrics.avg_occupancy, 0.0);
    }

    #[test]
    fn test_metrics_use_entry_relative_slots() {
        let mut g = SchedGraph::new(10);
        let a = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        let b = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        g.add_edge(a, b, 3, DepKind::Data);

        SdcScheduler::new().schedule(&mut g).unwrap();
        let frames = TimeFrames::compute(&g).unwrap();
        let metrics = ScheduleMetrics::calculate(&g, &frames);
        assert_eq!(metrics.span, 3);
        assert_eq!(metrics.total_displacement, 0);
    }
}
