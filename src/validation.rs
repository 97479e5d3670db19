//! Input validation for scheduling graphs.
//!
//! Checks structural integrity of a region before a scheduling attempt.
//! Detects:
//! - Self-dependency edges
//! - Predicates referencing datapath units
//! - Datapath units bound to exclusive resources
//! - Stale slots left over from a previous attempt
//!
//! All defects are collected rather than stopping at the first, so one
//! pass over a broken graph reports everything the upstream builder got
//! wrong.

use crate::models::{SchedGraph, UnitKind};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// An edge whose source and destination are the same unit.
    SelfDependency,
    /// A predicate reference to a unit that is not a control unit.
    DatapathPredicate,
    /// A datapath unit bound to an exclusive resource; its resource use
    /// would escape serialization.
    ExclusiveDatapath,
    /// A unit already carries a slot from an earlier attempt.
    StaleSlot,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates a scheduling graph before an attempt.
///
/// Checks:
/// 1. No edge starts and ends on the same unit
/// 2. Every predicate references a control unit
/// 3. No datapath unit claims an exclusive resource
/// 4. No unit carries a slot already
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_graph(graph: &SchedGraph) -> ValidationResult {
    let mut errors = Vec::new();

    for edge in graph.edges() {
        if edge.src == edge.dst {
            errors.push(ValidationError::new(
                ValidationErrorKind::SelfDependency,
                format!("unit {} depends on itself", edge.src.0),
            ));
        }
    }

    for unit in graph.units() {
        if let Some(pred) = unit.predicate() {
            if graph.unit(pred).kind() != UnitKind::Control {
                errors.push(ValidationError::new(
                    ValidationErrorKind::DatapathPredicate,
                    format!(
                        "unit {} is predicated on datapath unit {}",
                        unit.id().0,
                        pred.0
                    ),
                ));
            }
        }

        if unit.kind() == UnitKind::Datapath && unit.resource().is_exclusive() {
            errors.push(ValidationError::new(
                ValidationErrorKind::ExclusiveDatapath,
                format!(
                    "datapath unit {} is bound to an exclusive resource",
                    unit.id().0
                ),
            ));
        }

        if unit.is_scheduled() {
            errors.push(ValidationError::new(
                ValidationErrorKind::StaleSlot,
                format!(
                    "unit {} already has slot {} assigned",
                    unit.id().0,
                    unit.slot().unwrap()
                ),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DepKind, ResourceId, SchedGraph, UnitKind};

    fn sample_graph() -> SchedGraph {
        let mut g = SchedGraph::new(0);
        let a = g.add_unit(UnitKind::Control, ResourceId::Trivial);
        let b = g.add_unit(UnitKind::Control, ResourceId::Exclusive(0));
        let w = g.add_unit(UnitKind::Datapath, ResourceId::Trivial);
        g.add_edge(a, b, 1, DepKind::Data);
        g.add_edge(b, w, 0, DepKind::Data);
        g
    }

    #[test]
    fn test_valid_graph() {
        let g = sample_graph();
        assert!(validate_graph(&g).is_ok());
    }

    #[test]
    fn test_self_dependency() {
        let mut g = sample_graph();
        let a = crate::models::UnitId(0);
        g.add_edge(a, a, 1, DepKind::Control);

        let errors = validate_graph(&g).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::SelfDependency));
    }

    #[test]
    fn test_datapath_predicate() {
        let mut g = sample_graph();
        // Unit 2 is the datapath unit.
        g.set_predicate(crate::models::UnitId(1), crate::models::UnitId(2));

        let errors = validate_graph(&g).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DatapathPredicate));
    }

    #[test]
    fn test_exclusive_datapath() {
        let mut g = sample_graph();
        g.add_unit(UnitKind::Datapath, ResourceId::Exclusive(3));

        let errors = validate_graph(&g).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::ExclusiveDatapath));
    }

    #[test]
    fn test_stale_slot() {
        let mut g = sample_graph();
        g.commit_slot(crate::models::UnitId(0), 4);

        let errors = validate_graph(&g).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::StaleSlot
                && e.message.contains("slot 4")));
    }

    #[test]
    fn test_multiple_errors() {
        let mut g = sample_graph();
        let a = crate::models::UnitId(0);
        g.add_edge(a, a, 0, DepKind::Data);
        g.add_unit(UnitKind::Datapath, ResourceId::Exclusive(1));

        let errors = validate_graph(&g).unwrap_err();
        assert!(errors.len() >= 2);
    }
}
