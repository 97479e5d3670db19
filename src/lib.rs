//! Cycle-accurate operation scheduling for hardware synthesis.
//!
//! Assigns a concrete clock cycle ("slot") to every atomic
//! micro-operation in a region (basic block) of a hardware program,
//! subject to data/control precedence constraints with integer
//! latencies. The dependency graph becomes a System of Difference
//! Constraints, the constraints become an integer linear program, an
//! external solver finds the assignment, and the result is committed
//! back into the graph for downstream emission.
//!
//! # Modules
//!
//! - **`models`**: Domain types — `SchedUnit`, `DepEdge`, `SchedGraph`
//! - **`validation`**: Input integrity checks before an attempt
//! - **`timeframe`**: Feasibility windows and exclusive-resource
//!   serialization
//! - **`sdc`**: The scheduler core — model assembly, solver session,
//!   outcome classification, commit, metrics
//! - **`rewrite`**: Post-scheduling micro-operation cleanups
//!
//! # Example
//!
//! ```
//! use sdc_sched::models::{DepKind, ResourceId, SchedGraph, UnitKind};
//! use sdc_sched::sdc::SdcScheduler;
//!
//! let mut graph = SchedGraph::new(0);
//! let load = graph.add_unit(UnitKind::Control, ResourceId::Exclusive(0));
//! let add = graph.add_unit(UnitKind::Control, ResourceId::Trivial);
//! graph.add_edge(load, add, 2, DepKind::Data);
//!
//! let report = SdcScheduler::new().schedule(&mut graph)?;
//! assert_eq!(graph.unit(load).slot(), Some(0));
//! assert_eq!(graph.unit(add).slot(), Some(2));
//! # let _ = report;
//! # Ok::<(), sdc_sched::sdc::ScheduleError>(())
//! ```
//!
//! # References
//!
//! - Cong & Zhang (2006), "An Efficient and Versatile Scheduling
//!   Algorithm Based on SDC Formulation"
//! - De Micheli (1994), "Synthesis and Optimization of Digital Circuits"
//! - Coussy & Morawiec (2008), "High-Level Synthesis: From Algorithm to
//!   Digital Circuit"

pub mod models;
pub mod rewrite;
pub mod sdc;
pub mod timeframe;
pub mod validation;
