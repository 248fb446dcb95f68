//! Diamond cut planning
//!
//! Reconciles a diamond's current routing table with a desired facet set.
//!
//! # Core Concepts
//!
//! - [`RoutingTable`]: selector-to-facet partition as reported by the diamond
//! - [`Cut`] / [`CutBatch`]: routing mutations applied atomically
//! - [`ProtectedSet`]: infrastructure facets immune to removal
//! - [`CutPlanner`]: remove-then-add planning (default)
//! - [`DiffPlanner`]: single-batch planning with `Replace`
//! - [`RoutingTable::apply`]: local preview of a batch under the diamond's rules
//!
//! # Example
//!
//! ```rust,ignore
//! use diamond_cut::{CutPlanner, ProtectedSet};
//!
//! let planner = CutPlanner::new();
//! let removal = planner.plan_removal(&table, &protected);
//! let after_removal = table.apply(&removal)?;
//! let addition = planner.plan_addition(&desired)?;
//! let after_addition = after_removal.apply(&addition)?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod diff;
mod error;
mod model;
mod planner;
pub mod validation;

pub use diff::DiffPlanner;
pub use error::{CutError, RejectReason};
pub use model::{Cut, CutAction, CutBatch, Facet, InitPayload, ProtectedSet, RoutingEntry, RoutingTable};
pub use planner::CutPlanner;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
