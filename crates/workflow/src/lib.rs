//! ReviewForge Workflow Engine
//!
//! Governs the manuscript lifecycle:
//! - State machine transitions and the actors allowed to trigger them
//! - Multi-criteria review aggregation into a decision signal
//! - Revision versioning and re-entry into review
//! - Role-filtered views and workflow event notifications

pub mod aggregation;
pub mod engine;
pub mod events;
pub mod locks;
pub mod visibility;

pub use aggregation::{aggregate, AggregateSummary, CriterionSummary, Recommendation, Thresholds};
pub use engine::{AssignOptions, ClosedCycle, WorkflowEngine};
pub use events::WorkflowEvent;
pub use visibility::{ManuscriptView, PendingAssignment, ReviewView, RevisionView, VisibilityPolicy};
