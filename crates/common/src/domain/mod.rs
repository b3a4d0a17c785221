//! Domain model for the manuscript workflow
//!
//! Plain value types shared by the stores, the workflow engine,
//! and the gateway. No behavior beyond invariant checks.

mod manuscript;
mod review;
mod status;

pub use manuscript::{
    content_digest, Manuscript, ManuscriptDraft, ManuscriptRecord, PlagiarismResult, Revision,
    RevisionDraft,
};
pub use review::{Assignment, AssignmentStatus, Criterion, Ratings, Review};
pub use status::{Decision, ManuscriptStatus};
