//! Manuscript and review store contracts
//!
//! The workflow engine only talks to storage through [`ManuscriptStore`].
//! Every write is a single [`Commit`] applied atomically: either the new
//! manuscript header and its mutation land together, or nothing does.
//! Implementations re-check uniqueness and append-only rules so a buggy
//! caller cannot corrupt the audit trail.

mod memory;

pub use memory::InMemoryStore;

use crate::domain::{Assignment, Manuscript, ManuscriptRecord, ManuscriptStatus, Review, Revision};
use crate::errors::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Which manuscripts a listing should return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    All,
    /// Manuscripts the actor wrote and/or holds a non-declined assignment on
    Involving {
        actor_id: Uuid,
        as_author: bool,
        as_reviewer: bool,
    },
}

impl ListScope {
    pub fn matches(&self, record: &ManuscriptRecord) -> bool {
        match *self {
            ListScope::All => true,
            ListScope::Involving { actor_id, as_author, as_reviewer } => {
                (as_author && record.manuscript.author_id == actor_id)
                    || (as_reviewer && record.involves_reviewer(actor_id))
            }
        }
    }
}

/// Listing request: a scope plus an optional status filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub scope: ListScope,
    pub status: Option<ManuscriptStatus>,
}

impl ListQuery {
    pub fn new(scope: ListScope) -> Self {
        Self { scope, status: None }
    }

    pub fn with_status(mut self, status: Option<ManuscriptStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn matches(&self, record: &ManuscriptRecord) -> bool {
        self.status.map_or(true, |status| record.manuscript.status == status) && self.scope.matches(record)
    }
}

/// Child-row change carried by a commit
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Header-only change (status, plagiarism result, cycle close)
    None,
    /// New reviewer assignment on the current revision
    Assign(Assignment),
    /// Status change of an existing assignment
    UpdateAssignment(Assignment),
    /// New review; the reviewer's assignment is marked completed
    RecordReview(Review),
    /// Revision N+1
    AppendRevision(Revision),
}

/// Atomic write of one manuscript
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    /// New header; its `version` must be `expected_version + 1`
    pub manuscript: Manuscript,
    pub expected_version: i64,
    pub mutation: Mutation,
}

impl Commit {
    pub fn new(manuscript: Manuscript, expected_version: i64, mutation: Mutation) -> Self {
        Self {
            manuscript,
            expected_version,
            mutation,
        }
    }
}

#[async_trait]
pub trait ManuscriptStore: Send + Sync {
    /// Persist a freshly submitted manuscript together with revision 1
    async fn insert(&self, manuscript: &Manuscript, first_revision: &Revision) -> Result<()>;

    /// Consistent snapshot of one manuscript; `NotFound` for unknown ids
    async fn load(&self, id: Uuid) -> Result<ManuscriptRecord>;

    /// Snapshots matching the query, newest first
    async fn list(&self, query: ListQuery) -> Result<Vec<ManuscriptRecord>>;

    /// Apply a commit atomically, returning the new snapshot
    async fn commit(&self, commit: Commit) -> Result<ManuscriptRecord>;

    /// Check the backing storage is reachable
    async fn ping(&self) -> Result<()>;
}
