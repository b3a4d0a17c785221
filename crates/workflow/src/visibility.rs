//! Role-filtered views of a manuscript
//!
//! Editors see everything. Authors see their manuscript and the reviews of
//! cycles that already have an outcome. Reviewers see manuscripts they were
//! assigned to and their own reviews. Reviewer identities are only revealed
//! to editors unless the policy says otherwise.

use chrono::{DateTime, Utc};
use reviewforge_common::auth::{ActorContext, Role};
use reviewforge_common::config::WorkflowConfig;
use reviewforge_common::domain::{
    Assignment, AssignmentStatus, ManuscriptRecord, ManuscriptStatus, PlagiarismResult, Ratings,
    Review, Revision,
};
use reviewforge_common::errors::{AppError, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityPolicy {
    pub reveal_reviewer_identity_to_author: bool,
    pub reviewers_see_peer_reviews: bool,
}

impl From<&WorkflowConfig> for VisibilityPolicy {
    fn from(config: &WorkflowConfig) -> Self {
        Self {
            reveal_reviewer_identity_to_author: config.reveal_reviewer_identity_to_author,
            reviewers_see_peer_reviews: config.reviewers_see_peer_reviews,
        }
    }
}

/// How the actor relates to one manuscript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Editor,
    Author,
    Reviewer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevisionView {
    pub number: u32,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub content: String,
    pub changes_summary: Option<String>,
    pub content_digest: String,
    /// Cycle status of this revision
    pub status: ManuscriptStatus,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewView {
    pub id: Uuid,
    pub manuscript_id: Uuid,
    pub revision_number: u32,
    /// Withheld when the viewer may not know who wrote the review
    pub reviewer_id: Option<Uuid>,
    pub ratings: Ratings,
    pub comments: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManuscriptView {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub status: ManuscriptStatus,
    pub current_revision: u32,
    pub version: i64,
    pub review_closed_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revisions: Vec<RevisionView>,
    pub reviews: Vec<ReviewView>,

    /// Editors only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plagiarism: Option<PlagiarismResult>,

    /// Editors see every assignment, reviewers only their own
    pub assignments: Vec<Assignment>,

    /// Non-declined reviewers on the current revision; editors only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_reviewers: Option<BTreeSet<Uuid>>,
}

/// Open work item on a reviewer's queue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingAssignment {
    pub manuscript_id: Uuid,
    pub title: String,
    pub revision_number: u32,
    pub assigned_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub overdue: bool,
}

impl VisibilityPolicy {
    /// Relation of the actor to the manuscript, if any
    pub fn viewer(&self, actor: &ActorContext, record: &ManuscriptRecord) -> Option<Viewer> {
        if actor.is_editor() {
            Some(Viewer::Editor)
        } else if record.manuscript.author_id == actor.actor_id {
            Some(Viewer::Author)
        } else if actor.has_role(Role::Reviewer) && record.involves_reviewer(actor.actor_id) {
            Some(Viewer::Reviewer)
        } else {
            None
        }
    }

    fn require_viewer(&self, actor: &ActorContext, record: &ManuscriptRecord) -> Result<Viewer> {
        self.viewer(actor, record).ok_or_else(|| AppError::Unauthorized {
            message: format!(
                "Actor {} has no access to manuscript {}",
                actor.actor_id,
                record.id()
            ),
        })
    }

    fn review_view(&self, viewer: Viewer, actor: &ActorContext, record: &ManuscriptRecord, review: &Review) -> Option<ReviewView> {
        let own = review.reviewer_id == actor.actor_id;

        let (visible, reveal) = match viewer {
            Viewer::Editor => (true, true),
            Viewer::Author => {
                let settled = record
                    .revision(review.revision_number)
                    .map(|r| r.cycle_status(&record.manuscript).has_outcome())
                    .unwrap_or(false);
                (settled, self.reveal_reviewer_identity_to_author)
            }
            Viewer::Reviewer => {
                let peer_visible = self.reviewers_see_peer_reviews
                    && record
                        .assignment(review.revision_number, actor.actor_id)
                        .is_some_and(Assignment::is_active);
                (own || peer_visible, own)
            }
        };

        visible.then(|| review_view(review, reveal))
    }

    fn filter_reviews(&self, viewer: Viewer, actor: &ActorContext, record: &ManuscriptRecord) -> Vec<ReviewView> {
        record
            .reviews
            .iter()
            .filter_map(|review| self.review_view(viewer, actor, record, review))
            .collect()
    }

    /// Reviews the actor may read; `Unauthorized` for unrelated actors
    pub fn reviews(&self, actor: &ActorContext, record: &ManuscriptRecord) -> Result<Vec<ReviewView>> {
        let viewer = self.require_viewer(actor, record)?;
        Ok(self.filter_reviews(viewer, actor, record))
    }

    /// Full role-filtered view; `Unauthorized` for unrelated actors
    pub fn view(&self, actor: &ActorContext, record: &ManuscriptRecord) -> Result<ManuscriptView> {
        let viewer = self.require_viewer(actor, record)?;
        let manuscript = &record.manuscript;

        let revisions = record
            .revisions
            .iter()
            .map(|r| revision_view(r, record))
            .collect();

        let assignments = match viewer {
            Viewer::Editor => record.assignments.clone(),
            Viewer::Reviewer => record
                .assignments
                .iter()
                .filter(|a| a.reviewer_id == actor.actor_id)
                .cloned()
                .collect(),
            Viewer::Author => Vec::new(),
        };

        Ok(ManuscriptView {
            id: manuscript.id,
            author_id: manuscript.author_id,
            title: manuscript.title.clone(),
            abstract_text: manuscript.abstract_text.clone(),
            status: manuscript.status,
            current_revision: manuscript.current_revision,
            version: manuscript.version,
            review_closed_at: manuscript.review_closed_at,
            decided_at: manuscript.decided_at,
            created_at: manuscript.created_at,
            updated_at: manuscript.updated_at,
            revisions,
            reviews: self.filter_reviews(viewer, actor, record),
            plagiarism: match viewer {
                Viewer::Editor => manuscript.plagiarism,
                _ => None,
            },
            assignments,
            assigned_reviewers: (viewer == Viewer::Editor).then(|| record.assigned_reviewers()),
        })
    }

    /// Reviews the actor wrote on this manuscript, identity included
    pub fn own_reviews(&self, actor: &ActorContext, record: &ManuscriptRecord) -> Vec<ReviewView> {
        record
            .reviews
            .iter()
            .filter(|review| review.reviewer_id == actor.actor_id)
            .map(|review| review_view(review, true))
            .collect()
    }

    /// The actor's pending assignment on the current revision, if the cycle
    /// still accepts reviews
    pub fn pending_assignment(
        &self,
        actor: &ActorContext,
        record: &ManuscriptRecord,
        now: DateTime<Utc>,
    ) -> Option<PendingAssignment> {
        let manuscript = &record.manuscript;
        if manuscript.status != ManuscriptStatus::UnderReview || manuscript.review_closed_at.is_some() {
            return None;
        }

        record
            .assignment(manuscript.current_revision, actor.actor_id)
            .filter(|a| a.status == AssignmentStatus::Pending)
            .map(|a| PendingAssignment {
                manuscript_id: manuscript.id,
                title: manuscript.title.clone(),
                revision_number: a.revision_number,
                assigned_at: a.assigned_at,
                due_at: a.due_at,
                overdue: a.is_overdue(now),
            })
    }
}

fn review_view(review: &Review, reveal: bool) -> ReviewView {
    ReviewView {
        id: review.id,
        manuscript_id: review.manuscript_id,
        revision_number: review.revision_number,
        reviewer_id: reveal.then_some(review.reviewer_id),
        ratings: review.ratings,
        comments: review.comments.clone(),
        submitted_at: review.submitted_at,
    }
}

fn revision_view(revision: &Revision, record: &ManuscriptRecord) -> RevisionView {
    RevisionView {
        number: revision.number,
        abstract_text: revision.abstract_text.clone(),
        content: revision.content.clone(),
        changes_summary: revision.changes_summary.clone(),
        content_digest: revision.content_digest.clone(),
        status: revision.cycle_status(&record.manuscript),
        submitted_at: revision.submitted_at,
    }
}
