//! Manuscripts, revisions, and the aggregate record the stores persist

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::review::{Assignment, Review};
use super::status::ManuscriptStatus;
use crate::errors::{AppError, Result};

/// Output of the external plagiarism checker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlagiarismResult {
    pub checked: bool,
    /// Similarity score in [0, 1]
    pub score: f64,
}

impl PlagiarismResult {
    pub fn new(checked: bool, score: f64) -> Result<Self> {
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(AppError::validation(
                "score",
                format!("Plagiarism score must be within [0, 1], got {}", score),
            ));
        }
        Ok(Self { checked, score })
    }

    pub fn exceeds(&self, threshold: f64) -> bool {
        self.score > threshold
    }
}

/// Header row of a manuscript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manuscript {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub abstract_text: String,
    pub status: ManuscriptStatus,
    pub current_revision: u32,
    pub plagiarism: Option<PlagiarismResult>,
    /// Set when the editor closed the current review cycle
    pub review_closed_at: Option<DateTime<Utc>>,
    /// Set on the transition into a terminal state
    pub decided_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token, bumped by every commit
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One immutable version of a manuscript's content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub id: Uuid,
    pub manuscript_id: Uuid,
    pub number: u32,
    pub abstract_text: String,
    pub content: String,
    pub changes_summary: Option<String>,
    /// SHA-256 of `content`, hex encoded
    pub content_digest: String,
    pub submitted_at: DateTime<Utc>,
}

impl Revision {
    /// Review-cycle status of this revision. Superseded revisions always
    /// ended with a revision request.
    pub fn cycle_status(&self, manuscript: &Manuscript) -> ManuscriptStatus {
        if self.number < manuscript.current_revision {
            ManuscriptStatus::RevisionRequested
        } else {
            manuscript.status
        }
    }
}

/// Hex SHA-256 digest of revision content
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Author input for a new manuscript
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ManuscriptDraft {
    #[validate(length(min = 1, max = 1000), custom(function = "not_blank"))]
    pub title: String,

    #[validate(length(min = 1, max = 50000), custom(function = "not_blank"))]
    #[serde(rename = "abstract")]
    pub abstract_text: String,

    #[validate(custom(function = "not_blank"))]
    pub content: String,
}

/// Author input for revision N+1
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RevisionDraft {
    #[validate(custom(function = "not_blank"))]
    pub content: String,

    #[validate(length(max = 20000), custom(function = "not_blank"))]
    pub changes_summary: String,

    /// Replaces the abstract when present
    #[validate(length(min = 1, max = 50000), custom(function = "not_blank"))]
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
}

/// Consistent snapshot of a manuscript and everything it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManuscriptRecord {
    pub manuscript: Manuscript,
    /// Ordered by revision number
    pub revisions: Vec<Revision>,
    pub assignments: Vec<Assignment>,
    pub reviews: Vec<Review>,
}

impl ManuscriptRecord {
    pub fn id(&self) -> Uuid {
        self.manuscript.id
    }

    pub fn revision(&self, number: u32) -> Option<&Revision> {
        self.revisions.iter().find(|r| r.number == number)
    }

    pub fn current_revision(&self) -> Option<&Revision> {
        self.revision(self.manuscript.current_revision)
    }

    pub fn reviews_for(&self, revision_number: u32) -> impl Iterator<Item = &Review> {
        self.reviews
            .iter()
            .filter(move |r| r.revision_number == revision_number)
    }

    pub fn assignments_for(&self, revision_number: u32) -> impl Iterator<Item = &Assignment> {
        self.assignments
            .iter()
            .filter(move |a| a.revision_number == revision_number)
    }

    /// Non-declined reviewers on the current revision
    pub fn assigned_reviewers(&self) -> BTreeSet<Uuid> {
        self.assignments_for(self.manuscript.current_revision)
            .filter(|a| a.is_active())
            .map(|a| a.reviewer_id)
            .collect()
    }

    pub fn assignment(&self, revision_number: u32, reviewer_id: Uuid) -> Option<&Assignment> {
        self.assignments_for(revision_number)
            .find(|a| a.reviewer_id == reviewer_id)
    }

    pub fn has_review(&self, revision_number: u32, reviewer_id: Uuid) -> bool {
        self.reviews_for(revision_number)
            .any(|r| r.reviewer_id == reviewer_id)
    }

    /// Whether the reviewer holds a non-declined assignment on any revision
    pub fn involves_reviewer(&self, reviewer_id: Uuid) -> bool {
        self.assignments
            .iter()
            .any(|a| a.reviewer_id == reviewer_id && a.is_active())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plagiarism_score_bounds() {
        assert!(PlagiarismResult::new(true, 0.0).is_ok());
        assert!(PlagiarismResult::new(true, 1.0).is_ok());
        assert!(PlagiarismResult::new(true, 1.5).is_err());
        assert!(PlagiarismResult::new(true, -0.1).is_err());
        assert!(PlagiarismResult::new(true, f64::NAN).is_err());
    }

    #[test]
    fn test_plagiarism_threshold_is_exclusive() {
        let result = PlagiarismResult::new(true, 0.3).unwrap();
        assert!(!result.exceeds(0.3));
        assert!(PlagiarismResult::new(true, 0.5).unwrap().exceeds(0.3));
    }

    #[test]
    fn test_content_digest_is_stable() {
        let a = content_digest("Y");
        assert_eq!(a, content_digest("Y"));
        assert_ne!(a, content_digest("Y "));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_draft_validation() {
        let draft = ManuscriptDraft {
            title: "X".into(),
            abstract_text: "A".into(),
            content: "Y".into(),
        };
        assert!(draft.validate().is_ok());

        let blank = ManuscriptDraft {
            title: "   ".into(),
            ..draft
        };
        let errors = blank.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
    }

    #[test]
    fn test_revision_draft_requires_changes_summary() {
        let draft = RevisionDraft {
            content: "new body".into(),
            changes_summary: " ".into(),
            abstract_text: None,
        };
        let errors = draft.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("changes_summary"));
    }
}
