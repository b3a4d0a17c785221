//! Manuscript state machine
//!
//! ```text
//! Submitted → UnderReview → Accepted
//!     ↑            ↓      ↘ Rejected
//!     └── RevisionRequested
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Workflow status of a manuscript, tracking its active revision's cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManuscriptStatus {
    /// Revision received, no reviewer assigned yet
    Submitted,
    /// At least one reviewer assigned for the current revision
    UnderReview,
    /// Editor asked the author for a new revision
    RevisionRequested,
    /// Terminal
    Accepted,
    /// Terminal
    Rejected,
}

impl ManuscriptStatus {
    pub const ALL: [ManuscriptStatus; 5] = [
        ManuscriptStatus::Submitted,
        ManuscriptStatus::UnderReview,
        ManuscriptStatus::RevisionRequested,
        ManuscriptStatus::Accepted,
        ManuscriptStatus::Rejected,
    ];

    /// Check if a state transition is valid
    pub fn can_transition_to(&self, target: ManuscriptStatus) -> bool {
        self.valid_transitions().contains(&target)
    }

    /// Get valid next states from current state
    pub fn valid_transitions(&self) -> Vec<ManuscriptStatus> {
        match self {
            ManuscriptStatus::Submitted => vec![ManuscriptStatus::UnderReview],
            ManuscriptStatus::UnderReview => vec![
                ManuscriptStatus::RevisionRequested,
                ManuscriptStatus::Accepted,
                ManuscriptStatus::Rejected,
            ],
            ManuscriptStatus::RevisionRequested => vec![ManuscriptStatus::Submitted],
            ManuscriptStatus::Accepted | ManuscriptStatus::Rejected => vec![],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ManuscriptStatus::Accepted | ManuscriptStatus::Rejected)
    }

    /// Whether the cycle for the current revision has an editorial outcome
    pub fn has_outcome(&self) -> bool {
        matches!(
            self,
            ManuscriptStatus::RevisionRequested | ManuscriptStatus::Accepted | ManuscriptStatus::Rejected
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ManuscriptStatus::Submitted => "submitted",
            ManuscriptStatus::UnderReview => "under_review",
            ManuscriptStatus::RevisionRequested => "revision_requested",
            ManuscriptStatus::Accepted => "accepted",
            ManuscriptStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ManuscriptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ManuscriptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ManuscriptStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown manuscript status '{}'", s))
    }
}

/// Editorial outcome for a manuscript under review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Reject,
    RequestRevision,
}

impl Decision {
    pub fn target_status(&self) -> ManuscriptStatus {
        match self {
            Decision::Accept => ManuscriptStatus::Accepted,
            Decision::Reject => ManuscriptStatus::Rejected,
            Decision::RequestRevision => ManuscriptStatus::RevisionRequested,
        }
    }
}
