//! Reviews, ratings, and reviewer assignments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Rating criteria every review scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Overall,
    TechnicalQuality,
    Clarity,
    Originality,
    Significance,
}

impl Criterion {
    pub const ALL: [Criterion; 5] = [
        Criterion::Overall,
        Criterion::TechnicalQuality,
        Criterion::Clarity,
        Criterion::Originality,
        Criterion::Significance,
    ];
}

/// Five integer ratings on a 1-10 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Ratings {
    #[validate(range(min = 1, max = 10))]
    pub overall: u8,

    #[validate(range(min = 1, max = 10))]
    pub technical_quality: u8,

    #[validate(range(min = 1, max = 10))]
    pub clarity: u8,

    #[validate(range(min = 1, max = 10))]
    pub originality: u8,

    #[validate(range(min = 1, max = 10))]
    pub significance: u8,
}

impl Ratings {
    /// Same rating for every criterion
    pub fn uniform(value: u8) -> Self {
        Self {
            overall: value,
            technical_quality: value,
            clarity: value,
            originality: value,
            significance: value,
        }
    }

    pub fn get(&self, criterion: Criterion) -> u8 {
        match criterion {
            Criterion::Overall => self.overall,
            Criterion::TechnicalQuality => self.technical_quality,
            Criterion::Clarity => self.clarity,
            Criterion::Originality => self.originality,
            Criterion::Significance => self.significance,
        }
    }
}

/// A reviewer's immutable assessment of one revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub manuscript_id: Uuid,
    pub revision_number: u32,
    pub reviewer_id: Uuid,
    pub ratings: Ratings,
    pub comments: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Completed,
    Declined,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Declined => "declined",
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AssignmentStatus::Pending),
            "completed" => Ok(AssignmentStatus::Completed),
            "declined" => Ok(AssignmentStatus::Declined),
            other => Err(format!("unknown assignment status '{}'", other)),
        }
    }
}

/// Reviewer attached to one revision of a manuscript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub manuscript_id: Uuid,
    pub revision_number: u32,
    pub reviewer_id: Uuid,
    pub status: AssignmentStatus,
    pub due_at: DateTime<Utc>,
    pub assigned_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    /// Declined assignments no longer count towards the assigned set
    pub fn is_active(&self) -> bool {
        self.status != AssignmentStatus::Declined
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == AssignmentStatus::Pending && now > self.due_at
    }
}
