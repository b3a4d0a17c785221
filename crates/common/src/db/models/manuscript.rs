//! Manuscript entity (header row, one per manuscript)

use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

use crate::domain::{Manuscript, ManuscriptStatus, PlagiarismResult};
use crate::errors::AppError;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "manuscripts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub author_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub abstract_text: String,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub current_revision: i32,

    /// NULL until the plagiarism checker reports back
    pub plagiarism_checked: Option<bool>,

    pub plagiarism_score: Option<f64>,

    pub review_closed_at: Option<DateTimeWithTimeZone>,

    pub decided_at: Option<DateTimeWithTimeZone>,

    /// Compare-and-swap token for commits
    pub version: i64,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::revision::Entity")]
    Revisions,

    #[sea_orm(has_many = "super::assignment::Entity")]
    Assignments,

    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,
}

impl Related<super::revision::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Revisions.def()
    }
}

impl Related<super::assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignments.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn into_domain(self) -> crate::errors::Result<Manuscript> {
        let status = self
            .status
            .parse::<ManuscriptStatus>()
            .map_err(|message| AppError::Internal { message })?;

        let plagiarism = match (self.plagiarism_checked, self.plagiarism_score) {
            (Some(checked), Some(score)) => Some(PlagiarismResult { checked, score }),
            _ => None,
        };

        Ok(Manuscript {
            id: self.id,
            author_id: self.author_id,
            title: self.title,
            abstract_text: self.abstract_text,
            status,
            current_revision: u32::try_from(self.current_revision).map_err(|_| AppError::Internal {
                message: format!("manuscript {} has a negative revision number", self.id),
            })?,
            plagiarism,
            review_closed_at: self.review_closed_at.map(|t| t.to_utc()),
            decided_at: self.decided_at.map(|t| t.to_utc()),
            version: self.version,
            created_at: self.created_at.to_utc(),
            updated_at: self.updated_at.to_utc(),
        })
    }
}

impl From<&Manuscript> for ActiveModel {
    fn from(m: &Manuscript) -> Self {
        ActiveModel {
            id: Set(m.id),
            author_id: Set(m.author_id),
            title: Set(m.title.clone()),
            abstract_text: Set(m.abstract_text.clone()),
            status: Set(m.status.as_str().to_string()),
            current_revision: Set(m.current_revision as i32),
            plagiarism_checked: Set(m.plagiarism.map(|p| p.checked)),
            plagiarism_score: Set(m.plagiarism.map(|p| p.score)),
            review_closed_at: Set(m.review_closed_at.map(Into::into)),
            decided_at: Set(m.decided_at.map(Into::into)),
            version: Set(m.version),
            created_at: Set(m.created_at.into()),
            updated_at: Set(m.updated_at.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn row() -> Model {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap().fixed_offset();
        Model {
            id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            title: "Bounded staleness".into(),
            abstract_text: "A".into(),
            status: "under_review".into(),
            current_revision: 2,
            plagiarism_checked: Some(true),
            plagiarism_score: Some(0.12),
            review_closed_at: None,
            decided_at: None,
            version: 7,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_row_into_domain() {
        let manuscript = row().into_domain().unwrap();

        assert_eq!(manuscript.status, ManuscriptStatus::UnderReview);
        assert_eq!(manuscript.current_revision, 2);
        assert_eq!(manuscript.version, 7);
        assert_eq!(
            manuscript.plagiarism,
            Some(PlagiarismResult { checked: true, score: 0.12 })
        );
        assert_eq!(manuscript.created_at, Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_plagiarism_columns() {
        let pending = Model {
            plagiarism_checked: None,
            plagiarism_score: None,
            ..row()
        };
        assert_eq!(pending.into_domain().unwrap().plagiarism, None);

        let unchecked = Model {
            plagiarism_checked: Some(false),
            plagiarism_score: Some(0.0),
            ..row()
        };
        assert_eq!(
            unchecked.into_domain().unwrap().plagiarism,
            Some(PlagiarismResult { checked: false, score: 0.0 })
        );

        // A half-written verdict reads as pending
        let partial = Model {
            plagiarism_score: None,
            ..row()
        };
        assert_eq!(partial.into_domain().unwrap().plagiarism, None);
    }

    #[test]
    fn test_domain_into_active_model() {
        let manuscript = row().into_domain().unwrap();
        let active = ActiveModel::from(&manuscript);

        assert_eq!(active.status.unwrap(), "under_review");
        assert_eq!(active.current_revision.unwrap(), 2);
        assert_eq!(active.plagiarism_checked.unwrap(), Some(true));
        assert_eq!(active.plagiarism_score.unwrap(), Some(0.12));
        assert_eq!(active.version.unwrap(), 7);
        assert_eq!(active.review_closed_at.unwrap(), None);
    }

    #[test]
    fn test_corrupt_rows_are_internal_errors() {
        let bad_status = Model {
            status: "in_limbo".into(),
            ..row()
        };
        assert!(matches!(bad_status.into_domain(), Err(AppError::Internal { .. })));

        let bad_revision = Model {
            current_revision: -1,
            ..row()
        };
        assert!(matches!(bad_revision.into_domain(), Err(AppError::Internal { .. })));
    }
}
