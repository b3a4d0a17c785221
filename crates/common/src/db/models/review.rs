//! Review entity (append-only, unique per revision and reviewer)

use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

use crate::domain::{Ratings, Review};
use crate::errors::AppError;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reviews")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub manuscript_id: Uuid,

    pub revision_number: i32,

    pub reviewer_id: Uuid,

    pub overall_rating: i16,

    pub technical_quality_rating: i16,

    pub clarity_rating: i16,

    pub originality_rating: i16,

    pub significance_rating: i16,

    #[sea_orm(column_type = "Text")]
    pub comments: String,

    pub submitted_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::manuscript::Entity",
        from = "Column::ManuscriptId",
        to = "super::manuscript::Column::Id",
        on_delete = "Restrict"
    )]
    Manuscript,
}

impl Related<super::manuscript::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Manuscript.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

fn rating(id: Uuid, value: i16) -> crate::errors::Result<u8> {
    u8::try_from(value)
        .ok()
        .filter(|v| (1..=10).contains(v))
        .ok_or_else(|| AppError::Internal {
            message: format!("review {} holds out-of-range rating {}", id, value),
        })
}

impl Model {
    pub fn into_domain(self) -> crate::errors::Result<Review> {
        let ratings = Ratings {
            overall: rating(self.id, self.overall_rating)?,
            technical_quality: rating(self.id, self.technical_quality_rating)?,
            clarity: rating(self.id, self.clarity_rating)?,
            originality: rating(self.id, self.originality_rating)?,
            significance: rating(self.id, self.significance_rating)?,
        };

        Ok(Review {
            id: self.id,
            manuscript_id: self.manuscript_id,
            revision_number: self.revision_number.max(0) as u32,
            reviewer_id: self.reviewer_id,
            ratings,
            comments: self.comments,
            submitted_at: self.submitted_at.to_utc(),
        })
    }
}

impl From<&Review> for ActiveModel {
    fn from(r: &Review) -> Self {
        ActiveModel {
            id: Set(r.id),
            manuscript_id: Set(r.manuscript_id),
            revision_number: Set(r.revision_number as i32),
            reviewer_id: Set(r.reviewer_id),
            overall_rating: Set(r.ratings.overall.into()),
            technical_quality_rating: Set(r.ratings.technical_quality.into()),
            clarity_rating: Set(r.ratings.clarity.into()),
            originality_rating: Set(r.ratings.originality.into()),
            significance_rating: Set(r.ratings.significance.into()),
            comments: Set(r.comments.clone()),
            submitted_at: Set(r.submitted_at.into()),
        }
    }
}
