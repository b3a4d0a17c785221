//! Reviewer assignment entity

use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

use crate::domain::{Assignment, AssignmentStatus};
use crate::errors::AppError;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assignments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub manuscript_id: Uuid,

    #[sea_orm(primary_key, auto_increment = false)]
    pub revision_number: i32,

    #[sea_orm(primary_key, auto_increment = false)]
    pub reviewer_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub due_at: DateTimeWithTimeZone,

    pub assigned_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
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

impl Model {
    pub fn into_domain(self) -> crate::errors::Result<Assignment> {
        let status = self
            .status
            .parse::<AssignmentStatus>()
            .map_err(|message| AppError::Internal { message })?;

        Ok(Assignment {
            manuscript_id: self.manuscript_id,
            revision_number: self.revision_number.max(0) as u32,
            reviewer_id: self.reviewer_id,
            status,
            due_at: self.due_at.to_utc(),
            assigned_at: self.assigned_at.to_utc(),
            updated_at: self.updated_at.to_utc(),
        })
    }
}

impl From<&Assignment> for ActiveModel {
    fn from(a: &Assignment) -> Self {
        ActiveModel {
            manuscript_id: Set(a.manuscript_id),
            revision_number: Set(a.revision_number as i32),
            reviewer_id: Set(a.reviewer_id),
            status: Set(a.status.as_str().to_string()),
            due_at: Set(a.due_at.into()),
            assigned_at: Set(a.assigned_at.into()),
            updated_at: Set(a.updated_at.into()),
        }
    }
}
