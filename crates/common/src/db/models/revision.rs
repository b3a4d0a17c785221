//! Revision entity (append-only)

use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

use crate::domain::Revision;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "revisions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub manuscript_id: Uuid,

    /// Unique per manuscript, contiguous from 1
    pub number: i32,

    #[sea_orm(column_type = "Text")]
    pub abstract_text: String,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub changes_summary: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub content_digest: String,

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

impl From<Model> for Revision {
    fn from(model: Model) -> Self {
        Revision {
            id: model.id,
            manuscript_id: model.manuscript_id,
            number: model.number.max(0) as u32,
            abstract_text: model.abstract_text,
            content: model.content,
            changes_summary: model.changes_summary,
            content_digest: model.content_digest,
            submitted_at: model.submitted_at.to_utc(),
        }
    }
}

impl From<&Revision> for ActiveModel {
    fn from(r: &Revision) -> Self {
        ActiveModel {
            id: Set(r.id),
            manuscript_id: Set(r.manuscript_id),
            number: Set(r.number as i32),
            abstract_text: Set(r.abstract_text.clone()),
            content: Set(r.content.clone()),
            changes_summary: Set(r.changes_summary.clone()),
            content_digest: Set(r.content_digest.clone()),
            submitted_at: Set(r.submitted_at.into()),
        }
    }
}
