//! Postgres-backed manuscript store
//!
//! Every commit runs in one transaction guarded by a version check on the
//! manuscript row, so two writers racing on the same manuscript cannot both
//! succeed. Snapshot reads use a repeatable-read, read-only transaction.

use crate::db::models::*;
use crate::db::DbPool;
use crate::domain::{AssignmentStatus, Manuscript, ManuscriptRecord, Revision};
use crate::errors::{AppError, Result};
use crate::store::{Commit, ListQuery, ListScope, ManuscriptStore, Mutation};
use async_trait::async_trait;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    AccessMode, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IsolationLevel, QueryFilter, QueryOrder, SqlErr, TransactionTrait,
};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Repository for manuscript data access
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }
}

/// Map a unique-constraint violation to a domain conflict
fn on_unique_violation(err: DbErr, conflict: AppError) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => conflict,
        _ => err.into(),
    }
}

async fn fetch_children<C: ConnectionTrait>(conn: &C, row: ManuscriptRow) -> Result<ManuscriptRecord> {
    let id = row.id;
    let manuscript = row.into_domain()?;

    let revisions = RevisionEntity::find()
        .filter(RevisionColumn::ManuscriptId.eq(id))
        .order_by_asc(RevisionColumn::Number)
        .all(conn)
        .await?
        .into_iter()
        .map(Revision::from)
        .collect();

    let assignments = AssignmentEntity::find()
        .filter(AssignmentColumn::ManuscriptId.eq(id))
        .order_by_asc(AssignmentColumn::AssignedAt)
        .order_by_asc(AssignmentColumn::ReviewerId)
        .all(conn)
        .await?
        .into_iter()
        .map(AssignmentRow::into_domain)
        .collect::<Result<Vec<_>>>()?;

    let reviews = ReviewEntity::find()
        .filter(ReviewColumn::ManuscriptId.eq(id))
        .order_by_asc(ReviewColumn::SubmittedAt)
        .order_by_asc(ReviewColumn::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(ReviewRow::into_domain)
        .collect::<Result<Vec<_>>>()?;

    Ok(ManuscriptRecord {
        manuscript,
        revisions,
        assignments,
        reviews,
    })
}

async fn fetch_record<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<ManuscriptRecord> {
    let row = ManuscriptEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::manuscript_not_found(id))?;

    fetch_children(conn, row).await
}

/// WHERE clause for a listing; `None` when nothing can match
fn list_condition(query: &ListQuery) -> Option<Condition> {
    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(ManuscriptColumn::Status.eq(status.as_str()));
    }

    match query.scope {
        ListScope::All => Some(condition),
        ListScope::Involving {
            actor_id,
            as_author,
            as_reviewer,
        } => {
            if !as_author && !as_reviewer {
                return None;
            }

            let mut involving = Condition::any();
            if as_author {
                involving = involving.add(ManuscriptColumn::AuthorId.eq(actor_id));
            }
            if as_reviewer {
                let assigned = Query::select()
                    .column(AssignmentColumn::ManuscriptId)
                    .from(AssignmentEntity)
                    .and_where(AssignmentColumn::ReviewerId.eq(actor_id))
                    .and_where(AssignmentColumn::Status.ne(AssignmentStatus::Declined.as_str()))
                    .to_owned();
                involving = involving.add(ManuscriptColumn::Id.in_subquery(assigned));
            }
            Some(condition.add(involving))
        }
    }
}

async fn apply_mutation<C: ConnectionTrait>(conn: &C, id: Uuid, commit: &Commit) -> Result<()> {
    match &commit.mutation {
        Mutation::None => {}
        Mutation::Assign(assignment) => {
            AssignmentEntity::insert(AssignmentActiveModel::from(assignment))
                .exec_without_returning(conn)
                .await
                .map_err(|e| {
                    on_unique_violation(
                        e,
                        AppError::DuplicateAssignment {
                            reviewer_id: assignment.reviewer_id,
                            revision_number: assignment.revision_number,
                        },
                    )
                })?;
        }
        Mutation::UpdateAssignment(assignment) => {
            let updated = AssignmentEntity::update_many()
                .col_expr(
                    AssignmentColumn::Status,
                    Expr::value(assignment.status.as_str()),
                )
                .col_expr(
                    AssignmentColumn::DueAt,
                    Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(assignment.due_at)),
                )
                .col_expr(
                    AssignmentColumn::UpdatedAt,
                    Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(assignment.updated_at)),
                )
                .filter(AssignmentColumn::ManuscriptId.eq(id))
                .filter(AssignmentColumn::RevisionNumber.eq(assignment.revision_number as i32))
                .filter(AssignmentColumn::ReviewerId.eq(assignment.reviewer_id))
                .exec(conn)
                .await?;

            if updated.rows_affected == 0 {
                return Err(AppError::NotFound {
                    resource: "assignment",
                    id: format!("{}/{}", assignment.revision_number, assignment.reviewer_id),
                });
            }
        }
        Mutation::RecordReview(review) => {
            let revision = RevisionEntity::find()
                .filter(RevisionColumn::ManuscriptId.eq(id))
                .filter(RevisionColumn::Number.eq(review.revision_number as i32))
                .one(conn)
                .await?;
            if revision.is_none() {
                return Err(AppError::NotFound {
                    resource: "revision",
                    id: format!("{}/{}", id, review.revision_number),
                });
            }

            ReviewEntity::insert(ReviewActiveModel::from(review))
                .exec_without_returning(conn)
                .await
                .map_err(|e| {
                    on_unique_violation(
                        e,
                        AppError::DuplicateReview {
                            reviewer_id: review.reviewer_id,
                            revision_number: review.revision_number,
                        },
                    )
                })?;

            AssignmentEntity::update_many()
                .col_expr(
                    AssignmentColumn::Status,
                    Expr::value(AssignmentStatus::Completed.as_str()),
                )
                .col_expr(
                    AssignmentColumn::UpdatedAt,
                    Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(review.submitted_at)),
                )
                .filter(AssignmentColumn::ManuscriptId.eq(id))
                .filter(AssignmentColumn::RevisionNumber.eq(review.revision_number as i32))
                .filter(AssignmentColumn::ReviewerId.eq(review.reviewer_id))
                .exec(conn)
                .await?;
        }
        Mutation::AppendRevision(revision) => {
            let last = RevisionEntity::find()
                .filter(RevisionColumn::ManuscriptId.eq(id))
                .order_by_desc(RevisionColumn::Number)
                .one(conn)
                .await?;
            let next = last.map(|r| r.number as u32 + 1).unwrap_or(1);

            if revision.number != next || commit.manuscript.current_revision != next {
                return Err(AppError::ConcurrentModification { manuscript_id: id });
            }

            RevisionEntity::insert(RevisionActiveModel::from(revision))
                .exec_without_returning(conn)
                .await
                .map_err(|e| on_unique_violation(e, AppError::ConcurrentModification { manuscript_id: id }))?;
        }
    }

    Ok(())
}

#[async_trait]
impl ManuscriptStore for Repository {
    #[instrument(skip_all, fields(manuscript_id = %manuscript.id))]
    async fn insert(&self, manuscript: &Manuscript, first_revision: &Revision) -> Result<()> {
        if first_revision.number != 1 || manuscript.current_revision != 1 {
            return Err(AppError::Internal {
                message: "new manuscripts start at revision 1".to_string(),
            });
        }

        let txn = self.write_conn().begin().await?;

        ManuscriptEntity::insert(ManuscriptActiveModel::from(manuscript))
            .exec_without_returning(&txn)
            .await
            .map_err(|e| {
                on_unique_violation(
                    e,
                    AppError::ConcurrentModification {
                        manuscript_id: manuscript.id,
                    },
                )
            })?;

        RevisionEntity::insert(RevisionActiveModel::from(first_revision))
            .exec_without_returning(&txn)
            .await?;

        txn.commit().await?;
        debug!("Manuscript inserted");
        Ok(())
    }

    /// Loads from the primary so a following commit sees the latest version
    async fn load(&self, id: Uuid) -> Result<ManuscriptRecord> {
        let txn = self
            .write_conn()
            .begin_with_config(Some(IsolationLevel::RepeatableRead), Some(AccessMode::ReadOnly))
            .await?;

        let record = fetch_record(&txn, id).await?;
        txn.commit().await?;
        Ok(record)
    }

    async fn list(&self, query: ListQuery) -> Result<Vec<ManuscriptRecord>> {
        let Some(condition) = list_condition(&query) else {
            return Ok(Vec::new());
        };

        let txn = self
            .read_conn()
            .begin_with_config(Some(IsolationLevel::RepeatableRead), Some(AccessMode::ReadOnly))
            .await?;

        let rows = ManuscriptEntity::find()
            .filter(condition)
            .order_by_desc(ManuscriptColumn::CreatedAt)
            .order_by_desc(ManuscriptColumn::Id)
            .all(&txn)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(fetch_children(&txn, row).await?);
        }

        txn.commit().await?;
        Ok(records)
    }

    #[instrument(skip_all, fields(manuscript_id = %commit.manuscript.id, expected_version = commit.expected_version))]
    async fn commit(&self, commit: Commit) -> Result<ManuscriptRecord> {
        let id = commit.manuscript.id;

        if commit.manuscript.version != commit.expected_version + 1 {
            return Err(AppError::Internal {
                message: format!(
                    "commit for {} must bump version to {}",
                    id,
                    commit.expected_version + 1
                ),
            });
        }

        let txn = self.write_conn().begin().await?;

        let updated = ManuscriptEntity::update_many()
            .set(ManuscriptActiveModel::from(&commit.manuscript))
            .filter(ManuscriptColumn::Id.eq(id))
            .filter(ManuscriptColumn::Version.eq(commit.expected_version))
            .filter(ManuscriptColumn::CurrentRevision.lte(commit.manuscript.current_revision as i32))
            .exec(&txn)
            .await?;

        if updated.rows_affected == 0 {
            let exists = ManuscriptEntity::find_by_id(id).one(&txn).await?.is_some();
            return Err(if exists {
                AppError::ConcurrentModification { manuscript_id: id }
            } else {
                AppError::manuscript_not_found(id)
            });
        }

        // Dropping the transaction on error rolls the header update back
        apply_mutation(&txn, id, &commit).await?;

        let record = fetch_record(&txn, id).await?;
        txn.commit().await?;

        debug!(version = record.manuscript.version, "Commit applied");
        Ok(record)
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}
