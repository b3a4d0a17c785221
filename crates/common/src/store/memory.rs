//! In-process manuscript store
//!
//! Backs tests and single-node development deployments. A commit is
//! validated against a copy of the record and swapped in under the
//! write lock, so readers only ever see whole commits.

use super::{Commit, ListQuery, ManuscriptStore, Mutation};
use crate::domain::{AssignmentStatus, Manuscript, ManuscriptRecord, Revision};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<Uuid, ManuscriptRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

/// Storage-boundary checks, applied to a scratch copy of the record
fn apply(record: &mut ManuscriptRecord, commit: Commit) -> Result<()> {
    let id = record.id();
    let stored_version = record.manuscript.version;

    if stored_version != commit.expected_version {
        return Err(AppError::ConcurrentModification { manuscript_id: id });
    }
    if commit.manuscript.version != stored_version + 1 {
        return Err(AppError::Internal {
            message: format!("commit for {} must bump version to {}", id, stored_version + 1),
        });
    }
    if commit.manuscript.current_revision < record.manuscript.current_revision {
        return Err(AppError::Internal {
            message: format!("commit for {} moves current revision backwards", id),
        });
    }

    match commit.mutation {
        Mutation::None => {}
        Mutation::Assign(assignment) => {
            if record
                .assignment(assignment.revision_number, assignment.reviewer_id)
                .is_some()
            {
                return Err(AppError::DuplicateAssignment {
                    reviewer_id: assignment.reviewer_id,
                    revision_number: assignment.revision_number,
                });
            }
            record.assignments.push(assignment);
        }
        Mutation::UpdateAssignment(assignment) => {
            let existing = record
                .assignments
                .iter_mut()
                .find(|a| {
                    a.revision_number == assignment.revision_number
                        && a.reviewer_id == assignment.reviewer_id
                })
                .ok_or_else(|| AppError::NotFound {
                    resource: "assignment",
                    id: format!("{}/{}", assignment.revision_number, assignment.reviewer_id),
                })?;
            *existing = assignment;
        }
        Mutation::RecordReview(review) => {
            if record.revision(review.revision_number).is_none() {
                return Err(AppError::NotFound {
                    resource: "revision",
                    id: format!("{}/{}", id, review.revision_number),
                });
            }
            if record.has_review(review.revision_number, review.reviewer_id) {
                return Err(AppError::DuplicateReview {
                    reviewer_id: review.reviewer_id,
                    revision_number: review.revision_number,
                });
            }
            if let Some(assignment) = record.assignments.iter_mut().find(|a| {
                a.revision_number == review.revision_number && a.reviewer_id == review.reviewer_id
            }) {
                assignment.status = AssignmentStatus::Completed;
                assignment.updated_at = review.submitted_at;
            }
            record.reviews.push(review);
        }
        Mutation::AppendRevision(revision) => {
            let next = record.revisions.last().map(|r| r.number + 1).unwrap_or(1);
            if revision.number != next || commit.manuscript.current_revision != next {
                return Err(AppError::ConcurrentModification { manuscript_id: id });
            }
            record.revisions.push(revision);
        }
    }

    record.manuscript = commit.manuscript;
    Ok(())
}

#[async_trait]
impl ManuscriptStore for InMemoryStore {
    async fn insert(&self, manuscript: &Manuscript, first_revision: &Revision) -> Result<()> {
        if first_revision.number != 1 || manuscript.current_revision != 1 {
            return Err(AppError::Internal {
                message: "new manuscripts start at revision 1".to_string(),
            });
        }

        let mut records = self.records.write().await;
        if records.contains_key(&manuscript.id) {
            return Err(AppError::ConcurrentModification {
                manuscript_id: manuscript.id,
            });
        }
        records.insert(
            manuscript.id,
            ManuscriptRecord {
                manuscript: manuscript.clone(),
                revisions: vec![first_revision.clone()],
                assignments: Vec::new(),
                reviews: Vec::new(),
            },
        );
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<ManuscriptRecord> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::manuscript_not_found(id))
    }

    async fn list(&self, query: ListQuery) -> Result<Vec<ManuscriptRecord>> {
        let records = self.records.read().await;
        let mut matching: Vec<ManuscriptRecord> = records
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.manuscript
                .created_at
                .cmp(&a.manuscript.created_at)
                .then_with(|| a.id().cmp(&b.id()))
        });
        Ok(matching)
    }

    async fn commit(&self, commit: Commit) -> Result<ManuscriptRecord> {
        let id = commit.manuscript.id;
        let mut records = self.records.write().await;
        let current = records
            .get(&id)
            .ok_or_else(|| AppError::manuscript_not_found(id))?;

        let mut next = current.clone();
        apply(&mut next, commit)?;
        records.insert(id, next.clone());
        Ok(next)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{content_digest, Assignment, AssignmentStatus, ManuscriptStatus, Ratings, Review};
    use crate::store::ListScope;
    use chrono::Utc;

    fn manuscript() -> (Manuscript, Revision) {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let manuscript = Manuscript {
            id,
            author_id: Uuid::new_v4(),
            title: "X".into(),
            abstract_text: "A".into(),
            status: ManuscriptStatus::Submitted,
            current_revision: 1,
            plagiarism: None,
            review_closed_at: None,
            decided_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let revision = Revision {
            id: Uuid::new_v4(),
            manuscript_id: id,
            number: 1,
            abstract_text: "A".into(),
            content: "Y".into(),
            changes_summary: None,
            content_digest: content_digest("Y"),
            submitted_at: now,
        };
        (manuscript, revision)
    }

    fn bumped(m: &Manuscript) -> Manuscript {
        Manuscript {
            version: m.version + 1,
            ..m.clone()
        }
    }

    fn review(manuscript_id: Uuid, reviewer_id: Uuid) -> Review {
        Review {
            id: Uuid::new_v4(),
            manuscript_id,
            revision_number: 1,
            reviewer_id,
            ratings: Ratings::uniform(8),
            comments: "solid".into(),
            submitted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_load_unknown_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.load(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { resource: "manuscript", .. }));
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected() {
        let store = InMemoryStore::new();
        let (m, r) = manuscript();
        store.insert(&m, &r).await.unwrap();

        store.commit(Commit::new(bumped(&m), 1, Mutation::None)).await.unwrap();
        let err = store
            .commit(Commit::new(bumped(&m), 1, Mutation::None))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::ConcurrentModification { manuscript_id: m.id });
        assert_eq!(store.load(m.id).await.unwrap().manuscript.version, 2);
    }

    #[tokio::test]
    async fn test_duplicate_review_leaves_record_unchanged() {
        let store = InMemoryStore::new();
        let (m, r) = manuscript();
        store.insert(&m, &r).await.unwrap();
        let reviewer = Uuid::new_v4();

        let after_first = store
            .commit(Commit::new(bumped(&m), 1, Mutation::RecordReview(review(m.id, reviewer))))
            .await
            .unwrap();

        let err = store
            .commit(Commit::new(
                bumped(&after_first.manuscript),
                2,
                Mutation::RecordReview(review(m.id, reviewer)),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateReview { revision_number: 1, .. }));
        assert_eq!(store.load(m.id).await.unwrap(), after_first);
    }

    #[tokio::test]
    async fn test_review_completes_assignment() {
        let store = InMemoryStore::new();
        let (m, r) = manuscript();
        store.insert(&m, &r).await.unwrap();
        let reviewer = Uuid::new_v4();
        let now = Utc::now();

        let assignment = Assignment {
            manuscript_id: m.id,
            revision_number: 1,
            reviewer_id: reviewer,
            status: AssignmentStatus::Pending,
            due_at: now,
            assigned_at: now,
            updated_at: now,
        };
        let record = store
            .commit(Commit::new(bumped(&m), 1, Mutation::Assign(assignment.clone())))
            .await
            .unwrap();

        let dup = store
            .commit(Commit::new(bumped(&record.manuscript), 2, Mutation::Assign(assignment)))
            .await
            .unwrap_err();
        assert!(matches!(dup, AppError::DuplicateAssignment { .. }));

        let record = store
            .commit(Commit::new(
                bumped(&record.manuscript),
                2,
                Mutation::RecordReview(review(m.id, reviewer)),
            ))
            .await
            .unwrap();
        assert_eq!(record.assignments[0].status, AssignmentStatus::Completed);
    }

    #[tokio::test]
    async fn test_revision_numbers_must_be_contiguous() {
        let store = InMemoryStore::new();
        let (m, r) = manuscript();
        store.insert(&m, &r).await.unwrap();

        let mut header = bumped(&m);
        header.current_revision = 3;
        let skipped = Revision {
            id: Uuid::new_v4(),
            number: 3,
            ..r.clone()
        };
        let err = store
            .commit(Commit::new(header, 1, Mutation::AppendRevision(skipped)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ConcurrentModification { .. }));

        let mut header = bumped(&m);
        header.current_revision = 2;
        let second = Revision {
            id: Uuid::new_v4(),
            number: 2,
            changes_summary: Some("addressed comments".into()),
            ..r
        };
        let record = store
            .commit(Commit::new(header, 1, Mutation::AppendRevision(second)))
            .await
            .unwrap();
        let numbers: Vec<u32> = record.revisions.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_list_scope_filters() {
        let store = InMemoryStore::new();
        let (m1, r1) = manuscript();
        let (m2, r2) = manuscript();
        store.insert(&m1, &r1).await.unwrap();
        store.insert(&m2, &r2).await.unwrap();

        assert_eq!(store.list(ListQuery::new(ListScope::All)).await.unwrap().len(), 2);

        let mine = store
            .list(ListQuery::new(ListScope::Involving {
                actor_id: m1.author_id,
                as_author: true,
                as_reviewer: true,
            }))
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id(), m1.id);

        let as_reviewer_only = store
            .list(ListQuery::new(ListScope::Involving {
                actor_id: m1.author_id,
                as_author: false,
                as_reviewer: true,
            }))
            .await
            .unwrap();
        assert!(as_reviewer_only.is_empty());
    }

    #[tokio::test]
    async fn test_list_status_filter() {
        let store = InMemoryStore::new();
        let (m1, r1) = manuscript();
        let (m2, r2) = manuscript();
        store.insert(&m1, &r1).await.unwrap();
        store.insert(&m2, &r2).await.unwrap();

        let mut rejected = bumped(&m2);
        rejected.status = ManuscriptStatus::Rejected;
        store.commit(Commit::new(rejected, 1, Mutation::None)).await.unwrap();

        let query = ListQuery::new(ListScope::All).with_status(Some(ManuscriptStatus::Rejected));
        let found = store.list(query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), m2.id);

        let query = ListQuery::new(ListScope::All).with_status(Some(ManuscriptStatus::Accepted));
        assert!(store.list(query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_declined_reviewer_is_not_involved() {
        let store = InMemoryStore::new();
        let (m, r) = manuscript();
        store.insert(&m, &r).await.unwrap();

        let reviewer_id = Uuid::new_v4();
        let now = Utc::now();
        let assignment = Assignment {
            manuscript_id: m.id,
            revision_number: 1,
            reviewer_id,
            status: AssignmentStatus::Pending,
            due_at: now + chrono::Duration::days(21),
            assigned_at: now,
            updated_at: now,
        };
        let m2 = bumped(&m);
        store
            .commit(Commit::new(m2.clone(), 1, Mutation::Assign(assignment.clone())))
            .await
            .unwrap();

        let as_reviewer = ListQuery::new(ListScope::Involving {
            actor_id: reviewer_id,
            as_author: false,
            as_reviewer: true,
        });
        assert_eq!(store.list(as_reviewer).await.unwrap().len(), 1);

        let declined = Assignment {
            status: AssignmentStatus::Declined,
            ..assignment
        };
        store
            .commit(Commit::new(bumped(&m2), 2, Mutation::UpdateAssignment(declined)))
            .await
            .unwrap();
        assert!(store.list(as_reviewer).await.unwrap().is_empty());
    }
}
