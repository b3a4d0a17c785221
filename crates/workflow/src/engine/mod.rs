//! Manuscript workflow engine
//!
//! Every mutation runs inside the manuscript's critical section:
//! load a snapshot, check guards, build the next state, and hand the
//! store a single atomic commit. Events go out only after the commit
//! lands. Each store call is bounded by the configured timeout.

use crate::aggregation::{aggregate, AggregateSummary, Thresholds};
use crate::events::{EventBus, WorkflowEvent};
use crate::locks::ManuscriptLocks;
use crate::visibility::{ManuscriptView, PendingAssignment, ReviewView, VisibilityPolicy};
use chrono::{DateTime, Utc};
use reviewforge_common::auth::{ActorContext, Role};
use reviewforge_common::config::WorkflowConfig;
use reviewforge_common::domain::{
    content_digest, Assignment, AssignmentStatus, Decision, Manuscript, ManuscriptDraft,
    ManuscriptRecord, ManuscriptStatus, PlagiarismResult, Ratings, Review, Revision, RevisionDraft,
};
use reviewforge_common::errors::{AppError, Result};
use reviewforge_common::metrics;
use reviewforge_common::store::{Commit, ListQuery, ListScope, ManuscriptStore, Mutation};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;


/// Editor choices when assigning a reviewer
#[derive(Debug, Clone, Default)]
pub struct AssignOptions {
    /// Assign even though the plagiarism score exceeds the threshold
    pub override_plagiarism: bool,
    /// Defaults to now plus the configured review window
    pub due_at: Option<DateTime<Utc>>,
}

/// Result of closing a review cycle
#[derive(Debug, Clone, Serialize)]
pub struct ClosedCycle {
    pub manuscript: ManuscriptView,
    pub summary: AggregateSummary,
}

pub struct WorkflowEngine {
    store: Arc<dyn ManuscriptStore>,
    config: WorkflowConfig,
    policy: VisibilityPolicy,
    locks: ManuscriptLocks,
    events: EventBus,
}

/// Next header for a commit: same manuscript, version bumped
fn reviewer_scope(actor: &ActorContext) -> ListScope {
    ListScope::Involving {
        actor_id: actor.actor_id,
        as_author: false,
        as_reviewer: true,
    }
}

fn next_version(manuscript: &Manuscript, now: DateTime<Utc>) -> Manuscript {
    let mut next = manuscript.clone();
    next.version += 1;
    next.updated_at = now;
    next
}

fn ensure_status(manuscript: &Manuscript, action: &'static str, allowed: &[ManuscriptStatus]) -> Result<()> {
    if allowed.contains(&manuscript.status) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition {
            action,
            status: manuscript.status,
        })
    }
}

/// Reviews and assignments are frozen once the editor closes the cycle
fn ensure_cycle_open(manuscript: &Manuscript, action: &'static str) -> Result<()> {
    if manuscript.review_closed_at.is_some() {
        Err(AppError::InvalidTransition {
            action,
            status: manuscript.status,
        })
    } else {
        Ok(())
    }
}

/// Time an operation and count its outcome
async fn observed<T, F>(operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let result = fut.await;
    let outcome = match &result {
        Ok(_) => "ok".to_string(),
        Err(e) => e.code().as_code().to_string(),
    };
    metrics::record_operation(operation, &outcome, started.elapsed().as_secs_f64());
    result
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn ManuscriptStore>, config: WorkflowConfig) -> Self {
        Self {
            locks: ManuscriptLocks::new(config.lock_timeout()),
            events: EventBus::new(config.event_buffer),
            policy: VisibilityPolicy::from(&config),
            store,
            config,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Receive events for every committed transition
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    /// Store reachability, for the readiness endpoint
    pub async fn ping(&self) -> Result<()> {
        self.bounded(self.store.ping()).await
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.config.store_timeout(), fut).await?
    }

    async fn load(&self, id: Uuid) -> Result<ManuscriptRecord> {
        self.bounded(self.store.load(id)).await
    }

    async fn commit(&self, previous: &Manuscript, next: Manuscript, mutation: Mutation) -> Result<ManuscriptRecord> {
        let commit = Commit::new(next, previous.version, mutation);
        let record = self.bounded(self.store.commit(commit)).await?;

        if previous.status != record.manuscript.status {
            metrics::record_transition(previous.status.as_str(), record.manuscript.status.as_str());
            self.events.publish(WorkflowEvent::StatusChanged {
                manuscript_id: record.id(),
                from: previous.status,
                to: record.manuscript.status,
                timestamp: record.manuscript.updated_at,
            });
        }
        Ok(record)
    }

    /// Author submits a new manuscript; it starts as revision 1 in `Submitted`
    #[instrument(skip_all, fields(actor_id = %actor.actor_id))]
    pub async fn submit(&self, draft: ManuscriptDraft, actor: &ActorContext) -> Result<ManuscriptView> {
        observed("submit", async {
            draft.validate()?;
            actor.require_role(Role::Author)?;

            let now = Utc::now();
            let id = Uuid::now_v7();
            let manuscript = Manuscript {
                id,
                author_id: actor.actor_id,
                title: draft.title.trim().to_string(),
                abstract_text: draft.abstract_text.clone(),
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
                abstract_text: draft.abstract_text,
                content_digest: content_digest(&draft.content),
                content: draft.content,
                changes_summary: None,
                submitted_at: now,
            };

            self.bounded(self.store.insert(&manuscript, &revision)).await?;
            info!(manuscript_id = %id, "Manuscript submitted");

            self.events.publish(WorkflowEvent::ManuscriptSubmitted {
                manuscript_id: id,
                author_id: actor.actor_id,
                timestamp: now,
            });

            let record = ManuscriptRecord {
                manuscript,
                revisions: vec![revision],
                assignments: Vec::new(),
                reviews: Vec::new(),
            };
            self.policy.view(actor, &record)
        })
        .await
    }

    /// Merge the external plagiarism checker's verdict for the current revision
    #[instrument(skip_all, fields(manuscript_id = %id, actor_id = %actor.actor_id))]
    pub async fn record_plagiarism_result(
        &self,
        id: Uuid,
        result: PlagiarismResult,
        actor: &ActorContext,
    ) -> Result<ManuscriptView> {
        observed("record_plagiarism_result", async {
            let result = PlagiarismResult::new(result.checked, result.score)?;
            actor.require_role(Role::Editor)?;

            let _guard = self.locks.acquire(id).await?;
            let record = self.load(id).await?;
            let current = &record.manuscript;
            if current.status.is_terminal() {
                return Err(AppError::InvalidTransition {
                    action: "record plagiarism result",
                    status: current.status,
                });
            }

            let now = Utc::now();
            let mut next = next_version(current, now);
            next.plagiarism = Some(result);

            let record = self.commit(current, next, Mutation::None).await?;
            info!(score = result.score, checked = result.checked, "Plagiarism result recorded");

            self.events.publish(WorkflowEvent::PlagiarismRecorded {
                manuscript_id: id,
                checked: result.checked,
                score: result.score,
                timestamp: now,
            });
            self.policy.view(actor, &record)
        })
        .await
    }

    /// Editor assigns a reviewer to the current revision.
    ///
    /// The first assignment of a cycle moves the manuscript to `UnderReview`.
    #[instrument(skip_all, fields(manuscript_id = %id, reviewer_id = %reviewer_id, actor_id = %actor.actor_id))]
    pub async fn assign_reviewer(
        &self,
        id: Uuid,
        reviewer_id: Uuid,
        options: AssignOptions,
        actor: &ActorContext,
    ) -> Result<ManuscriptView> {
        observed("assign_reviewer", async {
            actor.require_role(Role::Editor)?;
            let now = Utc::now();
            let due_at = options.due_at.unwrap_or(now + self.config.review_window());
            if due_at <= now {
                return Err(AppError::validation("due_at", "due date must be in the future"));
            }

            let _guard = self.locks.acquire(id).await?;
            let record = self.load(id).await?;
            let current = &record.manuscript;

            ensure_status(
                current,
                "assign reviewer",
                &[ManuscriptStatus::Submitted, ManuscriptStatus::UnderReview],
            )?;
            ensure_cycle_open(current, "assign reviewer")?;

            if reviewer_id == current.author_id {
                return Err(AppError::SelfReviewForbidden {
                    manuscript_id: id,
                    reviewer_id,
                });
            }

            match current.plagiarism {
                Some(result) if result.checked => {
                    let threshold = self.config.plagiarism_threshold;
                    if result.exceeds(threshold) {
                        if !options.override_plagiarism {
                            return Err(AppError::PlagiarismFlagged {
                                score: result.score,
                                threshold,
                            });
                        }
                        info!(score = result.score, "Plagiarism flag overridden by editor");
                    }
                }
                _ => return Err(AppError::PlagiarismPending { manuscript_id: id }),
            }

            let revision_number = current.current_revision;
            if record.assignment(revision_number, reviewer_id).is_some() {
                return Err(AppError::DuplicateAssignment {
                    reviewer_id,
                    revision_number,
                });
            }

            let mut next = next_version(current, now);
            if current.status == ManuscriptStatus::Submitted {
                next.status = ManuscriptStatus::UnderReview;
            }

            let assignment = Assignment {
                manuscript_id: id,
                revision_number,
                reviewer_id,
                status: AssignmentStatus::Pending,
                due_at,
                assigned_at: now,
                updated_at: now,
            };

            let record = self.commit(current, next, Mutation::Assign(assignment)).await?;
            info!(revision_number, "Reviewer assigned");

            self.events.publish(WorkflowEvent::ReviewerAssigned {
                manuscript_id: id,
                revision_number,
                reviewer_id,
                due_at,
                timestamp: now,
            });
            self.policy.view(actor, &record)
        })
        .await
    }

    /// Assigned reviewer turns down a pending assignment
    #[instrument(skip_all, fields(manuscript_id = %id, actor_id = %actor.actor_id))]
    pub async fn decline_assignment(&self, id: Uuid, actor: &ActorContext) -> Result<ManuscriptView> {
        observed("decline_assignment", async {
            actor.require_role(Role::Reviewer)?;

            let _guard = self.locks.acquire(id).await?;
            let record = self.load(id).await?;
            let current = &record.manuscript;

            ensure_status(current, "decline assignment", &[ManuscriptStatus::UnderReview])?;
            ensure_cycle_open(current, "decline assignment")?;

            let revision_number = current.current_revision;
            let assignment = record
                .assignment(revision_number, actor.actor_id)
                .ok_or_else(|| AppError::NotFound {
                    resource: "assignment",
                    id: format!("{}/{}", revision_number, actor.actor_id),
                })?;
            if assignment.status != AssignmentStatus::Pending {
                return Err(AppError::validation(
                    "assignment",
                    format!("assignment is already {}", assignment.status),
                ));
            }

            let now = Utc::now();
            let mut declined = assignment.clone();
            declined.status = AssignmentStatus::Declined;
            declined.updated_at = now;

            let next = next_version(current, now);
            let record = self
                .commit(current, next, Mutation::UpdateAssignment(declined))
                .await?;
            info!(revision_number, "Assignment declined");

            self.events.publish(WorkflowEvent::AssignmentDeclined {
                manuscript_id: id,
                revision_number,
                reviewer_id: actor.actor_id,
                timestamp: now,
            });
            self.policy.view(actor, &record)
        })
        .await
    }

    /// Assigned reviewer records a review for the current revision
    #[instrument(skip_all, fields(manuscript_id = %id, actor_id = %actor.actor_id))]
    pub async fn submit_review(
        &self,
        id: Uuid,
        ratings: Ratings,
        comments: String,
        actor: &ActorContext,
    ) -> Result<ManuscriptView> {
        observed("submit_review", async {
            ratings.validate()?;

            let _guard = self.locks.acquire(id).await?;
            let record = self.load(id).await?;
            let current = &record.manuscript;

            if current.author_id == actor.actor_id {
                return Err(AppError::SelfReviewForbidden {
                    manuscript_id: id,
                    reviewer_id: actor.actor_id,
                });
            }
            ensure_status(current, "submit review", &[ManuscriptStatus::UnderReview])?;
            ensure_cycle_open(current, "submit review")?;
            actor.require_role(Role::Reviewer)?;

            let revision_number = current.current_revision;
            let assigned = record
                .assignment(revision_number, actor.actor_id)
                .is_some_and(Assignment::is_active);
            if !assigned {
                return Err(AppError::Unauthorized {
                    message: format!(
                        "Actor {} is not assigned to revision {}",
                        actor.actor_id, revision_number
                    ),
                });
            }
            if record.has_review(revision_number, actor.actor_id) {
                return Err(AppError::DuplicateReview {
                    reviewer_id: actor.actor_id,
                    revision_number,
                });
            }

            let now = Utc::now();
            let review = Review {
                id: Uuid::now_v7(),
                manuscript_id: id,
                revision_number,
                reviewer_id: actor.actor_id,
                ratings,
                comments,
                submitted_at: now,
            };

            let next = next_version(current, now);
            let record = self.commit(current, next, Mutation::RecordReview(review)).await?;
            metrics::record_review_submitted();
            info!(revision_number, "Review submitted");

            self.events.publish(WorkflowEvent::ReviewSubmitted {
                manuscript_id: id,
                revision_number,
                reviewer_id: actor.actor_id,
                timestamp: now,
            });
            self.policy.view(actor, &record)
        })
        .await
    }

    /// Editor closes the current cycle and gets the aggregate
    #[instrument(skip_all, fields(manuscript_id = %id, actor_id = %actor.actor_id))]
    pub async fn close_review_cycle(&self, id: Uuid, actor: &ActorContext) -> Result<ClosedCycle> {
        observed("close_review_cycle", async {
            actor.require_role(Role::Editor)?;

            let _guard = self.locks.acquire(id).await?;
            let record = self.load(id).await?;
            let current = &record.manuscript;

            ensure_status(current, "close review cycle", &[ManuscriptStatus::UnderReview])?;
            ensure_cycle_open(current, "close review cycle")?;

            let revision_number = current.current_revision;
            let submitted = record.reviews_for(revision_number).count() as u32;
            let required = self.config.min_reviews_to_close;
            let summary = aggregate(
                revision_number,
                record.reviews_for(revision_number),
                Thresholds::from(&self.config),
            )
            .filter(|_| submitted >= required)
            .ok_or(AppError::InsufficientReviews { required, submitted })?;

            let now = Utc::now();
            let mut next = next_version(current, now);
            next.review_closed_at = Some(now);

            let record = self.commit(current, next, Mutation::None).await?;
            metrics::record_aggregation(summary.overall_mean, summary.recommendation.as_str());
            info!(
                revision_number,
                overall_mean = summary.overall_mean,
                recommendation = summary.recommendation.as_str(),
                "Review cycle closed"
            );

            self.events.publish(WorkflowEvent::ReviewCycleClosed {
                manuscript_id: id,
                revision_number,
                overall_mean: summary.overall_mean,
                recommendation: summary.recommendation,
                timestamp: now,
            });

            Ok(ClosedCycle {
                manuscript: self.policy.view(actor, &record)?,
                summary,
            })
        })
        .await
    }

    /// Editor decides the outcome of the current cycle
    #[instrument(skip_all, fields(manuscript_id = %id, actor_id = %actor.actor_id, decision = ?decision))]
    pub async fn decide(&self, id: Uuid, decision: Decision, actor: &ActorContext) -> Result<ManuscriptView> {
        observed("decide", async {
            actor.require_role(Role::Editor)?;

            let _guard = self.locks.acquire(id).await?;
            let record = self.load(id).await?;
            let current = &record.manuscript;

            let target = decision.target_status();
            if current.status != ManuscriptStatus::UnderReview || !current.status.can_transition_to(target) {
                return Err(AppError::InvalidTransition {
                    action: "decide",
                    status: current.status,
                });
            }

            let now = Utc::now();
            let mut next = next_version(current, now);
            next.status = target;
            if target.is_terminal() {
                next.decided_at = Some(now);
            }

            let record = self.commit(current, next, Mutation::None).await?;
            info!(status = %target, "Decision recorded");

            self.events.publish(WorkflowEvent::DecisionRecorded {
                manuscript_id: id,
                decision,
                timestamp: now,
            });
            self.policy.view(actor, &record)
        })
        .await
    }

    /// Original author answers a revision request with revision N+1
    #[instrument(skip_all, fields(manuscript_id = %id, actor_id = %actor.actor_id))]
    pub async fn submit_revision(
        &self,
        id: Uuid,
        draft: RevisionDraft,
        actor: &ActorContext,
    ) -> Result<ManuscriptView> {
        observed("submit_revision", async {
            draft.validate()?;
            actor.require_role(Role::Author)?;

            let _guard = self.locks.acquire(id).await?;
            let record = self.load(id).await?;
            let current = &record.manuscript;

            if current.author_id != actor.actor_id {
                return Err(AppError::Unauthorized {
                    message: format!("Only the author may revise manuscript {}", id),
                });
            }
            ensure_status(current, "submit revision", &[ManuscriptStatus::RevisionRequested])?;

            let now = Utc::now();
            let number = current.current_revision + 1;
            let abstract_text = draft
                .abstract_text
                .unwrap_or_else(|| current.abstract_text.clone());

            let revision = Revision {
                id: Uuid::new_v4(),
                manuscript_id: id,
                number,
                abstract_text: abstract_text.clone(),
                content_digest: content_digest(&draft.content),
                content: draft.content,
                changes_summary: Some(draft.changes_summary),
                submitted_at: now,
            };

            // New cycle: no reviewers, no plagiarism verdict yet
            let mut next = next_version(current, now);
            next.status = ManuscriptStatus::Submitted;
            next.current_revision = number;
            next.abstract_text = abstract_text;
            next.plagiarism = None;
            next.review_closed_at = None;

            let record = self
                .commit(current, next, Mutation::AppendRevision(revision))
                .await?;
            info!(revision_number = number, "Revision submitted");

            self.events.publish(WorkflowEvent::RevisionSubmitted {
                manuscript_id: id,
                revision_number: number,
                timestamp: now,
            });
            self.policy.view(actor, &record)
        })
        .await
    }

    /// Manuscripts the actor may see, newest first, optionally narrowed to
    /// one status
    pub async fn list_manuscripts(
        &self,
        actor: &ActorContext,
        status: Option<ManuscriptStatus>,
    ) -> Result<Vec<ManuscriptView>> {
        observed("list_manuscripts", async {
            let scope = if actor.is_editor() {
                ListScope::All
            } else {
                ListScope::Involving {
                    actor_id: actor.actor_id,
                    as_author: true,
                    as_reviewer: actor.has_role(Role::Reviewer),
                }
            };

            let query = ListQuery::new(scope).with_status(status);
            let records = self.bounded(self.store.list(query)).await?;
            Ok(records
                .iter()
                .filter_map(|record| self.policy.view(actor, record).ok())
                .collect())
        })
        .await
    }

    /// Reviewer's open assignments across manuscripts, earliest due first
    pub async fn pending_assignments(&self, actor: &ActorContext) -> Result<Vec<PendingAssignment>> {
        observed("pending_assignments", async {
            actor.require_role(Role::Reviewer)?;

            let query = ListQuery::new(reviewer_scope(actor))
                .with_status(Some(ManuscriptStatus::UnderReview));
            let records = self.bounded(self.store.list(query)).await?;

            let now = Utc::now();
            let mut pending: Vec<PendingAssignment> = records
                .iter()
                .filter_map(|record| self.policy.pending_assignment(actor, record, now))
                .collect();
            pending.sort_by(|a, b| a.due_at.cmp(&b.due_at).then_with(|| a.manuscript_id.cmp(&b.manuscript_id)));
            Ok(pending)
        })
        .await
    }

    /// Every review the actor wrote, across manuscripts
    pub async fn reviews_by_reviewer(&self, actor: &ActorContext) -> Result<Vec<ReviewView>> {
        observed("reviews_by_reviewer", async {
            actor.require_role(Role::Reviewer)?;

            let records = self
                .bounded(self.store.list(ListQuery::new(reviewer_scope(actor))))
                .await?;
            Ok(records
                .iter()
                .flat_map(|record| self.policy.own_reviews(actor, record))
                .collect())
        })
        .await
    }

    pub async fn get_manuscript(&self, id: Uuid, actor: &ActorContext) -> Result<ManuscriptView> {
        observed("get_manuscript", async {
            let record = self.load(id).await?;
            self.policy.view(actor, &record)
        })
        .await
    }

    pub async fn list_reviews(&self, id: Uuid, actor: &ActorContext) -> Result<Vec<ReviewView>> {
        observed("list_reviews", async {
            let record = self.load(id).await?;
            self.policy.reviews(actor, &record)
        })
        .await
    }

    /// Aggregate of any revision's reviews; editors only
    pub async fn get_aggregate(
        &self,
        id: Uuid,
        revision_number: u32,
        actor: &ActorContext,
    ) -> Result<AggregateSummary> {
        observed("get_aggregate", async {
            actor.require_role(Role::Editor)?;

            let record = self.load(id).await?;
            if record.revision(revision_number).is_none() {
                return Err(AppError::NotFound {
                    resource: "revision",
                    id: format!("{}/{}", id, revision_number),
                });
            }

            aggregate(
                revision_number,
                record.reviews_for(revision_number),
                Thresholds::from(&self.config),
            )
            .ok_or(AppError::InsufficientReviews {
                required: 1,
                submitted: 0,
            })
        })
        .await
    }
}
