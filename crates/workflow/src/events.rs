//! Workflow notifications
//!
//! Every committed transition is published on a broadcast channel. The
//! engine never waits on subscribers; slow ones skip ahead.

use crate::aggregation::Recommendation;
use chrono::{DateTime, Utc};
use reviewforge_common::domain::{Decision, ManuscriptStatus};
use reviewforge_common::metrics;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    ManuscriptSubmitted {
        manuscript_id: Uuid,
        author_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    PlagiarismRecorded {
        manuscript_id: Uuid,
        checked: bool,
        score: f64,
        timestamp: DateTime<Utc>,
    },

    ReviewerAssigned {
        manuscript_id: Uuid,
        revision_number: u32,
        reviewer_id: Uuid,
        due_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    AssignmentDeclined {
        manuscript_id: Uuid,
        revision_number: u32,
        reviewer_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    ReviewSubmitted {
        manuscript_id: Uuid,
        revision_number: u32,
        reviewer_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    ReviewCycleClosed {
        manuscript_id: Uuid,
        revision_number: u32,
        overall_mean: f64,
        recommendation: Recommendation,
        timestamp: DateTime<Utc>,
    },

    DecisionRecorded {
        manuscript_id: Uuid,
        decision: Decision,
        timestamp: DateTime<Utc>,
    },

    RevisionSubmitted {
        manuscript_id: Uuid,
        revision_number: u32,
        timestamp: DateTime<Utc>,
    },

    StatusChanged {
        manuscript_id: Uuid,
        from: ManuscriptStatus,
        to: ManuscriptStatus,
        timestamp: DateTime<Utc>,
    },
}

impl WorkflowEvent {
    pub fn manuscript_id(&self) -> Uuid {
        match self {
            WorkflowEvent::ManuscriptSubmitted { manuscript_id, .. }
            | WorkflowEvent::PlagiarismRecorded { manuscript_id, .. }
            | WorkflowEvent::ReviewerAssigned { manuscript_id, .. }
            | WorkflowEvent::AssignmentDeclined { manuscript_id, .. }
            | WorkflowEvent::ReviewSubmitted { manuscript_id, .. }
            | WorkflowEvent::ReviewCycleClosed { manuscript_id, .. }
            | WorkflowEvent::DecisionRecorded { manuscript_id, .. }
            | WorkflowEvent::RevisionSubmitted { manuscript_id, .. }
            | WorkflowEvent::StatusChanged { manuscript_id, .. } => *manuscript_id,
        }
    }
}

/// Broadcast fan-out of workflow events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish without waiting; having no subscribers is fine
    pub fn publish(&self, event: WorkflowEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("No workflow event subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.sender.subscribe()
    }
}

/// Receive the next event, skipping over any the subscriber lagged behind on.
/// Returns `None` once the engine is gone.
pub async fn next_event(receiver: &mut broadcast::Receiver<WorkflowEvent>) -> Option<WorkflowEvent> {
    loop {
        match receiver.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Workflow event subscriber lagged");
                metrics::record_events_lagged(skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submitted(id: Uuid) -> WorkflowEvent {
        WorkflowEvent::ManuscriptSubmitted {
            manuscript_id: id,
            author_id: Uuid::nil(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let id = Uuid::new_v4();

        bus.publish(submitted(id));

        let event = next_event(&mut rx).await.unwrap();
        assert_eq!(event.manuscript_id(), id);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(8);
        bus.publish(submitted(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn test_lagged_subscriber_skips_ahead() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            bus.publish(submitted(*id));
        }

        // Oldest events were overwritten; the last two survive
        assert_eq!(next_event(&mut rx).await.unwrap().manuscript_id(), ids[3]);
        assert_eq!(next_event(&mut rx).await.unwrap().manuscript_id(), ids[4]);
    }

    #[tokio::test]
    async fn test_closed_bus_ends_stream() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        drop(bus);
        assert!(next_event(&mut rx).await.is_none());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(submitted(Uuid::nil())).unwrap();
        assert_eq!(json["type"], "manuscript_submitted");
    }
}
