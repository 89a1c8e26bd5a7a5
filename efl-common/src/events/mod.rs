//! Event types for the file loader event system
//!
//! Provides shared event definitions and the EventBus used by the import
//! pipeline to broadcast run progress to any number of observers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// File loader event types
///
/// Events are broadcast via EventBus and can be serialized for streaming
/// to clients. All run-scoped events carry the run UUID and a timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LoaderEvent {
    /// Import run accepted and the background task started
    RunStarted {
        /// Import run UUID
        run_id: Uuid,
        /// Number of rows in the run
        row_count: usize,
        /// When the run started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run moved to a new pipeline phase
    ///
    /// Triggers:
    /// - UI: update the phase indicator
    RunPhaseChanged {
        /// Import run UUID
        run_id: Uuid,
        /// Phase before the transition
        old_phase: String,
        /// Phase after the transition
        new_phase: String,
        /// When the transition happened
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Progress update within the current phase
    ///
    /// Emitted as assets are validated, submitted, and verified.
    RunProgress {
        /// Import run UUID
        run_id: Uuid,
        /// Current pipeline phase
        phase: String,
        /// Items completed so far
        current: usize,
        /// Total items in this phase
        total: usize,
        /// Percentage complete (0.0-100.0)
        percentage: f64,
        /// Current operation description
        current_operation: String,
        /// When progress was updated
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Remote job instance progress observed by the poll loop
    JobProgress {
        /// Import run UUID
        run_id: Uuid,
        /// Remote job identifier
        job_id: String,
        /// Remote job instance identifier
        instance_id: String,
        /// Reported progress (0-100)
        progress: u8,
        /// Reported instance status (e.g. "QUEUED", "RUNNING")
        status: String,
        /// When the instance was polled
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Non-fatal problem recorded on the run
    ///
    /// Warnings never flip row statuses; they surface conditions that
    /// need manual follow-up (set/job failures, monitoring timeouts).
    RunWarning {
        /// Import run UUID
        run_id: Uuid,
        /// Warning message
        message: String,
        /// When the warning was recorded
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run reached the Done phase
    RunCompleted {
        /// Import run UUID
        run_id: Uuid,
        /// Rows whose files were submitted and verified
        successful_rows: usize,
        /// Rows that failed
        error_rows: usize,
        /// Rows whose assets showed no file change
        unchanged_rows: usize,
        /// Run duration in seconds
        duration_seconds: u64,
        /// When the run completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run aborted before completion
    RunFailed {
        /// Import run UUID
        run_id: Uuid,
        /// Why the run aborted
        error_message: String,
        /// When the run aborted
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run cancelled by the user
    RunCancelled {
        /// Import run UUID
        run_id: Uuid,
        /// When the run was cancelled
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl LoaderEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            LoaderEvent::RunStarted { .. } => "RunStarted",
            LoaderEvent::RunPhaseChanged { .. } => "RunPhaseChanged",
            LoaderEvent::RunProgress { .. } => "RunProgress",
            LoaderEvent::JobProgress { .. } => "JobProgress",
            LoaderEvent::RunWarning { .. } => "RunWarning",
            LoaderEvent::RunCompleted { .. } => "RunCompleted",
            LoaderEvent::RunFailed { .. } => "RunFailed",
            LoaderEvent::RunCancelled { .. } => "RunCancelled",
        }
    }

    /// Get the run this event belongs to
    pub fn run_id(&self) -> Uuid {
        match self {
            LoaderEvent::RunStarted { run_id, .. }
            | LoaderEvent::RunPhaseChanged { run_id, .. }
            | LoaderEvent::RunProgress { run_id, .. }
            | LoaderEvent::JobProgress { run_id, .. }
            | LoaderEvent::RunWarning { run_id, .. }
            | LoaderEvent::RunCompleted { run_id, .. }
            | LoaderEvent::RunFailed { run_id, .. }
            | LoaderEvent::RunCancelled { run_id, .. } => *run_id,
        }
    }
}

/// Central event distribution bus for run events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
///
/// # Examples
///
/// ```
/// use efl_common::events::{EventBus, LoaderEvent};
/// use std::sync::Arc;
/// use uuid::Uuid;
///
/// let event_bus = Arc::new(EventBus::new(100));
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(LoaderEvent::RunStarted {
///     run_id: Uuid::new_v4(),
///     row_count: 10,
///     timestamp: chrono::Utc::now(),
/// });
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LoaderEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    ///
    /// `capacity` is the number of events buffered before old events are
    /// dropped for lagging subscribers.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<LoaderEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: LoaderEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<LoaderEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Used for progress updates where it's acceptable if no component is
    /// currently listening.
    pub fn emit_lossy(&self, event: LoaderEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_started(run_id: Uuid) -> LoaderEvent {
        LoaderEvent::RunStarted {
            run_id,
            row_count: 3,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(10);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_eventbus_emit() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        let run_id = Uuid::new_v4();
        bus.emit(run_started(run_id)).expect("emit should succeed");

        let received = rx.try_recv().expect("should receive event");
        assert_eq!(received.event_type(), "RunStarted");
        assert_eq!(received.run_id(), run_id);
    }

    #[test]
    fn test_eventbus_emit_lossy_on_full_channel() {
        let bus = EventBus::new(2);
        let mut _rx = bus.subscribe();

        // Overfill the channel; emit_lossy must not panic
        for _ in 0..10 {
            bus.emit_lossy(run_started(Uuid::new_v4()));
        }
        assert_eq!(bus.capacity(), 2);
    }

    #[test]
    fn test_eventbus_multiple_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(LoaderEvent::RunCancelled {
            run_id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
        })
        .expect("emit should succeed");

        assert_eq!(rx1.try_recv().expect("rx1").event_type(), "RunCancelled");
        assert_eq!(rx2.try_recv().expect("rx2").event_type(), "RunCancelled");
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = LoaderEvent::RunPhaseChanged {
            run_id: Uuid::new_v4(),
            old_phase: "COUNTING".to_string(),
            new_phase: "SUBMITTING".to_string(),
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_string(&event).expect("serialization should succeed");
        assert!(json.contains("\"type\":\"RunPhaseChanged\""));
        assert!(json.contains("\"new_phase\":\"SUBMITTING\""));

        let back: LoaderEvent = serde_json::from_str(&json).expect("deserialization should succeed");
        assert_eq!(back.event_type(), "RunPhaseChanged");
    }
}
