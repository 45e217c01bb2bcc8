//! Event emission.
//!
//! Round reports are flattened into [`Event`]s and broadcast to every
//! subscriber. Each subscriber has an independent buffer; a slow subscriber
//! loses the oldest events rather than blocking the rounds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use beacon_protocol::scheduler::RoundReport;
use beacon_types::events::ProtocolEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// An event emitted by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event type name (e.g. "RoundCompleted", "DaemonStarted").
    pub event_type: String,
    /// Position in the bus's emission order, starting at 1.
    pub sequence: u64,
    /// Unix timestamp.
    pub timestamp: u64,
    /// Type-specific payload.
    pub payload: serde_json::Value,
}

impl Event {
    /// Build an event stamped with the current time. The bus assigns the sequence.
    pub fn new(event_type: &str, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.to_string(),
            sequence: 0,
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            payload,
        }
    }

    /// Wrap a protocol event. The payload is the event's JSON form.
    pub fn from_protocol(event: &ProtocolEvent) -> Self {
        let payload = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
        Self::new(event_type_name(event), payload)
    }
}

/// Filter for event subscriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Category filter: "round", "recovery", "fault", "system".
    pub categories: Option<Vec<String>>,
    /// Only events from these rounds.
    pub rounds: Option<Vec<u64>>,
}

/// Event bus for broadcasting events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, mut event: Event) {
        event.sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    /// Emit every event of a round report, in order.
    pub fn publish_report(&self, report: &RoundReport) {
        for event in &report.events {
            self.emit(Event::from_protocol(event));
        }
    }

    /// Subscribe to events. Returns a receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Number of events emitted so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl EventFilter {
    /// Filter on categories; `None` when the list is empty.
    pub fn with_categories(categories: &[String]) -> Self {
        Self {
            categories: (!categories.is_empty()).then(|| categories.to_vec()),
            rounds: None,
        }
    }

    /// Check if an event matches this filter.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref categories) = self.categories {
            let event_category = categorize_event(&event.event_type);
            if !categories.iter().any(|c| c == event_category) {
                return false;
            }
        }

        if let Some(ref rounds) = self.rounds {
            if let Some(round) = event.payload.get("round").and_then(|v| v.as_u64()) {
                if !rounds.contains(&round) {
                    return false;
                }
            }
        }

        true
    }
}

fn event_type_name(event: &ProtocolEvent) -> &'static str {
    match event {
        ProtocolEvent::RoundStarted { .. } => "RoundStarted",
        ProtocolEvent::BlockPublished { .. } => "BlockPublished",
        ProtocolEvent::SecretRecovered { .. } => "SecretRecovered",
        ProtocolEvent::IntegrityFault { .. } => "IntegrityFault",
        ProtocolEvent::DuplicateShare { .. } => "DuplicateShare",
        ProtocolEvent::MissingProducer { .. } => "MissingProducer",
        ProtocolEvent::InsufficientShares { .. } => "InsufficientShares",
        ProtocolEvent::RecordRejected { .. } => "RecordRejected",
        ProtocolEvent::RoundCompleted { .. } => "RoundCompleted",
    }
}

/// Categorize an event type into a category.
fn categorize_event(event_type: &str) -> &'static str {
    match event_type {
        s if s.starts_with("Round") || s.starts_with("Block") => "round",
        "MissingProducer" => "round",
        "SecretRecovered" | "InsufficientShares" | "DuplicateShare" => "recovery",
        "IntegrityFault" | "RecordRejected" => "fault",
        _ => "system",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_types::events::FaultReason;
    use beacon_types::WitnessId;

    #[test]
    fn test_event_bus_emit_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(Event::new(
            "DaemonStarted",
            serde_json::json!({"version": "0.1.0"}),
        ));

        let event = rx.try_recv().expect("receive event");
        assert_eq!(event.event_type, "DaemonStarted");
        assert_eq!(event.sequence, 1);
        assert_eq!(bus.sequence(), 1);
    }

    #[test]
    fn test_protocol_event_payload() {
        let event = Event::from_protocol(&ProtocolEvent::IntegrityFault {
            round: 4,
            observer: WitnessId(1),
            owner: WitnessId(0),
            reason: FaultReason::CommitmentMismatch,
        });
        assert_eq!(event.event_type, "IntegrityFault");
        assert_eq!(event.payload["event"], "integrity_fault");
        assert_eq!(event.payload["round"], 4);
    }

    #[test]
    fn test_event_filter_categories() {
        let filter = EventFilter::with_categories(&["fault".to_string()]);

        let fault = Event::new("IntegrityFault", serde_json::json!({"round": 1}));
        assert!(filter.matches(&fault));

        let duplicate = Event::new("DuplicateShare", serde_json::json!({"round": 1}));
        assert!(!filter.matches(&duplicate));

        let round = Event::new("RoundCompleted", serde_json::json!({"round": 1}));
        assert!(!filter.matches(&round));

        assert!(EventFilter::with_categories(&[]).matches(&round));
    }

    #[test]
    fn test_event_filter_rounds() {
        let filter = EventFilter {
            categories: None,
            rounds: Some(vec![2]),
        };
        assert!(filter.matches(&Event::new("RoundStarted", serde_json::json!({"round": 2}))));
        assert!(!filter.matches(&Event::new("RoundStarted", serde_json::json!({"round": 3}))));
        assert!(filter.matches(&Event::new("DaemonStarted", serde_json::json!({}))));
    }

    #[test]
    fn test_categorize_event() {
        assert_eq!(categorize_event("RoundStarted"), "round");
        assert_eq!(categorize_event("BlockPublished"), "round");
        assert_eq!(categorize_event("SecretRecovered"), "recovery");
        assert_eq!(categorize_event("InsufficientShares"), "recovery");
        assert_eq!(categorize_event("DuplicateShare"), "recovery");
        assert_eq!(categorize_event("IntegrityFault"), "fault");
        assert_eq!(categorize_event("MissingProducer"), "round");
        assert_eq!(categorize_event("RecordRejected"), "fault");
        assert_eq!(categorize_event("DaemonStarted"), "system");
    }

    #[tokio::test]
    async fn test_report_published_in_order() {
        let mut scheduler = beacon_protocol::scheduler::RoundScheduler::with_witnesses(
            beacon_protocol::config::ProtocolConfig::with_threshold(2),
            3,
        )
        .expect("scheduler");
        let report = scheduler.run_round().expect("round");

        let bus = EventBus::new(256);
        let mut rx = bus.subscribe();
        bus.publish_report(&report);

        let first = rx.recv().await.expect("first event");
        assert_eq!(first.event_type, "RoundStarted");
        let mut last = first;
        while let Ok(event) = rx.try_recv() {
            assert!(event.sequence > last.sequence);
            last = event;
        }
        assert_eq!(last.event_type, "RoundCompleted");
        assert_eq!(bus.sequence(), report.events.len() as u64);
    }
}
