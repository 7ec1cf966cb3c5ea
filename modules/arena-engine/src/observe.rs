//! Observability hook plumbing.
//!
//! The engine never persists events itself. It stamps each [`ArenaEvent`] with
//! an id, a parent id and the run id, and hands the record to whatever hook it
//! was constructed with. [`EventTree`] is the in-memory hook used by tests and
//! by callers that want the whole tree after the run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use arena_common::ArenaEvent;

pub type EventId = u64;

/// An event plus the ids needed to rebuild the parent/child tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub parent_id: Option<EventId>,
    pub run_id: String,
    pub ts: DateTime<Utc>,
    pub event: ArenaEvent,
}

impl EventRecord {
    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}

/// Receives every engine event. Called from inside the engine's async tasks,
/// so implementations must not block for long.
pub trait ObservabilityHook: Send + Sync {
    fn on_event(&self, record: &EventRecord);
}

impl<H: ObservabilityHook + ?Sized> ObservabilityHook for Arc<H> {
    fn on_event(&self, record: &EventRecord) {
        (**self).on_event(record)
    }
}

/// Stamps events for one run and forwards them to the hook.
pub struct Observer {
    run_id: String,
    next_id: AtomicU64,
    hook: Arc<dyn ObservabilityHook>,
}

impl Observer {
    pub fn new(run_id: impl Into<String>, hook: Arc<dyn ObservabilityHook>) -> Self {
        Self {
            run_id: run_id.into(),
            next_id: AtomicU64::new(1),
            hook,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Record `event` under `parent` and return its id for use as a parent.
    pub fn emit(&self, parent: Option<EventId>, event: ArenaEvent) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = EventRecord {
            id,
            parent_id: parent,
            run_id: self.run_id.clone(),
            ts: Utc::now(),
            event,
        };
        self.hook.on_event(&record);
        id
    }
}

// ---------------------------------------------------------------------------
// EventTree: arena of records keyed by id
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct EventTree {
    records: Mutex<Vec<EventRecord>>,
}

impl EventTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<EventRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All records in emission order.
    pub fn records(&self) -> Vec<EventRecord> {
        self.lock().clone()
    }

    pub fn get(&self, id: EventId) -> Option<EventRecord> {
        self.lock().iter().find(|r| r.id == id).cloned()
    }

    pub fn roots(&self) -> Vec<EventRecord> {
        self.lock()
            .iter()
            .filter(|r| r.parent_id.is_none())
            .cloned()
            .collect()
    }

    pub fn children_of(&self, id: EventId) -> Vec<EventRecord> {
        self.lock()
            .iter()
            .filter(|r| r.parent_id == Some(id))
            .cloned()
            .collect()
    }

    pub fn of_type(&self, event_type: &str) -> Vec<EventRecord> {
        self.lock()
            .iter()
            .filter(|r| r.event_type() == event_type)
            .cloned()
            .collect()
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.lock()
            .iter()
            .filter(|r| r.event_type() == event_type)
            .count()
    }

    /// Event counts keyed by event type.
    pub fn histogram(&self) -> HashMap<&'static str, usize> {
        let mut out = HashMap::new();
        for record in self.lock().iter() {
            *out.entry(record.event_type()).or_insert(0) += 1;
        }
        out
    }

    /// True when every parent id refers to an earlier record.
    pub fn is_well_formed(&self) -> bool {
        let records = self.lock();
        let mut seen = std::collections::HashSet::new();
        for record in records.iter() {
            if let Some(parent) = record.parent_id {
                if !seen.contains(&parent) {
                    return false;
                }
            }
            seen.insert(record.id);
        }
        true
    }
}

impl ObservabilityHook for EventTree {
    fn on_event(&self, record: &EventRecord) {
        self.lock().push(record.clone());
    }
}

// ---------------------------------------------------------------------------
// TracingHook / FanoutHook
// ---------------------------------------------------------------------------

/// Mirrors every event into the `tracing` log at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHook;

impl ObservabilityHook for TracingHook {
    fn on_event(&self, record: &EventRecord) {
        debug!(
            run_id = record.run_id.as_str(),
            event_id = record.id,
            parent_id = ?record.parent_id,
            event_type = record.event_type(),
            payload = %record.event.to_payload(),
            "Engine event"
        );
    }
}

/// Forwards each record to several hooks, in order.
#[derive(Default)]
pub struct FanoutHook {
    hooks: Vec<Arc<dyn ObservabilityHook>>,
}

impl FanoutHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: Arc<dyn ObservabilityHook>) -> Self {
        self.hooks.push(hook);
        self
    }
}

impl ObservabilityHook for FanoutHook {
    fn on_event(&self, record: &EventRecord) {
        for hook in &self.hooks {
            hook.on_event(record);
        }
    }
}
