//! Event store boundary and implementations.
//!
//! The pipeline consumes the store through [`EventStore`]: read one event
//! record, upsert its dossier wholesale, append updates, and advance the
//! watermark. [`JsonFileStore`] keeps per-event JSON documents under a
//! data directory, which makes the binary operational with no external
//! infrastructure; [`MemoryStore`] is the in-process fake used by tests,
//! with a switch to force write failures.
//!
//! The dossier write is an idempotent upsert keyed by event id, never a
//! partial field-by-field update. Concurrent runs for the same event id
//! are not coordinated; the last writer wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::error::{PipelineError, Result};
use crate::models::{EventDetails, EventRecord, EventUpdate};

/// External-store boundary.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Resolve an event id to its stored record.
    async fn load_event(&self, event_id: &str) -> Result<Option<EventRecord>>;

    /// Overwrite the event's dossier wholesale.
    async fn upsert_details(&self, event_id: &str, details: &EventDetails) -> Result<()>;

    /// Append one update entry; existing entries are never overwritten.
    async fn append_update(&self, update: &EventUpdate) -> Result<()>;

    /// Advance the event's watermark. Only called after a successful
    /// details or update write.
    async fn advance_watermark(&self, event_id: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Dossier document as persisted, with bookkeeping timestamps.
#[derive(Debug, Serialize, Deserialize)]
struct StoredDetails {
    #[serde(flatten)]
    details: EventDetails,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// File-backed store: one JSON document per event under `root`.
///
/// ```text
/// root/
/// ├── events/<id>.json    event record + watermark
/// ├── details/<id>.json   dossier with created/updated stamps
/// └── updates/<id>.json   update entries, sorted by update date
/// ```
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn event_path(&self, event_id: &str) -> PathBuf {
        self.root.join("events").join(format!("{event_id}.json"))
    }

    fn details_path(&self, event_id: &str) -> PathBuf {
        self.root.join("details").join(format!("{event_id}.json"))
    }

    fn updates_path(&self, event_id: &str) -> PathBuf {
        self.root.join("updates").join(format!("{event_id}.json"))
    }

    /// Seed a new event record (used by the `add-event` command).
    #[instrument(level = "info", skip_all, fields(event_id = %record.id))]
    pub async fn create_event(&self, record: &EventRecord) -> Result<()> {
        write_json(&self.event_path(&record.id), record).await?;
        info!("Seeded event record");
        Ok(())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(body) => serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| PipelineError::Store(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PipelineError::Store(format!("{}: {e}", path.display()))),
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| PipelineError::Store(format!("{}: {e}", parent.display())))?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| PipelineError::Store(e.to_string()))?;
    fs::write(path, json)
        .await
        .map_err(|e| PipelineError::Store(format!("{}: {e}", path.display())))?;
    debug!(path = %path.display(), "Wrote store document");
    Ok(())
}

#[async_trait]
impl EventStore for JsonFileStore {
    async fn load_event(&self, event_id: &str) -> Result<Option<EventRecord>> {
        read_json(&self.event_path(event_id)).await
    }

    async fn upsert_details(&self, event_id: &str, details: &EventDetails) -> Result<()> {
        let now = Utc::now();
        // Preserve the original creation stamp across overwrites.
        let created_at = read_json::<StoredDetails>(&self.details_path(event_id))
            .await
            .ok()
            .flatten()
            .map(|existing| existing.created_at)
            .unwrap_or(now);
        let document = StoredDetails {
            details: details.clone(),
            created_at,
            updated_at: now,
        };
        write_json(&self.details_path(event_id), &document).await
    }

    async fn append_update(&self, update: &EventUpdate) -> Result<()> {
        let path = self.updates_path(&update.event_id);
        let mut updates: Vec<EventUpdate> = read_json(&path).await?.unwrap_or_default();
        updates.push(update.clone());
        updates.sort_by_key(|u| u.update_date);
        write_json(&path, &updates).await
    }

    async fn advance_watermark(&self, event_id: &str, at: DateTime<Utc>) -> Result<()> {
        let path = self.event_path(event_id);
        let mut record: EventRecord = read_json(&path)
            .await?
            .ok_or_else(|| PipelineError::Store(format!("event record vanished: {event_id}")))?;
        record.last_updated_at = Some(at);
        write_json(&path, &record).await
    }
}

// ---- Test double ----

/// In-memory store with a forced-failure switch for write-path tests.
#[derive(Default)]
pub struct MemoryStore {
    events: Mutex<HashMap<String, EventRecord>>,
    details: Mutex<HashMap<String, EventDetails>>,
    updates: Mutex<Vec<EventUpdate>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event(self, record: EventRecord) -> Self {
        self.events
            .lock()
            .expect("store lock poisoned")
            .insert(record.id.clone(), record);
        self
    }

    /// Make every subsequent write fail with a store error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn details_for(&self, event_id: &str) -> Option<EventDetails> {
        self.details
            .lock()
            .expect("store lock poisoned")
            .get(event_id)
            .cloned()
    }

    pub fn updates_for(&self, event_id: &str) -> Vec<EventUpdate> {
        self.updates
            .lock()
            .expect("store lock poisoned")
            .iter()
            .filter(|u| u.event_id == event_id)
            .cloned()
            .collect()
    }

    pub fn watermark(&self, event_id: &str) -> Option<DateTime<Utc>> {
        self.events
            .lock()
            .expect("store lock poisoned")
            .get(event_id)
            .and_then(|r| r.last_updated_at)
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(PipelineError::Store("forced write failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn load_event(&self, event_id: &str) -> Result<Option<EventRecord>> {
        Ok(self
            .events
            .lock()
            .expect("store lock poisoned")
            .get(event_id)
            .cloned())
    }

    async fn upsert_details(&self, event_id: &str, details: &EventDetails) -> Result<()> {
        self.check_writable()?;
        self.details
            .lock()
            .expect("store lock poisoned")
            .insert(event_id.to_string(), details.clone());
        Ok(())
    }

    async fn append_update(&self, update: &EventUpdate) -> Result<()> {
        self.check_writable()?;
        self.updates
            .lock()
            .expect("store lock poisoned")
            .push(update.clone());
        Ok(())
    }

    async fn advance_watermark(&self, event_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.check_writable()?;
        let mut events = self.events.lock().expect("store lock poisoned");
        let record = events
            .get_mut(event_id)
            .ok_or_else(|| PipelineError::Store(format!("event record vanished: {event_id}")))?;
        record.last_updated_at = Some(at);
        Ok(())
    }
}
