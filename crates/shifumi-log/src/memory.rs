//! In-process [`EventLog`] implementation.
//!
//! Behaves like a single-partition Kafka cluster with topic
//! auto-creation on write: offsets start at zero, readers block until a
//! record arrives, and consumer groups remember how far they got. It can
//! also be switched offline to exercise retry paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::{EventLog, LogError, LogReader, Record, StartFrom};

struct Topic {
    records: Vec<Record>,
    /// Carries the record count; readers wait on it for new appends.
    appended: watch::Sender<u64>,
}

impl Topic {
    fn new() -> Self {
        let (appended, _) = watch::channel(0);
        Self {
            records: Vec::new(),
            appended,
        }
    }
}

#[derive(Default)]
struct Inner {
    topics: Mutex<HashMap<String, Topic>>,
    /// Committed positions keyed by `(topic, group)`.
    groups: Mutex<HashMap<(String, String), u64>>,
    offline: AtomicBool,
    closed: AtomicBool,
}

impl Inner {
    fn topics(&self) -> MutexGuard<'_, HashMap<String, Topic>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn groups(&self) -> MutexGuard<'_, HashMap<(String, String), u64>> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_online(&self) -> Result<(), LogError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LogError::Unavailable("memory log is offline".into()));
        }
        Ok(())
    }

    fn record_at(&self, topic: &str, offset: u64) -> Option<Record> {
        let topics = self.topics();
        let index = usize::try_from(offset).ok()?;
        topics.get(topic)?.records.get(index).cloned()
    }

    fn commit(&self, topic: &str, group: &str, offset: u64) {
        self.groups()
            .insert((topic.to_string(), group.to_string()), offset);
    }
}

/// An in-process append-only log.
///
/// Cloning is cheap and every clone sees the same topics, so one clone
/// can be handed to the ingest side and another to the game-logic side.
#[derive(Clone, Default)]
pub struct MemoryLog {
    inner: Arc<Inner>,
}

impl MemoryLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the log offline (`false`) or back online (`true`).
    ///
    /// While offline, topic creation, appends, offset queries and new
    /// readers fail with [`LogError::Unavailable`]. Existing readers keep
    /// their position.
    pub fn set_available(&self, available: bool) {
        self.inner.offline.store(!available, Ordering::SeqCst);
    }

    /// Closes the log. Blocked and future reads return `Ok(None)`.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        for topic in self.inner.topics().values() {
            topic.appended.send_modify(|_| {});
        }
    }

    /// Returns a copy of every record in `topic`, oldest first.
    pub fn records(&self, topic: &str) -> Vec<Record> {
        self.inner
            .topics()
            .get(topic)
            .map(|t| t.records.clone())
            .unwrap_or_default()
    }

    /// Returns `true` if `topic` exists.
    pub fn has_topic(&self, topic: &str) -> bool {
        self.inner.topics().contains_key(topic)
    }

    fn subscribe(&self, topic: &str) -> (watch::Receiver<u64>, u64) {
        let mut topics = self.inner.topics();
        let entry = topics.entry(topic.to_string()).or_insert_with(Topic::new);
        (entry.appended.subscribe(), entry.records.len() as u64)
    }
}

impl EventLog for MemoryLog {
    type Reader = MemoryReader;

    async fn create_topic(&self, topic: &str) -> Result<(), LogError> {
        self.inner.check_online()?;
        self.inner
            .topics()
            .entry(topic.to_string())
            .or_insert_with(Topic::new);
        Ok(())
    }

    async fn append(
        &self,
        topic: &str,
        key: &[u8],
        value: &[u8],
    ) -> Result<u64, LogError> {
        self.inner.check_online()?;
        let mut topics = self.inner.topics();
        let entry = topics.entry(topic.to_string()).or_insert_with(Topic::new);
        let offset = entry.records.len() as u64;
        entry.records.push(Record {
            topic: topic.to_string(),
            offset,
            key: key.to_vec(),
            value: value.to_vec(),
        });
        entry.appended.send_replace(offset + 1);
        tracing::trace!(topic, offset, "record appended");
        Ok(offset)
    }

    async fn end_offset(&self, topic: &str) -> Result<u64, LogError> {
        self.inner.check_online()?;
        self.inner
            .topics()
            .get(topic)
            .map(|t| t.records.len() as u64)
            .ok_or_else(|| LogError::UnknownTopic(topic.to_string()))
    }

    async fn reader(
        &self,
        topic: &str,
        start: StartFrom,
    ) -> Result<MemoryReader, LogError> {
        self.inner.check_online()?;
        let (appended, end) = self.subscribe(topic);
        let (cursor, group) = match start {
            StartFrom::Earliest => (0, None),
            StartFrom::Latest => (end, None),
            StartFrom::Group(group) => {
                let committed = self
                    .inner
                    .groups()
                    .get(&(topic.to_string(), group.clone()))
                    .copied()
                    .unwrap_or(0);
                (committed, Some(group))
            }
        };
        Ok(MemoryReader {
            inner: Arc::clone(&self.inner),
            topic: topic.to_string(),
            cursor,
            group,
            appended,
        })
    }
}

/// A reader over one [`MemoryLog`] topic.
pub struct MemoryReader {
    inner: Arc<Inner>,
    topic: String,
    cursor: u64,
    group: Option<String>,
    appended: watch::Receiver<u64>,
}

impl MemoryReader {
    /// The offset of the next record this reader will return.
    pub fn position(&self) -> u64 {
        self.cursor
    }
}

impl LogReader for MemoryReader {
    async fn next(&mut self) -> Result<Option<Record>, LogError> {
        loop {
            if self.inner.closed.load(Ordering::SeqCst) {
                return Ok(None);
            }
            // Mark the current count as seen before looking, so an append
            // racing with the lookup still wakes `changed()` below.
            self.appended.borrow_and_update();

            if let Some(record) = self.inner.record_at(&self.topic, self.cursor)
            {
                self.cursor += 1;
                if let Some(group) = &self.group {
                    self.inner.commit(&self.topic, group, self.cursor);
                }
                return Ok(Some(record));
            }

            if self.appended.changed().await.is_err() {
                return Ok(None);
            }
        }
    }
}
