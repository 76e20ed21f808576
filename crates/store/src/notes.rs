//! Stored Markdown notes.
//!
//! A [`NoteRepository`] keeps titled Markdown notes in the same
//! [`StorageBackend`] as analysis results, so one redb file holds both.
//!
//! # Features
//!
//! - **Sequential ids**: ids start at 1 and come from a counter record, so
//!   they survive a restart on a durable backend
//! - **Validated writes**: a note needs a non-blank title
//! - **Read-through cache**: `get` serves recent lookups from a bounded LRU
//!   for [`DEFAULT_NOTE_CACHE_TTL`]
//! - **Versioned records**: the same schema-prefixed zstd/bincode layout as
//!   stored results
//!
//! # Example
//!
//! ```
//! use store::{NewNote, NoteRepository, StoreConfig};
//!
//! let notes = NoteRepository::new(StoreConfig::InMemory.build()?);
//! let note = notes.create(NewNote::new("Exam prep", "# Chapter 1\n\nThiss is a note."))?;
//! assert_eq!(note.id, 1);
//! assert_eq!(notes.get(note.id)?.map(|n| n.title.clone()), Some("Exam prep".into()));
//! assert!(notes.create(NewNote::new("  ", "no title")).is_err());
//! # Ok::<(), store::StoreError>(())
//! ```

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::StoreError;
use crate::backend::StorageBackend;
use crate::store::{DEFAULT_COMPRESSION_LEVEL, decode_record, encode_record};

/// Bump whenever the persisted `Note` layout changes.
pub const NOTE_SCHEMA_VERSION: u16 = 1;
pub const DEFAULT_NOTE_CACHE_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_NOTE_CACHE_CAPACITY: usize = 256;

const NOTE_PREFIX: &str = "note/";
const NEXT_ID_KEY: &str = "meta/next-note-id";

/// A stored Markdown note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Input for [`NoteRepository::create`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl NewNote {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.title.trim().is_empty() {
            return Err(StoreError::InvalidNote(
                "note title cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Note persistence with a TTL-bounded lookup cache.
pub struct NoteRepository {
    backend: Arc<dyn StorageBackend>,
    // Held across read-increment-write of the id counter.
    next_id: Mutex<()>,
    cache: Mutex<LruCache<u64, (Arc<Note>, Instant)>>,
    ttl: Duration,
}

impl std::fmt::Debug for NoteRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteRepository")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl NoteRepository {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_cache(backend, DEFAULT_NOTE_CACHE_CAPACITY, DEFAULT_NOTE_CACHE_TTL)
    }

    pub fn with_cache(backend: Arc<dyn StorageBackend>, capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            backend,
            next_id: Mutex::new(()),
            cache: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Validate and persist a note, assigning the next id.
    pub fn create(&self, new: NewNote) -> Result<Arc<Note>, StoreError> {
        new.validate()?;

        let id = self.allocate_id()?;
        let note = Arc::new(Note {
            id,
            title: new.title,
            content: new.content,
            created_at: Utc::now(),
        });
        let payload = encode_record(note.as_ref(), NOTE_SCHEMA_VERSION, DEFAULT_COMPRESSION_LEVEL)?;
        self.backend.put(&note_key(id), &payload)?;
        info!(note_id = id, title = %note.title, "note_created");

        self.cache_put(Arc::clone(&note));
        Ok(note)
    }

    /// Every stored note, ordered by id.
    pub fn list(&self) -> Result<Vec<Note>, StoreError> {
        let mut notes = Vec::new();
        self.backend.scan_prefix(NOTE_PREFIX, &mut |_, bytes| {
            notes.push(decode_record::<Note>(bytes, NOTE_SCHEMA_VERSION)?);
            Ok(())
        })?;
        notes.sort_by_key(|note| note.id);
        debug!(count = notes.len(), "notes_listed");
        Ok(notes)
    }

    pub fn get(&self, id: u64) -> Result<Option<Arc<Note>>, StoreError> {
        {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            match cache.get(&id) {
                Some((note, cached)) if cached.elapsed() < self.ttl => {
                    debug!(note_id = id, "note_cache_hit");
                    return Ok(Some(Arc::clone(note)));
                }
                Some(_) => {
                    cache.pop(&id);
                }
                None => {}
            }
        }

        let Some(bytes) = self.backend.get(&note_key(id))? else {
            return Ok(None);
        };
        let note = Arc::new(decode_record::<Note>(&bytes, NOTE_SCHEMA_VERSION)?);
        self.cache_put(Arc::clone(&note));
        Ok(Some(note))
    }

    fn allocate_id(&self) -> Result<u64, StoreError> {
        let _guard = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
        let current = match self.backend.get(NEXT_ID_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::Decode(format!("note id counter has {} bytes", bytes.len()))
                })?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        let id = current + 1;
        // Counter first: a crash between the two writes leaves a gap, never a reused id.
        self.backend.put(NEXT_ID_KEY, &id.to_be_bytes())?;
        Ok(id)
    }

    fn cache_put(&self, note: Arc<Note>) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(note.id, (note, Instant::now()));
    }
}

fn note_key(id: u64) -> String {
    format!("{NOTE_PREFIX}{id:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryBackend;

    fn repo() -> (Arc<InMemoryBackend>, NoteRepository) {
        let raw = Arc::new(InMemoryBackend::new());
        let notes = NoteRepository::new(raw.clone());
        (raw, notes)
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let (_, notes) = repo();
        let first = notes.create(NewNote::new("One", "first")).unwrap();
        let second = notes.create(NewNote::new("Two", "second")).unwrap();
        assert_eq!((first.id, second.id), (1, 2));
        assert_eq!(second.content, "second");
    }

    #[test]
    fn blank_title_is_rejected() {
        let (raw, notes) = repo();
        for title in ["", "   ", "\t\n"] {
            let err = notes.create(NewNote::new(title, "body")).unwrap_err();
            assert!(matches!(err, StoreError::InvalidNote(_)));
        }
        assert!(raw.is_empty());
    }

    #[test]
    fn list_is_ordered_and_ignores_other_records() {
        let (raw, notes) = repo();
        for title in ["a", "b", "c"] {
            notes.create(NewNote::new(title, "")).unwrap();
        }
        raw.put("deadbeef", b"an analysis result").unwrap();

        let titles: Vec<_> = notes.list().unwrap().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn get_reads_through_and_caches() {
        let (raw, notes) = repo();
        let created = notes.create(NewNote::new("Cached", "body")).unwrap();

        let fresh = NoteRepository::new(raw.clone());
        let loaded = fresh.get(created.id).unwrap().unwrap();
        assert_eq!(loaded.as_ref(), created.as_ref());

        raw.delete(&note_key(created.id)).unwrap();
        assert_eq!(
            fresh.get(created.id).unwrap().map(|n| n.title.clone()),
            Some("Cached".to_string())
        );
        assert_eq!(fresh.get(99).unwrap(), None);
    }

    #[test]
    fn expired_cache_entries_fall_back_to_storage() {
        let raw = Arc::new(InMemoryBackend::new());
        let notes = NoteRepository::with_cache(raw.clone(), 8, Duration::ZERO);
        let created = notes.create(NewNote::new("Short lived", "")).unwrap();

        raw.delete(&note_key(created.id)).unwrap();
        assert_eq!(notes.get(created.id).unwrap(), None);
    }

    #[test]
    fn ids_continue_after_reopen() {
        let raw = Arc::new(InMemoryBackend::new());
        NoteRepository::new(raw.clone())
            .create(NewNote::new("First", ""))
            .unwrap();
        let reopened = NoteRepository::new(raw);
        assert_eq!(reopened.create(NewNote::new("Second", "")).unwrap().id, 2);
    }

    #[test]
    fn corrupt_note_surfaces_on_list() {
        let (raw, notes) = repo();
        raw.put(&note_key(7), &[0, 1]).unwrap();
        assert!(notes.list().is_err());
    }
}
