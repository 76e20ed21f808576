//! Stored notes with grammar checks and HTML rendering by id.
//!
//! A [`Notebook`] pairs a [`NoteRepository`] with the [`Coordinator`]:
//! notes are checked through the usual analysis pipeline, so a note whose
//! text was already analyzed is served from the result cache.
//!
//! ```no_run
//! use markcheck::{MarkcheckConfig, NewNote};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let notebook = MarkcheckConfig::default().build_notebook()?;
//! let note = notebook.create(NewNote::new("Exam prep", "Thiss is a note.")).await?;
//! let outcome = notebook.analyze(note.id, None, None).await?;
//! let html = notebook.render_html(note.id).await?;
//! # Ok(())
//! # }
//! ```

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use rules::RuleConfig;
use store::{NewNote, Note, NoteRepository, StoreError};
use tracing::{debug, info};

use crate::coordinator::{AnalysisOutcome, Coordinator};
use crate::error::NoteError;
use crate::request::AnalysisRequest;

pub struct Notebook {
    coordinator: Arc<Coordinator>,
    notes: Arc<NoteRepository>,
    html_cache: Mutex<LruCache<u64, (Arc<str>, Instant)>>,
    html_ttl: Duration,
}

impl Notebook {
    /// HTML cache size and lifetime follow the coordinator's HTML settings.
    pub fn new(coordinator: Arc<Coordinator>, notes: NoteRepository) -> Self {
        let config = coordinator.config();
        let capacity = NonZeroUsize::new(config.html_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        let html_ttl = config.html_cache_ttl;
        Self {
            coordinator,
            notes: Arc::new(notes),
            html_cache: Mutex::new(LruCache::new(capacity)),
            html_ttl,
        }
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// Persist a note. Any HTML cached under the new id is dropped.
    pub async fn create(&self, new: NewNote) -> Result<Arc<Note>, NoteError> {
        let notes = Arc::clone(&self.notes);
        let note = blocking(move || notes.create(new)).await?;
        self.html_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop(&note.id);
        Ok(note)
    }

    pub async fn list(&self) -> Result<Vec<Note>, NoteError> {
        let notes = Arc::clone(&self.notes);
        blocking(move || notes.list()).await
    }

    pub async fn get(&self, id: u64) -> Result<Option<Arc<Note>>, NoteError> {
        let notes = Arc::clone(&self.notes);
        blocking(move || notes.get(id)).await
    }

    /// Grammar-check a stored note. `language` falls back to the configured
    /// default language.
    pub async fn analyze(
        &self,
        id: u64,
        language: Option<String>,
        rule_config: Option<RuleConfig>,
    ) -> Result<AnalysisOutcome, NoteError> {
        let note = self.require(id).await?;
        let language = language
            .unwrap_or_else(|| self.coordinator.config().normalize.default_language.clone());
        info!(note_id = id, language = %language, "note_check");

        let mut request = AnalysisRequest::new(note.content.clone(), language);
        if let Some(overrides) = rule_config {
            request = request.with_rule_config(overrides);
        }
        Ok(self.coordinator.analyze(request).await?)
    }

    /// Render a stored note's Markdown to HTML, reusing a recent rendering.
    pub async fn render_html(&self, id: u64) -> Result<Arc<str>, NoteError> {
        {
            let mut cache = self.html_cache.lock().unwrap_or_else(PoisonError::into_inner);
            match cache.get(&id) {
                Some((html, rendered)) if rendered.elapsed() < self.html_ttl => {
                    debug!(note_id = id, "note_html_cache_hit");
                    return Ok(Arc::clone(html));
                }
                Some(_) => {
                    cache.pop(&id);
                }
                None => {}
            }
        }

        let note = self.require(id).await?;
        let html: Arc<str> = Arc::from(normalize::render_html(&note.content));
        self.html_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(id, (Arc::clone(&html), Instant::now()));
        Ok(html)
    }

    async fn require(&self, id: u64) -> Result<Arc<Note>, NoteError> {
        self.get(id).await?.ok_or(NoteError::NotFound(id))
    }
}

/// Run a storage call off the async runtime.
async fn blocking<T, F>(op: F) -> Result<T, NoteError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(op).await {
        Ok(result) => result.map_err(NoteError::from),
        Err(join_err) => Err(NoteError::Internal(join_err.to_string())),
    }
}
