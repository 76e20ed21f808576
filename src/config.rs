//! YAML configuration for markcheck.
//!
//! One file configures every component. Every section is optional and falls
//! back to its defaults.
//!
//! ## Example
//!
//! ```yaml
//! version: "1.0"
//!
//! normalize:
//!   version: 1
//!   max_document_bytes: 1048576
//!   recover_malformed: true
//!   default_language: "en"
//!
//! rules:
//!   timeout_ms: 2000
//!   options:
//!     max_sentence_words: 40
//!     custom_misspellings:
//!       rustacian: "Rustacean"
//!     ignored_words: ["markcheck"]
//!   defaults:
//!     sentence-length:
//!       enabled: false
//!
//! cache:
//!   capacity: 1024
//!   ttl_secs: 600
//!   shards: 16
//!
//! storage:
//!   backend: "redb"
//!   path: "/var/lib/markcheck/results.redb"
//!
//! coordinator:
//!   request_timeout_ms: 10000
//!   html_cache_capacity: 128
//!
//! notes:
//!   cache_capacity: 256
//!   cache_ttl_secs: 600
//!
//! logging:
//!   level: "info"
//!   format: "json"
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use normalize::NormalizeConfig;
use rules::{RuleConfig, RuleEngine, RuleKind, RuleOptions};
use serde::{Deserialize, Serialize};
use store::{
    CacheConfig, DEFAULT_NOTE_CACHE_CAPACITY, DEFAULT_NOTE_CACHE_TTL, NoteRepository, ResultCache,
    ResultStore, StorageBackend, StoreConfig, StoreError,
};
use thiserror::Error;

use crate::coordinator::{Coordinator, CoordinatorConfig};
use crate::notebook::Notebook;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),

    #[error("failed to open result storage: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkcheckConfig {
    pub version: String,
    pub normalize: NormalizeConfig,
    pub rules: RulesYamlConfig,
    pub cache: CacheYamlConfig,
    pub storage: StoreConfig,
    pub coordinator: CoordinatorYamlConfig,
    pub notes: NotesYamlConfig,
    pub logging: LoggingConfig,
}

impl Default for MarkcheckConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            normalize: NormalizeConfig::default(),
            rules: RulesYamlConfig::default(),
            cache: CacheYamlConfig::default(),
            storage: StoreConfig::default(),
            coordinator: CoordinatorYamlConfig::default(),
            notes: NotesYamlConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl MarkcheckConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: MarkcheckConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => {}
            v => return Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }
        self.normalize
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("normalize: {e}")))?;
        self.rules.validate()?;
        self.cache.validate()?;
        self.coordinator.validate()?;
        self.notes.validate()?;
        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            capacity: self.cache.capacity,
            ttl: Duration::from_secs(self.cache.ttl_secs),
            shards: self.cache.shards,
        }
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            normalize: self.normalize.clone(),
            request_timeout: Duration::from_millis(self.coordinator.request_timeout_ms),
            default_rules: self.rules.defaults.clone(),
            html_cache_capacity: self.coordinator.html_cache_capacity,
            html_cache_ttl: Duration::from_secs(self.cache.ttl_secs),
        }
    }

    pub fn build_engine(&self) -> RuleEngine {
        RuleEngine::builtin(
            self.rules.options.clone(),
            Duration::from_millis(self.rules.timeout_ms),
        )
    }

    /// Build a coordinator with freshly opened cache and storage.
    pub fn build_coordinator(&self) -> Result<Coordinator, ConfigLoadError> {
        self.coordinator_over(self.storage.build()?)
    }

    /// Build a notebook whose notes and analysis results share one storage
    /// backend.
    pub fn build_notebook(&self) -> Result<Notebook, ConfigLoadError> {
        let backend = self.storage.build()?;
        let coordinator = self.coordinator_over(Arc::clone(&backend))?;
        let notes = NoteRepository::with_cache(
            backend,
            self.notes.cache_capacity,
            Duration::from_secs(self.notes.cache_ttl_secs),
        );
        Ok(Notebook::new(Arc::new(coordinator), notes))
    }

    fn coordinator_over(
        &self,
        backend: Arc<dyn StorageBackend>,
    ) -> Result<Coordinator, ConfigLoadError> {
        let cache = ResultCache::new(self.cache_config())?;
        Ok(Coordinator::new(
            self.coordinator_config(),
            self.build_engine(),
            Arc::new(cache),
            Arc::new(ResultStore::with_backend(backend)),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesYamlConfig {
    /// Per-rule timeout.
    pub timeout_ms: u64,
    pub options: RuleOptions,
    /// Process-wide rule settings; requests may override them.
    pub defaults: RuleConfig,
}

impl Default for RulesYamlConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            options: RuleOptions::default(),
            defaults: RuleConfig::default(),
        }
    }
}

impl RulesYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.timeout_ms == 0 {
            return Err(ConfigLoadError::Validation(
                "rules.timeout_ms must be >= 1".to_string(),
            ));
        }
        if self.options.max_sentence_words == 0 {
            return Err(ConfigLoadError::Validation(
                "rules.options.max_sentence_words must be >= 1".to_string(),
            ));
        }
        if let Some(unknown) = self
            .defaults
            .rules
            .keys()
            .find(|id| RuleKind::from_id(id).is_none())
        {
            return Err(ConfigLoadError::Validation(format!(
                "rules.defaults names unknown rule `{unknown}`"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheYamlConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
    pub shards: usize,
}

impl Default for CacheYamlConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            ttl_secs: 600,
            shards: 16,
        }
    }
}

impl CacheYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.capacity == 0 {
            return Err(ConfigLoadError::Validation(
                "cache.capacity must be >= 1".to_string(),
            ));
        }
        if self.ttl_secs == 0 {
            return Err(ConfigLoadError::Validation(
                "cache.ttl_secs must be >= 1".to_string(),
            ));
        }
        if self.shards == 0 {
            return Err(ConfigLoadError::Validation(
                "cache.shards must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorYamlConfig {
    pub request_timeout_ms: u64,
    pub html_cache_capacity: usize,
}

impl Default for CoordinatorYamlConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            html_cache_capacity: 128,
        }
    }
}

impl CoordinatorYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigLoadError::Validation(
                "coordinator.request_timeout_ms must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesYamlConfig {
    /// Notes kept in the lookup cache.
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
}

impl Default for NotesYamlConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_NOTE_CACHE_CAPACITY,
            cache_ttl_secs: DEFAULT_NOTE_CACHE_TTL.as_secs(),
        }
    }
}

impl NotesYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.cache_capacity == 0 {
            return Err(ConfigLoadError::Validation(
                "notes.cache_capacity must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = MarkcheckConfig::from_yaml("{}").unwrap();
        assert_eq!(config, MarkcheckConfig::default());
        assert_eq!(config.cache_config().ttl, Duration::from_secs(600));
        assert_eq!(
            config.coordinator_config().request_timeout,
            Duration::from_secs(10)
        );
    }

    #[test]
    fn full_yaml() {
        let yaml = r#"
version: "1.0"
normalize:
  max_document_bytes: 2048
  recover_malformed: false
rules:
  timeout_ms: 500
  options:
    max_sentence_words: 25
    ignored_words: ["teh"]
  defaults:
    sentence-length:
      enabled: false
    spelling:
      severity: warning
cache:
  capacity: 10
  ttl_secs: 60
  shards: 2
storage:
  backend: redb
  path: /tmp/markcheck.redb
coordinator:
  request_timeout_ms: 1500
notes:
  cache_capacity: 32
  cache_ttl_secs: 30
logging:
  level: debug
  format: pretty
"#;
        let config = MarkcheckConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.normalize.max_document_bytes, 2048);
        assert!(!config.normalize.recover_malformed);
        assert_eq!(config.rules.options.max_sentence_words, 25);
        assert!(config.rules.options.ignored_words.contains("teh"));
        assert_eq!(
            config.rules.defaults.get("sentence-length").unwrap().enabled,
            Some(false)
        );
        assert_eq!(config.cache_config().shards, 2);
        assert_eq!(config.storage, StoreConfig::redb("/tmp/markcheck.redb"));
        assert_eq!(config.notes.cache_capacity, 32);
        assert_eq!(config.notes.cache_ttl_secs, 30);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(
            config.build_engine().rule_timeout(),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"version: \"1\"\ncache:\n  capacity: 5\n")
            .unwrap();
        let config = MarkcheckConfig::from_file(file.path()).unwrap();
        assert_eq!(config.cache.capacity, 5);
    }

    #[test]
    fn validation_errors() {
        let err = MarkcheckConfig::from_yaml("version: \"2.0\"").unwrap_err();
        assert!(matches!(err, ConfigLoadError::UnsupportedVersion(_)));

        let err = MarkcheckConfig::from_yaml("cache:\n  capacity: 0").unwrap_err();
        assert!(err.to_string().contains("cache.capacity"));

        let err = MarkcheckConfig::from_yaml("rules:\n  defaults:\n    grammarly: {}").unwrap_err();
        assert!(err.to_string().contains("grammarly"));

        let err = MarkcheckConfig::from_yaml("notes:\n  cache_capacity: 0").unwrap_err();
        assert!(err.to_string().contains("notes.cache_capacity"));

        let err = MarkcheckConfig::from_yaml("normalize:\n  default_language: \"x y\"").unwrap_err();
        assert!(err.to_string().contains("normalize"));
    }

    #[test]
    fn build_coordinator_with_in_memory_storage() {
        let coordinator = MarkcheckConfig::default().build_coordinator().unwrap();
        assert_eq!(coordinator.engine().rule_ids().count(), RuleKind::ALL.len());
    }

    #[cfg(feature = "backend-redb")]
    #[tokio::test]
    async fn notebook_shares_one_redb_file_with_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MarkcheckConfig::default();
        config.storage = StoreConfig::redb(dir.path().join("markcheck.redb"));

        let notebook = config.build_notebook().unwrap();
        let note = notebook
            .create(store::NewNote::new("Shared", "Thiss is stored."))
            .await
            .unwrap();
        let outcome = notebook.analyze(note.id, None, None).await.unwrap();
        assert!(outcome.persisted);
        assert_eq!(notebook.list().await.unwrap().len(), 1);
    }
}
