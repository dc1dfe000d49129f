//! Runtime configuration: checkpoint backend selection and database URL
//! resolution.

use std::sync::Arc;

use crate::checkpoint::{CheckpointStore, InMemoryCheckpointStore, StoreError};

/// Which checkpoint backend a deployment uses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CheckpointBackend {
    #[default]
    InMemory,
    #[cfg(feature = "sqlite")]
    Sqlite,
}

/// Runtime knobs resolved once at startup.
#[derive(Clone, Debug, Default)]
pub struct RuntimeConfig {
    pub checkpoint_backend: CheckpointBackend,
    /// Database file name used when no URL override is present.
    pub sqlite_db_name: Option<String>,
}

impl RuntimeConfig {
    /// Read configuration from the environment (`.env` honored).
    ///
    /// `TRENDLOOM_CHECKPOINTER=sqlite` selects the SQLite backend;
    /// anything else (or nothing) selects in-memory.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let backend = match std::env::var("TRENDLOOM_CHECKPOINTER").as_deref() {
            #[cfg(feature = "sqlite")]
            Ok("sqlite") => CheckpointBackend::Sqlite,
            _ => CheckpointBackend::InMemory,
        };
        Self {
            checkpoint_backend: backend,
            sqlite_db_name: std::env::var("SQLITE_DB_NAME").ok(),
        }
    }

    /// Build the configured checkpoint store.
    pub async fn build_store(&self) -> Result<Arc<dyn CheckpointStore>, StoreError> {
        match self.checkpoint_backend {
            CheckpointBackend::InMemory => Ok(Arc::new(InMemoryCheckpointStore::new())),
            #[cfg(feature = "sqlite")]
            CheckpointBackend::Sqlite => {
                let url = self.sqlite_url();
                ensure_sqlite_file(&url);
                let store = crate::checkpoint::SqliteCheckpointStore::connect(&url).await?;
                Ok(Arc::new(store))
            }
        }
    }

    /// Resolution order: explicit URL override, configured db name, default
    /// file in the working directory.
    #[must_use]
    pub fn sqlite_url(&self) -> String {
        std::env::var("TRENDLOOM_SQLITE_URL")
            .ok()
            .or_else(|| {
                self.sqlite_db_name
                    .as_ref()
                    .map(|name| format!("sqlite://{name}"))
            })
            .unwrap_or_else(|| "sqlite://trendloom.db".to_string())
    }
}

/// Make sure the sqlite file exists before the pool connects. Steps:
/// 1. Strip the "sqlite://" scheme to get a filesystem path.
/// 2. Create parent directories if needed.
/// 3. Attempt to create the file (ignore failures; connect will report).
fn ensure_sqlite_file(db_url: &str) {
    if let Some(path) = db_url.strip_prefix("sqlite://") {
        let path = path.trim();
        if !path.is_empty() {
            let p = std::path::Path::new(path);
            if let Some(parent) = p.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if !p.exists() {
                let _ = std::fs::File::create_new(p);
            }
        }
    }
}
