use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use tracing::{info, warn};

use crate::accounts::Accounts;
use crate::config::{Config, SEATING_SETTINGS_KEY};
use crate::repo::SessionRepository;
use crate::store::{MemoryStore, SqliteStore};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    /// Start-up configuration; each opened workspace starts from it.
    pub defaults: Config,
    pub workspace: Option<PathBuf>,
    pub db: Option<Arc<SqliteStore>>,
    pub repo: SessionRepository,
    pub accounts: Accounts,
}

impl AppState {
    pub fn in_memory(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let ttl = config.token_ttl;
        AppState {
            defaults: config.clone(),
            config,
            workspace: None,
            db: None,
            repo: SessionRepository::new(store.clone()),
            accounts: Accounts::new(store, ttl),
        }
    }

    pub fn storage_kind(&self) -> &'static str {
        if self.db.is_some() {
            "sqlite"
        } else {
            "memory"
        }
    }

    /// Switches to the SQLite store in `path`. Issued tokens do not carry over.
    pub fn open_workspace(&mut self, path: &Path) -> anyhow::Result<()> {
        let store = Arc::new(
            SqliteStore::open(path)
                .with_context(|| format!("open workspace {}", path.display()))?,
        );

        let mut config = self.defaults.clone();
        match store.settings_get_json(SEATING_SETTINGS_KEY) {
            Ok(Some(saved)) => {
                if let Err(msg) = config.apply_seating_settings(&saved) {
                    warn!(%msg, "ignoring malformed seating settings");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "could not read seating settings"),
        }

        info!(
            db = %store.path().display(),
            roll_policy = config.roll_policy.as_str(),
            bulk_max_rows = config.bulk_max_rows,
            "workspace opened"
        );
        self.config = config;
        self.repo = SessionRepository::new(store.clone());
        self.accounts = Accounts::new(store.clone(), self.config.token_ttl);
        self.db = Some(store);
        self.workspace = Some(path.to_path_buf());
        Ok(())
    }
}
