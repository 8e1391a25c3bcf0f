//! The account identifier that survives restarts, and the balance fetch
//! that reads it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clients::{ComparisonData, DaybalApi};
use crate::error::StoreError;

/// Where the active account identifier lives between runs.
pub trait AccountStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, StoreError>;
    fn save(&self, account_uid: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    account_uid: Option<String>,
}

/// JSON file under the user's data directory.
pub struct FileAccountStore {
    path: PathBuf,
}

impl FileAccountStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl AccountStore for FileAccountStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let file: SessionFile = serde_json::from_str(&content)?;
        Ok(file.account_uid.filter(|uid| !uid.is_empty()))
    }

    fn save(&self, account_uid: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = SessionFile {
            account_uid: Some(account_uid.to_string()),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryAccountStore {
    account_uid: Mutex<Option<String>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(account_uid: &str) -> Self {
        Self {
            account_uid: Mutex::new(Some(account_uid.to_string())),
        }
    }
}

impl AccountStore for MemoryAccountStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.account_uid.lock().map_err(|_| StoreError::Poisoned)?.clone())
    }

    fn save(&self, account_uid: &str) -> Result<(), StoreError> {
        *self.account_uid.lock().map_err(|_| StoreError::Poisoned)? = Some(account_uid.to_string());
        Ok(())
    }
}

/// What the dashboard shows. Replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum BalanceSnapshot {
    Loaded(ComparisonData),
    Failed { detail: String },
}

/// Handles shared by every screen that talks to the API.
#[derive(Clone)]
pub struct SessionContext {
    api: Arc<dyn DaybalApi>,
    store: Arc<dyn AccountStore>,
}

impl SessionContext {
    pub fn new(api: Arc<dyn DaybalApi>, store: Arc<dyn AccountStore>) -> Self {
        Self { api, store }
    }

    pub fn api(&self) -> &dyn DaybalApi {
        self.api.as_ref()
    }

    pub fn active_account(&self) -> Option<String> {
        match self.store.load() {
            Ok(uid) => uid,
            Err(e) => {
                warn!(error = %e, "could not read stored account, using server default");
                None
            }
        }
    }

    pub fn remember_account(&self, account_uid: &str) {
        match self.store.save(account_uid) {
            Ok(()) => info!(account_uid, "stored active account"),
            Err(e) => warn!(account_uid, error = %e, "could not store active account"),
        }
    }

    /// Never fails: API errors come back as [`BalanceSnapshot::Failed`].
    pub async fn fetch_balance(&self) -> BalanceSnapshot {
        let account = self.active_account();
        debug!(account = account.as_deref().unwrap_or("<default>"), "fetching comparison data");

        match self.api.comparison_data(account.as_deref()).await {
            Ok(data) => BalanceSnapshot::Loaded(data),
            Err(e) => BalanceSnapshot::Failed { detail: e.detail() },
        }
    }
}
