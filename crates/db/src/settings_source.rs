use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use sqlx::SqlitePool;
use tracing::warn;

/// Read-only view of user settings, consulted at call time so edits apply
/// without a restart. Lookup failures read as "not set".
#[async_trait::async_trait]
pub trait SettingsSource: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    /// Trimmed value, with empty strings treated as unset.
    async fn get_nonempty(&self, key: &str) -> Option<String> {
        self.get(key)
            .await
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Boolean stored as `"true"`/`"false"`; anything else yields `default`.
    async fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key).await.as_deref().map(str::trim) {
            Some("true") => true,
            Some("false") => false,
            _ => default,
        }
    }
}

/// Settings backed by the `settings` table.
#[derive(Clone)]
pub struct SqliteSettings {
    pool: SqlitePool,
}

impl SqliteSettings {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SettingsSource for SqliteSettings {
    async fn get(&self, key: &str) -> Option<String> {
        match crate::repo::settings::get(&self.pool, key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "failed to read setting");
                None
            }
        }
    }
}

#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    pub fn remove(&self, key: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

#[async_trait::async_trait]
impl SettingsSource for MemorySettings {
    async fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}
