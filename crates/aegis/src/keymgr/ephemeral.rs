//! In-memory key manager for development and tests.

use std::collections::HashMap;
use std::sync::Mutex;

use aegis_common::{Database, DbKey};
use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use super::KeyManager;
use crate::crypto::generate_value_key;

/// Key manager that mints a random key per database and remembers it for
/// the lifetime of the process. Keys are lost at shutdown; use only where
/// losing them is the point (tests, local development).
#[derive(Debug, Default)]
pub struct EphemeralKeyManager {
    keys: Mutex<HashMap<Uuid, DbKey>>,
}

impl EphemeralKeyManager {
    /// Create a provider with no known databases.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyManager for EphemeralKeyManager {
    async fn init_db(&self, db: &Database, _options: &serde_json::Value) -> Result<DbKey> {
        let key = DbKey::from(*generate_value_key());
        let mut keys = self.keys.lock().expect("key map poisoned");
        keys.insert(db.uuid(), key.clone());
        Ok(key)
    }

    async fn open_db(&self, db: &Database) -> Result<DbKey> {
        let keys = self.keys.lock().expect("key map poisoned");
        match keys.get(&db.uuid()) {
            Some(key) => Ok(key.clone()),
            None => bail!("unknown database: {}", db.uuid()),
        }
    }
}
