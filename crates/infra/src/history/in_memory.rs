use std::collections::HashMap;
use std::sync::RwLock;

use fraudwatch_core::{HistoryWindow, UserId};

use super::{HistoryStore, HistoryStoreError};

/// In-memory history store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    records: RwLock<HashMap<String, HistoryWindow>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn load(&self, user_id: &UserId) -> Result<Option<HistoryWindow>, HistoryStoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| HistoryStoreError::Command("history lock poisoned".to_string()))?;
        Ok(records.get(&user_id.history_key()).cloned())
    }

    fn save(&self, user_id: &UserId, history: &HistoryWindow) -> Result<(), HistoryStoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| HistoryStoreError::Command("history lock poisoned".to_string()))?;
        records.insert(user_id.history_key(), history.clone());
        Ok(())
    }
}
