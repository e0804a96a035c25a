//! Redis-backed history store.
//!
//! One hash per user at `{namespace}:{set}:user_{id}`; the `history` field
//! holds the JSON array of transactions, oldest first.

use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use fraudwatch_core::{HistoryWindow, Transaction, UserId};

use super::{HistoryStore, HistoryStoreError};

/// Field holding the serialized window.
const HISTORY_FIELD: &str = "history";

#[derive(Debug, Clone)]
pub struct RedisHistoryStore {
    client: Arc<redis::Client>,
    namespace: String,
    set: String,
    timeout: Duration,
}

impl RedisHistoryStore {
    /// Create a store. No connection is made until the first call.
    ///
    /// `timeout` bounds connect, read and write of every call.
    pub fn new(
        redis_url: impl AsRef<str>,
        namespace: impl Into<String>,
        set: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, HistoryStoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| HistoryStoreError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            namespace: namespace.into(),
            set: set.into(),
            timeout,
        })
    }

    fn record_key(&self, user_id: &UserId) -> String {
        format!("{}:{}:{}", self.namespace, self.set, user_id.history_key())
    }

    fn connection(&self) -> Result<redis::Connection, HistoryStoreError> {
        let conn = self
            .client
            .get_connection_with_timeout(self.timeout)
            .map_err(|e| HistoryStoreError::Connection(e.to_string()))?;
        conn.set_read_timeout(Some(self.timeout))
            .and_then(|_| conn.set_write_timeout(Some(self.timeout)))
            .map_err(|e| HistoryStoreError::Connection(e.to_string()))?;
        Ok(conn)
    }
}

impl HistoryStore for RedisHistoryStore {
    #[instrument(skip(self), fields(key = %self.record_key(user_id)), err)]
    fn load(&self, user_id: &UserId) -> Result<Option<HistoryWindow>, HistoryStoreError> {
        let mut conn = self.connection()?;

        let raw: Option<String> = redis::cmd("HGET")
            .arg(self.record_key(user_id))
            .arg(HISTORY_FIELD)
            .query(&mut conn)
            .map_err(|e| HistoryStoreError::Command(format!("HGET failed: {e}")))?;

        raw.map(|json| {
            serde_json::from_str::<Vec<Transaction>>(&json)
                .map(HistoryWindow::from_vec)
                .map_err(|e| HistoryStoreError::Corrupt(e.to_string()))
        })
        .transpose()
    }

    #[instrument(skip(self, history), fields(key = %self.record_key(user_id), len = history.len()), err)]
    fn save(&self, user_id: &UserId, history: &HistoryWindow) -> Result<(), HistoryStoreError> {
        let json = serde_json::to_string(history).map_err(|e| HistoryStoreError::Corrupt(e.to_string()))?;
        let mut conn = self.connection()?;

        redis::cmd("HSET")
            .arg(self.record_key(user_id))
            .arg(HISTORY_FIELD)
            .arg(json)
            .query::<()>(&mut conn)
            .map_err(|e| HistoryStoreError::Command(format!("HSET failed: {e}")))?;

        Ok(())
    }
}
