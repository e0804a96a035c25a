//! Per-user transaction history, kept in an external key-value store.
//!
//! [`HistoryStore`] is the raw get/put port; [`UserHistory`] is what the API
//! uses. It applies the bounded-window rules and degrades gracefully: a store
//! outage never fails a submission.

use std::sync::Arc;

use tracing::warn;

use fraudwatch_core::{HistoryWindow, Transaction, UserId};

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use in_memory::InMemoryHistoryStore;
#[cfg(feature = "redis")]
pub use redis::RedisHistoryStore;

/// History store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HistoryStoreError {
    #[error("history store connection error: {0}")]
    Connection(String),
    #[error("history store command error: {0}")]
    Command(String),
    #[error("corrupt history record: {0}")]
    Corrupt(String),
}

/// Get/put of one user's history record.
pub trait HistoryStore: Send + Sync {
    /// `None` when the user has no record yet.
    fn load(&self, user_id: &UserId) -> Result<Option<HistoryWindow>, HistoryStoreError>;

    /// Overwrite the user's record (last write wins).
    fn save(&self, user_id: &UserId, history: &HistoryWindow) -> Result<(), HistoryStoreError>;
}

impl<S> HistoryStore for Arc<S>
where
    S: HistoryStore + ?Sized,
{
    fn load(&self, user_id: &UserId) -> Result<Option<HistoryWindow>, HistoryStoreError> {
        (**self).load(user_id)
    }

    fn save(&self, user_id: &UserId, history: &HistoryWindow) -> Result<(), HistoryStoreError> {
        (**self).save(user_id, history)
    }
}

/// History adapter used on the submit path.
#[derive(Clone)]
pub struct UserHistory {
    store: Arc<dyn HistoryStore>,
}

impl UserHistory {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Recent transactions of `user_id`, oldest first.
    ///
    /// Missing records and store errors both yield an empty window; errors are
    /// logged, not returned.
    pub fn get_history(&self, user_id: &UserId) -> HistoryWindow {
        match self.store.load(user_id) {
            Ok(Some(window)) => window,
            Ok(None) => HistoryWindow::new(),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "history lookup failed; using empty history");
                HistoryWindow::new()
            }
        }
    }

    /// Append `transaction` to the user's window and write it back.
    ///
    /// Read-modify-write without compare-and-swap: concurrent appends for the
    /// same user may lose one of the updates. A failed read aborts the append
    /// rather than overwriting the record with a one-entry window.
    pub fn append_history(&self, user_id: &UserId, transaction: Transaction) -> Result<HistoryWindow, HistoryStoreError> {
        let mut window = self.store.load(user_id)?.unwrap_or_default();
        window.push(transaction);
        self.store.save(user_id, &window)?;
        Ok(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tx(user: &str, n: u64) -> Transaction {
        Transaction::from_json(json!({
            "user_id": user,
            "amount": n,
            "merchant": "Acme",
            "location": "NY",
            "timestamp": 1700000000 + n
        }))
        .unwrap()
    }

    struct BrokenStore;

    impl HistoryStore for BrokenStore {
        fn load(&self, _: &UserId) -> Result<Option<HistoryWindow>, HistoryStoreError> {
            Err(HistoryStoreError::Connection("connection refused".to_string()))
        }

        fn save(&self, _: &UserId, _: &HistoryWindow) -> Result<(), HistoryStoreError> {
            Err(HistoryStoreError::Connection("connection refused".to_string()))
        }
    }

    #[test]
    fn unknown_user_has_empty_history() {
        let history = UserHistory::new(Arc::new(InMemoryHistoryStore::new()));
        assert!(history.get_history(&UserId::new("nobody")).is_empty());
    }

    #[test]
    fn appends_keep_the_five_most_recent_in_order() {
        let history = UserHistory::new(Arc::new(InMemoryHistoryStore::new()));
        let user = UserId::new("u1");

        for n in 0..8 {
            history.append_history(&user, tx("u1", n)).unwrap();
        }

        let amounts: Vec<_> = history
            .get_history(&user)
            .as_slice()
            .iter()
            .map(|t| t.amount.as_u64().unwrap())
            .collect();
        assert_eq!(amounts, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn users_do_not_share_records() {
        let history = UserHistory::new(Arc::new(InMemoryHistoryStore::new()));
        let a = UserId::new("a");
        let b = UserId::new("b");

        history.append_history(&a, tx("a", 1)).unwrap();

        assert_eq!(history.get_history(&a).len(), 1);
        assert!(history.get_history(&b).is_empty());
    }

    #[test]
    fn store_errors_degrade_to_empty_history() {
        let history = UserHistory::new(Arc::new(BrokenStore));
        let user = UserId::new("u1");

        assert!(history.get_history(&user).is_empty());
        assert!(history.append_history(&user, tx("u1", 1)).is_err());
    }
}
