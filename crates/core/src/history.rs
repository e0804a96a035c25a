//! Bounded per-user transaction history.

use serde::{Deserialize, Serialize};

use crate::transaction::Transaction;

/// Maximum number of past transactions kept per user.
pub const HISTORY_LIMIT: usize = 5;

/// The most recent transactions of one user, oldest first.
///
/// Never holds more than [`HISTORY_LIMIT`] entries; pushing onto a full
/// window drops the oldest entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryWindow(Vec<Transaction>);

impl HistoryWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a window from stored entries, keeping only the newest ones.
    pub fn from_vec(mut entries: Vec<Transaction>) -> Self {
        if entries.len() > HISTORY_LIMIT {
            entries.drain(..entries.len() - HISTORY_LIMIT);
        }
        Self(entries)
    }

    pub fn push(&mut self, transaction: Transaction) {
        self.0.push(transaction);
        if self.0.len() > HISTORY_LIMIT {
            self.0.remove(0);
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Transaction] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Transaction> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn tx(n: u64) -> Transaction {
        Transaction::from_json(json!({
            "user_id": "u1",
            "amount": n,
            "merchant": "Acme",
            "location": "NY",
            "timestamp": n
        }))
        .unwrap()
    }

    #[test]
    fn drops_oldest_when_full() {
        let mut window = HistoryWindow::new();
        for n in 0..7 {
            window.push(tx(n));
        }

        let amounts: Vec<_> = window
            .as_slice()
            .iter()
            .map(|t| t.amount.as_u64().unwrap())
            .collect();
        assert_eq!(amounts, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn from_vec_truncates_oversized_records() {
        let window = HistoryWindow::from_vec((0..9).map(tx).collect());
        assert_eq!(window.len(), HISTORY_LIMIT);
        assert_eq!(window.as_slice()[0].amount.as_u64(), Some(4));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: after N pushes the window holds the last min(N, 5)
        /// transactions in submission order.
        #[test]
        fn window_keeps_most_recent_in_order(n in 0u64..40) {
            let mut window = HistoryWindow::new();
            for i in 0..n {
                window.push(tx(i));
            }

            let expected: Vec<u64> = (n.saturating_sub(HISTORY_LIMIT as u64)..n).collect();
            let actual: Vec<u64> = window
                .as_slice()
                .iter()
                .map(|t| t.amount.as_u64().unwrap())
                .collect();

            prop_assert!(window.len() <= HISTORY_LIMIT);
            prop_assert_eq!(actual, expected);
        }
    }
}
