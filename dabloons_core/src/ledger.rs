//! Balance ledger.
//!
//! The casino only talks to the [`Ledger`] trait. [`InMemoryLedger`] keeps every
//! account behind one lock, so a debit or credit on a user is atomic with respect
//! to every session touching that user.

use crate::state::{Chips, UserId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("user {user} has {available}, {required} required")]
    InsufficientFunds { user: UserId, available: Chips, required: Chips },

    #[error("{0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn balance(&self, user: UserId) -> Result<Chips, LedgerError>;

    /// Removes `amount` from `user`, failing without effect if the balance is short.
    /// Returns the new balance.
    async fn debit(&self, user: UserId, amount: Chips) -> Result<Chips, LedgerError>;

    /// Adds `amount` to `user`. Returns the new balance.
    async fn credit(&self, user: UserId, amount: Chips) -> Result<Chips, LedgerError>;

    /// Debits `amount` from every user, or from none of them.
    ///
    /// The default rolls back with credits. Every rollback credit is attempted
    /// even if one fails, and the original error is returned.
    async fn debit_all(&self, users: &[UserId], amount: Chips) -> Result<(), LedgerError> {
        let mut debited = Vec::with_capacity(users.len());
        for &user in users {
            match self.debit(user, amount).await {
                Ok(_) => debited.push(user),
                Err(err) => {
                    for &done in &debited {
                        if let Err(rollback) = self.credit(done, amount).await {
                            error!(user = done, amount, "debit rollback failed: {}", rollback);
                        }
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Applies every credit, or none of them.
    ///
    /// The default rolls back with debits, attempting each one, and returns the
    /// original error.
    async fn credit_all(&self, credits: &[(UserId, Chips)]) -> Result<(), LedgerError> {
        for (i, &(user, amount)) in credits.iter().enumerate() {
            if let Err(err) = self.credit(user, amount).await {
                for &(done, paid) in &credits[..i] {
                    if let Err(rollback) = self.debit(done, paid).await {
                        error!(user = done, amount = paid, "credit rollback failed: {}", rollback);
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// The `n` richest accounts, richest first.
    async fn top_balances(&self, n: usize) -> Result<Vec<(UserId, Chips)>, LedgerError>;
}

/// Process-local ledger. Unknown users are opened with `starting_balance`.
pub struct InMemoryLedger {
    starting_balance: Chips,
    accounts: Mutex<HashMap<UserId, Chips>>,
}

impl InMemoryLedger {
    pub fn new(starting_balance: Chips) -> Self {
        InMemoryLedger {
            starting_balance,
            accounts: Mutex::new(HashMap::new()),
        }
    }

    /// Sets a balance outright, opening the account if needed.
    pub fn set_balance(&self, user: UserId, amount: Chips) {
        self.accounts.lock().insert(user, amount);
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn balance(&self, user: UserId) -> Result<Chips, LedgerError> {
        let mut accounts = self.accounts.lock();
        Ok(*accounts.entry(user).or_insert(self.starting_balance))
    }

    async fn debit(&self, user: UserId, amount: Chips) -> Result<Chips, LedgerError> {
        let mut accounts = self.accounts.lock();
        let balance = accounts.entry(user).or_insert(self.starting_balance);
        if *balance < amount {
            return Err(LedgerError::InsufficientFunds { user, available: *balance, required: amount });
        }
        *balance -= amount;
        debug!(user, amount, balance = *balance, "debit");
        Ok(*balance)
    }

    async fn credit(&self, user: UserId, amount: Chips) -> Result<Chips, LedgerError> {
        let mut accounts = self.accounts.lock();
        let balance = accounts.entry(user).or_insert(self.starting_balance);
        *balance = balance.saturating_add(amount);
        debug!(user, amount, balance = *balance, "credit");
        Ok(*balance)
    }

    async fn debit_all(&self, users: &[UserId], amount: Chips) -> Result<(), LedgerError> {
        // Check and debit under the same lock so no other session can interleave.
        let mut accounts = self.accounts.lock();
        for &user in users {
            let balance = *accounts.entry(user).or_insert(self.starting_balance);
            if balance < amount {
                return Err(LedgerError::InsufficientFunds { user, available: balance, required: amount });
            }
        }
        for &user in users {
            if let Some(balance) = accounts.get_mut(&user) {
                *balance -= amount;
            }
        }
        debug!(?users, amount, "debit_all");
        Ok(())
    }

    async fn credit_all(&self, credits: &[(UserId, Chips)]) -> Result<(), LedgerError> {
        let mut accounts = self.accounts.lock();
        for &(user, amount) in credits {
            let balance = accounts.entry(user).or_insert(self.starting_balance);
            *balance = balance.saturating_add(amount);
        }
        debug!(?credits, "credit_all");
        Ok(())
    }

    async fn top_balances(&self, n: usize) -> Result<Vec<(UserId, Chips)>, LedgerError> {
        let accounts = self.accounts.lock();
        let mut top: Vec<(UserId, Chips)> = accounts.iter().map(|(&u, &b)| (u, b)).collect();
        top.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        top.truncate(n);
        Ok(top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_accounts_open_with_starting_balance() {
        let ledger = InMemoryLedger::new(1000);
        assert_eq!(ledger.balance(7).await, Ok(1000));
    }

    #[tokio::test]
    async fn test_debit_fails_when_short() {
        let ledger = InMemoryLedger::new(50);
        let err = ledger.debit(1, 60).await.unwrap_err();
        assert_eq!(err, LedgerError::InsufficientFunds { user: 1, available: 50, required: 60 });
        assert_eq!(ledger.balance(1).await, Ok(50));
    }

    #[tokio::test]
    async fn test_debit_all_is_all_or_nothing() {
        let ledger = InMemoryLedger::new(100);
        ledger.set_balance(3, 20);
        assert!(ledger.debit_all(&[1, 2, 3], 50).await.is_err());
        for user in [1, 2] {
            assert_eq!(ledger.balance(user).await, Ok(100));
        }
        assert_eq!(ledger.balance(3).await, Ok(20));

        ledger.debit_all(&[1, 2], 50).await.unwrap();
        assert_eq!(ledger.balance(1).await, Ok(50));
        assert_eq!(ledger.balance(2).await, Ok(50));
    }

    /// Uses the trait's default multi-user operations over an in-memory book,
    /// with one account that cannot be debited and one that cannot be credited.
    struct Patchy {
        book: InMemoryLedger,
        no_debit: UserId,
        no_credit: UserId,
    }

    #[async_trait]
    impl Ledger for Patchy {
        async fn balance(&self, user: UserId) -> Result<Chips, LedgerError> {
            self.book.balance(user).await
        }

        async fn debit(&self, user: UserId, amount: Chips) -> Result<Chips, LedgerError> {
            if user == self.no_debit {
                return Err(LedgerError::Unavailable("debits are down".into()));
            }
            self.book.debit(user, amount).await
        }

        async fn credit(&self, user: UserId, amount: Chips) -> Result<Chips, LedgerError> {
            if user == self.no_credit {
                return Err(LedgerError::Unavailable("credits are down".into()));
            }
            self.book.credit(user, amount).await
        }

        async fn top_balances(&self, n: usize) -> Result<Vec<(UserId, Chips)>, LedgerError> {
            self.book.top_balances(n).await
        }
    }

    #[tokio::test]
    async fn test_default_debit_all_rolls_back_past_a_failed_credit() {
        let ledger = Patchy { book: InMemoryLedger::new(100), no_debit: 4, no_credit: 1 };
        let err = ledger.debit_all(&[1, 2, 3, 4], 30).await.unwrap_err();
        assert_eq!(err, LedgerError::Unavailable("debits are down".into()));

        // 1 stays debited because its credit is down, but 2 and 3 are restored
        assert_eq!(ledger.balance(1).await, Ok(70));
        assert_eq!(ledger.balance(2).await, Ok(100));
        assert_eq!(ledger.balance(3).await, Ok(100));
    }

    #[tokio::test]
    async fn test_default_credit_all_is_all_or_nothing() {
        let ledger = Patchy { book: InMemoryLedger::new(100), no_debit: 9, no_credit: 3 };
        let err = ledger.credit_all(&[(1, 10), (2, 20), (3, 30)]).await.unwrap_err();
        assert_eq!(err, LedgerError::Unavailable("credits are down".into()));
        for user in [1, 2, 3] {
            assert_eq!(ledger.balance(user).await, Ok(100));
        }

        ledger.credit_all(&[(1, 10), (2, 20)]).await.unwrap();
        assert_eq!(ledger.balance(2).await, Ok(120));
    }

    #[tokio::test]
    async fn test_top_balances_orders_richest_first() {
        let ledger = InMemoryLedger::new(0);
        ledger.set_balance(1, 10);
        ledger.set_balance(2, 30);
        ledger.set_balance(3, 20);
        assert_eq!(ledger.top_balances(2).await, Ok(vec![(2, 30), (3, 20)]));
    }
}
