//! In-process [`UserStore`], used when no PostgreSQL instance is configured.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::account::{Account, AccountStatus, UserStore};
use crate::error::{Result, ServerError};

/// Accounts kept in memory. Ids start at 1.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    accounts: RwLock<Vec<Account>>,
}

impl MemoryUserStore {
    /// Create a new [`MemoryUserStore`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn select_by_id(&self, id: i64) -> Result<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn select_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.iter().find(|a| a.username == username).cloned())
    }

    async fn select_by_email(&self, email: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.iter().find(|a| a.email == email).cloned())
    }

    async fn insert(&self, account: &Account) -> Result<i64> {
        let mut accounts = self.accounts.write().await;

        if accounts.iter().any(|a| a.username == account.username) {
            return Err(ServerError::Duplicate { field: "username" });
        }
        if accounts.iter().any(|a| a.email == account.email) {
            return Err(ServerError::Duplicate { field: "email" });
        }

        let id = accounts.len() as i64 + 1;
        accounts.push(Account {
            id,
            ..account.clone()
        });

        Ok(id)
    }

    async fn update_status(
        &self,
        id: i64,
        status: AccountStatus,
    ) -> Result<u64> {
        let mut accounts = self.accounts.write().await;

        match accounts
            .iter_mut()
            .find(|a| a.id == id && a.status.can_become(status))
        {
            Some(account) => {
                account.status = status;
                Ok(1)
            },
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::account::AccountType;

    fn account(username: &str, email: &str) -> Account {
        Account {
            id: 0,
            username: username.into(),
            email: email.into(),
            password: "digest".into(),
            salt: "abcde".into(),
            account_type: AccountType::Ordinary,
            status: AccountStatus::Pending,
            activation_code: "code".into(),
            avatar_url: String::default(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let store = MemoryUserStore::new();
        assert!(store.is_empty().await);

        assert_eq!(store.insert(&account("alice", "a@x.com")).await.unwrap(), 1);
        assert_eq!(store.insert(&account("bob", "b@x.com")).await.unwrap(), 2);
        assert_eq!(store.len().await, 2);

        let bob = store.select_by_username("bob").await.unwrap().unwrap();
        assert_eq!(bob.id, 2);
        assert!(store.select_by_id(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_constraints() {
        let store = MemoryUserStore::new();
        store.insert(&account("alice", "a@x.com")).await.unwrap();

        let err = store.insert(&account("alice", "c@x.com")).await.unwrap_err();
        assert!(matches!(err, ServerError::Duplicate { field: "username" }));
        let err = store.insert(&account("carol", "a@x.com")).await.unwrap_err();
        assert!(matches!(err, ServerError::Duplicate { field: "email" }));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_status_never_reverts() {
        let store = MemoryUserStore::new();
        let id = store.insert(&account("alice", "a@x.com")).await.unwrap();

        assert_eq!(store.update_status(id, AccountStatus::Active).await.unwrap(), 1);
        assert_eq!(store.update_status(id, AccountStatus::Pending).await.unwrap(), 0);
        assert_eq!(store.update_status(42, AccountStatus::Active).await.unwrap(), 0);

        let alice = store.select_by_id(id).await.unwrap().unwrap();
        assert!(alice.is_active());
    }
}
