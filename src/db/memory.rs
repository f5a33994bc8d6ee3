//! In-memory identity store
//!
//! Backs dev mode and tests. A single RwLock over the whole map makes
//! every operation, including the session-exclusivity flip, one atomic
//! unit.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::db::schemas::UserDoc;
use crate::db::store::IdentityStore;
use crate::types::{Result, WicketError};

#[derive(Default)]
pub struct MemoryIdentityStore {
    users: RwLock<HashMap<String, UserDoc>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn address_taken(users: &HashMap<String, UserDoc>, user: &UserDoc) -> bool {
        let Some(ref address) = user.blockchain_address else {
            return false;
        };
        users.values().any(|other| {
            other.email != user.email
                && other
                    .blockchain_address
                    .as_deref()
                    .is_some_and(|a| a.eq_ignore_ascii_case(address))
        })
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserDoc>> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn find_by_did(&self, did: &str) -> Result<Option<UserDoc>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.did.as_deref() == Some(did))
            .cloned())
    }

    async fn find_by_access_token(&self, token: &str) -> Result<Option<UserDoc>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.access_token.as_deref() == Some(token))
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<UserDoc>> {
        Ok(self.users.read().await.values().cloned().collect())
    }

    async fn insert(&self, user: UserDoc) -> Result<()> {
        let mut users = self.users.write().await;

        if users.contains_key(&user.email) {
            return Err(WicketError::Database(format!(
                "Duplicate identity: {}",
                user.email
            )));
        }
        if Self::address_taken(&users, &user) {
            return Err(WicketError::Database(format!(
                "Duplicate blockchain address on insert for {}",
                user.email
            )));
        }

        users.insert(user.email.clone(), user);
        Ok(())
    }

    async fn update(&self, user: &UserDoc) -> Result<()> {
        let mut users = self.users.write().await;

        if !users.contains_key(&user.email) {
            return Err(WicketError::Database(format!(
                "No such identity: {}",
                user.email
            )));
        }
        if Self::address_taken(&users, user) {
            return Err(WicketError::Database(format!(
                "Duplicate blockchain address on update for {}",
                user.email
            )));
        }

        users.insert(user.email.clone(), user.clone());
        Ok(())
    }

    async fn delete(&self, email: &str) -> Result<bool> {
        Ok(self.users.write().await.remove(email).is_some())
    }

    async fn set_exclusive_online(&self, email: &str, token: &str) -> Result<()> {
        let mut users = self.users.write().await;

        if !users.contains_key(email) {
            return Err(WicketError::Auth(format!("No such identity: {email}")));
        }

        for user in users.values_mut() {
            user.is_online = false;
        }

        let user = users.get_mut(email).expect("checked above");
        user.is_online = true;
        user.access_token = Some(token.to_string());

        Ok(())
    }
}
