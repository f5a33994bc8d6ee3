//! The identity-store interface consumed by the core
//!
//! Logical operations only; schema and connection management live in the
//! implementations. Implementations must provide read-after-write
//! consistency within a single logical call, and `set_exclusive_online`
//! must apply as one atomic unit: a crash or interleaving mid-transition
//! must not leave two identities online, nor zero.

use async_trait::async_trait;

use crate::db::schemas::UserDoc;
use crate::types::Result;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Look up an identity by its login key
    async fn find_by_email(&self, email: &str) -> Result<Option<UserDoc>>;

    /// Look up an identity by its decentralized identifier
    async fn find_by_did(&self, did: &str) -> Result<Option<UserDoc>>;

    /// Look up the identity holding the given session token
    async fn find_by_access_token(&self, token: &str) -> Result<Option<UserDoc>>;

    /// All live identities
    async fn list_all(&self) -> Result<Vec<UserDoc>>;

    /// Insert a new identity. Fails on a duplicate email or a duplicate
    /// blockchain address; the latter is an invariant violation and must
    /// abort the operation rather than overwrite.
    async fn insert(&self, user: UserDoc) -> Result<()>;

    /// Replace the identity with the same email
    async fn update(&self, user: &UserDoc) -> Result<()>;

    /// Remove an identity, returning whether it existed
    async fn delete(&self, email: &str) -> Result<bool>;

    /// Session-exclusivity flip: mark every other identity offline, then
    /// mark `email` online holding `token`. One logical transaction.
    async fn set_exclusive_online(&self, email: &str, token: &str) -> Result<()>;
}
