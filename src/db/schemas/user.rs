//! Identity record schema
//!
//! One document per identity. When `is_pwless` is false the wallet
//! fields (address, keys, DID) are absent; enabling passwordless login
//! binds a key-pool identity and fills them in. At most one record may
//! hold a given blockchain address at any time; the sparse unique index
//! backstops the allocator's critical section.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::keypool::AllocatedIdentity;

/// Collection name for identities
pub const USER_COLLECTION: &str = "users";

/// Identity document
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    pub username: String,

    /// Login key, unique per identity
    pub email: String,

    #[serde(default)]
    pub phone: String,

    /// Argon2 password hash (PHC string)
    pub password_hash: String,

    #[serde(default)]
    pub role: Role,

    /// Wallet binding, present only when is_pwless is true
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blockchain_address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,

    /// Whether passwordless (challenge-signature) login is enabled
    #[serde(default)]
    pub is_pwless: bool,

    /// Whether this identity holds the single online session
    #[serde(default)]
    pub is_online: bool,

    /// The token of the current online session, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl UserDoc {
    /// Create a new identity with no wallet binding
    pub fn new(
        username: String,
        email: String,
        phone: String,
        password_hash: String,
        role: Role,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            username,
            email,
            phone,
            password_hash,
            role,
            blockchain_address: None,
            public_key: None,
            private_key: None,
            did: None,
            is_pwless: false,
            is_online: false,
            access_token: None,
        }
    }

    /// Bind an allocated key-pool identity to this record
    pub fn attach_wallet(&mut self, identity: AllocatedIdentity) {
        self.blockchain_address = Some(identity.address);
        self.public_key = Some(identity.public_key);
        self.private_key = Some(identity.private_key);
        self.did = Some(identity.did);
        self.is_pwless = true;
    }

    /// Clear the wallet binding, releasing the pool address
    pub fn clear_wallet(&mut self) {
        self.blockchain_address = None;
        self.public_key = None;
        self.private_key = None;
        self.did = None;
        self.is_pwless = false;
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
            // Sparse: only records with a wallet binding participate, but
            // among those the address must be unique.
            (
                doc! { "blockchain_address": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .sparse(true)
                        .name("blockchain_address_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "did": 1 },
                Some(
                    IndexOptions::builder()
                        .name("did_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
