//! Key-pool catalogue
//!
//! A finite, read-only list of pre-existing (address, private key) pairs
//! supplied out-of-band as a JSON fixture. The pool never generates keys;
//! allocation hands out existing entries in catalogue order.

pub mod allocator;

pub use allocator::{allocate, AllocatedIdentity};

use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::types::{Result, WicketError};

/// One catalogue entry. Private-key material is wiped on drop.
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct PoolAccount {
    /// 0x-prefixed address
    pub account: String,
    /// 0x-prefixed hex private key
    pub private_key: String,
}

impl fmt::Debug for PoolAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolAccount")
            .field("account", &self.account)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// The fixed key-pool catalogue
pub struct KeyPool {
    accounts: Vec<PoolAccount>,
}

impl KeyPool {
    /// Load the catalogue from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let accounts: Vec<PoolAccount> = serde_json::from_str(&raw).map_err(|e| {
            WicketError::Config(format!(
                "Invalid key-pool file {}: {e}",
                path.as_ref().display()
            ))
        })?;

        Ok(Self { accounts })
    }

    /// Build a pool from in-memory entries (tests, dev mode)
    pub fn from_accounts(accounts: Vec<PoolAccount>) -> Self {
        Self { accounts }
    }

    /// An empty pool; every allocation fails
    pub fn empty() -> Self {
        Self {
            accounts: Vec::new(),
        }
    }

    /// First entry in catalogue order whose address is not in `used`.
    /// Addresses compare case-insensitively; `used` must hold lowercase
    /// addresses.
    pub fn first_free(&self, used: &HashSet<String>) -> Option<&PoolAccount> {
        self.accounts
            .iter()
            .find(|entry| !used.contains(&entry.account.to_ascii_lowercase()))
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn test_pool(n: usize) -> KeyPool {
    use k256::ecdsa::{SigningKey, VerifyingKey};
    use rand::rngs::OsRng;

    let accounts = (0..n)
        .map(|_| {
            let key = SigningKey::random(&mut OsRng);
            let account = crate::wallet::derive_address(&VerifyingKey::from(&key));
            PoolAccount {
                account,
                private_key: format!("0x{}", hex::encode(key.to_bytes())),
            }
        })
        .collect();

    KeyPool::from_accounts(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_free_catalogue_order() {
        let pool = test_pool(3);
        let mut used = HashSet::new();

        let first = pool.first_free(&used).unwrap().account.clone();
        used.insert(first.to_ascii_lowercase());

        let second = pool.first_free(&used).unwrap().account.clone();
        assert_ne!(first, second);

        // Mixed-case usage still blocks the entry
        used.insert(second.to_ascii_lowercase());
        let third = pool.first_free(&used).unwrap().account.clone();
        assert_ne!(third, first);
        assert_ne!(third, second);
    }

    #[test]
    fn test_exhausted_pool() {
        let pool = test_pool(1);
        let mut used = HashSet::new();
        used.insert(pool.first_free(&used).unwrap().account.to_ascii_lowercase());

        assert!(pool.first_free(&used).is_none());
        assert!(KeyPool::empty().first_free(&HashSet::new()).is_none());
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let dir = std::env::temp_dir();
        let path = dir.join("wicket-bad-pool.json");
        std::fs::write(&path, "{ not json ]").unwrap();

        assert!(KeyPool::load(&path).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_catalogue_file() {
        let dir = std::env::temp_dir();
        let path = dir.join("wicket-pool.json");
        std::fs::write(
            &path,
            r#"[{"account": "0xAb01", "privateKey": "0x01"}, {"account": "0xAb02", "privateKey": "0x02"}]"#,
        )
        .unwrap();

        let pool = KeyPool::load(&path).unwrap();
        assert_eq!(pool.len(), 2);
        std::fs::remove_file(&path).ok();
    }
}
