//! Identity allocation
//!
//! Picks a free key-pool entry and derives its public key and DID. The
//! allocator holds no state of its own: the caller supplies the set of
//! already-allocated addresses, computed from the authoritative identity
//! store, and MUST hold a mutual-exclusion lock spanning
//! "read used addresses -> pick free entry -> persist assignment".

use std::collections::HashSet;

use crate::keypool::KeyPool;
use crate::types::{Result, WicketError};
use crate::wallet::{self, DID_KEY_PREFIX};

/// The bundle handed to a newly bound identity
#[derive(Clone)]
pub struct AllocatedIdentity {
    pub address: String,
    pub private_key: String,
    pub public_key: String,
    pub did: String,
}

/// Allocate the first free catalogue entry.
///
/// `already_used` holds lowercase addresses currently bound to identity
/// records. Exhaustion is a normal, recoverable outcome reported as
/// `NoAvailableAccounts`, never a panic.
pub fn allocate(pool: &KeyPool, already_used: &HashSet<String>) -> Result<AllocatedIdentity> {
    let entry = pool
        .first_free(already_used)
        .ok_or(WicketError::NoAvailableAccounts)?;

    let public_key = wallet::derive_public_key(&entry.private_key)?;

    Ok(AllocatedIdentity {
        address: entry.account.clone(),
        private_key: entry.private_key.clone(),
        public_key: public_key.clone(),
        did: format!("{DID_KEY_PREFIX}{public_key}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypool::test_pool;

    #[test]
    fn test_allocates_in_order_until_exhausted() {
        let pool = test_pool(3);
        let mut used = HashSet::new();
        let mut seen = Vec::new();

        for _ in 0..3 {
            let identity = allocate(&pool, &used).unwrap();
            assert!(!seen.contains(&identity.address));
            used.insert(identity.address.to_ascii_lowercase());
            seen.push(identity.address);
        }

        assert!(matches!(
            allocate(&pool, &used),
            Err(WicketError::NoAvailableAccounts)
        ));
    }

    #[test]
    fn test_bundle_is_consistent() {
        let pool = test_pool(1);
        let identity = allocate(&pool, &HashSet::new()).unwrap();

        // Derivations agree with the wallet module
        assert_eq!(
            identity.public_key,
            wallet::derive_public_key(&identity.private_key).unwrap()
        );
        assert_eq!(identity.did, format!("did:key:{}", identity.public_key));
        assert_eq!(
            identity.address.to_ascii_lowercase(),
            wallet::keys::address_for_private_key(&identity.private_key)
                .unwrap()
                .to_ascii_lowercase()
        );
    }

    #[test]
    fn test_skips_used_entries() {
        let pool = test_pool(2);
        let first = allocate(&pool, &HashSet::new()).unwrap();

        let mut used = HashSet::new();
        used.insert(first.address.to_ascii_lowercase());

        let second = allocate(&pool, &used).unwrap();
        assert_ne!(first.address, second.address);
    }
}
