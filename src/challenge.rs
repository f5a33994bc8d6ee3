//! Challenge registry
//!
//! In-memory storage for outstanding authentication challenges with TTL
//! support. One live challenge per address: issuing a new one replaces
//! (and thereby invalidates) the previous one.

use dashmap::DashMap;
use rand::RngCore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Entropy per challenge, hex-encoded on issue
pub const CHALLENGE_BYTES: usize = 16;

#[derive(Debug, Clone)]
struct ChallengeEntry {
    value: String,
    issued_at: Instant,
}

/// Challenge store with concurrent access and optional expiry
pub struct ChallengeRegistry {
    entries: DashMap<String, ChallengeEntry>,
    ttl: Option<Duration>,
}

impl ChallengeRegistry {
    /// Create a registry; `ttl` of None disables expiry
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Issue a fresh random challenge for an address, replacing any
    /// previous one. Addresses are keyed case-insensitively.
    pub fn issue(&self, address: &str) -> String {
        let mut bytes = [0u8; CHALLENGE_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let value = hex::encode(bytes);

        let entry = ChallengeEntry {
            value: value.clone(),
            issued_at: Instant::now(),
        };

        self.entries.insert(address.to_ascii_lowercase(), entry);
        debug!("Issued challenge for {}", address);

        value
    }

    /// Return the live challenge for an address without consuming it.
    /// Expired entries are dropped lazily here as well as by the sweeper.
    pub fn peek(&self, address: &str) -> Option<String> {
        let key = address.to_ascii_lowercase();

        if let Some(entry) = self.entries.get(&key) {
            if !self.is_expired(&entry) {
                return Some(entry.value.clone());
            }
        } else {
            return None;
        }

        self.entries.remove(&key);
        None
    }

    /// Drop all expired entries, returning how many were purged
    pub fn purge_expired(&self) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };

        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.issued_at.elapsed() < ttl);
        before - self.entries.len()
    }

    /// Number of live (possibly expired, not yet swept) entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &ChallengeEntry) -> bool {
        match self.ttl {
            Some(ttl) => entry.issued_at.elapsed() >= ttl,
            None => false,
        }
    }
}

/// Spawn the background sweeper that evicts expired challenges
pub fn spawn_sweeper_task(registry: Arc<ChallengeRegistry>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let purged = registry.purge_expired();
            if purged > 0 {
                info!("Challenge sweep: purged {} expired entries", purged);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_peek() {
        let registry = ChallengeRegistry::new(None);
        let challenge = registry.issue("0xAbC1");

        // 16 bytes of entropy, hex-encoded
        assert_eq!(challenge.len(), CHALLENGE_BYTES * 2);
        assert_eq!(registry.peek("0xAbC1"), Some(challenge.clone()));
        // peek does not consume
        assert_eq!(registry.peek("0xAbC1"), Some(challenge));
        assert_eq!(registry.peek("0xother"), None);
    }

    #[test]
    fn test_address_case_insensitive() {
        let registry = ChallengeRegistry::new(None);
        let challenge = registry.issue("0xABCDEF");

        assert_eq!(registry.peek("0xabcdef"), Some(challenge));
    }

    #[test]
    fn test_reissue_replaces() {
        let registry = ChallengeRegistry::new(None);
        let first = registry.issue("0xabc");
        let second = registry.issue("0xabc");

        assert_ne!(first, second);
        assert_eq!(registry.peek("0xabc"), Some(second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ttl_eviction() {
        let registry = ChallengeRegistry::new(Some(Duration::from_millis(0)));
        registry.issue("0xabc");

        // Zero TTL expires immediately
        assert_eq!(registry.peek("0xabc"), None);
        registry.issue("0xdef");
        assert_eq!(registry.purge_expired(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let registry = ChallengeRegistry::new(None);
        registry.issue("0xabc");

        assert_eq!(registry.purge_expired(), 0);
        assert!(registry.peek("0xabc").is_some());
    }

    #[test]
    fn test_concurrent_issue_distinct_addresses() {
        let registry = Arc::new(ChallengeRegistry::new(None));
        let mut handles = Vec::new();

        for i in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(std::thread::spawn(move || {
                let address = format!("0x{:040x}", i);
                let challenge = registry.issue(&address);
                assert_eq!(registry.peek(&address), Some(challenge));
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 16);
    }
}
