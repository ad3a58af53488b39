//! Client identity resolution
//!
//! Every delivery is tagged with a [`UserKey`]. Resolution order:
//!
//! 1. The override marker (test user cookie), verbatim, whenever it is set
//! 2. The anonymous key persisted in durable storage
//! 3. A freshly generated `anon_xxxxxxxxx` key, persisted for next time
//!
//! Identity is resolved on every flush and never cached, so setting or
//! clearing the marker mid-session changes the very next delivery.

mod marker;
mod store;

pub use marker::{cookie_value, OverrideMarker};
pub use store::{FileKeyStore, KeyStore, MemoryKeyStore};

use std::sync::Arc;

use crate::error::Result;
use crate::types::UserKey;

/// Prefix of generated anonymous keys
pub const ANONYMOUS_PREFIX: &str = "anon_";

/// Number of random base36 characters after the prefix
const ANONYMOUS_SUFFIX_LEN: usize = 9;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Resolves the identity attached to deliveries.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn KeyStore>,
    marker: OverrideMarker,
    storage_key: String,
}

impl IdentityResolver {
    pub fn new(
        store: Arc<dyn KeyStore>,
        marker: OverrideMarker,
        storage_key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            marker,
            storage_key: storage_key.into(),
        }
    }

    /// Resolve the current identity. Never fails.
    ///
    /// Storage errors are logged and answered with a transient key that is
    /// used for this call only.
    pub fn resolve(&self) -> UserKey {
        if let Some(value) = self.marker.current() {
            tracing::debug!(user = %value, "Test user detected");
            return UserKey::Override(value);
        }

        match self.store.get(&self.storage_key) {
            Ok(Some(key)) if !key.is_empty() => {
                tracing::trace!("Using anonymous key");
                UserKey::Anonymous(key)
            }
            Ok(_) => {
                let key = generate_anonymous_key();
                if let Err(e) = self.store.set(&self.storage_key, &key) {
                    tracing::warn!(error = %e, "Failed to persist anonymous key, using transient key");
                } else {
                    tracing::info!("Created new anonymous key");
                }
                UserKey::Anonymous(key)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Key storage unavailable, using transient key");
                UserKey::Anonymous(generate_anonymous_key())
            }
        }
    }

    /// Forget the persisted anonymous key; the next resolve creates a new one.
    pub fn reset(&self) -> Result<()> {
        self.store.remove(&self.storage_key)
    }

    pub fn marker(&self) -> &OverrideMarker {
        &self.marker
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }
}

/// Generate `anon_` followed by 9 random base36 characters.
pub fn generate_anonymous_key() -> String {
    // The low 62 bits of a v4 UUID are random; 9 base36 digits need ~47.
    let mut bits = uuid::Uuid::new_v4().as_u128();
    let mut key = String::with_capacity(ANONYMOUS_PREFIX.len() + ANONYMOUS_SUFFIX_LEN);
    key.push_str(ANONYMOUS_PREFIX);
    for _ in 0..ANONYMOUS_SUFFIX_LEN {
        key.push(BASE36[(bits % 36) as usize] as char);
        bits /= 36;
    }
    key
}

/// True if `key` looks like a generated anonymous key.
pub fn is_anonymous_key(key: &str) -> bool {
    key.strip_prefix(ANONYMOUS_PREFIX).is_some_and(|suffix| {
        suffix.len() == ANONYMOUS_SUFFIX_LEN
            && suffix
                .bytes()
                .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const STORAGE_KEY: &str = "currents_user_key";

    fn resolver_with(store: Arc<dyn KeyStore>) -> IdentityResolver {
        IdentityResolver::new(store, OverrideMarker::new("currents_test_user"), STORAGE_KEY)
    }

    /// Store whose every operation fails.
    struct BrokenStore;

    impl KeyStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::Storage("disk on fire".to_string()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Storage("disk on fire".to_string()))
        }
        fn remove(&self, _key: &str) -> Result<()> {
            Err(Error::Storage("disk on fire".to_string()))
        }
    }

    /// Store that reads fine but refuses writes.
    #[derive(Default)]
    struct ReadOnlyStore;

    impl KeyStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }
        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Storage("quota exceeded".to_string()))
        }
        fn remove(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_generated_key_format() {
        for _ in 0..50 {
            let key = generate_anonymous_key();
            assert!(is_anonymous_key(&key), "bad key: {}", key);
            assert_eq!(key.len(), 14);
        }
        assert!(!is_anonymous_key("roy"));
        assert!(!is_anonymous_key("anon_ABCDEFGHI"));
    }

    #[test]
    fn test_resolve_is_stable_without_override() {
        let store = Arc::new(MemoryKeyStore::new());
        let resolver = resolver_with(store.clone());

        let first = resolver.resolve();
        let second = resolver.resolve();

        assert!(first.is_anonymous());
        assert_eq!(first, second);
        assert_eq!(
            store.get(STORAGE_KEY).unwrap().as_deref(),
            Some(first.as_str())
        );
    }

    #[test]
    fn test_resolve_reuses_persisted_key() {
        let store = Arc::new(MemoryKeyStore::new());
        store.set(STORAGE_KEY, "anon_persisted").unwrap();

        let resolver = resolver_with(store);
        assert_eq!(
            resolver.resolve(),
            UserKey::Anonymous("anon_persisted".to_string())
        );
    }

    #[test]
    fn test_override_wins_over_persisted_key() {
        let store = Arc::new(MemoryKeyStore::new());
        store.set(STORAGE_KEY, "anon_persisted").unwrap();
        let resolver = resolver_with(store.clone());

        resolver.marker().set("roy");
        assert_eq!(resolver.resolve(), UserKey::Override("roy".to_string()));

        // Persisted key untouched and back in effect once the marker goes away
        resolver.marker().clear();
        assert_eq!(
            resolver.resolve(),
            UserKey::Anonymous("anon_persisted".to_string())
        );
    }

    #[test]
    fn test_storage_failure_degrades_to_transient_key() {
        let resolver = resolver_with(Arc::new(BrokenStore));

        let first = resolver.resolve();
        let second = resolver.resolve();

        assert!(is_anonymous_key(first.as_str()));
        assert!(is_anonymous_key(second.as_str()));
    }

    #[test]
    fn test_write_failure_still_returns_key() {
        let resolver = resolver_with(Arc::new(ReadOnlyStore));
        assert!(is_anonymous_key(resolver.resolve().as_str()));
    }

    #[test]
    fn test_reset_forgets_key() {
        let store = Arc::new(MemoryKeyStore::new());
        let resolver = resolver_with(store.clone());

        let first = resolver.resolve();
        resolver.reset().unwrap();
        assert_eq!(store.get(STORAGE_KEY).unwrap(), None);

        let second = resolver.resolve();
        assert_ne!(first, second);
    }
}
