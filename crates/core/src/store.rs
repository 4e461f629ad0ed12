//! Token store accessor over two persistence tiers

use crate::error::{Result, SessionError};
use crate::token::Token;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

/// Persistence scope of a stored token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageTier {
    /// Survives browser restarts ("remember me")
    Durable,
    /// Lives only as long as the current tab
    PerTab,
}

impl StorageTier {
    /// The tier that is not `self`
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Durable => Self::PerTab,
            Self::PerTab => Self::Durable,
        }
    }
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Durable => f.write_str("durable"),
            Self::PerTab => f.write_str("per-tab"),
        }
    }
}

/// Key/value storage backing one tier
pub trait StorageBackend {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

impl<S: StorageBackend + ?Sized> StorageBackend for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// In-memory storage tier
///
/// Clones share the same map, so one instance can stand in for storage that
/// several tabs see at once.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Create an empty storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Reads, refreshes, and clears the session token across both tiers
pub struct TokenStore {
    durable: Rc<dyn StorageBackend>,
    per_tab: Rc<dyn StorageBackend>,
    key: String,
}

impl TokenStore {
    /// Create a store over the two tiers using `key` for the token
    pub fn new(
        durable: Rc<dyn StorageBackend>,
        per_tab: Rc<dyn StorageBackend>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            durable,
            per_tab,
            key: key.into(),
        }
    }

    fn backend(&self, tier: StorageTier) -> &dyn StorageBackend {
        match tier {
            StorageTier::Durable => self.durable.as_ref(),
            StorageTier::PerTab => self.per_tab.as_ref(),
        }
    }

    /// The storage key holding the token
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current token, durable tier first. Unreadable tiers count as empty.
    #[must_use]
    pub fn read(&self) -> Option<Token> {
        [StorageTier::Durable, StorageTier::PerTab]
            .into_iter()
            .find_map(|tier| match self.backend(tier).get(&self.key) {
                Ok(Some(raw)) if !raw.is_empty() => Some(Token::new(raw, tier)),
                Ok(_) => None,
                Err(e) => {
                    warn!(%tier, error = %e, "Failed to read token tier");
                    None
                }
            })
    }

    /// Replace the token in whichever tier currently holds it.
    ///
    /// Returns the tier written, or `None` when no tier holds a token.
    pub fn write(&self, raw: &str) -> Result<Option<StorageTier>> {
        let Some(tier) = self.read().map(|token| token.tier()) else {
            debug!("No stored token to replace, skipping write");
            return Ok(None);
        };
        self.backend(tier).set(&self.key, raw)?;
        Ok(Some(tier))
    }

    /// Store a freshly issued token in `tier` and evict it from the other one
    pub fn persist(&self, raw: &str, tier: StorageTier) -> Result<()> {
        self.backend(tier).set(&self.key, raw)?;
        self.backend(tier.other()).remove(&self.key)
    }

    /// Remove the token from both tiers, attempting both even if one fails
    pub fn clear(&self) -> Result<()> {
        let durable = self.durable.remove(&self.key);
        let per_tab = self.per_tab.remove(&self.key);
        match (durable, per_tab) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(first), Err(second)) => Err(SessionError::storage(format!(
                "durable: {first}; per-tab: {second}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tests::token_expiring_at;

    fn store() -> (TokenStore, MemoryStorage, MemoryStorage) {
        let durable = MemoryStorage::new();
        let per_tab = MemoryStorage::new();
        let store = TokenStore::new(
            Rc::new(durable.clone()),
            Rc::new(per_tab.clone()),
            "token",
        );
        (store, durable, per_tab)
    }

    struct BrokenStorage;

    impl StorageBackend for BrokenStorage {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(SessionError::storage("security error"))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(SessionError::storage("security error"))
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Err(SessionError::storage("security error"))
        }
    }

    #[test]
    fn test_read_prefers_durable_tier() {
        let (store, durable, per_tab) = store();
        assert!(store.read().is_none());

        per_tab.set("token", "per-tab-value").unwrap();
        assert_eq!(store.read().unwrap().tier(), StorageTier::PerTab);

        durable.set("token", "durable-value").unwrap();
        let token = store.read().unwrap();
        assert_eq!(token.tier(), StorageTier::Durable);
        assert_eq!(token.raw(), "durable-value");
    }

    #[test]
    fn test_empty_value_counts_as_absent() {
        let (store, durable, _) = store();
        durable.set("token", "").unwrap();
        assert!(store.read().is_none());
    }

    #[test]
    fn test_write_keeps_owning_tier() {
        let (store, durable, per_tab) = store();
        let old = token_expiring_at(100);
        let new = token_expiring_at(200);

        per_tab.set("token", &old).unwrap();
        assert_eq!(store.write(&new).unwrap(), Some(StorageTier::PerTab));
        assert_eq!(per_tab.get("token").unwrap(), Some(new));
        assert!(durable.is_empty());
    }

    #[test]
    fn test_write_without_holder_is_noop() {
        let (store, durable, per_tab) = store();
        assert_eq!(store.write("anything").unwrap(), None);
        assert!(durable.is_empty());
        assert!(per_tab.is_empty());
    }

    #[test]
    fn test_persist_never_splits_ownership() {
        let (store, durable, per_tab) = store();
        store.persist("first", StorageTier::PerTab).unwrap();
        store.persist("second", StorageTier::Durable).unwrap();
        assert_eq!(durable.get("token").unwrap().as_deref(), Some("second"));
        assert!(per_tab.is_empty());
    }

    #[test]
    fn test_clear_removes_both_tiers() {
        let (store, durable, per_tab) = store();
        durable.set("token", "a").unwrap();
        per_tab.set("token", "b").unwrap();
        durable.set("theme", "dark").unwrap();

        store.clear().unwrap();
        assert!(store.read().is_none());
        assert_eq!(durable.get("theme").unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn test_unreadable_tier_falls_through() {
        let per_tab = MemoryStorage::new();
        per_tab.set("token", "value").unwrap();
        let store = TokenStore::new(Rc::new(BrokenStorage), Rc::new(per_tab.clone()), "token");

        assert_eq!(store.read().unwrap().tier(), StorageTier::PerTab);
        assert!(store.clear().is_err());
        assert!(per_tab.is_empty(), "healthy tier is still cleared");
    }
}
