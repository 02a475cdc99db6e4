//! Serializable token cache and the session that persists it.
//!
//! [`TokenCache`] tracks whether it changed since it was loaded or last
//! saved. [`CacheSession`] owns a cache together with its store, and writes
//! it back once, on close or on drop, only when it is dirty.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::persistence::{Persistence, StoreKind};
use crate::auth::tokens::{AuthResult, IdTokenClaims};
use crate::error::{PatError, Result};

/// Format version written into new caches.
const CACHE_VERSION: u32 = 1;

/// One signed-in identity and its refresh material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAccount {
    /// `<oid>.<tid>` of the user.
    pub home_account_id: String,
    /// Host of the authority the account signed in against.
    pub environment: String,
    /// Client the refresh token was issued to.
    pub client_id: String,
    /// Sign-in name, for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Long-lived refresh token.
    pub refresh_token: String,
}

impl CachedAccount {
    /// Builds an account entry from a successful acquisition.
    ///
    /// Returns `None` when the result has no refresh token or no identity.
    #[must_use]
    pub fn from_result(
        result: &AuthResult,
        client_id: &str,
        environment: &str,
        previous: Option<&Self>,
    ) -> Option<Self> {
        let refresh_token = result.refresh_token.clone()?;
        let claims = result.id_token_claims.as_ref();

        let home_account_id = claims
            .and_then(IdTokenClaims::home_account_id)
            .or_else(|| previous.map(|p| p.home_account_id.clone()))?;
        let username = claims
            .and_then(|c| c.preferred_username.clone())
            .or_else(|| previous.and_then(|p| p.username.clone()));

        Some(Self {
            home_account_id,
            environment: environment.to_string(),
            client_id: client_id.to_string(),
            username,
            refresh_token,
        })
    }

    /// Whether this entry is the same identity for the same client.
    fn same_identity(&self, other: &Self) -> bool {
        self.home_account_id == other.home_account_id
            && self.environment == other.environment
            && self.client_id == other.client_id
    }
}

/// In-memory credential cache with a dirty flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCache {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    accounts: Vec<CachedAccount>,
    #[serde(skip)]
    dirty: bool,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION,
            accounts: Vec::new(),
            dirty: false,
        }
    }
}

impl TokenCache {
    /// Parses a serialized cache. The result starts clean.
    pub fn deserialize(contents: &str) -> serde_json::Result<Self> {
        let mut cache: Self = serde_json::from_str(contents)?;
        cache.dirty = false;
        Ok(cache)
    }

    /// Serializes the cache to its storage format.
    pub fn serialize(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Whether the cache changed since it was loaded or last saved.
    #[must_use]
    pub const fn has_state_changed(&self) -> bool {
        self.dirty
    }

    /// All cached accounts, in insertion order.
    #[must_use]
    pub fn accounts(&self) -> &[CachedAccount] {
        &self.accounts
    }

    /// Accounts usable by `client_id` against `environment`.
    pub fn accounts_for<'a>(
        &'a self,
        client_id: &'a str,
        environment: &'a str,
    ) -> impl Iterator<Item = &'a CachedAccount> + 'a {
        self.accounts
            .iter()
            .filter(move |a| a.client_id == client_id && a.environment == environment)
    }

    /// Inserts or replaces an account. Marks the cache dirty only if
    /// something actually changed.
    pub fn upsert_account(&mut self, account: CachedAccount) {
        match self.accounts.iter_mut().find(|a| a.same_identity(&account)) {
            Some(existing) if *existing == account => {},
            Some(existing) => {
                *existing = account;
                self.dirty = true;
            },
            None => {
                self.accounts.push(account);
                self.dirty = true;
            },
        }
    }

    fn mark_saved(&mut self) {
        self.dirty = false;
    }
}

/// Deletes whatever `store` holds. Returns whether anything was stored.
///
/// The blob is not required to parse, so a corrupt cache can always be reset.
pub fn purge_store(store: &dyn Persistence) -> Result<bool> {
    let signed_in = match store.load() {
        Ok(None) => return Ok(false),
        Ok(Some(contents)) => match TokenCache::deserialize(&contents) {
            Ok(cache) => !cache.accounts().is_empty(),
            Err(e) => {
                warn!(store = %store.kind(), error = %e, "discarding unreadable token cache");
                true
            },
        },
        Err(e) => {
            warn!(store = %store.kind(), error = %e, "token cache unreadable, deleting it");
            true
        },
    };
    store.delete()?;
    Ok(signed_in)
}

/// A token cache bound to its store for the duration of a scope.
///
/// Dropping the session saves a dirty cache; [`close`](Self::close) does the
/// same but reports failures to the caller.
pub struct CacheSession {
    cache: TokenCache,
    store: Box<dyn Persistence>,
    closed: bool,
}

impl CacheSession {
    /// Loads the cache from `store`, or starts empty if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`PatError::CorruptCache`] if the stored blob cannot be parsed,
    /// or a storage error if the store cannot be read.
    pub fn open(store: Box<dyn Persistence>) -> Result<Self> {
        let kind = store.kind();
        let cache = match store.load()? {
            Some(contents) => {
                let cache =
                    TokenCache::deserialize(&contents).map_err(|e| PatError::CorruptCache {
                        location: kind.to_string(),
                        reason: e.to_string(),
                    })?;
                debug!(store = %kind, accounts = cache.accounts().len(), "loaded token cache");
                cache
            },
            None => {
                debug!(store = %kind, "no token cache stored, starting empty");
                TokenCache::default()
            },
        };

        Ok(Self {
            cache,
            store,
            closed: false,
        })
    }

    /// The cached credentials.
    #[must_use]
    pub const fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Mutable access for the authenticator.
    pub fn cache_mut(&mut self) -> &mut TokenCache {
        &mut self.cache
    }

    /// Kind of store backing this session.
    #[must_use]
    pub fn store_kind(&self) -> StoreKind {
        self.store.kind()
    }

    /// Writes the cache if it changed. Returns whether a write happened.
    pub fn save(&mut self) -> Result<bool> {
        if !self.cache.has_state_changed() {
            debug!("Token cache unchanged, skipping save.");
            return Ok(false);
        }

        let contents = self.cache.serialize()?;
        self.store.save(&contents)?;
        self.cache.mark_saved();
        info!(store = %self.store.kind(), "Token cache saved");
        Ok(true)
    }

    /// Saves if dirty and ends the session.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.save().map(|_| ())
    }
}

impl Drop for CacheSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.save() {
            warn!(error = %e, "failed to save token cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::persistence::{FilePersistence, MockPersistence};
    use tempfile::TempDir;

    fn account(id: &str, refresh: &str) -> CachedAccount {
        CachedAccount {
            home_account_id: id.to_string(),
            environment: "login.microsoftonline.com".to_string(),
            client_id: "client".to_string(),
            username: Some(format!("{id}@contoso.com")),
            refresh_token: refresh.to_string(),
        }
    }

    fn stored(contents: Option<&str>) -> MockPersistence {
        let contents = contents.map(String::from);
        let mut store = MockPersistence::new();
        store.expect_load().returning(move || Ok(contents.clone()));
        store.expect_kind().return_const(StoreKind::Plaintext);
        store
    }

    #[test]
    fn clean_cache_is_never_written() {
        let mut store = stored(None);
        store.expect_save().times(0);

        let mut session = CacheSession::open(Box::new(store)).unwrap();
        assert!(!session.save().unwrap());
        assert!(!session.save().unwrap());
        session.close().unwrap();
    }

    #[test]
    fn dirty_cache_is_written_exactly_once() {
        let mut store = stored(None);
        store.expect_save().times(1).returning(|_| Ok(()));

        let mut session = CacheSession::open(Box::new(store)).unwrap();
        session.cache_mut().upsert_account(account("a", "rt1"));
        assert!(session.cache().has_state_changed());

        assert!(session.save().unwrap());
        assert!(!session.cache().has_state_changed());
        assert!(!session.save().unwrap());
    }

    #[test]
    fn drop_saves_dirty_cache() {
        let mut store = stored(None);
        store
            .expect_save()
            .withf(|contents| contents.contains("rt-dropped"))
            .times(1)
            .returning(|_| Ok(()));

        let mut session = CacheSession::open(Box::new(store)).unwrap();
        session.cache_mut().upsert_account(account("a", "rt-dropped"));
        drop(session);
    }

    #[test]
    fn close_reports_save_failure() {
        let mut store = stored(None);
        store
            .expect_save()
            .times(1)
            .returning(|_| Err(PatError::CredentialStorage("locked".to_string())));

        let mut session = CacheSession::open(Box::new(store)).unwrap();
        session.cache_mut().upsert_account(account("a", "rt1"));
        assert!(matches!(session.close(), Err(PatError::CredentialStorage(_))));
    }

    #[test]
    fn loaded_cache_starts_clean() {
        let blob = TokenCache {
            version: CACHE_VERSION,
            accounts: vec![account("a", "rt1")],
            dirty: true,
        }
        .serialize()
        .unwrap();
        let mut store = stored(Some(&blob));
        store.expect_save().times(0);

        let session = CacheSession::open(Box::new(store)).unwrap();
        assert_eq!(session.cache().accounts().len(), 1);
        assert!(!session.cache().has_state_changed());
    }

    #[test]
    fn corrupt_cache_is_fatal() {
        let store = stored(Some("{ not json"));
        let result = CacheSession::open(Box::new(store));
        assert!(matches!(result, Err(PatError::CorruptCache { .. })));
    }

    #[test]
    fn upsert_same_account_is_not_a_change() {
        let mut cache = TokenCache::default();
        cache.upsert_account(account("a", "rt1"));
        cache.mark_saved();

        cache.upsert_account(account("a", "rt1"));
        assert!(!cache.has_state_changed());

        cache.upsert_account(account("a", "rt2"));
        assert!(cache.has_state_changed());
        assert_eq!(cache.accounts().len(), 1);
        assert_eq!(cache.accounts()[0].refresh_token, "rt2");
    }

    #[test]
    fn accounts_for_filters_by_client_and_environment() {
        let mut cache = TokenCache::default();
        cache.upsert_account(account("a", "rt1"));
        let mut other = account("b", "rt2");
        other.client_id = "other-client".to_string();
        cache.upsert_account(other);

        let ids: Vec<_> = cache
            .accounts_for("client", "login.microsoftonline.com")
            .map(|a| a.home_account_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn file_backed_session_persists_across_opens() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token.bin");

        let mut session = CacheSession::open(Box::new(FilePersistence::new(&path))).unwrap();
        session.cache_mut().upsert_account(account("a", "rt1"));
        session.close().unwrap();

        let session = CacheSession::open(Box::new(FilePersistence::new(&path))).unwrap();
        assert_eq!(session.cache().accounts()[0].home_account_id, "a");
    }

    #[test]
    fn interactive_save_then_close_writes_once() {
        let mut store = stored(None);
        store.expect_save().times(1).returning(|_| Ok(()));

        let mut session = CacheSession::open(Box::new(store)).unwrap();
        session.cache_mut().upsert_account(account("a", "rt1"));
        assert!(session.save().unwrap());
        session.close().unwrap();
    }

    #[test]
    fn purge_store_deletes_stored_blob() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token.bin");
        let mut session = CacheSession::open(Box::new(FilePersistence::new(&path))).unwrap();
        session.cache_mut().upsert_account(account("a", "rt1"));
        session.close().unwrap();

        assert!(purge_store(&FilePersistence::new(&path)).unwrap());
        assert!(!path.exists());
        assert!(!purge_store(&FilePersistence::new(&path)).unwrap());
    }

    #[test]
    fn purge_store_removes_corrupt_cache() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token.bin");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            CacheSession::open(Box::new(FilePersistence::new(&path))),
            Err(PatError::CorruptCache { .. })
        ));

        assert!(purge_store(&FilePersistence::new(&path)).unwrap());
        assert!(!path.exists());
        assert!(CacheSession::open(Box::new(FilePersistence::new(&path))).is_ok());
    }

    #[test]
    fn purge_store_skips_delete_when_nothing_stored() {
        let mut store = stored(None);
        store.expect_delete().times(0);
        assert!(!purge_store(&store).unwrap());
    }
}
