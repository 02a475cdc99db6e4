//! Storage backends for the token cache and the policy that picks one.
//!
//! - Windows: Credential Manager (DPAPI protected), split over several entries
//! - macOS: login Keychain
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - anything else, or an explicitly allowed fallback: a plain file
//!
//! The cache blob is opaque here; stores only move strings in and out.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use keyring::Entry;
use tracing::{debug, warn};

use crate::error::{PatError, Result};

/// Name used for the keychain service and the secret-service schema.
pub const STORE_NAME: &str = "AzPAT_Manager";

/// Value of the `flavor` attribute on Linux.
const FLAVOR: &str = "rust";

/// Largest value Credential Manager accepts, in UTF-16 code units.
pub const CREDENTIAL_MAX_UNITS: usize = 1280;

/// Prefix of the index value written under the base account of a chunked store.
const CHUNK_INDEX_PREFIX: &str = "chunks:";

/// Durable home for the serialized token cache.
#[cfg_attr(test, mockall::automock)]
pub trait Persistence: Send {
    /// Reads the stored blob. `None` when nothing has been stored yet.
    fn load(&self) -> Result<Option<String>>;

    /// Replaces the stored blob.
    fn save(&self, contents: &str) -> Result<()>;

    /// Removes the stored blob. No-op when nothing is stored.
    fn delete(&self) -> Result<()>;

    /// Which kind of backend this is.
    fn kind(&self) -> StoreKind;
}

/// Kinds of backend the selector can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// OS-encrypted store (Credential Manager on Windows).
    Encrypted,
    /// macOS Keychain.
    Keychain,
    /// Freedesktop Secret Service.
    SecretService,
    /// Unencrypted file.
    Plaintext,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encrypted => write!(f, "encrypted store"),
            Self::Keychain => write!(f, "keychain"),
            Self::SecretService => write!(f, "secret service"),
            Self::Plaintext => write!(f, "plaintext file"),
        }
    }
}

/// Operating system family, as far as store selection cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Windows,
    MacOs,
    Linux,
    Other,
}

impl HostOs {
    /// The OS this binary was built for.
    #[must_use]
    pub fn current() -> Self {
        match std::env::consts::OS {
            "windows" => Self::Windows,
            "macos" => Self::MacOs,
            "linux" => Self::Linux,
            _ => Self::Other,
        }
    }
}

/// Description of a secure store to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureTarget {
    /// Backend kind.
    pub kind: StoreKind,
    /// Keyring service name (secret-service schema on Linux).
    pub service: String,
    /// Keyring account name.
    pub account: String,
}

impl SecureTarget {
    /// Target the selection policy uses for `host`, if it has a secure store.
    #[must_use]
    pub fn for_host(host: HostOs, location: &Path) -> Option<Self> {
        match host {
            HostOs::Windows => Some(Self {
                kind: StoreKind::Encrypted,
                service: STORE_NAME.to_string(),
                account: location.display().to_string(),
            }),
            HostOs::MacOs => Some(Self {
                kind: StoreKind::Keychain,
                service: STORE_NAME.to_string(),
                account: STORE_NAME.to_string(),
            }),
            HostOs::Linux => Some(Self {
                kind: StoreKind::SecretService,
                service: STORE_NAME.to_string(),
                account: format!("application={STORE_NAME};flavor={FLAVOR}"),
            }),
            HostOs::Other => None,
        }
    }
}

/// Opens secure stores. Split out so the selection policy can be exercised
/// without a real keyring.
pub trait SecureStoreFactory {
    /// Constructs the store, failing if the backend is unavailable.
    fn open(&self, target: &SecureTarget) -> Result<Box<dyn Persistence>>;
}

impl<F> SecureStoreFactory for F
where
    F: Fn(&SecureTarget) -> Result<Box<dyn Persistence>>,
{
    fn open(&self, target: &SecureTarget) -> Result<Box<dyn Persistence>> {
        self(target)
    }
}

/// Factory backed by the `keyring` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringFactory;

impl SecureStoreFactory for KeyringFactory {
    fn open(&self, target: &SecureTarget) -> Result<Box<dyn Persistence>> {
        match target.kind {
            // A refresh token alone can exceed one credential blob.
            StoreKind::Encrypted => Ok(Box::new(ChunkedPersistence::open(
                KeyringSlots::new(&target.service),
                target,
                CREDENTIAL_MAX_UNITS,
            )?)),
            _ => Ok(Box::new(KeyringPersistence::open(target)?)),
        }
    }
}

/// Chooses a storage backend for the token cache.
pub struct StoreSelector<F = KeyringFactory> {
    host: HostOs,
    allow_plaintext_fallback: bool,
    factory: F,
}

impl StoreSelector {
    /// Selector for the current host using the OS keyring.
    #[must_use]
    pub fn new(allow_plaintext_fallback: bool) -> Self {
        Self::with_factory(HostOs::current(), allow_plaintext_fallback, KeyringFactory)
    }
}

impl<F: SecureStoreFactory> StoreSelector<F> {
    /// Selector with an explicit host and factory.
    pub const fn with_factory(host: HostOs, allow_plaintext_fallback: bool, factory: F) -> Self {
        Self {
            host,
            allow_plaintext_fallback,
            factory,
        }
    }

    /// Returns the store for `location`.
    ///
    /// Only the Linux secret service may degrade to a plaintext file, and
    /// only when the fallback was allowed. Windows and macOS store failures
    /// always propagate.
    pub fn select(&self, location: &Path) -> Result<Box<dyn Persistence>> {
        let Some(target) = SecureTarget::for_host(self.host, location) else {
            debug!(host = ?self.host, "no secure store for host, using plaintext file");
            return Ok(Box::new(FilePersistence::new(location)));
        };

        match self.factory.open(&target) {
            Ok(store) => {
                debug!(kind = %target.kind, "using secure token store");
                Ok(store)
            },
            Err(e) if target.kind == StoreKind::SecretService && self.allow_plaintext_fallback => {
                warn!(
                    error = %e,
                    path = %location.display(),
                    "Encryption unavailable. Opting in to plain text."
                );
                Ok(Box::new(FilePersistence::new(location)))
            },
            Err(e) => Err(e),
        }
    }
}

/// Unencrypted file store.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    /// Store at `path`. The file is created on first save.
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl Persistence for FilePersistence {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&self.path)?))
    }

    fn save(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, contents)?;
        restrict_permissions(&self.path)?;
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Plaintext
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Store backed by an OS keyring entry.
pub struct KeyringPersistence {
    entry: Entry,
    kind: StoreKind,
}

impl KeyringPersistence {
    /// Opens the entry and reads it once, so an unavailable or locked
    /// backend fails here rather than at the first save.
    ///
    /// # Errors
    ///
    /// Returns [`PatError::CredentialStorage`] if the keyring cannot be reached.
    pub fn open(target: &SecureTarget) -> Result<Self> {
        let entry = Entry::new(&target.service, &target.account)
            .map_err(|e| PatError::CredentialStorage(e.to_string()))?;
        Self::from_entry(entry, target.kind)
    }

    /// Wraps an existing entry, with the same availability check as [`Self::open`].
    pub fn from_entry(entry: Entry, kind: StoreKind) -> Result<Self> {
        match entry.get_password() {
            Ok(_) | Err(keyring::Error::NoEntry) => {},
            Err(e) => return Err(PatError::CredentialStorage(e.to_string())),
        }

        Ok(Self { entry, kind })
    }
}

impl Persistence for KeyringPersistence {
    fn load(&self) -> Result<Option<String>> {
        match self.entry.get_password() {
            Ok(contents) => Ok(Some(contents)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(PatError::CredentialStorage(e.to_string())),
        }
    }

    fn save(&self, contents: &str) -> Result<()> {
        self.entry
            .set_password(contents)
            .map_err(|e| PatError::CredentialStorage(e.to_string()))
    }

    fn delete(&self) -> Result<()> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(PatError::CredentialStorage(e.to_string())),
        }
    }

    fn kind(&self) -> StoreKind {
        self.kind
    }
}

/// Named secrets under one keyring service.
#[cfg_attr(test, mockall::automock)]
pub trait SecretSlots: Send {
    /// Value stored under `name`, `None` when absent.
    fn get(&self, name: &str) -> Result<Option<String>>;

    /// Stores `value` under `name`.
    fn set(&self, name: &str, value: &str) -> Result<()>;

    /// Removes `name`. No-op when absent.
    fn remove(&self, name: &str) -> Result<()>;
}

/// One keyring entry per slot name.
#[derive(Debug, Clone)]
pub struct KeyringSlots {
    service: String,
}

impl KeyringSlots {
    #[must_use]
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, name: &str) -> Result<Entry> {
        Entry::new(&self.service, name).map_err(|e| PatError::CredentialStorage(e.to_string()))
    }
}

impl SecretSlots for KeyringSlots {
    fn get(&self, name: &str) -> Result<Option<String>> {
        match self.entry(name)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(PatError::CredentialStorage(e.to_string())),
        }
    }

    fn set(&self, name: &str, value: &str) -> Result<()> {
        self.entry(name)?
            .set_password(value)
            .map_err(|e| PatError::CredentialStorage(e.to_string()))
    }

    fn remove(&self, name: &str) -> Result<()> {
        match self.entry(name)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(PatError::CredentialStorage(e.to_string())),
        }
    }
}

/// Store that spreads the blob over several slots, none longer than
/// `max_units` UTF-16 code units.
///
/// The base account holds `chunks:<n>`; the parts live at `<account>#0`
/// through `<account>#<n-1>`.
pub struct ChunkedPersistence<S> {
    slots: S,
    account: String,
    kind: StoreKind,
    max_units: usize,
}

impl<S: SecretSlots> ChunkedPersistence<S> {
    /// Opens the store and reads its index once, so an unavailable backend
    /// fails here rather than at the first save.
    pub fn open(slots: S, target: &SecureTarget, max_units: usize) -> Result<Self> {
        let store = Self {
            slots,
            account: target.account.clone(),
            kind: target.kind,
            max_units: max_units.max(2),
        };
        store.chunk_count()?;
        Ok(store)
    }

    fn chunk_name(&self, index: usize) -> String {
        format!("{}#{index}", self.account)
    }

    fn chunk_count(&self) -> Result<Option<usize>> {
        let Some(index) = self.slots.get(&self.account)? else {
            return Ok(None);
        };
        index
            .strip_prefix(CHUNK_INDEX_PREFIX)
            .and_then(|n| n.parse().ok())
            .map(Some)
            .ok_or_else(|| {
                PatError::CredentialStorage(format!(
                    "unrecognized chunk index '{index}' under {}",
                    self.account
                ))
            })
    }

    fn split<'a>(&self, contents: &'a str) -> Vec<&'a str> {
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut units = 0;
        for (offset, ch) in contents.char_indices() {
            if units + ch.len_utf16() > self.max_units {
                chunks.push(&contents[start..offset]);
                start = offset;
                units = 0;
            }
            units += ch.len_utf16();
        }
        if start < contents.len() || chunks.is_empty() {
            chunks.push(&contents[start..]);
        }
        chunks
    }
}

impl<S: SecretSlots> Persistence for ChunkedPersistence<S> {
    fn load(&self) -> Result<Option<String>> {
        let Some(count) = self.chunk_count()? else {
            return Ok(None);
        };
        let mut contents = String::new();
        for index in 0..count {
            let name = self.chunk_name(index);
            let part = self.slots.get(&name)?.ok_or_else(|| {
                PatError::CredentialStorage(format!("missing credential chunk {name}"))
            })?;
            contents.push_str(&part);
        }
        Ok(Some(contents))
    }

    fn save(&self, contents: &str) -> Result<()> {
        let previous = self.chunk_count()?.unwrap_or(0);
        let chunks = self.split(contents);
        for (index, chunk) in chunks.iter().enumerate() {
            self.slots.set(&self.chunk_name(index), chunk)?;
        }
        self.slots
            .set(&self.account, &format!("{CHUNK_INDEX_PREFIX}{}", chunks.len()))?;
        for index in chunks.len()..previous {
            self.slots.remove(&self.chunk_name(index))?;
        }
        debug!(chunks = chunks.len(), "token cache written");
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        // An unreadable index still lets the base entry go.
        let count = self.chunk_count().unwrap_or_default().unwrap_or(0);
        self.slots.remove(&self.account)?;
        for index in 0..count {
            self.slots.remove(&self.chunk_name(index))?;
        }
        Ok(())
    }

    fn kind(&self) -> StoreKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use keyring::credential::CredentialBuilderApi;
    use keyring::mock::MockCredential;
    use tempfile::TempDir;

    /// In-memory slots that reject values Credential Manager would reject.
    #[derive(Clone, Default)]
    struct MemorySlots {
        values: Arc<Mutex<HashMap<String, String>>>,
    }

    impl MemorySlots {
        fn snapshot(&self) -> HashMap<String, String> {
            self.values.lock().unwrap().clone()
        }
    }

    impl SecretSlots for MemorySlots {
        fn get(&self, name: &str) -> Result<Option<String>> {
            Ok(self.values.lock().unwrap().get(name).cloned())
        }

        fn set(&self, name: &str, value: &str) -> Result<()> {
            if value.encode_utf16().count() > CREDENTIAL_MAX_UNITS {
                return Err(PatError::CredentialStorage(format!(
                    "Attribute 'password' is longer than platform limit of {} chars",
                    CREDENTIAL_MAX_UNITS * 2
                )));
            }
            self.values.lock().unwrap().insert(name.to_string(), value.to_string());
            Ok(())
        }

        fn remove(&self, name: &str) -> Result<()> {
            self.values.lock().unwrap().remove(name);
            Ok(())
        }
    }

    fn windows_target() -> SecureTarget {
        SecureTarget::for_host(HostOs::Windows, Path::new("C:/Users/me/token.bin")).unwrap()
    }

    fn chunked(slots: &MemorySlots) -> ChunkedPersistence<MemorySlots> {
        ChunkedPersistence::open(slots.clone(), &windows_target(), CREDENTIAL_MAX_UNITS).unwrap()
    }

    fn mock_entry() -> Entry {
        let credential = keyring::mock::default_credential_builder()
            .build(None, STORE_NAME, STORE_NAME)
            .unwrap();
        Entry::new_with_credential(credential)
    }

    /// A cache blob with a refresh token far past one credential's limit.
    fn large_cache() -> String {
        let refresh_token = "0.AXoA".repeat(700);
        format!(
            r#"{{"accounts":[{{"home_account_id":"uid.utid","username":"rené@contoso.com 😀","refresh_token":"{refresh_token}"}}]}}"#
        )
    }

    fn secure_ok(target: &SecureTarget) -> Result<Box<dyn Persistence>> {
        let kind = target.kind;
        let mut store = MockPersistence::new();
        store.expect_kind().return_const(kind);
        Ok(Box::new(store))
    }

    fn secure_unavailable(_target: &SecureTarget) -> Result<Box<dyn Persistence>> {
        Err(PatError::CredentialStorage(
            "org.freedesktop.secrets was not provided by any .service files".to_string(),
        ))
    }

    #[test]
    fn windows_uses_encrypted_store() {
        let selector = StoreSelector::with_factory(HostOs::Windows, false, secure_ok);
        let store = selector.select(Path::new("token.bin")).unwrap();
        assert_eq!(store.kind(), StoreKind::Encrypted);
    }

    #[test]
    fn macos_uses_keychain_with_fixed_names() {
        let target = SecureTarget::for_host(HostOs::MacOs, Path::new("token.bin")).unwrap();
        assert_eq!(target.service, STORE_NAME);
        assert_eq!(target.account, STORE_NAME);

        let selector = StoreSelector::with_factory(HostOs::MacOs, false, secure_ok);
        let store = selector.select(Path::new("token.bin")).unwrap();
        assert_eq!(store.kind(), StoreKind::Keychain);
    }

    #[test]
    fn linux_uses_secret_service_when_available() {
        let selector = StoreSelector::with_factory(HostOs::Linux, false, secure_ok);
        let store = selector.select(Path::new("token.bin")).unwrap();
        assert_eq!(store.kind(), StoreKind::SecretService);
    }

    #[test]
    fn linux_failure_without_fallback_propagates() {
        let selector = StoreSelector::with_factory(HostOs::Linux, false, secure_unavailable);
        let result = selector.select(Path::new("token.bin"));
        assert!(matches!(result, Err(PatError::CredentialStorage(_))));
    }

    #[test]
    fn linux_failure_with_fallback_returns_plaintext() {
        let selector = StoreSelector::with_factory(HostOs::Linux, true, secure_unavailable);
        let store = selector.select(Path::new("token.bin")).unwrap();
        assert_eq!(store.kind(), StoreKind::Plaintext);
    }

    #[test]
    fn macos_failure_propagates_even_with_fallback() {
        let selector = StoreSelector::with_factory(HostOs::MacOs, true, secure_unavailable);
        assert!(selector.select(Path::new("token.bin")).is_err());
    }

    #[test]
    fn unknown_os_uses_plaintext_without_touching_factory() {
        let calls = Cell::new(0);
        let factory = |target: &SecureTarget| {
            calls.set(calls.get() + 1);
            secure_ok(target)
        };
        let selector = StoreSelector::with_factory(HostOs::Other, false, factory);

        let store = selector.select(Path::new("token.bin")).unwrap();
        assert_eq!(store.kind(), StoreKind::Plaintext);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn file_store_roundtrip_and_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilePersistence::new(&temp_dir.path().join("nested").join("token.bin"));

        assert_eq!(store.load().unwrap(), None);
        store.save("{\"accounts\":[]}").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("{\"accounts\":[]}"));

        store.delete().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.delete().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("token.bin");
        FilePersistence::new(&path).save("secret").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn cache_larger_than_one_credential_is_split() {
        let slots = MemorySlots::default();
        let store = chunked(&slots);
        let contents = large_cache();
        assert!(contents.encode_utf16().count() > CREDENTIAL_MAX_UNITS);

        store.save(&contents).unwrap();

        assert_eq!(store.load().unwrap().as_deref(), Some(contents.as_str()));
        let stored = slots.snapshot();
        let account = windows_target().account;
        let count: usize = stored[&account].trim_start_matches("chunks:").parse().unwrap();
        assert!(count > 1);
        assert_eq!(stored.len(), count + 1);
        assert!(stored
            .values()
            .all(|value| value.encode_utf16().count() <= CREDENTIAL_MAX_UNITS));
    }

    #[test]
    fn chunk_boundaries_respect_surrogate_pairs() {
        let slots = MemorySlots::default();
        let store = ChunkedPersistence::open(slots.clone(), &windows_target(), 3).unwrap();

        store.save("a😀😀b").unwrap();

        assert_eq!(store.load().unwrap().as_deref(), Some("a😀😀b"));
        let account = windows_target().account;
        assert_eq!(slots.snapshot()[&format!("{account}#0")], "a😀");
    }

    #[test]
    fn shrinking_save_drops_stale_chunks() {
        let slots = MemorySlots::default();
        let store = chunked(&slots);
        store.save(&large_cache()).unwrap();

        store.save("{\"accounts\":[]}").unwrap();

        let account = windows_target().account;
        let stored = slots.snapshot();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[&account], "chunks:1");
        assert_eq!(store.load().unwrap().as_deref(), Some("{\"accounts\":[]}"));
    }

    #[test]
    fn chunked_delete_removes_every_slot() {
        let slots = MemorySlots::default();
        let store = chunked(&slots);
        assert_eq!(store.load().unwrap(), None);
        store.save(&large_cache()).unwrap();

        store.delete().unwrap();

        assert!(slots.snapshot().is_empty());
        assert_eq!(store.load().unwrap(), None);
        store.delete().unwrap();
    }

    #[test]
    fn chunked_open_fails_when_backend_unreachable() {
        let mut slots = MockSecretSlots::new();
        slots
            .expect_get()
            .returning(|_| Err(PatError::CredentialStorage("Access is denied.".to_string())));

        let result = ChunkedPersistence::open(slots, &windows_target(), CREDENTIAL_MAX_UNITS);
        assert!(matches!(result, Err(PatError::CredentialStorage(_))));
    }

    #[test]
    fn missing_chunk_is_reported() {
        let slots = MemorySlots::default();
        let store = chunked(&slots);
        store.save(&large_cache()).unwrap();
        let account = windows_target().account;
        slots.remove(&format!("{account}#1")).unwrap();

        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("missing credential chunk"));
    }

    #[test]
    fn keyring_open_accepts_missing_entry() {
        let store = KeyringPersistence::from_entry(mock_entry(), StoreKind::Keychain).unwrap();

        assert_eq!(store.kind(), StoreKind::Keychain);
        assert_eq!(store.load().unwrap(), None);
        store.save("{\"accounts\":[]}").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("{\"accounts\":[]}"));
        store.delete().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn keyring_open_rejects_unavailable_backend() {
        let entry = mock_entry();
        entry
            .get_credential()
            .downcast_ref::<MockCredential>()
            .unwrap()
            .set_error(keyring::Error::NoStorageAccess("collection is locked".into()));

        let result = KeyringPersistence::from_entry(entry, StoreKind::SecretService);
        match result {
            Err(PatError::CredentialStorage(message)) => {
                assert!(message.contains("collection is locked"));
            },
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("locked backend was accepted"),
        }
    }
}
