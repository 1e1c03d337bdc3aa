//! Durable and in-memory storage of the session token pair.
//!
//! `TokenStore` is a dumb cell, not a TTL cache: it performs no expiry
//! tracking. Expiry is discovered downstream by a rejected request, which
//! the REST client heals with a one-shot refresh.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use keyring::Entry;
use tracing::warn;

const ACCESS_TOKEN_KEY: &str = "access_token";
const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Keychain service name under which tokens are filed.
const KEYRING_SERVICE: &str = "entrega";

/// Key/value persistence backend for the token pair. Implementations must
/// survive process restarts; the store degrades to in-memory-only when no
/// backend is attached.
pub trait TokenStorage: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    fn store(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Token persistence in the OS keychain.
pub struct KeyringStorage;

impl TokenStorage for KeyringStorage {
    fn load(&self, key: &str) -> Option<String> {
        let entry = Entry::new(KEYRING_SERVICE, key).ok()?;
        entry.get_password().ok()
    }

    fn store(&self, key: &str, value: &str) -> Result<()> {
        let entry = Entry::new(KEYRING_SERVICE, key)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(value)
            .context("Failed to store token in keychain")?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let entry = Entry::new(KEYRING_SERVICE, key)
            .context("Failed to create keyring entry")?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

/// Process-local backend for runtimes without a keychain, and for tests.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl TokenStorage for MemoryStorage {
    fn load(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn store(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

#[derive(Default)]
struct Cells {
    access: Option<String>,
    access_hydrated: bool,
    refresh: Option<String>,
    refresh_hydrated: bool,
}

/// The single shared home of the token pair, handed by reference to the
/// auth client and the REST client.
pub struct TokenStore {
    storage: Option<Arc<dyn TokenStorage>>,
    cells: Mutex<Cells>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            storage: Some(storage),
            cells: Mutex::new(Cells::default()),
        }
    }

    /// Store backed by the OS keychain.
    pub fn with_keychain() -> Self {
        Self::new(Arc::new(KeyringStorage))
    }

    /// Store with no durable backend; tokens live for this process only.
    pub fn in_memory() -> Self {
        Self {
            storage: None,
            cells: Mutex::new(Cells::default()),
        }
    }

    /// Current access token: the in-memory value, hydrated once from the
    /// backend on first read.
    pub fn access_token(&self) -> Option<String> {
        let mut cells = lock(&self.cells);
        if !cells.access_hydrated {
            if cells.access.is_none() {
                cells.access = self.storage.as_ref().and_then(|s| s.load(ACCESS_TOKEN_KEY));
            }
            cells.access_hydrated = true;
        }
        cells.access.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        let mut cells = lock(&self.cells);
        if !cells.refresh_hydrated {
            if cells.refresh.is_none() {
                cells.refresh = self.storage.as_ref().and_then(|s| s.load(REFRESH_TOKEN_KEY));
            }
            cells.refresh_hydrated = true;
        }
        cells.refresh.clone()
    }

    pub fn set_access_token(&self, token: Option<&str>) {
        let mut cells = lock(&self.cells);
        cells.access = token.map(str::to_owned);
        cells.access_hydrated = true;
        self.persist(ACCESS_TOKEN_KEY, token);
    }

    pub fn set_refresh_token(&self, token: Option<&str>) {
        let mut cells = lock(&self.cells);
        cells.refresh = token.map(str::to_owned);
        cells.refresh_hydrated = true;
        self.persist(REFRESH_TOKEN_KEY, token);
    }

    /// Replace both tokens under a single lock. Used by refresh rotation,
    /// where the old refresh token dies the moment the new pair is issued.
    pub fn set_token_pair(&self, access: Option<&str>, refresh: Option<&str>) {
        let mut cells = lock(&self.cells);
        cells.access = access.map(str::to_owned);
        cells.access_hydrated = true;
        cells.refresh = refresh.map(str::to_owned);
        cells.refresh_hydrated = true;
        self.persist(ACCESS_TOKEN_KEY, access);
        self.persist(REFRESH_TOKEN_KEY, refresh);
    }

    /// Drop both tokens, memory and backend.
    pub fn clear(&self) {
        self.set_token_pair(None, None);
    }

    /// Mirror a token to the backend. A failed write never fails the caller:
    /// the in-memory value is already authoritative for this process.
    fn persist(&self, key: &str, token: Option<&str>) {
        let Some(storage) = &self.storage else {
            return;
        };
        let result = match token {
            Some(value) => storage.store(key, value),
            None => storage.remove(key),
        };
        if let Err(error) = result {
            warn!(key, error = %error, "failed to persist token");
        }
    }
}

/// Lock a mutex, recovering the guard if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
