//! Session identifier storage.
//!
//! [`SessionStore`] is the single source of truth for the device session id.
//! The id lives in an in-memory slot and is mirrored into a `sessionId`
//! cookie (`Path=/`) in the cookie jar the HTTP client sends with every
//! request. When created with [`SessionStore::with_file`] it is also
//! persisted to disk, so one CLI invocation can reuse the session of the
//! previous one. The file is a JSON object keyed by device origin
//! (`scheme://host:port`), so several devices can share one file without
//! seeing each other's ids.
//!
//! None of the operations fail: persistence errors are logged and the
//! in-memory slot stays authoritative.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::Url;
use reqwest_cookie_store::{CookieStore, CookieStoreMutex};
use tracing::{debug, warn};

/// Cookie name used to mirror the session id.
pub const SESSION_COOKIE: &str = "sessionId";

/// Holds the current session id and keeps the cookie mirror in sync.
pub struct SessionStore {
    slot: RwLock<String>,
    jar: Arc<CookieStoreMutex>,
    device_url: Url,
    file: Option<PathBuf>,
}

impl SessionStore {
    /// In-memory store scoped to the device at `device_url`.
    pub fn new(device_url: Url) -> Self {
        Self {
            slot: RwLock::new(String::new()),
            jar: Arc::new(CookieStoreMutex::new(CookieStore::new(None))),
            device_url,
            file: None,
        }
    }

    /// Store that also persists the id to `path`, loading any id already
    /// saved there for this device. Entries of other devices are left alone.
    pub fn with_file(device_url: Url, path: PathBuf) -> Self {
        let mut store = Self::new(device_url);
        let saved = read_session_file(&path)
            .remove(&store.device_key())
            .unwrap_or_default();
        store.file = Some(path);
        if !saved.is_empty() {
            debug!(device = %store.device_key(), "restored session from disk");
            *store.slot.write().unwrap_or_else(PoisonError::into_inner) = saved.clone();
            store.mirror_cookie(&saved);
        }
        store
    }

    /// Cookie jar to install on the HTTP client via `cookie_provider`.
    pub fn cookie_jar(&self) -> Arc<CookieStoreMutex> {
        Arc::clone(&self.jar)
    }

    /// The current session id, or `""` when anonymous.
    pub fn get(&self) -> String {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a session id is currently held.
    pub fn is_authenticated(&self) -> bool {
        !self
            .slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Store `id` and mirror it into the cookie jar. Empty ids are ignored.
    pub fn set(&self, id: &str) {
        if id.is_empty() {
            return;
        }
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = id.to_string();
        self.mirror_cookie(id);
        if let Some(path) = &self.file {
            let mut entries = read_session_file(path);
            entries.insert(self.device_key(), id.to_string());
            write_session_file(path, &entries);
        }
    }

    /// Forget the session id, expire the cookie and drop this device's entry
    /// from the session file. The file is removed once no entries remain.
    pub fn clear(&self) {
        self.slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.remove_cookie();
        if let Some(path) = &self.file {
            let mut entries = read_session_file(path);
            if entries.remove(&self.device_key()).is_none() {
                return;
            }
            if entries.is_empty() {
                remove_session_file(path);
            } else {
                write_session_file(path, &entries);
            }
        }
    }

    /// Re-mirror the cookie if the jar lost it (or holds a stale value).
    pub fn ensure_cookie(&self) {
        let id = self.get();
        if id.is_empty() {
            return;
        }
        if self.cookie_value().as_deref() != Some(id.as_str()) {
            debug!("session cookie missing from jar, re-mirroring");
            self.mirror_cookie(&id);
        }
    }

    /// Current value of the mirrored cookie, if the jar holds one.
    pub fn cookie_value(&self) -> Option<String> {
        let store = self.jar.lock().unwrap_or_else(PoisonError::into_inner);
        store
            .get(self.cookie_host(), "/", SESSION_COOKIE)
            .map(|c| c.value().to_string())
    }

    /// Key of this device in the session file.
    fn device_key(&self) -> String {
        self.device_url.origin().ascii_serialization()
    }

    fn cookie_host(&self) -> &str {
        self.device_url.host_str().unwrap_or_default()
    }

    fn mirror_cookie(&self, id: &str) {
        let raw = cookie::Cookie::build((SESSION_COOKIE, id.to_string()))
            .path("/")
            .build();
        let mut store = self.jar.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = store.insert_raw(&raw, &self.device_url) {
            warn!("failed to mirror session cookie: {e}");
        }
    }

    fn remove_cookie(&self) {
        let mut store = self.jar.lock().unwrap_or_else(PoisonError::into_inner);
        store.remove(self.cookie_host(), "/", SESSION_COOKIE);
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("device_url", &self.device_url.as_str())
            .field("authenticated", &self.is_authenticated())
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}

/// Session ids by device origin.
type SessionEntries = BTreeMap<String, String>;

fn read_session_file(path: &Path) -> SessionEntries {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return SessionEntries::new(),
        Err(e) => {
            warn!("failed to read session file {}: {e}", path.display());
            return SessionEntries::new();
        }
    };
    serde_json::from_str(&contents).unwrap_or_else(|e| {
        warn!("ignoring malformed session file {}: {e}", path.display());
        SessionEntries::new()
    })
}

fn remove_session_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("failed to remove session file {}: {e}", path.display()),
    }
}

fn write_session_file(path: &Path, entries: &SessionEntries) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("failed to create {}: {e}", parent.display());
            return;
        }
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let result = options.open(path).and_then(|mut file| {
        serde_json::to_writer_pretty(&mut file, entries).map_err(std::io::Error::from)
    });
    if let Err(e) = result {
        warn!("failed to persist session to {}: {e}", path.display());
    }
}
