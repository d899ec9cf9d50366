use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use {
    secrecy::ExposeSecret,
    tracing::{debug, info, warn},
};

use crate::{
    Result,
    error::Context,
    types::{Session, User},
};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "user";

/// Shared, persistent home of the current session.
///
/// Writes are last-writer-wins. `save` and `clear` touch the access token,
/// refresh token and user record together; implementations must never leave a
/// subset of them behind.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<Session>>;
    fn save(&self, session: &Session) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

// ── File store ──────────────────────────────────────────────────────────────

/// File-based session storage, `<data_dir>/session.json` by default.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "session file not found");
                return Ok(None);
            },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "session file read failed");
                return Err(e.into());
            },
        };

        match serde_json::from_str::<Session>(&data) {
            Ok(session) => {
                debug!(path = %self.path.display(), user = %session.user.username, "session loaded");
                Ok(Some(session))
            },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "session file parse failed");
                Err(e.into())
            },
        }
    }

    fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating session directory {}", parent.display()))?;
        }

        // Written beside the target and renamed so readers never see a
        // half-written session.
        let tmp = self.temp_path();
        let data = serde_json::to_string_pretty(session)?;
        std::fs::write(&tmp, &data)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }

        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing session file {}", self.path.display()))?;
        info!(path = %self.path.display(), user = %session.user.username, "session saved");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "session cleared");
                Ok(())
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ── In-memory store ─────────────────────────────────────────────────────────

/// Key-value session storage held in process memory.
///
/// Mirrors the three-key layout of browser storage (`access_token`,
/// `refresh_token`, `user`) so tests can assert on individual keys.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<&'static str, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `session`.
    pub fn with_session(session: &Session) -> Result<Self> {
        let store = Self::new();
        store.save(session)?;
        Ok(store)
    }

    /// Raw value of a single storage key.
    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Storage keys currently present.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.lock().keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<&'static str, String>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>> {
        let entries = self.lock();
        let (Some(access), Some(refresh), Some(user)) = (
            entries.get(ACCESS_TOKEN_KEY),
            entries.get(REFRESH_TOKEN_KEY),
            entries.get(USER_KEY),
        ) else {
            return Ok(None);
        };
        let user: User = serde_json::from_str(user)?;
        Ok(Some(Session::new(access.clone(), refresh.clone(), user)))
    }

    fn save(&self, session: &Session) -> Result<()> {
        let user = serde_json::to_string(&session.user)?;
        let mut next = HashMap::with_capacity(3);
        next.insert(
            ACCESS_TOKEN_KEY,
            session.access_token.expose_secret().clone(),
        );
        next.insert(
            REFRESH_TOKEN_KEY,
            session.refresh_token.expose_secret().clone(),
        );
        next.insert(USER_KEY, user);
        *self.lock() = next;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.lock().clear();
        Ok(())
    }
}

impl<T: SessionStore + ?Sized> SessionStore for std::sync::Arc<T> {
    fn load(&self) -> Result<Option<Session>> {
        (**self).load()
    }

    fn save(&self, session: &Session) -> Result<()> {
        (**self).save(session)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}
