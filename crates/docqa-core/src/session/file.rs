//! Token persisted as JSON under the XDG state directory.
//!
//! The file is re-read on every access, so a login or logout performed by
//! another `docqa` process is picked up on the next read and reported to
//! `on_change` subscribers like a local change.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{StoredToken, TokenCallback, TokenStore, TokenStoreError};
use crate::observers::{ObserverList, Subscription};

#[derive(Default)]
struct Cached {
    token: Option<StoredToken>,
    generation: u64,
}

pub struct FileTokenStore {
    path: PathBuf,
    cached: Mutex<Cached>,
    observers: Arc<ObserverList<Option<StoredToken>>>,
}

impl FileTokenStore {
    /// Store at `path`. The current file content (if any) is the baseline; it
    /// does not count as a change.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let token = read_token(&path);
        Self {
            path,
            cached: Mutex::new(Cached {
                token,
                generation: 0,
            }),
            observers: ObserverList::new(),
        }
    }

    /// `~/.local/state/docqa/token.json`.
    pub fn default_path() -> Result<PathBuf, TokenStoreError> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("docqa")?;
        Ok(xdg_dirs.place_state_file("token.json")?)
    }

    pub fn open_default() -> Result<Self, TokenStoreError> {
        Ok(Self::new(Self::default_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Cached> {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `token` as current; notifies subscribers if it differs from the cache.
    fn observe(&self, token: Option<StoredToken>) -> Option<StoredToken> {
        {
            let mut cached = self.lock();
            if cached.token == token {
                return token;
            }
            cached.token = token.clone();
            cached.generation += 1;
        }
        self.observers.notify(&token);
        token
    }

    fn sync(&self) -> Option<StoredToken> {
        self.observe(read_token(&self.path))
    }
}

/// Missing or unreadable file means "no token".
fn read_token(path: &Path) -> Option<StoredToken> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!("cannot read token file {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_slice(&data) {
        Ok(token) => Some(token),
        Err(e) => {
            tracing::warn!("ignoring malformed token file {}: {}", path.display(), e);
            None
        }
    }
}

/// Write via a sibling temp file and rename so readers never see a partial token.
fn write_token(path: &Path, token: &StoredToken) -> Result<(), TokenStoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(token)?;
    {
        let mut opts = fs::OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        let mut file = opts.open(&tmp)?;
        file.write_all(&data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

impl TokenStore for FileTokenStore {
    fn get_token(&self) -> Option<StoredToken> {
        self.sync()
    }

    fn set_token(&self, token: StoredToken) -> Result<(), TokenStoreError> {
        write_token(&self.path, &token)?;
        self.observe(Some(token));
        Ok(())
    }

    fn clear_token(&self) -> Result<(), TokenStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.observe(None);
        Ok(())
    }

    fn generation(&self) -> u64 {
        self.sync();
        self.lock().generation
    }

    fn on_change(&self, callback: TokenCallback) -> Subscription {
        self.observers
            .register(Arc::new(move |token: &Option<StoredToken>| callback(token.as_ref())))
    }
}

impl std::fmt::Debug for FileTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTokenStore")
            .field("path", &self.path)
            .finish()
    }
}
