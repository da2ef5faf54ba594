//! Session-gated persistence of workspace state
//!
//! Plain key-value JSON entries under a data directory, one file per key,
//! mirroring what the browser client keeps in local storage. The
//! authenticated-session gate lives here at the storage boundary, not at
//! every state-change site: an anonymous session loads fine but all writes
//! are skipped.

use crate::workspace::{ChatMessage, EditorPrefs, SourceFile, Workspace};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const KEY_FILES: &str = "files";
const KEY_SELECTED: &str = "selected_file";
const KEY_CHAT: &str = "chat_history";
const KEY_FONT_SIZE: &str = "font_size";
const KEY_MINIMAP: &str = "minimap";
const KEY_THEME: &str = "editor_theme";
const KEY_META: &str = "meta";

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Capability handle proving whether an authenticated session is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    authenticated: bool,
}

impl Session {
    pub fn authenticated() -> Self {
        Self {
            authenticated: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotMeta {
    version: u32,
    saved_at: chrono::DateTime<chrono::Utc>,
}

/// Key-value store for the workspace snapshot.
pub struct Store {
    dir: PathBuf,
    session: Session,
}

impl Store {
    pub fn open(dir: impl Into<PathBuf>, session: Session) -> Self {
        Self {
            dir: dir.into(),
            session,
        }
    }

    /// Persist the workspace. Returns Ok(false) when the session is not
    /// authenticated and the write was skipped.
    pub fn save(&self, ws: &Workspace) -> Result<bool, StoreError> {
        if !self.session.is_authenticated() {
            log::debug!("skipping workspace save: no authenticated session");
            return Ok(false);
        }
        fs::create_dir_all(&self.dir)?;

        self.write_entry(KEY_FILES, &ws.files)?;
        self.write_entry(KEY_SELECTED, &ws.selected)?;
        self.write_entry(KEY_CHAT, &ws.transcript)?;
        self.write_entry(KEY_FONT_SIZE, &ws.prefs.font_size)?;
        self.write_entry(KEY_MINIMAP, &ws.prefs.minimap)?;
        self.write_entry(KEY_THEME, &ws.prefs.theme)?;
        self.write_entry(
            KEY_META,
            &SnapshotMeta {
                version: SNAPSHOT_VERSION,
                saved_at: chrono::Utc::now(),
            },
        )?;
        Ok(true)
    }

    /// Load a previously saved workspace, or None when nothing was stored.
    /// Individual corrupt entries fall back to defaults; the corrupt file is
    /// kept next to the original for inspection.
    pub fn load(&self) -> Result<Option<Workspace>, StoreError> {
        let files: Option<Vec<SourceFile>> = self.read_entry(KEY_FILES)?;
        let Some(files) = files.filter(|f| !f.is_empty()) else {
            return Ok(None);
        };

        let mut ws = Workspace::new();
        ws.selected = self
            .read_entry::<usize>(KEY_SELECTED)?
            .filter(|i| *i < files.len())
            .unwrap_or(0);
        ws.files = files;
        if let Some(transcript) = self.read_entry::<Vec<ChatMessage>>(KEY_CHAT)? {
            if !transcript.is_empty() {
                ws.transcript = transcript;
            }
        }
        let defaults = EditorPrefs::default();
        ws.prefs = EditorPrefs {
            font_size: self
                .read_entry(KEY_FONT_SIZE)?
                .unwrap_or(defaults.font_size),
            minimap: self.read_entry(KEY_MINIMAP)?.unwrap_or(defaults.minimap),
            theme: self.read_entry(KEY_THEME)?.unwrap_or(defaults.theme),
        };
        Ok(Some(ws))
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn write_entry<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let path = self.entry_path(key);
        let content = serde_json::to_string_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        if let Err(err) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        Ok(())
    }

    fn read_entry<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let path = self.entry_path(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_str(&content) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                preserve_corrupt_entry(&path, &content);
                log::warn!("stored entry '{key}' was corrupted ({err}); using defaults");
                Ok(None)
            }
        }
    }
}

fn preserve_corrupt_entry(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}
