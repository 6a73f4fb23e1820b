//! Workspace session persistence.
//!
//! Each workspace lives in `<dir>/<instance_id>.workspace.json`. Writes go
//! to a temporary file in the same directory and are renamed over the
//! canonical name, so a reader sees either the previous record or the new
//! one and never a partial write. Writers for the same instance are
//! serialized across processes by an advisory lock file; readers never lock.

use crate::Workspace;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const SESSION_FILE_SUFFIX: &str = ".workspace.json";

/// Errors that can occur during session store operations.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid instance id '{instance_id}': {reason}")]
    InvalidInstanceId { instance_id: String, reason: String },
    #[error("No session for {instance_id} at {path}")]
    NotFound { instance_id: String, path: PathBuf },
    #[error("Corrupt session file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("Cannot serialize session for {instance_id}: {reason}")]
    Serialize { instance_id: String, reason: String },
    #[error("Session I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SessionError {
    fn io(path: &Path, source: io::Error) -> Self {
        SessionError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// File-backed store of workspace session records.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Canonical session file path for an instance.
    pub fn session_path(&self, instance_id: &str) -> PathBuf {
        self.dir.join(format!("{instance_id}{SESSION_FILE_SUFFIX}"))
    }

    fn lock_path(&self, instance_id: &str) -> PathBuf {
        self.dir.join(format!(".{instance_id}.lock"))
    }

    /// Instance ids become file names, so they must be a single plain path
    /// component. A leading dot is reserved for lock and temp files.
    pub fn validate_instance_id(instance_id: &str) -> Result<(), SessionError> {
        let reason = if instance_id.trim().is_empty() {
            Some("must not be empty")
        } else if instance_id.contains(['/', '\\', '\0']) {
            Some("must not contain path separators")
        } else if instance_id.starts_with('.') {
            Some("must not start with '.'")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(SessionError::InvalidInstanceId {
                instance_id: instance_id.to_string(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Acquire an exclusive lock for writes to one instance
    fn acquire_lock(&self, instance_id: &str) -> Result<File, SessionError> {
        let path = self.lock_path(instance_id);
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&path)
            .map_err(|e| SessionError::io(&path, e))?;

        lock_file
            .lock_exclusive()
            .map_err(|e| SessionError::io(&path, e))?;

        Ok(lock_file)
    }

    /// Encode a record the way [`save`](Self::save) writes it.
    ///
    /// Fails for records JSON cannot represent, such as a non-UTF-8
    /// location.
    pub fn encode(workspace: &Workspace) -> Result<Vec<u8>, SessionError> {
        serde_json::to_vec_pretty(workspace).map_err(|e| SessionError::Serialize {
            instance_id: workspace.instance_id.clone(),
            reason: e.to_string(),
        })
    }

    pub fn exists(&self, instance_id: &str) -> bool {
        self.session_path(instance_id).is_file()
    }

    /// Persist a workspace record atomically.
    pub fn save(&self, workspace: &Workspace) -> Result<(), SessionError> {
        Self::validate_instance_id(&workspace.instance_id)?;
        let content = Self::encode(workspace)?;

        fs::create_dir_all(&self.dir).map_err(|e| SessionError::io(&self.dir, e))?;
        let _lock = self.acquire_lock(&workspace.instance_id)?;

        let path = self.session_path(&workspace.instance_id);

        // Write atomically using a unique temporary file
        let temp_file = tempfile::Builder::new()
            .prefix(&format!(".{}-", workspace.instance_id))
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(|e| SessionError::io(&self.dir, e))?;

        temp_file
            .as_file()
            .write_all(&content)
            .and_then(|()| temp_file.as_file().sync_all())
            .map_err(|e| SessionError::io(temp_file.path(), e))?;

        // Atomic move to final location
        temp_file
            .persist(&path)
            .map_err(|e| SessionError::io(&path, e.error))?;
        sync_dir(&self.dir).map_err(|e| SessionError::io(&self.dir, e))?;

        debug!(
            instance = %workspace.instance_id,
            state = %workspace.state,
            path = %path.display(),
            "saved workspace session"
        );
        Ok(())
    }

    /// Load a workspace record.
    pub fn load(&self, instance_id: &str) -> Result<Workspace, SessionError> {
        Self::validate_instance_id(instance_id)?;
        let path = self.session_path(instance_id);

        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SessionError::NotFound {
                    instance_id: instance_id.to_string(),
                    path,
                })
            }
            Err(e) => return Err(SessionError::io(&path, e)),
        };

        let workspace: Workspace =
            serde_json::from_slice(&content).map_err(|e| SessionError::Corrupt {
                path: path.clone(),
                reason: format!("cannot decode session: {e}"),
            })?;

        if workspace.instance_id != instance_id {
            return Err(SessionError::Corrupt {
                path,
                reason: format!(
                    "file belongs to instance '{}', expected '{instance_id}'",
                    workspace.instance_id
                ),
            });
        }

        Ok(workspace)
    }

    /// Delete a workspace record.
    pub fn remove(&self, instance_id: &str) -> Result<(), SessionError> {
        Self::validate_instance_id(instance_id)?;
        let path = self.session_path(instance_id);

        if !path.is_file() {
            return Err(SessionError::NotFound {
                instance_id: instance_id.to_string(),
                path,
            });
        }

        // The lock file itself is never unlinked, so every writer for this
        // id, in any process, contends on the same inode.
        let _lock = self.acquire_lock(instance_id)?;
        fs::remove_file(&path).map_err(|e| SessionError::io(&path, e))?;
        sync_dir(&self.dir).map_err(|e| SessionError::io(&self.dir, e))?;

        debug!(instance = %instance_id, "removed workspace session");
        Ok(())
    }

    /// All readable session records, sorted by instance id.
    ///
    /// Corrupt records are logged and skipped so one bad file cannot hide
    /// the rest.
    pub fn list(&self) -> Result<Vec<Workspace>, SessionError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SessionError::io(&self.dir, e)),
        };

        let mut workspaces = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SessionError::io(&self.dir, e))?;
            let file_name = entry.file_name();
            let Some(instance_id) = file_name
                .to_str()
                .filter(|name| !name.starts_with('.'))
                .and_then(|name| name.strip_suffix(SESSION_FILE_SUFFIX))
            else {
                continue;
            };

            match self.load(instance_id) {
                Ok(workspace) => workspaces.push(workspace),
                // Removed between read_dir and load
                Err(SessionError::NotFound { .. }) => {}
                Err(e @ (SessionError::Corrupt { .. } | SessionError::InvalidInstanceId { .. })) => {
                    warn!(error = %e, "skipping unreadable workspace session");
                }
                Err(e) => return Err(e),
            }
        }

        workspaces.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        Ok(workspaces)
    }
}

/// Flush directory entries so a completed rename or unlink survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wsd_core::WorkspaceState;

    fn store() -> (TempDir, SessionStore) {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("sessions"));
        (dir, store)
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let (_dir, store) = store();
        let mut ws = Workspace::new("inst-1", "alice", "ws-1", "/tmp/ws1");
        ws.state = WorkspaceState::Ready;
        ws.last_error = Some("previous failure".into());
        ws.annotate("container", "abc123");

        store.save(&ws).unwrap();
        assert_eq!(store.load("inst-1").unwrap(), ws);
        assert!(store.session_path("inst-1").ends_with("inst-1.workspace.json"));
    }

    #[test]
    fn test_save_overwrites_previous_record() {
        let (_dir, store) = store();
        let mut ws = Workspace::new("inst-1", "", "", "/tmp/ws1");
        store.save(&ws).unwrap();

        ws.state = WorkspaceState::Ready;
        ws.touch();
        store.save(&ws).unwrap();

        assert_eq!(store.load("inst-1").unwrap().state, WorkspaceState::Ready);
        // No temp files left behind next to the record
        let leftovers: Vec<_> = fs::read_dir(store.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let (_dir, store) = store();
        match store.load("nope") {
            Err(SessionError::NotFound { instance_id, .. }) => assert_eq!(instance_id, "nope"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_load_malformed_is_corrupt() {
        let (_dir, store) = store();
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.session_path("bad"), b"{ not json").unwrap();

        assert!(matches!(
            store.load("bad"),
            Err(SessionError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_load_mismatched_instance_is_corrupt() {
        let (_dir, store) = store();
        store
            .save(&Workspace::new("inst-1", "", "", "/tmp/ws1"))
            .unwrap();
        fs::copy(store.session_path("inst-1"), store.session_path("inst-2")).unwrap();

        assert!(matches!(
            store.load("inst-2"),
            Err(SessionError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_invalid_instance_ids_rejected() {
        let (_dir, store) = store();
        for id in ["", "  ", "../escape", "a/b", ".hidden"] {
            assert!(
                matches!(
                    store.load(id),
                    Err(SessionError::InvalidInstanceId { .. })
                ),
                "{id:?}"
            );
        }
        let ws = Workspace::new("a/b", "", "", "/tmp");
        assert!(matches!(
            store.save(&ws),
            Err(SessionError::InvalidInstanceId { .. })
        ));
    }

    #[test]
    fn test_remove() {
        let (_dir, store) = store();
        store
            .save(&Workspace::new("inst-1", "", "", "/tmp/ws1"))
            .unwrap();
        assert!(store.exists("inst-1"));

        store.remove("inst-1").unwrap();
        assert!(!store.exists("inst-1"));
        assert!(store.lock_path("inst-1").exists());
        assert!(matches!(
            store.remove("inst-1"),
            Err(SessionError::NotFound { .. })
        ));

        // Reusing the id locks the same file again
        store
            .save(&Workspace::new("inst-1", "", "", "/tmp/ws1-again"))
            .unwrap();
        assert_eq!(
            store.load("inst-1").unwrap().location,
            PathBuf::from("/tmp/ws1-again")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_unserializable_record_is_not_corrupt() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (_dir, store) = store();
        let location = PathBuf::from(OsStr::from_bytes(b"/tmp/ws\xff"));
        let ws = Workspace::new("inst-1", "", "", location);

        assert!(matches!(
            SessionStore::encode(&ws),
            Err(SessionError::Serialize { .. })
        ));
        match store.save(&ws) {
            Err(SessionError::Serialize { instance_id, .. }) => assert_eq!(instance_id, "inst-1"),
            other => panic!("expected Serialize, got {other:?}"),
        }
        assert!(!store.exists("inst-1"));
    }

    #[test]
    fn test_save_syncs_session_dir() {
        let (_dir, store) = store();
        store
            .save(&Workspace::new("inst-1", "", "", "/tmp/ws1"))
            .unwrap();
        sync_dir(store.dir()).unwrap();
        assert!(store.exists("inst-1"));
    }

    #[test]
    fn test_list_skips_corrupt_and_foreign_files() {
        let (_dir, store) = store();
        assert!(store.list().unwrap().is_empty());

        store.save(&Workspace::new("b", "", "", "/tmp/b")).unwrap();
        store.save(&Workspace::new("a", "", "", "/tmp/a")).unwrap();
        fs::write(store.session_path("broken"), b"garbage").unwrap();
        fs::write(store.dir().join("notes.txt"), b"ignored").unwrap();

        let ids: Vec<_> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|ws| ws.instance_id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
