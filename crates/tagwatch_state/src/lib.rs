//! Persisted state store.
//!
//! The full [`PersistedState`] is read once at cycle start and written once
//! at cycle end. Saves are atomic: the new content goes to a temp file in
//! the same directory and replaces the final path with a rename, so a
//! crash mid-save leaves either the old or the new complete file, never a
//! truncated one.
//!
//! A missing or zero-length file is an empty state. A file that exists but
//! does not parse is a hard error: silently resetting history would make
//! every tracked tag look freshly added.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tagwatch_protocol::PersistedState;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Corrupt state is fatal, never treated as empty.
    #[error("state file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Load the persisted state. Missing or empty file -> empty state.
pub fn load(path: &Path) -> Result<PersistedState, StateError> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no state file, starting empty");
            return Ok(PersistedState::default());
        }
        Err(source) => {
            return Err(StateError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if metadata.len() == 0 {
        debug!(path = %path.display(), "zero-length state file, starting empty");
        return Ok(PersistedState::default());
    }

    let content = fs::read_to_string(path).map_err(|source| StateError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| StateError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Atomically replace the state file with the given state.
///
/// The temp file is created in the destination directory so the final
/// rename never crosses a filesystem boundary. Permissions are set to
/// owner read/write, group/other read before the rename.
pub fn save(path: &Path, state: &PersistedState) -> Result<(), StateError> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    let dir = parent.unwrap_or_else(|| Path::new("."));

    let serialized = serde_json::to_vec(state)?;

    let write_err = |source: std::io::Error| StateError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(&serialized).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o644)).map_err(write_err)?;
    }

    tmp.persist(path).map_err(|e| write_err(e.error))?;
    debug!(path = %path.display(), repos = state.len(), "state saved");
    Ok(())
}
