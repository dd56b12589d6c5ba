//! Sidecar persistence: `<doc>.meo.toml` next to each source document.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::project::ProjectState;

const SIDECAR_SUFFIX: &str = ".meo.toml";

/// `notes/draft.md` -> `notes/draft.md.meo.toml`.
pub fn sidecar_path(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_owned();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Loads the sidecar for `source`, returning `Ok(None)` when none exists.
///
/// # Errors
///
/// Returns [`StorageError`] when the file cannot be read, does not parse, or
/// violates the chunk invariants.
pub fn load_sidecar(source: &Path) -> Result<Option<ProjectState>, StorageError> {
    let path = sidecar_path(source);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io(path, e)),
    };
    let state: ProjectState = toml::from_str(&text).map_err(|source| StorageError::Parse {
        path: path.clone(),
        source,
    })?;
    state.validate().map_err(|e| StorageError::Invalid {
        path,
        reason: e.to_string(),
    })?;
    Ok(Some(state))
}

/// Loads the sidecar for `source` or starts a fresh project for `document`.
///
/// # Errors
///
/// Propagates load failures; a missing sidecar is not an error.
pub fn load_or_create(source: &Path, document: &str) -> Result<ProjectState, StorageError> {
    match load_sidecar(source)? {
        Some(state) => Ok(state),
        None => {
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(ProjectState::new(name, document))
        }
    }
}

/// Writes `state` to the sidecar of `source` and returns the sidecar path.
///
/// # Errors
///
/// Returns [`StorageError`] on serialization or write failure. A failed
/// write leaves any previous sidecar intact.
pub fn save_sidecar(source: &Path, state: &ProjectState) -> Result<PathBuf, StorageError> {
    let path = sidecar_path(source);
    let text = toml::to_string_pretty(state)?;
    write_atomic(&path, text.as_bytes())?;
    tracing::debug!(path = %path.display(), chunks = state.list_chunks().len(), "sidecar saved");
    Ok(path)
}

/// Writes through a temporary sibling file and renames it into place.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = dir.join(tmp_name);

    let mut file = fs::File::create(&tmp).map_err(|e| StorageError::io(&tmp, e))?;
    file.write_all(contents)
        .and_then(|()| file.sync_all())
        .map_err(|e| StorageError::io(&tmp, e))?;
    drop(file);
    fs::rename(&tmp, path).map_err(|e| StorageError::io(path, e))
}
