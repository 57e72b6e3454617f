use fd_lock::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::errors::CoreError;

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
///
/// The bytes go to a temporary file in the same directory, are flushed to
/// disk, and the temp file is then renamed over `path`. A concurrent reader
/// sees either the old file or the new one, never a partial write.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), CoreError> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| CoreError::Serialization(format!("{}: {e}", path.display())))?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// Read JSON from `path`. A missing file yields `Ok(None)`.
///
/// Parse failures are reported through `on_corrupt` so each store can map
/// them to its own error kind.
pub fn read_json<T: DeserializeOwned>(
    path: &Path,
    on_corrupt: impl FnOnce(String) -> CoreError,
) -> Result<Option<T>, CoreError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| on_corrupt(format!("{}: {e}", path.display())))
}

/// Sidecar lock file for `path`: `portfolios.json` -> `portfolios.json.lock`.
pub fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

/// Run `update` while holding an exclusive lock on `path`'s sidecar file.
///
/// Every read-modify-write of a shared file goes through here, so two
/// processes (or threads) saving at once serialize instead of one
/// overwriting the other's changes. The lock is released on drop.
pub fn locked<R>(
    path: &Path,
    update: impl FnOnce() -> Result<R, CoreError>,
) -> Result<R, CoreError> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path(path))?;
    let mut lock = RwLock::new(file);
    let _guard = lock.write()?;
    update()
}
