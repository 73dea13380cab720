use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::errors::{AppError, AppResult};

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(path, serialized)?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
    let contents = fs::read_to_string(path)
        .map_err(|err| AppError::Path(format!("{}: {err}", path.display())))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Permanent key-addressed cache entry: if `path` exists its contents are
/// returned and `create` is never called; otherwise the created value is
/// written first and then read back, so callers always see what is on disk.
pub fn cache_json<T, F>(path: &Path, create: F) -> AppResult<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> AppResult<T>,
{
    if path.exists() {
        trace!(path = %path.display(), "json cache hit");
    } else {
        let value = create()?;
        write_json(path, &value)?;
    }
    read_json(path)
}
