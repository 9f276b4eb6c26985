// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON array files: atomic replace on write, quarantine on corruption.

use crate::error::StorageError;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
/// The oldest backup is removed when the limit is reached.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

/// Read the raw records of a JSON array file.
///
/// A missing file is an empty list. A file that is not a JSON array is moved
/// to a rotated `.bak` path (so the next save cannot clobber it) and also
/// reads as empty.
pub(crate) fn read_array(path: &Path) -> Result<Vec<Value>, StorageError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::io(path, e)),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let reason = match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Array(items)) => return Ok(items),
        Ok(other) => format!("expected a JSON array, found {}", json_kind(&other)),
        Err(e) => e.to_string(),
    };

    let bak = rotate_bak_path(path);
    match fs::rename(path, &bak) {
        Ok(()) => tracing::warn!(
            path = %path.display(),
            backup = %bak.display(),
            %reason,
            "store file unreadable, moved aside"
        ),
        Err(e) => tracing::error!(
            path = %path.display(),
            %reason,
            error = %e,
            "store file unreadable and could not be moved aside"
        ),
    }
    Ok(Vec::new())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Replace `path` with `records` via write-temp, fsync, rename.
pub(crate) fn write_atomic<T: Serialize>(path: &Path, records: &[T]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }
    let json = serde_json::to_vec_pretty(records)?;
    let tmp_path = path.with_extension("json.tmp");

    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&json)?;
        file.write_all(b"\n")?;
        file.sync_all()
    };
    if let Err(e) = write() {
        let _ = fs::remove_file(&tmp_path);
        return Err(StorageError::io(&tmp_path, e));
    }
    fs::rename(&tmp_path, path).map_err(|e| StorageError::io(path, e))
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
