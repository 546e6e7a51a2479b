use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use crate::error::{FileSystemError, FileSystemResult};

/// Removes the specified file or directory safely.
///
/// A missing path is not an error. Directories are removed recursively.
///
/// # Errors
///
/// Returns a [`FileSystemError::File`] if the removal fails for any reason other than
/// the path not existing.
pub fn safe_remove<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();

    if !path.exists() {
        return Ok(());
    }

    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    result.map_err(|err| {
        FileSystemError::File {
            path: path.to_path_buf(),
            action: "remove",
            source: err,
        }
    })
}

/// Creates a directory structure if it doesn't exist.
///
/// # Errors
///
/// * [`FileSystemError::Directory`] if the directory could not be created.
/// * [`FileSystemError::NotADirectory`] if the path exists but is not a directory.
pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> FileSystemResult<()> {
    let path = path.as_ref();
    if !path.exists() {
        fs::create_dir_all(path).map_err(|err| {
            FileSystemError::Directory {
                path: path.to_path_buf(),
                action: "create",
                source: err,
            }
        })?;
    } else if !path.is_dir() {
        return Err(FileSystemError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    Ok(())
}

/// Returns the sibling path used to stage writes to `path`.
///
/// `cache/agent.json` stages through `cache/agent.json.<suffix>`.
pub fn staging_path<P: AsRef<Path>>(path: P, suffix: &str) -> PathBuf {
    let path = path.as_ref();
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Writes `contents` to `path` so that readers observe either the old file or
/// the complete new one.
///
/// The data is written to a sibling temporary file, flushed to disk and then
/// renamed over the destination.
pub fn write_atomic<P: AsRef<Path>>(path: P, contents: &[u8]) -> FileSystemResult<()> {
    let path = path.as_ref();
    let tmp = staging_path(path, "tmp");
    let file_err = |action: &'static str, target: &Path| {
        let target = target.to_path_buf();
        move |err| {
            FileSystemError::File {
                path: target,
                action,
                source: err,
            }
        }
    };

    let result = (|| -> FileSystemResult<()> {
        let mut file = File::create(&tmp).map_err(file_err("create", &tmp))?;
        file.write_all(contents).map_err(file_err("write", &tmp))?;
        file.sync_all().map_err(file_err("sync", &tmp))?;
        fs::rename(&tmp, path).map_err(file_err("replace", path))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}
