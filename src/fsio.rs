// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Small filesystem helpers shared by the persisted stores.

use std::io;
use std::path::{Path, PathBuf};

/// Write `bytes` through a temporary sibling file and an atomic rename.
///
/// A crash mid-write leaves the previous file intact; the target is only
/// replaced once the temporary file is fully on disk.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = sibling_with_suffix(path, ".tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

/// Rotate an existing file to a `.bak` sibling, replacing any previous backup.
///
/// Missing source is not an error; there is simply nothing to rotate.
pub fn rotate_backup(path: &Path) -> io::Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let backup = sibling_with_suffix(path, ".bak");
    if backup.exists() {
        std::fs::remove_file(&backup)?;
    }
    std::fs::rename(path, &backup)
}

/// Unique backup path for a corrupt file, e.g. `config.json.1712345678.bak`.
pub fn timestamped_backup_path(path: &Path) -> PathBuf {
    let ts = chrono::Utc::now().timestamp();
    sibling_with_suffix(path, &format!(".{ts}.bak"))
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_atomic_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");

        write_atomic(&path, b"{}").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
        assert!(!dir.path().join("data.json.tmp").exists());
    }

    #[test]
    fn write_atomic_replaces_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");

        write_atomic(&path, b"old").unwrap();
        write_atomic(&path, b"new").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn rotate_backup_moves_previous_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, b"v1").unwrap();

        rotate_backup(&path).unwrap();

        assert!(!path.exists());
        assert_eq!(
            std::fs::read(dir.path().join("config.json.bak")).unwrap(),
            b"v1"
        );
    }

    #[test]
    fn rotate_backup_replaces_stale_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, b"v2").unwrap();
        std::fs::write(dir.path().join("config.json.bak"), b"v1").unwrap();

        rotate_backup(&path).unwrap();

        assert_eq!(
            std::fs::read(dir.path().join("config.json.bak")).unwrap(),
            b"v2"
        );
    }

    #[test]
    fn rotate_backup_without_source_is_a_noop() {
        let dir = tempdir().unwrap();
        rotate_backup(&dir.path().join("missing.json")).unwrap();
    }

    #[test]
    fn timestamped_backup_path_keeps_directory() {
        let path = timestamped_backup_path(Path::new("/some/dir/config.json"));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("config.json."));
        assert!(name.ends_with(".bak"));
        assert_eq!(path.parent().unwrap(), Path::new("/some/dir"));
    }
}
