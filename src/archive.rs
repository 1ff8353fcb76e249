//! Snapshot archive.
//!
//! One directory per entry id under the archive root, one file per
//! observed change, named by capture timestamp in a sortable UTC format.
//! An existing snapshot is never overwritten; a name collision fails the
//! write.

use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Snapshot filenames sort lexicographically by capture time.
const SNAPSHOT_TIME_FORMAT: &str = "%Y-%m-%dT%H%M%SZ";

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("could not create archive directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("snapshot {path} already exists")]
    AlreadyExists { path: PathBuf },
    #[error("could not write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Filesystem archive of captured page bodies.
#[derive(Debug, Clone)]
pub struct Archive {
    root: PathBuf,
}

impl Archive {
    pub fn new(root: &Path) -> Self {
        Archive {
            root: root.to_path_buf(),
        }
    }

    /// Directory holding an entry's snapshots.
    pub fn entry_dir(&self, entry_id: i64) -> PathBuf {
        self.root.join(entry_id.to_string())
    }

    /// Write one captured body for an entry. The capture time is supplied
    /// by the caller and becomes the filename. Returns the snapshot path.
    pub fn save(
        &self,
        entry_id: i64,
        captured_at: DateTime<Utc>,
        body: &[u8],
    ) -> Result<PathBuf, ArchiveError> {
        let dir = self.entry_dir(entry_id);
        fs::create_dir_all(&dir).map_err(|source| ArchiveError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let path = dir.join(captured_at.format(SNAPSHOT_TIME_FORMAT).to_string());
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::AlreadyExists {
                    ArchiveError::AlreadyExists { path: path.clone() }
                } else {
                    ArchiveError::Write {
                        path: path.clone(),
                        source,
                    }
                }
            })?;

        file.write_all(body).map_err(|source| ArchiveError::Write {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn capture_time(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn save_writes_body_under_entry_directory() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path());

        let path = archive
            .save(7, capture_time(1_445_412_480), b"<html>hi</html>")
            .unwrap();

        assert!(path.starts_with(dir.path().join("7")));
        assert_eq!(fs::read(&path).unwrap(), b"<html>hi</html>");
    }

    #[test]
    fn filename_is_sortable_utc_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path());

        let earlier = archive.save(1, capture_time(1_000_000_000), b"a").unwrap();
        let later = archive.save(1, capture_time(1_100_000_000), b"b").unwrap();

        let earlier_name = earlier.file_name().unwrap().to_string_lossy().to_string();
        let later_name = later.file_name().unwrap().to_string_lossy().to_string();
        assert!(earlier_name < later_name);
    }

    #[test]
    fn same_capture_time_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path());
        let at = capture_time(1_445_412_480);

        let path = archive.save(1, at, b"first").unwrap();
        let err = archive.save(1, at, b"second").unwrap_err();

        assert!(matches!(err, ArchiveError::AlreadyExists { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"first");
    }

    #[test]
    fn entries_get_separate_directories() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Archive::new(dir.path());
        let at = capture_time(1_445_412_480);

        archive.save(1, at, b"one").unwrap();
        archive.save(2, at, b"two").unwrap();

        assert!(dir.path().join("1").is_dir());
        assert!(dir.path().join("2").is_dir());
    }
}
