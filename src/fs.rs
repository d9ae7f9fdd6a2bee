//! Filesystem capability used by the preparation stage.
//!
//! [`normalize`](crate::prepare::normalize) never touches `std::fs` directly;
//! it goes through the [`FileSystem`] trait so tests can inject failures
//! (for example a copy that breaks halfway through a batch). The production
//! implementation is [`LocalFs`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What a path points at, after following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Other,
}

/// One entry of a non-recursive directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File name only, lossily converted to UTF-8.
    pub name: String,
    /// Full path of the entry (parent joined with the raw name).
    pub path: PathBuf,
    pub is_dir: bool,
}

/// The operations the preparation stage needs from a filesystem.
pub trait FileSystem {
    /// Stat a path. Missing paths yield `io::ErrorKind::NotFound`.
    fn kind(&self, path: &Path) -> io::Result<EntryKind>;

    /// List the direct children of a directory, in no particular order.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Create a directory and all missing parents. Existing directories are fine.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Copy a file, overwriting the destination.
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Write a file, overwriting it.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

/// [`FileSystem`] backed by the local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    fn kind(&self, path: &Path) -> io::Result<EntryKind> {
        let meta = fs::metadata(path)?;
        Ok(if meta.is_dir() {
            EntryKind::Directory
        } else if meta.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        })
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(path).min_depth(1).max_depth(1) {
            let entry = entry?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                // follows symlinks, so a link to a directory counts as one
                is_dir: entry.path().is_dir(),
                path: entry.into_path(),
            });
        }
        Ok(entries)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::copy(from, to).map(|_| ())
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(path, contents)
    }
}
