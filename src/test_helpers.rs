//! Shared test utilities for the change-detect test suite.
//!
//! Builds throwaway before/after folders and reads back what the preparation
//! stage wrote.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let fx = image_dirs(&["a.jpg", "b.png"], &["A.JPG"]);
//! normalize_local(&fx.before, &fx.after, &fx.output).unwrap();
//! assert_eq!(manifest_lines(&fx.output), vec!["images_A/0001.jpg images_B/0001.jpg"]);
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::prepare::MANIFEST_FILENAME;

// =========================================================================
// Fixture setup
// =========================================================================

/// A temp root holding `before/` and `after/` input folders.
///
/// `output` points at `<root>/out`, which is *not* created.
pub struct Fixture {
    pub root: TempDir,
    pub before: PathBuf,
    pub after: PathBuf,
    pub output: PathBuf,
}

/// Create `before/` and `after/` folders containing the named files.
///
/// Each file's content is `"<side>:<name>"` so tests can tell copies apart.
pub fn image_dirs(before: &[&str], after: &[&str]) -> Fixture {
    let root = TempDir::new().unwrap();
    let before_dir = root.path().join("before");
    let after_dir = root.path().join("after");
    write_files(&before_dir, "before", before);
    write_files(&after_dir, "after", after);
    let output = root.path().join("out");
    Fixture {
        root,
        before: before_dir,
        after: after_dir,
        output,
    }
}

fn write_files(dir: &Path, side: &str, names: &[&str]) {
    std::fs::create_dir_all(dir).unwrap();
    for name in names {
        std::fs::write(dir.join(name), format!("{side}:{name}")).unwrap();
    }
}

// =========================================================================
// Readers: panic with a clear message on miss
// =========================================================================

/// Read a file to a string. Panics with the path if it is missing.
pub fn read_file(path: &Path) -> String {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

/// Manifest lines under an output folder, in file order.
pub fn manifest_lines(output: &Path) -> Vec<String> {
    read_file(&output.join(MANIFEST_FILENAME))
        .lines()
        .map(str::to_string)
        .collect()
}

/// Sorted file names directly inside `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("cannot list {}: {e}", dir.display()))
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
