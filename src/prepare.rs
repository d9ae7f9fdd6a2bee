//! Folder pairing and normalization.
//!
//! Takes a "before" and an "after" folder of images, pairs files across them
//! by case-insensitive base name, and copies each pair into a normalized
//! output layout the inference backend understands:
//!
//! ```text
//! <output>/
//! ├── images_A/            # "before" images
//! │   ├── 0001.jpg
//! │   └── 0002.png
//! ├── images_B/            # "after" images, same names as images_A
//! │   ├── 0001.jpg
//! │   └── 0002.png
//! └── test.txt             # one "images_A/<name> images_B/<name>" line per pair
//! ```
//!
//! ## Pairing rules
//!
//! - Only direct children with an image extension are considered
//!   (see [`IMAGE_EXTENSIONS`](crate::naming::IMAGE_EXTENSIONS)); directories never are.
//! - Listings are sorted by case-folded name, so the output order does not
//!   depend on the platform's `readdir` order.
//! - Each "after" file pairs at most once. When two "before" files fold to the
//!   same base name, the first one wins and the later one stays unpaired.
//! - Both copies of a pair take the sequence number plus the "before" file's
//!   extension.
//!
//! ## Failure behaviour
//!
//! Every failure comes back as a [`PrepareError`]; nothing panics. Failures are
//! terminal and nothing is rolled back: if the 3rd of 5 copies fails, pairs 1
//! and 2 stay in the output folder and no manifest is written. Callers that
//! need all-or-nothing output should prepare into a fresh temporary folder and
//! move it into place after success.

use crate::fs::{DirEntry, EntryKind, FileSystem, LocalFs};
use crate::naming::{self, IMAGE_EXTENSIONS};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Subdirectory holding the "before" copies.
pub const IMAGES_A_DIR: &str = "images_A";
/// Subdirectory holding the "after" copies.
pub const IMAGES_B_DIR: &str = "images_B";
/// Pair list written next to the image folders.
pub const MANIFEST_FILENAME: &str = "test.txt";

/// Which input folder an error or record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Before,
    After,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Before => f.write_str("before"),
            Side::After => f.write_str("after"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PrepareError {
    #[error("{side} folder does not exist: {}", .path.display())]
    NotFound { side: Side, path: PathBuf },
    #[error("{side} path is not a folder: {}", .path.display())]
    NotADirectory { side: Side, path: PathBuf },
    #[error("cannot read {side} folder {}: {source}", .path.display())]
    Unreadable {
        side: Side,
        path: PathBuf,
        source: io::Error,
    },
    #[error("{side} folder is empty: {}", .path.display())]
    EmptyInput { side: Side, path: PathBuf },
    #[error("no image files found in {side} folder {} (accepted: {})", .path.display(), IMAGE_EXTENSIONS.join(", "))]
    NoImagesFound { side: Side, path: PathBuf },
    #[error("{side} folder has non-standard file names: {}", .names.join(", "))]
    NonStandardNames { side: Side, names: Vec<String> },
    #[error("no matching image pairs between {} and {}", .before.display(), .after.display())]
    NoMatches { before: PathBuf, after: PathBuf },
    #[error("cannot create output folder {}: {source}", .path.display())]
    DirectoryCreateFailed { path: PathBuf, source: io::Error },
    #[error("failed to copy {} to {}: {source}", .from.display(), .to.display())]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    #[error("failed to write manifest {}: {source}", .path.display())]
    ManifestWriteFailed { path: PathBuf, source: io::Error },
}

/// Payload-free discriminant of [`PrepareError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    NotADirectory,
    Unreadable,
    EmptyInput,
    NoImagesFound,
    NonStandardNames,
    NoMatches,
    DirectoryCreateFailed,
    CopyFailed,
    ManifestWriteFailed,
}

impl PrepareError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PrepareError::NotFound { .. } => ErrorKind::NotFound,
            PrepareError::NotADirectory { .. } => ErrorKind::NotADirectory,
            PrepareError::Unreadable { .. } => ErrorKind::Unreadable,
            PrepareError::EmptyInput { .. } => ErrorKind::EmptyInput,
            PrepareError::NoImagesFound { .. } => ErrorKind::NoImagesFound,
            PrepareError::NonStandardNames { .. } => ErrorKind::NonStandardNames,
            PrepareError::NoMatches { .. } => ErrorKind::NoMatches,
            PrepareError::DirectoryCreateFailed { .. } => ErrorKind::DirectoryCreateFailed,
            PrepareError::CopyFailed { .. } => ErrorKind::CopyFailed,
            PrepareError::ManifestWriteFailed { .. } => ErrorKind::ManifestWriteFailed,
        }
    }

    /// The input folder the error refers to, when there is one.
    pub fn side(&self) -> Option<Side> {
        match self {
            PrepareError::NotFound { side, .. }
            | PrepareError::NotADirectory { side, .. }
            | PrepareError::Unreadable { side, .. }
            | PrepareError::EmptyInput { side, .. }
            | PrepareError::NoImagesFound { side, .. }
            | PrepareError::NonStandardNames { side, .. } => Some(*side),
            _ => None,
        }
    }
}

/// Knobs for [`normalize_with`].
#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    /// Reject image names that fail [`naming::is_standard_filename`] before pairing.
    pub require_standard_names: bool,
}

/// Two files, one per side, sharing a case-insensitive base name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedPair {
    pub before: PathBuf,
    pub after: PathBuf,
    /// Base name of the "before" file, original case.
    pub base_name: String,
    /// Extension of the "before" file with its dot, original case.
    pub extension: String,
}

/// A matched pair after it has been copied under its sequence name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedPair {
    /// Sequence filename shared by both copies, e.g. `0003.png`.
    pub name: String,
    pub source: MatchedPair,
}

impl NormalizedPair {
    /// The manifest line for this pair: `images_A/<name> images_B/<name>`.
    pub fn manifest_line(&self) -> String {
        format!("{IMAGES_A_DIR}/{0} {IMAGES_B_DIR}/{0}", self.name)
    }
}

/// Successful preparation result.
#[derive(Debug, Clone, Serialize)]
pub struct Normalized {
    pub output_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub pairs: Vec<NormalizedPair>,
}

impl Normalized {
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }
}

/// Flat success/failure outcome, suitable for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct PrepareReport {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_images: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl PrepareReport {
    pub fn from_result(result: &Result<Normalized, PrepareError>) -> Self {
        match result {
            Ok(done) => Self {
                success: true,
                message: format!("processed {} image pairs", done.pair_count()),
                total_images: Some(done.pair_count()),
                output_dir: Some(done.output_dir.clone()),
                error_kind: None,
            },
            Err(e) => Self {
                success: false,
                message: e.to_string(),
                total_images: None,
                output_dir: None,
                error_kind: Some(e.kind()),
            },
        }
    }
}

/// Prepare `before`/`after` into `output` on the local disk with default options.
pub fn normalize_local(
    before: &Path,
    after: &Path,
    output: &Path,
) -> Result<Normalized, PrepareError> {
    normalize(&LocalFs, before, after, output)
}

/// Pair and copy images from `before`/`after` into `output`.
pub fn normalize<F: FileSystem>(
    fs: &F,
    before: &Path,
    after: &Path,
    output: &Path,
) -> Result<Normalized, PrepareError> {
    normalize_with(fs, before, after, output, &PrepareOptions::default())
}

pub fn normalize_with<F: FileSystem>(
    fs: &F,
    before: &Path,
    after: &Path,
    output: &Path,
    options: &PrepareOptions,
) -> Result<Normalized, PrepareError> {
    ensure_directory(fs, Side::Before, before)?;
    ensure_directory(fs, Side::After, after)?;

    let before_entries = list_entries(fs, Side::Before, before)?;
    let after_entries = list_entries(fs, Side::After, after)?;

    let before_images = filter_images(Side::Before, before, before_entries)?;
    let after_images = filter_images(Side::After, after, after_entries)?;
    debug!(
        before = before_images.len(),
        after = after_images.len(),
        "found candidate images"
    );

    if options.require_standard_names {
        reject_nonstandard(Side::Before, &before_images)?;
        reject_nonstandard(Side::After, &after_images)?;
    }

    let matched = match_pairs(&before_images, &after_images);
    if matched.is_empty() {
        return Err(PrepareError::NoMatches {
            before: before.to_path_buf(),
            after: after.to_path_buf(),
        });
    }
    info!(
        pairs = matched.len(),
        unpaired_before = before_images.len() - matched.len(),
        unpaired_after = after_images.len() - matched.len(),
        "matched image pairs"
    );

    create_layout(fs, output)?;
    let pairs = copy_pairs(fs, matched, output)?;

    let manifest_path = output.join(MANIFEST_FILENAME);
    let manifest = pairs
        .iter()
        .map(NormalizedPair::manifest_line)
        .collect::<Vec<_>>()
        .join("\n");
    fs.write(&manifest_path, manifest.as_bytes())
        .map_err(|source| PrepareError::ManifestWriteFailed {
            path: manifest_path.clone(),
            source,
        })?;

    Ok(Normalized {
        output_dir: output.to_path_buf(),
        manifest_path,
        pairs,
    })
}

/// Pair filtered image listings by case-insensitive base name.
///
/// Output follows the order of `before`. If several "after" entries fold to
/// the same key, the last one listed is the candidate.
pub fn match_pairs(before: &[DirEntry], after: &[DirEntry]) -> Vec<MatchedPair> {
    let mut by_key: HashMap<String, &DirEntry> = after
        .iter()
        .map(|e| (naming::pairing_key(&e.name), e))
        .collect();

    before
        .iter()
        .filter_map(|b| {
            let a = by_key.remove(&naming::pairing_key(&b.name))?;
            Some(MatchedPair {
                before: b.path.clone(),
                after: a.path.clone(),
                base_name: naming::base_name(&b.name).to_string(),
                extension: naming::dotted_extension(&b.name),
            })
        })
        .collect()
}

/// Validated, sorted image entries of one input folder.
///
/// Runs the same checks as [`normalize`] for a single side: the folder must
/// exist, be non-empty, and contain at least one image.
pub fn collect_images<F: FileSystem>(
    fs: &F,
    side: Side,
    dir: &Path,
) -> Result<Vec<DirEntry>, PrepareError> {
    ensure_directory(fs, side, dir)?;
    let entries = list_entries(fs, side, dir)?;
    filter_images(side, dir, entries)
}

/// Names of image files in `dir` that fail [`naming::is_standard_filename`].
pub fn nonstandard_names<F: FileSystem>(fs: &F, dir: &Path) -> io::Result<Vec<String>> {
    let mut entries = fs.list_dir(dir)?;
    sort_listing(&mut entries);
    Ok(entries
        .into_iter()
        .filter(|e| !e.is_dir && naming::is_image_filename(&e.name))
        .filter(|e| !naming::is_standard_filename(&e.name))
        .map(|e| e.name)
        .collect())
}

fn ensure_directory<F: FileSystem>(fs: &F, side: Side, path: &Path) -> Result<(), PrepareError> {
    match fs.kind(path) {
        Ok(EntryKind::Directory) => Ok(()),
        Ok(_) => Err(PrepareError::NotADirectory {
            side,
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(PrepareError::NotFound {
            side,
            path: path.to_path_buf(),
        }),
        Err(source) => Err(PrepareError::Unreadable {
            side,
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn list_entries<F: FileSystem>(
    fs: &F,
    side: Side,
    path: &Path,
) -> Result<Vec<DirEntry>, PrepareError> {
    let mut entries = fs
        .list_dir(path)
        .map_err(|source| PrepareError::Unreadable {
            side,
            path: path.to_path_buf(),
            source,
        })?;
    if entries.is_empty() {
        return Err(PrepareError::EmptyInput {
            side,
            path: path.to_path_buf(),
        });
    }
    sort_listing(&mut entries);
    Ok(entries)
}

fn sort_listing(entries: &mut [DirEntry]) {
    entries.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
}

fn filter_images(
    side: Side,
    path: &Path,
    entries: Vec<DirEntry>,
) -> Result<Vec<DirEntry>, PrepareError> {
    let images: Vec<DirEntry> = entries
        .into_iter()
        .filter(|e| !e.is_dir && naming::is_image_filename(&e.name))
        .collect();
    if images.is_empty() {
        return Err(PrepareError::NoImagesFound {
            side,
            path: path.to_path_buf(),
        });
    }
    Ok(images)
}

fn reject_nonstandard(side: Side, images: &[DirEntry]) -> Result<(), PrepareError> {
    let names: Vec<String> = images
        .iter()
        .filter(|e| !naming::is_standard_filename(&e.name))
        .map(|e| e.name.clone())
        .collect();
    if names.is_empty() {
        Ok(())
    } else {
        Err(PrepareError::NonStandardNames { side, names })
    }
}

fn create_layout<F: FileSystem>(fs: &F, output: &Path) -> Result<(), PrepareError> {
    for dir in [
        output.to_path_buf(),
        output.join(IMAGES_A_DIR),
        output.join(IMAGES_B_DIR),
    ] {
        fs.create_dir_all(&dir)
            .map_err(|source| PrepareError::DirectoryCreateFailed { path: dir, source })?;
    }
    Ok(())
}

fn copy_pairs<F: FileSystem>(
    fs: &F,
    matched: Vec<MatchedPair>,
    output: &Path,
) -> Result<Vec<NormalizedPair>, PrepareError> {
    let dir_a = output.join(IMAGES_A_DIR);
    let dir_b = output.join(IMAGES_B_DIR);
    let mut done = Vec::with_capacity(matched.len());

    for (i, pair) in matched.into_iter().enumerate() {
        let name = naming::sequence_name(i + 1, &pair.extension);
        for (from, to) in [(&pair.before, dir_a.join(&name)), (&pair.after, dir_b.join(&name))] {
            debug!(from = %from.display(), to = %to.display(), "copying");
            fs.copy(from, &to)
                .map_err(|source| PrepareError::CopyFailed {
                    from: from.clone(),
                    to,
                    source,
                })?;
        }
        done.push(NormalizedPair { name, source: pair });
    }
    Ok(done)
}
