//! Upload session: the context handed from the upload step to the result step.
//!
//! A session is created when an upload starts and carries lightweight image
//! metadata plus an inline preview per file, never open file handles. The
//! CLI persists it as `session.json` in the temp directory so the `download`
//! step receives it explicitly; `reset` clears it.
//!
//! ```text
//! submit   ──► UploadSession::begin ──► record_result(id) ──► save
//! download ──► UploadSession::load  ──► result_id / previews
//! reset    ──► UploadSession::clear
//! ```

use crate::naming;
use crate::prepare::Side;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Session file name inside the temp directory.
pub const SESSION_FILENAME: &str = "session.json";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("cannot read image {}: {source}", .path.display())]
    ReadImage { path: PathBuf, source: io::Error },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Metadata kept for each uploaded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub from_local: bool,
    pub timestamp: DateTime<Utc>,
}

/// Context shared between the upload and result-viewing steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    pub created_at: DateTime<Utc>,
    pub before: Vec<ImageRecord>,
    pub after: Vec<ImageRecord>,
    /// File name → `data:` URL preview.
    #[serde(default)]
    pub before_previews: BTreeMap<String, String>,
    #[serde(default)]
    pub after_previews: BTreeMap<String, String>,
    /// Identifier of the result archive, once the backend has answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,
}

impl UploadSession {
    /// Start a session for the given upload, reading each file once for its
    /// size and preview.
    pub fn begin(before: &[PathBuf], after: &[PathBuf]) -> Result<Self, SessionError> {
        let created_at = Utc::now();
        let (before, before_previews) = describe_all(before, created_at)?;
        let (after, after_previews) = describe_all(after, created_at)?;
        Ok(Self {
            created_at,
            before,
            after,
            before_previews,
            after_previews,
            result_id: None,
        })
    }

    pub fn records(&self, side: Side) -> &[ImageRecord] {
        match side {
            Side::Before => &self.before,
            Side::After => &self.after,
        }
    }

    /// Inline preview for a file, if one was captured.
    pub fn preview(&self, side: Side, name: &str) -> Option<&str> {
        let previews = match side {
            Side::Before => &self.before_previews,
            Side::After => &self.after_previews,
        };
        previews.get(name).map(String::as_str)
    }

    pub fn record_result(&mut self, id: impl Into<String>) {
        self.result_id = Some(id.into());
    }

    /// Write the session to `<dir>/session.json`, creating `dir` if needed.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, SessionError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(SESSION_FILENAME);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "saved upload session");
        Ok(path)
    }

    /// Read the session from `dir`. `Ok(None)` if there is none.
    pub fn load(dir: &Path) -> Result<Option<Self>, SessionError> {
        let path = dir.join(SESSION_FILENAME);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Remove the saved session. Returns whether one existed.
    pub fn clear(dir: &Path) -> Result<bool, SessionError> {
        match fs::remove_file(dir.join(SESSION_FILENAME)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

type Described = (Vec<ImageRecord>, BTreeMap<String, String>);

fn describe_all(paths: &[PathBuf], timestamp: DateTime<Utc>) -> Result<Described, SessionError> {
    let mut records = Vec::with_capacity(paths.len());
    let mut previews = BTreeMap::new();
    for path in paths {
        let bytes = fs::read(path).map_err(|source| SessionError::ReadImage {
            path: path.clone(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = naming::mime_type(&name);
        previews.insert(name.clone(), preview_url(mime_type, &bytes));
        records.push(ImageRecord {
            name,
            size: bytes.len() as u64,
            mime_type: mime_type.to_string(),
            from_local: true,
            timestamp,
        });
    }
    Ok((records, previews))
}

/// Inline `data:` URL for an image payload.
pub fn preview_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    fn session_for(fx: &Fixture, before: &[&str], after: &[&str]) -> UploadSession {
        let before: Vec<PathBuf> = before.iter().map(|n| fx.before.join(n)).collect();
        let after: Vec<PathBuf> = after.iter().map(|n| fx.after.join(n)).collect();
        UploadSession::begin(&before, &after).unwrap()
    }

    #[test]
    fn begin_records_metadata_per_side() {
        let fx = image_dirs(&["a.jpg", "b.png"], &["a.tif"]);
        let session = session_for(&fx, &["a.jpg", "b.png"], &["a.tif"]);

        let before = session.records(Side::Before);
        assert_eq!(before.len(), 2);
        assert_eq!(before[0].name, "a.jpg");
        assert_eq!(before[0].size, "before:a.jpg".len() as u64);
        assert_eq!(before[0].mime_type, "image/jpeg");
        assert!(before[0].from_local);
        assert_eq!(before[1].mime_type, "image/png");

        let after = session.records(Side::After);
        assert_eq!(after[0].mime_type, "image/tiff");
        assert_eq!(after[0].timestamp, session.created_at);
        assert!(session.result_id.is_none());
    }

    #[test]
    fn previews_are_data_urls() {
        let fx = image_dirs(&["a.jpg"], &["a.jpg"]);
        let session = session_for(&fx, &["a.jpg"], &["a.jpg"]);

        let expected = format!("data:image/jpeg;base64,{}", STANDARD.encode("before:a.jpg"));
        assert_eq!(session.preview(Side::Before, "a.jpg"), Some(expected.as_str()));
        assert!(session.preview(Side::After, "a.jpg").unwrap().starts_with("data:image/jpeg;base64,"));
        assert_eq!(session.preview(Side::After, "missing.jpg"), None);
    }

    #[test]
    fn begin_fails_on_missing_file() {
        let fx = image_dirs(&["a.jpg"], &[]);
        let result = UploadSession::begin(&[fx.before.join("gone.jpg")], &[]);
        assert!(matches!(result, Err(SessionError::ReadImage { .. })));
    }

    #[test]
    fn save_load_preserves_result_id() {
        let fx = image_dirs(&["a.jpg"], &["a.jpg"]);
        let mut session = session_for(&fx, &["a.jpg"], &["a.jpg"]);
        session.record_result("1700000000");

        let dir = fx.root.path().join("state");
        let path = session.save(&dir).unwrap();
        assert_eq!(path, dir.join(SESSION_FILENAME));

        let loaded = UploadSession::load(&dir).unwrap().unwrap();
        assert_eq!(loaded.result_id.as_deref(), Some("1700000000"));
        assert_eq!(loaded.before, session.before);
        assert_eq!(loaded.preview(Side::Before, "a.jpg"), session.preview(Side::Before, "a.jpg"));
    }

    #[test]
    fn load_without_session_is_none() {
        let fx = image_dirs(&[], &[]);
        assert!(UploadSession::load(fx.root.path()).unwrap().is_none());
    }

    #[test]
    fn clear_removes_session_once() {
        let fx = image_dirs(&["a.jpg"], &["a.jpg"]);
        let session = session_for(&fx, &["a.jpg"], &["a.jpg"]);
        session.save(fx.root.path()).unwrap();

        assert!(UploadSession::clear(fx.root.path()).unwrap());
        assert!(!UploadSession::clear(fx.root.path()).unwrap());
        assert!(UploadSession::load(fx.root.path()).unwrap().is_none());
    }
}
