//! HTTP client for the change-detection backend.
//!
//! The backend exposes two endpoints:
//!
//! | Method | Path              | Body / Response                                  |
//! |--------|-------------------|--------------------------------------------------|
//! | POST   | `/infer`          | multipart `before_files` + `after_files` → JSON  |
//! | GET    | `/download/{id}`  | → result archive (zip bytes)                     |
//!
//! Inference is slow, so `/infer` and `/download` get their own long timeouts
//! from [`ServerConfig`]; everything else uses the ordinary request timeout.
//!
//! ## Error translation
//!
//! Transport and HTTP failures are folded into [`ClientError`] with messages a
//! user can act on:
//!
//! - non-2xx → [`ClientError::Server`], message taken from the JSON body's
//!   `error` field when present, else `server error: <status>`
//! - connection refused → [`ClientError::Unreachable`]
//! - timeout → [`ClientError::Timeout`]
//! - anything else on the wire → [`ClientError::Network`]

use crate::config::ServerConfig;
use crate::naming;
use crate::prepare::Side;
use reqwest::Url;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("cannot connect to the detection server at {base_url}; is the backend running?")]
    Unreachable { base_url: String },
    #[error("request timed out after {}s; check that the server is healthy", .after.as_secs())]
    Timeout { after: Duration },
    #[error("{message}")]
    Server { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("request configuration error: {0}")]
    Request(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("cannot read {}: {source}", .path.display())]
    ReadFile { path: PathBuf, source: io::Error },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Blocking client bound to one backend.
#[derive(Debug, Clone)]
pub struct DetectionClient {
    base_url: Url,
    http: Client,
    request_timeout: Duration,
    infer_timeout: Duration,
    download_timeout: Duration,
}

impl DetectionClient {
    pub fn new(config: &ServerConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::Request(format!("invalid base URL {}: {e}", config.base_url)))?;
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ClientError::Request(e.to_string()))?;
        Ok(Self {
            base_url,
            http,
            request_timeout: config.request_timeout(),
            infer_timeout: config.infer_timeout(),
            download_timeout: config.download_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Upload both image sets to `/infer` and return the backend's JSON reply.
    pub fn submit(&self, before: &[PathBuf], after: &[PathBuf]) -> Result<Value, ClientError> {
        let mut form = Form::new();
        form = attach_files(form, Side::Before, before)?;
        form = attach_files(form, Side::After, after)?;

        let url = self.endpoint(&["infer"])?;
        info!(
            url = %url,
            before = before.len(),
            after = after.len(),
            "submitting detection request"
        );
        let response = self
            .http
            .post(url)
            .timeout(self.infer_timeout)
            .multipart(form)
            .send()
            .map_err(|e| self.translate(e, self.infer_timeout))?;
        let response = ensure_success(response)?;

        let body = response
            .text()
            .map_err(|e| self.translate(e, self.infer_timeout))?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Fetch the result archive for `id` from `/download/{id}`.
    pub fn download(&self, id: &str) -> Result<Vec<u8>, ClientError> {
        let url = self.endpoint(&["download", id])?;
        info!(url = %url, "downloading detection result");
        let response = self
            .http
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .map_err(|e| self.translate(e, self.download_timeout))?;
        let response = ensure_success(response)?;
        let bytes = response
            .bytes()
            .map_err(|e| self.translate(e, self.download_timeout))?;
        debug!(bytes = bytes.len(), "download finished");
        Ok(bytes.to_vec())
    }

    /// Whether the backend answers at all. Any HTTP status counts as online.
    pub fn check_status(&self) -> bool {
        match self.http.get(self.base_url.clone()).send() {
            Ok(response) => {
                debug!(status = %response.status(), "backend answered");
                true
            }
            Err(e) => {
                warn!(error = %self.translate(e, self.request_timeout), "backend unavailable");
                false
            }
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::Request(format!("{} cannot be used as a base URL", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn translate(&self, e: reqwest::Error, timeout: Duration) -> ClientError {
        let translated = if e.is_timeout() {
            ClientError::Timeout { after: timeout }
        } else if e.is_connect() {
            ClientError::Unreachable {
                base_url: self.base_url.to_string(),
            }
        } else if e.is_builder() {
            ClientError::Request(e.to_string())
        } else if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Network(e.to_string())
        };
        warn!(error = %e, "request failed");
        translated
    }
}

/// Pull the result identifier out of an `/infer` reply (`timestamp` field).
///
/// The id ends up in a file name, so anything outside `[A-Za-z0-9_.-]` is
/// refused.
pub fn result_id(reply: &Value) -> Option<String> {
    let id = match reply.get("timestamp")? {
        Value::Number(n) => n.to_string(),
        Value::String(s) if !s.is_empty() => s.clone(),
        _ => return None,
    };
    if id.chars().all(is_id_char) {
        Some(id)
    } else {
        warn!(%id, "ignoring result id with unexpected characters");
        None
    }
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Default archive name for a result id. Always a single path component.
pub fn archive_filename(id: &str) -> String {
    let id: String = id
        .chars()
        .map(|c| if is_id_char(c) { c } else { '_' })
        .collect();
    format!("change_detection_result_{id}.zip")
}

/// Write a downloaded archive to `dest`, creating parent folders.
pub fn save_archive(bytes: &[u8], dest: &Path) -> Result<(), ClientError> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(dest, bytes)?;
    Ok(())
}

fn field_name(side: Side) -> &'static str {
    match side {
        Side::Before => "before_files",
        Side::After => "after_files",
    }
}

fn attach_files(mut form: Form, side: Side, files: &[PathBuf]) -> Result<Form, ClientError> {
    if files.is_empty() {
        warn!(%side, "no {} files provided", side);
    }
    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let part = Part::file(path)
            .map_err(|source| ClientError::ReadFile {
                path: path.clone(),
                source,
            })?
            .mime_str(naming::mime_type(&name))
            .map_err(|e| ClientError::Request(e.to_string()))?
            .file_name(name);
        form = form.part(field_name(side), part);
    }
    Ok(form)
}

fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("server error: {}", status.as_u16()));
    warn!(status = status.as_u16(), %message, "server rejected request");
    Err(ClientError::Server {
        status: status.as_u16(),
        message,
    })
}
