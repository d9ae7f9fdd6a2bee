//! # change-detect
//!
//! Command-line client for a remote image change-detection service. Users
//! hand over two sets of images of the same scenes, "before" and "after";
//! the backend runs inference and produces a result archive.
//!
//! # Workflow
//!
//! ```text
//! 1. Prepare   before/ + after/  →  out/images_A, out/images_B, out/test.txt
//! 2. Submit    before/ + after/  →  POST /infer       → session.json
//! 3. Download  session.json      →  GET /download/id  → result .zip
//! ```
//!
//! Preparation is local and optional: it pairs the two folders by
//! case-insensitive base name and renames each pair to a shared sequence
//! number (`0001.jpg`, `0002.png`, ...) so that a backend expecting the
//! `images_A`/`images_B`/`test.txt` layout can consume it directly.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`prepare`] | Folder pairing and normalization into the `images_A`/`images_B` layout |
//! | [`naming`] | Base names, image extensions, sequence names, standard-name check |
//! | [`fs`] | Filesystem capability trait used by [`prepare`], plus the local implementation |
//! | [`client`] | Blocking HTTP client for `/infer` and `/download/{id}` with error translation |
//! | [`session`] | Upload session context passed from the submit step to the download step |
//! | [`config`] | `config.toml` loading, merging over stock defaults, and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Results, Not Exceptions
//!
//! Every operation returns a `Result` with a module-specific error enum.
//! [`prepare::PrepareReport`] flattens a preparation result into a
//! `{ success, message }` record for callers that want a single shape.
//!
//! ## Explicit Session Context
//!
//! Image metadata and previews gathered at upload time live in an
//! [`session::UploadSession`] value that is saved next to the other temp
//! files and loaded by the download step. There is no process-wide state.
//!
//! ## No Rollback
//!
//! Preparation copies pair by pair and stops at the first failure, leaving
//! earlier copies in place. Prepare into a fresh directory and move it into
//! place afterwards if you need all-or-nothing output.

pub mod client;
pub mod config;
pub mod fs;
pub mod naming;
pub mod output;
pub mod prepare;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;
