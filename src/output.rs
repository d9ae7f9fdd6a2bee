//! CLI output formatting for every command.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects. Diagnostics go through
//! `tracing` to stderr; only results are printed here.
//!
//! # Output Format
//!
//! ## Prepare
//!
//! ```text
//! Pairs
//! 0001.jpg ← a
//!     Before: /data/before/a.jpg
//!     After: /data/after/A.PNG
//!
//! Output
//!     images_A/ (2 files)
//!     images_B/ (2 files)
//!     test.txt
//!
//! Prepared 2 pairs → /data/out
//! ```
//!
//! ## Submit
//!
//! ```text
//! Uploaded 3 before, 3 after
//! Result: 1700000000
//! ```

use crate::prepare::{IMAGES_A_DIR, IMAGES_B_DIR, MANIFEST_FILENAME, Normalized, Side};
use crate::session::UploadSession;
use serde_json::Value;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 file` / `3 files`.
fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Prepare
// ============================================================================

pub fn format_prepare_output(done: &Normalized) -> Vec<String> {
    let mut lines = vec!["Pairs".to_string()];
    for pair in &done.pairs {
        lines.push(format!("{} ← {}", pair.name, pair.source.base_name));
        lines.push(format!("{}Before: {}", indent(1), pair.source.before.display()));
        lines.push(format!("{}After: {}", indent(1), pair.source.after.display()));
    }
    lines.push(String::new());
    lines.push("Output".to_string());
    let files = plural(done.pair_count(), "file");
    lines.push(format!("{}{IMAGES_A_DIR}/ ({files})", indent(1)));
    lines.push(format!("{}{IMAGES_B_DIR}/ ({files})", indent(1)));
    lines.push(format!("{}{MANIFEST_FILENAME}", indent(1)));
    lines.push(String::new());
    lines.push(format!(
        "Prepared {} → {}",
        plural(done.pair_count(), "pair"),
        done.output_dir.display()
    ));
    lines
}

pub fn print_prepare_output(done: &Normalized) {
    for line in format_prepare_output(done) {
        println!("{}", line);
    }
}

// ============================================================================
// Name check
// ============================================================================

pub fn format_name_check(dir: &Path, offending: &[String]) -> Vec<String> {
    if offending.is_empty() {
        return vec![format!("{}: all image names are standard", dir.display())];
    }
    let mut lines = vec![format!(
        "{}: {} with non-standard names",
        dir.display(),
        plural(offending.len(), "image")
    )];
    lines.extend(offending.iter().map(|name| format!("{}{name}", indent(1))));
    lines
}

pub fn print_name_check(dir: &Path, offending: &[String]) {
    for line in format_name_check(dir, offending) {
        println!("{}", line);
    }
}

// ============================================================================
// Submit / download
// ============================================================================

pub fn format_submit_output(session: &UploadSession, reply: &Value) -> Vec<String> {
    let mut lines = vec![format!(
        "Uploaded {} before, {} after",
        session.records(Side::Before).len(),
        session.records(Side::After).len()
    )];
    match &session.result_id {
        Some(id) => lines.push(format!("Result: {id}")),
        None => lines.push("Result: (backend returned no result id)".to_string()),
    }
    if let Some(message) = reply.get("message").and_then(Value::as_str) {
        lines.push(format!("{}{message}", indent(1)));
    }
    lines
}

pub fn print_submit_output(session: &UploadSession, reply: &Value) {
    for line in format_submit_output(session, reply) {
        println!("{}", line);
    }
}

pub fn format_download_output(id: &str, dest: &Path, size: usize) -> Vec<String> {
    vec![format!(
        "Downloaded result {id} ({}) → {}",
        plural(size, "byte"),
        dest.display()
    )]
}

pub fn print_download_output(id: &str, dest: &Path, size: usize) {
    for line in format_download_output(id, dest, size) {
        println!("{}", line);
    }
}

/// Summary of the images a session was started with.
pub fn format_session(session: &UploadSession) -> Vec<String> {
    let mut lines = vec![format!(
        "Session started {}",
        session.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    )];
    for side in [Side::Before, Side::After] {
        let records = session.records(side);
        lines.push(format!("{}{side} ({})", indent(1), plural(records.len(), "image")));
        for record in records {
            lines.push(format!(
                "{}{} [{}, {}]",
                indent(2),
                record.name,
                record.mime_type,
                plural(record.size as usize, "byte")
            ));
        }
    }
    lines
}

pub fn print_session(session: &UploadSession) {
    for line in format_session(session) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prepare::normalize_local;
    use crate::test_helpers::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn empty_session() -> UploadSession {
        UploadSession {
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            before: Vec::new(),
            after: Vec::new(),
            before_previews: BTreeMap::new(),
            after_previews: BTreeMap::new(),
            result_id: None,
        }
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "pair"), "1 pair");
        assert_eq!(plural(0, "pair"), "0 pairs");
        assert_eq!(plural(3, "file"), "3 files");
    }

    #[test]
    fn format_prepare_lists_pairs_and_layout() {
        let fx = image_dirs(&["a.jpg", "B.png"], &["A.PNG", "b.JPG"]);
        let done = normalize_local(&fx.before, &fx.after, &fx.output).unwrap();

        let lines = format_prepare_output(&done);
        assert_eq!(lines[0], "Pairs");
        assert_eq!(lines[1], "0001.jpg ← a");
        assert_eq!(lines[2], format!("    Before: {}", fx.before.join("a.jpg").display()));
        assert_eq!(lines[3], format!("    After: {}", fx.after.join("A.PNG").display()));
        assert_eq!(lines[4], "0002.png ← B");
        assert!(lines.contains(&"    images_A/ (2 files)".to_string()));
        assert!(lines.contains(&"    test.txt".to_string()));
        assert_eq!(
            lines.last().unwrap(),
            &format!("Prepared 2 pairs → {}", fx.output.display())
        );
    }

    #[test]
    fn format_name_check_clean() {
        let lines = format_name_check(Path::new("imgs"), &[]);
        assert_eq!(lines, vec!["imgs: all image names are standard"]);
    }

    #[test]
    fn format_name_check_lists_offenders() {
        let lines = format_name_check(Path::new("imgs"), &["a b.jpg".to_string()]);
        assert_eq!(lines, vec!["imgs: 1 image with non-standard names", "    a b.jpg"]);
    }

    #[test]
    fn format_submit_with_result_id() {
        let mut session = empty_session();
        session.record_result("1700000000");

        let lines = format_submit_output(&session, &json!({"message": "done"}));
        assert_eq!(lines, vec!["Uploaded 0 before, 0 after", "Result: 1700000000", "    done"]);
    }

    #[test]
    fn format_submit_without_result_id() {
        let lines = format_submit_output(&empty_session(), &Value::Null);
        assert_eq!(lines[1], "Result: (backend returned no result id)");
    }

    #[test]
    fn format_download_line() {
        let lines = format_download_output("7", Path::new("out/r.zip"), 1);
        assert_eq!(lines, vec!["Downloaded result 7 (1 byte) → out/r.zip"]);
    }

    #[test]
    fn format_session_lists_both_sides() {
        let fx = image_dirs(&["a.jpg"], &[]);
        let mut session = UploadSession::begin(&[fx.before.join("a.jpg")], &[]).unwrap();
        session.created_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();

        let lines = format_session(&session);
        assert_eq!(lines[0], "Session started 2024-05-01 12:30:00 UTC");
        assert_eq!(lines[1], "    before (1 image)");
        assert_eq!(lines[2], "        a.jpg [image/jpeg, 12 bytes]");
        assert_eq!(lines[3], "    after (0 images)");
    }
}
