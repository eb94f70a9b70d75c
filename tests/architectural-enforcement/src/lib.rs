//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - No sleep() calls in production code outside retry backoff
//! - The chat core stays headless (no terminal crates)
//!
//! These tests are designed to catch violations early in the development cycle.
//! This library only holds the source scanning helpers they share.

use std::fs;
use std::path::{Path, PathBuf};

/// Root of the workspace (two levels above this package)
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// A Rust source file, read into lines
pub struct SourceFile {
    /// Path of the file
    pub path: PathBuf,
    /// File content split into lines
    pub lines: Vec<String>,
}

/// All `.rs` files under `dir` (relative to the workspace root)
pub fn rust_sources(dir: &str) -> Vec<SourceFile> {
    let root = workspace_root().join(dir);
    walkdir::WalkDir::new(&root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .filter_map(|e| {
            let content = fs::read_to_string(e.path()).ok()?;
            Some(SourceFile {
                path: e.path().to_path_buf(),
                lines: content.lines().map(String::from).collect(),
            })
        })
        .collect()
}

/// The code part of a line (before any `//` comment)
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Whether the line at `idx` sits inside a `#[cfg(test)]` module
pub fn is_in_test_module(lines: &[String], idx: usize) -> bool {
    lines[..idx]
        .iter()
        .any(|line| line.trim_start().starts_with("#[cfg(test)]"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_part_strips_comments() {
        assert_eq!(code_part("let x = 1; // sleep(1)"), "let x = 1; ");
        assert_eq!(code_part("// only a comment"), "");
    }

    #[test]
    fn test_test_module_detection() {
        let lines: Vec<String> = ["fn real() {}", "#[cfg(test)]", "mod tests {", "    fn t() {}"]
            .into_iter()
            .map(String::from)
            .collect();
        assert!(!is_in_test_module(&lines, 0));
        assert!(is_in_test_module(&lines, 3));
    }

    #[test]
    fn test_workspace_root_has_manifest() {
        assert!(workspace_root().join("Cargo.toml").exists());
    }
}
