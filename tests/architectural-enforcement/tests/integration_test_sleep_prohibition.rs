//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code in the core and the TUI MUST NOT call sleep
//! methods. Waiting happens on I/O, channels, or `tokio::time::interval`.
//! **Exceptions**: exponential backoff between handshake retries, test code.

use std::path::Path;

use architectural_enforcement::{code_part, is_in_test_module, rust_sources};

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = Vec::new();
    for dir in ["tailchat/core/src", "tui/src"] {
        for file in rust_sources(dir) {
            find_sleep_violations(&file.path, &file.lines, &mut violations);
        }
    }

    if !violations.is_empty() {
        eprintln!("\nSleep calls found in production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nACCEPTABLE sleep uses:");
        eprintln!("  - Exponential backoff in retry logic");
        eprintln!("  - Test code (#[cfg(test)] modules)");
        eprintln!("\nFORBIDDEN:");
        eprintln!("  - Sleep in polling or frame loops (use tokio::time::interval)");
        eprintln!("  - Sleep as poor man's synchronization");

        panic!(
            "\nFound {} sleep violation(s) in production code.",
            violations.len()
        );
    }
}

#[test]
fn test_sources_were_scanned() {
    // Guards against a moved directory silently turning the scan into a no-op
    assert!(!rust_sources("tailchat/core/src").is_empty());
    assert!(!rust_sources("tui/src").is_empty());
}

fn find_sleep_violations(path: &Path, lines: &[String], violations: &mut Vec<String>) {
    for (idx, line) in lines.iter().enumerate() {
        let code = code_part(line);
        if !(code.contains("::sleep(") || code.contains(".sleep(")) {
            continue;
        }
        if is_in_test_module(lines, idx) || is_backoff_context(lines, idx) {
            continue;
        }
        violations.push(format!("{}:{} - {}", path.display(), idx + 1, line.trim()));
    }
}

/// Check if sleep is used for exponential backoff (acceptable for retry logic)
fn is_backoff_context(lines: &[String], current_idx: usize) -> bool {
    let context_range = current_idx.saturating_sub(15)..std::cmp::min(current_idx + 5, lines.len());

    let mut has_backoff_calc = false;
    let mut has_retry_context = false;

    for line in &lines[context_range] {
        let line = line.to_lowercase();

        if line.contains("backoff_for_attempt") || line.contains("<<") || line.contains("pow") {
            has_backoff_calc = true;
        }

        if line.contains("retry") || line.contains("retries") || line.contains("attempt") {
            has_retry_context = true;
        }
    }

    has_backoff_calc && has_retry_context
}

fn lines(code: &[&str]) -> Vec<String> {
    code.iter().map(|l| (*l).to_string()).collect()
}

#[test]
fn test_sleep_in_plain_function_is_flagged() {
    let code = lines(&[
        "fn bad_function() {",
        "    tokio::time::sleep(Duration::from_millis(10)).await;",
        "}",
    ]);
    let mut violations = Vec::new();
    find_sleep_violations(Path::new("bad.rs"), &code, &mut violations);
    assert_eq!(violations.len(), 1);
}

#[test]
fn test_backoff_detection() {
    let code = lines(&[
        "async fn open() {",
        "    let backoff = self.retry.backoff_for_attempt(retries);",
        "    tracing::debug!(attempt = retries + 1, \"backing off\");",
        "    tokio::time::sleep(backoff).await;",
        "}",
    ]);
    assert!(is_backoff_context(&code, 3));

    let mut violations = Vec::new();
    find_sleep_violations(Path::new("retry.rs"), &code, &mut violations);
    assert!(violations.is_empty());
}

#[test]
fn test_comment_mentions_are_ignored() {
    let code = lines(&["fn f() {", "    // never tokio::time::sleep(x) here", "}"]);
    let mut violations = Vec::new();
    find_sleep_violations(Path::new("doc.rs"), &code, &mut violations);
    assert!(violations.is_empty());
}
