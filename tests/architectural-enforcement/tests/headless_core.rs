//! Integration Test: Headless Core
//!
//! **Policy**: `tailchat-core` knows nothing about how it is drawn. Surfaces
//! reach it through the `Viewport` trait, so the core MUST NOT depend on or
//! mention terminal crates.

use std::fs;

use architectural_enforcement::{code_part, rust_sources, workspace_root};

const SURFACE_CRATES: &[&str] = &["ratatui", "crossterm"];

#[test]
fn test_core_manifest_has_no_surface_crates() {
    let manifest = fs::read_to_string(workspace_root().join("tailchat/core/Cargo.toml"))
        .expect("core manifest readable");

    for name in SURFACE_CRATES {
        let declared = manifest
            .lines()
            .map(|line| line.split('#').next().unwrap_or(line).trim())
            .any(|line| line.starts_with(name));
        assert!(!declared, "tailchat-core must not depend on {name}");
    }
}

#[test]
fn test_core_sources_do_not_use_surface_crates() {
    let mut violations = Vec::new();
    for file in rust_sources("tailchat/core/src") {
        for (idx, line) in file.lines.iter().enumerate() {
            let code = code_part(line);
            if SURFACE_CRATES
                .iter()
                .any(|name| code.contains(&format!("{name}::")))
            {
                violations.push(format!("{}:{} - {}", file.path.display(), idx + 1, line.trim()));
            }
        }
    }
    assert!(violations.is_empty(), "surface code in core: {violations:#?}");
}
