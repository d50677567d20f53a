use super::{compose_prompt, load_agency_prompt};
use agency_core::AgentKind;
use tempfile::tempdir;

#[test]
fn mode_file_preferred_over_prod() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("claude-staging.md"), "staging rules").unwrap();
    std::fs::write(dir.path().join("claude-prod.md"), "prod rules").unwrap();

    let loaded = load_agency_prompt(dir.path(), AgentKind::Claude, "staging").unwrap();
    assert_eq!(loaded.as_deref(), Some("staging rules"));
}

#[test]
fn falls_back_to_prod() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("claude-prod.md"), "prod rules").unwrap();

    let loaded = load_agency_prompt(dir.path(), AgentKind::Claude, "staging").unwrap();
    assert_eq!(loaded.as_deref(), Some("prod rules"));
}

#[test]
fn missing_files_mean_no_prefix() {
    let dir = tempdir().unwrap();
    let loaded = load_agency_prompt(dir.path(), AgentKind::Codex, "prod").unwrap();
    assert!(loaded.is_none());
}

#[test]
fn compose_prepends_with_blank_line() {
    assert_eq!(
        compose_prompt(Some("be careful\n"), "do the thing"),
        "be careful\n\ndo the thing"
    );
    assert_eq!(compose_prompt(None, "do the thing"), "do the thing");
    assert_eq!(compose_prompt(Some("  \n"), "do the thing"), "do the thing");
}
