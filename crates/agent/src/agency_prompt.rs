//! Deployment prompt prepended to every task prompt.
//!
//! Selection is `<agent_kind>-<mode>.md` with a `<agent_kind>-prod.md`
//! fallback. A missing file means no prefix; an unreadable file is a
//! `prompt_error`.

use agency_core::AgentKind;
use std::io;
use std::path::Path;

/// Load the agency prompt for this deployment, if one is configured.
pub fn load_agency_prompt(
    prompts_dir: &Path,
    kind: AgentKind,
    mode: &str,
) -> io::Result<Option<String>> {
    let candidates = [
        prompts_dir.join(format!("{kind}-{mode}.md")),
        prompts_dir.join(format!("{kind}-prod.md")),
    ];
    for path in &candidates {
        match std::fs::read_to_string(path) {
            Ok(text) => return Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(None)
}

/// Final prompt handed to the CLI: agency prompt, blank line, task prompt.
pub fn compose_prompt(agency: Option<&str>, task_prompt: &str) -> String {
    match agency {
        Some(prefix) if !prefix.trim().is_empty() => {
            format!("{}\n\n{}", prefix.trim_end(), task_prompt)
        }
        _ => task_prompt.to_string(),
    }
}

#[cfg(test)]
#[path = "agency_prompt_tests.rs"]
mod tests;
