//! System prompts for each generation role.
//!
//! Templates live as `<name>.txt` files in the prompts directory so they can
//! be tuned without rebuilding. Missing or empty files fall back to the
//! built-in text below.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::models::PromptRole;

const PM_ASK: &str = "You are a product manager interviewing the author of a software \
specification. Read the specification and ask exactly one clarifying question that would \
most improve it. Reply with the question only.";

const ARCH_ANSWER: &str = "You are the lead architect of the system being specified. Answer \
the question concisely and concretely, making a decision wherever the specification is silent.";

const SYS_PATCH: &str = "You maintain a Markdown specification. You receive the current SPEC \
and an ANSWER. Reply with one unified diff against the SPEC, using @@ hunk headers with line \
numbers, that folds the answer into the most relevant section. Reply with the diff only.";

const PENDING_PATCH: &str = "The Markdown specification below ends with a Pending Updates \
section holding diffs that could not be merged. Reply with one unified diff against the \
document that merges those changes into the right sections and removes the Pending Updates \
section. Reply with the diff only.";

fn builtin_template(role: PromptRole) -> &'static str {
    match role {
        PromptRole::Question => PM_ASK,
        PromptRole::Answer => ARCH_ANSWER,
        PromptRole::Patch => SYS_PATCH,
        PromptRole::PendingPatch => PENDING_PATCH,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    templates: HashMap<PromptRole, String>,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptSet {
    pub fn builtin() -> Self {
        let templates = PromptRole::ALL
            .iter()
            .map(|role| (*role, builtin_template(*role).to_string()))
            .collect();
        Self { templates }
    }

    /// Read each role's template from `dir`, keeping the built-in text for
    /// any file that is missing, unreadable or blank.
    pub fn load(dir: &Path) -> Self {
        let mut set = Self::builtin();
        for role in PromptRole::ALL {
            let path = dir.join(format!("{}.txt", role.template_name()));
            match fs::read_to_string(&path) {
                Ok(text) if !text.trim().is_empty() => {
                    debug!(role = %role, path = %path.display(), "loaded prompt template");
                    set.templates.insert(role, text.trim().to_string());
                }
                Ok(_) => debug!(role = %role, "prompt template is blank, using built-in"),
                Err(_) => debug!(role = %role, "no prompt template file, using built-in"),
            }
        }
        set
    }

    pub fn template(&self, role: PromptRole) -> &str {
        self.templates
            .get(&role)
            .map(String::as_str)
            .unwrap_or_else(|| builtin_template(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_templates_are_non_empty() {
        let set = PromptSet::builtin();
        for role in PromptRole::ALL {
            assert!(!set.template(role).is_empty());
        }
    }

    #[test]
    fn test_load_overrides_and_falls_back() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pm_ask.txt"), "  Ask about edge cases.\n").unwrap();
        fs::write(dir.path().join("sys_patch.txt"), "\n\n").unwrap();

        let set = PromptSet::load(dir.path());

        assert_eq!(set.template(PromptRole::Question), "Ask about edge cases.");
        assert_eq!(set.template(PromptRole::Patch), SYS_PATCH);
        assert_eq!(set.template(PromptRole::Answer), ARCH_ANSWER);
    }

    #[test]
    fn test_load_missing_directory() {
        let set = PromptSet::load(Path::new("/nonexistent/prompts"));
        assert_eq!(set, PromptSet::builtin());
    }
}
