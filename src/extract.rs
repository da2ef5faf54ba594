//! Suggested-fix extraction from model replies
//!
//! The model's answer is free text; the fix is pulled out of it by pattern
//! matching. A block explicitly labeled as the "AFTER"/fixed version wins;
//! otherwise the first fenced block qualifies only when it differs from the
//! code currently in the editor.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Code proposed as a full replacement for the user's current code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedFix {
    pub code: String,
    pub visible: bool,
}

fn after_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)\*\*after.*?\*\*:?\s*```\w*\n(.*?)```").expect("valid after-block regex")
    })
}

fn any_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```\w*\n(.*?)```").expect("valid code-block regex"))
}

/// Extract a suggested fix from an assistant reply, if one qualifies.
///
/// Extraction misses are not errors: the reply still goes into the chat
/// transcript either way, and any prior suggestion is left in place.
pub fn extract_fix(response: &str, current_code: &str) -> Option<SuggestedFix> {
    if let Some(caps) = after_block_re().captures(response) {
        let code = caps[1].trim();
        if !code.is_empty() {
            return Some(SuggestedFix {
                code: code.to_string(),
                visible: true,
            });
        }
    }

    if let Some(caps) = any_block_re().captures(response) {
        let code = caps[1].trim();
        if !code.is_empty() && code != current_code.trim() {
            return Some(SuggestedFix {
                code: code.to_string(),
                visible: true,
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labeled_after_block_wins_over_other_blocks() {
        let response = "Here is the before:\n```python\nprint('broken')\n```\n\
                        **AFTER (fixed)**:\n```python\nprint('x')\n```\nDone.";
        let fix = extract_fix(response, "print('broken')").unwrap();
        assert_eq!(fix.code, "print('x')");
        assert!(fix.visible);
    }

    #[test]
    fn test_after_label_is_case_insensitive() {
        let response = "**After version**: \n```js\nconsole.log(1);\n```";
        let fix = extract_fix(response, "").unwrap();
        assert_eq!(fix.code, "console.log(1);");
    }

    #[test]
    fn test_unlabeled_block_identical_to_current_code_is_ignored() {
        let response = "Your code is already correct:\n```python\nprint('x')\n```";
        assert_eq!(extract_fix(response, "  print('x')  \n"), None);
    }

    #[test]
    fn test_unlabeled_block_differing_from_current_code_qualifies() {
        let response = "Try this instead:\n```python\nprint('fixed')\n```";
        let fix = extract_fix(response, "print('x')").unwrap();
        assert_eq!(fix.code, "print('fixed')");
        assert!(fix.visible);
    }

    #[test]
    fn test_no_code_block_yields_nothing() {
        assert_eq!(extract_fix("Just prose, no code here.", "print('x')"), None);
    }

    #[test]
    fn test_empty_block_yields_nothing() {
        assert_eq!(extract_fix("```python\n   \n```", "print('x')"), None);
    }

    #[test]
    fn test_fence_language_tag_is_optional() {
        let response = "```\nlet x = 1;\n```";
        let fix = extract_fix(response, "").unwrap();
        assert_eq!(fix.code, "let x = 1;");
    }
}
