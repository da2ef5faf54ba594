//! Prompt construction for the debugging mentor
//!
//! The prompt is a deterministic template: a fixed teaching persona, an
//! enumerated response structure, and the optional code context fenced with
//! the file's language tag. The fixed code is always requested as a single
//! fenced block so the interpreter can locate it mechanically.

pub const MENTOR_PERSONA: &str = r#"You are an educational programming mentor and debugging assistant. Your goal is to TEACH students, not just give them solutions.

IMPORTANT RESPONSE STRUCTURE - Always follow this order:
1. **ERROR/ISSUE**: Start by clearly identifying what's wrong. Point out the specific error, bug, or problem in the code with line numbers if applicable.
2. **APPROACH**: Explain the thinking process and methodology to solve this problem. Guide them on HOW to approach debugging or fixing this type of issue.
3. **CONCEPT**: Explain the underlying programming concepts, principles, or theory involved. Help them understand WHY this error occurs.
4. **SOLUTION**: Provide the explanation of the fix with clear reasoning.
5. **FIXED CODE**: If changes are needed, provide ONLY the corrected code in a single fenced code block tagged with the language.

TEACHING GUIDELINES:
- Use analogies and simple examples to explain complex concepts
- Break down problems into smaller, understandable parts
- Ask guiding questions to make students think
- Explain common mistakes and why they happen
- Encourage understanding over memorization
- After explaining everything, provide ONLY the fixed code in a single code block (not before/after)
- The fixed code will be shown in a split-screen diff view automatically"#;

/// Build the full prompt for one user turn.
///
/// Deterministic: the same inputs always produce the same prompt text.
pub fn build_prompt(message: &str, code: Option<&str>, language: Option<&str>) -> String {
    let language = language.unwrap_or("");
    let mut prompt = String::with_capacity(
        MENTOR_PERSONA.len() + message.len() + code.map_or(0, str::len) + 256,
    );

    prompt.push_str(MENTOR_PERSONA);
    prompt.push_str("\n\n");

    if let Some(code) = code {
        prompt.push_str(&format!(
            "Current code ({language}):\n```{language}\n{code}\n```\n\n"
        ));
    }

    prompt.push_str(&format!("Student question: {message}\n\n"));
    prompt.push_str(
        "Remember: your role is to be a patient teacher. Help them learn to debug and \
         think like a programmer, not just fix their immediate problem. End with a \
         single fenced code block containing the complete fixed code, tagged with ",
    );
    if language.is_empty() {
        prompt.push_str("the language.");
    } else {
        prompt.push_str(&format!("`{language}`."));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_is_deterministic() {
        let a = build_prompt("why?", Some("x = 1"), Some("python"));
        let b = build_prompt("why?", Some("x = 1"), Some("python"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_prompt_sections_in_order() {
        let prompt = build_prompt("help", None, None);
        let issue = prompt.find("ERROR/ISSUE").unwrap();
        let approach = prompt.find("APPROACH").unwrap();
        let concept = prompt.find("CONCEPT").unwrap();
        let solution = prompt.find("SOLUTION").unwrap();
        let fixed = prompt.find("FIXED CODE").unwrap();
        assert!(issue < approach && approach < concept && concept < solution && solution < fixed);
    }

    #[test]
    fn test_code_context_is_fenced_with_language() {
        let prompt = build_prompt("fix this", Some("print('hi')"), Some("python"));
        assert!(prompt.contains("```python\nprint('hi')\n```"));
        assert!(prompt.contains("Student question: fix this"));
    }

    #[test]
    fn test_no_code_context_when_absent() {
        let prompt = build_prompt("what is a closure?", None, Some("javascript"));
        assert!(!prompt.contains("Current code"));
    }
}
