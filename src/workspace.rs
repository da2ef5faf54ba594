//! Workspace state and its update functions
//!
//! The whole editing session is one serializable struct passed through
//! explicit update functions, so the response-interpretation path can be
//! tested without any rendering layer. The transcript is append-only and
//! never mutated after append.

use crate::extract::{extract_fix, SuggestedFix};
use serde::{Deserialize, Serialize};

pub const DEFAULT_FILE_NAME: &str = "untitled.js";

const WELCOME_CODE: &str = "// Welcome to Debugify\n// Start writing your code here...\n\nfunction hello() {\n  console.log(\"Hello, World!\");\n}\n\nhello();\n";

const GREETING: &str = "Hi! I'm your AI coding assistant. How can I help you debug or improve your code today?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry. No identity beyond position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// A file in the workspace sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    pub language: String,
    pub content: String,
}

/// Editor presentation preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorPrefs {
    pub font_size: u8,
    pub minimap: bool,
    pub theme: String,
}

impl Default for EditorPrefs {
    fn default() -> Self {
        Self {
            font_size: 14,
            minimap: true,
            theme: "vs-dark".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub files: Vec<SourceFile>,
    pub selected: usize,
    pub transcript: Vec<ChatMessage>,
    pub prefs: EditorPrefs,
    /// Ephemeral diff slot; never persisted.
    #[serde(skip)]
    pub fix: Option<SuggestedFix>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            files: vec![SourceFile {
                name: DEFAULT_FILE_NAME.to_string(),
                language: "javascript".to_string(),
                content: WELCOME_CODE.to_string(),
            }],
            selected: 0,
            transcript: vec![ChatMessage {
                role: Role::Assistant,
                content: GREETING.to_string(),
            }],
            prefs: EditorPrefs::default(),
            fix: None,
        }
    }

    pub fn current_file(&self) -> Option<&SourceFile> {
        self.files.get(self.selected)
    }

    /// Code currently open in the editor.
    pub fn current_code(&self) -> &str {
        self.current_file().map(|f| f.content.as_str()).unwrap_or("")
    }

    /// Replace the current file's content (an editor keystroke, effectively).
    pub fn edit_current(&mut self, content: String) {
        if let Some(file) = self.files.get_mut(self.selected) {
            file.content = content;
        }
    }

    /// Switch the editor to another file. Returns false for a bad index.
    pub fn select_file(&mut self, index: usize) -> bool {
        if index < self.files.len() {
            self.selected = index;
            true
        } else {
            false
        }
    }

    /// Create a file named `name`, infer its language from the extension,
    /// and select it. Empty names are rejected.
    pub fn create_file(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        self.files.push(SourceFile {
            name: name.to_string(),
            language: language_for(name).to_string(),
            content: format!("// {name}\n\n"),
        });
        self.selected = self.files.len() - 1;
        true
    }

    /// Delete a file. The last remaining file cannot be deleted; selection
    /// falls back to the previous file.
    pub fn delete_file(&mut self, index: usize) -> bool {
        if self.files.len() == 1 || index >= self.files.len() {
            return false;
        }
        self.files.remove(index);
        self.selected = if index > 0 { index - 1 } else { 0 };
        true
    }

    /// Append the user's message to the transcript.
    pub fn record_user(&mut self, content: String) {
        self.transcript.push(ChatMessage {
            role: Role::User,
            content,
        });
    }

    /// Append an assistant reply to the transcript unconditionally, then try
    /// to extract a suggested fix from it. A reply without a qualifying code
    /// block leaves any prior suggestion untouched.
    pub fn record_assistant(&mut self, reply: String) {
        if let Some(fix) = extract_fix(&reply, self.current_code()) {
            self.fix = Some(fix);
        }
        self.transcript.push(ChatMessage {
            role: Role::Assistant,
            content: reply,
        });
    }

    /// Replace the editor's code with the suggested fix and clear the slot.
    /// Full replacement, no merge semantics.
    pub fn apply_fix(&mut self) -> bool {
        match self.fix.take() {
            Some(fix) => {
                self.edit_current(fix.code);
                true
            }
            None => false,
        }
    }

    /// Drop the suggestion without touching the editor's code.
    pub fn dismiss_fix(&mut self) {
        self.fix = None;
    }
}

/// Editor language for a file name, from its extension.
pub fn language_for(name: &str) -> &'static str {
    let ext = name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "py" => "python",
        "html" => "html",
        "css" => "css",
        "json" => "json",
        "md" => "markdown",
        "java" => "java",
        "cpp" => "cpp",
        "c" => "c",
        "go" => "go",
        "rs" => "rust",
        "php" => "php",
        "rb" => "ruby",
        "swift" => "swift",
        "kt" => "kotlin",
        _ => "plaintext",
    }
}
