//! Remote code execution via the Piston API
//!
//! External collaborator: the code never runs locally. The client posts the
//! current file and formats the result into the success/error panel text the
//! output pane shows.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const PISTON_URL: &str = "https://emkc.org/api/v2/piston/execute";

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("execution service error: {0}")]
    Api(String),
    #[error("execution request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct RunRequest<'a> {
    language: &'a str,
    version: &'a str,
    files: Vec<RunFile<'a>>,
}

#[derive(Serialize)]
struct RunFile<'a> {
    name: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct RunResponse {
    run: Option<RunResult>,
}

#[derive(Deserialize, Default)]
struct RunResult {
    #[serde(default)]
    output: String,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
}

/// Result of one remote run, formatted for the output panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub success: bool,
    pub panel: String,
}

pub struct RunnerClient {
    http: reqwest::Client,
    url: String,
}

impl Default for RunnerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RunnerClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            url: PISTON_URL.to_string(),
        }
    }

    /// Execute one file remotely. `version: "*"` asks for the latest
    /// available toolchain.
    pub async fn execute(
        &self,
        language: &str,
        file_name: &str,
        content: &str,
    ) -> Result<RunOutcome, RunnerError> {
        let request = RunRequest {
            language,
            version: "*",
            files: vec![RunFile {
                name: file_name,
                content,
            }],
        };

        let response = self.http.post(&self.url).json(&request).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(RunnerError::Api(format!("{status}: {text}")));
        }

        let parsed: RunResponse =
            serde_json::from_str(&text).map_err(|e| RunnerError::Api(e.to_string()))?;
        let run = parsed
            .run
            .ok_or_else(|| RunnerError::Api("response carried no run result".to_string()))?;

        let stdout = if run.output.is_empty() {
            run.stdout
        } else {
            run.output
        };
        Ok(format_panel(language, file_name, &stdout, &run.stderr))
    }
}

/// Format stdout/stderr into the panel text shown in the output pane.
pub fn format_panel(language: &str, file_name: &str, stdout: &str, stderr: &str) -> RunOutcome {
    let mut panel = String::new();
    if stderr.is_empty() {
        panel.push_str("== EXECUTION SUCCESSFUL ==\n");
        panel.push_str(&format!("File: {file_name}\n\nOutput:\n"));
        panel.push_str("------------------------------------------------------------\n");
        if stdout.is_empty() {
            panel.push_str("(no output)\n");
        } else {
            panel.push_str(stdout);
            if !stdout.ends_with('\n') {
                panel.push('\n');
            }
        }
        panel.push_str("------------------------------------------------------------\n");
        RunOutcome {
            success: true,
            panel,
        }
    } else {
        panel.push_str(&format!("== {} ERROR ==\n", language.to_uppercase()));
        panel.push_str(&format!("File: {file_name}\n"));
        if !stdout.is_empty() {
            panel.push_str(&format!("\nOutput:\n{stdout}\n"));
        }
        panel.push_str("\nError details:\n");
        panel.push_str("------------------------------------------------------------\n");
        panel.push_str(stderr);
        if !stderr.ends_with('\n') {
            panel.push('\n');
        }
        panel.push_str("------------------------------------------------------------\n");
        RunOutcome {
            success: false,
            panel,
        }
    }
}
