//! AI-assist request pipeline
//!
//! Prompt construction, the Gemini client, and the retry-aware dispatcher
//! that ties them together.

pub mod client;
pub mod dispatch;
pub mod prompt;

pub use client::{GeminiClient, ModelError, TextModel};
pub use dispatch::{dispatch, AssistError, Sleeper, TokioSleeper, MAX_ATTEMPTS};
pub use prompt::build_prompt;
