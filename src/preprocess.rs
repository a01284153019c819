//! Prompt preprocessing applied before a prompt reaches the assistant.

use tracing::warn;

use crate::config::PreprocessConfig;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct QueryPreprocessor {
    max_chars: usize,
}

impl QueryPreprocessor {
    pub fn new(config: &PreprocessConfig) -> Self {
        Self { max_chars: config.max_chars }
    }

    /// Normalise a raw prompt: drop control characters, collapse whitespace
    /// runs into single spaces, trim, and cap the length at `max_chars`.
    pub fn clean(&self, prompt: &str) -> Result<String, AppError> {
        let mut cleaned = String::with_capacity(prompt.len());
        for word in prompt
            .split(char::is_whitespace)
            .map(|w| w.chars().filter(|c| !c.is_control()).collect::<String>())
            .filter(|w| !w.is_empty())
        {
            if !cleaned.is_empty() {
                cleaned.push(' ');
            }
            cleaned.push_str(&word);
        }

        if cleaned.is_empty() {
            return Err(AppError::EmptyPrompt);
        }

        let char_count = cleaned.chars().count();
        if char_count > self.max_chars {
            warn!(chars = char_count, max_chars = self.max_chars, "prompt truncated");
            cleaned = cleaned.chars().take(self.max_chars).collect::<String>().trim_end().to_string();
        }
        Ok(cleaned)
    }
}
