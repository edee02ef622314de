//! Interactive input utilities for user prompts
//!
//! Confirmation prompts sit behind a small trait so the copy coordinator
//! can be exercised in tests without a terminal.

use crate::error::{BlobCopyError, Result};
use dialoguer::{theme::ColorfulTheme, Confirm};

/// Yes/no confirmation seam
pub trait Confirmation: Send + Sync {
    /// Ask the user to confirm; `false` means declined
    fn confirm(&self, message: &str) -> Result<bool>;
}

/// Interactive confirmation via dialoguer
pub struct PromptConfirmation {
    theme: ColorfulTheme,
}

impl PromptConfirmation {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for PromptConfirmation {
    fn default() -> Self {
        Self::new()
    }
}

impl Confirmation for PromptConfirmation {
    fn confirm(&self, message: &str) -> Result<bool> {
        Confirm::with_theme(&self.theme)
            .with_prompt(message)
            .default(false)
            .interact()
            .map_err(|e| BlobCopyError::config(format!("Failed to get user input: {e}")))
    }
}

/// Non-interactive confirmation with a fixed answer
pub struct StaticConfirmation {
    answer: bool,
}

impl StaticConfirmation {
    pub fn new(answer: bool) -> Self {
        Self { answer }
    }
}

impl Confirmation for StaticConfirmation {
    fn confirm(&self, _message: &str) -> Result<bool> {
        Ok(self.answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_confirmation() {
        assert!(StaticConfirmation::new(true).confirm("proceed?").unwrap());
        assert!(!StaticConfirmation::new(false).confirm("proceed?").unwrap());
    }
}
