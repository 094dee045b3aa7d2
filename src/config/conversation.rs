//! Conversation behavior configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::conversation::FINALIZE_PROMPT;

/// Conversation behavior configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ConversationConfig {
    /// Prompt sent to request the final generation brief
    #[serde(default = "default_finalize_prompt")]
    pub finalize_prompt: String,

    /// Additional scaffold prompts, separated by `|`
    pub extra_scaffold_prompts: Option<String>,
}

fn default_finalize_prompt() -> String {
    FINALIZE_PROMPT.to_string()
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            finalize_prompt: default_finalize_prompt(),
            extra_scaffold_prompts: None,
        }
    }
}

impl ConversationConfig {
    /// Get extra scaffold prompts as a vector
    pub fn extra_scaffold_prompts_list(&self) -> Vec<String> {
        self.extra_scaffold_prompts
            .as_ref()
            .map(|s| {
                s.split('|')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.finalize_prompt.trim().is_empty() {
            return Err(ValidationError::EmptyFinalizePrompt);
        }
        Ok(())
    }
}
