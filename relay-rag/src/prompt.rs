//! Prompt assembly: persona + retrieved knowledge + instructions + message.

use std::fmt;

use tracing::debug;

use crate::config::DEFAULT_MAX_CONTEXT_CHARS;
use crate::document::{RetrievalResult, ScoredDocument};

/// Separator placed between retrieved documents.
pub const CONTEXT_SEPARATOR: &str = "\n";

/// Knowledge text used when nothing was retrieved.
pub const EMPTY_CONTEXT: &str = "No specific menu information found.";

const INSTRUCTIONS: &str = "\
- Recommend or describe only items that appear in the knowledge above.
- If the customer asks for something that is not in the knowledge, politely apologize and suggest something that is.
- Never invent items, prices or ingredients.";

/// A fully assembled prompt, built fresh for each request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds a bounded prompt from retrieved documents.
///
/// Documents are joined in rank order. When `max_context_chars` is set and
/// the joined context would exceed it, the lowest-ranked documents are
/// dropped first; if the top document alone is too long it is cut to the
/// cap.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    max_context_chars: Option<usize>,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(Some(DEFAULT_MAX_CONTEXT_CHARS))
    }
}

impl PromptAssembler {
    pub fn new(max_context_chars: Option<usize>) -> Self {
        Self { max_context_chars }
    }

    /// Assemble the prompt for `user_message`.
    pub fn assemble(
        &self,
        persona: &str,
        retrieved: &RetrievalResult,
        user_message: &str,
    ) -> Prompt {
        let context = self.context(retrieved);
        let knowledge = if context.is_empty() { EMPTY_CONTEXT } else { context.as_str() };
        Prompt(format!(
            "{persona}\n\n[Knowledge]\n{knowledge}\n\n[Instructions]\n{INSTRUCTIONS}\n\nCustomer: {user_message}\nAnswer:",
            persona = persona.trim(),
        ))
    }

    /// Join document contents, applying the context cap.
    pub fn context(&self, retrieved: &[ScoredDocument]) -> String {
        let Some(max) = self.max_context_chars else {
            return join(retrieved);
        };

        let sep_len = CONTEXT_SEPARATOR.chars().count();
        let mut kept = 0;
        let mut used = 0;
        for doc in retrieved {
            let len = doc.document.content.chars().count();
            let extra = if kept == 0 { len } else { len + sep_len };
            if used + extra > max {
                break;
            }
            used += extra;
            kept += 1;
        }

        if kept < retrieved.len() {
            debug!(kept, dropped = retrieved.len() - kept, max, "context truncated");
        }
        match (kept, retrieved.first()) {
            (0, Some(top)) => top.document.content.chars().take(max).collect(),
            _ => join(&retrieved[..kept]),
        }
    }
}

fn join(docs: &[ScoredDocument]) -> String {
    docs.iter().map(|d| d.document.content.as_str()).collect::<Vec<_>>().join(CONTEXT_SEPARATOR)
}
