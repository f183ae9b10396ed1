// Answer module
// Grounds a completion in retrieved excerpts and appends them for citation

#[cfg(test)]
mod tests;

use tracing::{debug, warn};

use crate::provider::{ChatMessage, Completer};
use crate::retriever::RetrievalResult;
use crate::{QaError, Result};

/// Separator between the generated answer and the excerpt appendix
pub const EXCERPTS_SEPARATOR: &str = "\n--- EXCERPTS ---\n";

const INSTRUCTIONS: &str = "given the excerpts from the paper above, answer the user query.\n\
In your answer, make sure to cite the excerpts by its number wherever appropriate.\n\
Note, however, that the excerpts may not be relevant to the user query.";

/// Prompt sent as the single user message for one question
#[inline]
pub fn build_prompt(query: &str, title: &str, excerpts: &str) -> String {
    format!(
        "user query:\n{query}\n\ntitle of the paper:\n{title}\n\nexcerpts:\n{excerpts}\n---\n{INSTRUCTIONS}\n"
    )
}

/// Asks `completer` to answer `query` from `result` and returns the first
/// choice followed by [`EXCERPTS_SEPARATOR`] and the numbered excerpts.
///
/// A response without choices is a [`QaError::Completion`].
#[inline]
pub fn answer(
    query: &str,
    title: &str,
    result: &RetrievalResult,
    completer: &dyn Completer,
) -> Result<String> {
    let excerpts = result.render();
    let prompt = build_prompt(query, title, &excerpts);
    debug!(
        "Prompting {} with {} excerpts ({} chars)",
        completer.model(),
        result.len(),
        prompt.len()
    );

    let choices = completer.complete(&[ChatMessage::user(prompt)])?;
    if choices.len() > 1 {
        warn!("Provider returned {} choices, using the first", choices.len());
    }

    let mut text = choices
        .into_iter()
        .next()
        .ok_or_else(|| QaError::Completion("provider returned no choices".to_string()))?;

    text.push_str(EXCERPTS_SEPARATOR);
    text.push_str(&excerpts);
    Ok(text)
}
