// Session module
// The read-answer-print loop over a built retriever


use std::io::{BufRead, Write};
use tracing::{error, info};

use crate::answer::answer;
use crate::config::SessionConfig;
use crate::provider::{Completer, Embedder};
use crate::retriever::Retriever;
use crate::{QaError, Result};

/// Always recognised as an exit command in addition to the configured one
const EXIT_ALIAS: &str = ":exit";

/// Counters reported when the loop ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub answered: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Everything one question needs, built once at startup
pub struct QaContext {
    retriever: Retriever,
    embedder: Box<dyn Embedder>,
    completer: Box<dyn Completer>,
    settings: SessionConfig,
    top_k: usize,
}

impl QaContext {
    #[inline]
    pub fn new(
        retriever: Retriever,
        embedder: Box<dyn Embedder>,
        completer: Box<dyn Completer>,
        settings: SessionConfig,
        top_k: usize,
    ) -> Self {
        Self {
            retriever,
            embedder,
            completer,
            settings,
            top_k,
        }
    }

    #[inline]
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Retrieves excerpts for `query` and generates a cited answer
    #[inline]
    pub fn ask(&self, query: &str) -> Result<String> {
        let query = query.trim();
        let result = self
            .retriever
            .retrieve(query, self.embedder.as_ref(), self.top_k)?;
        answer(
            query,
            self.retriever.corpus().title(),
            &result,
            self.completer.as_ref(),
        )
    }

    fn is_exit(&self, line: &str) -> bool {
        line == self.settings.exit_command.trim() || line == EXIT_ALIAS
    }

    /// Prompts on `output` and answers each line read from `input`.
    ///
    /// A failed question, including a line that is not valid UTF-8, is
    /// reported as `Error: ...` and the loop carries on.
    /// Blank lines are skipped without contacting the provider. The loop ends
    /// at end of input or on the exit command; only I/O failures on the
    /// streams themselves are returned as errors.
    #[inline]
    pub fn run_loop<R: BufRead, W: Write>(&self, mut input: R, mut output: W) -> Result<SessionStats> {
        let mut stats = SessionStats::default();
        let mut buffer = Vec::new();

        loop {
            write!(output, "{}", self.settings.prompt)?;
            output.flush()?;

            buffer.clear();
            if input.read_until(b'\n', &mut buffer)? == 0 {
                writeln!(output)?;
                break;
            }
            let Ok(line) = std::str::from_utf8(&buffer) else {
                error!("Question failed: input is not valid UTF-8");
                writeln!(output, "Error: input is not valid UTF-8")?;
                stats.failed += 1;
                continue;
            };

            let query = line.trim();
            if self.is_exit(query) {
                break;
            }
            if query.is_empty() {
                writeln!(
                    output,
                    "Please enter a question, or {} to quit.",
                    self.settings.exit_command
                )?;
                stats.skipped += 1;
                continue;
            }

            match self.ask(query) {
                Ok(text) => {
                    writeln!(output, "{text}")?;
                    stats.answered += 1;
                }
                Err(QaError::EmptyQuery) => {
                    stats.skipped += 1;
                }
                Err(e) => {
                    error!("Question failed: {}", e);
                    writeln!(output, "Error: {e}")?;
                    stats.failed += 1;
                }
            }
        }

        info!(
            "Session finished: {} answered, {} failed, {} skipped",
            stats.answered, stats.failed, stats.skipped
        );
        Ok(stats)
    }
}
