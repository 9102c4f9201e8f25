use crate::chunking::TextChunk;
use crate::error::{RagError, Result};
use crate::index::ScoredChunk;
use crate::retry::RetryPolicy;
use log::{debug, info};

const CONTEXT_PREFIX: &str = "Context: ";
const QUESTION_PREFIX: &str = "\n\nQuestion: ";
const CHUNK_SEPARATOR: &str = "\n\n";

/// A service that completes a prompt
#[allow(async_fn_in_trait)]
pub trait TextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Prompt text plus how many chunks made it in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub included: usize,
    pub dropped: usize,
}

/// Generated answer and the chunks it was grounded on
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<ScoredChunk>,
    /// Retained chunks that did not fit in the prompt budget
    pub dropped: usize,
}

/// Assemble `Context: <chunks>\n\nQuestion: <question>` within `max_chars`
/// characters. Chunks are taken in order; once one does not fit, it and every
/// later chunk are dropped.
pub fn build_prompt(question: &str, chunks: &[&TextChunk], max_chars: usize) -> Result<Prompt> {
    let base = CONTEXT_PREFIX.chars().count()
        + QUESTION_PREFIX.chars().count()
        + question.chars().count();
    if base > max_chars {
        return Err(RagError::ContextTooLarge(format!(
            "question needs {} characters but the prompt budget is {}",
            base, max_chars
        )));
    }

    let separator_len = CHUNK_SEPARATOR.chars().count();
    let mut used = base;
    let mut included = 0;
    for chunk in chunks {
        let cost = chunk.text.chars().count() + if included > 0 { separator_len } else { 0 };
        if used + cost > max_chars {
            break;
        }
        used += cost;
        included += 1;
    }

    let context = chunks[..included]
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<&str>>()
        .join(CHUNK_SEPARATOR);
    let text = format!("{}{}{}{}", CONTEXT_PREFIX, context, QUESTION_PREFIX, question);

    Ok(Prompt {
        text,
        included,
        dropped: chunks.len() - included,
    })
}

/// Builds a grounded prompt and asks the text generator for an answer
pub struct AnswerGenerator<G> {
    generator: G,
    max_context_chars: usize,
    retry: RetryPolicy,
}

impl<G: TextGenerator> AnswerGenerator<G> {
    pub fn new(generator: G, max_context_chars: usize, retry: RetryPolicy) -> Self {
        AnswerGenerator {
            generator,
            max_context_chars,
            retry,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Answer `question` from the retained chunks, in the order given
    pub async fn answer(&self, question: &str, retained: Vec<ScoredChunk>) -> Result<Answer> {
        let chunks: Vec<&TextChunk> = retained.iter().map(|hit| &hit.chunk).collect();
        let prompt = build_prompt(question, &chunks, self.max_context_chars)?;

        // An empty context block would let the model answer ungrounded
        if prompt.included == 0 && !retained.is_empty() {
            return Err(RagError::ContextTooLarge(format!(
                "none of the {} relevant chunks fits the prompt budget of {} characters",
                retained.len(),
                self.max_context_chars
            )));
        }

        if prompt.dropped > 0 {
            info!(
                "Prompt budget of {} characters fits {} chunks, dropping {}",
                self.max_context_chars, prompt.included, prompt.dropped
            );
        }
        debug!("Prompt is {} characters", prompt.text.chars().count());

        let text = self
            .retry
            .run("generate answer", || self.generator.generate(&prompt.text))
            .await?;

        let mut sources = retained;
        sources.truncate(prompt.included);

        Ok(Answer {
            text,
            sources,
            dropped: prompt.dropped,
        })
    }
}
