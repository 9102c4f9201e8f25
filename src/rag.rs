use crate::chunking::Chunker;
use crate::config::RagConfig;
use crate::document::{load_folder, Document};
use crate::embeddings::Embedder;
use crate::error::{RagError, Result};
use crate::filter::RelevanceFilter;
use crate::generation::{Answer, AnswerGenerator, TextGenerator};
use crate::index::{IndexEntry, ScoredChunk, VectorIndex};
use crate::retry::RetryPolicy;
use log::info;
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Texts sent to the embedder per call while building the index.
/// A retried batch is embedded again in full, including texts the failed
/// attempt may already have embedded.
const EMBED_BATCH_SIZE: usize = 100;

/// Candidates before and after relevance filtering
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub candidates: Vec<ScoredChunk>,
    pub retained: Vec<ScoredChunk>,
}

/// Result of a single question
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Answered(Answer),
    /// Nothing passed the similarity threshold; the generator was not called
    InsufficientContext { retrieved: usize },
}

/// RAG (Retrieval-Augmented Generation) engine
pub struct RagEngine<E, G> {
    embedder: E,
    index: VectorIndex,
    filter: RelevanceFilter,
    answerer: AnswerGenerator<G>,
    retry: RetryPolicy,
    top_k: usize,
}

impl<E: Embedder, G: TextGenerator> RagEngine<E, G> {
    /// Chunk, embed and index `documents`
    pub async fn build(
        config: &RagConfig,
        embedder: E,
        generator: G,
        documents: &[Document],
    ) -> Result<Self> {
        config.validate()?;

        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap)?;
        let filter = RelevanceFilter::new(config.similarity_threshold)?;
        let retry = RetryPolicy::new(&config.retry);

        // Split content into chunks
        let chunks = chunker.split_documents(documents);
        info!(
            "Split {} documents into {} chunks ({} characters, {} overlap)",
            documents.len(),
            chunks.len(),
            chunker.chunk_size(),
            chunker.chunk_overlap()
        );
        if chunks.is_empty() {
            return Err(RagError::EmptyInput(
                "documents contain no extractable text".to_string(),
            ));
        }

        // Generate embeddings for each chunk
        info!("Generating embeddings for {} chunks...", chunks.len());
        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let batch_embeddings = retry
                .run("embed chunks", || embedder.embed_batch(&texts))
                .await?;

            if batch_embeddings.len() != texts.len() {
                return Err(RagError::InvalidResponse(format!(
                    "embedder returned {} vectors for {} chunks",
                    batch_embeddings.len(),
                    texts.len()
                )));
            }
            embeddings.extend(batch_embeddings);
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        let mut index = VectorIndex::new(embedder.dimension(), config.metric);
        index.insert(entries)?;
        info!(
            "Indexed {} chunks ({} dimensions, {} similarity)",
            index.len(),
            index.dimension(),
            index.metric()
        );

        let answerer = AnswerGenerator::new(generator, config.max_context_chars, retry.clone());

        Ok(RagEngine {
            embedder,
            index,
            filter,
            answerer,
            retry,
            top_k: config.top_k,
        })
    }

    /// Load every supported file in `folder` and build the engine from it
    pub async fn from_folder<P: AsRef<Path>>(
        config: &RagConfig,
        embedder: E,
        generator: G,
        folder: P,
    ) -> Result<Self> {
        let documents = load_folder(folder)?;
        Self::build(config, embedder, generator, &documents).await
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn generator(&self) -> &G {
        self.answerer.generator()
    }

    /// Embed the question, search the index and apply the relevance filter
    pub async fn retrieve(&self, question: &str) -> Result<Retrieval> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::EmptyInput("the question is empty".to_string()));
        }

        // Get embedding for the question
        let query = self
            .retry
            .run("embed question", || self.embedder.embed(question))
            .await?;

        // Retrieve relevant chunks
        let candidates = self.index.search(&query, self.top_k)?;
        let retained = self.filter.apply(candidates.clone(), &query);
        info!(
            "Retrieved {} candidates, {} above threshold {}",
            candidates.len(),
            retained.len(),
            self.filter.threshold()
        );

        Ok(Retrieval {
            candidates,
            retained,
        })
    }

    /// Answer a question from the indexed documents
    pub async fn query(&self, question: &str) -> Result<QueryOutcome> {
        let retrieval = self.retrieve(question).await?;

        if retrieval.retained.is_empty() {
            return Ok(QueryOutcome::InsufficientContext {
                retrieved: retrieval.candidates.len(),
            });
        }

        let answer = self
            .answerer
            .answer(question.trim(), retrieval.retained)
            .await?;
        Ok(QueryOutcome::Answered(answer))
    }

    /// Run the interactive question loop over stdin
    pub async fn run_query_loop(&self) -> Result<()> {
        println!(
            "Ready to answer questions about {} chunks. Type 'exit' to quit.",
            self.index.len()
        );

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut buffer = String::new();

        loop {
            print!("\nYour question: ");
            stdout.flush()?;

            buffer.clear();
            if stdin.lock().read_line(&mut buffer)? == 0 {
                break;
            }

            let question = buffer.trim();
            if question.is_empty() {
                continue;
            }
            if question.eq_ignore_ascii_case("exit") {
                println!("Goodbye!");
                break;
            }

            let outcome = self.query(question).await?;
            println!("\n{}", render_outcome(&outcome));
        }

        Ok(())
    }
}

/// Plain-text rendering of an outcome for the console
pub fn render_outcome(outcome: &QueryOutcome) -> String {
    match outcome {
        QueryOutcome::InsufficientContext { retrieved } => format!(
            "No sufficiently relevant context found ({} candidates retrieved, none above the similarity threshold).",
            retrieved
        ),
        QueryOutcome::Answered(answer) => {
            let mut out = answer.text.trim().to_string();
            out.push_str("\n\nSources:");
            for source in &answer.sources {
                out.push_str(&format!(
                    "\n  - {} chunk {}",
                    source.chunk.document_id, source.chunk.chunk_index
                ));
                if let Some(page) = source.chunk.page {
                    out.push_str(&format!(" (page {})", page));
                }
                out.push_str(&format!(" score {:.3}", source.score));
            }
            if answer.dropped > 0 {
                out.push_str(&format!(
                    "\n  ({} more relevant chunks did not fit in the prompt)",
                    answer.dropped
                ));
            }
            out
        }
    }
}
