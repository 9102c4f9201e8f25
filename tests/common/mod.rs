#![allow(dead_code)]

use folder_rag::embeddings::{Embedder, Embedding};
use folder_rag::generation::TextGenerator;
use folder_rag::{RagError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const VOCABULARY: [&str; 10] = [
    "vector",
    "scholarships",
    "ai",
    "awarded",
    "2022",
    "research",
    "faculty",
    "funding",
    "compute",
    "students",
];

/// Counts vocabulary words; one dimension per word
pub struct VocabularyEmbedder {
    calls: AtomicUsize,
    failures_left: AtomicUsize,
}

impl VocabularyEmbedder {
    pub fn new() -> Self {
        Self::flaky(0)
    }

    /// Fails the first `failures` calls with a rate-limit error
    pub fn flaky(failures: usize) -> Self {
        VocabularyEmbedder {
            calls: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(failures),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn vocabulary_vector(text: &str) -> Vec<f32> {
    let mut values = vec![0.0; VOCABULARY.len()];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let token = token.to_lowercase();
        if let Some(pos) = VOCABULARY.iter().position(|word| *word == token) {
            values[pos] += 1.0;
        }
    }
    values
}

impl Embedder for VocabularyEmbedder {
    fn dimension(&self) -> usize {
        VOCABULARY.len()
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let pending = self.failures_left.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures_left.store(pending - 1, Ordering::SeqCst);
            return Err(RagError::RateLimited("quota exhausted".into()));
        }
        Ok(Embedding::new(vocabulary_vector(text)))
    }
}

/// Claims one dimension but returns another
pub struct MismatchedEmbedder;

impl Embedder for MismatchedEmbedder {
    fn dimension(&self) -> usize {
        VOCABULARY.len()
    }

    async fn embed(&self, _text: &str) -> Result<Embedding> {
        Ok(Embedding::new(vec![1.0, 0.0, 0.0]))
    }
}

/// Answers with the first context sentence that contains a digit
pub struct ExtractiveGenerator {
    prompts: Mutex<Vec<String>>,
}

impl ExtractiveGenerator {
    pub fn new() -> Self {
        ExtractiveGenerator {
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl TextGenerator for ExtractiveGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let context = prompt.split("\n\nQuestion: ").next().unwrap_or_default();
        let answer = context
            .split('.')
            .map(str::trim)
            .find(|sentence| sentence.chars().any(|c| c.is_ascii_digit()))
            .unwrap_or("I don't know");

        Ok(answer.to_string())
    }
}
