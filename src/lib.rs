pub mod chunking;
pub mod config;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod filter;
pub mod gemini;
pub mod generation;
pub mod index;
pub mod rag;
pub mod retry;

pub use error::{RagError, Result};
