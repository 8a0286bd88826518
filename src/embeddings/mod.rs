pub mod chunking;
pub mod gemini;

use crate::Result;

/// Maps text to fixed-dimension vectors. The same provider must be used for
/// indexing and for queries so the embedding spaces match.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Batch embedding. Default implementation loops over [`Self::embed`];
    /// implementations may override with a true batch call as a throughput
    /// optimization.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Produces a natural-language answer from a question and retrieved context.
pub trait AnswerSynthesizer: Send + Sync {
    fn complete(&self, question: &str, context: &[String]) -> Result<String>;
}
