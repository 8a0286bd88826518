
use tracing::debug;

use crate::Result;
use crate::database::{ScoredChunk, VectorStore};
use crate::embeddings::{AnswerSynthesizer, EmbeddingProvider};

/// A grounded answer plus the source files the supporting chunks came from.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub answer: String,
    /// Source file names, deduplicated, in retrieval order.
    pub sources: Vec<String>,
}

/// Retrieval-augmented question answering over the vector index.
///
/// Embeds the question, pulls the nearest chunks from the store, and hands
/// them to the synthesizer as grounding context.
pub struct QaEngine {
    store: VectorStore,
    embedder: Box<dyn EmbeddingProvider>,
    synthesizer: Box<dyn AnswerSynthesizer>,
    top_k: usize,
}

impl QaEngine {
    #[inline]
    pub fn new(
        store: VectorStore,
        embedder: Box<dyn EmbeddingProvider>,
        synthesizer: Box<dyn AnswerSynthesizer>,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            synthesizer,
            top_k,
        }
    }

    /// Answer a question using the indexed site content.
    ///
    /// Retrieval returning nothing is not an error; the synthesizer still
    /// runs and reports that the material does not cover the question.
    #[inline]
    pub async fn answer_question(&self, question: &str) -> Result<QueryResult> {
        let question = question.trim();
        let query = self.embedder.embed(question)?;
        let hits = self.store.search(&query, self.top_k).await?;
        debug!("Retrieved {} chunks for question", hits.len());

        let context: Vec<String> = hits.iter().map(|hit| hit.content.clone()).collect();
        let answer = self.synthesizer.complete(question, &context)?;

        Ok(QueryResult {
            answer,
            sources: cited_sources(&hits),
        })
    }
}

/// Collapse retrieved chunks to their source files, keeping the order in
/// which each file first appeared.
fn cited_sources(hits: &[ScoredChunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for hit in hits {
        if !sources.contains(&hit.source) {
            sources.push(hit.source.clone());
        }
    }
    sources
}
