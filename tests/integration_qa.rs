#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

/// End-to-end tests for the question-answering pipeline using deterministic
/// stub providers: extract -> chunk -> embed -> store -> answer.
use siteqa::SiteQaError;
use siteqa::database::{ChunkRecord, VectorStore};
use siteqa::embeddings::chunking::{ChunkingConfig, split_document};
use siteqa::embeddings::{AnswerSynthesizer, EmbeddingProvider};
use siteqa::extractor::extract_site;
use siteqa::qa::QaEngine;
use std::fs;
use tempfile::TempDir;

/// Embeds text onto fixed topic axes so retrieval is deterministic.
struct KeywordEmbedder;

const TOPICS: &[&str] = &["gold", "city", "boat"];

impl EmbeddingProvider for KeywordEmbedder {
    fn embed(&self, text: &str) -> siteqa::Result<Vec<f32>> {
        let text = text.to_lowercase();
        Ok(TOPICS
            .iter()
            .map(|topic| if text.contains(topic) { 1.0 } else { 0.0 })
            .collect())
    }
}

/// Echoes the top excerpt so tests can assert grounding without a model.
struct EchoSynthesizer;

impl AnswerSynthesizer for EchoSynthesizer {
    fn complete(&self, _question: &str, context: &[String]) -> siteqa::Result<String> {
        match context.first() {
            Some(excerpt) => Ok(format!("According to the site: {excerpt}")),
            None => Ok("not found in the provided material".to_string()),
        }
    }
}

fn write_site(dir: &TempDir) {
    fs::write(
        dir.path().join("rules.html"),
        "<html><head><script>track();</script></head><body>\
         <nav>Home | Rules</nav>\
         <p>Gold increases by 1 per tick per owned tile.</p>\
         <footer>Copyright</footer></body></html>",
    )
    .expect("should write rules.html");

    fs::write(
        dir.path().join("cities.html"),
        "<html><body>\
         <h1>Cities</h1>\
         <p>Each city raises the population cap by 50.</p>\
         <p>Upgrading a city costs 100 gold.</p></body></html>",
    )
    .expect("should write cities.html");
}

async fn build_engine(content_dir: &TempDir, index_dir: &TempDir, top_k: usize) -> QaEngine {
    let site = extract_site(content_dir.path()).expect("should extract site");
    assert!(site.warnings.is_empty());

    let chunking = ChunkingConfig::default();
    let chunks: Vec<_> = site
        .documents
        .iter()
        .flat_map(|document| split_document(document, &chunking))
        .collect();
    assert!(!chunks.is_empty());

    let embedder = KeywordEmbedder;
    let records: Vec<ChunkRecord> = chunks
        .iter()
        .enumerate()
        .map(|(ordinal, chunk)| {
            let vector = embedder.embed(&chunk.text).expect("should embed");
            ChunkRecord::from_chunk(chunk, vector, ordinal as u64)
        })
        .collect();

    let store = VectorStore::open(index_dir.path())
        .await
        .expect("should open store");
    store.rebuild(&records).await.expect("should build index");

    QaEngine::new(store, Box::new(KeywordEmbedder), Box::new(EchoSynthesizer), top_k)
}

#[tokio::test]
async fn answers_are_grounded_and_cite_the_right_page() {
    let content_dir = TempDir::new().expect("should create temp dir");
    let index_dir = TempDir::new().expect("should create temp dir");
    write_site(&content_dir);

    let engine = build_engine(&content_dir, &index_dir, 1).await;
    let result = engine
        .answer_question("How does gold income work?")
        .await
        .expect("should answer");

    assert!(
        result.answer.contains("Gold increases by 1 per tick"),
        "answer not grounded in retrieved text: {}",
        result.answer
    );
    assert_eq!(result.sources, vec!["rules.html"]);
}

#[tokio::test]
async fn sources_deduplicate_across_chunks_of_one_page() {
    let content_dir = TempDir::new().expect("should create temp dir");
    let index_dir = TempDir::new().expect("should create temp dir");
    write_site(&content_dir);

    // top_k covers every chunk; cities.html must still appear once.
    let engine = build_engine(&content_dir, &index_dir, 4).await;
    let result = engine
        .answer_question("What does a city do?")
        .await
        .expect("should answer");

    let city_mentions = result
        .sources
        .iter()
        .filter(|source| source.as_str() == "cities.html")
        .count();
    assert_eq!(city_mentions, 1);
    assert_eq!(result.sources[0], "cities.html");
}

#[tokio::test]
async fn fewer_chunks_than_top_k_still_answers() {
    let content_dir = TempDir::new().expect("should create temp dir");
    let index_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        content_dir.path().join("rules.html"),
        "<html><body><p>Boats can cross water tiles.</p></body></html>",
    )
    .expect("should write rules.html");

    let engine = build_engine(&content_dir, &index_dir, 8).await;
    let result = engine
        .answer_question("Can boats cross water?")
        .await
        .expect("should answer");

    assert!(result.answer.contains("Boats can cross water"));
    assert_eq!(result.sources, vec!["rules.html"]);
}

#[test]
fn missing_content_dir_is_fatal() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let missing = temp_dir.path().join("does-not-exist");

    let err = extract_site(&missing).expect_err("should fail");
    assert!(matches!(err, SiteQaError::ContentNotFound(_)));
}
