use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use dialoguer::theme::ColorfulTheme;
use tracing::{info, warn};

use crate::SiteQaError;
use crate::config::{Config, resolve_api_key};
use crate::database::{ChunkRecord, VectorStore};
use crate::embeddings::EmbeddingProvider;
use crate::embeddings::chunking::split_document;
use crate::embeddings::gemini::GeminiClient;
use crate::extractor::extract_site;
use crate::qa::QaEngine;

/// Words that end an interactive chat session.
const EXIT_WORDS: &[&str] = &["quit", "exit", "q"];

fn is_exit_word(input: &str) -> bool {
    EXIT_WORDS.contains(&input.trim().to_lowercase().as_str())
}

/// Build (or rebuild) the vector index from the local HTML mirror.
#[inline]
pub async fn build(config: &Config, force_rebuild: bool) -> Result<()> {
    let api_key = resolve_api_key()?;
    let client = GeminiClient::new(&config.gemini, api_key)?;
    let store = VectorStore::open(&config.index_dir).await?;

    if !force_rebuild {
        let existing = store.count().await;
        if existing > 0 {
            println!(
                "Index already contains {} chunks (use --rebuild to rebuild from scratch)",
                existing
            );
            return Ok(());
        }
    }

    build_index(config, &client, &store).await?;
    Ok(())
}

/// Answer a single question and exit.
#[inline]
pub async fn ask(config: &Config, question: &str, force_rebuild: bool) -> Result<()> {
    let engine = prepare_engine(config, force_rebuild).await?;
    let result = engine.answer_question(question).await?;
    print_result(&result);
    Ok(())
}

/// Interactive question loop over the indexed site.
#[inline]
pub async fn chat(config: &Config, force_rebuild: bool) -> Result<()> {
    let engine = prepare_engine(config, force_rebuild).await?;

    println!(
        "Ask questions about the indexed site. Type {} to leave.",
        style("quit").bold()
    );

    loop {
        let input = Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("question")
            .allow_empty(true)
            .interact_text();

        let question = match input {
            Ok(question) => question,
            // Ctrl-C / Ctrl-D ends the session like an exit word.
            Err(dialoguer::Error::IO(e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::Interrupted | std::io::ErrorKind::UnexpectedEof
                ) =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        let question = question.trim();
        if question.is_empty() {
            continue;
        }
        if is_exit_word(question) {
            break;
        }

        match engine.answer_question(question).await {
            Ok(result) => print_result(&result),
            Err(e) if e.is_fatal_for_session() => {
                return Err(e).context("Provider rejected the session");
            }
            Err(e) => {
                warn!("Question failed: {}", e);
                println!("{} {}", style("Error:").red().bold(), e);
            }
        }
    }

    println!("Goodbye.");
    Ok(())
}

/// Show configuration, content, index, and provider status.
#[inline]
pub async fn status(config: &Config) -> Result<()> {
    println!("siteqa status");
    println!("{}", "=".repeat(40));
    println!();

    println!("Configuration:");
    println!("  Content dir: {}", config.content_dir.display());
    println!("  Index dir: {}", config.index_dir.display());
    println!("  Top-k: {}", config.top_k);
    println!(
        "  Chunking: {} chars, {} overlap",
        config.chunking.chunk_size, config.chunking.chunk_overlap
    );
    println!(
        "  Models: {} (embeddings), {} (chat)",
        config.gemini.embedding_model, config.gemini.chat_model
    );
    println!();

    println!("Content:");
    match extract_site(&config.content_dir) {
        Ok(site) => {
            println!("  ✅ {} HTML documents found", site.documents.len());
            if !site.warnings.is_empty() {
                println!("  ⚠️  {} files skipped with warnings", site.warnings.len());
            }
        }
        Err(e) => println!("  ❌ {}", e),
    }
    println!();

    println!("Index:");
    match VectorStore::open(&config.index_dir).await {
        Ok(store) => {
            let count = store.count().await;
            if count > 0 {
                println!("  ✅ {} chunks stored", count);
            } else {
                println!("  📭 Empty (run 'siteqa build' to index the site)");
            }
        }
        Err(e) => println!("  ❌ {}", e),
    }
    println!();

    println!("Provider:");
    match resolve_api_key() {
        Ok(api_key) => match GeminiClient::new(&config.gemini, api_key) {
            Ok(client) => match client.health_check() {
                Ok(models) => println!("  ✅ Gemini reachable ({} models visible)", models.len()),
                Err(e) => println!("  ❌ Gemini unreachable: {}", e),
            },
            Err(e) => println!("  ❌ {}", e),
        },
        Err(e) => println!("  ❌ {}", e),
    }

    Ok(())
}

/// Run the periodic screenshot advice loop.
#[inline]
pub async fn advise(config: &Config, interval_secs: Option<u64>) -> Result<()> {
    let engine = match prepare_engine(config, false).await {
        Ok(engine) => Some(engine),
        // Advice still works without an index; it just loses the
        // knowledge-base cross-reference.
        Err(e) => {
            warn!("Running without knowledge base: {}", e);
            None
        }
    };

    let api_key = resolve_api_key()?;
    let client = GeminiClient::new(&config.gemini, api_key)?;

    let mut capture = config.capture.clone();
    if let Some(secs) = interval_secs {
        capture.interval_secs = secs;
    }

    crate::advisor::run(&capture, &client, engine.as_ref()).await
}

/// Construct the QA engine, building the index first if it is missing.
async fn prepare_engine(config: &Config, force_rebuild: bool) -> Result<QaEngine> {
    let api_key = resolve_api_key()?;
    let client = GeminiClient::new(&config.gemini, api_key)?;
    let store = VectorStore::open(&config.index_dir).await?;

    if force_rebuild || store.count().await == 0 {
        build_index(config, &client, &store).await?;
    } else {
        info!("Reusing persisted index at {}", config.index_dir.display());
    }

    Ok(QaEngine::new(
        store,
        Box::new(client.clone()),
        Box::new(client),
        config.top_k,
    ))
}

/// Extract, chunk, embed, and store the whole site.
///
/// Embeddings are generated for every chunk before the store is touched, so
/// a provider failure mid-build leaves any previous index intact.
async fn build_index(config: &Config, client: &GeminiClient, store: &VectorStore) -> Result<()> {
    println!("Indexing {} ...", config.content_dir.display());

    let site = extract_site(&config.content_dir)?;
    for warning in &site.warnings {
        warn!("Skipped {}: {}", warning.path.display(), warning.message);
    }
    if site.documents.is_empty() {
        return Err(SiteQaError::ContentNotFound(format!(
            "no readable HTML documents under {}",
            config.content_dir.display()
        ))
        .into());
    }

    let chunks: Vec<_> = site
        .documents
        .iter()
        .flat_map(|document| split_document(document, &config.chunking))
        .collect();
    info!(
        "Extracted {} documents into {} chunks",
        site.documents.len(),
        chunks.len()
    );

    let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
    let vectors = client
        .embed_batch(&texts)
        .context("Failed to generate embeddings")?;

    let records: Vec<ChunkRecord> = chunks
        .iter()
        .zip(vectors)
        .enumerate()
        .map(|(ordinal, (chunk, vector))| ChunkRecord::from_chunk(chunk, vector, ordinal as u64))
        .collect();

    store.rebuild(&records).await?;
    println!(
        "Indexed {} chunks from {} documents",
        records.len(),
        site.documents.len()
    );
    Ok(())
}

fn print_result(result: &crate::qa::QueryResult) {
    println!();
    println!("{}", result.answer.trim());
    if !result.sources.is_empty() {
        println!();
        println!(
            "{} {}",
            style("Sources:").dim(),
            style(result.sources.join(", ")).dim()
        );
    }
    println!();
}
