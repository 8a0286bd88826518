use super::*;
use std::path::PathBuf;

fn config(chunk_size: usize, chunk_overlap: usize) -> ChunkingConfig {
    ChunkingConfig {
        chunk_size,
        chunk_overlap,
    }
}

/// Builds a body of short numbered sentences, one per line.
fn numbered_sentences(count: usize) -> String {
    (0..count)
        .map(|i| format!("This is sentence number {i:03} in the doc."))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn short_document_yields_single_chunk() {
    let text = "Gold increases by 1 per tick per owned tile.";
    let chunks = split_text(text, &ChunkingConfig::default());

    assert_eq!(chunks, vec![text.to_string()]);
}

#[test]
fn empty_text_yields_no_chunks() {
    assert!(split_text("", &ChunkingConfig::default()).is_empty());
    assert!(split_text("  \n\n  ", &ChunkingConfig::default()).is_empty());
}

#[test]
fn chunks_respect_maximum_size() {
    let text = numbered_sentences(100);
    let cfg = config(200, 80);

    let chunks = split_text(&text, &cfg);
    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(
            chunk.chars().count() <= cfg.chunk_size,
            "chunk of {} chars exceeds {}",
            chunk.chars().count(),
            cfg.chunk_size
        );
    }
}

#[test]
fn every_sentence_appears_in_some_chunk() {
    let text = numbered_sentences(50);
    let chunks = split_text(&text, &config(200, 80));

    for line in text.lines() {
        assert!(
            chunks.iter().any(|chunk| chunk.contains(line)),
            "sentence lost during chunking: {line}"
        );
    }
}

#[test]
fn consecutive_chunks_overlap() {
    let text = numbered_sentences(50);
    let chunks = split_text(&text, &config(200, 80));
    assert!(chunks.len() > 1);

    for pair in chunks.windows(2) {
        // The next chunk starts with text retained from the previous one.
        let first_line = pair[1].lines().next().expect("chunk has content");
        assert!(
            pair[0].contains(first_line),
            "expected overlap between consecutive chunks"
        );
    }
}

#[test]
fn oversized_unbreakable_text_falls_back_to_char_windows() {
    let text = "x".repeat(1000);
    let cfg = config(300, 50);

    let chunks = split_text(&text, &cfg);
    assert!(chunks.len() >= 4);
    let mut covered = 0;
    for chunk in &chunks {
        assert!(chunk.chars().count() <= cfg.chunk_size);
        assert!(chunk.chars().all(|c| c == 'x'));
        covered += chunk.chars().count();
    }
    // Nothing dropped; duplication only ever comes from overlap.
    assert!(covered >= 1000);
}

#[test]
fn prefers_paragraph_boundaries() {
    let text = format!(
        "{}\n\n{}",
        "First paragraph about map control and territory expansion.",
        "Second paragraph about economy, gold income, and city placement."
    );
    let chunks = split_text(&text, &config(70, 10));

    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].starts_with("First paragraph"));
    assert!(chunks[1].contains("Second paragraph"));
}

#[test]
fn split_document_carries_source_and_indices() {
    let document = crate::extractor::SourceDocument {
        path: PathBuf::from("/mirror/rules.html"),
        text: numbered_sentences(20),
    };

    let chunks = split_document(&document, &config(200, 50));
    assert!(chunks.len() > 1);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.source, "rules.html");
        assert_eq!(chunk.chunk_index, i);
    }
}
