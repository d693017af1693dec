//! Offline vector index builder (`astro index build`).
//!
//! Pipeline: scan the knowledge base → chunk every document → embed chunks in
//! batches of `[embedding].batch_size` → write the [`VectorIndex`] to
//! `[index].path`, replacing any previous index.

use anyhow::{bail, Context, Result};
use std::time::Instant;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::index::VectorIndex;
use crate::loader::scan_documents;
use crate::models::{Chunk, IndexedChunk};

/// Counts reported after a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub documents: usize,
    pub skipped: usize,
    pub chunks: usize,
    pub dims: usize,
}

pub async fn build_index(
    config: &Config,
    provider: &dyn EmbeddingProvider,
) -> Result<BuildSummary> {
    let outcome = scan_documents(config)?;

    let mut chunks: Vec<Chunk> = Vec::new();
    for doc in &outcome.documents {
        chunks.extend(chunk_text(
            &doc.source,
            &doc.body,
            config.chunking.chunk_size,
            config.chunking.chunk_overlap,
        ));
    }

    if chunks.is_empty() {
        bail!(
            "No text found to index under {}",
            config.ingest.documents_path.display()
        );
    }

    let total = chunks.len();
    let mut indexed = Vec::with_capacity(total);

    for batch in chunks.chunks(config.embedding.batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = provider
            .embed(&texts)
            .await
            .with_context(|| format!("Embedding batch failed after {} chunks", indexed.len()))?;

        for (chunk, vector) in batch.iter().zip(vectors) {
            indexed.push(IndexedChunk {
                id: chunk.id.clone(),
                source: chunk.source.clone(),
                chunk_index: chunk.chunk_index,
                text: chunk.text.clone(),
                hash: chunk.hash.clone(),
                vector,
            });
        }
        tracing::info!(done = indexed.len(), total, "embedded batch");
    }

    let index = VectorIndex::new(provider.model_name(), indexed);
    if index.chunks.iter().any(|c| c.vector.len() != index.dims) {
        bail!("Embedding provider returned vectors of inconsistent dimensions");
    }
    index.save(&config.index.path)?;

    Ok(BuildSummary {
        documents: outcome.documents.len(),
        skipped: outcome.skipped,
        chunks: index.len(),
        dims: index.dims,
    })
}

/// CLI entry point: builds the index and prints a summary.
pub async fn run_build(config: &Config, provider: &dyn EmbeddingProvider) -> Result<()> {
    let start = Instant::now();
    let summary = build_index(config, provider).await?;

    println!("index build");
    println!("  documents: {}", summary.documents);
    println!("  skipped: {}", summary.skipped);
    println!("  chunks: {}", summary.chunks);
    println!("  dims: {}", summary.dims);
    println!("  model: {}", provider.model_name());
    println!("  written: {}", config.index.path.display());
    println!("  elapsed: {:.2}s", start.elapsed().as_secs_f64());
    println!("ok");
    Ok(())
}

/// CLI entry point for `astro index stats`.
pub fn run_stats(config: &Config) -> Result<()> {
    let index = VectorIndex::load(&config.index.path)?;
    let stats = index.stats();
    println!("index: {}", config.index.path.display());
    println!("  chunks: {}", stats.chunks);
    println!("  sources: {}", stats.sources);
    println!("  model: {}", stats.model);
    println!("  dims: {}", stats.dims);
    println!("  created: {}", stats.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    Ok(())
}
