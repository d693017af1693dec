//! File-persisted vector index.
//!
//! The index is a single JSON document holding every knowledge-base chunk
//! and its embedding. It is written once by `astro index build` and only
//! read afterwards. Search is brute-force cosine similarity over all stored
//! vectors, which is plenty for a few thousand chunks of reference books.
//!
//! ```json
//! {
//!   "version": 1,
//!   "model": "nomic-embed-text",
//!   "dims": 768,
//!   "created_at": "2026-10-19T08:00:00Z",
//!   "chunks": [{ "id": "...", "source": "bphs.pdf", "chunk_index": 0,
//!                "text": "...", "hash": "...", "vector": [0.01, ...] }]
//! }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::embedding::cosine_similarity;
use crate::error::{InsightError, InsightResult};
use crate::models::{IndexedChunk, RetrievedChunk};

pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    pub version: u32,
    pub model: String,
    pub dims: usize,
    pub created_at: DateTime<Utc>,
    pub chunks: Vec<IndexedChunk>,
}

/// Summary printed by `astro index stats`.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub chunks: usize,
    pub sources: usize,
    pub model: String,
    pub dims: usize,
    pub created_at: DateTime<Utc>,
}

impl VectorIndex {
    /// Creates an index. `dims` is taken from the first chunk's vector.
    pub fn new(model: impl Into<String>, chunks: Vec<IndexedChunk>) -> Self {
        let dims = chunks.first().map(|c| c.vector.len()).unwrap_or(0);
        Self {
            version: INDEX_FORMAT_VERSION,
            model: model.into(),
            dims,
            created_at: Utc::now(),
            chunks,
        }
    }

    pub fn load(path: &Path) -> InsightResult<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(InsightError::IndexNotFound(path.to_path_buf()));
            }
            Err(e) => {
                return Err(InsightError::IndexCorrupt {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };

        let index: VectorIndex =
            serde_json::from_str(&content).map_err(|e| InsightError::IndexCorrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if index.version != INDEX_FORMAT_VERSION {
            return Err(InsightError::IndexCorrupt {
                path: path.to_path_buf(),
                reason: format!(
                    "unsupported index version {} (expected {})",
                    index.version, INDEX_FORMAT_VERSION
                ),
            });
        }

        tracing::info!(
            path = %path.display(),
            chunks = index.chunks.len(),
            model = %index.model,
            "loaded vector index"
        );
        Ok(index)
    }

    /// Writes the index next to `path` and renames it into place, so readers
    /// never observe a half-written file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string(self)?;
        std::fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to move index into {}", path.display()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Top-`k` chunks by cosine similarity to `query`.
    ///
    /// Ties are broken by chunk id so results are deterministic.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<RetrievedChunk> {
        if k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(&IndexedChunk, f32)> = self
            .chunks
            .iter()
            .map(|c| (c, cosine_similarity(query, &c.vector)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(c, score)| RetrievedChunk {
                id: c.id.clone(),
                source: c.source.clone(),
                text: c.text.clone(),
                score,
            })
            .collect()
    }

    pub fn stats(&self) -> IndexStats {
        let sources: BTreeSet<&str> = self.chunks.iter().map(|c| c.source.as_str()).collect();
        IndexStats {
            chunks: self.chunks.len(),
            sources: sources.len(),
            model: self.model.clone(),
            dims: self.dims,
            created_at: self.created_at,
        }
    }
}
