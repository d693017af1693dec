//! The query pipeline: chart → retrieval → prompt → completion.
//!
//! An [`InsightEngine`] is built once per process and shared across
//! requests. It owns the position source, the embedding and completion
//! providers, and a lazily loaded, read-only [`VectorIndex`]. Every call to
//! [`InsightEngine::answer`] builds its own chart; nothing mutable is shared
//! between requests except the index cache slot.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::chart::generate_birth_chart;
use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{InsightError, InsightResult};
use crate::index::VectorIndex;
use crate::llm::{self, CompletionProvider, GroqClient};
use crate::models::{BirthDetails, InsightResponse, RetrievedChunk};
use crate::positions::{FixedPositions, PositionSource};

pub struct InsightEngine {
    index_path: PathBuf,
    top_k: usize,
    positions: Arc<dyn PositionSource>,
    embedder: Arc<dyn EmbeddingProvider>,
    completer: Arc<dyn CompletionProvider>,
    index: RwLock<Option<Arc<VectorIndex>>>,
}

impl InsightEngine {
    pub fn new(
        config: &Config,
        positions: Arc<dyn PositionSource>,
        embedder: Arc<dyn EmbeddingProvider>,
        completer: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            index_path: config.index.path.clone(),
            top_k: config.index.top_k,
            positions,
            embedder,
            completer,
            index: RwLock::new(None),
        }
    }

    /// Wires the production providers from config.
    ///
    /// Fails with [`InsightError::CredentialMissing`] when the LLM key is not
    /// in the environment. The index is not touched here; it is loaded on
    /// first use.
    pub fn from_config(config: &Config) -> InsightResult<Self> {
        let completer = GroqClient::from_config(&config.llm)?;
        let embedder = embedding::create_query_provider(&config.embedding)?;
        Ok(Self::new(
            config,
            Arc::new(FixedPositions::from_config(&config.chart)),
            embedder,
            Arc::new(completer),
        ))
    }

    /// Returns the cached index, loading it on first use.
    ///
    /// A failed load is not cached, so an index built after startup is
    /// picked up by the next request.
    pub async fn index(&self) -> InsightResult<Arc<VectorIndex>> {
        if let Some(index) = self.index.read().await.as_ref() {
            return Ok(index.clone());
        }

        let mut slot = self.index.write().await;
        if let Some(index) = slot.as_ref() {
            return Ok(index.clone());
        }
        let path = self.index_path.clone();
        let loaded = tokio::task::spawn_blocking(move || VectorIndex::load(&path))
            .await
            .map_err(|e| InsightError::IndexCorrupt {
                path: self.index_path.clone(),
                reason: format!("index load task failed: {}", e),
            })??;
        let index = Arc::new(loaded);
        *slot = Some(index.clone());
        Ok(index)
    }

    /// Embeds `query` and returns the closest chunks.
    ///
    /// # Errors
    ///
    /// - [`InsightError::RetrievalEmpty`] when the index yields nothing.
    /// - [`InsightError::IndexCorrupt`] when the query vector and the stored
    ///   vectors have different dimensions, which happens when the embedding
    ///   model changed after the index was built.
    pub async fn retrieve(
        &self,
        index: &VectorIndex,
        query: &str,
    ) -> InsightResult<Vec<RetrievedChunk>> {
        if index.model != self.embedder.model_name() {
            tracing::warn!(
                index_model = %index.model,
                query_model = self.embedder.model_name(),
                "vector index was built with a different embedding model"
            );
        }

        let query_vec = embedding::embed_query(self.embedder.as_ref(), query).await?;
        if !index.is_empty() && query_vec.len() != index.dims {
            return Err(InsightError::IndexCorrupt {
                path: self.index_path.clone(),
                reason: format!(
                    "index holds {}-dimensional vectors from model '{}' but the query \
                     embedding from '{}' has {} dimensions; rebuild with `astro index build`",
                    index.dims,
                    index.model,
                    self.embedder.model_name(),
                    query_vec.len()
                ),
            });
        }

        let hits = index.search(&query_vec, self.top_k);
        if hits.is_empty() {
            return Err(InsightError::RetrievalEmpty);
        }
        Ok(hits)
    }

    #[tracing::instrument(skip_all)]
    pub async fn answer(&self, details: &BirthDetails) -> InsightResult<InsightResponse> {
        if details.query.trim().is_empty() {
            return Err(InsightError::InvalidInput(
                "query must not be empty".to_string(),
            ));
        }

        let report = generate_birth_chart(self.positions.positions(details));

        let index = self.index().await?;
        let hits = self.retrieve(&index, &details.query).await?;
        tracing::debug!(
            hits = hits.len(),
            sources = ?hits.iter().map(|h| h.source.as_str()).collect::<Vec<_>>(),
            "retrieved context"
        );

        let context = hits
            .iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let prompt = llm::render_prompt(
            &report.birth_chart,
            &report.effects,
            &context,
            &details.query,
        );
        let answer = self
            .completer
            .complete(&prompt)
            .await?
            .unwrap_or_else(|| llm::NO_ANSWER.to_string());

        tracing::info!(model = self.completer.model_name(), "answered query");

        Ok(InsightResponse {
            answer: llm::strip_bold(&answer),
            birth_chart: report.birth_chart,
            effects: report.effects,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IndexedChunk;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        fn model_name(&self) -> &str {
            "fixed"
        }
        async fn embed(&self, texts: &[String]) -> InsightResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| self.0.clone()).collect())
        }
    }

    #[derive(Default)]
    struct RecordingCompleter {
        prompts: Mutex<Vec<String>>,
        reply: Option<String>,
    }

    #[async_trait]
    impl CompletionProvider for RecordingCompleter {
        fn model_name(&self) -> &str {
            "recording"
        }
        async fn complete(&self, prompt: &str) -> InsightResult<Option<String>> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn details(query: &str) -> BirthDetails {
        BirthDetails {
            name: "Ravi".into(),
            dob: "1985-03-14".into(),
            time_of_birth: "11:05".into(),
            place_of_birth: "Chennai".into(),
            gender: "male".into(),
            query: query.into(),
        }
    }

    fn write_index(tmp: &TempDir, chunks: Vec<IndexedChunk>) -> Config {
        let mut cfg = Config::minimal();
        cfg.index.path = tmp.path().join("index.json");
        cfg.index.top_k = 2;
        VectorIndex::new("fixed", chunks).save(&cfg.index.path).unwrap();
        cfg
    }

    fn chunk(id: &str, text: &str, vector: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            id: id.into(),
            source: "book.pdf".into(),
            chunk_index: 0,
            text: text.into(),
            hash: String::new(),
            vector,
        }
    }

    fn engine(cfg: &Config, completer: Arc<RecordingCompleter>) -> InsightEngine {
        InsightEngine::new(
            cfg,
            Arc::new(FixedPositions::default()),
            Arc::new(FixedEmbedder(vec![1.0, 0.0])),
            completer,
        )
    }

    #[tokio::test]
    async fn test_answer_builds_prompt_and_strips_bold() {
        let tmp = TempDir::new().unwrap();
        let cfg = write_index(
            &tmp,
            vec![
                chunk("c1", "Saturn in the tenth house brings discipline.", vec![1.0, 0.0]),
                chunk("c2", "Venus governs partnerships.", vec![0.9, 0.1]),
                chunk("c3", "Unrelated chunk.", vec![0.0, 1.0]),
            ],
        );
        let completer = Arc::new(RecordingCompleter {
            reply: Some("**Career** looks **bright**.".into()),
            ..Default::default()
        });

        let response = engine(&cfg, completer.clone())
            .answer(&details("How is my career?"))
            .await
            .unwrap();

        assert_eq!(response.answer, "Career looks bright.");
        assert_eq!(response.birth_chart.lines().count(), 12);
        assert_eq!(
            response.effects[&1],
            "Sun is exalted in house 1, giving strong positive effects."
        );

        let prompts = completer.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(
            "Saturn in the tenth house brings discipline. Venus governs partnerships."
        ));
        assert!(!prompts[0].contains("Unrelated chunk."));
        assert!(prompts[0].contains("User Query: How is my career?"));
    }

    #[tokio::test]
    async fn test_empty_reply_uses_fallback_answer() {
        let tmp = TempDir::new().unwrap();
        let cfg = write_index(&tmp, vec![chunk("c1", "text", vec![1.0, 0.0])]);
        let response = engine(&cfg, Arc::new(RecordingCompleter::default()))
            .answer(&details("anything"))
            .await
            .unwrap();
        assert_eq!(response.answer, llm::NO_ANSWER);
    }

    #[tokio::test]
    async fn test_missing_index() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = Config::minimal();
        cfg.index.path = tmp.path().join("nope.json");
        let completer = Arc::new(RecordingCompleter::default());
        let err = engine(&cfg, completer.clone())
            .answer(&details("anything"))
            .await
            .unwrap_err();
        assert!(matches!(err, InsightError::IndexNotFound(_)));
        assert!(completer.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_index_built_after_failed_load_is_picked_up() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = Config::minimal();
        cfg.index.path = tmp.path().join("late.json");
        let engine = engine(&cfg, Arc::new(RecordingCompleter::default()));

        assert!(engine.index().await.is_err());
        VectorIndex::new("fixed", vec![chunk("c1", "t", vec![1.0, 0.0])])
            .save(&cfg.index.path)
            .unwrap();
        assert_eq!(engine.index().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_index_is_retrieval_empty() {
        let tmp = TempDir::new().unwrap();
        let cfg = write_index(&tmp, vec![]);
        let err = engine(&cfg, Arc::new(RecordingCompleter::default()))
            .answer(&details("anything"))
            .await
            .unwrap_err();
        assert!(matches!(err, InsightError::RetrievalEmpty));
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch_is_rejected_before_completion() {
        let tmp = TempDir::new().unwrap();
        let cfg = write_index(
            &tmp,
            vec![
                chunk("a", "first", vec![1.0, 0.0]),
                chunk("b", "second", vec![0.0, 1.0]),
            ],
        );
        let completer = Arc::new(RecordingCompleter::default());
        let engine = InsightEngine::new(
            &cfg,
            Arc::new(FixedPositions::default()),
            Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])),
            completer.clone(),
        );

        let index = engine.index().await.unwrap();
        let err = engine.retrieve(&index, "anything").await.unwrap_err();
        assert!(matches!(err, InsightError::IndexCorrupt { .. }));
        assert!(err.to_string().contains("2-dimensional"));

        let err = engine.answer(&details("anything")).await.unwrap_err();
        assert!(matches!(err, InsightError::IndexCorrupt { .. }));
        assert!(completer.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let tmp = TempDir::new().unwrap();
        let cfg = write_index(&tmp, vec![chunk("c1", "t", vec![1.0, 0.0])]);
        let err = engine(&cfg, Arc::new(RecordingCompleter::default()))
            .answer(&details("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, InsightError::InvalidInput(_)));
    }
}
