//! System Manager - 인덱스 수명주기 + 단일 질의 진입점
//!
//! Uninitialized → Ready (재빌드 시 Ready → Ready).
//! `initialize`와 `query`는 실패를 반환하지 않습니다.

use std::sync::Arc;

use anyhow::Result;

use crate::collector::DocumentStats;
use crate::config::RagConfig;
use crate::embedding::{create_embedder, EmbeddingProvider};
use crate::error::RagError;
use crate::generation::{generator_from_config, Generator};
use crate::knowledge::{DocumentProcessor, EmbeddingIndex, Retriever};

use super::engine::{QueryResult, RagEngine};

pub const NOT_INITIALIZED_ANSWER: &str = "RAG system is not initialized. Please initialize first.";
pub const NOT_INITIALIZED_ERROR: &str = "Not initialized";

/// RAG 시스템 매니저
pub struct RagManager {
    config: RagConfig,
    processor: DocumentProcessor,
    index: Arc<EmbeddingIndex>,
    generator: Option<Arc<dyn Generator>>,
    engine: Option<RagEngine>,
}

impl RagManager {
    /// 설정의 임베딩 모델 / 생성기로 매니저 생성
    pub async fn new(config: RagConfig) -> Result<Self> {
        let embedding_config = config.embedding.clone();
        let embedder =
            tokio::task::spawn_blocking(move || create_embedder(&embedding_config)).await??;
        let generator = generator_from_config(&config.generation);

        Self::with_components(config, embedder, generator).await
    }

    /// 임베딩 / 생성기를 직접 지정해 생성
    pub async fn with_components(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Option<Arc<dyn Generator>>,
    ) -> Result<Self> {
        let index = EmbeddingIndex::open(&config, embedder).await?;

        Ok(Self {
            processor: DocumentProcessor::new(config.chunk.clone()),
            index: Arc::new(index),
            generator,
            engine: None,
            config,
        })
    }

    /// 인덱스 준비 후 엔진 생성
    ///
    /// `force_rebuild`이면 문서를 다시 분할/임베딩합니다. 아니면 기존 컬렉션을
    /// 재사용하고, 없을 때만 새로 빌드합니다. 실패 시 false.
    pub async fn initialize(&mut self, force_rebuild: bool) -> bool {
        match self.prepare_index(force_rebuild).await {
            Ok(()) => {
                let retriever = Arc::clone(&self.index) as Arc<dyn Retriever>;
                self.engine = Some(RagEngine::new(
                    retriever,
                    self.generator.clone(),
                    &self.config,
                ));
                tracing::info!("RAG system initialized");
                true
            }
            Err(e) => {
                tracing::error!("Failed to initialize RAG system: {:#}", e);
                false
            }
        }
    }

    async fn prepare_index(&self, force_rebuild: bool) -> Result<()> {
        if force_rebuild {
            tracing::info!("Rebuilding knowledge base");
            return self.build_index().await;
        }

        if self.index.load_collection().await? {
            return Ok(());
        }

        tracing::info!("No existing knowledge base, building a new one");
        self.build_index().await
    }

    async fn build_index(&self) -> Result<()> {
        let fragments = self
            .processor
            .process_documents(&self.config.documents_dir)
            .await;

        if fragments.is_empty() {
            return Err(RagError::NoDocuments(self.config.documents_dir.display().to_string()).into());
        }

        if let Err(e) = self.index.delete_collection().await {
            tracing::warn!("Failed to delete existing collection: {:#}", e);
        }

        self.index.create_collection(&fragments).await?;
        Ok(())
    }

    /// 질문에 답변 (초기화 전이면 고정 에러 결과)
    pub async fn query(&self, question: &str) -> QueryResult {
        match &self.engine {
            Some(engine) => engine.answer(question).await,
            None => QueryResult::failure(NOT_INITIALIZED_ANSWER, NOT_INITIALIZED_ERROR),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.engine.is_some()
    }

    /// 생성 모드 여부 (API 키 설정됨)
    pub fn is_generative(&self) -> bool {
        self.generator.is_some()
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// 문서 디렉토리 통계
    pub fn document_stats(&self) -> DocumentStats {
        self.processor.document_stats(&self.config.documents_dir)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::HashEmbedding;
    use std::path::Path;
    use tempfile::TempDir;

    const DIM: usize = 32;

    fn config(root: &Path, documents: &str) -> RagConfig {
        RagConfig {
            documents_dir: root.join(documents),
            index_dir: root.join("index"),
            ..RagConfig::default()
        }
    }

    fn write_docs(root: &Path) {
        let docs = root.join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(
            docs.join("rust.md"),
            "# Rust\n\nRust guarantees memory safety without garbage collection.",
        )
        .unwrap();
        std::fs::write(
            docs.join("bread.txt"),
            "Sourdough bread rises slowly with wild yeast.",
        )
        .unwrap();
    }

    async fn manager(config: RagConfig, embedder: Arc<HashEmbedding>) -> RagManager {
        RagManager::with_components(config, embedder, None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_query_before_initialize() {
        let dir = TempDir::new().unwrap();
        let embedder = Arc::new(HashEmbedding::new(DIM));
        let manager = manager(config(dir.path(), "docs"), embedder.clone()).await;

        let result = manager.query("What is Rust?").await;

        assert!(!manager.is_ready());
        assert_eq!(result.error.as_deref(), Some(NOT_INITIALIZED_ERROR));
        assert_eq!(result.answer, NOT_INITIALIZED_ANSWER);
        assert_eq!(embedder.query_calls(), 0);
    }

    #[tokio::test]
    async fn test_initialize_builds_and_answers() {
        let dir = TempDir::new().unwrap();
        write_docs(dir.path());
        let mut manager = manager(
            config(dir.path(), "docs"),
            Arc::new(HashEmbedding::new(DIM)),
        )
        .await;

        assert!(manager.initialize(false).await);
        assert!(manager.is_ready());
        assert!(!manager.is_generative());
        assert_eq!(manager.index().count().await.unwrap(), 2);

        let result = manager.query("memory safety in Rust").await;
        assert!(result.error.is_none());
        assert_eq!(result.sources[0].metadata.file_name, "rust.md");
        assert!(result.answer.contains("**Excerpt 1:**"));
    }

    #[tokio::test]
    async fn test_initialize_reuses_existing_collection() {
        let dir = TempDir::new().unwrap();
        write_docs(dir.path());

        {
            let mut first = manager(
                config(dir.path(), "docs"),
                Arc::new(HashEmbedding::new(DIM)),
            )
            .await;
            assert!(first.initialize(false).await);
        }

        // 문서 디렉토리가 없어도 기존 컬렉션으로 Ready
        let embedder = Arc::new(HashEmbedding::new(DIM));
        let mut second = manager(config(dir.path(), "missing"), embedder.clone()).await;

        assert!(second.initialize(false).await);
        assert_eq!(embedder.batch_calls(), 0);
        assert_eq!(second.index().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_force_rebuild_reembeds() {
        let dir = TempDir::new().unwrap();
        write_docs(dir.path());
        let embedder = Arc::new(HashEmbedding::new(DIM));
        let mut manager = manager(config(dir.path(), "docs"), embedder.clone()).await;

        assert!(manager.initialize(false).await);
        let calls = embedder.batch_calls();

        std::fs::write(dir.path().join("docs/extra.txt"), "A third document.").unwrap();
        assert!(manager.initialize(true).await);

        assert!(embedder.batch_calls() > calls);
        assert_eq!(manager.index().count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_initialize_without_documents_fails() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(
            config(dir.path(), "empty"),
            Arc::new(HashEmbedding::new(DIM)),
        )
        .await;

        assert!(!manager.initialize(false).await);
        assert!(!manager.initialize(true).await);
        assert!(!manager.is_ready());
    }

    #[tokio::test]
    async fn test_document_stats() {
        let dir = TempDir::new().unwrap();
        write_docs(dir.path());
        let manager = manager(
            config(dir.path(), "docs"),
            Arc::new(HashEmbedding::new(DIM)),
        )
        .await;

        let stats = manager.document_stats();
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.counts_by_extension.get(".md"), Some(&1));
    }
}
