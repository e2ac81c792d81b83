//! Embedding Index - 프래그먼트 임베딩 + 영속 컬렉션 + 최근접 검색
//!
//! 모든 벡터는 단위 길이로 정규화되어 저장됩니다. 질의 벡터도 같은 방식으로
//! 정규화하므로 `score`(제곱 L2 거리)는 0.0 ~ 4.0 범위이며 낮을수록 좋습니다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::config::RagConfig;
use crate::embedding::{normalize, EmbeddingProvider};
use crate::error::RagError;

use super::fragment::Fragment;
use super::lance::LanceVectorStore;
use super::vector::{EmbeddingRecord, Retriever, ScoredFragment, VectorStore};

/// 인덱스 통계
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub collection: String,
    pub record_count: usize,
    pub dimension: usize,
    pub model: String,
}

/// 임베딩 인덱스
///
/// 활성 컬렉션은 최대 하나입니다. `create_collection` 또는
/// `load_collection` 성공 시 활성화되고 `delete_collection` 시 비활성화됩니다.
pub struct EmbeddingIndex {
    store: Box<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
    batch_size: usize,
    active: AtomicBool,
}

impl std::fmt::Debug for EmbeddingIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingIndex")
            .field("collection", &self.store.collection_name())
            .field("embedder", &self.embedder.name())
            .field("top_k", &self.top_k)
            .field("active", &self.is_active())
            .finish()
    }
}

impl EmbeddingIndex {
    /// 설정의 인덱스 디렉토리 / 컬렉션 이름으로 LanceDB 인덱스 열기
    pub async fn open(config: &RagConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let store = LanceVectorStore::open(&config.index_dir, &config.collection_name)
            .await
            .context("Failed to open vector store")?;

        Ok(Self::with_store(
            Box::new(store),
            embedder,
            config.retrieval.top_k,
            config.embedding.batch_size,
        ))
    }

    /// 임의의 저장소로 생성
    pub fn with_store(
        store: Box<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        top_k: usize,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            top_k: top_k.max(1),
            batch_size: batch_size.max(1),
            active: AtomicBool::new(false),
        }
    }

    /// 활성 컬렉션 여부
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// 프래그먼트 전체를 임베딩해 새 컬렉션 생성 (기존 컬렉션은 교체)
    ///
    /// 빈 입력은 `RagError::EmptyInput`.
    pub async fn create_collection(&self, fragments: &[Fragment]) -> Result<usize> {
        if fragments.is_empty() {
            return Err(RagError::EmptyInput.into());
        }

        let dimension = self.embedder.dimension();
        let mut records = Vec::with_capacity(fragments.len());

        for (batch_no, batch) in fragments.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|f| f.content.clone()).collect();

            tracing::debug!(
                "Embedding batch {} ({} fragments)",
                batch_no + 1,
                texts.len()
            );

            let embeddings = self
                .embedder
                .embed_batch(&texts)
                .await
                .context("Failed to embed fragments")?;

            if embeddings.len() != batch.len() {
                anyhow::bail!(
                    "Embedder returned {} vectors for {} fragments",
                    embeddings.len(),
                    batch.len()
                );
            }

            for (fragment, mut embedding) in batch.iter().zip(embeddings) {
                if embedding.len() != dimension {
                    anyhow::bail!(
                        "Embedder {} returned a {}-dimensional vector, expected {}",
                        self.embedder.name(),
                        embedding.len(),
                        dimension
                    );
                }
                normalize(&mut embedding);

                records.push(EmbeddingRecord {
                    id: uuid::Uuid::new_v4().to_string(),
                    fragment: fragment.clone(),
                    embedding,
                });
            }
        }

        let created = self.store.create(&records, dimension).await?;
        self.active.store(true, Ordering::SeqCst);

        tracing::info!(
            "Created collection {} with {} records (dimension: {})",
            self.store.collection_name(),
            created,
            dimension
        );
        Ok(created)
    }

    /// 영속 컬렉션에 재연결
    ///
    /// 컬렉션이 없거나 비어 있으면 `Ok(false)`. 저장된 차원이 현재 모델과
    /// 다르면 `RagError::DimensionMismatch`.
    pub async fn load_collection(&self) -> Result<bool> {
        if !self.store.exists().await? {
            tracing::info!("No persisted collection: {}", self.store.collection_name());
            return Ok(false);
        }

        let count = self.store.count().await?;
        if count == 0 {
            tracing::warn!("Persisted collection {} is empty", self.store.collection_name());
            return Ok(false);
        }

        let model_dim = self.embedder.dimension();
        if let Some(stored) = self.store.dimension().await? {
            if stored != model_dim {
                return Err(RagError::DimensionMismatch {
                    stored,
                    model: model_dim,
                }
                .into());
            }
        }

        self.active.store(true, Ordering::SeqCst);
        tracing::info!(
            "Loaded collection {} ({} records)",
            self.store.collection_name(),
            count
        );
        Ok(true)
    }

    /// 질의와 가까운 프래그먼트 최대 k개 (거리 오름차순)
    ///
    /// `k`가 없으면 설정된 top-K. 활성 컬렉션이 없으면 빈 결과.
    pub async fn search(&self, query: &str, k: Option<usize>) -> Result<Vec<ScoredFragment>> {
        if !self.is_active() {
            tracing::error!("Search requested but no collection is loaded");
            return Ok(vec![]);
        }

        let k = k.unwrap_or(self.top_k);
        let mut embedding = self
            .embedder
            .embed(query)
            .await
            .context("Failed to embed query")?;
        normalize(&mut embedding);

        self.store.search(&embedding, k).await
    }

    /// 활성 컬렉션 삭제 (되돌릴 수 없음)
    pub async fn delete_collection(&self) -> Result<()> {
        self.active.store(false, Ordering::SeqCst);
        if self.store.drop_collection().await? {
            tracing::info!("Deleted collection {}", self.store.collection_name());
        }
        Ok(())
    }

    /// 레코드 수 (활성 컬렉션이 없으면 0)
    pub async fn count(&self) -> Result<usize> {
        if !self.is_active() {
            return Ok(0);
        }
        self.store.count().await
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            collection: self.store.collection_name().to_string(),
            record_count: self.count().await?,
            dimension: self.embedder.dimension(),
            model: self.embedder.name().to_string(),
        })
    }
}

#[async_trait]
impl Retriever for EmbeddingIndex {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredFragment>> {
        self.search(query, Some(k)).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::HashEmbedding;
    use crate::knowledge::FragmentMetadata;
    use std::path::Path;
    use tempfile::TempDir;

    const DIM: usize = 64;

    fn fragments() -> Vec<Fragment> {
        [
            "Rust ownership rules prevent data races at compile time.",
            "Tokio is an asynchronous runtime for the Rust language.",
            "LanceDB stores vectors in the Lance columnar format.",
            "Sourdough bread needs a starter and a long fermentation.",
        ]
        .iter()
        .enumerate()
        .map(|(i, text)| {
            Fragment::new(
                *text,
                FragmentMetadata::new(format!("/docs/{}.txt", i), format!("{}.txt", i))
                    .with("chunk_index", 0),
            )
        })
        .collect()
    }

    async fn open_index(dir: &Path, embedder: Arc<HashEmbedding>) -> EmbeddingIndex {
        let store = LanceVectorStore::open(dir, "test_collection").await.unwrap();
        EmbeddingIndex::with_store(Box::new(store), embedder, 3, 2)
    }

    #[tokio::test]
    async fn test_create_then_count() {
        let dir = TempDir::new().unwrap();
        let embedder = Arc::new(HashEmbedding::new(DIM));
        let index = open_index(dir.path(), embedder.clone()).await;

        assert_eq!(index.count().await.unwrap(), 0);

        let created = index.create_collection(&fragments()).await.unwrap();
        assert_eq!(created, 4);
        assert_eq!(index.count().await.unwrap(), 4);

        // batch_size 2 → 2회 배치 호출
        assert_eq!(embedder.batch_calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let dir = TempDir::new().unwrap();
        let index = open_index(dir.path(), Arc::new(HashEmbedding::new(DIM))).await;

        let err = index.create_collection(&[]).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::EmptyInput)
        ));
        assert!(!index.is_active());
    }

    #[tokio::test]
    async fn test_search_is_deterministic_and_ranked() {
        let dir = TempDir::new().unwrap();
        let index = open_index(dir.path(), Arc::new(HashEmbedding::new(DIM))).await;
        index.create_collection(&fragments()).await.unwrap();

        let first = index.search("tokio asynchronous runtime", None).await.unwrap();
        let second = index.search("tokio asynchronous runtime", None).await.unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        assert!(first[0].fragment.content.starts_with("Tokio"));
        assert!(first.windows(2).all(|w| w[0].score <= w[1].score));
        assert!(first.iter().all(|r| (0.0..=4.0 + 1e-4).contains(&r.score)));
    }

    #[tokio::test]
    async fn test_search_with_explicit_k() {
        let dir = TempDir::new().unwrap();
        let index = open_index(dir.path(), Arc::new(HashEmbedding::new(DIM))).await;
        index.create_collection(&fragments()).await.unwrap();

        assert_eq!(index.search("rust", Some(1)).await.unwrap().len(), 1);
        assert_eq!(index.search("rust", Some(10)).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_search_without_collection_is_empty() {
        let dir = TempDir::new().unwrap();
        let embedder = Arc::new(HashEmbedding::new(DIM));
        let index = open_index(dir.path(), embedder.clone()).await;

        assert!(index.search("anything", None).await.unwrap().is_empty());
        assert_eq!(embedder.query_calls(), 0);
    }

    #[tokio::test]
    async fn test_reload_after_restart() {
        let dir = TempDir::new().unwrap();

        {
            let index = open_index(dir.path(), Arc::new(HashEmbedding::new(DIM))).await;
            index.create_collection(&fragments()).await.unwrap();
        }

        let embedder = Arc::new(HashEmbedding::new(DIM));
        let index = open_index(dir.path(), embedder.clone()).await;
        assert!(index.load_collection().await.unwrap());
        assert_eq!(index.count().await.unwrap(), 4);
        assert_eq!(embedder.batch_calls(), 0);

        let results = index.search("bread fermentation", Some(1)).await.unwrap();
        assert!(results[0].fragment.content.starts_with("Sourdough"));
        assert_eq!(results[0].fragment.metadata.file_name, "3.txt");
    }

    #[tokio::test]
    async fn test_load_absent_collection() {
        let dir = TempDir::new().unwrap();
        let index = open_index(dir.path(), Arc::new(HashEmbedding::new(DIM))).await;

        assert!(!index.load_collection().await.unwrap());
        assert!(!index.is_active());
    }

    #[tokio::test]
    async fn test_delete_then_load_reports_absent() {
        let dir = TempDir::new().unwrap();
        let index = open_index(dir.path(), Arc::new(HashEmbedding::new(DIM))).await;
        index.create_collection(&fragments()).await.unwrap();

        index.delete_collection().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(!index.load_collection().await.unwrap());

        // 없는 컬렉션 삭제도 성공
        index.delete_collection().await.unwrap();
    }

    #[tokio::test]
    async fn test_load_rejects_dimension_mismatch() {
        let dir = TempDir::new().unwrap();
        {
            let index = open_index(dir.path(), Arc::new(HashEmbedding::new(DIM))).await;
            index.create_collection(&fragments()).await.unwrap();
        }

        let index = open_index(dir.path(), Arc::new(HashEmbedding::new(DIM * 2))).await;
        let err = index.load_collection().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::DimensionMismatch { stored: 64, model: 128 })
        ));
    }

    /// 선언한 차원과 다른 길이의 벡터를 돌려주는 임베딩
    struct ShortEmbedding;

    #[async_trait]
    impl EmbeddingProvider for ShortEmbedding {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0; 4])
        }

        fn dimension(&self) -> usize {
            8
        }

        fn name(&self) -> &str {
            "short"
        }
    }

    #[tokio::test]
    async fn test_create_rejects_wrong_length_embedding() {
        let dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(dir.path(), "test_collection").await.unwrap();
        let index = EmbeddingIndex::with_store(Box::new(store), Arc::new(ShortEmbedding), 3, 2);

        let err = index.create_collection(&fragments()).await.unwrap_err();

        assert!(err.downcast_ref::<RagError>().is_none());
        let message = err.to_string();
        assert!(message.contains("short returned a 4-dimensional vector, expected 8"));
        assert!(!index.is_active());
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stats() {
        let dir = TempDir::new().unwrap();
        let index = open_index(dir.path(), Arc::new(HashEmbedding::new(DIM))).await;
        index.create_collection(&fragments()).await.unwrap();

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.collection, "test_collection");
        assert_eq!(stats.record_count, 4);
        assert_eq!(stats.dimension, DIM);
        assert_eq!(stats.model, "hash-bow");
    }
}
