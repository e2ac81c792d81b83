//! 임베딩 모듈 - 로컬 ONNX 모델을 통한 텍스트 벡터화
//!
//! fastembed로 sentence-transformers 계열 모델을 로컬에서 실행합니다.
//! 네트워크는 최초 모델 다운로드 시에만 사용됩니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = LocalEmbedding::new(&EmbeddingConfig::default())?;
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

#[cfg(test)]
pub(crate) mod testing;

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::config::EmbeddingConfig;
use crate::error::RagError;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 고정 차원 벡터로 변환하는 인터페이스입니다.
/// 한 프로세스 안에서 차원은 바뀌지 않습니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Model Registry
// ============================================================================

/// 지원 모델 (ID, fastembed 모델, 차원)
fn resolve_model(id: &str) -> Result<(&'static str, EmbeddingModel, usize)> {
    let resolved = match id.to_lowercase().trim_start_matches("sentence-transformers/") {
        "all-minilm-l6-v2" => ("all-MiniLM-L6-v2", EmbeddingModel::AllMiniLML6V2, 384),
        "all-minilm-l12-v2" => ("all-MiniLM-L12-v2", EmbeddingModel::AllMiniLML12V2, 384),
        "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => {
            ("bge-small-en-v1.5", EmbeddingModel::BGESmallENV15, 384)
        }
        "bge-base-en-v1.5" | "baai/bge-base-en-v1.5" => {
            ("bge-base-en-v1.5", EmbeddingModel::BGEBaseENV15, 768)
        }
        _ => return Err(RagError::UnknownEmbeddingModel(id.to_string()).into()),
    };
    Ok(resolved)
}

/// 모델 ID의 임베딩 차원 (모델 로드 없이 조회)
pub fn model_dimension(id: &str) -> Result<usize> {
    resolve_model(id).map(|(_, _, dim)| dim)
}

// ============================================================================
// Local Embedding (fastembed)
// ============================================================================

/// 로컬 ONNX 임베딩 구현체
pub struct LocalEmbedding {
    model: Arc<Mutex<TextEmbedding>>,
    name: &'static str,
    dimension: usize,
    batch_size: usize,
}

impl std::fmt::Debug for LocalEmbedding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEmbedding")
            .field("name", &self.name)
            .field("dimension", &self.dimension)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl LocalEmbedding {
    /// 설정으로 모델 로드 (최초 실행 시 다운로드)
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (name, model, dimension) = resolve_model(&config.model)?;
        let cache_dir = config.resolved_cache_dir();

        tracing::info!("Loading embedding model: {} (cache: {:?})", name, cache_dir);

        let options = InitOptions::new(model)
            .with_cache_dir(cache_dir)
            .with_show_download_progress(false);

        let model = TextEmbedding::try_new(options)
            .map_err(|e| anyhow::anyhow!("Failed to load embedding model {}: {}", name, e))?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            name,
            dimension,
            batch_size: config.batch_size.max(1),
        })
    }

    /// 블로킹 스레드에서 추론
    async fn run(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let batch_size = self.batch_size;

        tokio::task::spawn_blocking(move || {
            let model = model
                .lock()
                .map_err(|e| anyhow::anyhow!("Embedding model lock poisoned: {}", e))?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow::anyhow!("Embedding inference failed: {}", e))
        })
        .await
        .context("Embedding task failed")?
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.run(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Embedding model returned no vectors"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let vectors = self.run(texts.to_vec()).await?;
        if vectors.len() != texts.len() {
            anyhow::bail!(
                "Embedding model returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            );
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        self.name
    }
}

// ============================================================================
// Vector Utilities
// ============================================================================

/// 단위 길이로 정규화 (영벡터는 그대로)
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정에서 임베딩 프로바이더 생성
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder = LocalEmbedding::new(config)?;
    tracing::info!(
        "Using local embedding model {} (dimension: {})",
        embedder.name(),
        embedder.dimension()
    );
    Ok(Arc::new(embedder))
}

// ============================================================================
// Tests
// ============================================================================
