//! Vector Store - 벡터 저장소 / 검색 트레이트
//!
//! 점수 규약: `score`는 단위 벡터 간 제곱 L2 거리입니다.
//! 범위 0.0 ~ 4.0, **낮을수록 관련성이 높습니다** (= 2 - 2·cos).

use anyhow::Result;
use async_trait::async_trait;

use super::fragment::Fragment;

// ============================================================================
// Types
// ============================================================================

/// 임베딩 레코드 (저장용)
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    /// 레코드 ID (UUID)
    pub id: String,
    pub fragment: Fragment,
    /// 정규화된 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 검색 결과
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFragment {
    pub fragment: Fragment,
    /// 거리 스코어 (낮을수록 유사)
    pub score: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// 이름 있는 영속 컬렉션 하나를 다루는 저장소
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 컬렉션 이름
    fn collection_name(&self) -> &str;

    /// 컬렉션 존재 여부
    async fn exists(&self) -> Result<bool>;

    /// 레코드로 새 컬렉션 생성 (기존 컬렉션은 교체)
    async fn create(&self, records: &[EmbeddingRecord], dimension: usize) -> Result<usize>;

    /// 최근접 검색 (거리 오름차순)
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<ScoredFragment>>;

    /// 컬렉션 삭제 (삭제했으면 true)
    async fn drop_collection(&self) -> Result<bool>;

    /// 레코드 수 (컬렉션 없으면 0)
    async fn count(&self) -> Result<usize>;

    /// 저장된 벡터 차원 (컬렉션 없으면 None)
    async fn dimension(&self) -> Result<Option<usize>>;
}

// ============================================================================
// Retriever Trait
// ============================================================================

/// 질의 텍스트로 상위 K개 프래그먼트를 찾는 인터페이스
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredFragment>>;
}
