//! 도메인 에러 타입
//!
//! 내부 로직은 `anyhow::Result`로 전파하고, 호출자가 구분해야 하는
//! 실패만 `RagError`로 표현합니다. `anyhow::Error::downcast_ref`로 복원 가능합니다.

use thiserror::Error;

/// knowbase 도메인 에러
#[derive(Debug, Error)]
pub enum RagError {
    /// 빈 프래그먼트 목록으로 컬렉션 생성 시도
    #[error("cannot create a collection from an empty fragment list")]
    EmptyInput,

    /// 인덱싱할 문서가 없음
    #[error("no documents to index in {0}")]
    NoDocuments(String),

    /// 저장된 벡터 차원과 현재 임베딩 모델 차원 불일치
    #[error("embedding dimension mismatch: collection has {stored}, model produces {model} (rebuild required)")]
    DimensionMismatch { stored: usize, model: usize },

    /// 지원하지 않는 임베딩 모델 ID
    #[error("unknown embedding model: {0}")]
    UnknownEmbeddingModel(String),

    /// 잘못된 설정값
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
