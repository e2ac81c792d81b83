//! Knowledge 모듈 - 문서 분할 + 임베딩 인덱스
//!
//! - Chunker: 재귀 계층 분할 (문단 → 줄 → 공백 → 문자)
//! - Processor: 문서 디렉토리 → 프래그먼트
//! - LanceDB: 영속 벡터 컬렉션
//! - Index: 임베딩 + 정규화 + 결정적 최근접 검색

mod chunker;
mod fragment;
mod index;
mod lance;
mod processor;
mod vector;

// Re-exports
pub use chunker::{ChunkConfig, Chunker, RecursiveChunker};
pub use fragment::{Fragment, FragmentMetadata};
pub use index::{EmbeddingIndex, IndexStats};
pub use lance::LanceVectorStore;
pub use processor::DocumentProcessor;
pub use vector::{EmbeddingRecord, Retriever, ScoredFragment, VectorStore};
