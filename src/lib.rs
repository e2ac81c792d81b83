//! knowbase - 문서 기반 질의응답 RAG 시스템
//!
//! 로컬 문서 디렉토리를 분할/임베딩해 LanceDB에 저장하고,
//! 질문과 가까운 프래그먼트를 찾아 답변을 구성합니다.
//! 생성 백엔드(OpenAI 호환)가 없으면 발췌 모드로 동작합니다.

pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod knowledge;
pub mod rag;

// Re-exports
pub use config::{get_data_dir, RagConfig};
pub use embedding::{create_embedder, EmbeddingProvider, LocalEmbedding};
pub use error::RagError;
pub use generation::{generator_from_config, Generator, OpenAiGenerator};
pub use knowledge::{
    ChunkConfig, Chunker, DocumentProcessor, EmbeddingIndex, Fragment, FragmentMetadata,
    LanceVectorStore, Retriever, ScoredFragment, VectorStore,
};
pub use rag::{QueryResult, RagEngine, RagManager};
