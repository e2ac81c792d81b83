//! 설정 모듈
//!
//! 모든 컴포넌트는 전역 상태 대신 `RagConfig`를 생성자로 전달받습니다.
//!
//! 로드 순서:
//! 1. TOML 파일 (명시 경로 > `~/.knowbase/config.toml`)
//! 2. 환경변수 오버라이드 (`OPENAI_API_KEY`, `KNOWBASE_DOCUMENTS_DIR`, `KNOWBASE_INDEX_DIR`)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::RagError;
use crate::knowledge::ChunkConfig;

/// 기본 컬렉션 이름
pub const DEFAULT_COLLECTION_NAME: &str = "rag_knowledge_base";

/// 기본 프롬프트 템플릿 (`{context}`, `{question}` 치환)
pub const DEFAULT_PROMPT_TEMPLATE: &str = "You are an intelligent assistant helping to answer questions based on a knowledge base.

Context from knowledge base:
{context}

Question: {question}

Please provide a detailed and accurate answer based on the context provided above. If the context doesn't contain enough information to answer the question fully, acknowledge what you can answer and what information might be missing.

Answer:";

/// 기본 시스템 메시지
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a helpful AI assistant that answers questions based on a custom knowledge base. \
Always base your answers primarily on the provided context, and be honest when information is not available in the knowledge base.";

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.knowbase/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".knowbase")
}

// ============================================================================
// Sections
// ============================================================================

/// 임베딩 모델 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// 모델 ID (예: all-MiniLM-L6-v2)
    pub model: String,
    /// 모델 파일 캐시 위치 (없으면 데이터 디렉토리/models)
    pub cache_dir: Option<PathBuf>,
    /// 한 번에 임베딩할 텍스트 수
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            cache_dir: None,
            batch_size: 64,
        }
    }
}

impl EmbeddingConfig {
    /// 실제 사용할 캐시 디렉토리
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| get_data_dir().join("models"))
    }
}

/// 검색 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// 검색할 프래그먼트 수
    pub top_k: usize,
    /// 추출 모드에서 발췌 길이 (문자 수)
    pub excerpt_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            excerpt_chars: 300,
        }
    }
}

/// 생성 모델 설정 (OpenAI 호환 API)
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// API 키 (파일에 저장하지 않음)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// HTTP 요청 타임아웃 (초)
    pub timeout_secs: u64,
    pub prompt_template: String,
    pub system_message: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            timeout_secs: 60,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
        }
    }
}

impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl GenerationConfig {
    /// 유효한 API 키가 설정되어 있는지
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

// ============================================================================
// RagConfig
// ============================================================================

/// 전체 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// 문서 디렉토리 (재귀 스캔)
    pub documents_dir: PathBuf,
    /// 벡터 인덱스 저장 디렉토리
    pub index_dir: PathBuf,
    /// 컬렉션 이름
    pub collection_name: String,
    pub chunk: ChunkConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("documents"),
            index_dir: PathBuf::from("vector_db"),
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            chunk: ChunkConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl RagConfig {
    /// 설정 로드
    ///
    /// `path`가 주어지면 해당 파일을 반드시 읽고, 아니면 기본 위치의
    /// config.toml이 있을 때만 읽습니다. 이후 환경변수를 적용하고 검증합니다.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = get_data_dir().join("config.toml");
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 읽기
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&text).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// TOML 문자열 파싱
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        Ok(config)
    }

    /// 환경변수 오버라이드 적용
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                tracing::debug!("Using API key from OPENAI_API_KEY");
                self.generation.api_key = Some(key);
            }
        }

        if let Ok(dir) = std::env::var("KNOWBASE_DOCUMENTS_DIR") {
            if !dir.is_empty() {
                self.documents_dir = PathBuf::from(dir);
            }
        }

        if let Ok(dir) = std::env::var("KNOWBASE_INDEX_DIR") {
            if !dir.is_empty() {
                self.index_dir = PathBuf::from(dir);
            }
        }
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<()> {
        self.chunk.validate()?;

        if self.retrieval.top_k == 0 {
            return Err(RagError::InvalidConfig("retrieval.top_k must be at least 1".into()).into());
        }

        let template = &self.generation.prompt_template;
        for placeholder in ["{context}", "{question}"] {
            if !template.contains(placeholder) {
                return Err(RagError::InvalidConfig(format!(
                    "generation.prompt_template is missing the {} placeholder",
                    placeholder
                ))
                .into());
            }
        }

        if self.collection_name.trim().is_empty() {
            return Err(RagError::InvalidConfig("collection_name must not be empty".into()).into());
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
