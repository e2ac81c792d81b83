//! Retrieval-Augmentation Engine
//!
//! 질문 → 상위 K개 프래그먼트 → 답변. 모드는 생성 시 한 번 결정됩니다.
//! - Generative: 템플릿에 context/question을 채워 생성기를 한 번 호출
//! - Extractive: 발췌문을 그대로 나열 (네트워크 호출 없음)
//!
//! `answer`는 절대 실패하지 않으며 모든 오류는 `QueryResult::error`로 전달됩니다.

use std::sync::{Arc, OnceLock};

use anyhow::Result;
use regex::{Captures, Regex};
use serde::Serialize;

use crate::config::RagConfig;
use crate::generation::Generator;
use crate::knowledge::{Fragment, Retriever, ScoredFragment};

pub const EMPTY_QUESTION_ANSWER: &str = "Please provide a valid question.";
pub const EMPTY_QUESTION_ERROR: &str = "empty question";

pub const NO_RESULTS_ANSWER: &str =
    "I couldn't find any relevant information in the knowledge base for your question.";
pub const NO_RESULTS_ERROR: &str = "no relevant documents found";

const EXTRACTIVE_PREAMBLE: &str = "Based on the knowledge base, here are the most relevant excerpts:\n\n";
const EXTRACTIVE_FOOTER: &str =
    "\n*Note: Configure a generative backend (set OPENAI_API_KEY) to get AI-generated answers.*";

/// `{context}` / `{question}` 자리표시자
fn placeholder_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{(context|question)\}")
            .unwrap_or_else(|e| unreachable!("static placeholder regex: {e}"))
    })
}

// ============================================================================
// Types
// ============================================================================

/// 질의 결과
///
/// `scores`는 `sources`와 같은 순서의 거리 값입니다 (낮을수록 관련성 높음).
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub answer: String,
    pub sources: Vec<Fragment>,
    pub scores: Option<Vec<f32>>,
    pub error: Option<String>,
}

impl QueryResult {
    /// 소스 없는 실패 결과
    pub fn failure(answer: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: vec![],
            scores: None,
            error: Some(error.into()),
        }
    }
}

/// 답변 모드
#[derive(Clone)]
pub enum EngineMode {
    Generative(Arc<dyn Generator>),
    Extractive,
}

impl std::fmt::Debug for EngineMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generative(g) => f.debug_tuple("Generative").field(&g.name()).finish(),
            Self::Extractive => f.write_str("Extractive"),
        }
    }
}

// ============================================================================
// RagEngine
// ============================================================================

/// 검색 증강 엔진
pub struct RagEngine {
    retriever: Arc<dyn Retriever>,
    mode: EngineMode,
    top_k: usize,
    excerpt_chars: usize,
    prompt_template: String,
}

impl RagEngine {
    /// 생성기 유무로 모드 결정
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Option<Arc<dyn Generator>>,
        config: &RagConfig,
    ) -> Self {
        let mode = match generator {
            Some(g) => EngineMode::Generative(g),
            None => EngineMode::Extractive,
        };

        tracing::info!("RAG engine ready ({:?})", mode);

        Self {
            retriever,
            mode,
            top_k: config.retrieval.top_k,
            excerpt_chars: config.retrieval.excerpt_chars,
            prompt_template: config.generation.prompt_template.clone(),
        }
    }

    pub fn mode(&self) -> &EngineMode {
        &self.mode
    }

    /// 질문에 답변
    pub async fn answer(&self, question: &str) -> QueryResult {
        if question.trim().is_empty() {
            return QueryResult::failure(EMPTY_QUESTION_ANSWER, EMPTY_QUESTION_ERROR);
        }

        match self.try_answer(question).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Failed to answer question: {:#}", e);
                QueryResult::failure(
                    format!("An error occurred while processing your question: {}", e),
                    e.to_string(),
                )
            }
        }
    }

    async fn try_answer(&self, question: &str) -> Result<QueryResult> {
        let retrieved = self.retriever.retrieve(question, self.top_k).await?;

        if retrieved.is_empty() {
            return Ok(QueryResult::failure(NO_RESULTS_ANSWER, NO_RESULTS_ERROR));
        }

        tracing::debug!("Retrieved {} fragments", retrieved.len());

        let answer = match &self.mode {
            EngineMode::Generative(generator) => {
                let prompt = self.render_prompt(question, &retrieved);
                generator.generate(&prompt).await?
            }
            EngineMode::Extractive => self.extractive_answer(&retrieved),
        };

        let (sources, scores): (Vec<Fragment>, Vec<f32>) = retrieved
            .into_iter()
            .map(|r| (r.fragment, r.score))
            .unzip();

        Ok(QueryResult {
            answer,
            sources,
            scores: Some(scores),
            error: None,
        })
    }

    /// 템플릿에 context / question 채우기
    fn render_prompt(&self, question: &str, retrieved: &[ScoredFragment]) -> String {
        let context = retrieved
            .iter()
            .map(|r| r.fragment.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        // 한 번에 치환 (문서 본문의 `{question}` 등은 그대로 유지)
        placeholder_pattern()
            .replace_all(&self.prompt_template, |caps: &Captures| match &caps[1] {
                "context" => context.clone(),
                _ => question.to_string(),
            })
            .into_owned()
    }

    fn extractive_answer(&self, retrieved: &[ScoredFragment]) -> String {
        let mut answer = String::from(EXTRACTIVE_PREAMBLE);

        for (i, r) in retrieved.iter().enumerate() {
            let excerpt: String = r.fragment.content.chars().take(self.excerpt_chars).collect();
            answer.push_str(&format!("**Excerpt {}:**\n{}...\n\n", i + 1, excerpt));
        }

        answer.push_str(EXTRACTIVE_FOOTER);
        answer
    }
}

// ============================================================================
// Tests
// ============================================================================
