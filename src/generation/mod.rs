//! 생성 모듈 - OpenAI 호환 Chat Completions 클라이언트
//!
//! 프롬프트 하나를 한 번 전송하고 응답 텍스트를 그대로 반환합니다.
//! 재시도나 스트리밍은 하지 않습니다.
//!
//! source: https://platform.openai.com/docs/api-reference/chat/create

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;

// ============================================================================
// Generator Trait
// ============================================================================

/// 텍스트 생성 백엔드
#[async_trait]
pub trait Generator: Send + Sync {
    /// 완성된 프롬프트로 답변 생성
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI Generator
// ============================================================================

/// OpenAI 호환 생성기
pub struct OpenAiGenerator {
    api_key: String,
    client: reqwest::Client,
    endpoint: String,
    model: String,
    system_message: String,
    temperature: f32,
    max_tokens: u32,
}

impl std::fmt::Debug for OpenAiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiGenerator")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiGenerator {
    /// 설정으로 생성 (API 키 필수)
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("No API key configured for generation"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            system_message: config.system_message.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

/// Chat Completions 요청 본문
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Chat Completions 응답
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// API 에러 응답
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_message,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send generation request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            anyhow::bail!("Generation API error ({}): {}", status.as_u16(), message);
        }

        let chat: ChatResponse =
            serde_json::from_str(&body).context("Failed to parse generation response")?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("Generation API returned no choices"))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정에서 생성기 생성
///
/// API 키가 없거나 클라이언트 생성에 실패하면 `None` (추출 모드).
pub fn generator_from_config(config: &GenerationConfig) -> Option<Arc<dyn Generator>> {
    if !config.has_api_key() {
        tracing::info!("No API key configured, using extractive answers");
        return None;
    }

    match OpenAiGenerator::new(config) {
        Ok(generator) => {
            tracing::info!("Using generative backend: {}", generator.name());
            Some(Arc::new(generator))
        }
        Err(e) => {
            tracing::error!("Failed to initialize generative backend: {:#}", e);
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
