//! 답변 생성 모듈
//!
//! 질문을 임베딩해 가까운 청크를 찾고, 찾은 청크를 그대로 프롬프트에 넣어
//! Gemini `generateContent`로 답변을 만듭니다. 답변과 함께 근거 청크
//! (출처 + 내용)를 돌려줍니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::{api_error, get_api_key, EmbeddingProvider};
use crate::knowledge::{SearchResult, VectorStore};

/// Gemini 텍스트 생성 API 엔드포인트
const GEMINI_GENERATE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// 기본 검색 청크 수
pub const DEFAULT_TOP_K: usize = 4;

// ============================================================================
// AnswerGenerator Trait
// ============================================================================

/// 검색된 청크로 답변을 만드는 생성기
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// 질문과 근거 청크로 답변 생성
    async fn generate(&self, question: &str, context: &[SearchResult]) -> Result<String>;

    /// 생성기 이름
    fn name(&self) -> &str;
}

/// 근거 청크를 모두 넣은 프롬프트 구성
pub fn build_prompt(question: &str, context: &[SearchResult]) -> String {
    let mut prompt = String::from(
        "아래 문서 조각만 근거로 마지막 질문에 답하세요.\n\
         답을 모르면 모른다고 말하고, 답을 지어내지 마세요.\n\n",
    );

    for (i, chunk) in context.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] {}\n{}\n\n",
            i + 1,
            chunk.source,
            chunk.chunk_text.trim()
        ));
    }

    prompt.push_str(&format!("질문: {}\n답변:", question.trim()));
    prompt
}

// ============================================================================
// Gemini Answer Generator
// ============================================================================

/// Gemini 기반 답변 생성기
pub struct GeminiAnswer {
    api_key: String,
    client: reqwest::Client,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiAnswer {
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            client,
            temperature: 0.2,
            max_output_tokens: 2048,
        })
    }

    /// 환경변수에서 API 키를 읽어 생성
    pub fn from_env() -> Result<Self> {
        Self::new(get_api_key()?)
    }

    fn build_request(&self, prompt: String) -> GenerateRequest {
        GenerateRequest {
            contents: vec![GenerateContent {
                parts: vec![TextPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }
}

#[async_trait]
impl AnswerGenerator for GeminiAnswer {
    async fn generate(&self, question: &str, context: &[SearchResult]) -> Result<String> {
        let request = self.build_request(build_prompt(question, context));

        let response = self
            .client
            .post(GEMINI_GENERATE_URL)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send generateContent request")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read response body")?;

        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        let answer = parse_answer(&body)?;
        if answer.is_empty() {
            tracing::warn!("Empty answer for question: {}", question);
        }
        Ok(answer)
    }

    fn name(&self) -> &str {
        "gemini-2.0-flash"
    }
}

/// 응답에서 첫 후보의 텍스트를 이어 붙임
fn parse_answer(body: &str) -> Result<String> {
    let response: GenerateResponse =
        serde_json::from_str(body).context("Failed to parse generateContent response")?;

    Ok(response
        .candidates
        .into_iter()
        .next()
        .map(|c| {
            c.content
                .parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
        .trim()
        .to_string())
}

// ============================================================================
// Retrieval QA
// ============================================================================

/// 질문 하나에 대한 결과
#[derive(Debug, Clone)]
pub struct QaResponse {
    /// 생성된 답변 (`sources_only`면 None)
    pub answer: Option<String>,
    /// 근거 청크 (유사도 내림차순)
    pub sources: Vec<SearchResult>,
}

/// 검색 + 답변 생성 조합
pub struct RetrievalQa<'a> {
    embedder: &'a dyn EmbeddingProvider,
    store: &'a dyn VectorStore,
    generator: Option<&'a dyn AnswerGenerator>,
    top_k: usize,
}

impl<'a> RetrievalQa<'a> {
    pub fn new(embedder: &'a dyn EmbeddingProvider, store: &'a dyn VectorStore) -> Self {
        Self {
            embedder,
            store,
            generator: None,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// 답변 생성기 지정 (없으면 검색만 수행)
    pub fn with_generator(mut self, generator: &'a dyn AnswerGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// 질문 처리
    pub async fn ask(&self, question: &str) -> Result<QaResponse> {
        let query = self
            .embedder
            .embed_query(question)
            .await
            .context("Failed to embed question")?;

        let sources = self
            .store
            .search(&query, self.top_k)
            .await
            .context("Failed to search vector store")?;
        tracing::debug!("Retrieved {} chunks", sources.len());

        let answer = match self.generator {
            Some(generator) => Some(generator.generate(question, &sources).await?),
            None => None,
        };

        Ok(QaResponse { answer, sources })
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<GenerateContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GenerateContent {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: GenerateContent,
}

#[derive(Debug, Serialize, Deserialize)]
struct TextPart {
    #[serde(default)]
    text: String,
}

// ============================================================================
// Tests
// ============================================================================
