//! Vector Store - 벡터 검색 트레이트 및 유틸리티
//!
//! 청크 임베딩을 저장하고 질의 벡터와 가까운 청크를 찾습니다.
//! 청크 ID는 (출처, 오프셋, 텍스트)의 해시라서 같은 코퍼스를 다시 넣어도
//! 같은 행이 만들어집니다.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::chunker::Chunk;

/// 벡터 임베딩 차원 (Gemini gemini-embedding-001 출력 차원)
pub const EMBEDDING_DIMENSION: i32 = 768;

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리 (저장용)
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    /// 청크 ID (내용 해시)
    pub id: String,
    /// 원본 파일 경로
    pub source: String,
    /// 문서 내 청크 시작 위치 (문자 단위)
    pub start_offset: i64,
    /// 청크 텍스트
    pub chunk_text: String,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

impl VectorEntry {
    /// 청크와 임베딩으로 엔트리 생성
    pub fn from_chunk(chunk: &Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: chunk_id(&chunk.metadata.source, chunk.start_offset, &chunk.text),
            source: chunk.metadata.source.clone(),
            start_offset: chunk.start_offset as i64,
            chunk_text: chunk.text.clone(),
            embedding,
        }
    }
}

/// 검색 결과
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// 원본 파일 경로
    pub source: String,
    /// 청크 텍스트
    pub chunk_text: String,
    /// 문서 내 청크 시작 위치
    pub start_offset: i64,
    /// 유사도 스코어 (0.0 ~ 1.0)
    pub similarity: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 벡터 저장소의 공통 인터페이스입니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 벡터 배치 삽입
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize>;

    /// 벡터 검색 (유사도 내림차순)
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// 출처 파일에 저장된 청크 ID 목록
    async fn source_ids(&self, source: &str) -> Result<HashSet<String>>;

    /// ID로 벡터 삭제
    async fn delete_ids(&self, ids: &[String]) -> Result<usize>;

    /// 벡터 개수 조회
    async fn count(&self) -> Result<usize>;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 청크 ID 계산 (SHA-256 hex)
pub fn chunk_id(source: &str, start_offset: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update([0u8]);
    hasher.update(start_offset.to_le_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// Tests
// ============================================================================
