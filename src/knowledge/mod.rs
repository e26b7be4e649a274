//! Knowledge 모듈 - 청킹 및 벡터 저장소
//!
//! - Chunker: 재귀 문자 분할 (빈 줄 → 줄 → 문장 → 단어 → 문자)
//! - LanceDB: 청크 임베딩 저장 + 벡터 검색 (ANN)

mod chunker;
mod lance;
mod vector;

use std::path::PathBuf;

// Re-exports
pub use chunker::{
    default_chunker, recursive_chunker, Chunk, Chunker, RecursiveSplitter, Separator,
    SplitterConfig,
};
pub use lance::LanceVectorStore;
pub use vector::{chunk_id, SearchResult, VectorEntry, VectorStore, EMBEDDING_DIMENSION};

/// 데이터 디렉토리 경로
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".privdoc-rag")
}

/// 기본 벡터 저장소 경로
pub fn default_persist_dir() -> PathBuf {
    get_data_dir().join("vectors.lance")
}
