//! privdoc-rag - 로컬 문서 RAG 시스템
//!
//! 폴더 안의 텍스트, 코드, PDF, CSV, INI/ENV, YAML 문서를 읽어
//! 재귀적으로 청킹한 뒤 Gemini 임베딩과 함께 LanceDB에 저장하고,
//! 저장된 청크를 근거로 질문에 답합니다.

pub mod answer;
pub mod cli;
pub mod collector;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod knowledge;
pub mod pipeline;

// Re-exports
pub use answer::{AnswerGenerator, GeminiAnswer, QaResponse, RetrievalQa};
pub use collector::{
    CollectedFile, CollectionStats, CollectorConfig, DocumentIter, FileFormat, LoaderRegistry,
    SourceSet,
};
pub use embedding::{create_embedder, get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding};
pub use error::IngestError;
pub use extractor::{Document, DocumentMetadata, FormatParser};
pub use knowledge::{
    default_chunker, get_data_dir, recursive_chunker, Chunk, Chunker, LanceVectorStore,
    RecursiveSplitter, SearchResult, SplitterConfig, VectorEntry, VectorStore,
};
pub use pipeline::{persist, IngestFailure, IngestOutput, IngestPipeline, IngestReport};
