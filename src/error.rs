//! 수집 파이프라인 에러 타입
//!
//! 파일 단위 에러(`Parse`, `UnsupportedFormat` 등)는 파이프라인이 기록 후
//! 건너뛰고, 루트 경로 에러는 실행 전체를 중단합니다.

use std::path::{Path, PathBuf};

/// 로더/파서/청커 공통 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// 등록된 파서가 없는 확장자
    #[error("unsupported format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    /// 확장자는 맞지만 내용이 손상되었거나 디코딩 불가
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// 경로 없음 / 읽기 실패
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 최대 파일 크기 초과
    #[error("file too large: {} ({size} bytes, limit {limit})", path.display())]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    /// 같은 확장자를 두 파서가 등록하려 함
    #[error("extension already registered: {extension}")]
    DuplicateExtension { extension: String },

    /// 잘못된 청킹 설정
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl IngestError {
    pub(crate) fn parse(path: &Path, message: impl ToString) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.to_path_buf(),
            source,
        }
    }

    /// 배치를 중단하지 않고 해당 파일만 건너뛰어야 하는 에러인지
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. }
                | Self::UnsupportedFormat { .. }
                | Self::FileTooLarge { .. }
                | Self::Filesystem { .. }
        )
    }

    /// 에러가 가리키는 파일 경로
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::UnsupportedFormat { path }
            | Self::Parse { path, .. }
            | Self::Filesystem { path, .. }
            | Self::FileTooLarge { path, .. } => Some(path),
            Self::DuplicateExtension { .. } | Self::InvalidConfig(_) => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
