//! Text Chunking Module
//!
//! 문서를 재귀적으로 분할합니다.
//! 빈 줄 → 줄바꿈 → 문장 끝 → 공백 → 문자 순으로 가장 굵은 경계를 먼저 쓰고,
//! 조각을 `chunk_size` 이하로 탐욕적으로 병합하면서 앞 청크의 끝부분을
//! `chunk_overlap` 이하만큼 다음 청크에 겹쳐 넣습니다.
//! 길이는 모두 문자(char) 단위입니다.

use std::collections::VecDeque;
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::IngestError;
use crate::extractor::{Document, DocumentMetadata};

// ============================================================================
// Chunk
// ============================================================================

/// 문서에서 잘라낸 청크
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 청크 텍스트
    pub text: String,
    /// 부모 문서 메타데이터 (그대로 복사)
    pub metadata: DocumentMetadata,
    /// 부모 문서 안에서 첫 문자의 위치 (문자 단위)
    pub start_offset: usize,
    /// 문서 내 청크 순번 (0-based)
    pub chunk_index: usize,
}

// ============================================================================
// Separators
// ============================================================================

/// 분할 경계
#[derive(Debug, Clone)]
pub enum Separator {
    /// 고정 문자열
    Literal(String),
    /// 정규식 (매치 끝에서 자름)
    Pattern(Regex),
    /// 문자 하나하나
    Char,
}

impl Separator {
    /// 기본 경계 목록 (굵은 것부터)
    pub fn defaults() -> Vec<Separator> {
        vec![
            Separator::Literal("\n\n".to_string()),
            Separator::Literal("\n".to_string()),
            Separator::Pattern(sentence_end().clone()),
            Separator::Literal(" ".to_string()),
            Separator::Char,
        ]
    }

    /// 자를 위치 (바이트, 경계 문자열 바로 뒤)
    ///
    /// 텍스트 끝과 같은 위치는 제외합니다.
    fn cut_points(&self, text: &str) -> Vec<usize> {
        let len = text.len();
        let points: Vec<usize> = match self {
            Separator::Literal(sep) if sep.is_empty() => vec![],
            Separator::Literal(sep) => text
                .match_indices(sep.as_str())
                .map(|(i, m)| i + m.len())
                .collect(),
            Separator::Pattern(re) => re.find_iter(text).map(|m| m.end()).collect(),
            Separator::Char => text.char_indices().skip(1).map(|(i, _)| i).collect(),
        };
        points.into_iter().filter(|&p| p > 0 && p < len).collect()
    }
}

fn sentence_end() -> &'static Regex {
    static SENTENCE_END: OnceLock<Regex> = OnceLock::new();
    SENTENCE_END.get_or_init(|| Regex::new(r"[.!?]+\s+").expect("Invalid regex"))
}

// ============================================================================
// Splitter Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// 최대 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 연속 청크 간 최대 겹침 (문자 수)
    pub chunk_overlap: usize,
    /// 분할 경계 (굵은 것부터)
    pub separators: Vec<Separator>,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            separators: Separator::defaults(),
        }
    }
}

impl SplitterConfig {
    /// 크기와 겹침만 지정 (경계는 기본값)
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        }
    }

    /// 설정 범위 검증
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidConfig(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 문서 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 문서를 청크로 분할
    fn split(&self, document: &Document) -> Vec<Chunk>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// RecursiveSplitter
// ============================================================================

/// 재귀 문자 분할기
pub struct RecursiveSplitter {
    config: SplitterConfig,
}

impl RecursiveSplitter {
    /// 설정으로 생성 (검증 포함)
    pub fn new(config: SplitterConfig) -> Result<Self, IngestError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 기본 설정으로 생성 (500 / 50)
    pub fn with_defaults() -> Self {
        Self {
            config: SplitterConfig::default(),
        }
    }

    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// 텍스트를 청크 범위(바이트)로 분할
    pub(crate) fn chunk_spans(&self, text: &str) -> Vec<Range<usize>> {
        if text.trim().is_empty() {
            return vec![];
        }

        let mut pieces = Vec::new();
        self.split_recursive(text, 0, &self.config.separators, &mut pieces);
        self.merge_pieces(text, pieces)
    }

    /// `chunk_size` 이하 조각들로 분해 (연속된 바이트 범위)
    fn split_recursive(
        &self,
        text: &str,
        base: usize,
        separators: &[Separator],
        out: &mut Vec<Range<usize>>,
    ) {
        if text.chars().count() <= self.config.chunk_size {
            out.push(base..base + text.len());
            return;
        }

        // 실제로 텍스트를 자르는 첫 번째 경계 선택
        let found = separators
            .iter()
            .enumerate()
            .map(|(i, sep)| (i, sep.cut_points(text)))
            .find(|(_, points)| !points.is_empty());

        let Some((index, points)) = found else {
            self.hard_split(text, base, out);
            return;
        };

        let finer = &separators[index + 1..];
        let mut start = 0;
        for end in points.into_iter().chain(std::iter::once(text.len())) {
            if end <= start {
                continue;
            }
            let piece = &text[start..end];
            if piece.chars().count() > self.config.chunk_size {
                self.split_recursive(piece, base + start, finer, out);
            } else {
                out.push(base + start..base + end);
            }
            start = end;
        }
    }

    /// 경계가 없으면 `chunk_size` 문자마다 자름
    fn hard_split(&self, text: &str, base: usize, out: &mut Vec<Range<usize>>) {
        let mut start = 0;
        let mut count = 0;
        for (i, _) in text.char_indices() {
            if count == self.config.chunk_size {
                out.push(base + start..base + i);
                start = i;
                count = 0;
            }
            count += 1;
        }
        if start < text.len() {
            out.push(base + start..base + text.len());
        }
    }

    /// 조각을 청크로 병합 (겹침 포함)
    fn merge_pieces(&self, text: &str, pieces: Vec<Range<usize>>) -> Vec<Range<usize>> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let mut current: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = text[piece.clone()].chars().count();

            if total + len > size && !current.is_empty() {
                push_span(&mut chunks, &current);

                // 겹침으로 남길 뒷부분만 유지
                while total > overlap || (total + len > size && total > 0) {
                    match current.pop_front() {
                        Some((_, popped)) => total -= popped,
                        None => break,
                    }
                }
            }

            current.push_back((piece, len));
            total += len;
        }

        push_span(&mut chunks, &current);
        chunks
    }
}

fn push_span(chunks: &mut Vec<Range<usize>>, current: &VecDeque<(Range<usize>, usize)>) {
    if let (Some((first, _)), Some((last, _))) = (current.front(), current.back()) {
        chunks.push(first.start..last.end);
    }
}

impl Chunker for RecursiveSplitter {
    fn split(&self, document: &Document) -> Vec<Chunk> {
        let content = &document.content;
        let mut chunks = Vec::new();

        // 청크 시작 위치는 단조 증가하므로 문자 오프셋을 누적 계산
        let mut byte_cursor = 0;
        let mut char_cursor = 0;

        for span in self.chunk_spans(content) {
            char_cursor += content[byte_cursor..span.start].chars().count();
            byte_cursor = span.start;

            let text = &content[span];
            chunks.push(Chunk {
                text: text.to_string(),
                metadata: document.metadata.clone(),
                start_offset: char_cursor,
                chunk_index: chunks.len(),
            });
        }

        chunks
    }

    fn name(&self) -> &'static str {
        "RecursiveSplitter"
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(RecursiveSplitter::with_defaults())
}

/// 재귀 청커 생성 (설정 지정)
pub fn recursive_chunker(config: SplitterConfig) -> Result<Box<dyn Chunker>, IngestError> {
    Ok(Box::new(RecursiveSplitter::new(config)?))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::FileFormat;
    use std::path::Path;

    fn doc(content: &str) -> Document {
        Document::new(Path::new("/docs/sample.md"), FileFormat::Text, content.to_string())
    }

    fn splitter(size: usize, overlap: usize) -> RecursiveSplitter {
        RecursiveSplitter::new(SplitterConfig::new(size, overlap)).unwrap()
    }

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    /// 크기 제한, 겹침 제한, 연속성, 전체 커버리지 확인
    fn assert_invariants(content: &str, chunks: &[Chunk], size: usize, overlap: usize) {
        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].start_offset, 0);

        for (i, chunk) in chunks.iter().enumerate() {
            let len = chunk.text.chars().count();
            assert!(len <= size, "chunk {} has {} chars", i, len);
            assert_eq!(chunk.chunk_index, i);

            let expected: String = content.chars().skip(chunk.start_offset).take(len).collect();
            assert_eq!(expected, chunk.text);
        }

        for pair in chunks.windows(2) {
            let prev_end = pair[0].start_offset + pair[0].text.chars().count();
            assert!(pair[1].start_offset > pair[0].start_offset);
            assert!(pair[1].start_offset <= prev_end, "gap between chunks");
            assert!(prev_end - pair[1].start_offset <= overlap, "overlap too large");
        }

        let last = &chunks[chunks.len() - 1];
        assert_eq!(
            last.start_offset + last.text.chars().count(),
            content.chars().count()
        );
    }

    #[test]
    fn test_default_config() {
        let config = SplitterConfig::default();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.separators.len(), 5);
        assert_eq!(default_chunker().name(), "RecursiveSplitter");
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            RecursiveSplitter::new(SplitterConfig::new(0, 0)),
            Err(IngestError::InvalidConfig(_))
        ));
        assert!(matches!(
            recursive_chunker(SplitterConfig::new(500, 500)),
            Err(IngestError::InvalidConfig(_))
        ));
        assert!(RecursiveSplitter::new(SplitterConfig::new(500, 499)).is_ok());
    }

    #[test]
    fn test_empty_and_whitespace_yield_nothing() {
        let splitter = RecursiveSplitter::with_defaults();
        assert!(splitter.split(&doc("")).is_empty());
        assert!(splitter.split(&doc(" \n\n\t \n")).is_empty());
    }

    #[test]
    fn test_blank_runs_stay_covered() {
        let content = format!("alpha\n\n{}omega", "\n".repeat(25));
        let chunks = splitter(10, 0).split(&doc(&content));

        assert_invariants(&content, &chunks, 10, 0);
        assert!(chunks.iter().any(|c| c.text.trim().is_empty()));
        assert!(chunks[chunks.len() - 1].text.ends_with("omega"));
    }

    #[test]
    fn test_small_document_is_single_chunk() {
        let chunks = RecursiveSplitter::with_defaults().split(&doc("# Title\n\nShort body."));
        assert_eq!(texts(&chunks), vec!["# Title\n\nShort body."]);
        assert_eq!(chunks[0].start_offset, 0);
    }

    #[test]
    fn test_1200_chars_at_500_50() {
        let content: String = "The quick brown fox jumps over the lazy dog. "
            .repeat(30)
            .chars()
            .take(1200)
            .collect();
        assert_eq!(content.chars().count(), 1200);

        let chunks = splitter(500, 50).split(&doc(&content));
        assert!(chunks.len() >= 3);
        assert_invariants(&content, &chunks, 500, 50);
    }

    #[test]
    fn test_paragraphs_preferred_over_lines() {
        let content = "para one.\n\npara two.";
        let chunks = splitter(12, 0).split(&doc(content));
        assert_eq!(texts(&chunks), vec!["para one.\n\n", "para two."]);
        assert_eq!(chunks[1].start_offset, 11);
    }

    #[test]
    fn test_sentence_boundaries() {
        let content = "One. Two! Three? Four.";
        let chunks = splitter(10, 0).split(&doc(content));
        assert_eq!(texts(&chunks), vec!["One. Two! ", "Three? ", "Four."]);
        assert_invariants(content, &chunks, 10, 0);
    }

    #[test]
    fn test_long_word_falls_back_to_chars() {
        let content = "a".repeat(25);
        let chunks = splitter(10, 3).split(&doc(&content));
        assert_invariants(&content, &chunks, 10, 3);
        assert_eq!(chunks[1].start_offset, 7);
    }

    #[test]
    fn test_multibyte_offsets_are_chars() {
        let content = "가나다 라마바 사아자 차카타";
        let chunks = splitter(8, 0).split(&doc(content));
        assert_eq!(texts(&chunks), vec!["가나다 라마바 ", "사아자 차카타"]);
        assert_eq!(chunks[1].start_offset, 8);
        assert_invariants(content, &chunks, 8, 0);
    }

    #[test]
    fn test_metadata_copied_to_every_chunk() {
        let document = doc(&"Lorem ipsum dolor sit amet. ".repeat(40));
        let chunks = splitter(100, 20).split(&document);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.metadata == document.metadata));
        assert_invariants(&document.content, &chunks, 100, 20);
    }

    #[test]
    fn test_mixed_structure_keeps_invariants() {
        let mut content = String::new();
        for i in 0..12 {
            content.push_str(&format!("## Section {}\n", i));
            content.push_str(&"Sentence with several words in it. ".repeat(i + 1));
            content.push_str("\n\n");
        }
        content.push_str(&"x".repeat(300));

        let chunks = splitter(120, 30).split(&doc(&content));
        assert_invariants(&content, &chunks, 120, 30);
    }

    #[test]
    fn test_hard_split_without_separators() {
        let config = SplitterConfig {
            chunk_size: 4,
            chunk_overlap: 0,
            separators: vec![Separator::Literal("|".to_string())],
        };
        let chunks = RecursiveSplitter::new(config).unwrap().split(&doc("abcdefghij"));
        assert_eq!(texts(&chunks), vec!["abcd", "efgh", "ij"]);
    }
}
