//! Text Chunking Module
//!
//! 재귀 계층 분할기를 제공합니다.
//! 문단 → 줄 → 공백 → 문자 순으로 점점 잘게 나누어
//! 모든 청크가 `chunk_size` 문자 이하가 되도록 합니다.
//! 인접 청크는 이전 청크 끝부분을 최대 `chunk_overlap` 문자만큼 공유합니다.
//!
//! 길이는 바이트가 아닌 문자(char) 수 기준입니다.

use std::collections::VecDeque;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::RagError;

/// 분할 구분자 (우선순위 순, 빈 문자열 = 문자 단위)
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// 최대 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 오버랩 크기 (문자 수)
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

impl ChunkConfig {
    /// 설정 검증 (오버랩은 청크 크기보다 작아야 함)
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidConfig("chunk.chunk_size must be at least 1".into()).into());
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "chunk.chunk_overlap ({}) must be smaller than chunk.chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            ))
            .into());
        }
        Ok(())
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// RecursiveChunker
// ============================================================================

/// 재귀 계층 청커
pub struct RecursiveChunker {
    config: ChunkConfig,
}

impl RecursiveChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 생성 (500 / 50)
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// 구분자 목록을 따라 재귀적으로 분할
    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // 텍스트에 존재하는 첫 구분자 선택 ("" 는 항상 매칭)
        let (separator, rest) = match separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(*sep))
        {
            Some(i) => (separators[i], &separators[i + 1..]),
            None => ("", &separators[separators.len()..]),
        };

        let splits: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in splits {
            if char_len(piece) < self.config.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge_splits(&pending, separator));
                pending.clear();
            }

            if rest.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, rest));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge_splits(&pending, separator));
        }

        chunks
    }

    /// 작은 조각들을 `chunk_size` 이하로 병합하고 오버랩 유지
    ///
    /// 청크를 내보낸 뒤 앞쪽 조각을 버리면서 남은 길이가 `chunk_overlap`
    /// 이하가 될 때까지 줄이고, 남은 조각이 다음 청크의 시작이 됩니다.
    fn merge_splits(&self, splits: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };

            if total + len + joiner > size && !window.is_empty() {
                if let Some(chunk) = join_window(&window, separator) {
                    chunks.push(chunk);
                }

                // 오버랩 이하가 되고 다음 조각이 들어갈 때까지 앞쪽 조각 제거
                loop {
                    let joiner = if window.is_empty() { 0 } else { sep_len };
                    let too_long = total > overlap || (total > 0 && total + len + joiner > size);
                    if !too_long {
                        break;
                    }
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    let removed_sep = if window.is_empty() { 0 } else { sep_len };
                    total -= char_len(front) + removed_sep;
                }
            }

            let joiner = if window.is_empty() { 0 } else { sep_len };
            total += len + joiner;
            window.push_back(piece);
        }

        if let Some(chunk) = join_window(&window, separator) {
            chunks.push(chunk);
        }

        chunks
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        // 짧은 텍스트는 원문 그대로 하나의 청크
        if char_len(text) <= self.config.chunk_size {
            return vec![text.to_string()];
        }

        self.split_recursive(text, &SEPARATORS)
    }

    fn name(&self) -> &'static str {
        "RecursiveChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 문자 수
#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// 윈도우 조각을 구분자로 연결 (공백만 남으면 None)
fn join_window(window: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(chunk_size: usize, chunk_overlap: usize) -> RecursiveChunker {
        RecursiveChunker::new(ChunkConfig {
            chunk_size,
            chunk_overlap,
        })
    }

    fn numbered_words(count: usize) -> String {
        (0..count)
            .map(|i| format!("word{:03}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_chunker_empty() {
        let chunker = RecursiveChunker::with_defaults();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("  \n\n ").is_empty());
    }

    #[test]
    fn test_short_text_is_single_identical_chunk() {
        let chunker = RecursiveChunker::with_defaults();
        let text = "# Header\n\nShort paragraph.\nSecond line.";
        let chunks = chunker.chunk(text);
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn test_text_exactly_chunk_size() {
        let chunker = chunker(10, 2);
        let chunks = chunker.chunk("abcdefghij");
        assert_eq!(chunks, vec!["abcdefghij".to_string()]);
    }

    #[test]
    fn test_paragraphs_split_first() {
        let chunker = chunker(40, 0);
        let text = "First paragraph is here.\n\nSecond paragraph is here.";
        let chunks = chunker.chunk(text);
        assert_eq!(
            chunks,
            vec![
                "First paragraph is here.".to_string(),
                "Second paragraph is here.".to_string()
            ]
        );
    }

    #[test]
    fn test_all_chunks_within_size() {
        let chunker = chunker(50, 10);
        let text = format!(
            "{}\n\n{}\nshort line\n\n{}",
            numbered_words(30),
            numbered_words(12),
            "x".repeat(180)
        );
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 3);
        for chunk in &chunks {
            assert!(
                chunk.chars().count() <= 50,
                "chunk too long ({}): {:?}",
                chunk.chars().count(),
                chunk
            );
        }
    }

    #[test]
    fn test_hard_character_split() {
        let chunker = chunker(500, 50);
        let text = "a".repeat(1200);
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 500));
        // 오버랩을 제외한 총 길이가 원문을 덮어야 함
        let total: usize = chunks.iter().map(|c| c.chars().count()).sum();
        assert!(total >= 1200);
    }

    #[test]
    fn test_adjacent_chunks_overlap() {
        let chunker = chunker(60, 15);
        let text = numbered_words(40);
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 1);

        for pair in chunks.windows(2) {
            let prev_words: Vec<&str> = pair[0].split(' ').collect();
            let next_words: Vec<&str> = pair[1].split(' ').collect();

            // 다음 청크의 첫 단어는 이전 청크의 꼬리에 있어야 함
            let first = next_words[0];
            let pos = prev_words
                .iter()
                .position(|w| *w == first)
                .expect("next chunk must start inside the previous chunk's tail");

            let shared = prev_words[pos..].join(" ");
            assert!(pair[1].starts_with(&shared));
            assert!(shared.chars().count() <= 15);
        }
    }

    #[test]
    fn test_chunks_cover_whole_source() {
        let chunker = chunker(45, 10);
        let text = format!("{}\n\n{}", numbered_words(25), numbered_words(7));
        let chunks = chunker.chunk(&text);

        for word in text.split_whitespace() {
            assert!(
                chunks.iter().any(|c| c.split_whitespace().any(|w| w == word)),
                "word {} missing from chunks",
                word
            );
        }
    }

    #[test]
    fn test_no_overlap_when_disabled() {
        let chunker = chunker(20, 0);
        let chunks = chunker.chunk("aaaa bbbb cccc dddd eeee ffff gggg");
        assert_eq!(
            chunks,
            vec!["aaaa bbbb cccc dddd".to_string(), "eeee ffff gggg".to_string()]
        );
    }

    #[test]
    fn test_unicode_counts_chars_not_bytes() {
        let chunker = chunker(10, 0);
        // 한글 12자 = 36 바이트
        let text = "가나다라마바사아자차카타";
        let chunks = chunker.chunk(text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 10);
        assert_eq!(chunks[1], "카타");
    }

    #[test]
    fn test_config_validate() {
        assert!(ChunkConfig::default().validate().is_ok());
        assert!(ChunkConfig {
            chunk_size: 0,
            chunk_overlap: 0
        }
        .validate()
        .is_err());
        assert!(ChunkConfig {
            chunk_size: 100,
            chunk_overlap: 100
        }
        .validate()
        .is_err());
    }
}
