//! 파일 수집 모듈
//!
//! 문서 디렉토리를 재귀 탐색하여 지원하는 확장자(pdf, txt, md, docx)의
//! 파일만 수집합니다. 그 외 확장자는 오류 없이 건너뜁니다.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use serde::Serialize;

// ============================================================================
// Document Kinds
// ============================================================================

/// 지원하는 문서 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DocumentKind {
    /// PDF (pdf-extract)
    Pdf,
    /// 일반 텍스트 (UTF-8)
    Text,
    /// 마크다운 (텍스트로 읽음)
    Markdown,
    /// Word 문서 (.docx)
    Word,
}

impl DocumentKind {
    /// 지원 문서 종류 전체
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Pdf,
        DocumentKind::Text,
        DocumentKind::Markdown,
        DocumentKind::Word,
    ];

    /// 확장자로 문서 종류 결정 (대소문자 무시, 지원하지 않으면 None)
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.extension().eq_ignore_ascii_case(ext))
    }

    /// 지원 확장자 목록 (".pdf .txt .md .docx")
    pub fn supported_extensions() -> String {
        Self::ALL
            .iter()
            .map(|kind| format!(".{}", kind.extension()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 파일 경로에서 종류 결정
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// 정규화된 확장자
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Text => "txt",
            DocumentKind::Markdown => "md",
            DocumentKind::Word => "docx",
        }
    }

}

// ============================================================================
// Collected File
// ============================================================================

/// 수집된 파일 정보
#[derive(Debug, Clone)]
pub struct CollectedFile {
    /// 파일 경로
    pub path: PathBuf,
    /// 문서 종류
    pub kind: DocumentKind,
    /// 파일 크기 (바이트)
    pub size: u64,
}

impl CollectedFile {
    /// 파일에서 CollectedFile 생성
    pub fn from_path(path: PathBuf) -> Result<Option<Self>> {
        let kind = match DocumentKind::from_path(&path) {
            Some(kind) => kind,
            None => return Ok(None), // 지원하지 않는 확장자
        };

        let metadata = std::fs::metadata(&path)
            .with_context(|| format!("Failed to read metadata: {:?}", path))?;

        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(Self {
            path,
            kind,
            size: metadata.len(),
        }))
    }

    /// 파일 이름 (표시용)
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    }
}

// ============================================================================
// File Collector
// ============================================================================

/// 파일 수집기
///
/// 숨김 파일과 .gitignore 대상도 모두 수집합니다.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileCollector;

impl FileCollector {
    pub fn new() -> Self {
        Self
    }

    /// 폴더 재귀 수집 (경로 순 정렬)
    pub fn collect_directory(&self, path: &Path) -> Result<Vec<CollectedFile>> {
        if !path.exists() {
            anyhow::bail!("Directory not found: {:?}", path);
        }

        if !path.is_dir() {
            anyhow::bail!("Not a directory: {:?}", path);
        }

        let mut files = Vec::new();

        let walker = WalkBuilder::new(path)
            .hidden(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .ignore(false)
            .parents(false)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            let file_path = entry.path().to_path_buf();

            match CollectedFile::from_path(file_path) {
                Ok(Some(file)) => files.push(file),
                Ok(None) => {
                    tracing::debug!("Skipping unsupported file: {:?}", entry.path());
                }
                Err(e) => {
                    tracing::warn!("Failed to collect file: {}", e);
                }
            }
        }

        // 결정적 처리 순서
        files.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::info!("Collected {} files from {:?}", files.len(), path);
        Ok(files)
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// 문서 디렉토리 통계
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentStats {
    pub file_count: usize,
    pub total_bytes: u64,
    /// 확장자별 파일 수 (".pdf" 형식 키)
    pub counts_by_extension: BTreeMap<String, usize>,
}

impl DocumentStats {
    /// 수집된 파일 목록에서 통계 계산
    pub fn from_files(files: &[CollectedFile]) -> Self {
        let mut stats = Self::default();

        for file in files {
            stats.file_count += 1;
            stats.total_bytes += file.size;
            *stats
                .counts_by_extension
                .entry(format!(".{}", file.kind.extension()))
                .or_insert(0) += 1;
        }

        stats
    }

    /// 총 크기 (MB)
    pub fn size_in_mb(&self) -> f64 {
        self.total_bytes as f64 / (1024.0 * 1024.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(DocumentKind::from_extension("md"), Some(DocumentKind::Markdown));
        assert_eq!(DocumentKind::from_extension("PDF"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_extension("Docx"), Some(DocumentKind::Word));
        assert_eq!(DocumentKind::from_extension("txt"), Some(DocumentKind::Text));
        assert_eq!(DocumentKind::from_extension("rs"), None);
        assert_eq!(DocumentKind::from_extension("doc"), None);
    }

    #[test]
    fn test_collect_directory_recursive_and_filtered() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("one.txt"), "one").unwrap();
        std::fs::write(nested.join("two.md"), "# two").unwrap();
        std::fs::write(nested.join("image.png"), [0u8; 4]).unwrap();
        std::fs::write(dir.path().join("script.py"), "print()").unwrap();

        let files = FileCollector::new()
            .collect_directory(dir.path())
            .unwrap();

        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|f| f.kind == DocumentKind::Text));
        assert!(files.iter().any(|f| f.kind == DocumentKind::Markdown));
    }

    #[test]
    fn test_supported_extensions() {
        assert_eq!(DocumentKind::supported_extensions(), ".pdf .txt .md .docx");
        for kind in DocumentKind::ALL {
            assert_eq!(DocumentKind::from_extension(kind.extension()), Some(kind));
        }
    }

    #[test]
    fn test_collect_includes_hidden_and_ignored_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "ignored.txt\n").unwrap();
        std::fs::write(dir.path().join("ignored.txt"), "ignored").unwrap();
        std::fs::write(dir.path().join(".hidden.md"), "hidden").unwrap();

        let files = FileCollector::new().collect_directory(dir.path()).unwrap();

        let names: Vec<String> = files.iter().map(|f| f.file_name()).collect();
        assert_eq!(names, vec![".hidden.md", "ignored.txt"]);
    }

    #[test]
    fn test_collect_missing_directory_errors() {
        let result = FileCollector::new().collect_directory(Path::new("/nonexistent/dir"));
        assert!(result.is_err());
    }

    #[test]
    fn test_stats_from_files() {
        let files = vec![
            CollectedFile {
                path: PathBuf::from("a.txt"),
                kind: DocumentKind::Text,
                size: 1024 * 1024,
            },
            CollectedFile {
                path: PathBuf::from("b.txt"),
                kind: DocumentKind::Text,
                size: 1024 * 1024,
            },
            CollectedFile {
                path: PathBuf::from("c.pdf"),
                kind: DocumentKind::Pdf,
                size: 0,
            },
        ];

        let stats = DocumentStats::from_files(&files);
        assert_eq!(stats.file_count, 3);
        assert_eq!(stats.counts_by_extension.get(".txt"), Some(&2));
        assert_eq!(stats.counts_by_extension.get(".pdf"), Some(&1));
        assert!((stats.size_in_mb() - 2.0).abs() < 1e-9);
    }
}
