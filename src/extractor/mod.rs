//! 콘텐츠 추출 모듈
//!
//! 문서 종류별로 텍스트를 추출합니다.
//! - 텍스트/마크다운: UTF-8로 직접 읽기
//! - PDF: pdf-extract로 페이지별 추출
//! - Word(.docx): word/document.xml에서 본문 추출

pub mod docx;
pub mod pdf;

use std::path::Path;

use anyhow::{Context, Result};

use crate::collector::DocumentKind;

// ============================================================================
// Extracted Content
// ============================================================================

/// 추출된 콘텐츠
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    /// 추출된 텍스트
    pub text: String,
    /// 원본 문서 종류
    pub kind: DocumentKind,
    /// 메타데이터 (PDF 페이지 번호 등)
    pub metadata: ContentMetadata,
}

/// 콘텐츠 메타데이터
#[derive(Debug, Clone, Default)]
pub struct ContentMetadata {
    /// PDF 페이지 번호 (1부터 시작)
    pub page_number: Option<usize>,
    /// 총 페이지 수 (PDF)
    pub total_pages: Option<usize>,
}

// ============================================================================
// Content Extractor
// ============================================================================

/// 콘텐츠 추출기
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 파일에서 콘텐츠 추출
    pub async fn extract(&self, path: &Path, kind: DocumentKind) -> Result<Vec<ExtractedContent>> {
        match kind {
            DocumentKind::Text | DocumentKind::Markdown => self.extract_text(path, kind).await,
            DocumentKind::Pdf => self.extract_pdf(path).await,
            DocumentKind::Word => self.extract_docx(path).await,
        }
    }

    /// 텍스트 파일에서 추출 (UTF-8 고정, 잘못된 인코딩은 에러)
    async fn extract_text(&self, path: &Path, kind: DocumentKind) -> Result<Vec<ExtractedContent>> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read text file: {:?}", path))?;

        Ok(vec![ExtractedContent {
            text,
            kind,
            metadata: ContentMetadata::default(),
        }])
    }

    /// PDF 파일에서 추출
    async fn extract_pdf(&self, path: &Path) -> Result<Vec<ExtractedContent>> {
        // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
        let path = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&path))
            .await
            .context("PDF extraction task failed")??;

        // 마지막 페이지 번호 (빈 페이지 포함)
        let total_pages = pages.last().map(|(page_num, _)| *page_num);

        Ok(pages
            .into_iter()
            .map(|(page_num, text)| ExtractedContent {
                text,
                kind: DocumentKind::Pdf,
                metadata: ContentMetadata {
                    page_number: Some(page_num),
                    total_pages,
                },
            })
            .collect())
    }

    /// DOCX 파일에서 추출
    async fn extract_docx(&self, path: &Path) -> Result<Vec<ExtractedContent>> {
        let path = path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || docx::extract_text_from_docx(&path))
            .await
            .context("DOCX extraction task failed")??;

        Ok(vec![ExtractedContent {
            text,
            kind: DocumentKind::Word,
            metadata: ContentMetadata::default(),
        }])
    }
}

// ============================================================================
// Tests
// ============================================================================
