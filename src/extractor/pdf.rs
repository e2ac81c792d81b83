//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 텍스트를 추출합니다.

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;

/// "--- Page 3 ---" 형태의 페이지 구분 줄
fn page_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[\s]*[-=]+[\s]*(?:Page[\s]*)?(\d+)[\s]*[-=]+[\s]*$")
            .unwrap_or_else(|e| unreachable!("static page marker regex: {e}"))
    })
}

/// PDF에서 텍스트 추출
///
/// 페이지별로 (페이지 번호, 텍스트) 튜플 벡터로 반환합니다.
/// 페이지 번호는 1부터 시작합니다. 텍스트가 없는 PDF(스캔본)는 빈 벡터입니다.
pub fn extract_text_from_pdf(path: &Path) -> Result<Vec<(usize, String)>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(vec![]);
    }

    Ok(split_pdf_pages(&text))
}

/// PDF 텍스트를 (페이지 번호, 텍스트)로 분리
///
/// 빈 페이지는 결과에서 빠지지만 번호는 원래 위치를 유지합니다.
fn split_pdf_pages(text: &str) -> Vec<(usize, String)> {
    // 폼피드 문자 (\x0c)
    if text.contains('\x0c') {
        return number_pages(text.split('\x0c'));
    }

    // 페이지 구분 줄 (첫 구분 줄 앞의 빈 조각은 페이지가 아님)
    let marker = page_marker();
    if marker.is_match(text) {
        let mut segments = marker.split(text).peekable();
        if segments.peek().is_some_and(|s| s.trim().is_empty()) {
            segments.next();
        }

        let pages = number_pages(segments);
        if pages.len() > 1 {
            return pages;
        }
    }

    vec![(1, text.trim().to_string())]
}

fn number_pages<'a>(segments: impl Iterator<Item = &'a str>) -> Vec<(usize, String)> {
    segments
        .enumerate()
        .map(|(i, s)| (i + 1, s.trim().to_string()))
        .filter(|(_, s)| !s.is_empty())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
