//! DOCX 텍스트 추출 모듈
//!
//! .docx는 ZIP 컨테이너이며 본문은 `word/document.xml`에 있습니다.
//! 문단(`</w:p>`)은 빈 줄로, 줄바꿈/탭 요소는 해당 문자로 바꾼 뒤
//! 나머지 태그를 제거합니다.

use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::{Captures, Regex};

const DOCUMENT_XML: &str = "word/document.xml";

fn tag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<[^>]+>").unwrap_or_else(|e| unreachable!("static tag regex: {e}"))
    })
}

/// `&amp;`, `&#8217;`, `&#x2019;` 형태의 엔티티
fn entity_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"&(?:#[xX]([0-9a-fA-F]+)|#([0-9]+)|(lt|gt|quot|apos|amp));")
            .unwrap_or_else(|e| unreachable!("static entity regex: {e}"))
    })
}

/// DOCX 파일에서 텍스트 추출
pub fn extract_text_from_docx(path: &Path) -> Result<String> {
    let file =
        std::fs::File::open(path).with_context(|| format!("Failed to open DOCX: {:?}", path))?;

    let mut archive =
        zip::ZipArchive::new(file).with_context(|| format!("Not a valid DOCX archive: {:?}", path))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_XML)
        .with_context(|| format!("Missing {} in {:?}", DOCUMENT_XML, path))?
        .read_to_string(&mut xml)
        .with_context(|| format!("Failed to read {} from {:?}", DOCUMENT_XML, path))?;

    Ok(extract_plaintext_from_docx_xml(&xml))
}

/// document.xml 본문을 평문으로 변환
pub fn extract_plaintext_from_docx_xml(xml: &str) -> String {
    let marked = xml
        .replace("</w:p>", "\n\n")
        .replace("<w:br/>", "\n")
        .replace("<w:cr/>", "\n")
        .replace("<w:tab/>", "\t");

    let stripped = tag_pattern().replace_all(&marked, "");
    let text = unescape_xml(&stripped);

    // 3줄 이상 연속 빈 줄 정리
    let mut result = String::with_capacity(text.len());
    let mut newlines = 0;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines > 2 {
                continue;
            }
        } else {
            newlines = 0;
        }
        result.push(c);
    }

    result.trim().to_string()
}

/// XML 엔티티 해제 (한 번에 치환, 잘못된 코드 포인트는 원문 유지)
fn unescape_xml(s: &str) -> String {
    entity_pattern()
        .replace_all(s, |caps: &Captures| {
            let decoded = if let Some(hex) = caps.get(1) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = caps.get(2) {
                dec.as_str().parse().ok().and_then(char::from_u32)
            } else {
                match &caps[3] {
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    _ => Some('&'),
                }
            };

            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

// ============================================================================
// Tests
// ============================================================================
