//! Fragment - 검색 단위가 되는 텍스트 조각

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 출처 메타데이터
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentMetadata {
    /// 원본 파일 전체 경로
    pub source: String,
    /// 파일 이름
    pub file_name: String,
    /// 로더가 추가한 키-값 (file_type, chunk_index, page 등)
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl FragmentMetadata {
    pub fn new(source: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            file_name: file_name.into(),
            extra: BTreeMap::new(),
        }
    }

    /// 키-값 추가 (빌더)
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.extra.insert(key.into(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }
}

/// 텍스트 프래그먼트 (생성 후 불변)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub content: String,
    pub metadata: FragmentMetadata,
}

impl Fragment {
    pub fn new(content: impl Into<String>, metadata: FragmentMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// 인용 표시용 라벨 (파일명 + 페이지)
    pub fn citation(&self) -> String {
        match self.metadata.get("page") {
            Some(page) => format!("{} (Page {})", self.metadata.file_name, page),
            None => self.metadata.file_name.clone(),
        }
    }
}
