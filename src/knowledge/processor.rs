//! Document Processor - 문서 디렉토리 → 프래그먼트
//!
//! 수집(collector) → 추출(extractor) → 분할(chunker) 파이프라인입니다.
//! 파일 하나의 실패는 로그만 남기고 나머지 파일은 계속 처리합니다.

use std::path::Path;

use crate::collector::{CollectedFile, DocumentStats, FileCollector};
use crate::extractor::ContentExtractor;

use super::chunker::{ChunkConfig, Chunker, RecursiveChunker};
use super::fragment::{Fragment, FragmentMetadata};

/// 문서 처리기
pub struct DocumentProcessor {
    collector: FileCollector,
    extractor: ContentExtractor,
    chunker: RecursiveChunker,
}

impl DocumentProcessor {
    pub fn new(chunk_config: ChunkConfig) -> Self {
        Self {
            collector: FileCollector::new(),
            extractor: ContentExtractor::new(),
            chunker: RecursiveChunker::new(chunk_config),
        }
    }

    /// 디렉토리의 모든 지원 문서를 프래그먼트로 변환
    ///
    /// 디렉토리가 없거나 비어 있으면 경고 후 빈 결과를 반환합니다.
    pub async fn process_documents(&self, directory: &Path) -> Vec<Fragment> {
        let files = match self.collect(directory) {
            Some(files) => files,
            None => return vec![],
        };

        if files.is_empty() {
            tracing::warn!("No supported documents found in {:?}", directory);
            return vec![];
        }

        let mut fragments = Vec::new();
        let mut failed = 0;

        for file in &files {
            match self.process_file(file).await {
                Ok(mut file_fragments) => {
                    tracing::debug!(
                        "{} -> {} fragments",
                        file.file_name(),
                        file_fragments.len()
                    );
                    fragments.append(&mut file_fragments);
                }
                Err(e) => {
                    failed += 1;
                    tracing::error!("Failed to load {:?}: {:#}", file.path, e);
                }
            }
        }

        tracing::info!(
            "Processed {} files ({} failed) into {} fragments ({})",
            files.len(),
            failed,
            fragments.len(),
            self.chunker.name()
        );
        fragments
    }

    /// 문서 디렉토리 통계 (분할 없음)
    pub fn document_stats(&self, directory: &Path) -> DocumentStats {
        self.collect(directory)
            .map(|files| DocumentStats::from_files(&files))
            .unwrap_or_default()
    }

    fn collect(&self, directory: &Path) -> Option<Vec<CollectedFile>> {
        if !directory.is_dir() {
            tracing::warn!("Documents directory not found: {:?}", directory);
            return None;
        }

        match self.collector.collect_directory(directory) {
            Ok(files) => Some(files),
            Err(e) => {
                tracing::warn!("Failed to scan {:?}: {:#}", directory, e);
                None
            }
        }
    }

    /// 파일 하나를 프래그먼트로 변환
    async fn process_file(&self, file: &CollectedFile) -> anyhow::Result<Vec<Fragment>> {
        let contents = self.extractor.extract(&file.path, file.kind).await?;

        let source = file.path.to_string_lossy().to_string();
        let file_name = file.file_name();
        let mut fragments = Vec::new();

        for content in contents {
            for (chunk_index, chunk) in self.chunker.chunk(&content.text).into_iter().enumerate() {
                let mut metadata = FragmentMetadata::new(&source, &file_name)
                    .with("file_type", file.kind.extension())
                    .with("chunk_index", chunk_index);

                if let Some(page) = content.metadata.page_number {
                    metadata = metadata.with("page", page);
                }
                if let Some(total) = content.metadata.total_pages {
                    metadata = metadata.with("total_pages", total);
                }

                fragments.push(Fragment::new(chunk, metadata));
            }
        }

        Ok(fragments)
    }
}

// ============================================================================
// Tests
// ============================================================================
