//! LanceDB Vector Store - 영속 임베딩 컬렉션
//!
//! 컬렉션 하나가 LanceDB 테이블 하나입니다. 인덱스를 만들지 않으므로
//! 검색은 전수(flat) L2 검색이며 결과가 결정적입니다.
//! ref: https://lancedb.github.io/lancedb/

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use super::fragment::{Fragment, FragmentMetadata};
use super::vector::{EmbeddingRecord, ScoredFragment, VectorStore};

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
pub struct LanceVectorStore {
    db: Connection,
    collection: String,
}

impl std::fmt::Debug for LanceVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceVectorStore")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - 인덱스 디렉토리 (없으면 생성)
    /// * `collection` - 테이블 이름
    pub async fn open(path: &Path, collection: &str) -> Result<Self> {
        if !path.exists() {
            tokio::fs::create_dir_all(path)
                .await
                .with_context(|| format!("Failed to create index directory: {:?}", path))?;
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self {
            db,
            collection: collection.to_string(),
        })
    }

    /// 컬렉션 스키마
    fn create_schema(dimension: i32) -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("file_name", DataType::Utf8, false),
            // FragmentMetadata::extra (JSON)
            Field::new("metadata", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension,
                ),
                false,
            ),
        ])
    }

    /// 레코드들을 Arrow RecordBatch로 변환
    fn records_to_batch(records: &[EmbeddingRecord], dimension: usize) -> Result<RecordBatch> {
        if records.is_empty() {
            anyhow::bail!("Cannot create batch from empty records");
        }

        if let Some(bad) = records.iter().find(|r| r.embedding.len() != dimension) {
            anyhow::bail!(
                "Record {} has dimension {}, expected {}",
                bad.id,
                bad.embedding.len(),
                dimension
            );
        }

        let dimension = i32::try_from(dimension).context("Embedding dimension too large")?;

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let contents: Vec<&str> = records.iter().map(|r| r.fragment.content.as_str()).collect();
        let sources: Vec<&str> = records
            .iter()
            .map(|r| r.fragment.metadata.source.as_str())
            .collect();
        let file_names: Vec<&str> = records
            .iter()
            .map(|r| r.fragment.metadata.file_name.as_str())
            .collect();
        let metadata = records
            .iter()
            .map(|r| serde_json::to_string(&r.fragment.metadata.extra))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to serialize fragment metadata")?;

        let embeddings_flat: Vec<f32> = records
            .iter()
            .flat_map(|r| r.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            dimension,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        let batch = RecordBatch::try_new(
            Arc::new(Self::create_schema(dimension)),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(contents)),
                Arc::new(StringArray::from(sources)),
                Arc::new(StringArray::from(file_names)),
                Arc::new(StringArray::from(metadata)),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok(batch)
    }

    /// 검색 결과 배치를 (id, ScoredFragment)로 변환
    fn batch_to_results(batch: &RecordBatch) -> Result<Vec<(String, ScoredFragment)>> {
        let ids = string_column(batch, "id")?;
        let contents = string_column(batch, "content")?;
        let sources = string_column(batch, "source")?;
        let file_names = string_column(batch, "file_name")?;
        let metadata = string_column(batch, "metadata")?;

        // _distance 컬럼 (LanceDB가 자동 추가)
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

        let mut results = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            let extra: BTreeMap<String, String> = serde_json::from_str(metadata.value(i))
                .context("Failed to parse stored fragment metadata")?;

            let fragment = Fragment::new(
                contents.value(i),
                FragmentMetadata {
                    source: sources.value(i).to_string(),
                    file_name: file_names.value(i).to_string(),
                    extra,
                },
            );

            results.push((
                ids.value(i).to_string(),
                ScoredFragment {
                    fragment,
                    score: distances.value(i),
                },
            ));
        }

        Ok(results)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> Result<bool> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .context("Failed to list LanceDB tables")?;
        Ok(names.iter().any(|n| n == &self.collection))
    }

    async fn open_table(&self) -> Result<lancedb::table::Table> {
        self.db
            .open_table(&self.collection)
            .execute()
            .await
            .with_context(|| format!("Failed to open collection {}", self.collection))
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    fn collection_name(&self) -> &str {
        &self.collection
    }

    async fn exists(&self) -> Result<bool> {
        self.table_exists().await
    }

    async fn create(&self, records: &[EmbeddingRecord], dimension: usize) -> Result<usize> {
        let batch = Self::records_to_batch(records, dimension)?;
        let schema = batch.schema();

        if self.table_exists().await? {
            tracing::info!("Replacing existing collection: {}", self.collection);
            self.db
                .drop_table(&self.collection)
                .await
                .context("Failed to drop existing collection")?;
        }

        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
        self.db
            .create_table(&self.collection, batches)
            .execute()
            .await
            .context("Failed to create collection")?;

        Ok(records.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<ScoredFragment>> {
        if limit == 0 || !self.table_exists().await? {
            return Ok(vec![]);
        }

        let table = self.open_table().await?;

        let stream = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = stream.try_collect().await?;

        let mut results = Vec::new();
        for batch in &batches {
            results.extend(Self::batch_to_results(batch)?);
        }

        // 동점은 id로 정렬해 순서를 고정
        results.sort_by(|(id_a, a), (id_b, b)| {
            a.score.total_cmp(&b.score).then_with(|| id_a.cmp(id_b))
        });
        results.truncate(limit);

        Ok(results.into_iter().map(|(_, r)| r).collect())
    }

    async fn drop_collection(&self) -> Result<bool> {
        if !self.table_exists().await? {
            return Ok(false);
        }

        self.db
            .drop_table(&self.collection)
            .await
            .context("Failed to drop collection")?;
        Ok(true)
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let count = table.count_rows(None).await.context("Failed to count rows")?;
        Ok(count)
    }

    async fn dimension(&self) -> Result<Option<usize>> {
        if !self.table_exists().await? {
            return Ok(None);
        }

        let table = self.open_table().await?;
        let schema = table.schema().await.context("Failed to read collection schema")?;

        let dimension = match schema.field_with_name("embedding").map(|f| f.data_type()) {
            Ok(DataType::FixedSizeList(_, size)) => usize::try_from(*size).ok(),
            _ => None,
        };

        dimension
            .map(Some)
            .ok_or_else(|| anyhow::anyhow!("Collection {} has no embedding column", self.collection))
    }
}

// ============================================================================
// Tests
// ============================================================================
