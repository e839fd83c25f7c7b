//! In-memory search index.
//!
//! Backs tests and local runs with the same contract as the REST provider:
//! cosine-ranked vector search with pre-filtering.

use super::{cosine_similarity, filter, IndexSchema, SearchHit, SearchProvider, SearchRequest};
use crate::error::{GlimtError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

struct StoredDocument {
    embedding: Option<Vec<f32>>,
    fields: serde_json::Map<String, Value>,
}

/// In-memory implementation of [`SearchProvider`].
#[derive(Default)]
pub struct MemorySearchIndex {
    indexes: RwLock<HashMap<String, Vec<StoredDocument>>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document; `fields` must be a JSON object.
    pub async fn insert(
        &self,
        index_name: &str,
        embedding: Option<Vec<f32>>,
        fields: Value,
    ) -> Result<()> {
        let fields = fields
            .as_object()
            .cloned()
            .ok_or_else(|| GlimtError::Search("Document must be a JSON object".to_string()))?;

        self.indexes
            .write()
            .await
            .entry(index_name.to_string())
            .or_default()
            .push(StoredDocument { embedding, fields });
        Ok(())
    }
}

#[async_trait]
impl SearchProvider for MemorySearchIndex {
    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchHit>> {
        let indexes = self.indexes.read().await;
        let documents = indexes
            .get(&request.index_name)
            .ok_or_else(|| GlimtError::Search(format!("Unknown index '{}'", request.index_name)))?;

        let mut hits = Vec::new();
        for document in documents {
            if let Some(filter_expr) = &request.filter {
                if !filter::matches(filter_expr, &document.fields)? {
                    continue;
                }
            }

            let score = match (&request.vector, &document.embedding) {
                (Some(vector), Some(embedding)) => {
                    cosine_similarity(&vector.embedding, embedding)
                }
                _ => match &request.query_text {
                    Some(text) => {
                        let needle = text.to_lowercase();
                        let haystack = document
                            .fields
                            .values()
                            .filter_map(Value::as_str)
                            .collect::<Vec<_>>()
                            .join(" ")
                            .to_lowercase();
                        if haystack.contains(&needle) {
                            1.0
                        } else {
                            0.0
                        }
                    }
                    None => 1.0,
                },
            };

            let fields = if request.select.is_empty() {
                document.fields.clone()
            } else {
                document
                    .fields
                    .iter()
                    .filter(|(key, _)| request.select.iter().any(|s| s == *key))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            };

            hits.push(SearchHit { score, fields });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(request.top);
        Ok(hits)
    }

    async fn index_exists(&self, index_name: &str) -> Result<bool> {
        Ok(self.indexes.read().await.contains_key(index_name))
    }

    async fn create_index(&self, schema: &IndexSchema) -> Result<()> {
        self.indexes
            .write()
            .await
            .entry(schema.name.clone())
            .or_default();
        Ok(())
    }

    async fn delete_index(&self, index_name: &str) -> Result<()> {
        self.indexes.write().await.remove(index_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_vector_ranking_and_filter() {
        let index = MemorySearchIndex::new();
        index
            .insert(
                "videos",
                Some(vec![1.0, 0.0]),
                json!({"video_id": "a", "content": "farming"}),
            )
            .await
            .unwrap();
        index
            .insert(
                "videos",
                Some(vec![0.0, 1.0]),
                json!({"video_id": "b", "content": "cooking"}),
            )
            .await
            .unwrap();

        let hits = index
            .search(SearchRequest::vector(
                "videos",
                vec![0.9, 0.1],
                "embeddings",
                2,
            ))
            .await
            .unwrap();
        assert_eq!(hits[0].get_str("video_id"), Some("a"));
        assert!(hits[0].score > hits[1].score);

        let filtered = index
            .search(
                SearchRequest::vector("videos", vec![0.9, 0.1], "embeddings", 2)
                    .with_filter(Some("video_id eq 'b'".to_string())),
            )
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].get_str("video_id"), Some("b"));
    }

    #[tokio::test]
    async fn test_select_projects_fields() {
        let index = MemorySearchIndex::new();
        index
            .insert(
                "videos",
                None,
                json!({"video_id": "a", "content": "farming", "url": "u"}),
            )
            .await
            .unwrap();

        let hits = index
            .search(
                SearchRequest {
                    index_name: "videos".to_string(),
                    query_text: Some("farming".to_string()),
                    vector: None,
                    top: 5,
                    filter: None,
                    select: vec!["video_id".to_string()],
                },
            )
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].fields.len(), 1);
        assert_eq!(hits[0].get_str("video_id"), Some("a"));
    }

    #[tokio::test]
    async fn test_unknown_index_errors() {
        let index = MemorySearchIndex::new();
        let err = index
            .search(SearchRequest::vector("missing", vec![1.0], "embeddings", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, GlimtError::Search(_)));
    }

    #[tokio::test]
    async fn test_index_lifecycle() {
        let index = MemorySearchIndex::new();
        assert!(!index.index_exists("videos").await.unwrap());

        index
            .create_index(&IndexSchema {
                name: "videos".to_string(),
                definition: json!({}),
            })
            .await
            .unwrap();
        assert!(index.index_exists("videos").await.unwrap());

        index.delete_index("videos").await.unwrap();
        assert!(!index.index_exists("videos").await.unwrap());
    }
}
