//! Search index collaborator.
//!
//! The core never owns index schemas or storage; it consumes an opaque
//! vector/full-text search service through [`SearchProvider`]. A REST
//! implementation talks to an Azure-AI-Search-compatible endpoint, and an
//! in-memory implementation backs tests and local runs.

pub mod filter;
mod memory;
mod rest;

pub use filter::FilterBuilder;
pub use memory::MemorySearchIndex;
pub use rest::RestSearchProvider;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Vector component of a search request.
#[derive(Debug, Clone)]
pub struct VectorQuery {
    pub embedding: Vec<f32>,
    /// Name of the vector field in the index.
    pub field: String,
    /// Number of nearest neighbors to retrieve.
    pub k: usize,
}

/// One search request against a named index.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub index_name: String,
    /// Full-text component; `None` for pure vector search.
    pub query_text: Option<String>,
    pub vector: Option<VectorQuery>,
    pub top: usize,
    /// OData-like filter fragment (see [`filter`]).
    pub filter: Option<String>,
    /// Fields to return; empty means all.
    pub select: Vec<String>,
}

impl SearchRequest {
    /// Pure vector search over `index_name`.
    pub fn vector(index_name: &str, embedding: Vec<f32>, field: &str, top: usize) -> Self {
        Self {
            index_name: index_name.to_string(),
            query_text: None,
            vector: Some(VectorQuery {
                k: top,
                embedding,
                field: field.to_string(),
            }),
            top,
            filter: None,
            select: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_select(mut self, fields: &[&str]) -> Self {
        self.select = fields.iter().map(|f| f.to_string()).collect();
        self
    }
}

/// One ranked document returned from a search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Relevance score, higher is better.
    pub score: f32,
    /// Selected document fields.
    pub fields: serde_json::Map<String, Value>,
}

impl SearchHit {
    /// String field accessor; missing or non-string fields read as `None`.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

/// Index definition for `create_index`.
#[derive(Debug, Clone)]
pub struct IndexSchema {
    pub name: String,
    /// Backend-specific schema document.
    pub definition: Value,
}

/// Trait for search service implementations.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Execute a search and return ranked hits.
    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchHit>>;

    /// Check whether a named index exists.
    async fn index_exists(&self, index_name: &str) -> Result<bool>;

    /// Create an index from a schema.
    async fn create_index(&self, schema: &IndexSchema) -> Result<()>;

    /// Delete an index by name.
    async fn delete_index(&self, index_name: &str) -> Result<()>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
