//! REST search client for Azure-AI-Search-compatible services.

use super::{IndexSchema, SearchHit, SearchProvider, SearchRequest};
use crate::error::{GlimtError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, instrument};

const API_VERSION: &str = "2024-07-01";

/// Search provider over the service's REST API.
pub struct RestSearchProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl RestSearchProvider {
    /// Create a client for `endpoint` (for example
    /// `https://myservice.search.windows.net`).
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}?api-version={}",
            self.endpoint, path, API_VERSION
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    fn search_body(request: &SearchRequest) -> Value {
        let mut body = json!({
            "search": request.query_text,
            "top": request.top,
        });

        if let Some(filter) = &request.filter {
            body["filter"] = Value::String(filter.clone());
        }
        if !request.select.is_empty() {
            body["select"] = Value::String(request.select.join(","));
        }
        if let Some(vector) = &request.vector {
            body["vectorQueries"] = json!([{
                "kind": "vector",
                "vector": vector.embedding,
                "fields": vector.field,
                "k": vector.k,
            }]);
            if request.filter.is_some() {
                body["vectorFilterMode"] = Value::String("preFilter".to_string());
            }
        }

        body
    }
}

#[async_trait]
impl SearchProvider for RestSearchProvider {
    #[instrument(skip(self, request), fields(index = %request.index_name))]
    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchHit>> {
        let url = self.url(&format!("indexes/{}/docs/search", request.index_name));
        let body = Self::search_body(&request);

        let response = self
            .authorize(self.http.post(&url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(GlimtError::Search(format!(
                "Search request failed with {}: {}",
                status, detail
            )));
        }

        let payload: Value = response.json().await?;
        let values = payload
            .get("value")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        debug!("Search returned {} hits", values.len());

        Ok(values
            .into_iter()
            .filter_map(|value| {
                let mut fields = value.as_object().cloned()?;
                let score = fields
                    .remove("@search.score")
                    .and_then(|s| s.as_f64())
                    .unwrap_or(0.0) as f32;
                fields.retain(|key, _| !key.starts_with('@'));
                Some(SearchHit { score, fields })
            })
            .collect())
    }

    async fn index_exists(&self, index_name: &str) -> Result<bool> {
        let url = self.url(&format!("indexes/{}", index_name));
        let response = self.authorize(self.http.get(&url)).send().await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            status => Err(GlimtError::Search(format!(
                "Index lookup failed with {}",
                status
            ))),
        }
    }

    async fn create_index(&self, schema: &IndexSchema) -> Result<()> {
        let url = self.url(&format!("indexes/{}", schema.name));
        let response = self
            .authorize(self.http.put(&url))
            .json(&schema.definition)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(GlimtError::Search(format!(
                "Index creation failed with {}: {}",
                status, detail
            )));
        }
        Ok(())
    }

    async fn delete_index(&self, index_name: &str) -> Result<()> {
        let url = self.url(&format!("indexes/{}", index_name));
        let response = self.authorize(self.http.delete(&url)).send().await?;

        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(GlimtError::Search(format!(
                "Index deletion failed with {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::VectorQuery;

    #[test]
    fn test_search_body_shape() {
        let request = SearchRequest {
            index_name: "idx".to_string(),
            query_text: None,
            vector: Some(VectorQuery {
                embedding: vec![0.1, 0.2],
                field: "embeddings".to_string(),
                k: 3,
            }),
            top: 3,
            filter: Some("video_id eq 'v'".to_string()),
            select: vec!["content".to_string(), "url".to_string()],
        };

        let body = RestSearchProvider::search_body(&request);
        assert_eq!(body["top"], 3);
        assert_eq!(body["select"], "content,url");
        assert_eq!(body["vectorFilterMode"], "preFilter");
        assert_eq!(body["vectorQueries"][0]["fields"], "embeddings");
        assert!(body["search"].is_null());
    }

    #[test]
    fn test_url_includes_api_version() {
        let provider = RestSearchProvider::new("https://svc.example.net/", None);
        assert_eq!(
            provider.url("indexes/i/docs/search"),
            format!(
                "https://svc.example.net/indexes/i/docs/search?api-version={}",
                API_VERSION
            )
        );
    }
}
