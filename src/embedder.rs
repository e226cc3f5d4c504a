//! Embedding providers.
//!
//! The store never talks to a model directly; it is handed an [`Embedder`].
//! Two implementations ship: a deterministic feature-hashing embedder that
//! needs no network, and a client for OpenAI-compatible `/embeddings` APIs.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{EmbedderKind, Number, State};
use crate::error::{RagError, Result};
use crate::vector_ops::normalize_vector;

pub type Embedding = Vec<Number>;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Embedding>;

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Runs one `embed` call, failing with [`RagError::Timeout`] if it does not
/// finish within `timeout`.
pub async fn embed_with_timeout(
    embedder: &dyn Embedder,
    text: &str,
    timeout: Duration,
) -> Result<Embedding> {
    match tokio::time::timeout(timeout, embedder.embed(text)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(embedder = embedder.name(), ?timeout, "Embedding call timed out");
            Err(RagError::Timeout(timeout))
        }
    }
}

/// Builds the embedder selected in the settings.
pub fn from_state(state: &State) -> Result<Box<dyn Embedder>> {
    match state.embedder {
        EmbedderKind::Hashing => Ok(Box::new(HashingEmbedder::new(state.embedding_dimensions)?)),
        EmbedderKind::Http => {
            let base_url = state.embedding_url.as_deref().ok_or_else(|| {
                RagError::Configuration("embedding_url is required for the http embedder".into())
            })?;
            Ok(Box::new(HttpEmbedder::new(
                base_url,
                &state.embedding_model,
                state.embedding_api_key.clone(),
                state.embed_timeout,
            )?))
        }
    }
}

/// Feature-hashing embedder.
///
/// Each lowercased alphanumeric token is hashed to one of `dimensions`
/// buckets and the term-frequency vector is L2-normalized. The same text
/// always yields the same vector. Text without tokens yields the zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::Configuration(
                "embedding dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(Self { dimensions })
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() as usize) % self.dimensions
    }

    pub fn embed_sync(&self, text: &str) -> Embedding {
        let mut tf = vec![0.0; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            tf[self.bucket(&token.to_lowercase())] += 1.0;
        }
        normalize_vector(&mut tf);
        tf
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self.embed_sync(text))
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Embedding,
    #[serde(default)]
    index: Option<usize>,
}

/// Client for an OpenAI-compatible `POST {base}/embeddings` endpoint.
#[derive(Clone)]
pub struct HttpEmbedder {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| RagError::Configuration(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }
}

/// Puts response items back in request order and checks the count.
fn order_embeddings(mut items: Vec<EmbeddingItem>, expected: usize) -> Result<Vec<Embedding>> {
    if items.len() != expected {
        return Err(RagError::Provider(format!(
            "expected {} embeddings, got {}",
            expected,
            items.len()
        )));
    }
    if items.iter().all(|item| item.index.is_some()) {
        items.sort_by_key(|item| item.index);
    }
    Ok(items
        .into_iter()
        .map(|item| {
            let mut vector = item.embedding;
            normalize_vector(&mut vector);
            vector
        })
        .collect())
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut vectors = self.embed_many(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::Provider("empty embeddings response".to_string()))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(model = %self.model, count = texts.len(), "Requesting embeddings");
        let mut request = self.http.post(self.endpoint()).json(&json!({
            "model": self.model,
            "input": texts,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            warn!(model = %self.model, status = %status, "Embedding request failed");
            return Err(RagError::Provider(format!("{}: {}", status, body)));
        }

        let parsed: EmbeddingsResponse = serde_json::from_str(&body)
            .map_err(|e| RagError::Provider(format!("malformed response: {}", e)))?;
        order_embeddings(parsed.data, texts.len())
    }
}
