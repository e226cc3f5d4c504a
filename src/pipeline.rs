//! Upload and retrieval for requester identities.
//!
//! An upload chunks and embeds into a fresh [`VectorStore`] and only then
//! installs it in the registry, so a failed or in-progress upload is never
//! visible to queries.

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::chunker::TextChunker;
use crate::config::State;
use crate::embedder::Embedder;
use crate::error::{RagError, Result};
use crate::registry::StoreRegistry;
use crate::store::{fingerprint_documents, BuildOptions, SearchOptions, VectorStore};
use crate::vector_entry::SearchHit;

#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub identity: String,
    pub fingerprint: String,
    pub chunk_count: usize,
    pub dimensions: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub identity: String,
    pub fingerprint: String,
    pub store_size: usize,
    pub hits: Vec<SearchHit>,
}

impl Retrieval {
    /// Hit texts joined for a prompt, best first.
    pub fn context(&self) -> String {
        self.hits
            .iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

pub struct RagPipeline {
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
    registry: Arc<StoreRegistry>,
    search: SearchOptions,
    build: BuildOptions,
}

impl RagPipeline {
    pub fn new(
        chunker: TextChunker,
        embedder: Arc<dyn Embedder>,
        registry: Arc<StoreRegistry>,
        search: SearchOptions,
        build: BuildOptions,
    ) -> Self {
        Self {
            chunker,
            embedder,
            registry,
            search,
            build,
        }
    }

    pub fn from_state(
        state: &State,
        embedder: Arc<dyn Embedder>,
        registry: Arc<StoreRegistry>,
    ) -> Result<Self> {
        Ok(Self::new(
            TextChunker::new(state.chunk_size, state.chunk_overlap)?,
            embedder,
            registry,
            SearchOptions::from_state(state),
            BuildOptions::from_state(state),
        ))
    }

    pub fn registry(&self) -> &Arc<StoreRegistry> {
        &self.registry
    }

    /// Replaces `identity`'s store with one built from `documents`. The old
    /// store stays in place if anything fails.
    pub async fn upload<S: AsRef<str>>(&self, identity: &str, documents: &[S]) -> Result<UploadReceipt> {
        if documents.iter().all(|d| d.as_ref().trim().is_empty()) {
            return Err(RagError::InvalidInput("document text cannot be empty".to_string()));
        }

        let chunks = self.chunker.split_texts(documents);
        let fingerprint = fingerprint_documents(documents);
        let store = VectorStore::new(self.search).with_fingerprint(fingerprint.clone());
        store
            .build_from_texts(chunks, self.embedder.as_ref(), self.build)
            .await?;

        let receipt = UploadReceipt {
            identity: identity.to_string(),
            fingerprint,
            chunk_count: store.len(),
            dimensions: store.dimensions(),
        };

        let replaced = self.registry.replace(identity, store).is_some();
        info!(
            identity,
            chunks = receipt.chunk_count,
            replaced,
            fingerprint = %receipt.fingerprint,
            "Indexed upload"
        );
        Ok(receipt)
    }

    pub async fn retrieve(&self, identity: &str, query: &str, k: usize) -> Result<Retrieval> {
        let store = self.registry.get(identity)?;
        let hits = store
            .search_by_text(query, k, self.embedder.as_ref(), self.build.timeout)
            .await?;
        Ok(Retrieval {
            identity: identity.to_string(),
            fingerprint: store.fingerprint().to_string(),
            store_size: store.len(),
            hits,
        })
    }

    pub fn drop_identity(&self, identity: &str) -> bool {
        self.registry.remove(identity)
    }
}
