use futures::stream::{self, TryStreamExt};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::ann::RandomProjectionIndex;
use crate::config::{Number, SearchMethod, State};
use crate::embedder::{embed_with_timeout, Embedder};
use crate::error::{RagError, Result};
use crate::search;
use crate::vector_entry::{SearchHit, StoreEntry};
use crate::vector_ops::{is_degenerate, magnitude};

/// How a store scans, and how big its LSH index is when it has one.
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub method: SearchMethod,
    pub ann_num_projections: usize,
    pub ann_num_tables: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            method: SearchMethod::Exact,
            ann_num_projections: 8,
            ann_num_tables: 4,
        }
    }
}

impl SearchOptions {
    pub fn from_state(state: &State) -> Self {
        Self {
            method: state.search_method,
            ann_num_projections: state.ann_num_projections,
            ann_num_tables: state.ann_num_tables,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub timeout: Duration,
    pub concurrency: usize,
}

impl BuildOptions {
    pub fn from_state(state: &State) -> Self {
        Self {
            timeout: state.embed_timeout,
            concurrency: state.embed_concurrency,
        }
    }
}

#[derive(Default)]
struct StoreInner {
    entries: Vec<StoreEntry>,
    dimensions: Option<usize>,
    ann_index: Option<RandomProjectionIndex>,
}

/// Append-only in-memory store of embedded chunks.
///
/// All methods take `&self`; concurrent inserts serialize on the write lock
/// and searches share the read lock.
pub struct VectorStore {
    inner: RwLock<StoreInner>,
    options: SearchOptions,
    fingerprint: String,
}

impl Default for VectorStore {
    fn default() -> Self {
        Self::new(SearchOptions::default())
    }
}

impl VectorStore {
    pub fn new(options: SearchOptions) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            options,
            fingerprint: String::new(),
        }
    }

    /// Tags the store with the digest of the documents it was built from.
    pub fn with_fingerprint(mut self, fingerprint: String) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensionality fixed by the first insert.
    pub fn dimensions(&self) -> Option<usize> {
        self.inner.read().dimensions
    }

    pub fn texts(&self) -> Vec<String> {
        self.inner.read().entries.iter().map(|e| e.text.clone()).collect()
    }

    pub fn insert(&self, text: String, vector: Vec<Number>) -> Result<()> {
        let entry_magnitude = magnitude(&vector);
        let mut inner = self.inner.write();

        match inner.dimensions {
            Some(expected) if expected != vector.len() => {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            Some(_) => {}
            None => {
                if vector.is_empty() {
                    return Err(RagError::InvalidInput("empty embedding vector".to_string()));
                }
                inner.dimensions = Some(vector.len());
                if self.options.method == SearchMethod::Hybrid {
                    inner.ann_index = Some(RandomProjectionIndex::new(
                        vector.len(),
                        self.options.ann_num_projections,
                        self.options.ann_num_tables,
                    ));
                }
            }
        }

        let index = inner.entries.len();
        if let Some(ann) = inner.ann_index.as_mut() {
            ann.add(&vector, index);
        }
        inner.entries.push(StoreEntry {
            text,
            vector,
            magnitude: entry_magnitude,
        });
        Ok(())
    }

    /// Embeds every text and inserts it. Up to `options.concurrency` calls are
    /// in flight at once and each is bounded by `options.timeout`. The first
    /// failure aborts the build.
    pub async fn build_from_texts<I>(
        &self,
        texts: I,
        embedder: &dyn Embedder,
        options: BuildOptions,
    ) -> Result<()>
    where
        I: IntoIterator<Item = String>,
    {
        let start = Instant::now();
        stream::iter(texts.into_iter().map(Ok::<_, RagError>))
            .try_for_each_concurrent(options.concurrency.max(1), |text| async move {
                let vector = embed_with_timeout(embedder, &text, options.timeout).await?;
                self.insert(text, vector)
            })
            .await?;

        info!(
            entries = self.len(),
            embedder = embedder.name(),
            elapsed = ?start.elapsed(),
            "Built vector store"
        );
        Ok(())
    }

    /// Top `k` entries by cosine similarity, best first. Returns
    /// `min(k, len)` hits; an empty store gives an empty result.
    pub fn search_by_vector(&self, query: &[Number], k: usize) -> Result<Vec<SearchHit>> {
        let inner = self.inner.read();
        let Some(dimensions) = inner.dimensions else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != dimensions {
            return Err(RagError::DimensionMismatch {
                expected: dimensions,
                actual: query.len(),
            });
        }

        let query_magnitude = magnitude(query);
        if is_degenerate(query_magnitude) {
            return Err(RagError::DegenerateVector);
        }

        let start = Instant::now();
        let ranked = search::run(
            self.options.method,
            &inner.entries,
            inner.ann_index.as_ref(),
            query,
            query_magnitude,
            k,
        );
        debug!(
            method = self.options.method.as_str(),
            entries = inner.entries.len(),
            hits = ranked.len(),
            elapsed = ?start.elapsed(),
            "Search completed"
        );

        Ok(ranked
            .into_iter()
            .map(|scored| SearchHit {
                text: inner.entries[scored.index].text.clone(),
                score: scored.score,
            })
            .collect())
    }

    pub async fn search_by_text(
        &self,
        query: &str,
        k: usize,
        embedder: &dyn Embedder,
        timeout: Duration,
    ) -> Result<Vec<SearchHit>> {
        let vector = embed_with_timeout(embedder, query, timeout).await?;
        self.search_by_vector(&vector, k)
    }
}

/// SHA-256 over the documents, each length-prefixed so that boundaries count.
pub fn fingerprint_documents<S: AsRef<str>>(documents: &[S]) -> String {
    let mut hasher = Sha256::new();
    for doc in documents {
        let bytes = doc.as_ref().as_bytes();
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    format!("{:x}", hasher.finalize())
}
