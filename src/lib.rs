//! In-memory retrieval core for document question answering.
//!
//! ```text
//! text -> TextChunker -> Embedder -> VectorStore --(Arc swap)--> StoreRegistry
//!                                                                     |
//! query -> Embedder -> VectorStore::search_by_vector <----------------+
//! ```

pub mod ann;
pub mod chunker;
pub mod config;
pub mod document;
pub mod embedder;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod search;
pub mod store;
pub mod vector_entry;
pub mod vector_ops;

pub use chunker::TextChunker;
pub use embedder::{Embedder, Embedding, HashingEmbedder, HttpEmbedder};
pub use error::{RagError, Result};
pub use pipeline::{RagPipeline, Retrieval, UploadReceipt};
pub use registry::StoreRegistry;
pub use store::{BuildOptions, SearchOptions, VectorStore};
pub use vector_entry::SearchHit;
pub use vector_ops::cosine_similarity;
