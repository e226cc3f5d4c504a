use anyhow::{Context, Result};
use config::{Config, Environment, File as ConfigFile};
use std::num::NonZeroUsize;
use std::time::Duration;

pub type Number = f32;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Which similarity scan the vector store runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMethod {
    Exact,
    Hybrid,
}

impl SearchMethod {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "exact" => Ok(SearchMethod::Exact),
            "hybrid" => Ok(SearchMethod::Hybrid),
            other => anyhow::bail!("Unknown search method: {}", other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMethod::Exact => "exact",
            SearchMethod::Hybrid => "hybrid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderKind {
    Hashing,
    Http,
}

/// Raw values as they come out of the config layers. Everything is optional
/// here; defaults and validation happen in [`State::from_config`].
pub struct EduragConfig {
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub top_k: Option<usize>,
    pub search_method: Option<String>,
    pub ann_num_projections: Option<usize>,
    pub ann_num_tables: Option<usize>,
    pub embedder: Option<String>,
    pub embedding_dimensions: Option<usize>,
    pub embedding_url: Option<String>,
    pub embedding_model: Option<String>,
    pub embedding_api_key: Option<String>,
    pub embed_timeout_ms: Option<u64>,
    pub embed_concurrency: Option<usize>,
    pub max_stores: Option<usize>,
}

impl EduragConfig {
    pub fn from(config: &Config) -> Self {
        EduragConfig {
            chunk_size: config.get("chunk_size").ok(),
            chunk_overlap: config.get("chunk_overlap").ok(),
            top_k: config.get("top_k").ok(),
            search_method: config.get("search_method").ok(),
            ann_num_projections: config.get("ann_num_projections").ok(),
            ann_num_tables: config.get("ann_num_tables").ok(),
            embedder: config.get("embedder").ok(),
            embedding_dimensions: config.get("embedding_dimensions").ok(),
            embedding_url: config.get("embedding_url").ok(),
            embedding_model: config.get("embedding_model").ok(),
            embedding_api_key: config.get("embedding_api_key").ok(),
            embed_timeout_ms: config.get("embed_timeout_ms").ok(),
            embed_concurrency: config.get("embed_concurrency").ok(),
            max_stores: config.get("max_stores").ok(),
        }
    }
}

#[derive(Debug)]
pub struct State {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub search_method: SearchMethod,
    pub ann_num_projections: usize,
    pub ann_num_tables: usize,
    pub embedder: EmbedderKind,
    pub embedding_dimensions: usize,
    pub embedding_url: Option<String>,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
    pub embed_timeout: Duration,
    pub embed_concurrency: usize,
    pub max_stores: Option<NonZeroUsize>,
}

impl State {
    /// Loads `edurag_config.*` from the working directory, then `EDURAG_*`
    /// environment variables on top.
    pub fn new() -> Result<Self> {
        let config = Config::builder()
            .add_source(ConfigFile::with_name("edurag_config").required(false))
            .add_source(Environment::with_prefix("EDURAG"))
            .build()
            .context("Failed to load configuration")?;

        Self::from_config(&config)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let raw = EduragConfig::from(config);

        let chunk_size = raw.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        let chunk_overlap = raw.chunk_overlap.unwrap_or(DEFAULT_CHUNK_OVERLAP);
        if chunk_size == 0 {
            anyhow::bail!("EDURAG_CHUNK_SIZE must be greater than zero.");
        }
        if chunk_overlap >= chunk_size {
            anyhow::bail!(
                "EDURAG_CHUNK_OVERLAP ({}) must be smaller than EDURAG_CHUNK_SIZE ({}).",
                chunk_overlap,
                chunk_size
            );
        }

        let top_k = raw.top_k.unwrap_or(4);

        let search_method = SearchMethod::parse(raw.search_method.as_deref().unwrap_or("exact"))
            .context("Invalid EDURAG_SEARCH_METHOD")?;

        let ann_num_projections = raw.ann_num_projections.unwrap_or(8);
        let ann_num_tables = raw.ann_num_tables.unwrap_or(4);
        if ann_num_projections == 0 || ann_num_projections > 63 || ann_num_tables == 0 {
            anyhow::bail!("ANN parameters must be positive (projections at most 63).");
        }

        let embedder = match raw.embedder.as_deref().unwrap_or("hashing") {
            "hashing" => EmbedderKind::Hashing,
            "http" => EmbedderKind::Http,
            other => anyhow::bail!("Unknown embedder: {}", other),
        };

        let embedding_dimensions = raw.embedding_dimensions.unwrap_or(256);
        if embedding_dimensions == 0 {
            anyhow::bail!("EDURAG_EMBEDDING_DIMENSIONS must be greater than zero.");
        }

        let embedding_url = raw.embedding_url.filter(|url| !url.trim().is_empty());
        if embedder == EmbedderKind::Http && embedding_url.is_none() {
            anyhow::bail!("EDURAG_EMBEDDING_URL is required when EDURAG_EMBEDDER=http");
        }

        let embedding_model = raw
            .embedding_model
            .unwrap_or_else(|| "text-embedding-3-small".to_string());

        let embed_timeout_ms = raw.embed_timeout_ms.unwrap_or(30_000);
        if embed_timeout_ms == 0 {
            anyhow::bail!("EDURAG_EMBED_TIMEOUT_MS must be greater than zero.");
        }

        let embed_concurrency = raw.embed_concurrency.unwrap_or(8);
        if embed_concurrency == 0 {
            anyhow::bail!("EDURAG_EMBED_CONCURRENCY must be greater than zero.");
        }

        // Absent keeps every store for the life of the process.
        let max_stores = match raw.max_stores {
            None => None,
            Some(capacity) => Some(NonZeroUsize::new(capacity).ok_or_else(|| {
                anyhow::anyhow!(
                    "EDURAG_MAX_STORES must be greater than zero; leave it unset for no limit."
                )
            })?),
        };

        Ok(Self {
            chunk_size,
            chunk_overlap,
            top_k,
            search_method,
            ann_num_projections,
            ann_num_tables,
            embedder,
            embedding_dimensions,
            embedding_url,
            embedding_model,
            embedding_api_key: raw.embedding_api_key,
            embed_timeout: Duration::from_millis(embed_timeout_ms),
            embed_concurrency,
            max_stores,
        })
    }

    pub fn print_config(&self) {
        println!("chunk_size={}", self.chunk_size);
        println!("chunk_overlap={}", self.chunk_overlap);
        println!("top_k={}", self.top_k);
        println!("search_method={}", self.search_method.as_str());
        println!("ann_num_projections={}", self.ann_num_projections);
        println!("ann_num_tables={}", self.ann_num_tables);
        println!(
            "embedder={}",
            match self.embedder {
                EmbedderKind::Hashing => "hashing",
                EmbedderKind::Http => "http",
            }
        );
        println!("embedding_dimensions={}", self.embedding_dimensions);
        println!(
            "embedding_url={}",
            self.embedding_url.as_deref().unwrap_or("")
        );
        println!("embedding_model={}", self.embedding_model);
        println!(
            "embedding_api_key={}",
            if self.embedding_api_key.is_some() { "***" } else { "" }
        );
        println!("embed_timeout_ms={}", self.embed_timeout.as_millis());
        println!("embed_concurrency={}", self.embed_concurrency);
        println!(
            "max_stores={}",
            self.max_stores
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unbounded".to_string())
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(overrides: &[(&str, &str)]) -> Result<State> {
        let mut builder = Config::builder();
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        State::from_config(&builder.build()?)
    }

    #[test]
    fn test_defaults() {
        let state = build(&[]).unwrap();
        assert_eq!(state.chunk_size, 1000);
        assert_eq!(state.chunk_overlap, 200);
        assert_eq!(state.top_k, 4);
        assert_eq!(state.search_method, SearchMethod::Exact);
        assert_eq!(state.embedder, EmbedderKind::Hashing);
        assert_eq!(state.embed_timeout, Duration::from_secs(30));
        assert!(state.max_stores.is_none());
    }

    #[test]
    fn test_string_values_are_parsed() {
        let state = build(&[
            ("chunk_size", "400"),
            ("chunk_overlap", "50"),
            ("search_method", "hybrid"),
            ("max_stores", "16"),
        ])
        .unwrap();
        assert_eq!(state.chunk_size, 400);
        assert_eq!(state.chunk_overlap, 50);
        assert_eq!(state.search_method, SearchMethod::Hybrid);
        assert_eq!(state.max_stores, NonZeroUsize::new(16));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        assert!(build(&[("chunk_size", "100"), ("chunk_overlap", "100")]).is_err());
        assert!(build(&[("chunk_size", "100"), ("chunk_overlap", "150")]).is_err());
    }

    #[test]
    fn test_zero_max_stores_rejected() {
        let err = build(&[("max_stores", "0")]).unwrap_err();
        assert!(err.to_string().contains("EDURAG_MAX_STORES"));
        assert_eq!(build(&[("max_stores", "1")]).unwrap().max_stores, NonZeroUsize::new(1));
    }

    #[test]
    fn test_http_embedder_requires_url() {
        assert!(build(&[("embedder", "http")]).is_err());
        let state = build(&[
            ("embedder", "http"),
            ("embedding_url", "http://localhost:8080/v1"),
        ])
        .unwrap();
        assert_eq!(state.embedder, EmbedderKind::Http);
    }

    #[test]
    fn test_unknown_names_rejected() {
        assert!(build(&[("search_method", "ann")]).is_err());
        assert!(build(&[("embedder", "openai")]).is_err());
    }
}
