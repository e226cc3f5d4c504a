use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use edurag::config::State;
use edurag::document::load_documents;
use edurag::{embedder, RagError, RagPipeline, StoreRegistry, TextChunker};

/// Identity used by one-shot commands.
const CLI_IDENTITY: &str = "cli";

#[derive(Parser)]
#[command(name = "edurag")]
#[command(version = "0.1")]
#[command(about = "Chunk, embed and retrieve document text in memory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the chunks of a text file or directory as JSON lines
    Chunk { path: PathBuf },
    /// Index documents and print the chunks nearest to a query
    Ask {
        #[arg(long)]
        docs: PathBuf,
        #[arg(long)]
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Serve JSON-line requests from stdin
    Session,
    /// Print the effective configuration
    Config,
}

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum SessionRequest {
    Upload {
        identity: String,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        path: Option<PathBuf>,
    },
    Query {
        identity: String,
        query: String,
        #[serde(default)]
        top_k: Option<usize>,
    },
    Drop {
        identity: String,
    },
    Ping,
}

fn build_pipeline(state: &State) -> Result<RagPipeline> {
    let embedder: Arc<dyn embedder::Embedder> = Arc::from(embedder::from_state(state)?);
    let registry = Arc::new(StoreRegistry::new(state.max_stores));
    Ok(RagPipeline::from_state(state, embedder, registry)?)
}

fn chunk_command(state: &State, path: &Path) -> Result<()> {
    let chunker = TextChunker::new(state.chunk_size, state.chunk_overlap)?;
    let documents = load_documents(path)?;
    for (index, text) in chunker.split_texts(&documents).iter().enumerate() {
        let line = json!({
            "index": index,
            "length": text.chars().count(),
            "text": text,
        });
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(())
}

async fn ask_command(state: &State, docs: &Path, query: &str, top_k: Option<usize>) -> Result<()> {
    let pipeline = build_pipeline(state)?;
    let documents = load_documents(docs)?;
    let top_k = top_k.unwrap_or(state.top_k);

    pipeline.upload(CLI_IDENTITY, &documents).await?;
    let retrieval = pipeline.retrieve(CLI_IDENTITY, query, top_k).await?;

    let output = json!({
        "query": query,
        "fingerprint": retrieval.fingerprint,
        "store_size": retrieval.store_size,
        "results": retrieval.hits,
        "context": retrieval.context(),
        "actual_results_count": retrieval.hits.len(),
        "requested_results_count": top_k,
    });
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn ping() -> Value {
    json!({
        "message": "ping test",
        "applicationName": "edurag",
        "version": env!("CARGO_PKG_VERSION"),
        "serverTime": chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
    })
}

async fn handle_request(pipeline: &RagPipeline, state: &State, request: SessionRequest) -> Result<Value> {
    match request {
        SessionRequest::Upload { identity, text, path } => {
            let documents = match (text, path) {
                (Some(text), None) => vec![text],
                (None, Some(path)) => load_documents(&path)?,
                _ => anyhow::bail!("upload needs exactly one of 'text' or 'path'"),
            };
            let receipt = pipeline.upload(&identity, &documents).await?;
            Ok(json!({ "uploaded": receipt }))
        }
        SessionRequest::Query { identity, query, top_k } => {
            let retrieval = pipeline
                .retrieve(&identity, &query, top_k.unwrap_or(state.top_k))
                .await?;
            Ok(json!({ "retrieval": retrieval, "context": retrieval.context() }))
        }
        SessionRequest::Drop { identity } => Ok(json!({
            "identity": identity,
            "dropped": pipeline.drop_identity(&identity),
        })),
        SessionRequest::Ping => Ok(ping()),
    }
}

fn error_response(err: &anyhow::Error) -> Value {
    match err.downcast_ref::<RagError>() {
        Some(rag) => json!({ "error": rag }),
        None => json!({
            "error": { "kind": "invalid_request", "message": format!("{:#}", err) }
        }),
    }
}

/// One response line for one request line. Failures become `{"error": ...}`.
async fn respond(pipeline: &RagPipeline, state: &State, line: &str) -> Value {
    match serde_json::from_str::<SessionRequest>(line) {
        Ok(request) => handle_request(pipeline, state, request)
            .await
            .unwrap_or_else(|e| error_response(&e)),
        Err(e) => error_response(&anyhow::Error::new(e).context("Failed to parse request")),
    }
}

async fn session_command(state: &State) -> Result<()> {
    let pipeline = build_pipeline(state)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let response = respond(&pipeline, state, &line).await;
        println!("{}", serde_json::to_string(&response)?);
    }

    tracing::info!(stores = pipeline.registry().len(), "Session closed");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("EDURAG_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let state = State::new()?;

    match args.command {
        Commands::Chunk { path } => chunk_command(&state, &path)?,
        Commands::Ask { docs, query, top_k } => ask_command(&state, &docs, &query, top_k).await?,
        Commands::Session => session_command(&state).await?,
        Commands::Config => state.print_config(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (RagPipeline, State) {
        let state = State::from_config(&config::Config::builder().build().unwrap()).unwrap();
        let pipeline = build_pipeline(&state).unwrap();
        (pipeline, state)
    }

    fn error_kind(response: &Value) -> &str {
        response["error"]["kind"].as_str().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_query_unknown_identity_is_not_found() {
        let (pipeline, state) = session();
        let response = respond(
            &pipeline,
            &state,
            r#"{"op":"query","identity":"nobody","query":"anything"}"#,
        )
        .await;
        assert_eq!(error_kind(&response), "not_found");
        assert!(response["error"]["message"].as_str().unwrap().contains("nobody"));
    }

    #[tokio::test]
    async fn test_upload_with_text_and_path_is_invalid_request() {
        let (pipeline, state) = session();
        let response = respond(
            &pipeline,
            &state,
            r#"{"op":"upload","identity":"u","text":"some text","path":"notes.txt"}"#,
        )
        .await;
        assert_eq!(error_kind(&response), "invalid_request");
        assert!(pipeline.registry().is_empty());
    }

    #[tokio::test]
    async fn test_ping_reports_application() {
        let (pipeline, state) = session();
        let response = respond(&pipeline, &state, r#"{"op":"ping"}"#).await;
        assert_eq!(response["message"], "ping test");
        assert_eq!(response["applicationName"], "edurag");
        assert_eq!(response["version"], env!("CARGO_PKG_VERSION"));
        assert!(response["serverTime"].is_string());
    }

    #[tokio::test]
    async fn test_drop_reports_whether_store_existed() {
        let (pipeline, state) = session();
        respond(
            &pipeline,
            &state,
            r#"{"op":"upload","identity":"u","text":"a short document"}"#,
        )
        .await;

        let drop_line = r#"{"op":"drop","identity":"u"}"#;
        let first = respond(&pipeline, &state, drop_line).await;
        assert_eq!(first["identity"], "u");
        assert_eq!(first["dropped"], true);
        assert_eq!(respond(&pipeline, &state, drop_line).await["dropped"], false);
    }

    #[tokio::test]
    async fn test_bad_line_does_not_end_session() {
        let (pipeline, state) = session();
        let lines = [
            "{not json",
            r#"{"op":"teleport"}"#,
            r#"{"op":"upload","identity":"u","text":"attention heads in transformers"}"#,
            r#"{"op":"query","identity":"u","query":"transformers","top_k":2}"#,
        ];

        let mut responses = Vec::new();
        for line in lines {
            responses.push(respond(&pipeline, &state, line).await);
        }

        assert_eq!(error_kind(&responses[0]), "invalid_request");
        assert!(responses[0]["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Failed to parse request"));
        assert_eq!(error_kind(&responses[1]), "invalid_request");

        assert_eq!(responses[2]["uploaded"]["identity"], "u");
        assert_eq!(responses[2]["uploaded"]["chunk_count"], 1);

        let hits = responses[3]["retrieval"]["hits"].as_array().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["text"], "attention heads in transformers");
        assert_eq!(responses[3]["context"], "attention heads in transformers");
    }
}
