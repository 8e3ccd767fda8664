use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    corpus_index::CorpusIndex,
    data_dir::DataDir,
    embedding::{Embedder, embed_one},
    error,
    model_manager::ModelManager,
    retrieval::{self, RetrievedChunk},
    settings::Settings,
};

struct DocvecState {
    data_dir: PathBuf,
    index: CorpusIndex,
    default_top_k: usize,
    embedder: Mutex<Box<dyn Embedder + Send>>,
}

#[derive(Clone)]
pub struct DocvecMcpServer {
    state: Arc<DocvecState>,
    tool_router: ToolRouter<Self>,
}

impl DocvecMcpServer {
    fn new(state: DocvecState) -> Self {
        Self {
            state: Arc::new(state),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl DocvecMcpServer {
    /// Retrieve the chunks nearest to a query and summarise them.
    #[tool(
        name = "docvec_query",
        description = "Semantic search over the ingested corpus. Returns the source documents of the closest chunks and any figures found in them."
    )]
    pub async fn docvec_query(
        &self,
        params: Parameters<QueryParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let top_k = params.top_k.unwrap_or(self.state.default_top_k);
        if top_k == 0 {
            return Err(rmcp::ErrorData::invalid_params(
                "topK must be a positive integer",
                None,
            ));
        }

        let vector = {
            let mut embedder = self.state.embedder.lock().map_err(|_| {
                rmcp::ErrorData::internal_error("embedder lock poisoned", None)
            })?;
            embed_one(&mut *embedder, &params.query)
                .map_err(|e| mcp_error("failed to embed query", e))?
        };

        let chunks =
            retrieval::retrieve_with_vector(&self.state.index, &vector, top_k)
                .map_err(|e| mcp_error("search failed", e))?;
        let outcome = retrieval::outcome_from_chunks(&params.query, &chunks);

        let summary = format_query_summary(&outcome.query, &chunks);
        let structured = serde_json::to_value(QueryResponse {
            query: outcome.query,
            answer_numbers: outcome.answer_numbers,
            sources: outcome.sources,
            chunks: chunks.iter().map(ChunkItem::from).collect(),
        })
        .map_err(|e| mcp_error("failed to serialize query results", e))?;

        Ok(CallToolResult {
            content: vec![Content::text(summary)],
            structured_content: Some(structured),
            is_error: Some(false),
            meta: None,
        })
    }

    /// Report what the loaded index contains.
    #[tool(
        name = "docvec_status",
        description = "Show the loaded corpus: model, corpus id, chunk count, dimension and sources."
    )]
    pub async fn docvec_status(&self) -> Result<CallToolResult, rmcp::ErrorData> {
        let index = &self.state.index;
        let status = StatusResponse {
            data_dir: self.state.data_dir.display().to_string(),
            model: index.provenance().model_id.clone(),
            corpus_id: index.corpus_id().to_hex(),
            chunk_size: index.provenance().chunk_size,
            chunks: index.len(),
            vectors: index.store().len(),
            dimension: index.store().dimension(),
            sources: index.sources().into_iter().map(String::from).collect(),
        };

        let summary = format!(
            "Corpus {} holds {} chunks from {} documents ({}-dimensional, model {})",
            index.corpus_id(),
            status.chunks,
            status.sources.len(),
            status.dimension,
            status.model
        );
        let structured = serde_json::to_value(status)
            .map_err(|e| mcp_error("failed to serialize status", e))?;

        Ok(CallToolResult {
            content: vec![Content::text(summary)],
            structured_content: Some(structured),
            is_error: Some(false),
            meta: None,
        })
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for DocvecMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "docvec".to_string(),
                title: Some("docvec MCP".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Use docvec_query to find the documents most relevant to a question. Use docvec_status to see what has been ingested."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    /// Free-text query.
    pub query: String,
    /// Number of chunks to retrieve (default: the configured top_k).
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    query: String,
    answer_numbers: Vec<String>,
    sources: Vec<String>,
    chunks: Vec<ChunkItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChunkItem {
    position: usize,
    source: String,
    distance: f32,
}

impl From<&RetrievedChunk> for ChunkItem {
    fn from(chunk: &RetrievedChunk) -> Self {
        Self {
            position: chunk.position,
            source: chunk.source_id.clone(),
            distance: chunk.distance,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    data_dir: String,
    model: String,
    corpus_id: String,
    chunk_size: usize,
    chunks: usize,
    vectors: usize,
    dimension: usize,
    sources: Vec<String>,
}

fn format_query_summary(query: &str, chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return format!("No chunks found for \"{query}\"");
    }

    let mut lines = Vec::with_capacity(chunks.len() + 1);
    let suffix = if chunks.len() == 1 { "" } else { "s" };
    lines.push(format!(
        "Found {} chunk{} for \"{query}\":",
        chunks.len(),
        suffix
    ));

    for chunk in chunks {
        lines.push(format!(
            "{:.4} {} (chunk {})",
            chunk.distance, chunk.source_id, chunk.position
        ));
    }

    lines.join("\n")
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

pub fn run_mcp(data_dir: &DataDir, settings: &Settings) -> error::Result<()> {
    let index = CorpusIndex::load(&data_dir.index_paths())?;
    let model_id = retrieval::query_model_id(&index, &settings.model_id);

    let state = DocvecState {
        data_dir: data_dir.root().to_path_buf(),
        index,
        default_top_k: settings.top_k,
        embedder: Mutex::new(Box::new(ModelManager::with_model_id(model_id))),
    };

    let server = DocvecMcpServer::new(state);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        let transport = rmcp::transport::stdio();
        let running = server.serve(transport).await.map_err(|e| {
            error::Error::Config(format!(
                "MCP server initialization failed: {e}"
            ))
        })?;
        running.waiting().await.map_err(|e| {
            error::Error::Config(format!("MCP server error: {e}"))
        })?;
        Ok(())
    })
}
