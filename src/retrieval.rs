//! Query answering over a built [`CorpusIndex`].
//!
//! A query is embedded as a single-element batch, searched against the
//! store and resolved back to chunks. Nothing here mutates the index.

use serde::Serialize;

use crate::{
    corpus_index::CorpusIndex,
    embedding::{Embedder, embed_one},
    error::{Error, Result},
    numbers::extract_numbers,
};

/// Number of chunks retrieved per query unless told otherwise.
pub const DEFAULT_TOP_K: usize = 5;

/// A retrieved chunk with its distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub position: usize,
    pub source_id: String,
    pub text: String,
    pub distance: f32,
}

/// The structured answer to one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryOutcome {
    pub query: String,
    pub answer_numbers: Vec<String>,
    pub sources: Vec<String>,
}

pub struct Retriever<E> {
    index: CorpusIndex,
    embedder: E,
}

impl<E: Embedder> Retriever<E> {
    pub fn new(index: CorpusIndex, embedder: E) -> Self {
        Self { index, embedder }
    }

    pub fn index(&self) -> &CorpusIndex {
        &self.index
    }

    pub fn embedder_mut(&mut self) -> &mut E {
        &mut self.embedder
    }

    /// The `top_k` chunks closest to `query`, most relevant first.
    pub fn retrieve(
        &mut self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if top_k == 0 {
            return Err(Error::Config(
                "top_k must be a positive integer".to_string(),
            ));
        }

        let vector = embed_one(&mut self.embedder, query)?;
        retrieve_with_vector(&self.index, &vector, top_k)
    }

    /// Retrieve and summarise: sources in rank order plus numeric tokens
    /// found in the retrieved text.
    pub fn answer(&mut self, query: &str, top_k: usize) -> Result<QueryOutcome> {
        let chunks = self.retrieve(query, top_k)?;
        Ok(outcome_from_chunks(query, &chunks))
    }
}

/// Model to embed queries with for `index`.
///
/// Query vectors are only comparable with vectors from the model that
/// built the index, so the recorded model wins over `requested`.
pub fn query_model_id(index: &CorpusIndex, requested: &str) -> String {
    let recorded = &index.provenance().model_id;
    if recorded != requested {
        tracing::warn!(
            index_model = %recorded,
            requested,
            "index was built with a different model; using the index model"
        );
    }
    recorded.clone()
}

/// Search with an already-embedded query vector.
pub fn retrieve_with_vector(
    index: &CorpusIndex,
    vector: &[f32],
    top_k: usize,
) -> Result<Vec<RetrievedChunk>> {
    let hits = index.search(vector, top_k)?;
    tracing::debug!(hits = hits.len(), top_k, "query resolved");

    Ok(hits
        .into_iter()
        .map(|hit| RetrievedChunk {
            position: hit.chunk.position,
            source_id: hit.chunk.source_id.clone(),
            text: hit.chunk.text.clone(),
            distance: hit.distance,
        })
        .collect())
}

pub fn outcome_from_chunks(
    query: &str,
    chunks: &[RetrievedChunk],
) -> QueryOutcome {
    let joined = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    QueryOutcome {
        query: query.to_string(),
        answer_numbers: extract_numbers(&joined),
        sources: chunks.iter().map(|c| c.source_id.clone()).collect(),
    }
}
