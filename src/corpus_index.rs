//! The corpus index: chunk metadata bound to the vector store by position.
//!
//! For every position `p`, `chunks[p]` and the store's vector at `p`
//! describe the same chunk. The index is only ever constructed whole
//! (from an ingestion run or from a matched pair of files) and never
//! mutated afterwards, so that alignment cannot drift.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    chunking::Chunk,
    corpus_id::CorpusId,
    error::{Error, Result},
    vector_store::{VectorStore, commit_temp, write_temp},
};

const METADATA_VERSION: u32 = 1;

/// Locations of the two files that make up a persisted index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub vectors: PathBuf,
    pub metadata: PathBuf,
}

impl IndexPaths {
    /// Conventional layout: `index.vec` and `meta.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            vectors: dir.join("index.vec"),
            metadata: dir.join("meta.json"),
        }
    }
}

/// How the corpus was produced. Persisted alongside the chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub model_id: String,
    pub chunk_size: usize,
}

/// A resolved search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit<'a> {
    pub chunk: &'a Chunk,
    pub distance: f32,
}

/// On-disk metadata layout (`meta.json`).
#[derive(Debug, Serialize, Deserialize)]
struct CorpusMetadata {
    version: u32,
    corpus_id: String,
    model: String,
    chunk_size: usize,
    dimension: usize,
    docs: Vec<String>,
    sources: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CorpusIndex {
    corpus_id: CorpusId,
    provenance: Provenance,
    chunks: Vec<Chunk>,
    store: VectorStore,
}

impl CorpusIndex {
    /// Bind an ordered chunk sequence to the store built from its vectors.
    ///
    /// Each chunk's position is reset to its index in `chunks`. Fails with
    /// [`Error::EmptyInput`] for zero chunks and [`Error::Misaligned`] if
    /// the chunk count differs from the store's vector count.
    pub fn build(
        chunks: Vec<Chunk>,
        store: VectorStore,
        provenance: Provenance,
    ) -> Result<Self> {
        if chunks.is_empty() {
            return Err(Error::EmptyInput("corpus index"));
        }
        if chunks.len() != store.len() {
            return Err(Error::Misaligned {
                chunks: chunks.len(),
                vectors: store.len(),
            });
        }

        let chunks: Vec<Chunk> = chunks
            .into_iter()
            .enumerate()
            .map(|(position, chunk)| Chunk { position, ..chunk })
            .collect();
        let corpus_id = CorpusId::derive(
            &provenance.model_id,
            store.dimension(),
            &chunks,
        );

        Ok(Self {
            corpus_id,
            provenance,
            chunks,
            store,
        })
    }

    pub fn corpus_id(&self) -> CorpusId {
        self.corpus_id
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Distinct source identifiers, in order of first appearance.
    pub fn sources(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.chunks
            .iter()
            .map(|c| c.source_id.as_str())
            .filter(|source| seen.insert(*source))
            .collect()
    }

    /// Map store positions back to their chunks, in the given order.
    ///
    /// A position past the end means the store and the chunk list have
    /// diverged; that is reported as [`Error::OutOfRange`], never skipped.
    pub fn resolve(&self, positions: &[usize]) -> Result<Vec<&Chunk>> {
        positions
            .iter()
            .map(|&position| {
                self.chunks.get(position).ok_or_else(|| {
                    tracing::error!(
                        position,
                        len = self.chunks.len(),
                        "search returned a position with no chunk"
                    );
                    Error::OutOfRange {
                        position,
                        len: self.chunks.len(),
                    }
                })
            })
            .collect()
    }

    /// Nearest chunks to `query`, closest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit<'_>>> {
        let neighbors = self.store.search(query, k)?;
        let positions: Vec<usize> =
            neighbors.iter().map(|n| n.position).collect();
        let chunks = self.resolve(&positions)?;

        Ok(chunks
            .into_iter()
            .zip(neighbors)
            .map(|(chunk, n)| Hit {
                chunk,
                distance: n.distance,
            })
            .collect())
    }

    /// Write the vector file and the metadata file as a matched pair.
    ///
    /// Both files are staged next to their targets first. Nothing existing
    /// is replaced unless both staged writes succeed, so a failure leaves
    /// any previously persisted pair loadable.
    pub fn persist(&self, paths: &IndexPaths) -> Result<()> {
        let (docs, sources): (Vec<String>, Vec<String>) = self
            .chunks
            .iter()
            .map(|c| (c.text.clone(), c.source_id.clone()))
            .unzip();
        let metadata = CorpusMetadata {
            version: METADATA_VERSION,
            corpus_id: self.corpus_id.to_hex(),
            model: self.provenance.model_id.clone(),
            chunk_size: self.provenance.chunk_size,
            dimension: self.store.dimension(),
            docs,
            sources,
        };
        let json = serde_json::to_vec(&metadata)?;
        let vector_bytes = self.store.encode(self.corpus_id)?;

        let staged_vectors = write_temp(&paths.vectors, &vector_bytes)?;
        let staged_metadata = match write_temp(&paths.metadata, &json) {
            Ok(tmp) => tmp,
            Err(e) => {
                discard_staged(&staged_vectors);
                return Err(e);
            }
        };

        // Metadata first; vectors without metadata are refused at load.
        if let Err(e) = commit_temp(&staged_metadata, &paths.metadata) {
            discard_staged(&staged_vectors);
            discard_staged(&staged_metadata);
            return Err(e);
        }
        commit_temp(&staged_vectors, &paths.vectors)?;

        tracing::debug!(
            vectors = %paths.vectors.display(),
            metadata = %paths.metadata.display(),
            corpus = %self.corpus_id,
            "persisted corpus index"
        );
        Ok(())
    }

    /// Load a matched pair of files written by [`CorpusIndex::persist`].
    pub fn load(paths: &IndexPaths) -> Result<Self> {
        if !paths.vectors.exists() {
            return Err(Error::NotIndexed(paths.vectors.clone()));
        }
        if !paths.metadata.exists() {
            return Err(Error::Config(format!(
                "vector file {} has no metadata file at {}",
                paths.vectors.display(),
                paths.metadata.display()
            )));
        }

        let (vector_corpus, store) = VectorStore::load(&paths.vectors)?;

        let bytes = std::fs::read(&paths.metadata)
            .map_err(Error::persist("read", &paths.metadata))?;
        let metadata: CorpusMetadata = serde_json::from_slice(&bytes)
            .map_err(|e| Error::corrupt(&paths.metadata, e.to_string()))?;

        if metadata.version != METADATA_VERSION {
            return Err(Error::corrupt(
                &paths.metadata,
                format!("unsupported metadata version {}", metadata.version),
            ));
        }
        if metadata.docs.len() != metadata.sources.len() {
            return Err(Error::corrupt(
                &paths.metadata,
                format!(
                    "{} chunk texts but {} sources",
                    metadata.docs.len(),
                    metadata.sources.len()
                ),
            ));
        }
        let metadata_corpus =
            CorpusId::from_hex(&metadata.corpus_id).ok_or_else(|| {
                Error::corrupt(&paths.metadata, "invalid corpus id")
            })?;

        if metadata_corpus != vector_corpus {
            return Err(Error::CorpusMismatch {
                vectors: vector_corpus.to_hex(),
                metadata: metadata_corpus.to_hex(),
            });
        }
        if metadata.docs.len() != store.len() {
            return Err(Error::Misaligned {
                chunks: metadata.docs.len(),
                vectors: store.len(),
            });
        }
        if metadata.dimension != store.dimension() {
            return Err(Error::DimensionMismatch {
                expected: metadata.dimension,
                actual: store.dimension(),
            });
        }

        let chunks = metadata
            .docs
            .into_iter()
            .zip(metadata.sources)
            .enumerate()
            .map(|(position, (text, source_id))| Chunk {
                text,
                source_id,
                position,
            })
            .collect();

        Ok(Self {
            corpus_id: vector_corpus,
            provenance: Provenance {
                model_id: metadata.model,
                chunk_size: metadata.chunk_size,
            },
            chunks,
            store,
        })
    }
}

fn discard_staged(tmp: &Path) {
    if let Err(e) = std::fs::remove_file(tmp) {
        tracing::warn!(
            path = %tmp.display(),
            error = %e,
            "could not remove staged index file"
        );
    }
}
