use std::path::PathBuf;

use rayon::prelude::*;

use crate::{
    chunking::{Chunk, ChunkingConfig, Document, chunk_documents},
    corpus_index::{CorpusIndex, IndexPaths, Provenance},
    embedding::{DEFAULT_BATCH_SIZE, Embedder, embed_batched},
    error::{Error, Result},
    vector_store::VectorStore,
    walker::{self, DEFAULT_PATTERN, DiscoveredFile},
};

/// What to do with chunks that are empty after stripping whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyChunkPolicy {
    /// Abort the ingestion run.
    #[default]
    Reject,
    /// Drop such chunks before positions are assigned.
    Skip,
}

impl std::str::FromStr for EmptyChunkPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reject" => Ok(Self::Reject),
            "skip" => Ok(Self::Skip),
            other => Err(Error::Config(format!(
                "unknown empty-chunk policy '{other}' (expected reject or skip)"
            ))),
        }
    }
}

impl std::fmt::Display for EmptyChunkPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Reject => "reject",
            Self::Skip => "skip",
        })
    }
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub corpus_dir: PathBuf,
    pub pattern: String,
    pub chunking: ChunkingConfig,
    pub batch_size: usize,
    pub empty_chunks: EmptyChunkPolicy,
    pub show_progress: bool,
}

impl IngestConfig {
    pub fn new(corpus_dir: impl Into<PathBuf>) -> Self {
        Self {
            corpus_dir: corpus_dir.into(),
            pattern: DEFAULT_PATTERN.to_string(),
            chunking: ChunkingConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            empty_chunks: EmptyChunkPolicy::default(),
            show_progress: false,
        }
    }
}

/// Builds a [`CorpusIndex`] from a directory of documents.
///
/// The run is strictly sequential: discover → chunk → embed → build →
/// persist. Any failure aborts the run before anything is written.
pub struct IngestionPipeline<E> {
    embedder: E,
    config: IngestConfig,
}

impl<E: Embedder> IngestionPipeline<E> {
    pub fn new(embedder: E, config: IngestConfig) -> Self {
        Self { embedder, config }
    }

    /// Give the embedder back, e.g. to reuse it for retrieval.
    pub fn into_embedder(self) -> E {
        self.embedder
    }

    /// Read, chunk and embed the corpus into an in-memory index.
    pub fn build(&mut self) -> Result<CorpusIndex> {
        let pattern = walker::compile_pattern(&self.config.pattern)?;
        let files = walker::discover_files(&self.config.corpus_dir, &pattern)?;
        tracing::info!(
            dir = %self.config.corpus_dir.display(),
            files = files.len(),
            "discovered documents"
        );

        let documents = read_documents(&files)?;
        self.build_from_documents(&documents)
    }

    /// Chunk and embed already-loaded documents, in the given order.
    pub fn build_from_documents(
        &mut self,
        documents: &[Document],
    ) -> Result<CorpusIndex> {
        let chunks = chunk_documents(documents, &self.config.chunking);
        for doc in documents {
            let count = chunks
                .iter()
                .filter(|c| c.source_id == doc.source_id)
                .count();
            tracing::info!(source = %doc.source_id, chunks = count, "loaded");
        }

        let chunks = apply_empty_policy(chunks, self.config.empty_chunks)?;
        if chunks.is_empty() {
            return Err(Error::EmptyInput("corpus index"));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_batched(
            &mut self.embedder,
            &texts,
            self.config.batch_size,
            self.config.show_progress,
        )?;
        if vectors.len() != chunks.len() {
            return Err(Error::ProviderMismatch {
                expected: chunks.len(),
                actual: vectors.len(),
            });
        }

        let store = VectorStore::build(&vectors)?;
        let provenance = Provenance {
            model_id: self.embedder.model_id().to_string(),
            chunk_size: self.config.chunking.chunk_size(),
        };
        let index = CorpusIndex::build(chunks, store, provenance)?;

        tracing::info!(
            chunks = index.len(),
            dimension = index.store().dimension(),
            corpus = %index.corpus_id(),
            "built corpus index"
        );
        Ok(index)
    }

    /// Build the index and persist it as a matched pair of files.
    pub fn run(&mut self, paths: &IndexPaths) -> Result<CorpusIndex> {
        let index = self.build()?;
        index.persist(paths)?;
        tracing::info!(
            vectors = %paths.vectors.display(),
            metadata = %paths.metadata.display(),
            "index saved"
        );
        Ok(index)
    }
}

/// Read every discovered file, decoding invalid UTF-8 lossily.
///
/// Files are read in parallel; the result keeps the input order.
pub fn read_documents(files: &[DiscoveredFile]) -> Result<Vec<Document>> {
    files
        .par_iter()
        .map(|file| {
            let bytes = std::fs::read(&file.absolute_path)
                .map_err(Error::persist("read", &file.absolute_path))?;
            Ok(Document {
                source_id: file.source_id(),
                text: String::from_utf8_lossy(&bytes).into_owned(),
            })
        })
        .collect()
}

fn apply_empty_policy(
    chunks: Vec<Chunk>,
    policy: EmptyChunkPolicy,
) -> Result<Vec<Chunk>> {
    match policy {
        EmptyChunkPolicy::Reject => {
            if let Some(empty) = chunks.iter().find(|c| c.text.trim().is_empty())
            {
                return Err(Error::EmptyChunk {
                    source_id: empty.source_id.clone(),
                    position: empty.position,
                });
            }
            Ok(chunks)
        }
        EmptyChunkPolicy::Skip => {
            let before = chunks.len();
            let kept: Vec<Chunk> = chunks
                .into_iter()
                .filter(|c| !c.text.trim().is_empty())
                .enumerate()
                .map(|(position, c)| Chunk { position, ..c })
                .collect();
            if kept.len() < before {
                tracing::warn!(
                    skipped = before - kept.len(),
                    "dropped whitespace-only chunks"
                );
            }
            Ok(kept)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    /// Returns a fixed vector per known text and counts calls.
    struct FixedEmbedder {
        vectors: HashMap<String, Vec<f32>>,
        calls: usize,
    }

    impl FixedEmbedder {
        fn new(pairs: &[(&str, &[f32])]) -> Self {
            Self {
                vectors: pairs
                    .iter()
                    .map(|(t, v)| (t.to_string(), v.to_vec()))
                    .collect(),
                calls: 0,
            }
        }
    }

    impl Embedder for FixedEmbedder {
        fn model_id(&self) -> &str {
            "fixed"
        }

        fn embed(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls += 1;
            Ok(texts
                .iter()
                .map(|t| self.vectors.get(t).cloned().unwrap_or(vec![0.0, 0.0]))
                .collect())
        }
    }

    /// Returns one vector too few.
    struct ShortEmbedder;

    impl Embedder for ShortEmbedder {
        fn model_id(&self) -> &str {
            "short"
        }

        fn embed(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0]; texts.len().saturating_sub(1)])
        }
    }

    fn write_corpus(files: &[(&str, &str)]) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        for (name, content) in files {
            std::fs::write(tmp.path().join(name), content).unwrap();
        }
        tmp
    }

    #[test]
    fn builds_aligned_index_in_sorted_document_order() {
        let corpus = write_corpus(&[("beta.txt", "Beta"), ("alpha.txt", "Alpha")]);
        let embedder =
            FixedEmbedder::new(&[("Alpha", &[1.0, 0.0]), ("Beta", &[0.0, 1.0])]);
        let mut pipeline =
            IngestionPipeline::new(embedder, IngestConfig::new(corpus.path()));

        let index = pipeline.build().unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.chunks()[0].source_id, "alpha.txt");
        assert_eq!(index.chunks()[1].source_id, "beta.txt");
        assert_eq!(index.store().vector(0), Some(&[1.0, 0.0][..]));
        assert_eq!(index.store().vector(1), Some(&[0.0, 1.0][..]));
        assert_eq!(index.provenance().model_id, "fixed");
    }

    #[test]
    fn batches_respect_batch_size() {
        let corpus = write_corpus(&[("doc.txt", "abcdefghij")]);
        let mut config = IngestConfig::new(corpus.path());
        config.chunking = ChunkingConfig::new(2).unwrap();
        config.batch_size = 2;
        let mut pipeline =
            IngestionPipeline::new(FixedEmbedder::new(&[]), config);

        let index = pipeline.build().unwrap();
        assert_eq!(index.len(), 5);
        assert_eq!(pipeline.into_embedder().calls, 3);
    }

    #[test]
    fn provider_count_mismatch_aborts_without_writing() {
        let corpus = write_corpus(&[("a.txt", "aaaa"), ("b.txt", "bbbb")]);
        let out = tempfile::tempdir().unwrap();
        let paths = IndexPaths::in_dir(out.path());
        let mut pipeline =
            IngestionPipeline::new(ShortEmbedder, IngestConfig::new(corpus.path()));

        let err = pipeline.run(&paths).unwrap_err();
        assert!(matches!(err, Error::ProviderMismatch { .. }));
        assert!(!paths.vectors.exists());
        assert!(!paths.metadata.exists());
    }

    #[test]
    fn whitespace_chunk_rejected_by_default() {
        let corpus = write_corpus(&[("a.txt", "abc   ")]);
        let mut config = IngestConfig::new(corpus.path());
        config.chunking = ChunkingConfig::new(3).unwrap();
        let mut pipeline =
            IngestionPipeline::new(FixedEmbedder::new(&[]), config);

        let err = pipeline.build().unwrap_err();
        assert!(matches!(
            err,
            Error::EmptyChunk { ref source_id, position: 1 } if source_id == "a.txt"
        ));
        assert_eq!(pipeline.into_embedder().calls, 0);
    }

    #[test]
    fn whitespace_chunk_skipped_when_configured() {
        let corpus = write_corpus(&[("a.txt", "abc   def")]);
        let mut config = IngestConfig::new(corpus.path());
        config.chunking = ChunkingConfig::new(3).unwrap();
        config.empty_chunks = EmptyChunkPolicy::Skip;
        let mut pipeline =
            IngestionPipeline::new(FixedEmbedder::new(&[]), config);

        let index = pipeline.build().unwrap();
        let texts: Vec<_> =
            index.chunks().iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abc", "def"]);
        assert_eq!(index.chunks()[1].position, 1);
    }

    #[test]
    fn empty_corpus_is_empty_input() {
        let corpus = write_corpus(&[("empty.txt", "")]);
        let mut pipeline = IngestionPipeline::new(
            FixedEmbedder::new(&[]),
            IngestConfig::new(corpus.path()),
        );
        assert!(matches!(pipeline.build(), Err(Error::EmptyInput(_))));
    }

    #[test]
    fn run_persists_loadable_pair() {
        let corpus = write_corpus(&[("alpha.txt", "Alpha")]);
        let out = tempfile::tempdir().unwrap();
        let paths = IndexPaths::in_dir(out.path());
        let embedder = FixedEmbedder::new(&[("Alpha", &[1.0, 0.0])]);
        let mut pipeline =
            IngestionPipeline::new(embedder, IngestConfig::new(corpus.path()));

        let built = pipeline.run(&paths).unwrap();
        let loaded = CorpusIndex::load(&paths).unwrap();

        assert_eq!(loaded.corpus_id(), built.corpus_id());
        assert_eq!(loaded.chunks(), built.chunks());
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("bin.txt"), b"ok \xff ok").unwrap();
        let pattern = walker::compile_pattern("*.txt").unwrap();
        let files = walker::discover_files(tmp.path(), &pattern).unwrap();

        let docs = read_documents(&files).unwrap();
        assert_eq!(docs[0].text, "ok \u{fffd} ok");
    }

    #[test]
    fn empty_policy_parses() {
        assert_eq!(
            "skip".parse::<EmptyChunkPolicy>().unwrap(),
            EmptyChunkPolicy::Skip
        );
        assert_eq!(
            "reject".parse::<EmptyChunkPolicy>().unwrap(),
            EmptyChunkPolicy::Reject
        );
        assert!("drop".parse::<EmptyChunkPolicy>().is_err());
    }
}
