//! docvec - semantic retrieval over a directory of text documents.
//!
//! Documents are cut into fixed-size chunks, each chunk is embedded with a
//! [ColBERT](https://github.com/stanford-futuredata/ColBERT) model pooled
//! to a single vector, and queries are answered by exact nearest-neighbor
//! search over those vectors. The chunk list and the vector store are kept
//! aligned by position and persisted as a matched pair of files.
//!
//! # Quick start
//!
//! ```no_run
//! use docvec::{DataDir, ModelManager};
//! use docvec::ingestion::{IngestConfig, IngestionPipeline};
//! use docvec::retrieval::Retriever;
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let paths = data_dir.index_paths();
//!
//! let mut pipeline =
//!     IngestionPipeline::new(ModelManager::new(), IngestConfig::new("data"));
//! let index = pipeline.run(&paths).unwrap();
//!
//! let mut retriever = Retriever::new(index, pipeline.into_embedder());
//! let outcome = retriever
//!     .answer("What was Microsoft's total revenue in 2024?", 5)
//!     .unwrap();
//! println!("{:?} from {:?}", outcome.answer_numbers, outcome.sources);
//! ```

pub mod chunking;
pub mod cli;
pub mod config_db;
pub mod corpus_id;
pub mod corpus_index;
pub mod data_dir;
pub mod demo;
pub mod embedding;
pub mod error;
pub mod ingestion;
pub mod mcp;
pub mod model_manager;
pub mod numbers;
pub mod repl;
pub mod retrieval;
pub mod settings;
pub mod vector_store;
pub mod walker;

pub use config_db::ConfigDb;
pub use corpus_id::CorpusId;
pub use corpus_index::{CorpusIndex, IndexPaths};
pub use data_dir::DataDir;
pub use embedding::Embedder;
pub use error::{Error, Result};
pub use model_manager::ModelManager;
pub use vector_store::VectorStore;
