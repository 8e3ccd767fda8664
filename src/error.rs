use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to {operation} {}: {source}", .path.display())]
    Persist {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt data in {}: {reason}", .path.display())]
    CorruptData { path: PathBuf, reason: String },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("cannot build {0} from zero elements")]
    EmptyInput(&'static str),

    #[error("position {position} out of range for {len} chunks")]
    OutOfRange { position: usize, len: usize },

    #[error(
        "embedding provider returned {actual} vectors for {expected} inputs"
    )]
    ProviderMismatch { expected: usize, actual: usize },

    #[error("chunk {position} of {source_id} is empty after stripping")]
    EmptyChunk { source_id: String, position: usize },

    #[error("{chunks} chunks cannot be aligned with {vectors} vectors")]
    Misaligned { chunks: usize, vectors: usize },

    #[error(
        "vector file belongs to corpus {vectors} but metadata belongs to {metadata}"
    )]
    CorpusMismatch { vectors: String, metadata: String },

    #[error("no index found at {}; run `docvec ingest` first", .0.display())]
    NotIndexed(PathBuf),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("embedding model error: {0}")]
    Model(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),
}

impl Error {
    /// Build a closure that wraps an I/O error with the failing operation
    /// and path, for use with `map_err`.
    pub(crate) fn persist(
        operation: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Persist {
            operation,
            path,
            source,
        }
    }

    pub(crate) fn corrupt(
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        Self::CorruptData {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
