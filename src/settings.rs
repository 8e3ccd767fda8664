//! Effective configuration.
//!
//! Every value is resolved per key, first match wins: command-line flag,
//! setting stored in `config.redb`, environment (model only), built-in
//! default.

use std::{fmt, path::PathBuf, str::FromStr};

use serde::Serialize;

use crate::{
    chunking::{ChunkingConfig, DEFAULT_CHUNK_SIZE},
    config_db::ConfigDb,
    embedding::DEFAULT_BATCH_SIZE,
    error::{Error, Result},
    ingestion::{EmptyChunkPolicy, IngestConfig},
    model_manager::{DEFAULT_MODEL_ID, MODEL_ENV_VAR},
    retrieval::DEFAULT_TOP_K,
    walker::DEFAULT_PATTERN,
};

pub const DEFAULT_CORPUS_DIR: &str = "data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    ModelName,
    CorpusDir,
    ChunkSize,
    BatchSize,
    TopK,
    Pattern,
    EmptyChunks,
}

impl SettingKey {
    pub const ALL: [SettingKey; 7] = [
        SettingKey::ModelName,
        SettingKey::CorpusDir,
        SettingKey::ChunkSize,
        SettingKey::BatchSize,
        SettingKey::TopK,
        SettingKey::Pattern,
        SettingKey::EmptyChunks,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::ModelName => "model_name",
            SettingKey::CorpusDir => "corpus_dir",
            SettingKey::ChunkSize => "chunk_size",
            SettingKey::BatchSize => "batch_size",
            SettingKey::TopK => "top_k",
            SettingKey::Pattern => "pattern",
            SettingKey::EmptyChunks => "empty_chunks",
        }
    }

    pub fn default_value(self) -> String {
        match self {
            SettingKey::ModelName => DEFAULT_MODEL_ID.to_string(),
            SettingKey::CorpusDir => DEFAULT_CORPUS_DIR.to_string(),
            SettingKey::ChunkSize => DEFAULT_CHUNK_SIZE.to_string(),
            SettingKey::BatchSize => DEFAULT_BATCH_SIZE.to_string(),
            SettingKey::TopK => DEFAULT_TOP_K.to_string(),
            SettingKey::Pattern => DEFAULT_PATTERN.to_string(),
            SettingKey::EmptyChunks => EmptyChunkPolicy::default().to_string(),
        }
    }

    /// Check that `value` is acceptable for this key.
    pub fn validate(self, value: &str) -> Result<()> {
        match self {
            SettingKey::ModelName
            | SettingKey::CorpusDir
            | SettingKey::Pattern
                if value.trim().is_empty() =>
            {
                Err(Error::Config(format!("{self} must not be empty")))
            }
            SettingKey::Pattern => {
                crate::walker::compile_pattern(value).map(|_| ())
            }
            SettingKey::ChunkSize | SettingKey::BatchSize | SettingKey::TopK => {
                parse_positive(self, value).map(|_| ())
            }
            SettingKey::EmptyChunks => value.parse::<EmptyChunkPolicy>().map(|_| ()),
            SettingKey::ModelName | SettingKey::CorpusDir => Ok(()),
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SettingKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> =
                    SettingKey::ALL.iter().map(|k| k.as_str()).collect();
                Error::Config(format!(
                    "unknown setting '{s}' (known: {})",
                    known.join(", ")
                ))
            })
    }
}

fn parse_positive(key: SettingKey, value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::Config(format!(
            "{key} must be a positive integer, got '{value}'"
        ))),
    }
}

/// Where an effective value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Flag,
    Stored,
    Env,
    Default,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Origin::Flag => "flag",
            Origin::Stored => "stored",
            Origin::Env => "env",
            Origin::Default => "default",
        })
    }
}

/// One row of `docvec config show`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingEntry {
    pub key: &'static str,
    pub value: String,
    pub origin: Origin,
}

/// Values given on the command line for the current invocation.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub model: Option<String>,
    pub corpus_dir: Option<PathBuf>,
    pub chunk_size: Option<usize>,
    pub batch_size: Option<usize>,
    pub top_k: Option<usize>,
    pub pattern: Option<String>,
    pub empty_chunks: Option<EmptyChunkPolicy>,
}

impl Overrides {
    fn get(&self, key: SettingKey) -> Option<String> {
        match key {
            SettingKey::ModelName => self.model.clone(),
            SettingKey::CorpusDir => {
                self.corpus_dir.as_ref().map(|p| p.display().to_string())
            }
            SettingKey::ChunkSize => self.chunk_size.map(|n| n.to_string()),
            SettingKey::BatchSize => self.batch_size.map(|n| n.to_string()),
            SettingKey::TopK => self.top_k.map(|n| n.to_string()),
            SettingKey::Pattern => self.pattern.clone(),
            SettingKey::EmptyChunks => self.empty_chunks.map(|p| p.to_string()),
        }
    }
}

/// Fully resolved configuration for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub model_id: String,
    pub corpus_dir: PathBuf,
    pub chunking: ChunkingConfig,
    pub batch_size: usize,
    pub top_k: usize,
    pub pattern: String,
    pub empty_chunks: EmptyChunkPolicy,
}

impl Settings {
    pub fn resolve(db: &ConfigDb, overrides: &Overrides) -> Result<Self> {
        Self::resolve_with_env(db, overrides, std::env::var(MODEL_ENV_VAR).ok())
    }

    /// Like [`Settings::resolve`], with the model environment variable
    /// supplied by the caller.
    pub fn resolve_with_env(
        db: &ConfigDb,
        overrides: &Overrides,
        model_env: Option<String>,
    ) -> Result<Self> {
        let entries = describe(db, overrides, model_env)?;
        let value = |key| checked_value(&entries, key);

        Ok(Self {
            model_id: value(SettingKey::ModelName)?.to_string(),
            corpus_dir: PathBuf::from(value(SettingKey::CorpusDir)?),
            chunking: ChunkingConfig::new(parse_positive(
                SettingKey::ChunkSize,
                value(SettingKey::ChunkSize)?,
            )?)?,
            batch_size: parse_positive(
                SettingKey::BatchSize,
                value(SettingKey::BatchSize)?,
            )?,
            top_k: parse_positive(SettingKey::TopK, value(SettingKey::TopK)?)?,
            pattern: value(SettingKey::Pattern)?.to_string(),
            empty_chunks: value(SettingKey::EmptyChunks)?.parse()?,
        })
    }

    pub fn ingest_config(&self, show_progress: bool) -> IngestConfig {
        IngestConfig {
            corpus_dir: self.corpus_dir.clone(),
            pattern: self.pattern.clone(),
            chunking: self.chunking,
            batch_size: self.batch_size,
            empty_chunks: self.empty_chunks,
            show_progress,
        }
    }
}

fn checked_value(entries: &[SettingEntry], key: SettingKey) -> Result<&str> {
    let entry = entries
        .iter()
        .find(|e| e.key == key.as_str())
        .ok_or_else(|| Error::Config(format!("{key} is unresolved")))?;
    key.validate(&entry.value).map_err(|e| match entry.origin {
        Origin::Stored => Error::Config(format!(
            "stored setting {key} is invalid ({e}); \
             fix it with `docvec config set` or `docvec config clear`"
        )),
        _ => e,
    })?;
    Ok(&entry.value)
}

/// Effective value and origin of every known setting.
pub fn describe(
    db: &ConfigDb,
    overrides: &Overrides,
    model_env: Option<String>,
) -> Result<Vec<SettingEntry>> {
    let mut entries = Vec::with_capacity(SettingKey::ALL.len());
    for key in SettingKey::ALL {
        let (value, origin) = if let Some(v) = overrides.get(key) {
            (v, Origin::Flag)
        } else if let Some(v) = db.get_setting(key.as_str())? {
            (v, Origin::Stored)
        } else if key == SettingKey::ModelName
            && let Some(v) = model_env.clone()
        {
            (v, Origin::Env)
        } else {
            (key.default_value(), Origin::Default)
        };
        entries.push(SettingEntry {
            key: key.as_str(),
            value,
            origin,
        });
    }
    Ok(entries)
}

/// Validate and store a setting.
pub fn set(db: &ConfigDb, key: &str, value: &str) -> Result<SettingKey> {
    let key: SettingKey = key.parse()?;
    key.validate(value)?;
    db.set_setting(key.as_str(), value.trim())?;
    tracing::debug!(%key, value, "stored setting");
    Ok(key)
}

/// Remove a stored setting, reverting it to its default.
pub fn clear(db: &ConfigDb, key: &str) -> Result<bool> {
    let key: SettingKey = key.parse()?;
    db.remove_setting(key.as_str())
}
