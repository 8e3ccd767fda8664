use candle_core::{Device, Tensor};
use pylate_rs::ColBERT;

use crate::{
    embedding::Embedder,
    error::{Error, Result},
};

pub const DEFAULT_MODEL_ID: &str = "lightonai/GTE-ModernColBERT-v1";
pub const MODEL_ENV_VAR: &str = "DOCVEC_MODEL";

/// Select the best available compute device.
///
/// Uses CUDA when compiled with the `cuda` feature, Metal when compiled with
/// the `metal` feature, and falls back to CPU otherwise.
fn default_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            return device;
        }
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            return device;
        }
    }

    Device::Cpu
}

/// Embedding provider backed by a ColBERT model, loaded lazily on first use.
///
/// ColBERT produces one embedding per token; each text is reduced to a
/// single vector by averaging its non-padding token rows and normalizing
/// the result to unit length.
pub struct ModelManager {
    model: Option<ColBERT>,
    model_id: String,
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelManager {
    /// Creates a new `ModelManager`. The model ID is resolved from:
    /// 1. The `DOCVEC_MODEL` environment variable, if set
    /// 2. Otherwise, the default model (`lightonai/GTE-ModernColBERT-v1`)
    pub fn new() -> Self {
        let model_id = std::env::var(MODEL_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string());

        Self::with_model_id(model_id)
    }

    /// Creates a `ModelManager` with an explicit model ID, bypassing
    /// environment variable resolution.
    pub fn with_model_id(model_id: String) -> Self {
        Self {
            model: None,
            model_id,
        }
    }

    /// Returns `true` if the model has already been loaded into memory.
    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Ensures the model is loaded, downloading from HuggingFace Hub if needed.
    fn ensure_loaded(&mut self) -> Result<&mut ColBERT> {
        if self.model.is_none() {
            tracing::info!(model = %self.model_id, "loading embedding model");
            let builder =
                ColBERT::from(&self.model_id).with_device(default_device());
            let colbert = TryInto::<ColBERT>::try_into(builder)
                .map_err(|e| Error::Model(e.to_string()))?;
            self.model = Some(colbert);
        }

        self.model
            .as_mut()
            .ok_or_else(|| Error::Model("model failed to load".to_string()))
    }
}

impl Embedder for ModelManager {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = self.ensure_loaded()?;
        let embeddings = model
            .encode(texts, false)
            .map_err(|e| Error::Model(e.to_string()))?;
        pool_token_embeddings(&embeddings)
    }
}

/// Reduce a `[batch, tokens, dimension]` tensor to one unit vector per text.
///
/// All-zero token rows are padding and are left out of the mean, so a
/// text's vector does not depend on what else was in its batch.
pub fn pool_token_embeddings(embeddings: &Tensor) -> Result<Vec<Vec<f32>>> {
    let per_text: Vec<Vec<Vec<f32>>> = embeddings.to_vec3::<f32>()?;

    Ok(per_text
        .into_iter()
        .map(|tokens| {
            let dimension = tokens.first().map_or(0, Vec::len);
            let mut sum = vec![0.0f32; dimension];
            let mut count = 0usize;
            for row in tokens.iter().filter(|r| r.iter().any(|&x| x != 0.0)) {
                for (acc, x) in sum.iter_mut().zip(row) {
                    *acc += x;
                }
                count += 1;
            }
            if count > 0 {
                for acc in &mut sum {
                    *acc /= count as f32;
                }
            }
            normalize(&mut sum);
            sum
        })
        .collect())
}

fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
