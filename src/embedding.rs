use kdam::{BarExt, tqdm};

use crate::error::{Error, Result};

/// Default number of texts sent to the embedding provider per call.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// An embedding provider: maps a batch of texts to one vector each.
///
/// Implementations must be deterministic for a given model, return exactly
/// one vector per input and keep the output in input order.
pub trait Embedder {
    /// Stable identifier of the underlying model.
    fn model_id(&self) -> &str;

    /// Encode `texts` into one vector per text.
    fn embed(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn embed(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed(texts)
    }
}

/// Encode `texts` in batches of `batch_size`, preserving input order.
///
/// Every batch must come back with one vector per text; otherwise the whole
/// call fails with [`Error::ProviderMismatch`] and nothing is returned.
/// Batch size only affects how many texts go to the provider at once,
/// never which vector belongs to which text.
pub fn embed_batched<E: Embedder + ?Sized>(
    embedder: &mut E,
    texts: &[String],
    batch_size: usize,
    show_progress: bool,
) -> Result<Vec<Vec<f32>>> {
    if batch_size == 0 {
        return Err(Error::Config(
            "batch size must be a positive integer".to_string(),
        ));
    }

    let mut progress = show_progress.then(|| {
        tqdm!(
            total = texts.len(),
            desc = "Embedding",
            unit = " chunks"
        )
    });

    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size) {
        let embedded = embedder.embed(batch)?;
        if embedded.len() != batch.len() {
            return Err(Error::ProviderMismatch {
                expected: batch.len(),
                actual: embedded.len(),
            });
        }
        vectors.extend(embedded);

        if let Some(bar) = progress.as_mut() {
            bar.update(batch.len())?;
        }
    }

    if progress.is_some() {
        eprintln!();
    }

    Ok(vectors)
}

/// Encode a single query text into one vector.
pub fn embed_one<E: Embedder + ?Sized>(
    embedder: &mut E,
    text: &str,
) -> Result<Vec<f32>> {
    let mut vectors = embedder.embed(&[text.to_string()])?;
    if vectors.len() != 1 {
        return Err(Error::ProviderMismatch {
            expected: 1,
            actual: vectors.len(),
        });
    }
    Ok(vectors.remove(0))
}
