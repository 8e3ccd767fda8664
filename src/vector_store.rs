//! Exact nearest-neighbor index over chunk vectors.
//!
//! The store keeps every vector in one flat row-major buffer and answers
//! queries with a linear scan computing squared L2 distance to each row.
//! That is O(n·d) per query, which is fine for a corpus of a few thousand
//! chunks. An approximate index could sit behind the same API.
//!
//! On-disk format (`index.vec`):
//! - 4 bytes: magic `DVEC`
//! - 4 bytes: format version (u32 LE)
//! - 4 bytes: dimension D (u32 LE)
//! - 8 bytes: vector count N (u64 LE)
//! - 8 bytes: corpus id (u64 LE)
//! - N * D * 4 bytes: f32 values in row-major order

use std::{
    cmp::Ordering,
    path::{Path, PathBuf},
};

use rayon::prelude::*;

use crate::{
    corpus_id::CorpusId,
    error::{Error, Result},
};

const MAGIC: &[u8; 4] = b"DVEC";
const FORMAT_VERSION: u32 = 1;
const HEADER_SIZE: usize = 28;

/// A search hit: the row of a stored vector and its squared L2 distance
/// to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Immutable set of equal-length vectors addressed by position.
#[derive(Clone, PartialEq)]
pub struct VectorStore {
    dimension: usize,
    /// Flat array: `data[position * dimension + dim_idx]`.
    data: Vec<f32>,
}

impl VectorStore {
    /// Build a store over all vectors at once.
    ///
    /// Fails with [`Error::EmptyInput`] for zero vectors and with
    /// [`Error::DimensionMismatch`] if any vector's length differs from the
    /// first one's.
    pub fn build(vectors: &[Vec<f32>]) -> Result<Self> {
        let first = vectors.first().ok_or(Error::EmptyInput("vector store"))?;
        let dimension = first.len();
        if dimension == 0 {
            return Err(Error::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }

        let mut data = Vec::with_capacity(vectors.len() * dimension);
        for vector in vectors {
            if vector.len() != dimension {
                return Err(Error::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            data.extend_from_slice(vector);
        }

        Ok(Self { dimension, data })
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    /// Always `false`: a store cannot be built from zero vectors.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The vector stored at `position`, if any.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Return the `k` stored vectors closest to `query`.
    ///
    /// Results are ordered by ascending squared L2 distance, ties broken by
    /// ascending position. A `k` larger than the store returns every
    /// vector.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Err(Error::Config(
                "top-k must be a positive integer".to_string(),
            ));
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .par_chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, row)| Neighbor {
                position,
                distance: squared_l2(query, row),
            })
            .collect();

        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, compare_neighbors);
            neighbors.truncate(k);
        }
        neighbors.sort_unstable_by(compare_neighbors);

        Ok(neighbors)
    }

    /// Serialize the store to `path`, tagged with the corpus it belongs to.
    ///
    /// The bytes are written to a sibling temporary file and renamed into
    /// place, so a failed write never leaves a truncated index behind.
    pub fn persist(&self, path: &Path, corpus_id: CorpusId) -> Result<()> {
        write_atomically(path, &self.encode(corpus_id)?)
    }

    /// The on-disk representation of the store: header, then payload.
    pub(crate) fn encode(&self, corpus_id: CorpusId) -> Result<Vec<u8>> {
        let dimension = u32::try_from(self.dimension).map_err(|_| {
            Error::Config(format!(
                "dimension {} does not fit the vector file header",
                self.dimension
            ))
        })?;

        let payload: &[u8] = bytemuck::cast_slice(&self.data);
        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&dimension.to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&corpus_id.raw().to_le_bytes());
        bytes.extend_from_slice(payload);
        Ok(bytes)
    }

    /// Deserialize a store written by [`VectorStore::persist`].
    ///
    /// Fails with [`Error::CorruptData`] on any malformed header or when the
    /// payload length disagrees with the declared count and dimension.
    pub fn load(path: &Path) -> Result<(CorpusId, Self)> {
        let bytes = std::fs::read(path).map_err(Error::persist("read", path))?;

        if bytes.len() < HEADER_SIZE {
            return Err(Error::corrupt(path, "truncated header"));
        }
        if &bytes[0..4] != MAGIC {
            return Err(Error::corrupt(path, "not a docvec vector file"));
        }
        let version = le_u32(&bytes, 4);
        if version != FORMAT_VERSION {
            return Err(Error::corrupt(
                path,
                format!("unsupported format version {version}"),
            ));
        }

        let dimension = le_u32(&bytes, 8) as usize;
        let count = le_u64(&bytes, 12);
        let corpus_id = CorpusId::from_raw(le_u64(&bytes, 20));

        if dimension == 0 {
            return Err(Error::corrupt(path, "declared dimension is zero"));
        }
        if count == 0 {
            return Err(Error::corrupt(path, "declared vector count is zero"));
        }

        let payload = &bytes[HEADER_SIZE..];
        let expected_len = usize::try_from(count)
            .ok()
            .and_then(|n| n.checked_mul(dimension))
            .and_then(|n| n.checked_mul(size_of::<f32>()));
        if expected_len != Some(payload.len()) {
            return Err(Error::corrupt(
                path,
                format!(
                    "{count} vectors of dimension {dimension} do not fit \
                     a {}-byte payload",
                    payload.len()
                ),
            ));
        }

        let data: Vec<f32> = bytemuck::pod_collect_to_vec(payload);
        Ok((corpus_id, Self { dimension, data }))
    }
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("dimension", &self.dimension)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Squared Euclidean distance between two equal-length vectors.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Ascending distance, then ascending position. NaN distances sort last.
fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    match (a.distance.is_nan(), b.distance.is_nan()) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => Ordering::Equal,
        (false, false) => a.distance.total_cmp(&b.distance),
    }
    .then(a.position.cmp(&b.position))
}

/// Write `bytes` to a temporary sibling of `path`, then rename it over
/// `path`.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = write_temp(path, bytes)?;
    commit_temp(&tmp, path)
}

/// Write `bytes` next to `path` without touching `path` itself.
///
/// Returns the temporary file, to be moved into place by [`commit_temp`].
pub(crate) fn write_temp(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(Error::persist("create directory", parent))?;
    }

    let tmp = temp_path(path);
    std::fs::write(&tmp, bytes).map_err(Error::persist("write", &tmp))?;
    Ok(tmp)
}

pub(crate) fn commit_temp(tmp: &Path, path: &Path) -> Result<()> {
    std::fs::rename(tmp, path).map_err(Error::persist("rename", path))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(buf)
}

fn le_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(vectors: &[&[f32]]) -> VectorStore {
        let owned: Vec<Vec<f32>> = vectors.iter().map(|v| v.to_vec()).collect();
        VectorStore::build(&owned).unwrap()
    }

    fn positions(neighbors: &[Neighbor]) -> Vec<usize> {
        neighbors.iter().map(|n| n.position).collect()
    }

    #[test]
    fn build_and_access() {
        let s = store(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]);
        assert_eq!(s.len(), 2);
        assert_eq!(s.dimension(), 3);
        assert!(!s.is_empty());
        assert_eq!(s.vector(0), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(s.vector(1), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(s.vector(2), None);
    }

    #[test]
    fn build_rejects_empty_input() {
        assert!(matches!(
            VectorStore::build(&[]),
            Err(Error::EmptyInput(_))
        ));
    }

    #[test]
    fn build_rejects_inconsistent_dimensions() {
        let err = VectorStore::build(&[vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn search_orders_by_ascending_distance() {
        let s = store(&[&[0.0, 0.0], &[3.0, 4.0], &[1.0, 0.0]]);
        let hits = s.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(positions(&hits), vec![0, 2, 1]);
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits[1].distance, 1.0);
        assert_eq!(hits[2].distance, 25.0);
    }

    #[test]
    fn exact_match_comes_first_with_zero_distance() {
        let s = store(&[&[0.5, 0.5], &[0.1, 0.9], &[0.9, 0.1]]);
        let hits = s.search(&[0.1, 0.9], 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].position, 1);
        assert_eq!(hits[0].distance, 0.0);
    }

    #[test]
    fn ties_break_by_lowest_position() {
        let s = store(&[&[1.0, 0.0], &[0.0, 1.0], &[-1.0, 0.0], &[0.0, -1.0]]);
        let hits = s.search(&[0.0, 0.0], 4).unwrap();
        assert_eq!(positions(&hits), vec![0, 1, 2, 3]);

        let top2 = s.search(&[0.0, 0.0], 2).unwrap();
        assert_eq!(positions(&top2), vec![0, 1]);
    }

    #[test]
    fn k_larger_than_store_returns_everything() {
        let s = store(&[&[2.0], &[0.0], &[1.0]]);
        let hits = s.search(&[0.0], 10).unwrap();
        assert_eq!(positions(&hits), vec![1, 2, 0]);
    }

    #[test]
    fn search_is_deterministic() {
        let vectors: Vec<Vec<f32>> = (0..200)
            .map(|i| vec![(i % 7) as f32, (i % 3) as f32, (i % 5) as f32])
            .collect();
        let s = VectorStore::build(&vectors).unwrap();
        let first = s.search(&[1.0, 1.0, 1.0], 25).unwrap();
        for _ in 0..5 {
            assert_eq!(s.search(&[1.0, 1.0, 1.0], 25).unwrap(), first);
        }
        assert!(first.windows(2).all(|w| compare_neighbors(&w[0], &w[1])
            != Ordering::Greater));
    }

    #[test]
    fn search_rejects_wrong_query_dimension() {
        let s = store(&[&[1.0, 2.0]]);
        assert!(matches!(
            s.search(&[1.0, 2.0, 3.0], 1),
            Err(Error::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn search_rejects_zero_k() {
        let s = store(&[&[1.0]]);
        assert!(matches!(s.search(&[1.0], 0), Err(Error::Config(_))));
    }

    #[test]
    fn nan_distances_sort_last() {
        let s = store(&[&[f32::NAN], &[5.0], &[1.0]]);
        let hits = s.search(&[0.0], 3).unwrap();
        assert_eq!(positions(&hits), vec![2, 1, 0]);
    }

    #[test]
    fn persist_and_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.vec");
        let s = store(&[&[0.25, -1.5, 3.0], &[1e-7, 42.0, -0.0]]);
        let id = CorpusId::from_raw(7);

        s.persist(&path, id).unwrap();
        let (loaded_id, loaded) = VectorStore::load(&path).unwrap();

        assert_eq!(loaded_id, id);
        assert_eq!(loaded, s);
        for (a, b) in s.data.iter().zip(&loaded.data) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        assert_eq!(
            loaded.search(&[0.0, 0.0, 0.0], 2).unwrap(),
            s.search(&[0.0, 0.0, 0.0], 2).unwrap()
        );
        assert!(!path.with_extension("vec.tmp").exists());
    }

    #[test]
    fn load_missing_file_is_persist_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = VectorStore::load(&tmp.path().join("nope.vec")).unwrap_err();
        assert!(matches!(err, Error::Persist { operation: "read", .. }));
    }

    #[test]
    fn persist_to_unwritable_target_reports_write() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.vec");
        // A directory squatting on the temporary file name blocks the write.
        std::fs::create_dir(tmp.path().join("index.vec.tmp")).unwrap();

        let err = store(&[&[1.0, 2.0]])
            .persist(&path, CorpusId::from_raw(1))
            .unwrap_err();

        match err {
            Error::Persist {
                operation, path: p, ..
            } => {
                assert_eq!(operation, "write");
                assert_eq!(p, tmp.path().join("index.vec.tmp"));
            }
            other => panic!("expected a write error, got {other:?}"),
        }
        assert!(!path.exists());
    }

    #[test]
    fn oversized_dimension_is_not_encoded() {
        let s = VectorStore {
            dimension: u32::MAX as usize + 1,
            data: Vec::new(),
        };
        assert!(matches!(
            s.encode(CorpusId::from_raw(1)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn load_rejects_truncated_payload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.vec");
        store(&[&[1.0, 2.0], &[3.0, 4.0]])
            .persist(&path, CorpusId::from_raw(1))
            .unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 4);
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            VectorStore::load(&path),
            Err(Error::CorruptData { .. })
        ));
    }

    #[test]
    fn load_rejects_mismatched_declared_dimension() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.vec");
        store(&[&[1.0, 2.0], &[3.0, 4.0]])
            .persist(&path, CorpusId::from_raw(1))
            .unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[8..12].copy_from_slice(&3u32.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            VectorStore::load(&path),
            Err(Error::CorruptData { .. })
        ));
    }

    #[test]
    fn load_rejects_bad_magic_and_short_files() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.vec");

        std::fs::write(&path, b"DVE").unwrap();
        assert!(matches!(
            VectorStore::load(&path),
            Err(Error::CorruptData { .. })
        ));

        let mut bytes = vec![0u8; HEADER_SIZE + 4];
        bytes[0..4].copy_from_slice(b"NOPE");
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            VectorStore::load(&path),
            Err(Error::CorruptData { .. })
        ));
    }

    #[test]
    fn squared_l2_basics() {
        assert_eq!(squared_l2(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
        assert_eq!(squared_l2(&[1.0, 1.0], &[1.0, 1.0]), 0.0);
    }
}
