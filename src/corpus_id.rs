use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use crate::chunking::Chunk;

/// Identity shared by a vector file and the metadata file it was written
/// with. Both files carry it so a mismatched pair can be detected on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorpusId(u64);

impl CorpusId {
    /// Derive an identity from the embedding model and the chunk sequence.
    pub fn derive(model_id: &str, dimension: usize, chunks: &[Chunk]) -> Self {
        let mut hasher = DefaultHasher::new();
        model_id.hash(&mut hasher);
        dimension.hash(&mut hasher);
        chunks.len().hash(&mut hasher);
        for chunk in chunks {
            chunk.source_id.hash(&mut hasher);
            chunk.text.hash(&mut hasher);
        }
        Self(hasher.finish())
    }

    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Full 16-character lowercase hex form, as written to metadata.
    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 16 {
            return None;
        }
        u64::from_str_radix(hex, 16).ok().map(Self)
    }

    /// Short prefix for human display (e.g. "a1b2c3").
    pub fn short(&self) -> String {
        self.to_hex()[..6].to_string()
    }
}

impl std::fmt::Display for CorpusId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source_id: &str, text: &str, position: usize) -> Chunk {
        Chunk {
            text: text.to_string(),
            source_id: source_id.to_string(),
            position,
        }
    }

    #[test]
    fn deterministic() {
        let chunks = vec![chunk("a.txt", "alpha", 0)];
        let a = CorpusId::derive("model", 2, &chunks);
        let b = CorpusId::derive("model", 2, &chunks);
        assert_eq!(a, b);
    }

    #[test]
    fn different_inputs_differ() {
        let a = CorpusId::derive("model", 2, &[chunk("a.txt", "alpha", 0)]);
        let b = CorpusId::derive("model", 2, &[chunk("a.txt", "beta", 0)]);
        let c = CorpusId::derive("other", 2, &[chunk("a.txt", "alpha", 0)]);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn hex_roundtrip() {
        let id = CorpusId::from_raw(0x00ab_cdef_0123_4567);
        assert_eq!(id.to_hex(), "00abcdef01234567");
        assert_eq!(CorpusId::from_hex(&id.to_hex()), Some(id));
        assert_eq!(CorpusId::from_hex("abc"), None);
        assert_eq!(CorpusId::from_hex("zzzzzzzzzzzzzzzz"), None);
    }

    #[test]
    fn display_has_hash_prefix() {
        let id = CorpusId::from_raw(0xdead_beef_0000_0000);
        assert_eq!(id.to_string(), "#deadbe");
    }
}
