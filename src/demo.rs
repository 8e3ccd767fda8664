use std::{io::Write, path::Path};

use crate::{
    embedding::Embedder,
    error::Result,
    retrieval::{QueryOutcome, Retriever},
    vector_store::write_atomically,
};

/// Fixed queries answered by `docvec demo`.
pub const DEMO_QUERIES: [&str; 5] = [
    "What was Microsoft's total revenue in 2024?",
    "How much revenue did Google report in 2023?",
    "How much did Nvidia spend on Research and Development in 2022?",
    "What risks did Microsoft highlight in 2024?",
    "What did Google mention about AI strategy in 2024?",
];

/// Answer every demo query, print each outcome to `out` and save all of
/// them as a pretty JSON array at `results_path`.
///
/// The first failing query aborts the batch and nothing is saved.
pub fn run_demo<E: Embedder, W: Write>(
    retriever: &mut Retriever<E>,
    top_k: usize,
    results_path: &Path,
    out: &mut W,
) -> Result<Vec<QueryOutcome>> {
    let mut outcomes = Vec::with_capacity(DEMO_QUERIES.len());

    for query in DEMO_QUERIES {
        let outcome = retriever.answer(query, top_k)?;
        writeln!(out, "{}", serde_json::to_string_pretty(&outcome)?)?;
        outcomes.push(outcome);
    }

    let json = serde_json::to_vec_pretty(&outcomes)?;
    write_atomically(results_path, &json)?;
    tracing::info!(path = %results_path.display(), "saved demo answers");

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chunking::Chunk,
        corpus_index::{CorpusIndex, Provenance},
        error::Error,
        vector_store::VectorStore,
    };

    /// Embeds by text length, so every query lands on some chunk.
    struct LengthEmbedder;

    impl Embedder for LengthEmbedder {
        fn model_id(&self) -> &str {
            "length"
        }

        fn embed(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn model_id(&self) -> &str {
            "failing"
        }

        fn embed(&mut self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(Error::Model("offline".to_string()))
        }
    }

    fn index() -> CorpusIndex {
        let chunks = vec![
            Chunk {
                text: "Total revenue was $245.1 billion".to_string(),
                source_id: "msft_2024.txt".to_string(),
                position: 0,
            },
            Chunk {
                text: "Revenue of $307.39 billion".to_string(),
                source_id: "goog_2023.txt".to_string(),
                position: 1,
            },
        ];
        let store = VectorStore::build(&[vec![40.0], vec![60.0]]).unwrap();
        let provenance = Provenance {
            model_id: "length".to_string(),
            chunk_size: 1000,
        };
        CorpusIndex::build(chunks, store, provenance).unwrap()
    }

    #[test]
    fn writes_every_outcome_to_results_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.json");
        let mut retriever = Retriever::new(index(), LengthEmbedder);
        let mut printed = Vec::new();

        let outcomes = run_demo(&mut retriever, 1, &path, &mut printed).unwrap();

        assert_eq!(outcomes.len(), DEMO_QUERIES.len());
        let saved: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let saved = saved.as_array().unwrap();
        assert_eq!(saved.len(), 5);
        assert_eq!(saved[0]["query"], DEMO_QUERIES[0]);
        assert_eq!(saved[0]["sources"].as_array().unwrap().len(), 1);

        let printed = String::from_utf8(printed).unwrap();
        assert!(printed.contains("\"answer_numbers\""));
        assert!(printed.contains(DEMO_QUERIES[4]));
    }

    #[test]
    fn failure_leaves_no_results_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.json");
        let mut retriever = Retriever::new(index(), FailingEmbedder);

        let err = run_demo(&mut retriever, 1, &path, &mut Vec::new());
        assert!(matches!(err, Err(Error::Model(_))));
        assert!(!path.exists());
    }
}
