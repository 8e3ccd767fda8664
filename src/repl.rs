use std::io::{BufRead, Write};

use crate::{embedding::Embedder, error::Result, retrieval::Retriever};

const PROMPT: &str = "Enter your query (or 'exit'): ";

/// Interactive query loop.
///
/// Reads one query per line until `exit` (any case) or end of input. A
/// query that fails is reported on `output` and the loop keeps going; only
/// I/O errors on `input`/`output` end the loop early.
pub fn run_repl<E, R, W>(
    retriever: &mut Retriever<E>,
    top_k: usize,
    mut input: R,
    output: &mut W,
) -> Result<()>
where
    E: Embedder,
    R: BufRead,
    W: Write,
{
    let mut line = String::new();
    loop {
        write!(output, "\n{PROMPT}")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            break;
        }
        let query = line.trim_end_matches(['\r', '\n']);
        if query.eq_ignore_ascii_case("exit") {
            break;
        }
        if query.trim().is_empty() {
            continue;
        }

        match retriever.answer(query, top_k) {
            Ok(outcome) => {
                writeln!(output, "{}", serde_json::to_string_pretty(&outcome)?)?;
            }
            Err(e) => {
                tracing::error!(error = %e, "query failed");
                writeln!(output, "Error: {e}")?;
            }
        }
    }
    Ok(())
}
