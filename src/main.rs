use std::io::Write;

use clap::Parser;
use docvec::{
    ConfigDb,
    CorpusIndex,
    DataDir,
    ModelManager,
    Result,
    cli::{self, Cli, Command, ConfigAction},
    demo,
    ingestion::{EmptyChunkPolicy, IngestionPipeline},
    mcp,
    repl,
    retrieval::{self, Retriever},
    settings::{self, Overrides, Settings},
};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("DOCVEC_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let config_db = ConfigDb::open(&data_dir.config_db())?;
    let mut overrides = Overrides {
        model: cli.model.clone(),
        ..Default::default()
    };

    match cli.command {
        Command::Ingest(args) => {
            overrides.corpus_dir = args.corpus_dir;
            overrides.chunk_size = args.chunk_size;
            overrides.batch_size = args.batch_size;
            overrides.pattern = args.pattern;
            overrides.empty_chunks =
                args.skip_empty.then_some(EmptyChunkPolicy::Skip);
            let settings = Settings::resolve(&config_db, &overrides)?;
            let index = cmd_ingest(&data_dir, &settings, !cli.quiet)?;
            println!(
                "Indexed {} chunks from {} documents (corpus {})",
                index.len(),
                index.sources().len(),
                index.corpus_id()
            );
        }
        Command::Query(args) => {
            overrides.top_k = args.top_k;
            let settings = Settings::resolve(&config_db, &overrides)?;
            cmd_query(&data_dir, &settings, &args)?;
        }
        Command::Demo(args) => {
            overrides.top_k = args.top_k;
            let settings = Settings::resolve(&config_db, &overrides)?;
            let output = args.output.unwrap_or_else(|| data_dir.results_file());
            let mut retriever = open_retriever(&data_dir, &settings)?;
            demo::run_demo(
                &mut retriever,
                settings.top_k,
                &output,
                &mut std::io::stdout().lock(),
            )?;
            eprintln!("Saved demo answers to {}", output.display());
        }
        Command::Repl(args) => {
            overrides.top_k = args.top_k;
            let settings = Settings::resolve(&config_db, &overrides)?;
            let mut retriever = open_retriever(&data_dir, &settings)?;
            repl::run_repl(
                &mut retriever,
                settings.top_k,
                std::io::stdin().lock(),
                &mut std::io::stdout(),
            )?;
        }
        Command::Run(args) => {
            overrides.corpus_dir = args.corpus_dir;
            overrides.top_k = args.top_k;
            let settings = Settings::resolve(&config_db, &overrides)?;
            cmd_run(&data_dir, &settings, !cli.quiet)?;
        }
        Command::Status(args) => {
            let settings = Settings::resolve(&config_db, &overrides)?;
            cmd_status(&data_dir, &settings, args.json)?;
        }
        Command::Config { action } => {
            cmd_config(&config_db, &overrides, action)?;
        }
        Command::Mcp => {
            let settings = Settings::resolve(&config_db, &overrides)?;
            mcp::run_mcp(&data_dir, &settings)?;
        }
        Command::Completions(_) => {}
    }

    Ok(())
}

fn open_retriever(
    data_dir: &DataDir,
    settings: &Settings,
) -> Result<Retriever<ModelManager>> {
    let index = CorpusIndex::load(&data_dir.index_paths())?;
    tracing::debug!(
        chunks = index.len(),
        corpus = %index.corpus_id(),
        "loaded saved index"
    );
    let model_id = retrieval::query_model_id(&index, &settings.model_id);
    Ok(Retriever::new(index, ModelManager::with_model_id(model_id)))
}

fn cmd_ingest(
    data_dir: &DataDir,
    settings: &Settings,
    show_progress: bool,
) -> Result<CorpusIndex> {
    let mut pipeline = IngestionPipeline::new(
        ModelManager::with_model_id(settings.model_id.clone()),
        settings.ingest_config(show_progress),
    );
    pipeline.run(&data_dir.index_paths())
}

fn cmd_query(
    data_dir: &DataDir,
    settings: &Settings,
    args: &cli::QueryArgs,
) -> Result<()> {
    let mut retriever = open_retriever(data_dir, settings)?;

    if args.chunks {
        let chunks = retriever.retrieve(&args.query, settings.top_k)?;
        if args.json {
            println!("{}", serde_json::to_string(&chunks)?);
        } else if chunks.is_empty() {
            println!("No chunks found.");
        } else {
            for (rank, chunk) in chunks.iter().enumerate() {
                println!(
                    "{:>3}. {:.4}  {} (chunk {})",
                    rank + 1,
                    chunk.distance,
                    chunk.source_id,
                    chunk.position
                );
                println!("     {}", preview(&chunk.text, 160));
            }
        }
        return Ok(());
    }

    let outcome = retriever.answer(&args.query, settings.top_k)?;
    if args.json {
        println!("{}", serde_json::to_string(&outcome)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }
    Ok(())
}

fn cmd_run(
    data_dir: &DataDir,
    settings: &Settings,
    show_progress: bool,
) -> Result<()> {
    let paths = data_dir.index_paths();
    let mut retriever = if paths.vectors.exists() {
        tracing::info!("loading saved index");
        open_retriever(data_dir, settings)?
    } else {
        tracing::info!("building new index");
        let mut pipeline = IngestionPipeline::new(
            ModelManager::with_model_id(settings.model_id.clone()),
            settings.ingest_config(show_progress),
        );
        let index = pipeline.run(&paths)?;
        Retriever::new(index, pipeline.into_embedder())
    };

    let results = data_dir.results_file();
    let mut stdout = std::io::stdout();
    demo::run_demo(&mut retriever, settings.top_k, &results, &mut stdout)?;
    writeln!(stdout, "\nSaved demo answers to {}", results.display())?;

    repl::run_repl(
        &mut retriever,
        settings.top_k,
        std::io::stdin().lock(),
        &mut stdout,
    )
}

fn cmd_status(
    data_dir: &DataDir,
    settings: &Settings,
    json: bool,
) -> Result<()> {
    let paths = data_dir.index_paths();
    let index = if paths.vectors.exists() || paths.metadata.exists() {
        Some(CorpusIndex::load(&paths)?)
    } else {
        None
    };

    if json {
        let index_json = index.as_ref().map(|index| {
            serde_json::json!({
                "corpus_id": index.corpus_id().to_hex(),
                "model": index.provenance().model_id,
                "chunk_size": index.provenance().chunk_size,
                "chunks": index.len(),
                "vectors": index.store().len(),
                "dimension": index.store().dimension(),
                "sources": index.sources().len(),
            })
        });
        let status = serde_json::json!({
            "data_dir": data_dir.root().display().to_string(),
            "model": settings.model_id,
            "corpus_dir": settings.corpus_dir.display().to_string(),
            "index": index_json,
        });
        println!("{status}");
        return Ok(());
    }

    println!("Data directory: {}", data_dir.root().display());
    println!("Model: {}", settings.model_id);
    println!("Corpus directory: {}", settings.corpus_dir.display());
    match index {
        Some(index) => {
            println!("Corpus: {}", index.corpus_id());
            println!(
                "Index model: {} (chunk size {})",
                index.provenance().model_id,
                index.provenance().chunk_size
            );
            println!("Chunks: {}", index.len());
            println!("Vectors: {}", index.store().len());
            println!("Dimension: {}", index.store().dimension());
            println!("Documents: {}", index.sources().len());
        }
        None => println!("Index: not built (run `docvec ingest`)"),
    }
    Ok(())
}

fn cmd_config(
    config_db: &ConfigDb,
    overrides: &Overrides,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show { json } => {
            let model_env =
                std::env::var(docvec::model_manager::MODEL_ENV_VAR).ok();
            let entries = settings::describe(config_db, overrides, model_env)?;
            if json {
                println!("{}", serde_json::to_string(&entries)?);
            } else {
                for entry in &entries {
                    println!(
                        "{:<13} {} ({})",
                        entry.key, entry.value, entry.origin
                    );
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let key = settings::set(config_db, &key, &value)?;
            println!("Set {key} = {}", value.trim());
        }
        ConfigAction::Clear { key } => {
            if settings::clear(config_db, &key)? {
                println!("Cleared {key}");
            } else {
                println!("{key} was not set");
            }
        }
    }
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    match flat.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &flat[..end]),
        None => flat,
    }
}
