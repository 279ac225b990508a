use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use ragchat_core::{ChatService, OllamaClient, RagAnswer, RagConfig, RagPipeline};
use ragchat_embed::create_provider;
use ragchat_store::SqliteStore;
use ragchat_store::storage::{CacheStore, ChatHistoryStore, DocumentStore, Passage};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::Level;

/// Retrieval-augmented question answering over your own documents.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file (defaults to ./ragchat.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database file, overriding config and RAGCHAT_DATABASE
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database schema
    Init,
    /// Split files into paragraphs, embed them and add them to the store
    Ingest {
        /// Text files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Source label stored with each passage (defaults to the file path)
        #[arg(short, long)]
        source: Option<String>,
    },
    /// Answer a single question
    Ask {
        question: String,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Work with chat sessions
    #[command(subcommand)]
    Session(SessionCommands),
    /// Show store counts and the active configuration
    Status {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(Subcommand, Debug)]
enum SessionCommands {
    /// Start a new session and print its id
    New,
    /// Record a question in a session
    Ask { session_id: String, message: String },
    /// Answer the session's question and append the answer
    Answer(SessionFormatArgs),
    /// Print the session's messages
    History(SessionFormatArgs),
    /// Attach a summary record to the session
    Save { session_id: String, summary: String },
}

#[derive(ClapArgs, Debug)]
struct SessionFormatArgs {
    session_id: String,
    /// Output format
    #[arg(short, long, default_value = "summary")]
    format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct StatusOutput {
    database: PathBuf,
    passages: usize,
    cache_entries: usize,
    sessions: usize,
    configuration: RagConfig,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = RagConfig::discover(args.config.as_deref())?;
    if let Some(database) = args.database {
        config.store.database = database;
    }
    config.validate()?;

    match args.command {
        Commands::Init => {
            let _store = open_store(&config).await?;
            println!(
                "Initialized database at {}",
                config.store.database.display()
            );
            Ok(())
        }
        Commands::Ingest { files, source } => {
            let store = open_store(&config).await?;
            let embedder = create_provider(config.embedding.clone()).await?;

            let mut total = 0;
            for file in &files {
                let text = tokio::fs::read_to_string(file)
                    .await
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                let paragraphs = split_paragraphs(&text);
                let label = source.clone().unwrap_or_else(|| file.display().to_string());

                let mut passages = Vec::with_capacity(paragraphs.len());
                for (batch_index, batch) in paragraphs.chunks(config.embedding.batch_size).enumerate() {
                    let embedded = embedder.embed_texts(batch).await?;
                    for (offset, (content, embedding)) in
                        batch.iter().zip(embedded.embeddings).enumerate()
                    {
                        let paragraph = batch_index * config.embedding.batch_size + offset;
                        passages.push(
                            Passage::new(label.clone(), content.clone(), embedding)
                                .with_metadata(passage_metadata(file, paragraph)),
                        );
                    }
                }

                let inserted = store.insert_passages(passages).await?;
                tracing::info!(
                    "{}: {} paragraphs, {} new",
                    file.display(),
                    paragraphs.len(),
                    inserted
                );
                total += inserted;
            }
            println!("Ingested {total} new passages from {} files", files.len());
            Ok(())
        }
        Commands::Ask { question, format } => {
            let pipeline = RagPipeline::from_config(&config).await?;
            let answer = pipeline.run(&question).await?;
            print_answer(&answer, &format)
        }
        Commands::Session(command) => run_session(&config, command).await,
        Commands::Status { format } => {
            let store = open_store(&config).await?;
            let output = StatusOutput {
                database: config.store.database.clone(),
                passages: store.passage_count().await?,
                cache_entries: store.entry_count().await?,
                sessions: store.session_count().await?,
                configuration: config,
            };

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Summary | OutputFormat::Full => {
                    println!("ragchat status");
                    println!("==============");
                    println!("Database: {}", output.database.display());
                    println!("  Passages: {}", output.passages);
                    println!("  Cache entries: {}", output.cache_entries);
                    println!("  Sessions: {}", output.sessions);
                    let c = &output.configuration;
                    println!(
                        "Embedding: {} / {}",
                        c.embedding.provider, c.embedding.model_name
                    );
                    println!("Generator: {} at {}", c.generator.model, c.generator.base_url);
                    println!("Retriever top_k: {}", c.retriever.top_k);
                    println!(
                        "Cache: {} (threshold {})",
                        if c.cache.enabled { "enabled" } else { "disabled" },
                        c.cache.similarity_threshold
                    );
                    if format == OutputFormat::Full {
                        println!("\nConfiguration:\n{}", serde_json::to_string_pretty(c)?);
                    }
                }
            }
            Ok(())
        }
    }
}

async fn run_session(config: &RagConfig, command: SessionCommands) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let sessions = ChatService::history_only(store.clone());

    match command {
        SessionCommands::New => {
            println!("{}", sessions.create_session().await?);
        }
        SessionCommands::Ask {
            session_id,
            message,
        } => {
            sessions.record_question(&session_id, &message).await?;
            println!("Recorded question in session {session_id}");
        }
        SessionCommands::Answer(SessionFormatArgs { session_id, format }) => {
            let answer = chat_service(config, store).await?.answer_session(&session_id).await?;
            print_answer(&answer, &format)?;
        }
        SessionCommands::History(SessionFormatArgs { session_id, format }) => {
            let session = sessions.session(&session_id).await?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&session)?);
                }
                OutputFormat::Summary | OutputFormat::Full => {
                    println!(
                        "Session {} ({} messages)",
                        session.session_id,
                        session.message_history.len()
                    );
                    for message in &session.message_history {
                        if format == OutputFormat::Full {
                            println!("[{}] {}: {}", message.created_at, message.role, message.message);
                        } else {
                            println!("{}: {}", message.role, message.message);
                        }
                    }
                    if let Some(summary) = &session.summary {
                        println!("Summary: {summary}");
                    }
                }
            }
        }
        SessionCommands::Save {
            session_id,
            summary,
        } => {
            sessions.save_record(&session_id, &summary).await?;
            println!("Saved record for session {session_id}");
        }
    }
    Ok(())
}

async fn open_store(config: &RagConfig) -> anyhow::Result<Arc<SqliteStore>> {
    Ok(Arc::new(SqliteStore::open(&config.store.database).await?))
}

/// Chat service sharing `store` for documents, cache and history. Loads the
/// embedding model, so only `session answer` builds one.
async fn chat_service(config: &RagConfig, store: Arc<SqliteStore>) -> anyhow::Result<ChatService> {
    let embedder = create_provider(config.embedding.clone()).await?;
    let model = Arc::new(OllamaClient::new(&config.generator)?);
    let pipeline =
        RagPipeline::with_collaborators(config, store.clone(), store.clone(), embedder, model);
    Ok(ChatService::new(Arc::new(pipeline), store))
}

fn print_answer(answer: &RagAnswer, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(answer)?);
        }
        OutputFormat::Summary => {
            println!("{}", answer.answer);
        }
        OutputFormat::Full => {
            println!("{}", answer.answer);
            match answer.source {
                ragchat_core::AnswerSource::Cache { similarity } => {
                    println!("\n(cached answer, similarity {similarity:.3})");
                }
                ragchat_core::AnswerSource::Generated => println!("\n(generated)"),
            }
            println!("\nContext ({} passages):", answer.context.len());
            for (i, passage) in answer.context.iter().enumerate() {
                println!("--- [{}] {} (score {:.3})", i + 1, passage.source, passage.score);
                println!("{}", passage.content);
            }
        }
    }
    Ok(())
}

/// Blank-line separated paragraphs, trimmed, empty ones dropped
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n").trim().to_string());
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n").trim().to_string());
    }
    paragraphs
}

fn passage_metadata(file: &Path, paragraph: usize) -> serde_json::Map<String, serde_json::Value> {
    let mut metadata = serde_json::Map::new();
    metadata.insert("path".into(), file.display().to_string().into());
    metadata.insert("paragraph".into(), paragraph.into());
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_paragraphs() {
        let text = "First line\ncontinues here.\n\n\n  Second paragraph.  \n   \nThird.\n";
        assert_eq!(
            split_paragraphs(text),
            vec![
                "First line\ncontinues here.".to_string(),
                "Second paragraph.".to_string(),
                "Third.".to_string(),
            ]
        );
        assert!(split_paragraphs("\n\n  \n").is_empty());
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("full".parse::<OutputFormat>(), Ok(OutputFormat::Full));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_args_parse_session_commands() {
        let args = Args::parse_from(["ragchat", "-vv", "session", "history", "abc", "--format", "json"]);
        assert_eq!(args.verbose, 2);
        match args.command {
            Commands::Session(SessionCommands::History(SessionFormatArgs { session_id, format })) => {
                assert_eq!(session_id, "abc");
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_passage_metadata() {
        let metadata = passage_metadata(Path::new("docs/faq.md"), 3);
        assert_eq!(metadata["path"], "docs/faq.md");
        assert_eq!(metadata["paragraph"], 3);
    }
}
