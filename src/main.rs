use inkpause::audio::{AudioFeedbackQueue, AudioQueueItem};
use inkpause::cli::{Cli, Commands, ConfigAction};
use inkpause::config::Config;
use inkpause::embedding::provider_from_config;
use inkpause::error::{InkpauseError, Result};
use inkpause::retrieval::RetrievalService;
use inkpause::storage::{self, DocumentType};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Index {
            file,
            document,
            course,
            document_type,
            force,
        } => {
            cmd_index(cli.config, &file, &document, &course, document_type, force).await?;
        }
        Commands::Context {
            query,
            course,
            max_tokens,
            json,
        } => {
            cmd_context(cli.config, &query, &course, max_tokens, json).await?;
        }
        Commands::DeleteDocument { document } => {
            let service = open_service(cli.config)?;
            service.delete_document(&document)?;
            println!("✓ Removed document {}", document);
        }
        Commands::DeleteCourse { course } => {
            let service = open_service(cli.config)?;
            service.delete_course(&course)?;
            println!("✓ Removed course {}", course);
        }
        Commands::Play { files } => {
            cmd_play(cli.config, files).await?;
        }
        Commands::Status { document } => {
            cmd_status(cli.config, document)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "inkpause=debug" } else { "inkpause=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn cmd_index(
    config_path: Option<PathBuf>,
    file: &Path,
    document: &str,
    course: &str,
    document_type: DocumentType,
    force: bool,
) -> Result<()> {
    let text = std::fs::read_to_string(file).map_err(|e| InkpauseError::Io {
        source: e,
        context: format!("Failed to read document: {}", file.display()),
    })?;

    let service = open_service(config_path)?;

    if !force && !service.needs_reindex(document, document_type, course, &text)? {
        println!("Document {} is unchanged, skipping (use --force to re-index)", document);
        return Ok(());
    }

    let report = service
        .index_document(document, document_type, course, &text)
        .await?;

    if report.chunks_indexed == 0 && report.chunks_skipped == 0 {
        println!("Document {} is too short to index", document);
    } else {
        println!("✓ Indexed {} ({}) into course {}", document, document_type, course);
        println!("  Chunks: {}", report.chunks_indexed);
        if report.chunks_skipped > 0 {
            println!("  Skipped: {}", report.chunks_skipped);
        }
        println!("  Time: {}ms", report.duration_ms);
    }

    Ok(())
}

async fn cmd_context(
    config_path: Option<PathBuf>,
    query: &str,
    course: &str,
    max_tokens: Option<usize>,
    json: bool,
) -> Result<()> {
    let service = open_service(config_path)?;

    let context = match max_tokens {
        Some(budget) => service.get_context(query, course, budget).await?,
        None => service.get_context_default(query, course).await?,
    };

    if json {
        let output = serde_json::to_string_pretty(&context).map_err(|e| InkpauseError::Json {
            source: e,
            context: "Failed to serialize context".to_string(),
        })?;
        println!("{}", output);
        return Ok(());
    }

    if !context.has_context {
        println!("No relevant course material found for \"{}\"", query);
        return Ok(());
    }

    println!("{}", context.formatted_prompt);
    println!();
    println!("─── {} chunks ───", context.chunk_count);
    for source in &context.sources {
        println!("  {} ({:.3})", source.chunk_id, source.similarity);
    }

    Ok(())
}

async fn cmd_play(config_path: Option<PathBuf>, files: Vec<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;

    let mut items = Vec::with_capacity(files.len());
    for file in &files {
        let audio_data = std::fs::read(file).map_err(|e| InkpauseError::Io {
            source: e,
            context: format!("Failed to read audio clip: {}", file.display()),
        })?;
        items.push(AudioQueueItem::new(audio_data, file.display().to_string()));
    }

    let queue = AudioFeedbackQueue::with_default_output(&config.audio);
    for item in items {
        queue.enqueue(item);
    }

    // Playback runs on its own threads; park a blocking worker until it drains
    tokio::task::spawn_blocking(move || while !queue.wait_idle(Duration::from_secs(1)) {})
        .await
        .map_err(|e| InkpauseError::Other(anyhow::anyhow!("Playback wait failed: {}", e)))?;

    println!("✓ Finished {} clip(s)", files.len());
    Ok(())
}

fn cmd_status(config_path: Option<PathBuf>, document: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let data_dir = expand_path(&config.storage.data_dir)?;
    let store = storage::open_store(&data_dir)?;

    if let Some(document) = document {
        match store.document(&document)? {
            Some(record) => {
                println!("Document: {}", record.document_id);
                println!("  Course: {}", record.course_id);
                println!("  Type: {}", record.document_type);
                println!("  Chunks: {}", record.chunk_count);
                println!("  Indexed: {}", record.indexed_at.format("%Y-%m-%d %H:%M:%S"));
                println!("  Content hash: {}", record.short_hash());
            }
            None => println!("Document {} is not indexed", document),
        }
        return Ok(());
    }

    let stats = store.stats()?;
    let index_path = storage::index_path(&data_dir);
    let size = std::fs::metadata(&index_path).map(|m| m.len()).unwrap_or(0);

    println!("Index: {}", index_path.display());
    println!("  Courses: {}", stats.course_count);
    println!("  Documents: {}", stats.document_count);
    println!("  Chunks: {}", stats.chunk_count);
    println!("  Size: {}", storage::format_size(size));
    println!(
        "  Embedding: {} ({}, {}D)",
        config.embedding.model, config.embedding.mode, config.embedding.dimension
    );

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| InkpauseError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| InkpauseError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn open_service(config_path: Option<PathBuf>) -> Result<RetrievalService> {
    let config = load_config(config_path)?;
    let data_dir = expand_path(&config.storage.data_dir)?;

    let store = Arc::new(storage::open_store(&data_dir)?);
    let provider = provider_from_config(&config.embedding)?;
    tracing::debug!(
        "Using embedding model {} ({}D)",
        provider.model_name(),
        provider.dimension()
    );

    Ok(RetrievalService::new(store, provider, config.retrieval))
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!("Config file not found, using defaults. Run 'inkpause config init' to create one.");
        let mut config = Config::default();
        config.apply_env_overrides();
        return Ok(config);
    }

    Config::load(&path)
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| InkpauseError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| InkpauseError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
