use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use rust_timeline::cli::{Args, Commands, ExtractOpts};
use rust_timeline::config::EngineConfig;
use rust_timeline::containers::{ContainerRegistry, Session};
use rust_timeline::multi_processing::MultiProcessEngine;
use rust_timeline::parsers::ParserRegistry;
use rust_timeline::sources::{enumerate_sources, SourceDescriptor};
use rust_timeline::storage::{StoreReader, StoreWriter};
use rust_timeline::utils::summary::create_store_summary;

fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    initialize_logging(args.verbose)?;

    match &args.command {
        Commands::Extract(opts) => run_extraction(opts),
        Commands::Info { path } => print_store_summary(path),
        Commands::InitConfig { path } => {
            info!("Creating default configuration file at {}", path.display());
            EngineConfig::create_default_config_file(path)?;
            info!("Configuration created successfully");
            Ok(())
        }
    }
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ).context("Failed to initialize logger")?;
    Ok(())
}

/// Load configuration and apply command line overrides
fn load_and_process_config(opts: &ExtractOpts) -> Result<EngineConfig> {
    let mut config = EngineConfig::load_or_default(opts.config.as_deref())?;

    if let Some(workers) = opts.workers {
        config.number_of_workers = Some(workers);
    }
    if let Some(max_tasks) = opts.max_tasks {
        config.maximum_number_of_tasks = max_tasks;
    }
    if opts.parsers.is_some() {
        config.parser_filter_expression = opts.parsers.clone();
    }

    config.validate()?;
    Ok(config)
}

fn run_extraction(opts: &ExtractOpts) -> Result<()> {
    info!("Starting timeline extraction");

    let config = load_and_process_config(opts)?;

    let registry = Arc::new(ContainerRegistry::with_default_containers());
    let parsers = ParserRegistry::with_default_parsers(config.filestat_hash_max_size_mb);
    let engine = MultiProcessEngine::new(config.clone(), Arc::clone(&registry), parsers)
        .context("Failed to set up extraction engine")?;

    let mut roots = Vec::new();
    for source in &opts.sources {
        if !source.exists() {
            bail!("Source {} does not exist", source.display());
        }
        roots.push(SourceDescriptor::os(source));
    }

    info!("Preprocessing {} source root(s)", roots.len());
    let preprocess = engine.preprocess_sources(&roots);

    let sources: Vec<SourceDescriptor> = opts
        .sources
        .iter()
        .flat_map(|root| enumerate_sources(root, config.expand_archives, &config.skip_paths))
        .collect();
    if sources.is_empty() {
        warn!("No sources found to extract from");
    }
    info!("Enumerated {} sources", sources.len());

    let mut session = Session::new();
    if let Some(label) = &opts.label {
        session = session.with_label(label);
    }

    let mut writer = StoreWriter::create(&session, &opts.storage, Arc::clone(&registry), config.flush_policy())
        .with_context(|| format!("Failed to create store {}", opts.storage.display()))?;

    let status = engine
        .process_sources(
            &mut session,
            &sources,
            &preprocess,
            &mut writer,
            config.parser_filter_expression.as_deref(),
            config.maximum_number_of_tasks,
        )
        .context("Extraction failed")?;

    info!(
        "Extraction finished: {} tasks completed, {} failed, {} containers written",
        status.tasks_completed, status.tasks_failed, status.containers_written
    );

    let reader = StoreReader::open(&opts.storage, registry)
        .with_context(|| format!("Failed to reopen store {}", opts.storage.display()))?;
    println!("{}", create_store_summary(&reader, Some(&status))?);
    Ok(())
}

fn print_store_summary(path: &Path) -> Result<()> {
    let registry = Arc::new(ContainerRegistry::with_default_containers());
    ParserRegistry::with_default_parsers(None)
        .register_container_schemas(&registry)
        .context("Failed to register parser container types")?;

    let reader = StoreReader::open(path, registry)
        .with_context(|| format!("Failed to open store {}", path.display()))?;
    println!("{}", create_store_summary(&reader, None)?);
    Ok(())
}
