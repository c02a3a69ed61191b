use anyhow::Context;
use clap::Parser;
use presage::cli::{commands, Cli, Commands};
use presage::types::config::Config;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Configuration is loaded before logging exists
    let config = if cli.config.exists() {
        Config::load(&cli.config)
            .with_context(|| format!("failed to load {}", cli.config.display()))?
    } else {
        Config::load_or_default()
    };

    let log_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        config.general.log_level.as_str()
    };
    init_logging(log_level, &config.general.log_format);

    tracing::debug!(config = %cli.config.display(), "Configuration loaded");

    match cli.command {
        Commands::Init { path } => commands::init(path).await?,
        Commands::Serve => commands::serve(&config).await.context("MCP server failed")?,
        Commands::Analyze {
            action,
            source,
            input,
        } => commands::analyze(&action, &source, input.as_deref(), &config)
            .await
            .with_context(|| format!("analysis '{}' on '{}' failed", action, source))?,
        Commands::Ingest { source, input } => commands::ingest(&source, &input, &config)
            .await
            .with_context(|| format!("failed to ingest {}", input.display()))?,
        Commands::Patterns {
            pattern_type,
            min_confidence,
        } => commands::patterns(pattern_type.as_deref(), min_confidence, &config).await?,
        Commands::RecordPattern {
            pattern_type,
            data,
            confidence,
        } => commands::record_pattern(&pattern_type, &data, confidence, &config)
            .await
            .with_context(|| format!("failed to record pattern '{}'", pattern_type))?,
        Commands::Insights { source, limit } => {
            commands::insights(source.as_deref(), limit, &config).await?
        }
        Commands::Export { output } => commands::export_patterns(&output, &config).await?,
        Commands::Import { input } => commands::import_patterns(&input, &config)
            .await
            .with_context(|| format!("failed to import {}", input.display()))?,
        Commands::Config => commands::config_cmd(&cli.config).await?,
        Commands::Status => commands::status(&config).await?,
        Commands::Version => commands::version(),
    }

    Ok(())
}

/// Logs go to stderr; stdout carries the MCP channel.
fn init_logging(level: &str, format: &str) {
    let directive: Directive = format!("presage={}", level)
        .parse()
        .unwrap_or_else(|_| LevelFilter::INFO.into());
    let filter = EnvFilter::from_default_env().add_directive(directive);

    let registry = tracing_subscriber::registry().with(filter);
    if format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
