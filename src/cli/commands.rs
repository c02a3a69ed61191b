//! Implementação dos comandos CLI do Presage.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;

use crate::learning::format_patterns;
use crate::mcp::McpServer;
use crate::pipeline::Services;
use crate::types::config::{Config, CONFIG_FILE_NAME};
use crate::types::records::Observation;
use crate::{PresageError, PresageResult};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Initializes configuration in the specified directory.
pub async fn init(path: Option<PathBuf>) -> PresageResult<()> {
    let target_dir = path.unwrap_or_else(|| PathBuf::from("."));

    if !target_dir.exists() {
        std::fs::create_dir_all(&target_dir)?;
        tracing::info!(path = %target_dir.display(), "Directory created");
    }

    let config_path = target_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        println!("Configuration already exists at: {}", config_path.display());
        println!("Use 'presage config' to modify.");
        return Ok(());
    }

    std::fs::create_dir_all(target_dir.join(".presage"))?;
    update_gitignore(&target_dir)?;

    Config::default_config().save(&config_path)?;

    println!("Presage initialized successfully!");
    println!("Configuration created at: {}", config_path.display());
    println!("Data directory: .presage/");
    println!();
    println!("Next steps:");
    println!("  1. Load observations: presage ingest --source tasks --input tasks.json");
    println!("  2. Run an analysis:   presage analyze --action analyze_current --source tasks");
    println!("  3. Serve over MCP:    presage serve");

    Ok(())
}

/// Garante `.presage/` no .gitignore.
fn update_gitignore(target_dir: &Path) -> PresageResult<()> {
    let gitignore_path = target_dir.join(".gitignore");
    let entry = ".presage/";

    let mut content = if gitignore_path.exists() {
        std::fs::read_to_string(&gitignore_path)?
    } else {
        String::new()
    };

    if content.lines().any(|line| matches!(line.trim(), ".presage/" | ".presage")) {
        tracing::debug!(".gitignore already lists .presage/");
        return Ok(());
    }

    let trimmed_len = content.trim_end().len();
    content.truncate(trimmed_len);
    if !content.is_empty() {
        content.push_str("\n\n");
    }
    content.push_str("# Presage - local database\n");
    content.push_str(entry);
    content.push('\n');

    std::fs::write(&gitignore_path, content)?;
    println!(".gitignore updated with {}", entry);
    Ok(())
}

/// Inicia o servidor MCP via stdio.
pub async fn serve(config: &Config) -> PresageResult<()> {
    let services = Services::build(config.clone())?;
    tracing::info!(
        repository = services.repo.name(),
        engine = services.runner.engine_name(),
        "Starting Presage MCP server over stdio"
    );

    let mut server = McpServer::stdio(services);
    let result = server.run().await;

    let (services, _) = server.into_parts();
    services.shutdown(SHUTDOWN_GRACE).await;
    result
}

/// Executa uma análise e imprime a resposta em JSON.
pub async fn analyze(
    action: &str,
    source: &str,
    input: Option<&Path>,
    config: &Config,
) -> PresageResult<()> {
    let custom_data = input
        .map(|path| read_observations(path, source))
        .transpose()?;

    let services = Services::build(config.clone())?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("{} on {}...", action, source));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = services.runner.run_analysis(action, source, custom_data).await;
    spinner.finish_and_clear();
    services.shutdown(SHUTDOWN_GRACE).await;

    let response = result?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Grava observações de um arquivo no repositório.
pub async fn ingest(source: &str, input: &Path, config: &Config) -> PresageResult<()> {
    let observations = read_observations(input, source)?;
    let services = Services::build(config.clone())?;

    if !services.sources.is_registered(source) {
        tracing::warn!(data_source = %source, "Ingesting into a source that is not registered");
    }

    let mut inserted = 0usize;
    for observation in &observations {
        services.repo.insert_observation(observation).await?;
        inserted += 1;
    }
    services.shutdown(SHUTDOWN_GRACE).await;

    println!("{} observations ingested into '{}'", inserted, source);
    Ok(())
}

/// Lê observações de um arquivo JSON (objeto ou lista) e fixa a fonte.
pub fn read_observations(path: &Path, source: &str) -> PresageResult<Vec<Observation>> {
    let raw = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&raw)?;

    let mut observations: Vec<Observation> = match value {
        Value::Array(_) => serde_json::from_value(value)?,
        Value::Object(_) => vec![serde_json::from_value(value)?],
        _ => {
            return Err(PresageError::other(format!(
                "{}: expected a JSON object or array of objects",
                path.display()
            )))
        }
    };

    for observation in &mut observations {
        observation.source = source.to_string();
    }
    Ok(observations)
}

/// Lista patterns por tipo ou acima de um limiar.
pub async fn patterns(
    pattern_type: Option<&str>,
    min_confidence: Option<f64>,
    config: &Config,
) -> PresageResult<()> {
    let services = Services::build(config.clone())?;

    let found = match pattern_type {
        Some(t) => services.patterns.patterns_by_type(t).await,
        None => {
            let min = min_confidence.unwrap_or_else(|| services.patterns.min_confidence());
            services.patterns.high_confidence_patterns(min).await
        }
    };
    services.shutdown(SHUTDOWN_GRACE).await;

    if found.is_empty() {
        println!("No patterns found.");
    } else {
        print!("{}", format_patterns(&found));
    }
    Ok(())
}

/// Registra uma observação de pattern.
pub async fn record_pattern(
    pattern_type: &str,
    data: &str,
    confidence: Option<f64>,
    config: &Config,
) -> PresageResult<()> {
    let data: Value = serde_json::from_str(data)?;
    let services = Services::build(config.clone())?;

    let result = services
        .patterns
        .try_record_pattern(pattern_type, data, confidence)
        .await;
    services.shutdown(SHUTDOWN_GRACE).await;

    let pattern = result?;
    println!(
        "{}: confidence {:.2}, used {} times",
        pattern.pattern_type, pattern.confidence_score, pattern.usage_count
    );
    Ok(())
}

/// Mostra os insights mais recentes.
pub async fn insights(source: Option<&str>, limit: usize, config: &Config) -> PresageResult<()> {
    let services = Services::build(config.clone())?;
    let result = services.repo.recent_insights(source, limit.max(1)).await;
    services.shutdown(SHUTDOWN_GRACE).await;

    let insights = result?;
    if insights.is_empty() {
        println!("No insights recorded yet.");
        return Ok(());
    }

    for insight in &insights {
        let horizon = insight
            .forecast_horizon
            .map(|h| format!(" [{}]", h))
            .unwrap_or_default();
        let label = insight
            .insight_data
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("");
        println!(
            "#{} {} {}{} {} {} ({:.0}%) {}",
            insight.id,
            insight.created_at.format("%Y-%m-%d %H:%M:%S"),
            insight.analysis_type,
            horizon,
            insight.data_source,
            insight.severity,
            insight.confidence_score * 100.0,
            label
        );
    }
    Ok(())
}

/// Exporta patterns.
pub async fn export_patterns(output: &Path, config: &Config) -> PresageResult<()> {
    let services = Services::build(config.clone())?;
    let result = services.patterns.export(output).await;
    services.shutdown(SHUTDOWN_GRACE).await;

    let count = result?;
    println!("{} patterns exported to: {}", count, output.display());
    Ok(())
}

/// Importa patterns.
pub async fn import_patterns(input: &Path, config: &Config) -> PresageResult<()> {
    if !input.exists() {
        return Err(PresageError::NotFound(input.display().to_string()));
    }

    let services = Services::build(config.clone())?;
    let result = services.patterns.import(input).await;
    services.shutdown(SHUTDOWN_GRACE).await;

    let summary = result?;
    println!("Import finished:");
    println!("  Imported: {}", summary.imported);
    println!("  Skipped (already known): {}", summary.skipped);
    println!("  Merged: {}", summary.merged);
    Ok(())
}

/// Configura opções interativamente.
pub async fn config_cmd(config_path: &Path) -> PresageResult<()> {
    use super::interactive::{run_interactive_config, show_config_summary};

    if config_path.exists() {
        show_config_summary(&Config::load(config_path)?);
    }
    run_interactive_config(config_path)
}

/// Mostra o estado do serviço.
pub async fn status(config: &Config) -> PresageResult<()> {
    let services = Services::build(config.clone())?;
    let report = services.status().await;
    services.shutdown(SHUTDOWN_GRACE).await;

    println!("Presage {}", report.version);
    println!("  repository: {}", report.repository);
    println!("  engine:     {}", report.engine);
    println!(
        "  learning:   {}",
        if report.learning_enabled { "enabled" } else { "disabled" }
    );
    println!("  sources:");
    for source in &report.sources {
        println!(
            "    {:<18} {}",
            source.name,
            source.metric.as_deref().unwrap_or("-")
        );
    }
    if let Some(counts) = &report.counts {
        println!(
            "  records:    {} observations, {} patterns, {} insights, {} runs",
            counts.observations, counts.patterns, counts.insights, counts.audit_entries
        );
    }
    if let Some(experiences) = &report.experiences {
        println!(
            "  experiences: {} (mean reward {:.2})",
            experiences.total, experiences.mean_reward
        );
    }
    if let Some(error) = &report.error {
        println!("  repository error: {}", error);
    }
    Ok(())
}

/// Mostra versão.
pub fn version() {
    println!("presage {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Adaptive pattern store and predictive insight engine");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_observations_sets_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("obs.json");
        std::fs::write(
            &path,
            r#"[{"created_at": "2025-03-01T10:00:00Z", "hashrate": 510.5},
                {"source": "other", "timestamp": "2025-03-01 11:00:00", "hashrate": 498}]"#,
        )
        .unwrap();

        let observations = read_observations(&path, "mining").unwrap();
        assert_eq!(observations.len(), 2);
        assert!(observations.iter().all(|o| o.source == "mining"));
        assert_eq!(observations[1].value("hashrate"), Some(498.0));
    }

    #[test]
    fn test_read_observations_rejects_scalars() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("obs.json");
        std::fs::write(&path, "42").unwrap();
        assert!(read_observations(&path, "mining").is_err());
    }

    #[test]
    fn test_update_gitignore_is_idempotent() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target/\n").unwrap();

        update_gitignore(dir.path()).unwrap();
        update_gitignore(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(content.matches(".presage/").count(), 1);
        assert!(content.starts_with("target/"));
    }

    #[tokio::test]
    async fn test_init_creates_config() {
        let dir = TempDir::new().unwrap();
        init(Some(dir.path().to_path_buf())).await.unwrap();

        let config = Config::load(dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config.learning.default_confidence, 0.5);
        assert!(dir.path().join(".presage").is_dir());
    }
}
