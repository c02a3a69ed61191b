//! Configuration for Presage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::PresageResult;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "presage.toml";

/// Main configuration for Presage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Pattern learning settings.
    #[serde(default)]
    pub learning: LearningConfig,

    /// Detector and forecaster settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Numeric engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Registered data sources.
    #[serde(default = "default_sources")]
    pub sources: BTreeMap<String, SourceConfig>,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Timeout for repository fetches during a run (in seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".presage/presage.db")
}

/// Pattern learning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Confidence assigned on the first observation of a pattern type.
    #[serde(default = "default_confidence")]
    pub default_confidence: f64,

    /// Confidence added on every reinforcement.
    #[serde(default = "default_reinforcement_step")]
    pub reinforcement_step: f64,

    /// Upper bound of the confidence score.
    #[serde(default = "default_max_confidence")]
    pub max_confidence: f64,

    /// Maximum number of patterns returned by a by-type query.
    #[serde(default = "default_by_type_limit")]
    pub by_type_limit: usize,

    /// Maximum number of patterns returned by a high-confidence query.
    #[serde(default = "default_high_confidence_limit")]
    pub high_confidence_limit: usize,

    /// Default threshold of the high-confidence query.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Capacity of the learning experience queue.
    #[serde(default = "default_sink_capacity")]
    pub sink_capacity: usize,

    /// Reinforce a pattern after an analysis run persists insights.
    #[serde(default = "default_true")]
    pub reinforce_on_insight: bool,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_confidence: default_confidence(),
            reinforcement_step: default_reinforcement_step(),
            max_confidence: default_max_confidence(),
            by_type_limit: default_by_type_limit(),
            high_confidence_limit: default_high_confidence_limit(),
            min_confidence: default_min_confidence(),
            sink_capacity: default_sink_capacity(),
            reinforce_on_insight: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_confidence() -> f64 {
    0.5
}

fn default_reinforcement_step() -> f64 {
    0.05
}

fn default_max_confidence() -> f64 {
    1.0
}

fn default_by_type_limit() -> usize {
    100
}

fn default_high_confidence_limit() -> usize {
    200
}

fn default_min_confidence() -> f64 {
    0.7
}

fn default_sink_capacity() -> usize {
    256
}

/// Statistical method used by the anomaly detector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Modified z-score over median and MAD.
    #[default]
    RobustZ,
    /// Tukey fences over the interquartile range.
    Iqr,
}

/// Detector and forecaster settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Number of observations fetched per run.
    #[serde(default = "default_window_limit")]
    pub window_limit: usize,

    /// Minimum window size for detection and forecasting.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Detection method.
    #[serde(default)]
    pub method: DetectionMethod,

    /// Score above which a point is flagged as a warning.
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,

    /// Score from which a point is flagged as critical.
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: f64,

    /// Fence multiplier for the IQR method.
    #[serde(default = "default_iqr_multiplier")]
    pub iqr_multiplier: f64,

    /// Sampling interval of forecast projections (in hours).
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_limit: default_window_limit(),
            min_samples: default_min_samples(),
            method: DetectionMethod::default(),
            warning_threshold: default_warning_threshold(),
            critical_threshold: default_critical_threshold(),
            iqr_multiplier: default_iqr_multiplier(),
            interval_hours: default_interval_hours(),
        }
    }
}

fn default_window_limit() -> usize {
    100
}

fn default_min_samples() -> usize {
    10
}

fn default_warning_threshold() -> f64 {
    3.5
}

fn default_critical_threshold() -> f64 {
    5.0
}

fn default_iqr_multiplier() -> f64 {
    1.5
}

fn default_interval_hours() -> u32 {
    1
}

/// Numeric engine implementation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Statistical routines running inside the process.
    #[default]
    InProcess,
    /// Out-of-process runtime speaking JSON over stdin/stdout.
    External,
}

/// Numeric engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine implementation.
    #[serde(default)]
    pub kind: EngineKind,

    /// Command of the external runtime.
    #[serde(default)]
    pub command: String,

    /// Arguments of the external runtime.
    #[serde(default)]
    pub args: Vec<String>,

    /// Timeout of one engine call (in seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::default(),
            command: "python3".to_string(),
            args: vec!["predictive_analytics.py".to_string()],
            timeout_secs: default_timeout(),
        }
    }
}

/// Settings of a registered data source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// Numeric field used as the series value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
}

impl SourceConfig {
    /// Creates a source with a metric field.
    pub fn with_metric(metric: &str) -> Self {
        Self {
            metric: Some(metric.to_string()),
        }
    }
}

fn default_sources() -> BTreeMap<String, SourceConfig> {
    let mut sources = BTreeMap::new();
    sources.insert("agents".to_string(), SourceConfig::with_metric("assigned_tasks"));
    sources.insert("tasks".to_string(), SourceConfig::with_metric("completion_time_secs"));
    sources.insert("mining".to_string(), SourceConfig::with_metric("hashrate"));
    sources.insert("python_executions".to_string(), SourceConfig::with_metric("duration_ms"));
    sources.insert("dao".to_string(), SourceConfig::default());
    sources
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> PresageResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> PresageResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Creates default configuration.
    pub fn default_config() -> Self {
        Self {
            general: GeneralConfig::default(),
            storage: StorageConfig::default(),
            learning: LearningConfig::default(),
            analysis: AnalysisConfig::default(),
            engine: EngineConfig::default(),
            sources: default_sources(),
        }
    }

    /// Loads `presage.toml` from the current directory, then from the user
    /// config directory, or falls back to the defaults.
    pub fn load_or_default() -> Self {
        Self::candidate_paths()
            .into_iter()
            .filter(|path| path.exists())
            .find_map(|path| match Self::load(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid configuration");
                    None
                }
            })
            .unwrap_or_else(Self::default_config)
    }

    /// Locations searched by [`Config::load_or_default`].
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("presage").join(CONFIG_FILE_NAME));
        }
        paths
    }

    /// Settings of a registered source, `None` for unknown sources.
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.get(name)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.learning.default_confidence, 0.5);
        assert_eq!(config.learning.by_type_limit, 100);
        assert_eq!(config.learning.high_confidence_limit, 200);
        assert_eq!(config.analysis.window_limit, 100);
        assert_eq!(config.analysis.method, DetectionMethod::RobustZ);
        assert_eq!(config.engine.kind, EngineKind::InProcess);
        assert_eq!(
            config.source("tasks").and_then(|s| s.metric.as_deref()),
            Some("completion_time_secs")
        );
        assert!(config.source("dao").is_some());
        assert!(config.source("weather").is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [analysis]
            method = "iqr"

            [sources.latency]
            metric = "p99_ms"
            "#,
        )
        .unwrap();

        assert_eq!(config.analysis.method, DetectionMethod::Iqr);
        assert_eq!(config.analysis.min_samples, 10);
        assert_eq!(config.general.timeout_secs, 30);
        assert_eq!(
            config.source("latency").and_then(|s| s.metric.as_deref()),
            Some("p99_ms")
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut config = Config::default();
        config.analysis.interval_hours = 3;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.analysis.interval_hours, 3);
        assert_eq!(loaded.sources.len(), config.sources.len());
    }
}
