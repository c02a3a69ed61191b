//! Repositório SQLite.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::{format_timestamp, Repository, StoreCounts};
use crate::types::records::{
    AnalysisType, AuditEntry, ExperienceStats, ForecastHorizon, LearningExperience,
    LearningPattern, NewInsight, Observation, PredictiveInsight, Severity,
};
use crate::PresageResult;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS observations (
        id TEXT PRIMARY KEY,
        source TEXT NOT NULL,
        created_at TEXT NOT NULL,
        payload TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS learning_patterns (
        id TEXT PRIMARY KEY,
        pattern_type TEXT NOT NULL UNIQUE,
        pattern_data TEXT NOT NULL,
        confidence_score REAL NOT NULL DEFAULT 0.5,
        usage_count INTEGER NOT NULL DEFAULT 1,
        last_used TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS predictive_insights (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        analysis_type TEXT NOT NULL,
        data_source TEXT NOT NULL,
        insight_data TEXT NOT NULL,
        confidence_score REAL NOT NULL,
        severity TEXT NOT NULL DEFAULT 'info',
        forecast_horizon TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS analysis_audit (
        run_id TEXT PRIMARY KEY,
        data_source TEXT NOT NULL,
        action TEXT NOT NULL,
        input_size INTEGER NOT NULL,
        anomalies_found INTEGER NOT NULL,
        forecasts_generated INTEGER NOT NULL,
        insights_recorded INTEGER NOT NULL,
        window_digest TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS learning_experiences (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        context TEXT NOT NULL,
        action_taken TEXT NOT NULL,
        outcome TEXT NOT NULL,
        reward REAL NOT NULL,
        confidence REAL NOT NULL,
        metadata TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_observations_source ON observations(source, created_at);
    CREATE INDEX IF NOT EXISTS idx_patterns_confidence ON learning_patterns(confidence_score);
    CREATE INDEX IF NOT EXISTS idx_insights_source ON predictive_insights(data_source, created_at);
    CREATE INDEX IF NOT EXISTS idx_audit_created ON analysis_audit(created_at);
"#;

const PATTERN_COLUMNS: &str =
    "id, pattern_type, pattern_data, confidence_score, usage_count, last_used, created_at";

const INSIGHT_COLUMNS: &str = "id, analysis_type, data_source, insight_data, confidence_score,
     severity, forecast_horizon, created_at";

/// Repositório SQLite.
///
/// `rusqlite::Connection` não é `Sync`, então a conexão fica atrás de um
/// `tokio::sync::Mutex`.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Cria ou abre o banco.
    pub fn open(db_path: &Path) -> PresageResult<Self> {
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    /// Banco temporário em memória.
    pub fn open_in_memory() -> PresageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> PresageResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn json_column(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::Null)
}

fn pattern_from_row(row: &Row<'_>) -> rusqlite::Result<LearningPattern> {
    Ok(LearningPattern {
        id: row.get(0)?,
        pattern_type: row.get(1)?,
        pattern_data: json_column(row.get(2)?),
        confidence_score: row.get(3)?,
        usage_count: row.get(4)?,
        last_used: row
            .get::<_, String>(5)?
            .parse()
            .unwrap_or_else(|_| Utc::now()),
        created_at: row
            .get::<_, String>(6)?
            .parse()
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn insight_from_row(row: &Row<'_>) -> rusqlite::Result<PredictiveInsight> {
    Ok(PredictiveInsight {
        id: row.get(0)?,
        analysis_type: AnalysisType::from_str(&row.get::<_, String>(1)?),
        data_source: row.get(2)?,
        insight_data: json_column(row.get(3)?),
        confidence_score: row.get(4)?,
        severity: Severity::from_str(&row.get::<_, String>(5)?),
        forecast_horizon: row
            .get::<_, Option<String>>(6)?
            .as_deref()
            .and_then(ForecastHorizon::from_str),
        created_at: row
            .get::<_, String>(7)?
            .parse()
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[async_trait]
impl Repository for SqliteRepository {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert_observation(&self, observation: &Observation) -> PresageResult<()> {
        let payload = serde_json::to_string(&observation.fields)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO observations (id, source, created_at, payload)
             VALUES (?, ?, ?, ?)",
            params![
                observation.id,
                observation.source,
                format_timestamp(&observation.created_at),
                payload
            ],
        )?;
        Ok(())
    }

    async fn query_observations(
        &self,
        source: &str,
        limit: usize,
    ) -> PresageResult<Vec<Observation>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, source, created_at, payload
             FROM observations
             WHERE source = ?
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?",
        )?;

        let observations = stmt
            .query_map(params![source, limit as i64], |row| {
                let payload: String = row.get(3)?;
                Ok(Observation {
                    id: row.get(0)?,
                    source: row.get(1)?,
                    created_at: row
                        .get::<_, String>(2)?
                        .parse()
                        .unwrap_or_else(|_| Utc::now()),
                    fields: serde_json::from_str::<Map<String, Value>>(&payload)
                        .unwrap_or_default(),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(observations)
    }

    async fn find_pattern(&self, pattern_type: &str) -> PresageResult<Option<LearningPattern>> {
        let conn = self.conn.lock().await;
        let pattern = conn
            .query_row(
                &format!(
                    "SELECT {} FROM learning_patterns WHERE pattern_type = ?",
                    PATTERN_COLUMNS
                ),
                params![pattern_type],
                pattern_from_row,
            )
            .optional()?;
        Ok(pattern)
    }

    async fn upsert_pattern(&self, pattern: &LearningPattern) -> PresageResult<()> {
        let data = serde_json::to_string(&pattern.pattern_data)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO learning_patterns
                 (id, pattern_type, pattern_data, confidence_score, usage_count, last_used, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(pattern_type) DO UPDATE SET
                 pattern_data = excluded.pattern_data,
                 confidence_score = excluded.confidence_score,
                 usage_count = excluded.usage_count,
                 last_used = excluded.last_used",
            params![
                pattern.id,
                pattern.pattern_type,
                data,
                pattern.confidence_score,
                pattern.usage_count,
                format_timestamp(&pattern.last_used),
                format_timestamp(&pattern.created_at)
            ],
        )?;
        Ok(())
    }

    async fn patterns_by_type(
        &self,
        pattern_type: &str,
        limit: usize,
    ) -> PresageResult<Vec<LearningPattern>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM learning_patterns
             WHERE pattern_type = ?
             ORDER BY confidence_score DESC, usage_count DESC
             LIMIT ?",
            PATTERN_COLUMNS
        ))?;

        let patterns = stmt
            .query_map(params![pattern_type, limit as i64], pattern_from_row)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(patterns)
    }

    async fn patterns_above(
        &self,
        min_confidence: f64,
        limit: usize,
    ) -> PresageResult<Vec<LearningPattern>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM learning_patterns
             WHERE confidence_score >= ?
             ORDER BY confidence_score DESC, usage_count DESC
             LIMIT ?",
            PATTERN_COLUMNS
        ))?;

        let patterns = stmt
            .query_map(params![min_confidence, limit as i64], pattern_from_row)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(patterns)
    }

    async fn all_patterns(&self) -> PresageResult<Vec<LearningPattern>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM learning_patterns ORDER BY confidence_score DESC",
            PATTERN_COLUMNS
        ))?;

        let patterns = stmt
            .query_map([], pattern_from_row)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(patterns)
    }

    async fn insert_insight(&self, insight: &NewInsight) -> PresageResult<PredictiveInsight> {
        let data = serde_json::to_string(&insight.insight_data)?;
        let created_at = Utc::now();
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO predictive_insights
                 (analysis_type, data_source, insight_data, confidence_score,
                  severity, forecast_horizon, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                insight.analysis_type.to_string(),
                insight.data_source,
                data,
                insight.confidence_score,
                insight.severity.to_string(),
                insight.forecast_horizon.map(|h| h.to_string()),
                format_timestamp(&created_at)
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(insight.clone().into_insight(id, created_at))
    }

    async fn recent_insights(
        &self,
        data_source: Option<&str>,
        limit: usize,
    ) -> PresageResult<Vec<PredictiveInsight>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM predictive_insights
             WHERE (?1 IS NULL OR data_source = ?1)
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
            INSIGHT_COLUMNS
        ))?;

        let insights = stmt
            .query_map(params![data_source, limit as i64], insight_from_row)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(insights)
    }

    async fn insert_audit(&self, entry: &AuditEntry) -> PresageResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO analysis_audit
                 (run_id, data_source, action, input_size, anomalies_found,
                  forecasts_generated, insights_recorded, window_digest, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.run_id,
                entry.data_source,
                entry.action,
                entry.input_size as i64,
                entry.anomalies_found as i64,
                entry.forecasts_generated as i64,
                entry.insights_recorded as i64,
                entry.window_digest,
                format_timestamp(&entry.created_at)
            ],
        )?;
        Ok(())
    }

    async fn recent_audit(&self, limit: usize) -> PresageResult<Vec<AuditEntry>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT run_id, data_source, action, input_size, anomalies_found,
                    forecasts_generated, insights_recorded, window_digest, created_at
             FROM analysis_audit
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?",
        )?;

        let entries = stmt
            .query_map(params![limit as i64], |row| {
                Ok(AuditEntry {
                    run_id: row.get(0)?,
                    data_source: row.get(1)?,
                    action: row.get(2)?,
                    input_size: row.get::<_, i64>(3)? as usize,
                    anomalies_found: row.get::<_, i64>(4)? as usize,
                    forecasts_generated: row.get::<_, i64>(5)? as usize,
                    insights_recorded: row.get::<_, i64>(6)? as usize,
                    window_digest: row.get(7)?,
                    created_at: row
                        .get::<_, String>(8)?
                        .parse()
                        .unwrap_or_else(|_| Utc::now()),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(entries)
    }

    async fn insert_experience(&self, experience: &LearningExperience) -> PresageResult<()> {
        let context = serde_json::to_string(&experience.context)?;
        let outcome = serde_json::to_string(&experience.outcome)?;
        let metadata = serde_json::to_string(&experience.metadata)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO learning_experiences
                 (timestamp, context, action_taken, outcome, reward, confidence, metadata)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                format_timestamp(&experience.timestamp),
                context,
                experience.action_taken,
                outcome,
                experience.reward,
                experience.confidence,
                metadata
            ],
        )?;
        Ok(())
    }

    async fn experience_stats(&self) -> PresageResult<ExperienceStats> {
        let conn = self.conn.lock().await;
        let stats = conn.query_row(
            "SELECT COUNT(*), COALESCE(AVG(reward), 0.0), COALESCE(AVG(confidence), 0.0)
             FROM learning_experiences",
            [],
            |row| {
                Ok(ExperienceStats {
                    total: row.get::<_, i64>(0)? as usize,
                    mean_reward: row.get(1)?,
                    mean_confidence: row.get(2)?,
                })
            },
        )?;
        Ok(stats)
    }

    async fn counts(&self) -> PresageResult<StoreCounts> {
        let conn = self.conn.lock().await;
        let count = |table: &str| -> PresageResult<usize> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
            Ok(n as usize)
        };

        Ok(StoreCounts {
            observations: count("observations")?,
            patterns: count("learning_patterns")?,
            insights: count("predictive_insights")?,
            audit_entries: count("analysis_audit")?,
            experiences: count("learning_experiences")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use tempfile::tempdir;

    fn pattern(pattern_type: &str, confidence: f64) -> LearningPattern {
        let now = Utc::now();
        LearningPattern {
            id: uuid::Uuid::new_v4().to_string(),
            pattern_type: pattern_type.to_string(),
            pattern_data: json!({"service": "openai"}),
            confidence_score: confidence,
            usage_count: 1,
            last_used: now,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_open_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("presage.db");
        let repo = SqliteRepository::open(&path).unwrap();

        assert!(path.exists());
        assert_eq!(repo.counts().await.unwrap(), StoreCounts::default());
    }

    #[tokio::test]
    async fn test_observations_newest_first() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();

        for i in 0..5 {
            let obs = Observation::new("mining", base + Duration::hours(i))
                .with_field("hashrate", 800 + i);
            repo.insert_observation(&obs).await.unwrap();
        }
        let other = Observation::new("tasks", base).with_field("completion_time_secs", 3);
        repo.insert_observation(&other).await.unwrap();

        let window = repo.query_observations("mining", 3).await.unwrap();
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].value("hashrate"), Some(804.0));
        assert_eq!(window[2].value("hashrate"), Some(802.0));
        assert!(window.iter().all(|o| o.source == "mining"));
    }

    #[tokio::test]
    async fn test_upsert_keeps_identity() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let first = pattern("rate_limit_hit", 0.5);
        repo.upsert_pattern(&first).await.unwrap();

        let mut second = pattern("rate_limit_hit", 0.55);
        second.usage_count = 2;
        second.pattern_data = json!({"service": "discord"});
        repo.upsert_pattern(&second).await.unwrap();

        let stored = repo.find_pattern("rate_limit_hit").await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.usage_count, 2);
        assert_eq!(stored.confidence_score, 0.55);
        assert_eq!(stored.pattern_data, json!({"service": "discord"}));
        assert_eq!(repo.counts().await.unwrap().patterns, 1);
    }

    #[tokio::test]
    async fn test_patterns_above_threshold() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        for (t, c) in [("a", 0.9), ("b", 0.7), ("c", 0.69), ("d", 1.0)] {
            repo.upsert_pattern(&pattern(t, c)).await.unwrap();
        }

        let above = repo.patterns_above(0.7, 200).await.unwrap();
        let types: Vec<_> = above.iter().map(|p| p.pattern_type.as_str()).collect();
        assert_eq!(types, vec!["d", "a", "b"]);

        let limited = repo.patterns_above(0.0, 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_insights_filter_by_source() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        for source in ["tasks", "mining", "tasks"] {
            let insight = NewInsight {
                analysis_type: AnalysisType::Anomaly,
                data_source: source.to_string(),
                insight_data: json!({"type": "tasks_spike"}),
                confidence_score: 0.8,
                severity: Severity::Warning,
                forecast_horizon: None,
            };
            repo.insert_insight(&insight).await.unwrap();
        }

        let tasks = repo.recent_insights(Some("tasks"), 10).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks[0].id > tasks[1].id);
        assert_eq!(tasks[0].severity, Severity::Warning);

        let all = repo.recent_insights(None, 10).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_forecast_horizon_persisted() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let insight = NewInsight {
            analysis_type: AnalysisType::Forecast,
            data_source: "mining".to_string(),
            insight_data: json!({"forecasts": []}),
            confidence_score: 1.0,
            severity: Severity::Info,
            forecast_horizon: Some(ForecastHorizon::H72),
        };
        repo.insert_insight(&insight).await.unwrap();

        let stored = repo.recent_insights(Some("mining"), 1).await.unwrap();
        assert_eq!(stored[0].analysis_type, AnalysisType::Forecast);
        assert_eq!(stored[0].forecast_horizon, Some(ForecastHorizon::H72));
    }

    #[tokio::test]
    async fn test_experience_stats() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        assert_eq!(repo.experience_stats().await.unwrap().total, 0);

        for reward in [0.5, 1.0] {
            let exp = LearningExperience {
                timestamp: Utc::now(),
                context: json!({"pattern_type": "x"}),
                action_taken: "pattern_recorded".to_string(),
                outcome: json!({}),
                reward,
                confidence: reward,
                metadata: Value::Null,
            };
            repo.insert_experience(&exp).await.unwrap();
        }

        let stats = repo.experience_stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert!((stats.mean_reward - 0.75).abs() < 1e-9);
    }
}
