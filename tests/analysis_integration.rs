//! Testes de integração do pipeline de análise.

use std::sync::Arc;

use chrono::{Duration, Utc};
use presage::analytics::{ExternalEngine, InProcessEngine, NumericEngine};
use presage::store::{MemoryRepository, Repository, SqliteRepository};
use presage::types::config::Config;
use presage::types::records::{AnalysisType, Observation, Severity};
use presage::types::responses::TrendDirection;
use presage::{PresageError, Services};

fn in_process(config: &Config) -> Arc<dyn NumericEngine> {
    Arc::new(InProcessEngine::from_config(&config.analysis))
}

fn services_on(repo: Arc<dyn Repository>) -> Services {
    let config = Config::default();
    let engine = in_process(&config);
    Services::with_parts(config, repo, engine)
}

async fn seed(repo: &dyn Repository, source: &str, metric: &str, values: &[f64]) {
    let now = Utc::now();
    for (i, value) in values.iter().enumerate() {
        let obs = Observation::new(source, now - Duration::minutes(i as i64)).with_field(metric, *value);
        repo.insert_observation(&obs).await.unwrap();
    }
}

/// 14 leituras entre 100 e 102; a mais recente é `latest`.
fn hashrate_window(latest: f64) -> Vec<f64> {
    std::iter::once(latest)
        .chain((1..15).map(|i| 100.0 + (i % 3) as f64))
        .collect()
}

#[tokio::test]
async fn test_tenfold_spike_records_one_anomaly() {
    let repo = Arc::new(SqliteRepository::open_in_memory().unwrap());
    seed(repo.as_ref(), "mining", "hashrate", &hashrate_window(1000.0)).await;
    let services = services_on(repo.clone());

    let response = services
        .runner
        .run_analysis("analyze_current", "mining", None)
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.result.data_points, 15);
    assert_eq!(response.result.anomalies_found, 1);
    assert_eq!(response.result.insights_recorded, 1);
    assert_eq!(response.result.output.anomalies[0].anomaly_type, "mining_spike");

    let insights = repo.recent_insights(Some("mining"), 10).await.unwrap();
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0].analysis_type, AnalysisType::Anomaly);
    assert_eq!(insights[0].severity, Severity::Critical);

    let audit = repo.recent_audit(10).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].insights_recorded, 1);
    assert_eq!(audit[0].window_digest.len(), 64);

    services.shutdown(std::time::Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_slow_task_records_one_anomaly() {
    let repo = Arc::new(MemoryRepository::new());
    // Mediana de 30s; a task mais recente levou 300s.
    let durations: Vec<f64> = std::iter::once(300.0)
        .chain((1..15).map(|i| 29.0 + (i % 3) as f64))
        .collect();
    seed(repo.as_ref(), "tasks", "completion_time_secs", &durations).await;
    let services = services_on(repo.clone());

    let response = services
        .runner
        .run_analysis("analyze_current", "tasks", None)
        .await
        .unwrap();

    assert_eq!(response.result.anomalies_found, 1);
    assert_eq!(response.result.insights_recorded, 1);
    let anomaly = &response.result.output.anomalies[0];
    assert_eq!(anomaly.anomaly_type, "tasks_spike");
    assert_eq!(anomaly.data.details["value"], serde_json::json!(300.0));

    let insights = repo.recent_insights(Some("tasks"), 10).await.unwrap();
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0].severity, Severity::Critical);
    assert_eq!(repo.counts().await.unwrap().audit_entries, 1);
}

#[tokio::test]
async fn test_steady_window_is_audited_without_insights() {
    let repo = Arc::new(MemoryRepository::new());
    seed(repo.as_ref(), "mining", "hashrate", &hashrate_window(101.0)).await;
    let services = services_on(repo.clone());

    let response = services
        .runner
        .run_analysis("analyze_current", "mining", None)
        .await
        .unwrap();

    assert_eq!(response.result.anomalies_found, 0);
    assert_eq!(response.result.insights_recorded, 0);

    let counts = repo.counts().await.unwrap();
    assert_eq!(counts.insights, 0);
    assert_eq!(counts.audit_entries, 1);
    assert_eq!(counts.patterns, 0);
}

#[tokio::test]
async fn test_small_window_yields_nothing() {
    let repo = Arc::new(MemoryRepository::new());
    seed(repo.as_ref(), "mining", "hashrate", &[100.0, 100.0, 5000.0]).await;
    let services = services_on(repo.clone());

    let response = services
        .runner
        .run_analysis("analyze_current", "mining", None)
        .await
        .unwrap();

    assert_eq!(response.result.data_points, 3);
    assert_eq!(response.result.anomalies_found, 0);
    assert_eq!(repo.counts().await.unwrap().audit_entries, 1);
}

#[tokio::test]
async fn test_unsupported_action_writes_nothing() {
    let repo = Arc::new(MemoryRepository::new());
    seed(repo.as_ref(), "mining", "hashrate", &hashrate_window(1000.0)).await;
    let services = services_on(repo.clone());

    let err = services
        .runner
        .run_analysis("bad_action", "mining", None)
        .await
        .unwrap_err();

    assert!(matches!(err, PresageError::UnsupportedAction(ref a) if a == "bad_action"));
    let counts = repo.counts().await.unwrap();
    assert_eq!(counts.insights, 0);
    assert_eq!(counts.audit_entries, 0);
}

#[tokio::test]
async fn test_flat_forecast_is_stable() {
    let repo = Arc::new(MemoryRepository::new());
    seed(repo.as_ref(), "mining", "hashrate", &[250.0; 12]).await;
    let services = services_on(repo.clone());

    let response = services
        .runner
        .run_analysis("forecast_72h", "mining", None)
        .await
        .unwrap();

    let output = &response.result.output;
    assert_eq!(response.result.forecasts_generated, 72);
    assert_eq!(output.horizon_hours, Some(72));
    assert!(output.anomalies.is_empty());
    assert_eq!(output.trend.as_ref().unwrap().direction, TrendDirection::Stable);
    assert!(output.forecasts.iter().all(|p| (p.value - 250.0).abs() < 1e-9));

    let insights = repo.recent_insights(Some("mining"), 10).await.unwrap();
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0].analysis_type, AnalysisType::Forecast);
    assert_eq!(insights[0].severity, Severity::Info);
}

#[tokio::test]
async fn test_forecast_with_custom_data() {
    let services = services_on(Arc::new(MemoryRepository::new()));
    let now = Utc::now();
    let data: Vec<Observation> = (0..12)
        .map(|i| {
            Observation::new("", now - Duration::hours(i))
                .with_field("completion_time_secs", 100.0 - 5.0 * i as f64)
        })
        .collect();

    let response = services
        .runner
        .run_analysis("forecast_24h", "tasks", Some(data))
        .await
        .unwrap();

    assert_eq!(response.result.forecasts_generated, 24);
    assert_eq!(
        response.result.output.trend.as_ref().unwrap().direction,
        TrendDirection::Increasing
    );
}

#[tokio::test]
async fn test_repository_outage_is_transport_failure() {
    let repo = Arc::new(MemoryRepository::new());
    repo.set_offline(true);
    let services = services_on(repo);

    let err = services
        .runner
        .run_analysis("analyze_current", "tasks", None)
        .await
        .unwrap_err();
    assert!(err.is_transport_failure(), "{}", err);
}

#[tokio::test]
async fn test_missing_external_runtime_is_transport_failure() {
    let repo = Arc::new(MemoryRepository::new());
    seed(repo.as_ref(), "mining", "hashrate", &hashrate_window(1000.0)).await;
    let engine = Arc::new(ExternalEngine::new("presage-runtime-that-does-not-exist", Vec::new()));
    let services = Services::with_parts(Config::default(), repo.clone(), engine);

    let err = services
        .runner
        .run_analysis("analyze_current", "mining", None)
        .await
        .unwrap_err();

    assert!(err.is_transport_failure(), "{}", err);
    assert_eq!(repo.counts().await.unwrap().audit_entries, 0);
}

#[tokio::test]
async fn test_detect_patterns_finds_overloaded_agent() {
    let repo = Arc::new(MemoryRepository::new());
    let now = Utc::now();
    let agents = [("a1", "BUSY", 10), ("a2", "BUSY", 1), ("a3", "IDLE", 1), ("a4", "IDLE", 1), ("a5", "IDLE", 1)];
    for (i, (id, status, tasks)) in agents.iter().enumerate() {
        let obs = Observation::new("agents", now - Duration::seconds(i as i64))
            .with_field("agent_id", *id)
            .with_field("status", *status)
            .with_field("assigned_tasks", *tasks);
        repo.insert_observation(&obs).await.unwrap();
    }
    let services = services_on(repo.clone());

    let response = services
        .runner
        .run_analysis("detect_patterns", "agents", None)
        .await
        .unwrap();

    assert_eq!(response.result.anomalies_found, 1);
    assert_eq!(response.result.output.anomalies[0].anomaly_type, "overloaded_agents");
    assert_eq!(response.result.output.anomalies[0].severity, Severity::Warning);

    let pattern = repo
        .find_pattern("detect_patterns:overloaded_agents")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pattern.usage_count, 1);
}

#[tokio::test]
async fn test_unknown_source_runs_on_empty_window() {
    let repo = Arc::new(MemoryRepository::new());
    let services = services_on(repo.clone());

    let response = services
        .runner
        .run_analysis("analyze_current", "weather", None)
        .await
        .unwrap();

    assert_eq!(response.result.data_points, 0);
    assert_eq!(response.result.insights_recorded, 0);
    assert_eq!(repo.counts().await.unwrap().audit_entries, 1);
}

#[tokio::test]
async fn test_detect_patterns_on_custom_agent_records() {
    let services = services_on(Arc::new(MemoryRepository::new()));
    let now = Utc::now().to_rfc3339();
    let records = serde_json::json!([
        {"id": 1, "created_at": now, "status": "BUSY", "assigned_tasks": 12},
        {"id": 2, "created_at": now, "status": "BUSY", "assigned_tasks": 1},
        {"id": 3, "created_at": now, "status": "IDLE", "assigned_tasks": 1},
        {"id": 4, "created_at": now, "status": "IDLE", "assigned_tasks": 0},
        {"id": 5, "created_at": now, "status": "IDLE", "assigned_tasks": 1}
    ]);
    let data: Vec<Observation> = serde_json::from_value(records).unwrap();

    let response = services
        .runner
        .run_analysis("detect_patterns", "agents", Some(data))
        .await
        .unwrap();

    assert_eq!(response.result.data_points, 5);
    assert_eq!(response.result.anomalies_found, 1);
    let anomaly = &response.result.output.anomalies[0];
    assert_eq!(anomaly.anomaly_type, "overloaded_agents");
    assert_eq!(anomaly.data.details["affected_agents"], serde_json::json!(["1"]));
}
