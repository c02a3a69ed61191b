//! Pipeline de análise e montagem dos serviços.
//!
//! [`Services`] constrói explicitamente cada componente a partir da
//! configuração e os injeta uns nos outros; não há estado global.
//! [`AnalysisRunner::run_analysis`] é a superfície de gatilho:
//! janela → runtime numérico → insights → auditoria → reforço.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::analytics::{build_engine, NumericEngine};
use crate::insights::{InsightRecorder, RunContext};
use crate::learning::{ExperienceSink, PatternStore, RepositoryExperienceHandler, SinkStats};
use crate::sources::MetricsSourceAdapter;
use crate::store::{open_repository, Repository, StoreCounts};
use crate::types::config::Config;
use crate::types::records::{ExperienceStats, Observation};
use crate::types::requests::{AnalysisAction, AnalysisPayload};
use crate::types::responses::{AnalysisOutput, AnalysisResponse, RunReport};
use crate::{PresageError, PresageResult};

/// Executor de análises.
#[derive(Clone)]
pub struct AnalysisRunner {
    sources: MetricsSourceAdapter,
    engine: Arc<dyn NumericEngine>,
    recorder: InsightRecorder,
    engine_timeout: Duration,
}

impl AnalysisRunner {
    pub fn new(
        sources: MetricsSourceAdapter,
        engine: Arc<dyn NumericEngine>,
        recorder: InsightRecorder,
        engine_timeout: Duration,
    ) -> Self {
        Self {
            sources,
            engine,
            recorder,
            engine_timeout,
        }
    }

    /// Nome do engine em uso.
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Executa uma análise.
    ///
    /// Falha com `UnsupportedAction` (sem nada gravado) para ações
    /// desconhecidas, e com `TransportFailure`/`MalformedResult` quando a
    /// busca ou o runtime numérico falham. Não há retry.
    pub async fn run_analysis(
        &self,
        action: &str,
        data_source: &str,
        custom_data: Option<Vec<Observation>>,
    ) -> PresageResult<AnalysisResponse> {
        let action: AnalysisAction = action.parse().map_err(|e: PresageError| {
            tracing::error!(action = %action, data_source = %data_source, error = %e, "Rejected analysis run");
            e
        })?;

        let run_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(run_id = %run_id, action = %action, data_source = %data_source, "Analysis run started");

        match self.execute(&run_id, action, data_source, custom_data).await {
            Ok(report) => {
                tracing::info!(
                    run_id = %run_id,
                    action = %action,
                    data_source = %data_source,
                    data_points = report.data_points,
                    anomalies = report.anomalies_found,
                    forecasts = report.forecasts_generated,
                    insights = report.insights_recorded,
                    "Analysis run finished"
                );
                Ok(AnalysisResponse {
                    success: true,
                    result: report,
                })
            }
            Err(e) => {
                tracing::error!(run_id = %run_id, action = %action, data_source = %data_source, error = %e, "Analysis run failed");
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        run_id: &str,
        action: AnalysisAction,
        data_source: &str,
        custom_data: Option<Vec<Observation>>,
    ) -> PresageResult<RunReport> {
        let window = self.sources.resolve_window(data_source, custom_data).await?;
        let metric = self.sources.metric_for(data_source).map(str::to_string);
        let payload = AnalysisPayload::new(data_source, action, metric, window);

        let output = tokio::time::timeout(self.engine_timeout, self.engine.analyze(&payload))
            .await
            .map_err(|_| {
                PresageError::transport(format!(
                    "runtime numérico '{}' excedeu {}s",
                    self.engine.name(),
                    self.engine_timeout.as_secs()
                ))
            })??;
        let output = normalize_output(action, output);

        let ctx = RunContext {
            run_id,
            action,
            data_source,
            window: &payload.data,
        };
        let insights_recorded = self.recorder.record(ctx, &output).await?;

        Ok(RunReport {
            run_id: run_id.to_string(),
            action,
            data_source: data_source.to_string(),
            data_points: payload.data.len(),
            anomalies_found: output.anomalies.len(),
            forecasts_generated: output.forecasts.len(),
            insights_recorded,
            output,
        })
    }
}

/// Mantém apenas a parte da saída que corresponde à ação.
fn normalize_output(action: AnalysisAction, mut output: AnalysisOutput) -> AnalysisOutput {
    match action.horizon() {
        Some(horizon) => {
            output.anomalies.clear();
            output.horizon_hours.get_or_insert(horizon.hours());
        }
        None => {
            output.forecasts.clear();
            output.trend = None;
            output.horizon_hours = None;
        }
    }
    output
}

/// Fonte registrada, como aparece no status.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub metric: Option<String>,
}

/// Estado do serviço (ferramenta `presage_status` e comando `status`).
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub version: String,
    pub repository: String,
    pub engine: String,
    pub learning_enabled: bool,
    pub sources: Vec<SourceStatus>,
    pub counts: Option<StoreCounts>,
    pub experiences: Option<ExperienceStats>,
    pub sink: SinkStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Componentes montados a partir da configuração.
pub struct Services {
    pub config: Config,
    pub repo: Arc<dyn Repository>,
    pub sink: ExperienceSink,
    pub patterns: PatternStore,
    pub sources: MetricsSourceAdapter,
    pub runner: AnalysisRunner,
    worker: Option<JoinHandle<()>>,
}

impl Services {
    /// Abre o repositório configurado e monta os serviços.
    ///
    /// Precisa de um runtime tokio ativo (o worker do sink é iniciado aqui).
    pub fn build(config: Config) -> PresageResult<Self> {
        let repo = open_repository(&config)?;
        let engine = build_engine(&config);
        Ok(Self::with_parts(config, repo, engine))
    }

    /// Monta os serviços sobre um repositório e engine já construídos.
    pub fn with_parts(
        config: Config,
        repo: Arc<dyn Repository>,
        engine: Arc<dyn NumericEngine>,
    ) -> Self {
        let (sink, worker) = if config.learning.enabled {
            let handler = Arc::new(RepositoryExperienceHandler::new(Arc::clone(&repo)));
            let (sink, worker) = ExperienceSink::spawn(handler, config.learning.sink_capacity);
            (sink, Some(worker))
        } else {
            (ExperienceSink::disabled(), None)
        };

        let patterns = PatternStore::new(Arc::clone(&repo), sink.clone(), &config.learning);
        let sources = MetricsSourceAdapter::new(Arc::clone(&repo), &config);
        let recorder = InsightRecorder::new(
            Arc::clone(&repo),
            patterns.clone(),
            config.learning.enabled && config.learning.reinforce_on_insight,
        );
        let runner = AnalysisRunner::new(
            sources.clone(),
            engine,
            recorder,
            Duration::from_secs(config.engine.timeout_secs.max(1)),
        );

        tracing::debug!(
            repository = repo.name(),
            engine = runner.engine_name(),
            learning = config.learning.enabled,
            "Services ready"
        );

        Self {
            config,
            repo,
            sink,
            patterns,
            sources,
            runner,
            worker,
        }
    }

    /// Estado atual. Falhas do repositório aparecem em `error`.
    pub async fn status(&self) -> StatusReport {
        let mut errors = Vec::new();
        let counts = self
            .repo
            .counts()
            .await
            .map_err(|e| errors.push(e.to_string()))
            .ok();
        let experiences = self
            .repo
            .experience_stats()
            .await
            .map_err(|e| errors.push(e.to_string()))
            .ok();

        StatusReport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            repository: self.repo.name().to_string(),
            engine: self.runner.engine_name().to_string(),
            learning_enabled: self.config.learning.enabled,
            sources: self
                .sources
                .source_names()
                .map(|name| SourceStatus {
                    name: name.to_string(),
                    metric: self.sources.metric_for(name).map(str::to_string),
                })
                .collect(),
            counts,
            experiences,
            sink: self.sink.stats(),
            error: (!errors.is_empty()).then(|| errors.join("; ")),
        }
    }

    /// Espera a fila de experiências esvaziar e encerra o worker.
    pub async fn shutdown(mut self, timeout: Duration) {
        if !self.sink.drain(timeout).await {
            tracing::warn!(pending = self.sink.stats().pending(), "Learning queue not drained before shutdown");
        }
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}
