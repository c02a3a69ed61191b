//! Insight Recorder.
//!
//! Normaliza a saída do runtime numérico em insights persistidos, grava a
//! entrada de auditoria da execução e reforça os patterns correspondentes.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::learning::PatternStore;
use crate::store::Repository;
use crate::types::records::{AnalysisType, AuditEntry, NewInsight, Observation, Severity};
use crate::types::requests::AnalysisAction;
use crate::types::responses::AnalysisOutput;
use crate::PresageResult;

/// Contexto de uma execução de análise.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub run_id: &'a str,
    pub action: AnalysisAction,
    pub data_source: &'a str,
    pub window: &'a [Observation],
}

/// Insight Recorder.
#[derive(Clone)]
pub struct InsightRecorder {
    repo: Arc<dyn Repository>,
    patterns: PatternStore,
    reinforce: bool,
}

impl InsightRecorder {
    pub fn new(repo: Arc<dyn Repository>, patterns: PatternStore, reinforce: bool) -> Self {
        Self {
            repo,
            patterns,
            reinforce,
        }
    }

    /// Persiste os resultados da execução e retorna quantos insights foram gravados.
    ///
    /// - Varredura de anomalias: um insight por anomalia, nenhum se não houver.
    /// - Previsão: exatamente um insight com todas as projeções e a tendência,
    ///   marcado com o horizonte. Sem projeções, nenhum insight.
    ///
    /// A entrada de auditoria é gravada em todos os casos. Uma falha de
    /// escrita aborta a gravação; insights já inseridos permanecem.
    pub async fn record(&self, ctx: RunContext<'_>, output: &AnalysisOutput) -> PresageResult<usize> {
        let insights = build_insights(&ctx, output)?;

        for insight in &insights {
            let stored = self.repo.insert_insight(insight).await?;
            tracing::debug!(
                insight_id = stored.id,
                analysis_type = %stored.analysis_type,
                severity = %stored.severity,
                "Insight recorded"
            );
        }
        let recorded = insights.len();

        let entry = AuditEntry {
            run_id: ctx.run_id.to_string(),
            data_source: ctx.data_source.to_string(),
            action: ctx.action.to_string(),
            input_size: ctx.window.len(),
            anomalies_found: output.anomalies.len(),
            forecasts_generated: output.forecasts.len(),
            insights_recorded: recorded,
            window_digest: window_digest(ctx.window),
            created_at: Utc::now(),
        };
        self.repo.insert_audit(&entry).await?;

        if recorded > 0 && self.reinforce {
            self.reinforce_patterns(&ctx, output).await;
        }

        Ok(recorded)
    }

    async fn reinforce_patterns(&self, ctx: &RunContext<'_>, output: &AnalysisOutput) {
        if ctx.action.is_anomaly_scan() {
            let mut by_type: BTreeMap<&str, (usize, Severity)> = BTreeMap::new();
            for anomaly in &output.anomalies {
                let entry = by_type
                    .entry(anomaly.anomaly_type.as_str())
                    .or_insert((0, Severity::Info));
                entry.0 += 1;
                entry.1 = entry.1.max(anomaly.severity);
            }

            for (anomaly_type, (count, severity)) in by_type {
                self.patterns
                    .record_pattern(
                        &format!("{}:{}", ctx.action, anomaly_type),
                        json!({
                            "data_source": ctx.data_source,
                            "occurrences": count,
                            "max_severity": severity,
                            "run_id": ctx.run_id,
                        }),
                        None,
                    )
                    .await;
            }
        } else if let Some(trend) = &output.trend {
            self.patterns
                .record_pattern(
                    &format!("{}:{}", ctx.action, trend.direction),
                    json!({
                        "data_source": ctx.data_source,
                        "slope": trend.slope,
                        "confidence": trend.confidence,
                        "run_id": ctx.run_id,
                    }),
                    None,
                )
                .await;
        }
    }
}

fn build_insights(ctx: &RunContext<'_>, output: &AnalysisOutput) -> PresageResult<Vec<NewInsight>> {
    if ctx.action.is_anomaly_scan() {
        return output
            .anomalies
            .iter()
            .map(|anomaly| -> PresageResult<NewInsight> {
                Ok(NewInsight {
                    analysis_type: AnalysisType::Anomaly,
                    data_source: ctx.data_source.to_string(),
                    insight_data: serde_json::to_value(anomaly)?,
                    confidence_score: anomaly.data.confidence,
                    severity: anomaly.severity,
                    forecast_horizon: None,
                })
            })
            .collect();
    }

    if output.forecasts.is_empty() {
        return Ok(Vec::new());
    }

    let confidence = output.trend.as_ref().map(|t| t.confidence).unwrap_or(0.0);
    Ok(vec![NewInsight {
        analysis_type: AnalysisType::Forecast,
        data_source: ctx.data_source.to_string(),
        insight_data: json!({
            "forecasts": output.forecasts,
            "trend": output.trend,
            "horizon_hours": output.horizon_hours,
            "generated_at": output.generated_at,
        }),
        confidence_score: confidence.clamp(0.0, 1.0),
        severity: Severity::Info,
        forecast_horizon: ctx.action.horizon(),
    }])
}

/// SHA-256 (hex) da janela serializada.
pub fn window_digest(window: &[Observation]) -> String {
    let mut hasher = Sha256::new();
    match serde_json::to_vec(window) {
        Ok(bytes) => hasher.update(&bytes),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize window for digest"),
    }
    hex::encode(hasher.finalize())
}
