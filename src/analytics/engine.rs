//! Trait do runtime numérico e implementação in-process.

use async_trait::async_trait;

use super::detector::AnomalyDetector;
use super::forecaster::Forecaster;
use super::recognizer::PatternRecognizer;
use super::stats::extract_series;
use crate::types::config::AnalysisConfig;
use crate::types::requests::{AnalysisAction, AnalysisPayload};
use crate::types::responses::AnalysisOutput;
use crate::PresageResult;

/// Runtime numérico: detecção, previsão e reconhecimento de padrões.
///
/// Implementações:
/// - [`InProcessEngine`]: rotinas estatísticas no próprio processo
/// - [`super::ExternalEngine`]: processo externo via JSON em stdin/stdout
#[async_trait]
pub trait NumericEngine: Send + Sync {
    /// Nome do engine (para logs e status).
    fn name(&self) -> &str;

    /// Executa a ação do payload sobre a janela.
    async fn analyze(&self, payload: &AnalysisPayload) -> PresageResult<AnalysisOutput>;
}

/// Engine in-process.
#[derive(Debug, Clone)]
pub struct InProcessEngine {
    detector: AnomalyDetector,
    forecaster: Forecaster,
    recognizer: PatternRecognizer,
}

impl Default for InProcessEngine {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl InProcessEngine {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            detector: AnomalyDetector::from_config(config),
            forecaster: Forecaster::from_config(config),
            recognizer: PatternRecognizer::new(config.min_samples),
        }
    }

    /// Execução síncrona (o trabalho é puramente de CPU e limitado pela janela).
    pub fn run(&self, payload: &AnalysisPayload) -> AnalysisOutput {
        let source = payload.data_source.as_str();
        match payload.action {
            AnalysisAction::AnalyzeCurrent => {
                let series = extract_series(&payload.data, payload.metric.as_deref());
                AnalysisOutput::anomalies(self.detector.detect(source, &series))
            }
            AnalysisAction::Forecast24h | AnalysisAction::Forecast72h => {
                let hours = payload.action.horizon().map(|h| h.hours()).unwrap_or(24);
                let series = extract_series(&payload.data, payload.metric.as_deref());
                AnalysisOutput::forecast(self.forecaster.forecast(&series, hours), hours)
            }
            AnalysisAction::DetectPatterns => {
                AnalysisOutput::anomalies(self.recognizer.detect(source, &payload.data))
            }
        }
    }
}

#[async_trait]
impl NumericEngine for InProcessEngine {
    fn name(&self) -> &str {
        "in_process"
    }

    async fn analyze(&self, payload: &AnalysisPayload) -> PresageResult<AnalysisOutput> {
        Ok(self.run(payload))
    }
}
