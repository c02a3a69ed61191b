//! Tipos de requisição do Presage.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::records::{ForecastHorizon, Observation};
use crate::PresageError;

/// Ação de análise solicitada pelo gatilho externo.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisAction {
    /// Detecção de anomalias sobre a janela atual.
    AnalyzeCurrent,
    /// Previsão para as próximas 24h.
    #[serde(rename = "forecast_24h")]
    Forecast24h,
    /// Previsão para as próximas 72h.
    #[serde(rename = "forecast_72h")]
    Forecast72h,
    /// Reconhecimento de padrões estruturais (gargalos, votação coordenada).
    DetectPatterns,
}

impl AnalysisAction {
    /// Nome canônico da ação.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisAction::AnalyzeCurrent => "analyze_current",
            AnalysisAction::Forecast24h => "forecast_24h",
            AnalysisAction::Forecast72h => "forecast_72h",
            AnalysisAction::DetectPatterns => "detect_patterns",
        }
    }

    /// Horizonte da previsão, se a ação for de previsão.
    pub fn horizon(&self) -> Option<ForecastHorizon> {
        match self {
            AnalysisAction::Forecast24h => Some(ForecastHorizon::H24),
            AnalysisAction::Forecast72h => Some(ForecastHorizon::H72),
            _ => None,
        }
    }

    /// Se a ação produz anomalias (e não previsões).
    pub fn is_anomaly_scan(&self) -> bool {
        matches!(
            self,
            AnalysisAction::AnalyzeCurrent | AnalysisAction::DetectPatterns
        )
    }
}

impl FromStr for AnalysisAction {
    type Err = PresageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "analyze_current" => Ok(AnalysisAction::AnalyzeCurrent),
            "forecast_24h" => Ok(AnalysisAction::Forecast24h),
            "forecast_72h" => Ok(AnalysisAction::Forecast72h),
            "detect_patterns" => Ok(AnalysisAction::DetectPatterns),
            other => Err(PresageError::UnsupportedAction(other.to_string())),
        }
    }
}

impl std::fmt::Display for AnalysisAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entrada serializada entregue ao runtime numérico.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisPayload {
    /// Fonte de dados analisada.
    pub data_source: String,

    /// Ação solicitada.
    pub action: AnalysisAction,

    /// Campo numérico usado como valor da série.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,

    /// Janela de observações (mais recentes primeiro).
    pub data: Vec<Observation>,
}

impl AnalysisPayload {
    /// Cria um novo payload.
    pub fn new(
        data_source: impl Into<String>,
        action: AnalysisAction,
        metric: Option<String>,
        data: Vec<Observation>,
    ) -> Self {
        Self {
            data_source: data_source.into(),
            action,
            metric,
            data,
        }
    }
}
