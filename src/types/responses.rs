//! Tipos de resposta do Presage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::records::{lenient_timestamp, Severity};
use super::requests::AnalysisAction;

/// Confiança atribuída a uma anomalia quando a detecção não especifica outra.
pub const DEFAULT_ANOMALY_CONFIDENCE: f64 = 0.7;

fn default_anomaly_confidence() -> f64 {
    DEFAULT_ANOMALY_CONFIDENCE
}

// ═══════════════════════════════════════════════════════════════════════════
// Anomalias
// ═══════════════════════════════════════════════════════════════════════════

/// Dados de suporte de uma anomalia.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnomalyData {
    /// Confiança da detecção (0.0 - 1.0).
    #[serde(default = "default_anomaly_confidence")]
    pub confidence: f64,

    /// Detalhes específicos do método de detecção.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Default for AnomalyData {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_ANOMALY_CONFIDENCE,
            details: Map::new(),
        }
    }
}

impl AnomalyData {
    /// Define a confiança.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Adiciona um detalhe.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Uma anomalia encontrada pelo detector ou pelo reconhecedor de padrões.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnomalyRecord {
    /// Rótulo de classificação (ex: `tasks_spike`, `system_saturation`).
    #[serde(rename = "type")]
    pub anomaly_type: String,

    /// Descrição legível.
    pub description: String,

    /// Severidade.
    pub severity: Severity,

    /// Dados de suporte.
    #[serde(default)]
    pub data: AnomalyData,
}

impl AnomalyRecord {
    /// Cria uma nova anomalia com dados padrão.
    pub fn new(
        anomaly_type: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            anomaly_type: anomaly_type.into(),
            description: description.into(),
            severity,
            data: AnomalyData::default(),
        }
    }

    /// Define os dados de suporte.
    #[must_use]
    pub fn with_data(mut self, data: AnomalyData) -> Self {
        self.data = data;
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Previsões
// ═══════════════════════════════════════════════════════════════════════════

/// Projeção pontual.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastPoint {
    #[serde(deserialize_with = "lenient_timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    #[serde(alias = "forecast")]
    pub value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub confidence: f64,
}

/// Direção da tendência.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "increasing"),
            TrendDirection::Decreasing => write!(f, "decreasing"),
            TrendDirection::Stable => write!(f, "stable"),
            TrendDirection::InsufficientData => write!(f, "insufficient_data"),
        }
    }
}

/// Resumo da tendência da janela observada.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trend {
    #[serde(alias = "trend")]
    pub direction: TrendDirection,
    /// Inclinação por hora.
    #[serde(default)]
    pub slope: f64,
    /// |inclinação por intervalo| / desvio padrão.
    #[serde(default)]
    pub strength: f64,
    #[serde(default)]
    pub r_squared: f64,
    /// Qualidade do ajuste (0.0 - 1.0).
    #[serde(default)]
    pub confidence: f64,
}

impl Trend {
    /// Tendência para janelas pequenas demais.
    pub fn insufficient_data() -> Self {
        Self {
            direction: TrendDirection::InsufficientData,
            slope: 0.0,
            strength: 0.0,
            r_squared: 0.0,
            confidence: 0.0,
        }
    }
}

/// Resultado de uma previsão.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastResult {
    pub forecasts: Vec<ForecastPoint>,
    pub trend: Trend,
}

// ═══════════════════════════════════════════════════════════════════════════
// Saída do runtime numérico e resposta do gatilho
// ═══════════════════════════════════════════════════════════════════════════

/// Saída de uma análise (interna ou externa).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisOutput {
    /// Anomalias. `patterns` e `bottlenecks` são aceitos como sinônimos na
    /// saída do runtime externo.
    #[serde(default, alias = "patterns", alias = "bottlenecks")]
    pub anomalies: Vec<AnomalyRecord>,

    #[serde(default)]
    pub forecasts: Vec<ForecastPoint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizon_hours: Option<u32>,

    #[serde(
        default = "Utc::now",
        alias = "analyzed_at",
        deserialize_with = "lenient_timestamp::deserialize"
    )]
    pub generated_at: DateTime<Utc>,
}

impl AnalysisOutput {
    /// Saída contendo apenas anomalias.
    pub fn anomalies(anomalies: Vec<AnomalyRecord>) -> Self {
        Self {
            anomalies,
            forecasts: Vec::new(),
            trend: None,
            horizon_hours: None,
            generated_at: Utc::now(),
        }
    }

    /// Saída contendo uma previsão.
    pub fn forecast(result: ForecastResult, horizon_hours: u32) -> Self {
        Self {
            anomalies: Vec::new(),
            forecasts: result.forecasts,
            trend: Some(result.trend),
            horizon_hours: Some(horizon_hours),
            generated_at: Utc::now(),
        }
    }
}

/// Relatório de uma execução de `run_analysis`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub action: AnalysisAction,
    pub data_source: String,
    pub data_points: usize,
    pub anomalies_found: usize,
    pub forecasts_generated: usize,
    pub insights_recorded: usize,
    pub output: AnalysisOutput,
}

/// Resposta do gatilho: `{success, result}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub result: RunReport,
}
