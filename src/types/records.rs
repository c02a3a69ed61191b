//! Registros persistidos e observações do Presage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ═══════════════════════════════════════════════════════════════════════════
// Observações
// ═══════════════════════════════════════════════════════════════════════════

/// Snapshot de uma entidade de domínio (task, agente, mineração...) em um instante.
///
/// Os campos do domínio ficam achatados ao lado de `created_at`, de modo que
/// `{"created_at": "...", "hashrate": 812.5}` desserializa diretamente.
/// `timestamp` é aceito como alias de `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    /// Identificador da observação.
    /// Aceita string ou número (ids de linha inteiros viram texto).
    #[serde(default = "new_observation_id", deserialize_with = "flexible_id::deserialize")]
    pub id: String,

    /// Fonte de dados de origem.
    #[serde(default)]
    pub source: String,

    /// Momento da observação (usado para ordenação e janela).
    #[serde(alias = "timestamp", deserialize_with = "lenient_timestamp::deserialize")]
    pub created_at: DateTime<Utc>,

    /// Campos do domínio.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

fn new_observation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Observation {
    /// Cria uma observação vazia para a fonte.
    pub fn new(source: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: new_observation_id(),
            source: source.into(),
            created_at,
            fields: Map::new(),
        }
    }

    /// Adiciona um campo.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Lê um campo numérico (aceita números e strings numéricas).
    pub fn value(&self, field: &str) -> Option<f64> {
        let value = match self.fields.get(field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }

    /// Lê um campo textual.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

/// Desserialização tolerante de instantes.
///
/// Aceita RFC 3339 e também datas sem fuso (`2025-03-01T10:00:00`),
/// interpretadas como UTC.
pub(crate) mod lenient_timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }
}

mod flexible_id {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(serde::de::Error::custom(format!(
                "invalid observation id {}, expected a string or a number",
                other
            ))),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Enums de classificação
// ═══════════════════════════════════════════════════════════════════════════

/// Severidade de um insight. A ordem de declaração define `info < warning < critical`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl Severity {
    pub(crate) fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "warning" => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

/// Tipo de análise que gerou um insight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    Anomaly,
    Forecast,
}

impl std::fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisType::Anomaly => write!(f, "anomaly"),
            AnalysisType::Forecast => write!(f, "forecast"),
        }
    }
}

impl AnalysisType {
    pub(crate) fn from_str(s: &str) -> Self {
        match s {
            "forecast" => AnalysisType::Forecast,
            _ => AnalysisType::Anomaly,
        }
    }
}

/// Horizonte de uma previsão.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ForecastHorizon {
    #[serde(rename = "24h")]
    H24,
    #[serde(rename = "72h")]
    H72,
}

impl ForecastHorizon {
    /// Horizonte em horas.
    pub fn hours(&self) -> u32 {
        match self {
            ForecastHorizon::H24 => 24,
            ForecastHorizon::H72 => 72,
        }
    }

    pub(crate) fn from_str(s: &str) -> Option<Self> {
        match s {
            "24h" => Some(ForecastHorizon::H24),
            "72h" => Some(ForecastHorizon::H72),
            _ => None,
        }
    }
}

impl std::fmt::Display for ForecastHorizon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}h", self.hours())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Patterns aprendidos
// ═══════════════════════════════════════════════════════════════════════════

/// Um pattern comportamental aprendido, reforçado a cada nova observação do mesmo tipo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearningPattern {
    pub id: String,
    pub pattern_type: String,
    pub pattern_data: Value,
    pub confidence_score: f64,
    pub usage_count: u32,
    pub last_used: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Insights
// ═══════════════════════════════════════════════════════════════════════════

/// Insight persistido (append-only).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictiveInsight {
    pub id: i64,
    pub analysis_type: AnalysisType,
    pub data_source: String,
    pub insight_data: Value,
    pub confidence_score: f64,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_horizon: Option<ForecastHorizon>,
    pub created_at: DateTime<Utc>,
}

/// Insight ainda não persistido.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewInsight {
    pub analysis_type: AnalysisType,
    pub data_source: String,
    pub insight_data: Value,
    pub confidence_score: f64,
    pub severity: Severity,
    pub forecast_horizon: Option<ForecastHorizon>,
}

impl NewInsight {
    /// Materializa o insight com o ID e o instante atribuídos pelo repositório.
    pub fn into_insight(self, id: i64, created_at: DateTime<Utc>) -> PredictiveInsight {
        PredictiveInsight {
            id,
            analysis_type: self.analysis_type,
            data_source: self.data_source,
            insight_data: self.insight_data,
            confidence_score: self.confidence_score,
            severity: self.severity,
            forecast_horizon: self.forecast_horizon,
            created_at,
        }
    }
}

/// Entrada do log de auditoria, gravada em toda execução de análise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub run_id: String,
    pub data_source: String,
    pub action: String,
    pub input_size: usize,
    pub anomalies_found: usize,
    pub forecasts_generated: usize,
    pub insights_recorded: usize,
    /// SHA-256 (hex) da janela serializada.
    pub window_digest: String,
    pub created_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Experiências de aprendizado
// ═══════════════════════════════════════════════════════════════════════════

/// Sinal enviado ao subsistema secundário de aprendizado.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearningExperience {
    pub timestamp: DateTime<Utc>,
    pub context: Value,
    pub action_taken: String,
    pub outcome: Value,
    pub reward: f64,
    pub confidence: f64,
    #[serde(default)]
    pub metadata: Value,
}

/// Agregados das experiências registradas.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExperienceStats {
    pub total: usize,
    pub mean_reward: f64,
    pub mean_confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);

        let mut severities = vec![Severity::Critical, Severity::Info, Severity::Warning];
        severities.sort();
        assert_eq!(
            severities,
            vec![Severity::Info, Severity::Warning, Severity::Critical]
        );
    }

    #[test]
    fn test_observation_from_flat_json() {
        let obs: Observation = serde_json::from_value(json!({
            "timestamp": "2025-03-01T10:00:00Z",
            "status": "COMPLETED",
            "completion_time_secs": 42.5
        }))
        .unwrap();

        assert_eq!(obs.value("completion_time_secs"), Some(42.5));
        assert_eq!(obs.text("status"), Some("COMPLETED"));
        assert!(!obs.id.is_empty());
        assert!(obs.source.is_empty());
    }

    #[test]
    fn test_observation_integer_ids() {
        let window: Vec<Observation> = serde_json::from_value(json!([
            {"id": 1, "created_at": "2025-03-01T10:00:00Z", "status": "BUSY", "assigned_tasks": 3},
            {"id": 2, "created_at": "2025-03-01T10:00:00Z", "status": "IDLE", "assigned_tasks": 0},
            {"id": "agent-7", "created_at": "2025-03-01T10:00:00Z", "status": "IDLE"}
        ]))
        .unwrap();

        assert_eq!(window[0].id, "1");
        assert_eq!(window[1].id, "2");
        assert_eq!(window[2].id, "agent-7");
        assert_eq!(window[0].value("assigned_tasks"), Some(3.0));
        assert!(!window[0].fields.contains_key("id"));

        let bad = serde_json::from_value::<Observation>(json!({
            "id": [1],
            "created_at": "2025-03-01T10:00:00Z"
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_observation_accepts_naive_timestamp() {
        let obs: Observation = serde_json::from_value(json!({
            "created_at": "2025-03-01T10:00:00.250",
            "hashrate": 1
        }))
        .unwrap();
        assert_eq!(obs.created_at.to_rfc3339(), "2025-03-01T10:00:00.250+00:00");

        let bad = serde_json::from_value::<Observation>(json!({"created_at": "ontem"}));
        assert!(bad.is_err());
    }

    #[test]
    fn test_observation_value_parses_strings() {
        let obs = Observation::new("mining", Utc::now())
            .with_field("hashrate", "812.5")
            .with_field("label", "rig-1");

        assert_eq!(obs.value("hashrate"), Some(812.5));
        assert_eq!(obs.value("label"), None);
        assert_eq!(obs.value("missing"), None);
    }

    #[test]
    fn test_forecast_horizon_serde() {
        assert_eq!(
            serde_json::to_value(ForecastHorizon::H72).unwrap(),
            json!("72h")
        );
        assert_eq!(ForecastHorizon::from_str("24h"), Some(ForecastHorizon::H24));
        assert_eq!(ForecastHorizon::from_str("12h"), None);
    }
}
