//! Ferramentas MCP do Presage.
//!
//! 1. `presage_run_analysis` - Executa uma análise (gatilho principal)
//! 2. `presage_record_pattern` - Registra/reforça um pattern
//! 3. `presage_patterns_by_type` - Patterns de um tipo
//! 4. `presage_high_confidence_patterns` - Patterns acima de um limiar
//! 5. `presage_recent_insights` - Insights mais recentes
//! 6. `presage_status` - Estado do serviço

use serde::Deserialize;
use serde_json::{json, Value};

use crate::pipeline::Services;
use crate::types::records::Observation;

use super::protocol::{ToolDescription, ToolResult};

const DEFAULT_INSIGHT_LIMIT: usize = 20;

// ═══════════════════════════════════════════════════════════════════════════
// Parâmetros
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct RunAnalysisParams {
    pub action: String,
    pub data_source: String,
    #[serde(default)]
    pub custom_data: Option<Vec<Observation>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordPatternParams {
    pub pattern_type: String,
    #[serde(default)]
    pub pattern_data: Value,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternsByTypeParams {
    pub pattern_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HighConfidenceParams {
    #[serde(default)]
    pub min_confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecentInsightsParams {
    #[serde(default)]
    pub data_source: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

fn parse_params<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T, ToolResult> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments)
        .map_err(|e| ToolResult::error(format!("Invalid parameters: {}", e)))
}

// ═══════════════════════════════════════════════════════════════════════════
// Handler
// ═══════════════════════════════════════════════════════════════════════════

/// Handler das ferramentas; dono dos serviços enquanto o servidor roda.
pub struct ToolHandler {
    services: Services,
}

impl ToolHandler {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn into_services(self) -> Services {
        self.services
    }

    /// Ferramentas anunciadas em `tools/list`.
    pub fn list_tools() -> Vec<ToolDescription> {
        vec![
            ToolDescription::new(
                "presage_run_analysis",
                "Runs a predictive analysis over the recent window of a data source and records the resulting insights.",
                json!({
                    "type": "object",
                    "properties": {
                        "action": {
                            "type": "string",
                            "enum": ["analyze_current", "forecast_24h", "forecast_72h", "detect_patterns"]
                        },
                        "data_source": {
                            "type": "string",
                            "description": "Registered source (agents, tasks, mining, python_executions, dao)"
                        },
                        "custom_data": {
                            "type": "array",
                            "description": "Optional observations used instead of fetching the window",
                            "items": { "type": "object" }
                        }
                    },
                    "required": ["action", "data_source"]
                }),
            ),
            ToolDescription::new(
                "presage_record_pattern",
                "Records an observation of a behavioral pattern, reinforcing its confidence.",
                json!({
                    "type": "object",
                    "properties": {
                        "pattern_type": { "type": "string" },
                        "pattern_data": { "type": "object" },
                        "confidence": { "type": "number", "minimum": 0, "maximum": 1 }
                    },
                    "required": ["pattern_type"]
                }),
            ),
            ToolDescription::new(
                "presage_patterns_by_type",
                "Lists learned patterns of one type, highest confidence first.",
                json!({
                    "type": "object",
                    "properties": { "pattern_type": { "type": "string" } },
                    "required": ["pattern_type"]
                }),
            ),
            ToolDescription::new(
                "presage_high_confidence_patterns",
                "Lists learned patterns at or above a confidence threshold.",
                json!({
                    "type": "object",
                    "properties": {
                        "min_confidence": { "type": "number", "minimum": 0, "maximum": 1 }
                    }
                }),
            ),
            ToolDescription::new(
                "presage_recent_insights",
                "Lists the most recent predictive insights, optionally for one data source.",
                json!({
                    "type": "object",
                    "properties": {
                        "data_source": { "type": "string" },
                        "limit": { "type": "integer", "minimum": 1 }
                    }
                }),
            ),
            ToolDescription::new(
                "presage_status",
                "Reports repository, engine, registered sources and learning counters.",
                json!({ "type": "object", "properties": {} }),
            ),
        ]
    }

    /// Despacha uma chamada de ferramenta.
    pub async fn handle_tool_call(&self, name: &str, arguments: Value) -> ToolResult {
        match name {
            "presage_run_analysis" => self.run_analysis(arguments).await,
            "presage_record_pattern" => self.record_pattern(arguments).await,
            "presage_patterns_by_type" => self.patterns_by_type(arguments).await,
            "presage_high_confidence_patterns" => self.high_confidence(arguments).await,
            "presage_recent_insights" => self.recent_insights(arguments).await,
            "presage_status" => self.status().await,
            _ => ToolResult::error(format!("Unknown tool: {}", name)),
        }
    }

    async fn run_analysis(&self, arguments: Value) -> ToolResult {
        let params: RunAnalysisParams = match parse_params(arguments) {
            Ok(p) => p,
            Err(e) => return e,
        };

        match self
            .services
            .runner
            .run_analysis(&params.action, &params.data_source, params.custom_data)
            .await
        {
            Ok(response) => match serde_json::to_value(&response) {
                Ok(value) => ToolResult::json(&value),
                Err(e) => ToolResult::error(format!("Failed to serialize result: {}", e)),
            },
            Err(e) => ToolResult::error(e.to_string()),
        }
    }

    async fn record_pattern(&self, arguments: Value) -> ToolResult {
        let params: RecordPatternParams = match parse_params(arguments) {
            Ok(p) => p,
            Err(e) => return e,
        };
        if params.pattern_type.trim().is_empty() {
            return ToolResult::error("pattern_type must not be empty");
        }

        match self
            .services
            .patterns
            .try_record_pattern(&params.pattern_type, params.pattern_data, params.confidence)
            .await
        {
            Ok(pattern) => ToolResult::json(&json!({ "recorded": true, "pattern": pattern })),
            Err(e) => {
                tracing::warn!(pattern_type = %params.pattern_type, error = %e, "Failed to record pattern");
                ToolResult::json(&json!({ "recorded": false, "reason": e.to_string() }))
            }
        }
    }

    async fn patterns_by_type(&self, arguments: Value) -> ToolResult {
        let params: PatternsByTypeParams = match parse_params(arguments) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let patterns = self.services.patterns.patterns_by_type(&params.pattern_type).await;
        ToolResult::json(&json!({ "count": patterns.len(), "patterns": patterns }))
    }

    async fn high_confidence(&self, arguments: Value) -> ToolResult {
        let params: HighConfidenceParams = match parse_params(arguments) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let min = params
            .min_confidence
            .unwrap_or_else(|| self.services.patterns.min_confidence());
        let patterns = self.services.patterns.high_confidence_patterns(min).await;
        ToolResult::json(&json!({
            "min_confidence": min,
            "count": patterns.len(),
            "patterns": patterns,
        }))
    }

    async fn recent_insights(&self, arguments: Value) -> ToolResult {
        let params: RecentInsightsParams = match parse_params(arguments) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let limit = params.limit.unwrap_or(DEFAULT_INSIGHT_LIMIT).max(1);

        match self
            .services
            .repo
            .recent_insights(params.data_source.as_deref(), limit)
            .await
        {
            Ok(insights) => ToolResult::json(&json!({ "count": insights.len(), "insights": insights })),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }

    async fn status(&self) -> ToolResult {
        let report = self.services.status().await;
        match serde_json::to_value(&report) {
            Ok(value) => ToolResult::json(&value),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}
