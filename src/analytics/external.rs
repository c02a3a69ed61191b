//! Engine para runtime numérico externo.
//!
//! O payload `{data_source, action, metric, data}` é escrito em JSON no stdin
//! do processo; o resultado é lido do stdout. Toda a chamada roda sob um
//! timeout e o processo é morto se o prazo expirar.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::engine::NumericEngine;
use crate::types::config::EngineConfig;
use crate::types::requests::AnalysisPayload;
use crate::types::responses::AnalysisOutput;
use crate::{PresageError, PresageResult};

/// Engine externo.
pub struct ExternalEngine {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ExternalEngine {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            timeout: Duration::from_secs(30),
        }
    }

    /// Cria engine a partir da configuração do TOML.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }

    /// Define o timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    async fn invoke(&self, input: &[u8]) -> std::io::Result<std::process::Output> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input).await?;
            stdin.shutdown().await?;
        }

        child.wait_with_output().await
    }

    /// Extrai o resultado da saída do runtime.
    ///
    /// Usa o trecho entre o primeiro `{` e o último `}`, tolerando logs
    /// impressos antes ou depois do JSON.
    pub fn parse_output(output: &str) -> PresageResult<AnalysisOutput> {
        let json_start = output.find('{');
        let json_end = output.rfind('}');

        let json_str = match (json_start, json_end) {
            (Some(start), Some(end)) if start < end => &output[start..=end],
            _ => {
                return Err(PresageError::MalformedResult(
                    "saída não contém JSON".to_string(),
                ))
            }
        };

        let value: Value = serde_json::from_str(json_str)
            .map_err(|e| PresageError::MalformedResult(format!("JSON inválido: {}", e)))?;

        if let Some(error) = value.get("error") {
            let message = error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(PresageError::transport(format!(
                "runtime numérico reportou erro: {}",
                message
            )));
        }

        serde_json::from_value(value)
            .map_err(|e| PresageError::MalformedResult(format!("formato inesperado: {}", e)))
    }
}

#[async_trait]
impl NumericEngine for ExternalEngine {
    fn name(&self) -> &str {
        "external"
    }

    async fn analyze(&self, payload: &AnalysisPayload) -> PresageResult<AnalysisOutput> {
        let input = serde_json::to_vec(payload)?;

        tracing::debug!(
            command = %self.command,
            action = %payload.action,
            data_source = %payload.data_source,
            size = payload.data.len(),
            "Invoking external numeric runtime"
        );

        let result = tokio::time::timeout(self.timeout, self.invoke(&input)).await;

        match result {
            Ok(Ok(output)) => {
                if output.status.success() {
                    let stdout = String::from_utf8_lossy(&output.stdout);
                    Self::parse_output(&stdout)
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(PresageError::transport(format!(
                        "runtime '{}' terminou com {}: {}",
                        self.command,
                        output.status,
                        stderr.trim()
                    )))
                }
            }
            Ok(Err(e)) => {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Err(PresageError::transport(format!(
                        "runtime '{}' não encontrado",
                        self.command
                    )))
                } else {
                    Err(PresageError::transport(format!(
                        "falha ao executar '{}': {}",
                        self.command, e
                    )))
                }
            }
            Err(_) => Err(PresageError::transport(format!(
                "runtime '{}' excedeu {}s",
                self.command,
                self.timeout.as_secs()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::records::Observation;
    use crate::types::requests::AnalysisAction;
    use chrono::Utc;

    fn payload() -> AnalysisPayload {
        AnalysisPayload::new(
            "tasks",
            AnalysisAction::AnalyzeCurrent,
            None,
            vec![Observation::new("tasks", Utc::now()).with_field("status", "PENDING")],
        )
    }

    #[test]
    fn test_parse_output_with_noise() {
        let output = r#"loading model...
{"anomalies": [{"type": "task_queue", "severity": "warning", "description": "Unusual task queue size", "data": {"z_score": 3.2}}], "generated_at": "2025-03-01T10:00:00Z"}
done"#;

        let parsed = ExternalEngine::parse_output(output).unwrap();
        assert_eq!(parsed.anomalies.len(), 1);
        assert_eq!(parsed.anomalies[0].data.confidence, 0.7);
    }

    #[test]
    fn test_parse_output_malformed() {
        let err = ExternalEngine::parse_output("no json here").unwrap_err();
        assert!(matches!(err, PresageError::MalformedResult(_)));

        let err = ExternalEngine::parse_output(r#"{"anomalies": "nope"}"#).unwrap_err();
        assert!(matches!(err, PresageError::MalformedResult(_)));
    }

    #[test]
    fn test_parse_output_error_field() {
        let err = ExternalEngine::parse_output(r#"{"error": "Unknown action: x"}"#).unwrap_err();
        assert!(err.is_transport_failure());
        assert!(err.to_string().contains("Unknown action"));
    }

    #[tokio::test]
    async fn test_missing_command_is_transport_failure() {
        let engine = ExternalEngine::new("presage-runtime-that-does-not-exist", vec![]);
        let err = engine.analyze(&payload()).await.unwrap_err();
        assert!(err.is_transport_failure());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runtime_round_trip() {
        let script = r#"cat > /dev/null; echo '{"anomalies": [], "generated_at": "2025-03-01T10:00:00Z"}'"#;
        let engine = ExternalEngine::new("sh", vec!["-c".to_string(), script.to_string()]);

        let output = engine.analyze(&payload()).await.unwrap();
        assert!(output.anomalies.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runtime_echoes_payload() {
        // O runtime recebe o payload completo no stdin.
        let script = r#"grep -q '"action":"analyze_current"' && echo '{"anomalies": []}' || exit 3"#;
        let engine = ExternalEngine::new("sh", vec!["-c".to_string(), script.to_string()]);
        assert!(engine.analyze(&payload()).await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runtime_failure_exit_code() {
        let engine = ExternalEngine::new(
            "sh",
            vec!["-c".to_string(), "cat > /dev/null; echo boom >&2; exit 2".to_string()],
        );
        let err = engine.analyze(&payload()).await.unwrap_err();
        assert!(err.is_transport_failure());
        assert!(err.to_string().contains("boom"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runtime_timeout() {
        let engine = ExternalEngine::new("sleep", vec!["5".to_string()])
            .with_timeout(Duration::from_millis(200));
        let err = engine.analyze(&payload()).await.unwrap_err();
        assert!(err.is_transport_failure());
        assert!(err.to_string().contains("excedeu"));
    }
}
