//! Pattern Store - memória durável de patterns comportamentais.
//!
//! Cada `pattern_type` tem no máximo um registro. Observar o tipo de novo
//! substitui `pattern_data`, incrementa `usage_count` e aplica a
//! [`ReinforcementPolicy`] à confiança.
//!
//! Escritas são fail-soft e leituras degradam para sequência vazia: uma
//! queda do armazenamento nunca chega ao chamador.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use super::policy::ReinforcementPolicy;
use super::sink::ExperienceSink;
use crate::store::Repository;
use crate::types::config::LearningConfig;
use crate::types::records::LearningPattern;
use crate::PresageResult;

/// Ação registrada nas experiências emitidas por `record_pattern`.
pub const PATTERN_RECORDED: &str = "pattern_recorded";

/// Pattern Store.
#[derive(Clone)]
pub struct PatternStore {
    repo: Arc<dyn Repository>,
    policy: ReinforcementPolicy,
    sink: ExperienceSink,
    default_confidence: f64,
    by_type_limit: usize,
    high_confidence_limit: usize,
    min_confidence: f64,
}

impl PatternStore {
    /// Cria o store com a configuração de aprendizado.
    pub fn new(repo: Arc<dyn Repository>, sink: ExperienceSink, config: &LearningConfig) -> Self {
        Self {
            repo,
            policy: ReinforcementPolicy::from_config(config),
            sink,
            default_confidence: config.default_confidence,
            by_type_limit: config.by_type_limit,
            high_confidence_limit: config.high_confidence_limit,
            min_confidence: config.min_confidence,
        }
    }

    /// Confiança inicial padrão.
    pub fn default_confidence(&self) -> f64 {
        self.default_confidence
    }

    /// Limiar padrão de [`PatternStore::high_confidence_patterns`].
    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Registra uma observação do pattern.
    ///
    /// Nunca falha: erros de armazenamento são logados e o store fica
    /// inalterado. `initial_confidence` só é usado na primeira observação.
    pub async fn record_pattern(
        &self,
        pattern_type: &str,
        pattern_data: Value,
        initial_confidence: Option<f64>,
    ) {
        if let Err(e) = self
            .try_record_pattern(pattern_type, pattern_data, initial_confidence)
            .await
        {
            tracing::warn!(
                pattern_type = %pattern_type,
                error = %e,
                "Failed to record pattern"
            );
        }
    }

    /// Variante de [`PatternStore::record_pattern`] que devolve o registro ou o erro.
    pub async fn try_record_pattern(
        &self,
        pattern_type: &str,
        pattern_data: Value,
        initial_confidence: Option<f64>,
    ) -> PresageResult<LearningPattern> {
        let now = Utc::now();
        let existing = self.repo.find_pattern(pattern_type).await?;

        let pattern = match existing {
            Some(previous) => LearningPattern {
                confidence_score: self.policy.next(previous.confidence_score),
                usage_count: previous.usage_count.saturating_add(1),
                pattern_data,
                last_used: now,
                ..previous
            },
            None => LearningPattern {
                id: uuid::Uuid::new_v4().to_string(),
                pattern_type: pattern_type.to_string(),
                pattern_data,
                confidence_score: self
                    .policy
                    .initial(initial_confidence.unwrap_or(self.default_confidence)),
                usage_count: 1,
                last_used: now,
                created_at: now,
            },
        };

        self.repo.upsert_pattern(&pattern).await?;

        tracing::debug!(
            pattern_type = %pattern.pattern_type,
            confidence = pattern.confidence_score,
            usage_count = pattern.usage_count,
            "Pattern recorded"
        );

        self.sink.record_experience(
            json!({
                "pattern_type": pattern.pattern_type,
                "pattern_data": pattern.pattern_data,
            }),
            PATTERN_RECORDED,
            json!({"usage_count": pattern.usage_count}),
            pattern.confidence_score,
            pattern.confidence_score,
        );

        Ok(pattern)
    }

    /// Patterns do tipo, por confiança decrescente, até o limite configurado (100).
    pub async fn patterns_by_type(&self, pattern_type: &str) -> Vec<LearningPattern> {
        match self
            .repo
            .patterns_by_type(pattern_type, self.by_type_limit)
            .await
        {
            Ok(patterns) => patterns,
            Err(e) => {
                tracing::warn!(pattern_type = %pattern_type, error = %e, "Pattern lookup failed");
                Vec::new()
            }
        }
    }

    /// Patterns com confiança `>= min_confidence`, até o limite configurado (200).
    pub async fn high_confidence_patterns(&self, min_confidence: f64) -> Vec<LearningPattern> {
        match self
            .repo
            .patterns_above(min_confidence, self.high_confidence_limit)
            .await
        {
            Ok(patterns) => patterns,
            Err(e) => {
                tracing::warn!(min_confidence, error = %e, "High-confidence lookup failed");
                Vec::new()
            }
        }
    }

    /// Todos os patterns (usado pela exportação).
    pub async fn all_patterns(&self) -> PresageResult<Vec<LearningPattern>> {
        self.repo.all_patterns().await
    }

    pub(crate) fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }
}
