//! Repositório de observações, patterns, insights e auditoria.
//!
//! O núcleo trata o armazenamento como um repositório opaco atrás do trait
//! [`Repository`]. Duas implementações:
//!
//! - [`SqliteRepository`]: SQLite local (feature `sqlite`)
//! - [`MemoryRepository`]: em memória, para testes e builds sem SQLite
//!
//! Falhas do repositório chegam como [`PresageError::TransportFailure`] ou
//! [`PresageError::Database`], distintas de "nenhuma linha".

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryRepository;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRepository;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::types::config::Config;
use crate::types::records::{
    AuditEntry, ExperienceStats, LearningExperience, LearningPattern, NewInsight, Observation,
    PredictiveInsight,
};
use crate::{PresageError, PresageResult};

/// Contagem de registros por tabela.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreCounts {
    pub observations: usize,
    pub patterns: usize,
    pub insights: usize,
    pub audit_entries: usize,
    pub experiences: usize,
}

/// Operações de armazenamento consumidas pelo núcleo.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Nome da implementação (para logs e status).
    fn name(&self) -> &str;

    // ═══════════════════════════════════════════════════════════════════════
    // Observações
    // ═══════════════════════════════════════════════════════════════════════

    /// Insere uma observação.
    async fn insert_observation(&self, observation: &Observation) -> PresageResult<()>;

    /// Observações mais recentes da fonte, ordenadas por `created_at` decrescente.
    async fn query_observations(&self, source: &str, limit: usize)
        -> PresageResult<Vec<Observation>>;

    // ═══════════════════════════════════════════════════════════════════════
    // Patterns
    // ═══════════════════════════════════════════════════════════════════════

    /// Busca o pattern de um tipo.
    async fn find_pattern(&self, pattern_type: &str) -> PresageResult<Option<LearningPattern>>;

    /// Insere ou substitui o pattern, usando `pattern_type` como chave de conflito.
    ///
    /// Em conflito, `id` e `created_at` do registro existente são preservados.
    async fn upsert_pattern(&self, pattern: &LearningPattern) -> PresageResult<()>;

    /// Patterns do tipo, por confiança decrescente.
    async fn patterns_by_type(
        &self,
        pattern_type: &str,
        limit: usize,
    ) -> PresageResult<Vec<LearningPattern>>;

    /// Patterns com `confidence_score >= min_confidence`, por confiança decrescente.
    async fn patterns_above(
        &self,
        min_confidence: f64,
        limit: usize,
    ) -> PresageResult<Vec<LearningPattern>>;

    /// Todos os patterns.
    async fn all_patterns(&self) -> PresageResult<Vec<LearningPattern>>;

    // ═══════════════════════════════════════════════════════════════════════
    // Insights e auditoria
    // ═══════════════════════════════════════════════════════════════════════

    /// Anexa um insight e retorna o registro com ID e `created_at`.
    async fn insert_insight(&self, insight: &NewInsight) -> PresageResult<PredictiveInsight>;

    /// Insights mais recentes, opcionalmente filtrados pela fonte.
    async fn recent_insights(
        &self,
        data_source: Option<&str>,
        limit: usize,
    ) -> PresageResult<Vec<PredictiveInsight>>;

    /// Anexa uma entrada de auditoria.
    async fn insert_audit(&self, entry: &AuditEntry) -> PresageResult<()>;

    /// Entradas de auditoria mais recentes.
    async fn recent_audit(&self, limit: usize) -> PresageResult<Vec<AuditEntry>>;

    // ═══════════════════════════════════════════════════════════════════════
    // Experiências
    // ═══════════════════════════════════════════════════════════════════════

    /// Anexa uma experiência de aprendizado.
    async fn insert_experience(&self, experience: &LearningExperience) -> PresageResult<()>;

    /// Agregados das experiências.
    async fn experience_stats(&self) -> PresageResult<ExperienceStats>;

    /// Contagem de registros.
    async fn counts(&self) -> PresageResult<StoreCounts>;
}

/// Abre o repositório configurado.
///
/// Com a feature `sqlite`, abre (e cria, se preciso) o banco em
/// `storage.db_path`. Sem ela, usa um repositório em memória.
pub fn open_repository(config: &Config) -> PresageResult<Arc<dyn Repository>> {
    #[cfg(feature = "sqlite")]
    {
        let path = &config.storage.db_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let repo = SqliteRepository::open(path)?;
        Ok(Arc::new(repo))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        tracing::warn!(
            db_path = %config.storage.db_path.display(),
            "Built without sqlite, using in-memory repository"
        );
        Ok(Arc::new(MemoryRepository::new()))
    }
}

/// Formata um instante para armazenamento (RFC 3339 UTC, milissegundos).
///
/// A precisão fixa mantém a ordem lexicográfica igual à temporal.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Lê um instante armazenado.
pub(crate) fn parse_timestamp(raw: &str) -> PresageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PresageError::other(format!("timestamp inválido '{}': {}", raw, e)))
}

/// Ordena patterns por confiança decrescente (desempate pelo uso).
pub(crate) fn sort_by_confidence(patterns: &mut [LearningPattern]) {
    patterns.sort_by(|a, b| {
        b.confidence_score
            .partial_cmp(&a.confidence_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.usage_count.cmp(&a.usage_count))
    });
}
