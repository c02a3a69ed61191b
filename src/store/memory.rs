//! Repositório em memória.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{sort_by_confidence, Repository, StoreCounts};
use crate::types::records::{
    AuditEntry, ExperienceStats, LearningExperience, LearningPattern, NewInsight, Observation,
    PredictiveInsight,
};
use crate::{PresageError, PresageResult};

#[derive(Default)]
struct Tables {
    observations: Vec<Observation>,
    patterns: HashMap<String, LearningPattern>,
    insights: Vec<PredictiveInsight>,
    audit: Vec<AuditEntry>,
    experiences: Vec<LearningExperience>,
}

/// Repositório em memória com a mesma semântica do SQLite.
///
/// `set_offline(true)` faz toda operação falhar com `TransportFailure`,
/// simulando uma queda do armazenamento.
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
    offline: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Liga ou desliga a simulação de queda.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> PresageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PresageError::transport("repositório indisponível"));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    fn name(&self) -> &str {
        "memory"
    }

    async fn insert_observation(&self, observation: &Observation) -> PresageResult<()> {
        self.check()?;
        let mut tables = self.tables.write().await;
        tables.observations.retain(|o| o.id != observation.id);
        tables.observations.push(observation.clone());
        Ok(())
    }

    async fn query_observations(
        &self,
        source: &str,
        limit: usize,
    ) -> PresageResult<Vec<Observation>> {
        self.check()?;
        let tables = self.tables.read().await;
        // Reverso da ordem de inserção como desempate, igual ao rowid no SQLite.
        let mut window: Vec<Observation> = tables
            .observations
            .iter()
            .rev()
            .filter(|o| o.source == source)
            .cloned()
            .collect();
        window.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        window.truncate(limit);
        Ok(window)
    }

    async fn find_pattern(&self, pattern_type: &str) -> PresageResult<Option<LearningPattern>> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables.patterns.get(pattern_type).cloned())
    }

    async fn upsert_pattern(&self, pattern: &LearningPattern) -> PresageResult<()> {
        self.check()?;
        let mut tables = self.tables.write().await;
        tables
            .patterns
            .entry(pattern.pattern_type.clone())
            .and_modify(|existing| {
                existing.pattern_data = pattern.pattern_data.clone();
                existing.confidence_score = pattern.confidence_score;
                existing.usage_count = pattern.usage_count;
                existing.last_used = pattern.last_used;
            })
            .or_insert_with(|| pattern.clone());
        Ok(())
    }

    async fn patterns_by_type(
        &self,
        pattern_type: &str,
        limit: usize,
    ) -> PresageResult<Vec<LearningPattern>> {
        self.check()?;
        let tables = self.tables.read().await;
        let mut patterns: Vec<_> = tables
            .patterns
            .values()
            .filter(|p| p.pattern_type == pattern_type)
            .cloned()
            .collect();
        sort_by_confidence(&mut patterns);
        patterns.truncate(limit);
        Ok(patterns)
    }

    async fn patterns_above(
        &self,
        min_confidence: f64,
        limit: usize,
    ) -> PresageResult<Vec<LearningPattern>> {
        self.check()?;
        let tables = self.tables.read().await;
        let mut patterns: Vec<_> = tables
            .patterns
            .values()
            .filter(|p| p.confidence_score >= min_confidence)
            .cloned()
            .collect();
        sort_by_confidence(&mut patterns);
        patterns.truncate(limit);
        Ok(patterns)
    }

    async fn all_patterns(&self) -> PresageResult<Vec<LearningPattern>> {
        self.check()?;
        let tables = self.tables.read().await;
        let mut patterns: Vec<_> = tables.patterns.values().cloned().collect();
        sort_by_confidence(&mut patterns);
        Ok(patterns)
    }

    async fn insert_insight(&self, insight: &NewInsight) -> PresageResult<PredictiveInsight> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let id = tables.insights.last().map(|i| i.id + 1).unwrap_or(1);
        let stored = insight.clone().into_insight(id, Utc::now());
        tables.insights.push(stored.clone());
        Ok(stored)
    }

    async fn recent_insights(
        &self,
        data_source: Option<&str>,
        limit: usize,
    ) -> PresageResult<Vec<PredictiveInsight>> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .insights
            .iter()
            .rev()
            .filter(|i| data_source.map_or(true, |s| i.data_source == s))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_audit(&self, entry: &AuditEntry) -> PresageResult<()> {
        self.check()?;
        self.tables.write().await.audit.push(entry.clone());
        Ok(())
    }

    async fn recent_audit(&self, limit: usize) -> PresageResult<Vec<AuditEntry>> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables.audit.iter().rev().take(limit).cloned().collect())
    }

    async fn insert_experience(&self, experience: &LearningExperience) -> PresageResult<()> {
        self.check()?;
        self.tables
            .write()
            .await
            .experiences
            .push(experience.clone());
        Ok(())
    }

    async fn experience_stats(&self) -> PresageResult<ExperienceStats> {
        self.check()?;
        let tables = self.tables.read().await;
        let total = tables.experiences.len();
        if total == 0 {
            return Ok(ExperienceStats::default());
        }

        let n = total as f64;
        Ok(ExperienceStats {
            total,
            mean_reward: tables.experiences.iter().map(|e| e.reward).sum::<f64>() / n,
            mean_confidence: tables.experiences.iter().map(|e| e.confidence).sum::<f64>() / n,
        })
    }

    async fn counts(&self) -> PresageResult<StoreCounts> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(StoreCounts {
            observations: tables.observations.len(),
            patterns: tables.patterns.len(),
            insights: tables.insights.len(),
            audit_entries: tables.audit.len(),
            experiences: tables.experiences.len(),
        })
    }
}
