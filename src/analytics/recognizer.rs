//! Reconhecimento de padrões estruturais por fonte.
//!
//! - `agents`: agentes sobrecarregados e saturação do sistema
//! - `dao`: votação coordenada e concentração de votos
//!
//! Outras fontes não têm reconhecedor e resultam em sequência vazia.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::stats::{mean, std_dev};
use crate::types::records::{Observation, Severity};
use crate::types::responses::{AnomalyData, AnomalyRecord};

/// Fração de agentes ocupados acima da qual o sistema é considerado saturado.
const SATURATION_RATIO: f64 = 0.8;
/// Votos no mesmo instante a partir dos quais a votação é considerada coordenada.
const COORDINATED_VOTES: usize = 5;
const IDLE: &str = "IDLE";

/// Reconhecedor de padrões.
#[derive(Debug, Clone)]
pub struct PatternRecognizer {
    min_samples: usize,
}

impl PatternRecognizer {
    pub fn new(min_samples: usize) -> Self {
        Self { min_samples }
    }

    /// Padrões encontrados na janela da fonte.
    pub fn detect(&self, source: &str, window: &[Observation]) -> Vec<AnomalyRecord> {
        match source {
            "agents" => self.workload_bottlenecks(window),
            "dao" => self.voting_anomalies(window),
            other => {
                tracing::debug!(data_source = %other, "No pattern recognizer for source");
                Vec::new()
            }
        }
    }

    fn workload_bottlenecks(&self, window: &[Observation]) -> Vec<AnomalyRecord> {
        // Janela vem da mais nova para a mais antiga: fica o snapshot mais recente.
        let mut agents: BTreeMap<String, (String, f64)> = BTreeMap::new();
        for obs in window {
            let key = text_field(obs, "agent_id").unwrap_or_else(|| obs.id.clone());
            agents.entry(key).or_insert_with(|| {
                (
                    obs.text("status").unwrap_or(IDLE).to_string(),
                    obs.value("assigned_tasks").unwrap_or(0.0),
                )
            });
        }

        if agents.is_empty() {
            return Vec::new();
        }

        let loads: Vec<f64> = agents.values().map(|(_, tasks)| *tasks).collect();
        let mean_load = mean(&loads);
        let max_load = loads.iter().copied().fold(f64::MIN, f64::max);
        let busy = agents.values().filter(|(status, _)| status != IDLE).count();
        let utilization = busy as f64 / agents.len() as f64;

        let statistics = json!({
            "total_agents": agents.len(),
            "mean_load": mean_load,
            "max_load": max_load,
            "busy_agents": busy,
        });

        let mut found = Vec::new();

        let overloaded: Vec<&String> = agents
            .iter()
            .filter(|(_, (_, tasks))| mean_load > 0.0 && *tasks > mean_load * 2.0)
            .map(|(id, _)| id)
            .collect();
        if !overloaded.is_empty() {
            found.push(
                AnomalyRecord::new(
                    "overloaded_agents",
                    Severity::Warning,
                    format!("{} agents with >2x average load", overloaded.len()),
                )
                .with_data(
                    AnomalyData::default()
                        .with_detail("affected_agents", json!(overloaded))
                        .with_detail("statistics", statistics.clone()),
                ),
            );
        }

        if utilization > SATURATION_RATIO {
            found.push(
                AnomalyRecord::new(
                    "system_saturation",
                    Severity::Critical,
                    format!("{}/{} agents busy (>80%)", busy, agents.len()),
                )
                .with_data(
                    AnomalyData::default()
                        .with_detail("utilization", utilization)
                        .with_detail("statistics", statistics),
                ),
            );
        }

        found
    }

    fn voting_anomalies(&self, window: &[Observation]) -> Vec<AnomalyRecord> {
        if window.len() < self.min_samples {
            return Vec::new();
        }

        let mut per_user: HashMap<String, usize> = HashMap::new();
        let mut per_instant: HashMap<DateTime<Utc>, usize> = HashMap::new();
        for vote in window {
            let user = text_field(vote, "user_id").unwrap_or_else(|| "unknown".to_string());
            *per_user.entry(user).or_insert(0) += 1;
            *per_instant.entry(vote.created_at).or_insert(0) += 1;
        }

        let counts: Vec<f64> = per_user.values().map(|c| *c as f64).collect();
        let mean_votes = mean(&counts);
        let std_votes = std_dev(&counts);
        let max_simultaneous = per_instant.values().copied().max().unwrap_or(0);

        let statistics = json!({
            "total_votes": window.len(),
            "unique_users": per_user.len(),
            "mean_votes_per_user": mean_votes,
            "max_simultaneous_votes": max_simultaneous,
        });

        let mut found = Vec::new();

        if max_simultaneous >= COORDINATED_VOTES {
            found.push(
                AnomalyRecord::new(
                    "coordinated_voting",
                    Severity::Critical,
                    format!("{} votes cast at exact same time", max_simultaneous),
                )
                .with_data(
                    AnomalyData::default()
                        .with_detail("simultaneous_votes", max_simultaneous)
                        .with_detail("statistics", statistics.clone()),
                ),
            );
        }

        if std_votes > mean_votes * 2.0 {
            found.push(
                AnomalyRecord::new(
                    "vote_concentration",
                    Severity::Warning,
                    "Highly uneven vote distribution among users",
                )
                .with_data(
                    AnomalyData::default()
                        .with_detail("std_votes_per_user", std_votes)
                        .with_detail("statistics", statistics),
                ),
            );
        }

        found
    }
}

/// Campo textual ou numérico como string.
fn text_field(obs: &Observation, field: &str) -> Option<String> {
    match obs.fields.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
