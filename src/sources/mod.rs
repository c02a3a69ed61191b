//! Metrics Source Adapter.
//!
//! Busca a janela recente de observações de uma fonte registrada.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::store::Repository;
use crate::types::config::{Config, SourceConfig};
use crate::types::records::Observation;
use crate::{PresageError, PresageResult};

/// Adaptador de fontes de métricas.
#[derive(Clone)]
pub struct MetricsSourceAdapter {
    repo: Arc<dyn Repository>,
    sources: BTreeMap<String, SourceConfig>,
    timeout: Duration,
    default_limit: usize,
}

impl MetricsSourceAdapter {
    pub fn new(repo: Arc<dyn Repository>, config: &Config) -> Self {
        Self {
            repo,
            sources: config.sources.clone(),
            timeout: Duration::from_secs(config.general.timeout_secs.max(1)),
            default_limit: config.analysis.window_limit,
        }
    }

    /// Fontes registradas.
    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Se a fonte está registrada.
    pub fn is_registered(&self, source: &str) -> bool {
        self.sources.contains_key(source)
    }

    /// Campo numérico usado como valor da série da fonte.
    pub fn metric_for(&self, source: &str) -> Option<&str> {
        self.sources.get(source)?.metric.as_deref()
    }

    /// Tamanho padrão da janela.
    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Janela mais recente da fonte, da mais nova para a mais antiga.
    ///
    /// Fontes desconhecidas resultam em janela vazia. Falhas e timeout do
    /// repositório são propagados como `TransportFailure`.
    pub async fn fetch_window(&self, source: &str, limit: usize) -> PresageResult<Vec<Observation>> {
        if !self.is_registered(source) {
            tracing::warn!(data_source = %source, "Unknown data source, using empty window");
            return Ok(Vec::new());
        }

        let query = self.repo.query_observations(source, limit);
        let mut window = tokio::time::timeout(self.timeout, query)
            .await
            .map_err(|_| {
                PresageError::transport(format!(
                    "busca da janela '{}' excedeu {}s",
                    source,
                    self.timeout.as_secs()
                ))
            })??;

        // O contrato é "mais recente primeiro", independente do repositório.
        window.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        window.truncate(limit);

        tracing::debug!(data_source = %source, size = window.len(), "Window fetched");
        Ok(window)
    }

    /// Usa `custom_data` quando fornecido, senão busca a janela padrão.
    pub async fn resolve_window(
        &self,
        source: &str,
        custom_data: Option<Vec<Observation>>,
    ) -> PresageResult<Vec<Observation>> {
        match custom_data {
            Some(mut data) => {
                for obs in data.iter_mut().filter(|o| o.source.is_empty()) {
                    obs.source = source.to_string();
                }
                tracing::debug!(data_source = %source, size = data.len(), "Using caller-supplied window");
                Ok(data)
            }
            None => self.fetch_window(source, self.default_limit).await,
        }
    }
}
