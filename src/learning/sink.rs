//! Canal best-effort para o subsistema secundário de aprendizado.
//!
//! Cada reforço de pattern emite uma [`LearningExperience`] numa fila
//! limitada. Um worker consome a fila e entrega ao [`ExperienceHandler`].
//! Com a fila cheia o evento é descartado e contado; o caminho principal
//! nunca espera pelo handler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::store::Repository;
use crate::types::records::LearningExperience;
use crate::PresageResult;

/// Destino das experiências.
#[async_trait]
pub trait ExperienceHandler: Send + Sync {
    async fn handle(&self, experience: LearningExperience) -> PresageResult<()>;
}

/// Persiste as experiências na tabela `learning_experiences`.
pub struct RepositoryExperienceHandler {
    repo: Arc<dyn Repository>,
}

impl RepositoryExperienceHandler {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ExperienceHandler for RepositoryExperienceHandler {
    async fn handle(&self, experience: LearningExperience) -> PresageResult<()> {
        self.repo.insert_experience(&experience).await
    }
}

#[derive(Default)]
struct Counters {
    accepted: AtomicU64,
    dropped: AtomicU64,
    handled: AtomicU64,
    failed: AtomicU64,
    /// Sinalizado pelo worker a cada evento processado.
    progress: Notify,
}

/// Contadores do sink.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SinkStats {
    /// Eventos aceitos na fila.
    pub accepted: u64,
    /// Eventos descartados (fila cheia ou sink desligado).
    pub dropped: u64,
    /// Eventos entregues ao handler com sucesso.
    pub handled: u64,
    /// Eventos cujo handler falhou.
    pub failed: u64,
}

impl SinkStats {
    /// Eventos aceitos ainda não processados.
    pub fn pending(&self) -> u64 {
        self.accepted.saturating_sub(self.handled + self.failed)
    }
}

/// Emissor de experiências (clonável, barato).
#[derive(Clone)]
pub struct ExperienceSink {
    tx: Option<mpsc::Sender<LearningExperience>>,
    counters: Arc<Counters>,
}

impl ExperienceSink {
    /// Cria o sink e inicia o worker. Precisa de um runtime tokio ativo.
    pub fn spawn(handler: Arc<dyn ExperienceHandler>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<LearningExperience>(capacity.max(1));
        let counters = Arc::new(Counters::default());
        let worker_counters = Arc::clone(&counters);

        let worker = tokio::spawn(async move {
            while let Some(experience) = rx.recv().await {
                let action = experience.action_taken.clone();
                match handler.handle(experience).await {
                    Ok(()) => {
                        worker_counters.handled.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => {
                        worker_counters.failed.fetch_add(1, Ordering::SeqCst);
                        tracing::warn!(action = %action, error = %e, "Learning experience handler failed");
                    }
                }
                worker_counters.progress.notify_waiters();
            }
            tracing::debug!("Learning experience worker stopped");
        });

        (
            Self {
                tx: Some(tx),
                counters,
            },
            worker,
        )
    }

    /// Sink que descarta tudo (aprendizado desligado).
    pub fn disabled() -> Self {
        Self {
            tx: None,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Enfileira uma experiência sem bloquear. Retorna `false` se descartada.
    pub fn emit(&self, experience: LearningExperience) -> bool {
        let Some(tx) = &self.tx else {
            self.counters.dropped.fetch_add(1, Ordering::SeqCst);
            return false;
        };

        match tx.try_send(experience) {
            Ok(()) => {
                self.counters.accepted.fetch_add(1, Ordering::SeqCst);
                true
            }
            Err(mpsc::error::TrySendError::Full(exp)) => {
                self.counters.dropped.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(action = %exp.action_taken, "Learning experience queue full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(exp)) => {
                self.counters.dropped.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(action = %exp.action_taken, "Learning experience worker gone, dropping event");
                false
            }
        }
    }

    /// Monta e enfileira uma experiência.
    pub fn record_experience(
        &self,
        context: Value,
        action_taken: &str,
        outcome: Value,
        reward: f64,
        confidence: f64,
    ) -> bool {
        self.emit(LearningExperience {
            timestamp: Utc::now(),
            context,
            action_taken: action_taken.to_string(),
            outcome,
            reward,
            confidence,
            metadata: Value::Null,
        })
    }

    /// Contadores atuais.
    pub fn stats(&self) -> SinkStats {
        SinkStats {
            accepted: self.counters.accepted.load(Ordering::SeqCst),
            dropped: self.counters.dropped.load(Ordering::SeqCst),
            handled: self.counters.handled.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
        }
    }

    /// Espera a fila esvaziar. Retorna `false` se o prazo expirar antes.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                // Registrado antes da checagem para não perder o aviso do worker.
                let progress = self.counters.progress.notified();
                tokio::pin!(progress);
                progress.as_mut().enable();

                if self.stats().pending() == 0 {
                    break;
                }
                progress.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRepository;
    use crate::PresageError;
    use serde_json::json;
    use tokio::sync::Semaphore;

    struct FailingHandler;

    #[async_trait]
    impl ExperienceHandler for FailingHandler {
        async fn handle(&self, _experience: LearningExperience) -> PresageResult<()> {
            Err(PresageError::transport("sink offline"))
        }
    }

    /// Handler que só avança quando o teste libera permissões.
    struct GatedHandler {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl ExperienceHandler for GatedHandler {
        async fn handle(&self, _experience: LearningExperience) -> PresageResult<()> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| PresageError::other(e.to_string()))?;
            permit.forget();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_experiences_reach_repository() {
        let repo = Arc::new(MemoryRepository::new());
        let handler = Arc::new(RepositoryExperienceHandler::new(repo.clone()));
        let (sink, _worker) = ExperienceSink::spawn(handler, 8);

        assert!(sink.record_experience(json!({"pattern_type": "a"}), "pattern_recorded", json!({}), 0.5, 0.5));
        assert!(sink.record_experience(json!({"pattern_type": "b"}), "pattern_recorded", json!({}), 1.0, 1.0));
        assert!(sink.drain(Duration::from_secs(2)).await);

        let stats = repo.experience_stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(sink.stats().handled, 2);
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let gate = Arc::new(Semaphore::new(0));
        let handler = Arc::new(GatedHandler { gate: gate.clone() });
        let (sink, _worker) = ExperienceSink::spawn(handler, 1);

        let mut accepted = 0;
        for _ in 0..10 {
            if sink.record_experience(json!({}), "pattern_recorded", json!({}), 0.5, 0.5) {
                accepted += 1;
            }
        }

        // Fila de 1 mais no máximo 1 evento já retirado pelo worker.
        assert!(accepted <= 2);
        assert_eq!(sink.stats().dropped, 10 - accepted);

        gate.add_permits(10);
        assert!(sink.drain(Duration::from_secs(2)).await);
        assert_eq!(sink.stats().handled, accepted);
    }

    #[tokio::test]
    async fn test_drain_waits_for_worker() {
        let gate = Arc::new(Semaphore::new(0));
        let handler = Arc::new(GatedHandler { gate: gate.clone() });
        let (sink, _worker) = ExperienceSink::spawn(handler, 4);

        assert!(sink.record_experience(json!({}), "pattern_recorded", json!({}), 0.5, 0.5));
        assert!(!sink.drain(Duration::from_millis(50)).await);
        assert_eq!(sink.stats().pending(), 1);

        gate.add_permits(1);
        assert!(sink.drain(Duration::from_secs(2)).await);
        assert_eq!(sink.stats().handled, 1);
    }

    #[tokio::test]
    async fn test_drain_idle_sink_returns_immediately() {
        let sink = ExperienceSink::disabled();
        assert!(sink.drain(Duration::from_millis(1)).await);
    }

    #[tokio::test]
    async fn test_handler_failure_is_counted() {
        let (sink, _worker) = ExperienceSink::spawn(Arc::new(FailingHandler), 4);
        sink.record_experience(json!({}), "pattern_recorded", json!({}), 0.5, 0.5);

        assert!(sink.drain(Duration::from_secs(2)).await);
        assert_eq!(sink.stats().failed, 1);
    }

    #[test]
    fn test_disabled_sink_drops() {
        let sink = ExperienceSink::disabled();
        assert!(!sink.record_experience(json!({}), "x", json!({}), 0.0, 0.0));
        assert_eq!(sink.stats().dropped, 1);
        assert_eq!(sink.stats().pending(), 0);
    }
}
