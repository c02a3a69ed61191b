//! Runtime numérico: detecção de anomalias, previsão e reconhecimento de padrões.
//!
//! O núcleo fala com o runtime através do trait [`NumericEngine`], que pode
//! rodar in-process ([`InProcessEngine`]) ou num processo externo
//! ([`ExternalEngine`]).

mod detector;
mod engine;
mod external;
mod forecaster;
mod recognizer;
pub mod stats;

use std::sync::Arc;

pub use detector::AnomalyDetector;
pub use engine::{InProcessEngine, NumericEngine};
pub use external::ExternalEngine;
pub use forecaster::Forecaster;
pub use recognizer::PatternRecognizer;
pub use stats::{extract_series, DataPoint, LinearFit, SeriesStats};

use crate::types::config::{Config, EngineKind};

/// Cria o engine configurado.
pub fn build_engine(config: &Config) -> Arc<dyn NumericEngine> {
    match config.engine.kind {
        EngineKind::InProcess => Arc::new(InProcessEngine::from_config(&config.analysis)),
        EngineKind::External => Arc::new(ExternalEngine::from_config(&config.engine)),
    }
}
