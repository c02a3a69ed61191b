//! Aprendizado adaptativo de patterns.
//!
//! ## Componentes
//!
//! - **PatternStore**: upsert com reforço e consultas por confiança
//! - **ReinforcementPolicy**: próximo valor de confiança (passo fixo)
//! - **ExperienceSink**: fila best-effort para o subsistema secundário de aprendizado
//! - **Export/Import**: compartilhamento de patterns entre instalações

mod export;
mod patterns;
mod policy;
mod sink;

pub use export::{format_patterns, ImportResult, PatternExport, EXPORT_VERSION};
pub use patterns::{PatternStore, PATTERN_RECORDED};
pub use policy::ReinforcementPolicy;
pub use sink::{ExperienceHandler, ExperienceSink, RepositoryExperienceHandler, SinkStats};
