//! # Presage
//!
//! Store adaptativo de patterns e motor de insights preditivos.
//!
//! Presage busca a janela recente de observações de uma fonte de dados,
//! executa detecção de anomalias ou previsões de curto prazo e grava os
//! resultados como insights, reforçando os patterns que se repetem.
//!
//! ## Módulos
//!
//! - [`types`] - Tipos compartilhados, configuração e erros
//! - [`store`] - Repositório (SQLite ou memória)
//! - [`learning`] - Pattern store, política de reforço e sink de experiências
//! - [`sources`] - Adaptador de fontes de métricas
//! - [`analytics`] - Detector, forecaster e engines numéricos
//! - [`insights`] - Gravação de insights e auditoria
//! - [`pipeline`] - `run_analysis` e montagem dos serviços
//! - [`mcp`] - Servidor MCP (Model Context Protocol)
//! - [`cli`] - Interface de linha de comando (feature `cli`)

pub mod analytics;
#[cfg(feature = "cli")]
pub mod cli;
pub mod insights;
pub mod learning;
pub mod mcp;
pub mod pipeline;
pub mod sources;
pub mod store;
pub mod types;

pub use pipeline::{AnalysisRunner, Services};
pub use types::config::Config;
pub use types::errors::{PresageError, PresageResult};
