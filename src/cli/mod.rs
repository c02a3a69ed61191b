//! Interface de linha de comando do Presage.

pub mod commands;
pub mod interactive;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::types::config::CONFIG_FILE_NAME;

/// Presage - detecção de anomalias e previsões sobre séries operacionais.
#[derive(Parser, Debug)]
#[command(name = "presage")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Arquivo de configuração.
    #[arg(short, long, default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Modo verbose.
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Modo silencioso.
    #[arg(short, long)]
    pub quiet: bool,

    /// Comando a executar.
    #[command(subcommand)]
    pub command: Commands,
}

/// Comandos disponíveis.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inicializa configuração no diretório atual.
    Init {
        /// Diretório de destino (padrão: diretório atual).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Inicia o servidor MCP (stdio).
    Serve,

    /// Executa uma análise sobre a janela recente de uma fonte.
    Analyze {
        /// analyze_current, forecast_24h, forecast_72h ou detect_patterns.
        #[arg(short, long)]
        action: String,

        /// Fonte de dados (agents, tasks, mining, python_executions, dao).
        #[arg(short, long)]
        source: String,

        /// Arquivo JSON com observações usadas no lugar da janela armazenada.
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Grava observações de um arquivo JSON no repositório.
    Ingest {
        /// Fonte das observações.
        #[arg(short, long)]
        source: String,

        /// Arquivo JSON (objeto ou lista de objetos).
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Lista patterns aprendidos.
    Patterns {
        /// Filtra por tipo.
        #[arg(short = 't', long = "type", conflicts_with = "min_confidence")]
        pattern_type: Option<String>,

        /// Confiança mínima (padrão: learning.min_confidence).
        #[arg(short, long)]
        min_confidence: Option<f64>,
    },

    /// Registra uma observação de pattern.
    RecordPattern {
        /// Tipo do pattern.
        #[arg(short = 't', long = "type")]
        pattern_type: String,

        /// Dados do pattern (JSON).
        #[arg(short, long, default_value = "{}")]
        data: String,

        /// Confiança inicial (só na primeira observação).
        #[arg(short, long)]
        confidence: Option<f64>,
    },

    /// Mostra os insights mais recentes.
    Insights {
        /// Filtra por fonte.
        #[arg(short, long)]
        source: Option<String>,

        /// Número máximo de insights.
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Exporta patterns para JSON.
    Export {
        /// Arquivo de saída.
        #[arg(short, long, default_value = "presage_patterns.json")]
        output: PathBuf,
    },

    /// Importa patterns de JSON.
    Import {
        /// Arquivo de entrada.
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Configura opções interativamente.
    Config,

    /// Mostra o estado do repositório e do aprendizado.
    Status,

    /// Mostra versão.
    Version,
}
