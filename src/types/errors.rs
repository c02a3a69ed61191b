//! Tipos de erro do Presage.

use thiserror::Error;

/// Tipo de resultado padrão do Presage.
pub type PresageResult<T> = Result<T, PresageError>;

/// Erros possíveis no Presage.
#[derive(Error, Debug)]
pub enum PresageError {
    #[error("Erro de configuração: {0}")]
    Config(String),

    #[error("Erro de IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Erro ao parsear TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Erro ao serializar TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Erro de JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Falha do repositório SQLite (conta como falha de transporte).
    #[cfg(feature = "sqlite")]
    #[error("Erro no banco de dados: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Não encontrado: {0}")]
    NotFound(String),

    #[error("Falha de transporte: {0}")]
    TransportFailure(String),

    #[error("Ação não suportada: '{0}' (use analyze_current, forecast_24h, forecast_72h ou detect_patterns)")]
    UnsupportedAction(String),

    #[error("Resultado malformado do runtime numérico: {0}")]
    MalformedResult(String),

    #[error("Erro no servidor MCP: {0}")]
    McpServer(String),

    #[error("Erro no prompt interativo: {0}")]
    Prompt(String),

    #[error("{0}")]
    Other(String),
}

impl PresageError {
    /// Cria um erro genérico.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }

    /// Cria um erro de configuração.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Cria uma falha de transporte.
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::TransportFailure(msg.into())
    }

    /// Indica se o erro veio do repositório ou do runtime numérico.
    pub fn is_transport_failure(&self) -> bool {
        match self {
            Self::TransportFailure(_) => true,
            #[cfg(feature = "sqlite")]
            Self::Database(_) => true,
            _ => false,
        }
    }
}

#[cfg(feature = "cli")]
impl From<dialoguer::Error> for PresageError {
    fn from(e: dialoguer::Error) -> Self {
        Self::Prompt(e.to_string())
    }
}
