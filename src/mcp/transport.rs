//! Transporte MCP: JSON-RPC delimitado por newline.
//!
//! Cada mensagem ocupa uma linha; respostas são serializadas em JSON
//! compacto e seguidas de `\n`, com flush imediato.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};

use super::protocol::JsonRpcResponse;
use crate::PresageResult;

/// Linha lida do canal.
#[derive(Debug, PartialEq, Eq)]
pub enum Incoming {
    /// Uma linha não vazia (ainda não parseada).
    Line(String),
    /// Fim do stream: o cliente desconectou.
    Closed,
}

/// Transporte sobre qualquer par leitor/escritor assíncrono.
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

/// Transporte sobre stdin/stdout do processo.
pub type StdioTransport = LineTransport<BufReader<Stdin>, Stdout>;

impl StdioTransport {
    pub fn stdio() -> Self {
        LineTransport::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Lê a próxima linha não vazia.
    pub async fn next_line(&mut self) -> PresageResult<Incoming> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).await? == 0 {
                return Ok(Incoming::Closed);
            }
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(Incoming::Line(trimmed.to_string()));
            }
        }
    }

    /// Escreve uma response como uma linha.
    pub async fn send(&mut self, response: &JsonRpcResponse) -> PresageResult<()> {
        let mut body = serde_json::to_vec(response)?;
        body.push(b'\n');
        self.writer.write_all(&body).await?;
        self.writer.flush().await?;

        tracing::debug!(id = ?response.id, is_error = response.is_error(), "Sent response");
        Ok(())
    }

    /// Devolve o escritor (usado em testes para inspecionar a saída).
    pub fn into_writer(self) -> W {
        self.writer
    }
}
