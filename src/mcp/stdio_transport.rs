// Line-delimited JSON over stdin/stdout.
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};

use crate::errors::{DeskError, DeskResult};
use crate::mcp::transport::McpTransport;

/// One JSON message per line. Blank lines are skipped.
pub struct LineTransport<R, W> {
    lines: Lines<BufReader<R>>,
    writer: W,
}

pub type StdioTransport = LineTransport<tokio::io::Stdin, tokio::io::Stdout>;

impl StdioTransport {
    pub fn stdio() -> Self {
        LineTransport::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }
}

#[async_trait]
impl<R, W> McpTransport for LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> DeskResult<Option<String>> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            if !line.trim().is_empty() {
                return Ok(Some(line));
            }
        }
    }

    async fn send(&mut self, message: &serde_json::Value) -> DeskResult<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');
        self.writer
            .write_all(&line)
            .await
            .map_err(|e| DeskError::Transport(format!("write: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| DeskError::Transport(format!("flush: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn reads_lines_and_skips_blanks() {
        let input: &[u8] = b"{\"a\":1}\n\n  \n{\"b\":2}\n";
        let mut transport = LineTransport::new(input, Vec::new());
        assert_eq!(transport.recv().await.unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(transport.recv().await.unwrap().as_deref(), Some("{\"b\":2}"));
        assert_eq!(transport.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn writes_one_message_per_line() {
        let mut transport = LineTransport::new(&b""[..], Vec::new());
        transport.send(&json!({"x": 1})).await.unwrap();
        transport.send(&json!({"y": 2})).await.unwrap();
        assert_eq!(transport.writer, b"{\"x\":1}\n{\"y\":2}\n");
    }
}
