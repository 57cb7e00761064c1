// MCP transport trait.
use async_trait::async_trait;

use crate::errors::DeskResult;

/// One framed message in, one framed message out.
#[async_trait]
pub trait McpTransport: Send {
    /// Next raw message, or `None` once the peer has hung up.
    async fn recv(&mut self) -> DeskResult<Option<String>>;

    async fn send(&mut self, message: &serde_json::Value) -> DeskResult<()>;
}
