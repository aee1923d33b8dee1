use crate::protocol::ServerFrame;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

/// Seam between a connection's outbound queue and its transport writer.
#[async_trait]
pub trait ClientSink: Send {
    async fn send_frame(&mut self, frame: ServerFrame) -> anyhow::Result<()>;
}

/// Writes each frame as one CRLF-terminated JSON line.
pub struct JsonLineSink<W> {
    writer: W,
}

impl<W> JsonLineSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W> ClientSink for JsonLineSink<W>
where
    W: AsyncWriteExt + Unpin + Send,
{
    async fn send_frame(&mut self, frame: ServerFrame) -> anyhow::Result<()> {
        let json = serde_json::to_vec(&frame)?;
        self.writer.write_all(&json).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}
