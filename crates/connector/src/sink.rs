//! Downstream destinations for response messages.

use std::time::Duration;

use async_trait::async_trait;
use common::types::Message;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::errors::SinkError;

#[async_trait]
pub trait MessageSink: Send + Sync {
    fn name(&self) -> &str;
    async fn publish(&self, message: Message) -> Result<(), SinkError>;
}

/// In-process queue sink; pair it with the [`ChannelReceiver`] returned by
/// [`channel`].
#[derive(Clone)]
pub struct ChannelSink {
    name: String,
    tx: mpsc::Sender<Message>,
}

pub struct ChannelReceiver {
    rx: Mutex<mpsc::Receiver<Message>>,
}

/// Bounded queue of `capacity` messages. Publishing waits while it is full.
pub fn channel(name: &str, capacity: usize) -> (ChannelSink, ChannelReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ChannelSink { name: name.to_string(), tx },
        ChannelReceiver { rx: Mutex::new(rx) },
    )
}

#[async_trait]
impl MessageSink for ChannelSink {
    fn name(&self) -> &str { &self.name }

    async fn publish(&self, message: Message) -> Result<(), SinkError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| SinkError::Closed(self.name.clone()))
    }
}

impl ChannelReceiver {
    /// Next message, or `None` once `timeout` elapses or every sender is gone.
    pub async fn receive(&self, timeout: Duration) -> Option<Message> {
        let mut rx = self.rx.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }

    pub async fn receive_body(&self, timeout: Duration) -> Option<Value> {
        self.receive(timeout).await.map(|m| m.body)
    }

    /// Whatever is queued right now, without waiting.
    pub async fn drain(&self) -> Vec<Message> {
        let mut rx = self.rx.lock().await;
        let mut out = Vec::new();
        while let Ok(m) = rx.try_recv() {
            out.push(m);
        }
        out
    }
}

/// Writes each message as one JSON line to an async writer.
pub struct JsonLinesSink<W> {
    name: String,
    writer: Mutex<W>,
}

impl<W> JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(name: &str, writer: W) -> Self {
        Self { name: name.to_string(), writer: Mutex::new(writer) }
    }

    pub fn into_inner(self) -> W { self.writer.into_inner() }
}

impl JsonLinesSink<tokio::io::Stdout> {
    pub fn stdout() -> Self { Self::new("stdout", tokio::io::stdout()) }
}

#[async_trait]
impl<W> MessageSink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &str { &self.name }

    async fn publish(&self, message: Message) -> Result<(), SinkError> {
        let mut line = message.to_json_line().map_err(|e| SinkError::Encode(e.to_string()))?;
        line.push('\n');
        // one lock per line keeps concurrent writers from interleaving
        let mut w = self.writer.lock().await;
        w.write_all(line.as_bytes()).await.map_err(|e| SinkError::Io(e.to_string()))?;
        w.flush().await.map_err(|e| SinkError::Io(e.to_string()))?;
        debug!(sink = %self.name, bytes = line.len(), "message published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn channel_sink_delivers_in_order() -> Result<(), anyhow::Error> {
        let (sink, out) = channel("out", 8);
        sink.publish(Message::new(json!(1))).await?;
        sink.publish(Message::new(json!(2))).await?;

        assert_eq!(out.receive_body(Duration::from_secs(1)).await, Some(json!(1)));
        assert_eq!(out.receive_body(Duration::from_secs(1)).await, Some(json!(2)));
        assert_eq!(out.receive_body(Duration::from_millis(20)).await, None);
        Ok(())
    }

    #[tokio::test]
    async fn closed_channel_reports_sink_name() {
        let (sink, out) = channel("out", 1);
        drop(out);
        let err = sink.publish(Message::empty()).await.unwrap_err();
        assert!(matches!(err, SinkError::Closed(ref n) if n == "out"));
    }

    #[tokio::test]
    async fn json_lines_sink_writes_one_line_per_message() -> Result<(), anyhow::Error> {
        let sink = JsonLinesSink::new("mem", Vec::<u8>::new());
        sink.publish(Message::new(json!(["my-foo"]))).await?;
        sink.publish(Message::new(json!(true))).await?;

        let written = String::from_utf8(sink.into_inner())?;
        let lines: Vec<_> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(Message::from_json_line(lines[0])?.body, json!(["my-foo"]));
        assert_eq!(Message::from_json_line(lines[1])?.body, json!(true));
        Ok(())
    }
}
