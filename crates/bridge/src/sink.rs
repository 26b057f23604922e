use crate::codec::{get_string, put_string};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Where encoded plugin messages go. The proxy host implements this by forwarding the
/// payload through a connected server.
#[async_trait]
pub trait BridgeSink: Send + Sync {
    async fn send(&self, channel: &str, payload: Bytes) -> Result<()>;
}

/// A plugin message as handed to a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub channel: String,
    pub payload: Bytes,
}

/// Keeps frames in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    frames: Mutex<Vec<Frame>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn frames(&self) -> Vec<Frame> {
        self.frames.lock().await.clone()
    }
}

#[async_trait]
impl BridgeSink for MemorySink {
    async fn send(&self, channel: &str, payload: Bytes) -> Result<()> {
        self.frames.lock().await.push(Frame {
            channel: channel.to_string(),
            payload,
        });
        Ok(())
    }
}

/// Appends frames to a spool file for a relay process to pick up.
///
/// Each record is the channel name as a bridge string, a big-endian `u32` payload length,
/// then the payload.
#[derive(Debug)]
pub struct OutboxSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl OutboxSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every frame currently in the outbox. A missing file is an empty outbox.
    pub async fn read_all(&self) -> Result<Vec<Frame>> {
        match tokio::fs::read(&self.path).await {
            Ok(data) => decode_outbox(Bytes::from(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }
}

fn encode_record(channel: &str, payload: &[u8]) -> Result<Bytes> {
    let len = u32::try_from(payload.len())
        .map_err(|_| BridgeError::Malformed(format!("payload of {} bytes", payload.len())))?;
    let mut buf = BytesMut::with_capacity(payload.len() + channel.len() + 6);
    put_string(&mut buf, channel)?;
    buf.put_u32(len);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

pub fn decode_outbox(mut data: Bytes) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    while data.has_remaining() {
        let channel = get_string(&mut data)?;
        if data.remaining() < 4 {
            return Err(BridgeError::Truncated {
                needed: 4,
                remaining: data.remaining(),
            });
        }
        let len = data.get_u32() as usize;
        if data.remaining() < len {
            return Err(BridgeError::Truncated {
                needed: len,
                remaining: data.remaining(),
            });
        }
        let payload = data.split_to(len);
        frames.push(Frame { channel, payload });
    }
    Ok(frames)
}

#[async_trait]
impl BridgeSink for OutboxSink {
    async fn send(&self, channel: &str, payload: Bytes) -> Result<()> {
        let record = encode_record(channel, &payload)?;
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&record).await?;
        file.flush().await?;
        log::debug!("Queued {} byte frame for {channel}", payload.len());
        Ok(())
    }
}
