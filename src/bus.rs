//! C12 — bus contract.
//!
//! `Publisher`/`Consumer` traits model the durable JetStream-like bus named
//! in the external interfaces section. `InProcessBus` is a reference
//! implementation built on `tokio::sync::{broadcast, mpsc}`, grounded in
//! the teacher's `broadcast::channel::<WsServerEvent>` fan-out in
//! `main.rs` — good enough to run the orchestrator end-to-end without a
//! live deployment, not a replacement for one.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};

pub struct BusMessage {
    pub subject: String,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<()>;
}

#[async_trait]
pub trait Consumer: Send {
    async fn recv(&mut self) -> Result<Option<BusMessage>>;
}

const CHANNEL_CAPACITY: usize = 4096;

/// A multi-subject pub/sub bus kept entirely in process memory. Each
/// subject gets its own broadcast channel, created lazily on first publish
/// or subscribe.
pub struct InProcessBus {
    subjects: Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self {
            subjects: Mutex::new(HashMap::new()),
        }
    }

    fn sender_for(&self, subject: &str) -> broadcast::Sender<Vec<u8>> {
        let mut subjects = self.subjects.lock();
        subjects
            .entry(subject.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Subscribes to one subject, returning a [`Consumer`] that yields
    /// messages published after this call.
    pub fn subscribe(&self, subject: &str) -> InProcessConsumer {
        let sender = self.sender_for(subject);
        InProcessConsumer {
            subject: subject.to_string(),
            receiver: sender.subscribe(),
        }
    }
}

impl Default for InProcessBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for InProcessBus {
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<()> {
        let sender = self.sender_for(subject);
        // No active subscribers is not an error; the message is simply dropped,
        // matching an at-most-once durable subject with zero live consumers.
        let _ = sender.send(payload.to_vec());
        Ok(())
    }
}

pub struct InProcessConsumer {
    subject: String,
    receiver: broadcast::Receiver<Vec<u8>>,
}

#[async_trait]
impl Consumer for InProcessConsumer {
    async fn recv(&mut self) -> Result<Option<BusMessage>> {
        match self.receiver.recv().await {
            Ok(payload) => Ok(Some(BusMessage {
                subject: self.subject.clone(),
                payload,
            })),
            Err(broadcast::error::RecvError::Closed) => Ok(None),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                Err(anyhow::anyhow!("consumer for {} lagged, dropped {} messages", self.subject, skipped))
            }
        }
    }
}

/// A point-to-point queue used internally to hand work from stream workers
/// to the coordinator task, distinct from the pub/sub bus above. Grounded
/// in the teacher's `spawn_workers` pulling off a shared
/// `Arc<Mutex<mpsc::Receiver<EnrichmentJob>>>`.
pub fn coordinator_channel<T: Send + 'static>(capacity: usize) -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
    mpsc::channel(capacity)
}

pub fn decode_envelope_err(subject: &str, err: serde_json::Error) -> anyhow::Error {
    anyhow::Error::new(err).context(format!("decoding message on subject {}", subject))
}

pub fn must_utf8(payload: &[u8]) -> Result<&str> {
    std::str::from_utf8(payload).context("bus payload was not valid utf-8")
}
