//! Background mail delivery.
//!
//! `BackgroundMailDispatcher` hands messages to a worker thread over a channel;
//! the worker calls a `Mailer` and logs failures. Nothing is retried and no
//! failure reaches the caller that queued the message.

use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use thiserror::Error;
use tracing::{debug, error, info};

use rolegate_auth::{MailDispatcher, MessageKind, OutboundMessage};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),

    #[error("failed to start mail worker: {0}")]
    Spawn(String),
}

/// Delivers one message synchronously.
pub trait Mailer: Send + 'static {
    fn send(&self, message: &OutboundMessage) -> Result<(), MailError>;
}

/// Worker statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DispatchStats {
    pub queued: u64,
    pub sent: u64,
    pub failed: u64,
}

pub struct BackgroundMailDispatcher {
    sender: Mutex<Option<mpsc::Sender<OutboundMessage>>>,
    join: Mutex<Option<thread::JoinHandle<()>>>,
    stats: Arc<Mutex<DispatchStats>>,
}

impl BackgroundMailDispatcher {
    pub fn spawn<M: Mailer>(mailer: M) -> Result<Self, MailError> {
        let (tx, rx) = mpsc::channel::<OutboundMessage>();
        let stats = Arc::new(Mutex::new(DispatchStats::default()));
        let worker_stats = stats.clone();

        let join = thread::Builder::new()
            .name("mail-dispatcher".to_string())
            .spawn(move || worker_loop(mailer, rx, worker_stats))
            .map_err(|e| MailError::Spawn(e.to_string()))?;

        Ok(Self {
            sender: Mutex::new(Some(tx)),
            join: Mutex::new(Some(join)),
            stats,
        })
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Stop accepting messages, drain the queue and join the worker.
    pub fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let join = self.join.lock().ok().and_then(|mut j| j.take());
        if let Some(join) = join {
            if join.join().is_err() {
                error!("mail worker panicked");
            }
        }
    }
}

impl MailDispatcher for BackgroundMailDispatcher {
    fn dispatch(&self, message: OutboundMessage) {
        let kind = message.kind;
        let sent = match self.sender.lock() {
            Ok(sender) => match sender.as_ref() {
                Some(tx) => tx.send(message).is_ok(),
                None => false,
            },
            Err(_) => false,
        };
        if sent {
            if let Ok(mut s) = self.stats.lock() {
                s.queued += 1;
            }
        } else {
            error!(kind = ?kind, "mail worker is not running; message dropped");
        }
    }
}

impl Drop for BackgroundMailDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<M: Mailer>(
    mailer: M,
    rx: mpsc::Receiver<OutboundMessage>,
    stats: Arc<Mutex<DispatchStats>>,
) {
    debug!("mail worker started");
    for message in rx {
        let result = mailer.send(&message);
        let Ok(mut s) = stats.lock() else {
            continue;
        };
        match result {
            Ok(()) => s.sent += 1,
            Err(e) => {
                s.failed += 1;
                error!(
                    recipient = %message.recipient,
                    kind = ?message.kind,
                    error = %e,
                    "mail delivery failed"
                );
            }
        }
    }
    debug!("mail worker stopped");
}

/// Logs messages instead of delivering them. Tokens are never logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &OutboundMessage) -> Result<(), MailError> {
        info!(
            recipient = %message.recipient,
            subject = %message.subject,
            kind = ?message.kind,
            "outbound message"
        );
        Ok(())
    }
}

/// Records messages in memory. Usable as a `Mailer` or directly as a dispatcher.
#[derive(Debug, Default, Clone)]
pub struct MemoryMailer {
    messages: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Token from the most recent message of `kind` sent to `recipient`.
    pub fn last_token(&self, recipient: &str, kind: MessageKind) -> Option<String> {
        self.messages()
            .into_iter()
            .rev()
            .find(|m| m.recipient == recipient && m.kind == kind)
            .map(|m| m.token)
    }

    fn record(&self, message: OutboundMessage) {
        if let Ok(mut m) = self.messages.lock() {
            m.push(message);
        }
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, message: &OutboundMessage) -> Result<(), MailError> {
        self.record(message.clone());
        Ok(())
    }
}

impl MailDispatcher for MemoryMailer {
    fn dispatch(&self, message: OutboundMessage) {
        self.record(message);
    }
}
