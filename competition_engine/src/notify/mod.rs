//! Change notifications toward real-time listeners.
//!
//! Publishing never fails the caller. Adapters that can fail log the error
//! and drop the message.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

pub const TIE_UPDATED: &str = "tie.updated";
pub const MATCH_UPDATED: &str = "match.updated";
pub const SUSPENSION_UPDATED: &str = "suspension.updated";
pub const ROSTER_PUBLISHED: &str = "roster.published";

/// Outbound notification port
pub trait Notifier: Send + Sync {
    fn publish(&self, topic: &str, payload: Value);
}

/// Serialize `value` and publish it, dropping it if it cannot be encoded
pub fn publish_json<T: Serialize>(notifier: &dyn Notifier, topic: &str, value: &T) {
    match serde_json::to_value(value) {
        Ok(payload) => notifier.publish(topic, payload),
        Err(e) => log::warn!("Dropping {} notification: {}", topic, e),
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn publish(&self, _topic: &str, _payload: Value) {}
}

/// Writes notifications to the log at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn publish(&self, topic: &str, payload: Value) {
        log::info!("[{}] {}", topic, payload);
    }
}

/// A published notification as seen by broadcast subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub topic: String,
    pub payload: Value,
}

/// Fans notifications out over a tokio broadcast channel.
///
/// Slow subscribers lag and lose messages; publishing never waits on them.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn publish(&self, topic: &str, payload: Value) {
        let notification = Notification {
            topic: topic.to_string(),
            payload,
        };
        if let Err(e) = self.sender.send(notification) {
            log::debug!("No subscribers for {}: {}", topic, e);
        }
    }
}
