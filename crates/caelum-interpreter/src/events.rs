//! Process-wide event queue.
//!
//! Events are `(topic, payload)` pairs appended FIFO. Waiters match the head
//! only: if the head is a different topic they keep sleeping until the queue
//! changes again. Topics may be qualified by a channel as `topic@channel`.

use caelum_core::{ScriptError, Value};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Notify;

/// The shared FIFO event queue.
pub struct EventBus {
    queue: Mutex<VecDeque<(String, Value)>>,
    notify: Notify,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Qualifies a topic with an optional channel.
    pub fn qualified(topic: &str, channel: Option<&str>) -> String {
        match channel {
            Some(c) if !c.is_empty() => format!("{topic}@{c}"),
            _ => topic.to_string(),
        }
    }

    /// Appends an event and wakes all waiters.
    pub fn broadcast(&self, topic: &str, payload: Value) {
        tracing::debug!(target: "caelum::script", topic = %topic, "Broadcasting event");
        self.queue.lock().push_back((topic.to_string(), payload));
        self.notify.notify_waiters();
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    fn try_pop_head(&self, topics: &[String]) -> Option<(String, Value)> {
        let mut queue = self.queue.lock();
        match queue.front() {
            Some((topic, _)) if topics.iter().any(|t| t == topic) => queue.pop_front(),
            _ => None,
        }
    }

    /// Blocks until the head of the queue is `topic`, then pops it.
    pub async fn wait_for(&self, topic: &str) -> (String, Value) {
        let topics = [topic.to_string()];
        loop {
            let notified = self.notify.notified();
            if let Some(event) = self.try_pop_head(&topics) {
                return event;
            }
            notified.await;
        }
    }

    /// Blocks until the head matches any of `topics`, with an optional
    /// timeout, then pops it.
    pub async fn listen(
        &self,
        topics: &[String],
        timeout: Option<Duration>,
    ) -> Result<(String, Value), ScriptError> {
        let wait = async {
            loop {
                let notified = self.notify.notified();
                if let Some(event) = self.try_pop_head(topics) {
                    return event;
                }
                notified.await;
            }
        };
        match timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await.map_err(|_| {
                ScriptError::EventTimeout {
                    timeout_ms: limit.as_millis() as u64,
                }
            }),
            None => Ok(wait.await),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_qualified_topics() {
        assert_eq!(EventBus::qualified("ready", Some("c")), "ready@c");
        assert_eq!(EventBus::qualified("ready", None), "ready");
        assert_eq!(EventBus::qualified("ready", Some("")), "ready");
    }

    #[tokio::test]
    async fn test_broadcast_then_wait_pops_once() {
        let bus = EventBus::new();
        bus.broadcast("ready", Value::Null);
        let (topic, _) = bus.wait_for("ready").await;
        assert_eq!(topic, "ready");
        assert!(bus.is_empty());
    }

    #[tokio::test]
    async fn test_wait_unblocks_cross_task() {
        let bus = Arc::new(EventBus::new());
        let waiter = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move { bus.wait_for("go").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        bus.broadcast("go", Value::from(1i64));
        let (topic, payload) = waiter.await.unwrap();
        assert_eq!(topic, "go");
        assert_eq!(payload, Value::from(1i64));
    }

    #[tokio::test]
    async fn test_head_only_matching() {
        let bus = EventBus::new();
        bus.broadcast("first", Value::Null);
        bus.broadcast("second", Value::Null);
        // "second" is behind "first", so a listen for it must time out.
        let err = bus
            .listen(&["second".to_string()], Some(Duration::from_millis(30)))
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::EventTimeout { .. }));
        // The head still pops in FIFO order.
        let (topic, _) = bus.wait_for("first").await;
        assert_eq!(topic, "first");
    }

    #[tokio::test]
    async fn test_listen_timeout() {
        let bus = EventBus::new();
        let err = bus
            .listen(&["never".to_string()], Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptError::EventTimeout { timeout_ms: 20 }));
    }

    #[tokio::test]
    async fn test_fifo_order_preserved() {
        let bus = EventBus::new();
        bus.broadcast("a", Value::from(1i64));
        bus.broadcast("a", Value::from(2i64));
        let (_, first) = bus.wait_for("a").await;
        let (_, second) = bus.wait_for("a").await;
        assert_eq!(first, Value::from(1i64));
        assert_eq!(second, Value::from(2i64));
    }
}
