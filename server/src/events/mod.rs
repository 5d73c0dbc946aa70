//! Internal publish/subscribe topology.
//!
//! Two channels: `events:deal` feeds the real-time fan-out and the bot
//! notification bridge, `events:bot` carries human-readable notifications.
//! Publication is best-effort everywhere; the audit log is the durable
//! record, subscribers must tolerate redelivery and reordering.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const TOPIC_DEAL: &str = "events:deal";
pub const TOPIC_BOT: &str = "events:bot";

pub const EVENT_DEAL_STATUS_CHANGED: &str = "deal_status_changed";
pub const EVENT_PAYMENT_RECEIVED: &str = "payment_received";
pub const EVENT_BOT_NOTIFICATION: &str = "bot_notification";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(event_type: &str, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.to_string(),
            payload,
        }
    }
}

pub type EventHandler = Arc<dyn Fn(Event) + Send + Sync>;

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, event: Event) -> Result<()>;
}

#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Registers `handler` for `topic`. Delivery runs until the process
    /// shuts down; the handler must not block.
    async fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Redis pub/sub
// ---------------------------------------------------------------------------

pub struct RedisPublisher {
    pool: deadpool_redis::Pool,
}

impl RedisPublisher {
    pub fn new(pool: deadpool_redis::Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Publisher for RedisPublisher {
    async fn publish(&self, topic: &str, event: Event) -> Result<()> {
        let data = serde_json::to_string(&event).context("failed to serialize event")?;
        let mut conn = self.pool.get().await.context("redis connection failed")?;
        redis::cmd("PUBLISH")
            .arg(topic)
            .arg(data)
            .query_async::<_, ()>(&mut conn)
            .await
            .context("redis PUBLISH failed")?;
        Ok(())
    }
}

pub struct RedisSubscriber {
    client: redis::Client,
}

impl RedisSubscriber {
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("invalid redis url")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Subscriber for RedisSubscriber {
    async fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<()> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .context("failed to open redis pubsub connection")?;
        pubsub
            .subscribe(topic)
            .await
            .with_context(|| format!("failed to subscribe to {topic}"))?;

        let topic = topic.to_string();
        tokio::spawn(async move {
            use futures_util::StreamExt;
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!(topic = %topic, error = %e, "unreadable pubsub message");
                        continue;
                    }
                };
                match serde_json::from_str::<Event>(&payload) {
                    Ok(event) => handler(event),
                    Err(e) => {
                        tracing::warn!(topic = %topic, error = %e, "failed to decode event")
                    }
                }
            }
            tracing::warn!(topic = %topic, "pubsub stream ended");
        });

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory bus (tests, single-process deployments)
// ---------------------------------------------------------------------------

/// Synchronous in-process bus with the same contract as redis pub/sub.
#[derive(Clone, Default)]
pub struct MemoryBus {
    handlers: Arc<Mutex<HashMap<String, Vec<EventHandler>>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Publisher for MemoryBus {
    async fn publish(&self, topic: &str, event: Event) -> Result<()> {
        let handlers = {
            let map = self.handlers.lock().expect("bus lock poisoned");
            map.get(topic).cloned().unwrap_or_default()
        };
        for handler in handlers {
            handler(event.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl Subscriber for MemoryBus {
    async fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<()> {
        self.handlers
            .lock()
            .expect("bus lock poisoned")
            .entry(topic.to_string())
            .or_default()
            .push(handler);
        Ok(())
    }
}

/// Publisher that remembers everything it saw; assertions read it back.
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    published: Arc<Mutex<Vec<(String, Event)>>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, Event)> {
        self.published.lock().expect("recorder lock poisoned").clone()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|(_, e)| e.event_type == event_type)
            .map(|(_, e)| e)
            .collect()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, topic: &str, event: Event) -> Result<()> {
        self.published
            .lock()
            .expect("recorder lock poisoned")
            .push((topic.to_string(), event));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_bus_delivers_to_subscribers() {
        let bus = MemoryBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        bus.subscribe(
            TOPIC_DEAL,
            Arc::new(move |event| {
                seen_clone.lock().unwrap().push(event.event_type.clone());
            }),
        )
        .await
        .unwrap();

        bus.publish(
            TOPIC_DEAL,
            Event::new(EVENT_DEAL_STATUS_CHANGED, serde_json::json!({"deal_id": "d1"})),
        )
        .await
        .unwrap();
        // Different topic, must not be delivered.
        bus.publish(
            TOPIC_BOT,
            Event::new(EVENT_BOT_NOTIFICATION, serde_json::json!({})),
        )
        .await
        .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![EVENT_DEAL_STATUS_CHANGED.to_string()]);
    }

    #[test]
    fn event_json_shape() {
        let event = Event::new(EVENT_PAYMENT_RECEIVED, serde_json::json!({"deal_id": "d1"}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "payment_received");
        assert_eq!(json["payload"]["deal_id"], "d1");
    }
}
