//! Concrete `MessageChannel` backends.
//!
//! `SimulatedDevice` stands in for the espresso machine and its broker: it
//! accepts a connection, and answers every publish with an acknowledgment on
//! the ack topic from a background delivery thread. The MQTT backend is
//! behind the `mqtt` feature.
pub mod error;
#[cfg(feature = "mqtt")]
pub mod mqtt;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Sender, unbounded};
use presso_traits::{BoxError, Message, MessageChannel, MessageHandler, QoS};

use crate::error::LinkError;

#[cfg(feature = "mqtt")]
pub use mqtt::{MqttChannel, MqttSettings};

/// Behaviour knobs for [`SimulatedDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimOptions {
    pub ack_payload: Vec<u8>,
    pub ack_delay: Duration,
    /// Accept publishes but never acknowledge.
    pub silent: bool,
    pub refuse_connect: bool,
    pub reject_publish: bool,
    pub max_payload: Option<usize>,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            ack_payload: b"profile received".to_vec(),
            ack_delay: Duration::from_millis(20),
            silent: false,
            refuse_connect: false,
            reject_publish: false,
            max_payload: None,
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| matches!(v.as_str(), "1" | "true" | "yes"))
}

impl SimOptions {
    /// Defaults overridden by `PRESSO_SIM_SILENT`, `PRESSO_SIM_REFUSE`,
    /// `PRESSO_SIM_REJECT` and `PRESSO_SIM_ACK_DELAY_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let ack_delay = std::env::var("PRESSO_SIM_ACK_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(defaults.ack_delay, Duration::from_millis);
        Self {
            ack_delay,
            silent: env_flag("PRESSO_SIM_SILENT"),
            refuse_connect: env_flag("PRESSO_SIM_REFUSE"),
            reject_publish: env_flag("PRESSO_SIM_REJECT"),
            ..defaults
        }
    }
}

/// What a [`SimulatedDevice`] has seen, shared with the caller.
#[derive(Debug, Default, Clone)]
pub struct SimRecord {
    pub connects: usize,
    pub disconnects: usize,
    pub published: Vec<Message>,
}

#[derive(Debug, Default, Clone)]
pub struct SimStats(Arc<Mutex<SimRecord>>);

impl SimStats {
    pub fn snapshot(&self) -> SimRecord {
        self.0.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn update(&self, f: impl FnOnce(&mut SimRecord)) {
        if let Ok(mut r) = self.0.lock() {
            f(&mut r);
        }
    }
}

type SharedHandler = Arc<Mutex<Option<MessageHandler>>>;

struct Delivery {
    tx: Sender<Message>,
    worker: JoinHandle<()>,
}

/// In-process stand-in for the broker plus the machine behind it.
pub struct SimulatedDevice {
    ack_topic: String,
    opts: SimOptions,
    handler: SharedHandler,
    subscriptions: HashSet<String>,
    delivery: Option<Delivery>,
    stats: SimStats,
}

impl std::fmt::Debug for SimulatedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedDevice")
            .field("ack_topic", &self.ack_topic)
            .field("opts", &self.opts)
            .field("connected", &self.delivery.is_some())
            .finish_non_exhaustive()
    }
}

impl SimulatedDevice {
    pub fn new(ack_topic: impl Into<String>, opts: SimOptions) -> Self {
        Self {
            ack_topic: ack_topic.into(),
            opts,
            handler: Arc::new(Mutex::new(None)),
            subscriptions: HashSet::new(),
            delivery: None,
            stats: SimStats::default(),
        }
    }

    pub fn stats(&self) -> SimStats {
        self.stats.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.delivery.is_some()
    }

    fn start_delivery(&self) -> std::io::Result<Delivery> {
        let (tx, rx) = unbounded::<Message>();
        let handler = Arc::clone(&self.handler);
        let delay = self.opts.ack_delay;
        let worker = std::thread::Builder::new()
            .name("presso-sim-delivery".into())
            .spawn(move || {
                for msg in rx {
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    if let Ok(guard) = handler.lock()
                        && let Some(h) = guard.as_ref()
                    {
                        h(msg);
                    }
                }
            })?;
        Ok(Delivery { tx, worker })
    }
}

impl MessageChannel for SimulatedDevice {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), BoxError> {
        self.stats.update(|r| r.connects += 1);
        if self.opts.refuse_connect {
            return Err(Box::new(LinkError::Refused {
                host: host.to_string(),
                port,
            }));
        }
        if self.delivery.is_none() {
            self.delivery = Some(self.start_delivery().map_err(LinkError::from)?);
        }
        tracing::debug!(host, port, "simulated device connected");
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, _qos: QoS) -> Result<(), BoxError> {
        if self.delivery.is_none() {
            return Err(Box::new(LinkError::NotConnected));
        }
        self.subscriptions.insert(topic.to_string());
        Ok(())
    }

    fn on_message(&mut self, handler: MessageHandler) {
        if let Ok(mut h) = self.handler.lock() {
            *h = Some(handler);
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8], _qos: QoS) -> Result<(), BoxError> {
        let Some(delivery) = self.delivery.as_ref() else {
            return Err(Box::new(LinkError::NotConnected));
        };
        if let Some(limit) = self.opts.max_payload
            && payload.len() > limit
        {
            return Err(Box::new(LinkError::PayloadTooLarge {
                size: payload.len(),
                limit,
            }));
        }
        if self.opts.reject_publish {
            return Err(Box::new(LinkError::PublishRejected(topic.to_string())));
        }
        self.stats
            .update(|r| r.published.push(Message::new(topic, payload)));
        tracing::debug!(topic, bytes = payload.len(), "simulated device received");

        if !self.opts.silent && self.subscriptions.contains(&self.ack_topic) {
            let ack = Message::new(self.ack_topic.clone(), self.opts.ack_payload.clone());
            // the worker only exits once the sender is dropped
            let _ = delivery.tx.send(ack);
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), BoxError> {
        self.stats.update(|r| r.disconnects += 1);
        self.subscriptions.clear();
        if let Some(Delivery { tx, worker }) = self.delivery.take() {
            drop(tx);
            if worker.join().is_err() {
                tracing::warn!("simulated delivery thread panicked");
            }
        }
        Ok(())
    }

    fn max_payload(&self) -> Option<usize> {
        self.opts.max_payload
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        if let Some(Delivery { tx, worker }) = self.delivery.take() {
            drop(tx);
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn publish_before_connect_fails() {
        let mut dev = SimulatedDevice::new("acks", SimOptions::default());
        assert!(dev.publish("cmds", b"[]", QoS::AtLeastOnce).is_err());
        assert!(dev.subscribe("acks", QoS::AtLeastOnce).is_err());
    }

    #[test]
    fn acks_only_when_subscribed() {
        let mut dev = SimulatedDevice::new(
            "acks",
            SimOptions {
                ack_delay: Duration::ZERO,
                ..SimOptions::default()
            },
        );
        let (tx, rx) = bounded(4);
        dev.on_message(Box::new(move |m| {
            let _ = tx.try_send(m);
        }));
        dev.connect("localhost", 1883).unwrap();
        dev.publish("cmds", b"[]", QoS::AtLeastOnce).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        dev.subscribe("acks", QoS::AtLeastOnce).unwrap();
        dev.publish("cmds", b"[]", QoS::AtLeastOnce).unwrap();
        let ack = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(ack.topic, "acks");
        dev.disconnect().unwrap();
        assert!(!dev.is_connected());
    }
}
