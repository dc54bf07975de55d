//! Collaborator seams shared across the presso workspace.
//!
//! The pub/sub transport is a black box to the core: everything the
//! dispatcher needs from it is captured by [`MessageChannel`]. Errors cross
//! this boundary as boxed trait objects and are mapped to typed errors by the
//! consumer.
pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Error type used at trait boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Delivery guarantee requested for a publish or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QoS {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

/// A message delivered by the channel to a registered handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Callback invoked for every inbound message. May run on the channel's own
/// delivery thread.
pub type MessageHandler = Box<dyn Fn(Message) + Send + Sync>;

/// Topic-based publish/subscribe transport.
pub trait MessageChannel {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), BoxError>;
    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), BoxError>;
    /// Replace the inbound message handler.
    fn on_message(&mut self, handler: MessageHandler);
    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), BoxError>;
    fn disconnect(&mut self) -> Result<(), BoxError>;

    /// Largest payload the transport accepts, when it advertises one.
    fn max_payload(&self) -> Option<usize> {
        None
    }
}

impl<C: MessageChannel + ?Sized> MessageChannel for Box<C> {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), BoxError> {
        (**self).connect(host, port)
    }
    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), BoxError> {
        (**self).subscribe(topic, qos)
    }
    fn on_message(&mut self, handler: MessageHandler) {
        (**self).on_message(handler);
    }
    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), BoxError> {
        (**self).publish(topic, payload, qos)
    }
    fn disconnect(&mut self) -> Result<(), BoxError> {
        (**self).disconnect()
    }
    fn max_payload(&self) -> Option<usize> {
        (**self).max_payload()
    }
}
