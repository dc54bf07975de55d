//! Test and helper doubles for presso_core.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use presso_traits::{BoxError, Message, MessageChannel, MessageHandler, QoS};

use crate::error::StoreError;
use crate::profile::Profile;
use crate::store::ProfileStore;

/// In-memory profile store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    profiles: BTreeMap<String, Profile>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryStore {
    fn load(&self, name: &str) -> Result<Profile, StoreError> {
        self.profiles
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn save(&mut self, name: &str, profile: &Profile) -> Result<(), StoreError> {
        if !presso_config::ProfileDir::is_valid_name(name) {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        self.profiles.insert(name.to_string(), profile.clone());
        Ok(())
    }

    fn list(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.profiles.keys().cloned().collect())
    }
}

/// One recorded call on a [`ScriptedChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect { host: String, port: u16 },
    Subscribe { topic: String },
    Publish { topic: String, payload: Vec<u8> },
    Disconnect,
}

/// Shared view of the calls a [`ScriptedChannel`] has seen.
#[derive(Debug, Default, Clone)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        if let Ok(mut v) = self.0.lock() {
            v.push(call);
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn connects(&self) -> usize {
        self.count(|c| matches!(c, Call::Connect { .. }))
    }

    pub fn publishes(&self) -> usize {
        self.count(|c| matches!(c, Call::Publish { .. }))
    }

    pub fn disconnects(&self) -> usize {
        self.count(|c| matches!(c, Call::Disconnect))
    }

    fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
        self.0
            .lock()
            .map(|v| v.iter().filter(|c| f(c)).count())
            .unwrap_or(0)
    }
}

/// How a [`ScriptedChannel`] answers a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    /// Deliver the ack from inside `publish`.
    #[default]
    Immediate,
    /// Deliver the ack from another thread after a delay.
    Delayed(Duration),
    /// Never acknowledge.
    Silent,
}

/// Channel double that records calls and acknowledges on a script.
pub struct ScriptedChannel {
    log: CallLog,
    handler: Option<Arc<MessageHandler>>,
    ack_topic: String,
    ack_payload: Vec<u8>,
    mode: AckMode,
    fail_connect: bool,
    fail_publish: bool,
    max_payload: Option<usize>,
}

impl std::fmt::Debug for ScriptedChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedChannel")
            .field("ack_topic", &self.ack_topic)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl ScriptedChannel {
    pub fn new(ack_topic: impl Into<String>) -> Self {
        Self {
            log: CallLog::default(),
            handler: None,
            ack_topic: ack_topic.into(),
            ack_payload: b"ok".to_vec(),
            mode: AckMode::Immediate,
            fail_connect: false,
            fail_publish: false,
            max_payload: None,
        }
    }

    pub fn with_mode(mut self, mode: AckMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_ack_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.ack_payload = payload.into();
        self
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn failing_publish(mut self) -> Self {
        self.fail_publish = true;
        self
    }

    pub fn with_max_payload(mut self, limit: usize) -> Self {
        self.max_payload = Some(limit);
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl MessageChannel for ScriptedChannel {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), BoxError> {
        self.log.push(Call::Connect {
            host: host.to_string(),
            port,
        });
        if self.fail_connect {
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "broker refused connection",
            )));
        }
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, _qos: QoS) -> Result<(), BoxError> {
        self.log.push(Call::Subscribe {
            topic: topic.to_string(),
        });
        Ok(())
    }

    fn on_message(&mut self, handler: MessageHandler) {
        self.handler = Some(Arc::new(handler));
    }

    fn publish(&mut self, topic: &str, payload: &[u8], _qos: QoS) -> Result<(), BoxError> {
        self.log.push(Call::Publish {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
        if self.fail_publish {
            return Err(Box::new(std::io::Error::other("publish rejected")));
        }
        let Some(handler) = self.handler.clone() else {
            return Ok(());
        };
        let ack = Message::new(self.ack_topic.clone(), self.ack_payload.clone());
        match self.mode {
            AckMode::Immediate => handler(ack),
            AckMode::Delayed(d) => {
                std::thread::spawn(move || {
                    std::thread::sleep(d);
                    handler(ack);
                });
            }
            AckMode::Silent => {}
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), BoxError> {
        self.log.push(Call::Disconnect);
        Ok(())
    }

    fn max_payload(&self) -> Option<usize> {
        self.max_payload
    }
}
