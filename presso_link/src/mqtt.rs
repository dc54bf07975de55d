//! MQTT backend over `rumqttc`'s synchronous client.
//!
//! The client's event loop runs on a dedicated thread. Inbound publishes are
//! handed to the registered handler from that thread; the first `ConnAck` or
//! connection error is reported back to `connect` over a crossbeam channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, bounded};
use presso_traits::{BoxError, Message, MessageChannel, MessageHandler, QoS};
use rumqttc::{Client, ConnectReturnCode, Event, MqttOptions, Packet, Transport};

use crate::error::LinkError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const KEEP_ALIVE: Duration = Duration::from_secs(15);
const REQUEST_CAPACITY: usize = 16;

/// Broker session parameters that do not change between connects.
#[derive(Clone)]
pub struct MqttSettings {
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
    /// Largest outgoing packet; also reported as the channel's payload limit.
    pub max_packet_bytes: usize,
}

impl std::fmt::Debug for MqttSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttSettings")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("tls", &self.tls)
            .field("max_packet_bytes", &self.max_packet_bytes)
            .finish_non_exhaustive()
    }
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            client_id: "presso".to_string(),
            username: None,
            password: None,
            tls: true,
            max_packet_bytes: 10 * 1024,
        }
    }
}

fn to_mqtt_qos(q: QoS) -> rumqttc::QoS {
    match q {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

struct Session {
    client: Client,
    stopping: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

/// `MessageChannel` backed by an MQTT broker.
pub struct MqttChannel {
    settings: MqttSettings,
    handler: Arc<Mutex<Option<MessageHandler>>>,
    session: Option<Session>,
}

impl std::fmt::Debug for MqttChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttChannel")
            .field("settings", &self.settings)
            .field("connected", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl MqttChannel {
    pub fn new(settings: MqttSettings) -> Self {
        Self {
            settings,
            handler: Arc::new(Mutex::new(None)),
            session: None,
        }
    }

    fn options(&self, host: &str, port: u16) -> MqttOptions {
        let mut opts = MqttOptions::new(self.settings.client_id.clone(), host, port);
        opts.set_keep_alive(KEEP_ALIVE);
        opts.set_clean_session(true);
        opts.set_max_packet_size(self.settings.max_packet_bytes, self.settings.max_packet_bytes);
        if let (Some(user), Some(pass)) = (&self.settings.username, &self.settings.password) {
            opts.set_credentials(user.clone(), pass.clone());
        }
        if self.settings.tls {
            opts.set_transport(Transport::tls_with_default_config());
        }
        opts
    }

    fn client(&mut self) -> Result<&mut Client, LinkError> {
        self.session
            .as_mut()
            .map(|s| &mut s.client)
            .ok_or(LinkError::NotConnected)
    }
}

impl MessageChannel for MqttChannel {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), BoxError> {
        let (client, mut connection) = Client::new(self.options(host, port), REQUEST_CAPACITY);
        let (ready_tx, ready_rx) = bounded::<Result<(), String>>(1);
        let stopping = Arc::new(AtomicBool::new(false));
        let handler = Arc::clone(&self.handler);
        let stop_flag = Arc::clone(&stopping);

        let worker = std::thread::Builder::new()
            .name("presso-mqtt".into())
            .spawn(move || {
                let mut connected = false;
                for notification in connection.iter() {
                    match notification {
                        Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                            let res = if ack.code == ConnectReturnCode::Success {
                                Ok(())
                            } else {
                                Err(format!("broker refused connection: {:?}", ack.code))
                            };
                            connected = res.is_ok();
                            let _ = ready_tx.try_send(res);
                            if !connected {
                                break;
                            }
                        }
                        Ok(Event::Incoming(Packet::Publish(p))) => {
                            tracing::debug!(topic = %p.topic, bytes = p.payload.len(), "mqtt inbound");
                            if let Ok(guard) = handler.lock()
                                && let Some(h) = guard.as_ref()
                            {
                                h(Message::new(p.topic, p.payload.to_vec()));
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            if stop_flag.load(Ordering::Relaxed) {
                                break;
                            }
                            if !connected {
                                let _ = ready_tx.try_send(Err(e.to_string()));
                                break;
                            }
                            tracing::warn!(error = %e, "mqtt connection error; retrying");
                            std::thread::sleep(Duration::from_millis(500));
                        }
                    }
                }
                tracing::debug!("mqtt event loop stopped");
            })
            .map_err(LinkError::from)?;

        let outcome = match ready_rx.recv_timeout(CONNECT_TIMEOUT) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(msg)) => Err(LinkError::Mqtt(msg)),
            Err(RecvTimeoutError::Timeout) => Err(LinkError::ConnectTimeout(
                u64::try_from(CONNECT_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
            )),
            Err(RecvTimeoutError::Disconnected) => {
                Err(LinkError::Mqtt("event loop exited before connecting".into()))
            }
        };
        // keep the session even on failure so disconnect() can stop the loop
        self.session = Some(Session {
            client,
            stopping,
            worker,
        });
        outcome?;
        tracing::info!(host, port, tls = self.settings.tls, "mqtt connected");
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), BoxError> {
        self.client()?
            .subscribe(topic, to_mqtt_qos(qos))
            .map_err(|e| LinkError::Mqtt(e.to_string()))?;
        Ok(())
    }

    fn on_message(&mut self, handler: MessageHandler) {
        if let Ok(mut h) = self.handler.lock() {
            *h = Some(handler);
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), BoxError> {
        self.client()?
            .publish(topic, to_mqtt_qos(qos), false, payload.to_vec())
            .map_err(|e| LinkError::Mqtt(e.to_string()))?;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), BoxError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let Session {
            mut client,
            stopping,
            worker,
        } = session;
        stopping.store(true, Ordering::Relaxed);
        match client.disconnect() {
            Ok(()) => {
                if worker.join().is_err() {
                    tracing::warn!("mqtt event loop panicked");
                }
                Ok(())
            }
            // the loop has already exited or will on its next error
            Err(e) => Err(Box::new(LinkError::Mqtt(e.to_string()))),
        }
    }

    fn max_payload(&self) -> Option<usize> {
        Some(self.settings.max_packet_bytes)
    }
}
