//! Dispatch policy: deliver a compiled command sequence to the machine over a
//! [`MessageChannel`] and wait, bounded, for its acknowledgment.
//!
//! One dispatch runs through these checks in order and stops at the first
//! failure:
//!
//! 1. the caller's credential is authorized (`Unauthorized`)
//! 2. the sequence is non-empty (`EmptyProfile`)
//! 3. the encoded payload fits the smaller of the configured limit and the
//!    channel's advertised limit (`PayloadTooLarge`)
//!
//! Only then is the channel touched: connect, settle, subscribe to the ack
//! topic, publish, and wait. Once a connect has been attempted the channel is
//! disconnected exactly once, whatever the outcome. A second dispatch started
//! while one is in flight is rejected with `Busy` rather than queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, bounded};
use presso_traits::{Clock, Message, MessageChannel, MonotonicClock};

use crate::channel_error::map_channel_error;
use crate::compile::CommandSequence;
use crate::config::DispatchCfg;
use crate::error::DispatchError;
use crate::status::DispatchState;

/// Longest single wait between cancellation checks while awaiting the ack.
const ACK_POLL_SLICE: Duration = Duration::from_millis(50);

/// Decides whether a caller may dispatch.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, credential: &str) -> bool;
}

impl<F> Authorizer for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn authorize(&self, credential: &str) -> bool {
        self(credential)
    }
}

/// Accepts exactly one pre-shared secret. An empty secret accepts nobody.
#[derive(Clone)]
pub struct SharedSecret {
    secret: String,
}

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecret").finish_non_exhaustive()
    }
}

impl Authorizer for SharedSecret {
    fn authorize(&self, credential: &str) -> bool {
        let (a, b) = (self.secret.as_bytes(), credential.as_bytes());
        if a.is_empty() || a.len() != b.len() {
            return false;
        }
        // compare every byte so timing does not leak the matching prefix
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

/// Summary of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub commands: usize,
    pub payload_bytes: usize,
    /// Wall time from connect to acknowledgment.
    pub elapsed_ms: u64,
    /// Acknowledgment payload as text, when it was valid UTF-8.
    pub ack: Option<String>,
}

/// Owns the device channel and serializes access to it.
pub struct Dispatcher<C: MessageChannel> {
    channel: Mutex<C>,
    cfg: DispatchCfg,
    authorizer: Box<dyn Authorizer>,
    clock: Arc<dyn Clock + Send + Sync>,
    cancel: Option<Arc<AtomicBool>>,
    state: Mutex<DispatchState>,
}

impl<C: MessageChannel> std::fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("cfg", &self.cfg)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<C: MessageChannel> Dispatcher<C> {
    pub fn new(channel: C, cfg: DispatchCfg, authorizer: impl Authorizer + 'static) -> Self {
        Self {
            channel: Mutex::new(channel),
            cfg,
            authorizer: Box::new(authorizer),
            clock: Arc::new(MonotonicClock::new()),
            cancel: None,
            state: Mutex::new(DispatchState::Idle),
        }
    }

    /// Clock used for the post-connect settle delay.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    /// Flag polled while awaiting the acknowledgment; setting it aborts the
    /// wait with `Cancelled`.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn cfg(&self) -> &DispatchCfg {
        &self.cfg
    }

    pub fn state(&self) -> DispatchState {
        self.state.lock().map_or(DispatchState::Idle, |s| *s)
    }

    /// Give the channel back, e.g. to inspect a test double.
    pub fn into_channel(self) -> C {
        self.channel
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn enter(&self, next: DispatchState) {
        if let Ok(mut s) = self.state.lock() {
            tracing::debug!(from = s.as_str(), to = next.as_str(), "dispatch state");
            *s = next;
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|f| f.load(Ordering::Relaxed))
    }

    fn lock_channel(&self) -> Result<MutexGuard<'_, C>, DispatchError> {
        match self.channel.try_lock() {
            Ok(g) => Ok(g),
            Err(TryLockError::WouldBlock) => Err(DispatchError::Busy),
            Err(TryLockError::Poisoned(p)) => {
                tracing::warn!("previous dispatch panicked; reusing channel");
                Ok(p.into_inner())
            }
        }
    }

    /// Deliver `sequence` if `credential` is authorized.
    pub fn dispatch(
        &self,
        sequence: &CommandSequence,
        credential: &str,
    ) -> Result<DispatchReport, DispatchError> {
        let mut guard = self.lock_channel()?;
        let result = self.run(&mut guard, sequence, credential);
        match &result {
            Ok(report) => tracing::info!(
                commands = report.commands,
                payload_bytes = report.payload_bytes,
                elapsed_ms = report.elapsed_ms,
                "dispatch acknowledged"
            ),
            Err(e) => tracing::warn!(error = %e, "dispatch failed"),
        }
        self.enter(DispatchState::Idle);
        result
    }

    fn run(
        &self,
        channel: &mut C,
        sequence: &CommandSequence,
        credential: &str,
    ) -> Result<DispatchReport, DispatchError> {
        self.enter(DispatchState::Authorizing);
        if !self.authorizer.authorize(credential) {
            return Err(DispatchError::Unauthorized);
        }
        if sequence.is_empty() {
            return Err(DispatchError::EmptyProfile);
        }
        let payload = sequence
            .to_wire()
            .map_err(|e| DispatchError::Encode(e.to_string()))?;
        let limit = channel
            .max_payload()
            .map_or(self.cfg.max_payload_bytes, |m| m.min(self.cfg.max_payload_bytes));
        if payload.len() > limit {
            return Err(DispatchError::PayloadTooLarge {
                size: payload.len(),
                limit,
            });
        }

        if self.cancelled() {
            return Err(DispatchError::Cancelled);
        }

        self.enter(DispatchState::Connecting);
        let started = Instant::now();
        let mut session = Session::new(channel);
        session
            .channel
            .connect(&self.cfg.host, self.cfg.port)
            .map_err(|e| map_channel_error("connect", e.as_ref()))?;
        self.clock.sleep(self.cfg.settle);
        if self.cancelled() {
            return Err(DispatchError::Cancelled);
        }

        // Listen before publishing so an immediate ack cannot be missed.
        let (tx, rx) = bounded::<Vec<u8>>(4);
        let ack_topic = self.cfg.ack_topic.clone();
        session.channel.on_message(Box::new(move |msg: Message| {
            if msg.topic == ack_topic {
                let _ = tx.try_send(msg.payload);
            }
        }));
        session
            .channel
            .subscribe(&self.cfg.ack_topic, self.cfg.qos)
            .map_err(|e| map_channel_error("subscribe", e.as_ref()))?;

        self.enter(DispatchState::Publishing);
        session
            .channel
            .publish(&self.cfg.command_topic, &payload, self.cfg.qos)
            .map_err(|e| map_channel_error("publish", e.as_ref()))?;
        tracing::debug!(
            topic = %self.cfg.command_topic,
            bytes = payload.len(),
            commands = sequence.len(),
            "command sequence published"
        );

        self.enter(DispatchState::AwaitingAck);
        let waiting = Instant::now();
        let ack = loop {
            let remaining = self.cfg.ack_timeout.saturating_sub(waiting.elapsed());
            if remaining.is_zero() {
                if let Ok(bytes) = rx.try_recv() {
                    break bytes;
                }
                self.enter(DispatchState::TimedOut);
                return Err(DispatchError::AckTimeout {
                    waited_ms: duration_ms(self.cfg.ack_timeout),
                });
            }
            if self.cancelled() {
                return Err(DispatchError::Cancelled);
            }
            match rx.recv_timeout(remaining.min(ACK_POLL_SLICE)) {
                Ok(bytes) => break bytes,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(DispatchError::Transport(
                        "channel dropped the acknowledgment listener".into(),
                    ));
                }
            }
        };
        self.enter(DispatchState::Acknowledged);
        drop(session);

        Ok(DispatchReport {
            commands: sequence.len(),
            payload_bytes: payload.len(),
            elapsed_ms: duration_ms(started.elapsed()),
            ack: String::from_utf8(ack).ok(),
        })
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Disconnects the channel when dropped. Created just before `connect`, so
/// every exit after a connect attempt releases the connection once.
struct Session<'a, C: MessageChannel> {
    channel: &'a mut C,
}

impl<'a, C: MessageChannel> Session<'a, C> {
    fn new(channel: &'a mut C) -> Self {
        Self { channel }
    }
}

impl<C: MessageChannel> Drop for Session<'_, C> {
    fn drop(&mut self) {
        if let Err(e) = self.channel.disconnect() {
            tracing::warn!(error = %e, "disconnect failed");
        }
        self.channel.on_message(Box::new(|_| {}));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_secret_matches_exactly() {
        let auth = SharedSecret::new("s3cret");
        assert!(auth.authorize("s3cret"));
        assert!(!auth.authorize("s3cre"));
        assert!(!auth.authorize("s3creT"));
        assert!(!auth.authorize(""));
    }

    #[test]
    fn empty_secret_accepts_nobody() {
        assert!(!SharedSecret::new("").authorize(""));
    }

    #[test]
    fn debug_does_not_print_secret() {
        let s = format!("{:?}", SharedSecret::new("hunter2"));
        assert!(!s.contains("hunter2"));
    }

    #[test]
    fn closures_are_authorizers() {
        let allow_all = |_: &str| true;
        assert!(allow_all.authorize("anything"));
    }
}
