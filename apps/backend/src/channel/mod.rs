//! Duplex message channel over one physical connection.
//!
//! A [`Channel`] multiplexes named channels over a stream of JSON text frames,
//! pairs requests with replies through correlation ids, and keeps the
//! connection honest with periodic liveness probes.
//!
//! The handle is cheap to clone. All per-connection state lives behind one
//! lock; handlers and continuations are always invoked with the lock released,
//! so they may freely call back into the channel.

pub mod envelope;
pub mod error;
pub mod latency;
pub mod liveness;
pub mod pending;
pub mod transport;

#[cfg(test)]
mod tests_channel;

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio::time::{sleep_until, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

pub use envelope::{
    Envelope, DISCONNECT_EVENT, GLOBAL_CHANNEL, LATENCY_EVENT, PROBE_CHANNEL, RAW_CHANNEL,
    REPLY_CHANNEL,
};
pub use error::ChannelError;

use crate::config::ChannelConfig;
use latency::LatencyWindow;
use liveness::{Liveness, LivenessEvent};
use pending::PendingReplies;

/// How long the driver parks when nothing is scheduled.
const IDLE_PARK: Duration = Duration::from_secs(3600);

pub type Handler = Arc<dyn Fn(Value, Responder) + Send + Sync>;
pub type WildcardHandler = Arc<dyn Fn(&str, Value, Responder) + Send + Sync>;
pub type Continuation = Box<dyn FnOnce(Value) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

/// Unit handed to the transport writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// Terminate the connection; nothing follows.
    Close,
}

/// Answers the envelope a handler was invoked for. A no-op when the sender
/// did not ask for a reply.
#[derive(Clone)]
pub struct Responder {
    channel: Channel,
    cbid: Option<u64>,
}

impl Responder {
    pub fn expects_reply(&self) -> bool {
        self.cbid.is_some()
    }

    pub fn send<T: Serialize>(&self, data: T) {
        match serde_json::to_value(data) {
            Ok(value) => self.channel.reply(self.cbid, value),
            Err(err) => warn!(error = %err, "[CHANNEL] failed to encode reply"),
        }
    }
}

#[derive(Clone)]
pub struct Channel {
    shared: Arc<Shared>,
}

struct Shared {
    id: Uuid,
    config: ChannelConfig,
    state: watch::Sender<ChannelState>,
    outbound: mpsc::UnboundedSender<Frame>,
    inner: Mutex<Inner>,
    /// Wakes the driver after a deadline was added or moved.
    wake: Notify,
    shutdown: CancellationToken,
}

struct Inner {
    handlers: HashMap<String, Vec<Handler>>,
    wildcards: Vec<WildcardHandler>,
    pending: PendingReplies,
    liveness: Liveness,
    latency: LatencyWindow,
    close_at: Option<Instant>,
}

impl Channel {
    pub fn new(config: ChannelConfig, outbound: mpsc::UnboundedSender<Frame>) -> Self {
        let (state, _) = watch::channel(ChannelState::Connecting);
        let inner = Inner {
            handlers: HashMap::new(),
            wildcards: Vec::new(),
            pending: PendingReplies::new(config.reply_timeout),
            liveness: Liveness::Stopped,
            latency: LatencyWindow::default(),
            close_at: None,
        };
        Self {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                config,
                state,
                outbound,
                inner: Mutex::new(inner),
                wake: Notify::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn state(&self) -> ChannelState {
        *self.shared.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// Mark the channel usable and start the liveness schedule.
    pub fn open(&self) {
        let opened = self.shared.state.send_if_modified(|state| {
            if *state == ChannelState::Connecting {
                *state = ChannelState::Open;
                true
            } else {
                false
            }
        });
        if opened {
            debug!(channel_id = %self.id(), "[CHANNEL] open");
            self.schedule_ping();
        }
    }

    /// Register a handler for `name`. Handlers for one name run in
    /// registration order.
    pub fn on<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value, Responder) + Send + Sync + 'static,
    {
        self.shared
            .inner
            .lock()
            .handlers
            .entry(name.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Register a handler that sees every non-local name, after the named
    /// handlers have run.
    pub fn wildcard<F>(&self, handler: F)
    where
        F: Fn(&str, Value, Responder) + Send + Sync + 'static,
    {
        self.shared.inner.lock().wildcards.push(Arc::new(handler));
    }

    /// Fire-and-forget send, once the channel is open.
    pub async fn emit<T: Serialize>(&self, name: &str, data: T) -> Result<(), ChannelError> {
        let data = serde_json::to_value(data)?;
        self.wait_open().await?;
        self.send(&Envelope::new(name, None, data))
    }

    /// Send and register `callback` for the reply. The continuation is
    /// evicted silently if no reply arrives within `reply_timeout`.
    pub async fn emit_with<T, F>(&self, name: &str, data: T, callback: F) -> Result<u64, ChannelError>
    where
        T: Serialize,
        F: FnOnce(Value) + Send + 'static,
    {
        let data = serde_json::to_value(data)?;
        self.wait_open().await?;
        let cbid = self.register(Box::new(callback))?;
        self.send(&Envelope::new(name, Some(cbid), data))?;
        Ok(cbid)
    }

    /// Send and wait for the reply.
    pub async fn request<T: Serialize>(&self, name: &str, data: T) -> Result<Value, ChannelError> {
        let (tx, rx) = oneshot::channel();
        self.emit_with(name, data, move |reply| {
            let _ = tx.send(reply);
        })
        .await?;
        rx.await.map_err(|_| ChannelError::NoReply)
    }

    /// Ordered notification that never blocks the caller.
    ///
    /// Queued immediately while open, so successive notifications keep their
    /// order. While connecting a task waits for readiness; once closed the
    /// notification is dropped.
    pub fn notify<T: Serialize>(&self, name: &str, data: T) {
        let data = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(err) => {
                warn!(channel_id = %self.id(), channel_name = name, error = %err, "[CHANNEL] failed to encode notification");
                return;
            }
        };
        match self.state() {
            ChannelState::Open => {
                if let Err(err) = self.send(&Envelope::new(name, None, data)) {
                    debug!(channel_id = %self.id(), channel_name = name, error = %err, "[CHANNEL] notification not sent");
                }
            }
            ChannelState::Connecting => {
                let channel = self.clone();
                let name = name.to_owned();
                tokio::spawn(async move {
                    if let Err(err) = channel.emit(&name, data).await {
                        debug!(channel_id = %channel.id(), channel_name = %name, error = %err, "[CHANNEL] deferred notification dropped");
                    }
                });
            }
            ChannelState::Closed => {
                trace!(channel_id = %self.id(), channel_name = name, "[CHANNEL] notification on closed channel dropped");
            }
        }
    }

    /// Issue one liveness probe. The reply records latency and re-arms the
    /// liveness timers.
    pub fn ping(&self) {
        if !self.is_open() {
            return;
        }
        let sent_at = Instant::now();
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let probe = self.register(Box::new(move |_feed| {
            if let Some(shared) = weak.upgrade() {
                Channel { shared }.record_round_trip(sent_at.elapsed());
            }
        }));
        let result = probe.and_then(|cbid| {
            self.send(&Envelope::new(PROBE_CHANNEL, Some(cbid), json!({ "evtype": "ping" })))
        });
        if let Err(err) = result {
            debug!(channel_id = %self.id(), error = %err, "[CHANNEL] probe not sent");
        }
    }

    /// Rolling mean round trip over the last probes.
    pub fn latency(&self) -> Option<Duration> {
        self.shared.inner.lock().latency.mean()
    }

    /// Continuations still waiting for a reply.
    pub fn pending_replies(&self) -> usize {
        self.shared.inner.lock().pending.len()
    }

    /// Tell the peer it is refused, stop probing and close after `deny_delay`.
    pub fn deny(&self, reason: &str) {
        info!(channel_id = %self.id(), reason, "[CHANNEL] denying connection");
        self.notify(GLOBAL_CHANNEL, json!({ "evtype": "denied", "reason": reason }));
        self.shared.inner.lock().liveness = Liveness::Stopped;
        self.close_after(self.shared.config.deny_delay);
    }

    /// Ask the peer to come back later and close after `delay`, or after a
    /// randomized backoff when none is given.
    pub fn retry(&self, delay: Option<Duration>) {
        let delay = delay.unwrap_or_else(|| {
            let config = &self.shared.config;
            let jitter_ms = config.retry_jitter.as_millis() as u64;
            let jitter = rand::rng().random_range(0..jitter_ms.max(1));
            config.retry_base + Duration::from_millis(jitter)
        });
        info!(channel_id = %self.id(), delay_ms = delay.as_millis() as u64, "[CHANNEL] asking peer to retry");
        self.notify(
            GLOBAL_CHANNEL,
            json!({ "evtype": "retry", "delay": delay.as_secs_f64() }),
        );
        self.close_after(delay);
    }

    /// Tear the channel down. Idempotent.
    pub fn destroy(&self) {
        let closed = self.shared.state.send_if_modified(|state| {
            if *state == ChannelState::Closed {
                false
            } else {
                *state = ChannelState::Closed;
                true
            }
        });
        if !closed {
            return;
        }

        self.shared.shutdown.cancel();
        {
            let mut inner = self.shared.inner.lock();
            inner.liveness = Liveness::Stopped;
            inner.close_at = None;
        }

        self.trigger(DISCONNECT_EVENT, None, Value::Null);

        {
            let mut inner = self.shared.inner.lock();
            inner.handlers.clear();
            inner.wildcards.clear();
            inner.pending.clear();
            inner.latency.clear();
        }

        let _ = self.shared.outbound.send(Frame::Close);
        info!(channel_id = %self.id(), "[CHANNEL] destroyed");
    }

    /// Dispatch one inbound text frame.
    pub fn receive(&self, text: &str) {
        if self.state() == ChannelState::Closed {
            return;
        }
        let envelope = Envelope::parse(text);
        match envelope.channel.as_str() {
            REPLY_CHANNEL => self.resolve(envelope.cbid, envelope.data),
            PROBE_CHANNEL => self.answer_probe(envelope.cbid, &envelope.data),
            name if envelope::is_local_event(name) => {
                debug!(channel_id = %self.id(), channel_name = name, "[CHANNEL] peer used a local event name; dropped");
            }
            name => self.trigger(name, envelope.cbid, envelope.data),
        }
    }

    /// Drive the channel: inbound frames, liveness deadlines, reply expiry and
    /// scheduled closes. Returns once the channel is destroyed or the inbound
    /// stream ends.
    ///
    /// Inbound frames are left unread until the channel opens, so handlers
    /// registered before `open()` see everything the peer sent.
    pub async fn run<S>(self, mut inbound: S)
    where
        S: Stream<Item = String> + Unpin,
    {
        loop {
            let deadline = self
                .next_deadline()
                .unwrap_or_else(|| Instant::now() + IDLE_PARK);
            let reading = self.state() != ChannelState::Connecting;

            tokio::select! {
                _ = self.shared.shutdown.cancelled() => break,
                _ = self.shared.wake.notified() => {}
                frame = inbound.next(), if reading => match frame {
                    Some(text) => self.receive(&text),
                    None => {
                        debug!(channel_id = %self.id(), "[CHANNEL] transport ended");
                        self.destroy();
                        break;
                    }
                },
                _ = sleep_until(deadline) => self.fire_due(Instant::now()),
            }
        }
    }

    async fn wait_open(&self) -> Result<(), ChannelError> {
        let mut state = self.shared.state.subscribe();
        let settled = timeout(
            self.shared.config.open_wait,
            state.wait_for(|s| *s != ChannelState::Connecting),
        )
        .await
        .map_err(|_| ChannelError::OpenTimeout)?
        .map(|s| *s)
        .map_err(|_| ChannelError::Closed)?;

        match settled {
            ChannelState::Open => Ok(()),
            _ => Err(ChannelError::Closed),
        }
    }

    fn register(&self, continuation: Continuation) -> Result<u64, ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::Closed);
        }
        let cbid = self
            .shared
            .inner
            .lock()
            .pending
            .insert(Instant::now(), continuation);
        self.shared.wake.notify_one();
        Ok(cbid)
    }

    fn send(&self, envelope: &Envelope) -> Result<(), ChannelError> {
        let text = envelope.encode()?;
        self.shared
            .outbound
            .send(Frame::Text(text))
            .map_err(|_| ChannelError::Closed)
    }

    fn reply(&self, cbid: Option<u64>, data: Value) {
        let Some(cbid) = cbid else {
            return;
        };
        if let Err(err) = self.send(&Envelope::new(REPLY_CHANNEL, Some(cbid), data)) {
            debug!(channel_id = %self.id(), cbid, error = %err, "[CHANNEL] reply not sent");
        }
    }

    fn resolve(&self, cbid: Option<u64>, data: Value) {
        let Some(cbid) = cbid else {
            return;
        };
        let continuation = self.shared.inner.lock().pending.take(cbid);
        match continuation {
            Some(continuation) => continuation(data),
            None => trace!(channel_id = %self.id(), cbid, "[CHANNEL] reply for unknown or expired id dropped"),
        }
    }

    fn answer_probe(&self, cbid: Option<u64>, data: &Value) {
        let answer = match data.get("evtype").and_then(Value::as_str) {
            Some("ping") => json!({ "status": true }),
            _ => json!({ "status": false, "error": "evtype not recognized" }),
        };
        self.reply(cbid, answer);
    }

    fn trigger(&self, name: &str, cbid: Option<u64>, data: Value) {
        let (handlers, wildcards) = {
            let inner = self.shared.inner.lock();
            let handlers = inner.handlers.get(name).cloned().unwrap_or_default();
            let wildcards = if envelope::is_local_event(name) {
                Vec::new()
            } else {
                inner.wildcards.clone()
            };
            (handlers, wildcards)
        };

        if handlers.is_empty() && wildcards.is_empty() {
            trace!(channel_id = %self.id(), channel_name = name, "[CHANNEL] no handler");
            return;
        }

        let responder = Responder {
            channel: self.clone(),
            cbid,
        };
        for handler in &handlers {
            handler(data.clone(), responder.clone());
        }
        for wildcard in &wildcards {
            wildcard(name, data.clone(), responder.clone());
        }
    }

    fn schedule_ping(&self) {
        let now = Instant::now();
        self.shared.inner.lock().liveness = Liveness::schedule(&self.shared.config, now);
        self.shared.wake.notify_one();
    }

    fn close_after(&self, delay: Duration) {
        self.shared.inner.lock().close_at = Some(Instant::now() + delay);
        self.shared.wake.notify_one();
    }

    fn record_round_trip(&self, rtt: Duration) {
        let mean = {
            let mut inner = self.shared.inner.lock();
            inner.latency.record(rtt);
            inner.latency.mean()
        };
        trace!(
            channel_id = %self.id(),
            rtt_ms = rtt.as_millis() as u64,
            mean_ms = mean.map(|m| m.as_millis() as u64),
            "[CHANNEL] probe answered"
        );
        self.trigger(LATENCY_EVENT, None, json!(rtt.as_millis() as u64));
        if self.is_open() {
            self.schedule_ping();
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        let inner = self.shared.inner.lock();
        [
            inner.pending.next_expiry(),
            inner.liveness.next_deadline(),
            inner.close_at,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn fire_due(&self, now: Instant) {
        let (evicted, close, liveness) = {
            let mut inner = self.shared.inner.lock();
            let evicted = inner.pending.expire(now);
            let close = inner.close_at.is_some_and(|at| at <= now);
            let liveness = inner.liveness.poll(&self.shared.config, now);
            (evicted, close, liveness)
        };

        if evicted > 0 {
            debug!(channel_id = %self.id(), evicted, "[CHANNEL] evicted unanswered continuations");
        }
        if close {
            info!(channel_id = %self.id(), "[CHANNEL] scheduled close");
            self.destroy();
            return;
        }
        match liveness {
            LivenessEvent::TimedOut => {
                warn!(channel_id = %self.id(), "[CHANNEL] ping timeout, disconnecting");
                self.destroy();
            }
            LivenessEvent::SendProbe => self.ping(),
            LivenessEvent::Quiet => {}
        }
    }
}
