//! Connection lifecycle: state machine, auto-reconnect, liveness monitor.
//!
//! One [`WsClient`] owns at most one live transport. Every concern that
//! could produce a stray second connection funnels through the same rules:
//! timers are single-slot (aborted before re-arming) and every dial carries
//! an epoch so a stale connect racing a newer one is discarded on arrival.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures_channel::mpsc::UnboundedReceiver;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use memeshare_shared::{Envelope, MessageKind, ProtocolError, CLOSE_ABNORMAL, CLOSE_NORMAL};

use crate::config::ClientConfig;
use crate::identity::IdentitySource;
use crate::ws::dispatch::{Dispatch, Subscription};
use crate::ws::session::SessionTracker;
use crate::ws::transport::{Connector, Transport, TransportEvent};

/// Connection state of a [`WsClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Waiting out a backoff delay before the next dial.
    Reconnecting,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Reconnecting)
    }
}

/// Configuration for auto-reconnect behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Attempts counted toward exponential growth. Retries never stop; past
    /// this point every delay is `max_delay`.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling for any computed delay.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub growth_factor: f32,
    /// The exponent stops growing here even before `max_attempts` is hit.
    pub exponent_cap: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            growth_factor: 1.5,
            exponent_cap: 8,
        }
    }
}

impl ReconnectConfig {
    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt >= self.max_attempts {
            return self.max_delay;
        }
        let exponent = attempt.min(self.exponent_cap) as i32;
        let millis = self.base_delay.as_millis() as f32 * self.growth_factor.powi(exponent);
        Duration::from_millis(millis as u64).min(self.max_delay)
    }
}

type StateListener = Rc<RefCell<dyn FnMut(ConnectionState)>>;

pub(crate) struct Inner {
    pub(crate) state: ConnectionState,
    /// Identity of the current connect cycle; cleared on explicit disconnect.
    pub(crate) user_id: Option<String>,
    pub(crate) attempts: u32,
    pub(crate) last_error: Option<String>,
    /// Bumped on every connect/disconnect; a dial whose epoch no longer
    /// matches was superseded and must discard its result.
    pub(crate) epoch: u64,
    pub(crate) transport: Option<Rc<dyn Transport>>,
    pub(crate) reconnect_timer: Option<JoinHandle<()>>,
    pub(crate) monitor_timer: Option<JoinHandle<()>>,
    pub(crate) reader_task: Option<JoinHandle<()>>,
    pub(crate) session: SessionTracker,
    state_listeners: Vec<(u64, StateListener)>,
    next_listener_id: u64,
}

/// The real-time connection manager.
///
/// Cheap to clone; all clones share one connection. Must be used from a
/// current-thread runtime inside a [`tokio::task::LocalSet`].
#[derive(Clone)]
pub struct WsClient {
    pub(crate) inner: Rc<RefCell<Inner>>,
    pub(crate) config: Rc<ClientConfig>,
    pub(crate) connector: Rc<dyn Connector>,
    pub(crate) identity: Rc<dyn IdentitySource>,
    pub(crate) dispatch: Dispatch,
}

impl WsClient {
    pub fn new(
        config: Rc<ClientConfig>,
        connector: Rc<dyn Connector>,
        identity: Rc<dyn IdentitySource>,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: ConnectionState::Disconnected,
                user_id: None,
                attempts: 0,
                last_error: None,
                epoch: 0,
                transport: None,
                reconnect_timer: None,
                monitor_timer: None,
                reader_task: None,
                session: SessionTracker::default(),
                state_listeners: Vec::new(),
                next_listener_id: 0,
            })),
            config,
            connector,
            identity,
            dispatch: Dispatch::new(),
        }
    }

    // --- observation ---

    pub fn state(&self) -> ConnectionState {
        self.inner.borrow().state
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.borrow().last_error.clone()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.borrow().attempts
    }

    /// Whether a backoff timer is currently armed.
    pub fn pending_reconnect(&self) -> bool {
        self.inner
            .borrow()
            .reconnect_timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Register a handler for inbound messages of one kind.
    pub fn subscribe(
        &self,
        kind: MessageKind,
        handler: impl FnMut(&Envelope) -> anyhow::Result<()> + 'static,
    ) -> Subscription {
        self.dispatch.subscribe(kind, handler)
    }

    /// Observe state transitions. The listener is invoked immediately with
    /// the current state, then on every change until the guard is dropped.
    pub fn on_state_change(
        &self,
        listener: impl FnMut(ConnectionState) + 'static,
    ) -> StateListenerGuard {
        let listener: StateListener = Rc::new(RefCell::new(listener));
        let (id, current) = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_listener_id;
            inner.next_listener_id += 1;
            inner.state_listeners.push((id, listener.clone()));
            (id, inner.state)
        };
        (listener.borrow_mut())(current);
        StateListenerGuard {
            inner: Rc::downgrade(&self.inner),
            id,
        }
    }

    // --- lifecycle ---

    /// Open a connection for `user_id`, replacing any existing one.
    ///
    /// Returns immediately; the dial happens on a spawned task and outcome is
    /// visible through the state machine.
    pub fn connect(&self, user_id: &str) {
        let epoch = {
            let mut inner = self.inner.borrow_mut();
            inner.user_id = Some(user_id.to_string());
            if let Some(timer) = inner.reconnect_timer.take() {
                timer.abort();
            }
            if let Some(reader) = inner.reader_task.take() {
                reader.abort();
            }
            if let Some(transport) = inner.transport.take() {
                transport.close(CLOSE_NORMAL, "superseded by a new connection");
            }
            inner.epoch += 1;
            inner.epoch
        };
        self.set_state(ConnectionState::Connecting);

        let client = self.clone();
        let user_id = user_id.to_string();
        tokio::task::spawn_local(async move {
            client.dial(epoch, user_id).await;
        });
    }

    /// Tear the connection down and stop all reconnection. Used on logout;
    /// nothing reconnects until `connect` is called again.
    pub fn disconnect(&self) {
        info!("disconnecting");
        {
            let mut inner = self.inner.borrow_mut();
            if let Some(timer) = inner.reconnect_timer.take() {
                timer.abort();
            }
            if let Some(timer) = inner.monitor_timer.take() {
                timer.abort();
            }
            if let Some(reader) = inner.reader_task.take() {
                reader.abort();
            }
            if let Some(transport) = inner.transport.take() {
                transport.close(CLOSE_NORMAL, "user logged out");
            }
            inner.user_id = None;
            inner.attempts = 0;
            inner.epoch += 1;
            inner.session = SessionTracker::default();
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// Ensure a healthy connection exists, dialing if needed.
    ///
    /// No-op while connected with an open transport or while a dial is in
    /// flight. Safe to call from anywhere, any number of times.
    pub fn restore_connection(&self) {
        let user_id = {
            let mut inner = self.inner.borrow_mut();
            match inner.state {
                ConnectionState::Connected
                    if inner.transport.as_ref().is_some_and(|t| t.is_open()) =>
                {
                    trace!("restore requested but connection is healthy");
                    return;
                }
                ConnectionState::Connecting => {
                    trace!("restore requested but a dial is already in flight");
                    return;
                }
                _ => {}
            }
            if let Some(transport) = inner.transport.take() {
                // stale transport whose close event was missed
                transport.close(CLOSE_NORMAL, "stale transport");
            }
            inner.user_id.clone()
        };
        let user_id = user_id.or_else(|| self.identity.current().map(|user| user.user_id));
        match user_id {
            Some(id) => self.connect(&id),
            None => debug!("cannot restore connection: no identity"),
        }
    }

    /// Network became reachable again.
    pub fn notify_online(&self) {
        debug!("network online");
        self.restore_connection();
    }

    /// App came back to the foreground.
    pub fn notify_visible(&self) {
        debug!("app visible");
        self.restore_connection();
    }

    // --- internals ---

    async fn dial(&self, epoch: u64, user_id: String) {
        let url = format!(
            "{}?userId={}",
            self.config.ws_url,
            urlencoding::encode(&user_id)
        );
        debug!(%url, "dialing");
        match self.connector.connect(&url).await {
            Ok((transport, events)) => {
                {
                    let mut inner = self.inner.borrow_mut();
                    if inner.epoch != epoch {
                        debug!("dial superseded, discarding transport");
                        transport.close(CLOSE_NORMAL, "superseded");
                        return;
                    }
                    inner.transport = Some(transport);
                    inner.attempts = 0;
                    inner.last_error = None;
                }
                info!("connected");
                self.set_state(ConnectionState::Connected);
                self.start_monitor();

                let rejoin = self.inner.borrow_mut().session.rejoin_on_ready();
                if let Some(envelope) = rejoin {
                    if self.send(&envelope) {
                        if let Envelope::JoinSession { meme_id } = &envelope {
                            debug!(meme_id, "re-joined session after reconnect");
                            self.inner.borrow_mut().session.mark_joined(meme_id);
                        }
                    }
                }

                let client = self.clone();
                let reader = tokio::task::spawn_local(async move {
                    client.pump(epoch, events).await;
                });
                self.inner.borrow_mut().reader_task = Some(reader);
            }
            Err(err) => {
                warn!(%err, "connect failed");
                {
                    let mut inner = self.inner.borrow_mut();
                    if inner.epoch != epoch {
                        return;
                    }
                    inner.last_error = Some(err.to_string());
                }
                self.set_state(ConnectionState::Disconnected);
                self.schedule_reconnect();
            }
        }
    }

    async fn pump(&self, epoch: u64, mut events: UnboundedReceiver<TransportEvent>) {
        while let Some(event) = events.next().await {
            match event {
                TransportEvent::Message(text) => self.handle_frame(&text),
                TransportEvent::Closed { code, reason } => {
                    self.handle_close(epoch, code, &reason);
                    return;
                }
            }
        }
        // event channel dropped without a close frame
        self.handle_close(epoch, CLOSE_ABNORMAL, "transport stream ended");
    }

    fn handle_frame(&self, text: &str) {
        let envelope: Envelope = match serde_json::from_str(text).map_err(ProtocolError::Decode) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%err, "dropping malformed frame");
                return;
            }
        };
        let kind = envelope.kind();
        if kind.is_transport_internal() {
            // liveness is implied by receipt; nothing to dispatch
            trace!(?kind, "keepalive");
            return;
        }
        debug!(?kind, "inbound message");
        self.dispatch.publish(&envelope);
    }

    fn handle_close(&self, epoch: u64, code: u16, reason: &str) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.epoch != epoch {
                // close of an already-replaced transport
                return;
            }
            inner.transport = None;
            inner.reader_task = None;
        }
        self.set_state(ConnectionState::Disconnected);
        if code == CLOSE_NORMAL {
            info!("connection closed normally");
            return;
        }
        warn!(code, reason, "connection lost");
        self.schedule_reconnect();
    }

    pub(crate) fn schedule_reconnect(&self) {
        let delay = {
            let mut inner = self.inner.borrow_mut();
            if let Some(timer) = inner.reconnect_timer.take() {
                timer.abort();
            }
            self.config.reconnect.delay_for_attempt(inner.attempts)
        };
        self.set_state(ConnectionState::Reconnecting);
        debug!(?delay, attempt = self.reconnect_attempts(), "reconnect scheduled");

        let client = self.clone();
        let timer = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            let user_id = {
                let mut inner = client.inner.borrow_mut();
                // release our own handle so connect() does not abort us mid-run
                inner.reconnect_timer = None;
                if inner.state == ConnectionState::Connected {
                    return;
                }
                inner.attempts += 1;
                inner.user_id.clone()
            };
            let user_id =
                user_id.or_else(|| client.identity.current().map(|user| user.user_id));
            match user_id {
                Some(id) => client.connect(&id),
                None => warn!("cannot reconnect: no identity"),
            }
        });
        self.inner.borrow_mut().reconnect_timer = Some(timer);
    }

    /// Periodic consistency check while a session is active: heal the state
    /// machine if a close event was missed, keep the wire warm otherwise.
    fn start_monitor(&self) {
        if let Some(timer) = self.inner.borrow_mut().monitor_timer.take() {
            timer.abort();
        }
        let interval = self.config.monitor_interval;
        let client = self.clone();
        let timer = tokio::task::spawn_local(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                client.monitor_tick();
            }
        });
        self.inner.borrow_mut().monitor_timer = Some(timer);
    }

    fn monitor_tick(&self) {
        let (state, transport, has_identity) = {
            let inner = self.inner.borrow();
            (inner.state, inner.transport.clone(), inner.user_id.is_some())
        };
        let has_identity = has_identity || self.identity.current().is_some();
        match (state, transport) {
            (ConnectionState::Connected, Some(transport)) if !transport.is_open() => {
                warn!("transport dead under a connected state, reconnecting");
                {
                    let mut inner = self.inner.borrow_mut();
                    inner.transport = None;
                    if let Some(reader) = inner.reader_task.take() {
                        reader.abort();
                    }
                }
                self.set_state(ConnectionState::Disconnected);
                self.schedule_reconnect();
            }
            (ConnectionState::Connected, Some(_)) => {
                trace!("monitor: sending keepalive ping");
                self.send(&Envelope::Ping);
            }
            (ConnectionState::Disconnected, _) if has_identity => {
                debug!("monitor: disconnected with an identity, restoring");
                self.restore_connection();
            }
            _ => {}
        }
    }

    pub(crate) fn set_state(&self, next: ConnectionState) {
        let listeners: Vec<StateListener> = {
            let mut inner = self.inner.borrow_mut();
            if inner.state == next {
                return;
            }
            debug!(from = ?inner.state, to = ?next, "connection state");
            inner.state = next;
            inner
                .state_listeners
                .iter()
                .map(|(_, listener)| listener.clone())
                .collect()
        };
        for listener in listeners {
            (listener.borrow_mut())(next);
        }
    }
}

/// Keeps one state listener registered; removal happens on drop.
#[must_use = "dropping a StateListenerGuard removes its listener"]
pub struct StateListenerGuard {
    inner: Weak<RefCell<Inner>>,
    id: u64,
}

impl Drop for StateListenerGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .borrow_mut()
                .state_listeners
                .retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_then_caps() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1500));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(2250));
        // 1000 * 1.5^6 = 11_390 -> clipped to the ceiling
        assert_eq!(config.delay_for_attempt(6), Duration::from_millis(10_000));
        // exponent stops growing at the cap
        assert_eq!(
            config.delay_for_attempt(8),
            config.delay_for_attempt(9)
        );
    }

    #[test]
    fn retries_never_stop_past_max_attempts() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay_for_attempt(10), config.max_delay);
        assert_eq!(config.delay_for_attempt(500), config.max_delay);
    }

    #[test]
    fn state_predicates() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Reconnecting.is_connected());
        assert!(ConnectionState::Connecting.is_connecting());
        assert!(ConnectionState::Reconnecting.is_connecting());
        assert!(!ConnectionState::Disconnected.is_connecting());
    }
}
