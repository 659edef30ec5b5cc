//! Real-time context.
//!
//! [`RealtimeContext`] composes the transport connection and the channel
//! registry. Construct one per application session, hand clones to every
//! consumer, and call [`RealtimeContext::shutdown`] when the application
//! exits.
//!
//! # Locking
//!
//! Two short-lived mutexes guard the shared state: the channel registry and
//! the link (connection lifecycle). When both are needed the registry is
//! always taken first. No lock is held while a consumer callback runs, so
//! callbacks may subscribe, unsubscribe, publish, or disconnect freely.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::RealtimeConfig;
use crate::envelope::{now_millis, Envelope, EnvelopeType};
use crate::error::RealtimeError;
use crate::event::RealTimeDataPoint;
use crate::metrics::RealtimeMetrics;
use crate::registry::{Callback, ChannelRegistry, Removal, SubscriberId};
use crate::socket::{
    Connector, OutboundFrame, SocketEvent, SocketHandle, TungsteniteConnector, NORMAL_CLOSE_CODE,
};
use crate::state::{ConnectionState, ConnectionStatus};

/// Connection lifecycle state.
#[derive(Default)]
struct Link {
    /// Current status.
    status: ConnectionStatus,

    /// Incremented whenever the current socket is superseded; events from an
    /// older generation are ignored.
    generation: u64,

    /// Outbound sender of the current socket.
    outbound: Option<mpsc::UnboundedSender<OutboundFrame>>,

    /// Task draining the current socket's events.
    driver: Option<JoinHandle<()>>,

    /// Heartbeat task.
    heartbeat: Option<JoinHandle<()>>,

    /// The single pending reconnection timer.
    reconnect_timer: Option<JoinHandle<()>>,

    /// Automatic reconnection attempts since the last successful open.
    reconnect_attempt: u32,

    /// Last successful open, in epoch milliseconds.
    last_connected: Option<i64>,

    /// Most recent error message.
    last_error: Option<String>,
}

impl Link {
    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
    }

    fn stop_heartbeat(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
    }

    /// Detaches the current socket and invalidates its generation.
    fn release_socket(&mut self) -> Option<mpsc::UnboundedSender<OutboundFrame>> {
        self.generation += 1;
        self.stop_heartbeat();
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        self.outbound.take()
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.cancel_reconnect();
        self.release_socket();
    }
}

struct Inner {
    config: RealtimeConfig,
    connector: Arc<dyn Connector>,
    registry: Mutex<ChannelRegistry>,
    link: Mutex<Link>,
    metrics: Arc<RealtimeMetrics>,
}

/// Shared handle to the real-time connection and its channel registry.
///
/// Cloning is cheap; all clones observe the same connection.
#[derive(Clone)]
pub struct RealtimeContext {
    inner: Arc<Inner>,
}

impl fmt::Debug for RealtimeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeContext")
            .field("url", &self.inner.config.url)
            .field("status", &self.connection_status())
            .field("channels", &self.active_channels())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RealtimeContext {
    /// Creates a context that connects with `tokio-tungstenite`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: RealtimeConfig) -> Result<Self, RealtimeError> {
        Self::with_connector(config, Arc::new(TungsteniteConnector))
    }

    /// Creates a context from `PULSEBOARD_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment holds an invalid configuration.
    pub fn from_env() -> Result<Self, RealtimeError> {
        Self::new(RealtimeConfig::from_env()?)
    }

    /// Creates a context that opens sockets through `connector`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_connector(
        config: RealtimeConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, RealtimeError> {
        config.validate()?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                connector,
                registry: Mutex::new(ChannelRegistry::new()),
                link: Mutex::new(Link::default()),
                metrics: Arc::new(RealtimeMetrics::new()),
            }),
        })
    }

    fn link(&self) -> MutexGuard<'_, Link> {
        lock(&self.inner.link)
    }

    fn registry(&self) -> MutexGuard<'_, ChannelRegistry> {
        lock(&self.inner.registry)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RealtimeConfig {
        &self.inner.config
    }

    /// Returns the metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<RealtimeMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    /// Returns true if connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.link().status.is_connected()
    }

    /// Returns the connection status.
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.link().status
    }

    /// Returns the number of decoded inbound messages.
    #[must_use]
    pub fn message_count(&self) -> u64 {
        self.inner.metrics.messages_received()
    }

    /// Returns the number of errors (socket, server, and decode).
    #[must_use]
    pub fn error_count(&self) -> u64 {
        self.inner.metrics.errors()
    }

    /// Returns the most recent error message.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.link().last_error.clone()
    }

    /// Returns a snapshot of the connection's health.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        let link = self.link();
        ConnectionState {
            status: link.status,
            last_connected: link.last_connected,
            message_count: self.inner.metrics.messages_received(),
            error_count: self.inner.metrics.errors(),
            last_error: link.last_error.clone(),
            reconnect_attempt: link.reconnect_attempt,
        }
    }

    /// Returns the number of subscribers on a channel.
    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.registry().subscriber_count(channel)
    }

    /// Returns every channel with at least one subscriber.
    #[must_use]
    pub fn active_channels(&self) -> Vec<String> {
        self.registry().active_channels()
    }

    /// Opens the connection. No-op while connected or connecting.
    ///
    /// Must be called within a Tokio runtime.
    pub fn connect(&self) {
        if tokio::runtime::Handle::try_current().is_err() {
            error!("connect() called outside a Tokio runtime");
            self.inner.metrics.record_socket_error();
            self.record_error("no Tokio runtime available".to_string());
            return;
        }

        let generation = {
            let mut link = self.link();
            if matches!(
                link.status,
                ConnectionStatus::Connected | ConnectionStatus::Connecting
            ) {
                debug!("connect() ignored: already {}", link.status);
                return;
            }
            link.cancel_reconnect();
            link.release_socket();
            link.status = ConnectionStatus::Connecting;
            link.generation
        };

        info!("Connecting to {}", self.inner.config.url);
        let SocketHandle { outbound, events } = self.inner.connector.open(&self.inner.config.url);

        let mut link = self.link();
        if link.generation != generation {
            // disconnect() ran while the socket was being opened.
            debug!("Discarding superseded socket (generation {})", generation);
            return;
        }
        link.outbound = Some(outbound);
        link.driver = Some(tokio::spawn(drive_socket(
            Arc::downgrade(&self.inner),
            generation,
            events,
        )));
    }

    /// Closes the connection intentionally, cancelling any pending
    /// reconnection and the heartbeat. Idempotent.
    pub fn disconnect(&self) {
        let mut link = self.link();
        link.cancel_reconnect();
        if let Some(outbound) = link.release_socket() {
            let _ = outbound.send(OutboundFrame::Close {
                code: NORMAL_CLOSE_CODE,
                reason: "client disconnect".to_string(),
            });
        }
        link.reconnect_attempt = 0;

        if link.status != ConnectionStatus::Disconnected {
            info!("Disconnected from {}", self.inner.config.url);
        }
        link.status = ConnectionStatus::Disconnected;
    }

    /// Disconnects, then connects again after the configured settle delay.
    /// Also restores the automatic reconnection budget.
    ///
    /// Must be called within a Tokio runtime.
    pub fn reconnect(&self) {
        self.disconnect();

        let delay = self.inner.config.reconnect_settle_delay;
        let weak = Arc::downgrade(&self.inner);
        let mut link = self.link();
        link.cancel_reconnect();
        link.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                RealtimeContext { inner }.connect();
            }
        }));
        info!("Reconnecting to {} in {:?}", self.inner.config.url, delay);
    }

    /// Tears the context down: disconnects and drops every subscription.
    pub fn shutdown(&self) {
        self.disconnect();
        let mut registry = self.registry();
        for channel in registry.active_channels() {
            registry.clear(&channel);
        }
        info!("Real-time context shut down");
    }

    /// Registers a callback for data points on `channel`.
    ///
    /// The first subscriber on a channel sends a `subscribe` envelope if
    /// connected; otherwise the subscription is sent on the next successful
    /// open. The returned guard unsubscribes when dropped.
    pub fn subscribe<F>(&self, channel: &str, callback: F) -> Subscription
    where
        F: Fn(&RealTimeDataPoint) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);

        let mut registry = self.registry();
        let (id, first) = registry.add(channel, callback);
        if first {
            match self.send_envelope(&Envelope::subscribe(channel)) {
                Ok(()) => {
                    self.inner.metrics.record_subscribe_sent();
                    debug!("Subscribed to channel: {}", channel);
                }
                Err(RealtimeError::NotConnected) => {
                    debug!("Queued subscription to {} until connected", channel);
                }
                Err(e) => warn!("Failed to subscribe to {}: {}", channel, e),
            }
        }
        drop(registry);

        Subscription {
            inner: Arc::downgrade(&self.inner),
            channel: channel.to_string(),
            id: Some(id),
        }
    }

    /// Removes every subscriber from a channel and sends `unsubscribe`.
    pub fn unsubscribe(&self, channel: &str) {
        let mut registry = self.registry();
        let removed = registry.clear(channel);
        self.send_unsubscribe(channel);
        drop(registry);

        debug!("Cleared {} subscriber(s) from {}", removed, channel);
    }

    /// Publishes data to a channel. Returns false (and logs) if the
    /// envelope could not be sent.
    pub fn publish(&self, channel: &str, data: Value) -> bool {
        match self.send_envelope(&Envelope::publish(channel, data)) {
            Ok(()) => {
                debug!("Published to channel: {}", channel);
                true
            }
            Err(RealtimeError::NotConnected) => {
                warn!("Cannot publish to {}: not connected", channel);
                false
            }
            Err(e) => {
                warn!("Failed to publish to {}: {}", channel, e);
                false
            }
        }
    }

    fn remove_subscriber(&self, channel: &str, id: SubscriberId) {
        let mut registry = self.registry();
        if registry.remove(channel, id) == Removal::ChannelEmptied {
            self.send_unsubscribe(channel);
        }
    }

    fn send_unsubscribe(&self, channel: &str) {
        match self.send_envelope(&Envelope::unsubscribe(channel)) {
            Ok(()) => {
                self.inner.metrics.record_unsubscribe_sent();
                debug!("Unsubscribed from channel: {}", channel);
            }
            Err(RealtimeError::NotConnected) => {
                debug!("Not connected; unsubscribe from {} not sent", channel);
            }
            Err(e) => warn!("Failed to unsubscribe from {}: {}", channel, e),
        }
    }

    /// Sends an envelope over the current socket.
    fn send_envelope(&self, envelope: &Envelope) -> Result<(), RealtimeError> {
        let text = envelope.encode()?;

        let link = self.link();
        if !link.status.is_connected() {
            return Err(RealtimeError::NotConnected);
        }
        let outbound = link.outbound.as_ref().ok_or(RealtimeError::NotConnected)?;
        outbound
            .send(OutboundFrame::Text(text))
            .map_err(|e| RealtimeError::SendFailed(e.to_string()))?;
        drop(link);

        self.inner.metrics.record_frame_sent();
        Ok(())
    }

    fn record_error(&self, message: String) {
        self.link().last_error = Some(message);
    }

    /// Applies one socket event. Returns false once the socket is finished
    /// or superseded.
    fn handle_socket_event(&self, generation: u64, event: SocketEvent) -> bool {
        if self.link().generation != generation {
            return false;
        }

        match event {
            SocketEvent::Open => {
                self.handle_open(generation);
                true
            }
            SocketEvent::Message(text) => {
                self.handle_frame(&text);
                true
            }
            SocketEvent::Error(message) => {
                self.handle_failure(generation, message);
                false
            }
            SocketEvent::Close { code, reason } => {
                self.handle_close(generation, code, &reason);
                false
            }
        }
    }

    fn handle_open(&self, generation: u64) {
        let registry = self.registry();
        {
            let mut link = self.link();
            if link.generation != generation {
                return;
            }
            link.status = ConnectionStatus::Connected;
            link.reconnect_attempt = 0;
            link.last_connected = Some(now_millis());
            link.cancel_reconnect();
            link.stop_heartbeat();
            link.heartbeat = Some(tokio::spawn(run_heartbeat(
                Arc::downgrade(&self.inner),
                generation,
                self.inner.config.heartbeat_interval,
            )));
        }
        info!("Connected to {}", self.inner.config.url);

        // Server-side channel state does not survive a reconnection.
        for channel in registry.active_channels() {
            match self.send_envelope(&Envelope::subscribe(channel.as_str())) {
                Ok(()) => self.inner.metrics.record_subscribe_sent(),
                Err(e) => warn!("Failed to resubscribe to {}: {}", channel, e),
            }
        }
    }

    fn handle_frame(&self, text: &str) {
        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.inner.metrics.record_decode_error();
                error!("Dropping undecodable frame: {}", e);
                self.record_error(e.to_string());
                return;
            }
        };

        self.inner.metrics.record_message_received();

        match envelope.kind {
            EnvelopeType::Data => self.dispatch(envelope),
            EnvelopeType::Pong => debug!("Received pong"),
            EnvelopeType::Ping => {
                if let Err(e) = self.send_envelope(&Envelope::pong()) {
                    debug!("Could not answer ping: {}", e);
                }
            }
            EnvelopeType::Subscribed | EnvelopeType::Unsubscribed => {
                debug!(
                    "Server acknowledged {} for {}",
                    envelope.kind,
                    envelope.channel().unwrap_or("<none>")
                );
            }
            EnvelopeType::Error => {
                let message = envelope
                    .error
                    .unwrap_or_else(|| "unspecified server error".to_string());
                self.inner.metrics.record_socket_error();
                warn!("Server error: {}", message);
                self.record_error(message);
            }
            EnvelopeType::Subscribe | EnvelopeType::Unsubscribe | EnvelopeType::Publish => {
                debug!("Ignoring client-only {} envelope from server", envelope.kind);
            }
        }
    }

    /// Delivers a `data` envelope to the channel's subscribers in
    /// registration order, isolating each callback.
    fn dispatch(&self, envelope: Envelope) {
        let Some(channel) = envelope.channel else {
            self.reject_data("data envelope without channel".to_string());
            return;
        };
        let Some(payload) = envelope.data else {
            self.reject_data(format!("data envelope for {} without payload", channel));
            return;
        };
        let point = match RealTimeDataPoint::from_value(payload) {
            Ok(point) => point,
            Err(e) => {
                self.reject_data(format!("invalid data point on {}: {}", channel, e));
                return;
            }
        };

        let subscribers = self.registry().subscribers(&channel);
        if subscribers.is_empty() {
            debug!("No subscribers for channel: {}", channel);
            return;
        }

        for (id, callback) in subscribers {
            // Skip callbacks removed earlier in this same dispatch.
            if !self.registry().contains(&channel, id) {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| callback(&point))).is_err() {
                self.inner.metrics.record_callback_failure();
                error!(
                    "Subscriber {} on channel {} panicked; continuing dispatch",
                    id.get(),
                    channel
                );
            }
        }
    }

    fn reject_data(&self, message: String) {
        self.inner.metrics.record_decode_error();
        error!("Dropping data: {}", message);
        self.record_error(message);
    }

    fn handle_failure(&self, generation: u64, message: String) {
        self.inner.metrics.record_socket_error();
        let mut link = self.link();
        if link.generation != generation {
            return;
        }
        warn!("Connection error: {}", message);
        link.release_socket();
        link.status = ConnectionStatus::Error;
        link.last_error = Some(message);
        self.schedule_reconnect(&mut link);
    }

    fn handle_close(&self, generation: u64, code: u16, reason: &str) {
        let mut link = self.link();
        if link.generation != generation {
            return;
        }
        link.release_socket();
        link.status = ConnectionStatus::Disconnected;

        if code == NORMAL_CLOSE_CODE {
            info!("Connection closed normally: {}", reason);
            return;
        }

        warn!("Connection closed unexpectedly ({}): {}", code, reason);
        self.schedule_reconnect(&mut link);
    }

    /// Arms the single reconnection slot with the next backoff delay, or
    /// gives up once the attempt budget is spent.
    fn schedule_reconnect(&self, link: &mut Link) {
        let max_attempts = self.inner.config.max_reconnect_attempts;
        if link.reconnect_attempt >= max_attempts {
            warn!(
                "Giving up after {} reconnection attempts; call reconnect() to retry",
                max_attempts
            );
            link.status = ConnectionStatus::Disconnected;
            return;
        }

        let delay = self.inner.config.backoff_delay(link.reconnect_attempt);
        link.reconnect_attempt += 1;
        self.inner.metrics.record_reconnect_attempt();

        let weak = Arc::downgrade(&self.inner);
        link.cancel_reconnect();
        link.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                RealtimeContext { inner }.connect();
            }
        }));

        info!(
            "Reconnecting in {:?} (attempt {}/{})",
            delay, link.reconnect_attempt, max_attempts
        );
    }
}

/// Drains one socket's events into the context, in arrival order.
async fn drive_socket(
    inner: Weak<Inner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<SocketEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        if !(RealtimeContext { inner }).handle_socket_event(generation, event) {
            return;
        }
    }

    // The socket went away without reporting a close.
    if let Some(inner) = inner.upgrade() {
        RealtimeContext { inner }.handle_socket_event(
            generation,
            SocketEvent::Close {
                code: crate::socket::ABNORMAL_CLOSE_CODE,
                reason: "socket task ended".to_string(),
            },
        );
    }
}

/// Sends a ping every `interval` while `generation` is current.
async fn run_heartbeat(inner: Weak<Inner>, generation: u64, interval: std::time::Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let Some(inner) = inner.upgrade() else {
            break;
        };
        let context = RealtimeContext { inner };
        if context.link().generation != generation {
            break;
        }
        if let Err(e) = context.send_envelope(&Envelope::ping()) {
            debug!("Heartbeat stopped: {}", e);
            break;
        }
    }
}

/// Guard for one registered callback. Dropping it unsubscribes.
#[derive(Debug)]
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    inner: Weak<Inner>,
    channel: String,
    id: Option<SubscriberId>,
}

impl Subscription {
    /// Returns the channel name.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Returns true while the callback is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        match (self.id, self.inner.upgrade()) {
            (Some(id), Some(inner)) => lock(&inner.registry).contains(&self.channel, id),
            _ => false,
        }
    }

    /// Removes the callback. Idempotent.
    pub fn unsubscribe(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if let Some(inner) = self.inner.upgrade() {
            RealtimeContext { inner }.remove_subscriber(&self.channel, id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
