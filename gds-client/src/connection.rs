//! Connection state machine.
//!
//! [`AsyncClient`] drives one transport through the login handshake, then
//! encodes outgoing messages and hands decoded inbound messages to a
//! [`MessageHandler`]. A client connects at most once.

use crate::config::ClientConfig;
use crate::error::{ClientError, ConnectionFailure};
use crate::listener::MessageHandler;
use crate::transport::{Transport, TransportEvent};
use bytes::Bytes;
use gds_protocol::{
    ConnectionAckData, ConnectionAckTypeData, Data, DataType, FragmentAssembler, Header, Inbound,
    Message, MessageManager,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

/// Lifecycle state of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    NotConnected,
    Initializing,
    Connecting,
    Connected,
    LoggingIn,
    LoggedIn,
    Disconnected,
    Failed,
}

impl ConnectionState {
    /// Returns whether a login is under way.
    pub fn is_handshaking(&self) -> bool {
        matches!(
            self,
            ConnectionState::Initializing
                | ConnectionState::Connecting
                | ConnectionState::Connected
                | ConnectionState::LoggingIn
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::NotConnected => "not connected",
            ConnectionState::Initializing => "initializing",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::LoggingIn => "logging in",
            ConnectionState::LoggedIn => "logged in",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Connection lifecycle notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Login succeeded. Carries the service's ack.
    Success(ConnectionAckData),
    /// Login did not succeed.
    Failure(ConnectionFailure),
    /// A logged-in connection closed.
    Disconnected,
}

type LoginResult = Result<ConnectionAckData, ConnectionFailure>;

struct Inner {
    config: ClientConfig,
    transport: Box<dyn Transport>,
    handler: Box<dyn MessageHandler>,
    state: Mutex<ConnectionState>,
    events: broadcast::Sender<ConnectionEvent>,
    login: Mutex<Option<oneshot::Sender<LoginResult>>>,
    assembler: Mutex<FragmentAssembler>,
    /// Slice size agreed at login; `None` sends whole messages.
    transmission_unit: Mutex<Option<usize>>,
}

/// Asynchronous GDS client.
///
/// Outgoing messages are fire-and-forget; replies reach the handler given at
/// construction.
pub struct AsyncClient {
    inner: Arc<Inner>,
    lifecycle: tokio::sync::Mutex<()>,
    used: AtomicBool,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncClient {
    pub fn new(
        config: ClientConfig,
        transport: impl Transport,
        handler: impl MessageHandler,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                config,
                transport: Box::new(transport),
                handler: Box::new(handler),
                state: Mutex::new(ConnectionState::NotConnected),
                events,
                login: Mutex::new(None),
                assembler: Mutex::new(FragmentAssembler::new()),
                transmission_unit: Mutex::new(None),
            }),
            lifecycle: tokio::sync::Mutex::new(()),
            used: AtomicBool::new(false),
            reader: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state() == ConnectionState::LoggedIn
    }

    /// Subscribes to connection lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe()
    }

    /// Connects and logs in. Resolves once the service acks the login, or
    /// fails on rejection, transport failure or the connect timeout.
    pub async fn connect(&self) -> Result<ConnectionAckData, ClientError> {
        let _guard = self.lifecycle.lock().await;
        if self.used.swap(true, Ordering::SeqCst) {
            return Err(ClientError::AlreadyUsed);
        }

        let inner = &self.inner;
        inner.config.validate()?;
        inner.set_state(ConnectionState::Initializing);

        let (login_tx, login_rx) = oneshot::channel();
        *inner.login.lock() = Some(login_tx);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(Inner::read_loop(inner.clone(), events_rx));
        *self.reader.lock() = Some(reader);

        inner.set_state(ConnectionState::Connecting);
        tracing::debug!("Connecting to {} as {}", inner.config.url, inner.config.user_name);
        if let Err(e) = inner.transport.connect(events_tx) {
            let failure = ConnectionFailure::Transport(e.to_string());
            inner.fail(failure.clone());
            return Err(ClientError::ConnectionFailed(failure));
        }

        let timeout = inner.config.connect_timeout();
        match tokio::time::timeout(timeout, login_rx).await {
            Ok(Ok(Ok(ack))) => Ok(ack),
            Ok(Ok(Err(failure))) => Err(ClientError::ConnectionFailed(failure)),
            Ok(Err(_)) => Err(ClientError::ConnectionFailed(ConnectionFailure::Closed)),
            Err(_) => {
                tracing::warn!("Login to {} timed out after {:?}", inner.config.url, timeout);
                inner.fail(ConnectionFailure::Timeout);
                Err(ClientError::ConnectionFailed(ConnectionFailure::Timeout))
            }
        }
    }

    /// Closes the connection. Safe to call in any state.
    pub async fn close(&self) {
        let _guard = self.lifecycle.lock().await;
        let inner = &self.inner;
        let previous = {
            let mut state = inner.state.lock();
            let previous = *state;
            if !previous.is_terminal() && previous != ConnectionState::NotConnected {
                *state = ConnectionState::Disconnected;
            }
            previous
        };

        match previous {
            ConnectionState::LoggedIn => {
                tracing::info!("Closing connection to {}", inner.config.url);
                inner.transport.close();
                inner.handler.on_disconnect();
                let _ = inner.events.send(ConnectionEvent::Disconnected);
            }
            state if state.is_handshaking() => {
                inner.transport.close();
                inner.resolve_login(Err(ConnectionFailure::Closed));
            }
            _ => {}
        }

        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
    }

    /// Sends `data` under `header`, fragmenting it when the login agreed on
    /// a transmission unit and the payload exceeds it.
    pub fn send(&self, header: &Header, data: &Data) -> Result<(), ClientError> {
        let state = self.state();
        if state != ConnectionState::LoggedIn {
            return Err(ClientError::NotLoggedIn(state));
        }

        let unit = *self.inner.transmission_unit.lock();
        let frames = match unit {
            Some(unit) => MessageManager::fragment(header, data, unit)?,
            None => vec![MessageManager::encode_message(header, data)?],
        };

        tracing::debug!(
            "Sending {} id={} in {} frame(s)",
            header.data_type,
            header.message_id,
            frames.len()
        );
        for frame in frames {
            self.inner.send_bytes(frame)?;
        }
        Ok(())
    }

    /// Sends `data` under a new header with a generated message id. Returns
    /// the header used.
    pub fn send_data(&self, data: impl Into<Data>) -> Result<Header, ClientError> {
        let data = data.into();
        let header = Header::new(
            &self.inner.config.user_name,
            self.next_message_id(),
            data.data_type(),
        );
        self.send(&header, &data)?;
        Ok(header)
    }

    pub fn next_message_id(&self) -> String {
        Header::generate_message_id()
    }
}

impl Drop for AsyncClient {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

impl fmt::Debug for AsyncClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncClient")
            .field("url", &self.inner.config.url)
            .field("state", &self.state())
            .finish()
    }
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        let previous = std::mem::replace(&mut *self.state.lock(), state);
        if previous != state {
            tracing::trace!("Connection state {} -> {}", previous, state);
        }
    }

    fn send_bytes(&self, bytes: Bytes) -> Result<(), ClientError> {
        self.transport
            .send(bytes)
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    fn resolve_login(&self, result: LoginResult) {
        if let Some(login) = self.login.lock().take() {
            let _ = login.send(result);
        }
    }

    /// Fails the login and releases the transport.
    fn fail(&self, failure: ConnectionFailure) {
        self.abandon_login(failure, true);
    }

    /// State moves to `Failed` before the transport closes, so the close
    /// event it raises finds the handshake already settled.
    fn abandon_login(&self, failure: ConnectionFailure, close_transport: bool) {
        tracing::warn!("Login to {} failed: {}", self.config.url, failure);
        self.set_state(ConnectionState::Failed);
        if close_transport {
            self.transport.close();
        }
        self.resolve_login(Err(failure.clone()));
        let _ = self.events.send(ConnectionEvent::Failure(failure));
    }

    async fn read_loop(inner: Arc<Inner>, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Open => inner.on_open(),
                TransportEvent::Binary(bytes) => inner.on_binary(bytes),
                TransportEvent::Error(reason) => inner.on_error(reason),
                TransportEvent::Close => {
                    inner.on_close();
                    break;
                }
            }
        }
        tracing::debug!("Reader for {} stopped", inner.config.url);
    }

    fn on_open(&self) {
        let state = *self.state.lock();
        if state != ConnectionState::Connecting {
            tracing::warn!("Ignoring transport open in state {}", state);
            return;
        }
        self.set_state(ConnectionState::Connected);

        let data = Data::from(self.config.connection_data());
        let header = Header::with_generated_id(&self.config.user_name, DataType::Connection);
        let sent = MessageManager::encode_message(&header, &data)
            .map_err(ClientError::from)
            .and_then(|bytes| self.send_bytes(bytes));
        match sent {
            Ok(()) => tracing::debug!("Sent login id={}", header.message_id),
            Err(e) => self.fail(ConnectionFailure::Transport(e.to_string())),
        }
    }

    fn on_binary(&self, bytes: Bytes) {
        let state = *self.state.lock();
        let inbound = match MessageManager::decode(bytes) {
            Ok(inbound) => inbound,
            Err(e) if state.is_handshaking() => {
                self.fail(ConnectionFailure::Transport(format!("undecodable login reply: {e}")));
                return;
            }
            Err(e) => {
                tracing::error!("Dropping undecodable message: {}", e);
                return;
            }
        };

        let message = match inbound {
            Inbound::Message(message) => message,
            Inbound::Fragment(fragment) => {
                let message_id = fragment.header.message_id.clone();
                match self.assembler.lock().push(fragment) {
                    Ok(Some(message)) => message,
                    Ok(None) => return,
                    Err(e) => {
                        tracing::error!("Dropping fragmented message id={}: {}", message_id, e);
                        return;
                    }
                }
            }
        };
        self.on_message(state, message);
    }

    fn on_message(&self, state: ConnectionState, message: Message) {
        let (header, data) = message.into_parts();
        match (state, data) {
            (ConnectionState::Connected | ConnectionState::LoggingIn, Data::ConnectionAck(ack)) => {
                self.on_login_ack(ack)
            }
            (ConnectionState::LoggedIn, data) => {
                tracing::debug!("Received {} id={}", header.data_type, header.message_id);
                let message_id = header.message_id.clone();
                if let Err(e) = self.handler.on_message(header, data) {
                    tracing::error!("Failed to handle message id={}: {}", message_id, e);
                }
            }
            (state, data) => {
                tracing::warn!(
                    "Dropping {} id={} received while {}",
                    data.data_type(),
                    header.message_id,
                    state
                );
            }
        }
    }

    fn on_login_ack(&self, ack: ConnectionAckData) {
        self.set_state(ConnectionState::LoggingIn);
        if !ack.is_success() {
            let failure = ConnectionFailure::Rejected {
                status: ack.global_status,
                reasons: ack.rejection_reasons().cloned().unwrap_or_default(),
                exception: ack.global_exception.clone(),
            };
            self.fail(failure);
            return;
        }

        if let Some(ConnectionAckTypeData::Accepted(agreed)) = &ack.ack_data {
            let unit = agreed
                .fragment_transmission_unit
                .filter(|unit| agreed.fragmentation_supported && *unit > 0)
                .map(|unit| unit as usize);
            *self.transmission_unit.lock() = unit;
        }

        self.set_state(ConnectionState::LoggedIn);
        tracing::info!("Logged in to {} as {}", self.config.url, self.config.user_name);
        self.resolve_login(Ok(ack.clone()));
        let _ = self.events.send(ConnectionEvent::Success(ack));
    }

    fn on_error(&self, reason: String) {
        let state = *self.state.lock();
        if state.is_handshaking() {
            self.fail(ConnectionFailure::Transport(reason));
        } else {
            tracing::error!("Transport error in state {}: {}", state, reason);
        }
    }

    fn on_close(&self) {
        let state = *self.state.lock();
        match state {
            ConnectionState::LoggedIn => {
                tracing::info!("Connection to {} closed", self.config.url);
                self.set_state(ConnectionState::Disconnected);
                self.handler.on_disconnect();
                let _ = self.events.send(ConnectionEvent::Disconnected);
            }
            // already closed by the other side
            state if state.is_handshaking() => self.abandon_login(ConnectionFailure::Closed, false),
            _ => {}
        }
    }
}
