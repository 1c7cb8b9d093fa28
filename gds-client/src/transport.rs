//! Transport boundary.
//!
//! A transport carries opaque binary messages to and from the service and
//! reports its lifecycle as [`TransportEvent`]s. The client never looks past
//! this boundary, so WebSocket, TCP or in-memory transports plug in the same
//! way.

use crate::error::ClientError;
use bytes::Bytes;
use gds_protocol::{
    AckStatus, ConnectionAckData, ConnectionData, Data, FragmentAssembler, Header, Inbound,
    Message, MessageManager,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Lifecycle and data notifications raised by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Open,
    Binary(Bytes),
    Close,
    Error(String),
}

/// A bidirectional binary message channel.
pub trait Transport: Send + Sync + 'static {
    /// Starts connecting. Events, starting with [`TransportEvent::Open`],
    /// are delivered on `events`.
    fn connect(&self, events: mpsc::UnboundedSender<TransportEvent>) -> io::Result<()>;

    /// Queues one binary message.
    fn send(&self, bytes: Bytes) -> io::Result<()>;

    /// Closes the channel. A [`TransportEvent::Close`] follows.
    fn close(&self);
}

#[derive(Debug, Default)]
struct Shared {
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
    refuse: Option<String>,
}

impl Shared {
    fn emit(&self, event: TransportEvent) -> bool {
        match &self.events {
            Some(events) => events.send(event).is_ok(),
            None => false,
        }
    }
}

/// In-process transport. The paired [`MemoryPeer`] plays the service.
#[derive(Debug)]
pub struct MemoryTransport {
    shared: Arc<Mutex<Shared>>,
    outbound: mpsc::UnboundedSender<Bytes>,
}

impl MemoryTransport {
    pub fn pair() -> (MemoryTransport, MemoryPeer) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let (outbound, inbound) = mpsc::unbounded_channel();
        let transport = MemoryTransport {
            shared: shared.clone(),
            outbound,
        };
        let peer = MemoryPeer {
            shared,
            inbound,
            assembler: FragmentAssembler::new(),
        };
        (transport, peer)
    }

    /// Makes `connect` fail with `reason`.
    pub fn refuse_connections(self, reason: impl Into<String>) -> Self {
        self.shared.lock().refuse = Some(reason.into());
        self
    }
}

impl Transport for MemoryTransport {
    fn connect(&self, events: mpsc::UnboundedSender<TransportEvent>) -> io::Result<()> {
        let mut shared = self.shared.lock();
        if let Some(reason) = &shared.refuse {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, reason.clone()));
        }
        if shared.events.is_some() {
            return Err(io::Error::new(io::ErrorKind::AlreadyExists, "already connected"));
        }
        let _ = events.send(TransportEvent::Open);
        shared.events = Some(events);
        Ok(())
    }

    fn send(&self, bytes: Bytes) -> io::Result<()> {
        if self.shared.lock().events.is_none() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "not connected"));
        }
        self.outbound
            .send(bytes)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer dropped"))
    }

    fn close(&self) {
        if let Some(events) = self.shared.lock().events.take() {
            let _ = events.send(TransportEvent::Close);
        }
    }
}

/// The service side of a [`MemoryTransport`].
#[derive(Debug)]
pub struct MemoryPeer {
    shared: Arc<Mutex<Shared>>,
    inbound: mpsc::UnboundedReceiver<Bytes>,
    assembler: FragmentAssembler,
}

impl MemoryPeer {
    /// Receives the next raw message the client sent.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.inbound.recv().await
    }

    /// Receives the next complete message the client sent, reassembling
    /// fragments.
    pub async fn recv_message(&mut self) -> Result<Message, ClientError> {
        loop {
            let bytes = self.recv().await.ok_or(ClientError::ConnectionClosed)?;
            match MessageManager::decode(bytes)? {
                Inbound::Message(message) => return Ok(message),
                Inbound::Fragment(fragment) => {
                    if let Some(message) = self.assembler.push(fragment)? {
                        return Ok(message);
                    }
                }
            }
        }
    }

    /// Returns a message the client already sent, without waiting.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.inbound.try_recv().ok()
    }

    /// Delivers raw bytes to the client.
    pub fn send(&self, bytes: Bytes) -> Result<(), ClientError> {
        if self.shared.lock().emit(TransportEvent::Binary(bytes)) {
            Ok(())
        } else {
            Err(ClientError::ConnectionClosed)
        }
    }

    pub fn send_message(&self, header: &Header, data: &Data) -> Result<(), ClientError> {
        self.send(MessageManager::encode_message(header, data)?)
    }

    /// Answers `request` with `data` under a reply header.
    pub fn reply(&self, request: &Header, data: impl Into<Data>) -> Result<(), ClientError> {
        let data = data.into();
        self.send_message(&request.reply(data.data_type()), &data)
    }

    /// Waits for the login request and accepts it. Returns the request.
    pub async fn accept_login(&mut self) -> Result<Message, ClientError> {
        let login = self.recv_message().await?;
        let connection = login
            .data()
            .clone()
            .into_variant::<ConnectionData>()
            .map_err(|data| ClientError::UnexpectedReply {
                message_id: login.message_id().to_string(),
                data_type: data.data_type(),
            })?;
        self.reply(login.header(), ConnectionAckData::accepted(connection))?;
        Ok(login)
    }

    /// Waits for the login request and rejects it.
    pub async fn reject_login(
        &mut self,
        status: AckStatus,
        reasons: BTreeMap<i32, String>,
        exception: &str,
    ) -> Result<Message, ClientError> {
        let login = self.recv_message().await?;
        self.reply(
            login.header(),
            ConnectionAckData::rejected(status, reasons, exception),
        )?;
        Ok(login)
    }

    /// Closes the connection from the service side.
    pub fn close(&self) {
        if let Some(events) = self.shared.lock().events.take() {
            let _ = events.send(TransportEvent::Close);
        }
    }

    /// Reports a transport error to the client.
    pub fn fail(&self, reason: impl Into<String>) {
        self.shared.lock().emit(TransportEvent::Error(reason.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gds_protocol::{DataType, EventData};

    #[tokio::test]
    async fn test_memory_transport_roundtrip() {
        let (transport, mut peer) = MemoryTransport::pair();
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.connect(tx).unwrap();
        assert_eq!(rx.recv().await, Some(TransportEvent::Open));

        transport.send(Bytes::from_static(b"ping")).unwrap();
        assert_eq!(peer.recv().await.unwrap().as_ref(), b"ping");

        peer.send(Bytes::from_static(b"pong")).unwrap();
        assert_eq!(
            rx.recv().await,
            Some(TransportEvent::Binary(Bytes::from_static(b"pong")))
        );

        transport.close();
        assert_eq!(rx.recv().await, Some(TransportEvent::Close));
        assert!(transport.send(Bytes::new()).is_err());
        assert!(peer.send(Bytes::new()).is_err());
    }

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let (transport, _peer) = MemoryTransport::pair();
        let err = transport.send(Bytes::from_static(b"x")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_refused_connection() {
        let (transport, _peer) = MemoryTransport::pair();
        let transport = transport.refuse_connections("no route");
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = transport.connect(tx).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
    }

    #[tokio::test]
    async fn test_peer_reassembles_fragments() {
        let (transport, mut peer) = MemoryTransport::pair();
        let (tx, _rx) = mpsc::unbounded_channel();
        transport.connect(tx).unwrap();

        let header = Header::new("user", "big", DataType::Event);
        let data: Data = EventData::new("INSERT INTO t (id) VALUES ('1')")
            .with_attachment("1", Bytes::from(vec![9u8; 300]))
            .into();
        for slice in MessageManager::fragment(&header, &data, 100).unwrap() {
            transport.send(slice).unwrap();
        }

        let message = peer.recv_message().await.unwrap();
        assert_eq!(message.message_id(), "big");
        assert_eq!(message.data(), &data);
    }
}
