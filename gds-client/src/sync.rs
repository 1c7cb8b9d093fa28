//! Request/response correlation.
//!
//! [`SyncClient`] wraps an [`AsyncClient`] and pairs every reply with the
//! request that carried the same message id. Each call registers a waiter,
//! sends the request, and resolves when the reply arrives or the timeout
//! expires. A `None` timeout falls back to the configured request timeout.
//! Replies nobody waits for go to an optional fallback listener.

use crate::config::ClientConfig;
use crate::connection::{AsyncClient, ConnectionEvent, ConnectionState};
use crate::error::ClientError;
use crate::listener::{MessageHandler, MessageListener};
use crate::transport::Transport;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gds_protocol::{
    AttachmentRequestAckData, AttachmentRequestData, AttachmentResponseData, ConnectionAckData,
    Data, DataType, DataVariant, EventAckData, EventData, EventDocumentAckData,
    EventDocumentData, Header, NextQueryPageData, QueryContextHolder, QueryRequestAckData,
    QueryRequestData,
};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;

/// A reply paired with its header.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
    pub header: Header,
    pub data: T,
}

/// Outcome of an attachment request.
#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentReply {
    /// The ack itself settled the request: it carried the attachment or
    /// reported failure.
    Complete(Reply<AttachmentRequestAckData>),
    /// The ack announced a pending attachment, which then arrived as a
    /// separate response. The response has already been acked.
    Delivered {
        ack: Reply<AttachmentRequestAckData>,
        response: Reply<AttachmentResponseData>,
    },
}

impl AttachmentReply {
    /// Returns the attachment bytes, wherever they arrived.
    pub fn attachment(&self) -> Option<&bytes::Bytes> {
        match self {
            AttachmentReply::Complete(ack) => ack.data.attachment(),
            AttachmentReply::Delivered { response, .. } => response.data.result.attachment.as_ref(),
        }
    }
}

/// What a waiter receives. `follow_up` is set when a second reply under the
/// same id is still to come.
#[derive(Debug)]
struct Resolution {
    header: Header,
    data: Data,
    follow_up: Option<oneshot::Receiver<Resolution>>,
}

#[derive(Default)]
struct Correlator {
    waiters: DashMap<String, oneshot::Sender<Resolution>>,
    fallback: RwLock<Option<MessageListener>>,
}

impl Correlator {
    fn register(&self, message_id: &str) -> Result<oneshot::Receiver<Resolution>, ClientError> {
        match self.waiters.entry(message_id.to_string()) {
            Entry::Occupied(_) => Err(ClientError::DuplicateMessageId(message_id.to_string())),
            Entry::Vacant(entry) => {
                let (tx, rx) = oneshot::channel();
                entry.insert(tx);
                Ok(rx)
            }
        }
    }

    /// Unregisters `message_id` once its caller stopped waiting. A waiter
    /// registered since under the same id is still live and stays.
    fn release(&self, message_id: &str) {
        self.waiters
            .remove_if(message_id, |_, waiter| waiter.is_closed());
    }

    /// Drops every waiter; their callers see the connection as closed.
    fn clear(&self) -> usize {
        let count = self.waiters.len();
        self.waiters.clear();
        count
    }
}

/// Keeps the waiter registered when the reply is an attachment ack that
/// announces a later response.
fn expects_follow_up(data: &Data) -> bool {
    data.as_attachment_request_ack()
        .is_some_and(|ack| ack.attachment_pending())
}

impl MessageHandler for Arc<Correlator> {
    fn on_message(&self, header: Header, data: Data) -> Result<(), ClientError> {
        match self.waiters.entry(header.message_id.clone()) {
            Entry::Occupied(mut entry) => {
                let (waiter, follow_up) = if expects_follow_up(&data) {
                    let (tx, rx) = oneshot::channel();
                    (entry.insert(tx), Some(rx))
                } else {
                    (entry.remove(), None)
                };
                let message_id = header.message_id.clone();
                let resolution = Resolution {
                    header,
                    data,
                    follow_up,
                };
                if waiter.send(resolution).is_err() {
                    tracing::debug!("Waiter for id={} already gone", message_id);
                }
                Ok(())
            }
            Entry::Vacant(entry) => {
                drop(entry);
                match &*self.fallback.read() {
                    Some(listener) => listener.dispatch(header, data),
                    None => {
                        tracing::warn!(
                            "Dropping {} id={} with no waiting request",
                            data.data_type(),
                            header.message_id
                        );
                        Ok(())
                    }
                }
            }
        }
    }

    fn on_disconnect(&self) {
        let dropped = self.clear();
        if dropped > 0 {
            tracing::debug!("Failed {} pending requests on disconnect", dropped);
        }
    }
}

/// Deadline `timeout` from now. Durations past what the clock can
/// represent wait for 30 years instead.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}

/// Timeout in milliseconds as carried on the wire, saturating at `i64::MAX`.
fn wire_millis(timeout: Duration) -> i64 {
    i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX)
}

/// Synchronous GDS client.
pub struct SyncClient {
    client: AsyncClient,
    correlator: Arc<Correlator>,
}

impl SyncClient {
    pub fn new(config: ClientConfig, transport: impl Transport) -> Self {
        let correlator = Arc::new(Correlator::default());
        Self {
            client: AsyncClient::new(config, transport, correlator.clone()),
            correlator,
        }
    }

    /// Routes replies that match no waiting request to `listener`.
    pub fn with_listener(self, listener: MessageListener) -> Self {
        *self.correlator.fallback.write() = Some(listener);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        self.client.config()
    }

    pub fn state(&self) -> ConnectionState {
        self.client.state()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.client.subscribe_events()
    }

    /// Number of requests waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.correlator.waiters.len()
    }

    pub async fn connect(&self) -> Result<ConnectionAckData, ClientError> {
        self.client.connect().await
    }

    /// Closes the connection and fails every waiting request.
    pub async fn close(&self) {
        self.client.close().await;
        let dropped = self.correlator.clear();
        if dropped > 0 {
            tracing::debug!("Cleared {} pending requests on close", dropped);
        }
    }

    pub async fn send_event(
        &self,
        event: EventData,
        message_id: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Reply<EventAckData>, ClientError> {
        self.request(event, message_id, timeout).await
    }

    pub async fn send_event_document(
        &self,
        document: EventDocumentData,
        message_id: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Reply<EventDocumentAckData>, ClientError> {
        self.request(document, message_id, timeout).await
    }

    pub async fn send_query(
        &self,
        query: QueryRequestData,
        message_id: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Reply<QueryRequestAckData>, ClientError> {
        self.request(query, message_id, timeout).await
    }

    /// Requests the page after the one `query_context` describes. The
    /// context must be passed back exactly as the previous ack returned it.
    pub async fn send_next_page(
        &self,
        query_context: QueryContextHolder,
        message_id: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Reply<QueryRequestAckData>, ClientError> {
        let timeout = self.resolve_timeout(timeout);
        let next = NextQueryPageData::new(query_context, wire_millis(timeout));
        self.request(next, message_id, Some(timeout)).await
    }

    /// Requests an attachment. When the ack announces the attachment as
    /// pending, waits for the response under the same deadline and acks it.
    pub async fn send_attachment_request(
        &self,
        request: AttachmentRequestData,
        message_id: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<AttachmentReply, ClientError> {
        let deadline = deadline_after(self.resolve_timeout(timeout));
        let (message_id, rx) = self.dispatch(request.into(), message_id)?;
        let first = self.wait(&message_id, rx, deadline).await?;

        let Resolution {
            header,
            data,
            follow_up,
        } = first;
        let ack = match narrow::<AttachmentRequestAckData>(&message_id, data) {
            Ok(data) => Reply { header, data },
            Err(e) => {
                drop(follow_up);
                self.correlator.release(&message_id);
                return Err(e);
            }
        };
        let Some(follow_up) = follow_up else {
            return Ok(AttachmentReply::Complete(ack));
        };

        tracing::debug!("Attachment for id={} pending", message_id);
        let second = self.wait(&message_id, follow_up, deadline).await?;
        let response = Reply {
            data: narrow::<AttachmentResponseData>(&message_id, second.data)?,
            header: second.header,
        };

        let ack_header = Header::new(
            &self.config().user_name,
            message_id.as_str(),
            DataType::AttachmentResponseAck,
        );
        self.client
            .send(&ack_header, &Data::from(response.data.ack()))?;
        Ok(AttachmentReply::Delivered { ack, response })
    }

    async fn request<Req, Resp>(
        &self,
        request: Req,
        message_id: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Reply<Resp>, ClientError>
    where
        Req: Into<Data>,
        Resp: DataVariant,
    {
        let deadline = deadline_after(self.resolve_timeout(timeout));
        let (message_id, rx) = self.dispatch(request.into(), message_id)?;
        let Resolution {
            header,
            data,
            follow_up,
        } = self.wait(&message_id, rx, deadline).await?;
        if let Some(follow_up) = follow_up {
            drop(follow_up);
            self.correlator.release(&message_id);
        }
        Ok(Reply {
            data: narrow::<Resp>(&message_id, data)?,
            header,
        })
    }

    /// Registers a waiter and sends. Nothing is sent when the id is already
    /// in flight.
    fn dispatch(
        &self,
        data: Data,
        message_id: Option<String>,
    ) -> Result<(String, oneshot::Receiver<Resolution>), ClientError> {
        let message_id = message_id.unwrap_or_else(|| self.client.next_message_id());
        let rx = self.correlator.register(&message_id)?;

        let header = Header::new(&self.config().user_name, message_id.as_str(), data.data_type());
        if let Err(e) = self.client.send(&header, &data) {
            drop(rx);
            self.correlator.release(&message_id);
            return Err(e);
        }
        Ok((message_id, rx))
    }

    fn resolve_timeout(&self, timeout: Option<Duration>) -> Duration {
        timeout.unwrap_or_else(|| self.config().request_timeout())
    }

    async fn wait(
        &self,
        message_id: &str,
        rx: oneshot::Receiver<Resolution>,
        deadline: Instant,
    ) -> Result<Resolution, ClientError> {
        match tokio::time::timeout_at(deadline, rx).await {
            Ok(Ok(resolution)) => Ok(resolution),
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                tracing::debug!("Request id={} timed out", message_id);
                self.correlator.release(message_id);
                Err(ClientError::Timeout {
                    message_id: message_id.to_string(),
                })
            }
        }
    }
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("client", &self.client)
            .field("pending", &self.pending_count())
            .finish()
    }
}

fn narrow<T: DataVariant>(message_id: &str, data: Data) -> Result<T, ClientError> {
    T::from_data(data).map_err(|other| ClientError::UnexpectedReply {
        message_id: message_id.to_string(),
        data_type: other.data_type(),
    })
}
