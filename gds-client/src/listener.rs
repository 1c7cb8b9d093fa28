//! Inbound message dispatch.

use crate::error::ClientError;
use gds_protocol::{Data, DataType, DataVariant, Header};
use std::collections::HashMap;
use std::fmt;

/// Receives every inbound message the client does not consume itself.
pub trait MessageHandler: Send + Sync + 'static {
    fn on_message(&self, header: Header, data: Data) -> Result<(), ClientError>;

    /// Called once when an established session ends, from either side.
    fn on_disconnect(&self) {}
}

type Handler = Box<dyn Fn(Header, Data) + Send + Sync>;

/// A table of handlers keyed by payload type.
///
/// Messages of a type with no registered handler fail with
/// [`ClientError::UnhandledMessage`].
#[derive(Default)]
pub struct MessageListener {
    handlers: HashMap<DataType, Handler>,
}

impl MessageListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `data_type`, replacing any earlier one.
    pub fn on<F>(mut self, data_type: DataType, handler: F) -> Self
    where
        F: Fn(Header, Data) + Send + Sync + 'static,
    {
        self.handlers.insert(data_type, Box::new(handler));
        self
    }

    /// Registers a handler that receives the payload already narrowed to `T`.
    pub fn on_variant<T, F>(self, handler: F) -> Self
    where
        T: DataVariant,
        F: Fn(Header, T) + Send + Sync + 'static,
    {
        self.on(T::DATA_TYPE, move |header, data| {
            if let Ok(variant) = T::from_data(data) {
                handler(header, variant);
            }
        })
    }

    pub fn handles(&self, data_type: DataType) -> bool {
        self.handlers.contains_key(&data_type)
    }

    pub fn dispatch(&self, header: Header, data: Data) -> Result<(), ClientError> {
        let data_type = data.data_type();
        match self.handlers.get(&data_type) {
            Some(handler) => {
                handler(header, data);
                Ok(())
            }
            None => Err(ClientError::UnhandledMessage(data_type)),
        }
    }
}

impl MessageHandler for MessageListener {
    fn on_message(&self, header: Header, data: Data) -> Result<(), ClientError> {
        self.dispatch(header, data)
    }
}

impl fmt::Debug for MessageListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.handlers.keys().collect();
        types.sort();
        f.debug_struct("MessageListener")
            .field("handles", &types)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gds_protocol::{EventAckData, EventData};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_dispatch_by_type() {
        let acks = Arc::new(AtomicUsize::new(0));
        let counter = acks.clone();
        let listener = MessageListener::new().on_variant::<EventAckData, _>(move |_, ack| {
            assert!(ack.all_succeeded());
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(listener.handles(DataType::EventAck));
        assert!(!listener.handles(DataType::Event));

        let header = Header::new("user", "m1", DataType::EventAck);
        listener
            .dispatch(header, EventAckData::default().into())
            .unwrap();
        assert_eq!(acks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unhandled_type() {
        let listener = MessageListener::new();
        let header = Header::new("user", "m1", DataType::Event);
        let err = listener
            .dispatch(header, EventData::new("SELECT 1").into())
            .unwrap_err();
        assert!(matches!(err, ClientError::UnhandledMessage(DataType::Event)));
    }
}
