//! # Handler Context
//!
//! Wraps one inbound envelope together with the bus it arrived on. Handlers
//! use it to bind the payload and, for requests, to answer.

use crate::bus::Bus;
use crate::envelope::{Envelope, Payload};
use crate::error::BusError;
use crate::serializer::BusSerializer;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Per-message helper handed to handlers.
#[derive(Clone)]
pub struct Context {
    bus: Bus,
    envelope: Envelope,
}

impl Context {
    pub(crate) fn new(bus: Bus, envelope: Envelope) -> Self {
        Self { bus, envelope }
    }

    #[must_use]
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.envelope.id
    }

    /// Subject the envelope was delivered on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.envelope.topic
    }

    /// Deserialize the payload with the bus codec.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, BusError> {
        Ok(self
            .bus
            .config()
            .serialization
            .decode(&self.envelope.payload.data)?)
    }

    /// True when the envelope is not itself a response and names a reply subject.
    #[must_use]
    pub fn is_replyable(&self) -> bool {
        self.envelope.is_replyable()
    }

    /// Answer the request with `value`.
    pub async fn respond<T>(&self, value: &T) -> Result<(), BusError>
    where
        T: Serialize + ?Sized + Sync,
    {
        self.ensure_replyable()?;
        let data = self.bus.config().serialization.encode(value)?;
        self.reply(Payload::data(data)).await
    }

    /// Answer the request with an application error.
    ///
    /// The requester receives an error whose message is `error`'s display text.
    pub async fn respond_error<E>(&self, error: &E) -> Result<(), BusError>
    where
        E: fmt::Display + ?Sized + Sync,
    {
        self.ensure_replyable()?;
        self.reply(Payload::error(error.to_string())).await
    }

    fn ensure_replyable(&self) -> Result<(), BusError> {
        if !self.is_replyable() {
            return Err(BusError::NotReplyable {
                id: self.envelope.id.clone(),
            });
        }
        Ok(())
    }

    async fn reply(&self, payload: Payload) -> Result<(), BusError> {
        let response = Envelope::response(self.envelope.reply.clone(), payload);
        debug!(
            request_id = %self.envelope.id,
            reply = %response.topic,
            is_error = response.payload.is_error(),
            "Sending response"
        );
        self.bus.send(response).await
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("envelope", &self.envelope)
            .finish_non_exhaustive()
    }
}
