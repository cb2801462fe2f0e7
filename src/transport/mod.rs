//! Hand-off points to the messaging layer.
//!
//! The agent core never sees wire bytes. A message processor decodes an
//! incoming message into a [`RequestEvent`] and keeps whatever it needs to
//! answer (security parameters, message id) behind an opaque
//! [`StateReference`]. The agent answers with a [`ResponseEvent`] carrying
//! the same reference, delivered through a [`ResponseSink`].

use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::handler::{BoxFuture, SecurityLevel, SecurityModel};
use crate::pdu::Pdu;
use crate::version::Version;

/// Opaque token correlating a response with the message it answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateReference(pub u64);

impl fmt::Display for StateReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state:{}", self.0)
    }
}

/// A decoded request.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub source: SocketAddr,
    pub version: Version,
    pub security_model: SecurityModel,
    /// Community string for v1/v2c, USM user name for v3.
    pub security_name: Bytes,
    pub security_level: SecurityLevel,
    /// Context from the scoped PDU. `None` for community-based messages,
    /// whose context comes from the community table.
    pub context_name: Option<Bytes>,
    pub pdu: Pdu,
    /// Largest message the requester accepts.
    pub max_size: usize,
    pub state_ref: StateReference,
}

impl RequestEvent {
    /// Community-based request.
    pub fn community(
        source: SocketAddr,
        version: Version,
        community: impl Into<Bytes>,
        pdu: Pdu,
        state_ref: StateReference,
    ) -> Self {
        Self {
            source,
            version,
            security_model: SecurityModel::for_version(version),
            security_name: community.into(),
            security_level: SecurityLevel::NoAuthNoPriv,
            context_name: None,
            pdu,
            max_size: 65507,
            state_ref,
        }
    }

    /// SNMPv3 request with an explicit context.
    pub fn scoped(
        source: SocketAddr,
        user: impl Into<Bytes>,
        security_level: SecurityLevel,
        context_name: impl Into<Bytes>,
        pdu: Pdu,
        state_ref: StateReference,
    ) -> Self {
        Self {
            source,
            version: Version::V3,
            security_model: SecurityModel::Usm,
            security_name: user.into(),
            security_level,
            context_name: Some(context_name.into()),
            pdu,
            max_size: 65507,
            state_ref,
        }
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }
}

/// An assembled response or report.
#[derive(Debug, Clone)]
pub struct ResponseEvent {
    pub pdu: Pdu,
    pub state_ref: StateReference,
    pub destination: SocketAddr,
    pub version: Version,
    pub context_name: Bytes,
}

/// Consumer of responses, implemented by the messaging layer.
pub trait ResponseSink: Send + Sync {
    fn send<'a>(&'a self, response: ResponseEvent) -> BoxFuture<'a, Result<()>>;
}

/// [`ResponseSink`] feeding an mpsc channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<ResponseEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ResponseEvent>) -> Self {
        Self { tx }
    }

    /// A sink and the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ResponseEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

impl ResponseSink for ChannelSink {
    fn send<'a>(&'a self, response: ResponseEvent) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.tx
                .send(response)
                .await
                .map_err(|_| Error::ChannelClosed.boxed())
        })
    }
}
