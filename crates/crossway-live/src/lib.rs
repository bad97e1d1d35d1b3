//! Live simulation feed for the Crossway dashboard.
//!
//! This crate keeps one logical connection to the simulation backend open,
//! reconnects with exponential back-off when it drops, and fans inbound
//! messages, connection changes and errors out to any number of
//! subscribers.
//!
//! # Modules
//!
//! - [`transport`] -- [`Transport`]/[`Connection`] traits and the
//!   `tokio-tungstenite` implementation [`WsTransport`].
//! - [`backoff`] -- [`ReconnectPolicy`].
//! - [`listeners`] -- Subscriber registry with panic isolation.
//! - [`feed`] -- [`LiveFeed`], the connection lifecycle manager.
//! - [`error`] -- [`LiveError`] and [`TransportError`].

pub mod backoff;
pub mod error;
pub mod feed;
pub mod listeners;
pub mod transport;

pub use backoff::ReconnectPolicy;
pub use error::{LiveError, TransportError};
pub use feed::LiveFeed;
pub use listeners::{MESSAGE_CHANNEL, Subscription};
pub use transport::{Connection, Frame, Transport, WsTransport};
