//! Headless client library for the memeshare service.
//!
//! The heart of this crate is the real-time connection manager
//! ([`ws::WsClient`]): one persistent WebSocket per authenticated identity,
//! kept alive across network flaps and app visibility changes, with
//! exponential-backoff reconnection, typed message dispatch to independent
//! feature stores, and optimistic local mutation reconciled against
//! authoritative server broadcasts.
//!
//! Everything here is single-threaded cooperative: the crate expects a tokio
//! current-thread runtime and a [`tokio::task::LocalSet`]; shared state is
//! `Rc<RefCell<_>>` and handlers must not block the loop.

pub mod api_client;
pub mod config;
pub mod identity;
pub mod logging;
pub mod manager;
pub mod storage;
pub mod stores;
pub mod ws;

pub use api_client::ApiClient;
pub use config::ClientConfig;
pub use identity::{IdentitySource, PersistedIdentity, StaticIdentity};
pub use manager::RealtimeManager;
pub use ws::{ConnectionState, ReconnectConfig, WsClient};
