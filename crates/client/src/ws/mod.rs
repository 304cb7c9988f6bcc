//! Real-time connection management.

pub mod connection;
pub mod dispatch;
pub mod outbound;
pub mod session;
pub mod transport;

pub use connection::{ConnectionState, ReconnectConfig, StateListenerGuard, WsClient};
pub use dispatch::{Dispatch, Subscription};
pub use transport::{Connector, Transport, TransportEvent, TungsteniteConnector};
