// gatelink-api: Async client for the device gateway (HTTP + realtime websocket)

pub mod error;
pub mod gateway;
pub mod realtime;
pub mod transport;

pub use error::Error;
pub use gateway::{DeviceSelf, GatewayClient, LcgAssignment, ShockerDescriptor};
pub use realtime::{HandshakeHeaders, RealtimeTransport, TransportEvent, WebSocketTransport};
pub use transport::{TlsMode, TransportConfig};
