// portal-api: Wire protocol and WebSocket channel for device configuration portals

pub mod codec;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod reconnect;
pub mod websocket;

pub use error::Error;
pub use message::{Message, MessageKind};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use websocket::{ChannelEvent, ChannelHandle};
