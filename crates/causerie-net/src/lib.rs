// Transport layer: realtime WebSocket task and REST API client.

pub mod auth;
pub mod error;
pub mod rest;
pub mod socket;

pub use auth::{SessionProvider, StaticSession};
pub use error::{NetError, Result};
pub use rest::{ApiClient, MessageApi, MessagePage};
pub use socket::{spawn_socket, SocketCommand, SocketConfig, SocketNotification};
