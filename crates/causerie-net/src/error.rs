use thiserror::Error;

use causerie_shared::ProtocolError;

pub type Result<T> = std::result::Result<T, NetError>;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication failed")]
    Auth,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
