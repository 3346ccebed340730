use thiserror::Error;

use causerie_net::NetError;

/// Errors surfaced through [`SessionHandle`](crate::session::SessionHandle).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session task is gone; commands can no longer be delivered.
    #[error("session closed")]
    Closed,

    #[error(transparent)]
    Net(#[from] NetError),
}
