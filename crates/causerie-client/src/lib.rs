//! Client-side chat session logic: connection lifecycle, room membership,
//! presence, typing, read receipts, and the message timeline, all driven
//! by a single session task.

pub mod connection;
pub mod error;
pub mod presence;
pub mod read_receipts;
pub mod room;
pub mod session;
pub mod timeline;
pub mod typing;

use tracing_subscriber::{fmt, EnvFilter};

pub use connection::ConnectionManager;
pub use error::SessionError;
pub use presence::PresenceTracker;
pub use read_receipts::ReadUpdate;
pub use room::{RoomController, RoomErrorKind};
pub use session::{
    spawn_session, SessionCommand, SessionConfig, SessionHandle, SessionUpdate,
};
pub use timeline::{MessageInsert, Timeline, TimelineSnapshot};
pub use typing::{TypingCoordinator, TypingSignal};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. Call once at startup; later
/// calls would panic, so embedders that install their own subscriber
/// should skip this.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("causerie_client=debug,causerie_net=debug,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
