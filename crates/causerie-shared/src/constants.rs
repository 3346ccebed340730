use std::time::Duration;

/// Application name
pub const APP_NAME: &str = "Causerie";

/// Default message page size for history fetches
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Delay before an emitted "stopped typing" signal becomes final.
/// Rapid stop/start within this window emits nothing.
pub const TYPING_STOP_DEBOUNCE: Duration = Duration::from_secs(1);

/// How long a remote user's typing indicator stays visible without a
/// refreshing typing-true event.
pub const TYPING_EXPIRY: Duration = Duration::from_secs(3);

/// Fixed delay between reconnection attempts
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Number of reconnection attempts before the transport gives up
pub const RECONNECT_MAX_ATTEMPTS: u32 = 5;

/// Depth of the socket/session command channels
pub const COMMAND_BUFFER: usize = 256;

/// Depth of the notification channels
pub const NOTIFICATION_BUFFER: usize = 256;

/// Server error code attached to failed room joins
pub const JOIN_ERROR_CODE: &str = "JOIN_CONVERSATION_ERROR";

/// Server error code attached to failed room leaves
pub const LEAVE_ERROR_CODE: &str = "LEAVE_CONVERSATION_ERROR";
