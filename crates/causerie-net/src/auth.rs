//! Seam to the external session provider.
//!
//! The core never stores credentials. It asks the provider for the current
//! bearer token, and for a refreshed one exactly once when the transport or
//! the REST API reports an authentication failure.

use async_trait::async_trait;

use causerie_shared::UserProfile;

use crate::error::Result;

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The bearer token to open connections with, if a session is active.
    async fn access_token(&self) -> Result<Option<String>>;

    /// Attempt to refresh the session after an authentication failure.
    ///
    /// Returns the new token, or `None` when the session cannot be
    /// refreshed and the user must re-authenticate.
    async fn refresh_token(&self) -> Result<Option<String>>;

    /// Identity of the currently authenticated user, if known.
    fn current_user(&self) -> Option<UserProfile>;
}

/// A provider with a fixed token and no refresh path. Used in tests and by
/// deployments that hand out long-lived tokens.
pub struct StaticSession {
    token: Option<String>,
    user: Option<UserProfile>,
}

impl StaticSession {
    pub fn new(token: Option<String>, user: Option<UserProfile>) -> Self {
        Self { token, user }
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn access_token(&self) -> Result<Option<String>> {
        Ok(self.token.clone())
    }

    async fn refresh_token(&self) -> Result<Option<String>> {
        Ok(None)
    }

    fn current_user(&self) -> Option<UserProfile> {
        self.user.clone()
    }
}
