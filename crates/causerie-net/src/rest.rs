//! REST client for message history and sends.
//!
//! The server wraps every response in a `{status, message, data}` envelope.
//! A missing `data` field or a non-success status fails the call; partial
//! payloads are never handed to the caller. A 401 triggers exactly one
//! token refresh through the session provider before the call is retried.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use causerie_shared::{ConversationId, Message};

use crate::auth::SessionProvider;
use crate::error::{NetError, Result};

/// One page of message history, newest-first as the API returns it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub items: Vec<Message>,
    pub next_cursor: Option<i64>,
}

/// The message operations the session core depends on. `ApiClient` is the
/// production implementation; tests substitute their own.
#[async_trait]
pub trait MessageApi: Send + Sync {
    /// Fetch a page of history. `cursor` of `None` means the newest page;
    /// otherwise the page older than the cursor.
    async fn fetch_messages(
        &self,
        conversation_id: ConversationId,
        limit: u32,
        cursor: Option<i64>,
    ) -> Result<MessagePage>;

    /// Post a message. The authoritative timeline entry arrives via push
    /// or a subsequent refresh, not from this call.
    async fn send_message(&self, conversation_id: ConversationId, content: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<dyn SessionProvider>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: Arc<dyn SessionProvider>) -> Self {
        let base_url = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: String,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let token = self.session.access_token().await?;

        let response = self.request(&method, &url, &token, &body).await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            debug!(url = %url, "Got 401, attempting token refresh");
            match self.session.refresh_token().await? {
                Some(new_token) => {
                    let retry = self
                        .request(&method, &url, &Some(new_token), &body)
                        .await?;
                    if retry.status() == StatusCode::UNAUTHORIZED {
                        return Err(NetError::Auth);
                    }
                    retry
                }
                None => return Err(NetError::Auth),
            }
        } else {
            response
        };

        let status = response.status();
        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            warn!(url = %url, error = %e, "Failed to decode API response");
            NetError::Http(e)
        })?;

        if !status.is_success() || envelope.status != "success" {
            return Err(NetError::Api {
                status: status.as_u16(),
                message: envelope
                    .message
                    .unwrap_or_else(|| "request failed".to_string()),
            });
        }

        envelope.data.ok_or_else(|| NetError::Api {
            status: status.as_u16(),
            message: "response envelope missing data".to_string(),
        })
    }

    async fn request(
        &self,
        method: &Method,
        url: &str,
        token: &Option<String>,
        body: &Option<serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let mut builder = self.http.request(method.clone(), url);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }
}

#[async_trait]
impl MessageApi for ApiClient {
    async fn fetch_messages(
        &self,
        conversation_id: ConversationId,
        limit: u32,
        cursor: Option<i64>,
    ) -> Result<MessagePage> {
        let mut path = format!("/conversations/{conversation_id}/messages?limit={limit}");
        if let Some(cursor) = cursor {
            path.push_str(&format!("&cursor={cursor}"));
        }
        self.call(Method::GET, path, None).await
    }

    async fn send_message(&self, conversation_id: ConversationId, content: &str) -> Result<()> {
        // The ack payload only echoes the stored message; drop it.
        let _: serde_json::Value = self
            .call(
                Method::POST,
                format!("/conversations/{conversation_id}/messages"),
                Some(serde_json::json!({ "content": content })),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_page_decoding() {
        let json = r#"{
            "status": "success",
            "message": "ok",
            "data": {
                "items": [
                    {"id": 10, "content": "later", "createdAt": "2025-03-01T12:01:00Z",
                     "sender": {"id": 1, "email": "a@b.c", "name": "Ada"}, "readBy": []},
                    {"id": 9, "content": "earlier", "createdAt": "2025-03-01T12:00:00Z",
                     "sender": {"id": 2, "email": "b@b.c", "name": "Bo"}}
                ],
                "nextCursor": 9
            }
        }"#;

        let envelope: Envelope<MessagePage> = serde_json::from_str(json).unwrap();
        let page = envelope.data.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id.0, 10);
        assert!(page.items[1].read_by.is_empty());
        assert_eq!(page.next_cursor, Some(9));
    }

    #[test]
    fn test_envelope_missing_data() {
        let json = r#"{"status": "error", "message": "conversation not found"}"#;
        let envelope: Envelope<MessagePage> = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.status, "error");
        assert!(envelope.data.is_none());
        assert_eq!(envelope.message.as_deref(), Some("conversation not found"));
    }
}
