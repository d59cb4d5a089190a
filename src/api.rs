// HTTP client for the estimation server's REST API.
//
// All paths are rooted at `/api`. State-changing requests (POST/PATCH/DELETE)
// carry a CSRF header pair that is scraped once at startup from the server's
// page metadata. Non-2xx responses are mapped to human-readable messages; if
// the response body is JSON with a `message` field, that field is used
// verbatim.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::model::{CardSet, Room, RoomPatch, SummaryResult, User};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("malformed response from server: {0}")]
    MalformedResponse(String),
}

/// Map a non-2xx response to the message shown to the user.
///
/// A JSON body with a `message` field wins; otherwise 403 and 404 get
/// specific phrasings (the common "kicked" and "deleted" cases) and anything
/// else falls back to a generic message that includes the body.
pub(crate) fn status_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }
    match status {
        StatusCode::FORBIDDEN => {
            "Missing permissions. You may have been kicked from the room.".to_string()
        }
        StatusCode::NOT_FOUND => "Not found. It may have been deleted.".to_string(),
        _ => format!("Server error ({status}): {body}"),
    }
}

// ---------------------------------------------------------------------------
// CSRF
// ---------------------------------------------------------------------------

/// CSRF header name/value pair injected into every mutation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfTokenPair {
    pub header_name: String,
    pub token: String,
}

/// Extract the CSRF pair from the server's page metadata.
///
/// The page embeds `<meta name="_csrf_header" content="...">` and
/// `<meta name="_csrf" content="...">`; both must be present.
pub fn extract_csrf(html: &str) -> Option<CsrfTokenPair> {
    Some(CsrfTokenPair {
        header_name: meta_content(html, "_csrf_header")?,
        token: meta_content(html, "_csrf")?,
    })
}

/// Pull the `content` attribute out of a `<meta name="...">` tag.
fn meta_content(html: &str, name: &str) -> Option<String> {
    let marker = format!("name=\"{name}\"");
    let tag = html.match_indices("<meta").find_map(|(idx, _)| {
        let tag_end = html[idx..].find('>')? + idx;
        let candidate = &html[idx..tag_end];
        candidate.contains(&marker).then_some(candidate)
    })?;
    let content_idx = tag.find("content=\"")? + "content=\"".len();
    let rest = &tag[content_idx..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

// ---------------------------------------------------------------------------
// Member actions
// ---------------------------------------------------------------------------

/// Mutation applied to another member via the `action` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberAction {
    SetVoter,
    SetObserver,
    Kick,
}

impl MemberAction {
    /// Wire form of the action query parameter.
    pub fn as_query(self) -> &'static str {
        match self {
            MemberAction::SetVoter => "SET_VOTER",
            MemberAction::SetObserver => "SET_OBSERVER",
            MemberAction::Kick => "KICK",
        }
    }
}

// ---------------------------------------------------------------------------
// RoomService seam
// ---------------------------------------------------------------------------

/// The narrow server contract the reconciliation engine and action
/// dispatcher depend on. Implemented by [`ApiClient`] for production and by
/// scripted stubs in tests.
#[async_trait]
pub trait RoomService: Send + Sync {
    async fn list_rooms(&self) -> Result<Vec<Room>, ApiError>;
    async fn create_room(&self, name: &str, card_set_name: &str) -> Result<(), ApiError>;
    async fn get_room(&self, name: &str) -> Result<Room, ApiError>;
    async fn delete_room(&self, name: &str) -> Result<(), ApiError>;
    async fn edit_room(&self, name: &str, patch: &RoomPatch) -> Result<(), ApiError>;
    async fn join_room(&self, name: &str) -> Result<(), ApiError>;
    async fn leave_room(&self, name: &str) -> Result<(), ApiError>;
    async fn edit_member(
        &self,
        room: &str,
        username: &str,
        action: MemberAction,
    ) -> Result<(), ApiError>;
    async fn cast_vote(&self, room: &str, card_name: &str) -> Result<(), ApiError>;
    async fn clear_votes(&self, room: &str) -> Result<(), ApiError>;
    async fn get_summary(&self, room: &str) -> Result<SummaryResult, ApiError>;
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// Typed client over the server's REST API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    csrf: Option<CsrfTokenPair>,
}

impl ApiClient {
    /// Create a client against `base_url` (no trailing slash) with an
    /// already-known CSRF pair, or none when the deployment does not require
    /// one.
    pub fn new(base_url: impl Into<String>, csrf: Option<CsrfTokenPair>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        ApiClient {
            http: reqwest::Client::new(),
            base_url,
            csrf,
        }
    }

    /// Create a client and bootstrap the CSRF pair by fetching the server's
    /// index page. A page without the meta tags yields a client that sends
    /// no CSRF headers (the deployment has CSRF disabled).
    pub async fn bootstrap(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let mut client = ApiClient::new(base_url, None);
        let page = client
            .http
            .get(format!("{}/", client.base_url))
            .send()
            .await?
            .text()
            .await?;
        client.csrf = extract_csrf(&page);
        if client.csrf.is_none() {
            debug!("no CSRF meta tags on index page, sending mutations without CSRF headers");
        }
        Ok(client)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{path}", self.base_url)
    }

    /// Attach the CSRF header pair to a mutation request.
    fn with_csrf(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.csrf {
            Some(pair) => builder.header(&pair.header_name, &pair.token),
            None => builder,
        }
    }

    /// Check the response status, mapping non-2xx to `ApiError::Status`.
    async fn expect_ok(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status,
            message: status_message(status, &body),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.http.get(self.url(path)).send().await?;
        let response = Self::expect_ok(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::MalformedResponse(e.to_string()))
    }

    /// Fire a mutation that returns no interesting body.
    async fn mutate(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        let response = self.with_csrf(builder).send().await?;
        Self::expect_ok(response).await?;
        Ok(())
    }

    // -- startup reference data --

    /// Fetch the local user's identity.
    pub async fn get_identity(&self) -> Result<User, ApiError> {
        self.get_json("/identity").await
    }

    /// Fetch the extension keys enabled for this deployment.
    pub async fn get_extension_keys(&self) -> Result<Vec<String>, ApiError> {
        self.get_json("/extensions").await
    }

    /// Fetch the card set catalog.
    pub async fn get_card_sets(&self) -> Result<Vec<CardSet>, ApiError> {
        self.get_json("/card-sets").await
    }

    // -- extension config (opaque JSON, extension-defined shape) --

    /// Fetch an extension's global configuration.
    pub async fn get_extension_config(&self, key: &str) -> Result<Value, ApiError> {
        self.get_json(&format!("/extensions/{key}")).await
    }

    /// Patch an extension's global configuration.
    pub async fn set_extension_config(&self, key: &str, config: &Value) -> Result<(), ApiError> {
        self.mutate(
            self.http
                .patch(self.url(&format!("/extensions/{key}")))
                .json(config),
        )
        .await
    }

    /// Fetch an extension's per-room configuration.
    pub async fn get_room_extension_config(
        &self,
        room: &str,
        key: &str,
    ) -> Result<Value, ApiError> {
        self.get_json(&format!("/rooms/{room}/extensions/{key}")).await
    }

    /// Patch an extension's per-room configuration.
    pub async fn set_room_extension_config(
        &self,
        room: &str,
        key: &str,
        config: &Value,
    ) -> Result<(), ApiError> {
        self.mutate(
            self.http
                .patch(self.url(&format!("/rooms/{room}/extensions/{key}")))
                .json(config),
        )
        .await
    }
}

#[async_trait]
impl RoomService for ApiClient {
    async fn list_rooms(&self) -> Result<Vec<Room>, ApiError> {
        self.get_json("/rooms").await
    }

    async fn create_room(&self, name: &str, card_set_name: &str) -> Result<(), ApiError> {
        self.mutate(
            self.http
                .post(self.url(&format!("/rooms/{name}")))
                .json(&serde_json::json!({ "cardSetName": card_set_name })),
        )
        .await
    }

    async fn get_room(&self, name: &str) -> Result<Room, ApiError> {
        self.get_json(&format!("/rooms/{name}/")).await
    }

    async fn delete_room(&self, name: &str) -> Result<(), ApiError> {
        self.mutate(self.http.delete(self.url(&format!("/rooms/{name}"))))
            .await
    }

    async fn edit_room(&self, name: &str, patch: &RoomPatch) -> Result<(), ApiError> {
        self.mutate(
            self.http
                .patch(self.url(&format!("/rooms/{name}")))
                .json(patch),
        )
        .await
    }

    async fn join_room(&self, name: &str) -> Result<(), ApiError> {
        self.mutate(self.http.post(self.url(&format!("/rooms/{name}/members"))))
            .await
    }

    async fn leave_room(&self, name: &str) -> Result<(), ApiError> {
        self.mutate(self.http.delete(self.url(&format!("/rooms/{name}/members"))))
            .await
    }

    async fn edit_member(
        &self,
        room: &str,
        username: &str,
        action: MemberAction,
    ) -> Result<(), ApiError> {
        self.mutate(
            self.http
                .patch(self.url(&format!("/rooms/{room}/members/{username}")))
                .query(&[("action", action.as_query())]),
        )
        .await
    }

    async fn cast_vote(&self, room: &str, card_name: &str) -> Result<(), ApiError> {
        self.mutate(
            self.http
                .post(self.url(&format!("/rooms/{room}/votes")))
                .query(&[("card-name", card_name)]),
        )
        .await
    }

    async fn clear_votes(&self, room: &str) -> Result<(), ApiError> {
        self.mutate(self.http.delete(self.url(&format!("/rooms/{room}/votes"))))
            .await
    }

    async fn get_summary(&self, room: &str) -> Result<SummaryResult, ApiError> {
        self.get_json(&format!("/rooms/{room}/votes/summary")).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    // -- status message mapping --

    #[test]
    fn status_message_uses_json_message_field_verbatim() {
        let body = r#"{ "message": "A room with this name already exists." }"#;
        assert_eq!(
            status_message(StatusCode::CONFLICT, body),
            "A room with this name already exists."
        );
    }

    #[test]
    fn status_message_403_mentions_kick() {
        let message = status_message(StatusCode::FORBIDDEN, "");
        assert!(message.contains("kicked"), "got: {message}");
    }

    #[test]
    fn status_message_404_mentions_deleted() {
        let message = status_message(StatusCode::NOT_FOUND, "");
        assert!(message.contains("deleted"), "got: {message}");
    }

    #[test]
    fn status_message_other_includes_body() {
        let message = status_message(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(message.contains("boom"), "got: {message}");
        assert!(message.contains("500"), "got: {message}");
    }

    #[test]
    fn status_message_json_without_message_field_falls_back() {
        let message = status_message(StatusCode::NOT_FOUND, r#"{ "error": "x" }"#);
        assert!(message.contains("deleted"), "got: {message}");
    }

    // -- CSRF extraction --

    #[test]
    fn extract_csrf_from_page_metadata() {
        let html = r#"<!DOCTYPE html>
            <html><head>
            <meta charset="utf-8">
            <meta name="_csrf_header" content="X-CSRF-TOKEN">
            <meta name="_csrf" content="abc-123">
            </head><body></body></html>"#;
        let pair = extract_csrf(html).unwrap();
        assert_eq!(pair.header_name, "X-CSRF-TOKEN");
        assert_eq!(pair.token, "abc-123");
    }

    #[test]
    fn extract_csrf_missing_tags_is_none() {
        assert!(extract_csrf("<html><head></head></html>").is_none());
        // Header tag alone is not enough.
        let html = r#"<meta name="_csrf_header" content="X-CSRF-TOKEN">"#;
        assert!(extract_csrf(html).is_none());
    }

    // -- patch wire format: only changed fields serialize --

    #[test]
    fn room_patch_serializes_only_set_fields() {
        let patch = RoomPatch {
            topic: Some("B".to_string()),
            card_set_name: None,
            extensions: None,
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "topic": "B" }));
    }

    #[test]
    fn room_patch_full_serialization() {
        let patch = RoomPatch {
            topic: Some("topic".to_string()),
            card_set_name: Some("Fibonacci".to_string()),
            extensions: Some(BTreeSet::from(["issuetracker".to_string()])),
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "topic": "topic",
                "cardSetName": "Fibonacci",
                "extensions": ["issuetracker"],
            })
        );
    }

    #[test]
    fn member_action_query_forms() {
        assert_eq!(MemberAction::SetVoter.as_query(), "SET_VOTER");
        assert_eq!(MemberAction::SetObserver.as_query(), "SET_OBSERVER");
        assert_eq!(MemberAction::Kick.as_query(), "KICK");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:8080/", None);
        assert_eq!(client.url("/rooms"), "http://localhost:8080/api/rooms");
    }
}
