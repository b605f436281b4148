//! Following ingestion endpoint.
//!
//! `POST /svc/following/save?token=…` is called by the feed fetcher to drop
//! a new entry into subscribers' following folders. The caller proves
//! itself with a shared secret compared against
//! `PUBSUB_VERIFICATION_TOKEN`.
//!
//! | Outcome | Status | Body |
//! |---------|--------|------|
//! | token missing or wrong | 403 | |
//! | body not a valid request | 400 | `INVALID_REQUEST_BODY` |
//! | feed item not saved | 500 | `ERROR_SAVING_FEED_ITEM` |
//! | saved, or source not handled | 200 | |

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::context::AppContext;
use crate::library_items::save_feed_item_in_following;

pub const INVALID_REQUEST_BODY: &str = "INVALID_REQUEST_BODY";
pub const ERROR_SAVING_FEED_ITEM: &str = "ERROR_SAVING_FEED_ITEM";

/// Where a following item came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowingSource {
    Feed,
    Newsletter,
    User,
    Other(String),
}

impl From<&str> for FollowingSource {
    fn from(s: &str) -> Self {
        match s {
            "feed" => FollowingSource::Feed,
            "newsletter" => FollowingSource::Newsletter,
            "user" => FollowingSource::User,
            other => FollowingSource::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveFollowingItemRequest {
    pub user_ids: Vec<String>,
    pub title: String,
    pub url: String,
    /// Accepted for compatibility with upstream callers; not used.
    #[serde(default)]
    pub item_id: Option<String>,
    pub added_to_following_by: String,
    pub added_to_following_from: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub links: Option<Value>,
    #[serde(default)]
    pub preview_content: Option<String>,
    #[serde(default)]
    pub preview_content_type: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl SaveFollowingItemRequest {
    pub fn source(&self) -> FollowingSource {
        FollowingSource::from(self.added_to_following_from.as_str())
    }
}

/// Parses a request body, rejecting anything that is not a JSON object
/// carrying every required field with the right type.
pub fn parse_save_request(body: &[u8]) -> Result<SaveFollowingItemRequest, serde_json::Error> {
    serde_json::from_slice(body)
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

fn token_matches(expected: &str, provided: Option<&str>) -> bool {
    !expected.is_empty() && provided == Some(expected)
}

/// Handler for `POST /svc/following/save`.
pub async fn handle_save(
    State(ctx): State<AppContext>,
    Query(query): Query<TokenQuery>,
    body: Bytes,
) -> Response {
    tracing::info!(bytes = body.len(), "save following item request");

    if !token_matches(
        &ctx.config.server.pubsub_verification_token,
        query.token.as_deref(),
    ) {
        tracing::warn!("query does not include valid token");
        return StatusCode::FORBIDDEN.into_response();
    }

    let request = match parse_save_request(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "invalid request body");
            return (StatusCode::BAD_REQUEST, INVALID_REQUEST_BODY).into_response();
        }
    };

    match request.source() {
        FollowingSource::Feed => {
            tracing::info!(url = %request.url, users = request.user_ids.len(), "saving feed item");
            match save_feed_item_in_following(&ctx, &request).await {
                Ok(result) if !result.identifiers.is_empty() => {
                    tracing::info!(saved = result.identifiers.len(), "feed item saved in following");
                    StatusCode::OK.into_response()
                }
                Ok(_) => {
                    tracing::error!(url = %request.url, "no feed item saved in following");
                    (StatusCode::INTERNAL_SERVER_ERROR, ERROR_SAVING_FEED_ITEM).into_response()
                }
                Err(e) => {
                    tracing::error!(error = %e, url = %request.url, "error saving feed item in following");
                    (StatusCode::INTERNAL_SERVER_ERROR, ERROR_SAVING_FEED_ITEM).into_response()
                }
            }
        }
        source => {
            tracing::info!(?source, "following source not implemented");
            StatusCode::OK.into_response()
        }
    }
}
