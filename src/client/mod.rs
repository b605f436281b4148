//! GraphQL client wrappers.
//!
//! [`GqlClient`] posts `{query, variables}` documents to the API and
//! unwraps the `data` member. The submodules hold the typed documents used
//! by the frontends:
//!
//! | Module | Documents |
//! |--------|-----------|
//! | [`highlights`] | `MergeHighlight` |
//! | [`subscriptions`] | `GetSubscriptions` |
//! | [`viewer`] | `Viewer`, `ValidateUsername`, `DeleteAccount` |

pub mod highlights;
pub mod subscriptions;
pub mod viewer;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("graphql error: {0}")]
    GraphQl(String),

    #[error("response has no data")]
    MissingData,

    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),

    /// The operation resolved to its error member.
    #[error("request failed with codes: {}", .0.join(", "))]
    ErrorCodes(Vec<String>),
}

impl ClientError {
    pub fn is_server_error(&self) -> bool {
        matches!(self, ClientError::Status { status, .. } if *status >= 500)
    }
}

#[derive(Serialize)]
struct GqlRequest<'a, V> {
    query: &'a str,
    variables: V,
}

#[derive(Deserialize)]
struct GqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GqlErrorEntry>,
}

#[derive(Deserialize)]
struct GqlErrorEntry {
    message: String,
}

/// Member of a `Success | Error` union as returned by the API. Untagged
/// so no `__typename` is needed in the selection set.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Union<S> {
    Success(S),
    Error {
        #[serde(rename = "errorCodes")]
        error_codes: Vec<String>,
    },
}

impl<S> Union<S> {
    pub(crate) fn into_result(self) -> Result<S, ClientError> {
        match self {
            Union::Success(s) => Ok(s),
            Union::Error { error_codes } => Err(ClientError::ErrorCodes(error_codes)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GqlClient {
    http: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl GqlClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            auth_token: None,
        })
    }

    /// Sends `token` in the `Authorization` header of every request.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Runs one document and decodes its `data` member into `T`.
    pub async fn request<V, T>(&self, query: &str, variables: V) -> Result<T, ClientError>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        let mut req = self
            .http
            .post(&self.endpoint)
            .json(&GqlRequest { query, variables });
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", token);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: GqlResponse = response.json().await?;
        if !envelope.errors.is_empty() {
            let messages: Vec<String> = envelope.errors.into_iter().map(|e| e.message).collect();
            return Err(ClientError::GraphQl(messages.join("; ")));
        }
        let data = envelope.data.ok_or(ClientError::MissingData)?;
        Ok(serde_json::from_value(data)?)
    }
}
