//! [`DataService`] backed by the GraphQL API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Mutex;

use super::{ClientError, GqlClient, Union};
use crate::screens::{DataService, UsernameError, Viewer};

pub const VIEWER_QUERY: &str = r#"
query Viewer {
  me {
    id
    name
    username
    profileImageUrl
  }
}
"#;

pub const VALIDATE_USERNAME_QUERY: &str = r#"
query ValidateUsername($username: String!) {
  validateUsername(username: $username)
}
"#;

pub const DELETE_ACCOUNT_MUTATION: &str = r#"
mutation DeleteAccount($userId: ID!) {
  deleteAccount(userID: $userId) {
    ... on DeleteAccountSuccess {
      userID
    }
    ... on DeleteAccountError {
      errorCodes
    }
  }
}
"#;

#[derive(Deserialize)]
struct ViewerData {
    me: Viewer,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateUsernameData {
    validate_username: bool,
}

#[derive(Deserialize)]
struct DeleteAccountSuccess {
    #[serde(rename = "userID")]
    #[allow(dead_code)]
    user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteAccountData {
    delete_account: Union<DeleteAccountSuccess>,
}

fn username_error(err: &ClientError) -> UsernameError {
    match err {
        ClientError::Transport(_) => UsernameError::Network,
        e if e.is_server_error() => UsernameError::InternalServer,
        _ => UsernameError::Unknown,
    }
}

/// Fetches through a [`GqlClient`] and caches the last viewer it saw.
pub struct GqlDataService {
    client: GqlClient,
    viewer: Mutex<Option<Viewer>>,
}

impl GqlDataService {
    pub fn new(client: GqlClient) -> Self {
        Self {
            client,
            viewer: Mutex::new(None),
        }
    }

    fn set_viewer(&self, viewer: Option<Viewer>) {
        if let Ok(mut cached) = self.viewer.lock() {
            *cached = viewer;
        }
    }
}

#[async_trait]
impl DataService for GqlDataService {
    fn current_viewer(&self) -> Option<Viewer> {
        self.viewer.lock().ok().and_then(|v| v.clone())
    }

    async fn fetch_viewer(&self) -> anyhow::Result<Viewer> {
        let data: ViewerData = self.client.request(VIEWER_QUERY, json!({})).await?;
        self.set_viewer(Some(data.me.clone()));
        Ok(data.me)
    }

    async fn validate_username(&self, username: &str) -> Result<(), UsernameError> {
        let data: ValidateUsernameData = self
            .client
            .request(VALIDATE_USERNAME_QUERY, json!({ "username": username }))
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "validate username failed");
                username_error(&e)
            })?;

        if data.validate_username {
            Ok(())
        } else {
            Err(UsernameError::NameUnavailable)
        }
    }

    async fn delete_account(&self, user_id: &str) -> anyhow::Result<()> {
        let data: DeleteAccountData = self
            .client
            .request(DELETE_ACCOUNT_MUTATION, json!({ "userId": user_id }))
            .await?;
        data.delete_account.into_result()?;
        self.set_viewer(None);
        Ok(())
    }

    async fn reset_data_cache(&self) -> anyhow::Result<()> {
        self.set_viewer(None);
        tracing::info!("data cache reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::stub;

    fn route(body: &serde_json::Value) -> (u16, serde_json::Value) {
        let query = body["query"].as_str().unwrap_or_default();
        if query.contains("query Viewer") {
            (
                200,
                json!({ "data": { "me": {
                    "id": "u1", "name": "Ada", "username": "ada", "profileImageUrl": null
                }}}),
            )
        } else if query.contains("ValidateUsername") {
            let free = body["variables"]["username"] != "taken";
            (200, json!({ "data": { "validateUsername": free } }))
        } else if query.contains("DeleteAccount") {
            if body["variables"]["userId"] == "u1" {
                (200, json!({ "data": { "deleteAccount": { "userID": "u1" } } }))
            } else {
                (
                    200,
                    json!({ "data": { "deleteAccount": { "errorCodes": ["UNAUTHORIZED"] } } }),
                )
            }
        } else {
            (400, json!({}))
        }
    }

    #[tokio::test]
    async fn test_fetch_viewer_fills_cache() {
        let server = stub::start(route).await;
        let service = GqlDataService::new(GqlClient::new(&server.url).unwrap());
        assert!(service.current_viewer().is_none());

        let viewer = service.fetch_viewer().await.unwrap();
        assert_eq!(viewer.username, "ada");
        assert_eq!(service.current_viewer(), Some(viewer));

        service.reset_data_cache().await.unwrap();
        assert!(service.current_viewer().is_none());
    }

    #[tokio::test]
    async fn test_validate_username() {
        let server = stub::start(route).await;
        let service = GqlDataService::new(GqlClient::new(&server.url).unwrap());

        assert_eq!(service.validate_username("reader").await, Ok(()));
        assert_eq!(
            service.validate_username("taken").await,
            Err(UsernameError::NameUnavailable)
        );
    }

    #[tokio::test]
    async fn test_validate_username_server_error() {
        let server = stub::start(|_| (502, json!({}))).await;
        let service = GqlDataService::new(GqlClient::new(&server.url).unwrap());

        assert_eq!(
            service.validate_username("reader").await,
            Err(UsernameError::InternalServer)
        );
    }

    #[tokio::test]
    async fn test_delete_account() {
        let server = stub::start(route).await;
        let service = GqlDataService::new(GqlClient::new(&server.url).unwrap());
        service.fetch_viewer().await.unwrap();

        assert!(service.delete_account("someone-else").await.is_err());
        assert!(service.current_viewer().is_some());

        service.delete_account("u1").await.unwrap();
        assert!(service.current_viewer().is_none());
    }
}
