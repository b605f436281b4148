//! `GetSubscriptions` query with stale-while-revalidate state.
//!
//! [`SubscriptionsQuery`] keeps the last good list and the last error. The
//! first fetch happens on the first [`revalidate`](SubscriptionsQuery::revalidate);
//! later calls refetch, keeping the previous list visible if they fail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ClientError, GqlClient, Union};

pub const GET_SUBSCRIPTIONS_QUERY: &str = r#"
query GetSubscriptions($type: SubscriptionType, $sort: SortParams) {
  subscriptions(type: $type, sort: $sort) {
    ... on SubscriptionsSuccess {
      subscriptions {
        id
        name
        type
        newsletterEmail
        url
        description
        status
        unsubscribeMailTo
        unsubscribeHttpUrl
        createdAt
        updatedAt
        lastFetchedAt
        autoAddToLibrary
        isPrivate
      }
    }
    ... on SubscriptionsError {
      errorCodes
    }
  }
}
"#;

pub const DEFAULT_SORT: &str = "UPDATED_TIME";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionType {
    Rss,
    Newsletter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
    Deleted,
    Unsubscribed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub subscription_type: SubscriptionType,
    #[serde(default)]
    pub newsletter_email: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub unsubscribe_mail_to: Option<String>,
    #[serde(default)]
    pub unsubscribe_http_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_fetched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_add_to_library: Option<bool>,
    #[serde(default)]
    pub is_private: Option<bool>,
}

#[derive(Deserialize)]
struct SubscriptionsSuccess {
    subscriptions: Vec<Subscription>,
}

#[derive(Deserialize)]
struct SubscriptionsData {
    subscriptions: Union<SubscriptionsSuccess>,
}

/// Snapshot handed to the caller by [`SubscriptionsQuery::state`].
#[derive(Debug)]
pub struct SubscriptionsState<'a> {
    pub error: Option<&'a ClientError>,
    /// No data and no error yet.
    pub is_loading: bool,
    pub is_validating: bool,
    pub subscriptions: &'a [Subscription],
}

pub struct SubscriptionsQuery {
    client: GqlClient,
    subscription_type: Option<SubscriptionType>,
    sort_by: String,
    data: Option<Vec<Subscription>>,
    error: Option<ClientError>,
    validating: bool,
}

impl SubscriptionsQuery {
    /// `sort_by` defaults to [`DEFAULT_SORT`].
    pub fn new(
        client: GqlClient,
        subscription_type: Option<SubscriptionType>,
        sort_by: Option<&str>,
    ) -> Self {
        Self {
            client,
            subscription_type,
            sort_by: sort_by.unwrap_or(DEFAULT_SORT).to_string(),
            data: None,
            error: None,
            validating: false,
        }
    }

    pub fn state(&self) -> SubscriptionsState<'_> {
        SubscriptionsState {
            error: self.error.as_ref(),
            is_loading: self.error.is_none() && self.data.is_none(),
            is_validating: self.validating || self.data.is_none(),
            subscriptions: self.data.as_deref().unwrap_or(&[]),
        }
    }

    /// Fetches the list again. Errors land in the state, not the caller.
    pub async fn revalidate(&mut self) {
        self.validating = true;

        let variables = json!({
            "type": self.subscription_type,
            "sort": { "by": self.sort_by },
        });
        let result = self
            .client
            .request::<_, SubscriptionsData>(GET_SUBSCRIPTIONS_QUERY, variables)
            .await
            .and_then(|data| data.subscriptions.into_result());

        match result {
            Ok(success) => {
                self.data = Some(success.subscriptions);
                self.error = None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "subscriptions query failed");
                self.error = Some(e);
            }
        }
        self.validating = false;
    }
}
