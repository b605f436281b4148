//! Core data models.
//!
//! Every persisted entity is owned by exactly one user; `user_id` is the
//! only authorization boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleActionType {
    AddLabel,
    Archive,
    Delete,
    MarkAsRead,
    SendNotification,
    Webhook,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub action_type: RuleActionType,
    #[serde(default)]
    pub params: Vec<String>,
}

/// A saved filter with the actions applied to items matching it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub actions: Vec<RuleAction>,
    pub filter: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`crate::rules::create_rule`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRule {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
    pub filter: String,
}

/// Push notification token registered by a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceToken {
    pub id: String,
    pub token: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Folder {
    Inbox,
    Archive,
    Following,
}

impl Folder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Folder::Inbox => "inbox",
            Folder::Archive => "archive",
            Folder::Following => "following",
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Folder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inbox" => Ok(Folder::Inbox),
            "archive" => Ok(Folder::Archive),
            "following" => Ok(Folder::Following),
            other => Err(format!("unknown folder: '{}'", other)),
        }
    }
}

/// A saved link in a user's library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryItem {
    pub id: String,
    pub user_id: String,
    pub original_url: String,
    pub title: String,
    pub author: Option<String>,
    pub description: Option<String>,
    pub folder: Folder,
    pub saved_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub preview_content: Option<String>,
    pub added_to_following_by: Option<String>,
    pub added_to_following_from: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update applied by [`crate::library_items::update_library_item`].
#[derive(Debug, Clone, Default)]
pub struct LibraryItemUpdate {
    pub saved_at: Option<DateTime<Utc>>,
    pub folder: Option<Folder>,
}

/// Outcome of a bulk delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    pub affected: u64,
}

pub(crate) fn ts_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_round_trips_through_str() {
        for folder in [Folder::Inbox, Folder::Archive, Folder::Following] {
            assert_eq!(folder.as_str().parse::<Folder>().unwrap(), folder);
        }
        assert_eq!("ARCHIVE".parse::<Folder>().unwrap(), Folder::Archive);
        assert!("trash".parse::<Folder>().is_err());
    }

    #[test]
    fn rule_action_uses_graphql_names() {
        let action: RuleAction =
            serde_json::from_str(r#"{"type":"ADD_LABEL","params":["news"]}"#).unwrap();
        assert_eq!(action.action_type, RuleActionType::AddLabel);
        assert_eq!(action.params, vec!["news".to_string()]);

        let json = serde_json::to_string(&RuleAction {
            action_type: RuleActionType::MarkAsRead,
            params: vec![],
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"MARK_AS_READ","params":[]}"#);
    }
}
