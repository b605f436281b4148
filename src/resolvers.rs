//! GraphQL-boundary resolvers.
//!
//! Each resolver authorizes the caller, delegates to a service and maps the
//! outcome to a `Result<Success, Error>` pair. This is the only layer that
//! turns a [`ServiceError`] into a client-visible code; the root cause is
//! logged and never returned.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::device_tokens;
use crate::error::ServiceError;
use crate::library_items;
use crate::models::{DeviceToken, Folder, LibraryItemUpdate, NewRule, Rule};
use crate::rules;

/// Identity of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub uid: String,
}

impl Claims {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    NotFound,
    Unauthorized,
}

fn service_error_code(err: &ServiceError) -> ErrorCode {
    match err {
        ServiceError::NotFound { .. } => ErrorCode::NotFound,
        ServiceError::Unauthorized => ErrorCode::Unauthorized,
        _ => ErrorCode::BadRequest,
    }
}

// ============ setLinkArchived ============

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveLinkInput {
    pub link_id: String,
    pub archived: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveLinkSuccess {
    pub link_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveLinkError {
    pub message: String,
    pub error_codes: Vec<ErrorCode>,
}

impl ArchiveLinkError {
    fn new(code: ErrorCode) -> Self {
        Self {
            message: "An error occurred".to_string(),
            error_codes: vec![code],
        }
    }
}

/// Moves a link to the archive, or back to the inbox, stamping `saved_at`
/// with the current time.
pub async fn set_link_archived(
    ctx: &AppContext,
    claims: Option<&Claims>,
    input: ArchiveLinkInput,
) -> Result<ArchiveLinkSuccess, ArchiveLinkError> {
    let Some(claims) = claims else {
        return Err(ArchiveLinkError::new(ErrorCode::Unauthorized));
    };

    let (event, folder) = if input.archived {
        ("link_archived", Folder::Archive)
    } else {
        ("link_unarchived", Folder::Inbox)
    };
    ctx.track(&claims.uid, event);

    let update = LibraryItemUpdate {
        saved_at: Some(Utc::now()),
        folder: Some(folder),
    };
    if let Err(e) =
        library_items::update_library_item(ctx, &input.link_id, update, &claims.uid).await
    {
        tracing::error!(error = %e, link_id = %input.link_id, "set_link_archived failed");
        return Err(ArchiveLinkError::new(ErrorCode::BadRequest));
    }

    Ok(ArchiveLinkSuccess {
        link_id: input.link_id,
        message: "Link Archived".to_string(),
    })
}

// ============ setRule / deleteRule ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetRuleSuccess {
    pub rule: Rule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRuleError {
    pub error_codes: Vec<ErrorCode>,
}

pub async fn set_rule(
    ctx: &AppContext,
    claims: Option<&Claims>,
    input: NewRule,
) -> Result<SetRuleSuccess, SetRuleError> {
    let Some(claims) = claims else {
        return Err(SetRuleError {
            error_codes: vec![ErrorCode::Unauthorized],
        });
    };

    match rules::create_rule(ctx, &claims.uid, input).await {
        Ok(rule) => Ok(SetRuleSuccess { rule }),
        Err(e) => {
            tracing::error!(error = %e, "set_rule failed");
            Err(SetRuleError {
                error_codes: vec![ErrorCode::BadRequest],
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteRuleSuccess {
    pub rule: Rule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRuleError {
    pub error_codes: Vec<ErrorCode>,
}

pub async fn delete_rule(
    ctx: &AppContext,
    claims: Option<&Claims>,
    id: &str,
) -> Result<DeleteRuleSuccess, DeleteRuleError> {
    let Some(claims) = claims else {
        return Err(DeleteRuleError {
            error_codes: vec![ErrorCode::Unauthorized],
        });
    };

    match rules::delete_rule(ctx, id, &claims.uid).await {
        Ok(rule) => Ok(DeleteRuleSuccess { rule }),
        Err(e) => {
            tracing::error!(error = %e, rule_id = %id, "delete_rule failed");
            Err(DeleteRuleError {
                error_codes: vec![service_error_code(&e)],
            })
        }
    }
}

// ============ setDeviceToken ============

/// Registers `token`, or when only `id` is given, deletes that token.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDeviceTokenInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDeviceTokenSuccess {
    pub device_token: DeviceToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDeviceTokenError {
    pub error_codes: Vec<ErrorCode>,
}

impl SetDeviceTokenError {
    fn new(code: ErrorCode) -> Self {
        Self {
            error_codes: vec![code],
        }
    }
}

pub async fn set_device_token(
    ctx: &AppContext,
    claims: Option<&Claims>,
    input: SetDeviceTokenInput,
) -> Result<SetDeviceTokenSuccess, SetDeviceTokenError> {
    let Some(claims) = claims else {
        return Err(SetDeviceTokenError::new(ErrorCode::Unauthorized));
    };
    let uid = claims.uid.as_str();

    match (input.token, input.id) {
        (Some(token), _) if !token.is_empty() => {
            match device_tokens::create_device_token(ctx, uid, &token).await {
                Ok(device_token) => Ok(SetDeviceTokenSuccess { device_token }),
                Err(e) => {
                    tracing::error!(error = %e, "set_device_token create failed");
                    Err(SetDeviceTokenError::new(ErrorCode::BadRequest))
                }
            }
        }
        (_, Some(id)) => remove_device_token(ctx, &id, uid)
            .await
            .map(|device_token| SetDeviceTokenSuccess { device_token })
            .map_err(SetDeviceTokenError::new),
        _ => Err(SetDeviceTokenError::new(ErrorCode::BadRequest)),
    }
}

/// Deletes one of the caller's tokens, returning it as it was stored.
async fn remove_device_token(
    ctx: &AppContext,
    id: &str,
    uid: &str,
) -> Result<DeviceToken, ErrorCode> {
    let existing = match device_tokens::find_device_token_by_id(ctx, id, uid).await {
        Ok(Some(token)) => token,
        Ok(None) => return Err(ErrorCode::NotFound),
        Err(e) => {
            tracing::error!(error = %e, token_id = %id, "device token lookup failed");
            return Err(ErrorCode::BadRequest);
        }
    };
    match device_tokens::delete_device_token(ctx, id, uid).await {
        Ok(true) => Ok(existing),
        Ok(false) => Err(ErrorCode::NotFound),
        Err(e) => {
            tracing::error!(error = %e, token_id = %id, "device token delete failed");
            Err(ErrorCode::BadRequest)
        }
    }
}

// ============ deleteDeviceToken ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDeviceTokenSuccess {
    pub device_token: DeviceToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDeviceTokenError {
    pub error_codes: Vec<ErrorCode>,
}

pub async fn delete_device_token(
    ctx: &AppContext,
    claims: Option<&Claims>,
    id: &str,
) -> Result<DeleteDeviceTokenSuccess, DeleteDeviceTokenError> {
    let Some(claims) = claims else {
        return Err(DeleteDeviceTokenError {
            error_codes: vec![ErrorCode::Unauthorized],
        });
    };

    remove_device_token(ctx, id, &claims.uid)
        .await
        .map(|device_token| DeleteDeviceTokenSuccess { device_token })
        .map_err(|code| DeleteDeviceTokenError {
            error_codes: vec![code],
        })
}
