//! Device token service.
//!
//! Push notification tokens registered by a user's devices. Lookups never
//! fail on an empty result; creation does not deduplicate.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::Result;
use crate::models::{ts_to_datetime, DeviceToken};
use crate::repository::auth_trx;

/// Selects the tokens removed by [`delete_device_tokens`].
///
/// Either form is additionally restricted to the calling user's tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceTokenCriteria {
    Ids(Vec<String>),
    Filter(DeviceTokenFilter),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceTokenFilter {
    pub token: Option<String>,
}

fn token_from_row(row: &SqliteRow) -> DeviceToken {
    DeviceToken {
        id: row.get("id"),
        token: row.get("token"),
        user_id: row.get("user_id"),
        created_at: ts_to_datetime(row.get("created_at")),
    }
}

pub async fn find_device_token_by_id(
    ctx: &AppContext,
    id: &str,
    user_id: &str,
) -> Result<Option<DeviceToken>> {
    let id = id.to_string();
    let owner = user_id.to_string();

    auth_trx(&ctx.pool, user_id, move |conn| {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT id, token, user_id, created_at FROM user_device_tokens WHERE id = ? AND user_id = ?",
            )
            .bind(&id)
            .bind(&owner)
            .fetch_optional(&mut *conn)
            .await?;
            Ok(row.as_ref().map(token_from_row))
        })
    })
    .await
}

pub async fn find_device_token_by_token(
    ctx: &AppContext,
    token: &str,
    user_id: &str,
) -> Result<Option<DeviceToken>> {
    let token = token.to_string();
    let owner = user_id.to_string();

    auth_trx(&ctx.pool, user_id, move |conn| {
        Box::pin(async move {
            let row = sqlx::query(
                "SELECT id, token, user_id, created_at FROM user_device_tokens
                 WHERE token = ? AND user_id = ? ORDER BY created_at ASC LIMIT 1",
            )
            .bind(&token)
            .bind(&owner)
            .fetch_optional(&mut *conn)
            .await?;
            Ok(row.as_ref().map(token_from_row))
        })
    })
    .await
}

pub async fn find_device_tokens_by_user_id(
    ctx: &AppContext,
    user_id: &str,
) -> Result<Vec<DeviceToken>> {
    let owner = user_id.to_string();

    auth_trx(&ctx.pool, user_id, move |conn| {
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT id, token, user_id, created_at FROM user_device_tokens
                 WHERE user_id = ? ORDER BY created_at ASC",
            )
            .bind(&owner)
            .fetch_all(&mut *conn)
            .await?;
            Ok(rows.iter().map(token_from_row).collect())
        })
    })
    .await
}

/// Registers `token` for `user_id`. Tracks `device_token_created`.
pub async fn create_device_token(
    ctx: &AppContext,
    user_id: &str,
    token: &str,
) -> Result<DeviceToken> {
    ctx.track(user_id, "device_token_created");

    let device_token = DeviceToken {
        id: Uuid::new_v4().to_string(),
        token: token.to_string(),
        user_id: user_id.to_string(),
        created_at: ts_to_datetime(Utc::now().timestamp_millis()),
    };

    auth_trx(&ctx.pool, user_id, move |conn| {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO user_device_tokens (id, user_id, token, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&device_token.id)
            .bind(&device_token.user_id)
            .bind(&device_token.token)
            .bind(device_token.created_at.timestamp_millis())
            .execute(&mut *conn)
            .await?;
            Ok(device_token)
        })
    })
    .await
}

/// Deletes one of the user's tokens, returning whether a row was removed.
///
/// `device_token_deleted` is tracked before the delete runs, whether or
/// not anything ends up deleted.
pub async fn delete_device_token(ctx: &AppContext, id: &str, user_id: &str) -> Result<bool> {
    ctx.track(user_id, "device_token_deleted");

    let id = id.to_string();
    let owner = user_id.to_string();

    auth_trx(&ctx.pool, user_id, move |conn| {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM user_device_tokens WHERE id = ? AND user_id = ?")
                .bind(&id)
                .bind(&owner)
                .execute(&mut *conn)
                .await?;
            Ok(result.rows_affected() > 0)
        })
    })
    .await
}

/// Bulk-deletes the user's tokens matching `criteria`.
pub async fn delete_device_tokens(
    ctx: &AppContext,
    user_id: &str,
    criteria: DeviceTokenCriteria,
) -> Result<()> {
    if let DeviceTokenCriteria::Ids(ids) = &criteria {
        if ids.is_empty() {
            return Ok(());
        }
    }

    let owner = user_id.to_string();

    auth_trx(&ctx.pool, user_id, move |conn| {
        Box::pin(async move {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("DELETE FROM user_device_tokens WHERE user_id = ");
            builder.push_bind(owner);

            match criteria {
                DeviceTokenCriteria::Ids(ids) => {
                    builder.push(" AND id IN (");
                    let mut separated = builder.separated(", ");
                    for id in ids {
                        separated.push_bind(id);
                    }
                    separated.push_unseparated(")");
                }
                DeviceTokenCriteria::Filter(filter) => {
                    if let Some(token) = filter.token {
                        builder.push(" AND token = ");
                        builder.push_bind(token);
                    }
                }
            }

            let result = builder.build().execute(&mut *conn).await?;
            tracing::debug!(deleted = result.rows_affected(), "device tokens deleted");
            Ok(())
        })
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestApp;

    #[tokio::test]
    async fn test_create_and_find() {
        let app = TestApp::new().await;
        let user = app.user("alice").await;

        let created = create_device_token(&app.ctx, &user.id, "tok-1").await.unwrap();
        assert_eq!(created.token, "tok-1");

        let by_id = find_device_token_by_id(&app.ctx, &created.id, &user.id)
            .await
            .unwrap();
        assert_eq!(by_id, Some(created.clone()));

        let by_token = find_device_token_by_token(&app.ctx, "tok-1", &user.id)
            .await
            .unwrap();
        assert_eq!(by_token, Some(created.clone()));

        let all = find_device_tokens_by_user_id(&app.ctx, &user.id).await.unwrap();
        assert_eq!(all, vec![created]);

        let events = app.analytics.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "device_token_created");
        assert_eq!(events[0].properties["env"], "test");
    }

    #[tokio::test]
    async fn test_lookups_are_owner_scoped() {
        let app = TestApp::new().await;
        let alice = app.user("alice").await;
        let bob = app.user("bob").await;
        let created = create_device_token(&app.ctx, &alice.id, "tok-1").await.unwrap();

        assert_eq!(
            find_device_token_by_id(&app.ctx, &created.id, &bob.id)
                .await
                .unwrap(),
            None
        );
        assert_eq!(
            find_device_token_by_token(&app.ctx, "tok-1", &bob.id)
                .await
                .unwrap(),
            None
        );
        assert!(find_device_tokens_by_user_id(&app.ctx, &bob.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_create_does_not_dedup() {
        let app = TestApp::new().await;
        let user = app.user("alice").await;

        create_device_token(&app.ctx, &user.id, "same").await.unwrap();
        create_device_token(&app.ctx, &user.id, "same").await.unwrap();

        let all = find_device_tokens_by_user_id(&app.ctx, &user.id).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_reports_whether_removed() {
        let app = TestApp::new().await;
        let alice = app.user("alice").await;
        let bob = app.user("bob").await;
        let created = create_device_token(&app.ctx, &alice.id, "tok").await.unwrap();

        assert!(!delete_device_token(&app.ctx, &created.id, &bob.id).await.unwrap());
        assert!(delete_device_token(&app.ctx, &created.id, &alice.id).await.unwrap());
        assert!(!delete_device_token(&app.ctx, &created.id, &alice.id).await.unwrap());

        // tracked on every attempt, including the ones that removed nothing
        let deleted_events = app
            .analytics
            .event_names()
            .into_iter()
            .filter(|e| e == "device_token_deleted")
            .count();
        assert_eq!(deleted_events, 3);
    }

    #[tokio::test]
    async fn test_bulk_delete_by_ids_and_filter() {
        let app = TestApp::new().await;
        let alice = app.user("alice").await;
        let bob = app.user("bob").await;

        let a1 = create_device_token(&app.ctx, &alice.id, "a1").await.unwrap();
        let a2 = create_device_token(&app.ctx, &alice.id, "a2").await.unwrap();
        create_device_token(&app.ctx, &alice.id, "a3").await.unwrap();
        let b1 = create_device_token(&app.ctx, &bob.id, "a3").await.unwrap();

        // bob's id is ignored because it is not alice's token
        delete_device_tokens(
            &app.ctx,
            &alice.id,
            DeviceTokenCriteria::Ids(vec![a1.id.clone(), a2.id.clone(), b1.id.clone()]),
        )
        .await
        .unwrap();

        let remaining = find_device_tokens_by_user_id(&app.ctx, &alice.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].token, "a3");

        delete_device_tokens(
            &app.ctx,
            &alice.id,
            DeviceTokenCriteria::Filter(DeviceTokenFilter {
                token: Some("a3".to_string()),
            }),
        )
        .await
        .unwrap();

        assert!(find_device_tokens_by_user_id(&app.ctx, &alice.id)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            find_device_tokens_by_user_id(&app.ctx, &bob.id)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_bulk_delete_with_empty_ids_is_noop() {
        let app = TestApp::new().await;
        let user = app.user("alice").await;
        create_device_token(&app.ctx, &user.id, "keep").await.unwrap();

        delete_device_tokens(&app.ctx, &user.id, DeviceTokenCriteria::Ids(vec![]))
            .await
            .unwrap();

        assert_eq!(
            find_device_tokens_by_user_id(&app.ctx, &user.id)
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
