//! Library item service.
//!
//! Items are the links a user has saved. Owner-scoped operations run
//! through [`auth_trx`]; [`save_feed_item_in_following`] is a
//! service-to-service write that fans one feed entry out to many users.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::{Result, ServiceError};
use crate::following::SaveFollowingItemRequest;
use crate::models::{ts_to_datetime, Folder, LibraryItem, LibraryItemUpdate};
use crate::repository::auth_trx;

const ITEM_COLUMNS: &str = "id, user_id, original_url, title, author, description, folder, \
     saved_at, published_at, preview_content, added_to_following_by, \
     added_to_following_from, created_at, updated_at";

/// Ids of the rows an insert actually created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertResult {
    pub identifiers: Vec<String>,
}

fn item_from_row(row: &SqliteRow) -> Result<LibraryItem> {
    let id: String = row.get("id");
    let folder: String = row.get("folder");
    let published_at: Option<i64> = row.get("published_at");

    let folder = folder.parse::<Folder>().map_err(|reason| {
        tracing::warn!(item_id = %id, %reason, "library item has unknown folder");
        ServiceError::InvalidData {
            entity: "library item",
            id: id.clone(),
            reason,
        }
    })?;

    Ok(LibraryItem {
        id,
        user_id: row.get("user_id"),
        original_url: row.get("original_url"),
        title: row.get("title"),
        author: row.get("author"),
        description: row.get("description"),
        folder,
        saved_at: ts_to_datetime(row.get("saved_at")),
        published_at: published_at.map(ts_to_datetime),
        preview_content: row.get("preview_content"),
        added_to_following_by: row.get("added_to_following_by"),
        added_to_following_from: row.get("added_to_following_from"),
        created_at: ts_to_datetime(row.get("created_at")),
        updated_at: ts_to_datetime(row.get("updated_at")),
    })
}

/// Saves `url` to the user's inbox, or returns the item already saved
/// under that url.
pub async fn create_library_item(
    ctx: &AppContext,
    user_id: &str,
    url: &str,
    title: &str,
) -> Result<LibraryItem> {
    let owner = user_id.to_string();
    let url = url.to_string();
    let title = title.to_string();

    auth_trx(&ctx.pool, user_id, move |conn| {
        Box::pin(async move {
            let now = Utc::now().timestamp_millis();
            sqlx::query(
                r#"
                INSERT INTO library_items (id, user_id, original_url, title, folder, saved_at, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(user_id, original_url) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&owner)
            .bind(&url)
            .bind(&title)
            .bind(Folder::Inbox.as_str())
            .bind(now)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await?;

            let row = sqlx::query(&format!(
                "SELECT {} FROM library_items WHERE user_id = ? AND original_url = ?",
                ITEM_COLUMNS
            ))
            .bind(&owner)
            .bind(&url)
            .fetch_one(&mut *conn)
            .await?;

            item_from_row(&row)
        })
    })
    .await
}

/// Applies `update` to one of the user's items and returns the result.
///
/// Fields left `None` keep their stored value. Fails with
/// [`ServiceError::NotFound`] when no item with `id` belongs to the user.
pub async fn update_library_item(
    ctx: &AppContext,
    id: &str,
    update: LibraryItemUpdate,
    user_id: &str,
) -> Result<LibraryItem> {
    let id = id.to_string();
    let owner = user_id.to_string();

    auth_trx(&ctx.pool, user_id, move |conn| {
        Box::pin(async move {
            let result = sqlx::query(
                r#"
                UPDATE library_items
                SET saved_at = COALESCE(?, saved_at),
                    folder = COALESCE(?, folder),
                    updated_at = ?
                WHERE id = ? AND user_id = ?
                "#,
            )
            .bind(update.saved_at.map(|t| t.timestamp_millis()))
            .bind(update.folder.map(|f| f.as_str()))
            .bind(Utc::now().timestamp_millis())
            .bind(&id)
            .bind(&owner)
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() == 0 {
                return Err(ServiceError::not_found("library item", id.as_str()));
            }

            let row = sqlx::query(&format!(
                "SELECT {} FROM library_items WHERE id = ? AND user_id = ?",
                ITEM_COLUMNS
            ))
            .bind(&id)
            .bind(&owner)
            .fetch_one(&mut *conn)
            .await?;

            item_from_row(&row)
        })
    })
    .await
}

pub async fn find_library_item_by_id(
    ctx: &AppContext,
    id: &str,
    user_id: &str,
) -> Result<Option<LibraryItem>> {
    let id = id.to_string();
    let owner = user_id.to_string();

    auth_trx(&ctx.pool, user_id, move |conn| {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {} FROM library_items WHERE id = ? AND user_id = ?",
                ITEM_COLUMNS
            ))
            .bind(&id)
            .bind(&owner)
            .fetch_optional(&mut *conn)
            .await?;
            row.as_ref().map(item_from_row).transpose()
        })
    })
    .await
}

/// Lists the user's items, newest save first, optionally limited to one
/// folder.
pub async fn find_library_items(
    ctx: &AppContext,
    user_id: &str,
    folder: Option<Folder>,
) -> Result<Vec<LibraryItem>> {
    let owner = user_id.to_string();

    auth_trx(&ctx.pool, user_id, move |conn| {
        Box::pin(async move {
            let rows = sqlx::query(&format!(
                "SELECT {} FROM library_items
                 WHERE user_id = ? AND (? IS NULL OR folder = ?)
                 ORDER BY saved_at DESC, created_at DESC",
                ITEM_COLUMNS
            ))
            .bind(&owner)
            .bind(folder.map(|f| f.as_str()))
            .bind(folder.map(|f| f.as_str()))
            .fetch_all(&mut *conn)
            .await?;
            rows.iter().map(item_from_row).collect()
        })
    })
    .await
}

/// Inserts the feed entry into the following folder of every user in
/// `request.user_ids`.
///
/// Users who already have the url are skipped, so the returned identifiers
/// only cover rows created by this call. All inserts share one
/// transaction.
pub async fn save_feed_item_in_following(
    ctx: &AppContext,
    request: &SaveFollowingItemRequest,
) -> Result<InsertResult> {
    let now = Utc::now().timestamp_millis();
    let saved_at = request.saved_at.map(|t| t.timestamp_millis()).unwrap_or(now);
    let published_at = request.published_at.map(|t| t.timestamp_millis());
    let links_json = request
        .links
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let mut tx = ctx.pool.begin().await?;
    let mut identifiers = Vec::new();

    for user_id in &request.user_ids {
        let id = Uuid::new_v4().to_string();
        let result = sqlx::query(
            r#"
            INSERT INTO library_items (
                id, user_id, original_url, title, author, description, folder,
                saved_at, published_at, preview_content, preview_content_type, links_json,
                added_to_following_by, added_to_following_from, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, original_url) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&request.url)
        .bind(&request.title)
        .bind(&request.author)
        .bind(&request.description)
        .bind(Folder::Following.as_str())
        .bind(saved_at)
        .bind(published_at)
        .bind(&request.preview_content)
        .bind(&request.preview_content_type)
        .bind(&links_json)
        .bind(&request.added_to_following_by)
        .bind(&request.added_to_following_from)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            identifiers.push(id);
        } else {
            tracing::debug!(user_id = %user_id, url = %request.url, "item already saved");
        }
    }

    tx.commit().await?;
    Ok(InsertResult { identifiers })
}
