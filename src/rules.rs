//! Rule service.
//!
//! Rules are owned by a user and identified to that user by name, compared
//! case-insensitively through a stored lowercase `name_key`. Creation is
//! find-or-create: asking for a rule whose name already exists returns the
//! stored rule untouched.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::{Result, ServiceError};
use crate::models::{ts_to_datetime, DeleteResult, NewRule, Rule};
use crate::repository::auth_trx;

const RULE_COLUMNS: &str =
    "id, user_id, name, description, actions_json, filter, enabled, created_at, updated_at";

fn rule_from_row(row: &SqliteRow) -> Result<Rule> {
    let actions_json: String = row.get("actions_json");
    let enabled: i64 = row.get("enabled");

    Ok(Rule {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        description: row.get("description"),
        actions: serde_json::from_str(&actions_json)?,
        filter: row.get("filter"),
        enabled: enabled != 0,
        created_at: ts_to_datetime(row.get("created_at")),
        updated_at: ts_to_datetime(row.get("updated_at")),
    })
}

/// Lookup key for a rule name. Folds non-ASCII letters too.
pub(crate) fn rule_name_key(name: &str) -> String {
    name.to_lowercase()
}

async fn find_rule_by_name(
    conn: &mut SqliteConnection,
    user_id: &str,
    name: &str,
) -> Result<Option<Rule>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM rules WHERE user_id = ? AND name_key = ?",
        RULE_COLUMNS
    ))
    .bind(user_id)
    .bind(rule_name_key(name))
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(rule_from_row).transpose()
}

async fn find_rule_by_id(
    conn: &mut SqliteConnection,
    id: &str,
    user_id: &str,
) -> Result<Option<Rule>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM rules WHERE id = ? AND user_id = ?",
        RULE_COLUMNS
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(rule_from_row).transpose()
}

/// Returns the rule named `rule.name` for `user_id`, creating it if absent.
///
/// An existing rule is returned as stored, even when the other fields of
/// `rule` differ.
pub async fn create_rule(ctx: &AppContext, user_id: &str, rule: NewRule) -> Result<Rule> {
    let owner = user_id.to_string();

    auth_trx(&ctx.pool, user_id, move |conn| {
        Box::pin(async move {
            if let Some(existing) = find_rule_by_name(conn, &owner, &rule.name).await? {
                tracing::debug!(rule_id = %existing.id, "rule already exists");
                return Ok(existing);
            }

            let id = Uuid::new_v4().to_string();
            let now = Utc::now().timestamp_millis();
            let actions_json = serde_json::to_string(&rule.actions)?;

            sqlx::query(
                r#"
                INSERT INTO rules (id, user_id, name, name_key, description, actions_json, filter, enabled, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(&owner)
            .bind(&rule.name)
            .bind(rule_name_key(&rule.name))
            .bind(&rule.description)
            .bind(&actions_json)
            .bind(&rule.filter)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await?;

            Ok(Rule {
                id,
                user_id: owner,
                name: rule.name,
                description: rule.description,
                actions: rule.actions,
                filter: rule.filter,
                enabled: true,
                created_at: ts_to_datetime(now),
                updated_at: ts_to_datetime(now),
            })
        })
    })
    .await
}

/// Deletes one rule and returns it as it was before deletion.
///
/// Fails with [`ServiceError::NotFound`] when the rule does not exist or
/// belongs to someone else.
pub async fn delete_rule(ctx: &AppContext, id: &str, user_id: &str) -> Result<Rule> {
    let id = id.to_string();
    let owner = user_id.to_string();

    auth_trx(&ctx.pool, user_id, move |conn| {
        Box::pin(async move {
            let rule = find_rule_by_id(conn, &id, &owner)
                .await?
                .ok_or_else(|| ServiceError::not_found("rule", id.as_str()))?;

            sqlx::query("DELETE FROM rules WHERE id = ? AND user_id = ?")
                .bind(&id)
                .bind(&owner)
                .execute(&mut *conn)
                .await?;

            Ok(rule)
        })
    })
    .await
}

/// Deletes every rule owned by `user_id`.
pub async fn delete_rules(ctx: &AppContext, user_id: &str) -> Result<DeleteResult> {
    let owner = user_id.to_string();

    auth_trx(&ctx.pool, user_id, move |conn| {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM rules WHERE user_id = ?")
                .bind(&owner)
                .execute(&mut *conn)
                .await?;

            Ok(DeleteResult {
                affected: result.rows_affected(),
            })
        })
    })
    .await
}

pub async fn find_rules(ctx: &AppContext, user_id: &str) -> Result<Vec<Rule>> {
    let owner = user_id.to_string();

    auth_trx(&ctx.pool, user_id, move |conn| {
        Box::pin(async move {
            let rows = sqlx::query(&format!(
                "SELECT {} FROM rules WHERE user_id = ? ORDER BY name_key ASC",
                RULE_COLUMNS
            ))
            .bind(&owner)
            .fetch_all(&mut *conn)
            .await?;

            rows.iter().map(rule_from_row).collect()
        })
    })
    .await
}
