use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Create users table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            username TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create rules table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rules (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            name_key TEXT NOT NULL,
            description TEXT,
            actions_json TEXT NOT NULL DEFAULT '[]',
            filter TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create device tokens table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_device_tokens (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            token TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create library items table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS library_items (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            original_url TEXT NOT NULL,
            title TEXT NOT NULL,
            author TEXT,
            description TEXT,
            folder TEXT NOT NULL DEFAULT 'inbox',
            saved_at INTEGER NOT NULL,
            published_at INTEGER,
            preview_content TEXT,
            preview_content_type TEXT,
            links_json TEXT,
            added_to_following_by TEXT,
            added_to_following_from TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(user_id, original_url),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Rule names are unique per owner, compared by their lowercased key
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_rules_user_name_key ON rules(user_id, name_key)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_device_tokens_user_id ON user_device_tokens(user_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_library_items_user_folder ON library_items(user_id, folder)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
