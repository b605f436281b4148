//! Authorized transaction wrapper.
//!
//! Every service operation runs its statements through [`auth_trx`], which
//! scopes one unit of work to one transaction on behalf of one user.

use futures::future::BoxFuture;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::Instrument;

use crate::error::Result;

/// Runs `work` inside a transaction opened for `uid`.
///
/// The transaction is opened with `BEGIN IMMEDIATE`, so units of work for
/// concurrent callers are serialized. It commits when `work` returns `Ok`
/// and rolls back when it returns `Err`; the error is then handed back to
/// the caller unchanged.
///
/// The closure receives the transaction's connection and must return a
/// boxed future borrowing it, so values it needs are moved in:
///
/// ```rust,no_run
/// # use readlater::repository::auth_trx;
/// # async fn example(pool: &sqlx::SqlitePool) -> readlater::error::Result<()> {
/// let owner = "user-1".to_string();
/// let count: i64 = auth_trx(pool, "user-1", move |conn| {
///     Box::pin(async move {
///         let n = sqlx::query_scalar("SELECT COUNT(*) FROM rules WHERE user_id = ?")
///             .bind(&owner)
///             .fetch_one(&mut *conn)
///             .await?;
///         Ok(n)
///     })
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn auth_trx<T, F>(pool: &SqlitePool, uid: &str, work: F) -> Result<T>
where
    T: Send,
    F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T>>,
{
    let span = tracing::debug_span!("auth_trx", uid = %uid);

    async move {
        // IMMEDIATE takes the write lock up front, so a read-then-write unit
        // waits out the busy timeout instead of failing on lock upgrade.
        let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;

        match work(&mut *tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                tracing::debug!(error = %err, "rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE t (v INTEGER NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    async fn count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM t")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_commits_on_success() {
        let pool = memory_pool().await;

        let out = auth_trx(&pool, "u1", |conn| {
            Box::pin(async move {
                sqlx::query("INSERT INTO t (v) VALUES (1)")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("INSERT INTO t (v) VALUES (2)")
                    .execute(&mut *conn)
                    .await?;
                Ok("done")
            })
        })
        .await
        .unwrap();

        assert_eq!(out, "done");
        assert_eq!(count(&pool).await, 2);
    }

    #[tokio::test]
    async fn test_rolls_back_on_error() {
        let pool = memory_pool().await;

        let result: Result<()> = auth_trx(&pool, "u1", |conn| {
            Box::pin(async move {
                sqlx::query("INSERT INTO t (v) VALUES (1)")
                    .execute(&mut *conn)
                    .await?;
                Err(ServiceError::not_found("thing", "x"))
            })
        })
        .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(count(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_statement_failure_rolls_back_earlier_writes() {
        let pool = memory_pool().await;

        let result: Result<()> = auth_trx(&pool, "u1", |conn| {
            Box::pin(async move {
                sqlx::query("INSERT INTO t (v) VALUES (1)")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("INSERT INTO t (v) VALUES (NULL)")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .await;

        assert!(matches!(result, Err(ServiceError::Database(_))));
        assert_eq!(count(&pool).await, 0);
    }
}
