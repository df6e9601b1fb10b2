use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
pub use sqlx::Error;
use sqlx::{query, query_as};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, Error> {
        sqlx::migrate!().run(&pool).await?;
        Ok(Self { pool })
    }

    // Record one successful lookup
    pub async fn append_query(
        &self,
        user_id: i64,
        product_id: &str,
        time_of_query: DateTime<Utc>,
    ) -> Result<i64, Error> {
        query(
            "INSERT INTO query_history (user_id, product_id, time_of_query)
            VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(time_of_query)
        .execute(&self.pool)
        .await
        .map(|r| r.last_insert_rowid())
    }

    /// The `limit` most recent lookups, newest first.
    pub async fn recent_queries(&self, limit: u32) -> Result<Vec<QueryRecord>, Error> {
        query_as(
            "SELECT id, user_id, product_id, time_of_query FROM query_history
            ORDER BY time_of_query DESC, id DESC
            LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueryRecord {
    pub id: i64,
    pub user_id: i64,
    pub product_id: String,
    pub time_of_query: DateTime<Utc>,
}
