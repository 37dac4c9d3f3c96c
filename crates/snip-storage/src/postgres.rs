use async_trait::async_trait;
use snip_core::error::{Result, StorageError};
use snip_core::{BatchItem, ReadRepository, Repository, ShortCode, Stats, UrlRecord};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Connection, PgPool, Row};
use tracing::{debug, info, trace};

/// Schema applied by [`PostgresRepository::connect`].
pub const SCHEMA: &str = include_str!("../ddl/postgres/urls.sql");

const SHORT_URL_CONSTRAINT: &str = "urls_short_url_key";
const MAX_CONNECTIONS: u32 = 10;

/// Postgres implementation of the repository contract.
///
/// Soft delete is implemented with `is_deleted`. Rows are never removed.
/// `origin_url` is unique, which is what makes [`Repository::set`]
/// idempotent: the insert is `ON CONFLICT (origin_url) DO NOTHING`, and a
/// no-op insert is followed by a read of the existing row.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a repository from an existing Postgres connection pool.
    ///
    /// The schema is not touched; see [`PostgresRepository::ensure_schema`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool, pings the server and creates the `urls` table if needed.
    ///
    /// Any failure here is fatal to construction.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;

        let repository = Self::new(pool);
        repository.ping().await?;
        repository.ensure_schema().await?;

        info!("database connection established");
        Ok(repository)
    }

    /// Creates the `urls` table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find_by_url(&self, original_url: &str) -> Result<UrlRecord> {
        let row = sqlx::query(
            r#"
            SELECT id, short_url, origin_url, user_id, is_deleted
            FROM urls
            WHERE origin_url = $1
            "#,
        )
        .bind(original_url)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row_to_record(&row)
    }
}

fn row_to_record(row: &PgRow) -> Result<UrlRecord> {
    let id: i32 = row.try_get("id").map_err(map_sqlx_error)?;
    let short_url: String = row.try_get("short_url").map_err(map_sqlx_error)?;
    let original_url: String = row.try_get("origin_url").map_err(map_sqlx_error)?;
    let owner_id: String = row.try_get("user_id").map_err(map_sqlx_error)?;
    let deleted: bool = row.try_get("is_deleted").map_err(map_sqlx_error)?;

    Ok(UrlRecord {
        id: id.to_string(),
        short_code: ShortCode::new_unchecked(short_url),
        original_url,
        owner_id,
        deleted,
    })
}

fn count(value: i64) -> Result<u64> {
    u64::try_from(value)
        .map_err(|e| StorageError::InvalidData(format!("invalid count '{value}': {e}")))
}

/// Name of the unique constraint `err` violated, if it is a unique violation.
fn violated_unique_constraint(err: &sqlx::Error) -> Option<String> {
    let db_err = err.as_database_error()?;
    if !db_err.is_unique_violation() {
        return None;
    }
    Some(db_err.constraint().unwrap_or_default().to_owned())
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Configuration(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl ReadRepository for PostgresRepository {
    async fn get(&self, code: &ShortCode) -> Result<String> {
        let row = sqlx::query(
            r#"
            SELECT origin_url, is_deleted
            FROM urls
            WHERE short_url = $1
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            trace!(code = %code, "short code not found");
            return Err(StorageError::NotFound(code.to_string()));
        };

        let original_url: String = row.try_get("origin_url").map_err(map_sqlx_error)?;
        let deleted: bool = row.try_get("is_deleted").map_err(map_sqlx_error)?;

        if deleted {
            debug!(code = %code, "short code was deleted");
            return Err(StorageError::Gone(code.to_string()));
        }

        Ok(original_url)
    }

    async fn get_by_owner(&self, owner_id: &str) -> Result<Vec<UrlRecord>> {
        if owner_id.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT id, short_url, origin_url, user_id, is_deleted
            FROM urls
            WHERE user_id = $1
              AND is_deleted = FALSE
            ORDER BY id
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(row_to_record).collect()
    }

    async fn stats(&self) -> Result<Stats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS urls, COUNT(DISTINCT user_id) AS owners
            FROM urls
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let urls: i64 = row.try_get("urls").map_err(map_sqlx_error)?;
        let owners: i64 = row.try_get("owners").map_err(map_sqlx_error)?;

        Ok(Stats {
            urls: count(urls)?,
            owners: count(owners)?,
        })
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        conn.ping().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn set(&self, original_url: &str, owner_id: &str) -> Result<UrlRecord> {
        let record = UrlRecord::new(String::new(), original_url, owner_id);

        let inserted = sqlx::query(
            r#"
            INSERT INTO urls (origin_url, short_url, user_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (origin_url) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&record.original_url)
        .bind(record.short_code.as_str())
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await;

        match inserted {
            Ok(Some(row)) => {
                let id: i32 = row.try_get("id").map_err(map_sqlx_error)?;
                debug!(code = %record.short_code, owner = %owner_id, "stored url");
                Ok(UrlRecord {
                    id: id.to_string(),
                    ..record
                })
            }
            Ok(None) => {
                let existing = self.find_by_url(original_url).await?;
                debug!(code = %existing.short_code, "original url already exists");
                Err(StorageError::Conflict(Box::new(existing)))
            }
            Err(err) if violated_unique_constraint(&err).is_some() => {
                Err(StorageError::CodeCollision(record.short_code.to_string()))
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn set_batch(&self, items: &[BatchItem], owner_id: &str) -> Result<Vec<UrlRecord>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut records = Vec::with_capacity(items.len());

        for item in items {
            let record = UrlRecord::new(
                item.correlation_id.clone(),
                item.original_url.clone(),
                owner_id,
            );

            let result = sqlx::query(
                r#"
                INSERT INTO urls (origin_url, short_url, user_id)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(&record.original_url)
            .bind(record.short_code.as_str())
            .bind(owner_id)
            .execute(&mut *tx)
            .await;

            if let Err(err) = result {
                // Dropping `tx` rolls the whole batch back.
                return Err(match violated_unique_constraint(&err) {
                    Some(constraint) if constraint == SHORT_URL_CONSTRAINT => {
                        StorageError::CodeCollision(record.short_code.to_string())
                    }
                    Some(_) => StorageError::DuplicateUrl(record.original_url),
                    None => map_sqlx_error(err),
                });
            }

            records.push(record);
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        debug!(count = records.len(), owner = %owner_id, "stored url batch");
        Ok(records)
    }

    async fn batch_delete(&self, owner_id: &str, codes: &[ShortCode]) -> Result<()> {
        if owner_id.is_empty() || codes.is_empty() {
            return Ok(());
        }

        let codes: Vec<String> = codes.iter().map(ToString::to_string).collect();

        let result = sqlx::query(
            r#"
            UPDATE urls
            SET is_deleted = TRUE
            WHERE short_url = ANY($1)
              AND user_id = $2
              AND is_deleted = FALSE
            "#,
        )
        .bind(&codes)
        .bind(owner_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(
            requested = codes.len(),
            deleted = result.rows_affected(),
            owner = %owner_id,
            "soft-deleted urls"
        );
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("database connection closed");
    }
}
