use sqlx::{PgPool, Postgres, Transaction};
use tessera_core::{AppError, FolderShard};

/// Advisory lock key held for the rest of a transaction while it allocates a shard.
const SHARD_ALLOCATION_LOCK: i64 = 0x7465_7373_6572_61;

/// Repository for the `shards` table
#[derive(Clone)]
pub struct ShardRepository {
    pool: PgPool,
}

impl ShardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Take the allocation lock and return the newest shard, row-locked.
    ///
    /// The advisory lock also covers the empty-table case, where there is no row to lock,
    /// so concurrent uploads cannot both decide to create the same next shard.
    #[tracing::instrument(skip(self, tx), fields(db.table = "shards", db.operation = "select"))]
    pub async fn lock_latest_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Option<FolderShard>, AppError> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SHARD_ALLOCATION_LOCK)
            .execute(&mut **tx)
            .await?;

        let shard = sqlx::query_as::<Postgres, FolderShard>(
            r#"
            SELECT id, image_count, total_size, created_at
            FROM shards
            ORDER BY id DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .fetch_optional(&mut **tx)
        .await?;

        Ok(shard)
    }

    #[tracing::instrument(skip(self, tx), fields(db.table = "shards", db.operation = "insert"))]
    pub async fn create_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<FolderShard, AppError> {
        let shard = sqlx::query_as::<Postgres, FolderShard>(
            r#"
            INSERT INTO shards DEFAULT VALUES
            RETURNING id, image_count, total_size, created_at
            "#,
        )
        .fetch_one(&mut **tx)
        .await?;

        Ok(shard)
    }

    /// Count one more default image of `bytes` bytes against the shard.
    #[tracing::instrument(skip(self, tx), fields(db.table = "shards", db.operation = "update", db.record_id = shard_id))]
    pub async fn record_usage_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        shard_id: i32,
        bytes: i64,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE shards
            SET image_count = image_count + 1, total_size = total_size + $2
            WHERE id = $1
            "#,
        )
        .bind(shard_id)
        .bind(bytes)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Internal(format!("Shard {} does not exist", shard_id)));
        }
        Ok(())
    }

    /// All shards in allocation order
    #[tracing::instrument(skip(self), fields(db.table = "shards", db.operation = "select"))]
    pub async fn list(&self) -> Result<Vec<FolderShard>, AppError> {
        let shards = sqlx::query_as::<Postgres, FolderShard>(
            "SELECT id, image_count, total_size, created_at FROM shards ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(shards)
    }
}
