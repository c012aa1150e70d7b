use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tessera_core::{AppError, ImageId, ImageRecord, ImageType, ImageVariant, Rgb};

const IMAGE_COLUMNS: &str = "id, shard_id, image_type, width, height, max_width, max_height, \
     size, uploaded_size, average_color, copies, created_at, deleted, deleted_at";

/// Raw `images` row; dimensions are stored as INTEGER.
#[derive(Debug, FromRow)]
struct ImageRow {
    id: ImageId,
    shard_id: i32,
    image_type: ImageType,
    width: i32,
    height: i32,
    max_width: i32,
    max_height: i32,
    size: i64,
    uploaded_size: i64,
    average_color: Json<Rgb>,
    copies: Json<Vec<ImageVariant>>,
    created_at: DateTime<Utc>,
    deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
}

fn to_u32(column: &str, value: i32) -> Result<u32, AppError> {
    u32::try_from(value)
        .map_err(|_| AppError::Internal(format!("Negative {} stored: {}", column, value)))
}

fn to_i32(column: &str, value: u32) -> Result<i32, AppError> {
    i32::try_from(value)
        .map_err(|_| AppError::InvalidInput(format!("{} out of range: {}", column, value)))
}

impl TryFrom<ImageRow> for ImageRecord {
    type Error = AppError;

    fn try_from(row: ImageRow) -> Result<Self, Self::Error> {
        Ok(ImageRecord {
            id: row.id,
            shard_id: row.shard_id,
            image_type: row.image_type,
            width: to_u32("width", row.width)?,
            height: to_u32("height", row.height)?,
            max_width: to_u32("max_width", row.max_width)?,
            max_height: to_u32("max_height", row.max_height)?,
            size: row.size,
            uploaded_size: row.uploaded_size,
            average_color: row.average_color.0,
            copies: row.copies.0,
            created_at: row.created_at,
            deleted: row.deleted,
            deleted_at: row.deleted_at,
            url: None,
            urls: None,
        })
    }
}

/// Repository for the `images` table
#[derive(Clone)]
pub struct ImageRepository {
    pool: PgPool,
}

impl ImageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch an image by id, including soft-deleted ones.
    #[tracing::instrument(skip(self), fields(db.table = "images", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: ImageId) -> Result<Option<ImageRecord>, AppError> {
        let row = sqlx::query_as::<Postgres, ImageRow>(&format!(
            "SELECT {} FROM images WHERE id = $1",
            IMAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ImageRecord::try_from).transpose()
    }

    #[tracing::instrument(skip(self, tx, image), fields(db.table = "images", db.operation = "insert", db.record_id = %image.id))]
    pub async fn insert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        image: &ImageRecord,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO images (
                id, shard_id, image_type, width, height, max_width, max_height,
                size, uploaded_size, average_color, copies, created_at, deleted, deleted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(image.id)
        .bind(image.shard_id)
        .bind(image.image_type)
        .bind(to_i32("width", image.width)?)
        .bind(to_i32("height", image.height)?)
        .bind(to_i32("maxWidth", image.max_width)?)
        .bind(to_i32("maxHeight", image.max_height)?)
        .bind(image.size)
        .bind(image.uploaded_size)
        .bind(Json(image.average_color))
        .bind(Json(&image.copies))
        .bind(image.created_at)
        .bind(image.deleted)
        .bind(image.deleted_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Flag a live image as deleted. Returns `false` if it was missing or already deleted.
    #[tracing::instrument(skip(self, tx), fields(db.table = "images", db.operation = "update", db.record_id = %id))]
    pub async fn mark_deleted_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: ImageId,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE images SET deleted = TRUE, deleted_at = $2 WHERE id = $1 AND deleted = FALSE",
        )
        .bind(id)
        .bind(at)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
