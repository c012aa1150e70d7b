//! Database transaction utilities

use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres, Transaction};
use tessera_core::AppError;

/// A database transaction that must be finished with [`commit`](Self::commit) or
/// [`rollback`](Self::rollback).
///
/// Dropping an unfinished guard drops the inner sqlx transaction, which rolls it back
/// when the connection is returned to the pool.
///
/// # Example
///
/// ```ignore
/// use tessera_db::db::transaction::TransactionGuard;
///
/// async fn example(pool: &sqlx::PgPool) -> anyhow::Result<()> {
///     let mut guard = TransactionGuard::begin(pool).await?;
///     let tx = guard.as_mut()?;
///     sqlx::query("UPDATE shards SET ...").execute(&mut **tx).await?;
///     guard.commit().await?;
///     Ok(())
/// }
/// ```
pub struct TransactionGuard {
    transaction: Option<Transaction<'static, Postgres>>,
}

impl TransactionGuard {
    /// Begin a new database transaction
    pub async fn begin(pool: &PgPool) -> Result<Self> {
        let transaction = pool
            .begin()
            .await
            .context("Failed to begin database transaction")?;

        Ok(Self {
            transaction: Some(transaction),
        })
    }

    /// Commit the transaction
    pub async fn commit(mut self) -> Result<()> {
        if let Some(tx) = self.transaction.take() {
            tx.commit()
                .await
                .context("Failed to commit database transaction")?;
        }
        Ok(())
    }

    /// Rollback the transaction
    pub async fn rollback(mut self) -> Result<()> {
        if let Some(tx) = self.transaction.take() {
            tx.rollback()
                .await
                .context("Failed to rollback database transaction")?;
        }
        Ok(())
    }

    /// The underlying transaction, for repository `_tx` methods.
    pub fn as_mut(&mut self) -> Result<&mut Transaction<'static, Postgres>, AppError> {
        self.transaction.as_mut().ok_or_else(|| {
            AppError::Internal("Transaction was already committed or rolled back".to_string())
        })
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        if self.transaction.is_some() {
            tracing::warn!(
                "Transaction was dropped without explicit commit or rollback - rolling back"
            );
        }
    }
}
