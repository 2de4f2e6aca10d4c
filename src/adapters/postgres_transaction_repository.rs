//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashSet;

use crate::domain::{NewTransaction, StatusUpdate, Transaction, TransactionStatus, TransactionType};
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository};

const COLUMNS: &str = "id, amount, type, status, gateway_id, country_id, user_id, created_at, updated_at";

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn insert(&self, tx: &NewTransaction) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transactions (amount, type, status, gateway_id, country_id, user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&tx.amount)
        .bind(tx.transaction_type.as_str())
        .bind(tx.status.as_str())
        .bind(tx.gateway_id)
        .bind(tx.country_id)
        .bind(tx.user_id)
        .bind(tx.created_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn get_by_id(&self, id: i64) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?
            .into_domain()
    }

    async fn update_status(&self, id: i64, status: TransactionStatus) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "UPDATE transactions SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("transaction {}", id)))?
            .into_domain()
    }

    async fn update_bulk(&self, updates: &[StatusUpdate]) -> RepositoryResult<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let ids: Vec<i64> = updates.iter().map(|u| u.id).collect();
        let statuses: Vec<String> = updates.iter().map(|u| u.status.as_str().to_string()).collect();
        let expected = ids.iter().collect::<HashSet<_>>().len();

        let mut db_tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE transactions AS t
            SET status = v.status, updated_at = NOW()
            FROM UNNEST($1::bigint[], $2::text[]) AS v(id, status)
            WHERE t.id = v.id
            "#,
        )
        .bind(&ids)
        .bind(&statuses)
        .execute(&mut *db_tx)
        .await?;

        let matched = result.rows_affected() as usize;
        if matched != expected {
            db_tx.rollback().await?;
            return Err(RepositoryError::PartialUpdate { expected, matched });
        }

        db_tx.commit().await?;
        Ok(())
    }

    async fn list_by_status(&self, status: TransactionStatus, limit: i64) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {COLUMNS} FROM transactions WHERE status = $1 ORDER BY updated_at ASC LIMIT $2"
        ))
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    amount: BigDecimal,
    #[sqlx(rename = "type")]
    transaction_type: String,
    status: String,
    gateway_id: i64,
    country_id: i64,
    user_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        Ok(Transaction {
            id: self.id,
            amount: self.amount,
            transaction_type: self
                .transaction_type
                .parse::<TransactionType>()
                .map_err(RepositoryError::InvalidData)?,
            status: self
                .status
                .parse::<TransactionStatus>()
                .map_err(RepositoryError::InvalidData)?,
            gateway_id: self.gateway_id,
            country_id: self.country_id,
            user_id: self.user_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
