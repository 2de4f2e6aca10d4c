use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::Gateway;
use crate::ports::{GatewayRepository, RepositoryResult};

#[derive(Clone)]
pub struct PostgresGatewayRepository {
    pool: PgPool,
}

impl PostgresGatewayRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GatewayRepository for PostgresGatewayRepository {
    async fn find_by_country_and_currency(&self, country_id: i64, currency: &str) -> RepositoryResult<Vec<Gateway>> {
        let rows = sqlx::query_as::<_, GatewayRow>(
            r#"
            SELECT g.id, g.name, g.data_format_supported, g.created_at, g.updated_at
            FROM gateways g
            JOIN gateway_countries gc ON g.id = gc.gateway_id
            JOIN countries c ON c.id = gc.country_id
            WHERE gc.country_id = $1 AND UPPER(c.currency) = UPPER($2)
            ORDER BY g.created_at DESC, g.id DESC
            "#,
        )
        .bind(country_id)
        .bind(currency)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Gateway::from).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GatewayRow {
    id: i64,
    name: String,
    data_format_supported: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GatewayRow> for Gateway {
    fn from(row: GatewayRow) -> Self {
        Gateway {
            id: row.id,
            name: row.name,
            data_format_supported: row.data_format_supported,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
