//! Postgres implementation of PaymentStore.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{PaymentRecord, PaymentStatus};
use crate::ports::{
    AggregateQuery, GroupKey, GroupRow, GroupSpec, PaymentStore, StatusUpdate, StoreError,
    StoreResult,
};

const RECORD_COLUMNS: &str = "id, tenant_id, amount, currency, method, status, merchant_id, \
     customer_id, description, metadata, created_at, updated_at";

/// Postgres-backed payment store.
#[derive(Clone)]
pub struct PostgresPaymentStore {
    pool: PgPool,
}

impl PostgresPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Builds the grouped aggregate statement. Bind order: tenant, start, end.
fn aggregate_sql(group: GroupSpec) -> String {
    let (key_columns, group_by) = match group {
        GroupSpec::Status => (
            "NULL::TEXT AS method, NULL::INT4 AS hour, NULL::TIMESTAMPTZ AS bucket, status".to_string(),
            "GROUP BY 4".to_string(),
        ),
        GroupSpec::Method => (
            "method, NULL::INT4 AS hour, NULL::TIMESTAMPTZ AS bucket, NULL::TEXT AS status"
                .to_string(),
            "GROUP BY 1".to_string(),
        ),
        GroupSpec::HourOfDay => (
            "NULL::TEXT AS method, EXTRACT(HOUR FROM created_at AT TIME ZONE 'UTC')::INT4 AS hour, \
             NULL::TIMESTAMPTZ AS bucket, NULL::TEXT AS status"
                .to_string(),
            "GROUP BY 2".to_string(),
        ),
        GroupSpec::Bucket(period) => (
            format!(
                "NULL::TEXT AS method, NULL::INT4 AS hour, \
                 date_trunc('{}', created_at AT TIME ZONE 'UTC') AT TIME ZONE 'UTC' AS bucket, \
                 NULL::TEXT AS status",
                period.as_str()
            ),
            "GROUP BY 3".to_string(),
        ),
    };

    format!(
        r#"
        SELECT {key_columns},
               COUNT(*) AS count,
               COALESCE(SUM(amount), 0) AS amount,
               COUNT(*) FILTER (WHERE status = 'completed') AS completed_count
        FROM payments
        WHERE tenant_id = $1
          AND created_at >= $2
          AND created_at <= $3
        {group_by}
        HAVING COUNT(*) > 0
        ORDER BY 1, 2, 3, 4
        "#
    )
}

#[async_trait]
impl PaymentStore for PostgresPaymentStore {
    async fn insert(&self, record: &PaymentRecord) -> StoreResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO payments (
                id, tenant_id, amount, currency, method, status, merchant_id,
                customer_id, description, metadata, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(record.id)
        .bind(&record.tenant_id)
        .bind(&record.amount)
        .bind(&record.currency)
        .bind(record.method.as_str())
        .bind(record.status.as_str())
        .bind(&record.merchant_id)
        .bind(&record.customer_id)
        .bind(&record.description)
        .bind(&record.metadata)
        .bind(record.created_at)
        .bind(record.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn query_aggregate(&self, query: &AggregateQuery) -> StoreResult<Vec<GroupRow>> {
        let sql = aggregate_sql(query.group);
        let rows = sqlx::query_as::<_, AggregateRow>(&sql)
            .bind(&query.tenant_id)
            .bind(query.range.start)
            .bind(query.range.end)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| row.into_group_row(query.group))
            .collect()
    }

    async fn list_recent(&self, tenant_id: &str, limit: i64) -> StoreResult<Vec<PaymentRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM payments WHERE tenant_id = $1 \
             ORDER BY created_at DESC LIMIT $2"
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(tenant_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(PaymentRow::into_domain).collect()
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Option<PaymentRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM payments WHERE id = $1");
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(PaymentRow::into_domain).transpose()
    }

    async fn update_status(&self, id: Uuid, status: PaymentStatus) -> StoreResult<StatusUpdate> {
        // The row lock makes a concurrent identical update re-check `status <> $1` and match nothing.
        let sql = format!(
            "UPDATE payments SET status = $1, updated_at = NOW() WHERE id = $2 AND status <> $1 \
             RETURNING {RECORD_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(status.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            return Ok(StatusUpdate::Changed(row.into_domain()?));
        }
        Ok(match self.get_by_id(id).await? {
            Some(record) => StatusUpdate::Unchanged(record),
            None => StatusUpdate::NotFound,
        })
    }

    async fn clear(&self) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM payments")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Internal row types for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    tenant_id: String,
    amount: BigDecimal,
    currency: String,
    method: String,
    status: String,
    merchant_id: String,
    customer_id: String,
    description: Option<String>,
    metadata: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_domain(self) -> StoreResult<PaymentRecord> {
        Ok(PaymentRecord {
            id: self.id,
            tenant_id: self.tenant_id,
            amount: self.amount,
            currency: self.currency,
            method: self.method.parse().map_err(StoreError::Corrupt)?,
            status: self.status.parse().map_err(StoreError::Corrupt)?,
            merchant_id: self.merchant_id,
            customer_id: self.customer_id,
            description: self.description,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AggregateRow {
    method: Option<String>,
    hour: Option<i32>,
    bucket: Option<DateTime<Utc>>,
    status: Option<String>,
    count: i64,
    amount: BigDecimal,
    completed_count: i64,
}

impl AggregateRow {
    fn into_group_row(self, group: GroupSpec) -> StoreResult<GroupRow> {
        let key = match group {
            GroupSpec::Status => {
                let status = self
                    .status
                    .ok_or_else(|| StoreError::Corrupt("missing status group".to_string()))?;
                GroupKey::Status(status.parse().map_err(StoreError::Corrupt)?)
            }
            GroupSpec::Method => {
                let method = self
                    .method
                    .ok_or_else(|| StoreError::Corrupt("missing method group".to_string()))?;
                GroupKey::Method(method.parse().map_err(StoreError::Corrupt)?)
            }
            GroupSpec::HourOfDay => {
                let hour = self
                    .hour
                    .ok_or_else(|| StoreError::Corrupt("missing hour group".to_string()))?;
                GroupKey::Hour(hour as u32)
            }
            GroupSpec::Bucket(_) => GroupKey::Bucket(
                self.bucket
                    .ok_or_else(|| StoreError::Corrupt("missing bucket group".to_string()))?,
            ),
        };

        Ok(GroupRow {
            key,
            count: self.count as u64,
            amount: self.amount,
            completed_count: self.completed_count as u64,
        })
    }
}
