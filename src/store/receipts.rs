use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use tracing::info;

use crate::agents::types::TradeSide;
use crate::error::CycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Success,
    TestSuccess,
    Failed,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Success => "success",
            ReceiptStatus::TestSuccess => "test_success",
            ReceiptStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(ReceiptStatus::Success),
            "test_success" => Some(ReceiptStatus::TestSuccess),
            "failed" => Some(ReceiptStatus::Failed),
            _ => None,
        }
    }
}

/// Durable record of one executed (or rejected) order. Immutable once
/// committed; `order_id` is the primary key against double-insertion.
///
/// Money fields are decimals, not floats - the store is the one place where
/// rounding drift would compound.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub order_id: String,
    pub status: ReceiptStatus,
    pub asset: String,
    pub side: TradeSide,
    pub executed_price: Decimal,
    pub executed_quantity: Decimal,
    pub amount_usd: Decimal,
    pub timestamp: DateTime<Utc>,
    pub raw_response: serde_json::Value,
}

/// Append-only log of receipts over SQLite. One transaction per write; no
/// multi-row atomicity.
#[derive(Clone)]
pub struct ReceiptStore {
    pool: Pool<Sqlite>,
}

impl ReceiptStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| anyhow::anyhow!("receipt store connect failed: {}", e))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| anyhow::anyhow!("receipt store migration failed: {}", e))?;

        info!("💾 Receipt store ready at {}", database_url);
        Ok(Self { pool })
    }

    pub async fn insert(&self, receipt: &Receipt) -> Result<i64, CycleError> {
        let row = sqlx::query(
            r#"
            INSERT INTO trades (order_id, status, asset, side, executed_price, executed_quantity, amount_usd, timestamp, raw_response)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&receipt.order_id)
        .bind(receipt.status.as_str())
        .bind(&receipt.asset)
        .bind(receipt.side.as_str())
        .bind(receipt.executed_price.to_string())
        .bind(receipt.executed_quantity.to_string())
        .bind(receipt.amount_usd.to_string())
        .bind(receipt.timestamp)
        .bind(receipt.raw_response.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            CycleError::Persistence(format!("insert of order {} failed: {}", receipt.order_id, e))
        })?;

        let id: i64 = row.get("id");
        Ok(id)
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<Receipt>, CycleError> {
        let rows = sqlx::query("SELECT * FROM trades ORDER BY id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CycleError::Persistence(format!("receipt query failed: {}", e)))?;

        rows.iter().map(row_to_receipt).collect()
    }

    pub async fn for_asset(&self, asset: &str, limit: i64) -> Result<Vec<Receipt>, CycleError> {
        let rows = sqlx::query("SELECT * FROM trades WHERE asset = ? ORDER BY id DESC LIMIT ?")
            .bind(asset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CycleError::Persistence(format!("receipt query failed: {}", e)))?;

        rows.iter().map(row_to_receipt).collect()
    }
}

fn row_to_receipt(row: &SqliteRow) -> Result<Receipt, CycleError> {
    let status_raw: String = row.get("status");
    let status = ReceiptStatus::parse(&status_raw)
        .ok_or_else(|| CycleError::Persistence(format!("unknown receipt status {:?}", status_raw)))?;

    let side_raw: String = row.get("side");
    let side = match side_raw.as_str() {
        "buy" => TradeSide::Buy,
        "sell" => TradeSide::Sell,
        other => {
            return Err(CycleError::Persistence(format!(
                "unknown receipt side {:?}",
                other
            )))
        }
    };

    let decimal = |column: &str| -> Result<Decimal, CycleError> {
        let raw: String = row.get(column);
        Decimal::from_str(&raw)
            .map_err(|e| CycleError::Persistence(format!("bad decimal in {}: {}", column, e)))
    };

    let raw_response: String = row.get("raw_response");

    Ok(Receipt {
        order_id: row.get("order_id"),
        status,
        asset: row.get("asset"),
        side,
        executed_price: decimal("executed_price")?,
        executed_quantity: decimal("executed_quantity")?,
        amount_usd: decimal("amount_usd")?,
        timestamp: row.get("timestamp"),
        raw_response: serde_json::from_str(&raw_response).unwrap_or(serde_json::Value::Null),
    })
}
