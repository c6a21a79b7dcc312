use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use super::exchange::{ExchangeApi, OrderResponse};
use crate::agents::types::TradeSide;
use crate::error::CycleError;
use crate::store::{Receipt, ReceiptStatus, ReceiptStore};

/// Converts an approved execute decision into one exchange call and one
/// persisted receipt.
///
/// One attempt walks: NEW → SENT → FILLED → PERSISTED, or ends in FAILED
/// (rejected, receipt written) or UNKNOWN (dropped after send, no receipt,
/// operator alarm). The exchange call happens at most once per decision;
/// persistence is best-effort afterwards and never triggers a resend.
pub struct ExecutionSink {
    exchange: Arc<dyn ExchangeApi>,
    store: ReceiptStore,
    testnet: bool,
}

/// Map an asset pair onto the exchange symbol alphabet: drop the separator,
/// uppercase, and widen a bare `USD` quote to `USDT` when no stablecoin
/// suffix is already present.
pub fn normalize_symbol(asset: &str) -> String {
    let symbol: String = asset
        .chars()
        .filter(|c| *c != '/')
        .collect::<String>()
        .to_uppercase();

    const STABLE_SUFFIXES: [&str; 4] = ["USDT", "USDC", "BUSD", "FDUSD"];
    if STABLE_SUFFIXES.iter().any(|s| symbol.ends_with(s)) {
        return symbol;
    }
    if let Some(base) = symbol.strip_suffix("USD") {
        return format!("{}USDT", base);
    }
    symbol
}

impl ExecutionSink {
    pub fn new(exchange: Arc<dyn ExchangeApi>, store: ReceiptStore, testnet: bool) -> Self {
        Self {
            exchange,
            store,
            testnet,
        }
    }

    pub async fn execute(
        &self,
        asset: &str,
        side: TradeSide,
        amount_usd: f64,
    ) -> Result<Receipt, CycleError> {
        let symbol = normalize_symbol(asset);
        info!(
            "⚡ Executing {} {} for ${:.2} as {}",
            side.as_str(),
            asset,
            amount_usd,
            symbol
        );

        match side {
            TradeSide::Buy => self.execute_buy(asset, &symbol, amount_usd).await,
            TradeSide::Sell => self.execute_simulated_sell(asset, &symbol, amount_usd).await,
        }
    }

    async fn execute_buy(
        &self,
        asset: &str,
        symbol: &str,
        amount_usd: f64,
    ) -> Result<Receipt, CycleError> {
        let response = self.exchange.market_buy(symbol, amount_usd).await?;

        if response.status != "FILLED" {
            let status = response.status.clone();
            warn!(
                "❌ Order {} for {} ended {}, writing failed receipt",
                response.order_id, symbol, status
            );
            let failed = self.failed_receipt(asset, TradeSide::Buy, amount_usd, &response)?;
            if let Err(e) = self.store.insert(&failed).await {
                error!("❌ Could not persist failed receipt: {}", e);
            }
            return Err(CycleError::ExchangeRejected {
                status,
                detail: format!("order {} on {} was not filled", response.order_id, symbol),
            });
        }

        let quantity = parse_decimal("executedQty", &response.executed_qty)?;
        let quote_spent = parse_decimal("cummulativeQuoteQty", &response.cummulative_quote_qty)?;
        if quantity <= Decimal::ZERO {
            return Err(CycleError::ExchangeRejected {
                status: response.status.clone(),
                detail: format!("order {} filled with zero quantity", response.order_id),
            });
        }

        let receipt = Receipt {
            order_id: response.order_id.to_string(),
            status: self.fill_status(),
            asset: asset.to_string(),
            side: TradeSide::Buy,
            executed_price: quote_spent / quantity,
            executed_quantity: quantity,
            amount_usd: quote_spent,
            timestamp: transact_timestamp(&response)?,
            raw_response: serde_json::to_value(&response).unwrap_or(serde_json::Value::Null),
        };

        self.commit(receipt).await
    }

    /// The exchange cannot express sell-by-quote-quantity, so sells are
    /// recorded as simulated receipts priced off the current average price.
    /// A known limitation, kept loud in the logs rather than silently
    /// guessing a balance to liquidate.
    async fn execute_simulated_sell(
        &self,
        asset: &str,
        symbol: &str,
        amount_usd: f64,
    ) -> Result<Receipt, CycleError> {
        warn!(
            "⚠️ Sell-by-quote not supported by the exchange; recording simulated sell for {}",
            asset
        );

        let price_quote = self.exchange.avg_price(symbol).await?;
        let price =
            Decimal::try_from(price_quote).map_err(|e| CycleError::CollaboratorContract {
                agent: "exchange",
                reason: format!("avg price {} not representable: {}", price_quote, e),
            })?;
        if price <= Decimal::ZERO {
            return Err(CycleError::CollaboratorContract {
                agent: "exchange",
                reason: format!("avg price {} must be positive", price_quote),
            });
        }
        let amount = Decimal::try_from(amount_usd).map_err(|e| {
            CycleError::ClientInput(format!("amount {} not representable: {}", amount_usd, e))
        })?;

        let receipt = Receipt {
            order_id: format!("sim-{}", uuid::Uuid::new_v4()),
            status: ReceiptStatus::TestSuccess,
            asset: asset.to_string(),
            side: TradeSide::Sell,
            executed_price: price,
            executed_quantity: (amount / price).round_dp(8),
            amount_usd: amount,
            timestamp: Utc::now(),
            raw_response: serde_json::json!({
                "simulated": true,
                "source": "avg_price",
                "price": price_quote,
            }),
        };

        self.commit(receipt).await
    }

    async fn commit(&self, receipt: Receipt) -> Result<Receipt, CycleError> {
        if let Err(e) = self.store.insert(&receipt).await {
            // The fill already happened. Dump everything needed for manual
            // reconciliation and surface the failure without a second send.
            error!(
                "❌ Receipt persistence failed after fill, reconcile manually: {} - {}",
                e,
                serde_json::to_string(&receipt).unwrap_or_else(|_| format!("{:?}", receipt))
            );
            return Err(e);
        }

        info!(
            "✅ Receipt {} committed: {} {} {} @ {}",
            receipt.order_id,
            receipt.status.as_str(),
            receipt.side.as_str(),
            receipt.asset,
            receipt.executed_price
        );
        Ok(receipt)
    }

    fn fill_status(&self) -> ReceiptStatus {
        if self.testnet {
            ReceiptStatus::TestSuccess
        } else {
            ReceiptStatus::Success
        }
    }

    fn failed_receipt(
        &self,
        asset: &str,
        side: TradeSide,
        amount_usd: f64,
        response: &OrderResponse,
    ) -> Result<Receipt, CycleError> {
        let amount = Decimal::try_from(amount_usd).map_err(|e| {
            CycleError::ClientInput(format!("amount {} not representable: {}", amount_usd, e))
        })?;
        Ok(Receipt {
            order_id: response.order_id.to_string(),
            status: ReceiptStatus::Failed,
            asset: asset.to_string(),
            side,
            executed_price: Decimal::ZERO,
            executed_quantity: Decimal::ZERO,
            amount_usd: amount,
            timestamp: transact_timestamp(response).unwrap_or_else(|_| Utc::now()),
            raw_response: serde_json::to_value(response).unwrap_or(serde_json::Value::Null),
        })
    }
}

fn parse_decimal(field: &'static str, raw: &str) -> Result<Decimal, CycleError> {
    raw.parse::<Decimal>()
        .map_err(|e| CycleError::CollaboratorContract {
            agent: "exchange",
            reason: format!("unparseable {} {:?}: {}", field, raw, e),
        })
}

fn transact_timestamp(response: &OrderResponse) -> Result<DateTime<Utc>, CycleError> {
    DateTime::from_timestamp_millis(response.transact_time).ok_or_else(|| {
        CycleError::CollaboratorContract {
            agent: "exchange",
            reason: format!("transactTime {} out of range", response.transact_time),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol("BTC/USD"), "BTCUSDT");
        assert_eq!(normalize_symbol("eth/usd"), "ETHUSDT");
        assert_eq!(normalize_symbol("SOL/USDT"), "SOLUSDT");
        assert_eq!(normalize_symbol("SOL/USDC"), "SOLUSDC");
        assert_eq!(normalize_symbol("BTCUSD"), "BTCUSDT");
        // Non-USD quotes pass through untouched.
        assert_eq!(normalize_symbol("ETH/BTC"), "ETHBTC");
    }

    #[test]
    fn test_transact_timestamp_is_utc() {
        let response = OrderResponse {
            order_id: 1,
            symbol: "BTCUSDT".to_string(),
            status: "FILLED".to_string(),
            executed_qty: "0.005".to_string(),
            cummulative_quote_qty: "150.0".to_string(),
            transact_time: 1_507_725_176_595,
        };
        let ts = transact_timestamp(&response).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_507_725_176_595);
    }

    #[test]
    fn test_parse_decimal_rejects_garbage() {
        assert!(parse_decimal("executedQty", "0.005").is_ok());
        assert!(parse_decimal("executedQty", "not-a-number").is_err());
    }
}
