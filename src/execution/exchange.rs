use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, error, info};

use crate::config::ExchangeConfig;
use crate::error::CycleError;

const MAINNET_URL: &str = "https://api.binance.com";
const TESTNET_URL: &str = "https://testnet.binance.vision";

/// Exchange reply for a market order. Numeric fields arrive as strings and
/// are parsed downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    #[serde(rename = "orderId")]
    pub order_id: u64,
    pub symbol: String,
    pub status: String,
    #[serde(rename = "executedQty")]
    pub executed_qty: String,
    #[serde(rename = "cummulativeQuoteQty")]
    pub cummulative_quote_qty: String,
    #[serde(rename = "transactTime")]
    pub transact_time: i64,
}

#[derive(Debug, Deserialize)]
struct AvgPriceResponse {
    price: String,
}

/// Seam over the exchange REST API so the execution sink can be exercised
/// without network access.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    async fn ping(&self) -> Result<(), CycleError>;

    async fn avg_price(&self, symbol: &str) -> Result<f64, CycleError>;

    /// Market buy quoted in the quote currency (USD-equivalent notional).
    async fn market_buy(&self, symbol: &str, quote_qty: f64) -> Result<OrderResponse, CycleError>;

    /// Market sell quoted in the base asset quantity.
    async fn market_sell(&self, symbol: &str, base_qty: f64) -> Result<OrderResponse, CycleError>;
}

/// Binance-style REST client with HMAC-SHA256 signed order endpoints.
///
/// Credentials are fixed at startup; rotation requires a restart. If the
/// startup ping fails the client stays permanently disabled and every call
/// surfaces a 503-class error instead of guessing at exchange state.
pub struct BinanceClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    enabled: bool,
}

impl BinanceClient {
    /// Build the client and probe the exchange once. Never fails: an
    /// unreachable exchange yields a disabled client, not a dead process.
    pub async fn connect(config: &ExchangeConfig) -> Self {
        let base_url = if config.testnet {
            TESTNET_URL.to_string()
        } else {
            MAINNET_URL.to_string()
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(config.timeout_secs))
            .build()
            .unwrap_or_default();

        let mut client = Self {
            http,
            base_url,
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            enabled: true,
        };

        match client.ping().await {
            Ok(()) => info!("🌐 Exchange reachable at {}", client.base_url),
            Err(e) => {
                error!(
                    "❌ Exchange unreachable at {}: {}, entering disabled state",
                    client.base_url, e
                );
                client.enabled = false;
            }
        }

        client
    }

    fn ensure_enabled(&self) -> Result<(), CycleError> {
        if self.enabled {
            Ok(())
        } else {
            Err(CycleError::Unavailable(
                "exchange client is disabled (startup ping failed)".to_string(),
            ))
        }
    }

    fn sign(&self, query: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    async fn place_order(&self, query: String) -> Result<OrderResponse, CycleError> {
        self.ensure_enabled()?;

        let signature = self.sign(&query);
        let url = format!(
            "{}/api/v3/order?{}&signature={}",
            self.base_url, query, signature
        );

        debug!("📤 Submitting order: {}", query);

        let response = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            // A refused connection never reached the exchange. Anything else
            // dies after send and leaves the order in an unknown state; never
            // auto-retry a market order.
            .map_err(|e| {
                if e.is_connect() {
                    CycleError::Unavailable(e.to_string())
                } else {
                    CycleError::ExchangeUnknown(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(CycleError::ExchangeRejected {
                status: status.to_string(),
                detail,
            });
        }

        response
            .json::<OrderResponse>()
            .await
            .map_err(|e| CycleError::CollaboratorContract {
                agent: "exchange",
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl ExchangeApi for BinanceClient {
    async fn ping(&self) -> Result<(), CycleError> {
        let url = format!("{}/api/v3/ping", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| CycleError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CycleError::Unavailable(format!(
                "ping returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn avg_price(&self, symbol: &str) -> Result<f64, CycleError> {
        self.ensure_enabled()?;

        let url = format!("{}/api/v3/avgPrice?symbol={}", self.base_url, symbol);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| CycleError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CycleError::Unavailable(format!(
                "avgPrice for {} returned {}",
                symbol,
                response.status()
            )));
        }

        let body: AvgPriceResponse =
            response
                .json()
                .await
                .map_err(|e| CycleError::CollaboratorContract {
                    agent: "exchange",
                    reason: e.to_string(),
                })?;
        body.price
            .parse::<f64>()
            .map_err(|e| CycleError::CollaboratorContract {
                agent: "exchange",
                reason: format!("unparseable avgPrice {:?}: {}", body.price, e),
            })
    }

    async fn market_buy(&self, symbol: &str, quote_qty: f64) -> Result<OrderResponse, CycleError> {
        let query = format!(
            "symbol={}&side=BUY&type=MARKET&quoteOrderQty={:.2}&timestamp={}",
            symbol,
            quote_qty,
            chrono::Utc::now().timestamp_millis()
        );
        self.place_order(query).await
    }

    async fn market_sell(&self, symbol: &str, base_qty: f64) -> Result<OrderResponse, CycleError> {
        let query = format!(
            "symbol={}&side=SELL&type=MARKET&quantity={:.8}&timestamp={}",
            symbol,
            base_qty,
            chrono::Utc::now().timestamp_millis()
        );
        self.place_order(query).await
    }
}
