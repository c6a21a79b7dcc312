use serde::{Deserialize, Serialize};

use crate::error::CycleError;

/// One analysis cycle's input: an asset and its close history, oldest first.
/// The current price is always the last close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub asset: String,
    pub historical_prices: Vec<f64>,
}

impl AnalysisRequest {
    pub fn current_price(&self) -> Option<f64> {
        self.historical_prices.last().copied()
    }

    pub fn validate(&self, min_history: usize) -> Result<(), CycleError> {
        if self.asset.trim().is_empty() {
            return Err(CycleError::ClientInput("asset must not be empty".to_string()));
        }
        if self.historical_prices.len() < min_history {
            return Err(CycleError::ClientInput(format!(
                "insufficient history for {}: got {} closes, need at least {}",
                self.asset,
                self.historical_prices.len(),
                min_history
            )));
        }
        if self
            .historical_prices
            .iter()
            .any(|p| !p.is_finite() || *p <= 0.0)
        {
            return Err(CycleError::ClientInput(format!(
                "historical prices for {} must be finite and strictly positive",
                self.asset
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacroImpact {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentSignal {
    Buy,
    Sell,
    Hold,
}

/// Risk analyzer reply. `can_trade == false` is a hard veto.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub asset: String,
    pub risk_level: f64,
    pub volatility: f64,
    pub can_trade: bool,
    #[serde(default)]
    pub reason: String,
}

impl RiskReport {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.risk_level) {
            return Err(format!("risk_level {} outside [0, 1]", self.risk_level));
        }
        if !self.volatility.is_finite() || self.volatility < 0.0 {
            return Err(format!("volatility {} must be >= 0", self.volatility));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalReport {
    pub asset: String,
    pub rsi: f64,
    pub macd_line: f64,
    pub signal_line: f64,
    pub histogram: f64,
    pub is_bullish_crossover: bool,
    pub is_bearish_crossover: bool,
}

impl TechnicalReport {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.rsi) {
            return Err(format!("rsi {} outside [0, 100]", self.rsi));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroReport {
    pub asset: String,
    pub impact: MacroImpact,
    pub event_name: String,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentReport {
    pub asset: String,
    pub sentiment_score: f64,
    pub confidence: f64,
    pub signal: SentimentSignal,
}

impl SentimentReport {
    pub fn validate(&self) -> Result<(), String> {
        if !(-1.0..=1.0).contains(&self.sentiment_score) {
            return Err(format!(
                "sentiment_score {} outside [-1, 1]",
                self.sentiment_score
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} outside [0, 1]", self.confidence));
        }
        Ok(())
    }
}

/// The four analyzer reports plus the price the cycle was keyed on. Owned by
/// the orchestrator for exactly one cycle and handed to the decision engine
/// by reference.
#[derive(Debug, Clone)]
pub struct ConsolidatedInput {
    pub asset: String,
    pub current_price: f64,
    pub risk: RiskReport,
    pub technical: TechnicalReport,
    pub macro_outlook: MacroReport,
    pub sentiment: SentimentReport,
}

/// What the filter stage hands to the advisor for review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeProposal {
    pub asset: String,
    pub side: TradeSide,
    pub trade_type: TradeType,
    pub entry_price: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub decision_approved: bool,
    #[serde(default)]
    pub remarks: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingRequest {
    pub asset: String,
    pub entry_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sizing {
    pub asset: String,
    pub amount_usd: f64,
    pub reasoning: String,
}

impl Sizing {
    pub fn validate(&self) -> Result<(), String> {
        if !self.amount_usd.is_finite() || self.amount_usd <= 0.0 {
            return Err(format!("amount_usd {} must be > 0", self.amount_usd));
        }
        Ok(())
    }
}
