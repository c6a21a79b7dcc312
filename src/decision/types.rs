use serde::{Deserialize, Serialize};

use crate::agents::types::{TradeSide, TradeType};

/// Outcome of one decision cycle. A proper sum type: the execution fields
/// only exist when there is something to execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum FinalDecision {
    #[serde(rename = "hold")]
    Hold { reason: String },
    #[serde(rename = "execute_trade")]
    Execute {
        asset: String,
        side: TradeSide,
        trade_type: TradeType,
        amount_usd: f64,
        reason: String,
    },
}

impl FinalDecision {
    pub fn is_execute(&self) -> bool {
        matches!(self, FinalDecision::Execute { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            FinalDecision::Hold { reason } => reason,
            FinalDecision::Execute { reason, .. } => reason,
        }
    }
}

/// Immediate reply of the fire-and-forget endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub message: String,
    pub asset: String,
}
