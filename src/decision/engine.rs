use std::sync::Arc;

use tracing::{debug, info};

use super::types::FinalDecision;
use crate::agents::api::AgentGateway;
use crate::agents::types::{ConsolidatedInput, MacroImpact, TradeProposal, TradeSide, TradeType};
use crate::config::PipelineConfig;
use crate::error::CycleError;

/// The only tuning knobs of the filter stage.
#[derive(Debug, Clone)]
pub struct ConfluenceThresholds {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub sentiment_threshold: f64,
}

impl Default for ConfluenceThresholds {
    fn default() -> Self {
        Self {
            rsi_oversold: 35.0,
            rsi_overbought: 65.0,
            sentiment_threshold: 0.1,
        }
    }
}

impl From<&PipelineConfig> for ConfluenceThresholds {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            rsi_oversold: config.rsi_oversold,
            rsi_overbought: config.rsi_overbought,
            sentiment_threshold: config.sentiment_threshold,
        }
    }
}

/// What the pure stage concluded: stand down, or put a proposal in front of
/// the advisor.
#[derive(Debug, Clone)]
pub enum FilterVerdict {
    Hold { reason: String },
    Propose(TradeProposal),
}

/// Hierarchical, short-circuiting filter. No I/O, no side effects: the same
/// input always yields the same verdict.
///
/// Order matters: the risk veto beats everything, the macro veto beats the
/// signals, and only full confluence (RSI + MACD crossover + sentiment, all
/// agreeing) produces a proposal.
pub fn filter_stage(input: &ConsolidatedInput, thresholds: &ConfluenceThresholds) -> FilterVerdict {
    if !input.risk.can_trade {
        return FilterVerdict::Hold {
            reason: format!("VETO (risk): {}", input.risk.reason),
        };
    }

    if input.macro_outlook.impact == MacroImpact::High {
        return FilterVerdict::Hold {
            reason: format!("VETO (macro): {}", input.macro_outlook.summary),
        };
    }

    let technical = &input.technical;
    let score = input.sentiment.sentiment_score;

    let buy_signal = technical.rsi < thresholds.rsi_oversold
        && technical.is_bullish_crossover
        && score > thresholds.sentiment_threshold;
    let sell_signal = technical.rsi > thresholds.rsi_overbought
        && technical.is_bearish_crossover
        && score < -thresholds.sentiment_threshold;

    let (side, reasoning) = if buy_signal {
        (
            TradeSide::Buy,
            format!(
                "BUY confluence on {}: RSI {:.2} below {:.0} with bullish MACD crossover and sentiment {:+.2}",
                input.asset, technical.rsi, thresholds.rsi_oversold, score
            ),
        )
    } else if sell_signal {
        (
            TradeSide::Sell,
            format!(
                "SELL confluence on {}: RSI {:.2} above {:.0} with bearish MACD crossover and sentiment {:+.2}",
                input.asset, technical.rsi, thresholds.rsi_overbought, score
            ),
        )
    } else {
        return FilterVerdict::Hold {
            reason: format!(
                "no confluence on {}: RSI {:.2}, bullish={}, bearish={}, sentiment {:+.2}",
                input.asset,
                technical.rsi,
                technical.is_bullish_crossover,
                technical.is_bearish_crossover,
                score
            ),
        };
    };

    FilterVerdict::Propose(TradeProposal {
        asset: input.asset.clone(),
        side,
        trade_type: TradeType::Market,
        entry_price: input.current_price,
        reasoning,
    })
}

/// Filter stage plus the approval stage: advisory review, then position
/// sizing. Collaborator failures abort the cycle; an advisory rejection is
/// just another hold.
pub struct DecisionEngine {
    gateway: Arc<dyn AgentGateway>,
    thresholds: ConfluenceThresholds,
}

impl DecisionEngine {
    pub fn new(gateway: Arc<dyn AgentGateway>, thresholds: ConfluenceThresholds) -> Self {
        Self { gateway, thresholds }
    }

    pub async fn decide(&self, input: &ConsolidatedInput) -> Result<FinalDecision, CycleError> {
        let proposal = match filter_stage(input, &self.thresholds) {
            FilterVerdict::Hold { reason } => {
                debug!("🛑 Filter stage held {}: {}", input.asset, reason);
                return Ok(FinalDecision::Hold { reason });
            }
            FilterVerdict::Propose(proposal) => proposal,
        };

        info!(
            "📋 Proposal for {}: {:?} @ {:.2} - submitting for advisory review",
            proposal.asset, proposal.side, proposal.entry_price
        );

        let approval = self.gateway.review_trade(&proposal).await?;
        if !approval.decision_approved {
            let reason = if approval.remarks.is_empty() {
                "rejected by advisor".to_string()
            } else {
                approval.remarks
            };
            info!("🛑 Advisor rejected {}: {}", proposal.asset, reason);
            return Ok(FinalDecision::Hold { reason });
        }

        let sizing = self
            .gateway
            .size_position(&proposal.asset, proposal.entry_price)
            .await?;

        let reason = [
            proposal.reasoning.as_str(),
            approval.remarks.as_str(),
            sizing.reasoning.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("; ");

        Ok(FinalDecision::Execute {
            asset: proposal.asset,
            side: proposal.side,
            trade_type: TradeType::Market,
            // The sizer's reply is taken verbatim; no local re-scaling.
            amount_usd: sizing.amount_usd,
            reason,
        })
    }
}
