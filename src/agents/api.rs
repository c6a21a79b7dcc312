use async_trait::async_trait;

use super::types::{
    AnalysisRequest, Approval, MacroReport, RiskReport, SentimentReport, Sizing, TechnicalReport,
    TradeProposal,
};
use crate::error::CycleError;

/// Seam over every collaborator the pipeline talks to: the four analyzers,
/// the advisor and the position sizer. Production uses the HTTP gateway;
/// tests swap in scripted implementations.
#[async_trait]
pub trait AgentGateway: Send + Sync {
    async fn analyze_risk(&self, request: &AnalysisRequest) -> Result<RiskReport, CycleError>;

    async fn analyze_technical(
        &self,
        request: &AnalysisRequest,
    ) -> Result<TechnicalReport, CycleError>;

    async fn analyze_macro(&self, request: &AnalysisRequest) -> Result<MacroReport, CycleError>;

    async fn analyze_sentiment(
        &self,
        request: &AnalysisRequest,
    ) -> Result<SentimentReport, CycleError>;

    /// Submit a trade proposal for advisory review.
    async fn review_trade(&self, proposal: &TradeProposal) -> Result<Approval, CycleError>;

    /// Ask the sizer how many quote-currency dollars to commit.
    async fn size_position(&self, asset: &str, entry_price: f64) -> Result<Sizing, CycleError>;
}
