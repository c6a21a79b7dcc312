use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::api::AgentGateway;
use super::types::{
    AnalysisRequest, Approval, MacroReport, RiskReport, SentimentReport, Sizing, SizingRequest,
    TechnicalReport, TradeProposal,
};
use crate::config::AgentsConfig;
use crate::error::CycleError;

/// Shared secret header for all internal agent-to-agent calls.
pub const INTERNAL_API_KEY_HEADER: &str = "X-Internal-API-Key";

/// HTTP implementation of [`AgentGateway`]. One reqwest pool for the whole
/// process; per-call timeouts; strict typed parsing. Retries are the
/// caller's business, not ours.
pub struct HttpAgentGateway {
    http: reqwest::Client,
    config: AgentsConfig,
}

impl HttpAgentGateway {
    pub fn new(config: AgentsConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(
                config.default_timeout_secs.max(config.decision_timeout_secs),
            ))
            .build()?;
        Ok(Self { http, config })
    }

    fn analyzer_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.config.default_timeout_secs)
    }

    fn decision_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.config.decision_timeout_secs)
    }

    async fn post_json<B, T>(
        &self,
        agent: &'static str,
        url: String,
        body: &B,
        timeout: Duration,
    ) -> Result<T, CycleError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        debug!("📡 Calling {} agent at {}", agent, url);

        let response = self
            .http
            .post(&url)
            .header(INTERNAL_API_KEY_HEADER, &self.config.internal_api_key)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CycleError::Timeout(format!(
                        "{} agent call exceeded {:.0}s",
                        agent,
                        timeout.as_secs_f64()
                    ))
                } else {
                    CycleError::CollaboratorUnavailable {
                        agent,
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            warn!("⚠️ {} agent returned {}: {}", agent, status, detail);
            return Err(CycleError::CollaboratorUnavailable {
                agent,
                reason: format!("HTTP {}: {}", status, detail),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| CycleError::CollaboratorContract {
                agent,
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl AgentGateway for HttpAgentGateway {
    async fn analyze_risk(&self, request: &AnalysisRequest) -> Result<RiskReport, CycleError> {
        let url = format!("{}/analyze", self.config.risk_url);
        let report: RiskReport = self
            .post_json("risk", url, request, self.analyzer_timeout())
            .await?;
        report
            .validate()
            .map_err(|reason| CycleError::CollaboratorContract { agent: "risk", reason })?;
        Ok(report)
    }

    async fn analyze_technical(
        &self,
        request: &AnalysisRequest,
    ) -> Result<TechnicalReport, CycleError> {
        let url = format!("{}/analyze", self.config.technical_url);
        let report: TechnicalReport = self
            .post_json("technical", url, request, self.analyzer_timeout())
            .await?;
        report.validate().map_err(|reason| CycleError::CollaboratorContract {
            agent: "technical",
            reason,
        })?;
        Ok(report)
    }

    async fn analyze_macro(&self, request: &AnalysisRequest) -> Result<MacroReport, CycleError> {
        let url = format!("{}/analyze_events", self.config.macro_url);
        self.post_json("macro", url, request, self.analyzer_timeout())
            .await
    }

    async fn analyze_sentiment(
        &self,
        request: &AnalysisRequest,
    ) -> Result<SentimentReport, CycleError> {
        let url = format!("{}/analyze_sentiment", self.config.sentiment_url);
        let report: SentimentReport = self
            .post_json("sentiment", url, request, self.analyzer_timeout())
            .await?;
        report.validate().map_err(|reason| CycleError::CollaboratorContract {
            agent: "sentiment",
            reason,
        })?;
        Ok(report)
    }

    async fn review_trade(&self, proposal: &TradeProposal) -> Result<Approval, CycleError> {
        let url = format!("{}/review_trade", self.config.advisor_url);
        self.post_json("advisor", url, proposal, self.decision_timeout())
            .await
    }

    async fn size_position(&self, asset: &str, entry_price: f64) -> Result<Sizing, CycleError> {
        let url = format!("{}/calculate_position_size", self.config.sizer_url);
        let body = SizingRequest {
            asset: asset.to_string(),
            entry_price,
        };
        let sizing: Sizing = self
            .post_json("sizer", url, &body, self.decision_timeout())
            .await?;
        sizing
            .validate()
            .map_err(|reason| CycleError::CollaboratorContract { agent: "sizer", reason })?;
        Ok(sizing)
    }
}
