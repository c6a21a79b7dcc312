use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::agents::api::AgentGateway;
use crate::agents::types::{AnalysisRequest, ConsolidatedInput};
use crate::decision::engine::DecisionEngine;
use crate::decision::types::{Ack, FinalDecision};
use crate::error::CycleError;
use crate::execution::ExecutionSink;
use crate::notify::NotifierHandle;
use crate::store::Receipt;

/// Drives one decision cycle end to end: validate, fan out the analyzers in
/// parallel, consolidate, decide, execute, notify. Stateless between cycles;
/// everything it owns is shared immutable wiring.
pub struct Orchestrator {
    gateway: Arc<dyn AgentGateway>,
    engine: DecisionEngine,
    sink: ExecutionSink,
    notifier: NotifierHandle,
    min_history: usize,
    cycle_deadline: Duration,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn AgentGateway>,
        engine: DecisionEngine,
        sink: ExecutionSink,
        notifier: NotifierHandle,
        min_history: usize,
        cycle_deadline: Duration,
    ) -> Self {
        Self {
            gateway,
            engine,
            sink,
            notifier,
            min_history,
            cycle_deadline,
        }
    }

    /// Blocking entry point: the caller waits for the full decision. Used by
    /// anything that needs deterministic sequencing, like a backtest driver.
    pub async fn decide_sync(&self, request: AnalysisRequest) -> Result<FinalDecision, CycleError> {
        match tokio::time::timeout(self.cycle_deadline, self.run_cycle(request)).await {
            Ok(result) => result,
            Err(_) => Err(CycleError::Timeout(format!(
                "decision cycle exceeded {:.0}s deadline",
                self.cycle_deadline.as_secs_f64()
            ))),
        }
    }

    /// Fire-and-forget entry point: acknowledge after validation, run the
    /// cycle on a detached task. The same internal deadline still bounds the
    /// detached work so nothing leaks.
    pub fn decide_async(self: &Arc<Self>, request: AnalysisRequest) -> Result<Ack, CycleError> {
        request.validate(self.min_history)?;
        let asset = request.asset.clone();

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let asset = request.asset.clone();
            match tokio::time::timeout(
                orchestrator.cycle_deadline,
                orchestrator.run_cycle(request),
            )
            .await
            {
                Ok(Ok(decision)) => {
                    info!("🏁 Detached cycle for {} finished: {}", asset, decision.reason());
                }
                Ok(Err(e)) => {
                    error!("❌ Detached cycle for {} failed: {}", asset, e);
                }
                Err(_) => {
                    error!("⏱️ Detached cycle for {} hit the deadline", asset);
                }
            }
        });

        Ok(Ack {
            message: "decision cycle started".to_string(),
            asset,
        })
    }

    async fn run_cycle(&self, request: AnalysisRequest) -> Result<FinalDecision, CycleError> {
        request.validate(self.min_history)?;
        let current_price = request
            .current_price()
            .ok_or_else(|| CycleError::ClientInput("empty price history".to_string()))?;

        info!(
            "🔎 Cycle start for {} ({} closes, last {:.2})",
            request.asset,
            request.historical_prices.len(),
            current_price
        );

        // All four analyzers get the same request, truly concurrently.
        // All-or-nothing: the first failure cancels the siblings and aborts
        // the cycle.
        let (risk, technical, macro_outlook, sentiment) = tokio::try_join!(
            self.gateway.analyze_risk(&request),
            self.gateway.analyze_technical(&request),
            self.gateway.analyze_macro(&request),
            self.gateway.analyze_sentiment(&request),
        )?;

        let input = ConsolidatedInput {
            asset: request.asset.clone(),
            current_price,
            risk,
            technical,
            macro_outlook,
            sentiment,
        };

        let decision = self.engine.decide(&input).await?;

        match &decision {
            FinalDecision::Hold { reason } => {
                info!("🛑 HOLD {}: {}", input.asset, reason);
                self.notifier.dispatch(hold_report(&input.asset, reason));
            }
            FinalDecision::Execute {
                asset,
                side,
                amount_usd,
                ..
            } => {
                info!("🚀 EXECUTE {} {} for ${:.2}", side.as_str(), asset, amount_usd);
                let receipt = self.sink.execute(asset, *side, *amount_usd).await?;
                self.notifier.dispatch(trade_report(&receipt));
            }
        }

        Ok(decision)
    }
}

fn hold_report(asset: &str, reason: &str) -> String {
    format!("🛑 *Trading Desk Report*\nHolding {}: {}", asset, reason)
}

fn trade_report(receipt: &Receipt) -> String {
    format!(
        "📈 *Trading Desk Report*\n{} {} for ${}\nFilled {} @ {}\nOrder {} ({})",
        receipt.side.as_str().to_uppercase(),
        receipt.asset,
        receipt.amount_usd,
        receipt.executed_quantity,
        receipt.executed_price,
        receipt.order_id,
        receipt.status.as_str()
    )
}
