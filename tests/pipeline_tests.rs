use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use council_trader::agents::api::AgentGateway;
use council_trader::agents::types::{
    AnalysisRequest, Approval, MacroImpact, MacroReport, RiskReport, SentimentReport,
    SentimentSignal, Sizing, TechnicalReport, TradeProposal, TradeSide,
};
use council_trader::config::NotifierConfig;
use council_trader::decision::{ConfluenceThresholds, DecisionEngine, FinalDecision};
use council_trader::error::CycleError;
use council_trader::execution::{ExchangeApi, ExecutionSink, OrderResponse};
use council_trader::notify;
use council_trader::orchestrator::Orchestrator;
use council_trader::store::{ReceiptStatus, ReceiptStore};

/// Scripted collaborator suite: fixed replies plus call counters, so tests
/// can assert which collaborators were (not) contacted.
struct ScriptedGateway {
    risk: RiskReport,
    technical: TechnicalReport,
    macro_outlook: MacroReport,
    sentiment: SentimentReport,
    approval: Approval,
    sizing: Sizing,
    fail_sentiment: bool,
    advisor_calls: AtomicUsize,
    sizer_calls: AtomicUsize,
}

impl ScriptedGateway {
    /// Everything lined up for a BUY: risk clear, macro quiet, RSI oversold
    /// with a bullish crossover, positive sentiment, approving advisor,
    /// $150 sizing.
    fn favorable() -> Self {
        Self {
            risk: RiskReport {
                asset: "BTC/USD".to_string(),
                risk_level: 0.2,
                volatility: 0.03,
                can_trade: true,
                reason: String::new(),
            },
            technical: TechnicalReport {
                asset: "BTC/USD".to_string(),
                rsi: 25.0,
                macd_line: 1.2,
                signal_line: 0.8,
                histogram: 0.4,
                is_bullish_crossover: true,
                is_bearish_crossover: false,
            },
            macro_outlook: MacroReport {
                asset: "BTC/USD".to_string(),
                impact: MacroImpact::Low,
                event_name: "NO_MAJOR_EVENT".to_string(),
                summary: "quiet calendar".to_string(),
            },
            sentiment: SentimentReport {
                asset: "BTC/USD".to_string(),
                sentiment_score: 0.5,
                confidence: 0.8,
                signal: SentimentSignal::Buy,
            },
            approval: Approval {
                decision_approved: true,
                remarks: "approved by advisor".to_string(),
            },
            sizing: Sizing {
                asset: "BTC/USD".to_string(),
                amount_usd: 150.0,
                reasoning: "fixed-fraction sizing".to_string(),
            },
            fail_sentiment: false,
            advisor_calls: AtomicUsize::new(0),
            sizer_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AgentGateway for ScriptedGateway {
    async fn analyze_risk(&self, _request: &AnalysisRequest) -> Result<RiskReport, CycleError> {
        Ok(self.risk.clone())
    }

    async fn analyze_technical(
        &self,
        _request: &AnalysisRequest,
    ) -> Result<TechnicalReport, CycleError> {
        Ok(self.technical.clone())
    }

    async fn analyze_macro(&self, _request: &AnalysisRequest) -> Result<MacroReport, CycleError> {
        Ok(self.macro_outlook.clone())
    }

    async fn analyze_sentiment(
        &self,
        _request: &AnalysisRequest,
    ) -> Result<SentimentReport, CycleError> {
        if self.fail_sentiment {
            return Err(CycleError::Timeout(
                "sentiment agent call exceeded 20s".to_string(),
            ));
        }
        Ok(self.sentiment.clone())
    }

    async fn review_trade(&self, _proposal: &TradeProposal) -> Result<Approval, CycleError> {
        self.advisor_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.approval.clone())
    }

    async fn size_position(&self, asset: &str, _entry_price: f64) -> Result<Sizing, CycleError> {
        self.sizer_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Sizing {
            asset: asset.to_string(),
            ..self.sizing.clone()
        })
    }
}

/// Scripted exchange: canned order reply plus call counters.
struct ScriptedExchange {
    response: OrderResponse,
    avg: f64,
    buy_calls: AtomicUsize,
    sell_calls: AtomicUsize,
}

impl ScriptedExchange {
    fn filled() -> Self {
        Self {
            response: OrderResponse {
                order_id: 4242,
                symbol: "BTCUSDT".to_string(),
                status: "FILLED".to_string(),
                executed_qty: "0.00500000".to_string(),
                cummulative_quote_qty: "150.00000000".to_string(),
                transact_time: 1_700_000_000_000,
            },
            avg: 30_000.0,
            buy_calls: AtomicUsize::new(0),
            sell_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ExchangeApi for ScriptedExchange {
    async fn ping(&self) -> Result<(), CycleError> {
        Ok(())
    }

    async fn avg_price(&self, _symbol: &str) -> Result<f64, CycleError> {
        Ok(self.avg)
    }

    async fn market_buy(
        &self,
        _symbol: &str,
        _quote_qty: f64,
    ) -> Result<OrderResponse, CycleError> {
        self.buy_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }

    async fn market_sell(
        &self,
        _symbol: &str,
        _base_qty: f64,
    ) -> Result<OrderResponse, CycleError> {
        self.sell_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

fn request() -> AnalysisRequest {
    let mut closes: Vec<f64> = (0..29).map(|i| 29_000.0 + i as f64 * 10.0).collect();
    closes.push(30_000.0);
    AnalysisRequest {
        asset: "BTC/USD".to_string(),
        historical_prices: closes,
    }
}

async fn build(
    gateway: Arc<ScriptedGateway>,
    exchange: Arc<ScriptedExchange>,
) -> (Arc<Orchestrator>, ReceiptStore) {
    let store = ReceiptStore::connect("sqlite::memory:")
        .await
        .expect("in-memory store");
    let engine = DecisionEngine::new(
        gateway.clone() as Arc<dyn AgentGateway>,
        ConfluenceThresholds::default(),
    );
    let sink = ExecutionSink::new(exchange as Arc<dyn ExchangeApi>, store.clone(), false);
    let notifier = notify::spawn(NotifierConfig {
        account_sid: String::new(),
        auth_token: String::new(),
        from: String::new(),
        to: String::new(),
        api_url: "https://api.twilio.com".to_string(),
    });
    let orchestrator = Arc::new(Orchestrator::new(
        gateway,
        engine,
        sink,
        notifier,
        30,
        Duration::from_secs(60),
    ));
    (orchestrator, store)
}

#[tokio::test]
async fn test_full_buy_path_persists_receipt() {
    let gateway = Arc::new(ScriptedGateway::favorable());
    let exchange = Arc::new(ScriptedExchange::filled());
    let (orchestrator, store) = build(gateway.clone(), exchange.clone()).await;

    let decision = orchestrator.decide_sync(request()).await.unwrap();
    match &decision {
        FinalDecision::Execute {
            asset,
            side,
            amount_usd,
            reason,
            ..
        } => {
            assert_eq!(asset, "BTC/USD");
            assert_eq!(*side, TradeSide::Buy);
            // Sizer reply is taken verbatim.
            assert_eq!(*amount_usd, 150.0);
            assert!(reason.contains("approved by advisor"));
            assert!(reason.contains("fixed-fraction sizing"));
        }
        FinalDecision::Hold { reason } => panic!("expected execute, held: {}", reason),
    }

    assert_eq!(exchange.buy_calls.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.advisor_calls.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.sizer_calls.load(Ordering::SeqCst), 1);

    let receipts = store.recent(10).await.unwrap();
    assert_eq!(receipts.len(), 1);
    let receipt = &receipts[0];
    assert_eq!(receipt.order_id, "4242");
    assert_eq!(receipt.status, ReceiptStatus::Success);
    // 150 quote spent over 0.005 filled = 30000 average.
    assert_eq!(receipt.executed_price.to_string().parse::<f64>().unwrap(), 30_000.0);
    assert_eq!(
        receipt.executed_quantity.to_string().parse::<f64>().unwrap(),
        0.005
    );
    assert_eq!(receipt.timestamp.timestamp_millis(), 1_700_000_000_000);
}

#[tokio::test]
async fn test_advisor_veto_stops_before_sizer_and_exchange() {
    let mut gateway = ScriptedGateway::favorable();
    gateway.approval = Approval {
        decision_approved: false,
        remarks: "VETO advisor".to_string(),
    };
    let gateway = Arc::new(gateway);
    let exchange = Arc::new(ScriptedExchange::filled());
    let (orchestrator, store) = build(gateway.clone(), exchange.clone()).await;

    let decision = orchestrator.decide_sync(request()).await.unwrap();
    match decision {
        FinalDecision::Hold { reason } => assert_eq!(reason, "VETO advisor"),
        FinalDecision::Execute { .. } => panic!("advisor veto must hold"),
    }

    assert_eq!(gateway.sizer_calls.load(Ordering::SeqCst), 0);
    assert_eq!(exchange.buy_calls.load(Ordering::SeqCst), 0);
    assert!(store.recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_risk_veto_wins_over_everything() {
    let mut gateway = ScriptedGateway::favorable();
    gateway.risk.can_trade = false;
    gateway.risk.reason = "volatility too high".to_string();
    gateway.macro_outlook.impact = MacroImpact::High;
    gateway.sentiment.sentiment_score = 0.9;
    let gateway = Arc::new(gateway);
    let exchange = Arc::new(ScriptedExchange::filled());
    let (orchestrator, store) = build(gateway.clone(), exchange.clone()).await;

    let decision = orchestrator.decide_sync(request()).await.unwrap();
    match decision {
        FinalDecision::Hold { reason } => {
            assert!(reason.starts_with("VETO (risk)"), "got: {}", reason)
        }
        FinalDecision::Execute { .. } => panic!("risk veto must hold"),
    }

    // Nothing past the analyzers runs.
    assert_eq!(gateway.advisor_calls.load(Ordering::SeqCst), 0);
    assert_eq!(gateway.sizer_calls.load(Ordering::SeqCst), 0);
    assert_eq!(exchange.buy_calls.load(Ordering::SeqCst), 0);
    assert!(store.recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_macro_veto_after_risk_passes() {
    let mut gateway = ScriptedGateway::favorable();
    gateway.macro_outlook.impact = MacroImpact::High;
    gateway.macro_outlook.summary = "FOMC decision in two hours".to_string();
    let gateway = Arc::new(gateway);
    let exchange = Arc::new(ScriptedExchange::filled());
    let (orchestrator, _store) = build(gateway.clone(), exchange).await;

    let decision = orchestrator.decide_sync(request()).await.unwrap();
    match decision {
        FinalDecision::Hold { reason } => {
            assert!(reason.starts_with("VETO (macro)"), "got: {}", reason);
            assert!(reason.contains("FOMC"));
        }
        FinalDecision::Execute { .. } => panic!("macro veto must hold"),
    }
    assert_eq!(gateway.advisor_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_no_confluence_holds_without_advisory_calls() {
    let mut gateway = ScriptedGateway::favorable();
    gateway.technical.rsi = 50.0;
    gateway.technical.is_bullish_crossover = false;
    gateway.sentiment.sentiment_score = 0.0;
    let gateway = Arc::new(gateway);
    let exchange = Arc::new(ScriptedExchange::filled());
    let (orchestrator, _store) = build(gateway.clone(), exchange.clone()).await;

    let decision = orchestrator.decide_sync(request()).await.unwrap();
    match decision {
        FinalDecision::Hold { reason } => {
            assert!(reason.contains("no confluence"), "got: {}", reason)
        }
        FinalDecision::Execute { .. } => panic!("must hold without confluence"),
    }
    assert_eq!(gateway.advisor_calls.load(Ordering::SeqCst), 0);
    assert_eq!(exchange.buy_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_analyzer_failure_aborts_cycle() {
    let mut gateway = ScriptedGateway::favorable();
    gateway.fail_sentiment = true;
    let gateway = Arc::new(gateway);
    let exchange = Arc::new(ScriptedExchange::filled());
    let (orchestrator, store) = build(gateway, exchange.clone()).await;

    let err = orchestrator.decide_sync(request()).await.unwrap_err();
    assert!(matches!(err, CycleError::Timeout(_)), "got: {:?}", err);
    assert_eq!(exchange.buy_calls.load(Ordering::SeqCst), 0);
    assert!(store.recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_request_validation_rejects_short_history() {
    let gateway = Arc::new(ScriptedGateway::favorable());
    let exchange = Arc::new(ScriptedExchange::filled());
    let (orchestrator, _store) = build(gateway, exchange).await;

    let mut short = request();
    short.historical_prices.truncate(29);
    let err = orchestrator.decide_sync(short).await.unwrap_err();
    assert!(matches!(err, CycleError::ClientInput(_)), "got: {:?}", err);
}

#[tokio::test]
async fn test_async_entry_acknowledges_validated_input() {
    let gateway = Arc::new(ScriptedGateway::favorable());
    let exchange = Arc::new(ScriptedExchange::filled());
    let (orchestrator, _store) = build(gateway, exchange).await;

    let ack = orchestrator.decide_async(request()).unwrap();
    assert_eq!(ack.asset, "BTC/USD");

    let mut bad = request();
    bad.asset = String::new();
    assert!(orchestrator.decide_async(bad).is_err());
}

#[tokio::test]
async fn test_rejected_order_writes_failed_receipt() {
    let gateway = Arc::new(ScriptedGateway::favorable());
    let mut exchange = ScriptedExchange::filled();
    exchange.response.status = "EXPIRED".to_string();
    exchange.response.executed_qty = "0.00000000".to_string();
    exchange.response.cummulative_quote_qty = "0.00000000".to_string();
    let exchange = Arc::new(exchange);
    let (orchestrator, store) = build(gateway, exchange).await;

    let err = orchestrator.decide_sync(request()).await.unwrap_err();
    assert!(
        matches!(err, CycleError::ExchangeRejected { .. }),
        "got: {:?}",
        err
    );

    let receipts = store.recent(10).await.unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].status, ReceiptStatus::Failed);
    // A rejected order filled nothing, so the failed receipt records zeros.
    assert_eq!(receipts[0].executed_price.to_string().parse::<f64>().unwrap(), 0.0);
    assert_eq!(
        receipts[0].executed_quantity.to_string().parse::<f64>().unwrap(),
        0.0
    );
}

#[tokio::test]
async fn test_sell_confluence_records_simulated_receipt() {
    let mut gateway = ScriptedGateway::favorable();
    gateway.technical.rsi = 75.0;
    gateway.technical.is_bullish_crossover = false;
    gateway.technical.is_bearish_crossover = true;
    gateway.sentiment.sentiment_score = -0.5;
    let gateway = Arc::new(gateway);
    let exchange = Arc::new(ScriptedExchange::filled());
    let (orchestrator, store) = build(gateway, exchange.clone()).await;

    let decision = orchestrator.decide_sync(request()).await.unwrap();
    assert!(decision.is_execute());

    // The sell leg never touches the order endpoint; it is recorded as a
    // simulated fill priced off avg_price.
    assert_eq!(exchange.buy_calls.load(Ordering::SeqCst), 0);
    assert_eq!(exchange.sell_calls.load(Ordering::SeqCst), 0);

    let receipts = store.recent(10).await.unwrap();
    assert_eq!(receipts.len(), 1);
    let receipt = &receipts[0];
    assert_eq!(receipt.status, ReceiptStatus::TestSuccess);
    assert!(receipt.order_id.starts_with("sim-"));
    assert_eq!(receipt.side, TradeSide::Sell);
    assert_eq!(
        receipt.executed_quantity.to_string().parse::<f64>().unwrap(),
        0.005
    );
}
