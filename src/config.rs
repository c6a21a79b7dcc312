use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub agents: AgentsConfig,
    pub pipeline: PipelineConfig,
    pub exchange: ExchangeConfig,
    pub database: DatabaseConfig,
    pub notifier: NotifierConfig,
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub internal_api_key: String,
}

#[derive(Debug, Clone)]
pub struct AgentsConfig {
    pub internal_api_key: String,
    pub risk_url: String,
    pub technical_url: String,
    pub macro_url: String,
    pub sentiment_url: String,
    pub advisor_url: String,
    pub sizer_url: String,
    /// Per-call timeout for the four analyzers, seconds.
    pub default_timeout_secs: f64,
    /// Per-call timeout for advisor and sizer, seconds.
    pub decision_timeout_secs: f64,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum number of historical closes required before a cycle runs.
    pub min_history: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub sentiment_threshold: f64,
}

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub api_key: String,
    pub api_secret: String,
    pub testnet: bool,
    pub timeout_secs: f64,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
    pub to: String,
    pub api_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        // The internal key gates every non-health endpoint and signs our
        // outbound analyzer calls. Refusing to start without it beats
        // serving an unauthenticated decision pipeline.
        let internal_api_key = env::var("INTERNAL_API_KEY")
            .map_err(|_| anyhow::anyhow!("INTERNAL_API_KEY is not set"))?;
        if internal_api_key.trim().is_empty() {
            anyhow::bail!("INTERNAL_API_KEY is empty");
        }

        let server = ServerConfig {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            internal_api_key: internal_api_key.clone(),
        };

        let agents = AgentsConfig {
            internal_api_key,
            risk_url: env::var("RISK_AGENT_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            technical_url: env::var("TECHNICAL_AGENT_URL")
                .unwrap_or_else(|_| "http://localhost:8002".to_string()),
            macro_url: env::var("MACRO_AGENT_URL")
                .unwrap_or_else(|_| "http://localhost:8003".to_string()),
            sentiment_url: env::var("SENTIMENT_AGENT_URL")
                .unwrap_or_else(|_| "http://localhost:8004".to_string()),
            advisor_url: env::var("ADVISOR_URL")
                .unwrap_or_else(|_| "http://localhost:8005".to_string()),
            sizer_url: env::var("SIZER_URL")
                .unwrap_or_else(|_| "http://localhost:8006".to_string()),
            default_timeout_secs: env::var("DEFAULT_TIMEOUT")
                .unwrap_or_else(|_| "20.0".to_string())
                .parse()
                .unwrap_or(20.0),
            decision_timeout_secs: env::var("DECISION_TIMEOUT")
                .unwrap_or_else(|_| "30.0".to_string())
                .parse()
                .unwrap_or(30.0),
        };

        let pipeline = PipelineConfig {
            min_history: env::var("MIN_HISTORY")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            rsi_oversold: env::var("RSI_OVERSOLD")
                .unwrap_or_else(|_| "35.0".to_string())
                .parse()
                .unwrap_or(35.0),
            rsi_overbought: env::var("RSI_OVERBOUGHT")
                .unwrap_or_else(|_| "65.0".to_string())
                .parse()
                .unwrap_or(65.0),
            sentiment_threshold: env::var("SENTIMENT_THRESHOLD")
                .unwrap_or_else(|_| "0.1".to_string())
                .parse()
                .unwrap_or(0.1),
        };

        let exchange = ExchangeConfig {
            api_key: env::var("EXCHANGE_API_KEY").unwrap_or_default(),
            api_secret: env::var("EXCHANGE_API_SECRET").unwrap_or_default(),
            testnet: env::var("EXCHANGE_TESTNET")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            timeout_secs: env::var("EXCHANGE_TIMEOUT")
                .unwrap_or_else(|_| "10.0".to_string())
                .parse()
                .unwrap_or(10.0),
        };

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://trades.db?mode=rwc".to_string()),
        };

        let notifier = NotifierConfig {
            account_sid: env::var("NOTIFIER_ACCOUNT_SID").unwrap_or_default(),
            auth_token: env::var("NOTIFIER_AUTH_TOKEN").unwrap_or_default(),
            from: env::var("NOTIFIER_FROM").unwrap_or_default(),
            to: env::var("NOTIFIER_TO").unwrap_or_default(),
            api_url: env::var("NOTIFIER_API_URL")
                .unwrap_or_else(|_| "https://api.twilio.com".to_string()),
        };

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".to_string());

        Ok(Config {
            server,
            agents,
            pipeline,
            exchange,
            database,
            notifier,
            log_level,
        })
    }

    /// Upper bound on one full cycle: analyzer fan-out + decision stage +
    /// exchange call. The sync endpoint cancels everything past this.
    pub fn cycle_deadline_secs(&self) -> f64 {
        self.agents.default_timeout_secs
            + self.agents.decision_timeout_secs
            + self.exchange.timeout_secs
    }
}
