use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::NotifierConfig;

/// How many trade reports may sit in the queue before new ones are dropped.
const QUEUE_DEPTH: usize = 64;

/// Handle to the background delivery worker. Dispatch never blocks and
/// never fails the caller: a full queue or a dead worker costs a log line,
/// not a cycle.
#[derive(Clone)]
pub struct NotifierHandle {
    tx: mpsc::Sender<String>,
}

impl NotifierHandle {
    pub fn dispatch(&self, body: String) {
        if let Err(e) = self.tx.try_send(body) {
            warn!("⚠️ Notification dropped: {}", e);
        }
    }
}

/// Spawn the delivery worker and return its handle. With missing or
/// placeholder credentials the worker degrades to log-only mode and still
/// reports success.
pub fn spawn(config: NotifierConfig) -> NotifierHandle {
    let (tx, mut rx) = mpsc::channel::<String>(QUEUE_DEPTH);
    let delivery = Delivery::new(config);

    tokio::spawn(async move {
        while let Some(body) = rx.recv().await {
            delivery.send(&body).await;
        }
    });

    NotifierHandle { tx }
}

struct Delivery {
    http: reqwest::Client,
    config: NotifierConfig,
    enabled: bool,
}

fn is_placeholder(value: &str) -> bool {
    value.trim().is_empty() || value.contains("YOUR_") || value.contains("changeme")
}

impl Delivery {
    fn new(config: NotifierConfig) -> Self {
        let enabled = ![
            &config.account_sid,
            &config.auth_token,
            &config.from,
            &config.to,
        ]
        .iter()
        .any(|v| is_placeholder(v.as_str()));

        if !enabled {
            warn!("⚠️ Notifier credentials absent or placeholders, running in log-only mode");
        }

        Self {
            http: reqwest::Client::new(),
            config,
            enabled,
        }
    }

    async fn send(&self, body: &str) {
        if !self.enabled {
            info!("📣 [log-only] {}", body);
            return;
        }

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_url, self.config.account_sid
        );
        let form = [
            ("From", self.config.from.as_str()),
            ("To", self.config.to.as_str()),
            ("Body", body),
        ];

        let result = self
            .http
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await;

        // Best-effort by contract: failures are logged and swallowed.
        match result {
            Ok(response) if response.status().is_success() => {
                info!("📣 Notification delivered to {}", self.config.to);
            }
            Ok(response) => {
                warn!("⚠️ Notifier returned {}", response.status());
            }
            Err(e) => {
                warn!("⚠️ Notification delivery failed: {}", e);
            }
        }
    }
}
