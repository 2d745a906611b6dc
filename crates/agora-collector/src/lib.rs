//! Agora Collector - Offer solicitation across the agent pool
//!
//! One solicitation fans out to every configured agent endpoint in parallel,
//! each call bounded by its own timeout. There is no shared mutable state
//! between calls; results are joined after all complete or time out
//! individually. Partial completion is the normal case: a per-agent failure
//! (timeout, malformed payload) degrades to "no offer" for that agent and is
//! logged, never escalated into a batch-wide failure. Only a round that
//! yields zero well-formed offers surfaces as unavailable.

use std::sync::Arc;
use std::time::Duration;

use agora_trust::TrustOracle;
use agora_types::{AgentId, AgoraError, AuctionId, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

/// The request fanned out to each agent
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Solicitation {
    pub auction_id: AuctionId,
    pub task_spec: serde_json::Value,
    pub payment_token: String,
    pub task_deadline: DateTime<Utc>,
}

/// A validated offer gathered from one agent, trust snapshot attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedOffer {
    pub agent_id: AgentId,
    pub ask: u64,
    pub floor: u64,
    pub stake: u64,
    pub trust_score: u8,
}

/// One reachable agent in the pool
#[async_trait::async_trait]
pub trait AgentEndpoint: Send + Sync {
    /// Stable label for diagnostics (address, not necessarily the agent id)
    fn label(&self) -> String;

    /// Ask the agent to price the task. The raw JSON answer is validated by
    /// the collector, so endpoints stay dumb pipes.
    async fn solicit(&self, solicitation: &Solicitation) -> Result<serde_json::Value>;
}

/// Result of one collection round
#[derive(Debug, Clone)]
pub struct CollectionRound {
    pub offers: Vec<CollectedOffer>,
    /// Endpoints that produced no usable offer this round
    pub no_offer_count: usize,
}

/// Fans solicitations out and gathers well-formed offers under timeout
pub struct OfferCollector {
    endpoints: Vec<Arc<dyn AgentEndpoint>>,
    trust: Arc<dyn TrustOracle>,
    per_agent_timeout: Duration,
}

impl OfferCollector {
    pub fn new(
        endpoints: Vec<Arc<dyn AgentEndpoint>>,
        trust: Arc<dyn TrustOracle>,
        per_agent_timeout: Duration,
    ) -> Self {
        Self {
            endpoints,
            trust,
            per_agent_timeout,
        }
    }

    /// Solicit every endpoint in parallel. Succeeds with the well-formed
    /// subset as long as at least one agent answered usably; a round with
    /// zero usable offers is an unavailability condition for the caller,
    /// though the auction itself stays open for late arrivals.
    pub async fn collect(&self, solicitation: &Solicitation) -> Result<CollectionRound> {
        let calls = self.endpoints.iter().map(|endpoint| {
            let endpoint = Arc::clone(endpoint);
            async move {
                let label = endpoint.label();
                let outcome =
                    tokio::time::timeout(self.per_agent_timeout, endpoint.solicit(solicitation))
                        .await;
                (label, outcome)
            }
        });

        let mut offers = Vec::new();
        let mut no_offer_count = 0;

        for (label, outcome) in join_all(calls).await {
            let raw = match outcome {
                Err(_) => {
                    warn!(endpoint = %label, "agent solicitation timed out, recording no offer");
                    no_offer_count += 1;
                    continue;
                }
                Ok(Err(err)) => {
                    warn!(endpoint = %label, error = %err, "agent solicitation failed, recording no offer");
                    no_offer_count += 1;
                    continue;
                }
                Ok(Ok(raw)) => raw,
            };

            match parse_offer(&raw) {
                Some(parsed) => {
                    let trust_score = self.trust.score_or_default(&parsed.agent_id).await;
                    debug!(endpoint = %label, agent = %parsed.agent_id, ask = parsed.ask, "offer gathered");
                    offers.push(CollectedOffer {
                        trust_score,
                        ..parsed
                    });
                }
                None => {
                    warn!(endpoint = %label, payload = %raw, "malformed offer discarded");
                    no_offer_count += 1;
                }
            }
        }

        if offers.is_empty() {
            return Err(AgoraError::unavailable(
                "offer-collection",
                format!("no well-formed offer from {} endpoint(s)", self.endpoints.len()),
            ));
        }
        Ok(CollectionRound {
            offers,
            no_offer_count,
        })
    }
}

/// Validate one raw agent answer. A well-formed response carries an agent
/// identifier plus ask, minAmount, and stakeAmount as non-negative integers
/// (string-encoded or numeric on the wire) with ask >= minAmount.
fn parse_offer(raw: &serde_json::Value) -> Option<CollectedOffer> {
    let agent_id = AgentId::parse(raw.get("agentId")?.as_str()?).ok()?;
    let ask = parse_amount(raw.get("ask")?)?;
    let floor = parse_amount(raw.get("minAmount")?)?;
    let stake = parse_amount(raw.get("stakeAmount")?)?;
    if ask < floor {
        return None;
    }
    Some(CollectedOffer {
        agent_id,
        ask,
        floor,
        stake,
        trust_score: 0,
    })
}

/// Amounts arrive as decimal strings on the external surface, but numeric
/// JSON is accepted too. Negative or fractional values are malformed.
fn parse_amount(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        serde_json::Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

/// HTTP endpoint POSTing the solicitation to the agent's join surface
pub struct HttpAgentEndpoint {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAgentEndpoint {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        // The collector's own per-agent timeout is the real bound; the client
        // timeout is a backstop against connect-level hangs.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(AgoraError::upstream)?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait::async_trait]
impl AgentEndpoint for HttpAgentEndpoint {
    fn label(&self) -> String {
        self.base_url.clone()
    }

    async fn solicit(&self, solicitation: &Solicitation) -> Result<serde_json::Value> {
        let url = format!("{}/auction/join", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(solicitation)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgoraError::Timeout {
                        operation: "agent solicitation".to_string(),
                    }
                } else {
                    AgoraError::upstream(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(AgoraError::upstream(format!(
                "agent endpoint returned {}",
                response.status()
            )));
        }
        response.json().await.map_err(AgoraError::upstream)
    }
}
