//! Agora Trust - Read-only reputation lookup
//!
//! Trust scores influence ranking tie-breaks only and never gate
//! participation. When the oracle is unreachable or does not know the agent,
//! callers get a documented neutral default instead of zero, so a transient
//! outage never unfairly demotes an agent.

use std::time::Duration;

use agora_types::{AgentId, AgoraError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

/// Score returned when the oracle is unavailable or the agent is unknown.
/// Deliberately the midpoint of [0, 100]: neutral, not punitive.
pub const NEUTRAL_TRUST_SCORE: u8 = 50;

/// Highest representable trust score
pub const MAX_TRUST_SCORE: u8 = 100;

/// Read-only lookup of a reputation score per agent
#[async_trait::async_trait]
pub trait TrustOracle: Send + Sync {
    /// Score in [0, 100]. `AgentNotFound` when the oracle has no record;
    /// transient failures surface as `Timeout`/`Unavailable`.
    async fn score(&self, agent: &AgentId) -> Result<u8>;

    /// Score with outage tolerance: any failure degrades to the neutral
    /// default rather than failing the caller or demoting the agent.
    async fn score_or_default(&self, agent: &AgentId) -> u8 {
        match self.score(agent).await {
            Ok(score) => score.min(MAX_TRUST_SCORE),
            Err(err) => {
                warn!(agent = %agent, error = %err, "trust oracle unavailable, using neutral score");
                NEUTRAL_TRUST_SCORE
            }
        }
    }
}

/// Wire shape of the trust collaborator's read surface
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrustRecord {
    #[allow(dead_code)]
    agent_id: String,
    score: u8,
    #[serde(default)]
    #[allow(dead_code)]
    signals: Vec<String>,
    #[allow(dead_code)]
    updated_at: Option<DateTime<Utc>>,
}

/// HTTP client for the external trust collaborator
pub struct HttpTrustOracle {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTrustOracle {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AgoraError::upstream)?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait::async_trait]
impl TrustOracle for HttpTrustOracle {
    async fn score(&self, agent: &AgentId) -> Result<u8> {
        let url = format!("{}/trust/{}", self.base_url.trim_end_matches('/'), agent);
        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                AgoraError::Timeout {
                    operation: "trust lookup".to_string(),
                }
            } else {
                AgoraError::upstream(e)
            }
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AgoraError::AgentNotFound {
                agent_id: agent.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(AgoraError::upstream(format!(
                "trust oracle returned {}",
                response.status()
            )));
        }

        let record: TrustRecord = response.json().await.map_err(AgoraError::upstream)?;
        Ok(record.score.min(MAX_TRUST_SCORE))
    }
}

/// Fixed-score oracle for tests and simulations
pub struct StaticTrustOracle {
    scores: std::collections::HashMap<AgentId, u8>,
}

impl StaticTrustOracle {
    pub fn new(scores: impl IntoIterator<Item = (AgentId, u8)>) -> Self {
        Self {
            scores: scores.into_iter().collect(),
        }
    }

    /// Oracle that knows nobody; every lookup degrades to the neutral default
    pub fn empty() -> Self {
        Self::new([])
    }
}

#[async_trait::async_trait]
impl TrustOracle for StaticTrustOracle {
    async fn score(&self, agent: &AgentId) -> Result<u8> {
        self.scores
            .get(agent)
            .copied()
            .map(|s| s.min(MAX_TRUST_SCORE))
            .ok_or_else(|| AgoraError::AgentNotFound {
                agent_id: agent.to_string(),
            })
    }
}

/// Oracle that always fails, for exercising outage paths in tests
pub struct FailingTrustOracle;

#[async_trait::async_trait]
impl TrustOracle for FailingTrustOracle {
    async fn score(&self, _agent: &AgentId) -> Result<u8> {
        Err(AgoraError::unavailable("trust-oracle", "injected outage"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_agent_returns_its_score() {
        let agent = AgentId::new();
        let oracle = StaticTrustOracle::new([(agent.clone(), 87)]);
        assert_eq!(oracle.score(&agent).await.unwrap(), 87);
        assert_eq!(oracle.score_or_default(&agent).await, 87);
    }

    #[tokio::test]
    async fn unknown_agent_degrades_to_neutral() {
        let oracle = StaticTrustOracle::empty();
        assert_eq!(oracle.score_or_default(&AgentId::new()).await, NEUTRAL_TRUST_SCORE);
    }

    #[tokio::test]
    async fn outage_degrades_to_neutral_not_zero() {
        let oracle = FailingTrustOracle;
        let score = oracle.score_or_default(&AgentId::new()).await;
        assert_eq!(score, NEUTRAL_TRUST_SCORE);
        assert_ne!(score, 0);
    }

    #[tokio::test]
    async fn scores_clamp_to_hundred() {
        let agent = AgentId::new();
        let oracle = StaticTrustOracle::new([(agent.clone(), 255)]);
        assert_eq!(oracle.score(&agent).await.unwrap(), MAX_TRUST_SCORE);
    }
}
