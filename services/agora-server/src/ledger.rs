//! HTTP clients for the external settlement ledger gateway
//!
//! The ledger itself is an external collaborator; these clients only cover
//! the read/write surface the escalation monitor consumes: the escalation
//! event log, the chain head, per-case settlement status, the arbitration
//! config, and the resolution dispatch action. A "range too large" rejection
//! from the log endpoint is classified so the monitor can shrink its window;
//! every other failure is passed through unmodified.

use std::time::Duration;

use agora_escalation::{
    ArbitrationConfigReader, ChainReader, EventLogReader, ResolutionDispatcher, SettlementReader,
};
use agora_types::{AgoraError, CaseId, DisputeCase, EscalationEvent, Result, TaskId};
use serde::Deserialize;

/// Shared client against one ledger gateway base URL
#[derive(Clone)]
pub struct LedgerGateway {
    client: reqwest::Client,
    base_url: String,
}

impl LedgerGateway {
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

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(classify_transport)?;
        if !response.status().is_success() {
            return Err(AgoraError::upstream(format!(
                "ledger gateway returned {} for {path}",
                response.status()
            )));
        }
        response.json().await.map_err(AgoraError::upstream)
    }
}

fn classify_transport(err: reqwest::Error) -> AgoraError {
    if err.is_timeout() {
        AgoraError::Timeout {
            operation: "ledger gateway call".to_string(),
        }
    } else {
        AgoraError::upstream(err)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEscalation {
    case_id: String,
    task_id: String,
    block_number: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireError {
    code: Option<String>,
}

#[async_trait::async_trait]
impl EventLogReader for LedgerGateway {
    async fn escalations(&self, from_block: u64, to_block: u64) -> Result<Vec<EscalationEvent>> {
        let path = format!("/escalations?fromBlock={from_block}&toBlock={to_block}");
        let response = self
            .client
            .get(self.url(&path))
            .send()
            .await
            .map_err(classify_transport)?;

        // Providers signal an oversized window either with 413 or a coded
        // JSON error body; both map to the shrinkable class.
        if response.status() == reqwest::StatusCode::PAYLOAD_TOO_LARGE {
            return Err(AgoraError::RangeTooLarge {
                from: from_block,
                to: to_block,
            });
        }
        if !response.status().is_success() {
            let status = response.status();
            if let Ok(err) = response.json::<WireError>().await {
                if err.code.as_deref() == Some("RANGE_TOO_LARGE") {
                    return Err(AgoraError::RangeTooLarge {
                        from: from_block,
                        to: to_block,
                    });
                }
            }
            return Err(AgoraError::upstream(format!(
                "ledger gateway returned {status} for escalation query"
            )));
        }

        let wire: Vec<WireEscalation> = response.json().await.map_err(AgoraError::upstream)?;
        wire.into_iter()
            .map(|w| {
                let task_id = TaskId::parse(&w.task_id)
                    .map_err(|e| AgoraError::upstream(format!("bad task id in event log: {e}")))?;
                Ok(EscalationEvent {
                    case_id: CaseId::new(&w.case_id),
                    task_id,
                    block_number: w.block_number,
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireHead {
    block_number: u64,
}

#[async_trait::async_trait]
impl ChainReader for LedgerGateway {
    async fn head_block(&self) -> Result<u64> {
        let head: WireHead = self.get_json("/head").await?;
        Ok(head.block_number)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSettlement {
    settled: bool,
}

#[async_trait::async_trait]
impl SettlementReader for LedgerGateway {
    async fn is_settled(&self, case: &CaseId) -> Result<bool> {
        let status: WireSettlement = self.get_json(&format!("/settlements/{case}")).await?;
        Ok(status.settled)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireArbitrationConfig {
    liveness_seconds: u64,
}

#[async_trait::async_trait]
impl ArbitrationConfigReader for LedgerGateway {
    async fn liveness_seconds(&self) -> Result<u64> {
        let config: WireArbitrationConfig = self.get_json("/arbitration-config").await?;
        Ok(config.liveness_seconds)
    }
}

#[async_trait::async_trait]
impl ResolutionDispatcher for LedgerGateway {
    async fn dispatch(&self, case: &DisputeCase) -> Result<()> {
        let response = self
            .client
            .post(self.url("/resolutions"))
            .json(&serde_json::json!({
                "caseId": case.case_id.to_string(),
                "taskId": case.task_id.to_string(),
            }))
            .send()
            .await
            .map_err(classify_transport)?;
        if !response.status().is_success() {
            return Err(AgoraError::upstream(format!(
                "ledger gateway rejected resolution: {}",
                response.status()
            )));
        }
        Ok(())
    }
}
