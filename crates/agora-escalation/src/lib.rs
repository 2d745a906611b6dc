//! Agora Escalation - Dispute monitoring over an append-only event log
//!
//! The monitor periodically scans the external ledger's event log, from a
//! persisted checkpoint to the current chain head, for dispute-escalation
//! entries. Providers impose a maximum query range: on a "range too large"
//! rejection the monitor halves its window and retries recursively until the
//! provider accepts, then keeps scanning at that width. The checkpoint is
//! persisted after every successful chunk, so a crash mid-scan resumes
//! without re-scanning or skipping blocks. Any failure that is not a range
//! rejection propagates unmodified - no blind retry on unrelated errors.
//!
//! A case is resolvable once `ceil(liveness_seconds / block_time_seconds)`
//! blocks have elapsed since its escalation block. Settlement status is read
//! per case for reporting only; it never gates resolvability.

pub mod checkpoint;
pub mod resolver;

pub use checkpoint::{CheckpointStore, MemoryCheckpointStore, SledCheckpointStore};
pub use resolver::{DisputeResolver, ResolutionDispatcher, ResolutionOutcome};

use std::sync::Arc;

use agora_types::{AgoraError, CaseId, DisputeCase, DisputeStatus, EscalationEvent, Result};
use futures::future::BoxFuture;
use tracing::{debug, info, warn};

/// Reader over the ledger's append-only event log
#[async_trait::async_trait]
pub trait EventLogReader: Send + Sync {
    /// Dispute-escalation entries in the inclusive block range. May fail
    /// with [`AgoraError::RangeTooLarge`] when the range exceeds the
    /// provider's accepted width.
    async fn escalations(&self, from_block: u64, to_block: u64) -> Result<Vec<EscalationEvent>>;
}

/// Reader of the chain head
#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
    async fn head_block(&self) -> Result<u64>;
}

/// Informational read of external settlement status per case
#[async_trait::async_trait]
pub trait SettlementReader: Send + Sync {
    async fn is_settled(&self, case: &CaseId) -> Result<bool>;
}

/// Arbitration configuration owned by the ledger collaborator
#[async_trait::async_trait]
pub trait ArbitrationConfigReader: Send + Sync {
    /// Liveness duration a case must wait out before resolution
    async fn liveness_seconds(&self) -> Result<u64>;
}

/// Local monitor tuning
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Average block interval of the ledger chain
    pub block_time_seconds: u64,
    /// Width of the first log query; shrinks on provider rejection
    pub initial_chunk_size: u64,
    /// Block to start from when no checkpoint exists yet
    pub genesis_block: u64,
}

impl MonitorConfig {
    fn validate(&self) -> Result<()> {
        if self.block_time_seconds == 0 {
            return Err(AgoraError::validation("blockTimeSeconds", "must be positive"));
        }
        if self.initial_chunk_size == 0 {
            return Err(AgoraError::validation("initialChunkSize", "must be positive"));
        }
        Ok(())
    }
}

/// One case as seen by a scan
#[derive(Debug, Clone)]
pub struct CaseReport {
    pub case: DisputeCase,
    pub resolvable: bool,
    /// Informational settlement flag; `None` when the read failed
    pub settled: Option<bool>,
}

/// Outcome of one scan run
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub from_block: u64,
    pub to_block: u64,
    pub resolvable: Vec<CaseReport>,
    pub pending: Vec<CaseReport>,
}

impl ScanReport {
    pub fn total_cases(&self) -> usize {
        self.resolvable.len() + self.pending.len()
    }
}

/// Scans the ledger for disputes past their arbitration window
pub struct EscalationMonitor {
    log: Arc<dyn EventLogReader>,
    chain: Arc<dyn ChainReader>,
    settlement: Arc<dyn SettlementReader>,
    arbitration: Arc<dyn ArbitrationConfigReader>,
    checkpoint: Arc<dyn CheckpointStore>,
    config: MonitorConfig,
}

impl EscalationMonitor {
    pub fn new(
        log: Arc<dyn EventLogReader>,
        chain: Arc<dyn ChainReader>,
        settlement: Arc<dyn SettlementReader>,
        arbitration: Arc<dyn ArbitrationConfigReader>,
        checkpoint: Arc<dyn CheckpointStore>,
        config: MonitorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            log,
            chain,
            settlement,
            arbitration,
            checkpoint,
            config,
        })
    }

    /// One scan run: walk (checkpoint, head] in chunks and classify every
    /// escalated case found. Sequential within the run, restartable across
    /// runs via the persisted checkpoint.
    pub async fn scan(&self) -> Result<ScanReport> {
        let head = self.chain.head_block().await?;
        let from = match self.checkpoint.load().await? {
            Some(last) => last + 1,
            None => self.config.genesis_block,
        };

        if from > head {
            debug!(from, head, "nothing new to scan");
            return Ok(ScanReport {
                from_block: from,
                to_block: head,
                ..Default::default()
            });
        }

        let liveness_seconds = self.arbitration.liveness_seconds().await?;
        let mut events = Vec::new();
        let mut chunk = self.config.initial_chunk_size;
        let mut cursor = from;

        while cursor <= head {
            let to = cursor.saturating_add(chunk - 1).min(head);
            let (chunk_events, accepted_to) = self.fetch_shrinking(cursor, to).await?;
            // Continue at the width the provider last accepted.
            chunk = accepted_to - cursor + 1;
            events.extend(chunk_events);
            self.checkpoint.store(accepted_to).await?;
            cursor = accepted_to + 1;
        }

        let report = self.classify(events, head, liveness_seconds, from).await;
        info!(
            from,
            head,
            resolvable = report.resolvable.len(),
            pending = report.pending.len(),
            "escalation scan complete"
        );
        Ok(report)
    }

    /// Query `[from, to]`, halving the window on RangeTooLarge until the
    /// provider accepts it. Returns the events plus the upper bound actually
    /// covered. Every other error propagates unmodified.
    fn fetch_shrinking(
        &self,
        from: u64,
        to: u64,
    ) -> BoxFuture<'_, Result<(Vec<EscalationEvent>, u64)>> {
        Box::pin(async move {
            match self.log.escalations(from, to).await {
                Ok(events) => Ok((events, to)),
                Err(AgoraError::RangeTooLarge { .. }) => {
                    let width = to - from + 1;
                    if width <= 1 {
                        // Provider rejects even a single block: shrink is exhausted.
                        return Err(AgoraError::unavailable(
                            "event-log",
                            format!("provider rejects single-block query at {from}"),
                        ));
                    }
                    let halved_to = from + width / 2 - 1;
                    debug!(from, to, halved_to, "log range rejected, halving window");
                    self.fetch_shrinking(from, halved_to).await
                }
                Err(other) => Err(other),
            }
        })
    }

    async fn classify(
        &self,
        events: Vec<EscalationEvent>,
        head: u64,
        liveness_seconds: u64,
        from: u64,
    ) -> ScanReport {
        let mut report = ScanReport {
            from_block: from,
            to_block: head,
            ..Default::default()
        };

        for event in events {
            let mut case = DisputeCase {
                task_id: event.task_id,
                case_id: event.case_id,
                escalation_block: event.block_number,
                liveness_seconds,
                status: DisputeStatus::Escalated,
            };
            let resolvable = case.is_resolvable(head, self.config.block_time_seconds);

            // Reported alongside resolvability, never gating it.
            let settled = match self.settlement.is_settled(&case.case_id).await {
                Ok(flag) => Some(flag),
                Err(err) => {
                    warn!(case = %case.case_id, error = %err, "settlement status read failed");
                    None
                }
            };

            let entry = if resolvable {
                case.status = DisputeStatus::Resolvable;
                &mut report.resolvable
            } else {
                &mut report.pending
            };
            entry.push(CaseReport {
                case,
                resolvable,
                settled,
            });
        }
        report
    }
}
