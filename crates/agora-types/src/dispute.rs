//! Dispute-escalation types
//!
//! A dispute case is materialized transiently from ledger events on every
//! scan; nothing here is the ledger's own state machine. Resolvability is a
//! pure function of elapsed blocks against the case's liveness window.

use crate::{CaseId, TaskId};
use serde::{Deserialize, Serialize};

/// Dispute case status as seen by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeStatus {
    /// Escalated on-ledger, liveness window still running
    Escalated,
    /// Liveness window elapsed; eligible for resolution dispatch
    Resolvable,
    /// Resolution dispatched (and marked in the idempotency store)
    Resolved,
}

/// An escalated disagreement over task outcome, subject to an arbitration window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeCase {
    pub task_id: TaskId,
    pub case_id: CaseId,
    /// Block at which the escalation was recorded on-ledger
    pub escalation_block: u64,
    /// Minimum elapsed time before the case becomes resolvable
    pub liveness_seconds: u64,
    pub status: DisputeStatus,
}

impl DisputeCase {
    /// Blocks that must elapse before the case is resolvable
    pub fn required_blocks(&self, block_time_seconds: u64) -> u64 {
        self.liveness_seconds.div_ceil(block_time_seconds)
    }

    /// resolvable ⟺ (current_block − escalation_block) ≥ required_blocks
    pub fn is_resolvable(&self, current_block: u64, block_time_seconds: u64) -> bool {
        current_block.saturating_sub(self.escalation_block)
            >= self.required_blocks(block_time_seconds)
    }
}

/// A dispute-escalation entry read from the external event log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationEvent {
    pub case_id: CaseId,
    pub task_id: TaskId,
    /// Block the escalation landed in
    pub block_number: u64,
}
