//! Error types for Agora
//!
//! One taxonomy for the whole core. Validation, not-found, and conflict
//! errors surface to the caller untouched and are never retried. Transient
//! provider errors are retried locally (chunk shrink, bounded backoff) and
//! surface as `Unavailable` on exhaustion. Anything else from a collaborator
//! is wrapped as `Upstream` and propagated unmodified, never swallowed.

use thiserror::Error;

/// Result type for Agora operations
pub type Result<T> = std::result::Result<T, AgoraError>;

/// Agora error types
#[derive(Debug, Clone, Error)]
pub enum AgoraError {
    // ========================================================================
    // Validation Errors
    // ========================================================================

    /// Malformed or missing required field
    #[error("Invalid input: {field} - {reason}")]
    Validation { field: String, reason: String },

    // ========================================================================
    // Not-Found Errors
    // ========================================================================

    /// Auction not found
    #[error("Auction {auction_id} not found")]
    AuctionNotFound { auction_id: String },

    /// No offer recorded for the agent in the auction
    #[error("No offer from agent {agent_id} in auction {auction_id}")]
    OfferNotFound {
        auction_id: String,
        agent_id: String,
    },

    /// Agent unknown to the collaborator that was asked about it
    #[error("Agent {agent_id} not found")]
    AgentNotFound { agent_id: String },

    // ========================================================================
    // Conflict Errors
    // ========================================================================

    /// Auction already has an accepted offer
    #[error("Auction {auction_id} has already been accepted")]
    AuctionAlreadyAccepted { auction_id: String },

    /// Auction deadline has passed
    #[error("Auction {auction_id} expired at {deadline}")]
    AuctionExpired {
        auction_id: String,
        deadline: String,
    },

    /// Accepted price does not match the agent's current ask
    #[error("Stale price for agent {agent_id}: submitted {submitted}, current ask {current}")]
    StalePrice {
        agent_id: String,
        submitted: u64,
        current: u64,
    },

    // ========================================================================
    // Transient Provider Errors
    // ========================================================================

    /// Provider rejected the queried block range as too large
    #[error("Log range [{from}, {to}] exceeds provider limit")]
    RangeTooLarge { from: u64, to: u64 },

    /// Bounded timeout elapsed on an external call
    #[error("Timed out waiting for {operation}")]
    Timeout { operation: String },

    /// Provider rate limit hit
    #[error("Rate limited by {service}")]
    RateLimited { service: String },

    // ========================================================================
    // Availability Errors
    // ========================================================================

    /// Service-unavailable condition (e.g. zero well-formed offers, retry exhaustion)
    #[error("{service} unavailable: {reason}")]
    Unavailable { service: String, reason: String },

    // ========================================================================
    // Upstream & Storage Errors
    // ========================================================================

    /// Unclassified collaborator failure, propagated unmodified
    #[error("Upstream failure: {source_detail}")]
    Upstream { source_detail: String },

    /// Durable storage fault
    #[error("Storage fault: {reason}")]
    Storage { reason: String },
}

impl AgoraError {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an unavailable error
    pub fn unavailable(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Wrap an unclassified collaborator failure
    pub fn upstream(err: impl std::fmt::Display) -> Self {
        Self::Upstream {
            source_detail: err.to_string(),
        }
    }

    /// Create a storage fault
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage {
            reason: err.to_string(),
        }
    }

    /// Transient provider errors are retried locally; everything else is not
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RangeTooLarge { .. } | Self::Timeout { .. } | Self::RateLimited { .. }
        )
    }

    /// Conflict errors require the caller to re-fetch current state
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AuctionAlreadyAccepted { .. }
                | Self::AuctionExpired { .. }
                | Self::StalePrice { .. }
        )
    }

    /// Get an error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "INVALID_INPUT",
            Self::AuctionNotFound { .. } => "AUCTION_NOT_FOUND",
            Self::OfferNotFound { .. } => "OFFER_NOT_FOUND",
            Self::AgentNotFound { .. } => "AGENT_NOT_FOUND",
            Self::AuctionAlreadyAccepted { .. } => "AUCTION_ALREADY_ACCEPTED",
            Self::AuctionExpired { .. } => "AUCTION_EXPIRED",
            Self::StalePrice { .. } => "STALE_PRICE",
            Self::RangeTooLarge { .. } => "RANGE_TOO_LARGE",
            Self::Timeout { .. } => "TIMEOUT",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Unavailable { .. } => "UNAVAILABLE",
            Self::Upstream { .. } => "UPSTREAM_FAILURE",
            Self::Storage { .. } => "STORAGE_FAULT",
        }
    }
}
