//! Agora Types - Canonical domain types for the task negotiation core
//!
//! This crate contains all foundational types for Agora with zero dependencies
//! on other agora crates. It defines the complete type system for:
//!
//! - Identity types (AuctionId, AgentId, TaskId, CaseId)
//! - Auction, offer, and agreed-terms types
//! - Dispute-escalation types
//! - The error taxonomy shared by every component
//!
//! # Architectural Invariants
//!
//! 1. An auction holds at most one accepted offer at any time
//! 2. An offer's ask price is never below its own floor
//! 3. Offer ranking is a pure function of the current offer set
//! 4. A dispute case is resolved at most once, across restarts

pub mod auction;
pub mod dispute;
pub mod error;
pub mod identity;

pub use auction::*;
pub use dispute::*;
pub use error::*;
pub use identity::*;

/// Version of the Agora types schema
pub const TYPES_VERSION: &str = "0.1.0";
