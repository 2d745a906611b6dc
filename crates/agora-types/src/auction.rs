//! Auction, offer, and agreed-terms types
//!
//! Prices are non-negative integers in the smallest currency unit. The
//! auction itself is a plain data record; lifecycle rules (single accept,
//! deadline expiry, offer replacement) are enforced by the auction book.

use crate::{AgentId, AuctionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Auction lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionStatus {
    /// Accepting offers until the task deadline
    Open,
    /// One offer accepted; all others implicitly void
    Accepted,
    /// Task deadline passed without acceptance
    Expired,
}

/// A single agent's priced offer against one auction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub agent_id: AgentId,
    /// Ask price, smallest currency unit
    pub ask: u64,
    /// Minimum acceptable amount; ask is never below this
    pub floor: u64,
    /// Collateral the agent puts up alongside the offer
    pub stake: u64,
    /// Trust score snapshot taken when the offer was recorded
    pub trust_score: u8,
    pub received_at: DateTime<Utc>,
    /// Monotonic arrival sequence within the auction, for tie-breaks
    pub arrival_seq: u64,
}

/// A time-bounded request for competitive price offers against one task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    pub payment_token: String,
    pub task_deadline: DateTime<Utc>,
    /// Opaque task specification, passed through to agents verbatim
    pub task_spec: serde_json::Value,
    pub status: AuctionStatus,
    pub created_at: DateTime<Utc>,
    /// Current offer per agent; a re-offer replaces the previous entry
    pub offers: HashMap<AgentId, Offer>,
    /// Next arrival sequence to hand out
    pub next_seq: u64,
}

impl Auction {
    /// Whether the auction can still take offers at `now`
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == AuctionStatus::Open && now < self.task_deadline
    }

    /// Offers sorted ascending by ask, ties by descending trust score,
    /// then by earliest arrival. Pure function of the current offer set.
    pub fn ranked_offers(&self) -> Vec<Offer> {
        let mut offers: Vec<Offer> = self.offers.values().cloned().collect();
        offers.sort_by(|a, b| {
            a.ask
                .cmp(&b.ask)
                .then(b.trust_score.cmp(&a.trust_score))
                .then(a.arrival_seq.cmp(&b.arrival_seq))
        });
        offers
    }
}

/// The finalized terms bound to one accepted offer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreedTerms {
    pub auction_id: AuctionId,
    pub agent_id: AgentId,
    pub payment_amount: u64,
    pub payment_token: String,
    pub deadline: DateTime<Utc>,
    pub stake: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn offer(agent: AgentId, ask: u64, trust: u8, seq: u64) -> Offer {
        Offer {
            agent_id: agent,
            ask,
            floor: ask / 2,
            stake: 50,
            trust_score: trust,
            received_at: Utc::now(),
            arrival_seq: seq,
        }
    }

    fn auction_with(offers: Vec<Offer>) -> Auction {
        let mut map = HashMap::new();
        let next_seq = offers.len() as u64;
        for o in offers {
            map.insert(o.agent_id.clone(), o);
        }
        Auction {
            id: AuctionId::new(),
            payment_token: "USDT".to_string(),
            task_deadline: Utc::now() + Duration::hours(1),
            task_spec: serde_json::json!({}),
            status: AuctionStatus::Open,
            created_at: Utc::now(),
            offers: map,
            next_seq,
        }
    }

    #[test]
    fn ranking_is_ascending_by_ask() {
        let a = AgentId::new();
        let b = AgentId::new();
        let auction = auction_with(vec![offer(a.clone(), 199, 50, 1), offer(b.clone(), 160, 50, 0)]);

        let ranked = auction.ranked_offers();
        assert_eq!(ranked[0].agent_id, b);
        assert_eq!(ranked[0].ask, 160);
        assert_eq!(ranked[1].ask, 199);
    }

    #[test]
    fn price_ties_break_on_trust_then_arrival() {
        let low_trust_early = AgentId::new();
        let high_trust_late = AgentId::new();
        let low_trust_late = AgentId::new();
        let auction = auction_with(vec![
            offer(low_trust_early.clone(), 100, 40, 0),
            offer(high_trust_late.clone(), 100, 90, 1),
            offer(low_trust_late.clone(), 100, 40, 2),
        ]);

        let ranked = auction.ranked_offers();
        assert_eq!(ranked[0].agent_id, high_trust_late);
        assert_eq!(ranked[1].agent_id, low_trust_early);
        assert_eq!(ranked[2].agent_id, low_trust_late);
    }

    #[test]
    fn expired_deadline_closes_the_auction() {
        let mut auction = auction_with(vec![]);
        auction.task_deadline = Utc::now() - Duration::seconds(1);
        assert!(!auction.is_open(Utc::now()));
    }
}
