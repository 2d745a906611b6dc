//! Acceptance finalization
//!
//! Logically part of the accept path, but separable so it can be tested and
//! reused without the auction book's storage. The finalizer re-validates that
//! the offer being accepted is still the agent's current offer before locking
//! it in as agreed terms.

use agora_types::{AgentId, AgoraError, AgreedTerms, Auction, Result};

/// Validates a pending acceptance and produces the agreed terms
#[derive(Debug, Default)]
pub struct AcceptanceFinalizer;

impl AcceptanceFinalizer {
    pub fn new() -> Self {
        Self
    }

    /// Re-validate `(agent, accepted_price)` against the auction's current
    /// offer set and stamp the terms. Does not mutate the auction; the
    /// caller owns the status transition.
    pub fn finalize(
        &self,
        auction: &Auction,
        agent_id: &AgentId,
        accepted_price: u64,
    ) -> Result<AgreedTerms> {
        let offer = auction
            .offers
            .get(agent_id)
            .ok_or_else(|| AgoraError::OfferNotFound {
                auction_id: auction.id.to_string(),
                agent_id: agent_id.to_string(),
            })?;

        // Guards against accepting a price the agent has since superseded.
        if offer.ask != accepted_price {
            return Err(AgoraError::StalePrice {
                agent_id: agent_id.to_string(),
                submitted: accepted_price,
                current: offer.ask,
            });
        }

        Ok(AgreedTerms {
            auction_id: auction.id.clone(),
            agent_id: agent_id.clone(),
            payment_amount: offer.ask,
            payment_token: auction.payment_token.clone(),
            deadline: auction.task_deadline,
            stake: offer.stake,
        })
    }
}
