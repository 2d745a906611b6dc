//! Agora Auction - Auction lifecycle and offer ranking
//!
//! The [`AuctionBook`] is the injected store that owns every live auction.
//! All mutation goes through its write lock, which serializes accepts per
//! book: the loser of a concurrent accept race gets a deterministic conflict
//! instead of a torn state. Ranking is a pure function of the offer set.
//!
//! Auctions are discarded, not destroyed, after acceptance or deadline
//! expiry: they stay readable but take no further offers or accepts.

pub mod finalize;

pub use finalize::AcceptanceFinalizer;

use std::collections::HashMap;
use std::sync::Arc;

use agora_types::{
    AgentId, AgoraError, AgreedTerms, Auction, AuctionId, AuctionStatus, Offer, Result,
};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// An offer as it arrives from collection, before the book stamps arrival order
#[derive(Debug, Clone)]
pub struct IncomingOffer {
    pub agent_id: AgentId,
    pub ask: u64,
    pub floor: u64,
    pub stake: u64,
    pub trust_score: u8,
}

/// In-memory store of live auctions
pub struct AuctionBook {
    auctions: Arc<RwLock<HashMap<AuctionId, Auction>>>,
    finalizer: AcceptanceFinalizer,
}

impl AuctionBook {
    pub fn new() -> Self {
        Self {
            auctions: Arc::new(RwLock::new(HashMap::new())),
            finalizer: AcceptanceFinalizer::new(),
        }
    }

    /// Open a new auction. The deadline must be strictly in the future and
    /// the payment token non-empty.
    pub async fn create(
        &self,
        payment_token: impl Into<String>,
        task_deadline: DateTime<Utc>,
        task_spec: serde_json::Value,
    ) -> Result<AuctionId> {
        let payment_token = payment_token.into();
        if payment_token.trim().is_empty() {
            return Err(AgoraError::validation("paymentToken", "must not be empty"));
        }
        let now = Utc::now();
        if task_deadline <= now {
            return Err(AgoraError::validation(
                "taskDeadline",
                "must be strictly in the future",
            ));
        }

        let auction = Auction {
            id: AuctionId::new(),
            payment_token,
            task_deadline,
            task_spec,
            status: AuctionStatus::Open,
            created_at: now,
            offers: HashMap::new(),
            next_seq: 0,
        };
        let id = auction.id.clone();
        self.auctions.write().await.insert(id.clone(), auction);
        info!(auction = %id, "auction opened");
        Ok(id)
    }

    /// Record (or replace) an agent's offer. A re-offer by the same agent
    /// supersedes its previous entry and takes a fresh arrival sequence.
    pub async fn record_offer(&self, auction_id: &AuctionId, incoming: IncomingOffer) -> Result<()> {
        if incoming.ask < incoming.floor {
            return Err(AgoraError::validation(
                "ask",
                format!("ask {} is below floor {}", incoming.ask, incoming.floor),
            ));
        }

        let mut auctions = self.auctions.write().await;
        let auction = auctions
            .get_mut(auction_id)
            .ok_or_else(|| AgoraError::AuctionNotFound {
                auction_id: auction_id.to_string(),
            })?;

        Self::check_still_open(auction, Utc::now())?;

        let seq = auction.next_seq;
        auction.next_seq += 1;
        let agent_id = incoming.agent_id.clone();
        auction.offers.insert(
            agent_id.clone(),
            Offer {
                agent_id,
                ask: incoming.ask,
                floor: incoming.floor,
                stake: incoming.stake,
                trust_score: incoming.trust_score,
                received_at: Utc::now(),
                arrival_seq: seq,
            },
        );
        debug!(auction = %auction_id, offers = auction.offers.len(), "offer recorded");
        Ok(())
    }

    /// Current offers sorted ascending by ask price, ties broken by
    /// descending trust score, then by earliest arrival.
    pub async fn list_offers(&self, auction_id: &AuctionId) -> Result<Vec<Offer>> {
        let auctions = self.auctions.read().await;
        let auction = auctions
            .get(auction_id)
            .ok_or_else(|| AgoraError::AuctionNotFound {
                auction_id: auction_id.to_string(),
            })?;
        Ok(auction.ranked_offers())
    }

    /// Accept one offer and lock in agreed terms. Fails with a conflict when
    /// the submitted price no longer matches the agent's current ask, and
    /// always fails once the auction has been accepted before. The status
    /// check and transition happen under a single write guard.
    pub async fn accept(
        &self,
        auction_id: &AuctionId,
        agent_id: &AgentId,
        accepted_price: u64,
    ) -> Result<AgreedTerms> {
        let mut auctions = self.auctions.write().await;
        let auction = auctions
            .get_mut(auction_id)
            .ok_or_else(|| AgoraError::AuctionNotFound {
                auction_id: auction_id.to_string(),
            })?;

        Self::check_still_open(auction, Utc::now())?;

        let terms = self.finalizer.finalize(auction, agent_id, accepted_price)?;
        auction.status = AuctionStatus::Accepted;
        info!(auction = %auction_id, agent = %agent_id, amount = terms.payment_amount, "offer accepted");
        Ok(terms)
    }

    /// Snapshot of one auction
    pub async fn get(&self, auction_id: &AuctionId) -> Result<Auction> {
        self.auctions
            .read()
            .await
            .get(auction_id)
            .cloned()
            .ok_or_else(|| AgoraError::AuctionNotFound {
                auction_id: auction_id.to_string(),
            })
    }

    fn check_still_open(auction: &mut Auction, now: DateTime<Utc>) -> Result<()> {
        match auction.status {
            AuctionStatus::Accepted => Err(AgoraError::AuctionAlreadyAccepted {
                auction_id: auction.id.to_string(),
            }),
            AuctionStatus::Expired => Err(AgoraError::AuctionExpired {
                auction_id: auction.id.to_string(),
                deadline: auction.task_deadline.to_rfc3339(),
            }),
            AuctionStatus::Open if now >= auction.task_deadline => {
                auction.status = AuctionStatus::Expired;
                Err(AgoraError::AuctionExpired {
                    auction_id: auction.id.to_string(),
                    deadline: auction.task_deadline.to_rfc3339(),
                })
            }
            AuctionStatus::Open => Ok(()),
        }
    }
}

impl Default for AuctionBook {
    fn default() -> Self {
        Self::new()
    }
}
