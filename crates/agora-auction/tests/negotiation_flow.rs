//! End-to-end negotiation flow: deterministic quotes feed an auction,
//! ranking picks the cheapest, and acceptance locks in agreed terms.

use agora_auction::{AuctionBook, IncomingOffer};
use agora_bidding::{AgentProfile, BiddingPolicy, CompetitivePolicy, MarketState};
use agora_types::AgentId;
use chrono::{Duration, Utc};

fn policy(base_rate: u64) -> CompetitivePolicy {
    CompetitivePolicy::new(AgentProfile {
        agent_id: AgentId::new(),
        base_rate,
        margin: 50,
        floor_pct: 60,
        stake: 50,
    })
}

fn offer_from(policy: &CompetitivePolicy, market: &MarketState, trust: u8) -> IncomingOffer {
    let q = policy.quote(&serde_json::json!({"task": "transcribe"}), market);
    IncomingOffer {
        agent_id: q.agent_id,
        ask: q.ask,
        floor: q.floor,
        stake: q.stake,
        trust_score: trust,
    }
}

#[tokio::test]
async fn cheapest_quote_wins_and_finalizes_at_its_price() {
    let book = AuctionBook::new();
    let auction_id = book
        .create(
            "USDT",
            Utc::now() + Duration::hours(4),
            serde_json::json!({"task": "transcribe", "minutes": 90}),
        )
        .await
        .unwrap();

    // First agent prices the task fresh: 110 + 50 = 160, floor 110.
    let fresh = policy(110);
    let fresh_offer = offer_from(&fresh, &MarketState::empty(), 55);
    let winner = fresh_offer.agent_id.clone();
    assert_eq!((fresh_offer.ask, fresh_offer.floor, fresh_offer.stake), (160, 110, 50));
    book.record_offer(&auction_id, fresh_offer).await.unwrap();

    // Second agent only knows a rival at 200 and undercuts to 199, floor 120.
    let undercutter = policy(110);
    let undercut_offer = offer_from(
        &undercutter,
        &MarketState::with_competing_prices([200]),
        90,
    );
    assert_eq!((undercut_offer.ask, undercut_offer.floor), (199, 120));
    book.record_offer(&auction_id, undercut_offer).await.unwrap();

    // Ranking puts 160 ahead of 199 despite the lower trust score.
    let ranked = book.list_offers(&auction_id).await.unwrap();
    assert_eq!(ranked[0].ask, 160);
    assert_eq!(ranked[0].agent_id, winner);

    // Accepting the best offer returns terms at its price and token.
    let terms = book.accept(&auction_id, &winner, 160).await.unwrap();
    assert_eq!(terms.payment_amount, 160);
    assert_eq!(terms.payment_token, "USDT");
    assert_eq!(terms.stake, 50);
    assert_eq!(terms.agent_id, winner);

    // The losing offer is implicitly void: no further accept can land.
    let loser = ranked[1].agent_id.clone();
    assert!(book.accept(&auction_id, &loser, 199).await.is_err());
}

#[tokio::test]
async fn requoting_after_the_market_moves_requires_a_fresh_accept_price() {
    let book = AuctionBook::new();
    let auction_id = book
        .create("USDC", Utc::now() + Duration::hours(1), serde_json::json!({}))
        .await
        .unwrap();

    let agent = policy(110);
    let first = offer_from(&agent, &MarketState::empty(), 50);
    let agent_id = first.agent_id.clone();
    book.record_offer(&auction_id, first).await.unwrap();

    // The agent sees a rival at 150 and re-quotes down to 149.
    let requote = offer_from(&agent, &MarketState::with_competing_prices([150]), 50);
    assert_eq!(requote.ask, 149);
    book.record_offer(&auction_id, requote).await.unwrap();

    // The requester still holding the old 160 price gets a conflict...
    let stale = book.accept(&auction_id, &agent_id, 160).await.unwrap_err();
    assert_eq!(stale.error_code(), "STALE_PRICE");

    // ...and succeeds after re-fetching the current price.
    let current = book.list_offers(&auction_id).await.unwrap()[0].ask;
    let terms = book.accept(&auction_id, &agent_id, current).await.unwrap();
    assert_eq!(terms.payment_amount, 149);
}
