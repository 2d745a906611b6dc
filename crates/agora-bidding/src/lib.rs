//! Agora Bidding - Deterministic pricing run inside each agent
//!
//! A bidding policy is a pure function of (agent profile, task spec, observed
//! market state). No clocks, no randomness: identical inputs always produce
//! identical quotes, which is what makes retries idempotent and tests
//! reproducible.
//!
//! Pricing rules:
//!
//! - Baseline (no rival prices known): `ask = base_rate + margin`.
//! - Competitive (lowest rival price `P` known): the agent undercuts by one
//!   unit, `ask = max(floor, P - 1)`. When `P - 1` falls below the floor the
//!   agent holds at its floor instead of racing to zero; bidding the floor is
//!   a deliberate "cannot profitably undercut further" signal.
//! - The floor scales with the candidate ask (`ceil(ask * floor_pct / 100)`)
//!   but never drops below the agent's base rate.
//!
//! Real agents, simulators, and test doubles all implement [`BiddingPolicy`],
//! so the coordinator never needs to know which kind it is talking to.

use agora_types::AgentId;
use serde::{Deserialize, Serialize};

/// Static pricing parameters of one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_id: AgentId,
    /// Cost baseline, smallest currency unit; also the hard lower bound of the floor
    pub base_rate: u64,
    /// Profit margin added on top of the base rate for the opening ask
    pub margin: u64,
    /// Floor as a percentage of the current ask
    pub floor_pct: u64,
    /// Fixed collateral the agent stakes per offer
    pub stake: u64,
}

/// Market observations available to the policy at quote time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketState {
    /// Lowest ask seen from rival agents, if any
    pub lowest_competing_price: Option<u64>,
}

impl MarketState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_competing_prices(prices: impl IntoIterator<Item = u64>) -> Self {
        Self {
            lowest_competing_price: prices.into_iter().min(),
        }
    }
}

/// A policy's priced answer for one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub agent_id: AgentId,
    pub ask: u64,
    /// Minimum acceptable amount; `ask >= floor` always holds
    pub floor: u64,
    pub stake: u64,
}

/// Deterministic pricing function of (agent, task spec, market state)
pub trait BiddingPolicy: Send + Sync {
    fn quote(&self, task_spec: &serde_json::Value, market: &MarketState) -> Quote;
}

/// The standard competitive policy described in the module docs
#[derive(Debug, Clone)]
pub struct CompetitivePolicy {
    profile: AgentProfile,
}

impl CompetitivePolicy {
    pub fn new(profile: AgentProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    /// Floor for a given ask: a fixed fraction of it, never below base rate.
    /// Widened math: rival prices come off the wire and can sit near u64::MAX.
    fn floor_for(&self, ask: u64) -> u64 {
        let fraction = (u128::from(ask) * u128::from(self.profile.floor_pct)).div_ceil(100);
        u64::try_from(fraction)
            .unwrap_or(u64::MAX)
            .max(self.profile.base_rate)
    }
}

impl BiddingPolicy for CompetitivePolicy {
    fn quote(&self, _task_spec: &serde_json::Value, market: &MarketState) -> Quote {
        let (ask, floor) = match market.lowest_competing_price {
            None => {
                let ask = self.profile.base_rate + self.profile.margin;
                (ask, self.floor_for(ask))
            }
            Some(lowest) => {
                let candidate = lowest.saturating_sub(1);
                let floor = self.floor_for(candidate);
                (candidate.max(floor), floor)
            }
        };

        Quote {
            agent_id: self.profile.agent_id.clone(),
            ask,
            floor,
            stake: self.profile.stake,
        }
    }
}
