//! Agora Agent Daemon
//!
//! Hosts one worker agent behind the surface the offer collector consumes:
//! `POST /auction/join` prices a fresh solicitation, `POST /bid` re-prices
//! against observed market state. All pricing goes through the deterministic
//! bidding policy, so the daemon gives identical answers to identical
//! requests. Amounts are string-encoded integers on the wire.

use std::net::SocketAddr;
use std::sync::Arc;

use agora_bidding::{AgentProfile, BiddingPolicy, CompetitivePolicy, MarketState};
use agora_types::AgentId;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

struct AppState {
    policy: CompetitivePolicy,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let profile = profile_from_env()?;
    info!(
        agent = %profile.agent_id,
        base_rate = profile.base_rate,
        margin = profile.margin,
        floor_pct = profile.floor_pct,
        stake = profile.stake,
        "agent profile loaded"
    );
    let state = Arc::new(AppState {
        policy: CompetitivePolicy::new(profile),
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/auction/join", post(join))
        .route("/bid", post(bid))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = std::env::var("AGORA_AGENT_BIND")
        .unwrap_or_else(|_| "0.0.0.0:3101".to_string())
        .parse()?;
    info!(%addr, "agora-agentd listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn profile_from_env() -> anyhow::Result<AgentProfile> {
    let agent_id = match std::env::var("AGORA_AGENT_ID") {
        Ok(raw) => AgentId::parse(&raw)
            .map_err(|e| anyhow::anyhow!("AGORA_AGENT_ID is not a valid id: {e}"))?,
        Err(_) => AgentId::new(),
    };
    Ok(AgentProfile {
        agent_id,
        base_rate: env_u64("AGORA_AGENT_BASE_RATE", 110)?,
        margin: env_u64("AGORA_AGENT_MARGIN", 50)?,
        floor_pct: env_u64("AGORA_AGENT_FLOOR_PCT", 60)?,
        stake: env_u64("AGORA_AGENT_STAKE", 50)?,
    })
}

fn env_u64(key: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|e| anyhow::anyhow!("{key} must be a non-negative integer: {e}")),
        Err(_) => Ok(default),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Price a fresh solicitation. 400 when `auctionId` is missing.
async fn join(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let auction_id = body
        .get("auctionId")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty());
    if auction_id.is_none() {
        return Err(bad_request("auctionId is required"));
    }

    let task_spec = body.get("taskSpec").cloned().unwrap_or(serde_json::Value::Null);
    let quote = state.policy.quote(&task_spec, &MarketState::empty());
    Ok(Json(serde_json::json!({
        "agentId": quote.agent_id.to_string(),
        "ask": quote.ask.to_string(),
        "minAmount": quote.floor.to_string(),
        "stakeAmount": quote.stake.to_string(),
    })))
}

/// Re-price against observed market state
async fn bid(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let market = market_from(&body);
    let task_spec = body.get("taskSpec").cloned().unwrap_or(serde_json::Value::Null);
    let quote = state.policy.quote(&task_spec, &market);
    Json(serde_json::json!({
        "agentId": quote.agent_id.to_string(),
        "ask": quote.ask.to_string(),
        "minAmount": quote.floor.to_string(),
    }))
}

/// Pull `marketState.competingPrices[].price` out of the request, tolerating
/// string or numeric encodings and ignoring entries that parse to neither.
fn market_from(body: &serde_json::Value) -> MarketState {
    let prices = body
        .get("marketState")
        .and_then(|m| m.get("competingPrices"))
        .and_then(|p| p.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e.get("price"))
                .filter_map(|p| match p {
                    serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
                    serde_json::Value::Number(n) => n.as_u64(),
                    _ => None,
                })
                .collect::<Vec<u64>>()
        })
        .unwrap_or_default();
    MarketState::with_competing_prices(prices)
}

fn bad_request(message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": {"code": "INVALID_INPUT", "message": message}})),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            policy: CompetitivePolicy::new(AgentProfile {
                agent_id: AgentId::new(),
                base_rate: 110,
                margin: 50,
                floor_pct: 60,
                stake: 50,
            }),
        })
    }

    #[tokio::test]
    async fn join_without_auction_id_is_400() {
        let result = join(
            State(test_state()),
            Json(serde_json::json!({"taskSpec": {"task": "ocr"}})),
        )
        .await;
        let (status, _) = result.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn join_answers_baseline_quote_as_strings() {
        let Json(body) = join(
            State(test_state()),
            Json(serde_json::json!({
                "auctionId": "auction_00000000-0000-0000-0000-000000000001",
                "taskSpec": {"task": "ocr"},
                "paymentToken": "USDT",
            })),
        )
        .await
        .unwrap();
        assert_eq!(body["ask"], "160");
        assert_eq!(body["minAmount"], "110");
        assert_eq!(body["stakeAmount"], "50");
    }

    #[tokio::test]
    async fn bid_undercuts_the_lowest_competing_price() {
        let Json(body) = bid(
            State(test_state()),
            Json(serde_json::json!({
                "marketState": {"competingPrices": [{"price": "200"}, {"price": 240}]}
            })),
        )
        .await;
        assert_eq!(body["ask"], "199");
        assert_eq!(body["minAmount"], "120");
    }

    #[tokio::test]
    async fn bid_without_market_state_is_baseline() {
        let Json(body) = bid(State(test_state()), Json(serde_json::json!({}))).await;
        assert_eq!(body["ask"], "160");
        assert_eq!(body["minAmount"], "110");
    }
}
