//! Agora Coordinator Server
//!
//! Exposes the auction surface (open, list offers, accept) over HTTP and
//! runs the dispute-escalation loop in the background. Opening an auction
//! triggers an offer-collection round against the configured agent pool;
//! the auction stays open for late arrivals even when the round comes back
//! empty. The escalation loop scans the external ledger on an interval and
//! drives idempotent resolution through the durable marker store.

mod ledger;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use agora_auction::{AuctionBook, IncomingOffer};
use agora_collector::{AgentEndpoint, HttpAgentEndpoint, OfferCollector, Solicitation};
use agora_escalation::{
    DisputeResolver, EscalationMonitor, MonitorConfig, SledCheckpointStore,
};
use agora_markers::SledMarkerStore;
use agora_trust::{HttpTrustOracle, StaticTrustOracle, TrustOracle};
use agora_types::{AgoraError, AuctionId};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use ledger::LedgerGateway;
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

struct AppState {
    book: AuctionBook,
    collector: Option<OfferCollector>,
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

    let trust = trust_oracle_from_env()?;
    let collector = collector_from_env(Arc::clone(&trust))?;
    let state = Arc::new(AppState {
        book: AuctionBook::new(),
        collector,
    });

    spawn_escalation_loop().await?;

    let app = Router::new()
        .route("/health", get(health))
        .route("/auctions", post(open_auction))
        .route("/auctions/:id/offers", get(list_offers))
        .route("/auctions/:id/accept", post(accept_offer))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = std::env::var("AGORA_BIND")
        .unwrap_or_else(|_| "0.0.0.0:3100".to_string())
        .parse()?;
    info!(%addr, "agora-server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn trust_oracle_from_env() -> anyhow::Result<Arc<dyn TrustOracle>> {
    match std::env::var("AGORA_TRUST_URL") {
        Ok(url) => {
            info!(%url, "using HTTP trust oracle");
            Ok(Arc::new(HttpTrustOracle::new(url, Duration::from_secs(2))?))
        }
        Err(_) => {
            info!("no trust oracle configured, all agents score neutral");
            Ok(Arc::new(StaticTrustOracle::empty()))
        }
    }
}

fn collector_from_env(trust: Arc<dyn TrustOracle>) -> anyhow::Result<Option<OfferCollector>> {
    let raw = match std::env::var("AGORA_AGENT_ENDPOINTS") {
        Ok(raw) if !raw.trim().is_empty() => raw,
        _ => {
            warn!("AGORA_AGENT_ENDPOINTS not set, auctions open without solicitation");
            return Ok(None);
        }
    };
    let mut endpoints: Vec<Arc<dyn AgentEndpoint>> = Vec::new();
    for base in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        endpoints.push(Arc::new(HttpAgentEndpoint::new(base)?));
    }
    let timeout = Duration::from_millis(env_u64("AGORA_SOLICIT_TIMEOUT_MS", 1_500)?);
    info!(agents = endpoints.len(), ?timeout, "offer collector configured");
    Ok(Some(OfferCollector::new(endpoints, trust, timeout)))
}

/// Wire the escalation monitor and resolver against the ledger gateway and
/// run them on an interval. Skipped entirely when no gateway is configured.
async fn spawn_escalation_loop() -> anyhow::Result<()> {
    let gateway_url = match std::env::var("AGORA_LEDGER_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            warn!("AGORA_LEDGER_URL not set, escalation monitoring disabled");
            return Ok(());
        }
    };

    let data_dir =
        std::env::var("AGORA_DATA_DIR").unwrap_or_else(|_| "./agora-data".to_string());
    let db = sled::open(&data_dir)?;
    let markers = Arc::new(SledMarkerStore::open(&db)?);
    let checkpoint = Arc::new(SledCheckpointStore::open(&db)?);

    let gateway = Arc::new(LedgerGateway::new(gateway_url, Duration::from_secs(10))?);
    let monitor = EscalationMonitor::new(
        Arc::clone(&gateway) as _,
        Arc::clone(&gateway) as _,
        Arc::clone(&gateway) as _,
        Arc::clone(&gateway) as _,
        checkpoint,
        MonitorConfig {
            block_time_seconds: env_u64("AGORA_BLOCK_TIME_SECS", 12)?,
            initial_chunk_size: env_u64("AGORA_CHUNK_SIZE", 5_000)?,
            genesis_block: env_u64("AGORA_GENESIS_BLOCK", 0)?,
        },
    )?;
    let resolver = DisputeResolver::new(markers, gateway);
    let interval_secs = env_u64("AGORA_SCAN_INTERVAL_SECS", 30)?;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            ticker.tick().await;
            match monitor.scan().await {
                Ok(report) => {
                    if report.total_cases() > 0 {
                        let summary = resolver.resolve_report(&report).await;
                        info!(
                            resolvable = report.resolvable.len(),
                            pending = report.pending.len(),
                            dispatched = summary.dispatched,
                            skipped = summary.skipped,
                            failed = summary.failed,
                            "escalation pass complete"
                        );
                    }
                }
                Err(err) => warn!(error = %err, "escalation scan failed"),
            }
        }
    });
    info!(interval_secs, "escalation loop started");
    Ok(())
}

fn env_u64(key: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|e| anyhow::anyhow!("{key} must be a non-negative integer: {e}")),
        Err(_) => Ok(default),
    }
}

// ============================================================================
// Handlers
// ============================================================================

type ApiError = (StatusCode, Json<serde_json::Value>);

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenAuctionRequest {
    payment_token: Option<String>,
    task_deadline: Option<DateTime<Utc>>,
    task_spec: Option<serde_json::Value>,
}

async fn open_auction(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OpenAuctionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let payment_token = request
        .payment_token
        .ok_or_else(|| error_response(AgoraError::validation("paymentToken", "is required")))?;
    let task_deadline = request
        .task_deadline
        .ok_or_else(|| error_response(AgoraError::validation("taskDeadline", "is required")))?;
    let task_spec = request.task_spec.unwrap_or(serde_json::Value::Null);

    let auction_id = state
        .book
        .create(payment_token, task_deadline, task_spec)
        .await
        .map_err(error_response)?;

    let offers_collected = match &state.collector {
        None => 0,
        Some(collector) => run_collection_round(state.as_ref(), collector, &auction_id).await,
    };

    Ok(Json(serde_json::json!({
        "auctionId": auction_id.to_string(),
        "offersCollected": offers_collected,
    })))
}

/// One solicitation round. An empty round is not an error for the opener:
/// the auction stays open for late arrivals until its deadline.
async fn run_collection_round(
    state: &AppState,
    collector: &OfferCollector,
    auction_id: &AuctionId,
) -> usize {
    let auction = match state.book.get(auction_id).await {
        Ok(a) => a,
        Err(_) => return 0,
    };
    let solicitation = Solicitation {
        auction_id: auction.id.clone(),
        task_spec: auction.task_spec.clone(),
        payment_token: auction.payment_token.clone(),
        task_deadline: auction.task_deadline,
    };

    let round = match collector.collect(&solicitation).await {
        Ok(round) => round,
        Err(err) => {
            warn!(auction = %auction_id, error = %err, "collection round yielded no offers");
            return 0;
        }
    };

    let mut recorded = 0;
    for offer in round.offers {
        let incoming = IncomingOffer {
            agent_id: offer.agent_id.clone(),
            ask: offer.ask,
            floor: offer.floor,
            stake: offer.stake,
            trust_score: offer.trust_score,
        };
        match state.book.record_offer(auction_id, incoming).await {
            Ok(()) => recorded += 1,
            Err(err) => {
                warn!(auction = %auction_id, agent = %offer.agent_id, error = %err, "offer not recorded")
            }
        }
    }
    recorded
}

async fn list_offers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let auction_id = parse_auction_id(&id)?;
    let offers = state
        .book
        .list_offers(&auction_id)
        .await
        .map_err(error_response)?;

    let offers: Vec<serde_json::Value> = offers
        .iter()
        .map(|o| {
            serde_json::json!({
                "agentId": o.agent_id.to_string(),
                "currentPrice": o.ask.to_string(),
                "trustScore": o.trust_score,
            })
        })
        .collect();
    Ok(Json(serde_json::json!({"offers": offers})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcceptRequest {
    agent_id: Option<String>,
    accepted_price: Option<serde_json::Value>,
}

async fn accept_offer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<AcceptRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let auction_id = parse_auction_id(&id)?;
    let agent_id = request
        .agent_id
        .as_deref()
        .map(agora_types::AgentId::parse)
        .transpose()
        .map_err(|_| error_response(AgoraError::validation("agentId", "is not a valid agent id")))?
        .ok_or_else(|| error_response(AgoraError::validation("agentId", "is required")))?;
    let accepted_price = request
        .accepted_price
        .as_ref()
        .and_then(parse_price)
        .ok_or_else(|| {
            error_response(AgoraError::validation(
                "acceptedPrice",
                "must be a non-negative integer",
            ))
        })?;

    let terms = state
        .book
        .accept(&auction_id, &agent_id, accepted_price)
        .await
        .map_err(error_response)?;

    Ok(Json(serde_json::json!({
        "agreedTerms": {
            "agentId": terms.agent_id.to_string(),
            "paymentAmount": terms.payment_amount.to_string(),
            "paymentToken": terms.payment_token,
            "deadline": terms.deadline.to_rfc3339(),
            "stakeAmount": terms.stake.to_string(),
        }
    })))
}

fn parse_auction_id(raw: &str) -> Result<AuctionId, ApiError> {
    AuctionId::parse(raw).map_err(|_| {
        error_response(AgoraError::AuctionNotFound {
            auction_id: raw.to_string(),
        })
    })
}

fn parse_price(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        serde_json::Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

fn error_response(err: AgoraError) -> ApiError {
    let status = match &err {
        AgoraError::Validation { .. } => StatusCode::BAD_REQUEST,
        AgoraError::AuctionNotFound { .. }
        | AgoraError::OfferNotFound { .. }
        | AgoraError::AgentNotFound { .. } => StatusCode::NOT_FOUND,
        AgoraError::AuctionAlreadyAccepted { .. }
        | AgoraError::AuctionExpired { .. }
        | AgoraError::StalePrice { .. } => StatusCode::CONFLICT,
        AgoraError::Unavailable { .. }
        | AgoraError::RangeTooLarge { .. }
        | AgoraError::Timeout { .. }
        | AgoraError::RateLimited { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AgoraError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        AgoraError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(serde_json::json!({
            "error": {"code": err.error_code(), "message": err.to_string()}
        })),
    )
}
