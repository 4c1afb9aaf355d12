use std::net::SocketAddr;
use std::time::Duration;

use auction_admission::AdmissionDecision;
use auction_core::channels::bid_result_channel;
use auction_core::envelope::BidEnvelope;
use auction_core::events::BidResultMessage;
use auction_core::model::{Amount, AuctionId, Bid, UserId};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use log::warn;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use uuid::Uuid;

use crate::app::AppState;

const FALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
pub struct PlaceBidRequest {
    pub auction_id: AuctionId,
    pub user_id: UserId,
    pub username: String,
    pub amount: Amount,
    pub submission_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlaceBidResponse {
    Accepted { bid: Bid },
    Rejected { reason: String },
}

/// Synchronous fallback for clients that cannot hold a websocket open. The
/// bid still travels through the queue and the processor; this handler just
/// waits on the bid's one-shot result channel instead of a push
/// notification and turns it into an HTTP response.
pub async fn place_bid(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<PlaceBidRequest>,
) -> impl IntoResponse {
    let address = addr.ip().to_string();
    if state.admission.check(&address, Some(&request.user_id.to_string())).await == AdmissionDecision::Deny {
        return (
            StatusCode::FORBIDDEN,
            Json(PlaceBidResponse::Rejected { reason: "blocked".to_string() }),
        )
            .into_response();
    }

    let correlation_id = Uuid::new_v4();
    let channel = bid_result_channel(correlation_id);

    let mut subscriber = match state.cache.new_subscriber().await {
        Ok(subscriber) => subscriber,
        Err(err) => return service_unavailable(err.to_string()),
    };
    if let Err(err) = subscriber.subscribe(&channel).await {
        return service_unavailable(err.to_string());
    }

    let envelope = BidEnvelope {
        correlation_id,
        auction_id: request.auction_id,
        user_id: request.user_id,
        amount: request.amount,
        username: request.username,
        socket_id: None,
        submitted_at: Utc::now(),
        submission_id: request.submission_id,
    };

    if let Err(err) = state.queue.publish_bid_placed(&envelope).await {
        return service_unavailable(err.to_string());
    }

    let (result_tx, result_rx) = tokio::sync::oneshot::channel();
    let listener = tokio::spawn(async move {
        let mut result_tx = Some(result_tx);
        subscriber
            .run(move |_channel, payload| {
                let Some(tx) = result_tx.take() else { return };
                match serde_json::from_str::<BidResultMessage>(&payload) {
                    Ok(message) => {
                        let _ = tx.send(message);
                    }
                    Err(err) => warn!("undecodable bid result payload: {err}"),
                }
            })
            .await;
    });

    let response = match timeout(FALLBACK_TIMEOUT, result_rx).await {
        Ok(Ok(BidResultMessage::Accepted { bid })) => (StatusCode::OK, Json(PlaceBidResponse::Accepted { bid })).into_response(),
        Ok(Ok(BidResultMessage::Rejected { reason })) => (
            StatusCode::CONFLICT,
            Json(PlaceBidResponse::Rejected { reason: reason.message() }),
        )
            .into_response(),
        Ok(Err(_)) => service_unavailable("result channel closed before a reply arrived".to_string()),
        Err(_) => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(PlaceBidResponse::Rejected { reason: "timed out waiting for the bid outcome".to_string() }),
        )
            .into_response(),
    };

    listener.abort();
    response
}

fn service_unavailable(reason: String) -> axum::response::Response {
    (StatusCode::SERVICE_UNAVAILABLE, Json(PlaceBidResponse::Rejected { reason })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct UnblockRequest {
    pub address: Option<String>,
    pub identity: Option<String>,
}

pub async fn admin_unblock(State(state): State<AppState>, Json(request): Json<UnblockRequest>) -> impl IntoResponse {
    if let Some(address) = &request.address {
        if let Err(err) = state.admission.unblock_address(address).await {
            return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
        }
    }
    if let Some(identity) = &request.identity {
        if let Err(err) = state.admission.unblock_identity(identity).await {
            return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
        }
    }
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub address: String,
    pub identity: Option<String>,
}

pub async fn admin_stats(State(state): State<AppState>, Query(query): Query<StatsQuery>) -> impl IntoResponse {
    let stats = state.admission.stats(&query.address, query.identity.as_deref()).await;
    Json(stats)
}

pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    if state.cache.health_check().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
