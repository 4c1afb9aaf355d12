use std::net::SocketAddr;

use auction_admission::AdmissionDecision;
use auction_core::envelope::BidEnvelope;
use auction_core::events::{ClientIntent, ServerEvent};
use auction_core::model::AuctionId;
use auction_store::AuctionStore;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::response::IntoResponse;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use log::warn;
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::{self, Claims};
use crate::session::Session;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: String,
}

/// Admission is checked twice: once by address alone before the upgrade
/// (cheap, stops obvious abuse before a socket is even opened), and again
/// after the token is verified so a blocked identity is rejected even from
/// a fresh address.
pub async fn handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let address = addr.ip().to_string();

    if state.admission.check(&address, None).await == AdmissionDecision::Deny {
        warn!("rejecting connection from {address}: blocked before authentication");
        return axum::http::StatusCode::FORBIDDEN.into_response();
    }

    let claims = match auth::verify(&state.jwt_secret, &query.token) {
        Ok(claims) => claims,
        Err(err) => {
            warn!("rejecting connection from {address}: invalid token ({err})");
            return axum::http::StatusCode::UNAUTHORIZED.into_response();
        }
    };

    if state.admission.check(&address, Some(&claims.sub.to_string())).await == AdmissionDecision::Deny {
        warn!(
            "rejecting connection from {address} ({}): blocked after authentication",
            claims.username
        );
        return axum::http::StatusCode::FORBIDDEN.into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, address, claims))
}

async fn handle_socket(socket: WebSocket, state: AppState, address: String, claims: Claims) {
    let socket_id = Uuid::new_v4().to_string();
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    state.admission.track(&address, &socket_id, Some(&claims.sub.to_string())).await;

    state.sessions.insert(Session {
        socket_id: socket_id.clone(),
        user_id: claims.sub,
        username: claims.username.clone(),
        sender: tx.clone(),
    });
    auction_metrics::metrics_update!(inc total GATEWAY_CONNECTIONS_ACTIVE, &["gateway"]);

    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if ws_sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let _ = tx.send(Message::Text(
        serde_json::to_string(&ServerEvent::Connected {
            message: "connected".to_string(),
            user_id: claims.sub,
            username: claims.username.clone(),
        })
        .unwrap_or_default(),
    ));

    let mut joined_auctions: Vec<AuctionId> = Vec::new();

    while let Some(Ok(message)) = ws_receiver.next().await {
        let Message::Text(text) = message else { continue };
        match serde_json::from_str::<ClientIntent>(&text) {
            Ok(intent) => handle_intent(&state, &socket_id, &claims, intent, &mut joined_auctions).await,
            Err(err) => {
                let _ = tx.send(Message::Text(
                    serde_json::to_string(&ServerEvent::Error {
                        message: format!("invalid message: {err}"),
                    })
                    .unwrap_or_default(),
                ));
            }
        }
    }

    for auction_id in joined_auctions {
        state.sessions.leave(auction_id, &socket_id);
        state.sessions.broadcast_room(
            auction_id,
            &ServerEvent::UserLeft { user_id: claims.sub, username: claims.username.clone() },
        );
    }
    state.sessions.remove(&socket_id);
    state.admission.untrack(&socket_id).await;
    auction_metrics::metrics_update!(dec total GATEWAY_CONNECTIONS_ACTIVE, &["gateway"]);
    send_task.abort();
}

async fn handle_intent(
    state: &AppState,
    socket_id: &str,
    claims: &Claims,
    intent: ClientIntent,
    joined_auctions: &mut Vec<AuctionId>,
) {
    match intent {
        ClientIntent::JoinAuction { auction_id } => {
            let auction = match state.store.find_auction(auction_id).await {
                Ok(auction) => auction,
                Err(err) => {
                    warn!("failed to look up auction {auction_id} for join: {err}");
                    state.sessions.send_event(
                        socket_id,
                        &ServerEvent::Error { message: "auction lookup failed".to_string() },
                    );
                    return;
                }
            };

            let Some(auction) = auction else {
                state.sessions.send_event(
                    socket_id,
                    &ServerEvent::Error { message: format!("auction {auction_id} not found") },
                );
                return;
            };

            state.sessions.join(auction_id, socket_id);
            joined_auctions.push(auction_id);

            state.sessions.send_event(
                socket_id,
                &ServerEvent::AuctionUpdate {
                    auction_id,
                    current_highest_bid: auction.current_highest_bid,
                    bid_count: auction.bid_count,
                    status: auction.status.as_str().to_string(),
                },
            );

            state.sessions.broadcast_room(
                auction_id,
                &ServerEvent::UserJoined { user_id: claims.sub, username: claims.username.clone() },
            );
        }
        ClientIntent::LeaveAuction { auction_id } => {
            state.sessions.leave(auction_id, socket_id);
            joined_auctions.retain(|id| *id != auction_id);
            state.sessions.broadcast_room(
                auction_id,
                &ServerEvent::UserLeft { user_id: claims.sub, username: claims.username.clone() },
            );
        }
        ClientIntent::PlaceBid { auction_id, bid_amount } => {
            if (claims.exp as i64) < Utc::now().timestamp() {
                state.sessions.send_event(
                    socket_id,
                    &ServerEvent::Error { message: "authentication token has expired".to_string() },
                );
                return;
            }

            let envelope = BidEnvelope {
                correlation_id: Uuid::new_v4(),
                auction_id,
                user_id: claims.sub,
                amount: bid_amount,
                username: claims.username.clone(),
                socket_id: Some(socket_id.to_string()),
                submitted_at: Utc::now(),
                submission_id: None,
            };

            if let Err(err) = state.queue.publish_bid_placed(&envelope).await {
                warn!("failed to enqueue bid for auction {auction_id}: {err}");
                state.sessions.send_event(
                    socket_id,
                    &ServerEvent::Error {
                        message: "bid could not be accepted right now".to_string(),
                    },
                );
                return;
            }

            state.sessions.send_event(
                socket_id,
                &ServerEvent::BidReceived {
                    message: "bid submitted".to_string(),
                },
            );
        }
    }
}
