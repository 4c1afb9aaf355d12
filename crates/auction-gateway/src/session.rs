use auction_core::events::ServerEvent;
use auction_core::model::{AuctionId, UserId};
use axum::extract::ws::Message;
use dashmap::{DashMap, DashSet};
use log::warn;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Clone)]
pub struct Session {
    pub socket_id: String,
    pub user_id: UserId,
    pub username: String,
    pub sender: UnboundedSender<Message>,
}

/// Connected sockets and their auction room memberships, shared by every
/// websocket task in this instance. Broadcasting a room or a user is O(room
/// size), not O(all connections).
#[derive(Default)]
pub struct Sessions {
    by_socket: DashMap<String, Session>,
    rooms: DashMap<AuctionId, DashSet<String>>,
}

impl Sessions {
    pub fn insert(&self, session: Session) {
        self.by_socket.insert(session.socket_id.clone(), session);
    }

    pub fn remove(&self, socket_id: &str) -> Option<Session> {
        for room in self.rooms.iter() {
            room.remove(socket_id);
        }
        self.by_socket.remove(socket_id).map(|(_, session)| session)
    }

    pub fn join(&self, auction_id: AuctionId, socket_id: &str) {
        self.rooms.entry(auction_id).or_default().insert(socket_id.to_string());
    }

    pub fn leave(&self, auction_id: AuctionId, socket_id: &str) {
        if let Some(room) = self.rooms.get(&auction_id) {
            room.remove(socket_id);
        }
    }

    pub fn get(&self, socket_id: &str) -> Option<Session> {
        self.by_socket.get(socket_id).map(|entry| entry.clone())
    }

    pub fn send_event(&self, socket_id: &str, event: &ServerEvent) {
        let Some(session) = self.by_socket.get(socket_id) else { return };
        Self::deliver(&session, event);
    }

    pub fn broadcast_room(&self, auction_id: AuctionId, event: &ServerEvent) {
        let Some(room) = self.rooms.get(&auction_id) else { return };
        for socket_id in room.iter() {
            if let Some(session) = self.by_socket.get(socket_id.key()) {
                Self::deliver(&session, event);
            }
        }
    }

    pub fn send_to_user(&self, user_id: UserId, event: &ServerEvent) {
        for entry in self.by_socket.iter() {
            if entry.user_id == user_id {
                Self::deliver(&entry, event);
            }
        }
    }

    fn deliver(session: &Session, event: &ServerEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("failed to encode server event: {err}");
                return;
            }
        };
        let _ = session.sender.send(Message::Text(payload));
    }

    pub fn active_count(&self) -> i64 {
        self.by_socket.len() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn session(socket_id: &str, user_id: UserId) -> (Session, tokio::sync::mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (
            Session { socket_id: socket_id.to_string(), user_id, username: "alice".into(), sender: tx },
            rx,
        )
    }

    #[test]
    fn broadcast_room_only_reaches_joined_sockets() {
        let sessions = Sessions::default();
        let auction_id = Uuid::new_v4();
        let (a, mut rx_a) = session("a", Uuid::new_v4());
        let (b, mut rx_b) = session("b", Uuid::new_v4());
        sessions.insert(a);
        sessions.insert(b);
        sessions.join(auction_id, "a");

        sessions.broadcast_room(auction_id, &ServerEvent::BidReceived { message: "hi".into() });

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn leaving_a_room_stops_future_broadcasts() {
        let sessions = Sessions::default();
        let auction_id = Uuid::new_v4();
        let (a, mut rx_a) = session("a", Uuid::new_v4());
        sessions.insert(a);
        sessions.join(auction_id, "a");
        sessions.leave(auction_id, "a");

        sessions.broadcast_room(auction_id, &ServerEvent::BidReceived { message: "hi".into() });

        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn removing_a_session_purges_it_from_every_room() {
        let sessions = Sessions::default();
        let auction_id = Uuid::new_v4();
        let (a, _rx_a) = session("a", Uuid::new_v4());
        sessions.insert(a);
        sessions.join(auction_id, "a");

        sessions.remove("a");

        assert!(sessions.get("a").is_none());
        sessions.broadcast_room(auction_id, &ServerEvent::BidReceived { message: "hi".into() });
    }

    #[test]
    fn send_to_user_reaches_every_socket_for_that_identity() {
        let sessions = Sessions::default();
        let user_id = Uuid::new_v4();
        let (a, mut rx_a) = session("a", user_id);
        let (b, mut rx_b) = session("b", user_id);
        let (c, mut rx_c) = session("c", Uuid::new_v4());
        sessions.insert(a);
        sessions.insert(b);
        sessions.insert(c);

        sessions.send_to_user(user_id, &ServerEvent::BidReceived { message: "hi".into() });

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_err());
    }

    #[test]
    fn active_count_reflects_inserts_and_removes() {
        let sessions = Sessions::default();
        let (a, _rx) = session("a", Uuid::new_v4());
        sessions.insert(a);
        assert_eq!(sessions.active_count(), 1);
        sessions.remove("a");
        assert_eq!(sessions.active_count(), 0);
    }
}
