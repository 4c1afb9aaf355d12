use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type AuctionId = Uuid;
pub type UserId = Uuid;
pub type BidId = Uuid;

/// Minor currency units (e.g. cents). Always positive for accepted amounts.
pub type Amount = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuctionStatus {
    Pending,
    Active,
    Ended,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Pending => "PENDING",
            AuctionStatus::Active => "ACTIVE",
            AuctionStatus::Ended => "ENDED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(AuctionStatus::Pending),
            "ACTIVE" => Some(AuctionStatus::Active),
            "ENDED" => Some(AuctionStatus::Ended),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BidStatus {
    Pending,
    Accepted,
    Rejected,
    Outbid,
}

impl BidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidStatus::Pending => "PENDING",
            BidStatus::Accepted => "ACCEPTED",
            BidStatus::Rejected => "REJECTED",
            BidStatus::Outbid => "OUTBID",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(BidStatus::Pending),
            "ACCEPTED" => Some(BidStatus::Accepted),
            "REJECTED" => Some(BidStatus::Rejected),
            "OUTBID" => Some(BidStatus::Outbid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// `start_time < end_time`; `current_highest_bid >= starting_bid`;
/// status only ever moves PENDING -> ACTIVE -> ENDED; once ENDED only
/// `winner_id` may change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    pub title: String,
    pub description: String,
    pub car_id: String,
    pub starting_bid: Amount,
    pub current_highest_bid: Amount,
    pub bid_count: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub winner_id: Option<UserId>,
    pub status: AuctionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auction {
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.status == AuctionStatus::Active && now >= self.start_time && now < self.end_time
    }
}

/// At most one bid per auction has `is_winning = true`; that bid's amount
/// equals the auction's `current_highest_bid`. Accepted bids are never
/// deleted; `Accepted -> Outbid` happens exactly when a strictly higher bid
/// is accepted for the same auction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub user_id: UserId,
    pub auction_id: AuctionId,
    pub amount: Amount,
    pub timestamp: DateTime<Utc>,
    pub is_winning: bool,
    pub status: BidStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn auction(status: AuctionStatus, start_offset: i64, end_offset: i64) -> Auction {
        let now = Utc::now();
        Auction {
            id: Uuid::new_v4(),
            title: "1965 Mustang".into(),
            description: String::new(),
            car_id: "car-1".into(),
            starting_bid: 1000,
            current_highest_bid: 1000,
            bid_count: 0,
            start_time: now + Duration::seconds(start_offset),
            end_time: now + Duration::seconds(end_offset),
            winner_id: None,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn open_requires_active_status_and_time_window() {
        let now = Utc::now();
        assert!(auction(AuctionStatus::Active, -10, 10).is_open_at(now));
        assert!(!auction(AuctionStatus::Pending, -10, 10).is_open_at(now));
        assert!(!auction(AuctionStatus::Ended, -10, 10).is_open_at(now));
    }

    #[test]
    fn open_is_false_before_start_and_at_or_after_end() {
        let now = Utc::now();
        assert!(!auction(AuctionStatus::Active, 10, 20).is_open_at(now));
        assert!(!auction(AuctionStatus::Active, -20, -10).is_open_at(now));
        let a = auction(AuctionStatus::Active, -10, 0);
        assert!(!a.is_open_at(a.end_time));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [AuctionStatus::Pending, AuctionStatus::Active, AuctionStatus::Ended] {
            assert_eq!(AuctionStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(AuctionStatus::from_str("bogus"), None);
    }

    #[test]
    fn bid_status_round_trips_through_str() {
        for status in [BidStatus::Pending, BidStatus::Accepted, BidStatus::Rejected, BidStatus::Outbid] {
            assert_eq!(BidStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(BidStatus::from_str("bogus"), None);
    }

    #[test]
    fn user_password_hash_is_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "secret-hash".into(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(!json.contains("password_hash"));
    }
}
