use chrono::{DateTime, Utc};
use uuid::Uuid;

use auction_core::model::{Auction, AuctionStatus, Bid, BidStatus, User};

use crate::schema::{auctions, bid_audit_log, bids, users};

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, AsChangeset)]
#[diesel(table_name = auctions)]
pub struct AuctionRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub car_id: String,
    pub starting_bid: i64,
    pub current_highest_bid: i64,
    pub bid_count: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub winner_id: Option<Uuid>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AuctionRow> for Auction {
    fn from(row: AuctionRow) -> Self {
        Auction {
            id: row.id,
            title: row.title,
            description: row.description,
            car_id: row.car_id,
            starting_bid: row.starting_bid,
            current_highest_bid: row.current_highest_bid,
            bid_count: row.bid_count,
            start_time: row.start_time,
            end_time: row.end_time,
            winner_id: row.winner_id,
            status: AuctionStatus::from_str(&row.status).unwrap_or(AuctionStatus::Pending),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = bids)]
pub struct BidRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub auction_id: Uuid,
    pub amount: i64,
    pub timestamp: DateTime<Utc>,
    pub is_winning: bool,
    pub status: String,
}

impl From<BidRow> for Bid {
    fn from(row: BidRow) -> Self {
        Bid {
            id: row.id,
            user_id: row.user_id,
            auction_id: row.auction_id,
            amount: row.amount,
            timestamp: row.timestamp,
            is_winning: row.is_winning,
            status: BidStatus::from_str(&row.status).unwrap_or(BidStatus::Pending),
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bids)]
pub struct NewBidRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub auction_id: Uuid,
    pub amount: i64,
    pub timestamp: DateTime<Utc>,
    pub is_winning: bool,
    pub status: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bid_audit_log)]
pub struct NewAuditLogRow {
    pub id: Uuid,
    pub auction_id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub success: bool,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auction_row_falls_back_to_pending_on_unknown_status() {
        let row = AuctionRow {
            id: Uuid::new_v4(),
            title: "lot".into(),
            description: String::new(),
            car_id: "car-1".into(),
            starting_bid: 100,
            current_highest_bid: 100,
            bid_count: 0,
            start_time: Utc::now(),
            end_time: Utc::now(),
            winner_id: None,
            status: "NOT_A_REAL_STATUS".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let auction = Auction::from(row);
        assert_eq!(auction.status, AuctionStatus::Pending);
    }

    #[test]
    fn auction_row_round_trips_known_status() {
        let row = AuctionRow {
            id: Uuid::new_v4(),
            title: "lot".into(),
            description: String::new(),
            car_id: "car-1".into(),
            starting_bid: 100,
            current_highest_bid: 150,
            bid_count: 2,
            start_time: Utc::now(),
            end_time: Utc::now(),
            winner_id: Some(Uuid::new_v4()),
            status: "ACTIVE".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let auction = Auction::from(row.clone());
        assert_eq!(auction.status, AuctionStatus::Active);
        assert_eq!(auction.current_highest_bid, row.current_highest_bid);
        assert_eq!(auction.winner_id, row.winner_id);
    }

    #[test]
    fn bid_row_falls_back_to_pending_on_unknown_status() {
        let row = BidRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            auction_id: Uuid::new_v4(),
            amount: 500,
            timestamp: Utc::now(),
            is_winning: false,
            status: "GARBAGE".into(),
        };
        let bid = Bid::from(row);
        assert_eq!(bid.status, BidStatus::Pending);
    }

    #[test]
    fn bid_row_preserves_winning_flag_and_amount() {
        let row = BidRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            auction_id: Uuid::new_v4(),
            amount: 750,
            timestamp: Utc::now(),
            is_winning: true,
            status: "ACCEPTED".into(),
        };
        let bid = Bid::from(row);
        assert!(bid.is_winning);
        assert_eq!(bid.status, BidStatus::Accepted);
        assert_eq!(bid.amount, 750);
    }
}
