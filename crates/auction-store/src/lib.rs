pub mod errors;
pub mod models;
pub mod schema;

use std::time::Duration;

use async_trait::async_trait;
use auction_core::model::{Amount, Auction, AuctionId, AuctionStatus, Bid, BidStatus, User, UserId};
use chrono::Utc;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness};
use log::info;
use url::Url;
use uuid::Uuid;

use errors::StoreError;
use models::{AuctionRow, BidRow, NewAuditLogRow, NewBidRow, UserRow};

pub const MIGRATIONS: EmbeddedMigrations = diesel_migrations::embed_migrations!("migrations");

type PgPool = Pool<ConnectionManager<PgConnection>>;
type PgPooled = PooledConnection<ConnectionManager<PgConnection>>;

/// Capability the Processor depends on: reading and conditionally writing
/// auction state. Kept narrow so nothing outside the Store needs to know
/// about bid rows.
#[async_trait]
pub trait AuctionStore: Send + Sync {
    async fn find_auction(&self, id: AuctionId) -> Result<Option<Auction>, StoreError>;

    async fn conditional_update_highest_bid(
        &self,
        auction_id: AuctionId,
        expected_current_highest: Amount,
        new_amount: Amount,
        winner_id: UserId,
    ) -> Result<Auction, StoreError>;

    async fn transition_expired_auctions(&self, now: chrono::DateTime<Utc>) -> Result<Vec<Auction>, StoreError>;

    async fn activate_pending_auctions(&self, now: chrono::DateTime<Utc>) -> Result<Vec<Auction>, StoreError>;
}

/// Capability the (out-of-scope) auction CRUD controller depends on, named
/// here only so the interface boundary is explicit.
#[async_trait]
pub trait BidQuery: Send + Sync {
    async fn list_by_auction(&self, auction_id: AuctionId) -> Result<Vec<Bid>, StoreError>;
}

#[derive(Clone)]
pub struct StorePool {
    pool: PgPool,
}

impl StorePool {
    pub fn connect(database_url: &str) -> Result<Self, StoreError> {
        if let Ok(parsed) = Url::parse(database_url) {
            info!(
                "PostgreSQL pool connecting: {}://******:******@{}{}",
                parsed.scheme(),
                parsed.host_str().unwrap_or("?"),
                parsed.path()
            );
        }

        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(10)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)
            .map_err(|err| StoreError::Migration(err.to_string()))?;

        Ok(Self { pool })
    }

    pub fn run_pending_migrations(&self) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        MIGRATIONS
            .run_pending_migrations(&mut conn)
            .map_err(|err| StoreError::Migration(err.to_string()))?;
        Ok(())
    }

    fn conn(&self) -> Result<PgPooled, StoreError> {
        Ok(self.pool.get()?)
    }

    async fn run_blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await
        .expect("store worker thread panicked")
    }

    pub async fn find_user(&self, user_id: UserId) -> Result<Option<User>, StoreError> {
        use schema::users::dsl;

        self.run_blocking(move |conn| {
            let row = dsl::users
                .find(user_id)
                .first::<UserRow>(conn)
                .optional()?;
            Ok(row.map(User::from))
        })
        .await
    }

    pub async fn insert_bid(
        &self,
        bid_id: Uuid,
        user_id: UserId,
        auction_id: AuctionId,
        amount: Amount,
        timestamp: chrono::DateTime<Utc>,
    ) -> Result<Bid, StoreError> {
        use schema::bids::dsl;

        let new_row = NewBidRow {
            id: bid_id,
            user_id,
            auction_id,
            amount,
            timestamp,
            is_winning: true,
            status: BidStatus::Accepted.as_str().to_string(),
        };

        self.run_blocking(move |conn| {
            let row: BidRow = diesel::insert_into(dsl::bids)
                .values(&new_row)
                .get_result(conn)?;
            Ok(Bid::from(row))
        })
        .await
    }

    /// Flips the previous winning bid to `OUTBID`. Relies on the invariant
    /// that at most one bid per auction has `is_winning = true`.
    pub async fn mark_previous_winner_outbid(
        &self,
        auction_id: AuctionId,
        except_bid_id: Uuid,
    ) -> Result<Option<BidRow>, StoreError> {
        use schema::bids::dsl;

        self.run_blocking(move |conn| {
            let previous: Option<BidRow> = dsl::bids
                .filter(dsl::auction_id.eq(auction_id))
                .filter(dsl::id.ne(except_bid_id))
                .filter(dsl::is_winning.eq(true))
                .first(conn)
                .optional()?;

            if let Some(ref prev) = previous {
                diesel::update(dsl::bids.filter(dsl::id.eq(prev.id)))
                    .set((
                        dsl::is_winning.eq(false),
                        dsl::status.eq(BidStatus::Outbid.as_str()),
                    ))
                    .execute(conn)?;
            }

            Ok(previous)
        })
        .await
    }

    pub async fn insert_audit_log(
        &self,
        auction_id: AuctionId,
        user_id: UserId,
        amount: Amount,
        success: bool,
        reason: Option<String>,
    ) -> Result<(), StoreError> {
        use schema::bid_audit_log::dsl;

        let row = NewAuditLogRow {
            id: Uuid::new_v4(),
            auction_id,
            user_id,
            amount,
            success,
            reason,
            created_at: Utc::now(),
        };

        self.run_blocking(move |conn| {
            diesel::insert_into(dsl::bid_audit_log)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl AuctionStore for StorePool {
    async fn find_auction(&self, id: AuctionId) -> Result<Option<Auction>, StoreError> {
        use schema::auctions::dsl;

        self.run_blocking(move |conn| {
            let row = dsl::auctions
                .find(id)
                .first::<AuctionRow>(conn)
                .optional()?;
            Ok(row.map(Auction::from))
        })
        .await
    }

    async fn conditional_update_highest_bid(
        &self,
        auction_id: AuctionId,
        expected_current_highest: Amount,
        new_amount: Amount,
        winner_id: UserId,
    ) -> Result<Auction, StoreError> {
        use schema::auctions::dsl;

        self.run_blocking(move |conn| {
            let now = Utc::now();
            let updated: Option<AuctionRow> = diesel::update(
                dsl::auctions
                    .filter(dsl::id.eq(auction_id))
                    .filter(dsl::current_highest_bid.eq(expected_current_highest)),
            )
            .set((
                dsl::current_highest_bid.eq(new_amount),
                dsl::winner_id.eq(Some(winner_id)),
                dsl::bid_count.eq(dsl::bid_count + 1),
                dsl::updated_at.eq(now),
            ))
            .get_result(conn)
            .optional()?;

            match updated {
                Some(row) => Ok(Auction::from(row)),
                None => Err(StoreError::Conflict(auction_id)),
            }
        })
        .await
    }

    async fn transition_expired_auctions(&self, now: chrono::DateTime<Utc>) -> Result<Vec<Auction>, StoreError> {
        use schema::auctions::dsl;

        self.run_blocking(move |conn| {
            let rows: Vec<AuctionRow> = diesel::update(
                dsl::auctions
                    .filter(dsl::status.eq(AuctionStatus::Active.as_str()))
                    .filter(dsl::end_time.le(now)),
            )
            .set((
                dsl::status.eq(AuctionStatus::Ended.as_str()),
                dsl::updated_at.eq(now),
            ))
            .get_results(conn)?;

            Ok(rows.into_iter().map(Auction::from).collect())
        })
        .await
    }

    async fn activate_pending_auctions(&self, now: chrono::DateTime<Utc>) -> Result<Vec<Auction>, StoreError> {
        use schema::auctions::dsl;

        self.run_blocking(move |conn| {
            let rows: Vec<AuctionRow> = diesel::update(
                dsl::auctions
                    .filter(dsl::status.eq(AuctionStatus::Pending.as_str()))
                    .filter(dsl::start_time.le(now)),
            )
            .set((
                dsl::status.eq(AuctionStatus::Active.as_str()),
                dsl::updated_at.eq(now),
            ))
            .get_results(conn)?;

            Ok(rows.into_iter().map(Auction::from).collect())
        })
        .await
    }
}

#[async_trait]
impl BidQuery for StorePool {
    async fn list_by_auction(&self, auction_id: AuctionId) -> Result<Vec<Bid>, StoreError> {
        use schema::bids::dsl;

        self.run_blocking(move |conn| {
            let rows: Vec<BidRow> = dsl::bids
                .filter(dsl::auction_id.eq(auction_id))
                .order(dsl::timestamp.desc())
                .load(conn)?;
            Ok(rows.into_iter().map(Bid::from).collect())
        })
        .await
    }
}
