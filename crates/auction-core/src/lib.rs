pub mod channels;
pub mod envelope;
pub mod errors;
pub mod events;
pub mod model;

/// Default minimum raise over the current highest bid, in minor currency
/// units. Authoritative only inside the Processor; the Gateway performs no
/// amount validation.
pub const DEFAULT_MINIMUM_INCREMENT: i64 = 100;

/// Default TTL for the distributed per-auction lock.
pub const DEFAULT_LOCK_TTL_SECONDS: u64 = 10;
