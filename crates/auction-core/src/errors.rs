use serde::{Deserialize, Serialize};

/// Why a bid was rejected. Carried in `BID_FAILED` notifications, audit
/// entries, and the HTTP fallback's error response. A lost conditional-write
/// race is surfaced identically to `BelowCurrentHighest`: both mean someone
/// else's bid is now the highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    #[error("auction not found")]
    AuctionNotFound,
    #[error("auction is not active")]
    AuctionNotActive,
    #[error("auction has not started yet")]
    NotStarted,
    #[error("auction has ended")]
    Ended,
    #[error("bid is below the current highest bid")]
    BelowCurrentHighest,
    #[error("user not found")]
    UserNotFound,
    #[error("could not acquire the auction lock in time")]
    LockTimeout,
    #[error("duplicate bid submission")]
    Duplicate,
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl RejectReason {
    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            RejectReason::AuctionNotFound => "auction_not_found",
            RejectReason::AuctionNotActive => "auction_not_active",
            RejectReason::NotStarted => "not_started",
            RejectReason::Ended => "ended",
            RejectReason::BelowCurrentHighest => "below_current_highest",
            RejectReason::UserNotFound => "user_not_found",
            RejectReason::LockTimeout => "lock_timeout",
            RejectReason::Duplicate => "duplicate",
            RejectReason::Infrastructure(_) => "infrastructure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_snake_case_and_stable() {
        assert_eq!(RejectReason::BelowCurrentHighest.as_label(), "below_current_highest");
        assert_eq!(RejectReason::Infrastructure("timeout".into()).as_label(), "infrastructure");
    }

    #[test]
    fn serializes_as_tagged_snake_case() {
        let json = serde_json::to_string(&RejectReason::NotStarted).unwrap();
        assert_eq!(json, "\"not_started\"");

        let json = serde_json::to_string(&RejectReason::Infrastructure("boom".into())).unwrap();
        assert_eq!(json, "{\"infrastructure\":\"boom\"}");
    }

    #[test]
    fn message_matches_display() {
        assert_eq!(RejectReason::Ended.message(), "auction has ended");
    }
}
