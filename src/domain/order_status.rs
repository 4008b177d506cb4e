//! Order Tracking Status
//!
//! Local view of a brokerage order's lifecycle. The upstream brokerage is
//! authoritative and may report statuses outside this set, so tracking rows
//! store the raw string; this enum exists for the decisions the server has to
//! make itself (terminal detection, poll cadence).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Order lifecycle states as tracked locally.
///
/// Forward progression: `Submitted → Working → {Filled | PartiallyFilled |
/// Cancelled | Rejected | Expired}`. `PendingIndex` is synthetic (upstream has
/// not indexed the order yet) and `CancelRequested` is an optimistic overlay
/// written before upstream confirms anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Submitted,
    PendingIndex,
    Working,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
    CancelRequested,
}

impl OrderStatus {
    /// Parse an upstream or stored status string. Returns `None` for
    /// statuses outside the known set.
    pub fn parse(s: &str) -> Option<OrderStatus> {
        match s {
            "SUBMITTED" => Some(OrderStatus::Submitted),
            "PENDING_INDEX" => Some(OrderStatus::PendingIndex),
            "WORKING" => Some(OrderStatus::Working),
            "PARTIALLY_FILLED" => Some(OrderStatus::PartiallyFilled),
            "FILLED" => Some(OrderStatus::Filled),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            "REJECTED" => Some(OrderStatus::Rejected),
            "EXPIRED" => Some(OrderStatus::Expired),
            "CANCEL_REQUESTED" => Some(OrderStatus::CancelRequested),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Submitted => "SUBMITTED",
            OrderStatus::PendingIndex => "PENDING_INDEX",
            OrderStatus::Working => "WORKING",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::CancelRequested => "CANCEL_REQUESTED",
        }
    }

    /// Terminal statuses stop reconciliation: polling ends and the stored
    /// value is never regressed by a later non-terminal observation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::Rejected
                | OrderStatus::Expired
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// True if the raw status string is a terminal state. Unknown statuses are
/// treated as non-terminal so polling keeps going until upstream settles.
pub fn is_terminal_status(status: &str) -> bool {
    OrderStatus::parse(status).is_some_and(|s| s.is_terminal())
}

/// Poll cadence contract for status-query callers: `None` once terminal,
/// a tighter loop while the order is waiting to be indexed upstream.
pub fn next_poll_interval(status: &str) -> Option<Duration> {
    match OrderStatus::parse(status) {
        Some(s) if s.is_terminal() => None,
        Some(OrderStatus::PendingIndex) => Some(Duration::from_secs(1)),
        _ => Some(Duration::from_secs(2)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for s in [
            "SUBMITTED",
            "PENDING_INDEX",
            "WORKING",
            "PARTIALLY_FILLED",
            "FILLED",
            "CANCELLED",
            "REJECTED",
            "EXPIRED",
            "CANCEL_REQUESTED",
        ] {
            let parsed = OrderStatus::parse(s).unwrap();
            assert_eq!(parsed.as_str(), s);
        }
        assert!(OrderStatus::parse("UNKNOWN").is_none());
        assert!(OrderStatus::parse("filled").is_none());
    }

    #[test]
    fn test_terminal_set() {
        assert!(is_terminal_status("FILLED"));
        assert!(is_terminal_status("CANCELLED"));
        assert!(is_terminal_status("REJECTED"));
        assert!(is_terminal_status("EXPIRED"));
        assert!(!is_terminal_status("SUBMITTED"));
        assert!(!is_terminal_status("WORKING"));
        assert!(!is_terminal_status("CANCEL_REQUESTED"));
        assert!(!is_terminal_status("PENDING_INDEX"));
        // Upstream statuses outside the known set keep the poll loop alive.
        assert!(!is_terminal_status("UNKNOWN"));
    }

    #[test]
    fn test_poll_cadence() {
        assert_eq!(next_poll_interval("FILLED"), None);
        assert_eq!(next_poll_interval("EXPIRED"), None);
        assert_eq!(
            next_poll_interval("PENDING_INDEX"),
            Some(Duration::from_secs(1))
        );
        assert_eq!(next_poll_interval("WORKING"), Some(Duration::from_secs(2)));
        assert_eq!(
            next_poll_interval("SUBMITTED"),
            Some(Duration::from_secs(2))
        );
        assert_eq!(next_poll_interval("UNKNOWN"), Some(Duration::from_secs(2)));
    }
}
