use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order status in the delivery lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Assigned,
    PickedUp,
    Delivered,
    Cancelled,
}

/// Allowed forward edges of the status graph. Cancellation is handled
/// separately: `Cancelled` is reachable from any non-terminal status and
/// never appears here as a target.
pub const TRANSITIONS: &[(OrderStatus, OrderStatus)] = &[
    (OrderStatus::Pending, OrderStatus::Confirmed),
    (OrderStatus::Confirmed, OrderStatus::Preparing),
    (OrderStatus::Preparing, OrderStatus::Ready),
    (OrderStatus::Ready, OrderStatus::Assigned),
    // Driver no-show or reassignment releases the order back to the pool.
    (OrderStatus::Assigned, OrderStatus::Ready),
    (OrderStatus::Assigned, OrderStatus::PickedUp),
    (OrderStatus::PickedUp, OrderStatus::Delivered),
];

impl OrderStatus {
    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Whether `target` is reachable from `self` along a forward edge.
    /// Does not cover cancellation; callers check that path explicitly.
    pub fn can_advance_to(&self, target: OrderStatus) -> bool {
        TRANSITIONS.iter().any(|&(from, to)| from == *self && to == target)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::Assigned => "ASSIGNED",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "PREPARING" => Ok(OrderStatus::Preparing),
            "READY" => Ok(OrderStatus::Ready),
            "ASSIGNED" => Ok(OrderStatus::Assigned),
            "PICKED_UP" => Ok(OrderStatus::PickedUp),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_edges() {
        assert!(OrderStatus::Pending.can_advance_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_advance_to(OrderStatus::Preparing));
        assert!(OrderStatus::Preparing.can_advance_to(OrderStatus::Ready));
        assert!(OrderStatus::Ready.can_advance_to(OrderStatus::Assigned));
        assert!(OrderStatus::Assigned.can_advance_to(OrderStatus::PickedUp));
        assert!(OrderStatus::PickedUp.can_advance_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_driver_release_is_reversible() {
        assert!(OrderStatus::Assigned.can_advance_to(OrderStatus::Ready));
        assert!(!OrderStatus::Ready.can_advance_to(OrderStatus::Preparing));
    }

    #[test]
    fn test_no_skipping() {
        assert!(!OrderStatus::Pending.can_advance_to(OrderStatus::Preparing));
        assert!(!OrderStatus::Confirmed.can_advance_to(OrderStatus::Ready));
        assert!(!OrderStatus::Ready.can_advance_to(OrderStatus::Delivered));
    }

    #[test]
    fn test_terminal_statuses_have_no_edges() {
        for &(from, _) in TRANSITIONS {
            assert!(!from.is_terminal());
        }
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::PickedUp,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
    }
}
