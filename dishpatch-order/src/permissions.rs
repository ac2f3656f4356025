use dishpatch_core::{ActorRole, OrderStatus};

/// Whether `role` may move an order from `current` to `target`. The status
/// graph itself is checked separately; this only answers "is this actor
/// allowed to drive that edge".
///
/// Cancellation is open to every party while the order is still in the
/// restaurant's hands; once picked up, only an admin override may cancel.
pub fn permitted(role: ActorRole, current: OrderStatus, target: OrderStatus) -> bool {
    use ActorRole::*;
    use OrderStatus::*;

    if target == Cancelled {
        return match current {
            PickedUp => role == Admin,
            _ => true,
        };
    }

    match role {
        Admin | System => true,
        Restaurant => matches!(target, Confirmed | Preparing) || (current == Preparing && target == Ready),
        Driver => matches!(target, Assigned | PickedUp | Delivered) || (current == Assigned && target == Ready),
        Customer => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ActorRole::*;
    use OrderStatus::*;

    #[test]
    fn test_customer_may_only_cancel() {
        assert!(permitted(Customer, Pending, Cancelled));
        assert!(!permitted(Customer, Pending, Confirmed));
        assert!(!permitted(Customer, Assigned, PickedUp));
    }

    #[test]
    fn test_restaurant_drives_kitchen_statuses() {
        assert!(permitted(Restaurant, Pending, Confirmed));
        assert!(permitted(Restaurant, Confirmed, Preparing));
        assert!(permitted(Restaurant, Preparing, Ready));
        assert!(!permitted(Restaurant, Ready, Assigned));
        // Releasing a driver is not the restaurant's call.
        assert!(!permitted(Restaurant, Assigned, Ready));
    }

    #[test]
    fn test_driver_drives_delivery_statuses() {
        assert!(permitted(Driver, Ready, Assigned));
        assert!(permitted(Driver, Assigned, PickedUp));
        assert!(permitted(Driver, PickedUp, Delivered));
        assert!(permitted(Driver, Assigned, Ready));
        assert!(!permitted(Driver, Pending, Confirmed));
    }

    #[test]
    fn test_pickup_cancel_needs_admin() {
        assert!(!permitted(Customer, PickedUp, Cancelled));
        assert!(!permitted(Driver, PickedUp, Cancelled));
        assert!(!permitted(System, PickedUp, Cancelled));
        assert!(permitted(Admin, PickedUp, Cancelled));
    }

    #[test]
    fn test_admin_and_system_unrestricted_elsewhere() {
        assert!(permitted(Admin, Pending, Confirmed));
        assert!(permitted(System, PickedUp, Delivered));
        assert!(permitted(System, Preparing, Cancelled));
    }
}
