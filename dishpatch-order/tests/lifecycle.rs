use chrono::{Duration, Utc};
use dishpatch_core::{
    Actor, ActorRole, DeliveryAddress, DiscountType, FixedDeliveryFee, OrderError, OrderItem,
    OrderStatus, OrderStore, Promotion, PromotionStore, Topic,
};
use dishpatch_events::Broadcaster;
use dishpatch_order::{CreateOrder, LifecycleManager};
use dishpatch_promo::PromotionEngine;
use dishpatch_store::MemoryStore;
use std::sync::Arc;
use uuid::Uuid;

struct Harness {
    manager: LifecycleManager,
    store: Arc<MemoryStore>,
    broadcaster: Arc<Broadcaster>,
}

fn harness(delivery_fee: i64) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let broadcaster = Arc::new(Broadcaster::new(64));
    let manager = LifecycleManager::new(
        store.clone() as Arc<dyn OrderStore>,
        PromotionEngine::new(store.clone() as Arc<dyn PromotionStore>),
        broadcaster.clone(),
        Arc::new(FixedDeliveryFee(delivery_fee)),
    );
    Harness { manager, store, broadcaster }
}

fn checkout(customer_id: Uuid, restaurant_id: Uuid, promo_code: Option<&str>) -> CreateOrder {
    CreateOrder {
        customer_id,
        restaurant_id,
        items: vec![
            OrderItem::new(Uuid::new_v4(), 2, 150, None),
            OrderItem::new(Uuid::new_v4(), 1, 200, Some("no onions".into())),
        ],
        delivery_address: DeliveryAddress {
            address: "12 Pier Lane".into(),
            latitude: 51.5,
            longitude: -0.12,
        },
        payment_method: "CARD".into(),
        promo_code: promo_code.map(String::from),
    }
}

fn save20(restaurant_ids: Option<Vec<Uuid>>) -> Promotion {
    let now = Utc::now();
    Promotion {
        id: Uuid::new_v4(),
        code: "SAVE20".into(),
        discount_type: DiscountType::Percentage,
        value: 20,
        max_discount: Some(50),
        min_order: None,
        restaurant_ids,
        valid_from: now - Duration::hours(1),
        valid_until: now + Duration::hours(1),
        usage_limit: None,
        used_count: 0,
        is_active: true,
        created_at: now,
    }
}

async fn drive_to(h: &Harness, order_id: Uuid, driver: Actor, statuses: &[OrderStatus]) {
    let restaurant = Actor::new(Uuid::new_v4(), ActorRole::Restaurant);
    for &status in statuses {
        let actor = match status {
            OrderStatus::Confirmed | OrderStatus::Preparing | OrderStatus::Ready => restaurant,
            _ => driver,
        };
        h.manager.transition(order_id, status, actor, None).await.unwrap();
    }
}

#[tokio::test]
async fn test_create_prices_and_records_pending() {
    let h = harness(30);
    let customer = Uuid::new_v4();
    let created = h.manager.create(checkout(customer, Uuid::new_v4(), None)).await.unwrap();

    assert_eq!(created.order.status, OrderStatus::Pending);
    assert_eq!(created.order.subtotal, 500);
    assert_eq!(created.order.delivery_fee, 30);
    assert_eq!(created.order.total, 530);
    assert!(created.order.totals_consistent());

    assert_eq!(created.history.len(), 1);
    assert_eq!(created.history[0].status, OrderStatus::Pending);
    assert_eq!(created.history[0].actor_role, ActorRole::Customer);
}

#[tokio::test]
async fn test_create_rejects_empty_and_invalid_items() {
    let h = harness(30);
    let mut req = checkout(Uuid::new_v4(), Uuid::new_v4(), None);
    req.items.clear();
    assert!(matches!(
        h.manager.create(req).await,
        Err(OrderError::Validation(_))
    ));

    let mut req = checkout(Uuid::new_v4(), Uuid::new_v4(), None);
    req.items[0].quantity = 0;
    assert!(matches!(
        h.manager.create(req).await,
        Err(OrderError::Validation(_))
    ));
}

#[tokio::test]
async fn test_create_applies_capped_percentage_promotion() {
    let h = harness(30);
    h.store.insert_promotion(&save20(None)).await.unwrap();

    // Items total 500, 20% capped at 50: total = 500 + 30 - 50.
    let created = h
        .manager
        .create(checkout(Uuid::new_v4(), Uuid::new_v4(), Some("SAVE20")))
        .await
        .unwrap();
    assert_eq!(created.order.discount, 50);
    assert_eq!(created.order.total, 480);
    assert!(created.order.promotion_id.is_some());
}

#[tokio::test]
async fn test_create_degrades_to_no_discount_below_minimum() {
    let h = harness(30);
    let mut promo = save20(None);
    promo.min_order = Some(1000);
    h.store.insert_promotion(&promo).await.unwrap();

    let created = h
        .manager
        .create(checkout(Uuid::new_v4(), Uuid::new_v4(), Some("SAVE20")))
        .await
        .unwrap();
    assert_eq!(created.order.discount, 0);
    assert_eq!(created.order.total, 530);
    assert!(created.order.promotion_id.is_none());
}

#[tokio::test]
async fn test_full_delivery_lifecycle() {
    let h = harness(30);
    let driver = Actor::new(Uuid::new_v4(), ActorRole::Driver);
    let created = h.manager.create(checkout(Uuid::new_v4(), Uuid::new_v4(), None)).await.unwrap();
    let order_id = created.order.id;

    drive_to(
        &h,
        order_id,
        driver,
        &[
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Assigned,
            OrderStatus::PickedUp,
            OrderStatus::Delivered,
        ],
    )
    .await;

    let result = h.manager.get_order(order_id).await.unwrap();
    assert_eq!(result.order.status, OrderStatus::Delivered);
    assert!(result.order.delivered_at.is_some());
    assert_eq!(result.order.driver_id, Some(driver.id));

    // One entry per accepted transition plus the initial PENDING.
    assert_eq!(result.history.len(), 7);
    for pair in result.history.windows(2) {
        assert!(pair[0].created_at < pair[1].created_at);
    }
}

#[tokio::test]
async fn test_off_graph_transition_rejected() {
    let h = harness(30);
    let created = h.manager.create(checkout(Uuid::new_v4(), Uuid::new_v4(), None)).await.unwrap();
    let admin = Actor::new(Uuid::new_v4(), ActorRole::Admin);

    let err = h
        .manager
        .transition(created.order.id, OrderStatus::Ready, admin, None)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidTransition { .. }));

    let unchanged = h.manager.get_order(created.order.id).await.unwrap();
    assert_eq!(unchanged.order.status, OrderStatus::Pending);
    assert_eq!(unchanged.history.len(), 1);
}

#[tokio::test]
async fn test_unknown_order_not_found() {
    let h = harness(30);
    let admin = Actor::new(Uuid::new_v4(), ActorRole::Admin);
    let err = h
        .manager
        .transition(Uuid::new_v4(), OrderStatus::Confirmed, admin, None)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::NotFound(_)));
}

#[tokio::test]
async fn test_terminal_orders_are_immutable() {
    let h = harness(30);
    let customer = Uuid::new_v4();
    let created = h.manager.create(checkout(customer, Uuid::new_v4(), None)).await.unwrap();
    let order_id = created.order.id;

    h.manager
        .transition(
            order_id,
            OrderStatus::Cancelled,
            Actor::new(customer, ActorRole::Customer),
            Some("changed my mind".into()),
        )
        .await
        .unwrap();

    let admin = Actor::new(Uuid::new_v4(), ActorRole::Admin);
    for target in [OrderStatus::Confirmed, OrderStatus::Cancelled, OrderStatus::Delivered] {
        let err = h
            .manager
            .transition(order_id, target, admin, Some("again".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    let result = h.manager.get_order(order_id).await.unwrap();
    assert_eq!(result.order.status, OrderStatus::Cancelled);
    assert_eq!(result.history.len(), 2);
}

#[tokio::test]
async fn test_cancellation_requires_reason_and_records_party() {
    let h = harness(30);
    let customer = Uuid::new_v4();
    let created = h.manager.create(checkout(customer, Uuid::new_v4(), None)).await.unwrap();
    let actor = Actor::new(customer, ActorRole::Customer);

    let err = h
        .manager
        .transition(created.order.id, OrderStatus::Cancelled, actor, None)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Validation(_)));

    let cancelled = h
        .manager
        .transition(created.order.id, OrderStatus::Cancelled, actor, Some("too slow".into()))
        .await
        .unwrap();
    let cancellation = cancelled.order.cancellation.unwrap();
    assert_eq!(cancellation.reason, "too slow");
    assert_eq!(cancellation.cancelled_by, ActorRole::Customer);
}

#[tokio::test]
async fn test_cancel_after_pickup_needs_admin() {
    let h = harness(30);
    let customer = Uuid::new_v4();
    let driver = Actor::new(Uuid::new_v4(), ActorRole::Driver);
    let created = h.manager.create(checkout(customer, Uuid::new_v4(), None)).await.unwrap();
    let order_id = created.order.id;

    drive_to(
        &h,
        order_id,
        driver,
        &[
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Assigned,
            OrderStatus::PickedUp,
        ],
    )
    .await;

    let err = h
        .manager
        .transition(
            order_id,
            OrderStatus::Cancelled,
            Actor::new(customer, ActorRole::Customer),
            Some("never mind".into()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Forbidden(_)));

    let admin = Actor::new(Uuid::new_v4(), ActorRole::Admin);
    let cancelled = h
        .manager
        .transition(order_id, OrderStatus::Cancelled, admin, Some("fraud hold".into()))
        .await
        .unwrap();
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_customer_cannot_advance_statuses() {
    let h = harness(30);
    let customer = Uuid::new_v4();
    let created = h.manager.create(checkout(customer, Uuid::new_v4(), None)).await.unwrap();

    let err = h
        .manager
        .transition(
            created.order.id,
            OrderStatus::Confirmed,
            Actor::new(customer, ActorRole::Customer),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Forbidden(_)));
}

#[tokio::test]
async fn test_driver_release_clears_assignment() {
    let h = harness(30);
    let driver = Actor::new(Uuid::new_v4(), ActorRole::Driver);
    let created = h.manager.create(checkout(Uuid::new_v4(), Uuid::new_v4(), None)).await.unwrap();
    let order_id = created.order.id;

    drive_to(
        &h,
        order_id,
        driver,
        &[OrderStatus::Confirmed, OrderStatus::Preparing, OrderStatus::Ready, OrderStatus::Assigned],
    )
    .await;
    assert_eq!(
        h.manager.get_order(order_id).await.unwrap().order.driver_id,
        Some(driver.id)
    );

    // No-show: back to READY, order returns to the pool.
    h.manager.transition(order_id, OrderStatus::Ready, driver, None).await.unwrap();
    assert_eq!(h.manager.get_order(order_id).await.unwrap().order.driver_id, None);

    let replacement = Actor::new(Uuid::new_v4(), ActorRole::Driver);
    h.manager.transition(order_id, OrderStatus::Assigned, replacement, None).await.unwrap();
    assert_eq!(
        h.manager.get_order(order_id).await.unwrap().order.driver_id,
        Some(replacement.id)
    );
}

#[tokio::test]
async fn test_lifecycle_events_reach_order_topic_in_order() {
    let h = harness(30);
    let restaurant = Actor::new(Uuid::new_v4(), ActorRole::Restaurant);
    let created = h.manager.create(checkout(Uuid::new_v4(), Uuid::new_v4(), None)).await.unwrap();
    let order_id = created.order.id;

    let mut rx = h.broadcaster.subscribe(Topic::Order(order_id));
    h.manager.transition(order_id, OrderStatus::Confirmed, restaurant, None).await.unwrap();
    h.manager.transition(order_id, OrderStatus::Preparing, restaurant, None).await.unwrap();

    assert_eq!(rx.recv().await.unwrap().status, OrderStatus::Confirmed);
    assert_eq!(rx.recv().await.unwrap().status, OrderStatus::Preparing);
}

#[tokio::test]
async fn test_no_events_after_terminal_but_reads_still_serve() {
    let h = harness(30);
    let customer = Uuid::new_v4();
    let created = h.manager.create(checkout(customer, Uuid::new_v4(), None)).await.unwrap();
    let order_id = created.order.id;

    h.manager
        .transition(
            order_id,
            OrderStatus::Cancelled,
            Actor::new(customer, ActorRole::Customer),
            Some("dup order".into()),
        )
        .await
        .unwrap();

    let mut rx = h.broadcaster.subscribe(Topic::Order(order_id));
    assert!(rx.try_recv().is_err());

    let read = h.manager.get_order(order_id).await.unwrap();
    assert_eq!(read.order.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_active_counts_track_non_terminal_orders() {
    let h = harness(30);
    let customer = Uuid::new_v4();
    let restaurant = Actor::new(Uuid::new_v4(), ActorRole::Restaurant);

    let a = h.manager.create(checkout(customer, Uuid::new_v4(), None)).await.unwrap();
    let b = h.manager.create(checkout(customer, Uuid::new_v4(), None)).await.unwrap();
    h.manager.transition(b.order.id, OrderStatus::Confirmed, restaurant, None).await.unwrap();

    let counts = h.manager.active_counts().await.unwrap();
    assert_eq!(counts.get(&OrderStatus::Pending), Some(&1));
    assert_eq!(counts.get(&OrderStatus::Confirmed), Some(&1));

    h.manager
        .transition(
            a.order.id,
            OrderStatus::Cancelled,
            Actor::new(customer, ActorRole::Customer),
            Some("mistake".into()),
        )
        .await
        .unwrap();
    let counts = h.manager.active_counts().await.unwrap();
    assert_eq!(counts.get(&OrderStatus::Pending), None);

    let listed = h.manager.list_orders(customer).await.unwrap();
    assert_eq!(listed.len(), 2);
}
