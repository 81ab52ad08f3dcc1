mod common;

use std::sync::Arc;

use common::{line, Fixture};
use model::{CheckoutLine, LineUpdate, PageRequest, Role, TransactionStatus};
use service::{Caller, CheckoutService, ServiceError};

#[tokio::test]
async fn checkout_persists_header_and_lines_with_matching_total() {
    let fx = Fixture::new().await;
    let buyer = fx.user("rina").await;
    let road = fx.bike("Strattos S3", 1_200, 5).await;
    let gravel = fx.bike("Tambora G1", 2_500, 5).await;
    let city = fx.bike("Lina 20", 800, 5).await;
    let checkout = fx.checkout();

    let lines = [line(&road, 2), line(&gravel, 1), line(&city, 3)];
    let id = checkout.create_transaction(buyer.id, &lines).await.unwrap();

    let stored = checkout.get_transaction(Caller::new(buyer.id, Role::User), id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Pending);
    assert_eq!(stored.total_price, 2_400 + 2_500 + 2_400);
    assert_eq!(stored.total_price, stored.orders.iter().map(|o| o.total_price).sum::<i64>());
    assert_eq!(stored.payment_link.as_deref(), Some(format!("https://pay.test/{id}").as_str()));

    let got: Vec<(i64, i32)> = stored.orders.iter().map(|o| (o.bike_id, o.quantity)).collect();
    assert_eq!(got, vec![(road.id, 2), (gravel.id, 1), (city.id, 3)]);
    assert!(stored.orders.iter().all(|o| o.user_id == buyer.id && !o.reviewed));
}

#[tokio::test]
async fn checkout_does_not_touch_stock() {
    let fx = Fixture::new().await;
    let buyer = fx.user("rina").await;
    let bike = fx.bike("Strattos S3", 1_200, 5).await;

    fx.checkout().create_transaction(buyer.id, &[line(&bike, 2)]).await.unwrap();

    assert_eq!(fx.stock_of(bike.id).await, 5);
}

#[tokio::test]
async fn failure_on_last_line_write_persists_nothing() {
    let fx = Fixture::new().await;
    let buyer = fx.user("rina").await;
    let a = fx.bike("A1", 100, 5).await;
    let b = fx.bike("B1", 200, 5).await;
    let c = fx.bike("C1", 300, 5).await;
    fx.store.fail_order_insert_after(2);

    let err = fx
        .checkout()
        .create_transaction(buyer.id, &[line(&a, 1), line(&b, 1), line(&c, 1)])
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Repository(_)));
    assert!(fx.transactions().await.is_empty());
    assert_eq!(fx.order_count().await, 0);
    assert!(fx.gateway.requests().is_empty());
}

#[tokio::test]
async fn gateway_failure_persists_nothing_and_keeps_cart() {
    let fx = Fixture::new().await;
    let buyer = fx.user("rina").await;
    let bike = fx.bike("Strattos S3", 1_200, 5).await;
    fx.add_to_cart(buyer.id, bike.id, 1).await;
    fx.gateway.fail(true);

    let err = fx.checkout().create_transaction(buyer.id, &[line(&bike, 1)]).await.unwrap_err();

    assert!(matches!(err, ServiceError::Upstream(_)));
    assert!(fx.transactions().await.is_empty());
    assert_eq!(fx.order_count().await, 0);
    assert_eq!(fx.cart_bikes(buyer.id).await, vec![bike.id]);
}

#[tokio::test]
async fn checkout_removes_only_consumed_cart_lines() {
    let fx = Fixture::new().await;
    let buyer = fx.user("rina").await;
    let bought = fx.bike("Strattos S3", 1_200, 5).await;
    let kept = fx.bike("Tambora G1", 2_500, 5).await;
    fx.add_to_cart(buyer.id, bought.id, 1).await;
    fx.add_to_cart(buyer.id, kept.id, 1).await;

    fx.checkout().create_transaction(buyer.id, &[line(&bought, 1)]).await.unwrap();

    assert_eq!(fx.cart_bikes(buyer.id).await, vec![kept.id]);
}

#[tokio::test]
async fn buyer_name_prefers_profile_name() {
    let fx = Fixture::new().await;
    let named = fx.user("rina").await;
    let anonymous = fx.user("budi").await;
    fx.set_profile_name(named.id, "Rina Wati").await;
    let bike = fx.bike("Strattos S3", 1_200, 5).await;
    let checkout = fx.checkout();

    let first = checkout.create_transaction(named.id, &[line(&bike, 1)]).await.unwrap();
    checkout.create_transaction(anonymous.id, &[line(&bike, 1)]).await.unwrap();

    let requests = fx.gateway.requests();
    assert_eq!(requests[0].order_id, first);
    assert_eq!(requests[0].amount, 1_200);
    assert_eq!(requests[0].buyer_name, "Rina Wati");
    assert_eq!(requests[0].buyer_email, "rina@mail.test");
    assert_eq!(requests[1].buyer_name, "budi");
}

#[tokio::test]
async fn client_total_disagreeing_with_catalog_is_rejected() {
    let fx = Fixture::new().await;
    let buyer = fx.user("rina").await;
    let bike = fx.bike("Strattos S3", 1_200, 5).await;

    let cheap = CheckoutLine { bike_id: bike.id, quantity: 2, total_price: 1 };
    let err = fx.checkout().create_transaction(buyer.id, &[cheap]).await.unwrap_err();

    assert!(matches!(err, ServiceError::Validation(_)));
    assert!(fx.transactions().await.is_empty());
}

#[tokio::test]
async fn malformed_line_sets_are_rejected() {
    let fx = Fixture::new().await;
    let buyer = fx.user("rina").await;
    let bike = fx.bike("Strattos S3", 1_200, 2).await;
    let checkout = fx.checkout();

    assert!(matches!(
        checkout.create_transaction(buyer.id, &[]).await,
        Err(ServiceError::Validation(_))
    ));
    let zero = CheckoutLine { bike_id: bike.id, quantity: 0, total_price: 0 };
    assert!(matches!(
        checkout.create_transaction(buyer.id, &[zero]).await,
        Err(ServiceError::Validation(_))
    ));
    let ghost = CheckoutLine { bike_id: 999, quantity: 1, total_price: 1 };
    assert!(matches!(
        checkout.create_transaction(buyer.id, &[ghost]).await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        checkout.create_transaction(buyer.id, &[line(&bike, 3)]).await,
        Err(ServiceError::Validation(_))
    ));
    // Two lines for the same bike count against one stock.
    assert!(matches!(
        checkout.create_transaction(buyer.id, &[line(&bike, 2), line(&bike, 1)]).await,
        Err(ServiceError::Validation(_))
    ));
    assert!(matches!(
        checkout.create_transaction(999, &[line(&bike, 1)]).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn pay_decrements_each_bike_once() {
    let fx = Fixture::new().await;
    let buyer = fx.user("rina").await;
    let first = fx.bike("Strattos S3", 1_200, 5).await;
    let second = fx.bike("Tambora G1", 2_500, 5).await;
    let checkout = fx.checkout();
    let id = checkout
        .create_transaction(buyer.id, &[line(&first, 2), line(&second, 1)])
        .await
        .unwrap();

    let paid = checkout.pay_transaction(buyer.id, id).await.unwrap();
    assert_eq!(paid.status, TransactionStatus::Paid);
    assert_eq!(paid.orders.len(), 2);
    assert_eq!(fx.stock_of(first.id).await, 3);
    assert_eq!(fx.stock_of(second.id).await, 4);

    let again = checkout.pay_transaction(buyer.id, id).await.unwrap_err();
    assert!(matches!(again, ServiceError::InvalidState(_)));
    assert_eq!(fx.stock_of(first.id).await, 3);
    assert_eq!(fx.stock_of(second.id).await, 4);
}

#[tokio::test]
async fn concurrent_payments_decrement_stock_once() {
    let fx = Fixture::new().await;
    let buyer = fx.user("rina").await;
    let bike = fx.bike("Strattos S3", 1_200, 5).await;
    let checkout = Arc::new(fx.checkout());
    let id = checkout.create_transaction(buyer.id, &[line(&bike, 2)]).await.unwrap();
    let buyer_id = buyer.id;

    let a = tokio::spawn({
        let checkout = Arc::clone(&checkout);
        async move { checkout.pay_transaction(buyer_id, id).await }
    });
    let b = tokio::spawn({
        let checkout = Arc::clone(&checkout);
        async move { checkout.pay_transaction(buyer_id, id).await }
    });
    let results = [a.await.unwrap(), b.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(r, Err(ServiceError::InvalidState(_)))));
    assert_eq!(fx.stock_of(bike.id).await, 3);
}

#[tokio::test]
async fn insufficient_stock_at_payment_keeps_transaction_pending() {
    let fx = Fixture::new().await;
    let buyer = fx.user("rina").await;
    let plenty = fx.bike("Strattos S3", 1_200, 5).await;
    let scarce = fx.bike("Tambora G1", 2_500, 3).await;
    let checkout = fx.checkout();
    let id = checkout
        .create_transaction(buyer.id, &[line(&plenty, 1), line(&scarce, 2)])
        .await
        .unwrap();
    fx.set_stock(scarce.id, 1).await;

    let err = checkout.pay_transaction(buyer.id, id).await.unwrap_err();

    assert!(matches!(
        err,
        ServiceError::InsufficientStock { bike_id, available: 1, requested: 2 }
            if bike_id == scarce.id
    ));
    let stored = checkout.get_transaction(Caller::new(buyer.id, Role::User), id).await.unwrap();
    assert_eq!(stored.status, TransactionStatus::Pending);
    assert_eq!(fx.stock_of(plenty.id).await, 5);
    assert_eq!(fx.stock_of(scarce.id).await, 1);
}

#[tokio::test]
async fn pay_sums_repeated_bikes_listed_out_of_id_order() {
    let fx = Fixture::new().await;
    let buyer = fx.user("rina").await;
    let low = fx.bike("Strattos S3", 1_200, 5).await;
    let high = fx.bike("Tambora G1", 2_500, 5).await;
    let checkout = fx.checkout();
    let id = checkout
        .create_transaction(buyer.id, &[line(&high, 1), line(&low, 2), line(&high, 2)])
        .await
        .unwrap();

    checkout.pay_transaction(buyer.id, id).await.unwrap();

    assert_eq!(fx.stock_of(low.id).await, 3);
    assert_eq!(fx.stock_of(high.id).await, 2);
}

#[tokio::test]
async fn payment_short_on_a_repeated_bike_changes_nothing() {
    let fx = Fixture::new().await;
    let buyer = fx.user("rina").await;
    let first = fx.bike("Strattos S3", 1_200, 5).await;
    let repeated = fx.bike("Tambora G1", 2_500, 4).await;
    let checkout = fx.checkout();
    let id = checkout
        .create_transaction(
            buyer.id,
            &[line(&repeated, 2), line(&first, 1), line(&repeated, 2)],
        )
        .await
        .unwrap();
    fx.set_stock(repeated.id, 3).await;

    let err = checkout.pay_transaction(buyer.id, id).await.unwrap_err();

    assert!(matches!(
        err,
        ServiceError::InsufficientStock { bike_id, available: 3, requested: 4 }
            if bike_id == repeated.id
    ));
    assert_eq!(fx.stock_of(first.id).await, 5);
    assert_eq!(fx.stock_of(repeated.id).await, 3);
}

#[tokio::test]
async fn update_reprices_lines_and_total() {
    let fx = Fixture::new().await;
    let buyer = fx.user("rina").await;
    let road = fx.bike("Strattos S3", 1_200, 5).await;
    let gravel = fx.bike("Tambora G1", 2_500, 5).await;
    let checkout = fx.checkout();
    let id = checkout
        .create_transaction(buyer.id, &[line(&road, 1), line(&road, 1)])
        .await
        .unwrap();
    let before = checkout.get_transaction(Caller::new(buyer.id, Role::User), id).await.unwrap();
    let target = before.orders[1].id;

    let updated = checkout
        .update_transaction(
            buyer.id,
            id,
            &[LineUpdate { id: target, bike_id: gravel.id, quantity: 2, total_price: 5_000 }],
        )
        .await
        .unwrap();

    assert_eq!(updated.total_price, 1_200 + 5_000);
    assert_eq!(updated.total_price, updated.orders.iter().map(|o| o.total_price).sum::<i64>());
    let changed = updated.orders.iter().find(|o| o.id == target).unwrap();
    assert_eq!((changed.bike_id, changed.quantity), (gravel.id, 2));
}

#[tokio::test]
async fn update_rejects_lines_of_other_transactions() {
    let fx = Fixture::new().await;
    let buyer = fx.user("rina").await;
    let bike = fx.bike("Strattos S3", 1_200, 5).await;
    let checkout = fx.checkout();
    let mine = checkout.create_transaction(buyer.id, &[line(&bike, 1)]).await.unwrap();
    let other = checkout.create_transaction(buyer.id, &[line(&bike, 1)]).await.unwrap();
    let foreign_line = checkout
        .get_transaction(Caller::new(buyer.id, Role::User), other)
        .await
        .unwrap()
        .orders[0]
        .id;

    let err = checkout
        .update_transaction(
            buyer.id,
            mine,
            &[LineUpdate { id: foreign_line, bike_id: bike.id, quantity: 1, total_price: 1_200 }],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn update_checks_stock_across_all_lines_of_a_bike() {
    let fx = Fixture::new().await;
    let buyer = fx.user("rina").await;
    let scarce = fx.bike("Strattos S3", 1_200, 3).await;
    let other = fx.bike("Tambora G1", 2_500, 5).await;
    let checkout = fx.checkout();
    let id = checkout
        .create_transaction(buyer.id, &[line(&scarce, 1), line(&other, 1)])
        .await
        .unwrap();
    let before = checkout
        .get_transaction(Caller::new(buyer.id, Role::User), id)
        .await
        .unwrap();
    let second = before.orders.iter().find(|o| o.bike_id == other.id).unwrap().id;

    // Three more on top of the existing line ask for four of three.
    let err = checkout
        .update_transaction(
            buyer.id,
            id,
            &[LineUpdate { id: second, bike_id: scarce.id, quantity: 3, total_price: 3_600 }],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let after = checkout
        .get_transaction(Caller::new(buyer.id, Role::User), id)
        .await
        .unwrap();
    assert_eq!(after.total_price, before.total_price);
    assert_eq!(after.orders, before.orders);

    // Moving the whole line within stock is fine.
    let ok = checkout
        .update_transaction(
            buyer.id,
            id,
            &[LineUpdate { id: second, bike_id: scarce.id, quantity: 2, total_price: 2_400 }],
        )
        .await
        .unwrap();
    assert_eq!(ok.total_price, 3_600);
}

#[tokio::test]
async fn paid_transactions_cannot_be_updated_or_deleted() {
    let fx = Fixture::new().await;
    let buyer = fx.user("rina").await;
    let bike = fx.bike("Strattos S3", 1_200, 5).await;
    let checkout = fx.checkout();
    let id = checkout.create_transaction(buyer.id, &[line(&bike, 1)]).await.unwrap();
    checkout.pay_transaction(buyer.id, id).await.unwrap();
    let before = checkout.get_transaction(Caller::new(buyer.id, Role::User), id).await.unwrap();

    let update = LineUpdate {
        id: before.orders[0].id,
        bike_id: bike.id,
        quantity: 3,
        total_price: 3_600,
    };
    assert!(matches!(
        checkout.update_transaction(buyer.id, id, &[update]).await,
        Err(ServiceError::InvalidState(_))
    ));
    assert!(matches!(
        checkout.delete_transaction(buyer.id, id).await,
        Err(ServiceError::InvalidState(_))
    ));

    let after = checkout.get_transaction(Caller::new(buyer.id, Role::User), id).await.unwrap();
    assert_eq!(after.status, TransactionStatus::Paid);
    assert_eq!(after.total_price, before.total_price);
    assert_eq!(after.orders, before.orders);
}

#[tokio::test]
async fn deleting_pending_transaction_removes_lines() {
    let fx = Fixture::new().await;
    let buyer = fx.user("rina").await;
    let bike = fx.bike("Strattos S3", 1_200, 5).await;
    let checkout = fx.checkout();
    let id = checkout.create_transaction(buyer.id, &[line(&bike, 1)]).await.unwrap();

    checkout.delete_transaction(buyer.id, id).await.unwrap();

    assert!(fx.transactions().await.is_empty());
    assert_eq!(fx.order_count().await, 0);
}

#[tokio::test]
async fn other_users_cannot_see_or_touch_a_transaction() {
    let fx = Fixture::new().await;
    let buyer = fx.user("rina").await;
    let stranger = fx.user("budi").await;
    let bike = fx.bike("Strattos S3", 1_200, 5).await;
    let checkout = fx.checkout();
    let id = checkout.create_transaction(buyer.id, &[line(&bike, 1)]).await.unwrap();

    let as_stranger = Caller::new(stranger.id, Role::User);
    assert!(matches!(
        checkout.get_transaction(as_stranger, id).await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        checkout.pay_transaction(stranger.id, id).await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        checkout.delete_transaction(stranger.id, id).await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        checkout.user_transactions(as_stranger, buyer.id).await,
        Err(ServiceError::Forbidden(_))
    ));

    let as_admin = Caller::new(stranger.id, Role::Admin);
    assert_eq!(checkout.get_transaction(as_admin, id).await.unwrap().id, id);
    assert_eq!(fx.stock_of(bike.id).await, 5);
}

#[tokio::test]
async fn listings_are_newest_first_with_metadata() {
    let fx = Fixture::new().await;
    let buyer = fx.user("rina").await;
    let bike = fx.bike("Strattos S3", 1_000, 50).await;
    let checkout = fx.checkout();
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(checkout.create_transaction(buyer.id, &[line(&bike, 1)]).await.unwrap());
    }

    let (page, meta) = checkout.list_transactions(PageRequest { limit: 2, page: 1 }).await.unwrap();
    assert_eq!(page.iter().map(|t| t.id).collect::<Vec<_>>(), vec![ids[2], ids[1]]);
    assert!(page.iter().all(|t| t.orders.len() == 1));
    assert_eq!((meta.page, meta.limit, meta.total_pages, meta.total_data), (1, 2, 2, 3));

    let mine = checkout
        .user_transactions(Caller::new(buyer.id, Role::User), buyer.id)
        .await
        .unwrap();
    assert_eq!(mine.username, "rina");
    assert_eq!(mine.transactions.len(), 3);
    assert_eq!(mine.transactions[0].id, ids[2]);
}
