mod common;

use common::{line, Fixture};
use model::{BikeFilter, BikeUpdate, NewBike, PageRequest, MAX_PAGE};
use service::{CatalogService, CheckoutService, ServiceError};

fn new_bike(category_id: i64, name: &str, price: i64, stock: i32) -> NewBike {
    NewBike {
        category_id,
        name: name.into(),
        brand: "Polygon".into(),
        description: "All-rounder".into(),
        year: 2024,
        price,
        image_url: "https://img.test/bike.png".into(),
        stock,
        is_available: true,
    }
}

#[tokio::test]
async fn bike_creation_validates_fields_and_category() {
    let fx = Fixture::new().await;
    let catalog = CatalogService::new(fx.store());

    let created = catalog.create_bike(&new_bike(fx.category_id, "Heist X5", 900, 3)).await.unwrap();
    assert_eq!(catalog.get_bike(created.id).await.unwrap().name, "Heist X5");

    assert!(matches!(
        catalog.create_bike(&new_bike(fx.category_id, "Free", 0, 3)).await,
        Err(ServiceError::Validation(_))
    ));
    assert!(matches!(
        catalog.create_bike(&new_bike(fx.category_id, "Negative", 900, -1)).await,
        Err(ServiceError::Validation(_))
    ));
    assert!(matches!(
        catalog.create_bike(&new_bike(999, "Orphan", 900, 1)).await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        catalog.create_bike(&new_bike(fx.category_id, "Heist X5", 900, 3)).await,
        Err(ServiceError::Conflict(_))
    ));
}

#[tokio::test]
async fn listing_hides_sold_out_bikes_and_paginates() {
    let fx = Fixture::new().await;
    let catalog = CatalogService::new(fx.store());
    let seed = [("Alpha", 500, 1), ("Beta", 1_500, 0), ("Gamma", 2_500, 4), ("Delta", 3_500, 2)];
    for (name, price, stock) in seed {
        catalog.create_bike(&new_bike(fx.category_id, name, price, stock)).await.unwrap();
    }

    let (all, meta) = catalog
        .list_bikes(&BikeFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(
        all.iter().map(|b| b.name.as_str()).collect::<Vec<_>>(),
        vec!["Alpha", "Gamma", "Delta"]
    );
    assert_eq!(meta.total_data, 3);

    let filter = BikeFilter {
        min_price: Some(1_000),
        max_price: Some(3_000),
        ..BikeFilter::default()
    };
    let (mid, _) = catalog.list_bikes(&filter, PageRequest::default()).await.unwrap();
    assert_eq!(mid.iter().map(|b| b.name.as_str()).collect::<Vec<_>>(), vec!["Gamma"]);

    let (second, meta) = catalog
        .list_bikes(&BikeFilter::default(), PageRequest { limit: 2, page: 2 })
        .await
        .unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!((meta.total_pages, meta.page), (2, 2));
}

#[tokio::test]
async fn partial_update_keeps_other_fields() {
    let fx = Fixture::new().await;
    let catalog = CatalogService::new(fx.store());
    let bike = catalog.create_bike(&new_bike(fx.category_id, "Heist X5", 900, 3)).await.unwrap();

    let updated = catalog
        .update_bike(bike.id, &BikeUpdate { price: Some(950), ..BikeUpdate::default() })
        .await
        .unwrap();
    assert_eq!((updated.price, updated.stock, updated.name.as_str()), (950, 3, "Heist X5"));

    assert!(matches!(
        catalog.update_bike(bike.id, &BikeUpdate { price: Some(0), ..BikeUpdate::default() }).await,
        Err(ServiceError::Validation(_))
    ));
}

#[tokio::test]
async fn purchased_bikes_cannot_be_deleted() {
    let fx = Fixture::new().await;
    let catalog = CatalogService::new(fx.store());
    let buyer = fx.user("rina").await;
    let sold = fx.bike("Strattos S3", 1_200, 5).await;
    fx.checkout().create_transaction(buyer.id, &[line(&sold, 1)]).await.unwrap();

    assert!(matches!(catalog.delete_bike(sold.id).await, Err(ServiceError::Conflict(_))));
    assert!(matches!(
        catalog.delete_category(fx.category_id).await,
        Err(ServiceError::Conflict(_))
    ));
    assert!(catalog.get_bike(sold.id).await.is_ok());
}

#[tokio::test]
async fn categories_are_unique_and_cascade_to_bikes() {
    let fx = Fixture::new().await;
    let catalog = CatalogService::new(fx.store());

    let mtb = catalog.create_category("MTB").await.unwrap();
    assert!(matches!(catalog.create_category("MTB").await, Err(ServiceError::Conflict(_))));
    assert!(matches!(catalog.create_category("  ").await, Err(ServiceError::Validation(_))));
    let bike = catalog.create_bike(&new_bike(mtb.id, "Xtrada 7", 1_100, 2)).await.unwrap();

    assert_eq!(catalog.rename_category(mtb.id, "Mountain").await.unwrap().name, "Mountain");
    catalog.delete_category(mtb.id).await.unwrap();

    assert!(matches!(catalog.get_bike(bike.id).await, Err(ServiceError::NotFound(_))));
    assert!(matches!(catalog.get_category(mtb.id).await, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn out_of_range_pages_are_empty() {
    let fx = Fixture::new().await;
    let catalog = CatalogService::new(fx.store());
    fx.bike("Strattos S3", 1_200, 5).await;

    let page = PageRequest {
        limit: 100,
        page: i64::MAX,
    };
    let (bikes, meta) = catalog
        .list_bikes(&BikeFilter::default(), page)
        .await
        .unwrap();
    assert!(bikes.is_empty());
    assert_eq!((meta.total_data, meta.page), (1, MAX_PAGE));

    let (transactions, _) = fx.checkout().list_transactions(page).await.unwrap();
    assert!(transactions.is_empty());
}

#[tokio::test]
async fn text_fields_longer_than_their_columns_are_rejected() {
    let fx = Fixture::new().await;
    let catalog = CatalogService::new(fx.store());

    let long_brand = NewBike {
        brand: "B".repeat(21),
        ..new_bike(fx.category_id, "Heist X5", 900, 3)
    };
    assert!(matches!(
        catalog.create_bike(&long_brand).await,
        Err(ServiceError::Validation(_))
    ));
    let long_url = NewBike {
        image_url: format!("https://img.test/{}", "a".repeat(240)),
        ..new_bike(fx.category_id, "Heist X5", 900, 3)
    };
    assert!(matches!(
        catalog.create_bike(&long_url).await,
        Err(ServiceError::Validation(_))
    ));

    let at_limit = NewBike {
        brand: "B".repeat(20),
        description: "d".repeat(1_000),
        ..new_bike(fx.category_id, "Heist X5", 900, 3)
    };
    let bike = catalog.create_bike(&at_limit).await.unwrap();

    let long_description = BikeUpdate {
        description: Some("d".repeat(1_001)),
        ..BikeUpdate::default()
    };
    assert!(matches!(
        catalog.update_bike(bike.id, &long_description).await,
        Err(ServiceError::Validation(_))
    ));
    assert_eq!(catalog.get_bike(bike.id).await.unwrap().description.len(), 1_000);
}
