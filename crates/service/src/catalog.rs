//! Categories and bikes.
//!
//! Admin-only operations are gated at the HTTP layer; this module enforces
//! the data rules.

use std::sync::Arc;

use model::{Bike, BikeFilter, BikeUpdate, Category, Metadata, NewBike, PageRequest};
use repository::prelude::*;
use tracing::{info, instrument};

use crate::{missing, ServiceError};

const MAX_CATEGORY_NAME: usize = 20;
const MAX_BIKE_NAME: usize = 50;
const MAX_BRAND: usize = 20;
const MAX_DESCRIPTION: usize = 1000;
const MAX_IMAGE_URL: usize = 255;

pub struct CatalogService {
    store: Arc<dyn Store>,
}

fn validate_category_name(name: &str) -> Result<(), ServiceError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_CATEGORY_NAME {
        return Err(ServiceError::Validation(format!(
            "category name must be 1 to {MAX_CATEGORY_NAME} characters"
        )));
    }
    Ok(())
}

/// The bike columns checked on create and after an edit.
struct BikeFields<'a> {
    name: &'a str,
    brand: &'a str,
    description: &'a str,
    image_url: &'a str,
    year: i32,
    price: i64,
    stock: i32,
}

impl<'a> From<&'a NewBike> for BikeFields<'a> {
    fn from(bike: &'a NewBike) -> Self {
        Self {
            name: &bike.name,
            brand: &bike.brand,
            description: &bike.description,
            image_url: &bike.image_url,
            year: bike.year,
            price: bike.price,
            stock: bike.stock,
        }
    }
}

impl<'a> From<&'a Bike> for BikeFields<'a> {
    fn from(bike: &'a Bike) -> Self {
        Self {
            name: &bike.name,
            brand: &bike.brand,
            description: &bike.description,
            image_url: &bike.image_url,
            year: bike.year,
            price: bike.price,
            stock: bike.stock,
        }
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), ServiceError> {
    if value.chars().count() > max {
        return Err(ServiceError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

fn validate_bike(bike: BikeFields<'_>) -> Result<(), ServiceError> {
    if bike.name.trim().is_empty() || bike.name.chars().count() > MAX_BIKE_NAME {
        return Err(ServiceError::Validation(format!(
            "bike name must be 1 to {MAX_BIKE_NAME} characters"
        )));
    }
    if bike.brand.trim().is_empty() {
        return Err(ServiceError::Validation("brand is required".into()));
    }
    check_len("brand", bike.brand, MAX_BRAND)?;
    check_len("description", bike.description, MAX_DESCRIPTION)?;
    check_len("image url", bike.image_url, MAX_IMAGE_URL)?;
    if bike.year <= 0 {
        return Err(ServiceError::Validation("year must be positive".into()));
    }
    if bike.price <= 0 {
        return Err(ServiceError::Validation("price must be greater than zero".into()));
    }
    if bike.stock < 0 {
        return Err(ServiceError::Validation("stock cannot be negative".into()));
    }
    Ok(())
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, ServiceError> {
        let mut tx = self.store.begin().await?;
        let categories = tx.list_categories().await?;
        tx.commit().await?;
        Ok(categories)
    }

    pub async fn get_category(&self, id: i64) -> Result<Category, ServiceError> {
        let mut tx = self.store.begin().await?;
        let category = tx.find_category(id).await.map_err(missing("category"))?;
        tx.commit().await?;
        Ok(category)
    }

    #[instrument(skip(self))]
    pub async fn create_category(&self, name: &str) -> Result<Category, ServiceError> {
        validate_category_name(name)?;
        let mut tx = self.store.begin().await?;
        let category = tx.insert_category(name.trim()).await?;
        tx.commit().await?;
        info!(category_id = category.id, "Category created");
        Ok(category)
    }

    #[instrument(skip(self))]
    pub async fn rename_category(&self, id: i64, name: &str) -> Result<Category, ServiceError> {
        validate_category_name(name)?;
        let mut tx = self.store.begin().await?;
        let category = tx.rename_category(id, name.trim()).await.map_err(missing("category"))?;
        tx.commit().await?;
        Ok(category)
    }

    /// Deletes a category with its bikes. Fails with a conflict while any of
    /// those bikes appears on an order line.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: i64) -> Result<(), ServiceError> {
        let mut tx = self.store.begin().await?;
        tx.delete_category(id).await.map_err(missing("category"))?;
        tx.commit().await?;
        info!(category_id = id, "Category deleted");
        Ok(())
    }

    /// In-stock bikes matching `filter`, one page at a time.
    #[instrument(skip(self))]
    pub async fn list_bikes(
        &self,
        filter: &BikeFilter,
        page: PageRequest,
    ) -> Result<(Vec<Bike>, Metadata), ServiceError> {
        let page = page.normalized();
        let mut tx = self.store.begin().await?;
        let (bikes, total) = tx.list_bikes(filter, page).await?;
        tx.commit().await?;
        Ok((bikes, Metadata::new(page, total)))
    }

    pub async fn get_bike(&self, id: i64) -> Result<Bike, ServiceError> {
        let mut tx = self.store.begin().await?;
        let bike = tx.find_bike(id).await.map_err(missing("bike"))?;
        tx.commit().await?;
        Ok(bike)
    }

    #[instrument(skip(self, bike), fields(name = %bike.name))]
    pub async fn create_bike(&self, bike: &NewBike) -> Result<Bike, ServiceError> {
        validate_bike(BikeFields::from(bike))?;
        let mut tx = self.store.begin().await?;
        tx.find_category(bike.category_id).await.map_err(missing("category"))?;
        let created = tx.insert_bike(bike).await?;
        tx.commit().await?;
        info!(bike_id = created.id, "Bike created");
        Ok(created)
    }

    #[instrument(skip(self, update))]
    pub async fn update_bike(&self, id: i64, update: &BikeUpdate) -> Result<Bike, ServiceError> {
        let mut tx = self.store.begin().await?;
        let mut bike = tx.find_bike(id).await.map_err(missing("bike"))?;
        update.apply(&mut bike);
        validate_bike(BikeFields::from(&bike))?;
        if update.category_id.is_some() {
            tx.find_category(bike.category_id).await.map_err(missing("category"))?;
        }
        let updated = tx.update_bike(&bike).await?;
        tx.commit().await?;
        info!(bike_id = id, "Bike updated");
        Ok(updated)
    }

    /// Deletes a bike and its cart lines. Bikes on order lines are kept.
    #[instrument(skip(self))]
    pub async fn delete_bike(&self, id: i64) -> Result<(), ServiceError> {
        let mut tx = self.store.begin().await?;
        tx.delete_bike(id).await.map_err(missing("bike"))?;
        tx.commit().await?;
        info!(bike_id = id, "Bike deleted");
        Ok(())
    }
}
