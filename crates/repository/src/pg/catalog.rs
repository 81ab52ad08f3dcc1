use async_trait::async_trait;
use model::{Bike, BikeFilter, Category, NewBike, PageRequest};
use tokio_postgres::Row;

use super::{rows_into, PgTx};
use crate::{CatalogRepository, RepositoryError};

const CATEGORY_COLUMNS: &str = "id, name, created_at, updated_at";

const BIKE_COLUMNS: &str = "id, category_id, name, brand, description, year, price, image_url, \
                            stock, is_available, created_at, updated_at";

const BIKE_RATING: &str =
    "COALESCE((SELECT AVG(r.rating)::float8 FROM reviews r WHERE r.bike_id = bikes.id), 0)::float8 \
     AS rating";

/// Filters shared by the listing and its count; `$1..$6` follow [`BikeFilter`] field order.
const BIKE_FILTER: &str = "stock > 0
    AND ($1::bigint IS NULL OR category_id = $1)
    AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%')
    AND ($3::bigint IS NULL OR price >= $3)
    AND ($4::bigint IS NULL OR price <= $4)
    AND ($5::int IS NULL OR year >= $5)
    AND ($6::int IS NULL OR year <= $6)";

fn category_from_row(row: &Row) -> Result<Category, tokio_postgres::Error> {
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn bike_from_row(row: &Row) -> Result<Bike, tokio_postgres::Error> {
    Ok(Bike {
        id: row.try_get("id")?,
        category_id: row.try_get("category_id")?,
        name: row.try_get("name")?,
        brand: row.try_get("brand")?,
        description: row.try_get("description")?,
        year: row.try_get("year")?,
        price: row.try_get("price")?,
        image_url: row.try_get("image_url")?,
        stock: row.try_get("stock")?,
        is_available: row.try_get("is_available")?,
        rating: row.try_get("rating")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl CatalogRepository for PgTx {
    async fn insert_category(&mut self, name: &str) -> Result<Category, RepositoryError> {
        let query =
            format!("INSERT INTO categories (name) VALUES ($1) RETURNING {CATEGORY_COLUMNS}");
        let row = self.query_one_opt(&query, &[&name]).await?;
        Ok(category_from_row(&row)?)
    }

    async fn find_category(&mut self, id: i64) -> Result<Category, RepositoryError> {
        let query = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        let row = self.query_one_opt(&query, &[&id]).await?;
        Ok(category_from_row(&row)?)
    }

    async fn list_categories(&mut self) -> Result<Vec<Category>, RepositoryError> {
        let query = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY id");
        let rows = self.conn()?.query(&query, &[]).await?;
        rows_into(rows, category_from_row)
    }

    async fn rename_category(&mut self, id: i64, name: &str) -> Result<Category, RepositoryError> {
        let query = format!(
            "UPDATE categories SET name = $2, updated_at = now() WHERE id = $1
             RETURNING {CATEGORY_COLUMNS}"
        );
        let row = self.query_one_opt(&query, &[&id, &name]).await?;
        Ok(category_from_row(&row)?)
    }

    async fn delete_category(&mut self, id: i64) -> Result<(), RepositoryError> {
        self.execute_one("DELETE FROM categories WHERE id = $1", &[&id]).await
    }

    async fn insert_bike(&mut self, bike: &NewBike) -> Result<Bike, RepositoryError> {
        let query = format!(
            "INSERT INTO bikes (category_id, name, brand, description, year, price, image_url,
                                stock, is_available)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {BIKE_COLUMNS}, 0::float8 AS rating"
        );
        let row = self
            .query_one_opt(
                &query,
                &[
                    &bike.category_id,
                    &bike.name,
                    &bike.brand,
                    &bike.description,
                    &bike.year,
                    &bike.price,
                    &bike.image_url,
                    &bike.stock,
                    &bike.is_available,
                ],
            )
            .await?;
        Ok(bike_from_row(&row)?)
    }

    async fn find_bike(&mut self, id: i64) -> Result<Bike, RepositoryError> {
        let query = format!("SELECT {BIKE_COLUMNS}, {BIKE_RATING} FROM bikes WHERE id = $1");
        let row = self.query_one_opt(&query, &[&id]).await?;
        Ok(bike_from_row(&row)?)
    }

    async fn lock_bike(&mut self, id: i64) -> Result<Bike, RepositoryError> {
        // Locked reads serve stock bookkeeping only; the rating is not computed.
        let query = format!(
            "SELECT {BIKE_COLUMNS}, 0::float8 AS rating FROM bikes WHERE id = $1 FOR UPDATE"
        );
        let row = self.query_one_opt(&query, &[&id]).await?;
        Ok(bike_from_row(&row)?)
    }

    async fn list_bikes(
        &mut self,
        filter: &BikeFilter,
        page: PageRequest,
    ) -> Result<(Vec<Bike>, i64), RepositoryError> {
        let conn = self.conn()?;
        let count_query = format!("SELECT COUNT(*) AS total FROM bikes WHERE {BIKE_FILTER}");
        let total: i64 = conn
            .query_one(
                &count_query,
                &[
                    &filter.category_id,
                    &filter.name,
                    &filter.min_price,
                    &filter.max_price,
                    &filter.min_year,
                    &filter.max_year,
                ],
            )
            .await?
            .try_get("total")?;

        let query = format!(
            "SELECT {BIKE_COLUMNS}, {BIKE_RATING} FROM bikes WHERE {BIKE_FILTER}
             ORDER BY id LIMIT $7 OFFSET $8"
        );
        let rows = conn
            .query(
                &query,
                &[
                    &filter.category_id,
                    &filter.name,
                    &filter.min_price,
                    &filter.max_price,
                    &filter.min_year,
                    &filter.max_year,
                    &page.limit,
                    &page.offset(),
                ],
            )
            .await?;
        Ok((rows_into(rows, bike_from_row)?, total))
    }

    async fn update_bike(&mut self, bike: &Bike) -> Result<Bike, RepositoryError> {
        let query = format!(
            "UPDATE bikes SET category_id = $2, name = $3, brand = $4, description = $5, year = $6,
                 price = $7, image_url = $8, stock = $9, is_available = $10, updated_at = now()
             WHERE id = $1
             RETURNING {BIKE_COLUMNS}, {BIKE_RATING}"
        );
        let row = self
            .query_one_opt(
                &query,
                &[
                    &bike.id,
                    &bike.category_id,
                    &bike.name,
                    &bike.brand,
                    &bike.description,
                    &bike.year,
                    &bike.price,
                    &bike.image_url,
                    &bike.stock,
                    &bike.is_available,
                ],
            )
            .await?;
        Ok(bike_from_row(&row)?)
    }

    async fn set_bike_stock(&mut self, id: i64, stock: i32) -> Result<(), RepositoryError> {
        self.execute_one(
            "UPDATE bikes SET stock = $2, updated_at = now() WHERE id = $1",
            &[&id, &stock],
        )
        .await
    }

    async fn delete_bike(&mut self, id: i64) -> Result<(), RepositoryError> {
        self.execute_one("DELETE FROM bikes WHERE id = $1", &[&id]).await
    }
}
