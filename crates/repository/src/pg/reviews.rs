use async_trait::async_trait;
use model::{NewReview, Review};
use tokio_postgres::Row;

use super::{rows_into, PgTx};
use crate::{RepositoryError, ReviewsRepository};

const REVIEW_COLUMNS: &str =
    "id, order_id, bike_id, user_id, comment, rating, created_at, updated_at";

fn review_from_row(row: &Row) -> Result<Review, tokio_postgres::Error> {
    Ok(Review {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        bike_id: row.try_get("bike_id")?,
        user_id: row.try_get("user_id")?,
        comment: row.try_get("comment")?,
        rating: row.try_get("rating")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ReviewsRepository for PgTx {
    async fn insert_review(&mut self, review: &NewReview) -> Result<Review, RepositoryError> {
        let query = format!(
            "INSERT INTO reviews (order_id, bike_id, user_id, comment, rating)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {REVIEW_COLUMNS}"
        );
        let row = self
            .query_one_opt(
                &query,
                &[
                    &review.order_id,
                    &review.bike_id,
                    &review.user_id,
                    &review.comment,
                    &review.rating,
                ],
            )
            .await?;
        Ok(review_from_row(&row)?)
    }

    async fn find_review(&mut self, id: i64) -> Result<Review, RepositoryError> {
        let query = format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1");
        let row = self.query_one_opt(&query, &[&id]).await?;
        Ok(review_from_row(&row)?)
    }

    async fn list_reviews(&mut self, bike_id: Option<i64>) -> Result<Vec<Review>, RepositoryError> {
        let query = format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews
             WHERE ($1::bigint IS NULL OR bike_id = $1)
             ORDER BY id"
        );
        let rows = self.conn()?.query(&query, &[&bike_id]).await?;
        rows_into(rows, review_from_row)
    }

    async fn update_review(
        &mut self,
        id: i64,
        comment: &str,
        rating: i16,
    ) -> Result<Review, RepositoryError> {
        let query = format!(
            "UPDATE reviews SET comment = $2, rating = $3, updated_at = now()
             WHERE id = $1
             RETURNING {REVIEW_COLUMNS}"
        );
        let row = self.query_one_opt(&query, &[&id, &comment, &rating]).await?;
        Ok(review_from_row(&row)?)
    }

    async fn delete_review(&mut self, id: i64) -> Result<(), RepositoryError> {
        self.execute_one("DELETE FROM reviews WHERE id = $1", &[&id]).await
    }
}
