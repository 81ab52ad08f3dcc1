//! Reviews of purchased order lines.
//!
//! A line can be reviewed once, by its buyer, after its transaction is paid.
//! The line's `reviewed` flag tracks whether a review currently exists.

use std::sync::Arc;

use model::{NewReview, Review};
use repository::prelude::*;
use tracing::{info, instrument};

use crate::{missing, Caller, ServiceError};

pub struct ReviewService {
    store: Arc<dyn Store>,
}

fn validate(comment: &str, rating: i16) -> Result<(), ServiceError> {
    if !(1..=5).contains(&rating) {
        return Err(ServiceError::Validation("rating must be between 1 and 5".into()));
    }
    if comment.trim().is_empty() {
        return Err(ServiceError::Validation("comment is required".into()));
    }
    Ok(())
}

impl ReviewService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, comment))]
    pub async fn create_review(
        &self,
        user_id: i64,
        order_id: i64,
        comment: &str,
        rating: i16,
    ) -> Result<Review, ServiceError> {
        validate(comment, rating)?;

        let mut tx = self.store.begin().await?;
        let order = tx.find_order(order_id).await.map_err(missing("order line"))?;
        if order.user_id != user_id {
            return Err(ServiceError::Forbidden("only the buyer can review this order line".into()));
        }
        let transaction = tx.find_transaction(order.transaction_id).await?;
        if transaction.is_pending() {
            return Err(ServiceError::InvalidState("order line has not been paid".into()));
        }
        if order.reviewed {
            return Err(ServiceError::Conflict("order line already reviewed".into()));
        }

        let review = tx
            .insert_review(&NewReview {
                order_id,
                bike_id: order.bike_id,
                user_id,
                comment: comment.to_owned(),
                rating,
            })
            .await?;
        tx.set_order_reviewed(order_id, true).await?;
        tx.commit().await?;

        info!(review_id = review.id, order_id, "Review created");
        Ok(review)
    }

    /// Edits comment and rating; only the author may do so.
    #[instrument(skip(self, comment))]
    pub async fn update_review(
        &self,
        user_id: i64,
        review_id: i64,
        comment: &str,
        rating: i16,
    ) -> Result<Review, ServiceError> {
        validate(comment, rating)?;

        let mut tx = self.store.begin().await?;
        let review = tx.find_review(review_id).await.map_err(missing("review"))?;
        if review.user_id != user_id {
            return Err(ServiceError::Forbidden("only the author can edit this review".into()));
        }
        let updated = tx.update_review(review_id, comment, rating).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Deletes a review and clears its line's `reviewed` flag. Authors and admins only.
    #[instrument(skip(self))]
    pub async fn delete_review(&self, caller: Caller, review_id: i64) -> Result<(), ServiceError> {
        let mut tx = self.store.begin().await?;
        let review = tx.find_review(review_id).await.map_err(missing("review"))?;
        if !caller.can_access(review.user_id) {
            return Err(ServiceError::Forbidden("only the author can delete this review".into()));
        }
        tx.delete_review(review_id).await?;
        tx.set_order_reviewed(review.order_id, false).await?;
        tx.commit().await?;

        info!(review_id, "Review deleted");
        Ok(())
    }

    pub async fn get_review(&self, review_id: i64) -> Result<Review, ServiceError> {
        let mut tx = self.store.begin().await?;
        let review = tx.find_review(review_id).await.map_err(missing("review"))?;
        tx.commit().await?;
        Ok(review)
    }

    pub async fn list_reviews(&self, bike_id: Option<i64>) -> Result<Vec<Review>, ServiceError> {
        let mut tx = self.store.begin().await?;
        let reviews = tx.list_reviews(bike_id).await?;
        tx.commit().await?;
        Ok(reviews)
    }
}
