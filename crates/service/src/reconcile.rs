//! Stock bookkeeping on payment confirmation.

use std::collections::BTreeMap;

use repository::CatalogRepository;
use tracing::{debug, warn};

use crate::{missing, ServiceError};

/// Total units requested per bike, keyed in ascending bike id order.
pub fn stock_demand<I>(lines: I) -> Result<BTreeMap<i64, i32>, ServiceError>
where
    I: IntoIterator<Item = (i64, i32)>,
{
    let mut demand = BTreeMap::new();
    for (bike_id, quantity) in lines {
        let wanted: &mut i32 = demand.entry(bike_id).or_default();
        *wanted = wanted
            .checked_add(quantity)
            .ok_or_else(|| ServiceError::Validation("quantity is out of range".into()))?;
    }
    Ok(demand)
}

/// Decrements stock for every bike in `demand`.
///
/// Bike rows are locked in ascending id order, so concurrent payments that
/// share bikes queue up instead of deadlocking. Insufficient stock on any
/// bike fails the whole call; the caller's unit of work must then be
/// discarded.
pub async fn reconcile<R>(repo: &mut R, demand: &BTreeMap<i64, i32>) -> Result<(), ServiceError>
where
    R: CatalogRepository + ?Sized,
{
    for (&bike_id, &requested) in demand {
        let bike = repo.lock_bike(bike_id).await.map_err(missing("bike"))?;
        if bike.stock < requested {
            warn!(
                bike_id,
                available = bike.stock,
                requested,
                "Insufficient stock on payment"
            );
            return Err(ServiceError::InsufficientStock {
                bike_id,
                available: bike.stock,
                requested,
            });
        }
        let remaining = bike.stock - requested;
        repo.set_bike_stock(bike_id, remaining).await?;
        debug!(bike_id, remaining, "Stock decremented");
    }
    Ok(())
}
