//! Server-side line pricing. Client-supplied totals are only ever compared
//! against these results, never stored.

use model::Bike;

use crate::ServiceError;

/// `price × quantity`, rejecting non-positive quantities and overflow.
pub fn line_total(price: i64, quantity: i32) -> Result<i64, ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::Validation("quantity must be greater than zero".into()));
    }
    price
        .checked_mul(i64::from(quantity))
        .ok_or_else(|| ServiceError::Validation("line total is out of range".into()))
}

/// Sums line totals with overflow checking.
pub fn sum_totals(totals: impl IntoIterator<Item = i64>) -> Result<i64, ServiceError> {
    totals.into_iter().try_fold(0i64, |acc, total| {
        acc.checked_add(total)
            .ok_or_else(|| ServiceError::Validation("transaction total is out of range".into()))
    })
}

/// Prices `quantity` units of `bike` and checks the caller's claimed total.
///
/// The bike must be available with at least `quantity` units in stock.
pub fn price_line(bike: &Bike, quantity: i32, claimed_total: i64) -> Result<i64, ServiceError> {
    if !bike.is_available {
        return Err(ServiceError::Validation(format!("bike {} is not available", bike.id)));
    }
    let total = line_total(bike.price, quantity)?;
    if quantity > bike.stock {
        return Err(ServiceError::Validation(format!(
            "bike {} has {} in stock, {} requested",
            bike.id, bike.stock, quantity
        )));
    }
    if claimed_total != total {
        return Err(ServiceError::Validation(format!(
            "total price {claimed_total} for bike {} does not match {total}",
            bike.id
        )));
    }
    Ok(total)
}
