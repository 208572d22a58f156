//! Stock allocation engine
//!
//! Turns a demand (receive, adjust or consume) into an ordered plan of
//! per-batch quantity changes. Nothing here touches storage: identical
//! batch snapshots and demands always produce identical plans.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Batch, MovementType};
use crate::validation::MAX_QUANTITY;

/// Allocation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(&'static str),

    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        requested: Decimal,
        available: Decimal,
    },
}

/// One step of a plan: change one batch by `delta`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub batch_id: Uuid,
    pub delta: Decimal,
}

/// Ordered list of steps for one movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub movement_type: MovementType,
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Sum of all step deltas
    pub fn net_change(&self) -> Decimal {
        self.steps
            .iter()
            .fold(Decimal::ZERO, |acc, s| acc.saturating_add(s.delta))
    }
}

/// Plan a receipt of `qty` into a single batch
pub fn plan_receive(batch_id: Uuid, qty: Decimal) -> Result<Plan, AllocationError> {
    if qty <= Decimal::ZERO {
        return Err(AllocationError::InvalidQuantity("quantity must be greater than zero"));
    }

    Ok(Plan {
        movement_type: MovementType::In,
        steps: vec![PlanStep { batch_id, delta: qty }],
    })
}

/// Plan a signed stocktake correction on a single batch
pub fn plan_adjust(batch_id: Uuid, delta: Decimal) -> Result<Plan, AllocationError> {
    if delta.is_zero() {
        return Err(AllocationError::InvalidQuantity("delta must not be zero"));
    }

    Ok(Plan {
        movement_type: MovementType::Adjust,
        steps: vec![PlanStep { batch_id, delta }],
    })
}

/// Plan consumption of `qty` across an item's batches, first-expire-first-out
///
/// Batches with no stock are skipped. If the batches together hold less than
/// `qty`, no plan is produced at all.
pub fn plan_consume(batches: &[Batch], qty: Decimal) -> Result<Plan, AllocationError> {
    if qty <= Decimal::ZERO {
        return Err(AllocationError::InvalidQuantity("quantity must be greater than zero"));
    }

    let mut candidates: Vec<&Batch> = batches.iter().filter(|b| b.qty > Decimal::ZERO).collect();
    let available = candidates
        .iter()
        .fold(Decimal::ZERO, |acc, b| acc.saturating_add(b.qty));
    if available < qty {
        return Err(AllocationError::InsufficientStock {
            requested: qty,
            available,
        });
    }

    candidates.sort_by(|a, b| fefo_cmp(a, b));

    let mut remaining = qty;
    let mut steps = Vec::new();
    for batch in candidates {
        if remaining <= Decimal::ZERO {
            break;
        }
        let take = batch.qty.min(remaining);
        steps.push(PlanStep {
            batch_id: batch.id,
            delta: -take,
        });
        remaining -= take;
    }

    Ok(Plan {
        movement_type: MovementType::Out,
        steps,
    })
}

/// FEFO ordering: earliest expiry first, undated batches last, then
/// oldest stock first. Batch id breaks any remaining tie.
pub fn fefo_cmp(a: &Batch, b: &Batch) -> Ordering {
    let by_expiry = match (a.expiry_date, b.expiry_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    by_expiry
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Quantity a batch would hold after `delta`; rejects anything below zero
/// or above [`MAX_QUANTITY`]
pub fn next_quantity(current: Decimal, delta: Decimal) -> Result<Decimal, AllocationError> {
    let next = current
        .checked_add(delta)
        .filter(|next| *next <= MAX_QUANTITY)
        .ok_or(AllocationError::InvalidQuantity("batch quantity would exceed the maximum"))?;
    if next < Decimal::ZERO {
        return Err(AllocationError::InsufficientStock {
            requested: -delta,
            available: current,
        });
    }
    Ok(next)
}
