//! Validation utilities for the medicine cabinet

use rust_decimal::Decimal;

/// Decimal places kept for quantities (`NUMERIC(14,3)`)
pub const QUANTITY_SCALE: u32 = 3;

/// Largest quantity magnitude a batch, ledger row or alert can hold
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 3);

/// Validate that a required text field is not blank
pub fn validate_required(value: &str) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err("Value is required");
    }
    Ok(())
}

/// Validate a movement quantity (receive / use)
pub fn validate_positive_quantity(qty: Decimal) -> Result<(), &'static str> {
    if qty <= Decimal::ZERO {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Validate that a quantity fits the stored precision and range
pub fn validate_quantity_range(qty: Decimal) -> Result<(), &'static str> {
    if qty.normalize().scale() > QUANTITY_SCALE {
        return Err("Quantity allows at most 3 decimal places");
    }
    if qty.abs() > MAX_QUANTITY {
        return Err("Quantity is too large");
    }
    Ok(())
}

/// Validate an opening batch quantity or alert minimum
pub fn validate_non_negative_quantity(qty: Decimal) -> Result<(), &'static str> {
    if qty < Decimal::ZERO {
        return Err("Quantity cannot be negative");
    }
    Ok(())
}

/// Validate a stocktake correction
pub fn validate_adjust_delta(delta: Decimal) -> Result<(), &'static str> {
    if delta.is_zero() {
        return Err("Adjustment must not be zero");
    }
    Ok(())
}

/// Validate an alert expiry window
pub fn validate_expiry_window_days(days: i32) -> Result<(), &'static str> {
    if days < 0 {
        return Err("Expiry window cannot be negative");
    }
    Ok(())
}

/// Trim an optional text field, mapping blank to `None`
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
