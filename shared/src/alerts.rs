//! Notification messages for flagged items

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::stock::days_until;

/// Message for an item whose total stock is below its minimum
pub fn low_stock_message(name: &str, total_qty: Decimal, unit: &str) -> String {
    format!(
        "\"{}\" is running low ({} {} remaining)",
        name,
        total_qty.normalize(),
        unit
    )
}

/// Message for an item whose nearest expiry is inside its alert window
pub fn expiring_message(name: &str, expiry: NaiveDate, today: NaiveDate) -> String {
    let days = days_until(expiry, today);
    let date = expiry.format("%Y-%m-%d");
    if days >= 0 {
        format!("\"{}\" expires in {} day(s) (on {})", name, days, date)
    } else {
        format!("\"{}\" expired {} day(s) ago (on {})", name, -days, date)
    }
}
