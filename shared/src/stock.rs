//! Stock levels and derived low-stock / expiring flags

use std::cmp::Ordering;

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;

use crate::models::{AlertConfig, Batch, Item, ItemSort, ItemSummary, ListItemFilter};

/// Aggregate stock of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StockLevel {
    pub total_qty: Decimal,
    /// Earliest expiry among batches that still hold stock
    pub next_expiry: Option<NaiveDate>,
}

/// Flags derived from an alert configuration and a stock level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StockFlags {
    pub low_stock: bool,
    pub expiring: bool,
}

/// Sum the batches of one item and find the nearest expiry
pub fn stock_level<'a, I>(batches: I) -> StockLevel
where
    I: IntoIterator<Item = &'a Batch>,
{
    let mut level = StockLevel::default();
    for batch in batches {
        level.total_qty = level.total_qty.saturating_add(batch.qty);
        if batch.qty > Decimal::ZERO {
            if let Some(expiry) = batch.expiry_date {
                level.next_expiry = Some(match level.next_expiry {
                    Some(current) if current <= expiry => current,
                    _ => expiry,
                });
            }
        }
    }
    level
}

/// Derive flags for an item. A missing or disabled alert flags nothing.
pub fn derive_flags(alert: Option<&AlertConfig>, level: &StockLevel, today: NaiveDate) -> StockFlags {
    let Some(alert) = alert.filter(|a| a.is_enabled) else {
        return StockFlags::default();
    };

    let low_stock = alert.min_qty.is_some_and(|min| level.total_qty < min);

    let expiring = match (alert.expiry_window_days, level.next_expiry) {
        (Some(window), Some(expiry)) => {
            let deadline = today
                .checked_add_days(Days::new(window.max(0) as u64))
                .unwrap_or(NaiveDate::MAX);
            expiry <= deadline
        }
        _ => false,
    };

    StockFlags { low_stock, expiring }
}

/// Signed number of days from `today` until `expiry` (negative once expired)
pub fn days_until(expiry: NaiveDate, today: NaiveDate) -> i64 {
    (expiry - today).num_days()
}

/// Whether an item passes the attribute part of a list filter
///
/// `only_low` / `only_expiring` need derived flags and are applied by
/// [`retain_flagged`].
pub fn matches_filter(item: &Item, filter: &ListItemFilter) -> bool {
    if let Some(query) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let needle = query.to_lowercase();
        let in_name = item.name.to_lowercase().contains(&needle);
        let in_generic = item
            .generic_name
            .as_deref()
            .is_some_and(|g| g.to_lowercase().contains(&needle));
        if !in_name && !in_generic {
            return false;
        }
    }

    if let Some(category) = filter.category.as_deref().filter(|c| !c.is_empty()) {
        if !item
            .category
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(category))
        {
            return false;
        }
    }

    if let Some(form) = filter.form {
        if item.form != form {
            return false;
        }
    }

    if let Some(location_id) = filter.location_id {
        if item.location_id != Some(location_id) {
            return false;
        }
    }

    true
}

/// Drop summaries that do not carry the flags the filter asks for
pub fn retain_flagged(summaries: &mut Vec<ItemSummary>, filter: &ListItemFilter) {
    summaries.retain(|s| (!filter.only_low || s.low_stock) && (!filter.only_expiring || s.expiring));
}

/// Sort summaries in place. Items without an expiry sort last either way.
pub fn sort_summaries(summaries: &mut [ItemSummary], sort: ItemSort) {
    let by_name = |a: &ItemSummary, b: &ItemSummary| {
        a.item
            .name
            .to_lowercase()
            .cmp(&b.item.name.to_lowercase())
            .then_with(|| a.item.id.cmp(&b.item.id))
    };

    match sort {
        ItemSort::Name => summaries.sort_by(by_name),
        ItemSort::StockAsc => {
            summaries.sort_by(|a, b| a.total_qty.cmp(&b.total_qty).then_with(|| by_name(a, b)))
        }
        ItemSort::StockDesc => {
            summaries.sort_by(|a, b| b.total_qty.cmp(&a.total_qty).then_with(|| by_name(a, b)))
        }
        ItemSort::ExpiryAsc => summaries.sort_by(|a, b| {
            expiry_cmp(a.next_expiry, b.next_expiry, false).then_with(|| by_name(a, b))
        }),
        ItemSort::ExpiryDesc => summaries.sort_by(|a, b| {
            expiry_cmp(a.next_expiry, b.next_expiry, true).then_with(|| by_name(a, b))
        }),
    }
}

fn expiry_cmp(a: Option<NaiveDate>, b: Option<NaiveDate>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) if descending => y.cmp(&x),
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
