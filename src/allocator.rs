//! FIFO Allocator
//!
//! Picks concrete units out of an organization's stock: oldest manufacture
//! date first, ties broken by code. Selection always runs inside the caller's
//! transaction, so the rows it returns stay locked until that transaction
//! commits or rolls back.

use std::collections::BTreeMap;

use crate::core_types::{ProductId, UnitId};
use crate::error::{ErrorCode, LedgerResult};
use crate::models::{ItemRequest, StockUnit};
use crate::store::LedgerTx;
use crate::validation::validate_quantity;

/// Reject empty request lists and zero quantities before touching the store
pub fn validate_items(items: &[ItemRequest]) -> Result<(), ErrorCode> {
    if items.is_empty() {
        return Err(ErrorCode::InvalidQuantity);
    }
    for item in items {
        validate_quantity(item.quantity)?;
    }
    Ok(())
}

/// Lock and return the units for every requested line.
///
/// Lines are served in order; a product requested on several lines never
/// gets the same unit twice. If any line cannot be filled completely the
/// whole request fails with `INSUFFICIENT_STOCK`; the caller drops the
/// transaction and nothing is observable.
pub async fn allocate(
    tx: &mut dyn LedgerTx,
    owner_org_id: &str,
    items: &[ItemRequest],
) -> LedgerResult<Vec<StockUnit>> {
    validate_items(items)?;

    let mut selected: Vec<StockUnit> = Vec::new();
    for item in items {
        let exclude: Vec<UnitId> = selected
            .iter()
            .filter(|u| u.product_id == item.product_id)
            .map(|u| u.id)
            .collect();

        let units = tx
            .select_fifo(
                &item.product_id,
                owner_org_id,
                item.quantity,
                item.lot_id,
                &exclude,
            )
            .await?;

        if units.len() < item.quantity as usize {
            tracing::debug!(
                owner = owner_org_id,
                product_id = %item.product_id,
                requested = item.quantity,
                available = units.len(),
                "Insufficient stock"
            );
            return Err(ErrorCode::InsufficientStock.into());
        }
        selected.extend(units);
    }
    Ok(selected)
}

/// Pick units out of an already locked, FIFO-ordered set.
///
/// Used by partial returns, where the candidates are the caller's units of a
/// single batch rather than their whole stock.
pub fn take_fifo(held: &[StockUnit], items: &[ItemRequest]) -> Result<Vec<StockUnit>, ErrorCode> {
    validate_items(items)?;

    let mut taken: Vec<StockUnit> = Vec::new();
    for item in items {
        let picked: Vec<&StockUnit> = held
            .iter()
            .filter(|u| u.product_id == item.product_id)
            .filter(|u| item.lot_id.is_none_or(|lot| lot == u.lot_id))
            .filter(|u| !taken.iter().any(|t| t.id == u.id))
            .take(item.quantity as usize)
            .collect();

        if picked.len() < item.quantity as usize {
            return Err(ErrorCode::InsufficientStock);
        }
        taken.extend(picked.into_iter().cloned());
    }
    Ok(taken)
}

/// Sort units into allocation order
pub fn sort_fifo(units: &mut [StockUnit]) {
    units.sort_by(|a, b| a.fifo_key().cmp(&b.fifo_key()));
}

/// Unit count per product, ordered by product id
pub fn quantities_by_product(units: &[StockUnit]) -> BTreeMap<ProductId, u32> {
    let mut counts = BTreeMap::new();
    for unit in units {
        *counts.entry(unit.product_id.clone()).or_insert(0) += 1;
    }
    counts
}

pub fn unit_ids(units: &[StockUnit]) -> Vec<UnitId> {
    units.iter().map(|u| u.id).collect()
}
