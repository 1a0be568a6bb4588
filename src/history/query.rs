//! Grouping of per-unit rows into transactions, and keyset pagination

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core_types::{ActionType, BatchId, DisposalId, LotId, Owner, ProductId, TreatmentId};
use crate::models::HistoryRecord;

/// Position after the last row of a page. The next page holds only rows
/// strictly older by `(created_at DESC, group_key DESC)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryCursor {
    pub time: DateTime<Utc>,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuantity {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// One logical transaction as seen by one organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRow {
    pub group_key: String,
    pub action_type: ActionType,
    pub created_at: DateTime<Utc>,
    pub from_owner: Owner,
    pub to_owner: Owner,
    pub shipment_batch_id: Option<BatchId>,
    pub treatment_id: Option<TreatmentId>,
    pub disposal_id: Option<DisposalId>,
    /// Set for `PRODUCED` groups
    pub lot_id: Option<LotId>,
    pub is_recall: bool,
    pub recall_reason: Option<String>,
    pub total_quantity: u32,
    pub items: Vec<ProductQuantity>,
}

impl TransactionRow {
    fn sort_key(&self) -> (DateTime<Utc>, &str) {
        (self.created_at, self.group_key.as_str())
    }

    /// True if the row sorts strictly after `cursor` in newest-first order
    pub fn is_past(&self, cursor: &HistoryCursor) -> bool {
        self.sort_key() < (cursor.time, cursor.key.as_str())
    }

    pub fn cursor(&self) -> HistoryCursor {
        HistoryCursor {
            time: self.created_at,
            key: self.group_key.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub rows: Vec<TransactionRow>,
    pub has_more: bool,
    pub next_cursor: Option<HistoryCursor>,
}

fn event_id(row: &HistoryRecord) -> Uuid {
    row.shipment_batch_id
        .or(row.treatment_id)
        .or(row.disposal_id)
        .unwrap_or(match row.action_type {
            ActionType::Produced => row.lot_id,
            _ => row.virtual_code_id,
        })
}

/// Identity of the logical event a row belongs to. Includes the action type,
/// so the `SHIPPED` and `RECEIVED` halves of one shipment stay apart.
pub fn group_key(row: &HistoryRecord) -> String {
    format!("{}:{}", event_id(row), row.action_type.as_str())
}

/// Collapse per-unit rows into transactions, newest first
pub fn group_rows(rows: impl IntoIterator<Item = HistoryRecord>) -> Vec<TransactionRow> {
    let mut groups: HashMap<String, (TransactionRow, BTreeMap<ProductId, u32>)> = HashMap::new();

    for row in rows {
        let key = group_key(&row);
        let (group, per_product) = groups.entry(key.clone()).or_insert_with(|| {
            (
                TransactionRow {
                    group_key: key,
                    action_type: row.action_type,
                    created_at: row.created_at,
                    from_owner: row.from_owner.clone(),
                    to_owner: row.to_owner.clone(),
                    shipment_batch_id: row.shipment_batch_id,
                    treatment_id: row.treatment_id,
                    disposal_id: row.disposal_id,
                    lot_id: (row.action_type == ActionType::Produced).then_some(row.lot_id),
                    is_recall: row.is_recall,
                    recall_reason: row.recall_reason.clone(),
                    total_quantity: 0,
                    items: Vec::new(),
                },
                BTreeMap::new(),
            )
        });
        group.total_quantity += 1;
        group.created_at = group.created_at.max(row.created_at);
        *per_product.entry(row.product_id).or_insert(0) += 1;
    }

    let mut grouped: Vec<TransactionRow> = groups
        .into_values()
        .map(|(mut group, per_product)| {
            group.items = per_product
                .into_iter()
                .map(|(product_id, quantity)| ProductQuantity {
                    product_id,
                    quantity,
                })
                .collect();
            group
        })
        .collect();
    grouped.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
    grouped
}

/// Cut one page out of rows sorted newest first
pub fn paginate(
    rows: Vec<TransactionRow>,
    cursor: Option<&HistoryCursor>,
    limit: usize,
) -> HistoryPage {
    let mut page: Vec<TransactionRow> = rows
        .into_iter()
        .filter(|row| cursor.is_none_or(|c| row.is_past(c)))
        .take(limit + 1)
        .collect();

    let has_more = page.len() > limit;
    page.truncate(limit);
    let next_cursor = if has_more {
        page.last().map(TransactionRow::cursor)
    } else {
        None
    };
    HistoryPage {
        rows: page,
        has_more,
        next_cursor,
    }
}
