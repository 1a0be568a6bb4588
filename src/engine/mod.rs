//! Transfer Engine
//!
//! The atomic ownership operations. Every public method runs exactly one
//! store transaction under the configured timeout and returns either a
//! receipt or a [`LedgerError`]. Expected business outcomes come back as
//! `LedgerError::Rejected(code)` and leave no trace in the store.
//!
//! | Operation | Initiator | Guard |
//! |---|---|---|
//! | `create_shipment` | sender | FIFO stock |
//! | `return_shipment` | receiver | caller still holds units of the batch |
//! | `recall_shipment` | original sender | `is_recalled` flips once |
//! | `create_treatment` | hospital | FIFO stock |
//! | `recall_treatment` | treating hospital | within the recall window |
//! | `create_disposal` | hospital | FIFO stock, reason |

mod disposal;
mod shipment;
mod treatment;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alert::{AlertService, UsageEvent};
use crate::allocator::quantities_by_product;
use crate::context::LedgerContext;
use crate::core_types::{BatchId, DisposalId, TreatmentId, UsageType};
use crate::error::LedgerResult;
use crate::models::StockUnit;
use crate::store::LedgerTx;

pub use treatment::TREATMENT_RECALL_REASON;

// ============================================================================
// Receipts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentReceipt {
    pub shipment_batch_id: BatchId,
    pub total_quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnReceipt {
    pub success: bool,
    pub returned_count: u32,
    pub new_batch_id: BatchId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallReceipt {
    pub success: bool,
    pub recalled_count: u32,
    /// Units of the event that were already used or disposed and did not move
    pub left_in_place: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentReceipt {
    pub treatment_id: TreatmentId,
    pub total_quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisposalReceipt {
    pub disposal_id: DisposalId,
    pub total_quantity: u32,
}

// ============================================================================
// Engine
// ============================================================================

pub struct TransferEngine {
    ctx: LedgerContext,
    alerts: AlertService,
}

impl TransferEngine {
    pub fn new(ctx: LedgerContext) -> Self {
        let alerts = AlertService::new(ctx.clone());
        Self { ctx, alerts }
    }

    /// Report every product in `units` to the alert service
    async fn report_usage(
        &self,
        tx: &mut dyn LedgerTx,
        usage_type: UsageType,
        usage_id: Uuid,
        organization_id: &str,
        units: &[StockUnit],
        at: DateTime<Utc>,
    ) -> LedgerResult<()> {
        for (product_id, quantity) in quantities_by_product(units) {
            self.alerts
                .on_usage(
                    tx,
                    UsageEvent {
                        usage_type,
                        usage_id,
                        product_id: &product_id,
                        organization_id,
                        quantity,
                    },
                    at,
                )
                .await?;
        }
        Ok(())
    }
}

/// Machine-readable body of a notification intent; rendering is left to the
/// delivery service
fn notification_body(event: &str, reference: Uuid, organization_id: &str, units: &[StockUnit]) -> String {
    let items: Vec<serde_json::Value> = quantities_by_product(units)
        .into_iter()
        .map(|(product_id, quantity)| serde_json::json!({"productId": product_id, "quantity": quantity}))
        .collect();
    serde_json::json!({
        "event": event,
        "reference": reference,
        "organizationId": organization_id,
        "items": items,
    })
    .to_string()
}

fn count(units: &[StockUnit]) -> u32 {
    units.len() as u32
}
