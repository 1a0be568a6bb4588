//! Ledger row types
//!
//! Plain data carried between the store, the engine and the query service.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core_types::{
    ActionType, BatchId, DeactivationReason, DisposalId, LotId, NotificationType, OrgId, OrgType,
    Owner, ProductId, ReasonType, TreatmentId, UnitId, UnitStatus, UsageType,
};

/// One traceable physical unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualCode {
    pub id: UnitId,
    pub lot_id: LotId,
    pub code: String,
    pub status: UnitStatus,
    pub owner: Owner,
}

/// A unit joined with the lot fields the allocator orders by
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUnit {
    pub id: UnitId,
    pub code: String,
    pub lot_id: LotId,
    pub product_id: ProductId,
    pub manufacture_date: NaiveDate,
}

impl StockUnit {
    /// Allocation order: oldest manufacture date first, then code
    #[inline]
    pub fn fifo_key(&self) -> (NaiveDate, &str) {
        (self.manufacture_date, self.code.as_str())
    }
}

/// A unit listed on a shipment batch, and where it sits now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchUnit {
    pub unit: StockUnit,
    /// Organization holding the unit in stock; `None` once it is used or disposed
    pub holder: Option<OrgId>,
}

/// Manufacturing batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub id: LotId,
    pub product_id: ProductId,
    pub issuer_org_id: OrgId,
    pub lot_number: String,
    pub quantity: u32,
    pub manufacture_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Bulk ownership transfer between organizations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentBatch {
    pub id: BatchId,
    pub from_org_id: OrgId,
    pub to_org_id: OrgId,
    pub to_org_type: OrgType,
    pub shipment_date: DateTime<Utc>,
    pub is_recalled: bool,
    pub recall_reason: Option<String>,
    pub recall_date: Option<DateTime<Utc>>,
    pub is_return_batch: bool,
    pub parent_batch_id: Option<BatchId>,
}

/// Patient treatment event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentRecord {
    pub id: TreatmentId,
    pub hospital_id: OrgId,
    pub patient_phone: String,
    pub treatment_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Disposal event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisposalRecord {
    pub id: DisposalId,
    pub hospital_id: OrgId,
    pub disposal_date: NaiveDate,
    pub reason_type: ReasonType,
    pub reason_custom: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Patient, keyed by normalized phone number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only ledger row, one per affected unit per action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub virtual_code_id: UnitId,
    pub lot_id: LotId,
    pub product_id: ProductId,
    pub action_type: ActionType,
    pub from_owner: Owner,
    pub to_owner: Owner,
    pub shipment_batch_id: Option<BatchId>,
    pub treatment_id: Option<TreatmentId>,
    pub disposal_id: Option<DisposalId>,
    pub is_recall: bool,
    pub recall_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Which logical event a history row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRef {
    Lot,
    Shipment(BatchId),
    Treatment(TreatmentId),
    Disposal(DisposalId),
}

impl HistoryRecord {
    /// Build a non-recall row for `unit`
    pub fn new(
        unit: &StockUnit,
        action_type: ActionType,
        from_owner: Owner,
        to_owner: Owner,
        event: EventRef,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut record = Self {
            id: Uuid::new_v4(),
            virtual_code_id: unit.id,
            lot_id: unit.lot_id,
            product_id: unit.product_id.clone(),
            action_type,
            from_owner,
            to_owner,
            shipment_batch_id: None,
            treatment_id: None,
            disposal_id: None,
            is_recall: false,
            recall_reason: None,
            created_at,
        };
        match event {
            EventRef::Lot => {}
            EventRef::Shipment(id) => record.shipment_batch_id = Some(id),
            EventRef::Treatment(id) => record.treatment_id = Some(id),
            EventRef::Disposal(id) => record.disposal_id = Some(id),
        }
        record
    }

    /// Mark the row as a recall. A recall row always carries its reason.
    pub fn with_recall(mut self, reason: impl Into<String>) -> Self {
        self.is_recall = true;
        self.recall_reason = Some(reason.into());
        self
    }
}

/// Alert raised to an organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationAlert {
    pub id: Uuid,
    pub recipient_org_id: OrgId,
    pub alert_type: String,
    pub title: String,
    pub content: String,
    pub metadata: serde_json::Value,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Audit row written whenever a deactivated product is moved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InactiveProductUsageLog {
    pub id: Uuid,
    pub usage_type: UsageType,
    pub usage_id: Uuid,
    pub product_id: ProductId,
    pub organization_id: OrgId,
    pub quantity: u32,
    pub deactivation_reason: Option<DeactivationReason>,
    pub created_at: DateTime<Utc>,
}

/// Notification intent queued for out-of-band delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub id: Uuid,
    pub notification_type: NotificationType,
    pub patient_phone: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

/// One requested line of a shipment, treatment or disposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default)]
    pub lot_id: Option<LotId>,
}

impl ItemRequest {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            lot_id: None,
        }
    }

    pub fn from_lot(product_id: impl Into<ProductId>, quantity: u32, lot_id: LotId) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            lot_id: Some(lot_id),
        }
    }
}
