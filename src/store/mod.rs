//! Ledger Store
//!
//! Durable state of the ledger: lots, virtual codes, shipment batches,
//! treatment/disposal records, the append-only history, alerts and the
//! notification outbox.
//!
//! # Transactions
//!
//! All mutation goes through a [`LedgerTx`] obtained from [`LedgerStore::begin`].
//! Nothing is visible to other callers until [`LedgerTx::commit`]; dropping a
//! transaction without committing rolls it back. Reads on [`LedgerStore`]
//! itself are unrestricted and never mutate.
//!
//! # Locking
//!
//! `select_fifo` locks the rows it returns for the rest of the transaction and
//! skips rows locked by other in-flight transactions. It must only be called
//! inside a transaction that goes on to mutate the selected rows.

pub mod memory;
pub mod postgres;
pub mod schema;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core_types::{
    ActionType, BatchId, LotId, Owner, TreatmentId, UnitId, UnitStatus,
};
use crate::error::StoreResult;
use crate::history::{HistoryCursor, TransactionRow};
use crate::models::{
    BatchUnit, DisposalRecord, HistoryRecord, InactiveProductUsageLog, Lot, NotificationIntent,
    OrganizationAlert, Patient, ShipmentBatch, StockUnit, TreatmentRecord, VirtualCode,
};

/// Row filter for a history page. Stores additionally apply the visibility
/// policy for `organization_id` before grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryFilter {
    /// Rows where this organization is on the `from` or `to` side
    pub organization_id: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub action_types: Option<Vec<ActionType>>,
}

impl HistoryFilter {
    /// True if `row` passes the filter
    pub fn matches(&self, row: &HistoryRecord) -> bool {
        let involved =
            row.from_owner.is_org(&self.organization_id) || row.to_owner.is_org(&self.organization_id);
        let in_window = row.created_at >= self.start && self.end.is_none_or(|end| row.created_at <= end);
        let action_ok = self
            .action_types
            .as_ref()
            .is_none_or(|types| types.contains(&row.action_type));
        involved && in_window && action_ok
    }
}

/// One open store transaction
#[async_trait]
pub trait LedgerTx: Send {
    // === Lot issuance ===

    /// Insert a lot. Returns false if the lot number already exists for the product.
    async fn insert_lot(&mut self, lot: &Lot) -> StoreResult<bool>;

    /// Reserve `count` fresh serials for virtual code generation
    async fn next_code_serials(&mut self, count: u32) -> StoreResult<Vec<i64>>;

    async fn insert_units(&mut self, units: &[VirtualCode]) -> StoreResult<()>;

    // === Unit selection and mutation ===

    /// Lock up to `quantity` in-stock units of `product_id` held by the
    /// organization, oldest manufacture date first (ties by code).
    async fn select_fifo(
        &mut self,
        product_id: &str,
        owner_org_id: &str,
        quantity: u32,
        lot_id: Option<LotId>,
        exclude: &[UnitId],
    ) -> StoreResult<Vec<StockUnit>>;

    /// Lock the in-stock units of a batch currently held by the organization,
    /// in FIFO order
    async fn lock_batch_units_held_by(
        &mut self,
        batch_id: BatchId,
        owner_org_id: &str,
    ) -> StoreResult<Vec<StockUnit>>;

    /// Lock every unit listed on a batch, wherever it is now, in FIFO order
    async fn lock_batch_units(&mut self, batch_id: BatchId) -> StoreResult<Vec<BatchUnit>>;

    /// Bulk ownership/status change. Returns the number of rows updated.
    async fn update_owner_and_status(
        &mut self,
        ids: &[UnitId],
        owner: &Owner,
        status: UnitStatus,
    ) -> StoreResult<u64>;

    // === Shipments ===

    /// Load a batch and lock its row
    async fn lock_batch(&mut self, id: BatchId) -> StoreResult<Option<ShipmentBatch>>;

    /// Insert a batch with one detail row per unit
    async fn insert_batch(&mut self, batch: &ShipmentBatch, unit_ids: &[UnitId]) -> StoreResult<()>;

    /// Flip `is_recalled` false→true. Returns false if it was already set.
    async fn mark_batch_recalled(
        &mut self,
        id: BatchId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    // === Treatments and disposals ===

    /// Conflict-tolerant insert. Returns true if this call created the patient.
    async fn upsert_patient(&mut self, phone: &str, at: DateTime<Utc>) -> StoreResult<bool>;

    async fn insert_treatment(
        &mut self,
        record: &TreatmentRecord,
        unit_ids: &[UnitId],
    ) -> StoreResult<()>;

    /// Load a treatment and lock its row
    async fn lock_treatment(&mut self, id: TreatmentId) -> StoreResult<Option<TreatmentRecord>>;

    /// Lock the units attached to a treatment
    async fn lock_treatment_units(&mut self, id: TreatmentId) -> StoreResult<Vec<StockUnit>>;

    /// Delete a treatment and its detail rows
    async fn delete_treatment(&mut self, id: TreatmentId) -> StoreResult<()>;

    async fn insert_disposal(
        &mut self,
        record: &DisposalRecord,
        unit_ids: &[UnitId],
    ) -> StoreResult<()>;

    // === Ledger, alerts, outbox ===

    async fn append_history(&mut self, rows: &[HistoryRecord]) -> StoreResult<()>;

    async fn insert_usage_log(&mut self, log: &InactiveProductUsageLog) -> StoreResult<()>;

    async fn insert_alerts(&mut self, alerts: &[OrganizationAlert]) -> StoreResult<()>;

    async fn enqueue_notification(&mut self, intent: &NotificationIntent) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

/// Transactional ledger storage
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn LedgerTx>>;

    async fn health_check(&self) -> StoreResult<()>;

    // === Unit store reads ===

    async fn get_unit(&self, id: UnitId) -> StoreResult<Option<VirtualCode>>;

    async fn get_unit_by_code(&self, code: &str) -> StoreResult<Option<VirtualCode>>;

    async fn list_units_by_owner_and_status(
        &self,
        owner: &Owner,
        status: UnitStatus,
    ) -> StoreResult<Vec<VirtualCode>>;

    /// In-stock units of a product held by an organization
    async fn count_in_stock(&self, owner_org_id: &str, product_id: &str) -> StoreResult<u64>;

    // === Record reads ===

    async fn get_lot(&self, id: LotId) -> StoreResult<Option<Lot>>;

    async fn get_batch(&self, id: BatchId) -> StoreResult<Option<ShipmentBatch>>;

    async fn batch_unit_ids(&self, id: BatchId) -> StoreResult<Vec<UnitId>>;

    async fn get_treatment(&self, id: TreatmentId) -> StoreResult<Option<TreatmentRecord>>;

    async fn get_disposal(&self, id: Uuid) -> StoreResult<Option<DisposalRecord>>;

    async fn get_patient(&self, phone: &str) -> StoreResult<Option<Patient>>;

    async fn count_patients(&self) -> StoreResult<u64>;

    // === Ledger reads ===

    /// One page of grouped history for `filter.organization_id`.
    ///
    /// Rows are filtered, checked against the visibility policy and grouped by
    /// `(event id, action type)`. Groups are returned newest first by
    /// `(created_at, group_key)`, starting strictly after `cursor`, at most
    /// `limit + 1` of them so the caller can tell whether another page exists.
    async fn fetch_history_page(
        &self,
        filter: &HistoryFilter,
        cursor: Option<&HistoryCursor>,
        limit: usize,
    ) -> StoreResult<Vec<TransactionRow>>;

    /// Full trail of one unit, oldest first
    async fn unit_history(&self, unit_id: UnitId) -> StoreResult<Vec<HistoryRecord>>;

    // === Alerts ===

    async fn list_alerts(
        &self,
        recipient_org_id: &str,
        unread_only: bool,
    ) -> StoreResult<Vec<OrganizationAlert>>;

    /// Set the read flag of an alert owned by the recipient. Returns false if
    /// no such alert exists for that recipient.
    async fn set_alert_read(
        &self,
        recipient_org_id: &str,
        alert_id: Uuid,
        read: bool,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn list_usage_logs(&self, product_id: &str) -> StoreResult<Vec<InactiveProductUsageLog>>;

    // === Notification outbox ===

    async fn pending_notifications(&self, limit: u32) -> StoreResult<Vec<NotificationIntent>>;

    async fn mark_notification_dispatched(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool>;
}
