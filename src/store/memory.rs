//! In-memory ledger store
//!
//! A single async mutex is held for the lifetime of each transaction. The
//! transaction works on a copy of the state and swaps it in on commit, so
//! transactions are serializable and an uncommitted drop leaves no trace.
//! Used by tests and by the binary when no `postgres_url` is configured.
//!
//! `begin` copies the whole state, history included, so every write costs
//! time proportional to everything recorded so far. Fine for tests and a dev
//! server; long-running deployments use [`super::PgStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{HistoryFilter, LedgerStore, LedgerTx};
use crate::allocator::sort_fifo;
use crate::core_types::{
    BatchId, DisposalId, LotId, Owner, OwnerType, TreatmentId, UnitId, UnitStatus,
};
use crate::error::{StoreError, StoreResult};
use crate::history::query::{HistoryCursor, TransactionRow, group_rows};
use crate::history::is_visible;
use crate::models::{
    BatchUnit, DisposalRecord, HistoryRecord, InactiveProductUsageLog, Lot, NotificationIntent,
    OrganizationAlert, Patient, ShipmentBatch, StockUnit, TreatmentRecord, VirtualCode,
};

#[derive(Debug, Default, Clone)]
struct MemState {
    lots: HashMap<LotId, Lot>,
    units: HashMap<UnitId, VirtualCode>,
    codes: HashMap<String, UnitId>,
    code_seq: i64,
    batches: HashMap<BatchId, ShipmentBatch>,
    shipment_details: HashMap<BatchId, Vec<UnitId>>,
    patients: HashMap<String, Patient>,
    treatments: HashMap<TreatmentId, TreatmentRecord>,
    treatment_details: HashMap<TreatmentId, Vec<UnitId>>,
    disposals: HashMap<DisposalId, DisposalRecord>,
    disposal_details: HashMap<DisposalId, Vec<UnitId>>,
    history: Vec<HistoryRecord>,
    alerts: Vec<OrganizationAlert>,
    usage_logs: Vec<InactiveProductUsageLog>,
    notifications: Vec<NotificationIntent>,
}

impl MemState {
    fn stock_unit(&self, id: &UnitId) -> StoreResult<StockUnit> {
        let unit = self
            .units
            .get(id)
            .ok_or_else(|| StoreError::Corrupted(format!("detail references missing unit {}", id)))?;
        let lot = self.lots.get(&unit.lot_id).ok_or_else(|| {
            StoreError::Corrupted(format!("unit {} references missing lot {}", id, unit.lot_id))
        })?;
        Ok(StockUnit {
            id: unit.id,
            code: unit.code.clone(),
            lot_id: lot.id,
            product_id: lot.product_id.clone(),
            manufacture_date: lot.manufacture_date,
        })
    }

    fn in_stock_with(&self, unit_id: &UnitId, org_id: &str) -> bool {
        self.units
            .get(unit_id)
            .is_some_and(|u| u.status == UnitStatus::InStock && u.owner.is_org(org_id))
    }
}

/// Ledger store held entirely in process memory
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemState>,
    work: MemState,
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn insert_lot(&mut self, lot: &Lot) -> StoreResult<bool> {
        let duplicate = self
            .work
            .lots
            .values()
            .any(|l| l.product_id == lot.product_id && l.lot_number == lot.lot_number);
        if duplicate {
            return Ok(false);
        }
        self.work.lots.insert(lot.id, lot.clone());
        Ok(true)
    }

    async fn next_code_serials(&mut self, count: u32) -> StoreResult<Vec<i64>> {
        let first = self.work.code_seq + 1;
        self.work.code_seq += count as i64;
        Ok((first..=self.work.code_seq).collect())
    }

    async fn insert_units(&mut self, units: &[VirtualCode]) -> StoreResult<()> {
        for unit in units {
            if self.work.codes.contains_key(&unit.code) {
                return Err(StoreError::UniqueViolation("virtual_codes_code_key".into()));
            }
            if !self.work.lots.contains_key(&unit.lot_id) {
                return Err(StoreError::Database(format!("lot {} does not exist", unit.lot_id)));
            }
            self.work.codes.insert(unit.code.clone(), unit.id);
            self.work.units.insert(unit.id, unit.clone());
        }
        Ok(())
    }

    async fn select_fifo(
        &mut self,
        product_id: &str,
        owner_org_id: &str,
        quantity: u32,
        lot_id: Option<LotId>,
        exclude: &[UnitId],
    ) -> StoreResult<Vec<StockUnit>> {
        let mut candidates = Vec::new();
        for unit in self.work.units.values() {
            if unit.status != UnitStatus::InStock
                || !unit.owner.is_org(owner_org_id)
                || lot_id.is_some_and(|l| l != unit.lot_id)
                || exclude.contains(&unit.id)
            {
                continue;
            }
            let stock = self.work.stock_unit(&unit.id)?;
            if stock.product_id == product_id {
                candidates.push(stock);
            }
        }
        sort_fifo(&mut candidates);
        candidates.truncate(quantity as usize);
        Ok(candidates)
    }

    async fn lock_batch_units_held_by(
        &mut self,
        batch_id: BatchId,
        owner_org_id: &str,
    ) -> StoreResult<Vec<StockUnit>> {
        let mut held = Vec::new();
        if let Some(ids) = self.work.shipment_details.get(&batch_id) {
            for id in ids {
                if self.work.in_stock_with(id, owner_org_id) {
                    held.push(self.work.stock_unit(id)?);
                }
            }
        }
        sort_fifo(&mut held);
        Ok(held)
    }

    async fn lock_batch_units(&mut self, batch_id: BatchId) -> StoreResult<Vec<BatchUnit>> {
        let mut listed = Vec::new();
        if let Some(ids) = self.work.shipment_details.get(&batch_id) {
            for id in ids {
                let holder = self
                    .work
                    .units
                    .get(id)
                    .filter(|u| {
                        u.status == UnitStatus::InStock
                            && u.owner.owner_type == OwnerType::Organization
                    })
                    .map(|u| u.owner.id.clone());
                listed.push(BatchUnit {
                    unit: self.work.stock_unit(id)?,
                    holder,
                });
            }
        }
        listed.sort_by(|a, b| a.unit.fifo_key().cmp(&b.unit.fifo_key()));
        Ok(listed)
    }

    async fn update_owner_and_status(
        &mut self,
        ids: &[UnitId],
        owner: &Owner,
        status: UnitStatus,
    ) -> StoreResult<u64> {
        if status == UnitStatus::InStock && owner.owner_type != OwnerType::Organization {
            return Err(StoreError::Database(
                "virtual_codes_in_stock_owner_check".into(),
            ));
        }
        let mut updated = 0;
        for id in ids {
            if let Some(unit) = self.work.units.get_mut(id) {
                unit.owner = owner.clone();
                unit.status = status;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn lock_batch(&mut self, id: BatchId) -> StoreResult<Option<ShipmentBatch>> {
        Ok(self.work.batches.get(&id).cloned())
    }

    async fn insert_batch(&mut self, batch: &ShipmentBatch, unit_ids: &[UnitId]) -> StoreResult<()> {
        if batch.from_org_id == batch.to_org_id {
            return Err(StoreError::Database("shipment_batches_no_self_check".into()));
        }
        self.work.batches.insert(batch.id, batch.clone());
        self.work.shipment_details.insert(batch.id, unit_ids.to_vec());
        Ok(())
    }

    async fn mark_batch_recalled(
        &mut self,
        id: BatchId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        match self.work.batches.get_mut(&id) {
            Some(batch) if !batch.is_recalled => {
                batch.is_recalled = true;
                batch.recall_reason = Some(reason.to_string());
                batch.recall_date = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn upsert_patient(&mut self, phone: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        if self.work.patients.contains_key(phone) {
            return Ok(false);
        }
        self.work.patients.insert(
            phone.to_string(),
            Patient {
                phone: phone.to_string(),
                created_at: at,
            },
        );
        Ok(true)
    }

    async fn insert_treatment(
        &mut self,
        record: &TreatmentRecord,
        unit_ids: &[UnitId],
    ) -> StoreResult<()> {
        if !self.work.patients.contains_key(&record.patient_phone) {
            return Err(StoreError::Database(format!(
                "patient {} does not exist",
                record.patient_phone
            )));
        }
        self.work.treatments.insert(record.id, record.clone());
        self.work.treatment_details.insert(record.id, unit_ids.to_vec());
        Ok(())
    }

    async fn lock_treatment(&mut self, id: TreatmentId) -> StoreResult<Option<TreatmentRecord>> {
        Ok(self.work.treatments.get(&id).cloned())
    }

    async fn lock_treatment_units(&mut self, id: TreatmentId) -> StoreResult<Vec<StockUnit>> {
        let mut units = Vec::new();
        if let Some(ids) = self.work.treatment_details.get(&id) {
            for unit_id in ids {
                units.push(self.work.stock_unit(unit_id)?);
            }
        }
        sort_fifo(&mut units);
        Ok(units)
    }

    async fn delete_treatment(&mut self, id: TreatmentId) -> StoreResult<()> {
        self.work.treatment_details.remove(&id);
        self.work.treatments.remove(&id);
        Ok(())
    }

    async fn insert_disposal(
        &mut self,
        record: &DisposalRecord,
        unit_ids: &[UnitId],
    ) -> StoreResult<()> {
        self.work.disposals.insert(record.id, record.clone());
        self.work.disposal_details.insert(record.id, unit_ids.to_vec());
        Ok(())
    }

    async fn append_history(&mut self, rows: &[HistoryRecord]) -> StoreResult<()> {
        if rows.iter().any(|r| r.is_recall && r.recall_reason.is_none()) {
            return Err(StoreError::Database("history_recall_reason_check".into()));
        }
        self.work.history.extend_from_slice(rows);
        Ok(())
    }

    async fn insert_usage_log(&mut self, log: &InactiveProductUsageLog) -> StoreResult<()> {
        self.work.usage_logs.push(log.clone());
        Ok(())
    }

    async fn insert_alerts(&mut self, alerts: &[OrganizationAlert]) -> StoreResult<()> {
        self.work.alerts.extend_from_slice(alerts);
        Ok(())
    }

    async fn enqueue_notification(&mut self, intent: &NotificationIntent) -> StoreResult<()> {
        self.work.notifications.push(intent.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn get_unit(&self, id: UnitId) -> StoreResult<Option<VirtualCode>> {
        Ok(self.state.lock().await.units.get(&id).cloned())
    }

    async fn get_unit_by_code(&self, code: &str) -> StoreResult<Option<VirtualCode>> {
        let state = self.state.lock().await;
        Ok(state.codes.get(code).and_then(|id| state.units.get(id)).cloned())
    }

    async fn list_units_by_owner_and_status(
        &self,
        owner: &Owner,
        status: UnitStatus,
    ) -> StoreResult<Vec<VirtualCode>> {
        let state = self.state.lock().await;
        let mut units: Vec<VirtualCode> = state
            .units
            .values()
            .filter(|u| &u.owner == owner && u.status == status)
            .cloned()
            .collect();
        units.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(units)
    }

    async fn count_in_stock(&self, owner_org_id: &str, product_id: &str) -> StoreResult<u64> {
        let state = self.state.lock().await;
        let count = state
            .units
            .values()
            .filter(|u| u.status == UnitStatus::InStock && u.owner.is_org(owner_org_id))
            .filter(|u| {
                state
                    .lots
                    .get(&u.lot_id)
                    .is_some_and(|l| l.product_id == product_id)
            })
            .count();
        Ok(count as u64)
    }

    async fn get_lot(&self, id: LotId) -> StoreResult<Option<Lot>> {
        Ok(self.state.lock().await.lots.get(&id).cloned())
    }

    async fn get_batch(&self, id: BatchId) -> StoreResult<Option<ShipmentBatch>> {
        Ok(self.state.lock().await.batches.get(&id).cloned())
    }

    async fn batch_unit_ids(&self, id: BatchId) -> StoreResult<Vec<UnitId>> {
        Ok(self
            .state
            .lock()
            .await
            .shipment_details
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_treatment(&self, id: TreatmentId) -> StoreResult<Option<TreatmentRecord>> {
        Ok(self.state.lock().await.treatments.get(&id).cloned())
    }

    async fn get_disposal(&self, id: Uuid) -> StoreResult<Option<DisposalRecord>> {
        Ok(self.state.lock().await.disposals.get(&id).cloned())
    }

    async fn get_patient(&self, phone: &str) -> StoreResult<Option<Patient>> {
        Ok(self.state.lock().await.patients.get(phone).cloned())
    }

    async fn count_patients(&self) -> StoreResult<u64> {
        Ok(self.state.lock().await.patients.len() as u64)
    }

    async fn fetch_history_page(
        &self,
        filter: &HistoryFilter,
        cursor: Option<&HistoryCursor>,
        limit: usize,
    ) -> StoreResult<Vec<TransactionRow>> {
        let visible: Vec<HistoryRecord> = {
            let state = self.state.lock().await;
            state
                .history
                .iter()
                .filter(|r| filter.matches(r) && is_visible(r, &filter.organization_id))
                .cloned()
                .collect()
        };
        Ok(group_rows(visible)
            .into_iter()
            .filter(|row| cursor.is_none_or(|c| row.is_past(c)))
            .take(limit + 1)
            .collect())
    }

    async fn unit_history(&self, unit_id: UnitId) -> StoreResult<Vec<HistoryRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .history
            .iter()
            .filter(|r| r.virtual_code_id == unit_id)
            .cloned()
            .collect())
    }

    async fn list_alerts(
        &self,
        recipient_org_id: &str,
        unread_only: bool,
    ) -> StoreResult<Vec<OrganizationAlert>> {
        let state = self.state.lock().await;
        let mut alerts: Vec<OrganizationAlert> = state
            .alerts
            .iter()
            .filter(|a| a.recipient_org_id == recipient_org_id && (!unread_only || !a.is_read))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }

    async fn set_alert_read(
        &self,
        recipient_org_id: &str,
        alert_id: Uuid,
        read: bool,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state
            .alerts
            .iter_mut()
            .find(|a| a.id == alert_id && a.recipient_org_id == recipient_org_id)
        {
            Some(alert) => {
                alert.is_read = read;
                alert.read_at = read.then_some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_usage_logs(&self, product_id: &str) -> StoreResult<Vec<InactiveProductUsageLog>> {
        let state = self.state.lock().await;
        Ok(state
            .usage_logs
            .iter()
            .filter(|l| l.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn pending_notifications(&self, limit: u32) -> StoreResult<Vec<NotificationIntent>> {
        let state = self.state.lock().await;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.dispatched_at.is_none())
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_notification_dispatched(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.dispatched_at.is_none())
        {
            Some(intent) => {
                intent.dispatched_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
