//! Shipments: ship, receiver-initiated return, sender-initiated recall

use tracing::info;
use uuid::Uuid;

use super::{RecallReceipt, ReturnReceipt, ShipmentReceipt, TransferEngine, count};
use crate::allocator::{self, take_fifo, unit_ids};
use crate::core_types::{ActionType, BatchId, OrgId, OrgType, Owner, UnitId, UnitStatus, UsageType};
use crate::error::{ErrorCode, LedgerResult};
use crate::models::{BatchUnit, EventRef, HistoryRecord, ItemRequest, ShipmentBatch, StockUnit};
use crate::validation::is_blank;

impl TransferEngine {
    /// Ship units from `from_org_id` to an active organization of `to_org_type`
    pub async fn create_shipment(
        &self,
        from_org_id: &str,
        to_org_id: &str,
        to_org_type: OrgType,
        items: &[ItemRequest],
    ) -> LedgerResult<ShipmentReceipt> {
        self.ctx
            .guarded(
                "create_shipment",
                self.create_shipment_inner(from_org_id, to_org_id, to_org_type, items),
            )
            .await
    }

    async fn create_shipment_inner(
        &self,
        from_org_id: &str,
        to_org_id: &str,
        to_org_type: OrgType,
        items: &[ItemRequest],
    ) -> LedgerResult<ShipmentReceipt> {
        if from_org_id == to_org_id {
            return Err(ErrorCode::SelfShipment.into());
        }
        match self.ctx.organization(to_org_id).await? {
            Some(org) if org.is_active && org.org_type == to_org_type => {}
            _ => return Err(ErrorCode::OrganizationNotFound.into()),
        }
        allocator::validate_items(items)?;

        let now = self.ctx.clock.now();
        let batch_id = Uuid::new_v4();
        let from = Owner::organization(from_org_id);
        let to = Owner::organization(to_org_id);

        let mut tx = self.ctx.store.begin().await?;
        let units = allocator::allocate(tx.as_mut(), from_org_id, items).await?;
        let ids = unit_ids(&units);

        tx.update_owner_and_status(&ids, &to, UnitStatus::InStock)
            .await?;
        tx.insert_batch(
            &ShipmentBatch {
                id: batch_id,
                from_org_id: from_org_id.to_string(),
                to_org_id: to_org_id.to_string(),
                to_org_type,
                shipment_date: now,
                is_recalled: false,
                recall_reason: None,
                recall_date: None,
                is_return_batch: false,
                parent_batch_id: None,
            },
            &ids,
        )
        .await?;

        let event = EventRef::Shipment(batch_id);
        let mut history = Vec::with_capacity(units.len() * 2);
        for unit in &units {
            for action in [ActionType::Shipped, ActionType::Received] {
                history.push(HistoryRecord::new(unit, action, from.clone(), to.clone(), event, now));
            }
        }
        tx.append_history(&history).await?;

        self.report_usage(tx.as_mut(), UsageType::Shipment, batch_id, from_org_id, &units, now)
            .await?;
        tx.commit().await?;

        let total_quantity = count(&units);
        info!(
            batch_id = %batch_id,
            from = from_org_id,
            to = to_org_id,
            total_quantity,
            "Shipment created"
        );
        Ok(ShipmentReceipt {
            shipment_batch_id: batch_id,
            total_quantity,
        })
    }

    /// Send units of a received batch back to that batch's sender.
    ///
    /// With no quantities (or only zero-quantity lines) every unit the caller
    /// still holds from the batch goes back; otherwise each line is served
    /// FIFO from those units.
    pub async fn return_shipment(
        &self,
        caller_org_id: &str,
        shipment_batch_id: BatchId,
        reason: &str,
        product_quantities: Option<&[ItemRequest]>,
    ) -> LedgerResult<ReturnReceipt> {
        self.ctx
            .guarded(
                "return_shipment",
                self.return_shipment_inner(caller_org_id, shipment_batch_id, reason, product_quantities),
            )
            .await
    }

    async fn return_shipment_inner(
        &self,
        caller_org_id: &str,
        shipment_batch_id: BatchId,
        reason: &str,
        product_quantities: Option<&[ItemRequest]>,
    ) -> LedgerResult<ReturnReceipt> {
        if is_blank(Some(reason)) {
            return Err(ErrorCode::ReasonRequired.into());
        }
        let requested: Vec<ItemRequest> = product_quantities
            .unwrap_or_default()
            .iter()
            .filter(|item| item.quantity > 0)
            .cloned()
            .collect();

        let mut tx = self.ctx.store.begin().await?;
        let batch = tx
            .lock_batch(shipment_batch_id)
            .await?
            .ok_or(ErrorCode::BatchNotFound)?;
        if batch.from_org_id == caller_org_id {
            return Err(ErrorCode::CodesNotOwned.into());
        }

        let held = tx
            .lock_batch_units_held_by(shipment_batch_id, caller_org_id)
            .await?;
        if held.is_empty() {
            return Err(ErrorCode::CodesNotOwned.into());
        }
        let units = if requested.is_empty() {
            held
        } else {
            take_fifo(&held, &requested)?
        };

        let sender_type = self
            .ctx
            .organization(&batch.from_org_id)
            .await?
            .map(|org| org.org_type)
            .ok_or(ErrorCode::OrganizationNotFound)?;

        let now = self.ctx.clock.now();
        let new_batch_id = Uuid::new_v4();
        let from = Owner::organization(caller_org_id);
        let to = Owner::organization(&batch.from_org_id);
        let ids = unit_ids(&units);

        tx.update_owner_and_status(&ids, &to, UnitStatus::InStock)
            .await?;
        tx.insert_batch(
            &ShipmentBatch {
                id: new_batch_id,
                from_org_id: caller_org_id.to_string(),
                to_org_id: batch.from_org_id.clone(),
                to_org_type: sender_type,
                shipment_date: now,
                is_recalled: false,
                recall_reason: None,
                recall_date: None,
                is_return_batch: true,
                parent_batch_id: Some(shipment_batch_id),
            },
            &ids,
        )
        .await?;

        let event = EventRef::Shipment(new_batch_id);
        let mut history = Vec::with_capacity(units.len() * 2);
        for unit in &units {
            for action in [ActionType::Returned, ActionType::ReturnReceived] {
                history.push(
                    HistoryRecord::new(unit, action, from.clone(), to.clone(), event, now)
                        .with_recall(reason),
                );
            }
        }
        tx.append_history(&history).await?;
        tx.commit().await?;

        let returned_count = count(&units);
        info!(
            batch_id = %shipment_batch_id,
            new_batch_id = %new_batch_id,
            from = caller_org_id,
            to = %batch.from_org_id,
            returned_count,
            "Shipment returned"
        );
        Ok(ReturnReceipt {
            success: true,
            returned_count,
            new_batch_id,
        })
    }

    /// Pull a whole batch back to its sender. A batch is recalled at most once.
    /// Units still in stock anywhere return to the sender; used or disposed
    /// units stay where they are and are counted in `left_in_place`.
    pub async fn recall_shipment(
        &self,
        from_org_id: &str,
        shipment_batch_id: BatchId,
        reason: &str,
    ) -> LedgerResult<RecallReceipt> {
        self.ctx
            .guarded(
                "recall_shipment",
                self.recall_shipment_inner(from_org_id, shipment_batch_id, reason),
            )
            .await
    }

    async fn recall_shipment_inner(
        &self,
        from_org_id: &str,
        shipment_batch_id: BatchId,
        reason: &str,
    ) -> LedgerResult<RecallReceipt> {
        if is_blank(Some(reason)) {
            return Err(ErrorCode::ReasonRequired.into());
        }

        let mut tx = self.ctx.store.begin().await?;
        let batch = tx
            .lock_batch(shipment_batch_id)
            .await?
            .ok_or(ErrorCode::BatchNotFound)?;
        if batch.from_org_id != from_org_id {
            return Err(ErrorCode::Forbidden.into());
        }
        if batch.is_recalled {
            return Err(ErrorCode::AlreadyRecalled.into());
        }

        let now = self.ctx.clock.now();
        if !tx.mark_batch_recalled(shipment_batch_id, reason, now).await? {
            return Err(ErrorCode::AlreadyRecalled.into());
        }

        // Units still in stock come back from wherever they were forwarded;
        // used or disposed units stay put.
        let mut pulled: Vec<(OrgId, StockUnit)> = Vec::new();
        let mut left_in_place = 0u32;
        for BatchUnit { unit, holder } in tx.lock_batch_units(shipment_batch_id).await? {
            match holder {
                Some(holder) if holder == from_org_id => {}
                Some(holder) => pulled.push((holder, unit)),
                None => left_in_place += 1,
            }
        }
        let to = Owner::organization(from_org_id);

        if !pulled.is_empty() {
            let ids: Vec<UnitId> = pulled.iter().map(|(_, unit)| unit.id).collect();
            tx.update_owner_and_status(&ids, &to, UnitStatus::InStock)
                .await?;
            let event = EventRef::Shipment(shipment_batch_id);
            let history: Vec<HistoryRecord> = pulled
                .iter()
                .map(|(holder, unit)| {
                    HistoryRecord::new(
                        unit,
                        ActionType::Recalled,
                        Owner::organization(holder),
                        to.clone(),
                        event,
                        now,
                    )
                    .with_recall(reason)
                })
                .collect();
            tx.append_history(&history).await?;
        }
        tx.commit().await?;

        let recalled_count = pulled.len() as u32;
        info!(
            batch_id = %shipment_batch_id,
            from = from_org_id,
            to = %batch.to_org_id,
            recalled_count,
            left_in_place,
            "Shipment recalled"
        );
        Ok(RecallReceipt {
            success: true,
            recalled_count,
            left_in_place,
        })
    }
}
