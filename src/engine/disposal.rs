//! Disposals

use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use super::{DisposalReceipt, TransferEngine, count};
use crate::allocator::{self, unit_ids};
use crate::core_types::{ActionType, OrgType, Owner, ReasonType, UnitStatus};
use crate::error::{ErrorCode, LedgerResult};
use crate::models::{DisposalRecord, EventRef, HistoryRecord, ItemRequest};
use crate::validation::is_blank;

impl TransferEngine {
    /// Retire units from the hospital's stock. The owner stays the hospital;
    /// the status becomes terminal.
    pub async fn create_disposal(
        &self,
        hospital_id: &str,
        disposal_date: NaiveDate,
        reason_type: ReasonType,
        reason_custom: Option<&str>,
        items: &[ItemRequest],
    ) -> LedgerResult<DisposalReceipt> {
        self.ctx
            .guarded(
                "create_disposal",
                self.create_disposal_inner(hospital_id, disposal_date, reason_type, reason_custom, items),
            )
            .await
    }

    async fn create_disposal_inner(
        &self,
        hospital_id: &str,
        disposal_date: NaiveDate,
        reason_type: ReasonType,
        reason_custom: Option<&str>,
        items: &[ItemRequest],
    ) -> LedgerResult<DisposalReceipt> {
        self.ctx.require_org_type(hospital_id, OrgType::Hospital).await?;
        if reason_type == ReasonType::Other && is_blank(reason_custom) {
            return Err(ErrorCode::ReasonRequired.into());
        }
        allocator::validate_items(items)?;

        let now = self.ctx.clock.now();
        let disposal_id = Uuid::new_v4();
        let hospital = Owner::organization(hospital_id);

        let mut tx = self.ctx.store.begin().await?;
        let units = allocator::allocate(tx.as_mut(), hospital_id, items).await?;
        let ids = unit_ids(&units);

        tx.update_owner_and_status(&ids, &hospital, UnitStatus::Disposed)
            .await?;
        tx.insert_disposal(
            &DisposalRecord {
                id: disposal_id,
                hospital_id: hospital_id.to_string(),
                disposal_date,
                reason_type,
                reason_custom: reason_custom
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
                created_at: now,
            },
            &ids,
        )
        .await?;

        let event = EventRef::Disposal(disposal_id);
        let history: Vec<HistoryRecord> = units
            .iter()
            .map(|unit| {
                HistoryRecord::new(
                    unit,
                    ActionType::Disposed,
                    hospital.clone(),
                    hospital.clone(),
                    event,
                    now,
                )
            })
            .collect();
        tx.append_history(&history).await?;
        tx.commit().await?;

        let total_quantity = count(&units);
        info!(
            disposal_id = %disposal_id,
            hospital_id,
            reason = reason_type.as_str(),
            total_quantity,
            "Disposal recorded"
        );
        Ok(DisposalReceipt {
            disposal_id,
            total_quantity,
        })
    }
}
