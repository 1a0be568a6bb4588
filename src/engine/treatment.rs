//! Treatments: hand units to a patient, and the time-boxed undo

use chrono::{Duration, NaiveDate};
use tracing::info;
use uuid::Uuid;

use super::{RecallReceipt, TransferEngine, TreatmentReceipt, count, notification_body};
use crate::allocator::{self, unit_ids};
use crate::core_types::{
    ActionType, NotificationType, OrgType, Owner, TreatmentId, UnitStatus, UsageType,
};
use crate::error::{ErrorCode, LedgerResult};
use crate::models::{EventRef, HistoryRecord, ItemRequest, NotificationIntent, TreatmentRecord};
use crate::validation::{is_blank, normalize_phone};

/// Recall reason recorded when the hospital gives none
pub const TREATMENT_RECALL_REASON: &str = "TREATMENT_RECALL";

impl TransferEngine {
    /// Use units from the hospital's stock on a patient identified by phone
    pub async fn create_treatment(
        &self,
        hospital_id: &str,
        patient_phone: &str,
        treatment_date: NaiveDate,
        items: &[ItemRequest],
    ) -> LedgerResult<TreatmentReceipt> {
        self.ctx
            .guarded(
                "create_treatment",
                self.create_treatment_inner(hospital_id, patient_phone, treatment_date, items),
            )
            .await
    }

    async fn create_treatment_inner(
        &self,
        hospital_id: &str,
        patient_phone: &str,
        treatment_date: NaiveDate,
        items: &[ItemRequest],
    ) -> LedgerResult<TreatmentReceipt> {
        self.ctx.require_org_type(hospital_id, OrgType::Hospital).await?;
        let phone = normalize_phone(patient_phone).map_err(ErrorCode::from)?;
        allocator::validate_items(items)?;

        let now = self.ctx.clock.now();
        let treatment_id = Uuid::new_v4();
        let from = Owner::organization(hospital_id);
        let to = Owner::patient(&phone);

        let mut tx = self.ctx.store.begin().await?;
        let units = allocator::allocate(tx.as_mut(), hospital_id, items).await?;
        let ids = unit_ids(&units);

        if tx.upsert_patient(&phone, now).await? {
            tracing::debug!(hospital_id, "New patient registered");
        }
        tx.update_owner_and_status(&ids, &to, UnitStatus::Used).await?;
        tx.insert_treatment(
            &TreatmentRecord {
                id: treatment_id,
                hospital_id: hospital_id.to_string(),
                patient_phone: phone.clone(),
                treatment_date,
                created_at: now,
            },
            &ids,
        )
        .await?;

        let event = EventRef::Treatment(treatment_id);
        let history: Vec<HistoryRecord> = units
            .iter()
            .map(|unit| HistoryRecord::new(unit, ActionType::Treated, from.clone(), to.clone(), event, now))
            .collect();
        tx.append_history(&history).await?;

        self.report_usage(tx.as_mut(), UsageType::Treatment, treatment_id, hospital_id, &units, now)
            .await?;
        tx.enqueue_notification(&NotificationIntent {
            id: Uuid::new_v4(),
            notification_type: NotificationType::Certification,
            patient_phone: phone,
            content: notification_body("TREATMENT", treatment_id, hospital_id, &units),
            created_at: now,
            dispatched_at: None,
        })
        .await?;
        tx.commit().await?;

        let total_quantity = count(&units);
        info!(
            treatment_id = %treatment_id,
            hospital_id,
            total_quantity,
            "Treatment recorded"
        );
        Ok(TreatmentReceipt {
            treatment_id,
            total_quantity,
        })
    }

    /// Undo a treatment within the recall window: units return to the
    /// hospital's stock and the treatment record is removed
    pub async fn recall_treatment(
        &self,
        hospital_id: &str,
        treatment_id: TreatmentId,
        reason: Option<&str>,
    ) -> LedgerResult<RecallReceipt> {
        self.ctx
            .guarded(
                "recall_treatment",
                self.recall_treatment_inner(hospital_id, treatment_id, reason),
            )
            .await
    }

    async fn recall_treatment_inner(
        &self,
        hospital_id: &str,
        treatment_id: TreatmentId,
        reason: Option<&str>,
    ) -> LedgerResult<RecallReceipt> {
        self.ctx.require_org_type(hospital_id, OrgType::Hospital).await?;
        let reason = match reason {
            Some(text) if !is_blank(Some(text)) => text.trim(),
            _ => TREATMENT_RECALL_REASON,
        };

        let mut tx = self.ctx.store.begin().await?;
        let record = tx
            .lock_treatment(treatment_id)
            .await?
            .ok_or(ErrorCode::TreatmentNotFound)?;
        if record.hospital_id != hospital_id {
            return Err(ErrorCode::Forbidden.into());
        }

        let now = self.ctx.clock.now();
        let window = Duration::hours(self.ctx.config.recall_window_hours);
        if now - record.created_at >= window {
            return Err(ErrorCode::Forbidden.into());
        }

        let units = tx.lock_treatment_units(treatment_id).await?;
        let from = Owner::patient(&record.patient_phone);
        let to = Owner::organization(hospital_id);

        tx.update_owner_and_status(&unit_ids(&units), &to, UnitStatus::InStock)
            .await?;
        tx.delete_treatment(treatment_id).await?;

        let event = EventRef::Treatment(treatment_id);
        let history: Vec<HistoryRecord> = units
            .iter()
            .map(|unit| {
                HistoryRecord::new(unit, ActionType::Recalled, from.clone(), to.clone(), event, now)
                    .with_recall(reason)
            })
            .collect();
        tx.append_history(&history).await?;

        tx.enqueue_notification(&NotificationIntent {
            id: Uuid::new_v4(),
            notification_type: NotificationType::Recall,
            patient_phone: record.patient_phone.clone(),
            content: notification_body("TREATMENT_RECALL", treatment_id, hospital_id, &units),
            created_at: now,
            dispatched_at: None,
        })
        .await?;
        tx.commit().await?;

        let recalled_count = count(&units);
        info!(
            treatment_id = %treatment_id,
            hospital_id,
            recalled_count,
            "Treatment recalled"
        );
        Ok(RecallReceipt {
            success: true,
            recalled_count,
            left_in_place: 0,
        })
    }
}
