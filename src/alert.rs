//! Alert Service
//!
//! Raises alerts when a shipment or treatment moves units of a deactivated
//! product. Alerts are written inside the caller's transaction, so they exist
//! exactly when the usage they describe was committed.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::context::LedgerContext;
use crate::core_types::{DeactivationReason, UsageType};
use crate::error::{ErrorCode, LedgerResult};
use crate::models::{InactiveProductUsageLog, OrganizationAlert};
use crate::store::LedgerTx;

pub const INACTIVE_PRODUCT_USAGE: &str = "INACTIVE_PRODUCT_USAGE";

/// One product's share of a shipment or treatment
#[derive(Debug, Clone, Copy)]
pub struct UsageEvent<'a> {
    pub usage_type: UsageType,
    pub usage_id: Uuid,
    pub product_id: &'a str,
    pub organization_id: &'a str,
    pub quantity: u32,
}

/// Title keyed by deactivation severity
pub fn alert_title(reason: Option<DeactivationReason>, product_name: &str) -> String {
    match reason {
        Some(DeactivationReason::SafetyIssue) => {
            format!("[긴급] 안전 문제로 비활성화된 제품 사용: {}", product_name)
        }
        Some(DeactivationReason::QualityIssue) => {
            format!("[주의] 품질 문제로 비활성화된 제품 사용: {}", product_name)
        }
        _ => format!("비활성화된 제품 사용 알림: {}", product_name),
    }
}

fn usage_label(usage_type: UsageType) -> &'static str {
    match usage_type {
        UsageType::Shipment => "출고",
        UsageType::Treatment => "시술",
    }
}

pub struct AlertService {
    ctx: LedgerContext,
}

impl AlertService {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    /// Record usage of a product. No-op for active or unknown products.
    /// Returns the number of alerts raised.
    pub async fn on_usage(
        &self,
        tx: &mut dyn LedgerTx,
        event: UsageEvent<'_>,
        at: DateTime<Utc>,
    ) -> LedgerResult<usize> {
        let product = match self.ctx.product(event.product_id).await? {
            Some(p) if !p.is_active => p,
            _ => return Ok(0),
        };

        let organization_name = self
            .ctx
            .organization(event.organization_id)
            .await?
            .map(|o| o.name)
            .unwrap_or_else(|| event.organization_id.to_string());

        tx.insert_usage_log(&InactiveProductUsageLog {
            id: Uuid::new_v4(),
            usage_type: event.usage_type,
            usage_id: event.usage_id,
            product_id: product.id.clone(),
            organization_id: event.organization_id.to_string(),
            quantity: event.quantity,
            deactivation_reason: product.deactivation_reason,
            created_at: at,
        })
        .await?;

        let mut recipients: Vec<&str> = Vec::with_capacity(2);
        if let Some(admin) = self.ctx.config.admin_organization_id.as_deref() {
            recipients.push(admin);
        }
        if !recipients.contains(&product.owner_org_id.as_str()) {
            recipients.push(&product.owner_org_id);
        }

        let title = alert_title(product.deactivation_reason, &product.name);
        let content = format!(
            "{}에서 비활성화된 제품 '{}' {}개를 {}에 사용했습니다.",
            organization_name,
            product.name,
            event.quantity,
            usage_label(event.usage_type)
        );
        let metadata = json!({
            "productId": product.id,
            "productName": product.name,
            "usageType": event.usage_type.as_str(),
            "usageId": event.usage_id,
            "quantity": event.quantity,
            "organizationId": event.organization_id,
            "organizationName": organization_name,
            "deactivationReason": product.deactivation_reason.map(|r| r.as_str()),
        });

        let alerts: Vec<OrganizationAlert> = recipients
            .iter()
            .map(|recipient| OrganizationAlert {
                id: Uuid::new_v4(),
                recipient_org_id: recipient.to_string(),
                alert_type: INACTIVE_PRODUCT_USAGE.to_string(),
                title: title.clone(),
                content: content.clone(),
                metadata: metadata.clone(),
                is_read: false,
                read_at: None,
                created_at: at,
            })
            .collect();
        tx.insert_alerts(&alerts).await?;

        info!(
            product_id = %product.id,
            usage_type = %event.usage_type.as_str(),
            usage_id = %event.usage_id,
            recipients = alerts.len(),
            "Inactive product usage alert raised"
        );
        Ok(alerts.len())
    }

    pub async fn list_alerts(
        &self,
        recipient_org_id: &str,
        unread_only: bool,
    ) -> LedgerResult<Vec<OrganizationAlert>> {
        Ok(self.ctx.store.list_alerts(recipient_org_id, unread_only).await?)
    }

    /// Mark an alert read or unread. Only the recipient may do this.
    pub async fn set_read(&self, recipient_org_id: &str, alert_id: Uuid, read: bool) -> LedgerResult<()> {
        let now = self.ctx.clock.now();
        if !self
            .ctx
            .store
            .set_alert_read(recipient_org_id, alert_id, read, now)
            .await?
        {
            return Err(ErrorCode::Forbidden.into());
        }
        Ok(())
    }

    pub async fn usage_logs(&self, product_id: &str) -> LedgerResult<Vec<InactiveProductUsageLog>> {
        Ok(self.ctx.store.list_usage_logs(product_id).await?)
    }
}
