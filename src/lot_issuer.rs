//! Lot Issuer
//!
//! Mints a lot and all of its units in one transaction. Codes come from a
//! store-wide serial sequence, so they are unique across lots and products.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::context::LedgerContext;
use crate::core_types::{ActionType, Owner, ProductId, UnitStatus};
use crate::error::{ErrorCode, LedgerError, LedgerResult};
use crate::models::{EventRef, HistoryRecord, Lot, StockUnit, VirtualCode};
use crate::validation::{validate_lot_number, validate_quantity};

/// Display code for a unit serial
pub fn format_code(serial: i64) -> String {
    format!("VC{:012}", serial)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLotRequest {
    pub product_id: ProductId,
    pub lot_number: String,
    pub quantity: u32,
    pub manufacture_date: NaiveDate,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
}

pub struct LotIssuer {
    ctx: LedgerContext,
}

impl LotIssuer {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    /// Create a lot of `quantity` units owned by the calling manufacturer
    pub async fn create_lot(&self, caller_org_id: &str, req: CreateLotRequest) -> LedgerResult<Lot> {
        self.ctx
            .guarded("create_lot", self.create_lot_inner(caller_org_id, req))
            .await
    }

    async fn create_lot_inner(&self, caller_org_id: &str, req: CreateLotRequest) -> LedgerResult<Lot> {
        let quantity = validate_quantity(req.quantity).map_err(ErrorCode::from)?;
        if quantity > self.ctx.config.max_lot_quantity {
            return Err(ErrorCode::InvalidQuantity.into());
        }
        let lot_number = validate_lot_number(&req.lot_number)
            .map_err(ErrorCode::from)?
            .to_string();

        let product = self
            .ctx
            .product(&req.product_id)
            .await?
            .ok_or(ErrorCode::ProductNotFound)?;
        if !product.is_active {
            return Err(ErrorCode::ProductInactive.into());
        }
        if product.owner_org_id != caller_org_id {
            return Err(ErrorCode::Forbidden.into());
        }

        let issuer = self
            .ctx
            .organization(caller_org_id)
            .await?
            .filter(|org| org.is_active)
            .ok_or(ErrorCode::Forbidden)?;

        let expiry_date = match req.expiry_date {
            Some(date) => date,
            None => {
                let months = issuer
                    .expiry_months
                    .unwrap_or(self.ctx.config.default_expiry_months);
                req.manufacture_date
                    .checked_add_months(Months::new(months))
                    .ok_or_else(|| {
                        LedgerError::Internal(format!(
                            "expiry overflow: {} + {} months",
                            req.manufacture_date, months
                        ))
                    })?
            }
        };

        let now = self.ctx.clock.now();
        let lot = Lot {
            id: Uuid::new_v4(),
            product_id: product.id.clone(),
            issuer_org_id: caller_org_id.to_string(),
            lot_number,
            quantity,
            manufacture_date: req.manufacture_date,
            expiry_date,
            created_at: now,
        };

        let mut tx = self.ctx.store.begin().await?;
        if !tx.insert_lot(&lot).await? {
            return Err(ErrorCode::DuplicateLotNumber.into());
        }

        let serials = tx.next_code_serials(quantity).await?;
        if serials.len() != quantity as usize {
            return Err(LedgerError::Internal(format!(
                "requested {} serials, got {}",
                quantity,
                serials.len()
            )));
        }

        let issuer_owner = Owner::organization(caller_org_id);
        let units: Vec<VirtualCode> = serials
            .into_iter()
            .map(|serial| VirtualCode {
                id: Uuid::new_v4(),
                lot_id: lot.id,
                code: format_code(serial),
                status: UnitStatus::InStock,
                owner: issuer_owner.clone(),
            })
            .collect();
        tx.insert_units(&units).await?;

        let history: Vec<HistoryRecord> = units
            .iter()
            .map(|unit| {
                let stock = StockUnit {
                    id: unit.id,
                    code: unit.code.clone(),
                    lot_id: lot.id,
                    product_id: lot.product_id.clone(),
                    manufacture_date: lot.manufacture_date,
                };
                HistoryRecord::new(
                    &stock,
                    ActionType::Produced,
                    issuer_owner.clone(),
                    issuer_owner.clone(),
                    EventRef::Lot,
                    now,
                )
            })
            .collect();
        tx.append_history(&history).await?;
        tx.commit().await?;

        info!(
            lot_id = %lot.id,
            product_id = %lot.product_id,
            lot_number = %lot.lot_number,
            quantity,
            "Lot created"
        );
        Ok(lot)
    }
}
