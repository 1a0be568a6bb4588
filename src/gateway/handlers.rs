//! HTTP handlers
//!
//! Every private handler takes the caller's organization from the JWT claims;
//! request bodies never carry the acting organization.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::Claims;
use super::response::{ApiError, ApiResult, error_codes, ok};
use super::state::AppState;
use crate::core_types::{ActionType, OrgType, ReasonType};
use crate::engine::{DisposalReceipt, RecallReceipt, ReturnReceipt, ShipmentReceipt, TreatmentReceipt};
use crate::error::{ErrorCode, LedgerError};
use crate::history::{HistoryCursor, HistoryPage, HistoryQuery, is_visible};
use crate::lot_issuer::CreateLotRequest;
use crate::models::{HistoryRecord, ItemRequest, Lot, OrganizationAlert, VirtualCode};

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShipmentBody {
    pub to_org_id: String,
    pub to_org_type: OrgType,
    pub items: Vec<ItemRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnBody {
    pub reason: String,
    /// Anything that is not a list of items means "return everything"
    #[serde(default)]
    pub product_quantities: Option<serde_json::Value>,
}

impl ReturnBody {
    fn quantities(&self) -> Option<Vec<ItemRequest>> {
        self.product_quantities
            .clone()
            .and_then(|v| serde_json::from_value::<Vec<ItemRequest>>(v).ok())
    }
}

#[derive(Debug, Deserialize)]
pub struct RecallBody {
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TreatmentRecallBody {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentBody {
    pub patient_phone: String,
    pub treatment_date: NaiveDate,
    pub items: Vec<ItemRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisposalBody {
    pub disposal_date: NaiveDate,
    pub reason_type: ReasonType,
    #[serde(default)]
    pub reason_custom: Option<String>,
    pub items: Vec<ItemRequest>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    /// Comma separated, e.g. `SHIPPED,RECEIVED`
    pub action_types: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub cursor_time: Option<DateTime<Utc>>,
    pub cursor_key: Option<String>,
    pub limit: Option<u32>,
}

const DEFAULT_PAGE_SIZE: u32 = 20;

impl HistoryParams {
    fn into_query(self, organization_id: &str) -> Result<HistoryQuery, ApiError> {
        let action_types = match self.action_types.as_deref() {
            Some(raw) if !raw.trim().is_empty() => Some(
                raw.split(',')
                    .map(|s| s.trim().parse::<ActionType>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| ApiError::bad_request(e.to_string()))?,
            ),
            _ => None,
        };
        let cursor = match (self.cursor_time, self.cursor_key) {
            (Some(time), Some(key)) => Some(HistoryCursor { time, key }),
            (None, None) => None,
            _ => {
                return Err(ApiError::bad_request(
                    "cursorTime and cursorKey must be given together",
                ));
            }
        };
        Ok(HistoryQuery {
            organization_id: organization_id.to_string(),
            action_types,
            start_date: self.start_date,
            end_date: self.end_date,
            cursor,
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertParams {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReadBody {
    pub read: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryData {
    pub product_id: String,
    pub in_stock: u64,
}

#[derive(Debug, Serialize)]
pub struct UnitData {
    pub unit: VirtualCode,
    /// Rows of the unit's trail visible to the caller
    pub history: Vec<HistoryRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub timestamp_ms: i64,
    pub version: &'static str,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
///
/// - Healthy: 200 OK + {code: 0, data: {timestampMs, version}}
/// - Unhealthy: 503 Service Unavailable
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    if let Err(e) = state.store.health_check().await {
        tracing::error!("[HEALTH] store ping failed: {}", e);
        return ApiError::service_unavailable("unavailable").into_err();
    }
    ok(HealthResponse {
        timestamp_ms: Utc::now().timestamp_millis(),
        version: env!("GIT_HASH"),
    })
}

pub async fn create_lot(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateLotRequest>,
) -> ApiResult<Lot> {
    let lot = state
        .lot_issuer
        .create_lot(claims.org_id(), req)
        .await
        .map_err(ApiError::from)?;
    ok(lot)
}

/// Lot details, for the issuing organization
pub async fn get_lot(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(lot_id): Path<Uuid>,
) -> ApiResult<Lot> {
    let lot = state
        .store
        .get_lot(lot_id)
        .await
        .map_err(|e| ApiError::from(LedgerError::from(e)))?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, error_codes::NOT_FOUND, "LOT_NOT_FOUND"))?;
    if lot.issuer_org_id != claims.org_id() {
        return ApiError::from(LedgerError::Rejected(ErrorCode::Forbidden))
            .into_err();
    }
    ok(lot)
}

pub async fn create_shipment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateShipmentBody>,
) -> ApiResult<ShipmentReceipt> {
    let receipt = state
        .engine
        .create_shipment(claims.org_id(), &req.to_org_id, req.to_org_type, &req.items)
        .await
        .map_err(ApiError::from)?;
    ok(receipt)
}

pub async fn return_shipment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(batch_id): Path<Uuid>,
    Json(req): Json<ReturnBody>,
) -> ApiResult<ReturnReceipt> {
    let quantities = req.quantities();
    let receipt = state
        .engine
        .return_shipment(claims.org_id(), batch_id, &req.reason, quantities.as_deref())
        .await
        .map_err(ApiError::from)?;
    ok(receipt)
}

pub async fn recall_shipment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(batch_id): Path<Uuid>,
    Json(req): Json<RecallBody>,
) -> ApiResult<RecallReceipt> {
    let receipt = state
        .engine
        .recall_shipment(claims.org_id(), batch_id, &req.reason)
        .await
        .map_err(ApiError::from)?;
    ok(receipt)
}

pub async fn create_treatment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TreatmentBody>,
) -> ApiResult<TreatmentReceipt> {
    let receipt = state
        .engine
        .create_treatment(claims.org_id(), &req.patient_phone, req.treatment_date, &req.items)
        .await
        .map_err(ApiError::from)?;
    ok(receipt)
}

pub async fn recall_treatment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(treatment_id): Path<Uuid>,
    body: Option<Json<TreatmentRecallBody>>,
) -> ApiResult<RecallReceipt> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let receipt = state
        .engine
        .recall_treatment(claims.org_id(), treatment_id, body.reason.as_deref())
        .await
        .map_err(ApiError::from)?;
    ok(receipt)
}

pub async fn create_disposal(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DisposalBody>,
) -> ApiResult<DisposalReceipt> {
    let receipt = state
        .engine
        .create_disposal(
            claims.org_id(),
            req.disposal_date,
            req.reason_type,
            req.reason_custom.as_deref(),
            &req.items,
        )
        .await
        .map_err(ApiError::from)?;
    ok(receipt)
}

pub async fn query_history(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<HistoryPage> {
    let query = params.into_query(claims.org_id())?;
    let page = state
        .history
        .query_history(&query)
        .await
        .map_err(ApiError::from)?;
    ok(page)
}

pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<AlertParams>,
) -> ApiResult<Vec<OrganizationAlert>> {
    let alerts = state
        .alerts
        .list_alerts(claims.org_id(), params.unread_only)
        .await
        .map_err(ApiError::from)?;
    ok(alerts)
}

pub async fn set_alert_read(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(alert_id): Path<Uuid>,
    Json(req): Json<ReadBody>,
) -> ApiResult<()> {
    state
        .alerts
        .set_read(claims.org_id(), alert_id, req.read)
        .await
        .map_err(ApiError::from)?;
    ok(())
}

pub async fn get_inventory(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(product_id): Path<String>,
) -> ApiResult<InventoryData> {
    let in_stock = state
        .store
        .count_in_stock(claims.org_id(), &product_id)
        .await
        .map_err(|e| ApiError::from(LedgerError::from(e)))?;
    ok(InventoryData {
        product_id,
        in_stock,
    })
}

/// Unit by display code, with the part of its trail the caller may see.
/// Only organizations that appear in that trail can look the unit up.
pub async fn get_unit(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(code): Path<String>,
) -> ApiResult<UnitData> {
    let not_found = || {
        ApiError::new(
            StatusCode::NOT_FOUND,
            error_codes::NOT_FOUND,
            "UNIT_NOT_FOUND",
        )
    };
    let unit = state
        .store
        .get_unit_by_code(&code)
        .await
        .map_err(|e| ApiError::from(LedgerError::from(e)))?
        .ok_or_else(not_found)?;

    let history: Vec<HistoryRecord> = state
        .history
        .unit_history(unit.id)
        .await
        .map_err(ApiError::from)?
        .into_iter()
        .filter(|row| is_visible(row, claims.org_id()))
        .collect();
    if history.is_empty() {
        return not_found().into_err();
    }
    ok(UnitData { unit, history })
}
