//! Lot issuance and inactive-product alerts through the transfer engine

mod common;

use common::*;
use medtrace::core_types::{DeactivationReason, OrgType, UnitStatus, UsageType};
use medtrace::error::{ErrorCode, LedgerError};
use medtrace::lot_issuer::CreateLotRequest;
use medtrace::models::ItemRequest;
use medtrace::store::LedgerStore;

fn lot_request(product: &str, lot_number: &str, quantity: u32) -> CreateLotRequest {
    CreateLotRequest {
        product_id: product.to_string(),
        lot_number: lot_number.to_string(),
        quantity,
        manufacture_date: date(2026, 2, 1),
        expiry_date: Some(date(2027, 2, 1)),
    }
}

#[tokio::test]
async fn test_lot_issue_and_rejections() {
    let fx = Fixture::new();
    let lot = fx.issuer.create_lot(M1, lot_request(P1, "A-001", 3)).await.unwrap();
    assert_eq!(lot.expiry_date, date(2027, 2, 1));

    let units = fx
        .store
        .list_units_by_owner_and_status(&medtrace::Owner::organization(M1), UnitStatus::InStock)
        .await
        .unwrap();
    assert_eq!(units.len(), 3);
    assert!(units.iter().all(|u| u.code.starts_with("VC") && u.code.len() == 14));

    let err = fx.issuer.create_lot(M1, lot_request(P1, "A-001", 1)).await.unwrap_err();
    assert_eq!(err, LedgerError::Rejected(ErrorCode::DuplicateLotNumber));
    // Same lot number on another product is fine
    fx.issuer.create_lot(M1, lot_request(P2, "A-001", 1)).await.unwrap();

    let err = fx.issuer.create_lot(D1, lot_request(P1, "B-001", 1)).await.unwrap_err();
    assert_eq!(err, LedgerError::Rejected(ErrorCode::Forbidden));

    let err = fx.issuer.create_lot(M1, lot_request("nope", "B-001", 1)).await.unwrap_err();
    assert_eq!(err, LedgerError::Rejected(ErrorCode::ProductNotFound));

    let err = fx.issuer.create_lot(M1, lot_request(P1, "B-001", 0)).await.unwrap_err();
    assert_eq!(err, LedgerError::Rejected(ErrorCode::InvalidQuantity));

    fx.directory.deactivate_product(P2, DeactivationReason::Discontinued);
    let err = fx.issuer.create_lot(M1, lot_request(P2, "B-001", 1)).await.unwrap_err();
    assert_eq!(err, LedgerError::Rejected(ErrorCode::ProductInactive));

    assert_eq!(fx.stock(M1, P1).await, 3);
}

#[tokio::test]
async fn test_inactive_product_usage_raises_alerts() {
    let fx = Fixture::new();
    fx.mint(P1, "LOT-1", 4, date(2026, 1, 1)).await;
    fx.directory.deactivate_product(P1, DeactivationReason::SafetyIssue);

    let shipment = fx
        .engine
        .create_shipment(M1, H1, OrgType::Hospital, &[ItemRequest::new(P1, 4)])
        .await
        .unwrap();
    let treatment = fx
        .engine
        .create_treatment(H1, "01055556666", date(2026, 3, 2), &[ItemRequest::new(P1, 1)])
        .await
        .unwrap();

    let logs = fx.alerts.usage_logs(P1).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().any(|l| l.usage_type == UsageType::Shipment
        && l.usage_id == shipment.shipment_batch_id
        && l.quantity == 4
        && l.organization_id == M1));
    assert!(logs.iter().any(|l| l.usage_type == UsageType::Treatment
        && l.usage_id == treatment.treatment_id
        && l.quantity == 1
        && l.organization_id == H1));

    for recipient in [ADMIN, M1] {
        let alerts = fx.alerts.list_alerts(recipient, false).await.unwrap();
        assert_eq!(alerts.len(), 2, "{} gets one alert per usage", recipient);
        assert!(alerts.iter().all(|a| a.title.starts_with("[긴급]")));
        assert!(alerts.iter().all(|a| a.metadata["deactivationReason"] == "SAFETY_ISSUE"));
    }
    assert!(fx.alerts.list_alerts(H1, false).await.unwrap().is_empty());

    // Only the recipient can flip the read flag
    let alert = fx.alerts.list_alerts(M1, true).await.unwrap().remove(0);
    let err = fx.alerts.set_read(H1, alert.id, true).await.unwrap_err();
    assert_eq!(err, LedgerError::Rejected(ErrorCode::Forbidden));
    fx.alerts.set_read(M1, alert.id, true).await.unwrap();
    assert_eq!(fx.alerts.list_alerts(M1, true).await.unwrap().len(), 1);
    fx.alerts.set_read(M1, alert.id, false).await.unwrap();
    assert_eq!(fx.alerts.list_alerts(M1, true).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_quality_issue_title_and_disposal_is_silent() {
    let fx = Fixture::new();
    fx.mint(P1, "LOT-1", 2, date(2026, 1, 1)).await;
    fx.engine
        .create_shipment(M1, H1, OrgType::Hospital, &[ItemRequest::new(P1, 2)])
        .await
        .unwrap();
    fx.directory.deactivate_product(P1, DeactivationReason::QualityIssue);

    fx.engine
        .create_disposal(
            H1,
            date(2026, 3, 2),
            medtrace::core_types::ReasonType::Damage,
            None,
            &[ItemRequest::new(P1, 1)],
        )
        .await
        .unwrap();
    assert!(fx.alerts.list_alerts(M1, false).await.unwrap().is_empty());

    fx.engine
        .create_treatment(H1, "01055556666", date(2026, 3, 2), &[ItemRequest::new(P1, 1)])
        .await
        .unwrap();
    let alerts = fx.alerts.list_alerts(M1, false).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].title.starts_with("[주의]"));
}
