//! Ownership-transfer properties of the ledger, driven through the public API
//! against the in-memory store.

mod common;

use std::sync::Arc;

use chrono::Duration;
use common::*;
use futures::future::join_all;
use medtrace::core_types::{ActionType, OrgType, Owner, ReasonType, UnitStatus};
use medtrace::engine::TREATMENT_RECALL_REASON;
use medtrace::error::{ErrorCode, LedgerError};
use medtrace::history::HistoryQuery;
use medtrace::models::ItemRequest;
use medtrace::store::LedgerStore;

fn rejected(code: ErrorCode) -> LedgerError {
    LedgerError::Rejected(code)
}

// ============================================================================
// FIFO
// ============================================================================

#[tokio::test]
async fn test_fifo_exhausts_oldest_lot_first() {
    let fx = Fixture::new();
    let newer = fx.mint(P1, "LOT-NEW", 3, date(2026, 1, 10)).await;
    let older = fx.mint(P1, "LOT-OLD", 3, date(2025, 12, 1)).await;

    let receipt = fx
        .engine
        .create_shipment(M1, D1, OrgType::Distributor, &[ItemRequest::new(P1, 4)])
        .await
        .unwrap();
    assert_eq!(receipt.total_quantity, 4);

    let mut from_older = 0;
    let mut from_newer = 0;
    for id in fx.store.batch_unit_ids(receipt.shipment_batch_id).await.unwrap() {
        let unit = fx.store.get_unit(id).await.unwrap().unwrap();
        if unit.lot_id == older.id {
            from_older += 1;
        } else if unit.lot_id == newer.id {
            from_newer += 1;
        }
    }
    assert_eq!(from_older, 3, "older lot must be exhausted first");
    assert_eq!(from_newer, 1);
}

#[tokio::test]
async fn test_lot_pinned_request_ignores_older_stock() {
    let fx = Fixture::new();
    let _older = fx.mint(P1, "LOT-OLD", 3, date(2025, 12, 1)).await;
    let newer = fx.mint(P1, "LOT-NEW", 3, date(2026, 1, 10)).await;

    let receipt = fx
        .engine
        .create_shipment(
            M1,
            D1,
            OrgType::Distributor,
            &[ItemRequest::from_lot(P1, 2, newer.id)],
        )
        .await
        .unwrap();
    for id in fx.store.batch_unit_ids(receipt.shipment_batch_id).await.unwrap() {
        assert_eq!(fx.store.get_unit(id).await.unwrap().unwrap().lot_id, newer.id);
    }

    let err = fx
        .engine
        .create_shipment(
            M1,
            D1,
            OrgType::Distributor,
            &[ItemRequest::from_lot(P1, 2, newer.id)],
        )
        .await
        .unwrap_err();
    assert_eq!(err, rejected(ErrorCode::InsufficientStock));
}

#[tokio::test]
async fn test_insufficient_stock_rolls_back_every_line() {
    let fx = Fixture::new();
    fx.mint(P1, "LOT-1", 5, date(2026, 1, 1)).await;
    fx.mint(P2, "LOT-2", 1, date(2026, 1, 1)).await;

    let err = fx
        .engine
        .create_shipment(
            M1,
            D1,
            OrgType::Distributor,
            &[ItemRequest::new(P1, 5), ItemRequest::new(P2, 2)],
        )
        .await
        .unwrap_err();
    assert_eq!(err, rejected(ErrorCode::InsufficientStock));
    assert_eq!(fx.stock(M1, P1).await, 5);
    assert_eq!(fx.stock(M1, P2).await, 1);
    assert_eq!(fx.stock(D1, P1).await, 0);
}

// ============================================================================
// Shipment guards
// ============================================================================

#[tokio::test]
async fn test_shipment_target_checks() {
    let fx = Fixture::new();
    fx.mint(P1, "LOT-1", 5, date(2026, 1, 1)).await;
    let items = [ItemRequest::new(P1, 1)];

    let err = fx
        .engine
        .create_shipment(M1, M1, OrgType::Manufacturer, &items)
        .await
        .unwrap_err();
    assert_eq!(err, rejected(ErrorCode::SelfShipment));

    let err = fx
        .engine
        .create_shipment(M1, "nobody", OrgType::Distributor, &items)
        .await
        .unwrap_err();
    assert_eq!(err, rejected(ErrorCode::OrganizationNotFound));

    // d1 exists but is not a hospital
    let err = fx
        .engine
        .create_shipment(M1, D1, OrgType::Hospital, &items)
        .await
        .unwrap_err();
    assert_eq!(err, rejected(ErrorCode::OrganizationNotFound));

    fx.directory.set_organization_active(D2, false);
    let err = fx
        .engine
        .create_shipment(M1, D2, OrgType::Distributor, &items)
        .await
        .unwrap_err();
    assert_eq!(err, rejected(ErrorCode::OrganizationNotFound));

    let err = fx
        .engine
        .create_shipment(M1, D1, OrgType::Distributor, &[ItemRequest::new(P1, 0)])
        .await
        .unwrap_err();
    assert_eq!(err, rejected(ErrorCode::InvalidQuantity));

    assert_eq!(fx.stock(M1, P1).await, 5);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_shipments_never_double_allocate() {
    let fx = Arc::new(Fixture::new());
    fx.mint(P1, "LOT-1", 10, date(2026, 1, 1)).await;

    let mut handles = Vec::new();
    for target in [D1, D2, D1, D2, D1] {
        let fx = fx.clone();
        handles.push(tokio::spawn(async move {
            fx.engine
                .create_shipment(M1, target, OrgType::Distributor, &[ItemRequest::new(P1, 3)])
                .await
        }));
    }

    let mut shipped = 0;
    let mut short = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => shipped += receipt.total_quantity as u64,
            Err(e) => {
                assert_eq!(e, rejected(ErrorCode::InsufficientStock));
                short += 1;
            }
        }
    }
    assert_eq!(shipped, 9);
    assert_eq!(short, 2);

    let remaining = fx.stock(M1, P1).await;
    let received = fx.stock(D1, P1).await + fx.stock(D2, P1).await;
    assert_eq!(remaining, 1);
    assert_eq!(received, shipped);
    assert_eq!(remaining + received, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_recall_succeeds_exactly_once() {
    let fx = Arc::new(Fixture::new());
    fx.mint(P1, "LOT-1", 5, date(2026, 1, 1)).await;
    let batch = fx
        .engine
        .create_shipment(M1, D1, OrgType::Distributor, &[ItemRequest::new(P1, 5)])
        .await
        .unwrap()
        .shipment_batch_id;

    let mut handles = Vec::new();
    for _ in 0..3 {
        let fx = fx.clone();
        handles.push(tokio::spawn(async move {
            fx.engine.recall_shipment(M1, batch, "sterility breach").await
        }));
    }

    let mut successes = 0;
    let mut already = 0;
    for outcome in join_all(handles).await {
        match outcome.unwrap() {
            Ok(receipt) => {
                assert!(receipt.success);
                assert_eq!(receipt.recalled_count, 5);
                successes += 1;
            }
            Err(e) => {
                assert_eq!(e, rejected(ErrorCode::AlreadyRecalled));
                already += 1;
            }
        }
    }
    assert_eq!((successes, already), (1, 2));

    let stored = fx.store.get_batch(batch).await.unwrap().unwrap();
    assert!(stored.is_recalled);
    assert_eq!(stored.recall_reason.as_deref(), Some("sterility breach"));
    assert_eq!(fx.stock(M1, P1).await, 5);
    assert_eq!(fx.stock(D1, P1).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_treatments_create_one_patient() {
    let fx = Arc::new(Fixture::new());
    fx.mint(P1, "LOT-1", 10, date(2026, 1, 1)).await;
    fx.engine
        .create_shipment(M1, H1, OrgType::Hospital, &[ItemRequest::new(P1, 10)])
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let fx = fx.clone();
        handles.push(tokio::spawn(async move {
            fx.engine
                .create_treatment(H1, "010-1234-5678", date(2026, 3, 2), &[ItemRequest::new(P1, 1)])
                .await
        }));
    }

    let treatment_ids: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().treatment_id)
        .collect();
    assert_eq!(fx.store.count_patients().await.unwrap(), 1);
    assert!(fx.store.get_patient("01012345678").await.unwrap().is_some());

    let patient = Owner::patient("01012345678");
    assert_eq!(
        fx.store
            .list_units_by_owner_and_status(&patient, UnitStatus::Used)
            .await
            .unwrap()
            .len(),
        5
    );
    for id in treatment_ids {
        let record = fx.store.get_treatment(id).await.unwrap().unwrap();
        assert_eq!(record.patient_phone, "01012345678");
        assert_eq!(record.hospital_id, H1);
    }
    assert_eq!(fx.stock(H1, P1).await, 5);
}

// ============================================================================
// Return and recall
// ============================================================================

#[tokio::test]
async fn test_shipment_round_trip_restores_ownership() {
    let fx = Fixture::new();
    fx.mint(P1, "LOT-1", 6, date(2026, 1, 1)).await;

    let batch = fx
        .engine
        .create_shipment(M1, D1, OrgType::Distributor, &[ItemRequest::new(P1, 6)])
        .await
        .unwrap()
        .shipment_batch_id;
    assert_eq!(fx.stock(M1, P1).await + fx.stock(D1, P1).await, 6);

    let partial = fx
        .engine
        .return_shipment(D1, batch, "damaged box", Some(&[ItemRequest::new(P1, 2)]))
        .await
        .unwrap();
    assert_eq!(partial.returned_count, 2);
    assert_eq!(fx.stock(M1, P1).await, 2);
    assert_eq!(fx.stock(D1, P1).await, 4);

    let rest = fx
        .engine
        .return_shipment(D1, batch, "overstock", None)
        .await
        .unwrap();
    assert_eq!(rest.returned_count, 4);
    assert_eq!(fx.stock(M1, P1).await, 6);
    assert_eq!(fx.stock(D1, P1).await, 0);

    let return_batch = fx.store.get_batch(rest.new_batch_id).await.unwrap().unwrap();
    assert!(return_batch.is_return_batch);
    assert_eq!(return_batch.parent_batch_id, Some(batch));
    assert_eq!(return_batch.from_org_id, D1);
    assert_eq!(return_batch.to_org_id, M1);
    assert_eq!(return_batch.to_org_type, OrgType::Manufacturer);
}

#[tokio::test]
async fn test_second_return_is_rejected() {
    let fx = Fixture::new();
    fx.mint(P1, "LOT-1", 4, date(2026, 1, 1)).await;
    let batch = fx
        .engine
        .create_shipment(M1, D1, OrgType::Distributor, &[ItemRequest::new(P1, 4)])
        .await
        .unwrap()
        .shipment_batch_id;

    let first = fx.engine.return_shipment(D1, batch, "wrong order", None).await.unwrap();
    assert!(first.success);
    let second = fx.engine.return_shipment(D1, batch, "wrong order", None).await;
    assert_eq!(second.unwrap_err(), rejected(ErrorCode::CodesNotOwned));
}

#[tokio::test]
async fn test_return_guards() {
    let fx = Fixture::new();
    fx.mint(P1, "LOT-1", 4, date(2026, 1, 1)).await;
    let batch = fx
        .engine
        .create_shipment(M1, D1, OrgType::Distributor, &[ItemRequest::new(P1, 4)])
        .await
        .unwrap()
        .shipment_batch_id;

    let err = fx.engine.return_shipment(D1, batch, "  ", None).await.unwrap_err();
    assert_eq!(err, rejected(ErrorCode::ReasonRequired));

    let err = fx
        .engine
        .return_shipment(D1, uuid::Uuid::new_v4(), "x", None)
        .await
        .unwrap_err();
    assert_eq!(err, rejected(ErrorCode::BatchNotFound));

    // The sender cannot "return" its own shipment
    let err = fx.engine.return_shipment(M1, batch, "x", None).await.unwrap_err();
    assert_eq!(err, rejected(ErrorCode::CodesNotOwned));

    // An uninvolved organization holds nothing from the batch
    let err = fx.engine.return_shipment(D2, batch, "x", None).await.unwrap_err();
    assert_eq!(err, rejected(ErrorCode::CodesNotOwned));

    let err = fx
        .engine
        .return_shipment(D1, batch, "x", Some(&[ItemRequest::new(P1, 5)]))
        .await
        .unwrap_err();
    assert_eq!(err, rejected(ErrorCode::InsufficientStock));

    // Only zero-quantity lines: everything goes back
    let receipt = fx
        .engine
        .return_shipment(D1, batch, "x", Some(&[ItemRequest::new(P1, 0)]))
        .await
        .unwrap();
    assert_eq!(receipt.returned_count, 4);
}

#[tokio::test]
async fn test_chain_re_return() {
    let fx = Fixture::new();
    fx.mint(P1, "LOT-1", 5, date(2026, 1, 1)).await;
    let items = [ItemRequest::new(P1, 5)];

    let a_to_b = fx
        .engine
        .create_shipment(M1, D1, OrgType::Distributor, &items)
        .await
        .unwrap()
        .shipment_batch_id;
    assert_eq!((fx.stock(M1, P1).await, fx.stock(D1, P1).await), (0, 5));

    let b_to_c = fx
        .engine
        .create_shipment(D1, H1, OrgType::Hospital, &items)
        .await
        .unwrap()
        .shipment_batch_id;
    assert_eq!((fx.stock(D1, P1).await, fx.stock(H1, P1).await), (0, 5));

    let c_back = fx.engine.return_shipment(H1, b_to_c, "not needed", None).await.unwrap();
    assert_eq!(c_back.returned_count, 5);
    assert_eq!((fx.stock(D1, P1).await, fx.stock(H1, P1).await), (5, 0));

    let b_back = fx.engine.return_shipment(D1, a_to_b, "not needed", None).await.unwrap();
    assert_eq!(b_back.returned_count, 5);
    assert_eq!(fx.stock(M1, P1).await, 5);
    assert_eq!(fx.stock(D1, P1).await, 0);
    assert_eq!(fx.stock(H1, P1).await, 0);
}

#[tokio::test]
async fn test_return_batch_can_itself_be_returned() {
    let fx = Fixture::new();
    fx.mint(P1, "LOT-1", 5, date(2026, 1, 1)).await;
    let forward = fx
        .engine
        .create_shipment(M1, D1, OrgType::Distributor, &[ItemRequest::new(P1, 5)])
        .await
        .unwrap()
        .shipment_batch_id;

    let back = fx.engine.return_shipment(D1, forward, "damaged", None).await.unwrap();
    assert_eq!((fx.stock(M1, P1).await, fx.stock(D1, P1).await), (5, 0));

    let again = fx
        .engine
        .return_shipment(M1, back.new_batch_id, "inspection passed", None)
        .await
        .unwrap();
    assert_eq!(again.returned_count, 5);
    assert_eq!((fx.stock(M1, P1).await, fx.stock(D1, P1).await), (0, 5));

    let batch = fx.store.get_batch(again.new_batch_id).await.unwrap().unwrap();
    assert!(batch.is_return_batch);
    assert_eq!(batch.parent_batch_id, Some(back.new_batch_id));
    assert_eq!(batch.from_org_id, M1);
    assert_eq!(batch.to_org_id, D1);
    assert_eq!(batch.to_org_type, OrgType::Distributor);

    // The receiver of the return batch cannot return it a second time
    let err = fx
        .engine
        .return_shipment(M1, back.new_batch_id, "again", None)
        .await
        .unwrap_err();
    assert_eq!(err, rejected(ErrorCode::CodesNotOwned));
}

#[tokio::test]
async fn test_recall_pulls_back_forwarded_units() {
    let fx = Fixture::new();
    fx.mint(P1, "LOT-1", 5, date(2026, 1, 1)).await;
    let batch = fx
        .engine
        .create_shipment(M1, D1, OrgType::Distributor, &[ItemRequest::new(P1, 5)])
        .await
        .unwrap()
        .shipment_batch_id;
    fx.engine
        .create_shipment(D1, H1, OrgType::Hospital, &[ItemRequest::new(P1, 3)])
        .await
        .unwrap();
    fx.engine
        .create_treatment(H1, "01011112222", date(2026, 3, 2), &[ItemRequest::new(P1, 1)])
        .await
        .unwrap();
    fx.advance(Duration::minutes(1));

    let receipt = fx.engine.recall_shipment(M1, batch, "field action").await.unwrap();
    assert_eq!(receipt.recalled_count, 4);
    assert_eq!(receipt.left_in_place, 1);
    assert_eq!(fx.stock(M1, P1).await, 4);
    assert_eq!(fx.stock(D1, P1).await, 0);
    assert_eq!(fx.stock(H1, P1).await, 0);

    // Each recall row names the organization the unit was taken from
    for (org, pulled) in [(M1, 4), (D1, 2), (H1, 2)] {
        let page = fx.history.query_history(&HistoryQuery::new(org, 20)).await.unwrap();
        assert_eq!(page.rows[0].action_type, ActionType::Recalled, "{}", org);
        assert_eq!(page.rows[0].total_quantity, pulled, "{}", org);
    }

    let err = fx.engine.recall_shipment(M1, batch, "again").await.unwrap_err();
    assert_eq!(err, rejected(ErrorCode::AlreadyRecalled));
}

#[tokio::test]
async fn test_recall_leaves_used_units_and_requires_sender() {
    let fx = Fixture::new();
    fx.mint(P1, "LOT-1", 5, date(2026, 1, 1)).await;
    let batch = fx
        .engine
        .create_shipment(M1, H1, OrgType::Hospital, &[ItemRequest::new(P1, 5)])
        .await
        .unwrap()
        .shipment_batch_id;
    fx.engine
        .create_treatment(H1, "01099998888", date(2026, 3, 2), &[ItemRequest::new(P1, 2)])
        .await
        .unwrap();

    let err = fx.engine.recall_shipment(H1, batch, "x").await.unwrap_err();
    assert_eq!(err, rejected(ErrorCode::Forbidden));
    let err = fx.engine.recall_shipment(M1, batch, "").await.unwrap_err();
    assert_eq!(err, rejected(ErrorCode::ReasonRequired));
    let err = fx
        .engine
        .recall_shipment(M1, uuid::Uuid::new_v4(), "x")
        .await
        .unwrap_err();
    assert_eq!(err, rejected(ErrorCode::BatchNotFound));

    let receipt = fx.engine.recall_shipment(M1, batch, "field action").await.unwrap();
    assert_eq!(receipt.recalled_count, 3);
    assert_eq!(receipt.left_in_place, 2);
    assert_eq!(fx.stock(M1, P1).await, 3);
    assert_eq!(fx.stock(H1, P1).await, 0);
    let patient = Owner::patient("01099998888");
    assert_eq!(
        fx.store
            .list_units_by_owner_and_status(&patient, UnitStatus::Used)
            .await
            .unwrap()
            .len(),
        2
    );
}

// ============================================================================
// Treatment
// ============================================================================

#[tokio::test]
async fn test_treatment_requires_hospital_and_valid_phone() {
    let fx = Fixture::new();
    fx.mint(P1, "LOT-1", 5, date(2026, 1, 1)).await;
    let items = [ItemRequest::new(P1, 1)];

    let err = fx
        .engine
        .create_treatment(M1, "01012345678", date(2026, 3, 2), &items)
        .await
        .unwrap_err();
    assert_eq!(err, rejected(ErrorCode::Forbidden));

    fx.engine
        .create_shipment(M1, H1, OrgType::Hospital, &[ItemRequest::new(P1, 5)])
        .await
        .unwrap();
    let err = fx
        .engine
        .create_treatment(H1, "not-a-phone", date(2026, 3, 2), &items)
        .await
        .unwrap_err();
    assert_eq!(err, rejected(ErrorCode::InvalidPhone));
    assert_eq!(fx.stock(H1, P1).await, 5);
    assert_eq!(fx.store.count_patients().await.unwrap(), 0);
}

#[tokio::test]
async fn test_treatment_recall_window() {
    let fx = Fixture::new();
    fx.mint(P1, "LOT-1", 6, date(2026, 1, 1)).await;
    fx.engine
        .create_shipment(M1, H1, OrgType::Hospital, &[ItemRequest::new(P1, 6)])
        .await
        .unwrap();
    let items = [ItemRequest::new(P1, 2)];

    let inside = fx
        .engine
        .create_treatment(H1, "01012345678", date(2026, 3, 2), &items)
        .await
        .unwrap();
    fx.advance(Duration::hours(23));

    let err = fx
        .engine
        .recall_treatment(H2, inside.treatment_id, None)
        .await
        .unwrap_err();
    assert_eq!(err, rejected(ErrorCode::Forbidden));

    let receipt = fx
        .engine
        .recall_treatment(H1, inside.treatment_id, None)
        .await
        .unwrap();
    assert_eq!(receipt.recalled_count, 2);
    assert_eq!(fx.stock(H1, P1).await, 6);
    assert!(fx.store.get_treatment(inside.treatment_id).await.unwrap().is_none());

    let mut recall_rows = 0;
    for unit in fx
        .store
        .list_units_by_owner_and_status(&Owner::organization(H1), UnitStatus::InStock)
        .await
        .unwrap()
    {
        for row in fx.store.unit_history(unit.id).await.unwrap() {
            if row.is_recall {
                assert_eq!(row.treatment_id, Some(inside.treatment_id));
                assert_eq!(row.recall_reason.as_deref(), Some(TREATMENT_RECALL_REASON));
                assert_eq!(row.from_owner, Owner::patient("01012345678"));
                recall_rows += 1;
            }
        }
    }
    assert_eq!(recall_rows, 2);

    let err = fx
        .engine
        .recall_treatment(H1, inside.treatment_id, None)
        .await
        .unwrap_err();
    assert_eq!(err, rejected(ErrorCode::TreatmentNotFound));

    let outside = fx
        .engine
        .create_treatment(H1, "01012345678", date(2026, 3, 3), &items)
        .await
        .unwrap();
    fx.advance(Duration::hours(24));
    let err = fx
        .engine
        .recall_treatment(H1, outside.treatment_id, Some("patient refused"))
        .await
        .unwrap_err();
    assert_eq!(err, rejected(ErrorCode::Forbidden));
    assert_eq!(fx.stock(H1, P1).await, 4);

    // certification, recall, certification
    assert_eq!(fx.store.pending_notifications(10).await.unwrap().len(), 3);
}

// ============================================================================
// Disposal
// ============================================================================

#[tokio::test]
async fn test_disposal_reason_rules() {
    let fx = Fixture::new();
    fx.mint(P1, "LOT-1", 4, date(2026, 1, 1)).await;
    fx.engine
        .create_shipment(M1, H1, OrgType::Hospital, &[ItemRequest::new(P1, 4)])
        .await
        .unwrap();
    let items = [ItemRequest::new(P1, 1)];

    for custom in [None, Some(""), Some("   ")] {
        let err = fx
            .engine
            .create_disposal(H1, date(2026, 3, 2), ReasonType::Other, custom, &items)
            .await
            .unwrap_err();
        assert_eq!(err, rejected(ErrorCode::ReasonRequired));
    }

    let receipt = fx
        .engine
        .create_disposal(H1, date(2026, 3, 2), ReasonType::Other, Some(" seal broken "), &items)
        .await
        .unwrap();
    assert_eq!(receipt.total_quantity, 1);
    let record = fx.store.get_disposal(receipt.disposal_id).await.unwrap().unwrap();
    assert_eq!(record.reason_custom.as_deref(), Some("seal broken"));

    fx.engine
        .create_disposal(H1, date(2026, 3, 2), ReasonType::Expired, None, &items)
        .await
        .unwrap();
    assert_eq!(fx.stock(H1, P1).await, 2);

    let disposed = fx
        .store
        .list_units_by_owner_and_status(&Owner::organization(H1), UnitStatus::Disposed)
        .await
        .unwrap();
    assert_eq!(disposed.len(), 2);

    let err = fx
        .engine
        .create_disposal(D1, date(2026, 3, 2), ReasonType::Damage, None, &items)
        .await
        .unwrap_err();
    assert_eq!(err, rejected(ErrorCode::Forbidden));
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn test_lot_ship_return_scenario() {
    let fx = Fixture::new();
    let lot = fx.mint(P1, "LOT-2026-001", 10, date(2026, 1, 1)).await;
    assert_eq!(lot.quantity, 10);
    assert_eq!(lot.expiry_date, date(2028, 1, 1));
    assert_eq!(fx.stock(M1, P1).await, 10);

    let shipment = fx
        .engine
        .create_shipment(M1, D1, OrgType::Distributor, &[ItemRequest::new(P1, 5)])
        .await
        .unwrap();
    assert_eq!(shipment.total_quantity, 5);
    assert_eq!(fx.stock(M1, P1).await, 5);
    assert_eq!(fx.stock(D1, P1).await, 5);

    let returned = fx
        .engine
        .return_shipment(D1, shipment.shipment_batch_id, "excess stock", None)
        .await
        .unwrap();
    assert!(returned.success);
    assert_eq!(returned.returned_count, 5);
    assert_eq!(fx.stock(M1, P1).await, 10);
    assert_eq!(fx.stock(D1, P1).await, 0);

    let new_batch = fx
        .store
        .get_batch(returned.new_batch_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(new_batch.parent_batch_id, Some(shipment.shipment_batch_id));
}
