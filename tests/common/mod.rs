//! Shared fixture: an in-memory ledger with a small supply chain
//!
//! - `admin` (ADMIN), `m1` (MANUFACTURER)
//! - `d1`, `d2` (DISTRIBUTOR)
//! - `h1`, `h2` (HOSPITAL)
//! - products `p1`, `p2` owned by `m1`

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use medtrace::alert::AlertService;
use medtrace::clock::ManualClock;
use medtrace::config::LedgerConfig;
use medtrace::context::LedgerContext;
use medtrace::core_types::OrgType;
use medtrace::directory::{InMemoryDirectory, Organization, Product};
use medtrace::engine::TransferEngine;
use medtrace::history::HistoryQueryService;
use medtrace::lot_issuer::{CreateLotRequest, LotIssuer};
use medtrace::models::Lot;
use medtrace::store::{LedgerStore, MemoryStore};

pub const ADMIN: &str = "admin";
pub const M1: &str = "m1";
pub const D1: &str = "d1";
pub const D2: &str = "d2";
pub const H1: &str = "h1";
pub const H2: &str = "h2";
pub const P1: &str = "p1";
pub const P2: &str = "p2";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub struct Fixture {
    pub store: MemoryStore,
    pub directory: InMemoryDirectory,
    pub clock: Arc<ManualClock>,
    pub ctx: LedgerContext,
    pub issuer: LotIssuer,
    pub engine: TransferEngine,
    pub history: HistoryQueryService,
    pub alerts: AlertService,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(LedgerConfig {
            admin_organization_id: Some(ADMIN.to_string()),
            ..LedgerConfig::default()
        })
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        let store = MemoryStore::new();
        let directory = InMemoryDirectory::new();
        for (id, org_type) in [
            (ADMIN, OrgType::Admin),
            (M1, OrgType::Manufacturer),
            (D1, OrgType::Distributor),
            (D2, OrgType::Distributor),
            (H1, OrgType::Hospital),
            (H2, OrgType::Hospital),
        ] {
            directory.upsert_organization(Organization::new(id, format!("Org {}", id), org_type));
        }
        directory.upsert_product(Product::new(P1, "Coronary Stent", M1));
        directory.upsert_product(Product::new(P2, "Balloon Catheter", M1));

        let clock = Arc::new(ManualClock::new(start_time()));
        let ctx = LedgerContext::new(
            Arc::new(store.clone()),
            Arc::new(directory.clone()),
            Arc::new(directory.clone()),
            config,
        )
        .with_clock(clock.clone());

        Self {
            store,
            directory,
            clock,
            issuer: LotIssuer::new(ctx.clone()),
            engine: TransferEngine::new(ctx.clone()),
            history: HistoryQueryService::new(ctx.clone()),
            alerts: AlertService::new(ctx.clone()),
            ctx,
        }
    }

    /// Mint a lot for `product` as its owner `m1`
    pub async fn mint(&self, product: &str, lot_number: &str, quantity: u32, made: NaiveDate) -> Lot {
        self.issuer
            .create_lot(
                M1,
                CreateLotRequest {
                    product_id: product.to_string(),
                    lot_number: lot_number.to_string(),
                    quantity,
                    manufacture_date: made,
                    expiry_date: None,
                },
            )
            .await
            .unwrap()
    }

    pub async fn stock(&self, org: &str, product: &str) -> u64 {
        self.store.count_in_stock(org, product).await.unwrap()
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}
