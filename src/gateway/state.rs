use std::sync::Arc;

use crate::alert::AlertService;
use crate::context::LedgerContext;
use crate::engine::TransferEngine;
use crate::history::HistoryQueryService;
use crate::lot_issuer::LotIssuer;
use crate::store::LedgerStore;

/// Gateway shared state
pub struct AppState {
    pub lot_issuer: LotIssuer,
    pub engine: TransferEngine,
    pub history: HistoryQueryService,
    pub alerts: AlertService,
    pub store: Arc<dyn LedgerStore>,
    pub jwt_secret: String,
}

impl AppState {
    pub fn new(ctx: LedgerContext, jwt_secret: String) -> Self {
        Self {
            lot_issuer: LotIssuer::new(ctx.clone()),
            engine: TransferEngine::new(ctx.clone()),
            history: HistoryQueryService::new(ctx.clone()),
            alerts: AlertService::new(ctx.clone()),
            store: ctx.store,
            jwt_secret,
        }
    }
}
