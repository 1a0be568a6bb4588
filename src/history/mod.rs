//! History Query Service
//!
//! Reads the per-unit ledger and serves it back per organization as
//! deduplicated transactions:
//!
//! 1. rows in the date window that involve the organization are selected,
//! 2. the visibility policy drops rows meant for the other side,
//! 3. rows are grouped by `(event id, action type)`,
//! 4. a keyset cursor on `(created_at DESC, group_key DESC)` cuts the page.
//!
//! Steps 1-4 run inside the store (in SQL for PostgreSQL), which hands back
//! at most one group past the page so `has_more` can be decided here.

pub mod query;
pub mod visibility;

pub use query::{HistoryCursor, HistoryPage, ProductQuantity, TransactionRow, group_key};
pub use visibility::{VisibleSide, actions_for_side, is_visible, visible_side};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::LedgerContext;
use crate::core_types::{ActionType, OrgId, UnitId};
use crate::error::LedgerResult;
use crate::models::HistoryRecord;
use crate::store::HistoryFilter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub organization_id: OrgId,
    /// `None` or an empty list means every action type
    #[serde(default)]
    pub action_types: Option<Vec<ActionType>>,
    /// Defaults to now minus the configured window
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cursor: Option<HistoryCursor>,
    pub limit: u32,
}

impl HistoryQuery {
    pub fn new(organization_id: impl Into<OrgId>, limit: u32) -> Self {
        Self {
            organization_id: organization_id.into(),
            action_types: None,
            start_date: None,
            end_date: None,
            cursor: None,
            limit,
        }
    }
}

pub struct HistoryQueryService {
    ctx: LedgerContext,
}

impl HistoryQueryService {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    pub async fn query_history(&self, query: &HistoryQuery) -> LedgerResult<HistoryPage> {
        let window = Duration::days(self.ctx.config.history_default_window_days);
        let start = query
            .start_date
            .unwrap_or_else(|| self.ctx.clock.now() - window);
        if let Some(end) = query.end_date
            && end < start
        {
            return Ok(HistoryPage::default());
        }
        let filter = HistoryFilter {
            organization_id: query.organization_id.clone(),
            start,
            end: query.end_date,
            action_types: query.action_types.clone().filter(|types| !types.is_empty()),
        };
        let limit = query.limit.clamp(1, self.ctx.config.history_max_page_size.max(1)) as usize;
        let rows = self
            .ctx
            .store
            .fetch_history_page(&filter, query.cursor.as_ref(), limit)
            .await?;
        let fetched = rows.len();
        let page = query::paginate(rows, query.cursor.as_ref(), limit);

        debug!(
            organization_id = %query.organization_id,
            fetched,
            returned = page.rows.len(),
            has_more = page.has_more,
            "History page served"
        );
        Ok(page)
    }

    /// Full trail of one unit, oldest first
    pub async fn unit_history(&self, unit_id: UnitId) -> LedgerResult<Vec<HistoryRecord>> {
        Ok(self.ctx.store.unit_history(unit_id).await?)
    }
}
