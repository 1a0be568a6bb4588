//! Shared handles for the ledger services

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::directory::{Organization, OrganizationDirectory, Product, ProductCatalog};
use crate::error::{ErrorCode, LedgerError, LedgerResult};
use crate::store::LedgerStore;

/// Everything a ledger service needs: the store, the consumed directories,
/// a clock and the ledger configuration
#[derive(Clone)]
pub struct LedgerContext {
    pub store: Arc<dyn LedgerStore>,
    pub directory: Arc<dyn OrganizationDirectory>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub clock: Arc<dyn Clock>,
    pub config: LedgerConfig,
}

impl LedgerContext {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        directory: Arc<dyn OrganizationDirectory>,
        catalog: Arc<dyn ProductCatalog>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            store,
            directory,
            catalog,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) async fn organization(&self, id: &str) -> LedgerResult<Option<Organization>> {
        Ok(self.directory.get_organization(id).await?)
    }

    pub(crate) async fn product(&self, id: &str) -> LedgerResult<Option<Product>> {
        Ok(self.catalog.get_product(id).await?)
    }

    /// Resolve the caller and require an active organization of the given type
    pub(crate) async fn require_org_type(
        &self,
        id: &str,
        org_type: crate::core_types::OrgType,
    ) -> LedgerResult<Organization> {
        match self.organization(id).await? {
            Some(org) if org.is_active && org.org_type == org_type => Ok(org),
            _ => Err(ErrorCode::Forbidden.into()),
        }
    }

    /// Run one ledger operation under the configured transaction timeout.
    ///
    /// The operation owns its transaction; on timeout the future is dropped,
    /// which rolls the transaction back. Callers must treat `Timeout` as an
    /// unknown outcome.
    pub(crate) async fn guarded<T, F>(&self, op: &'static str, fut: F) -> LedgerResult<T>
    where
        F: Future<Output = LedgerResult<T>>,
    {
        let limit = Duration::from_millis(self.config.transaction_timeout_ms);
        let result = match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout),
        };

        if let Err(e) = &result {
            match e {
                LedgerError::Rejected(code) => warn!(op, code = %code, "Operation rejected"),
                LedgerError::Timeout => error!(
                    op,
                    timeout_ms = self.config.transaction_timeout_ms,
                    "Transaction timed out, outcome unknown"
                ),
                _ => error!(op, error = %e, "Operation failed"),
            }
        }
        result
    }
}

impl std::fmt::Debug for LedgerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
