//! Organization directory and product catalog
//!
//! Both are owned by surrounding services; the ledger only reads them.
//! `InMemoryDirectory` backs tests and dev mode, `PgDirectory` reads the
//! `organizations` / `products` tables of the shared database.

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::{PgPool, Row};
use std::sync::Arc;

use crate::core_types::{DeactivationReason, OrgId, OrgType, ProductId};
use crate::error::StoreResult;

/// Directory entry for an organization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    pub org_type: OrgType,
    pub is_active: bool,
    /// Default shelf life for lots issued by this organization
    pub expiry_months: Option<u32>,
}

impl Organization {
    pub fn new(id: impl Into<OrgId>, name: impl Into<String>, org_type: OrgType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            org_type,
            is_active: true,
            expiry_months: None,
        }
    }
}

/// Catalog entry for a product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub owner_org_id: OrgId,
    pub is_active: bool,
    pub deactivation_reason: Option<DeactivationReason>,
}

impl Product {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, owner: impl Into<OrgId>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner_org_id: owner.into(),
            is_active: true,
            deactivation_reason: None,
        }
    }
}

#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
    async fn get_organization(&self, id: &str) -> StoreResult<Option<Organization>>;
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get_product(&self, id: &str) -> StoreResult<Option<Product>>;
}

// ============================================================================
// In-memory directory
// ============================================================================

/// Directory and catalog held in concurrent maps
#[derive(Debug, Default, Clone)]
pub struct InMemoryDirectory {
    organizations: Arc<DashMap<OrgId, Organization>>,
    products: Arc<DashMap<ProductId, Product>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_organization(&self, org: Organization) {
        self.organizations.insert(org.id.clone(), org);
    }

    pub fn upsert_product(&self, product: Product) {
        self.products.insert(product.id.clone(), product);
    }

    /// Deactivate a product in the catalog
    pub fn deactivate_product(&self, id: &str, reason: DeactivationReason) -> bool {
        match self.products.get_mut(id) {
            Some(mut product) => {
                product.is_active = false;
                product.deactivation_reason = Some(reason);
                true
            }
            None => false,
        }
    }

    pub fn set_organization_active(&self, id: &str, active: bool) -> bool {
        match self.organizations.get_mut(id) {
            Some(mut org) => {
                org.is_active = active;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl OrganizationDirectory for InMemoryDirectory {
    async fn get_organization(&self, id: &str) -> StoreResult<Option<Organization>> {
        Ok(self.organizations.get(id).map(|o| o.value().clone()))
    }
}

#[async_trait]
impl ProductCatalog for InMemoryDirectory {
    async fn get_product(&self, id: &str) -> StoreResult<Option<Product>> {
        Ok(self.products.get(id).map(|p| p.value().clone()))
    }
}

// ============================================================================
// PostgreSQL directory
// ============================================================================

/// Reads organizations and products maintained by the catalog services
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrganizationDirectory for PgDirectory {
    async fn get_organization(&self, id: &str) -> StoreResult<Option<Organization>> {
        let row = sqlx::query(
            r#"SELECT id, name, org_type, is_active, expiry_months
               FROM organizations WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> StoreResult<Organization> {
            Ok(Organization {
                id: r.try_get("id")?,
                name: r.try_get("name")?,
                org_type: r.try_get::<String, _>("org_type")?.parse()?,
                is_active: r.try_get("is_active")?,
                expiry_months: r
                    .try_get::<Option<i32>, _>("expiry_months")?
                    .map(|m| m.max(0) as u32),
            })
        })
        .transpose()
    }
}

#[async_trait]
impl ProductCatalog for PgDirectory {
    async fn get_product(&self, id: &str) -> StoreResult<Option<Product>> {
        let row = sqlx::query(
            r#"SELECT id, name, owner_org_id, is_active, deactivation_reason
               FROM products WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> StoreResult<Product> {
            let reason: Option<String> = r.try_get("deactivation_reason")?;
            Ok(Product {
                id: r.try_get("id")?,
                name: r.try_get("name")?,
                owner_org_id: r.try_get("owner_org_id")?,
                is_active: r.try_get("is_active")?,
                deactivation_reason: reason.map(|s| s.parse()).transpose()?,
            })
        })
        .transpose()
    }
}
