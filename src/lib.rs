//! medtrace - Ownership ledger for serialized medical-device units
//!
//! Every physical unit gets a virtual code when its lot is issued. From then on
//! the ledger records who holds it: manufacturer, distributor, hospital and
//! finally a patient or the disposal bin. Every move is one atomic transaction
//! that changes the owner and appends an audit row per unit.
//!
//! # Modules
//!
//! - [`core_types`] - Ids, owner tagged union, status and action enums
//! - [`models`] - Stored rows (units, lots, batches, treatments, history, alerts)
//! - [`store`] - `LedgerStore` / `LedgerTx` with in-memory and PostgreSQL backends
//! - [`allocator`] - FIFO unit selection
//! - [`lot_issuer`] - Minting a lot of virtual codes
//! - [`engine`] - Shipment, return, recall, treatment, disposal
//! - [`history`] - Grouped, per-organization transaction history
//! - [`alert`] - Inactive-product usage alerts
//! - [`outbox`] - Patient notification delivery
//! - [`gateway`] - HTTP API

// Core types - must be first!
pub mod core_types;

pub mod error;
pub mod models;
pub mod validation;

// Collaborators and persistence
pub mod clock;
pub mod db;
pub mod directory;
pub mod store;

// Ledger components
pub mod alert;
pub mod allocator;
pub mod context;
pub mod engine;
pub mod history;
pub mod lot_issuer;
pub mod outbox;

// Host
pub mod config;
pub mod gateway;
pub mod logging;

// Convenient re-exports at crate root
pub use context::LedgerContext;
pub use core_types::{ActionType, OrgType, Owner, OwnerType, UnitStatus};
pub use engine::TransferEngine;
pub use error::{ErrorCode, LedgerError, LedgerResult};
pub use history::{HistoryQuery, HistoryQueryService};
pub use lot_issuer::LotIssuer;
pub use store::{LedgerStore, MemoryStore, PgStore};
