//! Core types used throughout the ledger
//!
//! Identifiers, the polymorphic unit owner and the fixed enumerations of the
//! domain. Enum text forms are the values stored in PostgreSQL and sent on
//! the wire, so they are part of the persisted format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Organization ID, issued by the external organization directory.
pub type OrgId = String;

/// Product ID, issued by the external product catalog.
pub type ProductId = String;

/// Virtual code (unit) ID
pub type UnitId = Uuid;

/// Lot ID
pub type LotId = Uuid;

/// Shipment batch ID
pub type BatchId = Uuid;

/// Treatment record ID
pub type TreatmentId = Uuid;

/// Disposal record ID
pub type DisposalId = Uuid;

/// Error returned when parsing an enum from its stored text form fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} value: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// ============================================================================
// Owner
// ============================================================================

/// Owner kind of a virtual code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerType {
    Organization,
    Patient,
}

impl OwnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerType::Organization => "ORGANIZATION",
            OwnerType::Patient => "PATIENT",
        }
    }
}

impl FromStr for OwnerType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ORGANIZATION" => Ok(OwnerType::Organization),
            "PATIENT" => Ok(OwnerType::Patient),
            _ => Err(ParseEnumError::new("owner type", s)),
        }
    }
}

/// Current holder of a unit.
///
/// For `Organization` the id references a directory entry; for `Patient` it
/// is the normalized phone number itself (a natural key, not a row reference).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    #[serde(rename = "type")]
    pub owner_type: OwnerType,
    pub id: String,
}

impl Owner {
    pub fn organization(id: impl Into<String>) -> Self {
        Self {
            owner_type: OwnerType::Organization,
            id: id.into(),
        }
    }

    pub fn patient(phone: impl Into<String>) -> Self {
        Self {
            owner_type: OwnerType::Patient,
            id: phone.into(),
        }
    }

    /// True if this owner is the given organization
    #[inline]
    pub fn is_org(&self, org_id: &str) -> bool {
        self.owner_type == OwnerType::Organization && self.id == org_id
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner_type.as_str(), self.id)
    }
}

// ============================================================================
// Unit status
// ============================================================================

/// Virtual code status. `Used` and `Disposed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    InStock,
    Used,
    Disposed,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::InStock => "IN_STOCK",
            UnitStatus::Used => "USED",
            UnitStatus::Disposed => "DISPOSED",
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitStatus::Used | UnitStatus::Disposed)
    }
}

impl FromStr for UnitStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_STOCK" => Ok(UnitStatus::InStock),
            "USED" => Ok(UnitStatus::Used),
            "DISPOSED" => Ok(UnitStatus::Disposed),
            _ => Err(ParseEnumError::new("unit status", s)),
        }
    }
}

// ============================================================================
// History action type
// ============================================================================

/// Ledger action recorded per unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Produced,
    Shipped,
    Received,
    ReturnSent,
    ReturnReceived,
    Recalled,
    Treated,
    Disposed,
    Returned,
}

impl ActionType {
    pub const ALL: [ActionType; 9] = [
        ActionType::Produced,
        ActionType::Shipped,
        ActionType::Received,
        ActionType::ReturnSent,
        ActionType::ReturnReceived,
        ActionType::Recalled,
        ActionType::Treated,
        ActionType::Disposed,
        ActionType::Returned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Produced => "PRODUCED",
            ActionType::Shipped => "SHIPPED",
            ActionType::Received => "RECEIVED",
            ActionType::ReturnSent => "RETURN_SENT",
            ActionType::ReturnReceived => "RETURN_RECEIVED",
            ActionType::Recalled => "RECALLED",
            ActionType::Treated => "TREATED",
            ActionType::Disposed => "DISPOSED",
            ActionType::Returned => "RETURNED",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("action type", s))
    }
}

// ============================================================================
// Organization type
// ============================================================================

/// Organization role in the supply chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrgType {
    Manufacturer,
    Distributor,
    Hospital,
    Admin,
}

impl OrgType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgType::Manufacturer => "MANUFACTURER",
            OrgType::Distributor => "DISTRIBUTOR",
            OrgType::Hospital => "HOSPITAL",
            OrgType::Admin => "ADMIN",
        }
    }
}

impl FromStr for OrgType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MANUFACTURER" => Ok(OrgType::Manufacturer),
            "DISTRIBUTOR" => Ok(OrgType::Distributor),
            "HOSPITAL" => Ok(OrgType::Hospital),
            "ADMIN" => Ok(OrgType::Admin),
            _ => Err(ParseEnumError::new("organization type", s)),
        }
    }
}

// ============================================================================
// Disposal reason
// ============================================================================

/// Disposal reason category. `Other` requires a free-text reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonType {
    Loss,
    Damage,
    Expired,
    Other,
}

impl ReasonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonType::Loss => "LOSS",
            ReasonType::Damage => "DAMAGE",
            ReasonType::Expired => "EXPIRED",
            ReasonType::Other => "OTHER",
        }
    }
}

impl FromStr for ReasonType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOSS" => Ok(ReasonType::Loss),
            "DAMAGE" => Ok(ReasonType::Damage),
            "EXPIRED" => Ok(ReasonType::Expired),
            "OTHER" => Ok(ReasonType::Other),
            _ => Err(ParseEnumError::new("disposal reason", s)),
        }
    }
}

// ============================================================================
// Inactive product usage
// ============================================================================

/// Kind of operation that touched a deactivated product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageType {
    Shipment,
    Treatment,
}

impl UsageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageType::Shipment => "SHIPMENT",
            UsageType::Treatment => "TREATMENT",
        }
    }
}

impl FromStr for UsageType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SHIPMENT" => Ok(UsageType::Shipment),
            "TREATMENT" => Ok(UsageType::Treatment),
            _ => Err(ParseEnumError::new("usage type", s)),
        }
    }
}

/// Why a product was deactivated in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeactivationReason {
    SafetyIssue,
    QualityIssue,
    Discontinued,
    Other,
}

impl DeactivationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeactivationReason::SafetyIssue => "SAFETY_ISSUE",
            DeactivationReason::QualityIssue => "QUALITY_ISSUE",
            DeactivationReason::Discontinued => "DISCONTINUED",
            DeactivationReason::Other => "OTHER",
        }
    }
}

impl FromStr for DeactivationReason {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SAFETY_ISSUE" => Ok(DeactivationReason::SafetyIssue),
            "QUALITY_ISSUE" => Ok(DeactivationReason::QualityIssue),
            "DISCONTINUED" => Ok(DeactivationReason::Discontinued),
            "OTHER" => Ok(DeactivationReason::Other),
            _ => Err(ParseEnumError::new("deactivation reason", s)),
        }
    }
}

/// Notification intent kind handed to the outbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Certification,
    Recall,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Certification => "CERTIFICATION",
            NotificationType::Recall => "RECALL",
        }
    }
}

impl FromStr for NotificationType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CERTIFICATION" => Ok(NotificationType::Certification),
            "RECALL" => Ok(NotificationType::Recall),
            _ => Err(ParseEnumError::new("notification type", s)),
        }
    }
}
