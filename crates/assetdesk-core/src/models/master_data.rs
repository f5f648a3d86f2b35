//! Tenant-scoped controlled vocabulary used for autocomplete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MasterDataKind {
    Manufacturer,
    Model,
    Category,
    Location,
    Vendor,
    Company,
}

impl MasterDataKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MasterDataKind::Manufacturer => "manufacturer",
            MasterDataKind::Model => "model",
            MasterDataKind::Category => "category",
            MasterDataKind::Location => "location",
            MasterDataKind::Vendor => "vendor",
            MasterDataKind::Company => "company",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "manufacturer" => Some(MasterDataKind::Manufacturer),
            "model" => Some(MasterDataKind::Model),
            "category" => Some(MasterDataKind::Category),
            "location" => Some(MasterDataKind::Location),
            "vendor" => Some(MasterDataKind::Vendor),
            "company" => Some(MasterDataKind::Company),
            _ => None,
        }
    }
}

/// Append-only; duplicate values are the caller's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterDataEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub kind: MasterDataKind,
    pub value: String,
    pub created_at: DateTime<Utc>,
}
