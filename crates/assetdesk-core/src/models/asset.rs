//! Asset domain model.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetType {
    Hardware,
    Software,
    Peripherals,
    Others,
}

impl AssetType {
    pub const ALL: [AssetType; 4] = [
        AssetType::Hardware,
        AssetType::Software,
        AssetType::Peripherals,
        AssetType::Others,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssetType::Hardware => "Hardware",
            AssetType::Software => "Software",
            AssetType::Peripherals => "Peripherals",
            AssetType::Others => "Others",
        }
    }

    /// Case-insensitive parse; also accepts the singular `peripheral`/`other`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "hardware" => Some(AssetType::Hardware),
            "software" => Some(AssetType::Software),
            "peripherals" | "peripheral" => Some(AssetType::Peripherals),
            "others" | "other" => Some(AssetType::Others),
            _ => None,
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum AssetStatus {
    InStock,
    Deployed,
    InRepair,
    Disposed,
}

impl AssetStatus {
    pub const ALL: [AssetStatus; 4] = [
        AssetStatus::InStock,
        AssetStatus::Deployed,
        AssetStatus::InRepair,
        AssetStatus::Disposed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssetStatus::InStock => "in-stock",
            AssetStatus::Deployed => "deployed",
            AssetStatus::InRepair => "in-repair",
            AssetStatus::Disposed => "disposed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();
        match key.as_str() {
            "in-stock" | "instock" | "available" => Some(AssetStatus::InStock),
            "deployed" | "assigned" => Some(AssetStatus::Deployed),
            "in-repair" | "repair" => Some(AssetStatus::InRepair),
            "disposed" | "retired" => Some(AssetStatus::Disposed),
            _ => None,
        }
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub asset_type: AssetType,
    pub status: AssetStatus,
    pub category: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    /// User the asset is assigned to; always a user of the same tenant.
    pub assigned_user_id: Option<Uuid>,
    pub assigned_user_name: Option<String>,
    pub location: Option<String>,
    pub vendor: Option<String>,
    pub company: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_cost: Option<f64>,
    pub warranty_expiry: Option<NaiveDate>,
    /// Annual maintenance contract end.
    pub amc_expiry: Option<NaiveDate>,
    pub software_version: Option<String>,
    pub license_key: Option<String>,
    pub renewal_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateAsset {
    pub name: String,
    pub asset_type: AssetType,
    pub status: AssetStatus,
    pub category: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub assigned_user_id: Option<Uuid>,
    pub assigned_user_name: Option<String>,
    pub location: Option<String>,
    pub vendor: Option<String>,
    pub company: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_cost: Option<f64>,
    pub warranty_expiry: Option<NaiveDate>,
    pub amc_expiry: Option<NaiveDate>,
    pub software_version: Option<String>,
    pub license_key: Option<String>,
    pub renewal_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl CreateAsset {
    /// A minimal asset with every optional field empty.
    pub fn new(name: impl Into<String>, asset_type: AssetType) -> Self {
        Self {
            name: name.into(),
            asset_type,
            status: AssetStatus::InStock,
            category: None,
            manufacturer: None,
            model: None,
            serial_number: None,
            assigned_user_id: None,
            assigned_user_name: None,
            location: None,
            vendor: None,
            company: None,
            purchase_date: None,
            purchase_cost: None,
            warranty_expiry: None,
            amc_expiry: None,
            software_version: None,
            license_key: None,
            renewal_date: None,
            notes: None,
        }
    }
}

/// Partial update. For nullable fields `Some(None)` clears the value.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateAsset {
    pub name: Option<String>,
    pub asset_type: Option<AssetType>,
    pub status: Option<AssetStatus>,
    pub category: Option<Option<String>>,
    pub manufacturer: Option<Option<String>>,
    pub model: Option<Option<String>>,
    pub serial_number: Option<Option<String>>,
    pub assigned_user_id: Option<Option<Uuid>>,
    pub assigned_user_name: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub vendor: Option<Option<String>>,
    pub company: Option<Option<String>>,
    pub purchase_date: Option<Option<NaiveDate>>,
    pub purchase_cost: Option<Option<f64>>,
    pub warranty_expiry: Option<Option<NaiveDate>>,
    pub amc_expiry: Option<Option<NaiveDate>>,
    pub software_version: Option<Option<String>>,
    pub license_key: Option<Option<String>>,
    pub renewal_date: Option<Option<NaiveDate>>,
    pub notes: Option<Option<String>>,
}

/// Filters for asset listings. `search` matches name, serial number,
/// model and assignee name case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct AssetFilter {
    pub asset_type: Option<AssetType>,
    pub status: Option<AssetStatus>,
    pub category: Option<String>,
    pub search: Option<String>,
}

/// One row of the type × status breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetCount {
    pub asset_type: AssetType,
    pub status: AssetStatus,
    pub total: u64,
}
