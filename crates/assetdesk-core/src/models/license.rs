//! Software license domain model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A pool of seats for one software product.
///
/// `used_licenses <= total_licenses` is advisory: the registry records
/// over-allocation rather than rejecting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftwareLicense {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub software_name: String,
    pub vendor: Option<String>,
    pub total_licenses: u32,
    pub used_licenses: u32,
    pub cost_per_license: Option<f64>,
    pub purchase_date: Option<NaiveDate>,
    pub renewal_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SoftwareLicense {
    pub fn available(&self) -> i64 {
        i64::from(self.total_licenses) - i64::from(self.used_licenses)
    }

    pub fn is_over_allocated(&self) -> bool {
        self.used_licenses > self.total_licenses
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLicense {
    pub software_name: String,
    pub vendor: Option<String>,
    pub total_licenses: u32,
    pub used_licenses: u32,
    pub cost_per_license: Option<f64>,
    pub purchase_date: Option<NaiveDate>,
    pub renewal_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateLicense {
    pub software_name: Option<String>,
    pub total_licenses: Option<u32>,
    pub used_licenses: Option<u32>,
    pub cost_per_license: Option<Option<f64>>,
    pub renewal_date: Option<Option<NaiveDate>>,
    pub notes: Option<Option<String>>,
}
