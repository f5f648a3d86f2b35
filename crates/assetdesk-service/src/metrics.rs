//! Read-only dashboard snapshot for one tenant.
//!
//! The store reads are independent and run concurrently; if any of them
//! fails the whole snapshot fails. All date arithmetic is done against the
//! clock at call time.

use std::sync::Arc;

use assetdesk_core::error::RegistryResult;
use assetdesk_core::models::asset::{Asset, AssetCount, AssetStatus, AssetType};
use assetdesk_core::models::audit::{AuditLogEntry, AuditOutcome};
use assetdesk_core::models::license::SoftwareLicense;
use assetdesk_core::models::ticket::{TicketStatus, TicketStatusCount};
use assetdesk_core::repository::{
    AssetRepository, AuditLogFilter, AuditLogRepository, LicenseRepository, Pagination,
    TicketRepository,
};
use assetdesk_core::{Clock, TenantScope};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;

const RECENT_ACTIVITY_LIMIT: u64 = 10;
const AGING_YEARS: u32 = 3;
const OLD_YEARS: u32 = 5;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TypeBreakdown {
    pub asset_type: AssetType,
    pub total: u64,
    pub in_stock: u64,
    pub deployed: u64,
    pub in_repair: u64,
    pub disposed: u64,
}

/// Dates falling due within the look-ahead window, or already past.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct ExpiryWindow {
    pub expiring_soon: u64,
    pub expired: u64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct LicenseUtilization {
    pub products: u64,
    pub total_seats: u64,
    pub used_seats: u64,
    /// `used / total * 100`, 0 when no seats exist.
    pub utilization_percent: f64,
    pub renewals: ExpiryWindow,
    pub over_allocated: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct TicketFunnel {
    pub open: u64,
    pub in_progress: u64,
    pub resolved: u64,
    pub closed: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct UnusedInventory {
    pub in_stock_hardware: u64,
    pub under_allocated_licenses: u64,
    pub free_seats: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct AgeBucket {
    pub count: u64,
    /// Sum of the known purchase costs in the bucket.
    pub replacement_cost: f64,
}

impl AgeBucket {
    fn add(&mut self, asset: &Asset) {
        self.count += 1;
        self.replacement_cost += asset.purchase_cost.unwrap_or(0.0);
    }
}

/// Non-software assets by age since purchase.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct AgeBuckets {
    /// Younger than three years.
    pub new: AgeBucket,
    /// Three to five years.
    pub aging: AgeBucket,
    /// Five years or more.
    pub old: AgeBucket,
    /// No purchase date recorded.
    pub undated: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecentActivity {
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub actor: Option<String>,
    pub outcome: AuditOutcome,
    pub timestamp: DateTime<Utc>,
    pub relative_time: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub tenant_id: uuid::Uuid,
    pub generated_at: DateTime<Utc>,
    pub assets_by_type: Vec<TypeBreakdown>,
    pub warranty: ExpiryWindow,
    pub amc: ExpiryWindow,
    pub licenses: LicenseUtilization,
    pub tickets: TicketFunnel,
    pub unused: UnusedInventory,
    pub age: AgeBuckets,
    pub recent_activity: Vec<RecentActivity>,
}

/// Whole years from `from` to `to`; 0 when `from` is in the future.
fn full_years(from: NaiveDate, to: NaiveDate) -> u32 {
    if from >= to {
        return 0;
    }
    let mut years = to.year() - from.year();
    if (to.month(), to.day()) < (from.month(), from.day()) {
        years -= 1;
    }
    u32::try_from(years).unwrap_or(0)
}

/// Count `dates` that are past `today` or fall within `window_days` of it.
pub fn expiry_window(
    dates: impl IntoIterator<Item = NaiveDate>,
    today: NaiveDate,
    window_days: i64,
) -> ExpiryWindow {
    let horizon = today + Duration::days(window_days);
    dates
        .into_iter()
        .fold(ExpiryWindow::default(), |mut acc, date| {
            if date < today {
                acc.expired += 1;
            } else if date <= horizon {
                acc.expiring_soon += 1;
            }
            acc
        })
}

/// Human-readable distance from `then` to `now`: `just now`, `42s ago`,
/// `3m ago`, `5h ago`, `2d ago`.
pub fn relative_label(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    match secs {
        s if s < 10 => "just now".to_string(),
        s if s < 60 => format!("{s}s ago"),
        s if s < 3_600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3_600),
        s => format!("{}d ago", s / 86_400),
    }
}

pub fn type_breakdown(counts: &[AssetCount]) -> Vec<TypeBreakdown> {
    AssetType::ALL
        .iter()
        .map(|&asset_type| {
            let mut row = TypeBreakdown {
                asset_type,
                total: 0,
                in_stock: 0,
                deployed: 0,
                in_repair: 0,
                disposed: 0,
            };
            for c in counts.iter().filter(|c| c.asset_type == asset_type) {
                row.total += c.total;
                match c.status {
                    AssetStatus::InStock => row.in_stock += c.total,
                    AssetStatus::Deployed => row.deployed += c.total,
                    AssetStatus::InRepair => row.in_repair += c.total,
                    AssetStatus::Disposed => row.disposed += c.total,
                }
            }
            row
        })
        .collect()
}

pub fn license_utilization(
    licenses: &[SoftwareLicense],
    today: NaiveDate,
    window_days: i64,
) -> LicenseUtilization {
    let total_seats: u64 = licenses.iter().map(|l| u64::from(l.total_licenses)).sum();
    let used_seats: u64 = licenses.iter().map(|l| u64::from(l.used_licenses)).sum();
    let utilization_percent = if total_seats == 0 {
        0.0
    } else {
        used_seats as f64 * 100.0 / total_seats as f64
    };
    LicenseUtilization {
        products: licenses.len() as u64,
        total_seats,
        used_seats,
        utilization_percent,
        renewals: expiry_window(
            licenses.iter().filter_map(|l| l.renewal_date),
            today,
            window_days,
        ),
        over_allocated: licenses.iter().filter(|l| l.is_over_allocated()).count() as u64,
    }
}

pub fn ticket_funnel(counts: &[TicketStatusCount]) -> TicketFunnel {
    counts.iter().fold(TicketFunnel::default(), |mut f, c| {
        match c.status {
            TicketStatus::Open => f.open += c.total,
            TicketStatus::InProgress => f.in_progress += c.total,
            TicketStatus::Resolved => f.resolved += c.total,
            TicketStatus::Closed => f.closed += c.total,
        }
        f.total += c.total;
        f
    })
}

pub fn unused_inventory(assets: &[Asset], licenses: &[SoftwareLicense]) -> UnusedInventory {
    let under: Vec<_> = licenses.iter().filter(|l| l.available() > 0).collect();
    UnusedInventory {
        in_stock_hardware: assets
            .iter()
            .filter(|a| a.asset_type == AssetType::Hardware && a.status == AssetStatus::InStock)
            .count() as u64,
        under_allocated_licenses: under.len() as u64,
        free_seats: under.iter().map(|l| l.available().unsigned_abs()).sum(),
    }
}

pub fn age_buckets(assets: &[Asset], today: NaiveDate) -> AgeBuckets {
    let mut buckets = AgeBuckets::default();
    for asset in assets.iter().filter(|a| a.asset_type != AssetType::Software) {
        let Some(purchased) = asset.purchase_date else {
            buckets.undated += 1;
            continue;
        };
        match full_years(purchased, today) {
            y if y >= OLD_YEARS => buckets.old.add(asset),
            y if y >= AGING_YEARS => buckets.aging.add(asset),
            _ => buckets.new.add(asset),
        }
    }
    buckets
}

fn recent_activity(entries: Vec<AuditLogEntry>, now: DateTime<Utc>) -> Vec<RecentActivity> {
    entries
        .into_iter()
        .map(|e| RecentActivity {
            relative_time: relative_label(e.timestamp, now),
            action: e.action,
            resource_type: e.resource_type,
            resource_id: e.resource_id,
            actor: e.actor.email,
            outcome: e.outcome,
            timestamp: e.timestamp,
        })
        .collect()
}

/// Builds [`DashboardSnapshot`]s from the registry's repositories.
pub struct MetricsAggregator<R, L, T, A>
where
    R: AssetRepository,
    L: LicenseRepository,
    T: TicketRepository,
    A: AuditLogRepository,
{
    assets: R,
    licenses: L,
    tickets: T,
    audit: A,
    clock: Arc<dyn Clock>,
    window_days: i64,
}

impl<R, L, T, A> MetricsAggregator<R, L, T, A>
where
    R: AssetRepository,
    L: LicenseRepository,
    T: TicketRepository,
    A: AuditLogRepository,
{
    pub fn new(
        assets: R,
        licenses: L,
        tickets: T,
        audit: A,
        clock: Arc<dyn Clock>,
        window_days: i64,
    ) -> Self {
        Self {
            assets,
            licenses,
            tickets,
            audit,
            clock,
            window_days,
        }
    }

    pub async fn snapshot(&self, scope: TenantScope) -> RegistryResult<DashboardSnapshot> {
        let (counts, assets, licenses, ticket_counts, recent) = tokio::try_join!(
            self.assets.count_by_type_and_status(scope),
            self.assets.list_all(scope),
            self.licenses.list_all(scope),
            self.tickets.count_by_status(scope),
            self.audit.list(
                scope,
                AuditLogFilter::default(),
                Pagination {
                    offset: 0,
                    limit: RECENT_ACTIVITY_LIMIT,
                },
            ),
        )?;

        let now = self.clock.now();
        let today = now.date_naive();
        let hardware: Vec<&Asset> = assets
            .iter()
            .filter(|a| a.asset_type == AssetType::Hardware)
            .collect();

        debug!(
            tenant_id = %scope,
            assets = assets.len(),
            licenses = licenses.len(),
            "building dashboard snapshot"
        );

        Ok(DashboardSnapshot {
            tenant_id: scope.tenant_id(),
            generated_at: now,
            assets_by_type: type_breakdown(&counts),
            warranty: expiry_window(
                hardware.iter().filter_map(|a| a.warranty_expiry),
                today,
                self.window_days,
            ),
            amc: expiry_window(
                hardware.iter().filter_map(|a| a.amc_expiry),
                today,
                self.window_days,
            ),
            licenses: license_utilization(&licenses, today, self.window_days),
            tickets: ticket_funnel(&ticket_counts),
            unused: unused_inventory(&assets, &licenses),
            age: age_buckets(&assets, today),
            recent_activity: recent_activity(recent.items, now),
        })
    }
}
