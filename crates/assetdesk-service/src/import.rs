//! Bulk asset import.
//!
//! Every row is validated independently so the caller always gets a
//! complete report; invalid rows are an ordinary outcome, not an error.
//! Only the request-level ceilings (row count, file size) fail the call.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use assetdesk_core::TenantScope;
use assetdesk_core::error::{FieldIssue, RegistryResult};
use assetdesk_core::models::asset::{AssetStatus, AssetType, CreateAsset};
use assetdesk_core::repository::{AssetRepository, AuditLogRepository, UserRepository};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::audit::{AuditContext, AuditEvent, AuditLogger};
use crate::config::ServiceConfig;
use crate::error::ServiceError;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ImportMode {
    /// Report only; nothing is written.
    ValidateOnly,
    /// Insert the valid rows, skip the rest.
    Partial,
    /// Insert only if every row is valid.
    Atomic,
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImportMode::ValidateOnly => "validateOnly",
            ImportMode::Partial => "partial",
            ImportMode::Atomic => "atomic",
        })
    }
}

/// Rows parsed upstream from a spreadsheet or CSV file.
#[derive(Debug, Clone, Default)]
pub struct ImportBatch {
    /// Size of the uploaded file.
    pub byte_size: u64,
    /// Column header to raw cell text, one map per data row.
    pub rows: Vec<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum RowValidation {
    Valid(CreateAsset),
    Invalid(Vec<FieldIssue>),
}

impl RowValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, RowValidation::Valid(_))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RowReport {
    /// 1-based position of the row in the batch.
    pub row_number: usize,
    pub validation: RowValidation,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct ImportSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub inserted: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub mode: ImportMode,
    pub summary: ImportSummary,
    pub rows: Vec<RowReport>,
}

impl ImportReport {
    /// Only the rows that failed validation, with their issues.
    pub fn issues(&self) -> Vec<(usize, &[FieldIssue])> {
        self.rows
            .iter()
            .filter_map(|r| match &r.validation {
                RowValidation::Invalid(issues) => Some((r.row_number, issues.as_slice())),
                RowValidation::Valid(_) => None,
            })
            .collect()
    }
}

/// Header text to a canonical column key: `Serial Number` -> `serial_number`.
fn column_key(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

struct Row(BTreeMap<String, String>);

impl Row {
    fn new(raw: &BTreeMap<String, String>) -> Self {
        Self(
            raw.iter()
                .map(|(k, v)| (column_key(k), v.trim().to_string()))
                .filter(|(_, v)| !v.is_empty())
                .collect(),
        )
    }

    /// First non-blank cell among `names`.
    fn cell(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .find_map(|n| self.0.get(*n))
            .map(String::as_str)
    }

    fn text(&self, names: &[&str]) -> Option<String> {
        self.cell(names).map(str::to_string)
    }

    fn date(&self, field: &str, issues: &mut Vec<FieldIssue>) -> Option<NaiveDate> {
        let raw = self.cell(&[field])?;
        match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
            Ok(date) => Some(date),
            Err(_) => {
                issues.push(FieldIssue::invalid_format(
                    field,
                    format!("{field} must be YYYY-MM-DD, got {raw:?}"),
                ));
                None
            }
        }
    }
}

/// Well-formed assignee ids referenced anywhere in the batch.
fn referenced_assignees(rows: &[BTreeMap<String, String>]) -> BTreeSet<Uuid> {
    rows.iter()
        .filter_map(|raw| {
            Row::new(raw)
                .cell(&["assigned_user_id"])
                .and_then(|id| Uuid::parse_str(id).ok())
        })
        .collect()
}

/// Validate one row into an asset or the full list of its problems.
/// An assignee must be one of `known_users`.
pub fn validate_row(raw: &BTreeMap<String, String>, known_users: &BTreeSet<Uuid>) -> RowValidation {
    let row = Row::new(raw);
    let mut issues = Vec::new();

    let name = row.text(&["name", "asset_name"]);
    if name.is_none() {
        issues.push(FieldIssue::missing("name"));
    }

    let asset_type = match row.cell(&["type", "asset_type"]) {
        None => {
            issues.push(FieldIssue::missing("type"));
            None
        }
        Some(raw) => {
            let parsed = AssetType::parse(raw);
            if parsed.is_none() {
                issues.push(FieldIssue::invalid_value(
                    "type",
                    format!("unknown asset type {raw:?}"),
                ));
            }
            parsed
        }
    };

    let status = match row.cell(&["status"]) {
        None => AssetStatus::InStock,
        Some(raw) => AssetStatus::parse(raw).unwrap_or_else(|| {
            issues.push(FieldIssue::invalid_value(
                "status",
                format!("unknown status {raw:?}"),
            ));
            AssetStatus::InStock
        }),
    };

    let purchase_date = row.date("purchase_date", &mut issues);
    let warranty_expiry = row.date("warranty_expiry", &mut issues);
    let amc_expiry = row.date("amc_expiry", &mut issues);
    let renewal_date = row.date("renewal_date", &mut issues);

    let purchase_cost = row.cell(&["purchase_cost", "cost"]).and_then(|raw| {
        match raw.replace(',', "").parse::<f64>() {
            Ok(cost) if cost.is_finite() && cost >= 0.0 => Some(cost),
            Ok(_) => {
                issues.push(FieldIssue::invalid_value(
                    "purchase_cost",
                    "purchase_cost must not be negative",
                ));
                None
            }
            Err(_) => {
                issues.push(FieldIssue::invalid_format(
                    "purchase_cost",
                    format!("purchase_cost must be a number, got {raw:?}"),
                ));
                None
            }
        }
    });

    let assigned_user_id = row
        .cell(&["assigned_user_id"])
        .and_then(|raw| match Uuid::parse_str(raw) {
            Ok(id) if known_users.contains(&id) => Some(id),
            Ok(_) => {
                issues.push(FieldIssue::invalid_value("assigned_user_id", "unknown user"));
                None
            }
            Err(_) => {
                issues.push(FieldIssue::invalid_format(
                    "assigned_user_id",
                    format!("assigned_user_id must be a UUID, got {raw:?}"),
                ));
                None
            }
        });

    let serial_number = row.text(&["serial_number", "serial"]);
    let license_key = row.text(&["license_key"]);
    match asset_type {
        Some(AssetType::Hardware) if serial_number.is_none() => {
            issues.push(FieldIssue::missing("serial_number"));
        }
        Some(AssetType::Software) if license_key.is_none() => {
            issues.push(FieldIssue::missing("license_key"));
        }
        _ => {}
    }

    match (name, asset_type) {
        (Some(name), Some(asset_type)) if issues.is_empty() => RowValidation::Valid(CreateAsset {
            status,
            category: row.text(&["category"]),
            manufacturer: row.text(&["manufacturer", "make"]),
            model: row.text(&["model"]),
            serial_number,
            assigned_user_id,
            assigned_user_name: row.text(&["assigned_user_name", "assigned_to"]),
            location: row.text(&["location"]),
            vendor: row.text(&["vendor"]),
            company: row.text(&["company"]),
            purchase_date,
            purchase_cost,
            warranty_expiry,
            amc_expiry,
            software_version: row.text(&["software_version", "version"]),
            license_key,
            renewal_date,
            notes: row.text(&["notes"]),
            ..CreateAsset::new(name, asset_type)
        }),
        _ => RowValidation::Invalid(issues),
    }
}

/// Validates batches and writes the accepted rows in one transaction.
pub struct BulkImportEngine<R: AssetRepository, U: UserRepository, A: AuditLogRepository> {
    assets: R,
    users: U,
    audit: AuditLogger<A>,
    config: ServiceConfig,
}

impl<R: AssetRepository, U: UserRepository, A: AuditLogRepository> BulkImportEngine<R, U, A> {
    pub fn new(assets: R, users: U, audit: AuditLogger<A>, config: ServiceConfig) -> Self {
        Self {
            assets,
            users,
            audit,
            config,
        }
    }

    fn check_limits(&self, batch: &ImportBatch) -> Result<(), ServiceError> {
        if batch.byte_size > self.config.max_import_bytes {
            return Err(ServiceError::FileTooLarge {
                bytes: batch.byte_size,
                limit: self.config.max_import_bytes,
            });
        }
        if batch.rows.len() > self.config.max_import_rows {
            return Err(ServiceError::TooManyRows {
                rows: batch.rows.len(),
                limit: self.config.max_import_rows,
            });
        }
        Ok(())
    }

    /// Validate `batch` and, depending on `mode`, insert its valid rows.
    pub async fn import(
        &self,
        ctx: &AuditContext,
        scope: TenantScope,
        batch: ImportBatch,
        mode: ImportMode,
    ) -> RegistryResult<ImportReport> {
        self.check_limits(&batch)?;
        let known_users = self
            .users
            .existing_ids(scope, referenced_assignees(&batch.rows))
            .await?;

        let rows: Vec<RowReport> = batch
            .rows
            .iter()
            .enumerate()
            .map(|(i, raw)| RowReport {
                row_number: i + 1,
                validation: validate_row(raw, &known_users),
            })
            .collect();

        let valid = rows.iter().filter(|r| r.validation.is_valid()).count();
        let mut summary = ImportSummary {
            total: rows.len(),
            valid,
            invalid: rows.len() - valid,
            inserted: 0,
        };

        let write = match mode {
            ImportMode::ValidateOnly => false,
            ImportMode::Partial => summary.valid > 0,
            ImportMode::Atomic => summary.invalid == 0 && summary.valid > 0,
        };

        if write {
            let accepted: Vec<CreateAsset> = rows
                .iter()
                .filter_map(|r| match &r.validation {
                    RowValidation::Valid(asset) => Some(asset.clone()),
                    RowValidation::Invalid(_) => None,
                })
                .collect();
            let inserted = self.assets.create_bulk(scope, accepted).await?;
            summary.inserted = inserted.len();

            self.audit
                .record(
                    ctx,
                    AuditEvent::new("asset.bulk_import", "asset").after(&serde_json::json!({
                        "mode": mode.to_string(),
                        "summary": summary,
                    })),
                )
                .await;
        }

        info!(
            tenant_id = %scope,
            %mode,
            total = summary.total,
            valid = summary.valid,
            invalid = summary.invalid,
            inserted = summary.inserted,
            "asset import processed"
        );

        Ok(ImportReport {
            mode,
            summary,
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use assetdesk_core::error::IssueKind;

    use super::*;

    fn row(cells: &[(&str, &str)]) -> BTreeMap<String, String> {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn validate(raw: &BTreeMap<String, String>) -> RowValidation {
        validate_row(raw, &BTreeSet::new())
    }

    fn issues(validation: RowValidation) -> Vec<FieldIssue> {
        match validation {
            RowValidation::Invalid(issues) => issues,
            RowValidation::Valid(asset) => panic!("expected invalid row, got {asset:?}"),
        }
    }

    #[test]
    fn complete_hardware_row_is_valid() {
        let validation = validate(&row(&[
            ("Name", "Dev laptop"),
            ("Type", "hardware"),
            ("Serial Number", "SN-1"),
            ("Status", "deployed"),
            ("Purchase Date", "2021-03-15"),
            ("Purchase Cost", "1,299.50"),
            ("Location", "  "),
        ]));
        match validation {
            RowValidation::Valid(asset) => {
                assert_eq!(asset.name, "Dev laptop");
                assert_eq!(asset.asset_type, AssetType::Hardware);
                assert_eq!(asset.status, AssetStatus::Deployed);
                assert_eq!(asset.purchase_date, NaiveDate::from_ymd_opt(2021, 3, 15));
                assert_eq!(asset.purchase_cost, Some(1299.5));
                assert_eq!(asset.location, None);
            }
            RowValidation::Invalid(issues) => panic!("unexpected issues {issues:?}"),
        }
    }

    #[test]
    fn every_problem_in_a_row_is_reported() {
        let issues = issues(validate(&row(&[
            ("type", "Hardware"),
            ("purchase_date", "15/03/2021"),
            ("purchase_cost", "-5"),
            ("assigned_user_id", "bob"),
        ])));
        let fields: Vec<_> = issues.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "name",
                "purchase_date",
                "purchase_cost",
                "assigned_user_id",
                "serial_number"
            ]
        );
        assert_eq!(issues[0].kind, IssueKind::Missing);
        assert_eq!(issues[1].kind, IssueKind::InvalidFormat);
        assert_eq!(issues[2].kind, IssueKind::InvalidValue);
    }

    #[test]
    fn software_needs_a_license_key() {
        let issues = issues(validate(&row(&[("name", "Office"), ("type", "Software")])));
        assert_eq!(issues, vec![FieldIssue::missing("license_key")]);

        assert!(
            validate(&row(&[
                ("name", "Office"),
                ("type", "Software"),
                ("license_key", "XXXX-YYYY"),
            ]))
            .is_valid()
        );
    }

    #[test]
    fn unknown_type_and_status_are_invalid_values() {
        let issues = issues(validate(&row(&[
            ("name", "Thing"),
            ("type", "furniture"),
            ("status", "lost"),
        ])));
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.kind == IssueKind::InvalidValue));
    }

    #[test]
    fn assignee_must_be_a_known_user() {
        let known = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let cells = |id: Uuid| {
            row(&[
                ("name", "Dock"),
                ("type", "Peripherals"),
                ("assigned_user_id", &id.to_string()),
            ])
        };
        let users = BTreeSet::from([known]);

        match validate_row(&cells(known), &users) {
            RowValidation::Valid(asset) => assert_eq!(asset.assigned_user_id, Some(known)),
            RowValidation::Invalid(issues) => panic!("unexpected issues {issues:?}"),
        }
        let issues = issues(validate_row(&cells(stranger), &users));
        assert_eq!(
            issues,
            vec![FieldIssue::invalid_value("assigned_user_id", "unknown user")]
        );
        assert_eq!(referenced_assignees(&[cells(known), cells(stranger)]).len(), 2);
    }

    #[test]
    fn mode_names_render_in_camel_case() {
        assert_eq!(ImportMode::ValidateOnly.to_string(), "validateOnly");
        assert_eq!(ImportMode::Partial.to_string(), "partial");
    }
}
