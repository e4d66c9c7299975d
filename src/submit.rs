use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::api::{ArchiveApi, Session};
use crate::catalog::EnumCatalog;
use crate::config::Settings;
use crate::domain::{
    ObjectKind, PackageKind, RemoteValidationError, SUBMITTED_STATE, Trackable, ValidationError,
};
use crate::error::BiosubError;
use crate::ledger;
use crate::package::{Package, PrimaryObject};
use crate::transfer::{TransferEndpoint, remote_check};
use crate::validate::validate;

/// Final classification of one package after a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageOutcome {
    Submitted,
    SkippedAlreadySubmitted,
    SkippedValidationErrors,
    DroppedMalformed,
    DroppedRemoteCheckFailed,
    Failed,
}

/// Per-package outcome plus every accumulated finding, for diagnostic
/// reporting. The batch never silently loses a package.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageReport {
    pub directory: String,
    pub outcome: PackageOutcome,
    pub local_errors: Vec<ValidationError>,
    pub remote_errors: Vec<RemoteValidationError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub packages: Vec<PackageReport>,
}

impl BatchReport {
    pub fn outcome_count(&self, outcome: PackageOutcome) -> usize {
        self.packages
            .iter()
            .filter(|package| package.outcome == outcome)
            .count()
    }
}

/// Drives a batch of package directories through
/// load → validate → remote check → eligibility → submit → record,
/// isolating failures per package. Login and catalog fetch happen once per
/// batch and are fatal when they fail.
pub struct Submitter<A, T> {
    api: A,
    transfer: T,
    settings: Settings,
}

impl<A: ArchiveApi, T: TransferEndpoint> Submitter<A, T> {
    pub fn new(api: A, transfer: T, settings: Settings) -> Self {
        Self {
            api,
            transfer,
            settings,
        }
    }

    pub fn run(
        &self,
        dirs: &[Utf8PathBuf],
        kind: PackageKind,
        dry_run: bool,
    ) -> Result<BatchReport, BiosubError> {
        info!("logging in to the archive");
        let session = self.api.login(&self.settings)?;

        let catalog = match EnumCatalog::fetch(&self.api) {
            Ok(catalog) => catalog,
            Err(err) => {
                self.logout(&session);
                return Err(err);
            }
        };

        let mut report = BatchReport::default();
        let mut eligible = Vec::new();

        for dir in dirs {
            info!(directory = %dir, "start processing package");

            let mut package = match Package::load(dir, kind) {
                Ok(package) => package,
                Err(err) => {
                    error!(directory = %dir, %err, "dropping malformed package");
                    report.packages.push(PackageReport {
                        directory: dir.to_string(),
                        outcome: PackageOutcome::DroppedMalformed,
                        local_errors: Vec::new(),
                        remote_errors: Vec::new(),
                        message: Some(err.to_string()),
                    });
                    continue;
                }
            };

            validate(&mut package, &catalog);

            if let Err(err) = remote_check(&mut package, &self.transfer) {
                error!(
                    directory = %dir, %err,
                    "remote file check failed, make sure the data files were uploaded"
                );
                report.packages.push(package_report(
                    &package,
                    PackageOutcome::DroppedRemoteCheckFailed,
                    Some(err.to_string()),
                ));
                continue;
            }

            for finding in &package.local_errors {
                error!(directory = %dir, %finding, "local validation error");
            }
            for finding in &package.remote_errors {
                error!(directory = %dir, %finding, "remote file validation error");
            }

            if package.status() == SUBMITTED_STATE {
                info!(directory = %dir, "skipping, already submitted");
                report.packages.push(package_report(
                    &package,
                    PackageOutcome::SkippedAlreadySubmitted,
                    None,
                ));
            } else if !package.local_errors.is_empty() {
                info!(directory = %dir, "skipping, failed validation");
                report.packages.push(package_report(
                    &package,
                    PackageOutcome::SkippedValidationErrors,
                    None,
                ));
            } else {
                eligible.push(package);
            }
        }

        if eligible.is_empty() {
            warn!("nothing to submit");
        }

        for mut package in eligible {
            let directory = package.path.to_string();
            match self.submit_package(&session, &mut package, dry_run) {
                Ok(()) => {
                    info!(directory = %directory, dry_run, "package submitted");
                    report
                        .packages
                        .push(package_report(&package, PackageOutcome::Submitted, None));
                }
                Err(err) => {
                    error!(directory = %directory, %err, "submission failed");
                    report.packages.push(package_report(
                        &package,
                        PackageOutcome::Failed,
                        Some(err.to_string()),
                    ));
                }
            }
        }

        self.logout(&session);
        Ok(report)
    }

    fn logout(&self, session: &Session) {
        info!("logging out the archive session");
        if let Err(err) = self.api.logout(session) {
            warn!(%err, "logout failed");
        }
    }

    /// Submit the package's objects in dependency order: sample first, then
    /// the analysis, or the experiment followed by its run. Objects already
    /// in the terminal state are not re-submitted, which lets a partially
    /// failed package resume on the next invocation.
    fn submit_package(
        &self,
        session: &Session,
        package: &mut Package,
        dry_run: bool,
    ) -> Result<(), BiosubError> {
        let dir = package.path.clone();
        self.submit_object(session, &dir, &mut package.sample, dry_run)?;
        match &mut package.primary {
            PrimaryObject::Analysis(analysis) => {
                self.submit_object(session, &dir, analysis, dry_run)?;
            }
            PrimaryObject::Sequencing { experiment, run } => {
                self.submit_object(session, &dir, experiment, dry_run)?;
                self.submit_object(session, &dir, run, dry_run)?;
            }
        }
        Ok(())
    }

    fn submit_object<O: Trackable + Serialize>(
        &self,
        session: &Session,
        package_dir: &Utf8Path,
        object: &mut O,
        dry_run: bool,
    ) -> Result<(), BiosubError> {
        if object.state() == SUBMITTED_STATE {
            info!(kind = %object.kind(), alias = object.alias(), "already submitted, skipping");
            return Ok(());
        }

        let payload = serde_json::to_value(&*object).map_err(|err| BiosubError::Submission {
            kind: object.kind().as_str().to_string(),
            message: err.to_string(),
        })?;
        let receipt = self
            .api
            .submit_object(session, &payload, object.kind(), dry_run)?;

        if dry_run {
            // A dry run must leave no trace, a later real run still sees
            // the pre-submission state through the ledger.
            info!(kind = %object.kind(), alias = object.alias(), "dry run accepted");
            return Ok(());
        }

        object.set_remote_id(receipt.id);
        object.set_state(receipt.state);
        ledger::record(package_dir, object)?;
        Ok(())
    }
}

/// Last recorded ledger state of one object kind in a package directory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStatus {
    pub kind: ObjectKind,
    pub id: String,
    pub alias: String,
    pub state: String,
    pub recorded_at: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryStatus {
    pub directory: String,
    pub objects: Vec<ObjectStatus>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub packages: Vec<DirectoryStatus>,
}

/// Read-only report over the ledgers of the given package directories.
pub fn status_report(dirs: &[Utf8PathBuf]) -> StatusReport {
    let kinds = [
        ObjectKind::Sample,
        ObjectKind::Analysis,
        ObjectKind::Experiment,
        ObjectKind::Run,
    ];
    let mut report = StatusReport::default();
    for dir in dirs {
        let objects = kinds
            .iter()
            .filter_map(|kind| {
                ledger::latest(dir, kind.as_str()).map(|record| ObjectStatus {
                    kind: *kind,
                    id: record.id,
                    alias: record.alias,
                    state: record.state,
                    recorded_at: record.recorded_at,
                })
            })
            .collect();
        report.packages.push(DirectoryStatus {
            directory: dir.to_string(),
            objects,
        });
    }
    report
}

fn package_report(
    package: &Package,
    outcome: PackageOutcome,
    message: Option<String>,
) -> PackageReport {
    PackageReport {
        directory: package.path.to_string(),
        outcome,
        local_errors: package.local_errors.clone(),
        remote_errors: package.remote_errors.clone(),
        message,
    }
}
