use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use siteswap_core::{RemoteError, RemotePath, StepOutcome, SwapConfig};
use siteswap_remote::RemoteTreeClient;

use crate::backup::{ensure_backup_location, preserve_files, restore_files};
use crate::{
    delete_tree, BackupLocation, DecisionPoint, DecisionProvider, MaintenanceFiles,
    RelocationReport, StepReporter, StepSequencer, WorkflowError, WorkflowStep,
};

/// How far the remote store has been changed by the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SwapPhase {
    Untouched,
    BackupPrepared,
    MaintenanceMode,
    Staged,
    /// The live root is missing its sites directory.
    SitesRelocated,
    /// Nothing is live at the site root.
    OldRootVacated,
    Live,
}

impl SwapPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Untouched => "untouched",
            Self::BackupPrepared => "backup_prepared",
            Self::MaintenanceMode => "maintenance_mode",
            Self::Staged => "staged",
            Self::SitesRelocated => "sites_relocated",
            Self::OldRootVacated => "old_root_vacated",
            Self::Live => "live",
        }
    }

    pub fn in_swap_window(self) -> bool {
        matches!(self, Self::SitesRelocated | Self::OldRootVacated)
    }
}

impl fmt::Display for SwapPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Working state of one run. Never persisted.
#[derive(Debug, Clone)]
pub struct UpgradeContext {
    pub site_root: RemotePath,
    pub sites_subdir: RemotePath,
    pub backup_dir: RemotePath,
    pub staging_parent: RemotePath,
    pub staged_upgrade_root: PathBuf,
    pub maintenance: MaintenanceFiles,
    pub old_tree_backup: RemotePath,
    remote_staging_root_name: Option<String>,
}

impl UpgradeContext {
    pub fn new(
        config: &SwapConfig,
        staged_upgrade_root: impl Into<PathBuf>,
        maintenance: MaintenanceFiles,
        run_date: NaiveDate,
    ) -> Self {
        // One name per calendar day: a second run on the same day replaces the first
        // run's old-tree backup.
        let old_tree_name = format!("{}-{}", config.old_tree_prefix, run_date.format("%Y-%m-%d"));
        Self {
            site_root: config.site_root.clone(),
            sites_subdir: config.sites_dir(),
            backup_dir: config.backup_dir.clone(),
            staging_parent: config.staging_parent.clone(),
            staged_upgrade_root: staged_upgrade_root.into(),
            maintenance,
            old_tree_backup: config.backup_dir.join(&old_tree_name),
            remote_staging_root_name: None,
        }
    }

    pub fn remote_staging_root_name(&self) -> Option<&str> {
        self.remote_staging_root_name.as_deref()
    }

    /// Resolves the staged root name on first call and returns the cached name after.
    pub fn resolve_staging_root(&mut self) -> Result<&str, WorkflowError> {
        if self.remote_staging_root_name.is_none() {
            let name = resolve_staging_root_name(&self.staged_upgrade_root)?;
            self.remote_staging_root_name = Some(name);
        }
        Ok(self.remote_staging_root_name.as_deref().unwrap_or_default())
    }

    pub fn remote_staging_root(&self) -> Option<RemotePath> {
        self.remote_staging_root_name
            .as_deref()
            .map(|name| self.staging_parent.join(name))
    }

    pub fn local_upgrade_dir(&self) -> Option<PathBuf> {
        self.remote_staging_root_name
            .as_deref()
            .map(|name| self.staged_upgrade_root.join(name))
    }

    /// Ordered remote operations a full run would issue, one line each.
    pub fn plan_lines(&mut self, config: &SwapConfig) -> Result<Vec<String>, WorkflowError> {
        self.resolve_staging_root()?;
        let staging_root = self.remote_staging_root().unwrap_or_default();
        let staged_sites = staging_root.join(&config.sites_dir_name);

        let mut lines = vec![format!(
            "swap_plan site_root={} staging_root={} backup_dir={}",
            self.site_root, staging_root, self.backup_dir
        )];
        let mut push = |step: WorkflowStep, detail: String| {
            lines.push(format!("step={} {detail}", step.as_str()));
        };
        push(
            WorkflowStep::ResolveStagingRoot,
            format!(
                "local={}",
                self.local_upgrade_dir().unwrap_or_default().display()
            ),
        );
        push(WorkflowStep::VerifySiteRoot, format!("cwd {}", self.site_root));
        push(
            WorkflowStep::VerifySitesDirectory,
            format!("cwd {} absent {}", self.sites_subdir, staging_root),
        );
        push(WorkflowStep::EnsureBackupLocation, format!("mkdir {}", self.backup_dir));
        for name in config.preserved_files.iter() {
            push(
                WorkflowStep::BackupPreservedFiles,
                format!(
                    "move {} -> {}",
                    self.site_root.join(name),
                    self.backup_dir.join(name)
                ),
            );
        }
        push(
            WorkflowStep::UploadMaintenancePage,
            format!(
                "upload {} {}",
                self.site_root.join(&config.maintenance.htaccess_name),
                self.site_root.join(&config.maintenance.page_name)
            ),
        );
        push(WorkflowStep::UploadStagedUpgrade, format!("upload_tree {staging_root}"));
        push(WorkflowStep::ClearStagedSitesSubdir, format!("delete_tree {staged_sites}"));
        push(
            WorkflowStep::RelocateSitesSubdir,
            format!("move {} -> {}", self.sites_subdir, staged_sites),
        );
        push(
            WorkflowStep::OptionalRestorePreservedFiles,
            format!("ask; move {}/* -> {}", self.backup_dir, staging_root),
        );
        push(
            WorkflowStep::RenameOldRootAway,
            format!("move {} -> {}", self.site_root, self.old_tree_backup),
        );
        push(
            WorkflowStep::RenameStagedRootIntoPlace,
            format!("move {} -> {}", staging_root, self.site_root),
        );
        Ok(lines)
    }
}

/// Name of the single top-level directory of a materialized upgrade.
///
/// Top-level files are ignored; zero or several directories is a precondition failure.
pub fn resolve_staging_root_name(staged_upgrade_root: &Path) -> Result<String, WorkflowError> {
    let precondition = |message: String| WorkflowError::Precondition {
        step: WorkflowStep::ResolveStagingRoot,
        message,
    };
    let entries = fs::read_dir(staged_upgrade_root)
        .and_then(|entries| entries.collect::<Result<Vec<_>, _>>())
        .map_err(|err| {
            precondition(format!(
                "cannot read staged upgrade {}: {err}",
                staged_upgrade_root.display()
            ))
        })?;

    let mut directories = Vec::new();
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.path().is_dir() {
            directories.push(name);
        } else {
            tracing::warn!(name = %name, "ignoring top-level file in staged upgrade");
        }
    }
    directories.sort();

    match directories.as_slice() {
        [single] => Ok(single.clone()),
        [] => Err(precondition(format!(
            "staged upgrade {} contains no top-level directory",
            staged_upgrade_root.display()
        ))),
        several => Err(precondition(format!(
            "staged upgrade {} must contain exactly one top-level directory, found {}: {}",
            staged_upgrade_root.display(),
            several.len(),
            several.join(", ")
        ))),
    }
}

#[derive(Debug, Clone, Default)]
pub struct SwapReport {
    pub site_root: RemotePath,
    pub old_tree_backup: RemotePath,
    pub backup_dir: RemotePath,
    pub remote_staging_root: RemotePath,
    pub reused_backup_location: bool,
    pub preserved: RelocationReport,
    /// `None` when the operator declined the restore.
    pub restored: Option<RelocationReport>,
    pub uploaded_files: u64,
    pub steps: Vec<(WorkflowStep, StepOutcome)>,
}

impl SwapReport {
    pub fn outcome_of(&self, step: WorkflowStep) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|(recorded, _)| *recorded == step)
            .map(|(_, outcome)| outcome)
    }
}

/// The two-phase rename swap of a live site root for an uploaded upgrade.
///
/// `run` drives every step. The stepwise methods expose the same sequence so the
/// intermediate remote state can be inspected between them; each one refuses to run
/// out of order, and nothing runs after a failure.
pub struct SiteSwapWorkflow<'a> {
    config: SwapConfig,
    context: UpgradeContext,
    client: &'a mut dyn RemoteTreeClient,
    decisions: &'a mut dyn DecisionProvider,
    steps: StepSequencer<'a>,
    phase: SwapPhase,
    prepared: bool,
    restore_offered: bool,
    halted: bool,
    report: SwapReport,
}

impl<'a> SiteSwapWorkflow<'a> {
    pub fn new(
        config: SwapConfig,
        context: UpgradeContext,
        client: &'a mut dyn RemoteTreeClient,
        decisions: &'a mut dyn DecisionProvider,
        reporter: &'a mut dyn StepReporter,
    ) -> Self {
        let report = SwapReport {
            site_root: context.site_root.clone(),
            old_tree_backup: context.old_tree_backup.clone(),
            backup_dir: context.backup_dir.clone(),
            ..SwapReport::default()
        };
        Self {
            config,
            context,
            client,
            decisions,
            steps: StepSequencer::new(reporter),
            phase: SwapPhase::Untouched,
            prepared: false,
            restore_offered: false,
            halted: false,
            report,
        }
    }

    pub fn phase(&self) -> SwapPhase {
        self.phase
    }

    pub fn context(&self) -> &UpgradeContext {
        &self.context
    }

    pub fn report(&self) -> &SwapReport {
        &self.report
    }

    pub fn run(mut self) -> Result<SwapReport, WorkflowError> {
        self.prepare()?;
        self.relocate_sites()?;
        self.offer_restore()?;
        self.vacate_site_root()?;
        self.occupy_site_root()?;
        Ok(self.report)
    }

    /// Resolves the staged root, verifies the remote, backs up the preserved files,
    /// switches the site to maintenance and uploads the upgrade with an empty sites
    /// directory. The live site keeps working until `relocate_sites`.
    pub fn prepare(&mut self) -> Result<(), WorkflowError> {
        self.guard(WorkflowStep::ResolveStagingRoot, !self.prepared)?;
        self.prepared = true;

        let staging_root = self.resolve_staging_root()?;
        self.verify_site_root()?;
        self.verify_sites_directory(&staging_root)?;
        self.ensure_backup_location()?;
        self.backup_preserved_files()?;
        self.upload_maintenance_page()?;
        self.upload_staged_upgrade(&staging_root)?;
        self.clear_staged_sites_subdir(&staging_root)?;
        self.phase = SwapPhase::Staged;
        Ok(())
    }

    /// Moves the live sites directory into the upgrade. Point of no return.
    pub fn relocate_sites(&mut self) -> Result<(), WorkflowError> {
        let step = WorkflowStep::RelocateSitesSubdir;
        self.guard(step, self.phase == SwapPhase::Staged)?;
        let staged_sites = self.staging_root().join(&self.config.sites_dir_name);
        let number = self.begin(step);
        let from = self.context.sites_subdir.clone();
        if let Err(err) = self.client.rename_entry(&from, &staged_sites) {
            return Err(self.fail(step, number, err));
        }
        self.phase = SwapPhase::SitesRelocated;
        self.finish(step, number, StepOutcome::Success);
        Ok(())
    }

    pub fn offer_restore(&mut self) -> Result<(), WorkflowError> {
        let step = WorkflowStep::OptionalRestorePreservedFiles;
        self.guard(
            step,
            self.phase == SwapPhase::SitesRelocated && !self.restore_offered,
        )?;
        self.restore_offered = true;
        let number = self.begin(step);

        if !self.decisions.confirm(DecisionPoint::RestorePreservedFiles) {
            self.steps.detail(&format!(
                "customized files stay in {}",
                self.context.backup_dir
            ));
            self.finish(step, number, StepOutcome::Skipped);
            return Ok(());
        }

        // Only this run's copies; anything else in the backup directory may be stale.
        let backed_up = self.config.preserved_files.subset(|name| {
            self.report.preserved.relocations.iter().any(|relocation| {
                relocation.name == name && relocation.outcome == StepOutcome::Success
            })
        });
        let target = self.staging_root();
        let report = match restore_files(
            self.client,
            &self.context.backup_dir,
            &target,
            &backed_up,
        ) {
            Ok(report) => report,
            Err(err) => return Err(self.fail(step, number, err)),
        };
        for relocation in &report.relocations {
            self.steps.relocated(relocation);
        }
        let outcome = relocation_outcome(&report, "restored");
        self.report.restored = Some(report);
        self.finish(step, number, outcome);
        Ok(())
    }

    /// Renames the old site root into the backup directory. Until `occupy_site_root`
    /// succeeds nothing is served from the site root.
    pub fn vacate_site_root(&mut self) -> Result<(), WorkflowError> {
        let step = WorkflowStep::RenameOldRootAway;
        self.guard(
            step,
            self.phase == SwapPhase::SitesRelocated && self.restore_offered,
        )?;
        let number = self.begin(step);
        let from = self.context.site_root.clone();
        let to = self.context.old_tree_backup.clone();
        if let Err(err) = self.client.rename_entry(&from, &to) {
            return Err(self.fail(step, number, err));
        }
        self.phase = SwapPhase::OldRootVacated;
        self.finish(step, number, StepOutcome::Success);
        Ok(())
    }

    pub fn occupy_site_root(&mut self) -> Result<(), WorkflowError> {
        let step = WorkflowStep::RenameStagedRootIntoPlace;
        self.guard(step, self.phase == SwapPhase::OldRootVacated)?;
        let number = self.begin(step);
        let from = self.staging_root();
        let to = self.context.site_root.clone();
        if let Err(err) = self.client.rename_entry(&from, &to) {
            return Err(self.fail(step, number, err));
        }
        self.phase = SwapPhase::Live;
        self.finish(step, number, StepOutcome::Success);
        tracing::info!(site_root = %to, old_tree = %self.context.old_tree_backup, "upgrade is live");
        Ok(())
    }

    fn resolve_staging_root(&mut self) -> Result<RemotePath, WorkflowError> {
        let step = WorkflowStep::ResolveStagingRoot;
        let number = self.begin(step);
        let name = match self.context.resolve_staging_root() {
            Ok(name) => name.to_string(),
            Err(err) => {
                self.finish(step, number, StepOutcome::failed(&err));
                self.halted = true;
                return Err(err);
            }
        };
        let staging_root = self.staging_root();
        self.steps
            .detail(&format!("upgrade root {name} will be uploaded to {staging_root}"));
        self.report.remote_staging_root = staging_root.clone();
        self.finish(step, number, StepOutcome::Success);
        Ok(staging_root)
    }

    fn verify_site_root(&mut self) -> Result<(), WorkflowError> {
        let step = WorkflowStep::VerifySiteRoot;
        let number = self.begin(step);
        let site_root = self.context.site_root.clone();
        match self.client.change_directory(&site_root) {
            Ok(()) => {
                self.finish(step, number, StepOutcome::Success);
                Ok(())
            }
            Err(err) if err.is_not_found_at(&site_root) => Err(self.precondition(
                step,
                number,
                format!("site root {site_root} does not exist"),
            )),
            Err(err) => Err(self.fail(step, number, err)),
        }
    }

    fn verify_sites_directory(&mut self, staging_root: &RemotePath) -> Result<(), WorkflowError> {
        let step = WorkflowStep::VerifySitesDirectory;
        let number = self.begin(step);
        let sites_subdir = self.context.sites_subdir.clone();
        match self.client.change_directory(&sites_subdir) {
            Ok(()) => {}
            Err(err) if err.is_not_found_at(&sites_subdir) => {
                return Err(self.precondition(
                    step,
                    number,
                    format!("sites directory {sites_subdir} does not exist"),
                ))
            }
            Err(err) => return Err(self.fail(step, number, err)),
        }

        match self.client.change_directory(staging_root) {
            Ok(()) => Err(self.precondition(
                step,
                number,
                format!("upload target {staging_root} already exists remotely; remove it first"),
            )),
            Err(err) if err.is_not_found_at(staging_root) => {
                self.finish(step, number, StepOutcome::Success);
                Ok(())
            }
            Err(err) => Err(self.fail(step, number, err)),
        }
    }

    fn ensure_backup_location(&mut self) -> Result<(), WorkflowError> {
        let step = WorkflowStep::EnsureBackupLocation;
        let number = self.begin(step);
        let backup_dir = self.context.backup_dir.clone();
        let location = match ensure_backup_location(self.client, &backup_dir) {
            Ok(location) => location,
            Err(RemoteError::NotFound { path }) => {
                return Err(self.precondition(
                    step,
                    number,
                    format!("backup directory {backup_dir} cannot be created: {path} does not exist"),
                ))
            }
            Err(err) => return Err(self.fail(step, number, err)),
        };

        if location == BackupLocation::Existing {
            self.steps
                .detail(&format!("backup directory {backup_dir} already exists"));
            if !self.decisions.confirm(DecisionPoint::ReuseBackupLocation) {
                self.finish(step, number, StepOutcome::Skipped);
                self.halted = true;
                tracing::info!(backup_dir = %backup_dir, "operator declined to reuse backup directory");
                return Err(WorkflowError::Declined { step });
            }
            self.report.reused_backup_location = true;
        }
        self.phase = SwapPhase::BackupPrepared;

        if location == BackupLocation::Existing {
            self.clear_previous_old_tree(step, number)?;
        }
        self.finish(step, number, StepOutcome::Success);
        Ok(())
    }

    /// Removes an old-tree backup left by an earlier run on the same day, so the
    /// rename inside the swap window cannot collide with it.
    fn clear_previous_old_tree(
        &mut self,
        step: WorkflowStep,
        number: usize,
    ) -> Result<(), WorkflowError> {
        let old_tree = self.context.old_tree_backup.clone();
        match self.client.change_directory(&old_tree) {
            Ok(()) => {}
            Err(err) if err.is_not_found_at(&old_tree) => return Ok(()),
            Err(err) => return Err(self.fail(step, number, err)),
        }
        self.steps
            .detail(&format!("replacing earlier old-tree backup {old_tree}"));
        tracing::warn!(path = %old_tree, "overwriting same-day old-tree backup");
        match delete_tree(self.client, &old_tree) {
            Ok(_) => Ok(()),
            Err(err) => Err(self.fail(step, number, err)),
        }
    }

    fn backup_preserved_files(&mut self) -> Result<(), WorkflowError> {
        let step = WorkflowStep::BackupPreservedFiles;
        let number = self.begin(step);
        let report = match preserve_files(
            self.client,
            &self.context.site_root,
            &self.context.backup_dir,
            &self.config.preserved_files,
        ) {
            Ok(report) => report,
            Err(err) => return Err(self.fail(step, number, err)),
        };
        for relocation in &report.relocations {
            self.steps.relocated(relocation);
        }
        let outcome = relocation_outcome(&report, "backed up");
        self.report.preserved = report;
        self.finish(step, number, outcome);
        Ok(())
    }

    fn upload_maintenance_page(&mut self) -> Result<(), WorkflowError> {
        let step = WorkflowStep::UploadMaintenancePage;
        let number = self.begin(step);
        let uploads = [
            (
                self.context.maintenance.htaccess.clone(),
                self.context.site_root.join(&self.config.maintenance.htaccess_name),
            ),
            (
                self.context.maintenance.page.clone(),
                self.context.site_root.join(&self.config.maintenance.page_name),
            ),
        ];
        for (local, remote) in uploads {
            if let Err(err) = self.client.upload_file(&local, &remote) {
                return Err(self.fail(step, number, err));
            }
            // The first upload is the one that takes the site offline.
            self.phase = SwapPhase::MaintenanceMode;
        }
        self.finish(step, number, StepOutcome::Success);
        Ok(())
    }

    fn upload_staged_upgrade(&mut self, staging_root: &RemotePath) -> Result<(), WorkflowError> {
        let step = WorkflowStep::UploadStagedUpgrade;
        let number = self.begin(step);
        let local = self.context.local_upgrade_dir().unwrap_or_default();
        let mut activity = self.steps.activity(&format!("uploading to {staging_root}"));
        let uploaded = self
            .client
            .upload_tree(&local, staging_root, &mut |count| activity.advance(count));
        drop(activity);

        match uploaded {
            Ok(count) => {
                self.report.uploaded_files = count;
                self.steps
                    .detail(&format!("uploaded {count} files to {staging_root}"));
                self.finish(step, number, StepOutcome::Success);
                Ok(())
            }
            Err(err) => Err(self.fail(step, number, err)),
        }
    }

    fn clear_staged_sites_subdir(&mut self, staging_root: &RemotePath) -> Result<(), WorkflowError> {
        let step = WorkflowStep::ClearStagedSitesSubdir;
        let number = self.begin(step);
        let staged_sites = staging_root.join(&self.config.sites_dir_name);
        match delete_tree(self.client, &staged_sites) {
            Ok(stats) => {
                self.steps.detail(&format!(
                    "removed {} files and {} directories",
                    stats.files_deleted, stats.directories_removed
                ));
                self.finish(step, number, StepOutcome::Success);
                Ok(())
            }
            Err(err) if err.is_not_found_at(&staged_sites) => {
                self.steps
                    .detail(&format!("upgrade ships no {}", self.config.sites_dir_name));
                self.finish(step, number, StepOutcome::Skipped);
                Ok(())
            }
            Err(err) => Err(self.fail(step, number, err)),
        }
    }

    fn staging_root(&self) -> RemotePath {
        self.context.remote_staging_root().unwrap_or_default()
    }

    fn guard(&self, step: WorkflowStep, ready: bool) -> Result<(), WorkflowError> {
        if ready && !self.halted {
            return Ok(());
        }
        Err(WorkflowError::OutOfOrder {
            step,
            phase: self.phase,
        })
    }

    fn begin(&mut self, step: WorkflowStep) -> usize {
        tracing::info!(step = step.as_str(), phase = %self.phase, "starting step");
        self.steps.begin(&step.to_string())
    }

    fn finish(&mut self, step: WorkflowStep, number: usize, outcome: StepOutcome) {
        tracing::debug!(step = step.as_str(), outcome = %outcome, "finished step");
        self.steps.finish(number, &outcome);
        self.report.steps.push((step, outcome));
    }

    fn precondition(&mut self, step: WorkflowStep, number: usize, message: String) -> WorkflowError {
        self.finish(step, number, StepOutcome::failed(&message));
        self.halted = true;
        WorkflowError::Precondition { step, message }
    }

    fn fail(&mut self, step: WorkflowStep, number: usize, source: RemoteError) -> WorkflowError {
        self.finish(step, number, StepOutcome::failed(&source));
        self.halted = true;
        let phase = self.phase;
        let guidance = self.recovery_guidance();

        if phase.in_swap_window() {
            tracing::error!(step = step.as_str(), %phase, error = %source, "remote site left in a degraded state");
            return WorkflowError::Degraded {
                step,
                phase,
                source,
                guidance,
            };
        }
        if source.is_fatal_transport() {
            tracing::error!(step = step.as_str(), %phase, error = %source, "transport failure");
            return WorkflowError::FatalTransport {
                step,
                phase,
                source,
                guidance,
            };
        }
        tracing::error!(step = step.as_str(), %phase, error = %source, "step failed");
        WorkflowError::Transient {
            step,
            phase,
            source,
            guidance,
        }
    }

    /// Manual steps that return the remote to a working site from the current phase.
    fn recovery_guidance(&self) -> Vec<String> {
        let ctx = &self.context;
        let staging_root = self.staging_root();
        let staged_sites = staging_root.join(&self.config.sites_dir_name);
        let preserved = self.config.preserved_files.names().join(", ");
        let maintenance_page = ctx.site_root.join(&self.config.maintenance.page_name);

        let mut guidance = Vec::new();
        match self.phase {
            SwapPhase::Untouched => {}
            SwapPhase::BackupPrepared => {
                guidance.push(format!(
                    "customized files ({preserved}) may have moved from {} to {}; move them back before retrying",
                    ctx.site_root, ctx.backup_dir
                ));
            }
            SwapPhase::MaintenanceMode | SwapPhase::Staged => {
                guidance.push(format!(
                    "the site is in maintenance mode: delete {maintenance_page} and move {} back from {} to reopen it",
                    self.config.maintenance.htaccess_name, ctx.backup_dir
                ));
                guidance.push(format!(
                    "move the remaining customized files ({preserved}) back from {} to {}",
                    ctx.backup_dir, ctx.site_root
                ));
                guidance.push(format!(
                    "delete the uploaded upgrade at {staging_root} before retrying"
                ));
            }
            SwapPhase::SitesRelocated => {
                guidance.push(format!(
                    "{} has no sites directory; it now lives at {staged_sites}",
                    ctx.site_root
                ));
                guidance.push(format!(
                    "to finish: rename {} to {}, then rename {staging_root} to {}",
                    ctx.site_root, ctx.old_tree_backup, ctx.site_root
                ));
                guidance.push(format!(
                    "to abandon: rename {staged_sites} back to {}, delete {maintenance_page} and restore {} from {}",
                    ctx.sites_subdir, self.config.maintenance.htaccess_name, ctx.backup_dir
                ));
            }
            SwapPhase::OldRootVacated => {
                guidance.push(format!(
                    "nothing is live at {}; the old site is at {}",
                    ctx.site_root, ctx.old_tree_backup
                ));
                guidance.push(format!(
                    "to finish: rename {staging_root} to {}",
                    ctx.site_root
                ));
                guidance.push(format!(
                    "to abandon: rename {} back to {}, then rename {staged_sites} to {}",
                    ctx.old_tree_backup, ctx.site_root, ctx.sites_subdir
                ));
            }
            SwapPhase::Live => {}
        }
        guidance
    }
}

fn relocation_outcome(report: &RelocationReport, verb: &str) -> StepOutcome {
    let failed = report.failed();
    if failed == 0 {
        return StepOutcome::Success;
    }
    StepOutcome::failed(format!(
        "{failed} of {} files could not be {verb}",
        report.relocations.len()
    ))
}
