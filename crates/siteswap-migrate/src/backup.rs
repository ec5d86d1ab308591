use siteswap_core::{PreservedFileSet, RemoteError, RemotePath, StepOutcome};
use siteswap_remote::RemoteTreeClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupLocation {
    Created,
    /// Left over from an earlier run; reusing it may overwrite files in it.
    Existing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRelocation {
    pub name: String,
    pub source: RemotePath,
    pub target: RemotePath,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationReport {
    pub relocations: Vec<FileRelocation>,
}

impl RelocationReport {
    pub fn succeeded(&self) -> usize {
        self.count(|outcome| *outcome == StepOutcome::Success)
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| *outcome == StepOutcome::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(StepOutcome::is_failed)
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, predicate: impl Fn(&StepOutcome) -> bool) -> usize {
        self.relocations
            .iter()
            .filter(|relocation| predicate(&relocation.outcome))
            .count()
    }
}

/// Creates `backup_dir`. A refusal is only reported as `Existing` once the directory
/// is confirmed; FTP servers answer 550 for a missing parent as well, which comes back
/// as `NotFound`.
pub fn ensure_backup_location(
    client: &mut dyn RemoteTreeClient,
    backup_dir: &RemotePath,
) -> Result<BackupLocation, RemoteError> {
    match client.make_directory(backup_dir) {
        Ok(()) => Ok(BackupLocation::Created),
        Err(RemoteError::AlreadyExists { .. }) => {
            client.change_directory(backup_dir)?;
            Ok(BackupLocation::Existing)
        }
        Err(err) => Err(err),
    }
}

/// Moves each preserved file from `site_root` into `backup_dir`.
///
/// Per-file failures are recorded in the report; only fatal transport errors abort.
pub fn preserve_files(
    client: &mut dyn RemoteTreeClient,
    site_root: &RemotePath,
    backup_dir: &RemotePath,
    files: &PreservedFileSet,
) -> Result<RelocationReport, RemoteError> {
    relocate_files(client, site_root, backup_dir, files)
}

pub fn restore_files(
    client: &mut dyn RemoteTreeClient,
    backup_dir: &RemotePath,
    target_root: &RemotePath,
    files: &PreservedFileSet,
) -> Result<RelocationReport, RemoteError> {
    relocate_files(client, backup_dir, target_root, files)
}

fn relocate_files(
    client: &mut dyn RemoteTreeClient,
    from_dir: &RemotePath,
    to_dir: &RemotePath,
    files: &PreservedFileSet,
) -> Result<RelocationReport, RemoteError> {
    let mut report = RelocationReport::default();
    for name in files.iter() {
        let source = from_dir.join(name);
        let target = to_dir.join(name);
        let outcome = relocate_one(client, &source, &target)?;
        if let StepOutcome::Failed(reason) = &outcome {
            tracing::warn!(source = %source, target = %target, %reason, "file relocation failed");
        }
        report.relocations.push(FileRelocation {
            name: name.to_string(),
            source,
            target,
            outcome,
        });
    }
    Ok(report)
}

/// Delete-then-rename for one file. A missing source is skipped before the
/// destination is touched, so an earlier copy survives a rerun.
fn relocate_one(
    client: &mut dyn RemoteTreeClient,
    source: &RemotePath,
    target: &RemotePath,
) -> Result<StepOutcome, RemoteError> {
    match client.file_exists(source) {
        Ok(true) => {}
        Ok(false) => return Ok(StepOutcome::Skipped),
        Err(err) if err.is_fatal_transport() => return Err(err),
        Err(err) => {
            tracing::warn!(path = %source, error = %err, "cannot check source; attempting relocation");
        }
    }

    match client.delete_file(target) {
        Ok(()) | Err(RemoteError::NotFound { .. }) => {}
        Err(err) if err.is_fatal_transport() => return Err(err),
        Err(err) => {
            return Ok(StepOutcome::failed(format!(
                "could not clear destination {target}: {err}"
            )))
        }
    }

    match client.rename_entry(source, target) {
        Ok(()) => Ok(StepOutcome::Success),
        Err(err) if err.is_not_found_at(source) => Ok(StepOutcome::Skipped),
        Err(err) if err.is_fatal_transport() => Err(err),
        Err(err) => Ok(StepOutcome::failed(err)),
    }
}
