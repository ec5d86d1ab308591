use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use siteswap_core::{ArchiveType, MaintenanceSettings};
use tempfile::TempDir;

const MAINTENANCE_HTACCESS_TEMPLATE: &str = "\
# Temporary maintenance override installed while the site is upgraded.
<IfModule mod_rewrite.c>
  RewriteEngine On
  RewriteCond %{REQUEST_URI} !/@PAGE@$
  RewriteRule ^ @PAGE@ [L]
</IfModule>
DirectoryIndex @PAGE@
";

pub const MAINTENANCE_PAGE: &str = r#"<?php
header($_SERVER['SERVER_PROTOCOL'] . ' 503 Service Unavailable', true, 503);
header('Retry-After: 3600');
?><!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Down for maintenance</title></head>
<body>
<h1>Down for maintenance</h1>
<p>The site is being upgraded and will be back shortly.</p>
</body>
</html>
"#;

pub fn render_maintenance_htaccess(page_name: &str) -> String {
    MAINTENANCE_HTACCESS_TEMPLATE.replace("@PAGE@", page_name)
}

/// Local copies of the resources uploaded into the site root during maintenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceFiles {
    pub htaccess: PathBuf,
    pub page: PathBuf,
}

/// Scratch space for one run. Dropping it deletes the unpacked upgrade and the
/// generated maintenance files.
#[derive(Debug)]
pub struct StagingArea {
    root: TempDir,
}

impl StagingArea {
    pub fn create() -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("siteswap-")
            .tempdir()
            .context("failed to create local staging directory")?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn upgrade_dir(&self) -> PathBuf {
        self.root.path().join("upgrade")
    }

    pub fn maintenance_dir(&self) -> PathBuf {
        self.root.path().join("maintenance")
    }

    pub fn materialize_archive(&self, archive: &Path, archive_type: ArchiveType) -> Result<PathBuf> {
        self.materialize_archive_with_runner(archive, archive_type, run_command)
    }

    pub fn materialize_archive_with_runner<RunCommand>(
        &self,
        archive: &Path,
        archive_type: ArchiveType,
        mut run: RunCommand,
    ) -> Result<PathBuf>
    where
        RunCommand: FnMut(&mut Command, &str) -> Result<()>,
    {
        if !archive.is_file() {
            return Err(anyhow!("upgrade archive not found: {}", archive.display()));
        }
        let dst = self.upgrade_dir();
        fs::create_dir_all(&dst).with_context(|| format!("failed to create {}", dst.display()))?;

        let mut last_err = None;
        for (mut command, context_message) in build_extract_commands(archive, archive_type, &dst) {
            match run(&mut command, context_message) {
                Ok(()) => {
                    tracing::info!(
                        archive = %archive.display(),
                        kind = archive_type.as_str(),
                        "unpacked upgrade archive"
                    );
                    return Ok(dst);
                }
                Err(err) => {
                    tracing::debug!(error = %err, "extraction attempt failed");
                    last_err = Some(err);
                }
            }
        }
        let err = last_err.unwrap_or_else(|| anyhow!("no extraction tool available"));
        Err(err.context(format!("failed to unpack {}", archive.display())))
    }

    pub fn write_maintenance_files(&self, settings: &MaintenanceSettings) -> Result<MaintenanceFiles> {
        let dir = self.maintenance_dir();
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

        let htaccess = dir.join("htaccess");
        let htaccess_content = match &settings.htaccess_source {
            Some(source) => fs::read_to_string(source)
                .with_context(|| format!("failed to read {}", source.display()))?,
            None => render_maintenance_htaccess(&settings.page_name),
        };
        fs::write(&htaccess, htaccess_content)
            .with_context(|| format!("failed to write {}", htaccess.display()))?;

        let page = dir.join("page");
        match &settings.page_source {
            Some(source) => {
                fs::copy(source, &page).with_context(|| {
                    format!("failed to copy {} to {}", source.display(), page.display())
                })?;
            }
            None => fs::write(&page, MAINTENANCE_PAGE)
                .with_context(|| format!("failed to write {}", page.display()))?,
        }

        Ok(MaintenanceFiles { htaccess, page })
    }

    /// Deletes the staging directory now, reporting failures instead of ignoring them.
    pub fn release(self) -> Result<()> {
        let path = self.root.path().to_path_buf();
        self.root
            .close()
            .with_context(|| format!("failed to remove staging directory {}", path.display()))
    }
}

pub(crate) fn build_extract_commands(
    archive: &Path,
    archive_type: ArchiveType,
    dst: &Path,
) -> Vec<(Command, &'static str)> {
    let tar = |flags: &str| {
        let mut command = Command::new("tar");
        command.arg(flags).arg(archive).arg("-C").arg(dst);
        command
    };

    match archive_type {
        ArchiveType::Zip => {
            let mut unzip = Command::new("unzip");
            unzip.arg("-q").arg(archive).arg("-d").arg(dst);
            vec![
                (unzip, "failed to extract zip archive with unzip"),
                (tar("-xf"), "failed to extract zip archive with tar fallback"),
            ]
        }
        ArchiveType::TarGz => vec![(tar("-xzf"), "failed to extract tar.gz archive")],
        ArchiveType::TarBz2 => vec![(tar("-xjf"), "failed to extract tar.bz2 archive")],
        ArchiveType::TarXz => vec![(tar("-xJf"), "failed to extract tar.xz archive")],
        ArchiveType::Tar => vec![(tar("-xf"), "failed to extract tar archive")],
    }
}

pub(crate) fn run_command(command: &mut Command, context_message: &str) -> Result<()> {
    let output = command
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    Err(anyhow!(
        "{context_message}: status={} stdout='{}' stderr='{}'",
        output.status,
        stdout.trim(),
        stderr.trim()
    ))
}
