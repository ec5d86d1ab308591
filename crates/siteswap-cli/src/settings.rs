use std::time::Duration;

use anyhow::{anyhow, Result};
use siteswap_core::{ArchiveType, ConfigFile, SwapConfig};
use siteswap_remote::{ConnectionSettings, DEFAULT_FTP_PORT};

use crate::Cli;

pub(crate) const PASSWORD_ENV: &str = "SITESWAP_PASSWORD";

pub(crate) fn load_config_file(cli: &Cli) -> Result<ConfigFile> {
    match &cli.config {
        Some(path) => ConfigFile::load(path),
        None => Ok(ConfigFile::default()),
    }
}

/// Flags win over the config file.
pub(crate) fn resolve_swap_config(cli: &Cli, file: &ConfigFile) -> Result<SwapConfig> {
    let mut config = file.swap_config(cli.site_root.as_deref())?;
    if let Some(backup_dir) = &cli.backup_dir {
        config = config.with_backup_dir(backup_dir)?;
        config.validate()?;
    }
    Ok(config)
}

pub(crate) fn resolve_connection(
    cli: &Cli,
    file: &ConfigFile,
    env_password: Option<String>,
) -> Result<ConnectionSettings> {
    let section = &file.connection;
    let host = cli
        .host
        .clone()
        .or_else(|| section.host.clone())
        .ok_or_else(|| anyhow!("FTP host is required (--host or [connection].host)"))?;
    let username = cli
        .username
        .clone()
        .or_else(|| section.username.clone())
        .ok_or_else(|| anyhow!("FTP username is required (--username or [connection].username)"))?;
    let password = cli
        .password
        .clone()
        .or(env_password)
        .or_else(|| section.password.clone())
        .ok_or_else(|| {
            anyhow!("FTP password is required (--password, {PASSWORD_ENV} or [connection].password)")
        })?;

    let mut settings = ConnectionSettings::new(host, username, password);
    settings.port = cli.port.or(section.port).unwrap_or(DEFAULT_FTP_PORT);
    if let Some(secs) = section.connect_timeout_secs {
        settings.connect_timeout = Duration::from_secs(secs.max(1));
    }
    Ok(settings)
}

pub(crate) fn resolve_archive_type(cli: &Cli) -> Result<ArchiveType> {
    match cli.archive_type.as_deref() {
        Some(raw) => ArchiveType::parse(raw).ok_or_else(|| {
            anyhow!("unsupported archive type '{raw}' (expected zip, tar.gz, tar.bz2, tar.xz or tar)")
        }),
        None => ArchiveType::infer_from_path(&cli.upgrade_file).ok_or_else(|| {
            anyhow!(
                "cannot infer archive type from {}; pass --archive-type",
                cli.upgrade_file.display()
            )
        }),
    }
}
