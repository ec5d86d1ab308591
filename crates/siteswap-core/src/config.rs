use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::RemotePath;

pub const DEFAULT_BACKUP_DIR: &str = "backup";
pub const DEFAULT_SITES_DIR_NAME: &str = "sites";
pub const DEFAULT_OLD_TREE_PREFIX: &str = "drupal-old";
pub const DEFAULT_PRESERVED_FILES: [&str; 2] = [".htaccess", "robots.txt"];

/// Customized files carried across the upgrade. Fixed once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreservedFileSet {
    names: Vec<String>,
}

impl PreservedFileSet {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut collected = Vec::new();
        for name in names {
            let name = name.into();
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(anyhow!("preserved file name must not be empty"));
            }
            if trimmed.contains('/') {
                return Err(anyhow!(
                    "preserved file name must be a plain file name, not a path: {trimmed}"
                ));
            }
            if !seen.insert(trimmed.to_string()) {
                return Err(anyhow!("duplicate preserved file name: {trimmed}"));
            }
            collected.push(trimmed.to_string());
        }
        Ok(Self { names: collected })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// The names for which `keep` holds, in their original order.
    pub fn subset(&self, mut keep: impl FnMut(&str) -> bool) -> Self {
        Self {
            names: self
                .names
                .iter()
                .filter(|name| keep(name))
                .cloned()
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for PreservedFileSet {
    fn default() -> Self {
        Self {
            names: DEFAULT_PRESERVED_FILES
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

/// Names under the site root for the uploaded maintenance resources, and optional
/// local replacements for the built-in content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceSettings {
    pub htaccess_name: String,
    pub page_name: String,
    pub htaccess_source: Option<PathBuf>,
    pub page_source: Option<PathBuf>,
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        Self {
            htaccess_name: ".htaccess".to_string(),
            page_name: "maintenance.php".to_string(),
            htaccess_source: None,
            page_source: None,
        }
    }
}

/// Everything the swap workflow needs to know about the remote layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapConfig {
    pub site_root: RemotePath,
    pub backup_dir: RemotePath,
    pub preserved_files: PreservedFileSet,
    pub sites_dir_name: String,
    pub staging_parent: RemotePath,
    pub old_tree_prefix: String,
    pub maintenance: MaintenanceSettings,
}

impl SwapConfig {
    pub fn new(site_root: &str) -> Result<Self> {
        Ok(Self {
            site_root: parse_remote_dir("site root", site_root)?,
            backup_dir: RemotePath::new(DEFAULT_BACKUP_DIR),
            preserved_files: PreservedFileSet::default(),
            sites_dir_name: DEFAULT_SITES_DIR_NAME.to_string(),
            staging_parent: RemotePath::login_root(),
            old_tree_prefix: DEFAULT_OLD_TREE_PREFIX.to_string(),
            maintenance: MaintenanceSettings::default(),
        })
    }

    pub fn with_backup_dir(mut self, backup_dir: &str) -> Result<Self> {
        self.backup_dir = parse_remote_dir("backup directory", backup_dir)?;
        Ok(self)
    }

    pub fn with_preserved_files(mut self, preserved_files: PreservedFileSet) -> Self {
        self.preserved_files = preserved_files;
        self
    }

    pub fn with_staging_parent(mut self, staging_parent: &str) -> Result<Self> {
        self.staging_parent = if staging_parent.trim().is_empty() {
            RemotePath::login_root()
        } else {
            parse_remote_dir("staging parent", staging_parent)?
        };
        Ok(self)
    }

    pub fn sites_dir(&self) -> RemotePath {
        self.site_root.join(&self.sites_dir_name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.site_root == self.backup_dir {
            return Err(anyhow!(
                "backup directory must differ from the site root: {}",
                self.site_root
            ));
        }
        if self.backup_dir.starts_with(&self.site_root) {
            return Err(anyhow!(
                "backup directory {} must not live inside the site root {}; it would be swapped away",
                self.backup_dir,
                self.site_root
            ));
        }
        for (label, value) in [
            ("sites directory name", &self.sites_dir_name),
            ("old tree prefix", &self.old_tree_prefix),
            ("maintenance .htaccess name", &self.maintenance.htaccess_name),
            ("maintenance page name", &self.maintenance.page_name),
        ] {
            if value.trim().is_empty() || value.contains('/') {
                return Err(anyhow!("{label} must be a plain, non-empty name: '{value}'"));
            }
        }
        Ok(())
    }
}

fn parse_remote_dir(label: &str, raw: &str) -> Result<RemotePath> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(anyhow!("{label} must not be empty"));
    }
    if trimmed.contains("//") {
        return Err(anyhow!(
            "{label} must not contain duplicate separators: {raw}"
        ));
    }
    Ok(RemotePath::new(trimmed))
}

/// On-disk TOML configuration; every field is optional so command-line flags can fill gaps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub connection: ConnectionSection,
    #[serde(default)]
    pub site: SiteSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteSection {
    pub root: Option<String>,
    pub backup_dir: Option<String>,
    pub preserved_files: Option<Vec<String>>,
    pub sites_dir_name: Option<String>,
    pub staging_parent: Option<String>,
    pub old_tree_prefix: Option<String>,
    pub maintenance_htaccess: Option<PathBuf>,
    pub maintenance_page: Option<PathBuf>,
}

impl ConfigFile {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("failed to parse siteswap config")
    }

    pub fn load(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    /// Builds the swap layout from the `[site]` table; `site_root` overrides `site.root`.
    pub fn swap_config(&self, site_root: Option<&str>) -> Result<SwapConfig> {
        let root = site_root
            .or(self.site.root.as_deref())
            .ok_or_else(|| anyhow!("site root is required (--site-root or [site].root)"))?;
        let mut config = SwapConfig::new(root)?;
        if let Some(backup_dir) = &self.site.backup_dir {
            config = config.with_backup_dir(backup_dir)?;
        }
        if let Some(names) = &self.site.preserved_files {
            config = config.with_preserved_files(PreservedFileSet::new(names.iter().cloned())?);
        }
        if let Some(name) = &self.site.sites_dir_name {
            config.sites_dir_name = name.trim().to_string();
        }
        if let Some(parent) = &self.site.staging_parent {
            config = config.with_staging_parent(parent)?;
        }
        if let Some(prefix) = &self.site.old_tree_prefix {
            config.old_tree_prefix = prefix.trim().to_string();
        }
        config.maintenance.htaccess_source = self.site.maintenance_htaccess.clone();
        config.maintenance.page_source = self.site.maintenance_page.clone();
        config.validate()?;
        Ok(config)
    }
}
