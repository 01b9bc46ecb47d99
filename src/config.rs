//! Application configuration, merged from defaults, the TOML config file,
//! environment variables, and CLI overrides (strongest last).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::core::models::BackupIdentity;

pub const CONFIG_FILE: &str = "adbak.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path or name of the adb binary.
    pub adb_path: PathBuf,
    /// Local root under which backed-up folders are staged.
    pub backup_root: PathBuf,
    /// Base of shared storage on devices.
    pub device_storage: String,
    pub backup_device_model: String,
    pub backup_device_product: String,
    /// Bound for scans, listings, and service startup.
    pub scan_timeout_secs: u64,
    /// Bound for each individual file transfer.
    pub transfer_timeout_secs: u64,
    pub verbose: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            adb_path: PathBuf::from("adb"),
            backup_root: PathBuf::from("backups"),
            device_storage: "/sdcard".to_string(),
            backup_device_model: "Pixel_5".to_string(),
            backup_device_product: "redfin".to_string(),
            scan_timeout_secs: 15,
            transfer_timeout_secs: 300,
            verbose: false,
        }
    }
}

impl AppConfig {
    pub fn new<T: Serialize>(cli: Option<&T>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed("ADBAK_"));

        if let Some(cli) = cli {
            figment = figment.merge(Serialized::defaults(cli));
        }

        figment.extract()
    }

    pub fn backup_identity(&self) -> BackupIdentity {
        BackupIdentity {
            model: self.backup_device_model.clone(),
            product: self.backup_device_product.clone(),
        }
    }

    pub fn set_backup_identity(&mut self, model: &str, product: &str) {
        self.backup_device_model = model.trim().to_string();
        self.backup_device_product = product.trim().to_string();
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }

    /// Persist the current configuration to the config file.
    pub fn save(&self) -> Result<()> {
        self.save_to(Path::new(CONFIG_FILE))
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }
}
