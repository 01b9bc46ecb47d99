//! Transport implementation spawning the `adb` binary.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::core::models::{Device, DeviceState, FileEntry};
use crate::error::TransportError;
use crate::transport::Transport;

pub struct AdbTransport {
    adb_path: PathBuf,
}

impl AdbTransport {
    pub fn new(adb_path: impl Into<PathBuf>) -> Self {
        Self {
            adb_path: adb_path.into(),
        }
    }

    /// Run adb with the given arguments and return trimmed stdout.
    async fn run<I, S>(&self, args: I) -> Result<String, TransportError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = Command::new(&self.adb_path)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    TransportError::Unavailable(format!(
                        "adb binary not found at '{}'",
                        self.adb_path.display()
                    ))
                } else {
                    TransportError::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(TransportError::Command(detail));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn shell(&self, serial: &str, command: String) -> Result<String, TransportError> {
        self.run(["-s", serial, "shell", command.as_str()]).await
    }
}

#[async_trait]
impl Transport for AdbTransport {
    async fn check_dependencies(&self) -> Result<(), TransportError> {
        match self.run(["version"]).await {
            Ok(version) => {
                debug!(%version, "adb binary found");
                Ok(())
            }
            Err(TransportError::Unavailable(msg)) => Err(TransportError::Unavailable(msg)),
            Err(err) => Err(TransportError::Unavailable(err.to_string())),
        }
    }

    async fn start_service(&self) -> Result<(), TransportError> {
        self.run(["start-server"]).await?;
        Ok(())
    }

    async fn stop_service(&self) -> Result<(), TransportError> {
        self.run(["kill-server"]).await?;
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<Device>, TransportError> {
        let output = self.run(["devices", "-l"]).await?;
        Ok(parse_devices(&output))
    }

    async fn list_remote_files(
        &self,
        serial: &str,
        folder: &str,
    ) -> Result<Vec<FileEntry>, TransportError> {
        // `|| true` keeps a missing folder from failing the command; it
        // just produces an empty listing.
        let command = format!(
            "find {} -maxdepth 1 -type f -exec stat -c '%s %Y %n' {{}} + 2>/dev/null || true",
            shell_quote(folder)
        );
        let output = self.shell(serial, command).await?;
        Ok(parse_file_listing(&output, folder))
    }

    async fn list_remote_dirs(
        &self,
        serial: &str,
        folder: &str,
    ) -> Result<Vec<String>, TransportError> {
        let command = format!(
            "find {} -mindepth 1 -maxdepth 1 -type d 2>/dev/null || true",
            shell_quote(folder)
        );
        let output = self.shell(serial, command).await?;

        let mut dirs: Vec<String> = output
            .lines()
            .filter_map(|line| line.trim().rsplit('/').next())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    async fn list_local_files(&self, folder: &Path) -> Result<Vec<FileEntry>, TransportError> {
        let folder = folder.to_path_buf();

        let entries = tokio::task::spawn_blocking(move || -> Result<Vec<FileEntry>, std::io::Error> {
            let read_dir = match std::fs::read_dir(&folder) {
                Ok(rd) => rd,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e),
            };

            let mut files = Vec::new();
            for entry in read_dir {
                let entry = entry?;
                let metadata = entry.metadata()?;
                if !metadata.is_file() {
                    continue;
                }
                let mtime: DateTime<Utc> = metadata.modified()?.into();
                files.push(FileEntry::new(
                    entry.file_name().to_string_lossy().into_owned(),
                    metadata.len(),
                    mtime,
                ));
            }
            files.sort_by(|a, b| a.path.cmp(&b.path));
            Ok(files)
        })
        .await
        .map_err(|e| TransportError::Command(format!("listing task failed: {e}")))??;

        Ok(entries)
    }

    async fn pull(&self, serial: &str, remote: &str, local: &Path) -> Result<(), TransportError> {
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // -a preserves the device mtime; reconciliation depends on it.
        self.run([
            OsStr::new("-s"),
            OsStr::new(serial),
            OsStr::new("pull"),
            OsStr::new("-a"),
            OsStr::new(remote),
            local.as_os_str(),
        ])
        .await?;
        Ok(())
    }

    async fn push(&self, serial: &str, local: &Path, remote: &str) -> Result<(), TransportError> {
        self.run([
            OsStr::new("-s"),
            OsStr::new(serial),
            OsStr::new("push"),
            local.as_os_str(),
            OsStr::new(remote),
        ])
        .await?;
        Ok(())
    }

    async fn delete_remote_file(
        &self,
        serial: &str,
        remote: &str,
    ) -> Result<(), TransportError> {
        self.shell(serial, format!("rm {}", shell_quote(remote)))
            .await?;
        Ok(())
    }

    async fn connect(&self, endpoint: &str) -> Result<String, TransportError> {
        self.run(["connect", endpoint]).await
    }

    async fn pair(&self, endpoint: &str, code: &str) -> Result<String, TransportError> {
        self.run(["pair", endpoint, code]).await
    }
}

/// Parse `adb devices -l` output into the device snapshot.
fn parse_devices(output: &str) -> Vec<Device> {
    let line_re = Regex::new(r"^(\S+)\s+(device|offline|unauthorized)\b(.*)$").unwrap();
    let model_re = Regex::new(r"model:(\S+)").unwrap();
    let product_re = Regex::new(r"product:(\S+)").unwrap();

    let mut devices = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        // Daemon startup banner and the header line carry no devices.
        if line.is_empty() || line.starts_with('*') || line.starts_with("List of devices") {
            continue;
        }
        let Some(caps) = line_re.captures(line) else {
            debug!(%line, "Skipping unrecognized device line");
            continue;
        };

        let state = match &caps[2] {
            "device" => DeviceState::Connected,
            "offline" => DeviceState::Offline,
            _ => DeviceState::Unauthorized,
        };
        let rest = &caps[3];
        let model = model_re
            .captures(rest)
            .map(|c| c[1].to_string())
            .unwrap_or_default();
        let product = product_re
            .captures(rest)
            .map(|c| c[1].to_string())
            .unwrap_or_default();

        devices.push(Device {
            serial: caps[1].to_string(),
            model,
            product,
            state,
        });
    }
    devices
}

/// Parse `stat -c '%s %Y %n'` lines into entries relative to `folder`.
fn parse_file_listing(output: &str, folder: &str) -> Vec<FileEntry> {
    let re = Regex::new(r"^(\d+)\s+(\d+)\s+(.+)$").unwrap();
    let prefix = format!("{}/", folder.trim_end_matches('/'));

    let mut files = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(caps) = re.captures(line) else {
            warn!(%line, "Skipping unparsable listing line");
            continue;
        };
        let (Ok(size), Ok(secs)) = (caps[1].parse::<u64>(), caps[2].parse::<i64>()) else {
            continue;
        };
        let Some(mtime) = Utc.timestamp_opt(secs, 0).single() else {
            continue;
        };

        let path = caps[3].strip_prefix(&prefix).unwrap_or(&caps[3]);
        files.push(FileEntry::new(path, size, mtime));
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

/// Single-quote a path for the device-side shell.
fn shell_quote(path: &str) -> String {
    format!("'{}'", path.replace('\'', r"'\''"))
}
