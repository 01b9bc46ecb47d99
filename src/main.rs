use std::path::PathBuf;
use std::sync::Arc;

use adbak::context::AppContext;
use adbak::core::models::{
    ClassifiedDevices, DeletionOutcome, Device, DeviceState, TransferResult,
};
use adbak::core::Session;
use adbak::transport::AdbTransport;
use adbak::{config, logging};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "adbak")]
#[command(about = "Android photo backup over adb", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    overrides: ConfigArgs,

    /// Emit machine-readable JSON instead of plain summaries.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Args, Serialize)]
struct ConfigArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    adb_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    backup_root: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    transfer_timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    verbose: Option<bool>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan and classify attached devices
    Scan,
    /// List top-level folders on a device's shared storage
    Folders {
        #[arg(long)]
        device: String,
    },
    /// Reconcile one device folder into the local backup root
    Backup {
        #[arg(long)]
        device: String,
        #[arg(long)]
        folder: String,
    },
    /// Move photos from an origin device to the backup device
    Sync {
        /// Origin serial; may be omitted when exactly one origin is attached
        #[arg(long)]
        origin: Option<String>,
        /// Delete confirmed-copied photos from the origin afterwards
        #[arg(long)]
        delete_origin: bool,
    },
    /// Push local files into the device Documents folder
    Push {
        #[arg(long)]
        device: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Attach a device over wireless adb
    Connect {
        #[arg(long)]
        host: String,
        #[arg(long)]
        port: u16,
    },
    /// Pair with a device over wireless adb
    Pair {
        #[arg(long)]
        host: String,
        #[arg(long)]
        port: u16,
        #[arg(long)]
        code: String,
    },
    /// Persist the backup device identity to the config file
    SetBackupDevice {
        #[arg(long)]
        model: String,
        #[arg(long)]
        product: String,
    },
    /// Stop the adb daemon
    KillServer,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        config::AppConfig::new(Some(&cli.overrides)).context("Failed to load configuration")?;
    logging::init(logging::LogConfig {
        json: cli.json,
        verbose: config.verbose,
    });

    // Config-only command, no transport needed.
    if let Commands::SetBackupDevice { model, product } = &cli.command {
        config.set_backup_identity(model, product);
        config.save().context("Failed to save configuration")?;
        println!("Backup device set to {}", config.backup_identity());
        return Ok(());
    }

    let transport = Arc::new(AdbTransport::new(config.adb_path.clone()));
    let ctx = AppContext::new(config, transport);
    let mut session = Session::new(ctx.clone());

    match &cli.command {
        Commands::KillServer => {
            session.shutdown().await.context("Failed to stop adb")?;
            println!("adb daemon stopped");
            return Ok(());
        }
        Commands::Connect { host, port } => {
            init_session(&mut session).await?;
            let message = session.connect(&format!("{host}:{port}")).await?;
            println!("{message}");
            let count = session.rescan().await?;
            println!("{count} device(s) attached");
            return Ok(());
        }
        Commands::Pair { host, port, code } => {
            init_session(&mut session).await?;
            let message = session.pair(&format!("{host}:{port}"), code).await?;
            println!("{message}");
            return Ok(());
        }
        _ => {}
    }

    init_session(&mut session).await?;

    match &cli.command {
        Commands::Scan => {
            let classified = session.classified();
            show_devices(&ctx, session.devices(), &classified, cli.json)?;
        }
        Commands::Folders { device } => {
            let folders = session.list_folders(device).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&folders)?);
            } else if folders.is_empty() {
                println!("No folders found on {device}");
            } else {
                for folder in folders {
                    println!("{folder}");
                }
            }
        }
        Commands::Backup { device, folder } => {
            let result = session.backup_folder(device, folder).await?;
            show_result("Backup", &result, None, cli.json)?;
        }
        Commands::Sync {
            origin,
            delete_origin,
        } => {
            let (result, deletion) = session
                .sync_photos(origin.as_deref(), *delete_origin)
                .await?;
            show_result("Sync", &result, deletion.as_ref(), cli.json)?;
        }
        Commands::Push { device, files } => {
            let (planned, pushed) = session.push_files(device, files).await?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "planned": planned, "pushed": pushed })
                );
            } else {
                println!("Pushed {pushed} of {planned} file(s)");
            }
        }
        // Handled above.
        Commands::Connect { .. }
        | Commands::Pair { .. }
        | Commands::SetBackupDevice { .. }
        | Commands::KillServer => unreachable!(),
    }

    Ok(())
}

async fn init_session(session: &mut Session) -> Result<usize> {
    session
        .initialize()
        .await
        .context("adb initialization failed")
}

fn show_devices(
    ctx: &AppContext,
    devices: &[Device],
    classified: &ClassifiedDevices,
    json: bool,
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(classified)?);
        return Ok(());
    }

    let identity = ctx.config.backup_identity();
    match &classified.backup {
        Some(backup) => println!("Backup device {identity}: connected ({})", backup.serial),
        None => println!("Backup device {identity}: not connected"),
    }

    if devices.is_empty() {
        println!("No devices found");
        return Ok(());
    }

    for device in devices {
        let is_backup = classified
            .backup
            .as_ref()
            .is_some_and(|b| b.serial == device.serial);
        let tag = if is_backup {
            " [BACKUP]"
        } else {
            match device.state {
                DeviceState::Connected => "",
                DeviceState::Offline => " [OFFLINE]",
                DeviceState::Unauthorized => " [UNAUTHORIZED]",
            }
        };
        println!(
            "  {}  {} ({}){}",
            device.serial, device.model, device.product, tag
        );
    }
    Ok(())
}

fn show_result(
    title: &str,
    result: &TransferResult,
    deletion: Option<&DeletionOutcome>,
    json: bool,
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("{title} summary");
    println!(
        "  Pulled: {}/{}",
        result.pulled_count, result.to_be_pulled_count
    );
    if result.to_be_pushed_count > 0 || result.pushed_count > 0 {
        println!(
            "  Pushed: {}/{}",
            result.pushed_count, result.to_be_pushed_count
        );
    }
    println!(
        "  Outcome: {}",
        if result.all_files_synced {
            "complete"
        } else {
            "partial"
        }
    );
    if let Some(deletion) = deletion {
        println!(
            "  Origin cleanup: {} of {} deleted{}",
            deletion.deleted,
            deletion.eligible,
            match result.delete_completed {
                Some(true) => " (complete)",
                _ => " (incomplete)",
            }
        );
        for failure in &deletion.failures {
            println!("    failed: {} ({})", failure.path, failure.reason);
        }
    }
    println!("  Local folder: {}", result.folder_path.display());
    Ok(())
}
