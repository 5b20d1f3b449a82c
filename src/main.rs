// Camwatch CLI binary

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use camwatch_lib::camera::{devices, CameraRecord, CameraStatus, NewCamera};
use camwatch_lib::probe::{DeviceEnumerator, SystemEnumerator};
use camwatch_lib::reconcile::{self, ReconcileSummary};
use camwatch_lib::{db, init_logging, start_reconciliation_loop, tools, Config, SqliteSessionFactory};

#[derive(Parser)]
#[command(name = "camwatch")]
#[command(about = "Camwatch - keeps the camera inventory in sync with attached devices", long_about = None)]
#[command(version)]
struct Cli {
    /// Database file (defaults to ~/.camwatch/camwatch.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// JSON config file (defaults to ~/.camwatch/config.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reconcile loop until interrupted
    Run {
        /// Seconds between cycles
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Run a single reconcile cycle and exit
    Sync {
        #[arg(long)]
        json: bool,
    },

    /// Probe attached devices without touching the database
    Scan {
        #[arg(long)]
        json: bool,
    },

    /// List cameras in the inventory
    List {
        #[arg(long)]
        json: bool,
        /// Only show one status (ACTIVE, DISCONNECTED, ERROR)
        #[arg(long)]
        status: Option<CameraStatus>,
    },

    /// Show one camera
    Show {
        /// Camera ID
        id: i64,
        #[arg(long)]
        json: bool,
    },

    /// Register a camera by hand
    Add {
        /// Identity key, e.g. /dev/video0 or Index_0
        #[arg(long)]
        device_id: String,
        /// Defaults to the device id
        #[arg(long)]
        unique_id: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        rtsp_url: Option<String>,
        #[arg(long)]
        backend: Option<String>,
        #[arg(long)]
        prefer_gst: bool,
    },

    /// Mark a camera ACTIVE
    Connect {
        id: i64,
    },

    /// Mark a camera DISCONNECTED
    Disconnect {
        id: i64,
    },

    /// Set a camera's status, including ERROR
    SetStatus {
        id: i64,
        status: CameraStatus,
    },

    /// Delete one camera, or all with --all
    Delete {
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        id: Option<i64>,
        #[arg(long)]
        all: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, warnings) = load_config(&cli)?;
    init_logging(config.level_filter());
    for warning in &warnings {
        log::warn!("{}", warning);
    }

    match cli.command {
        Commands::Run { .. } => cmd_run(config),
        Commands::Sync { json } => cmd_sync(&config, json),
        Commands::Scan { json } => cmd_scan(&config, json),
        Commands::List { json, status } => cmd_list(&config, json, status),
        Commands::Show { id, json } => cmd_show(&config, id, json),
        Commands::Add {
            device_id,
            unique_id,
            name,
            display_name,
            rtsp_url,
            backend,
            prefer_gst,
        } => cmd_add(
            &config,
            NewCamera {
                device_id,
                unique_id,
                name,
                display_name,
                rtsp_url,
                backend,
                prefer_gst,
            },
        ),
        Commands::Connect { id } => cmd_set_status(&config, id, CameraStatus::Active),
        Commands::Disconnect { id } => cmd_set_status(&config, id, CameraStatus::Disconnected),
        Commands::SetStatus { id, status } => cmd_set_status(&config, id, status),
        Commands::Delete { id, all } => cmd_delete(&config, id, all),
    }
}

/// Defaults < config file < environment < flags
fn load_config(cli: &Cli) -> Result<(Config, Vec<String>)> {
    let loaded = Config::load(cli.config.as_deref())?;
    let mut config = loaded.config;

    if let Some(ref db) = cli.db {
        config.db_path = db.clone();
    }
    if let Some(ref level) = cli.log_level {
        config.log_level = level.clone();
    }
    if let Commands::Run { interval: Some(secs) } = cli.command {
        config.interval_secs = secs;
    }

    config.validate()?;
    Ok((config, loaded.warnings))
}

fn open_inventory(config: &Config) -> Result<Connection> {
    db::open_db(&config.db_path)
}

fn cmd_run(config: Config) -> Result<()> {
    // Migrate up front; the loop only opens short-lived connections
    open_inventory(&config)?;

    let enumerator = SystemEnumerator::from_config(&config);
    warn_if_probe_tool_missing(&enumerator);

    log::info!(
        "Watching cameras every {}s (database: {})",
        config.interval_secs,
        config.db_path.display()
    );

    let handle = start_reconciliation_loop(
        SqliteSessionFactory::new(&config.db_path),
        enumerator,
        config.interval(),
    )?;

    handle
        .join()
        .map_err(|_| anyhow::anyhow!("Reconcile loop thread panicked"))
}

fn cmd_sync(config: &Config, json: bool) -> Result<()> {
    let conn = open_inventory(config)?;
    let enumerator = SystemEnumerator::from_config(config);
    warn_if_probe_tool_missing(&enumerator);

    let summary = reconcile::reconcile_once(&conn, &enumerator)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn cmd_scan(config: &Config, json: bool) -> Result<()> {
    let enumerator = SystemEnumerator::from_config(config);
    warn_if_probe_tool_missing(&enumerator);

    let found = enumerator.enumerate();

    if json {
        let list: Vec<_> = found.values().collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    if found.is_empty() {
        println!("No cameras detected.");
        return Ok(());
    }

    println!("{:<20}  {:>5}  {}", "Identity", "Index", "Name");
    println!("{}", "-".repeat(60));
    for obs in found.values() {
        let index = obs
            .os_index
            .map(|i| i.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<20}  {:>5}  {}", obs.identity_key, index, obs.name);
    }

    Ok(())
}

fn cmd_list(config: &Config, json: bool, status: Option<CameraStatus>) -> Result<()> {
    let conn = open_inventory(config)?;

    let cameras = match status {
        Some(s) => devices::get_cameras_by_status(&conn, s)?,
        None => devices::get_all_cameras(&conn)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&cameras)?);
        return Ok(());
    }

    let (total, connected) = devices::count_cameras(&conn)?;
    println!("Inventory: {} cameras ({} connected)", total, connected);
    println!();

    if cameras.is_empty() {
        println!("No cameras found. Use 'camwatch sync' to detect attached devices.");
        return Ok(());
    }

    println!("{:>5}  {:<13}  {:<20}  {}", "ID", "Status", "Device", "Name");
    println!("{}", "-".repeat(70));

    for cam in cameras {
        let name = cam
            .display_name
            .as_deref()
            .or(cam.name.as_deref())
            .unwrap_or("-");
        let name = if name.chars().count() > 30 {
            format!("{}...", name.chars().take(27).collect::<String>())
        } else {
            name.to_string()
        };

        println!("{:>5}  {:<13}  {:<20}  {}", cam.id, cam.status, cam.device_id, name);
    }

    Ok(())
}

fn cmd_show(config: &Config, id: i64, json: bool) -> Result<()> {
    let conn = open_inventory(config)?;

    let cam = devices::get_camera(&conn, id)?
        .ok_or_else(|| anyhow::anyhow!("Camera {} not found", id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&cam)?);
    } else {
        print_camera(&cam);
    }

    Ok(())
}

fn cmd_add(config: &Config, camera: NewCamera) -> Result<()> {
    let conn = open_inventory(config)?;
    let cam = devices::insert_camera(&conn, &camera)?;
    println!("Added camera #{} ({})", cam.id, cam.device_id);
    Ok(())
}

fn cmd_set_status(config: &Config, id: i64, status: CameraStatus) -> Result<()> {
    let conn = open_inventory(config)?;
    let cam = devices::set_status(&conn, id, status)?;
    println!("Camera #{} ({}) is now {}", cam.id, cam.device_id, cam.status);
    Ok(())
}

fn cmd_delete(config: &Config, id: Option<i64>, all: bool) -> Result<()> {
    let conn = open_inventory(config)?;

    if all {
        let removed = devices::delete_all_cameras(&conn)?;
        println!("Deleted {} cameras", removed);
        return Ok(());
    }

    let id = id.ok_or_else(|| anyhow::anyhow!("Camera id required (or --all)"))?;
    let cam = devices::delete_camera(&conn, id)?;
    println!("Deleted camera #{} ({})", cam.id, cam.device_id);
    Ok(())
}

fn warn_if_probe_tool_missing(enumerator: &SystemEnumerator) {
    if cfg!(target_os = "linux") && !tools::is_tool_available(&enumerator.v4l2_ctl) {
        log::warn!(
            "v4l2-ctl not found at {}; devices will be skipped. Install v4l-utils or set CAMWATCH_V4L2CTL_PATH.",
            enumerator.v4l2_ctl.display()
        );
    }
}

fn print_summary(summary: &ReconcileSummary) {
    println!("Sync complete:");
    println!("  Observed:      {}", summary.observed);
    println!("  Created:       {}", summary.created);
    println!("  Refreshed:     {}", summary.refreshed);
    println!("  Reconnected:   {}", summary.reconnected);
    println!("  Disconnected:  {}", summary.disconnected);
    println!("  Untouched:     {}", summary.untouched);
}

fn print_camera(cam: &CameraRecord) {
    println!("Camera #{}", cam.id);
    println!();
    println!("Status:       {}", cam.status);
    println!("Device ID:    {}", cam.device_id);
    println!("Unique ID:    {}", cam.unique_id);

    if let Some(ref name) = cam.name {
        println!("Name:         {}", name);
    }
    if let Some(ref display_name) = cam.display_name {
        println!("Display name: {}", display_name);
    }
    if let Some(ref path) = cam.device_path {
        println!("Device path:  {}", path);
    }
    if let Some(index) = cam.os_index {
        println!("OS index:     {}", index);
    }
    if let Some(ref url) = cam.rtsp_url {
        println!("RTSP URL:     {}", url);
    }
    if let Some(ref backend) = cam.backend {
        let gst = if cam.prefer_gst { " (prefers GStreamer)" } else { "" };
        println!("Backend:      {}{}", backend, gst);
    }

    println!("Created:      {}", cam.created_at);
}
