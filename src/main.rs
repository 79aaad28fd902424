use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use vmpanel::{
    ApiClient, ClusterWorkspace, HttpApiClient, PanelButton, PressOutcome, Selection,
    StatusSnapshot, VmControlPanel, api::fetch_status, config::PanelConfig, logger,
};

#[derive(Parser)]
#[command(name = "vmpanel")]
#[command(about = "Control a QEMU virtual machine on a Proxmox VE cluster")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Clone)]
struct Target {
    /// Node the VM lives on
    #[arg(long)]
    node: Option<String>,
    /// VM id
    #[arg(long)]
    vmid: Option<u32>,
}

impl Target {
    fn selection(&self) -> Selection {
        Selection {
            node: self.node.clone(),
            vmid: self.vmid,
            name: None,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current status of a VM
    Status {
        #[command(flatten)]
        target: Target,
        /// Print the raw status record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Follow status changes and the resulting button states
    Watch {
        #[command(flatten)]
        target: Target,
        /// Poll interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Start a VM
    Start {
        #[command(flatten)]
        target: Target,
    },
    /// Stop a VM immediately
    Stop {
        #[command(flatten)]
        target: Target,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Seconds the server waits before giving up
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Reset a VM
    Reset {
        #[command(flatten)]
        target: Target,
        #[arg(short, long)]
        yes: bool,
    },
    /// Ask the guest to shut down
    Shutdown {
        #[command(flatten)]
        target: Target,
        #[arg(short, long)]
        yes: bool,
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Migrate a VM to another node
    Migrate {
        #[command(flatten)]
        target: Target,
        /// Destination node
        #[arg(long)]
        to: String,
        /// Live migration of a running VM
        #[arg(long)]
        online: bool,
    },
    /// Remove a VM and all of its data
    Remove {
        #[command(flatten)]
        target: Target,
        #[arg(short, long)]
        yes: bool,
    },
    /// Open the web console
    Console {
        #[command(flatten)]
        target: Target,
    },
}

const FIRST_STATUS_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        logger::init_verbose_logger();
    } else {
        logger::init_logger();
    }

    let config_path = cli.config.clone().unwrap_or_else(PanelConfig::default_path);
    let mut config = PanelConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let api: Arc<dyn ApiClient> = Arc::new(
        HttpApiClient::connect(&config.api)
            .await
            .with_context(|| format!("connecting to {}", config.api.base_url))?,
    );

    match cli.command {
        Commands::Status { target, json } => {
            let panel = build_panel(&target, api.clone(), &config)?;
            let record = fetch_status(api.as_ref(), panel.identity()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!("{}", panel.title());
                println!("status: {}", record.vm_status());
                if let Some(uptime) = record.uptime {
                    println!("uptime: {}s", uptime);
                }
            }
        }
        Commands::Watch {
            target,
            interval_ms,
        } => {
            if let Some(interval_ms) = interval_ms {
                config.poller.interval_ms = interval_ms.max(1);
            }
            let mut panel = build_panel(&target, api, &config)?;
            watch(&mut panel).await?;
        }
        Commands::Start { target } => {
            let mut panel = build_panel(&target, api, &config)?;
            run_button(&mut panel, PanelButton::Start, true).await?;
        }
        Commands::Stop {
            target,
            yes,
            timeout,
        } => {
            if let Some(timeout) = timeout {
                config.commands.stop_timeout_seconds = timeout;
            }
            let mut panel = build_panel(&target, api, &config)?;
            run_button(&mut panel, PanelButton::Stop, yes).await?;
        }
        Commands::Reset { target, yes } => {
            let mut panel = build_panel(&target, api, &config)?;
            run_button(&mut panel, PanelButton::Reset, yes).await?;
        }
        Commands::Shutdown {
            target,
            yes,
            timeout,
        } => {
            if let Some(timeout) = timeout {
                config.commands.shutdown_timeout_seconds = timeout;
            }
            let mut panel = build_panel(&target, api, &config)?;
            run_button(&mut panel, PanelButton::Shutdown, yes).await?;
        }
        Commands::Migrate { target, to, online } => {
            let mut panel = build_panel(&target, api, &config)?;
            wait_for_status(&panel).await;
            if !matches!(
                panel.press(PanelButton::Migrate),
                PressOutcome::MigrationDialogOpened
            ) {
                bail!("migration is not available for VM {}", panel.identity());
            }
            if let Some(dialog) = panel.migration_dialog_mut() {
                dialog.target = to.clone();
                dialog.online = online;
            }
            panel.submit_migration()?.await?;
            finish(&panel, &format!("migration to '{}'", to))?;
        }
        Commands::Remove { target, yes } => {
            let mut panel = build_panel(&target, api, &config)?;
            run_button(&mut panel, PanelButton::Remove, yes).await?;
        }
        Commands::Console { target } => {
            let mut panel = build_panel(&target, api, &config)?;
            run_button(&mut panel, PanelButton::Console, true).await?;
        }
    }

    Ok(())
}

fn build_panel(
    target: &Target,
    api: Arc<dyn ApiClient>,
    config: &PanelConfig,
) -> anyhow::Result<VmControlPanel> {
    let runtime = Handle::current();
    let workspace = Arc::new(ClusterWorkspace::new(
        api.clone(),
        runtime.clone(),
        config.api.origin(),
    ));
    Ok(VmControlPanel::new(
        &target.selection(),
        api,
        workspace,
        config,
        runtime,
    )?)
}

/// Start polling and wait for the first response, so the buttons reflect the
/// real VM state before anything is pressed.
async fn wait_for_status(panel: &VmControlPanel) -> StatusSnapshot {
    let mut handle = panel.status_handle();
    panel.after_render();
    let _ = tokio::time::timeout(FIRST_STATUS_TIMEOUT, handle.changed()).await;
    handle.latest()
}

async fn run_button(
    panel: &mut VmControlPanel,
    button: PanelButton,
    assume_yes: bool,
) -> anyhow::Result<()> {
    let snapshot = wait_for_status(panel).await;

    match panel.press(button) {
        PressOutcome::Disabled => {
            bail!(
                "{} is not available while VM {} is {}",
                button.label(),
                panel.identity(),
                snapshot.status
            );
        }
        PressOutcome::AwaitingConfirmation(message) => {
            if !assume_yes && !prompt_yes_no(&message)? {
                panel.cancel_confirmation();
                println!("Aborted.");
                return Ok(());
            }
            match panel.confirm() {
                Some(task) => task.await?,
                None => bail!(
                    "{} is no longer available for VM {} (status changed to {})",
                    button.label(),
                    panel.identity(),
                    panel.status_handle().status()
                ),
            }
        }
        PressOutcome::Dispatched(task) => task.await?,
        PressOutcome::ConsoleOpened => {
            println!("Console opened for VM {}", panel.identity());
            return Ok(());
        }
        PressOutcome::Alerted | PressOutcome::MigrationDialogOpened => {}
    }

    finish(panel, &button.label().to_lowercase())
}

fn finish(panel: &VmControlPanel, what: &str) -> anyhow::Result<()> {
    if let Some(alert) = panel.alerts().drain().into_iter().next() {
        bail!("{}: {}", alert.title, alert.message);
    }
    println!("VM {}: {} requested", panel.identity(), what);
    Ok(())
}

fn prompt_yes_no(message: &str) -> anyhow::Result<bool> {
    print!("{} [y/N]: ", message);
    io::stdout().flush().ok();

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("reading confirmation")?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

async fn watch(panel: &mut VmControlPanel) -> anyhow::Result<()> {
    let mut handle = panel.status_handle();
    println!("{}", panel.title());
    panel.after_render();

    loop {
        tokio::select! {
            changed = handle.changed() => {
                if !changed {
                    break;
                }
                let snapshot = handle.latest();
                let states = panel.button_states();
                let enabled: Vec<&str> = PanelButton::TOOLBAR
                    .iter()
                    .filter(|button| states.is_enabled(**button))
                    .map(|button| button.label())
                    .collect();
                println!(
                    "{} status={}{} enabled=[{}]",
                    chrono::Local::now().format("%H:%M:%S"),
                    snapshot.status,
                    if snapshot.poll_failed { " (poll failed)" } else { "" },
                    enabled.join(", ")
                );
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    panel.destroy();
    Ok(())
}
