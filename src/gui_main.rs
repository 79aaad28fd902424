use anyhow::Context;
use clap::Parser;
use eframe::egui;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use vmpanel::{
    ApiClient, ClusterWorkspace, HttpApiClient, Selection, VmControlPanel, Workspace,
    config::PanelConfig, gui_panel::VmPanelGui, log_error, log_info, logger,
    tabs::TAB_STATE_KEY, theme,
};

#[derive(Parser)]
#[command(name = "vmpanel-gui")]
#[command(about = "Desktop control panel for a QEMU virtual machine")]
struct GuiArgs {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    node: Option<String>,

    #[arg(long)]
    vmid: Option<u32>,

    /// Display name used in the title
    #[arg(long)]
    name: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = GuiArgs::parse();
    if args.verbose {
        logger::init_verbose_logger();
    } else {
        logger::init_logger();
    }

    let config_path = args.config.clone().unwrap_or_else(PanelConfig::default_path);
    let config = PanelConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let runtime = Runtime::new().context("failed to initialize Tokio runtime")?;
    let api: Arc<dyn ApiClient> = Arc::new(
        runtime
            .block_on(HttpApiClient::connect(&config.api))
            .with_context(|| format!("connecting to {}", config.api.base_url))?,
    );

    let selection = Selection {
        node: args.node.clone(),
        vmid: args.vmid,
        name: args.name.clone(),
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([960.0, 640.0])
            .with_min_inner_size([720.0, 480.0])
            .with_title("VM Panel"),
        ..Default::default()
    };

    log_info!("Starting VM panel against {}", config.api.base_url);
    eframe::run_native(
        "vmpanel",
        options,
        Box::new(move |cc| Box::new(PanelApp::new(cc, runtime, api, config, selection))),
    )
    .map_err(|e| anyhow::anyhow!("GUI failed: {}", e))
}

// `view` is dropped first: the panel stops its poller while the runtime is still alive.
struct PanelApp {
    view: Option<VmPanelGui>,
    runtime: Runtime,
    api: Arc<dyn ApiClient>,
    workspace: Arc<ClusterWorkspace>,
    config: PanelConfig,
    saved_tab: Option<String>,

    // Selection form, shown while no panel is open
    node_input: String,
    vmid_input: String,
    open_error: Option<String>,
}

impl PanelApp {
    fn new(
        cc: &eframe::CreationContext<'_>,
        runtime: Runtime,
        api: Arc<dyn ApiClient>,
        config: PanelConfig,
        selection: Selection,
    ) -> Self {
        theme::configure_theme(&cc.egui_ctx, &config.ui);

        let saved_tab = cc
            .storage
            .and_then(|storage| eframe::get_value::<String>(storage, TAB_STATE_KEY));

        let workspace = Arc::new(ClusterWorkspace::new(
            api.clone(),
            runtime.handle().clone(),
            config.api.origin(),
        ));

        let mut app = Self {
            view: None,
            runtime,
            api,
            workspace,
            config,
            saved_tab,
            node_input: selection.node.clone().unwrap_or_default(),
            vmid_input: selection.vmid.map(|v| v.to_string()).unwrap_or_default(),
            open_error: None,
        };

        if selection.node.is_some() || selection.vmid.is_some() {
            app.open_panel(&selection);
        }
        app
    }

    fn open_panel(&mut self, selection: &Selection) {
        // Drop the old panel first so its poller stops before the new one starts.
        self.view = None;
        // Results of lookups started for earlier panels no longer apply.
        self.workspace.clear_relocations();

        let workspace: Arc<dyn Workspace> = self.workspace.clone();
        match VmControlPanel::new(
            selection,
            self.api.clone(),
            workspace,
            &self.config,
            self.runtime.handle().clone(),
        ) {
            Ok(mut panel) => {
                if let Some(tab) = &self.saved_tab {
                    panel.tabs_mut().select_item_id(tab);
                }
                self.open_error = None;
                self.view = Some(VmPanelGui::new(panel, self.config.ui.show_event_log));
            }
            Err(err) => {
                log_error!("Cannot open panel: {}", err);
                self.open_error = Some(err.to_string());
            }
        }
    }

    fn draw_selection_form(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Open virtual machine");
            egui::Grid::new("vm-selection").num_columns(2).show(ui, |ui| {
                ui.label("Node");
                ui.text_edit_singleline(&mut self.node_input);
                ui.end_row();
                ui.label("VM ID");
                ui.text_edit_singleline(&mut self.vmid_input);
                ui.end_row();
            });

            if ui.button("Open").clicked() {
                let node = self.node_input.trim();
                let selection = Selection {
                    node: (!node.is_empty()).then(|| node.to_string()),
                    vmid: self.vmid_input.trim().parse().ok(),
                    name: None,
                };
                self.open_panel(&selection);
            }

            if let Some(err) = &self.open_error {
                ui.colored_label(theme::STATUS_STOPPED, err);
            }
        });
    }
}

impl eframe::App for PanelApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let open_vmid = self.view.as_ref().map(|view| view.panel().identity().vmid());
        if let Some(moved) = open_vmid.and_then(|vmid| self.workspace.take_relocation(vmid)) {
            log_info!(
                "Following VM to node '{}'",
                moved.node.as_deref().unwrap_or_default()
            );
            self.open_panel(&moved);
        }

        let mut close = false;
        match self.view.as_mut() {
            Some(view) => {
                egui::TopBottomPanel::bottom("vm-panel-footer").show(ctx, |ui| {
                    if ui.button("Close").clicked() {
                        close = true;
                    }
                });
                view.show(ctx);
            }
            None => self.draw_selection_form(ctx),
        }

        if close {
            if let Some(view) = self.view.as_mut() {
                view.panel_mut().destroy();
            }
            self.view = None;
        }

        let interval = self.config.poller.interval().min(Duration::from_secs(1));
        ctx.request_repaint_after(interval);
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        if let Some(view) = &self.view {
            let tab = view.panel().tabs().active().item_id().to_string();
            eframe::set_value(storage, TAB_STATE_KEY, &tab);
            self.saved_tab = Some(tab);
        }
    }
}
