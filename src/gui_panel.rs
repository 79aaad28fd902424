use crate::buttons::PanelButton;
use crate::instance::StatusRecord;
use crate::panel::{PressOutcome, VmControlPanel};
use crate::poller::StatusSnapshot;
use crate::tabs::SectionId;
use crate::theme;
use chrono::Local;
use eframe::egui;

/// egui front for a [`VmControlPanel`].
pub struct VmPanelGui {
    panel: VmControlPanel,
    rendered: bool,
    show_event_log: bool,
    migration_error: Option<String>,
}

impl VmPanelGui {
    pub fn new(panel: VmControlPanel, show_event_log: bool) -> Self {
        Self {
            panel,
            rendered: false,
            show_event_log,
            migration_error: None,
        }
    }

    pub fn panel(&self) -> &VmControlPanel {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut VmControlPanel {
        &mut self.panel
    }

    pub fn show(&mut self, ctx: &egui::Context) {
        let snapshot = self.panel.status_handle().current();

        egui::TopBottomPanel::top("vm-panel-toolbar").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.heading(self.panel.title());
            self.draw_toolbar(ui, &snapshot);
            ui.add_space(4.0);
            self.draw_tab_bar(ui);
        });

        if self.show_event_log {
            self.draw_event_log(ctx);
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_section(ui, &snapshot);
        });

        self.draw_confirmation(ctx);
        self.draw_migration_dialog(ctx);
        self.draw_alerts(ctx);

        if !self.rendered {
            self.rendered = true;
            self.panel.after_render();
        }
    }

    fn draw_toolbar(&mut self, ui: &mut egui::Ui, snapshot: &StatusSnapshot) {
        let states = self.panel.button_states();

        egui::Frame::default()
            .fill(theme::BG_ELEVATED)
            .stroke(egui::Stroke::new(1.0, theme::BORDER_DEFAULT))
            .rounding(6.0)
            .inner_margin(egui::Margin::symmetric(12.0, 8.0))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    for button in PanelButton::TOOLBAR {
                        let fill = match button {
                            PanelButton::Start => theme::ACTION_START,
                            PanelButton::Stop | PanelButton::Remove => theme::ACTION_DANGER,
                            PanelButton::Reset | PanelButton::Shutdown => theme::ACTION_CAUTION,
                            PanelButton::Migrate | PanelButton::Console => theme::BG_SECONDARY,
                        };
                        let widget = egui::Button::new(button.label())
                            .fill(fill)
                            .min_size(egui::vec2(80.0, 28.0));
                        if ui.add_enabled(states.is_enabled(button), widget).clicked() {
                            self.handle_press(button);
                        }
                    }

                    ui.separator();
                    ui.label(
                        egui::RichText::new(format!(
                            "{} {}",
                            theme::status_icon(&snapshot.status),
                            snapshot.status
                        ))
                        .color(theme::status_color(&snapshot.status))
                        .strong(),
                    );
                    if self.panel.is_busy() {
                        ui.spinner();
                    }
                });
            });
    }

    fn handle_press(&mut self, button: PanelButton) {
        match self.panel.press(button) {
            PressOutcome::MigrationDialogOpened => self.migration_error = None,
            // The task reports back through the alert queue and event log.
            PressOutcome::Dispatched(_)
            | PressOutcome::AwaitingConfirmation(_)
            | PressOutcome::ConsoleOpened
            | PressOutcome::Alerted
            | PressOutcome::Disabled => {}
        }
    }

    fn draw_tab_bar(&mut self, ui: &mut egui::Ui) {
        let active = self.panel.tabs().active();
        ui.horizontal(|ui| {
            for id in SectionId::ALL {
                if ui.selectable_label(active == id, id.title()).clicked() {
                    self.panel.tabs_mut().select(id);
                }
            }
        });
    }

    fn draw_section(&self, ui: &mut egui::Ui, snapshot: &StatusSnapshot) {
        let section = self.panel.tabs().active_section();
        match section.id() {
            SectionId::Summary => self.draw_summary(ui, snapshot),
            SectionId::Permissions => {
                ui.label(format!("permissions {}", self.panel.identity().vmid()));
            }
            other => {
                ui.heading(other.title());
                ui.label(
                    egui::RichText::new(format!(
                        "The {} view for VM {} is provided by its own panel.",
                        other.item_id(),
                        self.panel.identity().vmid()
                    ))
                    .color(theme::TEXT_MUTED),
                );
                ui.label(format!("Current status: {}", section.status().status()));
            }
        }
    }

    fn draw_summary(&self, ui: &mut egui::Ui, snapshot: &StatusSnapshot) {
        let identity = self.panel.identity();
        let record = snapshot.record.clone().unwrap_or_default();

        egui::Grid::new("vm-summary")
            .num_columns(2)
            .striped(true)
            .spacing([24.0, 6.0])
            .show(ui, |ui| {
                summary_row(ui, "Node", identity.node().to_string());
                summary_row(ui, "VM ID", identity.vmid().to_string());
                summary_row(
                    ui,
                    "Name",
                    record
                        .name
                        .clone()
                        .or_else(|| identity.name().map(str::to_string))
                        .unwrap_or_else(|| "-".to_string()),
                );
                summary_row(ui, "Status", snapshot.status.to_string());
                if let Some(qmp) = &record.qmpstatus {
                    summary_row(ui, "QMP status", qmp.clone());
                }
                summary_row(ui, "CPU usage", format_cpu(&record));
                summary_row(ui, "Memory", format_memory(&record));
                summary_row(
                    ui,
                    "Uptime",
                    record
                        .uptime
                        .map(format_uptime)
                        .unwrap_or_else(|| "-".to_string()),
                );
                if let Some(lock) = &record.lock {
                    summary_row(ui, "Lock", lock.clone());
                }
                summary_row(
                    ui,
                    "Last update",
                    snapshot
                        .updated_at
                        .map(|ts| ts.with_timezone(&Local).format("%H:%M:%S").to_string())
                        .unwrap_or_else(|| "waiting for first poll".to_string()),
                );
            });

        if snapshot.poll_failed {
            ui.add_space(8.0);
            ui.colored_label(
                theme::STATUS_WARNING,
                "Status could not be read; checking whether the VM was migrated.",
            );
        }
    }

    fn draw_confirmation(&mut self, ctx: &egui::Context) {
        let Some(pending) = self.panel.pending_confirmation() else {
            return;
        };
        let message = pending.message.clone();

        let mut accepted = false;
        let mut cancelled = false;
        egui::Window::new("Confirm")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(message);
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.button("Yes").clicked() {
                        accepted = true;
                    }
                    if ui.button("No").clicked() {
                        cancelled = true;
                    }
                });
            });

        if accepted {
            let _ = self.panel.confirm();
        } else if cancelled {
            self.panel.cancel_confirmation();
        }
    }

    fn draw_migration_dialog(&mut self, ctx: &egui::Context) {
        let vmid = self.panel.identity().vmid();
        let error = self.migration_error.clone();

        let mut submit = false;
        let mut cancel = false;
        let Some(dialog) = self.panel.migration_dialog_mut() else {
            return;
        };

        egui::Window::new(format!("Migrate VM {}", vmid))
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Target node");
                    ui.text_edit_singleline(&mut dialog.target);
                });
                ui.checkbox(&mut dialog.online, "Online");
                if let Some(error) = &error {
                    ui.colored_label(theme::STATUS_STOPPED, error);
                }
                ui.horizontal(|ui| {
                    if ui.button("Migrate").clicked() {
                        submit = true;
                    }
                    if ui.button("Cancel").clicked() {
                        cancel = true;
                    }
                });
            });

        if cancel {
            self.migration_error = None;
            self.panel.close_migration_dialog();
        } else if submit {
            match self.panel.submit_migration() {
                Ok(_) => self.migration_error = None,
                Err(err) => self.migration_error = Some(err.to_string()),
            }
        }
    }

    fn draw_alerts(&mut self, ctx: &egui::Context) {
        for alert in self.panel.alerts().pending() {
            let mut dismissed = false;
            egui::Window::new(alert.title.as_str())
                .id(egui::Id::new(alert.id))
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.colored_label(theme::STATUS_STOPPED, &alert.message);
                    if ui.button("OK").clicked() {
                        dismissed = true;
                    }
                });
            if dismissed {
                self.panel.alerts().dismiss(alert.id);
            }
        }
    }

    fn draw_event_log(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("vm-panel-events")
            .resizable(true)
            .default_height(120.0)
            .show(ctx, |ui| {
                ui.label(egui::RichText::new("Tasks").strong());
                egui::ScrollArea::vertical()
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for line in self.panel.events().lines() {
                            ui.monospace(line);
                        }
                    });
            });
    }
}

fn summary_row(ui: &mut egui::Ui, label: &str, value: String) {
    ui.label(egui::RichText::new(label).color(theme::TEXT_MUTED));
    ui.label(value);
    ui.end_row();
}

fn format_cpu(record: &StatusRecord) -> String {
    match (record.cpu, record.cpus) {
        (Some(cpu), Some(cpus)) => format!("{:.1}% of {} CPU(s)", cpu * 100.0, cpus),
        (Some(cpu), None) => format!("{:.1}%", cpu * 100.0),
        _ => "-".to_string(),
    }
}

fn format_memory(record: &StatusRecord) -> String {
    match (record.mem, record.maxmem) {
        (Some(mem), Some(max)) if max > 0 => format!(
            "{} / {} ({:.0}%)",
            format_bytes(mem),
            format_bytes(max),
            mem as f64 / max as f64 * 100.0
        ),
        (Some(mem), _) => format_bytes(mem),
        _ => "-".to_string(),
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if days > 0 {
        format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, secs)
    } else {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KiB");
        assert_eq!(format_bytes(4 * 1024 * 1024 * 1024), "4.00 GiB");
    }

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(59), "00:00:59");
        assert_eq!(format_uptime(3_725), "01:02:05");
        assert_eq!(format_uptime(90_061), "1d 01:01:01");
    }

    #[test]
    fn memory_with_percentage() {
        let record = StatusRecord {
            mem: Some(512 * 1024 * 1024),
            maxmem: Some(1024 * 1024 * 1024),
            ..StatusRecord::default()
        };
        assert_eq!(format_memory(&record), "512.00 MiB / 1.00 GiB (50%)");
    }
}
