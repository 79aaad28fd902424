//! The VM control panel: toolbar, status poller, command dispatch and the
//! hosted sections, without any rendering. `gui_panel` draws it.

use crate::api::ApiClient;
use crate::buttons::{ButtonStates, PanelButton};
use crate::command::{CommandKind, VmCommand};
use crate::config::{CommandsConfig, PanelConfig};
use crate::dispatcher::{Alert, AlertQueue, CommandDispatcher, EventLog};
use crate::instance::{Selection, VmIdentity};
use crate::poller::{StatusHandle, StatusPoller};
use crate::tabs::TabContainer;
use crate::workspace::Workspace;
use crate::{PanelError, Result, log_debug, log_info};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// A destructive command waiting for the user to say yes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfirmation {
    pub command: VmCommand,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationDialog {
    pub target: String,
    pub online: bool,
}

#[derive(Debug)]
pub enum PressOutcome {
    /// The button is disabled for the current status; nothing was sent.
    Disabled,
    AwaitingConfirmation(String),
    Dispatched(JoinHandle<()>),
    MigrationDialogOpened,
    ConsoleOpened,
    /// The action failed locally and an alert was raised.
    Alerted,
}

pub struct VmControlPanel {
    identity: VmIdentity,
    poller: StatusPoller,
    status: StatusHandle,
    dispatcher: CommandDispatcher,
    workspace: Arc<dyn Workspace>,
    tabs: TabContainer,
    commands: CommandsConfig,
    runtime: Handle,
    pending: Option<PendingConfirmation>,
    migration: Option<MigrationDialog>,
    destroyed: bool,
}

impl VmControlPanel {
    /// Fails when the selection lacks a node name or VM id. Polling does not
    /// start until [`after_render`](Self::after_render).
    pub fn new(
        selection: &Selection,
        api: Arc<dyn ApiClient>,
        workspace: Arc<dyn Workspace>,
        config: &PanelConfig,
        runtime: Handle,
    ) -> Result<Self> {
        let identity = VmIdentity::from_selection(selection)?;

        let poller = StatusPoller::new(
            identity.clone(),
            api.clone(),
            workspace.clone(),
            config.poller.interval(),
            runtime.clone(),
        );
        let status = poller.handle();
        let tabs = TabContainer::new(&status);
        let dispatcher = CommandDispatcher::new(identity.clone(), api);

        log_debug!("Created control panel for {}", identity);

        Ok(Self {
            identity,
            poller,
            status,
            dispatcher,
            workspace,
            tabs,
            commands: config.commands.clone(),
            runtime,
            pending: None,
            migration: None,
            destroyed: false,
        })
    }

    pub fn identity(&self) -> &VmIdentity {
        &self.identity
    }

    pub fn title(&self) -> String {
        self.identity.title()
    }

    /// First render finished; begin status updates.
    pub fn after_render(&self) {
        if !self.destroyed {
            self.poller.start();
        }
    }

    /// Stop status updates. Idempotent; also runs on drop.
    pub fn destroy(&mut self) {
        if !self.destroyed {
            log_info!("Closing control panel for {}", self.identity);
        }
        self.destroyed = true;
        self.poller.stop();
        self.pending = None;
        self.migration = None;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    pub fn poller(&self) -> &StatusPoller {
        &self.poller
    }

    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    pub fn button_states(&self) -> ButtonStates {
        ButtonStates::from_status(&self.status.status())
    }

    pub fn tabs(&self) -> &TabContainer {
        &self.tabs
    }

    pub fn tabs_mut(&mut self) -> &mut TabContainer {
        &mut self.tabs
    }

    pub fn alerts(&self) -> &AlertQueue {
        self.dispatcher.alerts()
    }

    pub fn events(&self) -> &EventLog {
        self.dispatcher.events()
    }

    pub fn is_busy(&self) -> bool {
        self.dispatcher.is_busy()
    }

    pub fn pending_confirmation(&self) -> Option<&PendingConfirmation> {
        self.pending.as_ref()
    }

    pub fn migration_dialog(&self) -> Option<&MigrationDialog> {
        self.migration.as_ref()
    }

    pub fn migration_dialog_mut(&mut self) -> Option<&mut MigrationDialog> {
        self.migration.as_mut()
    }

    /// The command a button sends, with configured parameters.
    pub fn command_for(&self, kind: CommandKind) -> VmCommand {
        match kind {
            CommandKind::Start => VmCommand::start(),
            CommandKind::Stop => VmCommand::stop(Some(self.commands.stop_timeout_seconds)),
            CommandKind::Reset => VmCommand::reset(),
            CommandKind::Shutdown => {
                VmCommand::shutdown(Some(self.commands.shutdown_timeout_seconds))
            }
            CommandKind::Migrate => VmCommand::new(CommandKind::Migrate),
            CommandKind::Remove => VmCommand::remove(),
        }
    }

    pub fn press(&mut self, button: PanelButton) -> PressOutcome {
        if self.destroyed || !self.button_states().is_enabled(button) {
            return PressOutcome::Disabled;
        }

        let Some(kind) = button.command_kind() else {
            return match self.workspace.open_console(&self.identity) {
                Ok(()) => {
                    self.events().record("console opened");
                    PressOutcome::ConsoleOpened
                }
                Err(err) => {
                    self.alerts().push(Alert::error(None, err.status_text()));
                    PressOutcome::Alerted
                }
            };
        };

        if kind == CommandKind::Migrate {
            self.migration = Some(MigrationDialog {
                target: String::new(),
                online: self.status.status().is_running(),
            });
            return PressOutcome::MigrationDialogOpened;
        }

        let command = self.command_for(kind);
        if self.commands.confirm_destructive {
            if let Some(message) = kind.confirmation_text(&self.identity) {
                self.pending = Some(PendingConfirmation {
                    command,
                    message: message.clone(),
                });
                return PressOutcome::AwaitingConfirmation(message);
            }
        }

        PressOutcome::Dispatched(self.dispatcher.dispatch(&self.runtime, command))
    }

    /// User accepted the pending confirmation. Nothing is sent if the status
    /// changed in the meantime and the button is now disabled.
    pub fn confirm(&mut self) -> Option<JoinHandle<()>> {
        let pending = self.pending.take()?;
        if self.destroyed {
            return None;
        }
        let kind = pending.command.kind();
        if !self.button_states().allows(kind) {
            log_info!(
                "Dropping confirmed {} for {}: no longer allowed while {}",
                kind,
                self.identity,
                self.status.status()
            );
            return None;
        }
        Some(self.dispatcher.dispatch(&self.runtime, pending.command))
    }

    pub fn cancel_confirmation(&mut self) {
        self.pending = None;
    }

    pub fn close_migration_dialog(&mut self) {
        self.migration = None;
    }

    /// Send the migrate request for the dialog's current input.
    pub fn submit_migration(&mut self) -> Result<JoinHandle<()>> {
        let Some(dialog) = self.migration.as_ref() else {
            return Err(PanelError::InvalidMigrationTarget(
                "no migration in progress".to_string(),
            ));
        };

        let target = dialog.target.trim();
        if target.is_empty() {
            return Err(PanelError::InvalidMigrationTarget(
                "target node is required".to_string(),
            ));
        }
        if target == self.identity.node() {
            return Err(PanelError::InvalidMigrationTarget(format!(
                "VM is already on node '{}'",
                target
            )));
        }

        let command = VmCommand::migrate(target, dialog.online);
        self.migration = None;
        Ok(self.dispatcher.dispatch(&self.runtime, command))
    }
}

impl Drop for VmControlPanel {
    fn drop(&mut self) {
        self.destroy();
    }
}
