use crate::command::CommandKind;
use crate::instance::VmStatus;

/// Toolbar buttons, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelButton {
    Start,
    Stop,
    Reset,
    Shutdown,
    Migrate,
    Remove,
    Console,
}

impl PanelButton {
    pub const TOOLBAR: [PanelButton; 7] = [
        PanelButton::Start,
        PanelButton::Stop,
        PanelButton::Reset,
        PanelButton::Shutdown,
        PanelButton::Migrate,
        PanelButton::Remove,
        PanelButton::Console,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PanelButton::Start => "Start",
            PanelButton::Stop => "Stop",
            PanelButton::Reset => "Reset",
            PanelButton::Shutdown => "Shutdown",
            PanelButton::Migrate => "Migrate",
            PanelButton::Remove => "Remove",
            PanelButton::Console => "Console",
        }
    }

    /// The command a button maps to. Console has none; it is handled by the
    /// workspace.
    pub fn command_kind(self) -> Option<CommandKind> {
        match self {
            PanelButton::Start => Some(CommandKind::Start),
            PanelButton::Stop => Some(CommandKind::Stop),
            PanelButton::Reset => Some(CommandKind::Reset),
            PanelButton::Shutdown => Some(CommandKind::Shutdown),
            PanelButton::Migrate => Some(CommandKind::Migrate),
            PanelButton::Remove => Some(CommandKind::Remove),
            PanelButton::Console => None,
        }
    }
}

/// Enabled flags for the status-dependent buttons. Migrate and console are
/// always enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonStates {
    pub start: bool,
    pub reset: bool,
    pub shutdown: bool,
    pub stop: bool,
    pub remove: bool,
}

impl ButtonStates {
    pub fn from_status(status: &VmStatus) -> Self {
        let running = status.is_running();
        let stopped = status.is_stopped();
        Self {
            start: !running,
            reset: running,
            shutdown: running,
            stop: !stopped,
            remove: stopped,
        }
    }

    pub fn is_enabled(&self, button: PanelButton) -> bool {
        match button {
            PanelButton::Start => self.start,
            PanelButton::Stop => self.stop,
            PanelButton::Reset => self.reset,
            PanelButton::Shutdown => self.shutdown,
            PanelButton::Remove => self.remove,
            PanelButton::Migrate | PanelButton::Console => true,
        }
    }

    /// Whether the button that sends `kind` is currently enabled.
    pub fn allows(&self, kind: CommandKind) -> bool {
        match kind {
            CommandKind::Start => self.start,
            CommandKind::Stop => self.stop,
            CommandKind::Reset => self.reset,
            CommandKind::Shutdown => self.shutdown,
            CommandKind::Remove => self.remove,
            CommandKind::Migrate => true,
        }
    }

    /// `(start, reset, shutdown, stop, remove)`
    pub fn as_tuple(&self) -> (bool, bool, bool, bool, bool) {
        (self.start, self.reset, self.shutdown, self.stop, self.remove)
    }
}

impl Default for ButtonStates {
    fn default() -> Self {
        Self::from_status(&VmStatus::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_table() {
        assert_eq!(
            ButtonStates::from_status(&VmStatus::Running).as_tuple(),
            (false, true, true, true, false)
        );
        assert_eq!(
            ButtonStates::from_status(&VmStatus::Stopped).as_tuple(),
            (true, false, false, false, true)
        );
        assert_eq!(
            ButtonStates::from_status(&VmStatus::Unknown).as_tuple(),
            (true, false, false, true, false)
        );
    }

    #[test]
    fn allows_matches_button_flags() {
        for status in [VmStatus::Running, VmStatus::Stopped, VmStatus::Unknown] {
            let states = ButtonStates::from_status(&status);
            for button in PanelButton::TOOLBAR {
                if let Some(kind) = button.command_kind() {
                    assert_eq!(states.allows(kind), states.is_enabled(button));
                }
            }
        }
    }

    #[test]
    fn other_statuses_behave_like_unknown() {
        let paused = ButtonStates::from_status(&VmStatus::Other("paused".into()));
        assert_eq!(paused, ButtonStates::from_status(&VmStatus::Unknown));
    }

    #[test]
    fn migrate_and_console_always_enabled() {
        for status in [VmStatus::Running, VmStatus::Stopped, VmStatus::Unknown] {
            let states = ButtonStates::from_status(&status);
            assert!(states.is_enabled(PanelButton::Migrate));
            assert!(states.is_enabled(PanelButton::Console));
        }
    }
}
