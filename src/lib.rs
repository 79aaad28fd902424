pub mod api;
pub mod buttons;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gui_panel;
pub mod instance;
pub mod logger;
pub mod panel;
pub mod poller;
pub mod tabs;
pub mod theme;
pub mod workspace;

pub use error::PanelError;
pub use instance::{Selection, StatusRecord, VmIdentity, VmStatus};

pub type Result<T> = std::result::Result<T, PanelError>;

// Convenience re-exports for embedding the panel
pub use api::{ApiClient, HttpApiClient};
pub use buttons::{ButtonStates, PanelButton};
pub use command::{CommandKind, VmCommand};
pub use panel::{PressOutcome, VmControlPanel};
pub use poller::{StatusHandle, StatusPoller, StatusSnapshot};
pub use workspace::{ClusterWorkspace, Workspace};
