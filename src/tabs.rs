use crate::poller::StatusHandle;
use serde::{Deserialize, Serialize};

/// Key the GUI stores the active section under.
pub const TAB_STATE_KEY: &str = "kvmtab";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionId {
    Summary,
    Hardware,
    Options,
    Monitor,
    Backup,
    Permissions,
}

impl SectionId {
    pub const ALL: [SectionId; 6] = [
        SectionId::Summary,
        SectionId::Hardware,
        SectionId::Options,
        SectionId::Monitor,
        SectionId::Backup,
        SectionId::Permissions,
    ];

    pub fn item_id(self) -> &'static str {
        match self {
            SectionId::Summary => "summary",
            SectionId::Hardware => "hardware",
            SectionId::Options => "options",
            SectionId::Monitor => "monitor",
            SectionId::Backup => "backup",
            SectionId::Permissions => "permissions",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            SectionId::Summary => "Summary",
            SectionId::Hardware => "Hardware",
            SectionId::Options => "Options",
            SectionId::Monitor => "Monitor",
            SectionId::Backup => "Backup",
            SectionId::Permissions => "Permissions",
        }
    }

    pub fn from_item_id(item_id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.item_id() == item_id)
    }
}

/// A child view. Its content belongs to other panels; this one only hosts it.
#[derive(Debug, Clone)]
pub struct Section {
    id: SectionId,
    status: StatusHandle,
}

impl Section {
    pub fn id(&self) -> SectionId {
        self.id
    }

    pub fn title(&self) -> &'static str {
        self.id.title()
    }

    pub fn status(&self) -> &StatusHandle {
        &self.status
    }
}

/// Fixed list of sections, built once.
#[derive(Debug, Clone)]
pub struct TabContainer {
    sections: Vec<Section>,
    active: SectionId,
}

impl TabContainer {
    pub fn new(status: &StatusHandle) -> Self {
        let sections = SectionId::ALL
            .into_iter()
            .map(|id| Section {
                id,
                status: status.clone(),
            })
            .collect();
        Self {
            sections,
            active: SectionId::Summary,
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.iter().find(|section| section.id == id)
    }

    pub fn active(&self) -> SectionId {
        self.active
    }

    pub fn active_section(&self) -> &Section {
        // Every SectionId has a section; the list is never modified.
        self.section(self.active)
            .unwrap_or(&self.sections[0])
    }

    pub fn select(&mut self, id: SectionId) {
        self.active = id;
    }

    /// Restore a persisted selection; unknown ids are ignored.
    pub fn select_item_id(&mut self, item_id: &str) -> bool {
        match SectionId::from_item_id(item_id) {
            Some(id) => {
                self.active = id;
                true
            }
            None => false,
        }
    }
}
