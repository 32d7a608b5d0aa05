use serde::{Deserialize, Serialize};

use super::payload::Payload;

/// Browser tab identifier. Negative values mark events that don't belong to a tab.
pub type TabId = i64;

/// Where the tab is in its page lifecycle. Informational only: the survey
/// gate is `TabSession::previous_pages_were_interacted`, which only the
/// before-unload facts set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TabPhase {
    #[default]
    Idle,
    /// Reloaded before any page interaction; the reload was not counted.
    Loading,
    /// Control-center UI was used. This does not arm the survey.
    Interacted,
    Reloading,
    Unloading,
    Flushed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TabSession {
    pub reload_count: u32,
    pub previous_pages_were_interacted: bool,
    pub survey_shown: bool,
    pub payload: Payload,
    pub phase: TabPhase,
}

impl TabSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start of a new page-visit: a navigation that wasn't a reload.
    /// The reload counter and the survey flag always reset together.
    pub fn begin_page_visit(&mut self) {
        self.survey_shown = false;
        self.reload_count = 0;
        self.previous_pages_were_interacted = false;
    }

    /// Marks a user-facing interaction unless the page is mid reload or unload.
    pub fn note_interaction(&mut self) {
        if matches!(
            self.phase,
            TabPhase::Idle | TabPhase::Loading | TabPhase::Flushed
        ) {
            self.phase = TabPhase::Interacted;
        }
    }
}
