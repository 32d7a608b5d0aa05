use crate::models::TabId;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Host surface that displays the "is this page broken?" survey.
pub trait SurveyPrompt: Send + Sync {
    fn show(&self, tab_id: TabId);
}

/// Prompt for headless runs: only logs that the survey would be displayed.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPrompt;

impl SurveyPrompt for LogPrompt {
    fn show(&self, tab_id: TabId) {
        log_info!("Survey shown for tab {tab_id}");
    }
}
