use serde::{Deserialize, Serialize};

use super::{payload::SurveyCode, session::TabId};

/// Page facts forwarded from the content side right before a page unloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PageData {
    pub previous_pages_were_interacted: Option<bool>,
    pub embedded_social_script: Option<bool>,
    pub login_form_on_page: Option<bool>,
    pub password_field_was_filled_in: Option<bool>,
    pub user_has_tracking_protection_exception: Option<bool>,
    pub page_reloaded: Option<bool>,
    pub num_blockable_trackers: Option<u32>,
    pub hostname: Option<String>,
    /// Registrable domain (eTLD+1) resolved by the host from `hostname`.
    #[serde(alias = "etld")]
    pub site: Option<String>,
}

impl PageData {
    pub fn site(&self) -> Option<&str> {
        self.site.as_deref().filter(|site| !site.is_empty())
    }

    /// A missing flag counts as a genuine navigation.
    pub fn was_reload(&self) -> bool {
        self.page_reloaded.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SurveyAnswer {
    Broken,
    NotBroken,
}

impl SurveyAnswer {
    /// Code recorded on the page-visit where the answer was given.
    pub fn fresh_code(self) -> SurveyCode {
        match self {
            SurveyAnswer::Broken => SurveyCode::PageBroken,
            SurveyAnswer::NotBroken => SurveyCode::PageNotBroken,
        }
    }

    /// Code persisted for the site and replayed on later visits.
    pub fn historical_code(self) -> SurveyCode {
        match self {
            SurveyAnswer::Broken => SurveyCode::PreviouslyBroken,
            SurveyAnswer::NotBroken => SurveyCode::PreviouslyNotBroken,
        }
    }
}

/// Typed notifications delivered by the host browser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BrowserEvent {
    #[serde(rename_all = "camelCase")]
    Reload { tab_id: TabId, site: Option<String> },
    #[serde(rename_all = "camelCase")]
    PageBeforeUnload { tab_id: TabId, data: PageData },
    #[serde(rename_all = "camelCase")]
    PageUnload { tab_id: TabId },
    #[serde(rename_all = "camelCase")]
    TabRemoved { tab_id: TabId },
    #[serde(rename_all = "camelCase")]
    IdentityPopupShown { tab_id: TabId },
    #[serde(rename_all = "camelCase")]
    ReportBreakage { tab_id: TabId },
    #[serde(rename_all = "camelCase")]
    ToggleException { tab_id: TabId, exception_added: bool },
    #[serde(rename_all = "camelCase")]
    SurveyAnswered { tab_id: TabId, answer: SurveyAnswer },
}

impl BrowserEvent {
    pub fn tab_id(&self) -> TabId {
        match self {
            BrowserEvent::Reload { tab_id, .. }
            | BrowserEvent::PageBeforeUnload { tab_id, .. }
            | BrowserEvent::PageUnload { tab_id }
            | BrowserEvent::TabRemoved { tab_id }
            | BrowserEvent::IdentityPopupShown { tab_id }
            | BrowserEvent::ReportBreakage { tab_id }
            | BrowserEvent::ToggleException { tab_id, .. }
            | BrowserEvent::SurveyAnswered { tab_id, .. } => *tab_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BrowserEvent::Reload { .. } => "reload",
            BrowserEvent::PageBeforeUnload { .. } => "page-before-unload",
            BrowserEvent::PageUnload { .. } => "page-unload",
            BrowserEvent::TabRemoved { .. } => "tab-removed",
            BrowserEvent::IdentityPopupShown { .. } => "identity-popup-shown",
            BrowserEvent::ReportBreakage { .. } => "report-breakage",
            BrowserEvent::ToggleException { .. } => "exception-toggled",
            BrowserEvent::SurveyAnswered { .. } => "survey-answered",
        }
    }
}
