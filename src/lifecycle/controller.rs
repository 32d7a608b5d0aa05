use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;

use crate::{
    db::KeyValueStore,
    identity::{hash_site, IdentityProvider, UserId},
    models::{
        fields, BrowserEvent, ExceptionToggle, PageData, SurveyAnswer, TabId, TabPhase, TabSession,
    },
    settings::PreferenceSource,
    survey::{AnswerMemory, SurveyDecision, SurveyEngine, SurveyPrompt},
    tabs::TabSessionStore,
    telemetry::{PayloadAssembler, TelemetrySink},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// External collaborators the controller talks to.
#[derive(Clone)]
pub struct TelemetryDeps {
    pub store: Arc<dyn KeyValueStore>,
    pub prefs: Arc<dyn PreferenceSource>,
    pub sink: Arc<dyn TelemetrySink>,
    pub prompt: Arc<dyn SurveyPrompt>,
}

struct ControllerState {
    tabs: TabSessionStore,
    survey: SurveyEngine,
}

fn valid_tab(tab_id: TabId) -> bool {
    tab_id >= 0
}

/// Site for an event, or `None` when the event must be dropped.
fn correlated_site(tab_id: TabId, site: Option<&str>) -> Option<&str> {
    if !valid_tab(tab_id) {
        return None;
    }
    site.filter(|site| !site.is_empty())
}

/// Owns every tab session and drives it through the page lifecycle.
#[derive(Clone)]
pub struct TabTelemetryController {
    state: Arc<Mutex<ControllerState>>,
    user_id: UserId,
    answers: AnswerMemory,
    assembler: PayloadAssembler,
    prompt: Arc<dyn SurveyPrompt>,
}

impl TabTelemetryController {
    pub async fn configure(deps: TelemetryDeps) -> Result<Self> {
        Self::configure_with_engine(deps, SurveyEngine::new()).await
    }

    pub async fn configure_with_engine(deps: TelemetryDeps, survey: SurveyEngine) -> Result<Self> {
        let user_id = IdentityProvider::new(deps.store.clone())
            .get_or_create_user_id()
            .await
            .context("failed to load user identity")?;

        Ok(Self {
            state: Arc::new(Mutex::new(ControllerState {
                tabs: TabSessionStore::new(),
                survey,
            })),
            user_id,
            answers: AnswerMemory::new(deps.store),
            assembler: PayloadAssembler::new(deps.prefs, deps.sink),
            prompt: deps.prompt,
        })
    }

    pub async fn handle_event(&self, event: BrowserEvent) -> Result<()> {
        match event {
            BrowserEvent::Reload { tab_id, site } => self.on_reload(tab_id, site.as_deref()).await,
            BrowserEvent::PageBeforeUnload { tab_id, data } => {
                self.on_page_before_unload(tab_id, &data).await
            }
            BrowserEvent::PageUnload { tab_id } => {
                self.on_page_unload(tab_id).await;
                Ok(())
            }
            BrowserEvent::TabRemoved { tab_id } => {
                self.on_tab_removed(tab_id).await;
                Ok(())
            }
            BrowserEvent::IdentityPopupShown { tab_id } => {
                self.on_identity_popup_shown(tab_id).await;
                Ok(())
            }
            BrowserEvent::ReportBreakage { tab_id } => {
                self.on_report_breakage(tab_id).await;
                Ok(())
            }
            BrowserEvent::ToggleException {
                tab_id,
                exception_added,
            } => {
                self.on_toggle_exception(tab_id, exception_added).await;
                Ok(())
            }
            BrowserEvent::SurveyAnswered { tab_id, answer } => {
                self.on_survey_answered(tab_id, answer).await
            }
        }
    }

    /// A page with trackers was reloaded. Only reloads after an interaction
    /// count towards the survey.
    pub async fn on_reload(&self, tab_id: TabId, site: Option<&str>) -> Result<()> {
        let Some(site) = correlated_site(tab_id, site) else {
            log_debug!("Dropping reload event for tab {tab_id} without site");
            return Ok(());
        };
        let hashed = hash_site(&self.user_id, site);
        // Read before locking so other tabs keep moving; a failed read leaves
        // the session untouched.
        let stored_answer = self.answers.previous_answer(hashed.as_str()).await?;

        let mut state = self.state.lock().await;
        let ControllerState { tabs, survey } = &mut *state;
        let session = tabs.get_or_create(tab_id);
        session.payload.set(fields::ETLD, hashed.into_string());

        if !session.previous_pages_were_interacted {
            session.phase = TabPhase::Loading;
            return Ok(());
        }

        session.reload_count += 1;
        session.phase = TabPhase::Reloading;

        let decision = survey.decide(tab_id, session, stored_answer, self.prompt.as_ref());
        if let SurveyDecision::PreviouslyAnswered(code) = decision {
            log_debug!("Tab {tab_id}: replayed stored answer {}", code.code());
        }
        Ok(())
    }

    /// Merges the page facts collected right before unload. A non-reload
    /// navigation starts a new page-visit.
    pub async fn on_page_before_unload(&self, tab_id: TabId, data: &PageData) -> Result<()> {
        let Some(site) = correlated_site(tab_id, data.site()) else {
            log_debug!("Dropping before-unload event for tab {tab_id} without site");
            return Ok(());
        };
        let hashed = hash_site(&self.user_id, site);

        let mut state = self.state.lock().await;
        let session = state.tabs.get_or_create(tab_id);

        session.previous_pages_were_interacted |=
            data.previous_pages_were_interacted.unwrap_or(false);
        if !data.was_reload() {
            session.begin_page_visit();
        }

        let payload = &mut session.payload;
        payload.set_optional(
            fields::PREVIOUS_PAGES_WERE_INTERACTED,
            data.previous_pages_were_interacted,
        );
        payload.set_optional(fields::EMBEDDED_SOCIAL_SCRIPT, data.embedded_social_script);
        payload.set_optional(fields::LOGIN_FORM_ON_PAGE, data.login_form_on_page);
        payload.set_optional(
            fields::PASSWORD_FIELD_WAS_FILLED_IN,
            data.password_field_was_filled_in,
        );
        payload.set_optional(
            fields::USER_HAS_TRACKING_PROTECTION_EXCEPTION,
            data.user_has_tracking_protection_exception,
        );
        payload.set_optional(fields::PAGE_RELOADED, data.page_reloaded);
        payload.set(fields::ETLD, hashed.into_string());
        payload.set_optional(fields::NUM_BLOCKABLE_TRACKERS, data.num_blockable_trackers);

        session.phase = TabPhase::Unloading;
        Ok(())
    }

    /// Flushes the finished payload and keeps the session for the next visit.
    pub async fn on_page_unload(&self, tab_id: TabId) {
        let payload = {
            let mut state = self.state.lock().await;
            let ready = state
                .tabs
                .get(tab_id)
                .is_some_and(|session| session.payload.hashed_site().is_some());
            if !ready {
                return;
            }
            let payload = state.tabs.reset(tab_id);
            if let Some(session) = state.tabs.get_mut(tab_id) {
                session.phase = TabPhase::Flushed;
            }
            payload
        };

        if let Some(payload) = payload {
            self.assembler.flush(payload);
            log_debug!("Tab {tab_id}: flushed on unload");
        }
    }

    /// Final flush for a closing tab; the session is always dropped.
    pub async fn on_tab_removed(&self, tab_id: TabId) {
        let removed = self.state.lock().await.tabs.delete(tab_id);

        match removed {
            Some(session) if session.payload.hashed_site().is_some() => {
                self.assembler.flush(session.payload);
                log_debug!("Tab {tab_id}: flushed on close");
            }
            _ => {}
        }
    }

    pub async fn on_identity_popup_shown(&self, tab_id: TabId) {
        self.record_interaction(tab_id, |session| {
            session.payload.set(fields::USER_OPENED_CONTROL_CENTER, true);
        })
        .await;
    }

    pub async fn on_report_breakage(&self, tab_id: TabId) {
        self.record_interaction(tab_id, |session| {
            session
                .payload
                .set(fields::USER_REPORTED_PAGE_BREAKAGE, true);
        })
        .await;
    }

    pub async fn on_toggle_exception(&self, tab_id: TabId, exception_added: bool) {
        self.record_interaction(tab_id, |session| {
            session.payload.set(
                fields::USER_TOGGLED_EXCEPTION,
                ExceptionToggle::from_exception_added(exception_added),
            );
        })
        .await;
    }

    /// Records the answer on the current visit and remembers it for the site.
    pub async fn on_survey_answered(&self, tab_id: TabId, answer: SurveyAnswer) -> Result<()> {
        if !valid_tab(tab_id) {
            return Ok(());
        }

        let hashed_site = {
            let mut state = self.state.lock().await;
            let session = state.tabs.get_or_create(tab_id);
            session
                .payload
                .set(fields::PAGE_RELOADED_SURVEY, answer.fresh_code());
            session.note_interaction();
            session.payload.hashed_site().map(str::to_owned)
        };

        match hashed_site {
            Some(hashed_site) => {
                self.answers.remember(&hashed_site, answer).await?;
                log_info!("Tab {tab_id}: survey answered ({answer:?})");
            }
            None => {
                log_warn!("Tab {tab_id}: survey answer without a site; not remembered");
            }
        }
        Ok(())
    }

    pub async fn session(&self, tab_id: TabId) -> Option<TabSession> {
        self.state.lock().await.tabs.get(tab_id).cloned()
    }

    pub async fn tab_count(&self) -> usize {
        self.state.lock().await.tabs.len()
    }

    async fn record_interaction<F>(&self, tab_id: TabId, apply: F)
    where
        F: FnOnce(&mut TabSession),
    {
        if !valid_tab(tab_id) {
            return;
        }
        let mut state = self.state.lock().await;
        let session = state.tabs.get_or_create(tab_id);
        apply(session);
        session.note_interaction();
    }
}
