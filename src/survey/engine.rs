use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::models::{fields, SurveyCode, TabId, TabSession};

use super::SurveyPrompt;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// The counted reload is added on top, so the first decision passes draws 0..=4.
const BASE_THRESHOLD: u32 = 3;
/// Draws are uniform over `0..DRAW_RANGE`.
const DRAW_RANGE: u32 = 10;

/// Each counted reload raises the threshold by one; from the sixth reload on
/// every draw passes.
pub fn should_show(draw: u32, reload_count: u32) -> bool {
    draw <= BASE_THRESHOLD.saturating_add(reload_count)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurveyDecision {
    /// The site already has an answer on file; its code was copied into the payload.
    PreviouslyAnswered(SurveyCode),
    /// The survey was already shown during this page-visit.
    HiddenRepeat,
    Shown { draw: u32 },
    /// The draw missed; the next reload gets another, better chance.
    Skipped { draw: u32 },
}

pub struct SurveyEngine {
    rng: StdRng,
}

impl Default for SurveyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SurveyEngine {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Runs on a counted reload of an interacted page; `reload_count` must
    /// already include this reload. `stored_answer` is the site's remembered
    /// answer, read before the session was locked.
    pub fn decide(
        &mut self,
        tab_id: TabId,
        session: &mut TabSession,
        stored_answer: Option<SurveyCode>,
        prompt: &dyn SurveyPrompt,
    ) -> SurveyDecision {
        if let Some(code) = stored_answer {
            session.payload.set(fields::PAGE_RELOADED_SURVEY, code);
            log_debug!("Tab {tab_id}: site already answered, not prompting");
            return SurveyDecision::PreviouslyAnswered(code);
        }

        if session.survey_shown {
            if !session.payload.contains(fields::PAGE_RELOADED_SURVEY) {
                session
                    .payload
                    .set(fields::PAGE_RELOADED_SURVEY, SurveyCode::Hidden);
            }
            return SurveyDecision::HiddenRepeat;
        }

        let draw = self.rng.gen_range(0..DRAW_RANGE);
        if !should_show(draw, session.reload_count) {
            log_debug!(
                "Tab {tab_id}: draw {draw} missed at reload {}",
                session.reload_count
            );
            return SurveyDecision::Skipped { draw };
        }

        session
            .payload
            .set(fields::PAGE_RELOADED_SURVEY, SurveyCode::Shown);
        session.survey_shown = true;
        prompt.show(tab_id);
        log_info!(
            "Tab {tab_id}: showing survey after {} reloads",
            session.reload_count
        );

        SurveyDecision::Shown { draw }
    }
}
