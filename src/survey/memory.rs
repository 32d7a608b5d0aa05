use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    db::KeyValueStore,
    models::{SurveyAnswer, SurveyCode},
};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Per-site survey answers, keyed by hashed site in the shared key-value
/// namespace. Values are the "previously-X" codes.
#[derive(Clone)]
pub struct AnswerMemory {
    store: Arc<dyn KeyValueStore>,
}

impl AnswerMemory {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn previous_answer(&self, hashed_site: &str) -> Result<Option<SurveyCode>> {
        let stored = self
            .store
            .get(hashed_site)
            .await
            .context("failed to read stored survey answer")?;

        let Some(raw) = stored else {
            return Ok(None);
        };

        match raw.trim().parse::<i64>().ok().and_then(SurveyCode::from_code) {
            Some(code) if code.is_historical() => Ok(Some(code)),
            _ => {
                log_warn!("Ignoring unrecognized stored survey answer '{raw}'");
                Ok(None)
            }
        }
    }

    pub async fn remember(&self, hashed_site: &str, answer: SurveyAnswer) -> Result<()> {
        let code = answer.historical_code().code().to_string();
        self.store
            .set(hashed_site, &code)
            .await
            .context("failed to persist survey answer")
    }
}
