use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Field names of the per-visit telemetry record.
pub mod fields {
    pub const ETLD: &str = "etld";
    pub const PREVIOUS_PAGES_WERE_INTERACTED: &str = "previous_pages_were_interacted";
    pub const EMBEDDED_SOCIAL_SCRIPT: &str = "embedded_social_script";
    pub const LOGIN_FORM_ON_PAGE: &str = "login_form_on_page";
    pub const PASSWORD_FIELD_WAS_FILLED_IN: &str = "password_field_was_filled_in";
    pub const USER_HAS_TRACKING_PROTECTION_EXCEPTION: &str =
        "user_has_tracking_protection_exception";
    pub const PAGE_RELOADED: &str = "page_reloaded";
    pub const NUM_BLOCKABLE_TRACKERS: &str = "num_blockable_trackers";
    pub const USER_OPENED_CONTROL_CENTER: &str = "user_opened_control_center";
    pub const USER_REPORTED_PAGE_BREAKAGE: &str = "user_reported_page_breakage";
    pub const USER_TOGGLED_EXCEPTION: &str = "user_toggled_exception";
    pub const PAGE_RELOADED_SURVEY: &str = "page_reloaded_survey";
}

/// Values of the `page_reloaded_survey` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SurveyCode {
    Shown,
    PageBroken,
    PageNotBroken,
    /// The user already answered "broken" for this site on an earlier visit.
    PreviouslyBroken,
    PreviouslyNotBroken,
    /// Already shown during this page-visit, so not shown again.
    Hidden,
}

impl SurveyCode {
    pub fn code(self) -> i64 {
        match self {
            SurveyCode::Shown => 1,
            SurveyCode::PageBroken => 2,
            SurveyCode::PageNotBroken => 3,
            SurveyCode::PreviouslyBroken => 4,
            SurveyCode::PreviouslyNotBroken => 5,
            SurveyCode::Hidden => 6,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(SurveyCode::Shown),
            2 => Some(SurveyCode::PageBroken),
            3 => Some(SurveyCode::PageNotBroken),
            4 => Some(SurveyCode::PreviouslyBroken),
            5 => Some(SurveyCode::PreviouslyNotBroken),
            6 => Some(SurveyCode::Hidden),
            _ => None,
        }
    }

    pub fn is_historical(self) -> bool {
        matches!(
            self,
            SurveyCode::PreviouslyBroken | SurveyCode::PreviouslyNotBroken
        )
    }
}

/// Values of the `user_toggled_exception` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExceptionToggle {
    ProtectionDisabled,
    ProtectionEnabled,
}

impl ExceptionToggle {
    pub fn from_exception_added(exception_added: bool) -> Self {
        if exception_added {
            ExceptionToggle::ProtectionDisabled
        } else {
            ExceptionToggle::ProtectionEnabled
        }
    }

    pub fn code(self) -> i64 {
        match self {
            ExceptionToggle::ProtectionDisabled => 1,
            ExceptionToggle::ProtectionEnabled => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl fmt::Display for PayloadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadValue::Bool(value) => write!(f, "{value}"),
            PayloadValue::Int(value) => write!(f, "{value}"),
            PayloadValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<bool> for PayloadValue {
    fn from(value: bool) -> Self {
        PayloadValue::Bool(value)
    }
}

impl From<i64> for PayloadValue {
    fn from(value: i64) -> Self {
        PayloadValue::Int(value)
    }
}

impl From<u32> for PayloadValue {
    fn from(value: u32) -> Self {
        PayloadValue::Int(i64::from(value))
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        PayloadValue::Text(value)
    }
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        PayloadValue::Text(value.to_string())
    }
}

impl From<SurveyCode> for PayloadValue {
    fn from(value: SurveyCode) -> Self {
        PayloadValue::Int(value.code())
    }
}

impl From<ExceptionToggle> for PayloadValue {
    fn from(value: ExceptionToggle) -> Self {
        PayloadValue::Int(value.code())
    }
}

/// Flat field map collected for one page-visit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload {
    fields: BTreeMap<String, PayloadValue>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<PayloadValue>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// `None` removes the field, so an absent forwarded value never lingers
    /// from an earlier event.
    pub fn set_optional<V: Into<PayloadValue>>(&mut self, key: &str, value: Option<V>) {
        match value {
            Some(value) => self.set(key, value),
            None => {
                self.fields.remove(key);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<PayloadValue> {
        self.fields.remove(key)
    }

    /// The hashed site. Its presence marks the payload as worth flushing.
    pub fn hashed_site(&self) -> Option<&str> {
        match self.fields.get(fields::ETLD) {
            Some(PayloadValue::Text(hash)) if !hash.is_empty() => Some(hash),
            _ => None,
        }
    }

    pub fn survey_code(&self) -> Option<SurveyCode> {
        match self.fields.get(fields::PAGE_RELOADED_SURVEY) {
            Some(PayloadValue::Int(code)) => SurveyCode::from_code(*code),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PayloadValue)> {
        self.fields.iter()
    }

    pub fn into_fields(self) -> BTreeMap<String, PayloadValue> {
        self.fields
    }
}
