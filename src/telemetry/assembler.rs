use std::sync::Arc;

use crate::{
    models::{Payload, PayloadValue},
    settings::{PrefValue, PreferenceSource},
};

use super::{TelemetryRecord, TelemetrySink};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefKind {
    Bool,
    Int,
    String,
}

/// Preferences reported with every record.
pub const REPORTED_PREFS: &[(&str, PrefKind)] = &[
    ("browser.contentblocking.enabled", PrefKind::Bool),
    ("privacy.trackingprotection.enabled", PrefKind::Bool),
    ("network.cookie.cookieBehavior", PrefKind::Int),
    ("browser.contentblocking.ui.enabled", PrefKind::Bool),
    (
        "browser.contentblocking.rejecttrackers.ui.recommended",
        PrefKind::Bool,
    ),
    (
        "browser.contentblocking.rejecttrackers.control-center.ui.enabled",
        PrefKind::Bool,
    ),
    (
        "browser.contentblocking.cookies-site-data.ui.reject-trackers.enabled",
        PrefKind::Bool,
    ),
    (
        "browser.contentblocking.cookies-site-data.ui.reject-trackers.recommended",
        PrefKind::Bool,
    ),
    (
        "browser.contentblocking.reportBreakage.enabled",
        PrefKind::Bool,
    ),
    ("urlclassifier.trackingAnnotationTable", PrefKind::String),
    (
        "urlclassifier.trackingAnnotationWhitelistTable",
        PrefKind::String,
    ),
    (
        "browser.contentblocking.fastblock.ui.enabled",
        PrefKind::Bool,
    ),
    (
        "browser.contentblocking.trackingprotection.ui.enabled",
        PrefKind::Bool,
    ),
    (
        "browser.contentblocking.fastblock.control-center.ui.enabled",
        PrefKind::Bool,
    ),
    (
        "browser.contentblocking.trackingprotection.control-center.ui.enabled",
        PrefKind::Bool,
    ),
];

/// `network.cookie.cookieBehavior` → `network_cookie_cookieBehavior`
pub fn pref_field_name(pref: &str) -> String {
    pref.replace(['.', '-'], "_")
}

fn matches_kind(value: &PrefValue, kind: PrefKind) -> bool {
    matches!(
        (value, kind),
        (PrefValue::Bool(_), PrefKind::Bool)
            | (PrefValue::Int(_), PrefKind::Int)
            | (PrefValue::String(_), PrefKind::String)
    )
}

/// Turns a finished payload into the flat record the sink receives.
#[derive(Clone)]
pub struct PayloadAssembler {
    prefs: Arc<dyn PreferenceSource>,
    sink: Arc<dyn TelemetrySink>,
}

impl PayloadAssembler {
    pub fn new(prefs: Arc<dyn PreferenceSource>, sink: Arc<dyn TelemetrySink>) -> Self {
        Self { prefs, sink }
    }

    /// Adds the preference snapshot, read now, and stringifies every value.
    pub fn assemble(&self, mut payload: Payload) -> TelemetryRecord {
        for (pref, kind) in REPORTED_PREFS {
            match self.prefs.pref(pref) {
                Some(value) if matches_kind(&value, *kind) => {
                    payload.set(&pref_field_name(pref), PayloadValue::from(value));
                }
                Some(value) => {
                    log_warn!("Pref {pref} has unexpected type ({value:?}); not reported");
                }
                None => {}
            }
        }

        payload
            .into_fields()
            .into_iter()
            .map(|(key, value)| (key, value.to_string()))
            .collect()
    }

    pub fn flush(&self, payload: Payload) {
        let record = self.assemble(payload);
        log_debug!("Flushing telemetry record with {} fields", record.len());
        self.sink.send(record);
    }
}
