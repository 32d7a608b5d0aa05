use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use tab_telemetry_lib::{
    db::{Database, KeyValueStore, MemoryStore},
    identity::{hash_site, UserId, USER_ID_KEY},
    lifecycle::{EventBus, EventListener, TabTelemetryController, TelemetryDeps},
    models::{fields, BrowserEvent, PageData, SurveyAnswer, SurveyCode, TabId, TabPhase},
    settings::{PrefValue, PreferenceSource},
    survey::{SurveyEngine, SurveyPrompt},
    telemetry::{TelemetryRecord, TelemetrySink},
};

#[derive(Default)]
struct Prefs(Mutex<HashMap<String, PrefValue>>);

impl Prefs {
    fn set(&self, name: &str, value: PrefValue) {
        self.0.lock().unwrap().insert(name.to_string(), value);
    }
}

impl PreferenceSource for Prefs {
    fn pref(&self, name: &str) -> Option<PrefValue> {
        self.0.lock().unwrap().get(name).cloned()
    }
}

#[derive(Default)]
struct RecordingSink(Mutex<Vec<TelemetryRecord>>);

impl RecordingSink {
    fn records(&self) -> Vec<TelemetryRecord> {
        self.0.lock().unwrap().clone()
    }
}

impl TelemetrySink for RecordingSink {
    fn send(&self, record: TelemetryRecord) {
        self.0.lock().unwrap().push(record);
    }
}

#[derive(Default)]
struct CountingPrompt(AtomicUsize);

impl CountingPrompt {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl SurveyPrompt for CountingPrompt {
    fn show(&self, _tab_id: TabId) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    controller: TabTelemetryController,
    store: Arc<dyn KeyValueStore>,
    prefs: Arc<Prefs>,
    sink: Arc<RecordingSink>,
    prompt: Arc<CountingPrompt>,
}

impl Harness {
    async fn with_store(store: Arc<dyn KeyValueStore>, seed: u64) -> Self {
        let prefs = Arc::new(Prefs::default());
        let sink = Arc::new(RecordingSink::default());
        let prompt = Arc::new(CountingPrompt::default());
        let controller = TabTelemetryController::configure_with_engine(
            TelemetryDeps {
                store: store.clone(),
                prefs: prefs.clone(),
                sink: sink.clone(),
                prompt: prompt.clone(),
            },
            SurveyEngine::with_seed(seed),
        )
        .await
        .unwrap();

        Self {
            controller,
            store,
            prefs,
            sink,
            prompt,
        }
    }

    async fn new(seed: u64) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), seed).await
    }

    async fn hashed(&self, site: &str) -> String {
        let user_id = self.store.get(USER_ID_KEY).await.unwrap().unwrap();
        hash_site(&UserId::new(user_id), site).into_string()
    }

    /// Leaves the tab on an interacted page of `site` whose next load is a reload.
    async fn interacted_reload_of(&self, tab_id: TabId, site: &str) {
        self.controller
            .on_page_before_unload(
                tab_id,
                &PageData {
                    previous_pages_were_interacted: Some(true),
                    page_reloaded: Some(true),
                    site: Some(site.to_string()),
                    ..PageData::default()
                },
            )
            .await
            .unwrap();
        self.controller.on_page_unload(tab_id).await;
    }
}

fn navigation(site: &str) -> PageData {
    PageData {
        page_reloaded: Some(false),
        site: Some(site.to_string()),
        ..PageData::default()
    }
}

#[tokio::test]
async fn sixth_interacted_reload_guarantees_the_survey() {
    for seed in 0..20 {
        let harness = Harness::new(seed).await;
        harness.interacted_reload_of(1, "a.example").await;

        for _ in 0..6 {
            harness.controller.on_reload(1, Some("a.example")).await.unwrap();
        }

        let session = harness.controller.session(1).await.unwrap();
        assert_eq!(session.reload_count, 6);
        assert!(session.survey_shown);
        assert_eq!(harness.prompt.count(), 1, "seed {seed}");
    }
}

#[tokio::test]
async fn survey_is_never_shown_twice_in_one_visit() {
    let harness = Harness::new(5).await;
    harness.interacted_reload_of(1, "a.example").await;

    for _ in 0..10 {
        harness.controller.on_reload(1, Some("a.example")).await.unwrap();
        // Reload page-visits keep the survey state.
        harness.interacted_reload_of(1, "a.example").await;
    }
    assert_eq!(harness.prompt.count(), 1);

    let records = harness.sink.records();
    assert_eq!(records.len(), 11);
    let shown = records
        .iter()
        .filter(|record| record.get("page_reloaded_survey").map(String::as_str) == Some("1"))
        .count();
    assert_eq!(shown, 1);
    assert!(records
        .iter()
        .any(|record| record.get("page_reloaded_survey").map(String::as_str) == Some("6")));
}

#[tokio::test]
async fn navigation_resets_reload_state_and_allows_a_new_survey() {
    let harness = Harness::new(9).await;
    harness.interacted_reload_of(2, "a.example").await;
    for _ in 0..6 {
        harness.controller.on_reload(2, Some("a.example")).await.unwrap();
    }
    assert_eq!(harness.prompt.count(), 1);

    // A reload-flagged before-unload keeps everything.
    harness.interacted_reload_of(2, "a.example").await;
    let session = harness.controller.session(2).await.unwrap();
    assert!(session.survey_shown);
    assert_eq!(session.reload_count, 6);

    harness
        .controller
        .on_page_before_unload(2, &navigation("a.example"))
        .await
        .unwrap();
    let session = harness.controller.session(2).await.unwrap();
    assert!(!session.survey_shown);
    assert_eq!(session.reload_count, 0);
    assert!(!session.previous_pages_were_interacted);
    assert_eq!(session.phase, TabPhase::Unloading);
    harness.controller.on_page_unload(2).await;

    harness.interacted_reload_of(2, "a.example").await;
    for _ in 0..6 {
        harness.controller.on_reload(2, Some("a.example")).await.unwrap();
    }
    assert_eq!(harness.prompt.count(), 2);
}

#[tokio::test]
async fn reload_before_interaction_makes_no_decision() {
    let harness = Harness::new(1).await;
    for _ in 0..10 {
        harness.controller.on_reload(5, Some("a.example")).await.unwrap();
    }

    let session = harness.controller.session(5).await.unwrap();
    assert_eq!(session.reload_count, 0);
    assert!(!session.survey_shown);
    assert_eq!(session.payload.survey_code(), None);
    assert_eq!(harness.prompt.count(), 0);
}

#[tokio::test]
async fn answered_site_is_never_prompted_again() {
    let harness = Harness::new(2).await;
    harness.interacted_reload_of(1, "a.example").await;
    for _ in 0..6 {
        harness.controller.on_reload(1, Some("a.example")).await.unwrap();
    }
    assert_eq!(harness.prompt.count(), 1);

    harness
        .controller
        .on_survey_answered(1, SurveyAnswer::Broken)
        .await
        .unwrap();
    let session = harness.controller.session(1).await.unwrap();
    assert_eq!(session.payload.survey_code(), Some(SurveyCode::PageBroken));
    assert_eq!(
        harness
            .store
            .get(&harness.hashed("a.example").await)
            .await
            .unwrap()
            .as_deref(),
        Some("4")
    );

    // Same site in another tab, many reloads later.
    harness.interacted_reload_of(7, "a.example").await;
    for _ in 0..8 {
        harness.controller.on_reload(7, Some("a.example")).await.unwrap();
    }
    let session = harness.controller.session(7).await.unwrap();
    assert_eq!(session.payload.survey_code(), Some(SurveyCode::PreviouslyBroken));
    assert!(!session.survey_shown);
    assert_eq!(harness.prompt.count(), 1);
}

#[tokio::test]
async fn tab_close_flushes_once_and_deletes_the_session() {
    let harness = Harness::new(3).await;
    harness
        .controller
        .on_page_before_unload(4, &navigation("a.example"))
        .await
        .unwrap();

    harness.controller.on_tab_removed(4).await;
    assert_eq!(harness.sink.records().len(), 1);
    assert!(harness.controller.session(4).await.is_none());

    harness.controller.on_tab_removed(4).await;
    assert_eq!(harness.sink.records().len(), 1);
}

#[tokio::test]
async fn duplicate_unload_flushes_only_once() {
    let harness = Harness::new(3).await;
    harness
        .controller
        .on_page_before_unload(6, &navigation("a.example"))
        .await
        .unwrap();

    harness.controller.on_page_unload(6).await;
    harness.controller.on_page_unload(6).await;

    assert_eq!(harness.sink.records().len(), 1);
    let session = harness.controller.session(6).await.unwrap();
    assert!(session.payload.is_empty());
    assert_eq!(session.phase, TabPhase::Flushed);

    // Nothing left for the close either.
    harness.controller.on_tab_removed(6).await;
    assert_eq!(harness.sink.records().len(), 1);
}

#[tokio::test]
async fn flushed_record_carries_every_field_stringified() {
    let harness = Harness::new(3).await;
    harness
        .prefs
        .set("privacy.trackingprotection.enabled", PrefValue::Bool(true));
    harness
        .prefs
        .set("network.cookie.cookieBehavior", PrefValue::Int(4));

    harness.controller.on_identity_popup_shown(3).await;
    harness.controller.on_toggle_exception(3, true).await;
    harness.controller.on_report_breakage(3).await;
    harness
        .controller
        .on_page_before_unload(
            3,
            &PageData {
                previous_pages_were_interacted: Some(true),
                embedded_social_script: Some(true),
                login_form_on_page: Some(false),
                password_field_was_filled_in: Some(false),
                user_has_tracking_protection_exception: Some(true),
                page_reloaded: Some(false),
                num_blockable_trackers: Some(3),
                hostname: Some("www.a.example".to_string()),
                site: Some("a.example".to_string()),
            },
        )
        .await
        .unwrap();

    // Prefs are read at flush time, not when the data was collected.
    harness
        .prefs
        .set("network.cookie.cookieBehavior", PrefValue::Int(1));
    harness.controller.on_page_unload(3).await;

    let records = harness.sink.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    let expected = [
        (fields::ETLD, harness.hashed("a.example").await),
        (fields::PREVIOUS_PAGES_WERE_INTERACTED, "true".to_string()),
        (fields::EMBEDDED_SOCIAL_SCRIPT, "true".to_string()),
        (fields::LOGIN_FORM_ON_PAGE, "false".to_string()),
        (fields::PASSWORD_FIELD_WAS_FILLED_IN, "false".to_string()),
        (
            fields::USER_HAS_TRACKING_PROTECTION_EXCEPTION,
            "true".to_string(),
        ),
        (fields::PAGE_RELOADED, "false".to_string()),
        (fields::NUM_BLOCKABLE_TRACKERS, "3".to_string()),
        (fields::USER_OPENED_CONTROL_CENTER, "true".to_string()),
        (fields::USER_REPORTED_PAGE_BREAKAGE, "true".to_string()),
        (fields::USER_TOGGLED_EXCEPTION, "1".to_string()),
        ("privacy_trackingprotection_enabled", "true".to_string()),
        ("network_cookie_cookieBehavior", "1".to_string()),
    ];
    for (key, value) in &expected {
        assert_eq!(record.get(*key), Some(value), "field {key}");
    }
    assert_eq!(record.len(), expected.len());
    assert!(!record.values().any(|value| value.contains("a.example")));
}

#[tokio::test]
async fn events_through_the_bus_are_processed_in_order() {
    let harness = Harness::new(4).await;
    let bus = EventBus::new();
    let mut listener = EventListener::new();
    listener.start(harness.controller.clone(), &bus).unwrap();
    assert!(listener.is_active());
    assert!(listener.start(harness.controller.clone(), &bus).is_err());

    let events = [
        BrowserEvent::Reload {
            tab_id: -3,
            site: Some("a.example".into()),
        },
        BrowserEvent::PageBeforeUnload {
            tab_id: 1,
            data: navigation("a.example"),
        },
        BrowserEvent::PageUnload { tab_id: 1 },
        BrowserEvent::PageUnload { tab_id: 1 },
        BrowserEvent::PageBeforeUnload {
            tab_id: 2,
            data: navigation("b.example"),
        },
        BrowserEvent::TabRemoved { tab_id: 2 },
    ];
    for event in events {
        assert_eq!(bus.emit(event), 1);
    }

    listener.stop().await.unwrap();
    assert!(!listener.is_active());
    assert_eq!(bus.listener_count(), 0);

    let records = harness.sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["etld"], harness.hashed("a.example").await);
    assert_eq!(records[1]["etld"], harness.hashed("b.example").await);
    assert_eq!(harness.controller.tab_count().await, 1);
}

#[tokio::test]
async fn cancelled_listener_stops_consuming() {
    let harness = Harness::new(4).await;
    let bus = EventBus::new();
    let mut listener = EventListener::new();
    listener.start(harness.controller.clone(), &bus).unwrap();

    listener.cancel().await.unwrap();
    assert_eq!(bus.emit(BrowserEvent::IdentityPopupShown { tab_id: 1 }), 0);
    assert_eq!(harness.controller.tab_count().await, 0);
}

#[tokio::test]
async fn identity_and_answers_survive_a_restart_with_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.sqlite3");

    let first_hash = {
        let store: Arc<dyn KeyValueStore> = Arc::new(Database::new(path.clone()).unwrap());
        let harness = Harness::with_store(store, 1).await;
        harness
            .controller
            .on_reload(1, Some("a.example"))
            .await
            .unwrap();
        harness
            .controller
            .on_survey_answered(1, SurveyAnswer::NotBroken)
            .await
            .unwrap();
        harness.hashed("a.example").await
    };

    let store: Arc<dyn KeyValueStore> = Arc::new(Database::new(path).unwrap());
    let harness = Harness::with_store(store, 1).await;
    assert_eq!(harness.hashed("a.example").await, first_hash);

    harness.interacted_reload_of(1, "a.example").await;
    harness.controller.on_reload(1, Some("a.example")).await.unwrap();
    let session = harness.controller.session(1).await.unwrap();
    assert_eq!(
        session.payload.survey_code(),
        Some(SurveyCode::PreviouslyNotBroken)
    );
    assert_eq!(harness.prompt.count(), 0);
}
