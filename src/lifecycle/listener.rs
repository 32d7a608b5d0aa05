use anyhow::{bail, Context, Result};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::models::BrowserEvent;

use super::{
    bus::{EventBus, ListenerId},
    controller::TabTelemetryController,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

/// Feeds events from an [`EventBus`] subscription into the controller, one
/// at a time, on a background task.
pub struct EventListener {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    subscription: Option<(EventBus, ListenerId)>,
}

impl Default for EventListener {
    fn default() -> Self {
        Self::new()
    }
}

impl EventListener {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
            subscription: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start(&mut self, controller: TabTelemetryController, bus: &EventBus) -> Result<()> {
        if self.handle.is_some() {
            bail!("event listener already active");
        }

        let subscription = bus.subscribe();
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(event_loop(
            controller,
            subscription.events,
            cancel_token.clone(),
        ));

        log_info!("Listening for browser events (listener {})", subscription.id);
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        self.subscription = Some((bus.clone(), subscription.id));
        Ok(())
    }

    /// Unsubscribes, lets already queued events finish, then joins the task.
    pub async fn stop(&mut self) -> Result<()> {
        self.unsubscribe();
        self.cancel_token = None;
        self.join().await
    }

    /// Stops right away; queued events are discarded.
    pub async fn cancel(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.unsubscribe();
        self.join().await
    }

    fn unsubscribe(&mut self) {
        if let Some((bus, id)) = self.subscription.take() {
            bus.unsubscribe(id);
        }
    }

    async fn join(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("event listener task failed to join")
        } else {
            Ok(())
        }
    }
}

async fn event_loop(
    controller: TabTelemetryController,
    mut events: mpsc::UnboundedReceiver<BrowserEvent>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("event listener cancelled");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else {
                    log_debug!("event stream closed");
                    break;
                };
                let kind = event.kind();
                let tab_id = event.tab_id();
                if let Err(err) = controller.handle_event(event).await {
                    log_error!("{kind} handler failed for tab {tab_id}: {err:?}");
                }
            }
        }
    }
}
