use std::collections::HashMap;

use crate::models::{Payload, TabId, TabSession};

/// Tab id → session. Owned by the lifecycle controller; nothing else mutates it.
#[derive(Debug, Default)]
pub struct TabSessionStore {
    sessions: HashMap<TabId, TabSession>,
}

impl TabSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, tab_id: TabId) -> &mut TabSession {
        self.sessions.entry(tab_id).or_default()
    }

    pub fn get(&self, tab_id: TabId) -> Option<&TabSession> {
        self.sessions.get(&tab_id)
    }

    pub fn get_mut(&mut self, tab_id: TabId) -> Option<&mut TabSession> {
        self.sessions.get_mut(&tab_id)
    }

    /// Clears the payload for the next page-visit and hands back the old one.
    /// The session itself, with its reload and survey state, stays.
    pub fn reset(&mut self, tab_id: TabId) -> Option<Payload> {
        self.sessions
            .get_mut(&tab_id)
            .map(|session| std::mem::take(&mut session.payload))
    }

    pub fn delete(&mut self, tab_id: TabId) -> Option<TabSession> {
        self.sessions.remove(&tab_id)
    }

    pub fn contains(&self, tab_id: TabId) -> bool {
        self.sessions.contains_key(&tab_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
