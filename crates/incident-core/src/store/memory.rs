//! In-memory incident store.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use incident_types::{Incident, IncidentDraft, IncidentRef, Note, Severity, Status, Watcher};

use super::IncidentStore;
use crate::error::StoreError;

#[derive(Default)]
struct State {
    incidents: Vec<Incident>,
    last_key: i64,
    writes: usize,
    fail_inserts: bool,
    fail_watcher_adds: bool,
}

impl State {
    fn position(&self, reference: &IncidentRef) -> Option<usize> {
        self.incidents.iter().position(|i| match reference {
            IncidentRef::Id(id) => i.id == *id,
            IncidentRef::Key(key) => i.incident_key == *key,
        })
    }

    /// Applies `mutate` to the incident with `id` and counts one write.
    fn update<F>(&mut self, id: &str, at: DateTime<Utc>, mutate: F) -> Option<Incident>
    where
        F: FnOnce(&mut Incident),
    {
        let idx = self.position(&IncidentRef::Id(id.to_string()))?;
        let incident = &mut self.incidents[idx];
        mutate(incident);
        incident.updated_at = at;
        self.writes += 1;
        Some(incident.clone())
    }
}

/// Mutex-guarded store for tests and for running without SQLite.
///
/// Faults can be switched on to make inserts or watcher adds fail with
/// [`StoreError::Unavailable`].
#[derive(Default)]
pub struct MemoryIncidentStore {
    state: Mutex<State>,
}

impl MemoryIncidentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    /// Makes every subsequent `insert` fail.
    pub fn fail_inserts(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_inserts = fail;
        }
    }

    /// Makes every subsequent `add_watcher` fail.
    pub fn fail_watcher_adds(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_watcher_adds = fail;
        }
    }

    /// Number of successful writes (inserts and matched updates) so far.
    pub fn write_count(&self) -> usize {
        self.state.lock().map(|s| s.writes).unwrap_or(0)
    }
}

impl IncidentStore for MemoryIncidentStore {
    fn allocate_incident_key(&self) -> Result<i64, StoreError> {
        let mut state = self.lock()?;
        state.last_key += 1;
        Ok(state.last_key)
    }

    fn insert(&self, draft: IncidentDraft) -> Result<Incident, StoreError> {
        let mut state = self.lock()?;
        if state.fail_inserts {
            return Err(StoreError::Unavailable("insert rejected".to_string()));
        }
        if state.position(&IncidentRef::Key(draft.incident_key)).is_some() {
            return Err(StoreError::Unavailable(format!(
                "incident key {} already taken",
                draft.incident_key
            )));
        }

        let mut incident = draft.into_incident(uuid::Uuid::new_v4().to_string());
        let mut seen = Vec::with_capacity(incident.watch_list.len());
        incident.watch_list.retain(|w| {
            let fresh = !seen.contains(&w.email);
            seen.push(w.email.clone());
            fresh
        });

        state.incidents.push(incident.clone());
        state.writes += 1;
        Ok(incident)
    }

    fn find(&self, reference: &IncidentRef) -> Result<Option<Incident>, StoreError> {
        let state = self.lock()?;
        Ok(state.position(reference).map(|idx| state.incidents[idx].clone()))
    }

    fn list_newest_first(&self) -> Result<Vec<Incident>, StoreError> {
        let state = self.lock()?;
        let mut all = state.incidents.clone();
        all.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.incident_key.cmp(&a.incident_key))
        });
        Ok(all)
    }

    fn set_status(
        &self,
        id: &str,
        status: Status,
        at: DateTime<Utc>,
    ) -> Result<Option<Incident>, StoreError> {
        Ok(self.lock()?.update(id, at, |i| i.status = status))
    }

    fn set_severity(
        &self,
        id: &str,
        severity: Severity,
        at: DateTime<Utc>,
    ) -> Result<Option<Incident>, StoreError> {
        Ok(self.lock()?.update(id, at, |i| i.severity = severity))
    }

    fn push_note(
        &self,
        id: &str,
        note: &Note,
        at: DateTime<Utc>,
    ) -> Result<Option<Incident>, StoreError> {
        Ok(self.lock()?.update(id, at, |i| i.notes.push(note.clone())))
    }

    fn add_watcher(
        &self,
        id: &str,
        watcher: &Watcher,
        at: DateTime<Utc>,
    ) -> Result<Option<Incident>, StoreError> {
        let mut state = self.lock()?;
        if state.fail_watcher_adds {
            return Err(StoreError::Unavailable("watcher add rejected".to_string()));
        }
        Ok(state.update(id, at, |i| {
            if !i.is_watched_by(&watcher.email) {
                i.watch_list.push(watcher.clone());
            }
        }))
    }
}
