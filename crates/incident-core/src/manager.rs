//! The incident lifecycle manager.

use std::sync::Arc;

use chrono::Utc;
use incident_events::{emit_with_policy, EmitFailurePolicy, EventEmitter, IncidentEvent};
use incident_types::{
    AddNoteRequest, AddWatcherRequest, CreateIncidentRequest, Incident, IncidentDraft,
    IncidentRef, NewNote, Note, NoteType, Status, UpdateSeverityRequest, UpdateStatusRequest,
    Watcher,
};

use crate::error::LifecycleError;
use crate::store::IncidentStore;
use crate::transition::check_transition;
use crate::validation::{
    is_supplied, parse_note_type, parse_severity, parse_status, validate_email,
    validate_note_content, validate_title,
};

/// Orchestrates validation, store calls and event emission for every
/// incident operation.
///
/// Holds no mutable state of its own; all durable state lives in the
/// injected [`IncidentStore`]. Every operation is blocking.
#[derive(Clone)]
pub struct IncidentManager {
    store: Arc<dyn IncidentStore>,
    emitter: Arc<dyn EventEmitter>,
    emit_policy: EmitFailurePolicy,
}

impl IncidentManager {
    pub fn new(store: Arc<dyn IncidentStore>, emitter: Arc<dyn EventEmitter>) -> Self {
        Self {
            store,
            emitter,
            emit_policy: EmitFailurePolicy::default(),
        }
    }

    pub fn with_emit_policy(mut self, policy: EmitFailurePolicy) -> Self {
        self.emit_policy = policy;
        self
    }

    pub fn emit_policy(&self) -> EmitFailurePolicy {
        self.emit_policy
    }

    fn emit(&self, event: IncidentEvent) {
        emit_with_policy(self.emitter.as_ref(), &event, self.emit_policy);
    }

    /// Looks the incident up, failing with `NotFound` when absent.
    fn require(&self, reference: &IncidentRef) -> Result<Incident, LifecycleError> {
        self.store
            .find(reference)?
            .ok_or_else(|| LifecycleError::NotFound(reference.to_string()))
    }

    /// Validates an optional author email and turns it into a watcher.
    fn author_watcher(email: &str) -> Result<Option<Watcher>, LifecycleError> {
        if !is_supplied(email) {
            return Ok(None);
        }
        validate_email(email)?;
        Ok(Some(Watcher {
            email: email.to_string(),
        }))
    }

    fn note_type_or_default(raw: Option<&str>) -> Result<NoteType, LifecycleError> {
        match raw {
            Some(raw) if !raw.trim().is_empty() => parse_note_type(raw),
            _ => Ok(NoteType::default()),
        }
    }

    fn fresh_note(content: &str, author_email: &str, note_type: NoteType) -> Note {
        Note {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
            author_email: author_email.to_string(),
            note_type,
        }
    }

    /// Creates an incident in the `open` state.
    ///
    /// The author, when given, becomes the first watcher. Supplied notes
    /// get fresh ids and timestamps.
    pub fn create_incident(
        &self,
        request: &CreateIncidentRequest,
    ) -> Result<Incident, LifecycleError> {
        validate_title(&request.title)?;
        let severity = parse_severity(&request.severity)?;
        let author = Self::author_watcher(&request.author_email)?;

        let mut checked = Vec::with_capacity(request.notes.len());
        for NewNote {
            content,
            author_email,
            note_type,
        } in &request.notes
        {
            validate_note_content(content)?;
            let note_type = Self::note_type_or_default(note_type.as_deref())?;
            checked.push((content, author_email, note_type));
        }

        let incident_key = self.store.allocate_incident_key()?;
        let notes = checked
            .into_iter()
            .map(|(content, author_email, note_type)| {
                Self::fresh_note(content, author_email, note_type)
            })
            .collect();

        let draft = IncidentDraft {
            incident_key,
            title: request.title.clone(),
            severity,
            status: Status::Open,
            created_at: Utc::now(),
            notes,
            watch_list: author.into_iter().collect(),
            created_by: request.author_email.trim().to_string(),
            description: request.description.clone(),
            assignee: request.assignee.clone(),
        };
        let incident = self.store.insert(draft)?;

        tracing::info!(
            incident_id = %incident.id,
            incident_key = incident.incident_key,
            severity = %incident.severity,
            "incident created"
        );
        self.emit(IncidentEvent::created(&incident));
        Ok(incident)
    }

    /// Fetches one incident by storage id or incident key.
    pub fn get(&self, reference: &IncidentRef) -> Result<Incident, LifecycleError> {
        tracing::debug!(incident = %reference, "fetching incident");
        self.require(reference)
    }

    /// All incidents, newest first.
    pub fn list(&self) -> Result<Vec<Incident>, LifecycleError> {
        let incidents = self.store.list_newest_first()?;
        tracing::debug!(count = incidents.len(), "listed incidents");
        Ok(incidents)
    }

    /// Moves the incident to a new status, then adds the author as a watcher.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the table forbids the move. `PartialFailure`
    /// if the status changed but the watcher could not be added.
    pub fn update_status(
        &self,
        reference: &IncidentRef,
        request: &UpdateStatusRequest,
    ) -> Result<Incident, LifecycleError> {
        let status = parse_status(&request.status)?;
        let author = Self::author_watcher(&request.author_email)?;

        let current = self.require(reference)?;
        check_transition(current.status, status)?;

        let updated = self
            .store
            .set_status(&current.id, status, Utc::now())?
            .ok_or_else(|| LifecycleError::NotFound(reference.to_string()))?;

        tracing::info!(
            incident_id = %updated.id,
            incident_key = updated.incident_key,
            from = %current.status,
            to = %updated.status,
            "incident status updated"
        );
        self.emit(IncidentEvent::status_updated(&updated));
        self.watch_after("status", updated, author)
    }

    /// Changes the severity, then adds the author as a watcher.
    ///
    /// Any severity may follow any other.
    pub fn update_severity(
        &self,
        reference: &IncidentRef,
        request: &UpdateSeverityRequest,
    ) -> Result<Incident, LifecycleError> {
        let severity = parse_severity(&request.severity)?;
        let author = Self::author_watcher(&request.author_email)?;

        let current = self.require(reference)?;
        let updated = self
            .store
            .set_severity(&current.id, severity, Utc::now())?
            .ok_or_else(|| LifecycleError::NotFound(reference.to_string()))?;

        tracing::info!(
            incident_id = %updated.id,
            incident_key = updated.incident_key,
            from = %current.severity,
            to = %updated.severity,
            "incident severity updated"
        );
        self.emit(IncidentEvent::severity_updated(&updated));
        self.watch_after("severity", updated, author)
    }

    /// Second half of a composite update. The primary change is already
    /// durable, so a failure here becomes `PartialFailure`.
    fn watch_after(
        &self,
        primary: &'static str,
        incident: Incident,
        author: Option<Watcher>,
    ) -> Result<Incident, LifecycleError> {
        let Some(watcher) = author else {
            return Ok(incident);
        };

        let secondary = match self.store.add_watcher(&incident.id, &watcher, Utc::now()) {
            Ok(Some(updated)) => return Ok(updated),
            Ok(None) => LifecycleError::NotFound(incident.id.clone()),
            Err(e) => LifecycleError::Persistence(e),
        };
        tracing::warn!(
            incident_id = %incident.id,
            primary,
            error = %secondary,
            "watcher add failed after {primary} update"
        );
        Err(LifecycleError::PartialFailure {
            primary,
            incident: Box::new(incident),
            source: Box::new(secondary),
        })
    }

    /// Appends a note with a fresh id. The type is required.
    pub fn add_note(
        &self,
        reference: &IncidentRef,
        request: &AddNoteRequest,
    ) -> Result<Incident, LifecycleError> {
        validate_note_content(&request.content)?;
        let note_type = parse_note_type(&request.note_type)?;

        let current = self.require(reference)?;
        let note = Self::fresh_note(&request.content, &request.author_email, note_type);
        let updated = self
            .store
            .push_note(&current.id, &note, note.created_at)?
            .ok_or_else(|| LifecycleError::NotFound(reference.to_string()))?;

        tracing::info!(
            incident_id = %updated.id,
            incident_key = updated.incident_key,
            note_id = %note.id,
            note_type = %note.note_type,
            "note added"
        );
        self.emit(IncidentEvent::note_added(&updated, &note));
        Ok(updated)
    }

    /// Adds `email` to the watch list. Adding a present email changes nothing
    /// but `updated_at`. No event is emitted.
    pub fn add_watcher(
        &self,
        reference: &IncidentRef,
        request: &AddWatcherRequest,
    ) -> Result<Incident, LifecycleError> {
        validate_email(&request.email)?;
        let watcher = Watcher {
            email: request.email.clone(),
        };

        let current = self.require(reference)?;
        let updated = self
            .store
            .add_watcher(&current.id, &watcher, Utc::now())?
            .ok_or_else(|| LifecycleError::NotFound(reference.to_string()))?;

        tracing::info!(
            incident_id = %updated.id,
            incident_key = updated.incident_key,
            watchers = updated.watch_list.len(),
            "watcher added"
        );
        Ok(updated)
    }
}
