//! Behavior tests for the lifecycle manager.

use std::sync::{Arc, Mutex};

use incident_events::{EmitError, EmitFailurePolicy, EventEmitter, EventEnvelope};
use incident_types::{
    AddNoteRequest, AddWatcherRequest, CreateIncidentRequest, Incident, IncidentRef, NewNote,
    NoteType, Severity, Status, UpdateSeverityRequest, UpdateStatusRequest, Watcher,
};

use crate::error::{ErrorKind, LifecycleError};
use crate::manager::IncidentManager;
use crate::store::{IncidentStore, MemoryIncidentStore, SqliteIncidentStore};
use crate::transition::can_transition;

#[derive(Default)]
struct RecordingEmitter {
    seen: Mutex<Vec<EventEnvelope>>,
}

impl RecordingEmitter {
    fn event_types(&self) -> Vec<&'static str> {
        self.seen.lock().unwrap().iter().map(|e| e.event_type).collect()
    }
}

impl EventEmitter for RecordingEmitter {
    fn emit(&self, envelope: &EventEnvelope) -> Result<(), EmitError> {
        self.seen.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}

struct BrokenEmitter;

impl EventEmitter for BrokenEmitter {
    fn emit(&self, _envelope: &EventEnvelope) -> Result<(), EmitError> {
        Err(EmitError::QueueFull)
    }
}

struct Harness {
    manager: IncidentManager,
    store: Arc<MemoryIncidentStore>,
    events: Arc<RecordingEmitter>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryIncidentStore::new());
    let events = Arc::new(RecordingEmitter::default());
    let manager = IncidentManager::new(store.clone(), events.clone());
    Harness {
        manager,
        store,
        events,
    }
}

fn create_request(title: &str, severity: &str, author: &str) -> CreateIncidentRequest {
    CreateIncidentRequest {
        title: title.to_string(),
        severity: severity.to_string(),
        author_email: author.to_string(),
        ..Default::default()
    }
}

fn status(to: &str, author: &str) -> UpdateStatusRequest {
    UpdateStatusRequest {
        status: to.to_string(),
        author_email: author.to_string(),
    }
}

fn by_id(incident: &Incident) -> IncidentRef {
    IncidentRef::Id(incident.id.clone())
}

fn create(h: &Harness) -> Incident {
    h.manager
        .create_incident(&create_request("Disk full on db-1", "high", ""))
        .expect("create")
}

// ── creation ─────────────────────────────────────────────────────────

#[test]
fn create_on_empty_store_assigns_key_one_and_watches_author() {
    let h = harness();
    let incident = h
        .manager
        .create_incident(&create_request(
            "Database Connection Failed",
            "critical",
            "a@b.com",
        ))
        .unwrap();

    assert_eq!(incident.incident_key, 1);
    assert_eq!(incident.status, Status::Open);
    assert_eq!(incident.severity, Severity::Critical);
    assert_eq!(
        incident.watch_list,
        vec![Watcher {
            email: "a@b.com".into()
        }]
    );
    assert_eq!(incident.created_by, "a@b.com");
    assert!(!incident.id.is_empty());
    assert_eq!(incident.created_at, incident.updated_at);
    assert_eq!(h.events.event_types(), ["incident.created"]);
}

#[test]
fn keys_increase_and_ids_are_fresh() {
    let h = harness();
    let first = create(&h);
    let second = create(&h);
    assert_eq!(first.incident_key, 1);
    assert_eq!(second.incident_key, 2);
    assert_ne!(first.id, second.id);
}

#[test]
fn authorless_creation_has_empty_watch_list() {
    let h = harness();
    let incident = create(&h);
    assert!(incident.watch_list.is_empty());
    assert_eq!(incident.created_by, "");
}

#[test]
fn creation_notes_get_fresh_ids_and_default_type() {
    let h = harness();
    let mut request = create_request("Latency spike", "medium", "");
    request.notes = vec![
        NewNote {
            content: "p99 at 4s".into(),
            author_email: "a@b.com".into(),
            note_type: None,
        },
        NewNote {
            content: "looking at the LB".into(),
            author_email: "a@b.com".into(),
            note_type: Some("investigation".into()),
        },
    ];

    let incident = h.manager.create_incident(&request).unwrap();
    assert_eq!(incident.notes.len(), 2);
    assert_eq!(incident.notes[0].note_type, NoteType::Update);
    assert_eq!(incident.notes[1].note_type, NoteType::Investigation);
    assert_ne!(incident.notes[0].id, incident.notes[1].id);
    assert!(incident.notes.iter().all(|n| !n.id.is_empty()));
}

#[test]
fn invalid_creation_requests_never_reach_the_store() {
    let h = harness();
    let cases = [
        (create_request("ab", "high", ""), ErrorKind::InvalidInput),
        (create_request("", "high", ""), ErrorKind::InvalidInput),
        (create_request("Outage", "urgent", ""), ErrorKind::InvalidInput),
        (
            create_request("Outage", "high", "not-an-email"),
            ErrorKind::InvalidEmail,
        ),
    ];
    for (request, kind) in cases {
        let err = h.manager.create_incident(&request).unwrap_err();
        assert_eq!(err.kind(), kind, "{err}");
    }

    let mut bad_note = create_request("Outage", "high", "");
    bad_note.notes.push(NewNote {
        content: String::new(),
        ..Default::default()
    });
    assert!(matches!(
        h.manager.create_incident(&bad_note),
        Err(LifecycleError::InvalidNote(_))
    ));

    assert_eq!(h.store.write_count(), 0);
    assert!(h.events.event_types().is_empty());
}

#[test]
fn unknown_severity_is_reported_as_such() {
    let h = harness();
    let err = h
        .manager
        .create_incident(&create_request("Outage", "urgent", ""))
        .unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidSeverity(ref v) if v == "urgent"));
}

#[test]
fn title_boundaries() {
    let h = harness();
    for (len, ok) in [(2, false), (3, true), (255, true), (256, false)] {
        let result = h
            .manager
            .create_incident(&create_request(&"t".repeat(len), "low", ""));
        assert_eq!(result.is_ok(), ok, "title of {len} chars");
    }
}

#[test]
fn store_failure_on_insert_is_persistence_failure() {
    let h = harness();
    h.store.fail_inserts(true);
    let err = h
        .manager
        .create_incident(&create_request("Outage", "high", ""))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
    assert!(h.events.event_types().is_empty());
}

// ── reads ────────────────────────────────────────────────────────────

#[test]
fn get_resolves_both_id_and_key() {
    let h = harness();
    let incident = create(&h);
    assert_eq!(h.manager.get(&by_id(&incident)).unwrap(), incident);
    assert_eq!(h.manager.get(&IncidentRef::parse("1")).unwrap(), incident);
    assert!(matches!(
        h.manager.get(&IncidentRef::parse("99")),
        Err(LifecycleError::NotFound(_))
    ));
}

#[test]
fn list_is_newest_first() {
    let h = harness();
    let first = create(&h);
    let second = create(&h);
    let keys: Vec<i64> = h
        .manager
        .list()
        .unwrap()
        .iter()
        .map(|i| i.incident_key)
        .collect();
    assert_eq!(keys, [second.incident_key, first.incident_key]);
}

// ── status transitions ───────────────────────────────────────────────

#[test]
fn update_status_follows_the_transition_table() {
    for from in Status::ALL {
        for to in Status::ALL {
            let h = harness();
            let incident = create(&h);
            if from != Status::Open {
                h.manager
                    .update_status(&by_id(&incident), &status(from.as_str(), ""))
                    .unwrap();
            }

            let result = h
                .manager
                .update_status(&by_id(&incident), &status(to.as_str(), ""));
            if can_transition(from, to) {
                let updated = result.unwrap_or_else(|e| panic!("{from} -> {to}: {e}"));
                assert_eq!(updated.status, to);
            } else {
                let err = result.expect_err("transition should be rejected");
                assert_eq!(err.kind(), ErrorKind::InvalidTransition, "{from} -> {to}");
            }
        }
    }
}

#[test]
fn closed_incident_can_only_be_reopened() {
    let h = harness();
    let incident = create(&h);
    let id = by_id(&incident);
    h.manager.update_status(&id, &status("closed", "")).unwrap();

    let err = h
        .manager
        .update_status(&id, &status("in_progress", ""))
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::InvalidTransition {
            from: Status::Closed,
            to: Status::InProgress
        }
    ));

    let reopened = h.manager.update_status(&id, &status("open", "")).unwrap();
    assert_eq!(reopened.status, Status::Open);
}

#[test]
fn update_status_refreshes_updated_at_and_emits() {
    let h = harness();
    let incident = create(&h);
    let updated = h
        .manager
        .update_status(&by_id(&incident), &status("in_progress", ""))
        .unwrap();
    assert!(updated.updated_at >= incident.updated_at);
    assert_eq!(updated.created_at, incident.created_at);
    assert_eq!(
        h.events.event_types(),
        ["incident.created", "incident.status.updated"]
    );
}

#[test]
fn update_status_on_missing_incident_writes_nothing() {
    let h = harness();
    create(&h);
    let writes = h.store.write_count();

    let err = h
        .manager
        .update_status(&IncidentRef::parse("does-not-exist"), &status("closed", ""))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(h.store.write_count(), writes);
}

#[test]
fn unknown_status_is_rejected_before_lookup() {
    let h = harness();
    let err = h
        .manager
        .update_status(&IncidentRef::parse("missing"), &status("done", ""))
        .unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidStatus(_)));
}

#[test]
fn update_status_with_author_adds_watcher() {
    let h = harness();
    let incident = create(&h);
    let updated = h
        .manager
        .update_status(&by_id(&incident), &status("resolved", "ops@example.com"))
        .unwrap();
    assert_eq!(updated.status, Status::Resolved);
    assert!(updated.is_watched_by("ops@example.com"));
}

#[test]
fn invalid_author_email_fails_before_any_write() {
    let h = harness();
    let incident = create(&h);
    let writes = h.store.write_count();

    let err = h
        .manager
        .update_status(&by_id(&incident), &status("closed", "nope"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEmail);
    assert_eq!(h.store.write_count(), writes);
    assert_eq!(
        h.manager.get(&by_id(&incident)).unwrap().status,
        Status::Open
    );
}

#[test]
fn failed_watcher_add_after_status_change_is_partial_failure() {
    let h = harness();
    let incident = create(&h);
    h.store.fail_watcher_adds(true);

    let err = h
        .manager
        .update_status(&by_id(&incident), &status("in_progress", "ops@example.com"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PartialFailure);
    match err {
        LifecycleError::PartialFailure {
            primary,
            incident: changed,
            source,
        } => {
            assert_eq!(primary, "status");
            assert_eq!(changed.status, Status::InProgress);
            assert!(changed.watch_list.is_empty());
            assert_eq!(source.kind(), ErrorKind::PersistenceFailure);
        }
        other => panic!("expected partial failure, got {other:?}"),
    }

    let stored = h.manager.get(&by_id(&incident)).unwrap();
    assert_eq!(stored.status, Status::InProgress);
    assert!(stored.watch_list.is_empty());
    assert_eq!(
        h.events.event_types(),
        ["incident.created", "incident.status.updated"]
    );
}

// ── severity ─────────────────────────────────────────────────────────

#[test]
fn any_severity_may_follow_any_other() {
    let h = harness();
    let incident = create(&h);
    for next in Severity::ALL {
        let updated = h
            .manager
            .update_severity(
                &by_id(&incident),
                &UpdateSeverityRequest {
                    severity: next.as_str().to_string(),
                    author_email: String::new(),
                },
            )
            .unwrap();
        assert_eq!(updated.severity, next);
    }
}

#[test]
fn severity_partial_failure_keeps_the_new_severity() {
    let h = harness();
    let incident = create(&h);
    h.store.fail_watcher_adds(true);

    let err = h
        .manager
        .update_severity(
            &by_id(&incident),
            &UpdateSeverityRequest {
                severity: "critical".into(),
                author_email: "ops@example.com".into(),
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::PartialFailure { primary: "severity", ref incident, .. }
            if incident.severity == Severity::Critical
    ));
    assert!(h
        .events
        .event_types()
        .contains(&"incident.severity.updated"));
}

#[test]
fn update_severity_on_missing_incident() {
    let h = harness();
    let err = h
        .manager
        .update_severity(
            &IncidentRef::parse("42"),
            &UpdateSeverityRequest {
                severity: "low".into(),
                author_email: String::new(),
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ── notes ────────────────────────────────────────────────────────────

fn note(content: &str, note_type: &str) -> AddNoteRequest {
    AddNoteRequest {
        content: content.to_string(),
        author_email: "a@b.com".to_string(),
        note_type: note_type.to_string(),
    }
}

#[test]
fn added_note_is_appended_with_fresh_id() {
    let h = harness();
    let mut request = create_request("Cert expiry", "low", "");
    request.notes.push(NewNote {
        content: "first".into(),
        ..Default::default()
    });
    let incident = h.manager.create_incident(&request).unwrap();

    h.manager
        .add_note(&by_id(&incident), &note("second", "resolution"))
        .unwrap();
    let fetched = h.manager.get(&by_id(&incident)).unwrap();

    assert_eq!(fetched.notes.len(), 2);
    let last = &fetched.notes[1];
    assert_eq!(last.content, "second");
    assert_eq!(last.note_type, NoteType::Resolution);
    assert_eq!(last.author_email, "a@b.com");
    assert_ne!(last.id, fetched.notes[0].id);
    assert_eq!(
        h.events.event_types(),
        ["incident.created", "incident.notes.added"]
    );
}

#[test]
fn note_content_boundaries() {
    let h = harness();
    let incident = create(&h);
    for (len, ok) in [(0, false), (1, true), (1000, true), (1001, false)] {
        let result = h
            .manager
            .add_note(&by_id(&incident), &note(&"n".repeat(len), "update"));
        assert_eq!(result.is_ok(), ok, "note of {len} chars");
        if !ok {
            assert!(matches!(result, Err(LifecycleError::InvalidNote(_))));
        }
    }
}

#[test]
fn note_type_must_be_known() {
    let h = harness();
    let incident = create(&h);
    for raw in ["memo", "", "  "] {
        assert!(matches!(
            h.manager.add_note(&by_id(&incident), &note("x", raw)),
            Err(LifecycleError::InvalidNote(_))
        ));
    }
    assert!(h.manager.get(&by_id(&incident)).unwrap().notes.is_empty());
    assert_eq!(h.events.event_types(), ["incident.created"]);

    let updated = h.manager.add_note(&by_id(&incident), &note("x", "update")).unwrap();
    assert_eq!(updated.notes[0].note_type, NoteType::Update);
}

#[test]
fn add_note_to_missing_incident() {
    let h = harness();
    let err = h
        .manager
        .add_note(&IncidentRef::parse("7"), &note("x", "update"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ── watchers ─────────────────────────────────────────────────────────

fn watch(email: &str) -> AddWatcherRequest {
    AddWatcherRequest {
        email: email.to_string(),
    }
}

#[test]
fn adding_the_same_watcher_twice_keeps_one() {
    let h = harness();
    let incident = create(&h);
    h.manager
        .add_watcher(&by_id(&incident), &watch("a@b.com"))
        .unwrap();
    let updated = h
        .manager
        .add_watcher(&by_id(&incident), &watch("a@b.com"))
        .unwrap();
    assert_eq!(
        updated.watch_list.iter().filter(|w| w.email == "a@b.com").count(),
        1
    );
}

#[test]
fn invalid_watcher_email_leaves_watch_list_unchanged() {
    let h = harness();
    let incident = h
        .manager
        .create_incident(&create_request("Packet loss", "high", "a@b.com"))
        .unwrap();

    let err = h
        .manager
        .add_watcher(&by_id(&incident), &watch("not-an-email"))
        .unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidEmail(_)));
    assert_eq!(
        h.manager.get(&by_id(&incident)).unwrap().watch_list,
        incident.watch_list
    );
}

#[test]
fn add_watcher_emits_no_event() {
    let h = harness();
    let incident = create(&h);
    h.manager
        .add_watcher(&by_id(&incident), &watch("ops@example.com"))
        .unwrap();
    assert_eq!(h.events.event_types(), ["incident.created"]);
}

#[test]
fn add_watcher_to_missing_incident() {
    let h = harness();
    let err = h
        .manager
        .add_watcher(&IncidentRef::parse("3"), &watch("a@b.com"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ── emission policy ──────────────────────────────────────────────────

#[test]
fn emission_failure_never_fails_the_operation() {
    for policy in [EmitFailurePolicy::Ignore, EmitFailurePolicy::Log] {
        let store = Arc::new(MemoryIncidentStore::new());
        let manager =
            IncidentManager::new(store.clone(), Arc::new(BrokenEmitter)).with_emit_policy(policy);
        assert_eq!(manager.emit_policy(), policy);

        let incident = manager
            .create_incident(&create_request("Outage", "high", ""))
            .unwrap();
        manager
            .update_status(&by_id(&incident), &status("closed", ""))
            .unwrap();
        manager
            .add_note(&by_id(&incident), &note("all clear", "communication"))
            .unwrap();
        assert_eq!(store.write_count(), 3);
    }
}

// ── sqlite-backed ────────────────────────────────────────────────────

#[test]
fn lifecycle_over_sqlite_store() {
    let settings = incident_db::DbRuntimeSettings {
        pool_max_size: 1,
        ..Default::default()
    };
    let pool = incident_db::open_migrated_pool(":memory:", settings).expect("pool");
    let store: Arc<dyn IncidentStore> = Arc::new(SqliteIncidentStore::new(pool));
    let events = Arc::new(RecordingEmitter::default());
    let manager = IncidentManager::new(store, events.clone());

    let incident = manager
        .create_incident(&create_request(
            "Database Connection Failed",
            "critical",
            "a@b.com",
        ))
        .unwrap();
    assert_eq!(incident.incident_key, 1);

    let key = IncidentRef::parse("1");
    manager
        .update_status(&key, &status("in_progress", "b@c.com"))
        .unwrap();
    manager.add_note(&key, &note("restarted pgbouncer", "investigation")).unwrap();
    manager.add_watcher(&key, &watch("a@b.com")).unwrap();

    let fetched = manager.get(&key).unwrap();
    assert_eq!(fetched.status, Status::InProgress);
    assert_eq!(fetched.notes.len(), 1);
    let emails: Vec<&str> = fetched.watch_list.iter().map(|w| w.email.as_str()).collect();
    assert_eq!(emails, ["a@b.com", "b@c.com"]);
    assert_eq!(events.event_types().len(), 3);
}
