//! SQLite-backed incident store.
//!
//! An incident is spread over three tables: `incidents` for the scalar
//! fields, `incident_notes` (ordered by `seq`) and `incident_watchers`
//! (primary key `(incident_id, email)`). Every conditional update runs in
//! one transaction so the returned document reflects exactly that update.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use incident_db::DbPool;
use incident_types::{
    Incident, IncidentDraft, IncidentRef, Note, NoteType, Severity, Status, Watcher,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::IncidentStore;
use crate::error::StoreError;

const INCIDENT_COLUMNS: &str = "id, incident_key, title, severity, status, created_by, \
     description, assignee, created_at, updated_at";

/// Incident store over an `incident-db` connection pool.
///
/// The pool must have had migrations applied.
#[derive(Clone)]
pub struct SqliteIncidentStore {
    pool: DbPool,
}

impl SqliteIncidentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Fixed-width RFC 3339 so that text order equals time order.
fn encode_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {raw:?}: {e}")))
}

fn decode<T>(raw: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr<Err = incident_types::ParseEnumError>,
{
    raw.parse().map_err(|e: incident_types::ParseEnumError| StoreError::Corrupt(e.to_string()))
}

/// Raw `incidents` row before enum and timestamp decoding.
struct IncidentRow {
    id: String,
    incident_key: i64,
    title: String,
    severity: String,
    status: String,
    created_by: String,
    description: String,
    assignee: String,
    created_at: String,
    updated_at: String,
}

fn map_incident_row(row: &Row<'_>) -> rusqlite::Result<IncidentRow> {
    Ok(IncidentRow {
        id: row.get(0)?,
        incident_key: row.get(1)?,
        title: row.get(2)?,
        severity: row.get(3)?,
        status: row.get(4)?,
        created_by: row.get(5)?,
        description: row.get(6)?,
        assignee: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

type NoteColumns = (String, String, String, String, String);

fn map_note_columns(row: &Row<'_>, offset: usize) -> rusqlite::Result<NoteColumns> {
    Ok((
        row.get(offset)?,
        row.get(offset + 1)?,
        row.get(offset + 2)?,
        row.get(offset + 3)?,
        row.get(offset + 4)?,
    ))
}

fn decode_note(columns: NoteColumns) -> Result<Note, StoreError> {
    let (id, content, author_email, note_type, created_at) = columns;
    Ok(Note {
        id,
        content,
        author_email,
        note_type: decode::<NoteType>(&note_type)?,
        created_at: decode_time(&created_at)?,
    })
}

fn load_notes(conn: &Connection, incident_id: &str) -> Result<Vec<Note>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, content, author_email, note_type, created_at
         FROM incident_notes WHERE incident_id = ?1 ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map([incident_id], |row| map_note_columns(row, 0))?;

    let mut notes = Vec::new();
    for row in rows {
        notes.push(decode_note(row?)?);
    }
    Ok(notes)
}

fn load_watchers(conn: &Connection, incident_id: &str) -> Result<Vec<Watcher>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT email FROM incident_watchers WHERE incident_id = ?1 ORDER BY rowid ASC",
    )?;
    let rows = stmt.query_map([incident_id], |row| row.get::<_, String>(0))?;
    let mut watchers = Vec::new();
    for email in rows {
        watchers.push(Watcher { email: email? });
    }
    Ok(watchers)
}

/// Every note, grouped by incident id, in note order.
fn load_all_notes(conn: &Connection) -> Result<HashMap<String, Vec<Note>>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT incident_id, id, content, author_email, note_type, created_at
         FROM incident_notes ORDER BY incident_id, seq ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, map_note_columns(row, 1)?))
    })?;

    let mut grouped: HashMap<String, Vec<Note>> = HashMap::new();
    for row in rows {
        let (incident_id, columns) = row?;
        grouped
            .entry(incident_id)
            .or_default()
            .push(decode_note(columns)?);
    }
    Ok(grouped)
}

/// Every watcher, grouped by incident id, in insertion order.
fn load_all_watchers(conn: &Connection) -> Result<HashMap<String, Vec<Watcher>>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT incident_id, email FROM incident_watchers ORDER BY incident_id, rowid ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut grouped: HashMap<String, Vec<Watcher>> = HashMap::new();
    for row in rows {
        let (incident_id, email) = row?;
        grouped.entry(incident_id).or_default().push(Watcher { email });
    }
    Ok(grouped)
}

fn hydrate(conn: &Connection, row: IncidentRow) -> Result<Incident, StoreError> {
    let notes = load_notes(conn, &row.id)?;
    let watch_list = load_watchers(conn, &row.id)?;
    assemble(row, notes, watch_list)
}

fn assemble(
    row: IncidentRow,
    notes: Vec<Note>,
    watch_list: Vec<Watcher>,
) -> Result<Incident, StoreError> {
    Ok(Incident {
        severity: decode::<Severity>(&row.severity)?,
        status: decode::<Status>(&row.status)?,
        created_at: decode_time(&row.created_at)?,
        updated_at: decode_time(&row.updated_at)?,
        id: row.id,
        incident_key: row.incident_key,
        title: row.title,
        notes,
        watch_list,
        created_by: row.created_by,
        description: row.description,
        assignee: row.assignee,
    })
}

fn fetch(conn: &Connection, reference: &IncidentRef) -> Result<Option<Incident>, StoreError> {
    let row = match reference {
        IncidentRef::Id(id) => conn
            .query_row(
                &format!("SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = ?1"),
                [id],
                map_incident_row,
            )
            .optional()?,
        IncidentRef::Key(key) => conn
            .query_row(
                &format!("SELECT {INCIDENT_COLUMNS} FROM incidents WHERE incident_key = ?1"),
                [key],
                map_incident_row,
            )
            .optional()?,
    };
    row.map(|r| hydrate(conn, r)).transpose()
}

fn insert_note(conn: &Connection, incident_id: &str, note: &Note) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO incident_notes (id, incident_id, content, author_email, note_type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            note.id,
            incident_id,
            note.content,
            note.author_email,
            note.note_type.as_str(),
            encode_time(note.created_at),
        ],
    )?;
    Ok(())
}

fn insert_watcher(
    conn: &Connection,
    incident_id: &str,
    watcher: &Watcher,
    at: DateTime<Utc>,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO incident_watchers (incident_id, email, added_at)
         VALUES (?1, ?2, ?3)",
        params![incident_id, watcher.email, encode_time(at)],
    )?;
    Ok(())
}

impl SqliteIncidentStore {
    /// Touches `updated_at` (and `column`, if given), then runs `mutate`,
    /// all inside one transaction.
    ///
    /// Returns `None` without calling `mutate` if no incident has `id`.
    fn update_with<F>(
        &self,
        id: &str,
        column: Option<(&'static str, &str)>,
        at: DateTime<Utc>,
        mutate: F,
    ) -> Result<Option<Incident>, StoreError>
    where
        F: FnOnce(&Connection) -> Result<(), StoreError>,
    {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let changed = match column {
            Some((name, value)) => tx.execute(
                &format!("UPDATE incidents SET {name} = ?1, updated_at = ?2 WHERE id = ?3"),
                params![value, encode_time(at), id],
            )?,
            None => tx.execute(
                "UPDATE incidents SET updated_at = ?1 WHERE id = ?2",
                params![encode_time(at), id],
            )?,
        };
        if changed == 0 {
            return Ok(None);
        }

        let scoped: &Connection = &tx;
        mutate(scoped)?;
        let incident = fetch(scoped, &IncidentRef::Id(id.to_string()))?;
        tx.commit()?;
        Ok(incident)
    }
}

impl IncidentStore for SqliteIncidentStore {
    fn allocate_incident_key(&self) -> Result<i64, StoreError> {
        let conn = self.pool.get()?;
        let key = conn.query_row(
            "UPDATE incident_key_counter SET value = value + 1 WHERE id = 1 RETURNING value",
            [],
            |row| row.get(0),
        )?;
        Ok(key)
    }

    fn insert(&self, draft: IncidentDraft) -> Result<Incident, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        tx.execute(
            &format!(
                "INSERT INTO incidents ({INCIDENT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)"
            ),
            params![
                id,
                draft.incident_key,
                draft.title,
                draft.severity.as_str(),
                draft.status.as_str(),
                draft.created_by,
                draft.description,
                draft.assignee,
                encode_time(draft.created_at),
            ],
        )?;
        for note in &draft.notes {
            insert_note(&tx, &id, note)?;
        }
        for watcher in &draft.watch_list {
            insert_watcher(&tx, &id, watcher, draft.created_at)?;
        }

        let incident = fetch(&tx, &IncidentRef::Id(id.clone()))?
            .ok_or_else(|| StoreError::Corrupt(format!("incident {id} vanished after insert")))?;
        tx.commit()?;
        Ok(incident)
    }

    fn find(&self, reference: &IncidentRef) -> Result<Option<Incident>, StoreError> {
        let conn = self.pool.get()?;
        fetch(&conn, reference)
    }

    fn list_newest_first(&self) -> Result<Vec<Incident>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents
             ORDER BY created_at DESC, incident_key DESC"
        ))?;
        let rows = stmt.query_map([], map_incident_row)?;

        let mut raw = Vec::new();
        for row in rows {
            raw.push(row?);
        }

        // Three queries regardless of how many incidents exist.
        let mut notes = load_all_notes(&conn)?;
        let mut watchers = load_all_watchers(&conn)?;
        raw.into_iter()
            .map(|row| {
                let incident_notes = notes.remove(&row.id).unwrap_or_default();
                let incident_watchers = watchers.remove(&row.id).unwrap_or_default();
                assemble(row, incident_notes, incident_watchers)
            })
            .collect()
    }

    fn set_status(
        &self,
        id: &str,
        status: Status,
        at: DateTime<Utc>,
    ) -> Result<Option<Incident>, StoreError> {
        self.update_with(id, Some(("status", status.as_str())), at, |_| Ok(()))
    }

    fn set_severity(
        &self,
        id: &str,
        severity: Severity,
        at: DateTime<Utc>,
    ) -> Result<Option<Incident>, StoreError> {
        self.update_with(id, Some(("severity", severity.as_str())), at, |_| Ok(()))
    }

    fn push_note(
        &self,
        id: &str,
        note: &Note,
        at: DateTime<Utc>,
    ) -> Result<Option<Incident>, StoreError> {
        self.update_with(id, None, at, |conn| insert_note(conn, id, note))
    }

    fn add_watcher(
        &self,
        id: &str,
        watcher: &Watcher,
        at: DateTime<Utc>,
    ) -> Result<Option<Incident>, StoreError> {
        self.update_with(id, None, at, |conn| insert_watcher(conn, id, watcher, at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use incident_db::{open_migrated_pool, DbRuntimeSettings};

    fn store() -> SqliteIncidentStore {
        let settings = DbRuntimeSettings {
            pool_max_size: 1,
            ..DbRuntimeSettings::default()
        };
        SqliteIncidentStore::new(open_migrated_pool(":memory:", settings).expect("pool"))
    }

    fn draft(store: &SqliteIncidentStore, title: &str, at: DateTime<Utc>) -> IncidentDraft {
        IncidentDraft {
            incident_key: store.allocate_incident_key().expect("key"),
            title: title.to_string(),
            severity: Severity::High,
            status: Status::Open,
            created_at: at,
            notes: Vec::new(),
            watch_list: Vec::new(),
            created_by: String::new(),
            description: "desc".to_string(),
            assignee: "oncall".to_string(),
        }
    }

    fn note(id: &str, content: &str) -> Note {
        Note {
            id: id.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
            author_email: "a@b.com".to_string(),
            note_type: NoteType::Investigation,
        }
    }

    #[test]
    fn keys_start_at_one_and_increase() {
        let store = store();
        assert_eq!(store.allocate_incident_key().unwrap(), 1);
        assert_eq!(store.allocate_incident_key().unwrap(), 2);
        assert_eq!(store.allocate_incident_key().unwrap(), 3);
    }

    #[test]
    fn insert_round_trips_through_both_lookup_paths() {
        let store = store();
        let now = Utc::now();
        let mut d = draft(&store, "Disk full on db-1", now);
        d.notes.push(note("n-1", "first look"));
        d.watch_list.push(Watcher {
            email: "a@b.com".to_string(),
        });

        let created = store.insert(d).expect("insert");
        assert!(!created.id.is_empty());
        assert_eq!(created.incident_key, 1);
        assert_eq!(created.created_at, now);
        assert_eq!(created.updated_at, now);
        assert_eq!(created.notes.len(), 1);
        assert_eq!(created.watch_list.len(), 1);

        let by_id = store.find(&IncidentRef::Id(created.id.clone())).unwrap();
        let by_key = store.find(&IncidentRef::Key(1)).unwrap();
        assert_eq!(by_id.as_ref(), Some(&created));
        assert_eq!(by_key.as_ref(), Some(&created));
        assert!(store.find(&IncidentRef::Key(2)).unwrap().is_none());
        assert!(store.find(&IncidentRef::Id("nope".into())).unwrap().is_none());
    }

    #[test]
    fn duplicate_incident_key_is_rejected() {
        let store = store();
        let now = Utc::now();
        let first = draft(&store, "one", now);
        let mut second = draft(&store, "two", now);
        second.incident_key = first.incident_key;

        store.insert(first).expect("first insert");
        assert!(matches!(store.insert(second), Err(StoreError::Database(_))));
    }

    #[test]
    fn list_is_newest_first() {
        let store = store();
        let base = Utc::now();
        store.insert(draft(&store, "oldest", base)).unwrap();
        store
            .insert(draft(&store, "newest", base + chrono::Duration::seconds(2)))
            .unwrap();
        store
            .insert(draft(&store, "middle", base + chrono::Duration::seconds(1)))
            .unwrap();

        let titles: Vec<String> = store
            .list_newest_first()
            .unwrap()
            .into_iter()
            .map(|i| i.title)
            .collect();
        assert_eq!(titles, ["newest", "middle", "oldest"]);
    }

    #[test]
    fn list_attaches_each_incidents_own_notes_and_watchers() {
        let store = store();
        let base = Utc::now();
        let quiet = store.insert(draft(&store, "quiet", base)).unwrap();
        let busy = store
            .insert(draft(&store, "busy", base + chrono::Duration::seconds(1)))
            .unwrap();

        store.push_note(&busy.id, &note("n1", "first"), base).unwrap();
        store.push_note(&busy.id, &note("n2", "second"), base).unwrap();
        for email in ["z@b.com", "a@b.com"] {
            let w = Watcher {
                email: email.into(),
            };
            store.add_watcher(&busy.id, &w, base).unwrap();
        }

        let listed = store.list_newest_first().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0], store.find(&IncidentRef::Id(busy.id.clone())).unwrap().unwrap());
        assert_eq!(listed[1], store.find(&IncidentRef::Id(quiet.id.clone())).unwrap().unwrap());

        let contents: Vec<&str> = listed[0].notes.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(contents, ["first", "second"]);
        let emails: Vec<&str> = listed[0].watch_list.iter().map(|w| w.email.as_str()).collect();
        assert_eq!(emails, ["z@b.com", "a@b.com"]);
        assert!(listed[1].notes.is_empty());
        assert!(listed[1].watch_list.is_empty());
    }

    #[test]
    fn conditional_updates_return_post_update_document() {
        let store = store();
        let created = store.insert(draft(&store, "Latency spike", Utc::now())).unwrap();
        let later = created.created_at + chrono::Duration::seconds(5);

        let updated = store
            .set_status(&created.id, Status::Resolved, later)
            .unwrap()
            .expect("incident exists");
        assert_eq!(updated.status, Status::Resolved);
        assert_eq!(updated.updated_at, later);
        assert_eq!(updated.created_at, created.created_at);

        let updated = store
            .set_severity(&created.id, Severity::Low, later)
            .unwrap()
            .expect("incident exists");
        assert_eq!(updated.severity, Severity::Low);
        assert_eq!(updated.status, Status::Resolved);
    }

    #[test]
    fn updates_on_missing_incident_return_none() {
        let store = store();
        let now = Utc::now();
        assert!(store.set_status("missing", Status::Closed, now).unwrap().is_none());
        assert!(store.set_severity("missing", Severity::Low, now).unwrap().is_none());
        assert!(store.push_note("missing", &note("n", "x"), now).unwrap().is_none());
        let w = Watcher {
            email: "a@b.com".into(),
        };
        assert!(store.add_watcher("missing", &w, now).unwrap().is_none());

        let orphan_notes: i64 = store
            .pool
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM incident_notes", [], |r| r.get(0))
            .unwrap();
        assert_eq!(orphan_notes, 0);
    }

    #[test]
    fn notes_append_in_order() {
        let store = store();
        let created = store.insert(draft(&store, "Cert expiry", Utc::now())).unwrap();
        let now = Utc::now();
        store.push_note(&created.id, &note("n-1", "one"), now).unwrap();
        let after = store
            .push_note(&created.id, &note("n-2", "two"), now)
            .unwrap()
            .unwrap();
        let ids: Vec<&str> = after.notes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["n-1", "n-2"]);
        assert_eq!(after.notes[1].note_type, NoteType::Investigation);
    }

    #[test]
    fn watchers_have_set_semantics() {
        let store = store();
        let created = store.insert(draft(&store, "Packet loss", Utc::now())).unwrap();
        let now = Utc::now();
        let w = Watcher {
            email: "a@b.com".into(),
        };
        store.add_watcher(&created.id, &w, now).unwrap();
        let after = store.add_watcher(&created.id, &w, now).unwrap().unwrap();
        assert_eq!(after.watch_list, vec![w]);
    }

    #[test]
    fn file_backed_store_is_shared_across_connections() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("incidents.db");
        let pool = open_migrated_pool(path.to_str().unwrap(), DbRuntimeSettings::default())
            .expect("pool");
        let writer = SqliteIncidentStore::new(pool.clone());
        let reader = SqliteIncidentStore::new(pool);

        let created = writer.insert(draft(&writer, "Shared", Utc::now())).unwrap();
        let seen = reader.find(&IncidentRef::Key(created.incident_key)).unwrap();
        assert_eq!(seen.map(|i| i.id), Some(created.id));
    }
}
