//! SQLite persistence for enrolled face vectors and attendance records.
//!
//! Persons, subjects and sessions are written by the course management
//! application sharing this schema; the daemon only reads them. Attendance
//! rows are unique per (person, session) and are only ever inserted through
//! [`Store::upsert_attendance`].

use chrono::NaiveDateTime;
use rollcall_core::{
    AttendanceRecord, AttendanceStatus, Candidate, EnrolledVector, FeatureVector, Person, PersonId,
    Session, SessionId, SubjectId,
};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tokio_rusqlite::Connection;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    #[error("vector encoding: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("write deadline passed before it started")]
    Expired,
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS persons (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subjects (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    id            INTEGER PRIMARY KEY,
    subject_id    INTEGER NOT NULL REFERENCES subjects(id) ON DELETE CASCADE,
    title         TEXT NOT NULL,
    date          TEXT NOT NULL,
    checkin_start TEXT NOT NULL,
    checkin_end   TEXT NOT NULL,
    class_start   TEXT NOT NULL,
    class_end     TEXT NOT NULL,
    CHECK (checkin_start < checkin_end),
    CHECK (class_start < class_end)
);

CREATE TABLE IF NOT EXISTS face_vectors (
    id         TEXT PRIMARY KEY,
    person_id  INTEGER NOT NULL REFERENCES persons(id) ON DELETE CASCADE,
    vector     TEXT NOT NULL,
    image_ref  TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS attendance (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id   INTEGER NOT NULL REFERENCES persons(id) ON DELETE CASCADE,
    session_id  INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    status      TEXT NOT NULL CHECK (status IN ('present', 'late', 'absent')),
    recorded_at TEXT NOT NULL,
    image_ref   TEXT,
    UNIQUE (person_id, session_id)
);

CREATE INDEX IF NOT EXISTS idx_sessions_subject ON sessions(subject_id, date);
CREATE INDEX IF NOT EXISTS idx_face_vectors_person ON face_vectors(person_id);
CREATE INDEX IF NOT EXISTS idx_attendance_session ON attendance(session_id);
"#;

const SESSION_COLUMNS: &str =
    "s.id, s.subject_id, s.title, s.date, s.checkin_start, s.checkin_end, s.class_start, s.class_end";

const RECORD_COLUMNS: &str =
    "a.id, a.person_id, a.session_id, a.status, a.recorded_at, a.image_ref";

/// A record about to be written.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub person_id: PersonId,
    pub session_id: SessionId,
    pub status: AttendanceStatus,
    pub recorded_at: NaiveDateTime,
    pub image_ref: Option<String>,
}

/// Outcome of [`Store::upsert_attendance`]: the row now stored for the pair,
/// and whether this call created it.
#[derive(Debug, Clone)]
pub struct Upserted {
    pub record: AttendanceRecord,
    pub inserted: bool,
}

/// An attendance record with the session it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordView {
    pub session: Session,
    pub record: AttendanceRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub present: u32,
    pub late: u32,
    pub absent: u32,
}

/// Row shape before the status text is parsed.
struct RecordRow {
    id: i64,
    person_id: PersonId,
    session_id: SessionId,
    status: String,
    recorded_at: NaiveDateTime,
    image_ref: Option<String>,
}

impl RecordRow {
    fn read(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            person_id: row.get(offset + 1)?,
            session_id: row.get(offset + 2)?,
            status: row.get(offset + 3)?,
            recorded_at: row.get(offset + 4)?,
            image_ref: row.get(offset + 5)?,
        })
    }

    fn into_record(self) -> Result<AttendanceRecord, StoreError> {
        let status = self.status.parse().map_err(StoreError::Corrupt)?;
        Ok(AttendanceRecord {
            id: self.id,
            person_id: self.person_id,
            session_id: self.session_id,
            status,
            recorded_at: self.recorded_at,
            image_ref: self.image_ref,
        })
    }
}

struct VectorRow {
    id: String,
    person_id: PersonId,
    vector: String,
    image_ref: Option<String>,
    created_at: NaiveDateTime,
}

impl VectorRow {
    fn into_enrolled(self) -> Result<EnrolledVector, StoreError> {
        Ok(EnrolledVector {
            vector: serde_json::from_str(&self.vector)?,
            id: self.id,
            person_id: self.person_id,
            image_ref: self.image_ref,
            created_at: self.created_at,
        })
    }
}

fn read_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        title: row.get(2)?,
        date: row.get(3)?,
        checkin_start: row.get(4)?,
        checkin_end: row.get(5)?,
        class_start: row.get(6)?,
        class_end: row.get(7)?,
    })
}

/// Handle to the attendance database. Cheap to clone; all clones share one
/// connection thread, so every call runs to completion before the next.
#[derive(Clone)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create the database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).await?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| {
            conn.pragma_update(None, "foreign_keys", true)?;
            conn.busy_timeout(std::time::Duration::from_secs(2))?;
            conn.execute_batch(SCHEMA_SQL)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    /// Run a write on the connection thread unless `deadline` has passed by
    /// the time it gets there. A refused write touches nothing, so a caller
    /// that gave up at the deadline never leaves a committed row behind.
    async fn write<T, F>(&self, deadline: Instant, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let done = self
            .conn
            .call(move |conn| {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
                Ok(Some(f(conn)?))
            })
            .await?;
        done.ok_or(StoreError::Expired)
    }

    pub async fn get_person(&self, id: PersonId) -> Result<Option<Person>, StoreError> {
        let person = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row("SELECT id, name FROM persons WHERE id = ?1", [id], |row| {
                        Ok(Person {
                            id: row.get(0)?,
                            name: row.get(1)?,
                        })
                    })
                    .optional()?)
            })
            .await?;
        Ok(person)
    }

    pub async fn subject_exists(&self, id: SubjectId) -> Result<bool, StoreError> {
        let exists = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row("SELECT 1 FROM subjects WHERE id = ?1", [id], |_| Ok(()))
                    .optional()?
                    .is_some())
            })
            .await?;
        Ok(exists)
    }

    pub async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions s WHERE s.id = ?1");
        let session = self
            .conn
            .call(move |conn| Ok(conn.query_row(&sql, [id], read_session).optional()?))
            .await?;
        Ok(session)
    }

    /// Sessions of `subject_id` with no attendance row for `person_id`,
    /// oldest first.
    pub async fn sessions_without_record(
        &self,
        person_id: PersonId,
        subject_id: SubjectId,
    ) -> Result<Vec<Session>, StoreError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions s
             LEFT JOIN attendance a ON a.session_id = s.id AND a.person_id = ?1
             WHERE s.subject_id = ?2 AND a.id IS NULL
             ORDER BY s.date, s.checkin_start, s.id"
        );
        let sessions = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![person_id, subject_id], read_session)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        Ok(sessions)
    }

    pub async fn add_vector(
        &self,
        person_id: PersonId,
        vector: &FeatureVector,
        image_ref: Option<String>,
        created_at: NaiveDateTime,
        deadline: Instant,
    ) -> Result<EnrolledVector, StoreError> {
        let enrolled = EnrolledVector {
            id: uuid::Uuid::new_v4().to_string(),
            person_id,
            vector: vector.clone(),
            image_ref,
            created_at,
        };
        let encoded = serde_json::to_string(vector)?;
        let row = enrolled.clone();
        self.write(deadline, move |conn| {
            conn.execute(
                "INSERT INTO face_vectors (id, person_id, vector, image_ref, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![row.id, row.person_id, encoded, row.image_ref, row.created_at],
            )
        })
        .await?;
        Ok(enrolled)
    }

    /// Enrolled vectors for one person, in enrollment order.
    pub async fn vectors_for(&self, person_id: PersonId) -> Result<Vec<EnrolledVector>, StoreError> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, person_id, vector, image_ref, created_at FROM face_vectors
                     WHERE person_id = ?1 ORDER BY created_at, id",
                )?;
                let rows = stmt
                    .query_map([person_id], |row| {
                        Ok(VectorRow {
                            id: row.get(0)?,
                            person_id: row.get(1)?,
                            vector: row.get(2)?,
                            image_ref: row.get(3)?,
                            created_at: row.get(4)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        rows.into_iter().map(VectorRow::into_enrolled).collect()
    }

    /// Every enrolled vector with its owner, for open-set identification.
    pub async fn all_candidates(&self) -> Result<Vec<Candidate>, StoreError> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT p.id, p.name, v.vector FROM face_vectors v
                     JOIN persons p ON p.id = v.person_id
                     ORDER BY p.id, v.created_at, v.id",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((
                            Person {
                                id: row.get(0)?,
                                name: row.get(1)?,
                            },
                            row.get::<_, String>(2)?,
                        ))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        rows.into_iter()
            .map(|(person, vector)| {
                Ok(Candidate {
                    person,
                    vector: serde_json::from_str(&vector)?,
                })
            })
            .collect()
    }

    pub async fn remove_vector(
        &self,
        person_id: PersonId,
        vector_id: &str,
        deadline: Instant,
    ) -> Result<bool, StoreError> {
        let vector_id = vector_id.to_string();
        let removed = self
            .write(deadline, move |conn| {
                conn.execute(
                    "DELETE FROM face_vectors WHERE id = ?1 AND person_id = ?2",
                    params![vector_id, person_id],
                )
            })
            .await?;
        Ok(removed > 0)
    }

    pub async fn remove_all_vectors(
        &self,
        person_id: PersonId,
        deadline: Instant,
    ) -> Result<usize, StoreError> {
        self.write(deadline, move |conn| {
            conn.execute("DELETE FROM face_vectors WHERE person_id = ?1", [person_id])
        })
        .await
    }

    /// Insert the record unless the pair already has one, then return
    /// whatever is stored. An existing row is never overwritten.
    pub async fn upsert_attendance(
        &self,
        new: NewRecord,
        deadline: Instant,
    ) -> Result<Upserted, StoreError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance a WHERE a.person_id = ?1 AND a.session_id = ?2"
        );
        let (row, inserted) = self
            .write(deadline, move |conn| {
                let tx = conn.transaction()?;
                let inserted = tx.execute(
                    "INSERT INTO attendance (person_id, session_id, status, recorded_at, image_ref)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT (person_id, session_id) DO NOTHING",
                    params![
                        new.person_id,
                        new.session_id,
                        new.status.as_str(),
                        new.recorded_at,
                        new.image_ref
                    ],
                )? > 0;
                let row = tx.query_row(&sql, params![new.person_id, new.session_id], |row| {
                    RecordRow::read(row, 0)
                })?;
                tx.commit()?;
                Ok((row, inserted))
            })
            .await?;
        Ok(Upserted {
            record: row.into_record()?,
            inserted,
        })
    }

    /// Records of one person for one subject, ordered by session time.
    pub async fn records_for(
        &self,
        person_id: PersonId,
        subject_id: SubjectId,
    ) -> Result<Vec<RecordView>, StoreError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS}, {RECORD_COLUMNS} FROM attendance a
             JOIN sessions s ON s.id = a.session_id
             WHERE a.person_id = ?1 AND s.subject_id = ?2
             ORDER BY s.date, s.checkin_start, s.id"
        );
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![person_id, subject_id], |row| {
                        Ok((read_session(row)?, RecordRow::read(row, 8)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        rows.into_iter()
            .map(|(session, record)| {
                Ok(RecordView {
                    session,
                    record: record.into_record()?,
                })
            })
            .collect()
    }

    pub async fn summary(&self, person_id: PersonId, subject_id: SubjectId) -> Result<Summary, StoreError> {
        let counts = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT a.status, COUNT(*) FROM attendance a
                     JOIN sessions s ON s.id = a.session_id
                     WHERE a.person_id = ?1 AND s.subject_id = ?2
                     GROUP BY a.status",
                )?;
                let rows = stmt
                    .query_map(params![person_id, subject_id], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;

        let mut summary = Summary::default();
        for (status, count) in counts {
            match status.parse().map_err(StoreError::Corrupt)? {
                AttendanceStatus::Present => summary.present = count,
                AttendanceStatus::Late => summary.late = count,
                AttendanceStatus::Absent => summary.absent = count,
            }
        }
        Ok(summary)
    }
}

/// Writers for the tables owned by the management application.
#[cfg(test)]
impl Store {
    pub(crate) async fn insert_person(&self, id: PersonId, name: &str) -> Result<(), StoreError> {
        let name = name.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("INSERT INTO persons (id, name) VALUES (?1, ?2)", params![id, name])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub(crate) async fn insert_subject(&self, id: SubjectId, name: &str) -> Result<(), StoreError> {
        let name = name.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("INSERT INTO subjects (id, name) VALUES (?1, ?2)", params![id, name])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub(crate) async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        let s = session.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sessions
                     (id, subject_id, title, date, checkin_start, checkin_end, class_start, class_end)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        s.id,
                        s.subject_id,
                        s.title,
                        s.date,
                        s.checkin_start,
                        s.checkin_end,
                        s.class_start,
                        s.class_end
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub(crate) async fn count_records(&self, person_id: PersonId) -> Result<i64, StoreError> {
        let count = self
            .conn
            .call(move |conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM attendance WHERE person_id = ?1",
                    [person_id],
                    |row| row.get(0),
                )?)
            })
            .await?;
        Ok(count)
    }

    /// Occupy the connection thread for `duration`.
    pub(crate) async fn stall(&self, duration: std::time::Duration) -> Result<(), StoreError> {
        self.conn
            .call(move |_| {
                std::thread::sleep(duration);
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use std::time::Duration;

    fn soon() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap().and_time(t(h, m))
    }

    fn session(id: SessionId, day: u32) -> Session {
        Session {
            id,
            subject_id: 10,
            title: format!("Week {id}"),
            date: NaiveDate::from_ymd_opt(2026, 10, day).unwrap(),
            checkin_start: t(9, 0),
            checkin_end: t(9, 30),
            class_start: t(9, 0),
            class_end: t(10, 30),
        }
    }

    async fn seeded() -> Store {
        let store = Store::open_in_memory().await.unwrap();
        store.insert_person(1, "Alice").await.unwrap();
        store.insert_subject(10, "Databases").await.unwrap();
        store.insert_session(&session(100, 13)).await.unwrap();
        store.insert_session(&session(101, 14)).await.unwrap();
        store
    }

    fn new_record(session_id: SessionId, status: AttendanceStatus) -> NewRecord {
        NewRecord {
            person_id: 1,
            session_id,
            status,
            recorded_at: at(13, 9, 5),
            image_ref: None,
        }
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let store = seeded().await;
        assert_eq!(store.get_session(100).await.unwrap(), Some(session(100, 13)));
        assert_eq!(store.get_session(999).await.unwrap(), None);
        assert_eq!(
            store.get_person(1).await.unwrap(),
            Some(Person { id: 1, name: "Alice".into() })
        );
        assert!(store.subject_exists(10).await.unwrap());
        assert!(!store.subject_exists(11).await.unwrap());
    }

    #[tokio::test]
    async fn test_session_check_constraint() {
        let store = seeded().await;
        let mut bad = session(102, 15);
        bad.checkin_end = t(8, 0);
        assert!(store.insert_session(&bad).await.is_err());
    }

    #[tokio::test]
    async fn test_upsert_keeps_first_record() {
        let store = seeded().await;
        let first = store
            .upsert_attendance(new_record(100, AttendanceStatus::Present), soon())
            .await
            .unwrap();
        assert!(first.inserted);
        assert_eq!(first.record.status, AttendanceStatus::Present);

        let second = store
            .upsert_attendance(new_record(100, AttendanceStatus::Absent), soon())
            .await
            .unwrap();
        assert!(!second.inserted);
        assert_eq!(second.record, first.record);
        assert_eq!(store.count_records(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sessions_without_record() {
        let store = seeded().await;
        store
            .upsert_attendance(new_record(100, AttendanceStatus::Late), soon())
            .await
            .unwrap();
        let pending = store.sessions_without_record(1, 10).await.unwrap();
        assert_eq!(pending.iter().map(|s| s.id).collect::<Vec<_>>(), vec![101]);
    }

    #[tokio::test]
    async fn test_vectors_round_trip_and_removal() {
        let store = seeded().await;
        let v = FeatureVector::new(vec![0.1, 0.2, 0.3]).unwrap();
        let a = store.add_vector(1, &v, Some("a.jpg".into()), at(1, 8, 0), soon()).await.unwrap();
        let b = store.add_vector(1, &v, None, at(2, 8, 0), soon()).await.unwrap();

        let listed = store.vectors_for(1).await.unwrap();
        assert_eq!(listed, vec![a.clone(), b.clone()]);

        let candidates = store.all_candidates().await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].person.name, "Alice");
        assert_eq!(candidates[0].vector, v);

        assert!(store.remove_vector(1, &a.id, soon()).await.unwrap());
        assert!(!store.remove_vector(1, &a.id, soon()).await.unwrap());
        assert!(!store.remove_vector(2, &b.id, soon()).await.unwrap());
        assert_eq!(store.remove_all_vectors(1, soon()).await.unwrap(), 1);
        assert!(store.vectors_for(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_records_and_summary() {
        let store = seeded().await;
        store
            .upsert_attendance(new_record(101, AttendanceStatus::Late), soon())
            .await
            .unwrap();
        store
            .upsert_attendance(new_record(100, AttendanceStatus::Absent), soon())
            .await
            .unwrap();

        let views = store.records_for(1, 10).await.unwrap();
        assert_eq!(views.iter().map(|v| v.session.id).collect::<Vec<_>>(), vec![100, 101]);
        assert_eq!(views[0].record.status, AttendanceStatus::Absent);
        assert_eq!(views[1].record.status, AttendanceStatus::Late);

        assert_eq!(
            store.summary(1, 10).await.unwrap(),
            Summary { present: 0, late: 1, absent: 1 }
        );
    }

    #[tokio::test]
    async fn test_write_past_deadline_is_refused() {
        let store = seeded().await;
        let result = store
            .upsert_attendance(new_record(100, AttendanceStatus::Present), Instant::now())
            .await;
        assert!(matches!(result, Err(StoreError::Expired)));
        assert_eq!(store.count_records(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_write_queued_behind_stall_does_not_commit_late() {
        let store = seeded().await;
        let staller = store.clone();
        let stall = tokio::spawn(async move { staller.stall(Duration::from_millis(300)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let deadline = Instant::now() + Duration::from_millis(50);
        let result = store
            .upsert_attendance(new_record(100, AttendanceStatus::Present), deadline)
            .await;
        assert!(matches!(result, Err(StoreError::Expired)));

        stall.await.unwrap().unwrap();
        assert_eq!(store.count_records(1).await.unwrap(), 0);
        assert_eq!(store.sessions_without_record(1, 10).await.unwrap().len(), 2);
    }
}
