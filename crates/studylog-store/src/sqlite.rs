//! SQLite-based store implementation

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use studylog_api::{Goal, GoalType, Profile, StudySession, Subject};
use studylog_util::{GoalId, SessionId, SubjectId, UserId};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{Store, StoreError, StoreResult};

const SESSION_COLUMNS: &str =
    "id, user_id, subject_id, started_at, ended_at, duration_minutes, notes";

const GOAL_COLUMNS: &str = "id, user_id, goal_type, target_minutes, subject_id, is_active";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            -- Subject catalog; presets have no owner
            CREATE TABLE IF NOT EXISTS subjects (
                id TEXT PRIMARY KEY,
                user_id TEXT,
                name TEXT NOT NULL,
                color TEXT NOT NULL,
                is_preset INTEGER NOT NULL DEFAULT 0
            );

            -- Study sessions; ended_at IS NULL while the timer runs
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                subject_id TEXT,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                duration_minutes INTEGER,
                notes TEXT
            );

            CREATE TABLE IF NOT EXISTS goals (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                goal_type TEXT NOT NULL,
                target_minutes INTEGER NOT NULL,
                subject_id TEXT,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                grade TEXT,
                target_school TEXT
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_sessions_user_started ON sessions(user_id, started_at);
            CREATE INDEX IF NOT EXISTS idx_goals_user ON goals(user_id);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

/// Raw session row, converted to a typed record after the query completes
struct SessionRow {
    id: String,
    user_id: String,
    subject_id: Option<String>,
    started_at: String,
    ended_at: Option<String>,
    duration_minutes: Option<i64>,
    notes: Option<String>,
}

impl SessionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            subject_id: row.get(2)?,
            started_at: row.get(3)?,
            ended_at: row.get(4)?,
            duration_minutes: row.get(5)?,
            notes: row.get(6)?,
        })
    }

    fn into_session(self) -> StoreResult<StudySession> {
        let duration_minutes = self
            .duration_minutes
            .map(|m| {
                u32::try_from(m).map_err(|_| {
                    StoreError::Serialization(format!("invalid duration_minutes {}", m))
                })
            })
            .transpose()?;

        Ok(StudySession {
            id: parse_session_id(&self.id)?,
            user_id: UserId::new(self.user_id),
            subject_id: self.subject_id.map(SubjectId::new),
            started_at: parse_timestamp(&self.started_at)?,
            ended_at: self.ended_at.as_deref().map(parse_timestamp).transpose()?,
            duration_minutes,
            notes: self.notes,
        })
    }
}

struct GoalRow {
    id: String,
    user_id: String,
    goal_type: String,
    target_minutes: i64,
    subject_id: Option<String>,
    is_active: bool,
}

impl GoalRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            goal_type: row.get(2)?,
            target_minutes: row.get(3)?,
            subject_id: row.get(4)?,
            is_active: row.get(5)?,
        })
    }

    fn into_goal(self) -> StoreResult<Goal> {
        let goal_type: GoalType = self
            .goal_type
            .parse()
            .map_err(|e: studylog_api::ParseGoalTypeError| StoreError::Serialization(e.to_string()))?;
        let target_minutes = u32::try_from(self.target_minutes).map_err(|_| {
            StoreError::Serialization(format!("invalid target_minutes {}", self.target_minutes))
        })?;
        let id = self
            .id
            .parse::<GoalId>()
            .map_err(|e| StoreError::Serialization(format!("goal id '{}': {}", self.id, e)))?;

        Ok(Goal {
            id,
            user_id: UserId::new(self.user_id),
            goal_type,
            target_minutes,
            subject_id: self.subject_id.map(SubjectId::new),
            is_active: self.is_active,
        })
    }
}

fn parse_session_id(s: &str) -> StoreResult<SessionId> {
    s.parse()
        .map_err(|e| StoreError::Serialization(format!("session id '{}': {}", s, e)))
}

fn parse_timestamp(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("timestamp '{}': {}", s, e)))
}

impl Store for SqliteStore {
    fn list_subjects(&self, user_id: &UserId) -> StoreResult<Vec<Subject>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, name, color, is_preset FROM subjects
             WHERE is_preset = 1 OR user_id = ?
             ORDER BY name, id",
        )?;

        let subjects = stmt
            .query_map([user_id.as_str()], |row| {
                Ok(Subject {
                    id: SubjectId::new(row.get::<_, String>(0)?),
                    name: row.get(1)?,
                    color: row.get(2)?,
                    is_preset: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(subjects)
    }

    fn upsert_subject(&self, user_id: &UserId, subject: &Subject) -> StoreResult<()> {
        let conn = self.lock()?;
        let owner = (!subject.is_preset).then(|| user_id.as_str());

        // A row keeps its owner: the update only applies when owner and
        // preset flag match the existing row
        let changed = conn.execute(
            r#"
            INSERT INTO subjects (id, user_id, name, color, is_preset)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id)
            DO UPDATE SET name = excluded.name, color = excluded.color
            WHERE subjects.is_preset = excluded.is_preset
              AND subjects.user_id IS excluded.user_id
            "#,
            params![
                subject.id.as_str(),
                owner,
                subject.name,
                subject.color,
                subject.is_preset
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::Conflict(format!("subject {}", subject.id)));
        }

        debug!(subject_id = %subject.id, preset = subject.is_preset, "Subject saved");
        Ok(())
    }

    fn list_sessions(
        &self,
        user_id: &UserId,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<StudySession>> {
        let rows = {
            let conn = self.lock()?;
            let sql = format!(
                "SELECT {} FROM sessions WHERE user_id = ?1 AND (?2 IS NULL OR started_at >= ?2)
                 ORDER BY started_at DESC, id",
                SESSION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let since = since.map(|t| t.to_rfc3339());
            stmt.query_map(params![user_id.as_str(), since], SessionRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };

        rows.into_iter().map(SessionRow::into_session).collect()
    }

    fn get_session(&self, id: &SessionId) -> StoreResult<Option<StudySession>> {
        let row = {
            let conn = self.lock()?;
            let sql = format!("SELECT {} FROM sessions WHERE id = ?", SESSION_COLUMNS);
            conn.query_row(&sql, [id.to_string()], SessionRow::from_row)
                .optional()?
        };

        row.map(SessionRow::into_session).transpose()
    }

    fn insert_session(&self, session: &StudySession) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO sessions (id, user_id, subject_id, started_at, ended_at, duration_minutes, notes)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                session.id.to_string(),
                session.user_id.as_str(),
                session.subject_id.as_ref().map(|s| s.as_str()),
                session.started_at.to_rfc3339(),
                session.ended_at.map(|t| t.to_rfc3339()),
                session.duration_minutes,
                session.notes,
            ],
        )?;

        debug!(session_id = %session.id, open = !session.is_closed(), "Session inserted");
        Ok(())
    }

    fn close_session(
        &self,
        id: &SessionId,
        ended_at: DateTime<Utc>,
        duration_minutes: u32,
        notes: Option<&str>,
    ) -> StoreResult<()> {
        let conn = self.lock()?;

        let changed = conn.execute(
            "UPDATE sessions SET ended_at = ?, duration_minutes = ?, notes = COALESCE(?, notes)
             WHERE id = ? AND ended_at IS NULL",
            params![ended_at.to_rfc3339(), duration_minutes, notes, id.to_string()],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(format!("open session {}", id)));
        }

        debug!(session_id = %id, duration_minutes, "Session closed");
        Ok(())
    }

    fn update_session(&self, session: &StudySession) -> StoreResult<()> {
        let conn = self.lock()?;

        let changed = conn.execute(
            "UPDATE sessions SET subject_id = ?, started_at = ?, ended_at = ?,
                                 duration_minutes = ?, notes = ?
             WHERE id = ? AND user_id = ?",
            params![
                session.subject_id.as_ref().map(|s| s.as_str()),
                session.started_at.to_rfc3339(),
                session.ended_at.map(|t| t.to_rfc3339()),
                session.duration_minutes,
                session.notes,
                session.id.to_string(),
                session.user_id.as_str(),
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(format!("session {}", session.id)));
        }
        Ok(())
    }

    fn delete_session(&self, id: &SessionId) -> StoreResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM sessions WHERE id = ?", [id.to_string()])?;
        Ok(changed > 0)
    }

    fn list_goals(&self, user_id: &UserId) -> StoreResult<Vec<Goal>> {
        let rows = {
            let conn = self.lock()?;
            let sql = format!(
                "SELECT {} FROM goals WHERE user_id = ? ORDER BY rowid",
                GOAL_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_map([user_id.as_str()], GoalRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };

        rows.into_iter().map(GoalRow::into_goal).collect()
    }

    fn list_active_goals(&self, user_id: &UserId) -> StoreResult<Vec<Goal>> {
        Ok(self
            .list_goals(user_id)?
            .into_iter()
            .filter(|g| g.is_active)
            .collect())
    }

    fn get_goal(&self, id: &GoalId) -> StoreResult<Option<Goal>> {
        let row = {
            let conn = self.lock()?;
            let sql = format!("SELECT {} FROM goals WHERE id = ?", GOAL_COLUMNS);
            conn.query_row(&sql, [id.to_string()], GoalRow::from_row)
                .optional()?
        };

        row.map(GoalRow::into_goal).transpose()
    }

    fn insert_goal(&self, goal: &Goal) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO goals (id, user_id, goal_type, target_minutes, subject_id, is_active)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                goal.id.to_string(),
                goal.user_id.as_str(),
                goal.goal_type.as_str(),
                goal.target_minutes,
                goal.subject_id.as_ref().map(|s| s.as_str()),
                goal.is_active,
            ],
        )?;

        debug!(goal_id = %goal.id, goal_type = %goal.goal_type, "Goal inserted");
        Ok(())
    }

    fn update_goal(&self, goal: &Goal) -> StoreResult<()> {
        let conn = self.lock()?;

        let changed = conn.execute(
            "UPDATE goals SET goal_type = ?, target_minutes = ?, subject_id = ?, is_active = ?
             WHERE id = ? AND user_id = ?",
            params![
                goal.goal_type.as_str(),
                goal.target_minutes,
                goal.subject_id.as_ref().map(|s| s.as_str()),
                goal.is_active,
                goal.id.to_string(),
                goal.user_id.as_str(),
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(format!("goal {}", goal.id)));
        }
        Ok(())
    }

    fn delete_goal(&self, id: &GoalId) -> StoreResult<bool> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM goals WHERE id = ?", [id.to_string()])?;
        Ok(changed > 0)
    }

    fn get_profile(&self, user_id: &UserId) -> StoreResult<Option<Profile>> {
        let conn = self.lock()?;

        let profile = conn
            .query_row(
                "SELECT grade, target_school FROM profiles WHERE user_id = ?",
                [user_id.as_str()],
                |row| {
                    Ok(Profile {
                        grade: row.get(0)?,
                        target_school: row.get(1)?,
                    })
                },
            )
            .optional()?;

        Ok(profile)
    }

    fn save_profile(&self, user_id: &UserId, profile: &Profile) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO profiles (user_id, grade, target_school)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id)
            DO UPDATE SET grade = excluded.grade, target_school = excluded.target_school
            "#,
            params![user_id.as_str(), profile.grade, profile.target_school],
        )?;

        debug!(user_id = %user_id, "Profile saved");
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, m, 0).unwrap()
    }

    fn user() -> UserId {
        UserId::new("u1")
    }

    #[test]
    fn test_in_memory_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.is_healthy());
    }

    #[test]
    fn test_session_lifecycle() {
        let store = SqliteStore::in_memory().unwrap();
        let session = StudySession::open(user(), Some("math".into()), at(9, 0));
        store.insert_session(&session).unwrap();

        let loaded = store.get_session(&session.id).unwrap().unwrap();
        assert!(!loaded.is_closed());
        assert_eq!(loaded.subject_id, Some(SubjectId::new("math")));

        store
            .close_session(&session.id, at(9, 30), 30, Some("chapter 3"))
            .unwrap();
        let closed = store.get_session(&session.id).unwrap().unwrap();
        assert_eq!(closed.ended_at, Some(at(9, 30)));
        assert_eq!(closed.duration_minutes, Some(30));
        assert_eq!(closed.notes.as_deref(), Some("chapter 3"));

        assert!(store.delete_session(&session.id).unwrap());
        assert!(!store.delete_session(&session.id).unwrap());
        assert!(store.get_session(&session.id).unwrap().is_none());
    }

    #[test]
    fn test_session_closes_exactly_once() {
        let store = SqliteStore::in_memory().unwrap();
        let session = StudySession::open(user(), None, at(9, 0));
        store.insert_session(&session).unwrap();

        store.close_session(&session.id, at(9, 10), 10, None).unwrap();
        let second = store.close_session(&session.id, at(9, 20), 20, None);
        assert!(matches!(second, Err(StoreError::NotFound(_))));

        let loaded = store.get_session(&session.id).unwrap().unwrap();
        assert_eq!(loaded.duration_minutes, Some(10));
    }

    #[test]
    fn test_list_sessions_scoped_and_ordered() {
        let store = SqliteStore::in_memory().unwrap();
        let early = StudySession::closed(user(), None, at(8, 0), at(8, 30), None);
        let late = StudySession::closed(user(), None, at(15, 0), at(15, 45), None);
        let other = StudySession::closed(UserId::new("u2"), None, at(10, 0), at(10, 5), None);
        for s in [&early, &late, &other] {
            store.insert_session(s).unwrap();
        }

        let all = store.list_sessions(&user(), None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, late.id);
        assert_eq!(all[1].id, early.id);

        let since = store.list_sessions(&user(), Some(at(12, 0))).unwrap();
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].duration_minutes, Some(45));
    }

    #[test]
    fn test_update_session_replaces_record() {
        let store = SqliteStore::in_memory().unwrap();
        let mut session = StudySession::closed(user(), None, at(8, 0), at(8, 30), None);
        store.insert_session(&session).unwrap();

        session.subject_id = Some("english".into());
        session.duration_minutes = Some(40);
        store.update_session(&session).unwrap();

        let loaded = store.get_session(&session.id).unwrap().unwrap();
        assert_eq!(loaded, session);

        let missing = StudySession::closed(user(), None, at(8, 0), at(8, 30), None);
        assert!(matches!(
            store.update_session(&missing),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_goals() {
        let store = SqliteStore::in_memory().unwrap();
        let daily = Goal::new(user(), GoalType::Daily, 60, None);
        let mut weekly = Goal::new(user(), GoalType::Weekly, 300, Some("math".into()));
        store.insert_goal(&daily).unwrap();
        store.insert_goal(&weekly).unwrap();

        weekly.is_active = false;
        store.update_goal(&weekly).unwrap();

        assert_eq!(store.list_goals(&user()).unwrap().len(), 2);
        let active = store.list_active_goals(&user()).unwrap();
        assert_eq!(active, vec![daily.clone()]);
        assert_eq!(store.get_goal(&weekly.id).unwrap(), Some(weekly.clone()));

        assert!(store.delete_goal(&daily.id).unwrap());
        assert!(store.list_active_goals(&user()).unwrap().is_empty());
    }

    #[test]
    fn test_subjects_presets_and_custom() {
        let store = SqliteStore::in_memory().unwrap();
        let preset = Subject {
            id: "math".into(),
            name: "Math".into(),
            color: "#3B82F6".into(),
            is_preset: true,
        };
        let custom = Subject {
            id: "chess".into(),
            name: "Chess".into(),
            color: "#111111".into(),
            is_preset: false,
        };
        store.upsert_subject(&user(), &preset).unwrap();
        store.upsert_subject(&user(), &custom).unwrap();

        let mine = store.list_subjects(&user()).unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].name, "Chess");

        let theirs = store.list_subjects(&UserId::new("u2")).unwrap();
        assert_eq!(theirs, vec![preset]);
    }

    #[test]
    fn test_subject_id_keeps_its_owner() {
        let store = SqliteStore::in_memory().unwrap();
        let preset = Subject {
            id: "math".into(),
            name: "Math".into(),
            color: "#3B82F6".into(),
            is_preset: true,
        };
        store.upsert_subject(&user(), &preset).unwrap();

        let hijack = Subject {
            name: "Not Math".into(),
            is_preset: false,
            ..preset.clone()
        };
        let result = store.upsert_subject(&UserId::new("u2"), &hijack);
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(store.list_subjects(&user()).unwrap(), vec![preset.clone()]);

        // Custom subjects are private to their owner
        let chess = Subject {
            id: "chess".into(),
            name: "Chess".into(),
            color: "#111111".into(),
            is_preset: false,
        };
        store.upsert_subject(&user(), &chess).unwrap();
        let result = store.upsert_subject(&UserId::new("u2"), &chess);
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(store.list_subjects(&UserId::new("u2")).unwrap(), vec![preset]);

        // The owner can still rename it
        let renamed = Subject {
            name: "Chess Openings".into(),
            ..chess
        };
        store.upsert_subject(&user(), &renamed).unwrap();
        assert_eq!(store.list_subjects(&user()).unwrap()[0].name, "Chess Openings");
    }

    #[test]
    fn test_profile() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.get_profile(&user()).unwrap().is_none());

        let profile = Profile {
            grade: Some("12".into()),
            target_school: None,
        };
        store.save_profile(&user(), &profile).unwrap();
        assert_eq!(store.get_profile(&user()).unwrap(), Some(profile));
    }

    #[test]
    fn test_malformed_row_is_serialization_error() {
        let store = SqliteStore::in_memory().unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO sessions (id, user_id, started_at) VALUES ('bad', 'u1', 'yesterday')",
                [],
            )
            .unwrap();
        }

        let result = store.list_sessions(&user(), None);
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("studylog.db");
        let session = StudySession::closed(user(), None, at(8, 0), at(8, 30), None);

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_session(&session).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_session(&session.id).unwrap(), Some(session));
    }
}
