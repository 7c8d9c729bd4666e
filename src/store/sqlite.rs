//! SQLite-backed grade store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rusqlite::{params, Connection, OptionalExtension};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{error, info};

use super::migrations::apply_migrations;
use super::{GradeStore, StoreResult};
use crate::error::StoreError;
use crate::grade::{Grade, GradeChanges, GradeId, NewGrade};

const GRADE_SELECT_SQL: &str = "SELECT id, student_name, score, created_at FROM grades";

type GradeRow = (GradeId, String, i32, String);

/// Grade store persisted to a SQLite database.
#[derive(Debug)]
pub struct SqliteGradeStore {
    conn: Mutex<Connection>,
}

impl SqliteGradeStore {
    /// Open (or create) a database file and bring its schema up to date.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let started_at = Instant::now();
        let conn = Connection::open(path).map_err(|e| {
            error!("Failed to open grade database: {}", e);
            e
        })?;
        let store = Self::bootstrap(conn)?;
        info!(
            duration_ms = started_at.elapsed().as_millis() as u64,
            "Grade database ready"
        );
        Ok(store)
    }

    /// Open a private in-memory database, mainly for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(mut conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn select_one(conn: &Connection, id: GradeId) -> StoreResult<Option<Grade>> {
    let row = conn
        .query_row(
            &format!("{GRADE_SELECT_SQL} WHERE id = ?1"),
            params![id],
            read_row,
        )
        .optional()?;
    row.map(decode_row).transpose()
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GradeRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_row((id, student_name, score, created_at): GradeRow) -> StoreResult<Grade> {
    let created_at = OffsetDateTime::parse(&created_at, &Rfc3339).map_err(|e| {
        StoreError::InvalidData(format!("grade {id} has bad created_at {created_at:?}: {e}"))
    })?;
    Ok(Grade {
        id,
        student_name,
        score,
        created_at,
    })
}

impl GradeStore for SqliteGradeStore {
    fn list(&self) -> StoreResult<Vec<Grade>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{GRADE_SELECT_SQL} ORDER BY id ASC"))?;
        let rows = stmt.query_map([], read_row)?;

        let mut grades = Vec::new();
        for row in rows {
            grades.push(decode_row(row?)?);
        }
        Ok(grades)
    }

    fn get(&self, id: GradeId) -> StoreResult<Option<Grade>> {
        let conn = self.lock()?;
        select_one(&conn, id)
    }

    fn create(&self, grade: NewGrade) -> StoreResult<Grade> {
        let created_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO grades (student_name, score, created_at) VALUES (?1, ?2, ?3)",
            params![grade.student_name, grade.score, created_at],
        )?;
        let id = conn.last_insert_rowid();

        select_one(&conn, id)?
            .ok_or_else(|| StoreError::InvalidData(format!("grade {id} vanished after insert")))
    }

    fn update(&self, id: GradeId, changes: &GradeChanges) -> StoreResult<Option<Grade>> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE grades
             SET student_name = COALESCE(?1, student_name),
                 score = COALESCE(?2, score)
             WHERE id = ?3",
            params![changes.student_name, changes.score, id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        select_one(&conn, id)
    }

    fn delete(&self, id: GradeId) -> StoreResult<bool> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM grades WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn scores(&self) -> StoreResult<Vec<i32>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT score FROM grades ORDER BY id ASC")?;
        let scores = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i32>>>()?;
        Ok(scores)
    }
}
