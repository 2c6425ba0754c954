use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OptionalExtension};

use crate::error::{SeatingError, SeatingResult};
use crate::model::{Branch, ExamSession, Role, Seat, User};
use crate::store::{SessionEdit, SessionStore, UserStore};

const DB_FILE: &str = "examseat.sqlite3";

/// Durable store backed by one SQLite file inside a workspace directory.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(workspace)?;
        let db_path = workspace.join(DB_FILE);
        let conn = Connection::open(&db_path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users(
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                name TEXT NOT NULL,
                roll_no TEXT,
                branch TEXT,
                created_at TEXT NOT NULL,
                UNIQUE(username, role)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS exam_sessions(
                id TEXT PRIMARY KEY,
                subject TEXT NOT NULL,
                date TEXT NOT NULL,
                time TEXT NOT NULL,
                branch TEXT NOT NULL,
                room TEXT NOT NULL,
                grid_rows INTEGER NOT NULL,
                grid_cols INTEGER NOT NULL,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_exam_sessions_owner ON exam_sessions(created_by)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS seats(
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                seat_row INTEGER NOT NULL,
                seat_col INTEGER NOT NULL,
                roll_no TEXT,
                roll_key TEXT,
                student_name TEXT,
                FOREIGN KEY(session_id) REFERENCES exam_sessions(id),
                UNIQUE(session_id, seat_row, seat_col)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_seats_session ON seats(session_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_seats_roll_key ON seats(roll_key)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings(
                key TEXT PRIMARY KEY,
                value_json TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: db_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn settings_get_json(&self, key: &str) -> SeatingResult<Option<serde_json::Value>> {
        let conn = self.conn();
        let raw: Option<String> = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = ?",
                [key],
                |r| r.get(0),
            )
            .optional()?;
        match raw {
            Some(s) => serde_json::from_str(&s)
                .map(Some)
                .map_err(|e| SeatingError::Storage {
                    message: format!("settings `{}`: {}", key, e),
                }),
            None => Ok(None),
        }
    }

    pub fn settings_set_json(&self, key: &str, value: &serde_json::Value) -> SeatingResult<()> {
        self.conn().execute(
            "INSERT INTO settings(key, value_json) VALUES(?, ?)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
            (key, value.to_string()),
        )?;
        Ok(())
    }
}

struct SessionRow {
    id: String,
    subject: String,
    date: String,
    time: String,
    branch: String,
    room: String,
    rows: i64,
    cols: i64,
    created_by: String,
    created_at: String,
}

const SESSION_COLUMNS: &str =
    "id, subject, date, time, branch, room, grid_rows, grid_cols, created_by, created_at";

fn session_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: r.get(0)?,
        subject: r.get(1)?,
        date: r.get(2)?,
        time: r.get(3)?,
        branch: r.get(4)?,
        room: r.get(5)?,
        rows: r.get(6)?,
        cols: r.get(7)?,
        created_by: r.get(8)?,
        created_at: r.get(9)?,
    })
}

fn seat_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<(String, Seat)> {
    let session_id: String = r.get(0)?;
    let seat = Seat {
        id: r.get(1)?,
        row: r.get(2)?,
        col: r.get(3)?,
        student_roll_no: r.get(4)?,
        student_name: r.get(5)?,
    };
    Ok((session_id, seat))
}

fn build_session(row: SessionRow, seats: Vec<Seat>) -> SeatingResult<ExamSession> {
    let branch = Branch::parse(&row.branch).ok_or_else(|| SeatingError::Storage {
        message: format!("session {} has unknown branch `{}`", row.id, row.branch),
    })?;
    Ok(ExamSession {
        id: row.id,
        subject: row.subject,
        date: row.date,
        time: row.time,
        branch,
        room: row.room,
        rows: row.rows as u32,
        cols: row.cols as u32,
        seats,
        created_by: row.created_by,
        created_at: row.created_at,
    })
}

fn load_session(conn: &Connection, id: &str) -> SeatingResult<Option<ExamSession>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM exam_sessions WHERE id = ?", SESSION_COLUMNS),
            [id],
            session_row,
        )
        .optional()?;
    let Some(row) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT session_id, id, seat_row, seat_col, roll_no, student_name
         FROM seats
         WHERE session_id = ?
         ORDER BY seat_row, seat_col",
    )?;
    let seats = stmt
        .query_map([id], seat_row)?
        .map(|r| r.map(|(_, seat)| seat))
        .collect::<Result<Vec<_>, _>>()?;

    build_session(row, seats).map(Some)
}

fn write_seat(conn: &Connection, seat: &Seat) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE seats SET roll_no = ?, roll_key = ?, student_name = ? WHERE id = ?",
        (
            &seat.student_roll_no,
            seat.roll_key(),
            &seat.student_name,
            &seat.id,
        ),
    )?;
    Ok(())
}

impl SessionStore for SqliteStore {
    fn insert_session(&self, session: ExamSession) -> SeatingResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO exam_sessions({}) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                SESSION_COLUMNS
            ),
            (
                &session.id,
                &session.subject,
                &session.date,
                &session.time,
                session.branch.as_str(),
                &session.room,
                session.rows,
                session.cols,
                &session.created_by,
                &session.created_at,
            ),
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO seats(id, session_id, seat_row, seat_col, roll_no, roll_key, student_name)
                 VALUES(?, ?, ?, ?, ?, ?, ?)",
            )?;
            for seat in &session.seats {
                stmt.execute((
                    &seat.id,
                    &session.id,
                    seat.row,
                    seat.col,
                    &seat.student_roll_no,
                    seat.roll_key(),
                    &seat.student_name,
                ))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_session(&self, id: &str) -> SeatingResult<Option<ExamSession>> {
        load_session(&self.conn(), id)
    }

    fn list_sessions(&self) -> SeatingResult<Vec<ExamSession>> {
        let conn = self.conn();

        let mut seat_stmt = conn.prepare(
            "SELECT session_id, id, seat_row, seat_col, roll_no, student_name
             FROM seats
             ORDER BY session_id, seat_row, seat_col",
        )?;
        let mut seats_by_session: HashMap<String, Vec<Seat>> = HashMap::new();
        for r in seat_stmt.query_map([], seat_row)? {
            let (session_id, seat) = r?;
            seats_by_session.entry(session_id).or_default().push(seat);
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM exam_sessions ORDER BY rowid",
            SESSION_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], session_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|row| {
                let seats = seats_by_session.remove(&row.id).unwrap_or_default();
                build_session(row, seats)
            })
            .collect()
    }

    fn remove_session(&self, id: &str) -> SeatingResult<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM seats WHERE session_id = ?", [id])?;
        let removed = tx.execute("DELETE FROM exam_sessions WHERE id = ?", [id])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    fn modify_session(
        &self,
        id: &str,
        edit: SessionEdit<'_>,
    ) -> SeatingResult<Option<ExamSession>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let Some(before) = load_session(&tx, id)? else {
            return Ok(None);
        };

        let mut draft = before.clone();
        // Dropping `tx` on error rolls back.
        edit(&mut draft)?;

        for (old, new) in before.seats.iter().zip(&draft.seats) {
            if old != new {
                write_seat(&tx, new)?;
            }
        }
        tx.commit()?;
        Ok(Some(draft))
    }

    fn seats_for_roll(&self, key: &str) -> SeatingResult<Vec<(ExamSession, Seat)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT s.session_id, s.id
             FROM seats s
             JOIN exam_sessions e ON e.id = s.session_id
             WHERE s.roll_key = ?
             ORDER BY e.rowid, s.seat_row, s.seat_col",
        )?;
        let hits = stmt
            .query_map([key], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut loaded: HashMap<String, ExamSession> = HashMap::new();
        let mut out = Vec::with_capacity(hits.len());
        for (session_id, seat_id) in hits {
            if !loaded.contains_key(&session_id) {
                let Some(session) = load_session(&conn, &session_id)? else {
                    continue;
                };
                loaded.insert(session_id.clone(), session);
            }
            let Some(session) = loaded.get(&session_id) else {
                continue;
            };
            if let Some(seat) = session.seat_by_id(&seat_id) {
                out.push((session.clone(), seat.clone()));
            }
        }
        Ok(out)
    }
}

fn user_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<(User, String, Option<String>)> {
    let role: String = r.get(3)?;
    let branch: Option<String> = r.get(6)?;
    let user = User {
        id: r.get(0)?,
        username: r.get(1)?,
        password_hash: r.get(2)?,
        role: Role::Student,
        name: r.get(4)?,
        roll_no: r.get(5)?,
        branch: None,
        created_at: r.get(7)?,
    };
    Ok((user, role, branch))
}

fn finish_user((mut user, role, branch): (User, String, Option<String>)) -> SeatingResult<User> {
    user.role = Role::parse(&role).ok_or_else(|| SeatingError::Storage {
        message: format!("user {} has unknown role `{}`", user.id, role),
    })?;
    user.branch = branch.as_deref().and_then(Branch::parse);
    Ok(user)
}

const USER_COLUMNS: &str = "id, username, password_hash, role, name, roll_no, branch, created_at";

impl UserStore for SqliteStore {
    fn insert_user(&self, user: User) -> SeatingResult<()> {
        let conn = self.conn();
        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM users WHERE username = ? AND role = ?",
                (&user.username, user.role.as_str()),
                |r| r.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(SeatingError::DuplicateUser {
                username: user.username,
                role: user.role,
            });
        }

        conn.execute(
            &format!(
                "INSERT INTO users({}) VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
                USER_COLUMNS
            ),
            (
                &user.id,
                &user.username,
                &user.password_hash,
                user.role.as_str(),
                &user.name,
                &user.roll_no,
                user.branch.map(Branch::as_str),
                &user.created_at,
            ),
        )?;
        Ok(())
    }

    fn user_by_id(&self, id: &str) -> SeatingResult<Option<User>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
                [id],
                user_row,
            )
            .optional()?;
        row.map(finish_user).transpose()
    }

    fn user_by_username(&self, username: &str, role: Role) -> SeatingResult<Option<User>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM users WHERE username = ? AND role = ?",
                    USER_COLUMNS
                ),
                (username, role.as_str()),
                user_row,
            )
            .optional()?;
        row.map(finish_user).transpose()
    }
}
