use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::{SeatingError, SeatingResult};
use crate::model::{create_grid, Branch, ExamSession, DEFAULT_COLS, DEFAULT_ROWS};
use crate::store::{SessionEdit, SessionStore};

/// Unvalidated input for a new exam session.
#[derive(Debug, Clone, Default)]
pub struct SessionDraft {
    pub subject: String,
    pub date: String,
    pub time: String,
    pub branch: String,
    pub room: String,
    pub rows: Option<i64>,
    pub cols: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope<'a> {
    All,
    ByFaculty(&'a str),
}

fn required(field: &'static str, value: &str) -> SeatingResult<String> {
    let t = value.trim();
    if t.is_empty() {
        return Err(SeatingError::validation(
            field,
            format!("{} is required", field),
        ));
    }
    Ok(t.to_string())
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn SessionStore>,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn create(&self, draft: SessionDraft, faculty_id: &str) -> SeatingResult<ExamSession> {
        let subject = required("subject", &draft.subject)?;
        let date = required("date", &draft.date)?;
        let time = required("time", &draft.time)?;
        let room = required("room", &draft.room)?;
        let branch = Branch::parse(&draft.branch).ok_or_else(|| {
            SeatingError::validation("branch", format!("unknown branch `{}`", draft.branch))
        })?;

        let rows = draft.rows.unwrap_or(DEFAULT_ROWS as i64);
        let cols = draft.cols.unwrap_or(DEFAULT_COLS as i64);
        let id = Uuid::new_v4().to_string();
        let seats = create_grid(rows, cols, &id)?;

        let session = ExamSession {
            id,
            subject,
            date,
            time,
            branch,
            room,
            rows: rows as u32,
            cols: cols as u32,
            seats,
            created_by: faculty_id.to_string(),
            created_at: now_rfc3339(),
        };
        self.store.insert_session(session.clone())?;

        info!(
            session_id = %session.id,
            owner = %faculty_id,
            rows = session.rows,
            cols = session.cols,
            "exam session created"
        );
        Ok(session)
    }

    pub fn get_by_id(&self, id: &str) -> SeatingResult<ExamSession> {
        self.store
            .get_session(id)?
            .ok_or_else(|| SeatingError::SessionNotFound {
                session_id: id.to_string(),
            })
    }

    pub fn list(&self, scope: ListScope<'_>) -> SeatingResult<Vec<ExamSession>> {
        let all = self.store.list_sessions()?;
        Ok(match scope {
            ListScope::All => all,
            ListScope::ByFaculty(owner) => {
                all.into_iter().filter(|s| s.created_by == owner).collect()
            }
        })
    }

    pub fn list_all(&self) -> SeatingResult<Vec<ExamSession>> {
        self.list(ListScope::All)
    }

    pub fn list_by_faculty(&self, faculty_id: &str) -> SeatingResult<Vec<ExamSession>> {
        self.list(ListScope::ByFaculty(faculty_id))
    }

    pub fn delete(&self, id: &str) -> SeatingResult<bool> {
        let existed = self.store.remove_session(id)?;
        if existed {
            info!(session_id = %id, "exam session deleted");
        }
        Ok(existed)
    }

    /// Runs `edit` with exclusive access to the session record.
    pub(crate) fn modify(&self, id: &str, edit: SessionEdit<'_>) -> SeatingResult<ExamSession> {
        self.store
            .modify_session(id, edit)?
            .ok_or_else(|| SeatingError::SessionNotFound {
                session_id: id.to_string(),
            })
    }

    pub(crate) fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }
}
