mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::SeatingResult;
use crate::model::{ExamSession, Role, Seat, User};

/// Mutation applied to one session record while the store holds it exclusively.
///
/// Returning an error discards every change the closure made.
pub type SessionEdit<'a> = &'a mut dyn FnMut(&mut ExamSession) -> SeatingResult<()>;

pub trait SessionStore: Send + Sync {
    fn insert_session(&self, session: ExamSession) -> SeatingResult<()>;

    fn get_session(&self, id: &str) -> SeatingResult<Option<ExamSession>>;

    /// All sessions in insertion order.
    fn list_sessions(&self) -> SeatingResult<Vec<ExamSession>>;

    fn remove_session(&self, id: &str) -> SeatingResult<bool>;

    /// Read-modify-write of a single session. `Ok(None)` when the session is absent
    /// or was removed before the edit could be committed.
    fn modify_session(&self, id: &str, edit: SessionEdit<'_>)
        -> SeatingResult<Option<ExamSession>>;

    /// Every seat whose roll key equals `key`, in session insertion order then
    /// row-major order.
    fn seats_for_roll(&self, key: &str) -> SeatingResult<Vec<(ExamSession, Seat)>> {
        let mut out = Vec::new();
        for session in self.list_sessions()? {
            let hits: Vec<Seat> = session
                .seats
                .iter()
                .filter(|s| s.roll_key().as_deref() == Some(key))
                .cloned()
                .collect();
            for seat in hits {
                out.push((session.clone(), seat));
            }
        }
        Ok(out)
    }
}

pub trait UserStore: Send + Sync {
    /// Fails with `DuplicateUser` when `(username, role)` is taken.
    fn insert_user(&self, user: User) -> SeatingResult<()>;

    fn user_by_id(&self, id: &str) -> SeatingResult<Option<User>>;

    fn user_by_username(&self, username: &str, role: Role) -> SeatingResult<Option<User>>;
}
