use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{SeatingError, SeatingResult};
use crate::model::{ExamSession, Role, User};
use crate::store::{SessionEdit, SessionStore, UserStore};

#[derive(Default)]
struct SessionTable {
    order: Vec<String>,
    by_id: HashMap<String, Arc<Mutex<ExamSession>>>,
}

/// Process-memory store. Each session record has its own lock so edits to
/// different sessions never wait on each other.
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<SessionTable>,
    users: RwLock<Vec<User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionStore for MemoryStore {
    fn insert_session(&self, session: ExamSession) -> SeatingResult<()> {
        let mut table = write(&self.sessions);
        if !table.by_id.contains_key(&session.id) {
            table.order.push(session.id.clone());
        }
        table
            .by_id
            .insert(session.id.clone(), Arc::new(Mutex::new(session)));
        Ok(())
    }

    fn get_session(&self, id: &str) -> SeatingResult<Option<ExamSession>> {
        let record = read(&self.sessions).by_id.get(id).cloned();
        Ok(record.map(|r| lock(&r).clone()))
    }

    fn list_sessions(&self) -> SeatingResult<Vec<ExamSession>> {
        let records: Vec<Arc<Mutex<ExamSession>>> = {
            let table = read(&self.sessions);
            table
                .order
                .iter()
                .filter_map(|id| table.by_id.get(id).cloned())
                .collect()
        };
        Ok(records.iter().map(|r| lock(r).clone()).collect())
    }

    fn remove_session(&self, id: &str) -> SeatingResult<bool> {
        let mut table = write(&self.sessions);
        if table.by_id.remove(id).is_none() {
            return Ok(false);
        }
        table.order.retain(|x| x != id);
        Ok(true)
    }

    fn modify_session(
        &self,
        id: &str,
        edit: SessionEdit<'_>,
    ) -> SeatingResult<Option<ExamSession>> {
        let Some(record) = read(&self.sessions).by_id.get(id).cloned() else {
            return Ok(None);
        };

        let mut guard = lock(&record);
        let mut draft = guard.clone();
        edit(&mut draft)?;

        // Commit only if the record is still the one registered under `id`.
        let table = read(&self.sessions);
        match table.by_id.get(id) {
            Some(current) if Arc::ptr_eq(current, &record) => {
                *guard = draft.clone();
                Ok(Some(draft))
            }
            _ => Ok(None),
        }
    }
}

impl UserStore for MemoryStore {
    fn insert_user(&self, user: User) -> SeatingResult<()> {
        let mut users = write(&self.users);
        if users
            .iter()
            .any(|u| u.username == user.username && u.role == user.role)
        {
            return Err(SeatingError::DuplicateUser {
                username: user.username,
                role: user.role,
            });
        }
        users.push(user);
        Ok(())
    }

    fn user_by_id(&self, id: &str) -> SeatingResult<Option<User>> {
        Ok(read(&self.users).iter().find(|u| u.id == id).cloned())
    }

    fn user_by_username(&self, username: &str, role: Role) -> SeatingResult<Option<User>> {
        Ok(read(&self.users)
            .iter()
            .find(|u| u.username == username && u.role == role)
            .cloned())
    }
}
