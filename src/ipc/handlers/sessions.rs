use crate::ipc::error::{err, ok, seating_err};
use crate::ipc::params::{opt_i64, str_param, token};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use crate::repo::SessionDraft;
use serde_json::json;

fn handle_sessions_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let faculty = match state.accounts.require_role(token(req), Role::Faculty) {
        Ok(u) => u,
        Err(e) => return seating_err(&req.id, &e),
    };
    let rows = match opt_i64(req, "rows") {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, Some(json!({ "field": "rows" }))),
    };
    let cols = match opt_i64(req, "cols") {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, Some(json!({ "field": "cols" }))),
    };
    let draft = SessionDraft {
        subject: str_param(req, "subject").unwrap_or("").to_string(),
        date: str_param(req, "date").unwrap_or("").to_string(),
        time: str_param(req, "time").unwrap_or("").to_string(),
        branch: str_param(req, "branch").unwrap_or("").to_string(),
        room: str_param(req, "room").unwrap_or("").to_string(),
        rows,
        cols,
    };
    match state.repo.create(draft, &faculty.id) {
        Ok(session) => ok(&req.id, json!({ "session": session })),
        Err(e) => seating_err(&req.id, &e),
    }
}

fn handle_sessions_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let user = match state.accounts.authenticate(token(req)) {
        Ok(u) => u,
        Err(e) => return seating_err(&req.id, &e),
    };
    let listed = match user.role {
        Role::Faculty => state.repo.list_by_faculty(&user.id),
        Role::Student => state.repo.list_all(),
    };
    match listed {
        Ok(sessions) => ok(&req.id, json!({ "sessions": sessions })),
        Err(e) => seating_err(&req.id, &e),
    }
}

fn handle_sessions_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = state.accounts.authenticate(token(req)) {
        return seating_err(&req.id, &e);
    }
    let Some(session_id) = str_param(req, "sessionId") else {
        return err(&req.id, "bad_params", "missing sessionId", None);
    };
    match state.repo.get_by_id(session_id) {
        Ok(session) => ok(&req.id, json!({ "session": session })),
        Err(e) => seating_err(&req.id, &e),
    }
}

fn handle_sessions_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = state.accounts.require_role(token(req), Role::Faculty) {
        return seating_err(&req.id, &e);
    }
    let Some(session_id) = str_param(req, "sessionId") else {
        return err(&req.id, "bad_params", "missing sessionId", None);
    };
    match state.repo.delete(session_id) {
        Ok(true) => ok(&req.id, json!({ "deleted": true })),
        Ok(false) => err(
            &req.id,
            "not_found",
            "session not found",
            Some(json!({ "sessionId": session_id })),
        ),
        Err(e) => seating_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sessions.create" => Some(handle_sessions_create(state, req)),
        "sessions.list" => Some(handle_sessions_list(state, req)),
        "sessions.get" => Some(handle_sessions_get(state, req)),
        "sessions.delete" => Some(handle_sessions_delete(state, req)),
        _ => None,
    }
}
