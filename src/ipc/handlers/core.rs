use crate::config::SEATING_SETTINGS_KEY;
use crate::ipc::error::{err, ok, seating_err};
use crate::ipc::types::{AppState, Request};
use crate::model::Branch;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "storage": state.storage_kind(),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match state.open_workspace(&path) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, state.config.seating_settings())
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !req.params.is_object() {
        return err(&req.id, "bad_params", "params must be an object", None);
    }
    // Live settings change only after the patch is persisted.
    let mut next = state.config.clone();
    if let Err(msg) = next.apply_seating_settings(&req.params) {
        return err(&req.id, "bad_params", msg, None);
    }
    let settings = next.seating_settings();
    if let Some(db) = state.db.as_ref() {
        if let Err(e) = db.settings_set_json(SEATING_SETTINGS_KEY, &settings) {
            return seating_err(&req.id, &e);
        }
    }
    state.config = next;
    info!(
        roll_policy = state.config.roll_policy.as_str(),
        bulk_max_rows = state.config.bulk_max_rows,
        "seating settings updated"
    );
    ok(&req.id, settings)
}

fn handle_branches_list(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let branches: Vec<&str> = Branch::ALL.iter().map(|b| b.as_str()).collect();
    ok(&req.id, json!({ "branches": branches }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        "branches.list" => Some(handle_branches_list(state, req)),
        _ => None,
    }
}
