use crate::ipc::error::{err, ok, seating_err};
use crate::ipc::params::str_param;
use crate::ipc::types::{AppState, Request};
use crate::locator::find_all_seats_for_roll;
use serde_json::json;

fn handle_search_by_roll(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(roll_no) = str_param(req, "rollNo").filter(|s| !s.trim().is_empty()) else {
        return err(&req.id, "bad_params", "missing rollNo", None);
    };
    match find_all_seats_for_roll(&state.repo, roll_no) {
        Ok(matches) => ok(
            &req.id,
            json!({
                "found": !matches.is_empty(),
                "matches": matches,
            }),
        ),
        Err(e) => seating_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "search.byRoll" => Some(handle_search_by_roll(state, req)),
        _ => None,
    }
}
