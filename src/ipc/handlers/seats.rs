use crate::assign::{assign_seat, bulk_assign, SeatUpdate, SkippedUpdate};
use crate::error::SeatingError;
use crate::import::{parse_seat_table, read_seat_table, ParsedSeatTable};
use crate::ipc::error::{err, ok, seating_err};
use crate::ipc::params::{str_param, token};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use serde_json::json;
use std::path::Path;
use tracing::{info, warn};

fn limit_exceeded(req: &Request, rejected: usize, max: usize) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "updated": 0,
            "rejected": rejected,
            "limitExceeded": true,
            "skipped": [{
                "index": -1,
                "code": "too_many_rows",
                "message": format!("bulk payload exceeds max rows: {} > {}", rejected, max),
            }]
        }),
    )
}

fn engine_skip(s: &SkippedUpdate, index: usize) -> serde_json::Value {
    json!({
        "index": index,
        "row": s.row,
        "col": s.col,
        "code": s.reason,
    })
}

fn handle_seats_assign(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = state.accounts.require_role(token(req), Role::Faculty) {
        return seating_err(&req.id, &e);
    }
    let Some(session_id) = str_param(req, "sessionId") else {
        return err(&req.id, "bad_params", "missing sessionId", None);
    };
    let Some(seat_id) = str_param(req, "seatId") else {
        return err(&req.id, "bad_params", "missing seatId", None);
    };
    let roll_no = str_param(req, "rollNo").unwrap_or("");
    let name = str_param(req, "name");

    match assign_seat(
        &state.repo,
        state.config.roll_policy,
        session_id,
        seat_id,
        roll_no,
        name,
    ) {
        Ok(session) => ok(&req.id, json!({ "session": session })),
        Err(e) => seating_err(&req.id, &e),
    }
}

fn handle_seats_bulk_assign(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = state.accounts.require_role(token(req), Role::Faculty) {
        return seating_err(&req.id, &e);
    }
    let Some(session_id) = str_param(req, "sessionId") else {
        return err(&req.id, "bad_params", "missing sessionId", None);
    };
    let Some(rows_arr) = req.params.get("rows").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing rows[]", None);
    };

    let max = state.config.bulk_max_rows;
    if rows_arr.len() > max {
        return limit_exceeded(req, rows_arr.len(), max);
    }

    let mut updates: Vec<SeatUpdate> = Vec::with_capacity(rows_arr.len());
    let mut source_index: Vec<usize> = Vec::with_capacity(rows_arr.len());
    let mut skipped: Vec<serde_json::Value> = Vec::new();

    for (i, item) in rows_arr.iter().enumerate() {
        let Some(obj) = item.as_object() else {
            skipped.push(json!({
                "index": i,
                "code": "bad_params",
                "message": format!("row at index {} must be an object", i),
            }));
            continue;
        };
        let (Some(row), Some(col)) = (
            obj.get("row").and_then(|v| v.as_i64()),
            obj.get("col").and_then(|v| v.as_i64()),
        ) else {
            skipped.push(json!({
                "index": i,
                "code": "bad_params",
                "message": format!("row at index {} missing/invalid row or col", i),
            }));
            continue;
        };
        let roll_no = match obj.get("rollNo") {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(v) => match v.as_str() {
                Some(s) => s.to_string(),
                None => {
                    skipped.push(json!({
                        "index": i,
                        "row": row,
                        "col": col,
                        "code": "bad_params",
                        "message": format!("row at index {} rollNo must be string", i),
                    }));
                    continue;
                }
            },
        };
        let name = obj
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        updates.push(SeatUpdate {
            row,
            col,
            roll_no,
            name,
        });
        source_index.push(i);
    }

    let outcome = match bulk_assign(&state.repo, state.config.roll_policy, session_id, &updates) {
        Ok(o) => o,
        Err(e) => return seating_err(&req.id, &e),
    };
    for s in &outcome.skipped {
        let index = source_index.get(s.index).copied().unwrap_or(s.index);
        skipped.push(engine_skip(s, index));
    }
    skipped.sort_by_key(|v| v.get("index").and_then(|i| i.as_u64()).unwrap_or(0));

    ok(
        &req.id,
        json!({
            "updated": outcome.updated,
            "rejected": skipped.len(),
            "skipped": skipped,
            "session": outcome.session,
        }),
    )
}

fn handle_seats_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = state.accounts.require_role(token(req), Role::Faculty) {
        return seating_err(&req.id, &e);
    }
    let Some(session_id) = str_param(req, "sessionId") else {
        return err(&req.id, "bad_params", "missing sessionId", None);
    };

    let parsed: ParsedSeatTable = if let Some(content) = str_param(req, "content") {
        parse_seat_table(content)
    } else if let Some(path) = str_param(req, "path") {
        match read_seat_table(Path::new(path)) {
            Ok(p) => p,
            Err(e) => {
                let e = SeatingError::Import {
                    message: format!("{e:#}"),
                };
                return seating_err(&req.id, &e);
            }
        }
    } else {
        return err(&req.id, "bad_params", "missing content or path", None);
    };

    let max = state.config.bulk_max_rows;
    if parsed.updates.len() > max {
        return limit_exceeded(req, parsed.updates.len(), max);
    }

    let outcome = match bulk_assign(
        &state.repo,
        state.config.roll_policy,
        session_id,
        &parsed.updates,
    ) {
        Ok(o) => o,
        Err(e) => return seating_err(&req.id, &e),
    };

    let mut skipped: Vec<serde_json::Value> = parsed
        .skipped
        .iter()
        .map(|s| json!(s))
        .collect();
    for s in &outcome.skipped {
        let line = parsed.update_lines.get(s.index).copied().unwrap_or(0);
        skipped.push(json!({
            "line": line,
            "row": s.row + 1,
            "col": s.col + 1,
            "code": s.reason,
        }));
    }
    skipped.sort_by_key(|v| v.get("line").and_then(|l| l.as_u64()).unwrap_or(0));

    for s in &skipped {
        warn!(%session_id, skipped = %s, "import row skipped");
    }

    let message = if skipped.is_empty() {
        format!("imported {} of {} rows", outcome.updated, parsed.total_rows)
    } else {
        format!(
            "imported {} of {} rows; {} skipped, not all rows were applied",
            outcome.updated,
            parsed.total_rows,
            skipped.len()
        )
    };
    info!(
        %session_id,
        updated = outcome.updated,
        skipped = skipped.len(),
        header_skipped = parsed.header_skipped,
        occupied = outcome.session.occupied_count(),
        "seat table imported"
    );

    ok(
        &req.id,
        json!({
            "updated": outcome.updated,
            "rejected": skipped.len(),
            "headerSkipped": parsed.header_skipped,
            "skipped": skipped,
            "message": message,
            "session": outcome.session,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "seats.assign" => Some(handle_seats_assign(state, req)),
        "seats.bulkAssign" => Some(handle_seats_bulk_assign(state, req)),
        "seats.import" => Some(handle_seats_import(state, req)),
        _ => None,
    }
}
