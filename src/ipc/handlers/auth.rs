use crate::accounts::SignupRequest;
use crate::ipc::error::{err, ok, seating_err};
use crate::ipc::params::{str_param, token};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use serde_json::json;

fn parse_role(req: &Request) -> Result<Role, serde_json::Value> {
    let Some(raw) = str_param(req, "role") else {
        return Err(err(&req.id, "bad_params", "missing role", None));
    };
    Role::parse(raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            "role must be one of: faculty, student",
            Some(json!({ "field": "role" })),
        )
    })
}

fn handle_signup(state: &mut AppState, req: &Request) -> serde_json::Value {
    let role = match parse_role(req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let signup = SignupRequest {
        username: str_param(req, "username").unwrap_or("").to_string(),
        password: str_param(req, "password").unwrap_or("").to_string(),
        name: str_param(req, "name").unwrap_or("").to_string(),
        roll_no: str_param(req, "rollNo").map(str::to_string),
        branch: str_param(req, "branch").map(str::to_string),
    };
    match state.accounts.signup(role, signup) {
        Ok(auth) => ok(&req.id, json!(auth)),
        Err(e) => seating_err(&req.id, &e),
    }
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let role = match parse_role(req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let Some(username) = str_param(req, "username") else {
        return err(&req.id, "bad_params", "missing username", None);
    };
    let Some(password) = str_param(req, "password") else {
        return err(&req.id, "bad_params", "missing password", None);
    };
    match state.accounts.login(role, username, password) {
        Ok(auth) => ok(&req.id, json!(auth)),
        Err(e) => seating_err(&req.id, &e),
    }
}

fn handle_me(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.accounts.authenticate(token(req)) {
        Ok(user) => ok(&req.id, json!({ "user": user })),
        Err(e) => seating_err(&req.id, &e),
    }
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(t) = token(req) else {
        return err(&req.id, "bad_params", "missing token", None);
    };
    ok(&req.id, json!({ "loggedOut": state.accounts.logout(t) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.signup" => Some(handle_signup(state, req)),
        "auth.login" => Some(handle_login(state, req)),
        "auth.me" => Some(handle_me(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        _ => None,
    }
}
