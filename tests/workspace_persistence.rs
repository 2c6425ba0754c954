use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar(envs: &[(&str, &str)]) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_examseatd");
    let mut child = Command::new(exe)
        .env_remove("EXAMSEATD_WORKSPACE")
        .env_remove("EXAMSEATD_ROLL_POLICY")
        .env_remove("EXAMSEATD_BULK_MAX_ROWS")
        .env_remove("EXAMSEATD_SEED_DEMO")
        .envs(envs.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn examseatd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn login_faculty(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
) -> String {
    let res = request_ok(
        stdin,
        reader,
        id,
        "auth.login",
        json!({ "role": "faculty", "username": "prof", "password": "secret" }),
    );
    res["token"].as_str().expect("token").to_string()
}

#[test]
fn workspace_state_survives_restart() {
    let workspace = temp_dir("examseat-workspace");
    let ws = workspace.to_string_lossy().to_string();

    let (session_id, old_token) = {
        let (mut child, mut stdin, mut reader) = spawn_sidecar(&[]);
        let selected = request_ok(
            &mut stdin,
            &mut reader,
            "1",
            "workspace.select",
            json!({ "path": ws }),
        );
        assert_eq!(selected["workspacePath"], json!(ws));
        let health = request_ok(&mut stdin, &mut reader, "2", "health", json!({}));
        assert_eq!(health["storage"], json!("sqlite"));
        assert_eq!(health["workspacePath"], json!(ws));

        let auth = request_ok(
            &mut stdin,
            &mut reader,
            "3",
            "auth.signup",
            json!({ "role": "faculty", "username": "prof", "password": "secret", "name": "Prof A" }),
        );
        let token = auth["token"].as_str().expect("token").to_string();
        let created = request_ok(
            &mut stdin,
            &mut reader,
            "4",
            "sessions.create",
            json!({
                "token": token,
                "subject": "Kinematics",
                "date": "2024-06-03",
                "time": "09:30",
                "branch": "MECHATRONICS",
                "room": "Hall 9",
                "rows": 3,
                "cols": 2
            }),
        );
        let session_id = created["session"]["id"].as_str().expect("id").to_string();
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            "5",
            "seats.bulkAssign",
            json!({
                "token": token,
                "sessionId": session_id,
                "rows": [{ "row": 2, "col": 1, "rollNo": "MT-7", "name": "Ravi" }]
            }),
        );
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            "6",
            "setup.update",
            json!({ "rollPolicy": "strict", "bulkMaxRows": 10 }),
        );

        drop(stdin);
        let _ = child.wait();
        (session_id, token)
    };

    let (mut child, mut stdin, mut reader) = spawn_sidecar(&[]);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": ws }),
    );

    let setup = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(setup, json!({ "rollPolicy": "strict", "bulkMaxRows": 10 }));

    let stale = request(
        &mut stdin,
        &mut reader,
        "3",
        "sessions.list",
        json!({ "token": old_token }),
    );
    assert_eq!(error_code(&stale), "unauthorized");

    let token = login_faculty(&mut stdin, &mut reader, "4");
    let got = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "sessions.get",
        json!({ "token": token, "sessionId": session_id }),
    );
    let seats = got["session"]["seats"].as_array().expect("seats");
    assert_eq!(seats.len(), 6);
    assert_eq!(seats[5]["studentRollNo"], json!("MT-7"));
    assert_eq!(seats[5]["studentName"], json!("Ravi"));
    assert_eq!(got["session"]["branch"], json!("MECHATRONICS"));

    let found = request_ok(&mut stdin, &mut reader, "6", "search.byRoll", json!({ "rollNo": "mt-7" }));
    assert_eq!(found["matches"][0]["seat"]["id"], seats[5]["id"]);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "sessions.delete",
        json!({ "token": token, "sessionId": session_id }),
    );
    drop(stdin);
    let _ = child.wait();

    // Workspace from the environment, deletion persisted.
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&[("EXAMSEATD_WORKSPACE", ws.as_str())]);
    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["storage"], json!("sqlite"));
    let token = login_faculty(&mut stdin, &mut reader, "2");
    let list = request_ok(&mut stdin, &mut reader, "3", "sessions.list", json!({ "token": token }));
    assert_eq!(list["sessions"], json!([]));
    let found = request_ok(&mut stdin, &mut reader, "4", "search.byRoll", json!({ "rollNo": "MT-7" }));
    assert_eq!(found["found"], json!(false));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn workspace_select_requires_path() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&[]);
    let resp = request(&mut stdin, &mut reader, "1", "workspace.select", json!({ "path": "" }));
    assert_eq!(error_code(&resp), "bad_params");
    let health = request_ok(&mut stdin, &mut reader, "2", "health", json!({}));
    assert_eq!(health["storage"], json!("memory"));
    drop(stdin);
    let _ = child.wait();
}

#[test]
fn switching_workspace_starts_from_startup_settings() {
    let root = temp_dir("examseat-ws-switch");
    let first = root.join("first");
    let second = root.join("second");
    let first_path = first.to_string_lossy().to_string();
    let second_path = second.to_string_lossy().to_string();

    let (mut child, mut stdin, mut reader) =
        spawn_sidecar(&[("EXAMSEATD_BULK_MAX_ROWS", "200")]);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": first_path }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "setup.update",
        json!({ "rollPolicy": "strict", "bulkMaxRows": 10 }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": second_path }),
    );
    let setup = request_ok(&mut stdin, &mut reader, "4", "setup.get", json!({}));
    assert_eq!(setup, json!({ "rollPolicy": "lenient", "bulkMaxRows": 200 }));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "workspace.select",
        json!({ "path": first_path }),
    );
    let setup = request_ok(&mut stdin, &mut reader, "6", "setup.get", json!({}));
    assert_eq!(setup, json!({ "rollPolicy": "strict", "bulkMaxRows": 10 }));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(root);
}
