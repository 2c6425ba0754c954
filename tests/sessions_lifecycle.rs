use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_examseatd");
    let mut child = Command::new(exe)
        .env_remove("EXAMSEATD_WORKSPACE")
        .env_remove("EXAMSEATD_ROLL_POLICY")
        .env_remove("EXAMSEATD_BULK_MAX_ROWS")
        .env_remove("EXAMSEATD_SEED_DEMO")
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

fn signup(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    params: serde_json::Value,
) -> String {
    let res = request_ok(stdin, reader, id, "auth.signup", params);
    res.get("token")
        .and_then(|v| v.as_str())
        .expect("token")
        .to_string()
}

fn session_ids(result: &serde_json::Value) -> Vec<String> {
    result["sessions"]
        .as_array()
        .expect("sessions array")
        .iter()
        .filter_map(|s| s.get("id").and_then(|v| v.as_str()).map(str::to_string))
        .collect()
}

#[test]
fn sessions_create_list_get_delete_with_role_scoping() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let prof = signup(
        &mut stdin,
        &mut reader,
        "1",
        json!({ "role": "faculty", "username": "prof", "password": "secret", "name": "Prof A" }),
    );
    let other = signup(
        &mut stdin,
        &mut reader,
        "2",
        json!({ "role": "faculty", "username": "other", "password": "secret", "name": "Prof B" }),
    );
    let student = signup(
        &mut stdin,
        &mut reader,
        "3",
        json!({
            "role": "student",
            "username": "stu",
            "password": "secret",
            "name": "John Doe",
            "rollNo": "CSD-001",
            "branch": "COMPUTER SCIENCE AND DESIGN"
        }),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "sessions.create",
        json!({
            "token": prof,
            "subject": "Data Structures",
            "date": "2024-05-10",
            "time": "10:00",
            "branch": "COMPUTER SCIENCE AND DESIGN",
            "room": "Hall 101"
        }),
    );
    let session = &created["session"];
    let session_id = session["id"].as_str().expect("session id").to_string();
    assert_eq!(session["rows"], json!(8));
    assert_eq!(session["cols"], json!(6));
    let seats = session["seats"].as_array().expect("seats");
    assert_eq!(seats.len(), 48);
    assert!(seats.iter().all(|s| s.get("studentRollNo").is_none()));
    assert_eq!(seats[7]["row"], json!(1));
    assert_eq!(seats[7]["col"], json!(1));

    let second = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "sessions.create",
        json!({
            "token": other,
            "subject": "Surveying",
            "date": "2024-05-11",
            "time": "09:00",
            "branch": "civil",
            "room": "Hall 7",
            "rows": 2,
            "cols": 3
        }),
    );
    let second_id = second["session"]["id"].as_str().expect("id").to_string();
    assert_eq!(second["session"]["seats"].as_array().map(|a| a.len()), Some(6));
    assert_eq!(second["session"]["branch"], json!("CIVIL"));

    let mine = request_ok(&mut stdin, &mut reader, "6", "sessions.list", json!({ "token": prof }));
    assert_eq!(session_ids(&mine), vec![session_id.clone()]);
    let all = request_ok(&mut stdin, &mut reader, "7", "sessions.list", json!({ "token": student }));
    assert_eq!(session_ids(&all), vec![session_id.clone(), second_id.clone()]);

    let got = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "sessions.get",
        json!({ "token": student, "sessionId": session_id }),
    );
    assert_eq!(got["session"]["subject"], json!("Data Structures"));

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "sessions.delete",
        json!({ "token": prof, "sessionId": session_id }),
    );
    assert_eq!(deleted, json!({ "deleted": true }));

    let gone = request(
        &mut stdin,
        &mut reader,
        "10",
        "sessions.get",
        json!({ "token": prof, "sessionId": session_id }),
    );
    assert_eq!(error_code(&gone), "not_found");
    let again = request(
        &mut stdin,
        &mut reader,
        "11",
        "sessions.delete",
        json!({ "token": prof, "sessionId": session_id }),
    );
    assert_eq!(error_code(&again), "not_found");

    let all = request_ok(&mut stdin, &mut reader, "12", "sessions.list", json!({ "token": student }));
    assert_eq!(session_ids(&all), vec![second_id]);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn sessions_reject_bad_input_and_wrong_roles() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let prof = signup(
        &mut stdin,
        &mut reader,
        "1",
        json!({ "role": "faculty", "username": "prof", "password": "secret", "name": "Prof A" }),
    );
    let student = signup(
        &mut stdin,
        &mut reader,
        "2",
        json!({
            "role": "student",
            "username": "stu",
            "password": "secret",
            "name": "Jane",
            "rollNo": "ME-1",
            "branch": "MECHANICS"
        }),
    );
    let base = json!({
        "subject": "Thermo",
        "date": "2024-06-01",
        "time": "11:00",
        "branch": "MECHANICS",
        "room": "Lab 2"
    });
    let with = |extra: serde_json::Value| {
        let mut p = base.clone();
        for (k, v) in extra.as_object().expect("object") {
            p[k] = v.clone();
        }
        p
    };

    let no_token = request(&mut stdin, &mut reader, "3", "sessions.create", base.clone());
    assert_eq!(error_code(&no_token), "unauthorized");

    let as_student = request(
        &mut stdin,
        &mut reader,
        "4",
        "sessions.create",
        with(json!({ "token": student })),
    );
    assert_eq!(error_code(&as_student), "forbidden");

    for (i, extra) in [
        json!({ "token": prof, "rows": 21 }),
        json!({ "token": prof, "cols": 0 }),
        json!({ "token": prof, "rows": "eight" }),
        json!({ "token": prof, "branch": "ASTRONOMY" }),
        json!({ "token": prof, "subject": "   " }),
    ]
    .into_iter()
    .enumerate()
    {
        let id = format!("bad{}", i);
        let resp = request(&mut stdin, &mut reader, &id, "sessions.create", with(extra));
        assert_eq!(error_code(&resp), "bad_params", "{}", resp);
    }

    let list = request_ok(&mut stdin, &mut reader, "5", "sessions.list", json!({ "token": prof }));
    assert_eq!(list["sessions"], json!([]));

    let bogus = request(
        &mut stdin,
        &mut reader,
        "6",
        "sessions.list",
        json!({ "token": "deadbeef" }),
    );
    assert_eq!(error_code(&bogus), "unauthorized");

    let delete_as_student = request(
        &mut stdin,
        &mut reader,
        "7",
        "sessions.delete",
        json!({ "token": student, "sessionId": "x" }),
    );
    assert_eq!(error_code(&delete_as_student), "forbidden");

    drop(stdin);
    let _ = child.wait();
}
