use super::types::Request;

pub fn str_param<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params.get(key).and_then(|v| v.as_str())
}

pub fn token(req: &Request) -> Option<&str> {
    str_param(req, "token")
}

/// `Ok(None)` when absent or null.
pub fn opt_i64(req: &Request, key: &str) -> Result<Option<i64>, String> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| format!("{} must be an integer", key)),
    }
}
