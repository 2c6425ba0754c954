use std::path::PathBuf;

use anyhow::{anyhow, Context};
use chrono::Duration;
use serde_json::{json, Value};

use crate::assign::RollPolicy;

pub const SEATING_SETTINGS_KEY: &str = "setup.seating";
const BULK_MAX_ROWS_LIMIT: i64 = 100_000;

#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace opened at start-up; memory store when unset.
    pub workspace: Option<PathBuf>,
    pub roll_policy: RollPolicy,
    pub bulk_max_rows: usize,
    pub token_ttl: Duration,
    pub seed_demo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            workspace: None,
            roll_policy: RollPolicy::Lenient,
            bulk_max_rows: 5000,
            token_ttl: Duration::hours(48),
            seed_demo: false,
        }
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut cfg = Config::default();

        if let Some(v) = get("EXAMSEATD_WORKSPACE").filter(|v| !v.trim().is_empty()) {
            cfg.workspace = Some(PathBuf::from(v.trim()));
        }
        if let Some(v) = get("EXAMSEATD_ROLL_POLICY") {
            cfg.roll_policy = RollPolicy::parse(&v)
                .ok_or_else(|| anyhow!("EXAMSEATD_ROLL_POLICY must be lenient or strict, got `{}`", v))?;
        }
        if let Some(v) = get("EXAMSEATD_BULK_MAX_ROWS") {
            let n: i64 = v
                .trim()
                .parse()
                .with_context(|| format!("EXAMSEATD_BULK_MAX_ROWS `{}`", v))?;
            if !(1..=BULK_MAX_ROWS_LIMIT).contains(&n) {
                return Err(anyhow!(
                    "EXAMSEATD_BULK_MAX_ROWS must be in 1..={}",
                    BULK_MAX_ROWS_LIMIT
                ));
            }
            cfg.bulk_max_rows = n as usize;
        }
        if let Some(v) = get("EXAMSEATD_TOKEN_TTL_HOURS") {
            let h: i64 = v
                .trim()
                .parse()
                .with_context(|| format!("EXAMSEATD_TOKEN_TTL_HOURS `{}`", v))?;
            if !(1..=24 * 365).contains(&h) {
                return Err(anyhow!("EXAMSEATD_TOKEN_TTL_HOURS must be in 1..=8760"));
            }
            cfg.token_ttl = Duration::hours(h);
        }
        if let Some(v) = get("EXAMSEATD_SEED_DEMO") {
            cfg.seed_demo =
                parse_flag(&v).ok_or_else(|| anyhow!("EXAMSEATD_SEED_DEMO `{}` is not a flag", v))?;
        }

        Ok(cfg)
    }

    pub fn seating_settings(&self) -> Value {
        json!({
            "rollPolicy": self.roll_policy.as_str(),
            "bulkMaxRows": self.bulk_max_rows,
        })
    }

    /// Applies a partial `{rollPolicy?, bulkMaxRows?}` patch. Nothing changes on error.
    pub fn apply_seating_settings(&mut self, patch: &Value) -> Result<(), String> {
        let Some(obj) = patch.as_object() else {
            return Err("settings must be a JSON object".to_string());
        };

        let mut roll_policy = self.roll_policy;
        let mut bulk_max_rows = self.bulk_max_rows;

        if let Some(v) = obj.get("rollPolicy") {
            let s = v.as_str().ok_or("rollPolicy must be string")?;
            roll_policy =
                RollPolicy::parse(s).ok_or("rollPolicy must be one of: lenient, strict")?;
        }
        if let Some(v) = obj.get("bulkMaxRows") {
            let n = v.as_i64().ok_or("bulkMaxRows must be integer")?;
            if !(1..=BULK_MAX_ROWS_LIMIT).contains(&n) {
                return Err(format!("bulkMaxRows must be in 1..={}", BULK_MAX_ROWS_LIMIT));
            }
            bulk_max_rows = n as usize;
        }

        self.roll_policy = roll_policy;
        self.bulk_max_rows = bulk_max_rows;
        Ok(())
    }
}
