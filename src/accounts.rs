use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand::{thread_rng, Rng};
use rand_core::OsRng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{SeatingError, SeatingResult};
use crate::model::{Branch, Role, User};
use crate::repo::now_rfc3339;
use crate::store::UserStore;

const MIN_PASSWORD_LEN: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub name: String,
    pub roll_no: Option<String>,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token: String,
    pub user: User,
    pub expires_at: String,
}

struct TokenEntry {
    user_id: String,
    expires_at: DateTime<Utc>,
}

/// User accounts plus the in-memory table of issued tokens.
pub struct Accounts {
    users: Arc<dyn UserStore>,
    tokens: Mutex<HashMap<String, TokenEntry>>,
    token_ttl: Duration,
}

fn required(field: &'static str, value: &str) -> SeatingResult<String> {
    let t = value.trim();
    if t.is_empty() {
        return Err(SeatingError::validation(
            field,
            format!("{} is required", field),
        ));
    }
    Ok(t.to_string())
}

fn hash_password(password: &str) -> SeatingResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Pbkdf2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| SeatingError::Internal {
            message: format!("password hashing failed: {}", e),
        })
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(hash) => Pbkdf2.verify_password(password.as_bytes(), &hash).is_ok(),
        Err(_) => false,
    }
}

fn new_token() -> String {
    let bytes: [u8; 32] = thread_rng().gen();
    let mut hasher: Sha256 = Digest::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

impl Accounts {
    pub fn new(users: Arc<dyn UserStore>, token_ttl: Duration) -> Self {
        Self {
            users,
            tokens: Mutex::new(HashMap::new()),
            token_ttl,
        }
    }

    fn tokens(&self) -> MutexGuard<'_, HashMap<String, TokenEntry>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn issue(&self, user: User) -> AuthSession {
        let token = new_token();
        let expires_at = Utc::now() + self.token_ttl;
        self.tokens().insert(
            token.clone(),
            TokenEntry {
                user_id: user.id.clone(),
                expires_at,
            },
        );
        AuthSession {
            token,
            user,
            expires_at: expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    pub fn signup(&self, role: Role, req: SignupRequest) -> SeatingResult<AuthSession> {
        let username = required("username", &req.username)?;
        let name = required("name", &req.name)?;
        if req.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(SeatingError::validation(
                "password",
                format!("password must be at least {} characters", MIN_PASSWORD_LEN),
            ));
        }

        let (roll_no, branch) = match role {
            Role::Faculty => (None, None),
            Role::Student => {
                let roll_no = required("rollNo", req.roll_no.as_deref().unwrap_or(""))?;
                let raw = req.branch.as_deref().unwrap_or("");
                let branch = Branch::parse(raw).ok_or_else(|| {
                    SeatingError::validation("branch", format!("unknown branch `{}`", raw))
                })?;
                (Some(roll_no), Some(branch))
            }
        };

        let user = User {
            id: Uuid::new_v4().to_string(),
            username,
            password_hash: hash_password(&req.password)?,
            role,
            name,
            roll_no,
            branch,
            created_at: now_rfc3339(),
        };
        self.users.insert_user(user.clone())?;
        info!(user_id = %user.id, %role, "account created");
        Ok(self.issue(user))
    }

    pub fn login(&self, role: Role, username: &str, password: &str) -> SeatingResult<AuthSession> {
        let user = self.users.user_by_username(username.trim(), role)?;
        let Some(user) = user.filter(|u| verify_password(password, &u.password_hash)) else {
            warn!(%role, "login rejected");
            return Err(SeatingError::InvalidCredentials);
        };
        Ok(self.issue(user))
    }

    /// Resolves a token to its user, dropping it if expired.
    pub fn authenticate(&self, token: Option<&str>) -> SeatingResult<User> {
        let token = token.map(str::trim).filter(|t| !t.is_empty());
        let Some(token) = token else {
            return Err(SeatingError::Unauthorized);
        };

        let user_id = {
            let mut tokens = self.tokens();
            match tokens.get(token) {
                Some(entry) if entry.expires_at > Utc::now() => entry.user_id.clone(),
                Some(_) => {
                    tokens.remove(token);
                    return Err(SeatingError::Unauthorized);
                }
                None => return Err(SeatingError::Unauthorized),
            }
        };

        self.users
            .user_by_id(&user_id)?
            .ok_or(SeatingError::UserNotFound)
    }

    pub fn require_role(&self, token: Option<&str>, role: Role) -> SeatingResult<User> {
        let user = self.authenticate(token)?;
        if user.role != role {
            return Err(SeatingError::Forbidden { required: role });
        }
        Ok(user)
    }

    pub fn logout(&self, token: &str) -> bool {
        self.tokens().remove(token.trim()).is_some()
    }
}
