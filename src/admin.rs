use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Form, Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::app::{AppState, StatusResponse};
use crate::error::{Error, Result};

/// Name of the cookie carrying the admin session id
pub const SESSION_COOKIE: &str = "admin_session";
const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds

/// The single operator account allowed to upload and delete files
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdminAccount {
    pub username: String,
    /// Argon2 hash of the password
    pub password_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
struct Session {
    expires_at: SystemTime,
}

lazy_static! {
    static ref SESSIONS: RwLock<HashMap<String, Session>> = RwLock::new(HashMap::new());
}

fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| Error::Auth("Password hashing failed".to_string()))
}

impl AdminAccount {
    pub fn new(username: &str, password: &str) -> Result<Self> {
        let username = normalize_username(username);
        if username.is_empty() || password.is_empty() {
            return Err(Error::Auth(
                "Admin username and password cannot be empty".to_string(),
            ));
        }
        Ok(AdminAccount {
            username,
            password_hash: hash_password(password)?,
        })
    }

    /// Username is compared case-insensitively after trimming, the password
    /// against the stored hash.
    pub fn verify(&self, username: &str, password: &str) -> Result<bool> {
        if normalize_username(username) != self.username {
            return Ok(false);
        }
        let parsed_hash = PasswordHash::new(&self.password_hash)
            .map_err(|_| Error::Auth("Invalid password hash format".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

/// Load the admin account, creating it from the seed credentials when the
/// file does not exist yet. Without either, uploads stay disabled.
pub fn init_admin(
    path: &Path,
    seed_username: Option<&str>,
    seed_password: Option<&str>,
) -> Result<Option<AdminAccount>> {
    if path.exists() {
        let data = fs::read_to_string(path)?;
        return Ok(Some(serde_json::from_str(&data)?));
    }

    match (seed_username, seed_password) {
        (Some(username), Some(password)) => {
            let account = AdminAccount::new(username, password)?;
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir)?;
            }
            fs::write(path, serde_json::to_string_pretty(&account)?)?;
            log::info!("created admin account '{}'", account.username);
            Ok(Some(account))
        }
        _ => {
            log::warn!("no admin account configured; uploads and deletes are disabled");
            Ok(None)
        }
    }
}

pub fn create_session() -> String {
    let session_id = Uuid::new_v4().to_string();
    let expires_at = SystemTime::now() + Duration::from_secs(SESSION_DURATION);

    let mut sessions = SESSIONS.write().unwrap_or_else(|p| p.into_inner());
    sessions.retain(|_, s| s.expires_at > SystemTime::now());
    sessions.insert(session_id.clone(), Session { expires_at });

    session_id
}

pub fn validate_session(session_id: &str) -> bool {
    let sessions = SESSIONS.read().unwrap_or_else(|p| p.into_inner());
    sessions
        .get(session_id)
        .is_some_and(|s| s.expires_at > SystemTime::now())
}

pub fn end_session(session_id: &str) {
    let mut sessions = SESSIONS.write().unwrap_or_else(|p| p.into_inner());
    sessions.remove(session_id);
}

/// Handle admin login requests
///
/// On success the session cookie is set; failures answer 401 with a JSON
/// status body.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(credentials): Form<AdminCredentials>,
) -> Response {
    let Some(account) = state.admin.as_ref() else {
        return StatusResponse::error(StatusCode::SERVICE_UNAVAILABLE, "Admin account not configured");
    };

    match account.verify(&credentials.username, &credentials.password) {
        Ok(true) => {
            let mut cookie = Cookie::new(SESSION_COOKIE, create_session());
            cookie.set_http_only(true);
            cookie.set_path("/");
            log::info!("admin login");
            (jar.add(cookie), Json(StatusResponse::ok())).into_response()
        }
        Ok(false) => {
            log::warn!("rejected admin login for '{}'", credentials.username.trim());
            StatusResponse::error(StatusCode::UNAUTHORIZED, "Incorrect username or password.")
        }
        Err(e) => StatusResponse::error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// Handle admin logout
pub async fn handle_logout(jar: CookieJar) -> impl IntoResponse {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        end_session(cookie.value());
    }
    let mut cookie = Cookie::from(SESSION_COOKIE);
    cookie.set_path("/");
    (jar.remove(cookie), Json(StatusResponse::ok()))
}

/// Answer `ok` for a live session; mounted behind [`require_admin`] so the
/// dashboard can restore its admin panel after a reload.
pub async fn handle_session() -> Json<StatusResponse> {
    Json(StatusResponse::ok())
}

/// Authentication middleware for the admin routes
pub async fn require_admin(jar: CookieJar, request: Request, next: Next) -> Response {
    match jar.get(SESSION_COOKIE) {
        Some(cookie) if validate_session(cookie.value()) => next.run(request).await,
        _ => StatusResponse::error(StatusCode::UNAUTHORIZED, "Admin login required"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_only_the_configured_pair() {
        let account = AdminAccount::new(" Operator ", "correct horse").unwrap();
        assert!(account.verify("operator", "correct horse").unwrap());
        assert!(account.verify("  OPERATOR", "correct horse").unwrap());
        assert!(!account.verify("operator", "Correct Horse").unwrap());
        assert!(!account.verify("someone", "correct horse").unwrap());
        assert!(!account.password_hash.contains("correct horse"));
    }

    #[test]
    fn no_builtin_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let account = init_admin(&dir.path().join("admin.json"), None, None).unwrap();
        assert!(account.is_none());
    }

    #[test]
    fn seeded_account_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.json");

        init_admin(&path, Some("root"), Some("pw")).unwrap();
        // second start ignores a different seed and keeps the stored account
        let account = init_admin(&path, Some("other"), Some("x")).unwrap().unwrap();
        assert_eq!(account.username, "root");
        assert!(account.verify("root", "pw").unwrap());
    }

    #[test]
    fn empty_credentials_are_rejected() {
        assert!(AdminAccount::new("", "pw").is_err());
        assert!(AdminAccount::new("root", "").is_err());
    }

    #[test]
    fn sessions_expire_on_logout() {
        let id = create_session();
        assert!(validate_session(&id));
        end_session(&id);
        assert!(!validate_session(&id));
        assert!(!validate_session("made-up"));
    }
}
