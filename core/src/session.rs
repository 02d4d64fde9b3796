//! Session token storage.
//!
//! # Design
//! A signed-in session keeps the same bearer token in two slots: the token
//! slot read by the request core on every call, and a cookie that
//! server-rendered request gating reads. Both slots live behind one
//! `SessionStore` so they are written together. `MemorySessionStore` serves
//! tests and short-lived processes; `FileSessionStore` keeps the session
//! across runs of the CLI.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

/// Key of the token slot and name of the session cookie.
pub const TOKEN_KEY: &str = "auth_token";

/// Seven days.
pub const COOKIE_MAX_AGE_SECS: u64 = 604_800;

/// Where a session token is kept between requests.
pub trait SessionStore: Send + Sync {
    /// The token from the token slot. The cookie is never consulted here.
    fn token(&self) -> Result<Option<String>>;

    fn cookie(&self) -> Result<Option<SessionCookie>>;

    /// Write `token` into both slots.
    fn store_token(&self, token: &str) -> Result<()>;

    /// Empty both slots.
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Cookie mirror of the session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub max_age: u64,
    pub same_site: SameSite,
}

impl SessionCookie {
    /// Cookie written on sign-in: `Path=/`, seven day max age, lax same-site.
    pub fn for_token(token: &str) -> Self {
        Self {
            name: TOKEN_KEY.to_string(),
            value: token.to_string(),
            path: "/".to_string(),
            max_age: COOKIE_MAX_AGE_SECS,
            same_site: SameSite::Lax,
        }
    }

    /// Cookie that makes a user agent drop the session cookie immediately.
    pub fn expired() -> Self {
        Self {
            value: String::new(),
            max_age: 0,
            ..Self::for_token("")
        }
    }

    pub fn is_expired(&self) -> bool {
        self.max_age == 0
    }
}

impl fmt::Display for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; Path={}; Max-Age={}; SameSite={}",
            self.name,
            self.value,
            self.path,
            self.max_age,
            self.same_site.as_str()
        )
    }
}

impl FromStr for SessionCookie {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(';').map(str::trim);
        let (name, value) = parts
            .next()
            .and_then(|pair| pair.split_once('='))
            .ok_or_else(|| ApiError::Session(format!("malformed cookie: {s:?}")))?;

        let mut cookie = SessionCookie {
            name: name.to_string(),
            value: value.to_string(),
            path: "/".to_string(),
            max_age: 0,
            same_site: SameSite::Lax,
        };
        for attr in parts {
            let (key, val) = attr.split_once('=').unwrap_or((attr, ""));
            match key.to_ascii_lowercase().as_str() {
                "path" => cookie.path = val.to_string(),
                "max-age" => {
                    cookie.max_age = val
                        .parse()
                        .map_err(|_| ApiError::Session(format!("bad Max-Age: {val:?}")))?
                }
                "samesite" => {
                    cookie.same_site = match val.to_ascii_lowercase().as_str() {
                        "strict" => SameSite::Strict,
                        "none" => SameSite::None,
                        _ => SameSite::Lax,
                    }
                }
                _ => {}
            }
        }
        Ok(cookie)
    }
}

#[derive(Debug, Default)]
struct Slots {
    token: Option<String>,
    cookie: Option<SessionCookie>,
}

/// In-process store. Both slots sit under one lock.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slots: RwLock<Slots>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that starts out authenticated with `token`.
    pub fn with_token(token: &str) -> Self {
        Self {
            slots: RwLock::new(Slots {
                token: Some(token.to_string()),
                cookie: Some(SessionCookie::for_token(token)),
            }),
        }
    }
}

fn poisoned<T>(_: T) -> ApiError {
    ApiError::Session("session lock poisoned".to_string())
}

impl SessionStore for MemorySessionStore {
    fn token(&self) -> Result<Option<String>> {
        Ok(self.slots.read().map_err(poisoned)?.token.clone())
    }

    fn cookie(&self) -> Result<Option<SessionCookie>> {
        Ok(self.slots.read().map_err(poisoned)?.cookie.clone())
    }

    fn store_token(&self, token: &str) -> Result<()> {
        let mut slots = self.slots.write().map_err(poisoned)?;
        slots.token = Some(token.to_string());
        slots.cookie = Some(SessionCookie::for_token(token));
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slots = self.slots.write().map_err(poisoned)?;
        slots.token = None;
        slots.cookie = None;
        Ok(())
    }
}

/// On-disk layout of a `FileSessionStore`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cookie: Option<String>,
}

/// Store persisted as a small JSON file. A missing file means anonymous.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<SessionFile> {
        if !self.path.exists() {
            return Ok(SessionFile::default());
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| ApiError::Session(format!("{}: {e}", self.path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| ApiError::Session(format!("{}: {e}", self.path.display())))
    }

    // The file holds a bearer token: owner-only on unix.
    fn save(&self, file: &SessionFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| ApiError::Session(format!("{}: {e}", parent.display())))?;

                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                        .map_err(|e| ApiError::Session(format!("{}: {e}", parent.display())))?;
                }
            }
        }
        let raw = serde_json::to_string_pretty(file)
            .map_err(|e| ApiError::Serialization(e.to_string()))?;
        fs::write(&self.path, raw)
            .map_err(|e| ApiError::Session(format!("{}: {e}", self.path.display())))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                .map_err(|e| ApiError::Session(format!("{}: {e}", self.path.display())))?;
        }

        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn token(&self) -> Result<Option<String>> {
        Ok(self.load()?.token)
    }

    fn cookie(&self) -> Result<Option<SessionCookie>> {
        self.load()?
            .cookie
            .as_deref()
            .map(str::parse::<SessionCookie>)
            .transpose()
    }

    fn store_token(&self, token: &str) -> Result<()> {
        self.save(&SessionFile {
            token: Some(token.to_string()),
            cookie: Some(SessionCookie::for_token(token).to_string()),
        })
    }

    fn clear(&self) -> Result<()> {
        self.save(&SessionFile::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_renders_with_lax_seven_day_policy() {
        let cookie = SessionCookie::for_token("abc");
        assert_eq!(
            cookie.to_string(),
            "auth_token=abc; Path=/; Max-Age=604800; SameSite=Lax"
        );
        assert!(!cookie.is_expired());
    }

    #[test]
    fn cookie_parses_its_own_rendering() {
        let cookie = SessionCookie::for_token("abc.def.ghi");
        let parsed: SessionCookie = cookie.to_string().parse().unwrap();
        assert_eq!(parsed, cookie);
    }

    #[test]
    fn expired_cookie_has_zero_max_age() {
        let cookie = SessionCookie::expired();
        assert!(cookie.is_expired());
        assert_eq!(
            cookie.to_string(),
            "auth_token=; Path=/; Max-Age=0; SameSite=Lax"
        );
    }

    #[test]
    fn malformed_cookie_is_rejected() {
        let err = "no-equals-sign".parse::<SessionCookie>().unwrap_err();
        assert!(matches!(err, ApiError::Session(_)));
    }

    #[test]
    fn memory_store_writes_and_clears_both_slots() {
        let store = MemorySessionStore::new();
        assert_eq!(store.token().unwrap(), None);

        store.store_token("tok").unwrap();
        assert_eq!(store.token().unwrap().as_deref(), Some("tok"));
        assert_eq!(store.cookie().unwrap().unwrap().value, "tok");

        store.clear().unwrap();
        assert_eq!(store.token().unwrap(), None);
        assert_eq!(store.cookie().unwrap(), None);
    }

    #[test]
    fn file_store_missing_file_is_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("session.json"));
        assert_eq!(store.token().unwrap(), None);
        assert_eq!(store.cookie().unwrap(), None);
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        FileSessionStore::new(&path).store_token("persisted").unwrap();

        let reopened = FileSessionStore::new(&path);
        assert_eq!(reopened.token().unwrap().as_deref(), Some("persisted"));
        let cookie = reopened.cookie().unwrap().unwrap();
        assert_eq!(cookie, SessionCookie::for_token("persisted"));

        reopened.clear().unwrap();
        assert_eq!(FileSessionStore::new(&path).token().unwrap(), None);
    }

    #[test]
    fn file_store_reports_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();
        let err = FileSessionStore::new(&path).token().unwrap_err();
        assert!(matches!(err, ApiError::Session(_)));
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("private").join("session.json");
        FileSessionStore::new(&path).store_token("secret-token").unwrap();

        let file_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }
}
