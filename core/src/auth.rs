//! Sign-in, sign-up, sign-out and the local session check.
//!
//! # Design
//! The session has two states. A successful sign-in or sign-up moves it to
//! authenticated by writing the returned token into the session store (both
//! slots); sign-out moves it back by clearing the store, without a server
//! call. There is no refresh: an expired token only shows up as a 401 on a
//! later request.
//!
//! `check_session` never touches the network. When the stored token is a
//! JWT its payload claims supply the user identity; the signature is not
//! verified. Opaque tokens get a placeholder identity.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use tracing::info;

use crate::error::{ApiError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::request::{check_status, decode_body, RequestCore};
use crate::session::SessionCookie;
use crate::types::{AuthResponse, Credentials, SessionState, SessionUser};

pub const SIGN_IN_PATH: &str = "/api/v1/auth/signin";
pub const SIGN_UP_PATH: &str = "/api/v1/auth/signup";

pub const PLACEHOLDER_USER_ID: &str = "current-user-id";
pub const PLACEHOLDER_EMAIL: &str = "current@example.com";

#[derive(Debug, Clone)]
pub struct AuthClient {
    core: RequestCore,
}

impl AuthClient {
    pub fn new(core: RequestCore) -> Self {
        Self { core }
    }

    pub fn build_sign_in(&self, credentials: &Credentials) -> Result<HttpRequest> {
        self.build_credentials_post(SIGN_IN_PATH, credentials)
    }

    pub fn build_sign_up(&self, credentials: &Credentials) -> Result<HttpRequest> {
        self.build_credentials_post(SIGN_UP_PATH, credentials)
    }

    // Credentials are the authentication here; a stale bearer token must not
    // ride along.
    fn build_credentials_post(
        &self,
        endpoint: &str,
        credentials: &Credentials,
    ) -> Result<HttpRequest> {
        let mut request = self
            .core
            .build_json(HttpMethod::Post, endpoint, credentials)?;
        request.remove_header("authorization");
        Ok(request)
    }

    /// Parse a sign-in response and persist the token on success.
    pub fn parse_sign_in(&self, response: HttpResponse) -> Result<AuthResponse> {
        self.complete(response, "Failed to sign in")
    }

    /// Parse a sign-up response and persist the token on success.
    pub fn parse_sign_up(&self, response: HttpResponse) -> Result<AuthResponse> {
        self.complete(response, "Failed to sign up")
    }

    fn complete(&self, response: HttpResponse, fallback: &str) -> Result<AuthResponse> {
        check_status(&response, fallback)?;
        let auth: AuthResponse = decode_body(&response)?;
        if auth.access_token.is_empty() {
            return Err(ApiError::Deserialization(
                "auth response carried an empty access_token".to_string(),
            ));
        }
        self.core.session().store_token(&auth.access_token)?;
        info!("session authenticated");
        Ok(auth)
    }

    /// Drop the local session. The server is not contacted.
    ///
    /// Returns the expired cookie, for callers that relay `Set-Cookie` to a
    /// user agent holding a copy of the session cookie.
    pub fn sign_out(&self) -> Result<SessionCookie> {
        self.core.session().clear()?;
        info!("session cleared");
        Ok(SessionCookie::expired())
    }

    /// Report whether a token is stored, reading the token slot only.
    pub fn check_session(&self) -> Result<SessionState> {
        let token = match self.core.session().token()? {
            Some(token) if !token.is_empty() => token,
            _ => return Ok(SessionState::anonymous()),
        };
        let user = user_from_token(&token).unwrap_or_else(|| SessionUser {
            id: PLACEHOLDER_USER_ID.to_string(),
            email: Some(PLACEHOLDER_EMAIL.to_string()),
        });
        Ok(SessionState {
            is_authenticated: true,
            user: Some(user),
        })
    }
}

/// Read `sub` (or `user_id`) and `email` from an unverified JWT payload.
///
/// A payload with an email but no id claim keeps the email and gets the
/// placeholder id. `None` when neither claim is usable.
fn user_from_token(token: &str) -> Option<SessionUser> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;

    let id = ["sub", "user_id"]
        .iter()
        .filter_map(|key| claims.get(*key))
        .find_map(|value| match value {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
    let email = claims
        .get("email")
        .and_then(|e| e.as_str())
        .filter(|e| !e.is_empty())
        .map(str::to_string);

    match (id, email) {
        (None, None) => None,
        (id, email) => Some(SessionUser {
            id: id.unwrap_or_else(|| PLACEHOLDER_USER_ID.to_string()),
            email,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::session::{MemorySessionStore, SessionStore};

    fn client_with(store: Arc<MemorySessionStore>) -> AuthClient {
        AuthClient::new(RequestCore::new("http://localhost:8000", store))
    }

    fn jwt(claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.signature")
    }

    #[test]
    fn build_sign_in_posts_credentials() {
        let auth = client_with(Arc::new(MemorySessionStore::new()));
        let req = auth
            .build_sign_in(&Credentials::new("a@example.com", "pw"))
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:8000/api/v1/auth/signin");
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"email": "a@example.com", "password": "pw"}));
    }

    #[test]
    fn build_sign_up_omits_stale_bearer() {
        let auth = client_with(Arc::new(MemorySessionStore::with_token("old")));
        let req = auth
            .build_sign_up(&Credentials::new("a@example.com", "pw"))
            .unwrap();
        assert_eq!(req.url, "http://localhost:8000/api/v1/auth/signup");
        assert_eq!(req.header("authorization"), None);
        assert_eq!(req.header("content-type"), Some("application/json"));
    }

    #[test]
    fn sign_in_success_stores_token_in_both_slots() {
        let store = Arc::new(MemorySessionStore::new());
        let auth = client_with(store.clone());

        let resp = auth
            .parse_sign_in(HttpResponse::new(
                200,
                r#"{"access_token":"tok-1","token_type":"bearer"}"#,
            ))
            .unwrap();

        assert_eq!(resp.access_token, "tok-1");
        assert_eq!(store.token().unwrap().as_deref(), Some("tok-1"));
        assert_eq!(store.cookie().unwrap(), Some(SessionCookie::for_token("tok-1")));
    }

    #[test]
    fn sign_in_failure_uses_server_detail() {
        let store = Arc::new(MemorySessionStore::new());
        let auth = client_with(store.clone());

        let err = auth
            .parse_sign_in(HttpResponse::new(
                401,
                r#"{"detail":"Invalid email or password","error_code":"INVALID_CREDENTIALS"}"#,
            ))
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(err.to_string(), "HTTP 401: Invalid email or password");
        assert_eq!(store.token().unwrap(), None);
    }

    #[test]
    fn sign_up_failure_falls_back_to_generic_message() {
        let auth = client_with(Arc::new(MemorySessionStore::new()));
        let err = auth
            .parse_sign_up(HttpResponse::new(500, "Internal Server Error"))
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500: Failed to sign up");
    }

    #[test]
    fn empty_access_token_is_rejected() {
        let store = Arc::new(MemorySessionStore::new());
        let auth = client_with(store.clone());
        let err = auth
            .parse_sign_in(HttpResponse::new(200, r#"{"access_token":""}"#))
            .unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
        assert_eq!(store.token().unwrap(), None);
    }

    #[test]
    fn sign_out_clears_both_slots() {
        let store = Arc::new(MemorySessionStore::with_token("tok"));
        let auth = client_with(store.clone());

        let removal = auth.sign_out().unwrap();

        assert!(removal.is_expired());
        assert_eq!(store.token().unwrap(), None);
        assert_eq!(store.cookie().unwrap(), None);
        assert_eq!(auth.check_session().unwrap(), SessionState::anonymous());
    }

    #[test]
    fn check_session_without_token_is_anonymous() {
        let auth = client_with(Arc::new(MemorySessionStore::new()));
        let state = auth.check_session().unwrap();
        assert!(!state.is_authenticated);
        assert!(state.user.is_none());
    }

    #[test]
    fn check_session_reads_jwt_claims() {
        let token = jwt(serde_json::json!({"sub": "user-7", "email": "seven@example.com"}));
        let auth = client_with(Arc::new(MemorySessionStore::with_token(&token)));

        let state = auth.check_session().unwrap();
        assert!(state.is_authenticated);
        assert_eq!(
            state.user,
            Some(SessionUser {
                id: "user-7".to_string(),
                email: Some("seven@example.com".to_string()),
            })
        );
    }

    #[test]
    fn check_session_accepts_numeric_user_id_claim() {
        let token = jwt(serde_json::json!({"user_id": 42}));
        let auth = client_with(Arc::new(MemorySessionStore::with_token(&token)));

        let user = auth.check_session().unwrap().user.unwrap();
        assert_eq!(user.id, "42");
        assert_eq!(user.email, None);
    }

    #[test]
    fn check_session_keeps_email_without_id_claim() {
        let token = jwt(serde_json::json!({"email": "anon-id@example.com"}));
        let auth = client_with(Arc::new(MemorySessionStore::with_token(&token)));

        let user = auth.check_session().unwrap().user.unwrap();
        assert_eq!(user.id, PLACEHOLDER_USER_ID);
        assert_eq!(user.email.as_deref(), Some("anon-id@example.com"));
    }

    #[test]
    fn check_session_opaque_token_gets_placeholder() {
        let auth = client_with(Arc::new(MemorySessionStore::with_token("opaque-token")));
        let user = auth.check_session().unwrap().user.unwrap();
        assert_eq!(user.id, PLACEHOLDER_USER_ID);
        assert_eq!(user.email.as_deref(), Some(PLACEHOLDER_EMAIL));
    }
}
