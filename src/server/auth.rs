// src/server/auth.rs

//! HTTP Basic authentication in front of every endpoint.

use super::AppState;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::prelude::{BASE64_STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

/// The credentials a request must present.
///
/// Built only when both a username and a password are configured; with
/// either one missing the endpoints stay open.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    username: String,
    password_digest: [u8; 32],
    challenge: HeaderValue,
}

impl BasicAuth {
    pub fn new(username: &str, password: &str, realm: &str) -> Option<Self> {
        if username.is_empty() || password.is_empty() {
            return None;
        }
        let challenge = HeaderValue::from_str(&format!("Basic realm=\"{realm}\""))
            .unwrap_or_else(|_| HeaderValue::from_static("Basic"));
        Some(Self {
            username: username.to_string(),
            password_digest: digest(password),
            challenge,
        })
    }

    /// Checks the `Authorization` header of a request.
    pub fn verify(&self, headers: &HeaderMap) -> bool {
        let Some((user, pass)) = parse_basic(headers) else {
            return false;
        };
        // Digests are compared, never the raw passwords.
        user == self.username && digest(&pass) == self.password_digest
    }

    fn reject(&self) -> Response {
        let mut response = (StatusCode::UNAUTHORIZED, "Unauthorized\n").into_response();
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, self.challenge.clone());
        response
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

fn parse_basic(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = BASE64_STANDARD.decode(token.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Middleware rejecting requests without matching Basic credentials.
pub async fn require_basic_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    match &state.basic_auth {
        Some(auth) if !auth.verify(request.headers()) => {
            debug!("Rejected unauthenticated request to {}", request.uri().path());
            auth.reject()
        }
        _ => next.run(request).await,
    }
}
