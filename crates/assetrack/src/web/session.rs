//! Session cookie handling and the logged-in user extractor.

use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};
use tracing::debug;

use super::AppState;
use crate::auth::{Flash, User};
use crate::error::{Error, Result};

/// The user behind the request's session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// The signed-in account.
    pub user: User,
    /// Session token, used for flashes and pending imports.
    pub token: String,
}

impl CurrentUser {
    /// Fail with [`Error::Forbidden`] unless the user is an administrator.
    pub(crate) fn ensure_admin(&self) -> Result<()> {
        if self.user.role.is_admin() {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }

    /// Username recorded on events and uploads.
    pub(crate) fn name(&self) -> Option<&str> {
        Some(self.user.username.as_str())
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers, &state.config().server.cookie_name)
        else {
            return Err(Redirect::to("/login").into_response());
        };

        match state.with_db(|db| db.session_user(&token)) {
            Ok(Some(user)) => {
                crate::logging::record_user(&user.username);
                Ok(Self { user, token })
            }
            Ok(None) => {
                debug!("Rejected unknown or expired session");
                Err(Redirect::to("/login").into_response())
            }
            Err(e) => Err(e.into_response()),
        }
    }
}

/// Find the session token in the request's cookies.
pub(crate) fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, token)| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// `Set-Cookie` header establishing a session.
pub(crate) fn session_cookie(cookie_name: &str, token: &str, max_age_secs: i64) -> Result<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{cookie_name}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}"
    ))
    .map_err(|e| Error::internal(format!("invalid session cookie: {e}")))
}

/// `Set-Cookie` header clearing the session.
pub(crate) fn clear_cookie(cookie_name: &str) -> Result<HeaderValue> {
    session_cookie(cookie_name, "", 0)
}

/// Attach a `Set-Cookie` header to a response.
pub(crate) fn with_cookie(mut response: Response, cookie: HeaderValue) -> Response {
    response.headers_mut().append(SET_COOKIE, cookie);
    response
}

/// Flash "Access denied" and send non-administrators back to the list.
pub(crate) fn deny(state: &AppState, current: &CurrentUser) -> Result<Response> {
    state.flash(&current.token, Flash::danger(Error::Forbidden.to_string()))?;
    Ok(Redirect::to("/assets").into_response())
}
