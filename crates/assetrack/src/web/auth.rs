//! Login and logout.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;
use tracing::{info, warn};

use super::session::{clear_cookie, session_cookie, session_token, with_cookie};
use super::{render, AppState};
use crate::auth;
use crate::error::{Error, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct LoginForm {
    username: String,
    password: String,
}

pub(crate) async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let cookie_name = &state.config().server.cookie_name;
    if let Some(token) = session_token(&headers, cookie_name) {
        if state.with_db(|db| db.session_user(&token))?.is_some() {
            return Ok(Redirect::to("/assets").into_response());
        }
    }
    Ok(render::login_page(None, &[]).into_response())
}

pub(crate) async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Result<Response> {
    let username = form.username.trim().to_string();
    let account = state.with_db(|db| db.find_user(&username))?;

    let password = form.password;
    let verified = tokio::task::spawn_blocking(move || auth::authenticate(account, &password))
        .await
        .map_err(|e| Error::internal(format!("password check panicked: {e}")))?;

    let user = match verified {
        Ok(user) => user,
        Err(e) => {
            warn!("Failed login for {:?}", username);
            return Ok(render::login_page(Some(&e.to_string()), &[]).into_response());
        }
    };

    let ttl = state.config().session_ttl();
    let token = state.with_db(|db| db.create_session(user.id, ttl))?;
    info!("User {} logged in", user.username);

    let cookie = session_cookie(&state.config().server.cookie_name, &token, ttl.num_seconds())?;
    Ok(with_cookie(Redirect::to("/assets").into_response(), cookie))
}

pub(crate) async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let cookie_name = &state.config().server.cookie_name;
    if let Some(token) = session_token(&headers, cookie_name) {
        state.with_db(|db| db.delete_session(&token))?;
    }
    Ok(with_cookie(
        Redirect::to("/login").into_response(),
        clear_cookie(cookie_name)?,
    ))
}
