//! HTTP front end.
//!
//! Server-rendered HTML pages over axum. Handlers take the storage lock only
//! for synchronous database work and release it before any `.await`.

mod assets;
mod auth;
mod documents;
mod import;
mod records;
mod render;
mod session;

#[cfg(test)]
mod tests;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use regex::Regex;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::auth::Flash;
use crate::config::Config;
use crate::document::BlobStore;
use crate::error::{Error, Result};
use crate::logging;
use crate::storage::Storage;

pub use session::CurrentUser;

/// How often expired sessions are purged while serving.
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Room for multipart framing on top of the upload limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    storage: Arc<Mutex<Storage>>,
    blobs: Arc<dyn BlobStore>,
    config: Arc<Config>,
    code_re: Arc<Regex>,
    uploads: Arc<tokio::sync::Mutex<()>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("blobs", &self.blobs)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Bundle the storage, document store and configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured asset code pattern is invalid.
    pub fn new(storage: Storage, blobs: Arc<dyn BlobStore>, config: Config) -> Result<Self> {
        let code_re = config.code_regex()?;
        Ok(Self {
            storage: Arc::new(Mutex::new(storage)),
            blobs,
            config: Arc::new(config),
            code_re: Arc::new(code_re),
            uploads: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Run `f` with the storage locked.
    pub(crate) fn with_db<T>(&self, f: impl FnOnce(&Storage) -> Result<T>) -> Result<T> {
        let storage = self
            .storage
            .lock()
            .map_err(|_| Error::internal("storage lock poisoned"))?;
        f(&storage)
    }

    /// Queue a flash message for the session.
    pub(crate) fn flash(&self, token: &str, flash: Flash) -> Result<()> {
        self.with_db(|db| db.push_flash(token, flash))
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn code_re(&self) -> &Regex {
        &self.code_re
    }

    pub(crate) fn blobs(&self) -> &dyn BlobStore {
        self.blobs.as_ref()
    }

    /// Serializes document uploads from file write to database record.
    pub(crate) async fn lock_uploads(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.uploads.lock().await
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state
        .config
        .max_upload_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/", get(auth::login_page).post(auth::login))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/healthz", get(healthz))
        .route("/assets", get(assets::list))
        .route("/assets/add", get(assets::add_page).post(assets::add))
        .route("/assets/edit/{id}", get(assets::edit_page).post(assets::edit))
        .route("/assets/import", get(import::page).post(import::upload))
        .route("/assets/import/confirm", post(import::confirm))
        .route("/assets/import/template", get(import::template))
        .route("/assets/{id}", get(assets::detail))
        .route("/assets/{id}/scrap", post(records::scrap))
        .route("/assets/{id}/amc", post(records::add_amc))
        .route("/assets/{id}/calibrations", post(records::add_calibration))
        .route("/assets/{id}/events", post(records::add_event))
        .route("/assets/{id}/documents", post(documents::upload))
        .route("/documents/{id}/download", get(documents::download))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::extract::Request| logging::request_span(request)),
        )
        .with_state(state)
}

/// Serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve(state: AppState, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    let purge_state = state.clone();
    let purger = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = purge_state.with_db(Storage::purge_expired_sessions) {
                warn!("Session purge failed: {}", e);
            }
        }
    });

    let result = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;
    purger.abort();
    result?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

async fn healthz() -> &'static str {
    "ok"
}

async fn not_found() -> Response {
    Error::NotFound {
        entity: "page",
        id: 0,
    }
    .into_response()
}

/// Turn the outcome of a form post into a flash message and a redirect.
///
/// Rule violations and bad input are shown to the user; anything else
/// propagates as an error response.
pub(crate) fn flash_outcome<T>(
    state: &AppState,
    token: &str,
    outcome: Result<T>,
    success: impl FnOnce(T) -> String,
    to: &str,
) -> Result<Response> {
    let flash = match outcome {
        Ok(value) => Flash::success(success(value)),
        Err(e) if e.is_user_facing() => Flash::danger(e.to_string()),
        Err(e) => return Err(e),
    };
    state.flash(token, flash)?;
    Ok(Redirect::to(to).into_response())
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, "Not found".to_string()),
            Self::Unauthenticated => return Redirect::to("/login").into_response(),
            Self::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            e if e.is_user_facing() => (StatusCode::BAD_REQUEST, e.to_string()),
            e => {
                error!("Request failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong. The error has been logged.".to_string(),
                )
            }
        };
        (status, render::error_page(status, &message)).into_response()
    }
}
