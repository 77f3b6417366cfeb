//! Tracing setup.
//!
//! Output goes to stderr. `RUST_LOG` replaces the filter derived from the
//! command-line flags. Each HTTP request gets a span carrying its method,
//! path and, once the session is resolved, the account name.

use axum::http::Request;
use tracing::{Level, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Targets whose events are shown by default.
const TARGETS: [&str; 2] = ["assetrack", "tower_http"];

/// How much to log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Info and above.
    #[default]
    Normal,
    /// Debug and above.
    Verbose,
    /// Everything, with thread ids.
    Trace,
}

impl Verbosity {
    /// Map the `-q` flag and the `-v` count to a level. `-q` wins.
    #[must_use]
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::Trace,
        }
    }

    /// Most detailed level that is emitted.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter directives used when `RUST_LOG` is unset.
    #[must_use]
    pub fn default_filter(&self) -> String {
        let level = self.to_level_filter();
        TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Install the global subscriber. Later calls are no-ops.
///
/// ```no_run
/// use assetrack::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::from_flags(1, false));
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.default_filter()));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(verbosity == Verbosity::Trace)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init();
}

/// Span wrapping one HTTP request. `user` is filled in by [`record_user`].
pub fn request_span<B>(request: &Request<B>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        user = tracing::field::Empty,
    )
}

/// Attach the signed-in account to the current request span.
pub fn record_user(username: &str) {
    Span::current().record("user", username);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(0, false), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(1, false), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(5, false), Verbosity::Trace);
        assert_eq!(Verbosity::from_flags(2, true), Verbosity::Quiet);
    }

    #[test]
    fn test_verbosity_to_level() {
        assert_eq!(Verbosity::Quiet.to_level_filter(), Level::ERROR);
        assert_eq!(Verbosity::Normal.to_level_filter(), Level::INFO);
        assert_eq!(Verbosity::Verbose.to_level_filter(), Level::DEBUG);
        assert_eq!(Verbosity::Trace.to_level_filter(), Level::TRACE);
    }

    #[test]
    fn test_default_filter_covers_http_spans() {
        assert_eq!(
            Verbosity::Verbose.default_filter(),
            "assetrack=DEBUG,tower_http=DEBUG"
        );
        assert_eq!(Verbosity::Quiet.default_filter(), "assetrack=ERROR,tower_http=ERROR");
    }

    #[test]
    fn test_request_span_outside_subscriber() {
        let request = Request::get("/assets/7").body(()).unwrap();
        let span = request_span(&request);
        let _entered = span.enter();
        record_user("ravi");
    }

    #[test]
    fn test_init_logging_is_repeatable() {
        init_logging(Verbosity::Quiet);
        init_logging(Verbosity::Trace);
    }
}
