// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Tracing setup for covariance runs.
//!
//! The contractor opens a `thcovmat` span per assembly and emits one `debug`
//! event per contracted block, so `RUST_LOG=thcov_core=debug` shows the block
//! schedule and `THCOV_TRACE_CHROME` turns it into a timeline.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use ::tracing::Subscriber;
use tracing_chrome::{ChromeLayerBuilder, FlushGuard};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

static INITIALISED: OnceLock<()> = OnceLock::new();
static CHROME_GUARD: Mutex<Option<FlushGuard>> = Mutex::new(None);

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Names the file a chrome trace is written to.
pub const CHROME_TRACE_ENV: &str = "THCOV_TRACE_CHROME";

/// What the subscriber records and where.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TracingConfig {
    /// `EnvFilter` directives, e.g. `thcov_core=debug`.
    pub filter: String,
    pub chrome_trace: Option<PathBuf>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            chrome_trace: None,
        }
    }
}

impl TracingConfig {
    /// Reads `RUST_LOG` and `THCOV_TRACE_CHROME`.
    pub fn from_env() -> Result<Self, InitError> {
        let filter = std::env::var(EnvFilter::DEFAULT_ENV)
            .ok()
            .filter(|raw| !raw.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        Ok(Self {
            filter,
            chrome_trace: chrome_trace_path()?,
        })
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }

    /// Plain-text subscriber writing to `writer`, for scoped use with
    /// `tracing::subscriber::with_default`. The chrome trace is not attached.
    pub fn subscriber<W>(&self, writer: W) -> impl Subscriber + Send + Sync
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        Registry::default().with(self.env_filter()).with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(writer),
        )
    }
}

/// Installs the global subscriber configured from the environment.
pub fn init_tracing() -> Result<(), InitError> {
    install(TracingConfig::from_env()?)
}

/// Installs `config` as the global subscriber. Only the first call succeeds.
pub fn install(config: TracingConfig) -> Result<(), InitError> {
    INITIALISED
        .set(())
        .map_err(|_| InitError::AlreadyInitialised)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(io::stdout().is_terminal());
    let chrome_layer = config.chrome_trace.as_ref().map(|path| {
        let (layer, guard) = ChromeLayerBuilder::new()
            .file(path)
            .include_args(true)
            .build();
        if let Ok(mut slot) = CHROME_GUARD.lock() {
            *slot = Some(guard);
        }
        layer
    });

    Registry::default()
        .with(config.env_filter())
        .with(fmt_layer)
        .with(chrome_layer)
        .try_init()?;
    Ok(())
}

fn chrome_trace_path() -> Result<Option<PathBuf>, InitError> {
    match std::env::var(CHROME_TRACE_ENV) {
        Ok(raw) if !raw.trim().is_empty() => Ok(Some(PathBuf::from(raw))),
        Ok(_) => Ok(None),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(InitError::Env(err)),
    }
}

/// Errors emitted when configuring the tracing subscriber.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("tracing has already been initialised")]
    AlreadyInitialised,
    #[error("failed to read THCOV_TRACE_CHROME: {0}")]
    Env(std::env::VarError),
    #[error("failed to install the subscriber: {0}")]
    Install(#[from] TryInitError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Buffer {
        type Writer = Buffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn scoped_subscriber_honours_filter() {
        let buffer = Buffer::default();
        let config = TracingConfig::default().with_filter("thcov=debug");
        ::tracing::subscriber::with_default(config.subscriber(buffer.clone()), || {
            ::tracing::debug!(target: "thcov", block = 3, "kept");
            ::tracing::trace!(target: "thcov", "dropped");
        });
        let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("kept"));
        assert!(text.contains("block=3"));
        assert!(!text.contains("dropped"));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_trace_path_does_not_claim_the_subscriber() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        std::env::set_var(CHROME_TRACE_ENV, OsStr::from_bytes(&[0x66, 0xff, 0x6f]));
        let first = init_tracing();
        let retry = init_tracing();
        std::env::remove_var(CHROME_TRACE_ENV);
        assert!(matches!(first, Err(InitError::Env(_))));
        assert!(matches!(retry, Err(InitError::Env(_))));
    }

    #[test]
    fn second_initialisation_is_rejected() {
        let _ = install(TracingConfig::default());
        assert!(matches!(
            install(TracingConfig::default()),
            Err(InitError::AlreadyInitialised)
        ));
    }
}
