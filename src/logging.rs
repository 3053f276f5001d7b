//! Tracing setup.
//!
//! `local` logs human-readable lines at DEBUG, `dev` JSON at DEBUG, `prod` JSON
//! at INFO. `RUST_LOG` overrides the level. With a log dir, a second plain-text
//! layer writes to `<log_dir>/geminigram.log`.

use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::Environment;

pub const LOG_FILE: &str = "geminigram.log";

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to open log file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to install subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

pub fn default_level(env: Environment) -> Level {
    match env {
        Environment::Local | Environment::Dev => Level::DEBUG,
        Environment::Prod => Level::INFO,
    }
}

fn filter(env: Environment) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(default_level(env).into()))
}

/// Install the global subscriber. Keep the returned guard alive until exit or
/// buffered file output is lost.
pub fn init(env: Environment, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>, LoggingError> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    let stdout: BoxedLayer = match env {
        Environment::Local => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .with_filter(filter(env))
            .boxed(),
        Environment::Dev | Environment::Prod => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stdout)
            .with_filter(filter(env))
            .boxed(),
    };
    layers.push(stdout);

    let guard = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(LOG_FILE))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_filter(filter(env))
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry().with(layers).try_init()?;
    Ok(guard)
}
