//! Unified error type.

use crate::config::ConfigError;

/// The error type returned by flagline's fallible startup operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. Flag evaluation
/// failures are [`FlagError`](crate::flags::FlagError)s and are resolved to
/// a disabled decision before they reach a handler. This type surfaces
/// infrastructure failures: bad configuration, binding to a port.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] ConfigError),
}
