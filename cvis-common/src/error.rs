//! Common error types for Companion Vision crates

use thiserror::Error;

/// Common result type for Companion Vision operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the device crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(format!("TOML parse error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_error_is_config_error() {
        let err = toml::from_str::<toml::Table>("queue_capacity = = 5").unwrap_err();
        let err: Error = err.into();
        assert!(matches!(err, Error::Config(ref msg) if msg.starts_with("TOML parse error")));
    }
}
