use std::path::PathBuf;
use thiserror::Error;

/// A telemetry read that does not match its schema. The cycle is skipped
/// and the previous snapshot stays in place.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("short read: expected {expected} values, got {got}")]
    ShortRead { expected: usize, got: usize },

    #[error("value {index} has the wrong type, expected {expected}")]
    TypeMismatch { index: usize, expected: &'static str },

    #[error("raw value {raw:#06x} is not valid BCD")]
    InvalidBcd { raw: u64 },

    #[error("payload of {got} bytes does not fit a {expected} byte schema")]
    PayloadSize { expected: usize, got: usize },
}

/// The telemetry source cannot be reached or stopped answering.
#[derive(Debug, Error)]
pub enum ConnectivityError {
    #[error("telemetry bridge unavailable: {0}")]
    Unavailable(#[from] std::io::Error),

    #[error("telemetry bridge protocol error: {0}")]
    Protocol(String),

    #[error("telemetry source is not open")]
    NotOpen,
}

/// Failure while reading one snapshot. Never fatal for the polling loop.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("telemetry read worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    Connection,
    Http,
    Other,
}

/// One Geo Service lookup failed.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("geonames connection failed: {0}")]
    Connection(String),

    #[error("geonames request timed out")]
    Timeout,

    #[error("geonames answered HTTP {status}")]
    Http { status: u16 },

    #[error("geonames error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("geonames response could not be read: {0}")]
    Body(String),
}

impl ServiceError {
    pub fn kind(&self) -> ServiceErrorKind {
        match self {
            ServiceError::Connection(_) | ServiceError::Timeout => ServiceErrorKind::Connection,
            ServiceError::Http { .. } | ServiceError::Api { .. } => ServiceErrorKind::Http,
            ServiceError::Body(_) => ServiceErrorKind::Other,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else if let Some(status) = e.status() {
            ServiceError::Http {
                status: status.as_u16(),
            }
        } else if e.is_connect() || e.is_request() {
            ServiceError::Connection(e.to_string())
        } else {
            ServiceError::Body(e.to_string())
        }
    }
}

/// The speech sink could not say something. Logged and skipped.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("failed to start speech program {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("speech program {program} exited with {status}")]
    Exit { program: String, status: String },

    #[error("failed to write speech output: {0}")]
    Write(#[from] std::io::Error),
}

/// Startup configuration problems. All of these end the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] ini::Error),

    #[error("config file {} did not exist and was created with defaults", path.display())]
    Created { path: PathBuf },

    #[error("failed to write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("geonames_username is missing or still the placeholder")]
    PlaceholderCredential,
}

impl ConfigError {
    /// What the pilot hears before the process exits.
    pub fn spoken(&self) -> String {
        match self {
            ConfigError::PlaceholderCredential => {
                "Error: edit the flightfollowing.ini file and add your Geo names username. exiting!"
                    .to_string()
            }
            ConfigError::Created { .. } => {
                "Configuration file created. Open the flightfollowing.ini file and add your geonames username. Exiting."
                    .to_string()
            }
            _ => "Error reading the flightfollowing.ini file. Check error log. exiting!".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_kinds() {
        assert_eq!(ServiceError::Timeout.kind(), ServiceErrorKind::Connection);
        assert_eq!(
            ServiceError::Http { status: 503 }.kind(),
            ServiceErrorKind::Http
        );
        assert_eq!(
            ServiceError::Api {
                code: 18,
                message: "daily limit".into()
            }
            .kind(),
            ServiceErrorKind::Http
        );
    }

    #[test]
    fn placeholder_credential_is_spoken_clearly() {
        assert!(ConfigError::PlaceholderCredential
            .spoken()
            .contains("Geo names username"));
    }
}
