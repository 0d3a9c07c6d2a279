/// Error types for the bridge, grouped by the scope they abort
use thiserror::Error;

use crate::sync::identity::LocalId;

/// Failures talking to the remote tag manager
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{endpoint} returned HTTP {status}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("could not decode {endpoint} response: {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },

    #[error("invalid service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// A single tag record that cannot be turned into a `TagRecord`
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not a finite number: {value}")]
    NotFinite { field: &'static str, value: f64 },
}

/// Failures raised by the host accessory registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no registered device for {0}")]
    UnknownDevice(LocalId),

    #[error("device {0} is already registered")]
    AlreadyRegistered(LocalId),

    #[error("device {0} has no humidity service")]
    UnsupportedCharacteristic(LocalId),

    #[error("accessory cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("accessory cache is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Invalid or missing configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Top-level failure taxonomy used by the reconciler and the scheduler.
///
/// Every variant is terminal only for the scope it occurs in: a failed
/// authentication or fetch aborts the current tick, a record failure skips
/// that record, a command failure drops that command.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("authentication failed: {0}")]
    Authentication(#[source] ServiceError),

    #[error("fetching tag list failed: {0}")]
    Fetch(#[source] ServiceError),

    #[error("command to tag {slave_id} failed: {source}")]
    Command {
        slave_id: i64,
        #[source]
        source: ServiceError,
    },

    #[error("tag {serial}: {source}")]
    Record {
        serial: String,
        #[source]
        source: RecordError,
    },

    #[error("registry: {0}")]
    Registry(#[from] RegistryError),
}
