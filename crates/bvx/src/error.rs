// ai
//! 💀 Errors — the complete catalogue of ways a benchmark version can fail to exist.
//!
//! Every public operation either finishes with the catalog in the state it promised,
//! or hands back one of these. Nothing retries on its own. Nothing silently no-ops.
//! The caller gets the bad news, unabridged, like a doctor who went to med school in Rust.
//!
//! 🧠 Knowledge graph:
//! - `StoreError`: the taxonomy. Transport failures, catalog conflicts, lifecycle misuse,
//!   deliberate stubs (`NotImplemented`) and the aggregated `DeletionFailure`.
//! - `DeleteFailure`: one object the store refused to remove, with the store's reason.
//! - `StoreResult<T>`: the alias every backend and engine method returns.
//!
//! 🦆 The duck raises no errors. The duck is infallible. Be more like the duck.

use std::fmt;

use thiserror::Error;

/// 🗑️ One object the store declined to delete, plus the store's excuse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    pub name: String,
    pub message: String,
}

impl fmt::Display for DeleteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.message)
    }
}

/// 💀 Everything that can go wrong between "new version please" and "here it is".
#[derive(Debug, Error)]
pub enum StoreError {
    /// 🔒 Half a credential pair, or no endpoint at all.
    #[error("invalid auth options: {0}")]
    InvalidAuthOptions(String),

    /// 📡 The transport gave up. The message is the transport's own, unretouched.
    #[error("connection error during {operation}: {message}")]
    Connection {
        operation: &'static str,
        message: String,
    },

    /// 🚪 We reached the server and it said no.
    #[error("HTTP {status} for URL: {url}")]
    HttpStatus { status: u16, url: String },

    /// 👯 The benchmark or version is already there.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// 🕳️ The catalog has no version to offer.
    #[error("no version available for benchmark {0}")]
    NoVersion(String),

    /// 🤷 An operation needed a version that was never set.
    #[error("no {0} version set")]
    MissingVersion(&'static str),

    /// 👻 The store said "created!" and then couldn't find it.
    #[error("creation of {0} could not be verified")]
    CreationVerification(String),

    #[error("invalid tagging policy: {0}")]
    InvalidPolicy(String),

    #[error("invalid copy mode: {0}")]
    InvalidMode(String),

    /// 🚧 Deliberate stub, not a bug.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// 🗑️ Removal failed for at least one object. All of them are listed.
    #[error("deletion failed for {} object(s): {}", .0.len(), join_failures(.0))]
    DeletionFailure(Vec<DeleteFailure>),

    /// 🔒 A public-readonly view was asked to write.
    #[error("read-only access: {0} requires credentials")]
    ReadOnly(&'static str),

    #[error("invalid version identifier: {0}")]
    InvalidVersion(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// 🧾 The XML listing came back, but not in any shape we recognise.
    #[error("malformed listing for {container}: {message}")]
    MalformedListing { container: String, message: String },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn join_failures(failures: &[DeleteFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl StoreError {
    /// 📡 Wraps a transport failure, keeping the transport's full message chain.
    pub fn connection(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Connection {
            operation,
            message: message.into(),
        }
    }

    /// Checks if this error is the "someone got there first" case.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }

    /// Gets the HTTP status code if this is an HTTP status error
    pub fn status_code(&self) -> Option<u16> {
        match self {
            StoreError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(error: reqwest::Error) -> Self {
        // -- 🕵️ reqwest buries the useful part (dns, refused, timeout) in the source chain
        let mut message = error.to_string();
        let mut source = std::error::Error::source(&error);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::connection("http request", message)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_every_failed_deletion_gets_named_in_the_obituary() {
        let the_casualties = StoreError::DeletionFailure(vec![
            DeleteFailure {
                name: "0.2".to_string(),
                message: "AccessDenied".to_string(),
            },
            DeleteFailure {
                name: "test.9".to_string(),
                message: "InternalError".to_string(),
            },
        ]);

        assert_eq!(
            the_casualties.to_string(),
            "deletion failed for 2 object(s): 0.2 (AccessDenied), test.9 (InternalError)"
        );
    }

    #[test]
    fn the_one_where_status_codes_only_come_from_status_errors() {
        let the_404 = StoreError::HttpStatus {
            status: 404,
            url: "http://localhost:9000/bm.overview".to_string(),
        };
        assert_eq!(the_404.status_code(), Some(404));
        assert_eq!(StoreError::NotImplemented("archive").status_code(), None);
        assert!(StoreError::AlreadyExists("bm.0.2".to_string()).is_already_exists());
    }
}
